use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::model::{Department, EditDraft, EditFields, Employee, EmployeeDraft, EmployeeId, EmployeeStatus};
use crate::view::{AddForm, DeleteConfirmation, Roster, RosterStats, RosterView, StatusFilter};

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PendingDelete {
    #[schema(value_type = String)]
    pub id: EmployeeId,
    /// true once confirmed and the soft delete has been sent
    pub in_flight: bool,
}

/// Everything the browser needs to render the roster.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RosterPage {
    pub loading: bool,
    #[schema(example = "transport error: connection reset")]
    pub sync_error: Option<String>,
    pub filter: StatusFilter,
    /// Records matching `filter`
    pub employees: Vec<Employee>,
    pub stats: RosterStats,
    pub add_form: AddForm,
    pub editing: Option<EditDraft>,
    pub pending_delete: Option<PendingDelete>,
    #[schema(example = "Error adding employee. Please try again.")]
    pub notice: Option<String>,
}

impl RosterPage {
    pub fn from_view(view: &RosterView) -> Self {
        let pending_delete = match view.delete_confirmation() {
            DeleteConfirmation::Idle => None,
            DeleteConfirmation::Pending(id) => Some(PendingDelete {
                id: id.clone(),
                in_flight: false,
            }),
            DeleteConfirmation::InFlight(id) => Some(PendingDelete {
                id: id.clone(),
                in_flight: true,
            }),
        };

        Self {
            loading: view.loading(),
            sync_error: view.sync_error().map(|e| e.to_string()),
            filter: view.filter(),
            employees: view.visible().into_iter().cloned().collect(),
            stats: view.stats(),
            add_form: view.add_form().clone(),
            editing: view.editing().cloned(),
            pending_delete,
            notice: view.notice().map(str::to_string),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct FilterRequest {
    #[schema(example = "on-leave")]
    pub filter: StatusFilter,
}

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    #[schema(value_type = String)]
    pub id: EmployeeId,
    pub status: EmployeeStatus,
}

fn page(roster: &Roster) -> HttpResponse {
    HttpResponse::Ok().json(RosterPage::from_view(&roster.view()))
}

/// Current roster page
#[utoipa::path(
    get,
    path = "/api/roster",
    responses(
        (status = 200, description = "Roster view state", body = RosterPage)
    ),
    tag = "Roster"
)]
pub async fn get_roster(roster: web::Data<Roster>) -> impl Responder {
    page(&roster)
}

/// Departments offered by the forms
#[utoipa::path(
    get,
    path = "/api/roster/departments",
    responses(
        (status = 200, description = "Department names", body = Vec<String>, example = json!([
            "Information Technology", "Engineering", "Marketing", "Sales", "HR", "Finance", "Operations"
        ]))
    ),
    tag = "Roster"
)]
pub async fn list_departments() -> impl Responder {
    HttpResponse::Ok().json(Department::names())
}

/// Set the status filter
#[utoipa::path(
    put,
    path = "/api/roster/filter",
    request_body = FilterRequest,
    responses(
        (status = 200, description = "Filter applied", body = RosterPage)
    ),
    tag = "Roster"
)]
pub async fn set_filter(
    roster: web::Data<Roster>,
    body: web::Json<FilterRequest>,
) -> impl Responder {
    roster.view().set_filter(body.filter);
    page(&roster)
}

/// Open the add form
#[utoipa::path(
    post,
    path = "/api/roster/add-form/open",
    responses((status = 200, description = "Add form opened", body = RosterPage)),
    tag = "Roster"
)]
pub async fn open_add_form(roster: web::Data<Roster>) -> impl Responder {
    roster.view().open_add_form();
    page(&roster)
}

/// Close the add form, keeping its draft
#[utoipa::path(
    post,
    path = "/api/roster/add-form/close",
    responses((status = 200, description = "Add form closed", body = RosterPage)),
    tag = "Roster"
)]
pub async fn close_add_form(roster: web::Data<Roster>) -> impl Responder {
    roster.view().close_add_form();
    page(&roster)
}

/// Replace the add-form draft
#[utoipa::path(
    put,
    path = "/api/roster/add-form",
    request_body = EmployeeDraft,
    responses((status = 200, description = "Draft stored", body = RosterPage)),
    tag = "Roster"
)]
pub async fn update_add_draft(
    roster: web::Data<Roster>,
    body: web::Json<EmployeeDraft>,
) -> impl Responder {
    roster.view().set_add_draft(body.into_inner());
    page(&roster)
}

/// Submit the add form
#[utoipa::path(
    post,
    path = "/api/roster/add",
    responses(
        (status = 201, description = "Employee created", body = Object, example = json!({
            "id": "0b6c2d4e-3f0a-4b5e-9a57-1f1d5c1c2b7e"
        })),
        (status = 400, description = "Name or position is empty"),
        (status = 409, description = "An add is already in flight"),
        (status = 502, description = "Store rejected the write")
    ),
    tag = "Roster"
)]
pub async fn submit_add(roster: web::Data<Roster>) -> actix_web::Result<HttpResponse> {
    let id = roster.add_employee().await?;
    Ok(HttpResponse::Created().json(json!({ "id": id })))
}

/// Start editing an employee
#[utoipa::path(
    post,
    path = "/api/roster/employees/{id}/edit",
    params(("id", Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Edit started", body = RosterPage),
        (status = 404, description = "Employee not in the roster")
    ),
    tag = "Roster"
)]
pub async fn start_edit(
    roster: web::Data<Roster>,
    path: web::Path<String>,
) -> actix_web::Result<HttpResponse> {
    let id = EmployeeId::from(path.into_inner());
    roster.view().start_edit(&id)?;
    Ok(page(&roster))
}

/// Replace the edit draft fields
#[utoipa::path(
    put,
    path = "/api/roster/edit",
    request_body = EditFields,
    responses(
        (status = 200, description = "Draft stored", body = RosterPage),
        (status = 409, description = "No edit in progress")
    ),
    tag = "Roster"
)]
pub async fn update_edit_draft(
    roster: web::Data<Roster>,
    body: web::Json<EditFields>,
) -> actix_web::Result<HttpResponse> {
    roster.view().set_edit_fields(body.into_inner())?;
    Ok(page(&roster))
}

/// Save the edit draft
#[utoipa::path(
    post,
    path = "/api/roster/edit/save",
    responses(
        (status = 200, description = "Employee updated", body = RosterPage),
        (status = 400, description = "Name or position is empty"),
        (status = 409, description = "No edit in progress"),
        (status = 502, description = "Store rejected the write")
    ),
    tag = "Roster"
)]
pub async fn save_edit(roster: web::Data<Roster>) -> actix_web::Result<HttpResponse> {
    roster.save_edit().await?;
    Ok(page(&roster))
}

/// Discard the edit draft
#[utoipa::path(
    post,
    path = "/api/roster/edit/cancel",
    responses((status = 200, description = "Edit cancelled", body = RosterPage)),
    tag = "Roster"
)]
pub async fn cancel_edit(roster: web::Data<Roster>) -> impl Responder {
    roster.view().cancel_edit();
    page(&roster)
}

/// Ask to delete an employee; nothing is written until confirmed
#[utoipa::path(
    post,
    path = "/api/roster/employees/{id}/delete",
    params(("id", Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Delete awaiting confirmation", body = RosterPage),
        (status = 404, description = "Employee not in the roster"),
        (status = 409, description = "Another delete is in flight")
    ),
    tag = "Roster"
)]
pub async fn request_delete(
    roster: web::Data<Roster>,
    path: web::Path<String>,
) -> actix_web::Result<HttpResponse> {
    let id = EmployeeId::from(path.into_inner());
    roster.view().request_delete(&id)?;
    Ok(page(&roster))
}

/// Confirm the pending delete
#[utoipa::path(
    post,
    path = "/api/roster/delete/confirm",
    responses(
        (status = 200, description = "Employee marked as deleted", body = RosterPage),
        (status = 409, description = "No delete awaiting confirmation"),
        (status = 502, description = "Store rejected the write")
    ),
    tag = "Roster"
)]
pub async fn confirm_delete(roster: web::Data<Roster>) -> actix_web::Result<HttpResponse> {
    roster.confirm_delete().await?;
    Ok(page(&roster))
}

/// Drop the pending delete
#[utoipa::path(
    post,
    path = "/api/roster/delete/cancel",
    responses(
        (status = 200, description = "Delete cancelled", body = RosterPage),
        (status = 409, description = "No delete awaiting confirmation")
    ),
    tag = "Roster"
)]
pub async fn cancel_delete(roster: web::Data<Roster>) -> actix_web::Result<HttpResponse> {
    roster.view().cancel_delete()?;
    Ok(page(&roster))
}

/// Flip an employee between active and inactive
#[utoipa::path(
    post,
    path = "/api/roster/employees/{id}/toggle-status",
    params(("id", Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Status written", body = StatusResponse),
        (status = 404, description = "Employee not in the roster"),
        (status = 502, description = "Store rejected the write")
    ),
    tag = "Roster"
)]
pub async fn toggle_status(
    roster: web::Data<Roster>,
    path: web::Path<String>,
) -> actix_web::Result<HttpResponse> {
    let id = EmployeeId::from(path.into_inner());
    let status = roster.toggle_status(&id).await?;
    Ok(HttpResponse::Ok().json(StatusResponse { id, status }))
}

/// Dismiss the current notice
#[utoipa::path(
    delete,
    path = "/api/roster/notice",
    responses((status = 200, description = "Notice cleared", body = RosterPage)),
    tag = "Roster"
)]
pub async fn dismiss_notice(roster: web::Data<Roster>) -> impl Responder {
    roster.view().dismiss_notice();
    page(&roster)
}
