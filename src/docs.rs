use crate::api::roster::{FilterRequest, PendingDelete, RosterPage, StatusResponse};
use crate::model::{EditDraft, EditFields, Employee, EmployeeDraft, EmployeeStatus};
use crate::view::{AddForm, RosterStats, StatusFilter};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Employee Roster API",
        version = "1.0.0",
        description = r#"
## Employee Roster

View state and actions for a live employee roster. The server keeps one roster
view subscribed to the `employees` document collection; every change in the
collection replaces the roster's record set.

### Key Features
- **Live list** with `all`, `active`, `inactive` and `on-leave` filters
- **Add** and **edit** through drafts (name and position are required)
- **Soft delete** with an explicit confirmation step; deleted records stay in storage
- **Status toggle** between active and inactive

### Response Format
- JSON; most actions answer with the updated roster page
"#,
    ),
    paths(
        crate::api::roster::get_roster,
        crate::api::roster::list_departments,
        crate::api::roster::set_filter,
        crate::api::roster::open_add_form,
        crate::api::roster::close_add_form,
        crate::api::roster::update_add_draft,
        crate::api::roster::submit_add,
        crate::api::roster::start_edit,
        crate::api::roster::update_edit_draft,
        crate::api::roster::save_edit,
        crate::api::roster::cancel_edit,
        crate::api::roster::request_delete,
        crate::api::roster::confirm_delete,
        crate::api::roster::cancel_delete,
        crate::api::roster::toggle_status,
        crate::api::roster::dismiss_notice
    ),
    components(
        schemas(
            Employee,
            EmployeeStatus,
            EmployeeDraft,
            EditFields,
            EditDraft,
            AddForm,
            RosterStats,
            StatusFilter,
            RosterPage,
            PendingDelete,
            FilterRequest,
            StatusResponse
        )
    ),
    tags(
        (name = "Roster", description = "Employee roster view and actions"),
    )
)]
pub struct ApiDoc;
