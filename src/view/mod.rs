//! View/reconciliation layer.
//!
//! [`RosterView`] is the single owner of the roster's local state. Snapshots
//! replace the record set wholesale; user actions are split into a `prepare_*`
//! step that validates and builds the store call, and a settle step that
//! commits the transient-state change only once the store call has resolved.
//! [`Roster`] wires both halves to a [`RecordStore`](crate::store::RecordStore).

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::RosterError;
use crate::model::{
    EditDraft, EditFields, Employee, EmployeeDraft, EmployeeId, EmployeePatch, EmployeeRecord,
    EmployeeStatus,
};
use crate::store::{Snapshot, StoreError};

pub mod controller;
pub mod filter;

pub use controller::{MountHandle, Roster};
pub use filter::{RosterStats, StatusFilter, filter_employees};

/// Two-phase delete confirmation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DeleteConfirmation {
    #[default]
    Idle,
    Pending(EmployeeId),
    InFlight(EmployeeId),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddForm {
    pub open: bool,
    pub draft: EmployeeDraft,
    /// A create for a submitted draft has not resolved yet
    pub submitting: bool,
}

#[derive(Debug, Clone)]
pub struct RosterView {
    employees: Vec<Employee>,
    loading: bool,
    sync_error: Option<StoreError>,
    filter: StatusFilter,
    add_form: AddForm,
    editing: Option<EditDraft>,
    delete: DeleteConfirmation,
    notice: Option<String>,
}

impl Default for RosterView {
    fn default() -> Self {
        Self {
            employees: Vec::new(),
            loading: true,
            sync_error: None,
            filter: StatusFilter::All,
            add_form: AddForm::default(),
            editing: None,
            delete: DeleteConfirmation::Idle,
            notice: None,
        }
    }
}

impl RosterView {
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------------
    // Subscription events
    // ---------------------------------------------------------------------

    /// Replace the whole record set with the snapshot's live records.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) {
        self.employees = snapshot
            .documents
            .iter()
            .filter_map(|doc| match Employee::from_document(doc) {
                Ok(employee) => Some(employee),
                Err(e) => {
                    warn!(document_id = %doc.id, error = %e, "Skipping malformed document");
                    None
                }
            })
            .filter(|employee| !employee.deleted)
            .collect();
        self.loading = false;
        self.sync_error = None;
    }

    /// The record set is left as it was; nothing resubscribes.
    pub fn apply_subscription_error(&mut self, err: StoreError) {
        self.loading = false;
        self.sync_error = Some(err);
    }

    // ---------------------------------------------------------------------
    // Read side
    // ---------------------------------------------------------------------

    pub fn employees(&self) -> &[Employee] {
        &self.employees
    }

    pub fn employee(&self, id: &EmployeeId) -> Option<&Employee> {
        self.employees.iter().find(|e| &e.id == id)
    }

    pub fn visible(&self) -> Vec<&Employee> {
        filter_employees(&self.employees, self.filter)
    }

    pub fn stats(&self) -> RosterStats {
        RosterStats::from_employees(&self.employees)
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn sync_error(&self) -> Option<&StoreError> {
        self.sync_error.as_ref()
    }

    pub fn filter(&self) -> StatusFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: StatusFilter) {
        self.filter = filter;
    }

    pub fn add_form(&self) -> &AddForm {
        &self.add_form
    }

    pub fn editing(&self) -> Option<&EditDraft> {
        self.editing.as_ref()
    }

    pub fn delete_confirmation(&self) -> &DeleteConfirmation {
        &self.delete
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    fn known(&self, id: &EmployeeId) -> Result<&Employee, RosterError> {
        self.employee(id)
            .ok_or_else(|| RosterError::UnknownEmployee(id.clone()))
    }

    // ---------------------------------------------------------------------
    // Add
    // ---------------------------------------------------------------------

    pub fn open_add_form(&mut self) {
        self.add_form.open = true;
    }

    /// Closing keeps the draft for the next time the form opens.
    pub fn close_add_form(&mut self) {
        self.add_form.open = false;
    }

    pub fn set_add_draft(&mut self, draft: EmployeeDraft) {
        self.add_form.draft = draft;
    }

    /// Validate the current draft and mark it as submitted. Returns the
    /// submitted draft alongside the record to create.
    pub fn prepare_add(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<(EmployeeDraft, EmployeeRecord), RosterError> {
        if self.add_form.submitting {
            return Err(RosterError::AddInFlight);
        }
        let draft = self.add_form.draft.clone();
        draft.validate()?;
        self.add_form.submitting = true;
        let record = draft.clone().into_record(now);
        Ok((draft, record))
    }

    /// Only the submitted draft is cleared; a draft replaced while the create
    /// was pending stays in the form.
    pub fn add_succeeded(&mut self, submitted: &EmployeeDraft) {
        if self.add_form.draft == *submitted {
            self.add_form = AddForm::default();
        } else {
            self.add_form.submitting = false;
        }
    }

    pub fn add_failed(&mut self, _err: &StoreError) {
        self.add_form.submitting = false;
        self.notice = Some("Error adding employee. Please try again.".to_string());
    }

    // ---------------------------------------------------------------------
    // Edit
    // ---------------------------------------------------------------------

    /// Replaces any edit already in progress; its unsaved changes are lost.
    pub fn start_edit(&mut self, id: &EmployeeId) -> Result<(), RosterError> {
        let draft = EditDraft::from_employee(self.known(id)?);
        self.editing = Some(draft);
        Ok(())
    }

    pub fn set_edit_fields(&mut self, fields: EditFields) -> Result<(), RosterError> {
        let draft = self.editing.as_mut().ok_or(RosterError::NoEditInProgress)?;
        draft.fields = fields;
        Ok(())
    }

    pub fn prepare_save_edit(&self) -> Result<(EmployeeId, EmployeePatch), RosterError> {
        let draft = self.editing.as_ref().ok_or(RosterError::NoEditInProgress)?;
        draft.fields.validate()?;
        Ok((draft.id.clone(), draft.to_patch()))
    }

    /// Leaves a newer edit of another record alone.
    pub fn edit_saved(&mut self, id: &EmployeeId) {
        if self.editing.as_ref().is_some_and(|draft| &draft.id == id) {
            self.editing = None;
        }
    }

    pub fn edit_failed(&mut self, _err: &StoreError) {
        self.notice = Some("Error updating employee. Please try again.".to_string());
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    // ---------------------------------------------------------------------
    // Soft delete
    // ---------------------------------------------------------------------

    pub fn request_delete(&mut self, id: &EmployeeId) -> Result<(), RosterError> {
        if let DeleteConfirmation::InFlight(in_flight) = &self.delete {
            return Err(RosterError::DeleteInFlight(in_flight.clone()));
        }
        self.known(id)?;
        self.delete = DeleteConfirmation::Pending(id.clone());
        Ok(())
    }

    pub fn cancel_delete(&mut self) -> Result<(), RosterError> {
        match &self.delete {
            DeleteConfirmation::Pending(_) => {
                self.delete = DeleteConfirmation::Idle;
                Ok(())
            }
            DeleteConfirmation::InFlight(id) => Err(RosterError::DeleteInFlight(id.clone())),
            DeleteConfirmation::Idle => Err(RosterError::NoPendingDelete),
        }
    }

    /// Moves `Pending(id)` to `InFlight(id)` and returns the soft-delete write.
    pub fn confirm_delete(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<(EmployeeId, EmployeePatch), RosterError> {
        match &self.delete {
            DeleteConfirmation::Pending(id) => {
                let id = id.clone();
                self.delete = DeleteConfirmation::InFlight(id.clone());
                Ok((id, EmployeePatch::soft_delete(now)))
            }
            DeleteConfirmation::InFlight(id) => Err(RosterError::DeleteInFlight(id.clone())),
            DeleteConfirmation::Idle => Err(RosterError::NoPendingDelete),
        }
    }

    /// On failure the confirmation goes back to pending so it can be retried.
    pub fn delete_settled(&mut self, id: &EmployeeId, result: Result<(), &StoreError>) {
        if self.delete != DeleteConfirmation::InFlight(id.clone()) {
            return;
        }
        match result {
            Ok(()) => self.delete = DeleteConfirmation::Idle,
            Err(err) => {
                self.delete = DeleteConfirmation::Pending(id.clone());
                self.notice = Some(format!("Error deleting employee: {err}"));
            }
        }
    }

    // ---------------------------------------------------------------------
    // Status toggle
    // ---------------------------------------------------------------------

    pub fn prepare_toggle(
        &self,
        id: &EmployeeId,
    ) -> Result<(EmployeeStatus, EmployeePatch), RosterError> {
        let status = self.known(id)?.status.toggled();
        Ok((status, EmployeePatch::status(status)))
    }

    pub fn toggle_failed(&mut self, _err: &StoreError) {
        self.notice = Some("Error updating employee status. Please try again.".to_string());
    }
}
