use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use derive_more::{Display, Error};
use serde::Serialize;
use validator::ValidationErrors;

use crate::model::EmployeeId;
use crate::store::StoreError;

#[derive(Debug, Display, Error)]
pub enum RosterError {
    #[display(fmt = "validation failed: {}", _0)]
    Validation(#[error(source)] ValidationErrors),
    #[display(fmt = "{}", _0)]
    Store(#[error(source)] StoreError),
    #[display(fmt = "employee {} is not in the roster", _0)]
    UnknownEmployee(#[error(not(source))] EmployeeId),
    #[display(fmt = "no edit in progress")]
    NoEditInProgress,
    #[display(fmt = "no delete is awaiting confirmation")]
    NoPendingDelete,
    #[display(fmt = "delete of {} is already in flight", _0)]
    DeleteInFlight(#[error(not(source))] EmployeeId),
    #[display(fmt = "an add is already in flight")]
    AddInFlight,
    #[display(fmt = "roster view is already mounted")]
    AlreadyMounted,
}

impl From<ValidationErrors> for RosterError {
    fn from(err: ValidationErrors) -> Self {
        RosterError::Validation(err)
    }
}

impl From<StoreError> for RosterError {
    fn from(err: StoreError) -> Self {
        RosterError::Store(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<String>,
}

impl ResponseError for RosterError {
    fn status_code(&self) -> StatusCode {
        match self {
            RosterError::Validation(_) => StatusCode::BAD_REQUEST,
            RosterError::UnknownEmployee(_) | RosterError::Store(StoreError::NotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            RosterError::NoEditInProgress
            | RosterError::NoPendingDelete
            | RosterError::DeleteInFlight(_)
            | RosterError::AddInFlight
            | RosterError::AlreadyMounted => StatusCode::CONFLICT,
            RosterError::Store(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut fields: Vec<String> = match self {
            RosterError::Validation(errors) => errors
                .field_errors()
                .keys()
                .map(|field| field.to_string())
                .collect(),
            _ => Vec::new(),
        };
        fields.sort();

        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EmployeeDraft;
    use validator::Validate;

    #[test]
    fn validation_maps_to_bad_request() {
        let err: RosterError = EmployeeDraft::default().validate().unwrap_err().into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn store_failures_map_by_kind() {
        let missing = RosterError::from(StoreError::NotFound(EmployeeId::from("x")));
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let transport = RosterError::from(StoreError::Transport("timeout".into()));
        assert_eq!(transport.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(transport.to_string(), "transport error: timeout");
    }

    #[test]
    fn state_conflicts_map_to_conflict() {
        assert_eq!(RosterError::NoPendingDelete.status_code(), StatusCode::CONFLICT);
        assert_eq!(RosterError::AddInFlight.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            RosterError::DeleteInFlight(EmployeeId::from("x")).status_code(),
            StatusCode::CONFLICT
        );
    }
}
