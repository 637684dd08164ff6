use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::store::Document;

/// Store-assigned document id. Opaque and immutable once assigned.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[serde(transparent)]
pub struct EmployeeId(String);

impl EmployeeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for EmployeeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for EmployeeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EmployeeStatus {
    #[default]
    Active,
    Inactive,
    OnLeave,
}

impl EmployeeStatus {
    /// Status the quick toggle moves to. Only ever lands on `active` or
    /// `inactive`; `on-leave` is set through a draft.
    pub fn toggled(self) -> Self {
        match self {
            EmployeeStatus::Active => EmployeeStatus::Inactive,
            EmployeeStatus::Inactive | EmployeeStatus::OnLeave => EmployeeStatus::Active,
        }
    }
}

/// An employee as presented by the view: the stored document plus its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": "0b6c2d4e-3f0a-4b5e-9a57-1f1d5c1c2b7e",
    "name": "Ana Cruz",
    "position": "Analyst",
    "department": "Finance",
    "email": "ana.cruz@company.com",
    "phone": "+63 917 555 0100",
    "status": "active",
    "hireDate": "2025-03-01",
    "createdAt": "2025-03-01T08:15:30.120Z",
    "deleted": false
}))]
pub struct Employee {
    #[schema(value_type = String)]
    pub id: EmployeeId,
    pub name: String,
    pub position: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub status: EmployeeStatus,
    #[schema(example = "2025-03-01", format = "date", value_type = String)]
    pub hire_date: NaiveDate,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(format = "date-time", value_type = Option<String>)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Employee {
    /// Decode a stored document, tagging it with the document id.
    pub fn from_document(document: &Document) -> Result<Self, serde_json::Error> {
        let mut fields = document.data.clone();
        fields.insert(
            "id".to_string(),
            serde_json::Value::String(document.id.as_str().to_string()),
        );
        serde_json::from_value(serde_json::Value::Object(fields))
    }
}

/// Document body written by `create`. The id is never part of the body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRecord {
    pub name: String,
    pub position: String,
    pub department: String,
    pub email: String,
    pub phone: String,
    pub status: EmployeeStatus,
    pub hire_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub deleted: bool,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be empty".into());
        return Err(err);
    }
    Ok(())
}

/// Add-form draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct EmployeeDraft {
    #[validate(custom = "not_blank")]
    #[schema(example = "Ana Cruz")]
    pub name: String,
    #[validate(custom = "not_blank")]
    #[schema(example = "Analyst")]
    pub position: String,
    #[schema(example = "Finance")]
    pub department: String,
    #[schema(example = "ana.cruz@company.com")]
    pub email: String,
    #[schema(example = "+63 917 555 0100")]
    pub phone: String,
    pub status: EmployeeStatus,
}

impl EmployeeDraft {
    /// Full record for a new employee. Hire date and creation time both come
    /// from `now`, and a new record is never deleted.
    pub fn into_record(self, now: DateTime<Utc>) -> EmployeeRecord {
        EmployeeRecord {
            name: self.name,
            position: self.position,
            department: self.department,
            email: self.email,
            phone: self.phone,
            status: self.status,
            hire_date: now.date_naive(),
            created_at: now,
            deleted: false,
        }
    }
}

/// Fields a user can change in edit mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct EditFields {
    #[validate(custom = "not_blank")]
    pub name: String,
    #[validate(custom = "not_blank")]
    pub position: String,
    pub department: String,
    pub email: String,
    pub phone: String,
    pub status: EmployeeStatus,
}

/// Edit-mode draft, keyed by the record being edited.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditDraft {
    #[schema(value_type = String)]
    pub id: EmployeeId,
    pub fields: EditFields,
}

impl EditDraft {
    pub fn from_employee(employee: &Employee) -> Self {
        Self {
            id: employee.id.clone(),
            fields: EditFields {
                name: employee.name.clone(),
                position: employee.position.clone(),
                department: employee.department.clone(),
                email: employee.email.clone(),
                phone: employee.phone.clone(),
                status: employee.status,
            },
        }
    }

    /// The draft without its id, as a partial update.
    pub fn to_patch(&self) -> EmployeePatch {
        let fields = self.fields.clone();
        EmployeePatch {
            name: Some(fields.name),
            position: Some(fields.position),
            department: Some(fields.department),
            email: Some(fields.email),
            phone: Some(fields.phone),
            status: Some(fields.status),
            ..EmployeePatch::default()
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Partial document update. Absent fields are left untouched by the store.
///
/// There is no way to build a patch that writes `deleted: false`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<EmployeeStatus>,
    #[serde(skip_serializing_if = "is_false")]
    deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    deleted_at: Option<DateTime<Utc>>,
}

impl EmployeePatch {
    pub fn status(status: EmployeeStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn soft_delete(at: DateTime<Utc>) -> Self {
        Self {
            deleted: true,
            deleted_at: Some(at),
            ..Self::default()
        }
    }

    pub fn is_soft_delete(&self) -> bool {
        self.deleted
    }

    pub fn status_change(&self) -> Option<EmployeeStatus> {
        self.status
    }

    /// JSON object holding only the fields this patch sets.
    pub fn to_fields(&self) -> Result<serde_json::Map<String, serde_json::Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(fields) => Ok(fields),
            _ => Ok(serde_json::Map::new()),
        }
    }
}
