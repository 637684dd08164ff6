use serde::Serialize;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Departments offered by the roster forms. Stored records keep the plain
/// name, and any other value is accepted on save.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumIter, EnumString, AsRefStr,
)]
pub enum Department {
    #[serde(rename = "Information Technology")]
    #[strum(serialize = "Information Technology")]
    InformationTechnology,
    Engineering,
    Marketing,
    Sales,
    #[serde(rename = "HR")]
    #[strum(serialize = "HR")]
    Hr,
    Finance,
    Operations,
}

impl Department {
    pub fn name(&self) -> &str {
        self.as_ref()
    }

    pub fn names() -> Vec<String> {
        Department::iter().map(|d| d.name().to_string()).collect()
    }
}
