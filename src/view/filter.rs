use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use utoipa::ToSchema;

use crate::model::{Employee, EmployeeStatus};

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    ToSchema,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Inactive,
    OnLeave,
}

impl StatusFilter {
    /// Deleted records never match, whatever the filter.
    pub fn matches(self, employee: &Employee) -> bool {
        if employee.deleted {
            return false;
        }
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => employee.status == EmployeeStatus::Active,
            StatusFilter::Inactive => employee.status == EmployeeStatus::Inactive,
            StatusFilter::OnLeave => employee.status == EmployeeStatus::OnLeave,
        }
    }
}

pub fn filter_employees(employees: &[Employee], filter: StatusFilter) -> Vec<&Employee> {
    employees.iter().filter(|e| filter.matches(e)).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RosterStats {
    #[schema(example = 12)]
    pub total: usize,
    #[schema(example = 9)]
    pub active: usize,
    #[schema(example = 2)]
    pub inactive: usize,
    #[schema(example = 1)]
    pub on_leave: usize,
}

impl RosterStats {
    pub fn from_employees(employees: &[Employee]) -> Self {
        employees
            .iter()
            .filter(|e| !e.deleted)
            .fold(Self::default(), |mut stats, e| {
                stats.total += 1;
                match e.status {
                    EmployeeStatus::Active => stats.active += 1,
                    EmployeeStatus::Inactive => stats.inactive += 1,
                    EmployeeStatus::OnLeave => stats.on_leave += 1,
                }
                stats
            })
    }
}
