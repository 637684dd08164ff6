pub mod department;
pub mod employee;

pub use department::Department;
pub use employee::{
    EditDraft, EditFields, Employee, EmployeeDraft, EmployeeId, EmployeePatch, EmployeeRecord,
    EmployeeStatus,
};
