//! Domain layer: entities, pure computations and the port traits the
//! application layer drives.

pub mod accrual;
pub mod authorization;
pub mod instruction;
pub mod money;
pub mod ports;
pub mod run;
pub mod timesheet;
pub mod withdrawal;
