pub mod appointment;
pub mod caregiver;
pub mod dose_log;
pub mod enums;
pub mod filters;
pub mod health_metric;
pub mod medication;
pub mod patient;
pub mod schedule;

pub use appointment::*;
pub use caregiver::*;
pub use dose_log::*;
pub use filters::*;
pub use health_metric::*;
pub use medication::*;
pub use patient::*;
pub use schedule::*;
