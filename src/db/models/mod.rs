//! Database models split into separate files.
//! This module re-exports individual model modules so imports like
//! `use crate::db::models::*;` work across the crate.

pub mod appointment;
pub mod availability_exception;
pub mod professional;
pub mod reservation;
pub mod service_offering;
pub mod settings;
pub mod working_hours;

pub use self::appointment::*;
pub use self::availability_exception::*;
pub use self::professional::*;
pub use self::reservation::*;
pub use self::service_offering::*;
pub use self::settings::*;
pub use self::working_hours::*;
