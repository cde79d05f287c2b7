//! Domain model structs and DTOs.
//!
//! Each submodule contains a `FromRow` entity struct matching the database
//! row and, where this service inserts rows, a create DTO.

pub mod device;
pub mod membership;
pub mod notification;
pub mod telemetry;
pub mod threshold_rule;
