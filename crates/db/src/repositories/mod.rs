//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods
//! that accept `&PgPool` as the first argument.

pub mod device_repo;
pub mod membership_repo;
pub mod notification_repo;
pub mod telemetry_repo;
pub mod threshold_rule_repo;

pub use device_repo::DeviceRepo;
pub use membership_repo::MembershipRepo;
pub use notification_repo::NotificationRepo;
pub use telemetry_repo::TelemetryRepo;
pub use threshold_rule_repo::ThresholdRuleRepo;
