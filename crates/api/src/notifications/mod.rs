//! Alert delivery to organization members (inbox + push).

pub mod dispatcher;

pub use dispatcher::{AlertTrigger, DispatchReport, NotificationDispatcher};
