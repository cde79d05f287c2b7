//! Organization membership constants.

/// Membership invitation still awaiting the invitee.
pub const MEMBERSHIP_PENDING: &str = "pending";

/// Membership accepted by the invitee; accepted members receive alerts.
pub const MEMBERSHIP_ACCEPTED: &str = "accepted";
