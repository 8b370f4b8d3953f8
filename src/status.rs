use std::fmt;

/// Where a [`Deferred`](crate::Deferred) is in its lifecycle.
///
/// `Pending` is the only state that can change. `Resolved` and `Rejected`
/// are terminal and can not be reached from one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Pending,
    Resolved,
    Rejected,
}

impl Status {
    pub fn is_settled(self) -> bool {
        self != Status::Pending
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Pending => "pending",
            Status::Resolved => "resolved",
            Status::Rejected => "rejected",
        })
    }
}

/// What a second `resolve` or `reject` does.
///
/// Either way the first outcome is kept and no observer runs again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SettlePolicy {
    /// Return [`Error::InvalidState`](crate::Error::InvalidState).
    #[default]
    Strict,
    /// Ignore the call and return `Ok`.
    Lenient,
}

#[cfg(test)]
mod tests {
use super::{SettlePolicy, Status};

#[test]
fn test_status_settled() {
    assert!(!Status::Pending.is_settled());
    assert!(Status::Resolved.is_settled());
    assert!(Status::Rejected.is_settled());
}

#[test]
fn test_status_display() {
    assert_eq!(Status::Pending.to_string(), "pending");
    assert_eq!(Status::Rejected.to_string(), "rejected");
}

#[test]
fn test_policy_default_is_strict() {
    assert_eq!(SettlePolicy::default(), SettlePolicy::Strict);
}
}
