//! # Conditions
//!
//! `Ready` and `Synced` condition helpers.
//!
//! `Ready` reports whether the external resource is usable, `Synced` whether
//! the last reconcile succeeded. A condition's `lastTransitionTime` only moves
//! when its `status` changes.

use crate::crd::Condition;

pub const TYPE_READY: &str = "Ready";
pub const TYPE_SYNCED: &str = "Synced";

pub const REASON_AVAILABLE: &str = "Available";
pub const REASON_CREATING: &str = "Creating";
pub const REASON_RECONCILE_SUCCESS: &str = "ReconcileSuccess";

pub const STATUS_TRUE: &str = "True";
pub const STATUS_FALSE: &str = "False";

fn condition(r#type: &str, status: &str, reason: &str, message: Option<String>) -> Condition {
    Condition {
        r#type: r#type.to_string(),
        status: status.to_string(),
        last_transition_time: Some(chrono::Utc::now().to_rfc3339()),
        reason: Some(reason.to_string()),
        message,
    }
}

/// Ready=True: the external resource exists and matches the desired state
pub fn available() -> Condition {
    condition(TYPE_READY, STATUS_TRUE, REASON_AVAILABLE, None)
}

/// Ready=False: the external resource was just created
pub fn creating() -> Condition {
    condition(TYPE_READY, STATUS_FALSE, REASON_CREATING, None)
}

/// Ready=False with the error kind as reason
pub fn unavailable(reason: &str, message: impl Into<String>) -> Condition {
    condition(TYPE_READY, STATUS_FALSE, reason, Some(message.into()))
}

/// Synced=True
pub fn reconcile_success() -> Condition {
    condition(TYPE_SYNCED, STATUS_TRUE, REASON_RECONCILE_SUCCESS, None)
}

/// Synced=False with the error kind as reason
pub fn reconcile_error(reason: &str, message: impl Into<String>) -> Condition {
    condition(TYPE_SYNCED, STATUS_FALSE, reason, Some(message.into()))
}

/// Find a condition by type
pub fn get<'a>(conditions: &'a [Condition], r#type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == r#type)
}

/// True if the condition exists with status `True`
pub fn is_true(conditions: &[Condition], r#type: &str) -> bool {
    get(conditions, r#type).is_some_and(|c| c.status == STATUS_TRUE)
}

/// Insert or replace a condition of the same type
///
/// Keeps the existing `lastTransitionTime` when the status is unchanged.
/// Returns true if anything other than the timestamp changed.
pub fn set(conditions: &mut Vec<Condition>, mut new: Condition) -> bool {
    match conditions.iter_mut().find(|c| c.r#type == new.r#type) {
        Some(existing) => {
            if existing.status == new.status {
                new.last_transition_time = existing.last_transition_time.clone();
            }
            if *existing == new {
                return false;
            }
            *existing = new;
            true
        }
        None => {
            conditions.push(new);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_appends_new_condition() {
        let mut conditions = Vec::new();
        assert!(set(&mut conditions, available()));
        assert!(set(&mut conditions, reconcile_success()));
        assert_eq!(conditions.len(), 2);
        assert!(is_true(&conditions, TYPE_READY));
        assert!(is_true(&conditions, TYPE_SYNCED));
    }

    #[test]
    fn test_set_is_noop_for_identical_condition() {
        let mut conditions = vec![available()];
        assert!(!set(&mut conditions, available()));
        assert_eq!(conditions.len(), 1);
    }

    #[test]
    fn test_transition_time_kept_when_status_unchanged() {
        let mut first = reconcile_error("TransientTransportError", "timeout");
        first.last_transition_time = Some("2024-01-01T00:00:00+00:00".to_string());
        let mut conditions = vec![first];

        assert!(set(
            &mut conditions,
            reconcile_error("DecodeError", "bad json")
        ));
        let synced = get(&conditions, TYPE_SYNCED).unwrap();
        assert_eq!(synced.reason.as_deref(), Some("DecodeError"));
        assert_eq!(
            synced.last_transition_time.as_deref(),
            Some("2024-01-01T00:00:00+00:00")
        );
    }

    #[test]
    fn test_transition_time_moves_when_status_changes() {
        let mut first = creating();
        first.last_transition_time = Some("2024-01-01T00:00:00+00:00".to_string());
        let mut conditions = vec![first];

        assert!(set(&mut conditions, available()));
        let ready = get(&conditions, TYPE_READY).unwrap();
        assert_eq!(ready.status, STATUS_TRUE);
        assert_ne!(
            ready.last_transition_time.as_deref(),
            Some("2024-01-01T00:00:00+00:00")
        );
    }
}
