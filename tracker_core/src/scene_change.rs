//! Scene-change detector (§4.5): decide whether this frame warrants a
//! fresh `detectionId`. Building the id string and updating
//! `lastActiveIds`/`lastDetectionId` stays in `session.rs`, which owns
//! that state; this module is the pure decision rule.

use std::collections::HashSet;

/// Periodic refresh interval from §4.5 clause (d), intentionally added
/// per SPEC_FULL.md §9 (present in one source variant, absent in
/// another; kept here because it improves downstream UX).
pub const REFRESH_INTERVAL_MS: u64 = 5_000;

/// `true` iff a fresh `detectionId` should be emitted this frame.
pub fn should_emit(
    newly_confirmed_nonempty: bool,
    last_active_ids: &HashSet<String>,
    active_ids: &HashSet<String>,
    last_detection_time: Option<u64>,
    now: u64,
) -> bool {
    if newly_confirmed_nonempty {
        return true; // (a)
    }
    if last_active_ids.is_empty() && !active_ids.is_empty() {
        return true; // (b) first confirmed frame
    }
    if last_active_ids.iter().any(|id| !active_ids.contains(id)) {
        return true; // (c) disappearance
    }
    if !active_ids.is_empty() {
        if let Some(last) = last_detection_time {
            if now.saturating_sub(last) > REFRESH_INTERVAL_MS {
                return true; // (d) periodic refresh
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_newly_confirmed_always_emits() {
        assert!(should_emit(true, &set(&[]), &set(&[]), None, 0));
    }

    #[test]
    fn test_first_confirmation_emits() {
        assert!(should_emit(false, &set(&[]), &set(&["1"]), None, 0));
    }

    #[test]
    fn test_disappearance_emits() {
        assert!(should_emit(false, &set(&["1", "2"]), &set(&["1"]), Some(0), 100));
    }

    #[test]
    fn test_unchanged_set_does_not_emit_before_refresh() {
        assert!(!should_emit(false, &set(&["1"]), &set(&["1"]), Some(0), 100));
    }

    #[test]
    fn test_unchanged_set_emits_after_refresh_interval() {
        assert!(should_emit(
            false,
            &set(&["1"]),
            &set(&["1"]),
            Some(0),
            REFRESH_INTERVAL_MS + 1
        ));
    }

    #[test]
    fn test_empty_active_set_never_refreshes() {
        assert!(!should_emit(false, &set(&[]), &set(&[]), Some(0), REFRESH_INTERVAL_MS + 1));
    }
}
