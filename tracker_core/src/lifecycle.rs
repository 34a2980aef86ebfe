//! Track lifecycle state machine (§4.4): the pure per-track transitions
//! the session orchestrator drives once per frame. `tracks`/`lostTracks`
//! bookkeeping (which map a track lives in, eviction) stays in
//! `session.rs`, since that is where the two maps actually live.

use crate::config::PerClassParameters;
use crate::geometry::distance;
use crate::types::{Detection, Movement, TrackState, TrackedObject};

/// Create a new track from an unmatched detection (§4.4 "Entry").
///
/// If `min_confirmation_frames <= 1` the track is born `Active`
/// directly (the "confirmation threshold < 1" open question, resolved
/// in SPEC_FULL.md/DESIGN.md as "instant confirmation").
pub fn spawn_track(
    id: String,
    numeric_id: u64,
    detection: &Detection,
    now: u64,
    min_confirmation_frames: u32,
) -> TrackedObject {
    let state = if min_confirmation_frames <= 1 {
        TrackState::Active
    } else {
        TrackState::Pending
    };

    TrackedObject {
        id,
        numeric_id,
        class_name: detection.class_name.clone(),
        score: detection.score,
        bounding_box: detection.bounding_box.expect("unmatched trackable detection always has a box"),
        label: detection.label.clone(),
        history: detection.history,
        hits: 1,
        misses: 0,
        lost_frames: 0,
        state,
        movement: Movement {
            first_seen: now,
            last_seen: None,
            moving: false,
        },
    }
}

/// Apply a successful association to `track` (§4.4 "Associated this
/// frame"). Returns `true` iff this call confirms the track
/// (`Pending -> Active`) — the caller collects these into
/// `newlyConfirmed` for §4.5.
pub fn apply_match(
    track: &mut TrackedObject,
    detection: &Detection,
    now: u64,
    params: &PerClassParameters,
) -> bool {
    let prev_centroid = track.bounding_box.centroid();
    let new_box = detection
        .bounding_box
        .expect("matched trackable detection always has a box");

    track.bounding_box = new_box;
    track.class_name = detection.class_name.clone();
    track.score = detection.score;
    track.label = detection.label.clone();
    // `history` is detector-supplied provenance, not something the
    // tracker updates per §4.4 (only boundingBox/className/label/score
    // are listed as refreshed on association).

    track.hits += 1;
    track.misses = 0;

    let moved = distance(&prev_centroid, &new_box.centroid()) >= params.movement_threshold;
    track.movement.moving = moved;
    track.movement.last_seen = Some(now);

    let threshold = params.min_confirmation_frames.max(1);
    if track.state == TrackState::Pending && track.hits >= threshold {
        track.state = TrackState::Active;
        true
    } else {
        false
    }
}

/// Apply a frame with no association for `track` (§4.4 "Not
/// associated"). Returns `true` once `misses` has reached `max_misses`
/// — the caller moves the track into the lost pool.
pub fn apply_miss(track: &mut TrackedObject, max_misses: u32) -> bool {
    track.misses += 1;
    track.movement.moving = false;
    track.misses >= max_misses
}

/// Transition a confirmed-or-pending track into the lost pool.
pub fn to_lost(mut track: TrackedObject) -> TrackedObject {
    track.state = TrackState::Lost;
    track.lost_frames = 0;
    track
}

/// Revive a lost track that was re-acquired by association (§4.3 step
/// 3): `hits` is retained, `lostFrames` resets, state goes back to
/// `Pending` regardless of how confirmed it was before being lost —
/// re-entering the ordinary confirmation path on its next hit.
pub fn revive(mut track: TrackedObject, detection: &Detection, now: u64, params: &PerClassParameters) -> TrackedObject {
    track.state = TrackState::Pending;
    track.lost_frames = 0;
    apply_match(&mut track, detection, now, params);
    track
}

/// Age a still-lost track by one frame. Returns `true` once
/// `lostFrames` exceeds `max_lost_frames` — the caller evicts it.
pub fn age_lost(track: &mut TrackedObject, max_lost_frames: u32) -> bool {
    track.lost_frames += 1;
    track.lost_frames > max_lost_frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn detection_at(x: f64) -> Detection {
        Detection::new("person", 0.9, Some(BoundingBox::new(x, 10.0, 50.0, 50.0)))
    }

    #[test]
    fn test_spawn_with_default_threshold_starts_pending() {
        let track = spawn_track("1".to_string(), 1, &detection_at(10.0), 0, 3);
        assert_eq!(track.state, TrackState::Pending);
        assert_eq!(track.hits, 1);
    }

    #[test]
    fn test_spawn_with_threshold_zero_is_instantly_active() {
        let track = spawn_track("1".to_string(), 1, &detection_at(10.0), 0, 0);
        assert_eq!(track.state, TrackState::Active);
    }

    #[test]
    fn test_apply_match_confirms_once_threshold_reached() {
        let mut track = spawn_track("1".to_string(), 1, &detection_at(10.0), 0, 3);
        let params = PerClassParameters::default();

        assert!(!apply_match(&mut track, &detection_at(10.0), 1, &params));
        assert_eq!(track.state, TrackState::Pending);

        assert!(apply_match(&mut track, &detection_at(10.0), 2, &params));
        assert_eq!(track.state, TrackState::Active);
        assert_eq!(track.hits, 3);
    }

    #[test]
    fn test_apply_match_never_regresses_to_pending() {
        let mut track = spawn_track("1".to_string(), 1, &detection_at(10.0), 0, 1);
        assert_eq!(track.state, TrackState::Active);
        apply_match(&mut track, &detection_at(10.0), 1, &PerClassParameters::default());
        assert_eq!(track.state, TrackState::Active);
    }

    #[test]
    fn test_movement_flag_reflects_centroid_shift() {
        let mut track = spawn_track("1".to_string(), 1, &detection_at(10.0), 0, 1);
        let params = PerClassParameters {
            movement_threshold: 10.0,
            ..PerClassParameters::default()
        };
        apply_match(&mut track, &detection_at(80.0), 1, &params);
        assert!(track.movement.moving);
    }

    #[test]
    fn test_miss_trips_at_max_misses() {
        let mut track = spawn_track("1".to_string(), 1, &detection_at(10.0), 0, 1);
        assert!(!apply_miss(&mut track, 5));
        assert!(!apply_miss(&mut track, 5));
        assert!(!apply_miss(&mut track, 5));
        assert!(!apply_miss(&mut track, 5));
        assert!(apply_miss(&mut track, 5));
        assert_eq!(track.misses, 5);
    }

    #[test]
    fn test_lost_track_evicts_past_max_lost_frames() {
        let mut track = to_lost(spawn_track("1".to_string(), 1, &detection_at(10.0), 0, 1));
        for _ in 0..30 {
            assert!(!age_lost(&mut track, 30));
        }
        assert!(age_lost(&mut track, 30));
    }
}
