//! Session orchestrator (§4.6): owns `SessionState`, drives one frame
//! through pre-filter -> association -> lifecycle -> scene-change, and
//! injects the motion pseudo-detections on the way out. Grounded on the
//! teacher's `main()` event loop shape (`object_tracker/src/main.rs`),
//! repackaged as the pure step function §9 calls for — the tracker
//! never calls back into the host.

use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::association::{greedy_match, strategy_for, Candidate};
use crate::config::{Settings, TrackerConfig};
use crate::lifecycle::{age_lost, apply_match, apply_miss, revive, spawn_track, to_lost};
use crate::scene_change;
use crate::types::{to_base36, BoundingBox, Detection, Frame, FrameResult, TrackState, TrackedObject};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// All state associated with the lifetime of one stream from one source
/// (§3). `tracks`/`lostTracks` are `BTreeMap<u64, TrackedObject>` keyed
/// by the monotonic numeric track id: since ids are assigned strictly
/// increasing and never reused, a `BTreeMap`'s ascending key order is
/// exactly the insertion order §4.3's greedy tie-break needs, with no
/// extra ordered-map dependency.
pub struct SessionState {
    pub session_id: String,
    pub current_frame: u64,
    pub tracks: BTreeMap<u64, TrackedObject>,
    pub lost_tracks: BTreeMap<u64, TrackedObject>,
    pub last_active_ids: HashSet<String>,
    pub last_detection_time: Option<u64>,
    pub next_track_id: u64,
}

impl SessionState {
    fn new() -> Self {
        let session_id = Uuid::new_v4().simple().to_string()[..4].to_string();
        Self {
            session_id,
            current_frame: 0,
            tracks: BTreeMap::new(),
            lost_tracks: BTreeMap::new(),
            last_active_ids: HashSet::new(),
            last_detection_time: None,
            next_track_id: 1,
        }
    }
}

/// The per-session object tracker: §4.6's public contract.
pub struct Tracker {
    config: TrackerConfig,
    state: SessionState,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Self {
        let state = SessionState::new();
        info!(session_id = %state.session_id, "tracker session started");
        Self { config, state }
    }

    pub fn session_id(&self) -> &str {
        &self.state.session_id
    }

    pub fn current_frame(&self) -> u64 {
        self.state.current_frame
    }

    /// `Tracker::update(frame, basicOnly) -> FrameResult` (§4.6),
    /// extended with the live `settings` map per §5 ("mutating
    /// configuration between calls ... takes effect on the next
    /// update").
    pub fn update(&mut self, frame: &Frame, settings: &Settings, basic_only: bool) -> FrameResult {
        let now = frame.timestamp.unwrap_or_else(now_ms);

        // A malformed detection (no box, or the reserved "motion"
        // class) never enters tracking; it is forwarded unchanged (§3,
        // §4.6 failure handling).
        let (trackable, passthrough): (Vec<Detection>, Vec<Detection>) = frame
            .detections
            .iter()
            .cloned()
            .partition(|d| d.bounding_box.is_some() && !d.is_motion_sentinel());

        let enabled_classes = self.config.enabled_classes(settings);
        let basic_only = basic_only || self.config.basic_detections_only(settings);

        let filtered = crate::prefilter::prefilter(
            &trackable,
            frame.input_dimensions,
            &enabled_classes,
            &self.config.class_defaults,
            settings,
        );

        let result = if basic_only {
            self.basic_result(&filtered, &passthrough)
        } else {
            self.tracked_result(&filtered, &passthrough, settings, now)
        };

        self.state.current_frame += 1;
        result
    }

    fn basic_result(&self, filtered: &[Detection], passthrough: &[Detection]) -> FrameResult {
        let mut active = filtered.to_vec();
        active.extend(motion_sentinels(filtered));
        active.extend(passthrough.iter().cloned());

        FrameResult {
            active,
            pending: Vec::new(),
            detection_id: None,
        }
    }

    fn tracked_result(
        &mut self,
        filtered: &[Detection],
        passthrough: &[Detection],
        settings: &Settings,
        now: u64,
    ) -> FrameResult {
        let class_defaults = self.config.class_defaults;
        let resolve = |class_name: &str| class_defaults.resolve(class_name, settings);

        let candidates: Vec<Candidate> = self
            .state
            .tracks
            .iter()
            .map(|(id, t)| Candidate {
                id: *id,
                class_name: t.class_name.clone(),
                bounding_box: t.bounding_box,
            })
            .collect();

        let strategy = strategy_for(self.config.use_matrix);
        let result = strategy.associate(filtered, &candidates, &resolve);

        let mut newly_confirmed: HashSet<String> = HashSet::new();
        let mut matched_track_ids: HashSet<u64> = result.matched.iter().map(|(_, id)| *id).collect();

        for (det_idx, track_id) in &result.matched {
            let det = &filtered[*det_idx];
            let params = resolve(&det.class_name);
            if let Some(track) = self.state.tracks.get_mut(track_id) {
                if apply_match(track, det, now, &params) {
                    newly_confirmed.insert(track.id.clone());
                }
            }
        }

        // §4.3 step 3: lost-track reacquisition, greedy strategy only
        // (§9's documented difference from Hungarian).
        let mut unmatched = result.unmatched;
        if !self.config.use_matrix && !self.state.lost_tracks.is_empty() && !unmatched.is_empty() {
            let lost_candidates: Vec<Candidate> = self
                .state
                .lost_tracks
                .iter()
                .map(|(id, t)| Candidate {
                    id: *id,
                    class_name: t.class_name.clone(),
                    bounding_box: t.bounding_box,
                })
                .collect();
            let unmatched_detections: Vec<Detection> =
                unmatched.iter().map(|&i| filtered[i].clone()).collect();

            let reacquired = greedy_match(&unmatched_detections, &lost_candidates, &resolve);
            let revived_local: HashSet<usize> = reacquired.matched.iter().map(|(i, _)| *i).collect();

            for (local_idx, lost_id) in reacquired.matched {
                let global_idx = unmatched[local_idx];
                let det = &filtered[global_idx];
                let params = resolve(&det.class_name);
                if let Some(lost_track) = self.state.lost_tracks.remove(&lost_id) {
                    debug!(track_id = %lost_track.id, "reacquired lost track");
                    let track = revive(lost_track, det, now, &params);
                    if track.state == TrackState::Active {
                        newly_confirmed.insert(track.id.clone());
                    }
                    matched_track_ids.insert(lost_id);
                    self.state.tracks.insert(lost_id, track);
                }
            }

            unmatched = unmatched
                .into_iter()
                .enumerate()
                .filter(|(i, _)| !revived_local.contains(i))
                .map(|(_, idx)| idx)
                .collect();
        }

        for idx in unmatched {
            let det = &filtered[idx];
            let params = resolve(&det.class_name);
            let id = self.state.next_track_id;
            self.state.next_track_id += 1;
            let track = spawn_track(to_base36(id), id, det, now, params.min_confirmation_frames);
            if track.state == TrackState::Active {
                newly_confirmed.insert(track.id.clone());
            }
            matched_track_ids.insert(id);
            self.state.tracks.insert(id, track);
        }

        let mut moved_to_lost = Vec::new();
        for (id, track) in self.state.tracks.iter_mut() {
            if matched_track_ids.contains(id) {
                continue;
            }
            if apply_miss(track, self.config.max_misses) {
                moved_to_lost.push(*id);
            }
        }
        for id in moved_to_lost {
            if let Some(track) = self.state.tracks.remove(&id) {
                warn!(track_id = %track.id, "track exceeded max misses, moving to lost pool");
                self.state.lost_tracks.insert(id, to_lost(track));
            }
        }

        let mut evicted = Vec::new();
        for (id, track) in self.state.lost_tracks.iter_mut() {
            if age_lost(track, self.config.max_lost_frames) {
                evicted.push(*id);
            }
        }
        for id in evicted {
            if let Some(track) = self.state.lost_tracks.remove(&id) {
                info!(track_id = %track.id, "evicted lost track");
            }
        }

        let active_ids: HashSet<String> = self
            .state
            .tracks
            .values()
            .filter(|t| t.state == TrackState::Active)
            .map(|t| t.id.clone())
            .collect();

        let emit = scene_change::should_emit(
            !newly_confirmed.is_empty(),
            &self.state.last_active_ids,
            &active_ids,
            self.state.last_detection_time,
            now,
        );
        let detection_id = if emit {
            self.state.last_detection_time = Some(now);
            Some(format!("{}-{}", self.state.session_id, self.state.current_frame))
        } else {
            None
        };
        self.state.last_active_ids = active_ids;

        let mut active: Vec<Detection> = self
            .state
            .tracks
            .values()
            .filter(|t| t.state == TrackState::Active)
            .map(|t| t.to_detection())
            .collect();
        let pending: Vec<Detection> = self
            .state
            .tracks
            .values()
            .filter(|t| t.state == TrackState::Pending)
            .map(|t| t.to_detection())
            .collect();

        // Motion sentinels track this frame's pre-filtered detections,
        // not tracked-state: a still-pending track's box still produces
        // a sentinel (see the S1 end-to-end scenario, where the single
        // detection is only `pending` yet `active` carries its boxed
        // motion sentinel).
        active.extend(motion_sentinels(filtered));
        active.extend(passthrough.iter().cloned());

        FrameResult {
            active,
            pending,
            detection_id,
        }
    }
}

fn motion_sentinels(filtered: &[Detection]) -> Vec<Detection> {
    let boxes: Vec<BoundingBox> = filtered.iter().filter_map(|d| d.bounding_box).collect();
    if boxes.is_empty() {
        vec![Detection::motion_sentinel(None)]
    } else {
        boxes.into_iter().map(|b| Detection::motion_sentinel(Some(b))).collect()
    }
}

/// 30 s "hung session" watchdog (§5). Deliberately owned by the host
/// (node binaries), not `Tracker`: `Tracker::update` is a synchronous,
/// CPU-only step function and never arms its own timers.
pub struct SessionWatchdog {
    last_seen: Instant,
    timeout: Duration,
}

impl SessionWatchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_seen: Instant::now(),
            timeout,
        }
    }

    pub fn default_30s() -> Self {
        Self::new(Duration::from_secs(30))
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_hung(&self) -> bool {
        self.last_seen.elapsed() >= self.timeout
    }
}
