//! Wire types shared by the tracker and the sampler: the shapes §3 and §6
//! of the specification describe. Field names use `camelCase` on the wire
//! to match the external interface contract in §6, while the in-memory
//! Rust fields stay idiomatic `snake_case`.

use serde::{Deserialize, Serialize};

/// Reserved `className` for the synthetic motion sentinel (§3, §4.6). A
/// detection arriving with this class is never tracked and is passed
/// through to the output unchanged.
pub const MOTION_CLASS_NAME: &str = "motion";

/// A box in input-image coordinates. `w > 0` and `h > 0` for any box
/// actually carried by a detection; a degenerate box (`w <= 0` or
/// `h <= 0`) is treated as having zero area by the geometry kernel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }
}

/// Prior-sighting bookkeeping a detector may attach to a detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionHistory {
    pub first_seen: u64,
    pub last_seen: u64,
}

/// Per-track movement classification (§3, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    pub first_seen: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<u64>,
    pub moving: bool,
}

/// A single class-scored box as reported by the upstream detector, or as
/// carried in a `FrameResult` once tracked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub class_name: String,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<DetectionHistory>,
    /// Present only on tracked output (not on raw detector input).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Present only on tracked output (not on raw detector input).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movement: Option<Movement>,
}

impl Detection {
    pub fn new(class_name: impl Into<String>, score: f64, bounding_box: Option<BoundingBox>) -> Self {
        Self {
            class_name: class_name.into(),
            score,
            bounding_box,
            label: None,
            history: None,
            id: None,
            movement: None,
        }
    }

    pub fn is_motion_sentinel(&self) -> bool {
        self.class_name == MOTION_CLASS_NAME
    }

    /// A motion sentinel carrying `boundingBox`, or a bare one if `None`.
    pub fn motion_sentinel(bounding_box: Option<BoundingBox>) -> Self {
        Self::new(MOTION_CLASS_NAME, 1.0, bounding_box)
    }
}

/// A frame of detections from one source, as passed to `Tracker::update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub detections: Vec<Detection>,
    pub input_dimensions: (u32, u32),
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

/// The result of one `Tracker::update` call (§3, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameResult {
    pub active: Vec<Detection>,
    pub pending: Vec<Detection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_id: Option<String>,
}

/// Lifecycle state of a track (§4.4). Never serialized on its own — it is
/// implied by which of `active`/`pending` a `Detection` appears in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Pending,
    Active,
    Lost,
}

/// A persistent identity across frames (§3).
#[derive(Debug, Clone)]
pub struct TrackedObject {
    pub id: String,
    pub numeric_id: u64,
    pub class_name: String,
    pub score: f64,
    pub bounding_box: BoundingBox,
    pub label: Option<String>,
    pub history: Option<DetectionHistory>,
    pub hits: u32,
    pub misses: u32,
    pub lost_frames: u32,
    pub state: TrackState,
    pub movement: Movement,
}

impl TrackedObject {
    pub fn to_detection(&self) -> Detection {
        Detection {
            class_name: self.class_name.clone(),
            score: self.score,
            bounding_box: Some(self.bounding_box),
            label: self.label.clone(),
            history: self.history,
            id: Some(self.id.clone()),
            movement: Some(self.movement),
        }
    }
}

/// Encode `n` as a lowercase base-36 string with no leading zeros
/// (`1 -> "1"`, `36 -> "10"`), matching the spec's "base-36 of the
/// monotonic numeric id" track-id scheme.
pub fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).expect("base36 digits are ascii")
}
