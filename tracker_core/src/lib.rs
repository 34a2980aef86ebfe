//! Per-session object tracking and audio level sampling core.
//!
//! This crate is the library a dora node mounts: it has no event loop
//! of its own, no async runtime, and performs no I/O beyond the
//! optional `TrackerConfig::load_from_file`. `object_tracker` and
//! `audio_level_sampler` are the thin node binaries that wire this
//! crate's `Tracker`/`AudioSupervisor` to dora inputs and outputs.

pub mod association;
pub mod audio;
pub mod config;
pub mod error;
pub mod geometry;
pub mod lifecycle;
pub mod prefilter;
pub mod scene_change;
pub mod session;
pub mod telemetry;
pub mod types;

pub use audio::{AudioSupervisor, LevelReading, Sampler, DEFAULT_RESTART_INTERVAL};
pub use config::{PerClassParameters, Settings, TrackerConfig};
pub use error::TrackerError;
pub use session::{SessionWatchdog, Tracker};
pub use types::{BoundingBox, Detection, DetectionHistory, Frame, FrameResult, Movement, TrackState, TrackedObject};
