//! Audio level sampler (§4.7): RTP µ-law payload -> dBFS, maintained over
//! a wall-clock sampling window. Grounded on the teacher's
//! `audio_capture/src/main.rs` for the stream/restart shape, with the
//! signal math itself novel to this spec (the teacher never computes a
//! level — it only forwards raw samples over `ringbuf`).

use std::time::{Duration, Instant};

use tracing::{debug, warn};

const RTP_HEADER_LEN: usize = 12;
const SILENCE_FLOOR: f64 = 1e-5;

/// One completed window's aggregate (§4.7).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelReading {
    pub d_bfs: f64,
    pub db_std_dev: f64,
}

/// `rms`/`db` for a single RTP payload of 8-bit unsigned PCM. Returns
/// `None` for a packet too short to carry any payload past the RTP
/// header (§4.7 "skip any packet with len <= 12").
fn payload_db(payload: &[u8]) -> Option<f64> {
    if payload.len() <= RTP_HEADER_LEN {
        return None;
    }

    let samples = &payload[RTP_HEADER_LEN..];
    let n = samples.len() as f64;
    let sum_sq: f64 = samples
        .iter()
        .map(|&b| {
            let s = (b as f64 - 128.0) / 128.0;
            s * s
        })
        .sum();

    let rms = (sum_sq / n).sqrt();
    Some(20.0 * rms.max(SILENCE_FLOOR).log10())
}

/// Accumulates per-packet dBFS samples over a wall-clock window and
/// reduces them to a `LevelReading` once the window elapses.
pub struct Sampler {
    window: Duration,
    window_start: Option<Instant>,
    buffer: Vec<f64>,
    running: bool,
}

impl Sampler {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            window_start: None,
            buffer: Vec::new(),
            running: false,
        }
    }

    pub fn default_2s() -> Self {
        Self::new(Duration::from_secs(2))
    }

    pub fn start(&mut self) {
        self.running = true;
        self.window_start = Some(Instant::now());
        self.buffer.clear();
    }

    /// Releases all resources and clears the buffer (§4.7).
    pub fn stop(&mut self) {
        self.running = false;
        self.window_start = None;
        self.buffer.clear();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Feed one RTP payload in. Returns `Some(reading)` exactly when
    /// this call closed out a window with a non-empty buffer — a packet
    /// that merely starts the next window never emits.
    pub fn on_packet(&mut self, payload: &[u8]) -> Option<LevelReading> {
        if !self.running {
            return None;
        }

        let Some(db) = payload_db(payload) else {
            debug!(len = payload.len(), "dropping RTP packet shorter than header");
            return None;
        };

        let start = *self.window_start.get_or_insert_with(Instant::now);
        self.buffer.push(db);

        if start.elapsed() < self.window {
            return None;
        }

        // SampleStarvation (§4): the window elapsed with an empty
        // buffer is unreachable here since we just pushed, but a caller
        // driving the window via a separate tick (no packet) would hit
        // `tick()` below instead.
        let reading = reduce_window(&self.buffer);
        self.buffer.clear();
        self.window_start = Some(Instant::now());
        reading
    }

    /// Drive the window forward on a host-owned timer tick with no
    /// accompanying packet (mirrors `object_tracker`'s motion-sentinel
    /// "no active detections" case: absence of input still must not
    /// silently wedge the window open forever). Per §4.7's
    /// *SampleStarvation* rule, an elapsed empty window suppresses
    /// emission rather than emitting zeros.
    pub fn tick(&mut self) -> Option<LevelReading> {
        if !self.running {
            return None;
        }
        let start = *self.window_start.get_or_insert_with(Instant::now);
        if start.elapsed() < self.window {
            return None;
        }

        self.window_start = Some(Instant::now());
        if self.buffer.is_empty() {
            warn!("audio sampling window elapsed with no packets, suppressing emission");
            return None;
        }

        let reading = reduce_window(&self.buffer);
        self.buffer.clear();
        reading
    }
}

fn reduce_window(buffer: &[f64]) -> Option<LevelReading> {
    if buffer.is_empty() {
        return None;
    }
    let n = buffer.len() as f64;

    let power_sum: f64 = buffer.iter().map(|d| 10f64.powf(d / 10.0)).sum();
    let mean_db = 10.0 * (power_sum / n).log10();

    let arithmetic_mean = buffer.iter().sum::<f64>() / n;
    let variance = buffer.iter().map(|d| (d - arithmetic_mean).powi(2)).sum::<f64>() / n;

    Some(LevelReading {
        d_bfs: mean_db,
        db_std_dev: variance.sqrt(),
    })
}

/// Restart supervisor (§4.7 expansion): owns a `Sampler` plus a
/// generation counter standing in for the "currentForwarder" sentinel
/// from §5. No async runtime, no task handle — just a `u64` the host
/// compares its stale notification against.
pub struct AudioSupervisor {
    sampler: Sampler,
    generation: u64,
}

impl AudioSupervisor {
    pub fn new(sampler: Sampler) -> Self {
        Self { sampler, generation: 0 }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn sampler_mut(&mut self) -> &mut Sampler {
        &mut self.sampler
    }

    /// Stop then start the wrapped sampler, bumping and returning the
    /// new generation id.
    pub fn restart(&mut self) -> u64 {
        self.sampler.stop();
        self.sampler.start();
        self.generation += 1;
        self.generation
    }

    /// Whether a "forwarder ended" notification carrying `generation`
    /// should still be honored — false for any stale generation left
    /// over from a restart that already superseded it.
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    pub fn should_restart(&self, elapsed: Duration, interval: Duration) -> bool {
        elapsed >= interval
    }
}

pub const DEFAULT_RESTART_INTERVAL: Duration = Duration::from_secs(60 * 60);
