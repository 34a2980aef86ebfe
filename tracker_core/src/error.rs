//! The one slice of §7's error taxonomy that is actually a `Result`
//! boundary: construction-time failures. The rest of the taxonomy
//! (`MalformedInput`, `HungSession`, `SampleStarvation`,
//! `ConnectionTermination`) is deterministic control flow, not an `Err`
//! — see SPEC_FULL.md §7.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// The detector generator (or, for the sampler, the packet source)
    /// was not available at construction time.
    #[error("upstream source unavailable: {0}")]
    UnavailableUpstream(String),

    /// A supervisory restart was asked to stop a forwarder that had
    /// already terminated under a different generation.
    #[error("connection already terminated: {0}")]
    ConnectionTermination(String),
}
