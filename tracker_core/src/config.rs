//! Construction config, per-class parameters, and the free-form `settings`
//! map described in §6. Loadable from TOML the same way the teacher's
//! `ArmConfig`/`SimulationConfig` are (`load_from_file`).

use std::collections::{HashMap, HashSet};
use std::fs;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TrackerError;

/// Free-form settings map from §6: `enabledClasses`, `{className}-*`
/// per-class overrides, and `basicDetectionsOnly`.
pub type Settings = HashMap<String, Value>;

/// Per-class thresholds (§3). Defaults match the spec's documented
/// defaults exactly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerClassParameters {
    pub min_score: f64,
    pub min_confirmation_frames: u32,
    pub iou_threshold: f64,
    pub movement_threshold: f64,
}

impl Default for PerClassParameters {
    fn default() -> Self {
        Self {
            min_score: 0.7,
            min_confirmation_frames: 3,
            iou_threshold: 0.5,
            movement_threshold: 10.0,
        }
    }
}

impl PerClassParameters {
    /// Apply the `{className}-*` overrides found in `settings`, falling
    /// back to `self` (the class defaults) for anything absent.
    pub fn resolve(&self, class_name: &str, settings: &Settings) -> Self {
        let mut resolved = *self;

        if let Some(v) = settings
            .get(&format!("{class_name}-minScore"))
            .and_then(Value::as_f64)
        {
            resolved.min_score = v;
        }
        if let Some(v) = settings
            .get(&format!("{class_name}-minConfirmationFrames"))
            .and_then(Value::as_u64)
        {
            resolved.min_confirmation_frames = v as u32;
        }
        if let Some(v) = settings
            .get(&format!("{class_name}-iouThreshold"))
            .and_then(Value::as_f64)
        {
            resolved.iou_threshold = v;
        }
        if let Some(v) = settings
            .get(&format!("{class_name}-movementThreshold"))
            .and_then(Value::as_f64)
        {
            resolved.movement_threshold = v;
        }

        resolved
    }
}

/// Tracker construction config (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerConfig {
    pub max_misses: u32,
    /// Carried for parity with §6's construction config; the spec's
    /// component descriptions (§3-§5) never define its semantics, so it
    /// is stored and surfaced but not consulted by any of A-G (see
    /// DESIGN.md).
    pub max_empty_frames: u32,
    pub max_lost_frames: u32,
    pub use_matrix: bool,
    pub class_defaults: PerClassParameters,
    pub enabled_classes: HashSet<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_misses: 5,
            max_empty_frames: 3,
            max_lost_frames: 40,
            use_matrix: false,
            class_defaults: PerClassParameters::default(),
            enabled_classes: HashSet::new(),
        }
    }
}

impl TrackerConfig {
    pub fn load_from_file(path: &str) -> Result<Self, TrackerError> {
        let content =
            fs::read_to_string(path).map_err(|e| TrackerError::UnavailableUpstream(e.to_string()))?;
        let config: Self =
            toml::from_str(&content).map_err(|e| TrackerError::UnavailableUpstream(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        if !(30..=50).contains(&self.max_lost_frames) {
            tracing::warn!(
                max_lost_frames = self.max_lost_frames,
                "maxLostFrames outside the documented [30, 50] range"
            );
        }
        if self.max_misses == 0 {
            return Err(TrackerError::UnavailableUpstream(
                "maxMisses must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// `enabledClasses` as overridden by `settings`, falling back to the
    /// config's own `enabled_classes`.
    pub fn enabled_classes<'a>(&'a self, settings: &'a Settings) -> HashSet<String> {
        match settings.get("enabledClasses").and_then(Value::as_array) {
            Some(list) => list
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            None => self.enabled_classes.clone(),
        }
    }

    /// Whether `settings` requests bypassing the tracker (§4.6, §6).
    pub fn basic_detections_only(&self, settings: &Settings) -> bool {
        settings
            .get("basicDetectionsOnly")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_per_class_override_applies_only_named_class() {
        let defaults = PerClassParameters::default();
        let mut settings = Settings::new();
        settings.insert("person-minScore".to_string(), json!(0.9));

        let person = defaults.resolve("person", &settings);
        let car = defaults.resolve("car", &settings);

        assert_eq!(person.min_score, 0.9);
        assert_eq!(car.min_score, defaults.min_score);
    }

    #[test]
    fn test_basic_detections_only_reads_settings_key() {
        let config = TrackerConfig::default();
        let mut settings = Settings::new();
        assert!(!config.basic_detections_only(&settings));
        settings.insert("basicDetectionsOnly".to_string(), json!(true));
        assert!(config.basic_detections_only(&settings));
    }
}
