use std::env;

use dora_node_api::{arrow::array::BinaryArray, dora_core::config::DataId, DoraNode, Event};
use eyre::{Context, Result};
use tracing::{debug, error, info, warn};

use tracker_core::config::Settings;
use tracker_core::{telemetry, Frame, SessionWatchdog, TrackerConfig, Tracker};

fn env_u32(key: &str, default: u32) -> Result<u32> {
    match env::var(key) {
        Ok(v) => v.parse::<u32>().context(format!("invalid {key}")),
        Err(_) => Ok(default),
    }
}

fn env_f64(key: &str, default: f64) -> Result<f64> {
    match env::var(key) {
        Ok(v) => v.parse::<f64>().context(format!("invalid {key}")),
        Err(_) => Ok(default),
    }
}

fn env_bool(key: &str, default: bool) -> Result<bool> {
    match env::var(key) {
        Ok(v) => v.parse::<bool>().context(format!("invalid {key}")),
        Err(_) => Ok(default),
    }
}

fn config_from_env() -> Result<TrackerConfig> {
    let mut config = TrackerConfig::default();
    config.max_misses = env_u32("MAX_MISSES", config.max_misses)?;
    config.max_lost_frames = env_u32("MAX_LOST_FRAMES", config.max_lost_frames)?;
    config.use_matrix = env_bool("USE_MATRIX_ASSOCIATION", config.use_matrix)?;
    config.class_defaults.iou_threshold = env_f64("IOU_THRESHOLD", config.class_defaults.iou_threshold)?;
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let _guard = telemetry::init_tracing();

    info!("Starting object_tracker node");

    let config = config_from_env()?;
    info!(
        max_misses = config.max_misses,
        max_lost_frames = config.max_lost_frames,
        use_matrix = config.use_matrix,
        iou_threshold = config.class_defaults.iou_threshold,
        "tracker configured"
    );

    let mut tracker = Tracker::new(config);
    let mut watchdog = SessionWatchdog::default_30s();
    let mut settings: Settings = Settings::new();

    let (mut node, mut events) = DoraNode::init_from_env()?;
    info!("Dora node initialized");

    while let Some(event) = events.recv() {
        match event {
            Event::Input { id, data, .. } => {
                watchdog.touch();
                match id.as_str() {
                    "detections" => {
                        let Some(array) = data.as_any().downcast_ref::<BinaryArray>() else {
                            error!("failed to cast detections to BinaryArray");
                            continue;
                        };
                        let frame: Frame = match serde_json::from_slice(array.value(0)) {
                            Ok(frame) => frame,
                            Err(e) => {
                                error!(error = %e, "failed to deserialize frame");
                                continue;
                            }
                        };

                        debug!(count = frame.detections.len(), "received detections");

                        let result = tracker.update(&frame, &settings, false);
                        let result_json = serde_json::to_vec(&result)?;
                        let result_data = BinaryArray::from_vec(vec![result_json.as_slice()]);
                        node.send_output(
                            DataId::from("tracked_detections".to_owned()),
                            Default::default(),
                            result_data,
                        )?;

                        debug!(
                            active = result.active.len(),
                            pending = result.pending.len(),
                            detection_id = ?result.detection_id,
                            "sent tracking update"
                        );
                    }
                    "settings" => {
                        let Some(array) = data.as_any().downcast_ref::<BinaryArray>() else {
                            error!("failed to cast settings to BinaryArray");
                            continue;
                        };
                        match serde_json::from_slice::<Settings>(array.value(0)) {
                            Ok(updated) => {
                                settings = updated;
                                info!("settings update applied, effective next frame");
                            }
                            Err(e) => error!(error = %e, "failed to deserialize settings"),
                        }
                    }
                    other => warn!(input = other, "received unexpected input"),
                }
            }
            Event::InputClosed { id } => {
                info!(input = %id, "input closed");
                break;
            }
            Event::Stop(_) => {
                info!("received stop signal");
                break;
            }
            other => {
                debug!(?other, "received other event");
            }
        }

        if watchdog.is_hung() {
            warn!("session hung, no input observed within timeout");
            break;
        }
    }

    info!(
        session_id = tracker.session_id(),
        frames = tracker.current_frame(),
        "object tracker node shutting down"
    );
    Ok(())
}
