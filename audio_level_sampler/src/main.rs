use std::env;
use std::time::{Duration, Instant};

use dora_node_api::{arrow::array::BinaryArray, dora_core::config::DataId, DoraNode, Event};
use eyre::{Context, Result};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use tracker_core::audio::DEFAULT_RESTART_INTERVAL;
use tracker_core::{telemetry, AudioSupervisor, Sampler};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LevelOutput {
    d_bfs: f64,
    db_std_dev: f64,
}

fn main() -> Result<()> {
    let _guard = telemetry::init_tracing();

    info!("Starting audio_level_sampler node");

    let window_seconds: u64 = env::var("WINDOW_SECONDS")
        .ok()
        .map(|v| v.parse().context("invalid WINDOW_SECONDS"))
        .transpose()?
        .unwrap_or(2);

    let restart_interval: Duration = env::var("RESTART_INTERVAL_SECONDS")
        .ok()
        .map(|v| v.parse::<u64>().context("invalid RESTART_INTERVAL_SECONDS"))
        .transpose()?
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RESTART_INTERVAL);

    info!(window_seconds, restart_interval_secs = restart_interval.as_secs(), "sampler configured");

    let mut supervisor = AudioSupervisor::new(Sampler::new(Duration::from_secs(window_seconds)));
    supervisor.sampler_mut().start();
    let mut last_restart = Instant::now();

    let (mut node, mut events) = DoraNode::init_from_env()?;
    info!("Dora node initialized");

    while let Some(event) = events.recv() {
        match event {
            Event::Input { id, data, .. } => match id.as_str() {
                "rtp" => {
                    let Some(array) = data.as_any().downcast_ref::<BinaryArray>() else {
                        error!("failed to cast rtp input to BinaryArray");
                        continue;
                    };
                    let payload = array.value(0);
                    if let Some(reading) = supervisor.sampler_mut().on_packet(payload) {
                        emit_reading(&mut node, reading.d_bfs, reading.db_std_dev)?;
                    }
                }
                "tick" => {
                    if let Some(reading) = supervisor.sampler_mut().tick() {
                        emit_reading(&mut node, reading.d_bfs, reading.db_std_dev)?;
                    }

                    if supervisor.should_restart(last_restart.elapsed(), restart_interval) {
                        let generation = supervisor.restart();
                        last_restart = Instant::now();
                        info!(generation, "restarted audio source on supervisory interval");
                    }
                }
                other => warn!(input = other, "received unexpected input"),
            },
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
    }

    supervisor.sampler_mut().stop();
    info!("audio level sampler node shutting down");
    Ok(())
}

fn emit_reading(node: &mut DoraNode, d_bfs: f64, db_std_dev: f64) -> Result<()> {
    let output = LevelOutput { d_bfs, db_std_dev };
    let json = serde_json::to_vec(&output)?;
    let data = BinaryArray::from_vec(vec![json.as_slice()]);
    node.send_output(DataId::from("audio_level".to_owned()), Default::default(), data)?;
    debug!(d_bfs, db_std_dev, "emitted audio level reading");
    Ok(())
}
