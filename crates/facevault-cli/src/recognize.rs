//! Live recognition loop: camera frames in, names out.

use crate::config::Config;
use anyhow::{Context, Result};
use facevault_core::{identify_faces, EuclideanMatcher, OnnxEmbedder, ScrfdDetector};
use facevault_hw::Camera;
use facevault_store::SqliteStore;

/// Captures allowed per frame before giving up on a dark scene.
const MAX_DARK_ATTEMPTS: usize = 10;

/// Run until interrupted, or until `frame_limit` frames have been processed.
pub fn run(config: &Config, frame_limit: Option<usize>) -> Result<()> {
    let target = config.store_target();
    let gallery = SqliteStore
        .load_all(&target)
        .with_context(|| format!("loading records from {target}"))?;
    if gallery.is_empty() {
        tracing::warn!(
            %target,
            "no faces enrolled; every face will be reported as unknown"
        );
    }
    tracing::info!(records = gallery.len(), "gallery loaded");

    let mut detector = ScrfdDetector::load(&config.detector_model_path())?;
    let mut embedder = OnnxEmbedder::load(&config.encoder_model_path())?;

    let camera = Camera::open(&config.camera_device)?;
    let mut stream = camera.stream()?;
    stream.warm_up(config.warmup_frames)?;

    println!(
        "Recognizing faces from {} (Ctrl-C to stop)",
        config.camera_device
    );

    let mut processed = 0usize;
    while frame_limit.map_or(true, |limit| processed < limit) {
        processed += 1;

        let (frame, dark_skipped) = stream.next_lit_frame(MAX_DARK_ATTEMPTS)?;
        let Some(frame) = frame else {
            tracing::warn!(dark_skipped, "no usable frame; scene too dark");
            continue;
        };

        let faces = identify_faces(
            &mut detector,
            &mut embedder,
            &EuclideanMatcher,
            &frame.image,
            &gallery,
            config.match_tolerance,
        )?;

        if faces.is_empty() {
            tracing::debug!(seq = frame.sequence, "no faces in frame");
            continue;
        }

        let labels: Vec<String> = faces
            .iter()
            .map(|face| match &face.name {
                Some(name) => format!("{name} ({:.2})", face.distance),
                None => "Unknown".to_string(),
            })
            .collect();
        println!("frame {}: {}", frame.sequence, labels.join(", "));
    }

    Ok(())
}
