//! Stream construction from a rig blueprint

use contracts::{CameraConfig, FrameSource, RigBlueprint, SourceConfig, StreamConfig};
use tracing::{debug, info, instrument};

use crate::error::{IngestionError, Result};
use crate::mock::{MockCamera, MockCameraConfig};
use crate::playback::PlaybackSource;
use crate::stream::CameraStream;

/// Build the frame source a camera is configured with
pub fn open_source(camera: &CameraConfig) -> Result<Box<dyn FrameSource>> {
    if !(camera.fps > 0.0) || camera.resolution.contains(&0) {
        return Err(IngestionError::InvalidCamera {
            port: camera.port,
            message: format!(
                "fps {} / resolution {:?} not usable",
                camera.fps, camera.resolution
            ),
        });
    }

    let source: Box<dyn FrameSource> = match &camera.source {
        SourceConfig::Mock {
            skip_every,
            fail_after,
            jitter_ms,
        } => Box::new(MockCamera::new(MockCameraConfig {
            profile: camera.profile(),
            skip_every: *skip_every,
            fail_after: *fail_after,
            jitter_ms: *jitter_ms,
        })),
        SourceConfig::Playback { directory, speed } => Box::new(PlaybackSource::open(
            directory,
            camera.port,
            *speed,
            camera.rotation_count,
        )?),
    };
    debug!(port = %camera.port, source = ?camera.source, "frame source opened");
    Ok(source)
}

/// Build one (not yet started) stream per configured camera, in config order
#[instrument(name = "ingestion_build_streams", skip(blueprint), fields(cameras = blueprint.cameras.len()))]
pub fn build_streams(blueprint: &RigBlueprint) -> Result<Vec<CameraStream>> {
    let config = StreamConfig::from(blueprint);
    let streams = blueprint
        .cameras
        .iter()
        .map(|camera| open_source(camera).map(|source| CameraStream::new(source, config)))
        .collect::<Result<Vec<_>>>()?;
    info!(count = streams.len(), capacity = config.delivery_capacity, "camera streams built");
    Ok(streams)
}
