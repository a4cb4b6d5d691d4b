//! DisplaySink - turns bundles into display-ready RGB frames
//!
//! Frames leave through a bounded channel with `try_send`, so a slow UI only
//! loses frames and never stalls the subscription.

use std::collections::HashMap;

use image::imageops::{self, FilterType};
use image::RgbImage;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, instrument, trace};

use contracts::{BundleSink, CameraId, CameraProfile, ContractError, FrameRecord, SyncBundle};
use session_io::to_rgb_image;

/// One frame ready to show
#[derive(Debug, Clone)]
pub struct DisplayFrame {
    pub port: CameraId,
    pub sync_index: u64,
    pub frame_index: u64,
    pub image: RgbImage,
}

/// Which cameras to emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplaySelection {
    #[default]
    All,
    Port(CameraId),
}

impl DisplaySelection {
    fn includes(self, port: CameraId) -> bool {
        match self {
            Self::All => true,
            Self::Port(selected) => selected == port,
        }
    }
}

/// Display options
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayOptions {
    pub selection: DisplaySelection,
    /// Fit into an `edge × edge` square, keeping the aspect ratio
    pub edge_length: Option<u32>,
    /// Mirror horizontally after rotation (selfie-style preview)
    pub mirror: bool,
}

/// Sink emitting [`DisplayFrame`]s
pub struct DisplaySink {
    name: String,
    options: DisplayOptions,
    rotations: HashMap<CameraId, i32>,
    tx: mpsc::Sender<DisplayFrame>,
    emitted: u64,
    dropped: u64,
}

impl DisplaySink {
    /// Create the sink and the receiving end for the UI
    pub fn new(
        name: impl Into<String>,
        cameras: &[CameraProfile],
        options: DisplayOptions,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<DisplayFrame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rotations = cameras
            .iter()
            .map(|profile| (profile.port, profile.rotation_count))
            .collect();
        (
            Self {
                name: name.into(),
                options,
                rotations,
                tx,
                emitted: 0,
                dropped: 0,
            },
            rx,
        )
    }

    /// Frames handed to the UI
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Frames lost to a full channel
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn render(&self, record: &FrameRecord) -> Result<RgbImage, ContractError> {
        let image = to_rgb_image(&record.frame)
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        let rotation = self.rotations.get(&record.port).copied().unwrap_or(0);
        let mut image = rotate(image, rotation);
        if self.options.mirror {
            imageops::flip_horizontal_in_place(&mut image);
        }
        if let Some(edge) = self.options.edge_length {
            image = fit_square(&image, edge);
        }
        Ok(image)
    }
}

/// Apply quarter turns; positive counts turn clockwise
pub fn rotate(image: RgbImage, rotation_count: i32) -> RgbImage {
    match rotation_count.rem_euclid(4) {
        1 => imageops::rotate90(&image),
        2 => imageops::rotate180(&image),
        3 => imageops::rotate270(&image),
        _ => image,
    }
}

fn fit_square(image: &RgbImage, edge: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    if edge == 0 || w == 0 || h == 0 {
        return image.clone();
    }
    let scale = f64::from(edge) / f64::from(w.max(h));
    let width = ((f64::from(w) * scale).round() as u32).max(1);
    let height = ((f64::from(h) * scale).round() as u32).max(1);
    imageops::resize(image, width, height, FilterType::Triangle)
}

impl BundleSink for DisplaySink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "display_sink_write",
        skip(self, bundle),
        fields(sink = %self.name, sync_index = bundle.sync_index)
    )]
    async fn write(&mut self, bundle: &SyncBundle) -> Result<(), ContractError> {
        let selection = self.options.selection;
        for record in bundle.present().filter(|r| selection.includes(r.port)) {
            let frame = DisplayFrame {
                port: record.port,
                sync_index: bundle.sync_index,
                frame_index: record.frame_index,
                image: self.render(record)?,
            };
            match self.tx.try_send(frame) {
                Ok(()) => self.emitted += 1,
                Err(TrySendError::Full(frame)) => {
                    self.dropped += 1;
                    trace!(port = %frame.port, "display channel full, frame dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    return Err(ContractError::sink_write(&self.name, "display receiver closed"));
                }
            }
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "display_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(
            sink = %self.name,
            emitted = self.emitted,
            dropped = self.dropped,
            "DisplaySink closed"
        );
        Ok(())
    }
}
