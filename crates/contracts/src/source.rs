//! FrameSource trait - camera capture abstraction
//!
//! Decouples the camera stream from concrete capture back-ends. Real devices,
//! synthetic cameras and recorded sessions all implement the same interface.

use std::sync::Arc;

use crate::{CameraId, CameraProfile, CapturedFrame, ContractError};

/// Frame callback type
///
/// `Ok` carries a freshly captured frame. `Err` means the source is gone and
/// will not call again.
pub type FrameCallback = Arc<dyn Fn(Result<CapturedFrame, ContractError>) + Send + Sync>;

/// Camera frame source
///
/// Sources produce frames at their own pace on their own thread and push them
/// through the registered callback.
///
/// # Example
///
/// ```ignore
/// let source: Box<dyn FrameSource> = get_source();
/// source.listen(Arc::new(|frame| {
///     if let Ok(frame) = frame {
///         println!("{}x{}", frame.image.width, frame.image.height);
///     }
/// }));
/// source.stop();
/// ```
pub trait FrameSource: Send + Sync {
    /// Camera port
    fn port(&self) -> CameraId;

    /// Configured rate and resolution
    fn profile(&self) -> CameraProfile;

    /// Register the frame callback and start capturing
    ///
    /// Calling again while already listening is a no-op.
    fn listen(&self, callback: FrameCallback);

    /// Stop capturing
    fn stop(&self);

    /// Check if currently listening
    fn is_listening(&self) -> bool;
}
