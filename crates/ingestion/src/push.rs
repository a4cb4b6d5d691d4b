//! Externally driven frame source
//!
//! For capture loops owned by someone else (a device driver thread, a UI, a
//! test): the owner keeps a [`PushHandle`] and hands frames in as they arrive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use contracts::{
    unix_seconds, CameraId, CameraProfile, CapturedFrame, ContractError, FrameCallback,
    FrameSource, ImageData,
};

#[derive(Default)]
struct PushShared {
    callback: Mutex<Option<FrameCallback>>,
    listening: AtomicBool,
}

/// Frame source fed through a [`PushHandle`]
pub struct PushSource {
    profile: CameraProfile,
    shared: Arc<PushShared>,
}

/// Producer side of a [`PushSource`]
#[derive(Clone)]
pub struct PushHandle {
    port: CameraId,
    shared: Arc<PushShared>,
}

impl PushSource {
    /// Create a source and its handle
    pub fn new(profile: CameraProfile) -> (Self, PushHandle) {
        let shared = Arc::new(PushShared::default());
        (
            Self {
                profile,
                shared: Arc::clone(&shared),
            },
            PushHandle {
                port: profile.port,
                shared,
            },
        )
    }
}

impl PushHandle {
    fn callback(&self) -> Option<FrameCallback> {
        if !self.shared.listening.load(Ordering::Acquire) {
            return None;
        }
        self.shared
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Hand in a frame; returns `false` when nobody is listening
    pub fn push(&self, image: ImageData, timestamp: f64) -> bool {
        match self.callback() {
            Some(callback) => {
                callback(Ok(CapturedFrame { image, timestamp }));
                true
            }
            None => false,
        }
    }

    /// Hand in a frame stamped with the current wall-clock time
    pub fn push_now(&self, image: ImageData) -> bool {
        self.push(image, unix_seconds())
    }

    /// Report that the camera is gone for good
    pub fn disconnect(&self, message: impl Into<String>) {
        if let Some(callback) = self.callback() {
            callback(Err(ContractError::source_disconnected(self.port, message)));
        }
        self.shared.listening.store(false, Ordering::Release);
    }

    /// Whether the stream is listening
    pub fn is_listening(&self) -> bool {
        self.shared.listening.load(Ordering::Acquire)
    }
}

impl FrameSource for PushSource {
    fn port(&self) -> CameraId {
        self.profile.port
    }

    fn profile(&self) -> CameraProfile {
        self.profile
    }

    fn listen(&self, callback: FrameCallback) {
        let mut slot = self
            .shared
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(callback);
        }
        self.shared.listening.store(true, Ordering::Release);
    }

    fn stop(&self) {
        self.shared.listening.store(false, Ordering::Release);
    }

    fn is_listening(&self) -> bool {
        self.shared.listening.load(Ordering::Acquire)
    }
}
