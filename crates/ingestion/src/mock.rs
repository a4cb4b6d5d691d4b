//! Mock 相机源
//!
//! 用于无硬件环境的测试与演示：按配置帧率在独立线程上生成移动渐变的 BGR 帧。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use contracts::{
    unix_seconds, CameraId, CameraProfile, CapturedFrame, ContractError, FrameCallback,
    FrameSource, ImageData, PixelFormat,
};
use rand::Rng;
use tracing::{debug, trace};

/// Mock 相机配置
#[derive(Debug, Clone)]
pub struct MockCameraConfig {
    /// 帧率与分辨率
    pub profile: CameraProfile,

    /// 每 n 个采集槽跳过一个
    pub skip_every: Option<u32>,

    /// 产生 n 帧后断开
    pub fail_after: Option<u64>,

    /// 时间戳抖动幅度 (毫秒)
    pub jitter_ms: f64,
}

impl MockCameraConfig {
    /// 按给定帧率与分辨率创建，无跳帧、无断开、无抖动
    pub fn new(port: u32, fps: f64, width: u32, height: u32) -> Self {
        Self {
            profile: CameraProfile {
                port: CameraId::new(port),
                fps,
                width,
                height,
                rotation_count: 0,
            },
            skip_every: None,
            fail_after: None,
            jitter_ms: 0.0,
        }
    }
}

/// Mock 相机源
pub struct MockCamera {
    config: MockCameraConfig,
    listening: Arc<AtomicBool>,
}

impl MockCamera {
    /// 创建新的 Mock 相机
    pub fn new(config: MockCameraConfig) -> Self {
        Self {
            config,
            listening: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// 第 `slot` 个采集槽是否跳过
fn skipped(slot: u64, skip_every: Option<u32>) -> bool {
    match skip_every {
        Some(n) if n > 1 => slot % n as u64 == n as u64 - 1,
        _ => false,
    }
}

/// 生成一帧移动渐变 (BGR)
fn gradient_frame(width: u32, height: u32, phase: u64) -> ImageData {
    let shift = (phase * 4) as usize;
    let mut data = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height as usize {
        let green = (y * 255 / height.max(1) as usize) as u8;
        for x in 0..width as usize {
            data.push(((x + shift) % 256) as u8);
            data.push(green);
            data.push((phase % 256) as u8);
        }
    }
    ImageData::new(width, height, PixelFormat::Bgr8, Bytes::from(data))
}

impl FrameSource for MockCamera {
    fn port(&self) -> CameraId {
        self.config.profile.port
    }

    fn profile(&self) -> CameraProfile {
        self.config.profile
    }

    fn listen(&self, callback: FrameCallback) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let config = self.config.clone();
        let listening = self.listening.clone();
        let port = config.profile.port;
        let on_spawn_error = Arc::clone(&callback);

        let spawned = std::thread::Builder::new()
            .name(format!("mock-cam-{port}"))
            .spawn(move || {
                let interval = Duration::from_secs_f64(1.0 / config.profile.fps);
                let mut rng = rand::rng();
                let mut next_slot = Instant::now();
                let mut emitted: u64 = 0;

                debug!(port = %port, fps = config.profile.fps, "mock camera started");

                for slot in 0u64.. {
                    if !listening.load(Ordering::Relaxed) {
                        break;
                    }

                    if let Some(limit) = config.fail_after {
                        if emitted >= limit {
                            callback(Err(ContractError::source_disconnected(
                                port,
                                format!("mock camera failed after {limit} frames"),
                            )));
                            listening.store(false, Ordering::SeqCst);
                            break;
                        }
                    }

                    if !skipped(slot, config.skip_every) {
                        let jitter = if config.jitter_ms > 0.0 {
                            rng.random_range(-config.jitter_ms..=config.jitter_ms) / 2000.0
                        } else {
                            0.0
                        };
                        let image =
                            gradient_frame(config.profile.width, config.profile.height, slot);
                        callback(Ok(CapturedFrame {
                            image,
                            timestamp: unix_seconds() + jitter,
                        }));
                        emitted += 1;
                        trace!(port = %port, slot, "mock frame emitted");
                    }

                    next_slot += interval;
                    let now = Instant::now();
                    if next_slot > now {
                        std::thread::sleep(next_slot - now);
                    } else {
                        next_slot = now;
                    }
                }

                debug!(port = %port, emitted, "mock camera stopped");
            });

        if let Err(e) = spawned {
            self.listening.store(false, Ordering::SeqCst);
            on_spawn_error(Err(ContractError::source_disconnected(
                port,
                format!("failed to spawn capture thread: {e}"),
            )));
        }
    }

    fn stop(&self) {
        self.listening.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn collect(camera: &MockCamera) -> Arc<Mutex<Vec<Result<CapturedFrame, ContractError>>>> {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = frames.clone();
        camera.listen(Arc::new(move |frame| sink.lock().unwrap().push(frame)));
        frames
    }

    #[test]
    fn test_skip_pattern() {
        let slots: Vec<bool> = (0..6).map(|s| skipped(s, Some(2))).collect();
        assert_eq!(slots, vec![false, true, false, true, false, true]);
        assert!(!skipped(5, None));
        assert!(!skipped(5, Some(1)));
    }

    #[test]
    fn test_gradient_frame_shape() {
        let frame = gradient_frame(16, 8, 3);
        assert_eq!(frame.format, PixelFormat::Bgr8);
        assert!(frame.is_well_formed());
        assert_ne!(gradient_frame(16, 8, 4).data, frame.data);
    }

    #[test]
    fn test_mock_camera_emits_frames() {
        let camera = MockCamera::new(MockCameraConfig::new(0, 200.0, 8, 6));
        let frames = collect(&camera);
        assert!(camera.is_listening());

        std::thread::sleep(Duration::from_millis(60));
        camera.stop();
        assert!(!camera.is_listening());
        std::thread::sleep(Duration::from_millis(20));

        let frames = frames.lock().unwrap();
        assert!(frames.len() >= 3, "only {} frames", frames.len());
        let first = frames[0].as_ref().unwrap();
        assert_eq!(first.image.size(), (8, 6));
        assert!(first.timestamp > 0.0);
    }

    #[test]
    fn test_mock_camera_fails_after_limit() {
        let mut config = MockCameraConfig::new(4, 500.0, 4, 4);
        config.fail_after = Some(3);
        let camera = MockCamera::new(config);
        let frames = collect(&camera);

        std::thread::sleep(Duration::from_millis(100));
        assert!(!camera.is_listening());

        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 4);
        assert!(frames[..3].iter().all(Result::is_ok));
        assert!(matches!(
            frames[3],
            Err(ContractError::SourceDisconnected { .. })
        ));
    }
}
