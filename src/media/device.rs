use super::frame::RawFrame;
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// Audio sample data from a microphone backend (16-bit PCM, interleaved).
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since the stream started
    pub timestamp_ms: u64,
}

/// Camera capture backend.
///
/// `start` returns a channel receiver of raw frames; `stop` halts the device
/// track. Implementations must make `stop` safe to call more than once.
#[async_trait::async_trait]
pub trait CameraBackend: Send + Sync {
    async fn start(&mut self) -> Result<mpsc::Receiver<RawFrame>>;
    async fn stop(&mut self) -> Result<()>;
    fn is_capturing(&self) -> bool;
    fn name(&self) -> &str;
}

/// Microphone capture backend. Same contract as [`CameraBackend`] but for
/// short PCM increments.
#[async_trait::async_trait]
pub trait MicrophoneBackend: Send + Sync {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioChunk>>;
    async fn stop(&mut self) -> Result<()>;
    fn is_capturing(&self) -> bool;
    fn name(&self) -> &str;
}

/// Where a video stream comes from.
#[derive(Debug, Clone)]
pub enum VideoSource {
    /// Synthetic pattern generator (headless runs, tests)
    Synthetic(SyntheticVideoSpec),
    /// Simulates a denied camera permission
    Denied,
}

impl Default for VideoSource {
    fn default() -> Self {
        Self::Synthetic(SyntheticVideoSpec::default())
    }
}

/// Where an audio stream comes from.
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// Synthetic tone generator (headless runs, tests)
    Synthetic(SyntheticAudioSpec),
    /// Simulates a denied microphone permission
    Denied,
}

impl Default for AudioSource {
    fn default() -> Self {
        Self::Synthetic(SyntheticAudioSpec::default())
    }
}

/// Shape of the synthetic camera output.
#[derive(Debug, Clone)]
pub struct SyntheticVideoSpec {
    pub width: u32,
    pub height: u32,
    /// Interval between produced frames
    pub frame_interval: Duration,
}

impl Default for SyntheticVideoSpec {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            frame_interval: Duration::from_millis(100),
        }
    }
}

/// Shape of the synthetic microphone output.
#[derive(Debug, Clone)]
pub struct SyntheticAudioSpec {
    pub sample_rate: u32,
    pub channels: u16,
    /// Interval between produced chunks
    pub chunk_interval: Duration,
    /// Tone frequency in Hz
    pub tone_hz: f32,
}

impl Default for SyntheticAudioSpec {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            chunk_interval: Duration::from_millis(100),
            tone_hz: 440.0,
        }
    }
}

/// Device backend factory.
pub struct DeviceFactory;

impl DeviceFactory {
    pub fn camera(source: &VideoSource) -> Result<Box<dyn CameraBackend>> {
        match source {
            VideoSource::Synthetic(spec) => Ok(Box::new(SyntheticCamera::new(spec.clone()))),
            VideoSource::Denied => Err(Error::Permission("camera access denied".to_string())),
        }
    }

    pub fn microphone(source: &AudioSource) -> Result<Box<dyn MicrophoneBackend>> {
        match source {
            AudioSource::Synthetic(spec) => Ok(Box::new(SyntheticMicrophone::new(spec.clone()))),
            AudioSource::Denied => Err(Error::Permission("microphone access denied".to_string())),
        }
    }
}

/// Synthetic camera producing a moving gradient pattern.
pub struct SyntheticCamera {
    spec: SyntheticVideoSpec,
    running: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl SyntheticCamera {
    pub fn new(spec: SyntheticVideoSpec) -> Self {
        Self {
            spec,
            running: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    fn pattern_frame(spec: &SyntheticVideoSpec, tick: u64) -> RawFrame {
        let mut pixels = Vec::with_capacity((spec.width * spec.height * 3) as usize);
        for y in 0..spec.height {
            for x in 0..spec.width {
                pixels.push(((x as u64 + tick) % 256) as u8);
                pixels.push((y % 256) as u8);
                pixels.push(((tick * 7) % 256) as u8);
            }
        }
        RawFrame {
            pixels,
            width: spec.width,
            height: spec.height,
            timestamp_ms: tick * spec.frame_interval.as_millis() as u64,
        }
    }
}

#[async_trait::async_trait]
impl CameraBackend for SyntheticCamera {
    async fn start(&mut self) -> Result<mpsc::Receiver<RawFrame>> {
        let (tx, rx) = mpsc::channel(16);
        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let spec = self.spec.clone();
        self.task = Some(tokio::spawn(async move {
            let mut tick: u64 = 0;
            while running.load(Ordering::SeqCst) {
                let frame = SyntheticCamera::pattern_frame(&spec, tick);
                if tx.send(frame).await.is_err() {
                    break; // receiver dropped
                }
                tick += 1;
                tokio::time::sleep(spec.frame_interval).await;
            }
        }));

        info!("Synthetic camera started ({}x{})", self.spec.width, self.spec.height);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "synthetic-camera"
    }
}

/// Synthetic microphone producing a low-amplitude sine tone.
pub struct SyntheticMicrophone {
    spec: SyntheticAudioSpec,
    running: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl SyntheticMicrophone {
    pub fn new(spec: SyntheticAudioSpec) -> Self {
        Self {
            spec,
            running: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    fn tone_chunk(spec: &SyntheticAudioSpec, tick: u64) -> AudioChunk {
        let samples_per_chunk = (spec.sample_rate as u128 * spec.chunk_interval.as_millis()
            / 1000) as usize
            * spec.channels as usize;
        let start = tick as usize * samples_per_chunk;

        let mut samples = Vec::with_capacity(samples_per_chunk);
        for i in 0..samples_per_chunk {
            let t = (start + i) as f32 / spec.sample_rate as f32;
            let value = (t * spec.tone_hz * 2.0 * std::f32::consts::PI).sin() * 3000.0;
            samples.push(value as i16);
        }

        AudioChunk {
            samples,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            timestamp_ms: tick * spec.chunk_interval.as_millis() as u64,
        }
    }
}

#[async_trait::async_trait]
impl MicrophoneBackend for SyntheticMicrophone {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioChunk>> {
        let (tx, rx) = mpsc::channel(64);
        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let spec = self.spec.clone();
        self.task = Some(tokio::spawn(async move {
            let mut tick: u64 = 0;
            while running.load(Ordering::SeqCst) {
                let chunk = SyntheticMicrophone::tone_chunk(&spec, tick);
                if tx.send(chunk).await.is_err() {
                    break;
                }
                tick += 1;
                tokio::time::sleep(spec.chunk_interval).await;
            }
        }));

        info!("Synthetic microphone started ({} Hz)", self.spec.sample_rate);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "synthetic-microphone"
    }
}
