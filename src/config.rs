use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Remote evaluator endpoint settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluatorConfig {
    /// Base URL of the evaluator service (routes live under /api/interview).
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 120, // audio transcription can be slow
        }
    }
}

/// Capture pipeline tunables.
///
/// Every duration is configuration rather than a constant so integration
/// tests can run the real timer paths at millisecond scale.
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// Interval between frame samples in milliseconds (default: 3000)
    pub frame_interval_ms: u64,
    /// Sliding window size for sampled frames (default: 3)
    pub frame_window: usize,
    /// Audio accumulation increment in milliseconds (default: 1000)
    pub audio_chunk_ms: u64,
    /// Fixed off-screen buffer width frames are downscaled into
    pub frame_width: u32,
    /// Fixed off-screen buffer height frames are downscaled into
    pub frame_height: u32,
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
    /// How long to wait for devices to start producing data after acquisition
    pub warmup_timeout_ms: u64,
    /// Sample rate the microphone backend is asked for
    pub sample_rate: u32,
    /// Channel count the microphone backend is asked for (1 = mono)
    pub channels: u16,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 3000,
            frame_window: 3,
            audio_chunk_ms: 1000,
            frame_width: 320,
            frame_height: 240,
            jpeg_quality: 70,
            warmup_timeout_ms: 2000,
            sample_rate: 16000,
            channels: 1,
        }
    }
}

impl CaptureConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn audio_chunk(&self) -> Duration {
        Duration::from_millis(self.audio_chunk_ms)
    }

    pub fn warmup_timeout(&self) -> Duration {
        Duration::from_millis(self.warmup_timeout_ms)
    }
}

/// Timed recording controller tunables.
#[derive(Debug, Clone, Deserialize)]
pub struct RecorderConfig {
    /// Where the pre-recording countdown starts (default: 3, as in 3-2-1)
    pub countdown_from: u32,
    /// Length of one countdown step in milliseconds (default: 1000)
    pub countdown_tick_ms: u64,
    /// Length of one answer-timer step in milliseconds (default: 1000)
    pub answer_tick_ms: u64,
    /// Answer time limit when the question does not carry one, in seconds
    pub default_time_limit_secs: u32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            countdown_from: 3,
            countdown_tick_ms: 1000,
            answer_tick_ms: 1000,
            default_time_limit_secs: 60,
        }
    }
}

impl RecorderConfig {
    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms)
    }

    pub fn answer_tick(&self) -> Duration {
        Duration::from_millis(self.answer_tick_ms)
    }
}

/// Session-level defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// How many questions to request from the evaluator
    pub question_count: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { question_count: 5 }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
