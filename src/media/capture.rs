use super::device::{AudioSource, DeviceFactory, VideoSource};
use super::frame::{EncodedFrame, FrameEncoder, FrameWindow, RawFrame};
use crate::cancel::CancelToken;
use crate::config::CaptureConfig;
use crate::error::{Error, Result};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Evidence collected for one answer.
///
/// Mutated only by the capture pipeline and the recording controller; cleared
/// after each submission or on re-record.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    /// Sampled frames, oldest first (never more than the window size)
    pub frames: Vec<EncodedFrame>,
    /// Assembled WAV blob, present only after a confirmed recorder flush
    pub audio_wav: Option<Vec<u8>>,
    /// User-typed transcript; overrides server-side transcription when set
    pub manual_transcript: Option<String>,
}

impl CaptureBuffer {
    pub fn has_audio(&self) -> bool {
        self.audio_wav.as_ref().is_some_and(|b| !b.is_empty())
    }

    pub fn has_transcript(&self) -> bool {
        self.manual_transcript
            .as_ref()
            .is_some_and(|t| !t.trim().is_empty())
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.audio_wav = None;
        self.manual_transcript = None;
    }
}

/// Snapshot of pipeline state, for status surfaces and tests.
#[derive(Debug, Clone)]
pub struct CaptureStats {
    pub acquired: bool,
    pub recording: bool,
    pub audio_available: bool,
    /// Device tracks currently producing data
    pub active_tracks: usize,
    /// Frames pushed into the window since construction
    pub frames_sampled: usize,
    /// Device tracks stopped since construction
    pub released_tracks: usize,
}

enum PumpCommand {
    Start,
    Stop { ack: oneshot::Sender<Vec<i16>> },
}

struct AudioPump {
    task: JoinHandle<()>,
    cmd: mpsc::Sender<PumpCommand>,
}

/// Everything tied to one live acquisition. Dropped as a unit on release so a
/// partially released state is never observable.
struct Acquired {
    camera: Box<dyn super::device::CameraBackend>,
    microphone: Option<Box<dyn super::device::MicrophoneBackend>>,
    feeder: JoinHandle<()>,
    pump: Option<AudioPump>,
    sampler: Option<JoinHandle<()>>,
    token: CancelToken,
}

/// Owns the camera/microphone streams, the preview surface, frame sampling
/// and chunked audio recording.
///
/// Camera and microphone are acquired as two independent requests: a camera
/// failure aborts acquisition, a microphone failure degrades to video-only
/// mode (manual transcript submission remains possible). At most one
/// acquisition is live at a time; acquiring while acquired reuses the
/// existing streams.
pub struct CapturePipeline {
    config: CaptureConfig,
    video_source: VideoSource,
    audio_source: AudioSource,
    encoder: FrameEncoder,

    inner: Mutex<Option<Acquired>>,
    recording: AtomicBool,
    audio_available: AtomicBool,

    window: Arc<StdMutex<FrameWindow>>,
    buffer: StdMutex<CaptureBuffer>,
    preview_tx: Arc<watch::Sender<Option<RawFrame>>>,

    frames_sampled: Arc<AtomicUsize>,
    released_tracks: AtomicUsize,
}

impl CapturePipeline {
    pub fn new(config: CaptureConfig, video_source: VideoSource, audio_source: AudioSource) -> Self {
        let encoder = FrameEncoder::new(config.frame_width, config.frame_height, config.jpeg_quality);
        let (preview_tx, _rx) = watch::channel(None);

        Self {
            window: Arc::new(StdMutex::new(FrameWindow::new(config.frame_window))),
            config,
            video_source,
            audio_source,
            encoder,
            inner: Mutex::new(None),
            recording: AtomicBool::new(false),
            audio_available: AtomicBool::new(false),
            buffer: StdMutex::new(CaptureBuffer::default()),
            preview_tx: Arc::new(preview_tx),
            frames_sampled: Arc::new(AtomicUsize::new(0)),
            released_tracks: AtomicUsize::new(0),
        }
    }

    /// The single live preview surface: the latest raw frame, or `None` when
    /// the streams are released.
    pub fn preview(&self) -> watch::Receiver<Option<RawFrame>> {
        self.preview_tx.subscribe()
    }

    /// Acquire the camera and microphone streams.
    ///
    /// Returns `Ok(true)` on a fresh acquisition, `Ok(false)` when streams
    /// were already live (no-op reuse). Camera failure aborts with
    /// [`Error::Permission`]; microphone failure only disables audio.
    pub async fn acquire(&self) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        if inner.is_some() {
            debug!("Capture streams already acquired, reusing");
            return Ok(false);
        }

        let mut camera = DeviceFactory::camera(&self.video_source)?;
        let mut camera_rx = camera.start().await?;

        let token = CancelToken::new();

        // Feeder keeps the preview surface at the latest live frame.
        let preview_tx = Arc::clone(&self.preview_tx);
        let feeder_token = token.clone();
        let feeder = tokio::spawn(async move {
            loop {
                tokio::select! {
                    maybe = camera_rx.recv() => match maybe {
                        Some(frame) => {
                            preview_tx.send_replace(Some(frame));
                        }
                        None => break,
                    },
                    _ = feeder_token.cancelled() => break,
                }
            }
        });

        // Microphone is a separate request; losing it is not fatal.
        let (microphone, pump) = match DeviceFactory::microphone(&self.audio_source) {
            Ok(mut mic) => match mic.start().await {
                Ok(mic_rx) => {
                    let pump = self.spawn_pump(mic_rx, token.clone());
                    (Some(mic), Some(pump))
                }
                Err(e) => {
                    warn!("Microphone failed to start, continuing video-only: {}", e);
                    (None, None)
                }
            },
            Err(e) => {
                warn!("Microphone unavailable, continuing video-only: {}", e);
                (None, None)
            }
        };

        self.audio_available.store(pump.is_some(), Ordering::SeqCst);

        info!(
            "Capture streams acquired (camera: {}, microphone: {})",
            camera.name(),
            microphone.as_ref().map(|m| m.name()).unwrap_or("none"),
        );

        *inner = Some(Acquired {
            camera,
            microphone,
            feeder,
            pump,
            sampler: None,
            token,
        });

        Ok(true)
    }

    /// Accumulates ~1s PCM increments while recording; on an explicit stop it
    /// flushes the partial increment and acknowledges with the complete PCM,
    /// which is the only point the blob may be read.
    fn spawn_pump(&self, mut mic_rx: mpsc::Receiver<super::device::AudioChunk>, token: CancelToken) -> AudioPump {
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<PumpCommand>(4);
        let increment = (self.config.sample_rate as u64 * self.config.channels as u64
            * self.config.audio_chunk_ms
            / 1000) as usize;

        let task = tokio::spawn(async move {
            let mut recording = false;
            let mut pending: Vec<i16> = Vec::new();
            let mut pcm: Vec<i16> = Vec::new();

            loop {
                tokio::select! {
                    maybe = mic_rx.recv() => match maybe {
                        Some(chunk) => {
                            if recording {
                                pending.extend_from_slice(&chunk.samples);
                                if pending.len() >= increment {
                                    pcm.append(&mut pending);
                                }
                            }
                        }
                        None => break, // device track ended
                    },
                    maybe = cmd_rx.recv() => match maybe {
                        Some(PumpCommand::Start) => {
                            recording = true;
                            pending.clear();
                            pcm.clear();
                        }
                        Some(PumpCommand::Stop { ack }) => {
                            recording = false;
                            pcm.append(&mut pending);
                            let _ = ack.send(std::mem::take(&mut pcm));
                        }
                        None => break,
                    },
                    _ = token.cancelled() => break,
                }
            }
        });

        AudioPump { task, cmd: cmd_tx }
    }

    /// Wait briefly for the camera track to start producing data.
    pub async fn wait_for_media(&self) -> Result<()> {
        let mut rx = self.preview_tx.subscribe();
        let wait = rx.wait_for(|frame| frame.is_some());
        if tokio::time::timeout(self.config.warmup_timeout(), wait)
            .await
            .is_err()
        {
            warn!("Camera produced no frames within warm-up window, proceeding anyway");
        }
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    pub fn audio_available(&self) -> bool {
        self.audio_available.load(Ordering::SeqCst)
    }

    /// Start the audio recorder and the frame-sampling interval together.
    /// Both start exactly once; a second call while recording is a no-op.
    pub async fn start_recording(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let acquired = inner
            .as_mut()
            .ok_or_else(|| Error::Capture("streams not acquired".to_string()))?;

        if self.recording.swap(true, Ordering::SeqCst) {
            debug!("Recording already active");
            return Ok(());
        }

        if let Some(pump) = &acquired.pump {
            if pump.cmd.send(PumpCommand::Start).await.is_err() {
                warn!("Audio recorder is gone, continuing without audio");
                self.audio_available.store(false, Ordering::SeqCst);
            }
        }

        let window = Arc::clone(&self.window);
        let frames_sampled = Arc::clone(&self.frames_sampled);
        let encoder = self.encoder.clone();
        let mut preview_rx = self.preview_tx.subscribe();
        let interval = self.config.frame_interval();
        let token = acquired.token.clone();

        acquired.sampler = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        let latest = preview_rx.borrow_and_update().clone();
                        if let Some(frame) = latest {
                            match encoder.encode(&frame) {
                                Ok(encoded) => {
                                    window.lock().expect("frame window lock").push(encoded);
                                    frames_sampled.fetch_add(1, Ordering::SeqCst);
                                }
                                Err(e) => warn!("Frame sample failed: {}", e),
                            }
                        }
                    }
                    _ = token.cancelled() => break,
                }
            }
        }));

        info!("Recording started (frame interval {:?})", interval);
        Ok(())
    }

    /// Stop recording: take one forced final frame sample, stop the audio
    /// recorder and assemble the blob only after its flush confirmation,
    /// fill the capture buffer, then release the device streams.
    ///
    /// Idempotent: a second call performs no further action.
    pub async fn stop_recording(&self) -> Result<()> {
        if !self.recording.swap(false, Ordering::SeqCst) {
            debug!("Recording not active, stop is a no-op");
            return Ok(());
        }

        let mut inner = self.inner.lock().await;

        if let Some(acquired) = inner.as_mut() {
            if let Some(sampler) = acquired.sampler.take() {
                sampler.abort();
            }

            // Forced extra sample at stop-time, regardless of tick alignment.
            let latest = self.preview_tx.subscribe().borrow().clone();
            if let Some(frame) = latest {
                match self.encoder.encode(&frame) {
                    Ok(encoded) => {
                        self.window.lock().expect("frame window lock").push(encoded);
                        self.frames_sampled.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => warn!("Final frame sample failed: {}", e),
                }
            }

            let audio_wav = match &acquired.pump {
                Some(pump) => self.flush_audio(pump).await,
                None => None,
            };

            {
                let mut window = self.window.lock().expect("frame window lock");
                let mut buffer = self.buffer.lock().expect("capture buffer lock");
                buffer.frames = window.drain();
                buffer.audio_wav = audio_wav;
            }
        } else {
            // Streams already torn down; keep whatever the window holds.
            let mut window = self.window.lock().expect("frame window lock");
            let mut buffer = self.buffer.lock().expect("capture buffer lock");
            buffer.frames = window.drain();
        }

        self.release_inner(&mut inner).await;
        Ok(())
    }

    /// Ask the pump to flush and wait for its confirmation. Reading chunks
    /// before the ack would yield an incomplete blob, so a missing ack means
    /// no audio at all.
    async fn flush_audio(&self, pump: &AudioPump) -> Option<Vec<u8>> {
        let (ack_tx, ack_rx) = oneshot::channel();
        if pump.cmd.send(PumpCommand::Stop { ack: ack_tx }).await.is_err() {
            warn!("Audio recorder exited before stop, dropping audio");
            return None;
        }

        match tokio::time::timeout(self.config.warmup_timeout(), ack_rx).await {
            Ok(Ok(pcm)) if !pcm.is_empty() => match self.encode_wav(&pcm) {
                Ok(wav) => Some(wav),
                Err(e) => {
                    warn!("WAV assembly failed: {}", e);
                    None
                }
            },
            Ok(Ok(_)) => {
                debug!("Recorder flushed zero samples");
                None
            }
            Ok(Err(_)) | Err(_) => {
                warn!("No flush confirmation from audio recorder, dropping audio");
                None
            }
        }
    }

    fn encode_wav(&self, pcm: &[i16]) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: self.config.channels,
            sample_rate: self.config.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| Error::Capture(format!("WAV writer: {}", e)))?;
            for &sample in pcm {
                writer
                    .write_sample(sample)
                    .map_err(|e| Error::Capture(format!("WAV write: {}", e)))?;
            }
            writer
                .finalize()
                .map_err(|e| Error::Capture(format!("WAV finalize: {}", e)))?;
        }
        Ok(cursor.into_inner())
    }

    /// Release the device streams: halt every active track, detach the
    /// preview surface, cancel sampling and recording tasks, reset flags.
    /// Leaves the capture buffer intact for submission. Idempotent.
    pub async fn release(&self) {
        let mut inner = self.inner.lock().await;
        self.release_inner(&mut inner).await;
    }

    async fn release_inner(&self, slot: &mut Option<Acquired>) {
        let Some(mut acquired) = slot.take() else {
            return;
        };

        acquired.token.cancel();

        if let Some(sampler) = acquired.sampler.take() {
            sampler.abort();
        }
        if let Some(pump) = acquired.pump.take() {
            pump.task.abort();
        }
        acquired.feeder.abort();

        if let Err(e) = acquired.camera.stop().await {
            warn!("Camera stop failed: {}", e);
        }
        self.released_tracks.fetch_add(1, Ordering::SeqCst);

        if let Some(mut mic) = acquired.microphone.take() {
            if let Err(e) = mic.stop().await {
                warn!("Microphone stop failed: {}", e);
            }
            self.released_tracks.fetch_add(1, Ordering::SeqCst);
        }

        self.preview_tx.send_replace(None);
        self.recording.store(false, Ordering::SeqCst);
        self.audio_available.store(false, Ordering::SeqCst);

        info!("Capture streams released");
    }

    /// Attach a user-typed transcript to the current capture buffer.
    pub fn set_manual_transcript(&self, text: &str) {
        let mut buffer = self.buffer.lock().expect("capture buffer lock");
        let trimmed = text.trim();
        buffer.manual_transcript = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }

    /// Clone of the current capture buffer.
    pub fn buffer(&self) -> CaptureBuffer {
        self.buffer.lock().expect("capture buffer lock").clone()
    }

    /// Clear collected evidence (after a submission or on re-record/reset).
    pub fn clear_buffer(&self) {
        self.buffer.lock().expect("capture buffer lock").clear();
        self.window.lock().expect("frame window lock").clear();
    }

    /// Number of frames currently in the sliding window.
    pub fn window_len(&self) -> usize {
        self.window.lock().expect("frame window lock").len()
    }

    pub async fn stats(&self) -> CaptureStats {
        let inner = self.inner.lock().await;
        let active_tracks = match inner.as_ref() {
            Some(acq) => {
                acq.camera.is_capturing() as usize
                    + acq
                        .microphone
                        .as_ref()
                        .map(|m| m.is_capturing() as usize)
                        .unwrap_or(0)
            }
            None => 0,
        };

        CaptureStats {
            acquired: inner.is_some(),
            recording: self.recording.load(Ordering::SeqCst),
            audio_available: self.audio_available.load(Ordering::SeqCst),
            active_tracks,
            frames_sampled: self.frames_sampled.load(Ordering::SeqCst),
            released_tracks: self.released_tracks.load(Ordering::SeqCst),
        }
    }

}
