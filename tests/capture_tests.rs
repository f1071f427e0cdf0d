use intervue::{
    AnswerPayload, AudioSource, CaptureConfig, CapturePipeline, Error, PayloadKind,
    SyntheticAudioSpec, SyntheticVideoSpec, VideoSource,
};
use std::time::Duration;

/// Millisecond-scale timings so the real sampling and recording paths run
/// inside a test.
fn fast_config() -> CaptureConfig {
    CaptureConfig {
        frame_interval_ms: 20,
        frame_window: 3,
        audio_chunk_ms: 20,
        frame_width: 32,
        frame_height: 24,
        jpeg_quality: 70,
        warmup_timeout_ms: 1000,
        sample_rate: 16000,
        channels: 1,
    }
}

fn fast_video() -> VideoSource {
    VideoSource::Synthetic(SyntheticVideoSpec {
        width: 64,
        height: 48,
        frame_interval: Duration::from_millis(5),
    })
}

fn fast_audio() -> AudioSource {
    AudioSource::Synthetic(SyntheticAudioSpec {
        chunk_interval: Duration::from_millis(5),
        ..Default::default()
    })
}

#[tokio::test]
async fn frame_window_never_exceeds_capacity_while_sampling() {
    let pipeline = CapturePipeline::new(fast_config(), fast_video(), fast_audio());

    pipeline.acquire().await.unwrap();
    pipeline.wait_for_media().await.unwrap();
    pipeline.start_recording().await.unwrap();

    // Run long enough for many sampling ticks; the window must stay bounded
    // the whole time, not just at the end.
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(pipeline.window_len() <= 3);
    }

    pipeline.stop_recording().await.unwrap();

    let buffer = pipeline.buffer();
    assert!(!buffer.frames.is_empty());
    assert!(buffer.frames.len() <= 3);
}

#[tokio::test]
async fn stop_takes_a_forced_final_sample() {
    // Sampling interval far beyond the test duration: the only frame in the
    // buffer can come from the stop-time sample.
    let config = CaptureConfig {
        frame_interval_ms: 60_000,
        ..fast_config()
    };
    let pipeline = CapturePipeline::new(config, fast_video(), fast_audio());

    pipeline.acquire().await.unwrap();
    pipeline.wait_for_media().await.unwrap();
    pipeline.start_recording().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    pipeline.stop_recording().await.unwrap();

    assert_eq!(pipeline.buffer().frames.len(), 1);
}

#[tokio::test]
async fn audio_blob_appears_only_after_confirmed_stop() {
    let pipeline = CapturePipeline::new(fast_config(), fast_video(), fast_audio());

    pipeline.acquire().await.unwrap();
    pipeline.wait_for_media().await.unwrap();
    pipeline.start_recording().await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    // Mid-recording the buffer holds no blob.
    assert!(pipeline.buffer().audio_wav.is_none());

    pipeline.stop_recording().await.unwrap();

    let buffer = pipeline.buffer();
    assert!(buffer.has_audio());
    let wav = buffer.audio_wav.unwrap();
    assert_eq!(&wav[..4], b"RIFF");
    assert_eq!(&wav[8..12], b"WAVE");
}

#[tokio::test]
async fn denied_microphone_degrades_to_video_only() {
    let pipeline = CapturePipeline::new(fast_config(), fast_video(), AudioSource::Denied);

    // Acquisition still succeeds; only audio is lost.
    assert!(pipeline.acquire().await.unwrap());
    assert!(!pipeline.audio_available());

    pipeline.wait_for_media().await.unwrap();
    pipeline.start_recording().await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    pipeline.stop_recording().await.unwrap();

    let buffer = pipeline.buffer();
    assert!(!buffer.frames.is_empty());
    assert!(!buffer.has_audio());

    // Without audio a manual transcript is mandatory for submission.
    assert!(matches!(
        AnswerPayload::from_capture(&buffer),
        Err(Error::Validation(_))
    ));
    pipeline.set_manual_transcript("I answered out loud");
    let payload = AnswerPayload::from_capture(&pipeline.buffer()).unwrap();
    assert_eq!(payload.kind, PayloadKind::TranscriptOnly);
}

#[tokio::test]
async fn denied_camera_aborts_acquisition() {
    let pipeline = CapturePipeline::new(fast_config(), VideoSource::Denied, fast_audio());
    assert!(matches!(
        pipeline.acquire().await,
        Err(Error::Permission(_))
    ));

    let stats = pipeline.stats().await;
    assert!(!stats.acquired);
    assert_eq!(stats.active_tracks, 0);
}

#[tokio::test]
async fn release_stops_each_track_exactly_once() {
    let pipeline = CapturePipeline::new(fast_config(), fast_video(), fast_audio());

    pipeline.acquire().await.unwrap();
    let stats = pipeline.stats().await;
    assert_eq!(stats.active_tracks, 2);
    assert_eq!(stats.released_tracks, 0);

    pipeline.release().await;
    pipeline.release().await;

    let stats = pipeline.stats().await;
    assert!(!stats.acquired);
    assert_eq!(stats.active_tracks, 0);
    assert_eq!(stats.released_tracks, 2);
}

#[tokio::test]
async fn stop_twice_runs_cleanup_once() {
    let pipeline = CapturePipeline::new(fast_config(), fast_video(), fast_audio());

    pipeline.acquire().await.unwrap();
    pipeline.wait_for_media().await.unwrap();
    pipeline.start_recording().await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;

    pipeline.stop_recording().await.unwrap();
    pipeline.stop_recording().await.unwrap();

    let stats = pipeline.stats().await;
    assert_eq!(stats.released_tracks, 2);
    assert!(!stats.recording);

    // The evidence survives the release for submission.
    assert!(!pipeline.buffer().frames.is_empty());
}

#[tokio::test]
async fn acquire_while_acquired_reuses_streams() {
    let pipeline = CapturePipeline::new(fast_config(), fast_video(), fast_audio());

    assert!(pipeline.acquire().await.unwrap());
    assert!(!pipeline.acquire().await.unwrap());

    let stats = pipeline.stats().await;
    assert_eq!(stats.active_tracks, 2);

    pipeline.release().await;
}

#[tokio::test]
async fn preview_surface_clears_on_release() {
    let pipeline = CapturePipeline::new(fast_config(), fast_video(), fast_audio());
    let mut preview = pipeline.preview();

    pipeline.acquire().await.unwrap();
    pipeline.wait_for_media().await.unwrap();
    assert!(preview.borrow_and_update().is_some());

    pipeline.release().await;
    assert!(preview.borrow_and_update().is_none());
}
