//! Media acquisition and capture pipeline
//!
//! This module owns the device side of an interview answer:
//! - Camera/microphone acquisition as two independent requests
//! - The single live preview surface
//! - Periodic frame sampling into a bounded sliding window
//! - Chunked audio recording and WAV blob assembly
//! - Idempotent stream release

mod capture;
mod device;
mod frame;

pub use capture::{CaptureBuffer, CapturePipeline, CaptureStats};
pub use device::{
    AudioChunk, AudioSource, CameraBackend, DeviceFactory, MicrophoneBackend, SyntheticAudioSpec,
    SyntheticCamera, SyntheticMicrophone, SyntheticVideoSpec, VideoSource,
};
pub use frame::{EncodedFrame, FrameEncoder, FrameWindow, RawFrame};
