pub mod cancel;
pub mod config;
pub mod error;
pub mod media;
pub mod recorder;
pub mod relay;
pub mod session;

pub use cancel::CancelToken;
pub use config::{CaptureConfig, Config, EvaluatorConfig, RecorderConfig, SessionConfig};
pub use error::{Error, Result};
pub use media::{
    AudioSource, CaptureBuffer, CapturePipeline, CaptureStats, EncodedFrame, FrameEncoder,
    FrameWindow, RawFrame, SyntheticAudioSpec, SyntheticVideoSpec, VideoSource,
};
pub use recorder::{ControllerEvent, RecordingController, StopReason};
pub use relay::{
    AnswerPayload, Evaluation, Evaluator, FinalReport, HttpEvaluator, PayloadKind, Question,
    QuestionKind, Recommendation, ResumeContext, StartedSession,
};
pub use session::{InterviewSession, Stage};
