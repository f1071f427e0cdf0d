//! Submission and evaluation relay
//!
//! Shapes recorded/typed answers into one of three payload forms and
//! exchanges them with the remote evaluator.

mod client;
mod payload;
mod types;

pub use client::{Evaluator, HttpEvaluator};
pub use payload::{AnswerPayload, PayloadKind};
pub use types::{
    Difficulty, Evaluation, FinalReport, Question, QuestionKind, Recommendation, ResumeContext,
    StartedSession,
};
