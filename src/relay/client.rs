use super::payload::AnswerPayload;
use super::types::{Evaluation, FinalReport, Question, Recommendation, ResumeContext, StartedSession};
use crate::config::EvaluatorConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Remote evaluator contract consumed by the session state machine.
///
/// Everything behind this trait is request/response; the orchestrator never
/// depends on how answers are scored.
#[async_trait::async_trait]
pub trait Evaluator: Send + Sync {
    /// Resume/JD context, read once before the session may start.
    async fn resume_context(&self) -> Result<ResumeContext>;

    /// Open a session. Must not be called with empty resume text.
    async fn start(
        &self,
        resume_text: &str,
        jd_text: &str,
        question_count: u32,
    ) -> Result<StartedSession>;

    /// Submit one answer for the current question.
    async fn submit_answer(&self, session_id: &str, payload: &AnswerPayload) -> Result<Evaluation>;

    /// Close the session and fetch the final report.
    async fn finish(&self, session_id: &str) -> Result<FinalReport>;
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct StartRequest<'a> {
    cv_text: &'a str,
    jd_text: &'a str,
    num_questions: u32,
}

#[derive(Debug, Deserialize)]
struct StartEnvelope {
    #[serde(default)]
    success: bool,
    session_id: Option<String>,
    #[serde(default)]
    questions: Vec<Question>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    session_id: &'a str,
    video_frames: &'a [String],
    audio_base64: &'a str,
    text_answer: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmitEnvelope {
    #[serde(default)]
    success: bool,
    result: Option<SubmitResult>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitResult {
    answer_evaluation: Option<Evaluation>,
    #[serde(default)]
    transcript: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FinishEnvelope {
    #[serde(default)]
    success: bool,
    report: Option<ReportWire>,
    error: Option<String>,
}

/// The evaluator nests behavioral scores inside the report body and repeats
/// the recommendation at the top level.
#[derive(Debug, Deserialize)]
struct ReportWire {
    #[serde(default)]
    behavioral_assessment: FinalReport,
    #[serde(default)]
    recommendation: Recommendation,
}

// ============================================================================
// HTTP implementation
// ============================================================================

/// Evaluator over HTTP, against the /api/interview routes.
pub struct HttpEvaluator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEvaluator {
    pub fn new(config: &EvaluatorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn envelope_error(context: &str, error: Option<String>) -> Error {
        Error::Network(format!(
            "{}: {}",
            context,
            error.unwrap_or_else(|| "evaluator reported failure".to_string())
        ))
    }
}

#[async_trait::async_trait]
impl Evaluator for HttpEvaluator {
    async fn resume_context(&self) -> Result<ResumeContext> {
        let context: ResumeContext = self
            .client
            .get(self.url("/api/get-cv-jd"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(context)
    }

    async fn start(
        &self,
        resume_text: &str,
        jd_text: &str,
        question_count: u32,
    ) -> Result<StartedSession> {
        let envelope: StartEnvelope = self
            .client
            .post(self.url("/api/interview/start"))
            .json(&StartRequest {
                cv_text: resume_text,
                jd_text,
                num_questions: question_count,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !envelope.success {
            return Err(Self::envelope_error("start", envelope.error));
        }
        let session_id = envelope
            .session_id
            .ok_or_else(|| Error::Network("start: missing session id".to_string()))?;

        let mut questions = envelope.questions;
        for (i, question) in questions.iter_mut().enumerate() {
            question.index = i;
        }

        info!(
            "Interview session {} opened with {} questions",
            session_id,
            questions.len()
        );
        Ok(StartedSession {
            session_id,
            questions,
        })
    }

    async fn submit_answer(&self, session_id: &str, payload: &AnswerPayload) -> Result<Evaluation> {
        debug!(
            "Submitting answer ({:?}, {} frames, {} audio chars)",
            payload.kind,
            payload.frames.len(),
            payload.audio_base64.len()
        );

        let envelope: SubmitEnvelope = self
            .client
            .post(self.url("/api/interview/submit-answer"))
            .json(&SubmitRequest {
                session_id,
                video_frames: &payload.frames,
                audio_base64: &payload.audio_base64,
                text_answer: &payload.answer_text,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !envelope.success {
            return Err(Self::envelope_error("submit-answer", envelope.error));
        }

        let result = envelope
            .result
            .ok_or_else(|| Error::Network("submit-answer: missing result".to_string()))?;
        let mut evaluation = result
            .answer_evaluation
            .ok_or_else(|| Error::Network("submit-answer: missing evaluation".to_string()))?;
        if evaluation.transcript.is_none() {
            evaluation.transcript = result.transcript;
        }

        Ok(evaluation)
    }

    async fn finish(&self, session_id: &str) -> Result<FinalReport> {
        let envelope: FinishEnvelope = self
            .client
            .post(self.url(&format!("/api/interview/finish/{}", session_id)))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !envelope.success {
            return Err(Self::envelope_error("finish", envelope.error));
        }

        let wire = envelope
            .report
            .ok_or_else(|| Error::Network("finish: missing report".to_string()))?;
        let mut report = wire.behavioral_assessment;
        if report.recommendation == Recommendation::Unknown {
            report.recommendation = wire.recommendation;
        }

        Ok(report)
    }
}
