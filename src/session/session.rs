use super::stage::Stage;
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::media::{AudioSource, CapturePipeline, VideoSource};
use crate::recorder::{RecordingController, StopReason};
use crate::relay::{AnswerPayload, Evaluation, Evaluator, FinalReport, Question};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct SessionState {
    stage: Stage,
    session_id: Option<String>,
    resume_text: String,
    job_description_text: String,
    questions: Vec<Question>,
    current_index: usize,
    current_evaluation: Option<Evaluation>,
    evaluations: Vec<Evaluation>,
    answered: usize,
    report: Option<FinalReport>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

/// Clears the busy flag when a network-bound transition finishes, on every
/// exit path.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Top-level orchestrator for one interview attempt.
///
/// Owns the capture pipeline and recording controller, talks to the remote
/// evaluator, and enforces the stage machine: `Setup → Interview → Result`
/// with a global reset. Network-bound transitions are guarded by a busy flag;
/// re-entrant invocation while one is pending is a no-op (`Ok(None)` /
/// `Ok(false)`).
pub struct InterviewSession {
    config: Config,
    evaluator: Arc<dyn Evaluator>,
    pipeline: Arc<CapturePipeline>,
    controller: Arc<RecordingController>,
    token: StdMutex<CancelToken>,
    state: StdMutex<SessionState>,
    busy: AtomicBool,
}

impl InterviewSession {
    pub fn new(
        config: Config,
        evaluator: Arc<dyn Evaluator>,
        video_source: VideoSource,
        audio_source: AudioSource,
    ) -> Self {
        let pipeline = Arc::new(CapturePipeline::new(
            config.capture.clone(),
            video_source,
            audio_source,
        ));
        let controller = Arc::new(RecordingController::new(
            config.recorder.clone(),
            Arc::clone(&pipeline),
        ));

        Self {
            config,
            evaluator,
            pipeline,
            controller,
            token: StdMutex::new(CancelToken::new()),
            state: StdMutex::new(SessionState::default()),
            busy: AtomicBool::new(false),
        }
    }

    fn try_busy(&self) -> Option<BusyGuard<'_>> {
        if self.busy.swap(true, Ordering::SeqCst) {
            debug!("A network-bound transition is already pending");
            None
        } else {
            Some(BusyGuard(&self.busy))
        }
    }

    fn current_token(&self) -> CancelToken {
        self.token.lock().expect("token lock").clone()
    }

    // ========================================================================
    // Stage transitions
    // ========================================================================

    /// `Setup → Interview`: read the resume context, then open a session.
    ///
    /// Refused with [`Error::Validation`] (and no network start call) when
    /// the resume text is empty. `Ok(false)` when another transition is
    /// pending; [`Error::Cancelled`] when the session is reset mid-call.
    pub async fn start(&self) -> Result<bool> {
        let Some(_guard) = self.try_busy() else {
            return Ok(false);
        };
        let token = self.current_token();

        {
            let state = self.state.lock().expect("session state lock");
            if state.stage != Stage::Setup {
                return Err(Error::Validation("session already started".to_string()));
            }
        }

        let context = self.evaluator.resume_context().await?;
        if context.resume_text.trim().is_empty() {
            return Err(Error::Validation(
                "resume text is empty; analyze a resume before starting the interview".to_string(),
            ));
        }

        let started = self
            .evaluator
            .start(
                &context.resume_text,
                &context.job_description_text,
                self.config.session.question_count,
            )
            .await?;

        // A reset may have landed while the call was in flight; the stale
        // result must not touch the fresh session.
        if token.is_cancelled() {
            return Err(Error::Cancelled("session reset during start"));
        }

        if started.questions.is_empty() {
            return Err(Error::Network(
                "evaluator returned no questions".to_string(),
            ));
        }

        let mut state = self.state.lock().expect("session state lock");
        info!(
            "Interview started: session {}, {} questions",
            started.session_id,
            started.questions.len()
        );
        state.session_id = Some(started.session_id);
        state.resume_text = context.resume_text;
        state.job_description_text = context.job_description_text;
        state.questions = started.questions;
        state.current_index = 0;
        state.started_at = Some(Utc::now());
        state.stage = Stage::Interview;
        Ok(true)
    }

    /// `Interview → Interview`: move to the next question, clearing the
    /// current evaluation and capture buffer. Saturates at the last question.
    /// Returns the new current index.
    pub fn advance(&self) -> usize {
        let mut state = self.state.lock().expect("session state lock");
        if state.stage != Stage::Interview {
            return state.current_index;
        }

        state.current_evaluation = None;
        let last = state.questions.len().saturating_sub(1);
        state.current_index = (state.current_index + 1).min(last);
        drop(state);

        self.pipeline.clear_buffer();
        self.current_index()
    }

    /// `Interview → Result`: fetch the final report. A failed finish call
    /// still completes the transition with a neutral best-effort report; the
    /// session is client-side finished regardless of server acknowledgment.
    /// `Ok(None)` when another transition is pending.
    pub async fn finish(&self) -> Result<Option<FinalReport>> {
        let Some(_guard) = self.try_busy() else {
            return Ok(None);
        };
        let token = self.current_token();

        let session_id = {
            let state = self.state.lock().expect("session state lock");
            match state.stage {
                Stage::Interview => state
                    .session_id
                    .clone()
                    .ok_or_else(|| Error::Validation("no session id".to_string()))?,
                Stage::Setup => {
                    return Err(Error::Validation("interview has not started".to_string()))
                }
                Stage::Result => {
                    debug!("Session already finished");
                    return Ok(None);
                }
            }
        };

        let report = match self.evaluator.finish(&session_id).await {
            Ok(report) => report,
            Err(e) => {
                warn!("Finish call failed, completing with neutral report: {}", e);
                FinalReport::neutral()
            }
        };

        // The neutral-fallback path mutates too, so the liveness check covers
        // both branches.
        if token.is_cancelled() {
            return Err(Error::Cancelled("session reset during finish"));
        }

        let mut state = self.state.lock().expect("session state lock");
        state.report = Some(report.clone());
        state.ended_at = Some(Utc::now());
        state.stage = Stage::Result;
        info!(
            "Interview finished: {} of {} questions answered, recommendation {}",
            state.answered,
            state.questions.len(),
            report.recommendation
        );
        Ok(Some(report))
    }

    /// Global reset from any stage back to `Setup`: cancels in-flight work,
    /// releases every device resource, clears all in-memory entities.
    pub async fn reset(&self) {
        info!("Resetting interview session");

        let fresh = CancelToken::new();
        {
            let mut token = self.token.lock().expect("token lock");
            token.cancel();
            *token = fresh;
        }

        self.controller.teardown().await;
        self.pipeline.clear_buffer();

        *self.state.lock().expect("session state lock") = SessionState::default();
        self.busy.store(false, Ordering::SeqCst);
    }

    // ========================================================================
    // Answer lifecycle
    // ========================================================================

    /// Begin recording an answer to the current question.
    pub async fn begin_answer(&self) -> Result<()> {
        let time_limit = {
            let state = self.state.lock().expect("session state lock");
            if state.stage != Stage::Interview {
                return Err(Error::Validation("no active interview".to_string()));
            }
            state
                .questions
                .get(state.current_index)
                .and_then(|q| q.time_limit_secs)
        };

        self.controller
            .begin_answer(time_limit, self.current_token())
            .await
    }

    /// Manually stop the current answer. Safe to call at any time.
    pub async fn stop_answer(&self) -> Result<bool> {
        self.controller.stop_answer(StopReason::Manual).await
    }

    /// Attach a user-typed transcript to the recorded answer.
    pub fn set_manual_transcript(&self, text: &str) {
        self.pipeline.set_manual_transcript(text);
    }

    /// Submit a typed, text-only answer for the current question.
    pub async fn submit_text(&self, answer: &str) -> Result<Option<Evaluation>> {
        let payload = AnswerPayload::text(answer)?;
        self.submit(payload).await
    }

    /// Submit the recorded capture buffer (audio+frames, or manual transcript
    /// when audio capture failed).
    pub async fn submit_recorded(&self) -> Result<Option<Evaluation>> {
        let payload = AnswerPayload::from_capture(&self.pipeline.buffer())?;
        self.submit(payload).await
    }

    /// Relay one payload. On success the evaluation becomes current and the
    /// capture buffer is cleared; on failure nothing is stored and the
    /// question stays resubmittable.
    async fn submit(&self, payload: AnswerPayload) -> Result<Option<Evaluation>> {
        let Some(_guard) = self.try_busy() else {
            return Ok(None);
        };
        let token = self.current_token();

        let session_id = {
            let state = self.state.lock().expect("session state lock");
            if state.stage != Stage::Interview {
                return Err(Error::Validation("no active interview".to_string()));
            }
            state
                .session_id
                .clone()
                .ok_or_else(|| Error::Validation("no session id".to_string()))?
        };

        let evaluation = self.evaluator.submit_answer(&session_id, &payload).await?;

        if token.is_cancelled() {
            return Err(Error::Cancelled("session reset during submission"));
        }

        let mut state = self.state.lock().expect("session state lock");
        state.current_evaluation = Some(evaluation.clone());
        state.evaluations.push(evaluation.clone());
        state.answered += 1;
        drop(state);

        self.pipeline.clear_buffer();
        Ok(Some(evaluation))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn stage(&self) -> Stage {
        self.state.lock().expect("session state lock").stage
    }

    pub fn session_id(&self) -> Option<String> {
        self.state.lock().expect("session state lock").session_id.clone()
    }

    /// Resume text the running session was started from. Empty in `Setup`.
    pub fn resume_text(&self) -> String {
        self.state.lock().expect("session state lock").resume_text.clone()
    }

    /// Job description the running session was started from. Empty in `Setup`.
    pub fn job_description_text(&self) -> String {
        self.state
            .lock()
            .expect("session state lock")
            .job_description_text
            .clone()
    }

    pub fn current_index(&self) -> usize {
        self.state.lock().expect("session state lock").current_index
    }

    pub fn current_question(&self) -> Option<Question> {
        let state = self.state.lock().expect("session state lock");
        state.questions.get(state.current_index).cloned()
    }

    pub fn total_questions(&self) -> usize {
        self.state.lock().expect("session state lock").questions.len()
    }

    pub fn current_evaluation(&self) -> Option<Evaluation> {
        self.state
            .lock()
            .expect("session state lock")
            .current_evaluation
            .clone()
    }

    pub fn questions_answered(&self) -> usize {
        self.state.lock().expect("session state lock").answered
    }

    pub fn report(&self) -> Option<FinalReport> {
        self.state.lock().expect("session state lock").report.clone()
    }

    /// The pipeline, for preview subscription and status surfaces.
    pub fn pipeline(&self) -> &Arc<CapturePipeline> {
        &self.pipeline
    }

    /// The controller, for event subscription.
    pub fn controller(&self) -> &Arc<RecordingController> {
        &self.controller
    }

    // ========================================================================
    // Report output
    // ========================================================================

    /// Human-readable summary of the final report. `None` before finish.
    pub fn summary(&self) -> Option<String> {
        let state = self.state.lock().expect("session state lock");
        let report = state.report.as_ref()?;

        let average = if state.evaluations.is_empty() {
            None
        } else {
            Some(
                state.evaluations.iter().map(|e| e.overall_score).sum::<f32>()
                    / state.evaluations.len() as f32,
            )
        };

        let mut out = String::new();
        out.push_str("## Interview result\n\n");
        out.push_str(&format!("Recommendation: {}\n\n", report.recommendation));
        if let Some(avg) = average {
            out.push_str(&format!("Average answer score: {:.1}/10\n", avg));
        }
        out.push_str(&format!("Behavioral score: {:.1}/10\n", report.overall_score));
        out.push_str(&format!(
            "Communication {:.1} | Confidence {:.1} | Professionalism {:.1}\n",
            report.communication_score, report.confidence_score, report.professionalism_score
        ));
        out.push_str(&format!(
            "Questions answered: {}/{}\n",
            state.answered,
            state.questions.len()
        ));

        if !report.strengths.is_empty() {
            out.push_str("\n### Strengths\n");
            for s in &report.strengths {
                out.push_str(&format!("- {}\n", s));
            }
        }
        if !report.areas_to_improve.is_empty() {
            out.push_str("\n### Areas to improve\n");
            for s in &report.areas_to_improve {
                out.push_str(&format!("- {}\n", s));
            }
        }
        if !report.detailed_feedback.is_empty() {
            out.push_str(&format!("\n{}\n", report.detailed_feedback));
        }

        Some(out)
    }

    /// Save the final report as pretty-printed JSON.
    pub fn save_report(&self, path: &Path) -> Result<()> {
        let report = self
            .report()
            .ok_or_else(|| Error::Validation("no report to save".to_string()))?;
        let json = serde_json::to_vec_pretty(&report).map_err(|e| Error::Io(std::io::Error::other(e)))?;
        std::fs::write(path, json)?;
        info!("Report saved to {}", path.display());
        Ok(())
    }
}
