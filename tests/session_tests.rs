use intervue::{
    AnswerPayload, AudioSource, CaptureConfig, Config, Error, Evaluation, Evaluator, FinalReport,
    InterviewSession, PayloadKind, Question, QuestionKind, Recommendation, RecorderConfig,
    ResumeContext, Stage, StartedSession, SyntheticAudioSpec, SyntheticVideoSpec, VideoSource,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted evaluator: records every call so tests can assert what went over
/// the wire without a live server.
struct MockEvaluator {
    resume_text: String,
    question_count: usize,
    fail_finish: bool,
    submit_delay: Option<Duration>,
    finish_delay: Option<Duration>,
    start_calls: AtomicUsize,
    submissions: Mutex<Vec<AnswerPayload>>,
}

impl MockEvaluator {
    fn new(question_count: usize) -> Self {
        Self {
            resume_text: "Senior engineer, 8 years of distributed systems".to_string(),
            question_count,
            fail_finish: false,
            submit_delay: None,
            finish_delay: None,
            start_calls: AtomicUsize::new(0),
            submissions: Mutex::new(Vec::new()),
        }
    }

    fn submissions(&self) -> Vec<AnswerPayload> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Evaluator for MockEvaluator {
    async fn resume_context(&self) -> Result<ResumeContext, Error> {
        Ok(ResumeContext {
            resume_text: self.resume_text.clone(),
            job_description_text: "Backend role".to_string(),
        })
    }

    async fn start(
        &self,
        _resume_text: &str,
        _jd_text: &str,
        _question_count: u32,
    ) -> Result<StartedSession, Error> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        let questions = (0..self.question_count)
            .map(|i| Question {
                index: i,
                text: format!("Question {}", i + 1),
                kind: QuestionKind::Behavioral,
                difficulty: None,
                time_limit_secs: None,
            })
            .collect();
        Ok(StartedSession {
            session_id: "session-1".to_string(),
            questions,
        })
    }

    async fn submit_answer(
        &self,
        _session_id: &str,
        payload: &AnswerPayload,
    ) -> Result<Evaluation, Error> {
        if let Some(delay) = self.submit_delay {
            tokio::time::sleep(delay).await;
        }
        self.submissions.lock().unwrap().push(payload.clone());
        Ok(Evaluation {
            relevance_score: 8.0,
            completeness_score: 7.0,
            overall_score: 8.0,
            feedback: "Well structured".to_string(),
            transcript: None,
            ideal_answer: None,
            strengths: vec![],
            improvements: vec![],
        })
    }

    async fn finish(&self, _session_id: &str) -> Result<FinalReport, Error> {
        if let Some(delay) = self.finish_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_finish {
            return Err(Error::Network("evaluator unreachable".to_string()));
        }
        Ok(FinalReport {
            communication_score: 8.0,
            confidence_score: 7.5,
            professionalism_score: 8.5,
            overall_score: 8.0,
            recommendation: Recommendation::Recommend,
            strengths: vec!["clear examples".to_string()],
            areas_to_improve: vec![],
            detailed_feedback: "Strong throughout.".to_string(),
        })
    }
}

/// Millisecond-scale capture and recorder timings.
fn fast_config() -> Config {
    Config {
        capture: CaptureConfig {
            frame_interval_ms: 15,
            frame_window: 3,
            audio_chunk_ms: 15,
            frame_width: 32,
            frame_height: 24,
            jpeg_quality: 70,
            warmup_timeout_ms: 1000,
            sample_rate: 16000,
            channels: 1,
        },
        recorder: RecorderConfig {
            countdown_from: 1,
            countdown_tick_ms: 5,
            answer_tick_ms: 10,
            default_time_limit_secs: 60,
        },
        ..Default::default()
    }
}

fn fast_session(evaluator: Arc<MockEvaluator>) -> InterviewSession {
    InterviewSession::new(
        fast_config(),
        evaluator,
        VideoSource::Synthetic(SyntheticVideoSpec {
            width: 64,
            height: 48,
            frame_interval: Duration::from_millis(5),
        }),
        AudioSource::Synthetic(SyntheticAudioSpec {
            chunk_interval: Duration::from_millis(5),
            ..Default::default()
        }),
    )
}

#[tokio::test]
async fn empty_resume_refuses_start_without_a_network_call() {
    let evaluator = Arc::new(MockEvaluator {
        resume_text: "   ".to_string(),
        ..MockEvaluator::new(3)
    });
    let session = fast_session(Arc::clone(&evaluator));

    assert!(matches!(session.start().await, Err(Error::Validation(_))));
    assert_eq!(evaluator.start_calls.load(Ordering::SeqCst), 0);
    assert_eq!(session.stage(), Stage::Setup);
}

#[tokio::test]
async fn text_interview_runs_setup_to_result() {
    let evaluator = Arc::new(MockEvaluator::new(3));
    let session = fast_session(Arc::clone(&evaluator));

    assert!(session.start().await.unwrap());
    assert_eq!(session.stage(), Stage::Interview);
    assert_eq!(session.total_questions(), 3);

    for i in 0..3 {
        let question = session.current_question().unwrap();
        assert_eq!(question.index, i);

        let eval = session
            .submit_text(&format!("Answer to question {}", i + 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(eval.overall_score, 8.0);

        session.advance();
    }

    let report = session.finish().await.unwrap().unwrap();
    assert_eq!(report.recommendation, Recommendation::Recommend);
    assert_eq!(session.stage(), Stage::Result);
    assert_eq!(session.questions_answered(), 3);

    let summary = session.summary().unwrap();
    assert!(summary.contains("Recommendation: Recommend"));
    assert!(summary.contains("3/3"));
}

#[tokio::test]
async fn advance_saturates_at_the_last_question() {
    let evaluator = Arc::new(MockEvaluator::new(2));
    let session = fast_session(evaluator);
    session.start().await.unwrap();

    assert_eq!(session.advance(), 1);
    assert_eq!(session.advance(), 1);
    assert_eq!(session.advance(), 1);
    assert_eq!(session.current_question().unwrap().index, 1);
}

#[tokio::test]
async fn submitting_an_empty_answer_never_reaches_the_evaluator() {
    let evaluator = Arc::new(MockEvaluator::new(1));
    let session = fast_session(Arc::clone(&evaluator));
    session.start().await.unwrap();

    assert!(matches!(
        session.submit_text("   ").await,
        Err(Error::Validation(_))
    ));
    assert!(evaluator.submissions().is_empty());
    assert_eq!(session.questions_answered(), 0);
}

#[tokio::test]
async fn failed_finish_still_reaches_result_with_a_neutral_report() {
    let evaluator = Arc::new(MockEvaluator {
        fail_finish: true,
        ..MockEvaluator::new(1)
    });
    let session = fast_session(evaluator);
    session.start().await.unwrap();

    let report = session.finish().await.unwrap().unwrap();
    assert_eq!(report.recommendation, Recommendation::Unknown);
    assert_eq!(report.overall_score, 5.0);
    assert_eq!(session.stage(), Stage::Result);

    // A second finish is a no-op.
    assert!(session.finish().await.unwrap().is_none());
}

#[tokio::test]
async fn recorded_answer_carries_audio_and_transcript_override() {
    let evaluator = Arc::new(MockEvaluator::new(1));
    let session = fast_session(Arc::clone(&evaluator));
    session.start().await.unwrap();

    session.begin_answer().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(session.stop_answer().await.unwrap());

    session.set_manual_transcript("what I actually said");
    let eval = session.submit_recorded().await.unwrap();
    assert!(eval.is_some());

    let submissions = evaluator.submissions();
    assert_eq!(submissions.len(), 1);
    let payload = &submissions[0];
    assert_eq!(payload.kind, PayloadKind::AudioWithFrames);
    assert!(!payload.frames.is_empty());
    assert!(payload.frames.len() <= 3);
    assert!(payload.has_transcript_override());
    assert_eq!(payload.answer_text, "what I actually said");
}

#[tokio::test]
async fn degraded_recording_submits_the_transcript_shape() {
    let evaluator = Arc::new(MockEvaluator::new(1));
    let session = InterviewSession::new(
        fast_config(),
        evaluator.clone(),
        VideoSource::Synthetic(SyntheticVideoSpec {
            width: 64,
            height: 48,
            frame_interval: Duration::from_millis(5),
        }),
        AudioSource::Denied,
    );
    session.start().await.unwrap();

    session.begin_answer().await.unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    session.stop_answer().await.unwrap();

    // Without audio the recorded answer needs a typed transcript.
    assert!(matches!(
        session.submit_recorded().await,
        Err(Error::Validation(_))
    ));
    session.set_manual_transcript("typed because the microphone failed");
    session.submit_recorded().await.unwrap();

    let payload = &evaluator.submissions()[0];
    assert_eq!(payload.kind, PayloadKind::TranscriptOnly);
    assert!(payload.audio_base64.is_empty());
}

#[tokio::test]
async fn overlapping_submissions_collapse_to_one() {
    let evaluator = Arc::new(MockEvaluator {
        submit_delay: Some(Duration::from_millis(100)),
        ..MockEvaluator::new(1)
    });
    let session = Arc::new(fast_session(Arc::clone(&evaluator)));
    session.start().await.unwrap();

    let first = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.submit_text("the real answer").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Second submission while the first is in flight is a quiet no-op.
    assert!(session.submit_text("a duplicate").await.unwrap().is_none());

    assert!(first.await.unwrap().unwrap().is_some());
    assert_eq!(evaluator.submissions().len(), 1);
    assert_eq!(session.questions_answered(), 1);
}

#[tokio::test]
async fn reset_discards_a_submission_still_in_flight() {
    let evaluator = Arc::new(MockEvaluator {
        submit_delay: Some(Duration::from_millis(200)),
        ..MockEvaluator::new(1)
    });
    let session = Arc::new(fast_session(Arc::clone(&evaluator)));
    session.start().await.unwrap();

    let stale = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.submit_text("answered too late").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    session.reset().await;

    // The stale call completes but its result must not touch the reset
    // session.
    assert!(matches!(stale.await.unwrap(), Err(Error::Cancelled(_))));
    assert_eq!(session.stage(), Stage::Setup);
    assert_eq!(session.questions_answered(), 0);
    assert!(session.current_evaluation().is_none());
}

#[tokio::test]
async fn reset_discards_a_finish_still_in_flight() {
    let evaluator = Arc::new(MockEvaluator {
        finish_delay: Some(Duration::from_millis(200)),
        ..MockEvaluator::new(1)
    });
    let session = Arc::new(fast_session(evaluator));
    session.start().await.unwrap();

    let stale = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.finish().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    session.reset().await;

    assert!(matches!(stale.await.unwrap(), Err(Error::Cancelled(_))));
    assert_eq!(session.stage(), Stage::Setup);
    assert!(session.report().is_none());

    // The reset session starts over as if the stale finish never happened.
    assert!(session.start().await.unwrap());
    assert_eq!(session.stage(), Stage::Interview);
}

#[tokio::test]
async fn reset_returns_to_setup_from_any_stage() {
    let evaluator = Arc::new(MockEvaluator::new(2));
    let session = fast_session(Arc::clone(&evaluator));

    session.start().await.unwrap();
    assert_eq!(
        session.resume_text(),
        "Senior engineer, 8 years of distributed systems"
    );
    assert!(!session.job_description_text().is_empty());

    session.submit_text("one answer").await.unwrap();
    session.reset().await;

    assert_eq!(session.stage(), Stage::Setup);
    assert!(session.session_id().is_none());
    assert!(session.resume_text().is_empty());
    assert_eq!(session.total_questions(), 0);
    assert_eq!(session.questions_answered(), 0);
    assert!(session.pipeline().buffer().frames.is_empty());

    // A reset session can start over cleanly.
    assert!(session.start().await.unwrap());
    assert_eq!(evaluator.start_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn reset_mid_recording_releases_every_track() {
    let evaluator = Arc::new(MockEvaluator::new(1));
    let session = fast_session(evaluator);
    session.start().await.unwrap();

    session.begin_answer().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    session.reset().await;

    let stats = session.pipeline().stats().await;
    assert!(!stats.acquired);
    assert_eq!(stats.active_tracks, 0);
    assert!(!stats.recording);
    assert_eq!(session.stage(), Stage::Setup);
}

#[tokio::test]
async fn report_saves_as_json() {
    let evaluator = Arc::new(MockEvaluator::new(1));
    let session = fast_session(evaluator);
    session.start().await.unwrap();
    session.submit_text("an answer").await.unwrap();
    session.finish().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");
    session.save_report(&path).unwrap();

    let saved: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(saved["recommendation"], "Recommend");
    assert_eq!(saved["overall_score"], 8.0);
}
