use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Neutral default for numeric scores the evaluator omitted. Missing fields
/// must not fail a response; they land mid-scale instead.
pub(crate) fn neutral_score() -> f32 {
    5.0
}

/// What a question probes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Technical,
    Behavioral,
    Situational,
    #[serde(other)]
    Other,
}

impl Default for QuestionKind {
    fn default() -> Self {
        Self::Behavioral
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// One interview question. Immutable once issued; exactly one is current at
/// any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Zero-based position in the session's question list
    #[serde(default)]
    pub index: usize,
    #[serde(rename = "question")]
    pub text: String,
    #[serde(rename = "type", default)]
    pub kind: QuestionKind,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    /// Answer time limit in seconds; the controller default applies when unset
    #[serde(rename = "time_limit", default)]
    pub time_limit_secs: Option<u32>,
}

/// Per-answer evaluation returned by the remote evaluator. Transient;
/// overwritten when the session advances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    #[serde(default = "neutral_score")]
    pub relevance_score: f32,
    #[serde(default = "neutral_score")]
    pub completeness_score: f32,
    #[serde(default = "neutral_score")]
    pub overall_score: f32,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub ideal_answer: Option<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
}

/// Closed-set hiring suggestion attached to the final report.
///
/// The evaluator's wire label "Not Recommend" maps to `Reject`; anything
/// unrecognized maps to `Unknown` rather than failing the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Recommendation {
    Recommend,
    Consider,
    Reject,
    #[default]
    Unknown,
}

impl Recommendation {
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "recommend" => Self::Recommend,
            "consider" => Self::Consider,
            "reject" | "not recommend" | "not_recommend" | "not recommended" => Self::Reject,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recommend => "Recommend",
            Self::Consider => "Consider",
            Self::Reject => "Reject",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Recommendation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Recommendation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Recommendation::parse(&label))
    }
}

/// Terminal report produced once at finish.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalReport {
    #[serde(default = "neutral_score")]
    pub communication_score: f32,
    #[serde(default = "neutral_score")]
    pub confidence_score: f32,
    #[serde(default = "neutral_score")]
    pub professionalism_score: f32,
    #[serde(default = "neutral_score", alias = "overall_behavioral_score")]
    pub overall_score: f32,
    #[serde(default, alias = "hiring_recommendation")]
    pub recommendation: Recommendation,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub areas_to_improve: Vec<String>,
    #[serde(default)]
    pub detailed_feedback: String,
}

impl FinalReport {
    /// Best-effort report used when the finish call fails: the session is
    /// client-side finished regardless of server acknowledgment.
    pub fn neutral() -> Self {
        Self {
            communication_score: neutral_score(),
            confidence_score: neutral_score(),
            professionalism_score: neutral_score(),
            overall_score: neutral_score(),
            recommendation: Recommendation::Unknown,
            strengths: Vec::new(),
            areas_to_improve: Vec::new(),
            detailed_feedback: "Report unavailable: the evaluator did not acknowledge the finish request.".to_string(),
        }
    }
}

impl Default for FinalReport {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Result of a successful `start` call.
#[derive(Debug, Clone)]
pub struct StartedSession {
    pub session_id: String,
    pub questions: Vec<Question>,
}

/// Resume/JD text read before the session is allowed to start.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResumeContext {
    #[serde(alias = "cv_text", default)]
    pub resume_text: String,
    #[serde(alias = "jd_text", default)]
    pub job_description_text: String,
}
