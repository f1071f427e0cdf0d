use serde::{Deserialize, Serialize};

/// Top-level stage of an interview session.
///
/// Transitions are strictly monotonic (`Setup → Interview → Result`) except
/// for the global reset back to `Setup`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Setup,
    Interview,
    Result,
}
