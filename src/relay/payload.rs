use crate::error::{Error, Result};
use crate::media::CaptureBuffer;
use base64::Engine;

/// Which of the three answer shapes a payload carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Typed answer, no media
    TextOnly,
    /// Recorded audio plus sampled frames, optional transcript override
    AudioWithFrames,
    /// Manual transcript standing in for failed audio capture
    TranscriptOnly,
}

/// One answer, shaped for the evaluator. Exactly one shape per question.
#[derive(Debug, Clone)]
pub struct AnswerPayload {
    pub kind: PayloadKind,
    /// Base64 JPEG frames, oldest first, never more than the window size
    pub frames: Vec<String>,
    /// Base64 WAV audio; empty when the shape carries none
    pub audio_base64: String,
    /// Typed answer or manual transcript; the evaluator prefers this over
    /// transcribing the audio when non-empty
    pub answer_text: String,
}

impl AnswerPayload {
    /// Text-only shape. Empty answers are rejected before any network call.
    pub fn text(answer: &str) -> Result<Self> {
        let trimmed = answer.trim();
        if trimmed.is_empty() {
            return Err(Error::Validation("answer text is empty".to_string()));
        }
        Ok(Self {
            kind: PayloadKind::TextOnly,
            frames: Vec::new(),
            audio_base64: String::new(),
            answer_text: trimmed.to_string(),
        })
    }

    /// Shape a recorded answer from the capture buffer.
    ///
    /// With audio present this is the audio+frames shape, carrying the manual
    /// transcript (if any) as an override. Without audio the manual
    /// transcript is required; an empty buffer is a validation error.
    pub fn from_capture(buffer: &CaptureBuffer) -> Result<Self> {
        let frames: Vec<String> = buffer.frames.iter().map(|f| f.to_base64()).collect();
        let transcript = buffer
            .manual_transcript
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or("")
            .to_string();

        if buffer.has_audio() {
            let audio = buffer.audio_wav.as_deref().unwrap_or_default();
            return Ok(Self {
                kind: PayloadKind::AudioWithFrames,
                frames,
                audio_base64: base64::engine::general_purpose::STANDARD.encode(audio),
                answer_text: transcript,
            });
        }

        if transcript.is_empty() {
            return Err(Error::Validation(
                "recorded answer has neither audio nor a manual transcript".to_string(),
            ));
        }

        Ok(Self {
            kind: PayloadKind::TranscriptOnly,
            frames,
            audio_base64: String::new(),
            answer_text: transcript,
        })
    }

    /// Whether this payload carries a manual transcript that overrides
    /// server-side transcription of the audio.
    pub fn has_transcript_override(&self) -> bool {
        self.kind == PayloadKind::AudioWithFrames && !self.answer_text.is_empty()
    }
}
