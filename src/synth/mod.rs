//! External collaborator boundaries: script generation and speech synthesis.
//!
//! The compositor neither generates text nor synthesizes speech; these traits
//! describe what it consumes. Implementations talk to whatever network
//! service the application uses and map failures through
//! [`classify_collaborator_error`] so quota and credential problems surface
//! distinctly from generic errors.

use crate::foundation::error::{SlidecastError, SlidecastResult};
use crate::scene::model::PcmAudio;

/// Requested narration length class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptLength {
    /// Under 30 seconds, roughly 2-3 sentences.
    Short,
    /// Under a minute, roughly 5-7 sentences.
    Medium,
    /// Under three minutes, roughly 15-20 sentences.
    Long,
}

/// Produces a narration script for one slide image.
pub trait ScriptGenerator {
    fn generate(
        &mut self,
        image_bytes: &[u8],
        audience: &str,
        length: ScriptLength,
    ) -> SlidecastResult<String>;
}

/// Produces a decoded PCM waveform for one narration script.
///
/// The core treats the result as opaque samples; it only needs the resulting
/// duration and raw data.
pub trait SpeechSynthesizer {
    fn synthesize(&mut self, text: &str, voice_id: &str) -> SlidecastResult<PcmAudio>;
}

/// Map a collaborator's error text onto the export error taxonomy.
///
/// Quota exhaustion (HTTP 429 or "quota" wording) and credential rejection
/// (401/403 or API-key wording) are recoverable by the caller and must not be
/// retried automatically; anything else stays a generic failure.
pub fn classify_collaborator_error(message: &str) -> SlidecastError {
    let lower = message.to_lowercase();
    if lower.contains("429") || lower.contains("quota") {
        return SlidecastError::SynthesisQuota(message.to_string());
    }
    if lower.contains("401") || lower.contains("403") || lower.contains("api key") {
        return SlidecastError::SynthesisAuth(message.to_string());
    }
    SlidecastError::Other(anyhow::anyhow!("{message}"))
}
