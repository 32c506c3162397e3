use crate::critique::CritiqueReply;
use crate::dialogue::Role;
use anyhow::Result;
use async_trait::async_trait;
#[cfg(any(test, feature = "test-mocks"))]
use mockall::automock;

/// Everything a critique request carries to the provider: the persona's
/// system-prompt text plus the submitted material. Slides are base64 PNG
/// page images in presentation order.
#[derive(Debug, Clone, Default)]
pub struct CritiqueRequest {
    pub system_prompt: String,
    pub slides: Vec<String>,
    pub transcript: Option<String>,
    pub report: Option<String>,
}

// The `ProfessorService` trait is the seam between the session core and the
// generative provider. The core never talks to the network itself; it is
// handed an implementation at construction, which is what makes the whole
// controller testable against `mockall`'s `MockProfessorService`.
#[async_trait]
#[cfg_attr(any(test, feature = "test-mocks"), automock)]
pub trait ProfessorService: Send + Sync {
    /// Requests a structured critique of the submitted material. The reply
    /// shape is tolerant: missing fields degrade to defaults.
    async fn critique(&self, request: CritiqueRequest) -> Result<CritiqueReply>;

    /// Synthesizes professor speech. Returns base64 PCM16LE mono at 24 kHz.
    async fn synthesize_voice(&self, text: &str, voice: &str) -> Result<String>;

    /// Transcribes an uploaded presentation recording to plain text.
    /// `mime_type` is the declared container type (audio/wav, audio/mpeg,
    /// audio/mp4, audio/m4a or audio/x-m4a).
    async fn transcribe(&self, audio_base64: &str, mime_type: &str) -> Result<String>;

    /// Counter-critiques a student rebuttal given the prior turn history.
    async fn counter(
        &self,
        system_prompt: &str,
        history: &[(Role, String)],
        user_text: &str,
    ) -> Result<String>;
}
