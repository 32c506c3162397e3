use crate::critique::{CritiquePoint, SourceKind};
use crate::dialogue::Dialogue;
use crate::persona::Persona;

/// The material a session is started from: slide page images (base64 PNG, in
/// presentation order), an optional spoken-presentation transcript, and/or a
/// written report. Slides win when both are present, matching how the anchor
/// variant is chosen.
#[derive(Debug, Clone, Default)]
pub struct SourceMaterial {
    pub slides: Vec<String>,
    pub transcript: Option<String>,
    pub report: Option<String>,
}

impl SourceMaterial {
    /// A session needs at least one slide or non-empty report text. A bare
    /// transcript is not enough to critique.
    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
            && self
                .report
                .as_deref()
                .is_none_or(|r| r.trim().is_empty())
    }

    pub fn kind(&self) -> SourceKind {
        if self.slides.is_empty() {
            SourceKind::Report
        } else {
            SourceKind::Slides
        }
    }
}

/// The complete state of one analysis-and-dialogue cycle. Exactly one session
/// is live at a time; starting a new one discards the previous in full.
#[derive(Debug)]
pub struct Session {
    pub material: SourceMaterial,
    pub persona: Persona,
    /// Resolved system-prompt text (persona default or startup override),
    /// frozen when analysis starts.
    pub system_prompt: String,
    pub points: Vec<CritiquePoint>,
    pub dialogue: Dialogue,
}

impl Session {
    pub fn total_slides(&self) -> usize {
        self.material.slides.len()
    }
}
