use serde::Deserialize;

/// Percent-of-image rectangle. Values are expected in [0, 100] but the AI is
/// not trusted to respect that; `clamped` is applied at render time.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingBox {
    pub fn clamped(&self) -> BoundingBox {
        let clamp = |v: f32| v.clamp(0.0, 100.0);
        BoundingBox {
            x: clamp(self.x),
            y: clamp(self.y),
            w: clamp(self.w),
            h: clamp(self.h),
        }
    }
}

/// Where a critique point lands on the source material. The variant is chosen
/// once per session by the kind of material submitted, never per point.
#[derive(Debug, Clone, PartialEq)]
pub enum Anchor {
    Slide {
        /// Raw index as returned by the AI. Bounds are checked only when
        /// resolving anchors; out-of-range values simply never render.
        slide_index: i64,
        bounds: Option<BoundingBox>,
    },
    Text {
        /// Verbatim excerpt the AI claims to quote. May not actually occur in
        /// the report (paraphrase); match failure is tolerated downstream.
        original_text: String,
        suggestion: String,
    },
}

/// One objection raised by the professor. Immutable after ingestion except
/// for lazy audio attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct CritiquePoint {
    pub id: String,
    pub title: String,
    pub comment: String,
    /// Free-text category ("logical leap", "undefined term", ...). Advisory
    /// only, never validated against an enum.
    pub hole_type: String,
    pub anchor: Anchor,
    /// Base64 PCM16LE@24kHz clip of the professor reading this point aloud.
    pub audio: Option<String>,
}

impl CritiquePoint {
    pub fn attach_audio(&mut self, clip: String) {
        self.audio = Some(clip);
    }
}

/// Which shape of anchor this session produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Slides,
    Report,
}

/// Wire shape of one feedback entry. Every field is optional on the wire;
/// whatever the AI omits degrades to a default rather than failing the parse.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawFeedback {
    pub id: String,
    pub title: String,
    pub comment: String,
    pub hole_type: String,
    pub slide_index: Option<i64>,
    pub coordinates: Option<BoundingBox>,
    pub original_text: Option<String>,
    pub suggestion: Option<String>,
}

/// Wire shape of a whole critique response. A missing `overallComment` or a
/// missing/empty `feedbacks` array is tolerated, not an error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CritiqueReply {
    pub overall_comment: String,
    pub feedbacks: Vec<RawFeedback>,
}

/// Builds the session's critique-point collection from raw feedback entries,
/// picking the anchor variant by source kind. Duplicate ids within a batch
/// resolve last-write-wins, in place, so array order stays stable.
pub fn ingest_feedbacks(kind: SourceKind, raw: Vec<RawFeedback>) -> Vec<CritiquePoint> {
    let mut points: Vec<CritiquePoint> = Vec::with_capacity(raw.len());
    for fb in raw {
        let anchor = match kind {
            SourceKind::Slides => Anchor::Slide {
                slide_index: fb.slide_index.unwrap_or(0),
                bounds: fb.coordinates,
            },
            SourceKind::Report => Anchor::Text {
                original_text: fb.original_text.unwrap_or_default(),
                suggestion: fb.suggestion.unwrap_or_default(),
            },
        };
        let point = CritiquePoint {
            id: fb.id,
            title: fb.title,
            comment: fb.comment,
            hole_type: fb.hole_type,
            anchor,
            audio: None,
        };
        if let Some(existing) = points.iter_mut().find(|p| p.id == point.id) {
            tracing::warn!("Duplicate critique point id '{}', keeping the later one", point.id);
            *existing = point;
        } else {
            points.push(point);
        }
    }
    points
}
