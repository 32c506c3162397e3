//! Resolves critique points to renderable anchors: percentage rectangles on a
//! slide, or byte spans inside the report text.
//!
//! Resolution is a pure function of immutable session data, so running it
//! twice yields identical anchors.

use crate::critique::{Anchor, BoundingBox, CritiquePoint};

/// A critique point resolved against one slide. `bounds` is `None` when the
/// AI gave no drawable region; the point still belongs in the sidebar.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideAnchor<'a> {
    pub point: &'a CritiquePoint,
    pub bounds: Option<BoundingBox>,
}

/// A critique point resolved to a byte span of the report text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan<'a> {
    pub point: &'a CritiquePoint,
    pub start: usize,
    pub end: usize,
}

/// Anchors for one slide, in arrival order. Out-of-range slide indices are a
/// data-quality fault: those points never resolve to any slide, they are not
/// an error. Overlapping boxes stack in arrival order; no reconciliation.
pub fn slide_anchors<'a>(
    points: &'a [CritiquePoint],
    slide_index: usize,
    total_slides: usize,
) -> Vec<SlideAnchor<'a>> {
    if slide_index >= total_slides {
        return Vec::new();
    }
    points
        .iter()
        .filter(|p| matches!(p.anchor, Anchor::Slide { slide_index: i, .. } if i == slide_index as i64))
        .map(|p| {
            let bounds = match &p.anchor {
                Anchor::Slide { bounds, .. } => bounds.map(|b| b.clamped()),
                _ => None,
            };
            SlideAnchor { point: p, bounds }
        })
        .collect()
}

/// Resolves text-anchored points to spans inside `report`, longest quoted
/// excerpt first so a shorter excerpt that happens to sit inside an already
/// claimed span does not double-highlight it. Points whose excerpt cannot be
/// found outside claimed regions are skipped silently; they still appear in
/// the sidebar by title and comment. Returned spans are sorted by offset.
pub fn text_spans<'a>(report: &str, points: &'a [CritiquePoint]) -> Vec<TextSpan<'a>> {
    let mut candidates: Vec<(&'a CritiquePoint, &str)> = points
        .iter()
        .filter_map(|p| match &p.anchor {
            Anchor::Text { original_text, .. } if !original_text.is_empty() => {
                Some((p, original_text.as_str()))
            }
            _ => None,
        })
        .collect();
    // Longest-match-first. A stable sort keeps arrival order between equal
    // lengths, so resolution stays deterministic.
    candidates.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

    let mut claimed: Vec<(usize, usize)> = Vec::new();
    let mut spans: Vec<TextSpan<'a>> = Vec::new();
    for (point, needle) in candidates {
        let found = report.match_indices(needle).find_map(|(start, m)| {
            let end = start + m.len();
            let overlaps = claimed.iter().any(|&(s, e)| start < e && s < end);
            (!overlaps).then_some((start, end))
        });
        if let Some((start, end)) = found {
            claimed.push((start, end));
            spans.push(TextSpan { point, start, end });
        } else {
            tracing::debug!(
                "No unclaimed occurrence of excerpt for critique point '{}'",
                point.id
            );
        }
    }
    spans.sort_by_key(|s| s.start);
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::critique::Anchor;

    fn slide_point(id: &str, index: i64, bounds: Option<BoundingBox>) -> CritiquePoint {
        CritiquePoint {
            id: id.into(),
            title: format!("point {id}"),
            comment: "…".into(),
            hole_type: "logical leap".into(),
            anchor: Anchor::Slide { slide_index: index, bounds },
            audio: None,
        }
    }

    fn text_point(id: &str, excerpt: &str) -> CritiquePoint {
        CritiquePoint {
            id: id.into(),
            title: format!("point {id}"),
            comment: "…".into(),
            hole_type: "vague wording".into(),
            anchor: Anchor::Text {
                original_text: excerpt.into(),
                suggestion: String::new(),
            },
            audio: None,
        }
    }

    #[test]
    fn slide_anchors_filter_by_index_and_clamp() {
        let points = vec![
            slide_point("a", 0, Some(BoundingBox { x: 10.0, y: 10.0, w: 150.0, h: 5.0 })),
            slide_point("b", 1, None),
            slide_point("c", 0, None),
            slide_point("d", -3, None),
            slide_point("e", 99, None),
        ];

        let anchors = slide_anchors(&points, 0, 3);
        assert_eq!(anchors.len(), 2);
        assert_eq!(anchors[0].point.id, "a");
        // Box clamped into [0, 100].
        assert_eq!(anchors[0].bounds.unwrap().w, 100.0);
        // Boxless point still resolves, just with nothing to draw.
        assert_eq!(anchors[1].point.id, "c");
        assert!(anchors[1].bounds.is_none());

        // Out-of-range slide requests resolve to nothing rather than panic.
        assert!(slide_anchors(&points, 99, 3).is_empty());
    }

    #[test]
    fn slide_anchor_resolution_is_idempotent() {
        let points = vec![
            slide_point("a", 1, Some(BoundingBox { x: 1.0, y: 2.0, w: 3.0, h: 4.0 })),
            slide_point("b", 1, None),
        ];
        let first = slide_anchors(&points, 1, 2);
        let second = slide_anchors(&points, 1, 2);
        assert_eq!(first, second);
    }

    #[test]
    fn exact_substring_yields_exact_span() {
        let report = "We measured the response. The effect was strong.";
        let points = vec![text_point("a", "The effect was strong")];
        let spans = text_spans(report, &points);
        assert_eq!(spans.len(), 1);
        assert_eq!(&report[spans[0].start..spans[0].end], "The effect was strong");
    }

    #[test]
    fn longest_match_claims_priority() {
        let report = "The sample size was too small to matter.";
        let points = vec![
            text_point("short", "too small"),
            text_point("long", "sample size was too small"),
        ];
        let spans = text_spans(report, &points);
        // Only the longer excerpt renders; the shorter one's sole occurrence
        // sits inside the claimed span and is skipped.
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].point.id, "long");
        assert_eq!(
            &report[spans[0].start..spans[0].end],
            "sample size was too small"
        );
    }

    #[test]
    fn shorter_match_falls_through_to_unclaimed_occurrence() {
        let report = "sample size was too small, and the cohort was too small as well";
        let points = vec![
            text_point("short", "too small"),
            text_point("long", "sample size was too small"),
        ];
        let spans = text_spans(report, &points);
        assert_eq!(spans.len(), 2);
        // Sorted by offset: the long span first, then the short one's second
        // occurrence, outside the claimed region.
        assert_eq!(spans[0].point.id, "long");
        assert_eq!(spans[1].point.id, "short");
        assert!(spans[1].start > spans[0].end);
    }

    #[test]
    fn hallucinated_excerpt_is_skipped_not_fatal() {
        let report = "A short report.";
        let points = vec![
            text_point("ghost", "this text never occurs"),
            text_point("real", "short report"),
        ];
        let spans = text_spans(report, &points);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].point.id, "real");
    }

    #[test]
    fn text_resolution_is_idempotent() {
        let report = "alpha beta gamma alpha";
        let points = vec![text_point("a", "alpha"), text_point("b", "alpha")];
        let first = text_spans(report, &points);
        let second = text_spans(report, &points);
        assert_eq!(first, second);
        // Both claim distinct occurrences.
        assert_eq!(first.len(), 2);
        assert_ne!(first[0].start, first[1].start);
    }
}
