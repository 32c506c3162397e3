//! Terminal rendering of a session: anchored critique per slide or inline
//! span markers over the report text, the sidebar list, and the dialogue log.
//! Consumes resolved anchors only; all matching lives in the core.

use anasagashi_core::critique::{Anchor, SourceKind};
use anasagashi_core::dialogue::{Message, Role};
use anasagashi_core::matcher::{slide_anchors, text_spans};
use anasagashi_core::session::Session;
use std::fmt::Write as _;

const SPAN_OPEN: &str = ">>>";
const SPAN_CLOSE: &str = "<<<";

pub fn render_critique(session: &Session) -> String {
    match session.material.kind() {
        SourceKind::Slides => render_slide_critique(session),
        SourceKind::Report => render_report_critique(session),
    }
}

fn render_slide_critique(session: &Session) -> String {
    // Objections are numbered by their position in the critique reply, which
    // is what `:play <n>` addresses.
    let number = |id: &str| {
        session
            .points
            .iter()
            .position(|p| p.id == id)
            .map_or(0, |i| i + 1)
    };
    let total = session.total_slides();
    let mut out = String::new();
    for index in 0..total {
        let anchors = slide_anchors(&session.points, index, total);
        let _ = writeln!(out, "── Slide {}/{} ──", index + 1, total);
        if anchors.is_empty() {
            out.push_str("  (no objections on this slide, yet)\n");
            continue;
        }
        for anchor in anchors {
            match anchor.bounds {
                Some(b) => {
                    let _ = writeln!(
                        out,
                        "  {}. [{}] {} — at {:.0}%,{:.0}% ({:.0}%×{:.0}%)",
                        number(&anchor.point.id),
                        anchor.point.hole_type,
                        anchor.point.title,
                        b.x,
                        b.y,
                        b.w,
                        b.h
                    );
                }
                None => {
                    let _ = writeln!(
                        out,
                        "  {}. [{}] {}",
                        number(&anchor.point.id),
                        anchor.point.hole_type,
                        anchor.point.title
                    );
                }
            }
            let _ = writeln!(out, "      {}", anchor.point.comment);
        }
    }
    // Points whose slide index is out of range still belong in the listing.
    let orphans: Vec<_> = session
        .points
        .iter()
        .filter(
            |p| matches!(p.anchor, Anchor::Slide { slide_index, .. } if slide_index < 0 || slide_index >= total as i64),
        )
        .collect();
    if !orphans.is_empty() {
        out.push_str("── Unplaced objections ──\n");
        for point in orphans {
            let _ = writeln!(
                out,
                "  {}. [{}] {}: {}",
                number(&point.id),
                point.hole_type,
                point.title,
                point.comment
            );
        }
    }
    out
}

fn render_report_critique(session: &Session) -> String {
    let report = session.material.report.as_deref().unwrap_or_default();
    let spans = text_spans(report, &session.points);

    // Rebuild the report with span markers around every resolved excerpt.
    let mut highlighted = String::with_capacity(report.len());
    let mut cursor = 0;
    for span in &spans {
        highlighted.push_str(&report[cursor..span.start]);
        highlighted.push_str(SPAN_OPEN);
        highlighted.push_str(&report[span.start..span.end]);
        highlighted.push_str(SPAN_CLOSE);
        cursor = span.end;
    }
    highlighted.push_str(&report[cursor..]);

    let mut out = String::new();
    out.push_str("── Report ──\n");
    out.push_str(&highlighted);
    if !highlighted.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("── Objections ──\n");
    for (index, point) in session.points.iter().enumerate() {
        let inline = spans.iter().any(|s| s.point.id == point.id);
        let marker = if inline { "" } else { " (no inline match)" };
        let _ = writeln!(
            out,
            "  {}. [{}] {}{}: {}",
            index + 1,
            point.hole_type,
            point.title,
            marker,
            point.comment
        );
        if let Anchor::Text { suggestion, .. } = &point.anchor {
            if !suggestion.is_empty() {
                let _ = writeln!(out, "      suggestion: {suggestion}");
            }
        }
    }
    out
}

pub fn render_message(message: &Message) -> String {
    let speaker = match message.role {
        Role::Professor => "Professor",
        Role::User => "You",
    };
    format!("{speaker}: {}", message.text)
}
