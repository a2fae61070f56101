//! Plain-text layout of exported incident documents.
//!
//! The hosted platform turns this layout into a PDF; the in-memory backend stores it as is.

use std::fmt::Write as _;

use super::ExportSection;
use crate::components::narrative::Phase;
use crate::snapshot::CaptureSnapshot;

/// Renders the requested sections of `snapshot`, in the order given.
///
/// Sections without data are rendered with a placeholder line rather than omitted, so the
/// document always shows every section the reporter asked for.
pub fn render_document(snapshot: &CaptureSnapshot, sections: &[ExportSection]) -> String {
    let mut out = String::from("NDIS Incident Report\n====================\n");

    for section in sections {
        out.push('\n');
        match section {
            ExportSection::Metadata => render_metadata(snapshot, &mut out),
            ExportSection::Narrative => render_narrative(snapshot, &mut out),
            ExportSection::Clarifications => render_clarifications(snapshot, &mut out),
            ExportSection::EnhancedNarrative => {
                heading(&mut out, "Enhanced narrative");
                match &snapshot.enhanced {
                    Some(enhanced) => {
                        out.push_str(enhanced.effective_text().trim_end());
                        out.push('\n');
                    }
                    None => out.push_str("Not generated.\n"),
                }
            }
        }
    }

    out
}

fn heading(out: &mut String, title: &str) {
    let _ = writeln!(out, "{title}\n{}", "-".repeat(title.len()));
}

fn render_metadata(snapshot: &CaptureSnapshot, out: &mut String) {
    heading(out, "Incident details");
    let Some(incident) = &snapshot.incident else {
        out.push_str("Not recorded.\n");
        return;
    };
    let _ = writeln!(out, "Participant: {}", incident.participant_name);
    let _ = writeln!(out, "Reported by: {}", incident.reporter_name);
    let _ = writeln!(out, "Date and time: {}", incident.event_date_time.to_rfc3339());
    let _ = writeln!(out, "Location: {}", incident.location);
    let _ = writeln!(out, "Capture status: {}", incident.capture_status);
}

fn render_narrative(snapshot: &CaptureSnapshot, out: &mut String) {
    heading(out, "Narrative");
    let Some(phases) = snapshot.narrative_phases() else {
        out.push_str("Not recorded.\n");
        return;
    };
    for phase in Phase::ALL {
        let text = phases.get(phase).trim();
        let _ = writeln!(
            out,
            "{}: {}",
            phase.label(),
            if text.is_empty() { "(blank)" } else { text }
        );
    }
}

fn render_clarifications(snapshot: &CaptureSnapshot, out: &mut String) {
    heading(out, "Clarifications");
    if snapshot.questions.is_empty() {
        out.push_str("No questions generated.\n");
        return;
    }
    for (phase, questions) in &snapshot.questions {
        let _ = writeln!(out, "{}", phase.label());
        for question in questions {
            let answer = question
                .answer
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .unwrap_or("(unanswered)");
            let _ = writeln!(out, "  {}. {}", question.ordinal, question.question_text);
            let _ = writeln!(out, "     {answer}");
        }
    }
}
