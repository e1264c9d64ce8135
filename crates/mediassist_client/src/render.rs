//! Plain-text rendering of turns for terminal output.

use std::fmt::Write as _;

use crate::conversation::{Citation, Turn};

pub const DISCLAIMER: &str = "IMPORTANT DISCLAIMER: MediAssist is an information retrieval tool \
that summarises DOH and WHO documents. It is NOT a substitute for professional medical advice, \
diagnosis, or treatment. Always seek the advice of a qualified healthcare provider with any \
questions you may have regarding a medical condition.";

pub const ASSISTANT_NAME: &str = "MediAssist";

pub fn format_citation(citation: &Citation) -> String {
    format!("{} (p. {})", citation.filename, citation.page)
}

/// "1 Source Cited", "3 Sources Cited".
pub fn citation_summary(count: usize) -> String {
    if count == 1 {
        "1 Source Cited".into()
    } else {
        format!("{} Sources Cited", count)
    }
}

/// Speaker label, content, then citations and confidence for assistant turns.
pub fn format_turn(turn: &Turn) -> String {
    let speaker = if turn.is_user() { "You" } else { ASSISTANT_NAME };
    let mut out = format!("{}: {}", speaker, turn.content);
    if !turn.is_user() {
        if !turn.sources.is_empty() {
            let _ = write!(out, "\n{}", citation_summary(turn.sources.len()));
            for source in &turn.sources {
                let _ = write!(out, "\n  {}", format_citation(source));
            }
        }
        if let Some(confidence) = &turn.confidence {
            let _ = write!(out, "\nConfidence: {}", confidence);
        }
    }
    out
}
