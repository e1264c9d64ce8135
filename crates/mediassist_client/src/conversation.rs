//! Conversation model: turns, citations, and the ordered conversation they form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::num::NonZeroU32;

/// Text of the assistant turn appended when an exchange fails.
pub const FALLBACK_REPLY: &str =
    "I am having trouble connecting to the service. Please try again later.";

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Document/page reference attached to an assistant turn.
///
/// The backend's vector-store metadata names the file `source`; both that
/// and `filename` are accepted. Pages start at 1, so a zero page fails to
/// deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Citation {
    #[serde(alias = "source")]
    pub filename: String,
    pub page: NonZeroU32,
}

impl Citation {
    /// Returns `None` when `page` is 0.
    pub fn new(filename: impl Into<String>, page: u32) -> Option<Self> {
        Some(Self {
            filename: filename.into(),
            page: NonZeroU32::new(page)?,
        })
    }
}

/// Answer confidence as reported by the backend: a score or a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Confidence {
    Score(f64),
    Label(String),
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Score(score) => write!(f, "{:.2}", score),
            Confidence::Label(label) => write!(f, "{}", label),
        }
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Citation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sources: Vec::new(),
            confidence: None,
            created_at: Utc::now(),
        }
    }

    /// Assistant turn; duplicate citations are dropped, first occurrence wins.
    pub fn assistant(
        content: impl Into<String>,
        sources: Vec<Citation>,
        confidence: Option<Confidence>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            sources: deduplicate_citations(sources),
            confidence,
            created_at: Utc::now(),
        }
    }

    pub fn fallback() -> Self {
        Self::assistant(FALLBACK_REPLY, Vec::new(), None)
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

fn deduplicate_citations(sources: Vec<Citation>) -> Vec<Citation> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for source in sources {
        if seen.insert(source.clone()) {
            unique.push(source);
        }
    }
    unique
}

/// Ordered sequence of turns. Insertion order is significant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub(crate) fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub(crate) fn clear(&mut self) {
        self.turns.clear();
    }
}

impl From<Vec<Turn>> for Conversation {
    fn from(turns: Vec<Turn>) -> Self {
        Self { turns }
    }
}

impl<'a> IntoIterator for &'a Conversation {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}
