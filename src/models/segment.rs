use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A contiguous (speaker, content) unit extracted from one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechSegment {
    /// Speaker exactly as captured from the bold announcement (trimmed)
    pub raw_speaker: String,
    /// Speaker with chair titles removed
    pub speaker: String,
    /// Content fragments joined by newlines
    pub content: String,
    /// 1-based position within the page
    pub order: usize,
}

impl SpeechSegment {
    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }
}

/// Speech as submitted to the storage collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechRecord {
    /// Person id returned by the person resolver
    #[serde(rename = "speaker")]
    pub speaker_id: i64,
    pub content: String,
    #[serde(rename = "session")]
    pub session_id: i64,
    /// 1-based position within the session, continuous across pages
    pub order: usize,
    pub start_time: Option<NaiveDateTime>,
}
