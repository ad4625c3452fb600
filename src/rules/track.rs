use regex::Regex;

use crate::models::TranscriptLine;

/// Detects tape/track change annotations ("2. TRAK", "3 in 4 TRAK")
#[derive(Debug, Clone)]
pub struct TrackFilter {
    marker: Regex,
    continuation_words: Vec<String>,
}

impl TrackFilter {
    pub fn new(marker: Regex, continuation_words: Vec<String>) -> Self {
        Self {
            marker,
            continuation_words,
        }
    }

    /// Whether the line's bold lead text is a track marker
    pub fn find_trak(&self, line: &TranscriptLine) -> bool {
        line.bold
            .as_deref()
            .is_some_and(|bold| self.marker.is_match(bold))
    }

    /// Remove a leading "(nadaljevanje)" from the line following a marker
    ///
    /// Returns `None` when the line does not start with a continuation word.
    pub fn strip_continuation(&self, line: &TranscriptLine) -> Option<TranscriptLine> {
        self.continuation_words
            .iter()
            .find_map(|word| line.raw.strip_prefix(word.as_str()))
            .map(TranscriptLine::from_markup)
    }
}
