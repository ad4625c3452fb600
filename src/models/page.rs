use super::TranscriptLine;

/// Raw date strings found on a transcript page, in order of preference
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SittingDateCandidates {
    /// Text of the last table cell on the page
    pub table_cell: Option<String>,
    /// Concatenated free-form header blocks
    pub header_text: Option<String>,
}

/// One fetched page of a session's spoken record
#[derive(Debug, Clone, Default)]
pub struct TranscriptPage {
    /// URL or file path the page came from
    pub source: String,
    /// Page title, used to detect the "in review" publication status
    pub title: String,
    /// Normalized lines of the content region
    pub lines: Vec<TranscriptLine>,
    /// Where the sitting date may be found
    pub date_candidates: SittingDateCandidates,
    /// The portal returned its "document unavailable" notice instead of content
    pub unavailable: bool,
}

impl TranscriptPage {
    /// Build a page directly from already-normalized lines
    pub fn from_lines(source: &str, title: &str, lines: Vec<TranscriptLine>) -> Self {
        Self {
            source: source.to_string(),
            title: title.to_string(),
            lines,
            ..Default::default()
        }
    }

    /// Whether the page title marks the record as still under review
    pub fn is_in_review(&self, marker: &str) -> bool {
        self.title.to_lowercase().contains(&marker.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_review_title() {
        let page = TranscriptPage::from_lines("a", "Dobesedni zapis - V pregledu", vec![]);
        assert!(page.is_in_review("v pregledu"));

        let page = TranscriptPage::from_lines("b", "Dobesedni zapis seje", vec![]);
        assert!(!page.is_in_review("v pregledu"));
    }
}
