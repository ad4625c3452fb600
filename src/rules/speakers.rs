use regex::Regex;

use super::NameNormalizer;

/// One named entry of the speaker-detection table
#[derive(Debug, Clone)]
pub struct SpeakerPattern {
    pub name: String,
    /// Capture group 1 holds the speaker
    pub regex: Regex,
    /// Whether the capture must pass name validation
    pub validate: bool,
}

/// A speaker announcement found in bold lead text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakerMatch {
    /// Name of the table entry that accepted the candidate
    pub pattern: String,
    /// Captured speaker, trimmed
    pub speaker: String,
}

/// Ordered rule table deciding whether bold text announces a speaker
#[derive(Debug, Clone)]
pub struct SpeakerDetector {
    patterns: Vec<SpeakerPattern>,
}

impl SpeakerDetector {
    pub fn new(patterns: Vec<SpeakerPattern>) -> Self {
        Self { patterns }
    }

    pub fn pattern_names(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.name.as_str())
    }

    /// Try each pattern in table order
    ///
    /// A pattern accepts when it matches exactly once and, if it requires
    /// validation, the captured name passes the normalizer.
    pub fn detect(&self, candidate: &str, names: &NameNormalizer) -> Option<SpeakerMatch> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return None;
        }

        for pattern in &self.patterns {
            let mut captures = pattern.regex.captures_iter(candidate);
            let (Some(first), None) = (captures.next(), captures.next()) else {
                continue;
            };
            let Some(speaker) = first.get(1).map(|m| m.as_str()) else {
                continue;
            };
            if pattern.validate && !names.is_valid_name(speaker) {
                continue;
            }
            return Some(SpeakerMatch {
                pattern: pattern.name.clone(),
                speaker: speaker.trim().to_string(),
            });
        }

        None
    }
}
