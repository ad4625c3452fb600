pub mod names;
pub mod speakers;
pub mod track;

pub use names::*;
pub use speakers::*;
pub use track::*;

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

/// Rule table shipped with the crate
pub const DEFAULT_RULES: &str = include_str!("../../rules/default.toml");

/// Errors raised while loading a rule table
#[derive(Debug, Error)]
pub enum RulesError {
    #[error("failed to read rules file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid rules document: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("pattern `{name}` does not compile: {source}")]
    Pattern {
        name: String,
        #[source]
        source: regex::Error,
    },
    #[error("rule table defines no speaker patterns")]
    NoSpeakerPatterns,
}

/// Rule table as written in TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSpec {
    pub markers: MarkerSpec,
    pub dates: DateSpec,
    pub speaker_patterns: Vec<SpeakerPatternSpec>,
    pub names: NameSpec,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkerSpec {
    pub content_start: String,
    pub content_start_prefix: String,
    pub working_body_opening: String,
    pub session_pause: String,
    pub end_of_session: String,
    pub skip_pause: String,
    pub track: String,
    pub track_continuation: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DateSpec {
    pub start_time: String,
    pub page_date: String,
    pub meta_date: String,
    pub meta_date_body: String,
    pub months: HashMap<String, u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeakerPatternSpec {
    pub name: String,
    pub pattern: String,
    #[serde(default = "default_validate")]
    pub validate: bool,
}

fn default_validate() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct NameSpec {
    #[serde(default = "default_max_words")]
    pub max_words: usize,
    #[serde(default)]
    pub denylist: Vec<String>,
    #[serde(default)]
    pub title_prefixes: Vec<String>,
}

fn default_max_words() -> usize {
    5
}

/// Line markers that steer the segmentation state machine
#[derive(Debug, Clone)]
pub struct Markers {
    pub content_start: Regex,
    pub content_start_prefix: String,
    pub working_body_opening: Regex,
    pub session_pause: Regex,
    pub end_of_session: Regex,
    pub skip_pause: Regex,
}

impl Markers {
    /// Whether a META line opens the spoken record
    pub fn opens_content(&self, raw: &str) -> bool {
        self.content_start.is_match(raw)
            || raw.starts_with(&self.content_start_prefix)
            || self.working_body_opening.is_match(raw)
    }

    /// Pause/resume or end-of-session announcement that carries no speech
    pub fn is_announcement(&self, text: &str) -> bool {
        self.session_pause.is_match(text) || self.end_of_session.is_match(text)
    }
}

/// Date and time patterns
#[derive(Debug, Clone)]
pub struct DatePatterns {
    pub start_time: Regex,
    pub page_date: Regex,
    pub meta_date: Regex,
    pub meta_date_body: Regex,
    /// Lowercase month name to month number
    pub months: HashMap<String, u32>,
}

/// Compiled rule table
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub markers: Markers,
    pub track: TrackFilter,
    pub speakers: SpeakerDetector,
    pub names: NameNormalizer,
    pub dates: DatePatterns,
}

impl RuleSet {
    /// The rule table embedded in the binary
    pub fn builtin() -> Result<Self, RulesError> {
        Self::from_toml_str(DEFAULT_RULES)
    }

    /// Load a rule table from disk
    pub fn load(path: &Path) -> Result<Self, RulesError> {
        let content = std::fs::read_to_string(path).map_err(|source| RulesError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, RulesError> {
        let table: RuleSpec = toml::from_str(content)?;
        Self::compile(table)
    }

    pub fn compile(table: RuleSpec) -> Result<Self, RulesError> {
        let markers = Markers {
            content_start: compile("content_start", &table.markers.content_start)?,
            content_start_prefix: table.markers.content_start_prefix,
            working_body_opening: compile(
                "working_body_opening",
                &table.markers.working_body_opening,
            )?,
            session_pause: compile("session_pause", &table.markers.session_pause)?,
            end_of_session: compile("end_of_session", &table.markers.end_of_session)?,
            skip_pause: compile("skip_pause", &table.markers.skip_pause)?,
        };

        let track = TrackFilter::new(
            compile("track", &table.markers.track)?,
            table.markers.track_continuation,
        );

        if table.speaker_patterns.is_empty() {
            return Err(RulesError::NoSpeakerPatterns);
        }
        let patterns = table
            .speaker_patterns
            .into_iter()
            .map(|p| {
                Ok(SpeakerPattern {
                    regex: compile(&p.name, &p.pattern)?,
                    name: p.name,
                    validate: p.validate,
                })
            })
            .collect::<Result<Vec<_>, RulesError>>()?;

        let names = NameNormalizer::new(
            table.names.max_words,
            table.names.denylist,
            table.names.title_prefixes,
        );

        let dates = DatePatterns {
            start_time: compile("start_time", &table.dates.start_time)?,
            page_date: compile("page_date", &table.dates.page_date)?,
            meta_date: compile("meta_date", &table.dates.meta_date)?,
            meta_date_body: compile("meta_date_body", &table.dates.meta_date_body)?,
            months: table
                .dates
                .months
                .into_iter()
                .map(|(name, month)| (name.to_lowercase(), month))
                .collect(),
        };

        Ok(Self {
            markers,
            track,
            speakers: SpeakerDetector::new(patterns),
            names,
            dates,
        })
    }
}

fn compile(name: &str, pattern: &str) -> Result<Regex, RulesError> {
    Regex::new(pattern).map_err(|source| RulesError::Pattern {
        name: name.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_builtin_rules_compile() {
        let rules = RuleSet::builtin().unwrap();

        let names: Vec<&str> = rules.speakers.pattern_names().collect();
        assert_eq!(names, vec!["general", "anonymized", "minister"]);
        assert_eq!(rules.dates.months.get("marca"), Some(&3));
    }

    #[test]
    fn test_content_start_markers() {
        let rules = RuleSet::builtin().unwrap();

        assert!(rules.markers.opens_content("Seja se je začela ob 10.00"));
        assert!(rules.markers.opens_content("Besedilo je objavljeno v pregledu"));
        assert!(
            rules
                .markers
                .opens_content("Odprti del seje se je začel ob 09.05 uri.")
        );
        assert!(!rules.markers.opens_content("Državni zbor Republike Slovenije"));
    }

    #[test]
    fn test_announcements() {
        let rules = RuleSet::builtin().unwrap();

        assert!(rules.markers.is_announcement("(Seja je bila prekinjena ob 12.15.)"));
        assert!(rules.markers.is_announcement("Seja je bila končana 5. maja 2022."));
        assert!(!rules.markers.is_announcement("Hvala za besedo."));
    }

    #[test]
    fn test_load_custom_rules_file() {
        let custom = DEFAULT_RULES.replace("\"zoper\",", "\"zoper\",\n    \"novak\",");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(custom.as_bytes()).unwrap();

        let rules = RuleSet::load(file.path()).unwrap();
        assert!(!rules.names.is_valid_name("JANEZ NOVAK"));
        assert!(RuleSet::builtin().unwrap().names.is_valid_name("JANEZ NOVAK"));
    }

    #[test]
    fn test_bad_pattern_is_reported_by_name() {
        let broken = DEFAULT_RULES.replace(
            "skip_pause = '",
            "skip_pause = '(unclosed",
        );

        match RuleSet::from_toml_str(&broken) {
            Err(RulesError::Pattern { name, .. }) => assert_eq!(name, "skip_pause"),
            other => panic!("expected pattern error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_missing_file() {
        let err = RuleSet::load(Path::new("/nonexistent/rules.toml")).unwrap_err();
        assert!(matches!(err, RulesError::Io { .. }));
    }
}
