/// Validates and cleans speaker-name candidates
///
/// Bolded text in a transcript is either a speaker announcement or a bolded
/// agenda/topic phrase. The denylist of procedural vocabulary and the word
/// limit tell the two apart.
#[derive(Debug, Clone)]
pub struct NameNormalizer {
    max_words: usize,
    denylist: Vec<String>,
    title_prefixes: Vec<String>,
}

impl NameNormalizer {
    pub fn new(max_words: usize, denylist: Vec<String>, title_prefixes: Vec<String>) -> Self {
        Self {
            max_words,
            denylist: denylist.into_iter().map(|w| w.to_lowercase()).collect(),
            title_prefixes,
        }
    }

    /// Whether a candidate may be a speaker name
    ///
    /// Rejects candidates with more than `max_words` space-separated tokens
    /// and candidates containing any denylisted word as a substring.
    pub fn is_valid_name(&self, candidate: &str) -> bool {
        let candidate = candidate.trim();
        if candidate.split(' ').count() > self.max_words {
            return false;
        }

        let lower = candidate.to_lowercase();
        !self.denylist.iter().any(|word| lower.contains(word.as_str()))
    }

    /// Strip chair titles from the start of a name
    ///
    /// Each prefix is tried once, in table order, case-sensitively.
    pub fn fix_name(&self, raw: &str) -> String {
        let mut name = raw.trim();
        for prefix in &self.title_prefixes {
            if let Some(rest) = name.strip_prefix(prefix.as_str()) {
                name = rest.trim();
            }
        }
        name.to_string()
    }
}
