use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

/// One line of a transcript after markup normalization.
///
/// The raw markup is kept because bold spans carry the speaker announcement
/// and track markers; everything else is read from the plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    /// Trimmed line markup (only inline tags such as `<b>` remain)
    pub raw: String,
    /// Plain text content, trimmed
    pub text: String,
    /// Text of the first bold span, if any
    pub bold: Option<String>,
    /// Text directly following the first bold span, if any
    pub tail: Option<String>,
}

impl TranscriptLine {
    /// Build a line from inline markup such as `<b>NAME:</b> text`
    pub fn from_markup(raw: &str) -> Self {
        let raw = raw.trim();
        if !raw.contains('<') && !raw.contains('&') {
            return Self::plain(raw);
        }

        let fragment = Html::parse_fragment(&format!("<span>{}</span>", raw));
        let text: String = fragment.root_element().text().collect();

        let (bold, tail) = match Selector::parse("b") {
            Ok(selector) => match fragment.select(&selector).next() {
                Some(element) => (Some(element.text().collect::<String>()), text_after(element)),
                None => (None, None),
            },
            Err(_) => (None, None),
        };

        Self {
            raw: raw.to_string(),
            text: text.trim().to_string(),
            bold,
            tail,
        }
    }

    /// Build a line without any markup
    pub fn plain(text: &str) -> Self {
        let text = text.trim();
        Self {
            raw: text.to_string(),
            text: text.to_string(),
            bold: None,
            tail: None,
        }
    }

    /// Whether the line carries no visible text
    pub fn is_blank(&self) -> bool {
        self.text.is_empty()
    }
}

/// Text node immediately following an element
fn text_after(element: ElementRef<'_>) -> Option<String> {
    let sibling = element.next_sibling()?;
    match sibling.value() {
        Node::Text(text) => Some(String::from(&**text)),
        _ => None,
    }
}
