use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::models::{SittingDateCandidates, TranscriptLine, TranscriptPage};

/// Notice the portal renders in place of a withdrawn document
pub const UNAVAILABLE_NOTICE: &str = "Podatki dokumenta so nedostopni.";

static SPACES_BETWEEN_BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</b>(\s*)<b>").expect("valid bold-join regex"));
static EMPTY_BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<b>(\s*)</b>").expect("valid empty-bold regex"));
static FONT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?font[^>]*>").expect("valid font-tag regex"));
static BR_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid br regex"));

/// CSS selectors used on transcript pages
struct PageSelectors {
    title: Selector,
    heading: Selector,
    message: Selector,
    table_cell: Selector,
    header_block: Selector,
    content_block: Selector,
}

impl PageSelectors {
    fn new() -> Self {
        Self {
            title: Selector::parse("title").expect("title selector"),
            heading: Selector::parse("h1, h2").expect("heading selector"),
            message: Selector::parse("form span.wcmLotusMessage").expect("message selector"),
            table_cell: Selector::parse("table td").expect("table cell selector"),
            header_block: Selector::parse("form > div > div").expect("header selector"),
            content_block: Selector::parse("form > div").expect("content selector"),
        }
    }
}

static SELECTORS: LazyLock<PageSelectors> = LazyLock::new(PageSelectors::new);

/// Perform Stage 0: turn a fetched transcript document into a page of lines
///
/// A page without the expected content region yields zero lines rather than
/// an error; transcripts sporadically omit sections.
pub fn parse_transcript_html(source: &str, html: &str) -> TranscriptPage {
    let document = Html::parse_document(html);
    let selectors = &*SELECTORS;

    let title = document
        .select(&selectors.title)
        .next()
        .or_else(|| document.select(&selectors.heading).next())
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .unwrap_or_default();

    let unavailable = document
        .select(&selectors.message)
        .next()
        .is_some_and(|el| el.text().collect::<String>().trim() == UNAVAILABLE_NOTICE);
    if unavailable {
        warn!(source, "Document data is unavailable");
    }

    let date_candidates = SittingDateCandidates {
        table_cell: document
            .select(&selectors.table_cell)
            .last()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|text| !text.is_empty()),
        header_text: {
            let blocks: Vec<String> = document
                .select(&selectors.header_block)
                .map(|el| el.inner_html())
                .collect();
            (!blocks.is_empty()).then(|| blocks.join(" "))
        },
    };

    let lines = match document.select(&selectors.content_block).nth(1) {
        Some(content) => split_lines(content),
        None => {
            debug!(source, "Page has no content region");
            Vec::new()
        }
    };

    TranscriptPage {
        source: source.to_string(),
        title,
        lines,
        date_candidates,
        unavailable,
    }
}

/// Split the content region into lines at `<br>` boundaries
fn split_lines(content: ElementRef<'_>) -> Vec<TranscriptLine> {
    split_markup(&content.inner_html())
}

/// Normalize inline markup and split it into trimmed lines
pub fn split_markup(markup: &str) -> Vec<TranscriptLine> {
    let markup = FONT_TAG.replace_all(markup, "");
    let markup = SPACES_BETWEEN_BOLD.replace_all(&markup, "$1");
    let markup = EMPTY_BOLD.replace_all(&markup, "$1");

    BR_TAG
        .split(&markup)
        .map(TranscriptLine::from_markup)
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
