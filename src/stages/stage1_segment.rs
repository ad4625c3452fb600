use tracing::debug;

use crate::models::{SpeechSegment, TranscriptLine, TranscriptPage};
use crate::rules::RuleSet;

/// State of the segmentation machine while walking one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Header lines before the spoken record starts
    Meta,
    /// Record has started, waiting for the first speaker
    PreContent,
    /// After a blank line: the next line may announce a speaker
    Name,
    /// Inside a speech
    Content,
    /// Just passed a tape/track marker
    Trak,
}

/// Result of segmenting one page
#[derive(Debug, Clone, Default)]
pub struct PageSegmentation {
    /// Segments in order of appearance; empty for a duplicate page
    pub segments: Vec<SpeechSegment>,
    /// Plain text of the header lines
    pub meta: Vec<String>,
    /// The line that opened the spoken record, if any
    pub content_start: Option<String>,
    /// The page repeated an earlier page of the same run
    pub duplicate: bool,
}

/// Segmentation state shared by the pages of one session run
///
/// Create one per session run; it only remembers the pages already
/// produced so that a repeated page contributes nothing.
pub struct SegmentationContext<'a> {
    rules: &'a RuleSet,
    seen_pages: Vec<Vec<SpeechSegment>>,
}

impl<'a> SegmentationContext<'a> {
    pub fn new(rules: &'a RuleSet) -> Self {
        Self {
            rules,
            seen_pages: Vec::new(),
        }
    }

    /// Segment a page, suppressing pages identical to one already seen
    pub fn segment(&mut self, page: &TranscriptPage) -> PageSegmentation {
        let mut result = segment_lines(&page.lines, self.rules);

        if result.segments.is_empty() {
            return result;
        }

        if self.seen_pages.contains(&result.segments) {
            debug!(source = %page.source, "Skipping page identical to an earlier page");
            result.segments.clear();
            result.duplicate = true;
        } else {
            self.seen_pages.push(result.segments.clone());
        }

        result
    }
}

/// Perform Stage 1: split an ordered line sequence into speech segments
///
/// Pure function of the lines and the rule table.
pub fn segment_lines(lines: &[TranscriptLine], rules: &RuleSet) -> PageSegmentation {
    let mut machine = Segmenter::new(rules);
    for line in lines {
        machine.feed(line);
    }
    machine.finish()
}

/// Per-page machine: open speaker, accumulated fragments and output
struct Segmenter<'a> {
    rules: &'a RuleSet,
    state: ParserState,
    current_speaker: Option<String>,
    current_text: Vec<String>,
    segments: Vec<SpeechSegment>,
    meta: Vec<String>,
    content_start: Option<String>,
}

impl<'a> Segmenter<'a> {
    fn new(rules: &'a RuleSet) -> Self {
        Self {
            rules,
            state: ParserState::Meta,
            current_speaker: None,
            current_text: Vec::new(),
            segments: Vec::new(),
            meta: Vec::new(),
            content_start: None,
        }
    }

    fn feed(&mut self, line: &TranscriptLine) {
        if self.rules.track.find_trak(line) {
            self.state = ParserState::Trak;
            return;
        }

        if self.rules.markers.skip_pause.is_match(&line.text) {
            return;
        }

        match self.state {
            ParserState::Meta => {
                self.meta.push(line.text.clone());
                if self.rules.markers.opens_content(&line.raw) {
                    self.state = ParserState::PreContent;
                    self.content_start = Some(line.text.clone());
                }
            }
            ParserState::PreContent => {
                if !line.raw.is_empty() {
                    self.parse_person_line(line);
                }
            }
            ParserState::Name => self.parse_person_line(line),
            ParserState::Content => self.parse_text_line(line),
            ParserState::Trak => {
                if line.raw.is_empty() {
                    return;
                }
                match self.rules.track.strip_continuation(line) {
                    Some(stripped) => self.parse_person_line(&stripped),
                    None => self.parse_person_line(line),
                }
            }
        }
    }

    /// Start a new speech if the bold lead text names a speaker, otherwise
    /// treat the line as speech content
    fn parse_person_line(&mut self, line: &TranscriptLine) {
        if line.is_blank() {
            self.state = ParserState::Name;
            return;
        }

        let found = line
            .bold
            .as_deref()
            .and_then(|bold| self.rules.speakers.detect(bold, &self.rules.names));

        match found {
            Some(found) => {
                debug!(speaker = %found.speaker, pattern = %found.pattern, "Found speaker");
                self.flush();
                self.current_speaker = Some(found.speaker);
                if let Some(tail) = &line.tail {
                    self.current_text.push(tail.trim().to_string());
                }
            }
            None => self.parse_text_line(line),
        }

        self.state = ParserState::Content;
    }

    fn parse_text_line(&mut self, line: &TranscriptLine) {
        if self.rules.markers.is_announcement(&line.text) {
            return;
        }

        if line.is_blank() {
            self.state = ParserState::Name;
        } else if self.state == ParserState::Trak && !self.current_text.is_empty() {
            self.append_to_last(&line.text);
        } else {
            self.current_text.push(line.text.clone());
        }
    }

    /// Continue the last fragment across a track marker
    fn append_to_last(&mut self, text: &str) {
        while self.current_text.last().is_some_and(|t| t.is_empty()) {
            self.current_text.pop();
        }
        match self.current_text.last_mut() {
            Some(last) => {
                last.push(' ');
                last.push_str(text);
            }
            None => self.current_text.push(text.to_string()),
        }
    }

    /// Emit the open speech, if it has any fragments
    fn flush(&mut self) {
        let Some(speaker) = &self.current_speaker else {
            return;
        };
        if self.current_text.is_empty() {
            return;
        }

        let content = self.current_text.join("\n");
        self.segments.push(SpeechSegment {
            raw_speaker: speaker.clone(),
            speaker: self.rules.names.fix_name(speaker),
            content: content.trim_start_matches(':').to_string(),
            order: self.segments.len() + 1,
        });
        self.current_text.clear();
    }

    fn finish(mut self) -> PageSegmentation {
        self.flush();
        PageSegmentation {
            segments: self.segments,
            meta: self.meta,
            content_start: self.content_start,
            duplicate: false,
        }
    }
}
