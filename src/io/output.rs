use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::models::PersonHandle;
use crate::stages::{IngestReport, ReparseMode};

/// Machine-readable output format
#[derive(Debug, Clone, Serialize)]
pub struct MachineReport {
    pub session_id: i64,
    pub run_id: String,
    #[serde(flatten)]
    pub mode: ReparseMode,
    pub invalidated: bool,
    pub aborted: bool,
    pub start_time_updated: Option<NaiveDateTime>,
    /// Speeches saved during the run, by order
    pub speeches: Vec<MachineSpeech>,
    /// Metadata about the processing
    pub metadata: ReportMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct MachineSpeech {
    pub order: usize,
    pub speaker_id: i64,
    pub speaker: String,
    pub content: String,
    pub start_time: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub total_speeches: usize,
    pub total_speakers: usize,
    pub pages_processed: usize,
    pub duplicate_pages: usize,
}

impl MachineReport {
    /// Create from a session run, naming speakers from the resolved people
    pub fn from_report(report: &IngestReport, people: &[PersonHandle]) -> Self {
        let names: HashMap<i64, &str> = people.iter().map(|p| (p.id, p.name.as_str())).collect();

        let speeches: Vec<MachineSpeech> = report
            .speeches
            .iter()
            .map(|s| MachineSpeech {
                order: s.order,
                speaker_id: s.speaker_id,
                speaker: names
                    .get(&s.speaker_id)
                    .map(|name| name.to_string())
                    .unwrap_or_else(|| format!("#{}", s.speaker_id)),
                content: s.content.clone(),
                start_time: s.start_time,
            })
            .collect();

        let mut speakers: Vec<i64> = speeches.iter().map(|s| s.speaker_id).collect();
        speakers.sort_unstable();
        speakers.dedup();

        Self {
            session_id: report.session_id,
            run_id: report.run_id.clone(),
            mode: report.mode,
            invalidated: report.invalidated,
            aborted: report.aborted,
            start_time_updated: report.start_time_updated,
            metadata: ReportMetadata {
                total_speeches: speeches.len(),
                total_speakers: speakers.len(),
                pages_processed: report.pages_processed,
                duplicate_pages: report.duplicate_pages,
            },
            speeches,
        }
    }

    /// Write to a JSON file
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        serde_json::to_writer_pretty(file, self).context("Failed to write JSON")?;
        Ok(())
    }
}

/// Human-readable transcript format
pub struct HumanTranscript<'a> {
    report: &'a MachineReport,
}

impl<'a> HumanTranscript<'a> {
    pub fn new(report: &'a MachineReport) -> Self {
        Self { report }
    }

    /// Format the speeches as human-readable text
    pub fn format(&self) -> String {
        let mut output = String::new();

        for speech in &self.report.speeches {
            output.push_str(&format!(
                "[{}] {} ({}):\n",
                speech.order,
                speech.speaker,
                format_timestamp(speech.start_time)
            ));

            // Fragments keep their own paragraphs
            let paragraphs: Vec<String> = speech
                .content
                .lines()
                .map(|line| wrap_text(line, 80))
                .collect();
            output.push_str(&paragraphs.join("\n"));
            output.push_str("\n\n");
        }

        output
    }

    /// Write to a text file
    pub fn write_file(&self, path: &Path) -> Result<()> {
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        write!(file, "{}", self.format())?;
        Ok(())
    }
}

/// Format a speech timestamp as D. M. YYYY HH:MM
fn format_timestamp(timestamp: Option<NaiveDateTime>) -> String {
    match timestamp {
        Some(ts) => ts.format("%-d. %-m. %Y %H:%M").to_string(),
        None => "brez datuma".to_string(),
    }
}

/// Wrap text at approximately the given width
fn wrap_text(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut line_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if line_len + word_len + 1 > width && line_len > 0 {
            result.push('\n');
            line_len = 0;
        }
        if line_len > 0 {
            result.push(' ');
            line_len += 1;
        }
        result.push_str(word);
        line_len += word_len;
    }

    result
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::SpeechRecord;

    fn report() -> IngestReport {
        let start = NaiveDate::from_ymd_opt(2023, 4, 12).unwrap().and_hms_opt(0, 0, 0);
        IngestReport {
            session_id: 3,
            run_id: "run".to_string(),
            mode: ReparseMode::AppendOnly { watermark: 1 },
            invalidated: false,
            pages_processed: 1,
            duplicate_pages: 0,
            aborted: false,
            start_time_updated: None,
            speeches: vec![
                SpeechRecord {
                    speaker_id: 1,
                    content: "Hvala.\nNadaljujemo.".to_string(),
                    session_id: 3,
                    order: 2,
                    start_time: start,
                },
                SpeechRecord {
                    speaker_id: 2,
                    content: "Se strinjam.".to_string(),
                    session_id: 3,
                    order: 3,
                    start_time: None,
                },
            ],
        }
    }

    fn people() -> Vec<PersonHandle> {
        vec![PersonHandle {
            id: 1,
            name: "IGOR ZORČIČ".to_string(),
        }]
    }

    #[test]
    fn test_format_timestamp() {
        let ts = NaiveDate::from_ymd_opt(2023, 4, 2).unwrap().and_hms_opt(9, 5, 0);
        assert_eq!(format_timestamp(ts), "2. 4. 2023 09:05");
        assert_eq!(format_timestamp(None), "brez datuma");
    }

    #[test]
    fn test_wrap_text() {
        let text = "Spoštovane poslanke in poslanci, začenjamo nadaljevanje seje Državnega zbora";
        let wrapped = wrap_text(text, 20);
        for line in wrapped.lines() {
            assert!(line.chars().count() <= 25); // Allow some slack for long words
        }
    }

    #[test]
    fn test_machine_report() {
        let machine = MachineReport::from_report(&report(), &people());

        assert_eq!(machine.speeches[0].speaker, "IGOR ZORČIČ");
        assert_eq!(machine.speeches[1].speaker, "#2");
        assert_eq!(machine.metadata.total_speakers, 2);

        let json = serde_json::to_value(&machine).unwrap();
        assert_eq!(json["mode"], "append_only");
        assert_eq!(json["watermark"], 1);
    }

    #[test]
    fn test_human_format_and_file() {
        let machine = MachineReport::from_report(&report(), &people());
        let text = HumanTranscript::new(&machine).format();

        assert!(text.starts_with("[2] IGOR ZORČIČ (12. 4. 2023 00:00):\nHvala.\nNadaljujemo.\n\n"));
        assert!(text.contains("[3] #2 (brez datuma):\nSe strinjam."));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        HumanTranscript::new(&machine).write_file(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), text);

        let json_path = dir.path().join("out.json");
        machine.write_json(&json_path).unwrap();
        assert!(std::fs::read_to_string(&json_path).unwrap().contains("\"session_id\": 3"));
    }
}
