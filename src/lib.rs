pub mod api;
pub mod io;
pub mod models;
pub mod rules;
pub mod stages;

pub use api::{ApiConfig, MemoryStore, ParladataClient, PersonResolver, SessionStore};
pub use io::{
    fetch_transcript_pages, read_transcript_files, HumanTranscript, MachineReport, ReportMetadata,
};
pub use models::{
    PersonHandle, Session, SessionPatch, SpeechRecord, SpeechSegment, TranscriptLine,
    TranscriptPage,
};
pub use rules::{RuleSet, RulesError};
pub use stages::{
    ingest_session, parse_transcript_html, plan_reparse, segment_lines, IngestConfig,
    IngestReport, PageOutcome, ReparseMode, ReparsePlan, SegmentationContext,
};
