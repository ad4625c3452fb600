use anyhow::Result;
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::api::{PersonResolver, SessionStore};
use crate::models::{Session, SessionPatch, SpeechRecord, SpeechSegment, TranscriptPage};
use crate::rules::RuleSet;
use crate::stages::{
    SegmentationContext, meta_date, resolve_start_time, sitting_date, speech_timestamp,
    start_time_from_line,
};

/// Configuration for Stage 3
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Maximum speeches per `add_speeches` call
    pub batch_size: usize,
    /// Page-title text marking a record still under review
    pub review_marker: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            review_marker: "v pregledu".to_string(),
        }
    }
}

/// How the pages of a session are turned into stored speeches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ReparseMode {
    /// Save every speech, numbered from 1
    Full,
    /// Save only speeches positioned after the stored count
    AppendOnly { watermark: usize },
    /// The final record is already stored
    Skip,
}

/// Decision for one session run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReparsePlan {
    pub mode: ReparseMode,
    /// Session fields to update before parsing
    pub patch: Option<SessionPatch>,
    /// Discard previously stored speeches before parsing
    pub invalidate: bool,
}

/// Outcome of saving one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// Keep going; the last order position used so far
    Continue { last_order: usize },
    /// The page did not look like a transcript; stop this session
    AbortSession,
}

/// Summary of one session run
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub session_id: i64,
    pub run_id: String,
    #[serde(flatten)]
    pub mode: ReparseMode,
    pub invalidated: bool,
    pub pages_processed: usize,
    pub duplicate_pages: usize,
    pub aborted: bool,
    pub start_time_updated: Option<NaiveDateTime>,
    pub speeches: Vec<SpeechRecord>,
}

/// Decide between full reparse and append-only from review-state transitions
///
/// `now_in_review` comes from the page titles, `stored_count` is the number
/// of speeches already stored for the session.
pub fn plan_reparse(session: &Session, now_in_review: bool, stored_count: usize) -> ReparsePlan {
    if session.is_new {
        return ReparsePlan {
            mode: ReparseMode::Full,
            patch: (session.in_review != now_in_review)
                .then(|| SessionPatch::in_review(now_in_review)),
            invalidate: false,
        };
    }

    match (session.in_review, now_in_review) {
        (true, false) => ReparsePlan {
            mode: ReparseMode::Full,
            patch: Some(SessionPatch::in_review(false)),
            invalidate: true,
        },
        (false, true) => ReparsePlan {
            mode: ReparseMode::AppendOnly {
                watermark: stored_count,
            },
            patch: Some(SessionPatch::in_review(true)),
            invalidate: false,
        },
        (true, true) => ReparsePlan {
            mode: ReparseMode::AppendOnly {
                watermark: stored_count,
            },
            patch: None,
            invalidate: false,
        },
        (false, false) if stored_count == 0 => ReparsePlan {
            mode: ReparseMode::Full,
            patch: Some(SessionPatch::in_review(true)),
            invalidate: false,
        },
        (false, false) => ReparsePlan {
            mode: ReparseMode::Skip,
            patch: None,
            invalidate: false,
        },
    }
}

/// Perform Stage 3: segment a session's pages and persist new speeches
///
/// Pages are handled strictly in order. A page whose first segment has no
/// content, or an unavailable page, stops the remaining pages of this
/// session; storage failures are propagated.
pub async fn ingest_session<S, P>(
    store: &S,
    people: &P,
    session: &mut Session,
    pages: &[TranscriptPage],
    rules: &RuleSet,
    config: &IngestConfig,
) -> Result<IngestReport>
where
    S: SessionStore,
    P: PersonResolver,
{
    let run_id = Uuid::new_v4();
    let span = info_span!("session_run", session = session.id, %run_id);
    run_session(store, people, session, pages, rules, config, run_id)
        .instrument(span)
        .await
}

async fn run_session<S, P>(
    store: &S,
    people: &P,
    session: &mut Session,
    pages: &[TranscriptPage],
    rules: &RuleSet,
    config: &IngestConfig,
    run_id: Uuid,
) -> Result<IngestReport>
where
    S: SessionStore,
    P: PersonResolver,
{
    let now_in_review = pages
        .iter()
        .any(|page| page.is_in_review(&config.review_marker));
    let stored_count = if session.is_new {
        0
    } else {
        store.speech_count(session).await?
    };
    let plan = plan_reparse(session, now_in_review, stored_count);
    info!(
        stored = stored_count,
        now_in_review,
        mode = ?plan.mode,
        "Planned session reparse"
    );

    let mut report = IngestReport {
        session_id: session.id,
        run_id: run_id.to_string(),
        mode: plan.mode,
        invalidated: plan.invalidate,
        pages_processed: 0,
        duplicate_pages: 0,
        aborted: false,
        start_time_updated: None,
        speeches: Vec::new(),
    };

    if let Some(patch) = &plan.patch {
        store.patch_session(session, patch).await?;
        patch.apply(session);
    }
    if plan.invalidate {
        info!("Record left review, invalidating stored speeches");
        store.unvalidate_speeches(session).await?;
    }

    let watermark = match plan.mode {
        ReparseMode::Skip => {
            info!("Session record is final and already stored");
            return Ok(report);
        }
        ReparseMode::Full => None,
        ReparseMode::AppendOnly { watermark } => Some(watermark),
    };

    let mut context = SegmentationContext::new(rules);
    let mut last_order = 0;

    for (index, page) in pages.iter().enumerate() {
        if page.unavailable {
            warn!(source = %page.source, "Document unavailable, stopping session");
            report.aborted = true;
            break;
        }

        let segmentation = context.segment(page);
        report.pages_processed += 1;
        if segmentation.duplicate {
            report.duplicate_pages += 1;
        }
        info!(
            source = %page.source,
            speeches = segmentation.segments.len(),
            "Segmented page"
        );

        let page_date = sitting_date(&page.date_candidates, &rules.dates);

        if index == 0 {
            if let Some(updated) = update_start_time(
                store,
                session,
                segmentation.content_start.as_deref(),
                page_date,
                rules,
            )
            .await?
            {
                report.start_time_updated = Some(updated);
            }
        }

        let header_date = meta_date(&segmentation.meta, &rules.dates);
        let timestamp = speech_timestamp(page_date, header_date, session.start_time);

        let saver = PageSaver {
            store,
            people,
            session,
            watermark,
            batch_size: config.batch_size,
        };
        let (outcome, saved) = saver
            .save(&segmentation.segments, last_order, timestamp)
            .await?;
        report.speeches.extend(saved);

        match outcome {
            PageOutcome::Continue { last_order: order } => last_order = order,
            PageOutcome::AbortSession => {
                report.aborted = true;
                break;
            }
        }
    }

    info!(
        saved = report.speeches.len(),
        aborted = report.aborted,
        "Session run finished"
    );
    Ok(report)
}

/// Propagate the start time announced on the first page
async fn update_start_time<S: SessionStore>(
    store: &S,
    session: &mut Session,
    content_start: Option<&str>,
    page_date: Option<chrono::NaiveDate>,
    rules: &RuleSet,
) -> Result<Option<NaiveDateTime>> {
    let Some(time) = content_start.and_then(|line| start_time_from_line(line, &rules.dates)) else {
        return Ok(None);
    };
    let Some(start) = resolve_start_time(session.start_time, page_date, time) else {
        return Ok(None);
    };

    info!(%start, "Updating session start time");
    store.update_start_time(session, start).await?;
    session.start_time = Some(start);
    Ok(Some(start))
}

/// Saves the segments of one page
struct PageSaver<'a, S, P> {
    store: &'a S,
    people: &'a P,
    session: &'a Session,
    watermark: Option<usize>,
    batch_size: usize,
}

impl<S: SessionStore, P: PersonResolver> PageSaver<'_, S, P> {
    async fn save(
        &self,
        segments: &[SpeechSegment],
        start_order: usize,
        timestamp: Option<NaiveDateTime>,
    ) -> Result<(PageOutcome, Vec<SpeechRecord>)> {
        if segments.first().is_some_and(|first| !first.has_content()) {
            error!(
                session = self.session.id,
                speaker = %segments[0].speaker,
                "Cannot read session content, first speech is empty"
            );
            return Ok((PageOutcome::AbortSession, Vec::new()));
        }

        let mut order = start_order;
        let mut records = Vec::new();

        for segment in segments {
            if !segment.has_content() {
                warn!(
                    session = self.session.id,
                    speaker = %segment.speaker,
                    after_order = order,
                    "Speech is without content"
                );
                continue;
            }
            order += 1;

            if self.watermark.is_some_and(|watermark| order <= watermark) {
                debug!(order, "Speech already stored");
                continue;
            }

            let person = self.people.get_or_add(&segment.speaker).await?;
            records.push(SpeechRecord {
                speaker_id: person.id,
                content: segment.content.clone(),
                session_id: self.session.id,
                order,
                start_time: timestamp,
            });
        }

        for batch in records.chunks(self.batch_size.max(1)) {
            self.store.add_speeches(batch).await?;
        }

        Ok((PageOutcome::Continue { last_order: order }, records))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::api::MemoryStore;
    use crate::models::{SittingDateCandidates, TranscriptLine};

    fn session(id: i64, in_review: bool, is_new: bool) -> Session {
        Session {
            id,
            name: format!("{}. redna seja", id),
            start_time: None,
            in_review,
            is_new,
        }
    }

    fn page(source: &str, title: &str, raw: &[&str]) -> TranscriptPage {
        let lines = raw.iter().map(|l| TranscriptLine::from_markup(l)).collect();
        TranscriptPage::from_lines(source, title, lines)
    }

    fn final_pages() -> Vec<TranscriptPage> {
        vec![
            page(
                "p1",
                "Dobesedni zapis",
                &[
                    "Seja se je začela ob 10.00",
                    "<b>PREDSEDNIK IGOR ZORČIČ:</b> Pozdravljeni.",
                    "",
                    "<b>ANA KOS (NSi):</b> Hvala.",
                    "",
                    "<b>JANEZ NOVAK (SDS):</b> Se strinjam.",
                ],
            ),
            page(
                "p2",
                "Dobesedni zapis",
                &[
                    "Nadaljevanje seje",
                    "Seja se je začela ob 9.00",
                    "<b>PREDSEDNIK IGOR ZORČIČ:</b> Nadaljujemo.",
                    "",
                    "<b>ANA KOS (NSi):</b> Še enkrat.",
                ],
            ),
        ]
    }

    fn in_review(pages: Vec<TranscriptPage>) -> Vec<TranscriptPage> {
        pages
            .into_iter()
            .map(|mut p| {
                p.title = format!("{} - v pregledu", p.title);
                p
            })
            .collect()
    }

    async fn seed_speeches(store: &MemoryStore, session_id: i64, count: usize) {
        let seeded: Vec<SpeechRecord> = (1..=count)
            .map(|order| SpeechRecord {
                speaker_id: 99,
                content: format!("stored {}", order),
                session_id,
                order,
                start_time: None,
            })
            .collect();
        store.add_speeches(&seeded).await.unwrap();
    }

    fn summary(records: &[SpeechRecord]) -> Vec<(usize, String)> {
        records.iter().map(|r| (r.order, r.content.clone())).collect()
    }

    #[test]
    fn test_plan_table() {
        let plan = plan_reparse(&session(1, true, false), false, 12);
        assert_eq!(plan.mode, ReparseMode::Full);
        assert!(plan.invalidate);
        assert_eq!(plan.patch, Some(SessionPatch::in_review(false)));

        let plan = plan_reparse(&session(1, false, false), true, 5);
        assert_eq!(plan.mode, ReparseMode::AppendOnly { watermark: 5 });
        assert_eq!(plan.patch, Some(SessionPatch::in_review(true)));

        let plan = plan_reparse(&session(1, true, false), true, 7);
        assert_eq!(plan.mode, ReparseMode::AppendOnly { watermark: 7 });
        assert!(plan.patch.is_none());

        let plan = plan_reparse(&session(1, false, true), false, 0);
        assert_eq!(plan.mode, ReparseMode::Full);
        assert!(!plan.invalidate);

        let plan = plan_reparse(&session(1, false, false), false, 0);
        assert_eq!(plan.mode, ReparseMode::Full);
        assert_eq!(plan.patch, Some(SessionPatch::in_review(true)));

        let plan = plan_reparse(&session(1, false, false), false, 3);
        assert_eq!(plan.mode, ReparseMode::Skip);
    }

    #[tokio::test]
    async fn test_single_speech_and_start_time() {
        let store = MemoryStore::new();
        let mut s = session(1, false, true);
        store.insert_session(s.clone());

        let mut p = page(
            "p1",
            "Dobesedni zapis",
            &[
                "Seja se je začela ob 10.00",
                "<b>JANEZ NOVAK (SDS):</b> Hvala za besedo.",
                "Nadaljujem z razpravo.",
            ],
        );
        p.date_candidates = SittingDateCandidates {
            table_cell: Some("12. 4. 2023".to_string()),
            header_text: None,
        };

        let rules = RuleSet::builtin().unwrap();
        let report = ingest_session(&store, &store, &mut s, &[p], &rules, &IngestConfig::default())
            .await
            .unwrap();

        let sitting = NaiveDate::from_ymd_opt(2023, 4, 12).unwrap();
        assert_eq!(report.speeches.len(), 1);
        assert_eq!(report.speeches[0].order, 1);
        assert_eq!(report.speeches[0].content, "Hvala za besedo.\nNadaljujem z razpravo.");
        assert_eq!(report.speeches[0].start_time, sitting.and_hms_opt(0, 0, 0));
        assert_eq!(report.start_time_updated, sitting.and_hms_opt(10, 0, 0));
        assert_eq!(store.session(1).unwrap().start_time, sitting.and_hms_opt(10, 0, 0));
        assert_eq!(store.people()[0].name, "JANEZ NOVAK");
    }

    #[tokio::test]
    async fn test_empty_first_segment_aborts_session() {
        let store = MemoryStore::new();
        let mut s = session(2, false, true);
        store.insert_session(s.clone());

        let pages = vec![
            page(
                "broken",
                "Dobesedni zapis",
                &[
                    "Seja se je začela ob 10.00",
                    "<b>ANA KOS</b>:",
                    "",
                    "<b>JANEZ NOVAK:</b> Hvala.",
                ],
            ),
            final_pages().remove(1),
        ];

        let rules = RuleSet::builtin().unwrap();
        let report = ingest_session(&store, &store, &mut s, &pages, &rules, &IngestConfig::default())
            .await
            .unwrap();

        assert!(report.aborted);
        assert_eq!(report.pages_processed, 1);
        assert!(report.speeches.is_empty());
        assert_eq!(store.add_calls(), 0);
    }

    #[tokio::test]
    async fn test_leaving_review_reparses_everything() {
        let store = MemoryStore::new();
        let mut s = session(3, true, false);
        store.insert_session(s.clone());
        seed_speeches(&store, 3, 12).await;

        let rules = RuleSet::builtin().unwrap();
        let report = ingest_session(
            &store,
            &store,
            &mut s,
            &final_pages(),
            &rules,
            &IngestConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(report.mode, ReparseMode::Full);
        assert!(report.invalidated);
        assert!(!s.in_review);
        assert!(!store.session(3).unwrap().in_review);

        let valid = store.valid_speeches(3);
        let orders: Vec<usize> = valid.iter().map(|r| r.order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5]);
        assert!(valid.iter().all(|r| !r.content.starts_with("stored")));
        assert_eq!(store.all_speeches().len(), 17);
    }

    #[tokio::test]
    async fn test_full_reparse_is_idempotent() {
        let rules = RuleSet::builtin().unwrap();
        let mut runs = Vec::new();

        for _ in 0..2 {
            let store = MemoryStore::new();
            let mut s = session(4, false, true);
            store.insert_session(s.clone());
            let report = ingest_session(
                &store,
                &store,
                &mut s,
                &final_pages(),
                &rules,
                &IngestConfig::default(),
            )
            .await
            .unwrap();
            runs.push(report.speeches);
        }

        assert_eq!(runs[0], runs[1]);
        assert_eq!(runs[0].len(), 5);
    }

    #[tokio::test]
    async fn test_append_only_watermark() {
        let rules = RuleSet::builtin().unwrap();

        let store = MemoryStore::new();
        let mut s = session(5, false, true);
        store.insert_session(s.clone());
        let full = ingest_session(
            &store,
            &store,
            &mut s,
            &final_pages(),
            &rules,
            &IngestConfig::default(),
        )
        .await
        .unwrap()
        .speeches;
        let n = full.len();

        for watermark in 0..=n {
            let store = MemoryStore::new();
            let mut s = session(5, true, false);
            store.insert_session(s.clone());
            seed_speeches(&store, 5, watermark).await;

            let report = ingest_session(
                &store,
                &store,
                &mut s,
                &in_review(final_pages()),
                &rules,
                &IngestConfig::default(),
            )
            .await
            .unwrap();

            assert_eq!(report.mode, ReparseMode::AppendOnly { watermark });
            assert_eq!(summary(&report.speeches), summary(&full[watermark..]));
            if let Some(first) = report.speeches.first() {
                assert_eq!(first.order, watermark + 1);
            }
        }
    }

    #[tokio::test]
    async fn test_duplicate_page_contributes_nothing() {
        let store = MemoryStore::new();
        let mut s = session(6, false, true);
        store.insert_session(s.clone());

        let first = final_pages().remove(0);
        let pages = vec![first.clone(), first];

        let rules = RuleSet::builtin().unwrap();
        let report = ingest_session(&store, &store, &mut s, &pages, &rules, &IngestConfig::default())
            .await
            .unwrap();

        assert_eq!(report.pages_processed, 2);
        assert_eq!(report.duplicate_pages, 1);
        assert_eq!(report.speeches.len(), 3);
    }

    #[tokio::test]
    async fn test_unavailable_page_stops_session() {
        let store = MemoryStore::new();
        let mut s = session(7, false, true);
        store.insert_session(s.clone());

        let mut pages = final_pages();
        pages[1].unavailable = true;

        let rules = RuleSet::builtin().unwrap();
        let report = ingest_session(&store, &store, &mut s, &pages, &rules, &IngestConfig::default())
            .await
            .unwrap();

        assert!(report.aborted);
        assert_eq!(report.pages_processed, 1);
        assert_eq!(report.speeches.len(), 3);
    }

    #[tokio::test]
    async fn test_batches_respect_batch_size() {
        let store = MemoryStore::new();
        let mut s = session(8, false, true);
        store.insert_session(s.clone());

        let config = IngestConfig {
            batch_size: 2,
            ..Default::default()
        };
        let rules = RuleSet::builtin().unwrap();
        let pages = final_pages();
        ingest_session(&store, &store, &mut s, &pages[..1], &rules, &config)
            .await
            .unwrap();

        assert_eq!(store.add_calls(), 2);
        assert_eq!(store.valid_speeches(8).len(), 3);
    }

    #[tokio::test]
    async fn test_final_session_with_speeches_is_skipped() {
        let store = MemoryStore::new();
        let mut s = session(9, false, false);
        store.insert_session(s.clone());
        seed_speeches(&store, 9, 4).await;

        let rules = RuleSet::builtin().unwrap();
        let report = ingest_session(
            &store,
            &store,
            &mut s,
            &final_pages(),
            &rules,
            &IngestConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(report.mode, ReparseMode::Skip);
        assert_eq!(report.pages_processed, 0);
        assert_eq!(store.valid_speeches(9).len(), 4);
    }
}
