use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;

use super::{PersonResolver, SessionStore};
use crate::models::{PersonHandle, Session, SessionPatch, SpeechRecord};

/// A stored speech and whether it is still current
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSpeech {
    pub record: SpeechRecord,
    pub valid: bool,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<i64, Session>,
    speeches: Vec<StoredSpeech>,
    people: Vec<PersonHandle>,
    add_calls: usize,
}

/// In-memory storage for dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session, replacing any earlier copy
    pub fn insert_session(&self, session: Session) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.sessions.insert(session.id, session);
        }
    }

    pub fn session(&self, id: i64) -> Option<Session> {
        self.inner.lock().ok()?.sessions.get(&id).cloned()
    }

    /// Speeches of a session that have not been invalidated, by order
    pub fn valid_speeches(&self, session_id: i64) -> Vec<SpeechRecord> {
        let Ok(inner) = self.inner.lock() else {
            return Vec::new();
        };
        let mut speeches: Vec<SpeechRecord> = inner
            .speeches
            .iter()
            .filter(|s| s.valid && s.record.session_id == session_id)
            .map(|s| s.record.clone())
            .collect();
        speeches.sort_by_key(|s| s.order);
        speeches
    }

    /// Every speech ever stored, including invalidated ones
    pub fn all_speeches(&self) -> Vec<StoredSpeech> {
        self.inner
            .lock()
            .map(|inner| inner.speeches.clone())
            .unwrap_or_default()
    }

    pub fn people(&self) -> Vec<PersonHandle> {
        self.inner
            .lock()
            .map(|inner| inner.people.clone())
            .unwrap_or_default()
    }

    /// Number of `add_speeches` calls received
    pub fn add_calls(&self) -> usize {
        self.inner.lock().map(|inner| inner.add_calls).unwrap_or(0)
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> Result<T> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        Ok(f(&mut inner))
    }
}

impl SessionStore for MemoryStore {
    async fn speech_count(&self, session: &Session) -> Result<usize> {
        self.with_inner(|inner| {
            inner
                .speeches
                .iter()
                .filter(|s| s.valid && s.record.session_id == session.id)
                .count()
        })
    }

    async fn update_start_time(&self, session: &Session, start_time: NaiveDateTime) -> Result<()> {
        self.with_inner(|inner| {
            inner
                .sessions
                .get_mut(&session.id)
                .map(|stored| stored.start_time = Some(start_time))
                .with_context(|| format!("Unknown session {}", session.id))
        })?
    }

    async fn patch_session(&self, session: &Session, patch: &SessionPatch) -> Result<()> {
        self.with_inner(|inner| {
            inner
                .sessions
                .get_mut(&session.id)
                .map(|stored| patch.apply(stored))
                .with_context(|| format!("Unknown session {}", session.id))
        })?
    }

    async fn unvalidate_speeches(&self, session: &Session) -> Result<()> {
        self.with_inner(|inner| {
            for speech in inner
                .speeches
                .iter_mut()
                .filter(|s| s.record.session_id == session.id)
            {
                speech.valid = false;
            }
        })
    }

    async fn add_speeches(&self, speeches: &[SpeechRecord]) -> Result<()> {
        self.with_inner(|inner| {
            inner.add_calls += 1;
            inner.speeches.extend(speeches.iter().cloned().map(|record| StoredSpeech {
                record,
                valid: true,
            }));
        })
    }
}

impl PersonResolver for MemoryStore {
    async fn get_or_add(&self, name: &str) -> Result<PersonHandle> {
        self.with_inner(|inner| {
            if let Some(person) = inner
                .people
                .iter()
                .find(|p| p.name.to_lowercase() == name.to_lowercase())
            {
                return person.clone();
            }
            let person = PersonHandle {
                id: inner.people.len() as i64 + 1,
                name: name.to_string(),
            };
            inner.people.push(person.clone());
            person
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(session_id: i64, order: usize) -> SpeechRecord {
        SpeechRecord {
            speaker_id: 1,
            content: format!("speech {}", order),
            session_id,
            order,
            start_time: None,
        }
    }

    #[tokio::test]
    async fn test_count_ignores_invalidated() {
        let store = MemoryStore::new();
        let session = Session {
            id: 1,
            name: "1. redna seja".to_string(),
            start_time: None,
            in_review: true,
            is_new: false,
        };
        store.insert_session(session.clone());

        store.add_speeches(&[record(1, 1), record(1, 2), record(2, 1)]).await.unwrap();
        assert_eq!(store.speech_count(&session).await.unwrap(), 2);

        store.unvalidate_speeches(&session).await.unwrap();
        assert_eq!(store.speech_count(&session).await.unwrap(), 0);
        assert_eq!(store.all_speeches().len(), 3);
    }

    #[tokio::test]
    async fn test_person_resolution_is_stable() {
        let store = MemoryStore::new();

        let first = store.get_or_add("JANEZ NOVAK").await.unwrap();
        let again = store.get_or_add("Janez Novak").await.unwrap();
        let other = store.get_or_add("ANA KOS").await.unwrap();

        assert_eq!(first.id, again.id);
        assert_ne!(first.id, other.id);
        assert_eq!(store.people().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_session_patch_fails() {
        let store = MemoryStore::new();
        let session = Session {
            id: 9,
            name: String::new(),
            start_time: None,
            in_review: false,
            is_new: true,
        };

        assert!(store.patch_session(&session, &SessionPatch::in_review(true)).await.is_err());
    }
}
