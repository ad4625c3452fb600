pub mod client;
pub mod memory;

pub use client::*;
pub use memory::*;

use anyhow::Result;
use chrono::NaiveDateTime;

use crate::models::{PersonHandle, Session, SessionPatch, SpeechRecord};

/// Storage operations the ingestion controller needs for a session
///
/// Calls are awaited one at a time; implementations need not be reentrant.
#[allow(async_fn_in_trait)]
pub trait SessionStore {
    /// Number of speeches already stored for the session
    async fn speech_count(&self, session: &Session) -> Result<usize>;

    async fn update_start_time(&self, session: &Session, start_time: NaiveDateTime) -> Result<()>;

    async fn patch_session(&self, session: &Session, patch: &SessionPatch) -> Result<()>;

    /// Mark every stored speech of the session as superseded
    async fn unvalidate_speeches(&self, session: &Session) -> Result<()>;

    async fn add_speeches(&self, speeches: &[SpeechRecord]) -> Result<()>;
}

/// Maps a cleaned speaker name to a person identity
#[allow(async_fn_in_trait)]
pub trait PersonResolver {
    async fn get_or_add(&self, name: &str) -> Result<PersonHandle>;
}
