use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A parliamentary session as known to the storage layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub start_time: Option<NaiveDateTime>,
    /// Whether the stored speeches come from a record still under review
    #[serde(default)]
    pub in_review: bool,
    /// Created during this run, nothing has been ingested yet
    #[serde(skip)]
    pub is_new: bool,
}

/// Partial update of a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_review: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveDateTime>,
}

impl SessionPatch {
    pub fn in_review(value: bool) -> Self {
        Self {
            in_review: Some(value),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.in_review.is_none() && self.start_time.is_none()
    }

    /// Apply the patch to a local copy of the session
    pub fn apply(&self, session: &mut Session) {
        if let Some(in_review) = self.in_review {
            session.in_review = in_review;
        }
        if let Some(start_time) = self.start_time {
            session.start_time = Some(start_time);
        }
    }
}

/// Identity handed back by the person resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonHandle {
    pub id: i64,
    pub name: String,
}
