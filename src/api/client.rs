use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{PersonResolver, SessionStore};
use crate::models::{PersonHandle, Session, SessionPatch, SpeechRecord};

/// Configuration for the parladata API client
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL including the API version, without trailing slash
    pub base_url: String,
    pub user: String,
    pub password: String,
    /// Page size used when listing people
    pub page_size: usize,
}

impl ApiConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("PARSER_PARLADATA_API_URL")
                .unwrap_or_else(|_| "http://localhost:8000/v3".to_string())
                .trim_end_matches('/')
                .to_string(),
            user: std::env::var("PARSER_USER").unwrap_or_else(|_| "parser".to_string()),
            password: std::env::var("PARSER_PASSWORD").unwrap_or_default(),
            page_size: 300,
        }
    }
}

/// REST client for the parladata storage API
pub struct ParladataClient {
    client: Client,
    config: ApiConfig,
    /// Lowercased parser name to person, loaded on first lookup
    people: Mutex<Option<HashMap<String, PersonHandle>>>,
}

impl ParladataClient {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            people: Mutex::new(None),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.config.base_url, endpoint)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.config.user, Some(&self.config.password))
    }

    /// Load one session
    pub async fn get_session(&self, id: i64) -> Result<Session> {
        let response = self
            .authed(self.client.get(self.url(&format!("sessions/{}/", id))))
            .send()
            .await
            .with_context(|| format!("Failed to fetch session {}", id))?;
        let row: SessionRow = check(response)
            .await?
            .json()
            .await
            .context("Failed to parse session response")?;

        Ok(Session {
            id: row.id,
            name: row.name,
            start_time: row.start_time.as_deref().and_then(parse_timestamp),
            in_review: row.in_review,
            is_new: false,
        })
    }

    /// Fetch a transcript page
    pub async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch transcript page {}", url))?;
        check(response)
            .await?
            .text()
            .await
            .context("Failed to read transcript page body")
    }

    async fn load_people(&self) -> Result<HashMap<String, PersonHandle>> {
        let mut people = HashMap::new();
        let mut next = Some(format!("{}?limit={}", self.url("people/"), self.config.page_size));

        while let Some(url) = next {
            let response = self
                .authed(self.client.get(&url))
                .send()
                .await
                .with_context(|| format!("Failed to list people at {}", url))?;
            let page: Paged<PersonRow> = check(response)
                .await?
                .json()
                .await
                .context("Failed to parse people page")?;

            for row in page.results {
                let handle = PersonHandle {
                    id: row.id,
                    name: row.name.clone(),
                };
                for parser_name in row.parser_names.split('|').filter(|n| !n.trim().is_empty()) {
                    people.insert(parser_name.trim().to_lowercase(), handle.clone());
                }
                people
                    .entry(row.name.trim().to_lowercase())
                    .or_insert(handle);
            }
            next = page.next;
        }

        info!("Loaded {} person names", people.len());
        Ok(people)
    }

    async fn create_person(&self, name: &str) -> Result<PersonHandle> {
        let body = NewPerson {
            name,
            parser_names: name,
        };
        let response = self
            .authed(self.client.post(self.url("people/")).json(&body))
            .send()
            .await
            .with_context(|| format!("Failed to create person {}", name))?;
        let row: PersonRow = check(response)
            .await?
            .json()
            .await
            .context("Failed to parse created person")?;

        info!(id = row.id, name, "Added new person");
        Ok(PersonHandle {
            id: row.id,
            name: row.name,
        })
    }
}

impl SessionStore for ParladataClient {
    async fn speech_count(&self, session: &Session) -> Result<usize> {
        let url = format!("{}?session={}&limit=1", self.url("speeches/"), session.id);
        let response = self
            .authed(self.client.get(&url))
            .send()
            .await
            .context("Failed to count speeches")?;
        let page: Paged<serde_json::Value> = check(response)
            .await?
            .json()
            .await
            .context("Failed to parse speech count")?;
        Ok(page.count)
    }

    async fn update_start_time(&self, session: &Session, start_time: NaiveDateTime) -> Result<()> {
        let patch = SessionPatch {
            start_time: Some(start_time),
            ..Default::default()
        };
        self.patch_session(session, &patch).await
    }

    async fn patch_session(&self, session: &Session, patch: &SessionPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let response = self
            .authed(
                self.client
                    .patch(self.url(&format!("sessions/{}/", session.id)))
                    .json(patch),
            )
            .send()
            .await
            .with_context(|| format!("Failed to patch session {}", session.id))?;
        check(response).await?;
        debug!(session = session.id, ?patch, "Patched session");
        Ok(())
    }

    async fn unvalidate_speeches(&self, session: &Session) -> Result<()> {
        let response = self
            .authed(
                self.client
                    .post(self.url(&format!("sessions/{}/unvalidate_speeches/", session.id)))
                    .json(&serde_json::json!({})),
            )
            .send()
            .await
            .with_context(|| format!("Failed to unvalidate speeches of session {}", session.id))?;
        check(response).await?;
        Ok(())
    }

    async fn add_speeches(&self, speeches: &[SpeechRecord]) -> Result<()> {
        if speeches.is_empty() {
            return Ok(());
        }
        let response = self
            .authed(self.client.post(self.url("speeches/")).json(speeches))
            .send()
            .await
            .context("Failed to submit speeches")?;
        check(response).await?;
        Ok(())
    }
}

impl PersonResolver for ParladataClient {
    async fn get_or_add(&self, name: &str) -> Result<PersonHandle> {
        let mut people = self.people.lock().await;
        if people.is_none() {
            *people = Some(self.load_people().await?);
        }
        let key = name.trim().to_lowercase();
        if let Some(person) = people.as_ref().and_then(|p| p.get(&key)) {
            return Ok(person.clone());
        }

        let person = self.create_person(name.trim()).await?;
        if let Some(cache) = people.as_mut() {
            cache.insert(key, person.clone());
        }
        Ok(person)
    }
}

/// Fail on non-success status, keeping the response body in the error
async fn check(response: Response) -> Result<Response> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!(%status, "Parladata API request failed");
        anyhow::bail!("Parladata API error: {} - {}", status, body);
    }
    Ok(response)
}

/// Accepts naive ISO timestamps and RFC 3339 with an offset
fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.naive_local())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok())
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").ok())
}

#[derive(Debug, Deserialize)]
struct Paged<T> {
    #[serde(default)]
    count: usize,
    #[serde(default)]
    next: Option<String>,
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct SessionRow {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    in_review: bool,
}

#[derive(Debug, Deserialize)]
struct PersonRow {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    parser_names: String,
}

#[derive(Debug, Serialize)]
struct NewPerson<'a> {
    name: &'a str,
    parser_names: &'a str,
}
