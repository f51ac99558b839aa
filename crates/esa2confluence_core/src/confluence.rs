use anyhow::{Context, Result, bail};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use crate::config::ConfluenceSettings;

pub const PAGES_PATH: &str = "/wiki/api/v2/pages";
pub const FOOTER_COMMENTS_PATH: &str = "/wiki/api/v2/footer-comments";
pub const PAGE_FETCH_LIMIT: usize = 100;

const STORAGE_REPRESENTATION: &str = "storage";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StorageBody {
    pub representation: String,
    pub value: String,
}

impl StorageBody {
    pub fn storage(value: &str) -> Self {
        Self {
            representation: STORAGE_REPRESENTATION.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CreatePageRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(rename = "spaceId")]
    pub space_id: String,
    pub status: String,
    #[serde(rename = "root-level")]
    pub root_level: bool,
    #[serde(rename = "parentId", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub body: StorageBody,
}

impl CreatePageRequest {
    pub fn new(space_id: &str, title: &str, body: &str, parent_id: Option<&str>) -> Self {
        Self {
            kind: "page".to_string(),
            title: title.to_string(),
            space_id: space_id.to_string(),
            status: "current".to_string(),
            root_level: parent_id.is_none(),
            parent_id: parent_id.map(ToString::to_string),
            body: StorageBody::storage(body),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CreateCommentRequest {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "pageId")]
    pub page_id: String,
    pub body: StorageBody,
}

impl CreateCommentRequest {
    pub fn new(page_id: &str, body: &str) -> Self {
        Self {
            kind: "comment".to_string(),
            page_id: page_id.to_string(),
            body: StorageBody::storage(body),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "spaceId", default)]
    pub space_id: String,
    #[serde(rename = "parentId", default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub space_id: String,
    pub title: Option<String>,
    pub sort: Option<String>,
    pub limit: usize,
}

impl PageQuery {
    pub fn space(space_id: &str) -> Self {
        Self {
            space_id: space_id.to_string(),
            title: None,
            sort: None,
            limit: PAGE_FETCH_LIMIT,
        }
    }

    pub fn by_title(space_id: &str, title: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            sort: Some("title".to_string()),
            ..Self::space(space_id)
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("limit", self.limit.to_string()),
            ("space-id", self.space_id.clone()),
        ];
        if let Some(title) = &self.title {
            params.push(("title", title.clone()));
        }
        if let Some(sort) = &self.sort {
            params.push(("sort", sort.clone()));
        }
        params
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CreatePageOutcome {
    Created(Page),
    /// A page with the same title already exists in the space.
    TitleConflict(Value),
}

/// One method per Confluence REST call used by the migration.
pub trait ConfluenceApi {
    fn create_page(&mut self, request: &CreatePageRequest) -> Result<CreatePageOutcome>;
    fn list_pages(&mut self, query: &PageQuery) -> Result<Vec<Page>>;
    fn delete_page(&mut self, page_id: &str) -> Result<()>;
    fn create_footer_comment(&mut self, request: &CreateCommentRequest) -> Result<Value>;
    fn request_count(&self) -> usize;
}

pub struct ConfluenceClient {
    client: Client,
    settings: ConfluenceSettings,
    request_count: usize,
}

impl ConfluenceClient {
    pub fn new(settings: ConfluenceSettings) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("failed to build Confluence HTTP client")?;

        Ok(Self {
            client,
            settings,
            request_count: 0,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.host, path)
    }

    fn send(&mut self, request: RequestBuilder) -> Result<(StatusCode, Value)> {
        self.request_count += 1;
        let response = request
            .basic_auth(&self.settings.user, Some(&self.settings.api_token))
            .header("User-Agent", self.settings.user_agent.clone())
            .header("Accept", "application/json")
            .send()
            .context("failed to call Confluence API")?;
        let status = response.status();
        let text = response
            .text()
            .context("failed to read Confluence API response body")?;
        Ok((status, parse_payload(&text)))
    }
}

impl ConfluenceApi for ConfluenceClient {
    fn create_page(&mut self, request: &CreatePageRequest) -> Result<CreatePageOutcome> {
        let url = self.url(PAGES_PATH);
        let (status, payload) = self.send(self.client.post(url).json(request))?;
        create_page_outcome(status, payload)
    }

    fn list_pages(&mut self, query: &PageQuery) -> Result<Vec<Page>> {
        let url = self.url(PAGES_PATH);
        let (status, payload) = self.send(self.client.get(url).query(&query.params()))?;
        let pages = list_pages_outcome(status, payload)?;
        debug!(count = pages.len(), "listed pages");
        Ok(pages)
    }

    fn delete_page(&mut self, page_id: &str) -> Result<()> {
        let url = self.url(&format!("{PAGES_PATH}/{page_id}"));
        let (status, payload) = self.send(self.client.delete(url))?;
        delete_page_outcome(status, &payload)
    }

    fn create_footer_comment(&mut self, request: &CreateCommentRequest) -> Result<Value> {
        let url = self.url(FOOTER_COMMENTS_PATH);
        let (status, payload) = self.send(self.client.post(url).json(request))?;
        create_comment_outcome(status, payload)
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

/// 200 → created, 400 "already exists" → conflict, anything else fails.
fn create_page_outcome(status: StatusCode, payload: Value) -> Result<CreatePageOutcome> {
    if status == StatusCode::OK {
        let page: Page =
            serde_json::from_value(payload).context("failed to decode create page response")?;
        return Ok(CreatePageOutcome::Created(page));
    }
    if is_title_conflict(status, &payload) {
        return Ok(CreatePageOutcome::TitleConflict(payload));
    }
    fail("create page", status, &payload)
}

fn list_pages_outcome(status: StatusCode, payload: Value) -> Result<Vec<Page>> {
    if status != StatusCode::OK {
        return fail("list pages", status, &payload);
    }
    let parsed: PageListResponse =
        serde_json::from_value(payload).context("failed to decode page list response")?;
    Ok(parsed.results)
}

fn delete_page_outcome(status: StatusCode, payload: &Value) -> Result<()> {
    if status != StatusCode::NO_CONTENT {
        return fail("delete page", status, payload);
    }
    Ok(())
}

fn create_comment_outcome(status: StatusCode, payload: Value) -> Result<Value> {
    if status != StatusCode::CREATED {
        return fail("create comment", status, &payload);
    }
    Ok(payload)
}

/// HTTP 400 carrying an "already exists" error for the requested title.
pub fn is_title_conflict(status: StatusCode, payload: &Value) -> bool {
    if status != StatusCode::BAD_REQUEST {
        return false;
    }
    let mentions_conflict = |value: Option<&Value>| {
        value
            .and_then(Value::as_str)
            .is_some_and(|text| text.to_ascii_lowercase().contains("already exists"))
    };
    let from_errors = payload
        .get("errors")
        .and_then(Value::as_array)
        .is_some_and(|errors| {
            errors.iter().any(|error| {
                mentions_conflict(error.get("title")) || mentions_conflict(error.get("detail"))
            })
        });
    from_errors || mentions_conflict(payload.get("message"))
}

fn fail<T>(operation: &str, status: StatusCode, payload: &Value) -> Result<T> {
    error!(%status, %payload, "Confluence {operation} failed");
    bail!("Confluence {operation} failed with HTTP {status}: {payload}")
}

fn parse_payload(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[derive(Debug, Deserialize, Default)]
struct PageListResponse {
    #[serde(default)]
    results: Vec<Page>,
}
