use anyhow::{Context, Result, bail};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::error;

use crate::config::EsaSettings;

const COMMENTS_PER_PAGE: usize = 100;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EsaComment {
    #[serde(default)]
    pub id: u64,
    pub body_md: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

pub trait EsaApi {
    fn fetch_comments(&mut self, post_number: u64) -> Result<Vec<EsaComment>>;
}

pub struct EsaClient {
    client: Client,
    settings: EsaSettings,
}

impl EsaClient {
    pub fn new(settings: EsaSettings) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("failed to build esa HTTP client")?;
        Ok(Self { client, settings })
    }

    fn comments_url(&self, post_number: u64) -> String {
        format!(
            "{}/v1/teams/{}/posts/{post_number}/comments",
            self.settings.api_url, self.settings.team
        )
    }
}

impl EsaApi for EsaClient {
    fn fetch_comments(&mut self, post_number: u64) -> Result<Vec<EsaComment>> {
        let url = self.comments_url(post_number);
        let mut comments = Vec::new();
        let mut page: Option<u64> = Some(1);

        while let Some(current) = page {
            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.settings.access_token)
                .header("User-Agent", self.settings.user_agent.clone())
                .query(&[
                    ("page", current.to_string()),
                    ("per_page", COMMENTS_PER_PAGE.to_string()),
                ])
                .send()
                .context("failed to call esa API")?;
            let status = response.status();
            let text = response
                .text()
                .context("failed to read esa API response body")?;

            if status != StatusCode::OK {
                error!(%status, payload = %text, post_number, "esa fetch comments failed");
                bail!("esa fetch comments for post {post_number} failed with HTTP {status}: {text}");
            }

            let parsed: CommentsResponse = serde_json::from_str(&text)
                .context("failed to decode esa comments response")?;
            comments.extend(parsed.comments);
            page = next_page(parsed.next_page.as_ref());
        }

        Ok(comments)
    }
}

fn next_page(value: Option<&Value>) -> Option<u64> {
    value.and_then(Value::as_u64)
}

#[derive(Debug, Deserialize, Default)]
struct CommentsResponse {
    #[serde(default)]
    comments: Vec<EsaComment>,
    #[serde(default)]
    next_page: Option<Value>,
}
