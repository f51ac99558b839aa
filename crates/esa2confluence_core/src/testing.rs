use std::collections::{BTreeMap, BTreeSet, VecDeque};

use anyhow::{Result, bail};
use serde_json::{Value, json};

use crate::confirm::Confirm;
use crate::confluence::{
    ConfluenceApi, CreateCommentRequest, CreatePageOutcome, CreatePageRequest, Page, PageQuery,
};
use crate::esa::{EsaApi, EsaComment};

pub const SPACE_ID: &str = "98304";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    CreatePage {
        title: String,
        parent_id: Option<String>,
    },
    ListPages {
        title: Option<String>,
    },
    DeletePage(String),
    CreateComment {
        page_id: String,
        body: String,
    },
}

impl ApiCall {
    pub fn create_page(title: &str, parent_id: Option<&str>) -> Self {
        Self::CreatePage {
            title: title.to_string(),
            parent_id: parent_id.map(ToString::to_string),
        }
    }
}

/// In-memory Confluence space that records every call.
#[derive(Debug, Default)]
pub struct MockConfluence {
    pub pages: Vec<Page>,
    pub calls: Vec<ApiCall>,
    pub always_conflict: BTreeSet<String>,
    pub list_limit: Option<usize>,
    next_id: u64,
}

impl MockConfluence {
    pub fn with_pages(pages: Vec<Page>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    pub fn created_titles(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                ApiCall::CreatePage { title, .. } => Some(title.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn page_titled(&self, title: &str) -> Option<&Page> {
        self.pages.iter().find(|page| page.title == title)
    }
}

impl ConfluenceApi for MockConfluence {
    fn create_page(&mut self, request: &CreatePageRequest) -> Result<CreatePageOutcome> {
        self.calls.push(ApiCall::CreatePage {
            title: request.title.clone(),
            parent_id: request.parent_id.clone(),
        });
        let exists = self
            .pages
            .iter()
            .any(|page| page.title == request.title && page.space_id == request.space_id);
        if exists || self.always_conflict.contains(&request.title) {
            return Ok(CreatePageOutcome::TitleConflict(json!({
                "errors": [{
                    "status": 400,
                    "code": "BAD_REQUEST",
                    "title": "A page with this title already exists",
                }]
            })));
        }

        self.next_id += 1;
        let page = Page {
            id: format!("{}", 1000 + self.next_id),
            title: request.title.clone(),
            space_id: request.space_id.clone(),
            parent_id: request.parent_id.clone(),
        };
        self.pages.push(page.clone());
        Ok(CreatePageOutcome::Created(page))
    }

    fn list_pages(&mut self, query: &PageQuery) -> Result<Vec<Page>> {
        self.calls.push(ApiCall::ListPages {
            title: query.title.clone(),
        });
        let mut pages = self
            .pages
            .iter()
            .filter(|page| query.title.as_ref().is_none_or(|title| &page.title == title))
            .cloned()
            .collect::<Vec<_>>();
        if query.sort.as_deref() == Some("title") {
            pages.sort_by(|left, right| left.title.cmp(&right.title));
        }
        let limit = self.list_limit.unwrap_or(query.limit).min(query.limit);
        pages.truncate(limit);
        Ok(pages)
    }

    fn delete_page(&mut self, page_id: &str) -> Result<()> {
        self.calls.push(ApiCall::DeletePage(page_id.to_string()));
        let before = self.pages.len();
        self.pages.retain(|page| page.id != page_id);
        if self.pages.len() == before {
            bail!("Confluence delete page failed with HTTP 404 Not Found");
        }
        Ok(())
    }

    fn create_footer_comment(&mut self, request: &CreateCommentRequest) -> Result<Value> {
        self.calls.push(ApiCall::CreateComment {
            page_id: request.page_id.clone(),
            body: request.body.value.clone(),
        });
        Ok(json!({"id": "c1", "pageId": request.page_id}))
    }

    fn request_count(&self) -> usize {
        self.calls.len()
    }
}

/// Answers confirmations from a fixed script, declining once it runs out.
#[derive(Debug, Default)]
pub struct ScriptedConfirm {
    answers: VecDeque<bool>,
    pub prompts: Vec<String>,
}

impl ScriptedConfirm {
    pub fn new(answers: &[bool]) -> Self {
        Self {
            answers: answers.iter().copied().collect(),
            prompts: Vec::new(),
        }
    }
}

impl Confirm for ScriptedConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        self.prompts.push(prompt.to_string());
        Ok(self.answers.pop_front().unwrap_or(false))
    }
}

#[derive(Debug, Default)]
pub struct MockEsa {
    pub comments: BTreeMap<u64, Vec<EsaComment>>,
    pub requested: Vec<u64>,
}

impl MockEsa {
    pub fn with_comments(post_number: u64, bodies: &[&str]) -> Self {
        let comments = bodies
            .iter()
            .enumerate()
            .map(|(index, body)| EsaComment {
                id: index as u64 + 1,
                body_md: (*body).to_string(),
                created_at: None,
            })
            .collect();
        Self {
            comments: BTreeMap::from([(post_number, comments)]),
            requested: Vec::new(),
        }
    }
}

impl EsaApi for MockEsa {
    fn fetch_comments(&mut self, post_number: u64) -> Result<Vec<EsaComment>> {
        self.requested.push(post_number);
        Ok(self
            .comments
            .get(&post_number)
            .cloned()
            .unwrap_or_default())
    }
}
