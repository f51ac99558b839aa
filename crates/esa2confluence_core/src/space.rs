use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::confirm::Confirm;
use crate::confluence::{
    ConfluenceApi, CreateCommentRequest, CreatePageOutcome, CreatePageRequest, Page, PageQuery,
};

/// A page returned by [`ConfluenceSpace::create_or_replace_page`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPage {
    pub page: Page,
    /// Id of the same-titled page deleted to make room for `page`.
    pub replaced_id: Option<String>,
}

/// Page operations scoped to a single Confluence space.
pub struct ConfluenceSpace<A, C> {
    api: A,
    confirm: C,
    space_id: String,
}

impl<A: ConfluenceApi, C: Confirm> ConfluenceSpace<A, C> {
    pub fn new(api: A, confirm: C, space_id: &str) -> Self {
        Self {
            api,
            confirm,
            space_id: space_id.to_string(),
        }
    }

    pub fn space_id(&self) -> &str {
        &self.space_id
    }

    #[cfg(test)]
    pub(crate) fn api(&self) -> &A {
        &self.api
    }

    #[cfg(test)]
    pub(crate) fn confirm(&self) -> &C {
        &self.confirm
    }

    pub fn request_count(&self) -> usize {
        self.api.request_count()
    }

    /// Create a page, offering to overwrite an existing page with the same title.
    pub fn create_page(&mut self, title: &str, body: &str, parent_id: Option<&str>) -> Result<Page> {
        Ok(self.create_or_replace_page(title, body, parent_id)?.page)
    }

    /// Like [`Self::create_page`], also reporting which page an overwrite deleted.
    ///
    /// An accepted overwrite deletes the existing page and retries once; a
    /// declined one fails without touching the existing page.
    pub fn create_or_replace_page(
        &mut self,
        title: &str,
        body: &str,
        parent_id: Option<&str>,
    ) -> Result<CreatedPage> {
        let request = CreatePageRequest::new(&self.space_id, title, body, parent_id);
        info!(title, parent_id = parent_id.unwrap_or("<root>"), "creating page");

        let payload = match self.api.create_page(&request)? {
            CreatePageOutcome::Created(page) => {
                info!(id = %page.id, title, "created page");
                return Ok(CreatedPage {
                    page,
                    replaced_id: None,
                });
            }
            CreatePageOutcome::TitleConflict(payload) => payload,
        };

        warn!(title, %payload, "page title already exists");
        let prompt = format!("Page `{title}` already exists. Overwrite it?");
        if !self.confirm.confirm(&prompt)? {
            bail!("page `{title}` already exists and overwrite was declined");
        }

        let existing = self.fetch_page_by_title(title)?;
        self.delete_page(&existing)?;

        match self.api.create_page(&request)? {
            CreatePageOutcome::Created(page) => {
                info!(id = %page.id, replaced = %existing.id, title, "recreated page");
                Ok(CreatedPage {
                    page,
                    replaced_id: Some(existing.id),
                })
            }
            CreatePageOutcome::TitleConflict(payload) => {
                bail!("page `{title}` still conflicts after overwrite: {payload}")
            }
        }
    }

    pub fn create_comment(&mut self, page_id: &str, body: &str) -> Result<()> {
        self.api
            .create_footer_comment(&CreateCommentRequest::new(page_id, body))?;
        info!(page_id, "created comment");
        Ok(())
    }

    pub fn fetch_pages(&mut self) -> Result<Vec<Page>> {
        self.api.list_pages(&PageQuery::space(&self.space_id))
    }

    pub fn fetch_page_by_title(&mut self, title: &str) -> Result<Page> {
        let pages = self
            .api
            .list_pages(&PageQuery::by_title(&self.space_id, title))?;
        pages
            .into_iter()
            .find(|page| page.title == title)
            .ok_or_else(|| {
                anyhow::anyhow!("page `{title}` not found in space {}", self.space_id)
            })
    }

    /// Delete every page of the space, one confirmed batch at a time.
    pub fn delete_all_pages(&mut self) -> Result<usize> {
        let mut deleted = 0usize;
        loop {
            let pages = self.fetch_pages()?;
            if pages.is_empty() {
                break;
            }

            let listing = pages
                .iter()
                .map(|page| format!("({}) {}", page.space_id, page.title))
                .collect::<Vec<_>>()
                .join("\n");
            if !self
                .confirm
                .confirm(&format!("{listing}\nDelete these pages?"))?
            {
                bail!("deletion of {} page(s) was declined", pages.len());
            }

            for page in &pages {
                self.ensure_in_space(page)?;
            }
            for page in &pages {
                self.delete_page(page)?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    fn delete_page(&mut self, page: &Page) -> Result<()> {
        self.ensure_in_space(page)?;
        self.api.delete_page(&page.id)?;
        info!(id = %page.id, title = %page.title, "deleted page");
        Ok(())
    }

    fn ensure_in_space(&self, page: &Page) -> Result<()> {
        if page.space_id != self.space_id {
            bail!(
                "refusing to delete page {} (`{}`): it belongs to space {}, not {}",
                page.id,
                page.title,
                page.space_id,
                self.space_id
            );
        }
        Ok(())
    }
}
