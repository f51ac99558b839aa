use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use comrak::{Options, markdown_to_html};
use indexmap::IndexMap;

pub const METADATA_DELIMITER: &str = "---";
const METADATA_SEPARATOR: &str = "\n---\n";
const KEY_VALUE_SEPARATOR: &str = ": ";

/// Ordered `key: value` pairs from the header block of an esa export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: IndexMap<String, String>,
}

impl Metadata {
    pub fn parse(raw: &str) -> Self {
        let mut entries = IndexMap::new();
        for line in raw.lines() {
            if line.is_empty() || line == METADATA_DELIMITER {
                continue;
            }
            // Values such as timestamps contain ": " themselves.
            let (key, value) = line.split_once(KEY_VALUE_SEPARATOR).unwrap_or((line, ""));
            entries.insert(key.to_string(), value.to_string());
        }
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A single esa post as exported to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EsaDocument {
    title: String,
    metadata: Metadata,
    body: String,
    number: Option<u64>,
}

impl EsaDocument {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        let mut document =
            Self::parse(&content).with_context(|| format!("failed to parse {}", path.display()))?;
        if document.number.is_none() {
            document.number = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<u64>().ok());
        }
        Ok(document)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let normalized = content.replace("\r\n", "\n");
        let Some((metadata_raw, body)) = normalized.split_once(METADATA_SEPARATOR) else {
            bail!("missing `{METADATA_DELIMITER}` metadata block");
        };
        let metadata = Metadata::parse(metadata_raw);
        let title = metadata
            .get("title")
            .map(|value| value.trim().replace('"', ""))
            .ok_or_else(|| anyhow::anyhow!("metadata has no `title`"))?;
        let number = metadata
            .get("number")
            .and_then(|value| value.trim().parse::<u64>().ok());

        Ok(Self {
            title,
            metadata,
            body: body.to_string(),
            number,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Top-level category segment.
    pub fn category(&self) -> Option<&str> {
        self.dir()
            .and_then(|category| category.split('/').next())
    }

    /// Full category path, used as the parent directory of the page.
    pub fn dir(&self) -> Option<&str> {
        self.metadata.get("category")
    }

    pub fn created_at(&self) -> Option<&str> {
        self.metadata.get("created_at")
    }

    pub fn updated_at(&self) -> Option<&str> {
        self.metadata.get("updated_at")
    }

    pub fn number(&self) -> Option<u64> {
        self.number
    }

    pub fn body_html(&self) -> String {
        render_markdown(&self.body)
    }

    pub fn meta_html(&self) -> String {
        let list = self
            .metadata
            .iter()
            .map(|(key, value)| format!("  - {key}: {value}"))
            .collect::<Vec<_>>()
            .join("\n");
        render_markdown(&list)
    }

    /// Storage-format page body: metadata list followed by the rendered post.
    pub fn page_body(&self) -> String {
        format!("{}\n{}\n", self.meta_html(), self.body_html())
    }
}

pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::default();
    options.extension.table = true;
    options.render.r#unsafe = true;
    markdown_to_html(markdown, &options)
}
