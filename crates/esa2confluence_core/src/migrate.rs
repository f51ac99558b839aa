use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::confirm::Confirm;
use crate::confluence::ConfluenceApi;
use crate::document::{EsaDocument, render_markdown};
use crate::esa::EsaApi;
use crate::hierarchy::PageHierarchy;
use crate::space::ConfluenceSpace;

const ROOT_TITLE_OFFSET_SECONDS: i32 = 9 * 3600;
const ROOT_TITLE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootPage {
    /// Titled with the start time of the run (UTC+09:00).
    Timestamped,
    Titled(String),
    None,
}

#[derive(Debug, Clone)]
pub struct MigrateOptions {
    pub target_dir: PathBuf,
    pub restart_at: Option<String>,
    pub root_page: RootPage,
    pub migrate_comments: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrateReport {
    pub scanned_files: usize,
    pub skipped_files: usize,
    pub migrated_pages: usize,
    pub directory_pages: usize,
    pub migrated_comments: usize,
    pub root_page_id: Option<String>,
    pub restart_marker_matched: Option<bool>,
    pub request_count: usize,
}

/// Markdown files under `target_dir`, in sorted traversal order.
pub fn collect_markdown_files(target_dir: &Path) -> Result<Vec<PathBuf>> {
    if !target_dir.is_dir() {
        bail!("directory `{}` does not exist", target_dir.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(target_dir)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("failed to walk {}", target_dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|ext| ext.to_str()) != Some("md") {
            continue;
        }
        files.push(entry.into_path());
    }
    Ok(files)
}

pub fn timestamped_root_title(now: DateTime<Utc>) -> Result<String> {
    let offset = FixedOffset::east_opt(ROOT_TITLE_OFFSET_SECONDS)
        .context("invalid root page time offset")?;
    Ok(now.with_timezone(&offset).format(ROOT_TITLE_FORMAT).to_string())
}

pub fn migrate_documents<A, C, E>(
    space: &mut ConfluenceSpace<A, C>,
    mut esa: Option<&mut E>,
    options: &MigrateOptions,
) -> Result<MigrateReport>
where
    A: ConfluenceApi,
    C: Confirm,
    E: EsaApi,
{
    if options.migrate_comments && esa.is_none() {
        bail!("comment migration requires an esa client");
    }

    let files = collect_markdown_files(&options.target_dir)?;
    let mut report = MigrateReport {
        scanned_files: files.len(),
        ..MigrateReport::default()
    };

    let mut hierarchy = PageHierarchy::new();
    let root_title = match &options.root_page {
        RootPage::Timestamped => Some(timestamped_root_title(Utc::now())?),
        RootPage::Titled(title) => Some(title.clone()),
        RootPage::None => None,
    };
    if let Some(title) = root_title {
        let root = hierarchy.create_root_page(space, &title)?;
        info!(id = %root.id, title = %root.title, "created root page");
        report.root_page_id = Some(root.id);
    }

    let mut skipping = options.restart_at.is_some();
    for path in &files {
        let shown = normalize_path(path);
        if skipping
            && let Some(marker) = &options.restart_at
            && shown.contains(marker.as_str())
        {
            skipping = false;
        }
        if skipping {
            debug!(path = %shown, "skipping until restart marker");
            report.skipped_files += 1;
            continue;
        }

        info!(path = %shown, "migrating document");
        let document = EsaDocument::from_path(path)?;
        let page = hierarchy
            .create_page(
                space,
                document.title(),
                &document.page_body(),
                document.dir().unwrap_or(""),
            )
            .with_context(|| format!("failed to migrate {shown}"))?;
        report.migrated_pages += 1;

        if !options.migrate_comments {
            continue;
        }
        let Some(post_number) = document.number() else {
            warn!(path = %shown, "post number unknown; skipping comments");
            continue;
        };
        if let Some(esa) = esa.as_deref_mut() {
            for comment in esa.fetch_comments(post_number)? {
                space.create_comment(&page.id, &render_markdown(&comment.body_md))?;
                report.migrated_comments += 1;
            }
        }
    }

    if options.restart_at.is_some() {
        report.restart_marker_matched = Some(!skipping);
        if skipping {
            warn!(
                marker = options.restart_at.as_deref().unwrap_or_default(),
                "restart marker never matched; nothing was migrated"
            );
        }
    }
    report.directory_pages = hierarchy.created_directories();
    report.request_count = space.request_count();
    Ok(report)
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
