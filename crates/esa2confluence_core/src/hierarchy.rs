use std::collections::HashMap;

use anyhow::Result;
use tracing::debug;

use crate::confirm::Confirm;
use crate::confluence::{ConfluenceApi, Page};
use crate::space::{ConfluenceSpace, CreatedPage};

/// Maps slash-separated directory paths to the Confluence pages standing in for them.
///
/// The empty path is the root. It maps to the root page when one was created
/// and is absent otherwise, in which case top-level pages are created at the
/// space root.
#[derive(Debug, Default)]
pub struct PageHierarchy {
    page_id_by_path: HashMap<String, String>,
    created_directories: usize,
}

impl PageHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_id(&self, path: &str) -> Option<&str> {
        self.page_id_by_path.get(path).map(String::as_str)
    }

    pub fn root_page_id(&self) -> Option<&str> {
        self.page_id("")
    }

    pub fn created_directories(&self) -> usize {
        self.created_directories
    }

    pub fn create_root_page<A, C>(
        &mut self,
        space: &mut ConfluenceSpace<A, C>,
        title: &str,
    ) -> Result<Page>
    where
        A: ConfluenceApi,
        C: Confirm,
    {
        let created = space.create_or_replace_page(title, "", None)?;
        Ok(self.record(String::new(), created))
    }

    /// Create `title` under `dir`, creating any missing directory pages first.
    pub fn create_page<A, C>(
        &mut self,
        space: &mut ConfluenceSpace<A, C>,
        title: &str,
        body: &str,
        dir: &str,
    ) -> Result<Page>
    where
        A: ConfluenceApi,
        C: Confirm,
    {
        let dir = normalize_dir(dir);
        self.ensure_dir(space, &dir)?;

        let parent_id = self.page_id(&dir).map(ToString::to_string);
        let created = space.create_or_replace_page(title, body, parent_id.as_deref())?;
        Ok(self.record(join_path(&dir, title), created))
    }

    /// Map `path` to the new page. Paths that pointed at a page deleted by an
    /// overwrite are forgotten so they get recreated on next use.
    fn record(&mut self, path: String, created: CreatedPage) -> Page {
        if let Some(replaced_id) = created.replaced_id.as_deref() {
            self.page_id_by_path.retain(|stale_path, id| {
                let stale = id == replaced_id;
                if stale {
                    debug!(path = %stale_path, id = %replaced_id, "forgetting overwritten page");
                }
                !stale
            });
        }
        self.page_id_by_path.insert(path, created.page.id.clone());
        created.page
    }

    fn ensure_dir<A, C>(&mut self, space: &mut ConfluenceSpace<A, C>, dir: &str) -> Result<()>
    where
        A: ConfluenceApi,
        C: Confirm,
    {
        if dir.is_empty() || self.page_id_by_path.contains_key(dir) {
            return Ok(());
        }

        let (parent, title) = split_dir(dir);
        debug!(dir, "creating directory page");
        self.create_page(space, title, "", parent)?;
        self.created_directories += 1;
        Ok(())
    }
}

fn normalize_dir(dir: &str) -> String {
    dir.split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn split_dir(dir: &str) -> (&str, &str) {
    dir.rsplit_once('/').unwrap_or(("", dir))
}

fn join_path(dir: &str, title: &str) -> String {
    if dir.is_empty() {
        title.to_string()
    } else {
        format!("{dir}/{title}")
    }
}

#[cfg(test)]
mod tests {
    use super::{PageHierarchy, join_path, normalize_dir, split_dir};
    use crate::space::{ConfluenceSpace, CreatedPage};
    use crate::testing::{ApiCall, MockConfluence, SPACE_ID, ScriptedConfirm};

    type TestSpace = ConfluenceSpace<MockConfluence, ScriptedConfirm>;

    fn space() -> TestSpace {
        ConfluenceSpace::new(MockConfluence::default(), ScriptedConfirm::new(&[]), SPACE_ID)
    }

    fn id_of(space: &TestSpace, title: &str) -> String {
        space
            .api()
            .page_titled(title)
            .map(|page| page.id.clone())
            .expect("page exists")
    }

    #[test]
    fn creates_ancestors_parent_first() {
        let mut space = space();
        let mut hierarchy = PageHierarchy::new();

        let leaf = hierarchy
            .create_page(&mut space, "Leaf", "<p>leaf</p>", "x/y/z")
            .expect("create");

        assert_eq!(space.api().created_titles(), vec!["x", "y", "z", "Leaf"]);
        let x = id_of(&space, "x");
        let y = id_of(&space, "y");
        let z = id_of(&space, "z");
        assert_eq!(
            space.api().calls,
            vec![
                ApiCall::create_page("x", None),
                ApiCall::create_page("y", Some(x.as_str())),
                ApiCall::create_page("z", Some(y.as_str())),
                ApiCall::create_page("Leaf", Some(z.as_str())),
            ]
        );
        assert_eq!(hierarchy.page_id("x/y"), Some(y.as_str()));
        assert_eq!(hierarchy.page_id("x/y/z/Leaf"), Some(leaf.id.as_str()));
        assert_eq!(hierarchy.created_directories(), 3);
    }

    #[test]
    fn sibling_documents_reuse_memoized_directories() {
        let mut space = space();
        let mut hierarchy = PageHierarchy::new();

        hierarchy
            .create_page(&mut space, "First", "", "a/b")
            .expect("first");
        hierarchy
            .create_page(&mut space, "Second", "", "a/b")
            .expect("second");

        assert_eq!(
            space.api().created_titles(),
            vec!["a", "b", "First", "Second"]
        );
        let b = id_of(&space, "b");
        assert_eq!(
            space.api().calls.last(),
            Some(&ApiCall::create_page("Second", Some(b.as_str())))
        );
        assert_eq!(hierarchy.created_directories(), 2);
    }

    #[test]
    fn shared_prefix_only_creates_the_new_branch() {
        let mut space = space();
        let mut hierarchy = PageHierarchy::new();

        hierarchy
            .create_page(&mut space, "One", "", "a/b")
            .expect("one");
        hierarchy
            .create_page(&mut space, "Two", "", "a/c")
            .expect("two");

        assert_eq!(
            space.api().created_titles(),
            vec!["a", "b", "One", "c", "Two"]
        );
        let a = id_of(&space, "a");
        assert!(
            space
                .api()
                .calls
                .contains(&ApiCall::create_page("c", Some(a.as_str())))
        );
    }

    #[test]
    fn uncategorized_document_is_root_level_without_root_page() {
        let mut space = space();
        let mut hierarchy = PageHierarchy::new();

        hierarchy
            .create_page(&mut space, "Loose", "", "")
            .expect("create");
        assert_eq!(space.api().calls, vec![ApiCall::create_page("Loose", None)]);
        assert_eq!(hierarchy.root_page_id(), None);
    }

    #[test]
    fn root_page_parents_top_level_pages() {
        let mut space = space();
        let mut hierarchy = PageHierarchy::new();

        let root = hierarchy
            .create_root_page(&mut space, "2024-01-01 00:00:00")
            .expect("root");
        hierarchy
            .create_page(&mut space, "Loose", "", "")
            .expect("loose");
        hierarchy
            .create_page(&mut space, "Nested", "", "dev")
            .expect("nested");

        assert_eq!(hierarchy.root_page_id(), Some(root.id.as_str()));
        let dev = id_of(&space, "dev");
        assert_eq!(
            space.api().calls,
            vec![
                ApiCall::create_page("2024-01-01 00:00:00", None),
                ApiCall::create_page("Loose", Some(root.id.as_str())),
                ApiCall::create_page("dev", Some(root.id.as_str())),
                ApiCall::create_page("Nested", Some(dev.as_str())),
            ]
        );
    }

    #[test]
    fn document_page_becomes_ancestor_for_later_documents() {
        let mut space = space();
        let mut hierarchy = PageHierarchy::new();

        let guide = hierarchy
            .create_page(&mut space, "guide", "<p>guide</p>", "docs")
            .expect("guide");
        hierarchy
            .create_page(&mut space, "Chapter", "", "docs/guide")
            .expect("chapter");

        assert_eq!(
            space.api().created_titles(),
            vec!["docs", "guide", "Chapter"]
        );
        assert_eq!(
            space.api().calls.last(),
            Some(&ApiCall::create_page("Chapter", Some(guide.id.as_str())))
        );
    }

    #[test]
    fn failed_directory_creation_propagates_and_creates_no_leaf() {
        let mut space = ConfluenceSpace::new(
            MockConfluence::default(),
            ScriptedConfirm::new(&[false]),
            SPACE_ID,
        );
        let mut hierarchy = PageHierarchy::new();
        hierarchy
            .create_page(&mut space, "b", "", "")
            .expect("standalone b");

        let error = hierarchy
            .create_page(&mut space, "Leaf", "", "a/b")
            .expect_err("conflict on b declined");
        assert!(error.to_string().contains("declined"));
        assert_eq!(space.api().created_titles(), vec!["b", "a", "b"]);
        assert!(hierarchy.page_id("a").is_some());
        assert_eq!(hierarchy.page_id("a/b"), None);
    }

    #[test]
    fn overwritten_directory_page_is_recreated_for_its_old_path() {
        let mut space = ConfluenceSpace::new(
            MockConfluence::default(),
            ScriptedConfirm::new(&[true, true]),
            SPACE_ID,
        );
        let mut hierarchy = PageHierarchy::new();

        hierarchy
            .create_page(&mut space, "One", "", "a/x")
            .expect("one");
        let first_x = hierarchy.page_id("a/x").expect("a/x").to_string();

        hierarchy
            .create_page(&mut space, "Two", "", "b/x")
            .expect("two overwrites x");
        assert_eq!(hierarchy.page_id("a/x"), None);
        let second_x = hierarchy.page_id("b/x").expect("b/x").to_string();
        assert_ne!(second_x, first_x);

        let three = hierarchy
            .create_page(&mut space, "Three", "", "a/x")
            .expect("three");
        let third_x = hierarchy.page_id("a/x").expect("a/x again").to_string();
        assert_ne!(third_x, first_x);
        assert_eq!(three.parent_id.as_deref(), Some(third_x.as_str()));
        assert_eq!(id_of(&space, "x"), third_x);
        assert_eq!(hierarchy.page_id("b/x"), None);
        assert_eq!(space.confirm().prompts.len(), 2);
        assert!(
            space
                .api()
                .calls
                .contains(&ApiCall::DeletePage(first_x.clone()))
        );
    }

    #[test]
    fn path_helpers() {
        assert_eq!(normalize_dir("/a//b/ "), "a/b");
        assert_eq!(normalize_dir(""), "");
        assert_eq!(split_dir("a/b/c"), ("a/b", "c"));
        assert_eq!(split_dir("a"), ("", "a"));
        assert_eq!(join_path("", "t"), "t");
        assert_eq!(join_path("a/b", "t"), "a/b/t");
    }
}
