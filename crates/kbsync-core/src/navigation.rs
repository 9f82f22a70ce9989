//! Navigation state: current directory, pagination, and search.
//!
//! Browsing a directory and searching are mutually exclusive. Descending into
//! a directory clears the search, and a newly settled search returns to the
//! root. Any change of directory, search, or connection restarts pagination.

use serde::Serialize;

use crate::constants::{ROOT_BREADCRUMB, ROOT_DIRECTORY_ID, ROOT_PATH_FILTER};
use crate::types::{Resource, ResourceId};

/// One breadcrumb entry. Index `-1` is the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub index: isize,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Navigation {
    path_history: Vec<Resource>,
    page_cursors: Vec<String>,
    current_page_index: usize,
    search_term: String,
    debounced_search_term: String,
}

impl Navigation {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Directory
    // ------------------------------------------------------------------

    pub fn path_history(&self) -> &[Resource] {
        &self.path_history
    }

    /// Directory currently shown, `None` at the root.
    pub fn current_directory(&self) -> Option<&Resource> {
        self.path_history.last()
    }

    pub fn current_directory_id(&self) -> Option<&ResourceId> {
        self.current_directory().map(|r| &r.resource_id)
    }

    /// Directory id used in cache keys; the root sentinel at the top.
    pub fn directory_key(&self) -> String {
        self.current_directory_id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| ROOT_DIRECTORY_ID.to_string())
    }

    /// Membership path filter: `/` at root, `/<path>` inside a directory.
    pub fn membership_path_filter(&self) -> String {
        match self.current_directory() {
            Some(dir) => format!("/{}", dir.path.trim_start_matches('/')),
            None => ROOT_PATH_FILTER.to_string(),
        }
    }

    /// Enter `directory`.
    ///
    /// Clears the search (raw and settled) and restarts pagination.
    pub fn descend(&mut self, directory: Resource) {
        self.path_history.push(directory);
        self.search_term.clear();
        self.debounced_search_term.clear();
        self.reset_pagination();
    }

    /// Keep the first `index + 1` entries of the path history.
    ///
    /// `-1` returns to the root. Indices past the end leave the path alone but
    /// still restart pagination.
    pub fn jump_to_breadcrumb(&mut self, index: isize) {
        let keep = if index <= ROOT_BREADCRUMB {
            0
        } else {
            (index as usize).saturating_add(1)
        };
        self.path_history.truncate(keep);
        self.reset_pagination();
    }

    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        std::iter::once(Breadcrumb {
            index: ROOT_BREADCRUMB,
            label: ROOT_DIRECTORY_ID.to_string(),
        })
        .chain(self.path_history.iter().enumerate().map(|(i, dir)| Breadcrumb {
            index: i as isize,
            label: dir.name().to_string(),
        }))
        .collect()
    }

    /// Back to the root directory with a fresh pagination.
    pub fn reset_to_root(&mut self) {
        self.path_history.clear();
        self.reset_pagination();
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn debounced_search_term(&self) -> &str {
        &self.debounced_search_term
    }

    /// Settled search term, `None` when empty.
    pub fn active_search(&self) -> Option<&str> {
        let term = self.debounced_search_term.trim();
        (!term.is_empty()).then_some(term)
    }

    /// Record a keystroke. Has no effect on the listing until it settles.
    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
    }

    /// Apply a settled search term.
    ///
    /// A change returns to the root and restarts pagination. Returns false
    /// when the settled term is unchanged.
    pub fn apply_debounced_search(&mut self, term: &str) -> bool {
        if self.debounced_search_term == term {
            return false;
        }
        self.debounced_search_term = term.to_string();
        self.reset_to_root();
        true
    }

    // ------------------------------------------------------------------
    // Pagination
    // ------------------------------------------------------------------

    pub fn current_page_index(&self) -> usize {
        self.current_page_index
    }

    pub fn page_cursors(&self) -> &[String] {
        &self.page_cursors
    }

    /// Cursor for the page currently shown, `None` for the first page.
    pub fn current_cursor(&self) -> Option<&str> {
        match self.current_page_index {
            0 => None,
            n => self.page_cursors.get(n - 1).map(String::as_str),
        }
    }

    pub fn has_previous_page(&self) -> bool {
        self.current_page_index > 0
    }

    /// Move one page forward using the current page's `next_cursor`.
    ///
    /// Pages already visited reuse their stored cursor. Returns false when
    /// there is no next page.
    pub fn advance_page(&mut self, next_cursor: Option<&str>) -> bool {
        let Some(cursor) = next_cursor else {
            return false;
        };
        if self.current_page_index >= self.page_cursors.len() {
            self.page_cursors.push(cursor.to_string());
        } else {
            self.page_cursors[self.current_page_index] = cursor.to_string();
        }
        self.current_page_index += 1;
        true
    }

    /// Move one page back. Stored cursors are kept.
    pub fn retreat_page(&mut self) -> bool {
        if self.current_page_index == 0 {
            return false;
        }
        self.current_page_index -= 1;
        true
    }

    pub fn reset_pagination(&mut self) {
        self.page_cursors.clear();
        self.current_page_index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir(id: &str, path: &str) -> Resource {
        Resource::directory(id, path)
    }

    #[test]
    fn test_root_defaults() {
        let nav = Navigation::new();
        assert!(nav.current_directory_id().is_none());
        assert_eq!(nav.directory_key(), "root");
        assert_eq!(nav.membership_path_filter(), "/");
        assert!(nav.current_cursor().is_none());
    }

    #[test]
    fn test_descend_clears_search_and_pagination() {
        let mut nav = Navigation::new();
        nav.set_search_term("rep");
        nav.apply_debounced_search("rep");
        nav.advance_page(Some("c1"));

        nav.descend(dir("d1", "My Documents"));

        assert_eq!(nav.directory_key(), "d1");
        assert_eq!(nav.search_term(), "");
        assert!(nav.active_search().is_none());
        assert_eq!(nav.current_page_index(), 0);
        assert!(nav.page_cursors().is_empty());
        assert_eq!(nav.membership_path_filter(), "/My Documents");
    }

    #[test]
    fn test_breadcrumb_jump() {
        let mut nav = Navigation::new();
        nav.descend(dir("a", "a"));
        nav.descend(dir("b", "a/b"));
        nav.descend(dir("c", "a/b/c"));
        nav.advance_page(Some("c1"));

        nav.jump_to_breadcrumb(0);
        assert_eq!(nav.path_history().len(), 1);
        assert_eq!(nav.directory_key(), "a");
        assert_eq!(nav.current_page_index(), 0);

        nav.jump_to_breadcrumb(-1);
        assert!(nav.path_history().is_empty());
    }

    #[test]
    fn test_breadcrumb_labels() {
        let mut nav = Navigation::new();
        nav.descend(dir("a", "My Documents"));
        nav.descend(dir("b", "My Documents/Subfolder A"));
        let labels: Vec<(isize, String)> = nav
            .breadcrumbs()
            .into_iter()
            .map(|b| (b.index, b.label))
            .collect();
        assert_eq!(
            labels,
            vec![
                (-1, "root".to_string()),
                (0, "My Documents".to_string()),
                (1, "Subfolder A".to_string())
            ]
        );
    }

    #[test]
    fn test_search_change_resets_path_and_pagination() {
        let mut nav = Navigation::new();
        nav.descend(dir("a", "a"));
        nav.advance_page(Some("c1"));
        nav.advance_page(Some("c2"));

        assert!(nav.apply_debounced_search("report"));

        assert!(nav.path_history().is_empty());
        assert_eq!(nav.current_page_index(), 0);
        assert!(nav.page_cursors().is_empty());
        assert_eq!(nav.active_search(), Some("report"));

        // settling on the same term again changes nothing
        nav.advance_page(Some("c1"));
        assert!(!nav.apply_debounced_search("report"));
        assert_eq!(nav.current_page_index(), 1);
    }

    #[test]
    fn test_page_advance_and_retreat() {
        let mut nav = Navigation::new();
        assert!(!nav.advance_page(None));
        assert!(!nav.retreat_page());

        assert!(nav.advance_page(Some("cursor-10")));
        assert!(nav.advance_page(Some("cursor-20")));
        assert_eq!(nav.current_cursor(), Some("cursor-20"));

        assert!(nav.retreat_page());
        assert_eq!(nav.current_cursor(), Some("cursor-10"));
        assert_eq!(nav.page_cursors().len(), 2);

        // replaying a visited page does not grow the cursor list
        assert!(nav.advance_page(Some("cursor-20")));
        assert_eq!(nav.page_cursors().len(), 2);
        assert_eq!(nav.current_page_index(), 2);
    }
}
