//! Planner configuration.

/// Default number of rows per page.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Default relation depth a selection may expand.
pub const DEFAULT_SELECT_DEPTH: usize = 5;

/// Request parameter names the planner reads outside of filtering.
///
/// Each concern accepts several names; the first one present in the
/// request wins. These keys are never compiled as filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestKeys {
    /// Selection list.
    pub select: Vec<String>,
    /// Sort token list.
    pub sort: Vec<String>,
    /// One-based page number.
    pub page: Vec<String>,
    /// Rows per page.
    pub page_size: Vec<String>,
    /// Rows to skip when no page is given.
    pub skip: Vec<String>,
}

impl RequestKeys {
    /// Check if a request key is reserved for selection, sorting or pagination.
    pub fn is_reserved(&self, key: &str) -> bool {
        [&self.select, &self.sort, &self.page, &self.page_size, &self.skip]
            .iter()
            .any(|names| names.iter().any(|n| n == key))
    }
}

impl Default for RequestKeys {
    fn default() -> Self {
        fn names(list: &[&str]) -> Vec<String> {
            list.iter().map(|s| s.to_string()).collect()
        }

        Self {
            select: names(&["props"]),
            sort: names(&["sortby", "sorts"]),
            page: names(&["page", "pagenumber"]),
            page_size: names(&["pagesize", "size", "count"]),
            skip: names(&["skip", "offset"]),
        }
    }
}

/// Configuration for a [`QueryPlanner`](crate::QueryPlanner).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanConfig {
    /// Rows per page when the request gives none.
    pub default_page_size: u64,
    /// Upper bound for a requested page size.
    pub max_page_size: Option<u64>,
    /// Relation levels a selection may expand below the root.
    pub select_depth: usize,
    /// Reject unrecognized boolean filter tokens instead of comparing with false.
    pub strict_flags: bool,
    /// Request parameter names.
    pub keys: RequestKeys,
}

impl PlanConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default page size.
    pub fn with_default_page_size(mut self, size: u64) -> Self {
        self.default_page_size = size;
        self
    }

    /// Cap requested page sizes.
    pub fn with_max_page_size(mut self, size: u64) -> Self {
        self.max_page_size = Some(size);
        self
    }

    /// Set the selection depth budget.
    pub fn with_select_depth(mut self, depth: usize) -> Self {
        self.select_depth = depth;
        self
    }

    /// Enable strict boolean tokens.
    pub fn with_strict_flags(mut self, strict: bool) -> Self {
        self.strict_flags = strict;
        self
    }

    /// Replace the request parameter names.
    pub fn with_keys(mut self, keys: RequestKeys) -> Self {
        self.keys = keys;
        self
    }

    /// Clamp a requested page size to the configured bounds.
    ///
    /// Zero falls back to the default size.
    pub fn clamp_page_size(&self, requested: Option<u64>) -> u64 {
        let size = match requested {
            Some(0) | None => self.default_page_size,
            Some(size) => size,
        };
        match self.max_page_size {
            Some(max) => size.min(max),
            None => size,
        }
    }
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: None,
            select_depth: DEFAULT_SELECT_DEPTH,
            strict_flags: false,
            keys: RequestKeys::default(),
        }
    }
}
