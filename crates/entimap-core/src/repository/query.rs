use crate::model::Model;
use crate::value::Value;
use serde::Serialize;
use std::collections::BTreeMap;

/// Host query arguments.
///
/// Filter keys are host-side names (e.g. `post_type`); a list value
/// matches any of its elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindArgs {
    pub filters: BTreeMap<String, Value>,
    /// Restrict to these primary keys
    pub include: Option<Vec<Value>>,
    /// `field` or `field DESC`
    pub order_by: Vec<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    /// 1-based page; ignored when `offset` is set
    pub page: Option<usize>,
}

impl FindArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.filters.insert(key.to_string(), value.into());
        self
    }

    pub fn include(mut self, ids: Vec<Value>) -> Self {
        self.include = Some(ids);
        self
    }

    pub fn order_by(mut self, spec: &str) -> Self {
        self.order_by.push(spec.to_string());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    pub fn effective_offset(&self) -> usize {
        match (self.offset, self.page, self.limit) {
            (Some(offset), _, _) => offset,
            (None, Some(page), Some(limit)) => page.saturating_sub(1) * limit,
            _ => 0,
        }
    }

    /// Fill in `defaults` for filters the caller did not set.
    pub fn with_defaults(&self, defaults: &BTreeMap<String, Value>) -> Self {
        let mut merged = self.clone();
        for (key, value) in defaults {
            merged
                .filters
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        merged
    }
}

/// Paging metadata of the last query a repository ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub found: usize,
    pub current_page: usize,
    pub total_pages: usize,
    pub per_page: Option<usize>,
}

impl Pagination {
    pub fn from_query(args: &FindArgs, found: usize) -> Self {
        let per_page = args.limit.filter(|limit| *limit > 0);
        let total_pages = match per_page {
            Some(per_page) => found.div_ceil(per_page),
            None => usize::from(found > 0),
        };
        let current_page = match per_page {
            Some(per_page) => args.effective_offset() / per_page + 1,
            None => 1,
        };
        Self {
            found,
            current_page,
            total_pages,
            per_page,
        }
    }
}

#[derive(Debug)]
pub struct Page {
    pub pagination: Pagination,
    pub items: Vec<Model>,
}
