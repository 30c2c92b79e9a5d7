//! Paginated listing envelope

use serde::{Deserialize, Serialize};

/// One page of a paginated listing: `{results, next}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub count: Option<u64>,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

/// List endpoints answer either with a bare array or with a page envelope
/// depending on server pagination settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ListPayload<T> {
    Items(Vec<T>),
    Page(Page<T>),
}

impl<T> ListPayload<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            Self::Items(items) => items,
            Self::Page(page) => page.results,
        }
    }

    /// A bare array is treated as the only page.
    pub fn into_page(self) -> Page<T> {
        match self {
            Self::Items(results) => Page {
                count: Some(results.len() as u64),
                results,
                next: None,
                previous: None,
            },
            Self::Page(page) => page,
        }
    }
}
