use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: u64 = 20;

/// Query string accepted by every list endpoint. Resources pick the exact
/// match filters that apply to them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub search: Option<String>,
    pub q: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
    pub status: Option<String>,
    pub date: Option<String>,
    pub kind: Option<String>,
    pub client_id: Option<String>,
    pub patient_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl ListParams {
    /// `search` wins over `q`.
    pub fn term(&self) -> &str {
        self.search
            .as_deref()
            .or(self.q.as_deref())
            .unwrap_or("")
    }

    pub fn window(&self, max_limit: u64) -> Window {
        Window::new(self.page, self.limit, self.skip, DEFAULT_LIMIT, max_limit)
    }
}

/// A resolved page: `skip` wins over `page` when both are supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub page: u64,
    pub limit: u64,
    pub skip: u64,
}

impl Window {
    pub fn new(page: Option<u64>, limit: Option<u64>, skip: Option<u64>, default_limit: u64, max_limit: u64) -> Self {
        let limit = limit.unwrap_or(default_limit).clamp(1, max_limit.max(1));
        match skip {
            Some(skip) => Self {
                page: (skip / limit).saturating_add(1),
                limit,
                skip,
            },
            None => {
                let page = page.unwrap_or(1).max(1);
                Self {
                    page,
                    limit,
                    skip: (page - 1).saturating_mul(limit),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: u64, window: Window) -> Self {
        Self {
            items,
            total,
            page: window.page,
            limit: window.limit,
            total_pages: total.div_ceil(window.limit),
        }
    }
}
