//! 分页相关的数据结构

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PaginationParams {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self { page, per_page }
    }

    pub fn get_page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn get_per_page(&self) -> u32 {
        self.per_page.unwrap_or(20).clamp(1, 100)
    }

    pub fn get_offset(&self) -> usize {
        (self.get_page() as usize - 1).saturating_mul(self.get_per_page() as usize)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    /// Slices an already filtered, ordered list down to the requested page.
    pub fn from_items(items: Vec<T>, params: &PaginationParams) -> Self {
        let page = params.get_page();
        let page_size = params.get_per_page();
        let total = items.len() as u64;
        let data = items
            .into_iter()
            .skip(params.get_offset())
            .take(page_size as usize)
            .collect();
        Self {
            data,
            page,
            page_size,
            total,
            total_pages: total.div_ceil(page_size as u64),
        }
    }
}
