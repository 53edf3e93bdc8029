//! Bounded in-memory cache for establishment pages.
//!
//! Keys are a structured tuple, not a formatted string, so two different
//! parameter combinations can never collide through string formatting.
//! Capacity is bounded with oldest-insertion eviction, and entries can be
//! invalidated explicitly.

use crate::models::EstablishmentInfo;
use indexmap::IndexMap;

/// Structured cache key: one establishment page per (UF, page, page size).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    uf: String,
    page: u32,
    page_size: u32,
}

impl PageKey {
    /// The UF sigla is folded to lowercase; `SP` and `sp` are one page.
    pub fn new(uf: &str, page: u32, page_size: u32) -> Self {
        Self {
            uf: uf.to_ascii_lowercase(),
            page,
            page_size,
        }
    }
}

/// One cached page result.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedPage {
    pub items: Vec<EstablishmentInfo>,
    pub has_next_page: bool,
}

/// Insertion-ordered bounded page cache.
#[derive(Debug, Clone)]
pub struct PageCache {
    entries: IndexMap<PageKey, CachedPage>,
    capacity: usize,
}

impl PageCache {
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new(capacity: usize) -> Self {
        Self {
            entries: IndexMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, key: &PageKey) -> Option<&CachedPage> {
        self.entries.get(key)
    }

    /// Insert a page, evicting the oldest entries once at capacity.
    pub fn insert(&mut self, key: PageKey, page: CachedPage) {
        while self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            self.entries.shift_remove_index(0);
        }
        self.entries.insert(key, page);
    }

    /// Drop one entry; returns whether it was present.
    pub fn invalidate(&mut self, key: &PageKey) -> bool {
        self.entries.shift_remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PageCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
