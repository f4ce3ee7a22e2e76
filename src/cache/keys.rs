//! Cache key layout for one resource family.
//!
//! `<family>:all` holds the collection, `<family>:<id>` one item, and
//! `<family>:*` covers both for invalidation.

use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheKeys {
    family: &'static str,
}

impl CacheKeys {
    pub const fn new(family: &'static str) -> Self {
        Self { family }
    }

    pub fn family(&self) -> &'static str {
        self.family
    }

    pub fn collection(&self) -> String {
        format!("{}:all", self.family)
    }

    pub fn item(&self, id: impl Display) -> String {
        format!("{}:{}", self.family, id)
    }

    pub fn pattern(&self) -> String {
        format!("{}:*", self.family)
    }
}
