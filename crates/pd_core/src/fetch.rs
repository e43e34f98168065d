//! Sources of PROTO text.

use std::cell::RefCell;
use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::{ProtoError, ProtoResult};

/// Retrieves the raw text of a PROTO by URL.
#[async_trait(?Send)]
pub trait ProtoFetcher {
    async fn fetch(&self, url: &str) -> ProtoResult<String>;
}

/// Reads PROTOs from the local file system (plain paths or `file://` URLs).
#[derive(Debug, Default, Clone, Copy)]
pub struct FileFetcher;

#[async_trait(?Send)]
impl ProtoFetcher for FileFetcher {
    async fn fetch(&self, url: &str) -> ProtoResult<String> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Err(ProtoError::Network {
                url: url.to_string(),
                reason: "remote URLs need a network fetcher".to_string(),
            });
        }

        let path = url.strip_prefix("file://").unwrap_or(url);
        log::debug!("Reading {}", path);
        std::fs::read_to_string(path).map_err(|e| ProtoError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Serves PROTOs from memory and counts how often each URL was requested.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    sources: HashMap<String, String>,
    requests: RefCell<HashMap<String, usize>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(url, text);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, text: impl Into<String>) {
        self.sources.insert(url.into(), text.into());
    }

    /// Number of fetches of `url`, including failed ones.
    pub fn fetch_count(&self, url: &str) -> usize {
        self.requests.borrow().get(url).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.requests.borrow().values().sum()
    }
}

#[async_trait(?Send)]
impl ProtoFetcher for MemoryFetcher {
    async fn fetch(&self, url: &str) -> ProtoResult<String> {
        *self.requests.borrow_mut().entry(url.to_string()).or_insert(0) += 1;
        self.sources.get(url).cloned().ok_or_else(|| ProtoError::Network {
            url: url.to_string(),
            reason: "not found".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_fetcher_counts() {
        let fetcher = MemoryFetcher::new().with_source("a.proto", "PROTO A [ ] { Box { } }");
        let text = pollster::block_on(fetcher.fetch("a.proto")).unwrap();
        assert!(text.starts_with("PROTO A"));
        assert!(pollster::block_on(fetcher.fetch("b.proto")).is_err());
        assert_eq!(fetcher.fetch_count("a.proto"), 1);
        assert_eq!(fetcher.fetch_count("b.proto"), 1);
        assert_eq!(fetcher.total_fetches(), 2);
    }

    #[test]
    fn test_file_fetcher() {
        let path = std::env::temp_dir().join(format!("pd_fetch_{}.proto", std::process::id()));
        std::fs::write(&path, "PROTO T [ ] { Group { } }").unwrap();
        let url = format!("file://{}", path.display());

        let text = pollster::block_on(FileFetcher.fetch(&url)).unwrap();
        assert_eq!(text, "PROTO T [ ] { Group { } }");
        std::fs::remove_file(&path).unwrap();

        let err = pollster::block_on(FileFetcher.fetch(&url)).unwrap_err();
        assert!(matches!(err, ProtoError::Network { .. }));
        let err = pollster::block_on(FileFetcher.fetch("https://example.com/A.proto")).unwrap_err();
        assert!(matches!(err, ProtoError::Network { .. }));
    }
}
