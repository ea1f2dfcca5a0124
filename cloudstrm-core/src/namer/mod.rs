//! AI naming client
//!
//! Asks an external text-generation service what a folder contains and turns
//! the answer into final file and folder names. One lookup per folder key is
//! made per process; successful answers are cached, failures are not, so the
//! next file (or the next pass) retries.

mod client;
mod descriptor;

pub use client::{
    build_prompt, parse_descriptor, ChatApiBackend, ChatApiConfig, CompletionBackend,
    DEFAULT_API_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT,
};
pub use descriptor::{FolderDescriptor, MediaType, ResolvedNames};

use std::collections::HashMap;
use std::sync::Mutex;

/// Folder naming client with a per-folder descriptor cache.
///
/// The cache is unbounded and lives as long as the namer; folder keys are
/// bounded by the size of the monitored libraries.
pub struct FolderNamer {
    backend: Box<dyn CompletionBackend>,
    cache: Mutex<HashMap<String, FolderDescriptor>>,
}

impl std::fmt::Debug for FolderNamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderNamer")
            .field("cached_folders", &self.cached_folders())
            .finish()
    }
}

impl FolderNamer {
    pub fn new(backend: impl CompletionBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Namer backed by the chat-completions HTTP API
    pub fn with_chat_api(config: ChatApiConfig) -> crate::Result<Self> {
        Ok(Self::new(ChatApiBackend::new(config)?))
    }

    /// Number of folder keys with a cached descriptor
    pub fn cached_folders(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Descriptor for `folder_key`, asking the oracle on a cache miss.
    ///
    /// Transport errors, non-200 answers and unparsable text are logged and
    /// reported as `None`; nothing is cached in that case.
    pub fn folder_info(&self, folder_key: &str, sample_filename: &str) -> Option<FolderDescriptor> {
        if let Some(hit) = self.cached(folder_key) {
            tracing::info!("Using cached folder info: {}", folder_key);
            return Some(hit);
        }

        let prompt = build_prompt(folder_key, sample_filename);
        let text = match self.backend.complete(&prompt) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Naming oracle call failed for {}: {}", folder_key, e);
                return None;
            }
        };

        let descriptor = match parse_descriptor(&text) {
            Ok(d) => d,
            Err(e) => {
                tracing::error!("Could not parse folder info for {}: {}", folder_key, e);
                return None;
            }
        };

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(folder_key.to_string(), descriptor.clone());
        }
        tracing::info!("Cached folder info: {} -> {}", folder_key, descriptor.label());

        Some(descriptor)
    }

    fn cached(&self, folder_key: &str) -> Option<FolderDescriptor> {
        self.cache.lock().ok()?.get(folder_key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Result, StrmError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeBackend {
        calls: Arc<AtomicUsize>,
        reply: Option<&'static str>,
    }

    impl CompletionBackend for FakeBackend {
        fn complete(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .map(str::to_string)
                .ok_or_else(|| StrmError::Http("timeout".into()))
        }
    }

    fn namer(reply: Option<&'static str>) -> (FolderNamer, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let backend = FakeBackend { calls: calls.clone(), reply };
        (FolderNamer::new(backend), calls)
    }

    #[test]
    fn test_cache_hit_skips_backend() {
        let (namer, calls) = namer(Some(r#"{"type":"movie","chinese_title":"流浪地球"}"#));

        let first = namer.folder_info("流浪地球 (2023)", "a.mkv").unwrap();
        let second = namer.folder_info("流浪地球 (2023)", "b.mkv").unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(namer.cached_folders(), 1);
    }

    #[test]
    fn test_failure_is_not_cached() {
        let (namer, calls) = namer(None);

        assert!(namer.folder_info("x", "a.mkv").is_none());
        assert!(namer.folder_info("x", "b.mkv").is_none());

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(namer.cached_folders(), 0);
    }

    #[test]
    fn test_unparsable_reply_is_not_cached() {
        let (namer, calls) = namer(Some("sorry, no idea"));

        assert!(namer.folder_info("x", "a.mkv").is_none());
        assert!(namer.folder_info("x", "a.mkv").is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
