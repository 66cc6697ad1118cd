use crate::error::RegistryError;
use crate::languages::{Language, LanguageProvider};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
struct Inner {
    /// Canonical lowercase name to provider, in registration order
    providers: IndexMap<String, Arc<dyn LanguageProvider>>,
    /// Every lookup key (name, alias, extension) to canonical name
    index: HashMap<String, String>,
}

/// Name-indexed registry of language providers.
///
/// Lookups are case-insensitive and resolve aliases (`golang`, `py`, ...) and file
/// extensions (`.go`, `rs`, ...). Keys are unique across languages.
#[derive(Clone, Default)]
pub struct LanguageRegistry {
    inner: Arc<RwLock<Inner>>,
}

fn normalize(key: &str) -> String {
    key.trim().trim_start_matches('.').to_lowercase()
}

fn lookup_keys(language: &Language) -> Vec<String> {
    let mut keys = vec![normalize(&language.name)];
    keys.extend(language.aliases.iter().map(|alias| normalize(alias)));
    keys.extend(language.file_extensions.iter().map(|ext| normalize(ext)));
    let mut seen = std::collections::HashSet::new();
    keys.retain(|key| !key.is_empty() && seen.insert(key.clone()));
    keys
}

impl LanguageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with `duplicate_language` if the name or any alias/extension already
    /// belongs to another language. The registry is unchanged on failure.
    pub fn register(&self, provider: Arc<dyn LanguageProvider>) -> Result<(), RegistryError> {
        let language = provider.language();
        let name = normalize(&language.name);
        let keys = lookup_keys(language);

        let mut inner = self.inner.write();
        if inner.providers.contains_key(&name) {
            return Err(RegistryError::DuplicateLanguage(language.name.clone()));
        }
        if let Some(taken) = keys.iter().find(|key| inner.index.contains_key(*key)) {
            return Err(RegistryError::DuplicateLanguage(taken.clone()));
        }

        for key in keys {
            inner.index.insert(key, name.clone());
        }
        debug!(language = %language.name, version = %language.version, "registered language");
        inner.providers.insert(name, provider);
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> Result<Arc<dyn LanguageProvider>, RegistryError> {
        let mut inner = self.inner.write();
        let canonical = inner
            .index
            .get(&normalize(name))
            .cloned()
            .ok_or_else(|| RegistryError::LanguageNotFound(name.to_string()))?;
        inner.index.retain(|_, target| *target != canonical);
        inner
            .providers
            .shift_remove(&canonical)
            .ok_or_else(|| RegistryError::LanguageNotFound(name.to_string()))
    }

    /// Resolve by name, alias or extension
    pub fn get(&self, name: &str) -> Result<Arc<dyn LanguageProvider>, RegistryError> {
        let inner = self.inner.read();
        inner
            .index
            .get(&normalize(name))
            .and_then(|canonical| inner.providers.get(canonical))
            .cloned()
            .ok_or_else(|| RegistryError::LanguageNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().index.contains_key(&normalize(name))
    }

    pub fn list(&self) -> Vec<Language> {
        self.inner
            .read()
            .providers
            .values()
            .map(|provider| provider.language().clone())
            .collect()
    }

    /// Display names in registration order
    pub fn names(&self) -> Vec<String> {
        self.inner
            .read()
            .providers
            .values()
            .map(|provider| provider.language().name.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.inner.read().providers.len()
    }
}

impl std::fmt::Debug for LanguageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageRegistry")
            .field("languages", &self.names())
            .finish()
    }
}
