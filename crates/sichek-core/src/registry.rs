//! Regex Registry: interns compiled regular expressions keyed by their
//! source expression, at most one compilation per distinct expression.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use regex::Regex;

/// An interned, lazily-compiled regex entry. Cheap to clone (`Arc`); shared
/// across every `RegexEntry` in every `EventFilter` that references the same
/// source expression.
pub struct RegexFilter {
    pub name: String,
    pub source: String,
    compiled: RwLock<Option<Regex>>,
}

impl RegexFilter {
    fn new(name: String, source: String) -> Self {
        RegexFilter {
            name,
            source,
            compiled: RwLock::new(None),
        }
    }

    /// Idempotent, thread-safe compilation. Repeated calls after a successful
    /// compile are a no-op; a failed compile leaves the entry uncompiled so
    /// `is_match` keeps returning `false` rather than panicking.
    pub fn compile(&self) -> Result<(), regex::Error> {
        if self.compiled.read().unwrap().is_some() {
            return Ok(());
        }
        let mut guard = self.compiled.write().unwrap();
        if guard.is_some() {
            return Ok(());
        }
        let re = Regex::new(&self.source)?;
        *guard = Some(re);
        Ok(())
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.read().unwrap().is_some()
    }

    /// `false` for an uncompiled or never-successfully-compiled entry rather
    /// than panicking.
    pub fn is_match(&self, line: &str) -> bool {
        match self.compiled.read().unwrap().as_ref() {
            Some(re) => re.is_match(line),
            None => false,
        }
    }
}

impl std::fmt::Debug for RegexFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegexFilter")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("compiled", &self.is_compiled())
            .finish()
    }
}

/// Process-wide (here: per-`Runtime`) map from source expression to interned
/// `RegexFilter`.
#[derive(Default)]
pub struct RegexRegistry {
    entries: Mutex<HashMap<String, Arc<RegexFilter>>>,
}

impl RegexRegistry {
    pub fn new() -> Self {
        RegexRegistry::default()
    }

    /// Returns the interned entry for `source`, creating it (uncompiled) on
    /// first use. A second request for the same `source` returns the same
    /// `Arc`.
    pub fn get_or_create(&self, name: &str, source: &str) -> Arc<RegexFilter> {
        let mut entries = self.entries.lock().unwrap();
        entries
            .entry(source.to_string())
            .or_insert_with(|| Arc::new(RegexFilter::new(name.to_string(), source.to_string())))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
