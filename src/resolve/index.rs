//! Memoizing keyed views over a sheet.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::sheet::{Rule, RuleId, Sheet};

type KeysFn = dyn Fn(&Sheet) -> Vec<String> + Send + Sync;
type LookupFn = dyn Fn(&Sheet, &str) -> Vec<RuleId> + Send + Sync;
type SynthesizeFn = dyn Fn(&mut Sheet, &str) -> RuleId + Send + Sync;
type FactoryFn<T> = dyn Fn(&Sheet, RuleId) -> T + Send + Sync;

/// A lazily built, never evicted map from key to a typed wrapper around the
/// rule backing that key.
///
/// The backing rule is the first [`lookup`](SelectorIndex::new) match; when
/// there is none, one is synthesized and appended to the sheet, so a lookup
/// for any key always succeeds.
pub struct SelectorIndex<T> {
    keys: Box<KeysFn>,
    lookup: Box<LookupFn>,
    synthesize: Box<SynthesizeFn>,
    factory: Box<FactoryFn<T>>,
    cache: HashMap<String, Arc<T>>,
}

impl<T> fmt::Debug for SelectorIndex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.cache.keys().collect();
        keys.sort();
        f.debug_struct("SelectorIndex")
            .field("cached", &keys)
            .finish_non_exhaustive()
    }
}

impl<T> SelectorIndex<T> {
    /// Build an index from its four strategies.
    pub fn new(
        keys: impl Fn(&Sheet) -> Vec<String> + Send + Sync + 'static,
        lookup: impl Fn(&Sheet, &str) -> Vec<RuleId> + Send + Sync + 'static,
        synthesize: impl Fn(&mut Sheet, &str) -> RuleId + Send + Sync + 'static,
        factory: impl Fn(&Sheet, RuleId) -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            keys: Box::new(keys),
            lookup: Box::new(lookup),
            synthesize: Box::new(synthesize),
            factory: Box::new(factory),
            cache: HashMap::new(),
        }
    }

    /// The stock index over rules named `rule_name`, keyed by parameter.
    ///
    /// A rule without a parameter has key `""`; missing keys synthesize
    /// `rule_name[key]`.
    pub fn by_parameter(
        rule_name: &str,
        factory: impl Fn(&Sheet, RuleId) -> T + Send + Sync + 'static,
    ) -> Self {
        let for_keys = rule_name.to_string();
        let for_lookup = rule_name.to_string();
        let for_synthesize = rule_name.to_string();
        Self::new(
            move |sheet| sheet.parameters(&for_keys),
            move |sheet, key| sheet.select(&for_lookup, Some(key)),
            move |sheet, key| {
                let parameter = (!key.is_empty()).then_some(key);
                sheet.push(Rule::synthesized(&for_synthesize, parameter))
            },
            factory,
        )
    }

    /// The wrapper for `key`, building and caching it on first use.
    pub fn get(&mut self, sheet: &mut Sheet, key: &str) -> Arc<T> {
        if let Some(hit) = self.cache.get(key) {
            return Arc::clone(hit);
        }
        let id = match (self.lookup)(sheet, key).first() {
            Some(id) => *id,
            None => {
                tracing::debug!(key, "synthesizing rule for missing selector");
                (self.synthesize)(sheet, key)
            }
        };
        let built = Arc::new((self.factory)(sheet, id));
        self.cache.insert(key.to_string(), Arc::clone(&built));
        built
    }

    /// Returns `true` if `key` has already been built.
    #[must_use]
    pub fn is_cached(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    /// Iterate every key of the sheet with its wrapper.
    ///
    /// Keys are captured once when this is called; each wrapper is resolved
    /// only when the iterator reaches it.
    pub fn entries<'a>(&'a mut self, sheet: &'a mut Sheet) -> Entries<'a, T> {
        let keys = (self.keys)(sheet);
        Entries {
            index: self,
            sheet,
            keys: keys.into_iter(),
        }
    }
}

/// Iterator returned by [`SelectorIndex::entries`].
pub struct Entries<'a, T> {
    index: &'a mut SelectorIndex<T>,
    sheet: &'a mut Sheet,
    keys: std::vec::IntoIter<String>,
}

impl<T> fmt::Debug for Entries<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entries")
            .field("remaining", &self.keys.len())
            .finish_non_exhaustive()
    }
}

impl<T> Iterator for Entries<'_, T> {
    type Item = (String, Arc<T>);

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.keys.next()?;
        let value = self.index.get(self.sheet, &key);
        Some((key, value))
    }
}
