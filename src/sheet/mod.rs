//! Sheets: ordered rule collections parsed from one document and its imports.
//!
//! [`Sheet::load`] reads a root document through [`FileSystemOps`] and splices
//! every `@import`ed document in at the position of its directive, so rules
//! that follow an import override the imported ones in the cascade.
pub mod parser;
pub mod rule;
pub mod tokenizer;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::diagnostics::{Diagnostic, Diagnostics, MessageCode, SourceLocation};
use crate::error::{EndUserError, Result};
use crate::operations::FileSystemOps;
use parser::Item;
pub use rule::{Properties, Property, PropertyView, Rule, RuleId, RuleSet};

/// An ordered sequence of rules.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    rules: Vec<Rule>,
    sources: Vec<PathBuf>,
}

impl Sheet {
    /// Create an empty sheet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an in-memory document.
    ///
    /// In-memory documents have no directory to resolve imports against, so
    /// every `@import` is reported as [`MessageCode::UnknownImport`].
    #[must_use]
    pub fn parse(text: &str, diagnostics: &Diagnostics) -> Self {
        let mut sheet = Self::new();
        for item in parser::parse(text, None, diagnostics) {
            match item {
                Item::Rule(rule) => {
                    sheet.push(rule);
                }
                Item::Import { target, location } => {
                    diagnostics.report(
                        Diagnostic::error(
                            MessageCode::UnknownImport,
                            format!("cannot import '{target}' from an in-memory sheet"),
                        )
                        .at(Some(&location)),
                    );
                }
            }
        }
        sheet
    }

    /// Load the document at `path` together with everything it imports.
    ///
    /// # Errors
    ///
    /// Returns an [`EndUserError`] if the root document cannot be read.
    /// Problems with imported documents are reported to `diagnostics`.
    pub fn load(path: &Path, fs: &dyn FileSystemOps, diagnostics: &Diagnostics) -> Result<Self> {
        let text = fs.read_to_string(path).map_err(|e| {
            EndUserError::new(format!("cannot read sheet: {e}")).in_file(path)
        })?;
        let mut loader = Loader {
            fs,
            diagnostics,
            stack: Vec::new(),
            loaded: HashSet::new(),
            sheet: Self::new(),
        };
        loader.document(path, &text);
        tracing::debug!(
            rules = loader.sheet.rules.len(),
            sources = loader.sheet.sources.len(),
            "loaded {}",
            path.display()
        );
        Ok(loader.sheet)
    }

    /// All rules in cascade order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The rule with the given id.
    #[must_use]
    pub fn rule(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(id.0)
    }

    /// Files that contributed rules, in load order.
    #[must_use]
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if the sheet has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Append a rule and return its id.
    pub fn push(&mut self, rule: Rule) -> RuleId {
        self.rules.push(rule);
        RuleId(self.rules.len() - 1)
    }

    /// Ids of every rule matching the selector `(name, parameter)`.
    #[must_use]
    pub fn select(&self, name: &str, parameter: Option<&str>) -> Vec<RuleId> {
        self.ids_where(|r| r.is_selector(name, parameter))
    }

    /// Ids of every rule named `name`, whatever its parameter.
    #[must_use]
    pub fn named_ids(&self, name: &str) -> Vec<RuleId> {
        self.ids_where(|r| r.name == name)
    }

    /// Cascade of every rule named `name`.
    #[must_use]
    pub fn named(&self, name: &str) -> RuleSet<'_> {
        RuleSet::new(self.rules.iter().filter(|r| r.name == name).collect())
    }

    /// Cascade of every rule matching the selector `(name, parameter)`.
    #[must_use]
    pub fn selector(&self, name: &str, parameter: Option<&str>) -> RuleSet<'_> {
        RuleSet::new(
            self.rules
                .iter()
                .filter(|r| r.is_selector(name, parameter))
                .collect(),
        )
    }

    /// Cascade of every `#define` / `define` rule.
    #[must_use]
    pub fn defines(&self) -> RuleSet<'_> {
        RuleSet::new(self.rules.iter().filter(|r| r.is_define()).collect())
    }

    /// Distinct parameters of rules named `name`, in first-seen order.
    ///
    /// A rule without a parameter contributes `""`.
    #[must_use]
    pub fn parameters(&self, name: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.rules
            .iter()
            .filter(|r| r.name == name)
            .map(Rule::parameter_or_empty)
            .filter(|p| seen.insert(*p))
            .map(str::to_string)
            .collect()
    }

    fn ids_where(&self, predicate: impl Fn(&Rule) -> bool) -> Vec<RuleId> {
        self.rules
            .iter()
            .enumerate()
            .filter(|(_, r)| predicate(r))
            .map(|(i, _)| RuleId(i))
            .collect()
    }
}

struct Loader<'a> {
    fs: &'a dyn FileSystemOps,
    diagnostics: &'a Diagnostics,
    stack: Vec<PathBuf>,
    loaded: HashSet<PathBuf>,
    sheet: Sheet,
}

impl Loader<'_> {
    fn document(&mut self, path: &Path, text: &str) {
        let canonical = self.fs.canonicalize(path);
        self.stack.push(canonical.clone());
        self.loaded.insert(canonical);
        self.sheet.sources.push(path.to_path_buf());

        let file: Arc<Path> = Arc::from(path);
        for item in parser::parse(text, Some(file), self.diagnostics) {
            match item {
                Item::Rule(rule) => {
                    self.sheet.push(rule);
                }
                Item::Import { target, location } => self.import(path, &target, &location),
            }
        }

        self.stack.pop();
    }

    fn import(&mut self, from: &Path, target: &str, location: &SourceLocation) {
        let resolved = match from.parent() {
            Some(dir) if !Path::new(target).is_absolute() => dir.join(target),
            _ => PathBuf::from(target),
        };
        let canonical = self.fs.canonicalize(&resolved);

        if self.stack.contains(&canonical) {
            self.diagnostics.report(
                Diagnostic::warning(
                    MessageCode::CircularImport,
                    format!("'{target}' is already being imported; skipping"),
                )
                .at(Some(location)),
            );
            return;
        }
        if self.loaded.contains(&canonical) {
            tracing::debug!("'{}' already loaded", resolved.display());
            return;
        }

        match self.fs.read_to_string(&resolved) {
            Ok(text) => self.document(&resolved, &text),
            Err(e) => {
                self.diagnostics.report(
                    Diagnostic::error(
                        MessageCode::UnknownImport,
                        format!("cannot import '{target}': {e}"),
                    )
                    .at(Some(location)),
                );
            }
        }
    }
}
