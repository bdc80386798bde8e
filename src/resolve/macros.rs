//! `${...}` macro resolution and expansion.
//!
//! A macro name is looked up in this order, first hit wins:
//!
//! 1. `rule.parameter.property` or `rule.property` against the sheet cascade
//! 2. `package.<expr>` through the [`ExpressionEvaluator`](super::ExpressionEvaluator)
//! 3. `#define` rules, by exact property name
//! 4. the session macro table, case-insensitively
//! 5. the environment
//! 6. the default after `??`, if one was given
use crate::diagnostics::{Diagnostic, MessageCode, SourceLocation};
use crate::sheet::Properties;

use super::Session;

/// Placeholder value that stands for "the file itself, under the package
/// directory".
pub const DEFAULT_LAMBDA_VALUE: &str = "DEFAULTLAMBDAVALUE";

/// What [`DEFAULT_LAMBDA_VALUE`] resolves to.
pub const DEFAULT_LAMBDA_EXPANSION: &str = r"${packagedir}\${each.Path}";

const PACKAGE_PREFIX: &str = "package";

impl Session {
    /// Resolve one macro name to its value without expanding the result.
    #[must_use]
    pub fn resolve_macro(&self, name: &str) -> Option<String> {
        let name = name.trim();
        if name == DEFAULT_LAMBDA_VALUE {
            return Some(DEFAULT_LAMBDA_EXPANSION.to_string());
        }

        let (path, default) = match name.split_once("??") {
            Some((path, default)) => (path.trim(), Some(default.trim().to_string())),
            None => (name, None),
        };
        if path.is_empty() {
            return default;
        }

        self.lookup_selector(path)
            .or_else(|| self.evaluate_package(path))
            .or_else(|| {
                self.sheet
                    .defines()
                    .property(path)
                    .value()
                    .map(str::to_string)
            })
            .or_else(|| self.macros.get(&path.to_lowercase()).cloned())
            .or_else(|| self.env.var(path))
            .or(default)
    }

    /// Replace every `${name}` in `text`, recursively expanding the
    /// substituted values.
    ///
    /// Unresolvable and self-referencing macros are left as written and
    /// reported as warnings.
    #[must_use]
    pub fn expand(&self, text: &str) -> String {
        self.expand_at(text, None)
    }

    /// [`Session::expand`], attributing diagnostics to `location`.
    #[must_use]
    pub fn expand_at(&self, text: &str, location: Option<&SourceLocation>) -> String {
        let mut active = Vec::new();
        self.expand_inner(text, location, &mut active)
    }

    fn expand_inner(
        &self,
        text: &str,
        location: Option<&SourceLocation>,
        active: &mut Vec<String>,
    ) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find("${") {
            let (before, tail) = rest.split_at(start);
            out.push_str(before);
            let body = tail.get(2..).unwrap_or_default();
            let Some(end) = body.find('}') else {
                out.push_str(tail);
                rest = "";
                break;
            };
            let (name, after) = body.split_at(end);
            rest = after.get(1..).unwrap_or_default();
            let verbatim = format!("${{{name}}}");
            let key = name.trim().to_string();

            if active.contains(&key) {
                self.diagnostics.report(
                    Diagnostic::warning(
                        MessageCode::CircularMacro,
                        format!("macro '{}' refers to itself", name.trim()),
                    )
                    .at(location),
                );
                out.push_str(&verbatim);
                continue;
            }

            match self.resolve_macro(name) {
                Some(value) => {
                    active.push(key);
                    out.push_str(&self.expand_inner(&value, location, active));
                    active.pop();
                }
                None => {
                    self.diagnostics.report(
                        Diagnostic::warning(
                            MessageCode::UnresolvedMacro,
                            format!("macro '{}' has no value", name.trim()),
                        )
                        .at(location),
                    );
                    out.push_str(&verbatim);
                }
            }
        }

        out.push_str(rest);
        out
    }

    fn lookup_selector(&self, path: &str) -> Option<String> {
        let segments: Vec<&str> = path.split('.').collect();
        let view = match segments.as_slice() {
            &[rule, parameter, property] => self
                .sheet
                .selector(rule, Some(parameter))
                .property(property)
                .to_strings(),
            &[rule, property] => self.sheet.named(rule).property(property).to_strings(),
            _ => return None,
        };
        view.last().cloned()
    }

    fn evaluate_package(&self, path: &str) -> Option<String> {
        let rest = path
            .strip_prefix(PACKAGE_PREFIX)
            .and_then(|r| r.strip_prefix('.'))?;
        self.evaluator
            .evaluate(rest)
            .filter(|value| !value.is_empty())
    }
}
