//! Resolution of a loaded sheet into file lists, macro values and package
//! metadata.
//!
//! A [`Session`] owns every registry used while resolving one sheet: the
//! sheet itself (which may grow synthesized rules), the diagnostics
//! collector, the file-list arena, the selector indexes and the injected
//! filesystem, environment and expression-evaluator collaborators.  Nothing
//! is process-global; independent sessions can be used from different
//! threads.
pub mod files;
pub mod index;
pub mod macros;
pub mod package;
pub mod paths;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::operations::{Environment, FileSystemOps, SystemEnvironment, SystemFileSystemOps};
use crate::sheet::Sheet;
use files::FileListArena;
use index::SelectorIndex;
use package::{Package, Role, RoleKind};

/// Evaluates `package.<expression>` macro references.
///
/// Any `Fn(&str) -> Option<String>` closure is an evaluator.
#[cfg_attr(test, mockall::automock)]
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluate `expression`; `None` or an empty string means "no value".
    fn evaluate(&self, expression: &str) -> Option<String>;
}

impl<F> ExpressionEvaluator for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn evaluate(&self, expression: &str) -> Option<String> {
        self(expression)
    }
}

/// Evaluator used when none is configured; never yields a value.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEvaluator;

impl ExpressionEvaluator for NoEvaluator {
    fn evaluate(&self, _expression: &str) -> Option<String> {
        None
    }
}

/// Context object for resolving one sheet.
pub struct Session {
    pub(crate) sheet: Sheet,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) fs: Arc<dyn FileSystemOps>,
    pub(crate) env: Arc<dyn Environment>,
    pub(crate) evaluator: Box<dyn ExpressionEvaluator>,
    pub(crate) macros: HashMap<String, String>,
    pub(crate) file_lists: FileListArena,
    pub(crate) packages: SelectorIndex<Package>,
    pub(crate) roles: BTreeMap<RoleKind, SelectorIndex<Role>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("rules", &self.sheet.len())
            .field("diagnostics", &self.diagnostics)
            .field("fs", &self.fs)
            .field("env", &self.env)
            .field("evaluator", &"<dyn ExpressionEvaluator>")
            .field("macros", &self.macros.len())
            .field("file_lists", &self.file_lists)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Start configuring a session.
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// The sheet being resolved, including any synthesized rules.
    #[must_use]
    pub const fn sheet(&self) -> &Sheet {
        &self.sheet
    }

    /// Everything reported so far.
    #[must_use]
    pub const fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// The filesystem collaborator.
    #[must_use]
    pub fn fs(&self) -> &dyn FileSystemOps {
        self.fs.as_ref()
    }

    /// Set an entry of the macro table.  Names are case-insensitive.
    pub fn set_macro(&mut self, name: &str, value: impl Into<String>) {
        self.macros.insert(name.to_lowercase(), value.into());
    }

    /// Resolve the package, every file list and every role.
    ///
    /// Results are memoized, so this is also a cheap way to surface every
    /// diagnostic the sheet can produce.
    pub fn resolve_all(&mut self) {
        let _package = self.package();
        for name in self.file_list_names() {
            let _list = self.get_file_list(&name);
        }
        for role in self.roles() {
            let _files = self.role_files(&role);
        }
    }
}

/// Builder for [`Session`].
///
/// Defaults to the real filesystem, the process environment and
/// [`NoEvaluator`].
#[derive(Default)]
pub struct SessionBuilder {
    fs: Option<Arc<dyn FileSystemOps>>,
    env: Option<Arc<dyn Environment>>,
    evaluator: Option<Box<dyn ExpressionEvaluator>>,
    macros: HashMap<String, String>,
    diagnostics: Option<Diagnostics>,
}

impl std::fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("fs", &self.fs)
            .field("env", &self.env)
            .field("macros", &self.macros)
            .finish_non_exhaustive()
    }
}

impl SessionBuilder {
    /// Use `fs` for reading sheets and matching globs.
    #[must_use]
    pub fn with_fs(mut self, fs: Arc<dyn FileSystemOps>) -> Self {
        self.fs = Some(fs);
        self
    }

    /// Use `env` for environment-variable fallbacks.
    #[must_use]
    pub fn with_env(mut self, env: Arc<dyn Environment>) -> Self {
        self.env = Some(env);
        self
    }

    /// Use `evaluator` for `package.*` references.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: impl ExpressionEvaluator + 'static) -> Self {
        self.evaluator = Some(Box::new(evaluator));
        self
    }

    /// Add one macro-table entry.
    #[must_use]
    pub fn with_macro(mut self, name: &str, value: impl Into<String>) -> Self {
        self.macros.insert(name.to_lowercase(), value.into());
        self
    }

    /// Add every `(name, value)` pair to the macro table.
    #[must_use]
    pub fn with_macros<K, V>(mut self, macros: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in macros {
            self.macros.insert(name.as_ref().to_lowercase(), value.into());
        }
        self
    }

    /// Report into an existing collector instead of a fresh one.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Load the sheet at `path` and build a session over it.
    ///
    /// # Errors
    ///
    /// Returns an error if the root sheet cannot be read.
    pub fn load(mut self, path: &Path) -> Result<Session> {
        let fs = self.filesystem();
        let diagnostics = self.diagnostics.take().unwrap_or_default();
        let sheet = Sheet::load(path, fs.as_ref(), &diagnostics)?;
        Ok(self.with_diagnostics(diagnostics).build(sheet))
    }

    /// Parse an in-memory sheet and build a session over it.
    #[must_use]
    pub fn parse(mut self, text: &str) -> Session {
        let diagnostics = self.diagnostics.take().unwrap_or_default();
        let sheet = Sheet::parse(text, &diagnostics);
        self.with_diagnostics(diagnostics).build(sheet)
    }

    /// Build a session over an already loaded sheet.
    #[must_use]
    pub fn build(mut self, sheet: Sheet) -> Session {
        let fs = self.filesystem();
        let roles = RoleKind::ALL
            .iter()
            .map(|kind| (*kind, Role::index(*kind)))
            .collect();
        Session {
            file_lists: FileListArena::declare(&sheet),
            sheet,
            diagnostics: self.diagnostics.unwrap_or_default(),
            fs,
            env: self.env.unwrap_or_else(|| Arc::new(SystemEnvironment)),
            evaluator: self.evaluator.unwrap_or_else(|| Box::new(NoEvaluator)),
            macros: self.macros,
            packages: Package::index(),
            roles,
        }
    }

    fn filesystem(&mut self) -> Arc<dyn FileSystemOps> {
        Arc::clone(
            self.fs
                .get_or_insert_with(|| Arc::new(SystemFileSystemOps::new())),
        )
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::diagnostics::MessageCode;
    use crate::operations::{FixedEnvironment, MockFileSystemOps};

    fn assert_send<T: Send>() {}

    #[test]
    fn sessions_are_send() {
        assert_send::<Session>();
    }

    #[test]
    fn closures_are_evaluators() {
        let eval = |expr: &str| (expr == "name").then(|| "pkg".to_string());
        assert_eq!(eval.evaluate("name").as_deref(), Some("pkg"));
        assert_eq!(NoEvaluator.evaluate("name"), None);
    }

    #[test]
    fn load_uses_the_injected_filesystem() {
        let fs = MockFileSystemOps::new()
            .with_contents("/p/pkg.sheet", "package { name: demo; }");
        let mut session = Session::builder()
            .with_fs(Arc::new(fs))
            .with_env(Arc::new(FixedEnvironment::new()))
            .load(Path::new("/p/pkg.sheet"))
            .unwrap();
        assert_eq!(session.package().name.as_deref(), Some("demo"));
    }

    #[test]
    fn load_reports_into_the_session_collector() {
        let fs = MockFileSystemOps::new()
            .with_contents("/p/pkg.sheet", "@import \"gone.sheet\";");
        let session = Session::builder()
            .with_fs(Arc::new(fs))
            .load(Path::new("/p/pkg.sheet"))
            .unwrap();
        assert_eq!(
            session.diagnostics().count_code(MessageCode::UnknownImport),
            1
        );
    }

    #[test]
    fn macro_names_are_case_insensitive() {
        let mut session = Session::builder()
            .with_env(Arc::new(FixedEnvironment::new()))
            .with_macro("OutDir", "bin")
            .parse("");
        assert_eq!(session.resolve_macro("OUTDIR").as_deref(), Some("bin"));
        session.set_macro("Other", "x");
        assert_eq!(session.resolve_macro("other").as_deref(), Some("x"));
    }

    #[test]
    fn resolve_all_surfaces_every_problem() {
        let fs = MockFileSystemOps::new();
        let mut session = Session::builder()
            .with_fs(Arc::new(fs))
            .with_env(Arc::new(FixedEnvironment::new()))
            .parse(
                "files[a] { include: b; } files[b] { include: a; } \
                 application[app] { include: missing; }",
            );
        session.resolve_all();
        let diags = session.diagnostics();
        assert_eq!(diags.count_code(MessageCode::CircularReference), 1);
        assert_eq!(diags.count_code(MessageCode::UnknownFileList), 1);
    }
}
