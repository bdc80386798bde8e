//! File-list composition.
//!
//! A file list is a `files[name] { ... }` rule.  Its entries are built from
//! glob patterns and other lists, filtered by exclusions, trimmed and finally
//! moved under a destination prefix.  Lists may include each other freely;
//! the arena's visit state turns cycles into a single diagnostic instead of
//! unbounded recursion.
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use super::Session;
use super::paths::{
    ExcludePattern, TrimPolicy, common_directory, normalize_destination, relative_to,
    strip_directory, trim_all,
};
use crate::diagnostics::{Diagnostic, MessageCode, SourceLocation};
use crate::sheet::{Properties, Rule, RuleId, Sheet};

/// Name of the rules that define file lists.
pub const FILES_RULE: &str = "files";

/// A source file and where it lands in the package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FileEntry {
    /// Absolute path of the file on disk.
    pub source: PathBuf,
    /// Relative path inside the package.
    pub destination: PathBuf,
}

/// A resolved (or, during a cycle, partially resolved) file list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileList {
    /// List name, the `files[...]` parameter.
    pub name: String,
    entries: Arc<[FileEntry]>,
}

impl FileList {
    fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Arc::from(Vec::new()),
        }
    }

    /// The entries in resolution order.
    #[must_use]
    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the list has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Index of a file list inside a session's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileListId(usize);

/// Construction progress of a file list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    /// Declared but not requested yet.
    Unvisited,
    /// Being built; seeing this again means a cycle.
    InProgress,
    /// Fully built.
    Done,
}

#[derive(Debug)]
struct Slot {
    state: VisitState,
    list: FileList,
}

/// Every file list a sheet declares, with its visit state.
#[derive(Debug, Default)]
pub struct FileListArena {
    slots: Vec<Slot>,
    by_name: HashMap<String, FileListId>,
}

impl FileListArena {
    /// Declare one slot per distinct `files[...]` parameter of `sheet`.
    #[must_use]
    pub fn declare(sheet: &Sheet) -> Self {
        let mut arena = Self::default();
        for name in sheet.parameters(FILES_RULE) {
            let id = FileListId(arena.slots.len());
            arena.slots.push(Slot {
                state: VisitState::Unvisited,
                list: FileList::empty(&name),
            });
            arena.by_name.insert(name, id);
        }
        arena
    }

    /// Id of the list called `name`, if the sheet declares one.
    #[must_use]
    pub fn id(&self, name: &str) -> Option<FileListId> {
        self.by_name.get(name).copied()
    }

    /// Visit state of `id`.
    #[must_use]
    pub fn state(&self, id: FileListId) -> VisitState {
        self.slots
            .get(id.0)
            .map_or(VisitState::Unvisited, |s| s.state)
    }

    /// Declared names in sheet order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.list.name.clone()).collect()
    }

    fn list(&self, id: FileListId) -> Option<FileList> {
        self.slots.get(id.0).map(|s| s.list.clone())
    }

    fn set_state(&mut self, id: FileListId, state: VisitState) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            slot.state = state;
        }
    }

    fn finish(&mut self, id: FileListId, entries: Vec<FileEntry>) -> Option<FileList> {
        let slot = self.slots.get_mut(id.0)?;
        slot.list.entries = Arc::from(entries);
        slot.state = VisitState::Done;
        Some(slot.list.clone())
    }
}

impl Session {
    /// Names of every declared file list, in sheet order.
    #[must_use]
    pub fn file_list_names(&self) -> Vec<String> {
        self.file_lists.names()
    }

    /// Visit state of the list called `name`, if declared.
    #[must_use]
    pub fn file_list_state(&self, name: &str) -> Option<VisitState> {
        self.file_lists.id(name).map(|id| self.file_lists.state(id))
    }

    /// Resolve the file list called `name`.
    ///
    /// Returns the memoized list once built.  A request for a list that is
    /// still being built (a cycle) reports [`MessageCode::CircularReference`]
    /// once and returns the unfinished, empty list.  Undefined and ambiguous
    /// names report a diagnostic and return `None`.
    pub fn get_file_list(&mut self, name: &str) -> Option<FileList> {
        let Some(id) = self.file_lists.id(name) else {
            self.diagnostics.report_once(
                format!("unknown:{name}"),
                Diagnostic::error(
                    MessageCode::UnknownFileList,
                    format!("file list '{name}' is not defined"),
                ),
            );
            return None;
        };

        match self.file_lists.state(id) {
            VisitState::Done => return self.file_lists.list(id),
            VisitState::InProgress => {
                self.diagnostics.report_once(
                    format!("cycle:{name}"),
                    Diagnostic::error(
                        MessageCode::CircularReference,
                        format!("file list '{name}' includes itself"),
                    ),
                );
                return self.file_lists.list(id);
            }
            VisitState::Unvisited => {}
        }

        let rules = self.sheet.select(FILES_RULE, Some(name));
        match rules.as_slice() {
            [] => {
                self.diagnostics.report_once(
                    format!("unknown:{name}"),
                    Diagnostic::error(
                        MessageCode::UnknownFileList,
                        format!("file list '{name}' is not defined"),
                    ),
                );
                None
            }
            [only] => self.build_file_list(id, *only),
            [first, ..] => {
                let location = self.sheet.rule(*first).map(|r| r.location.clone());
                self.diagnostics.report_once(
                    format!("ambiguous:{name}"),
                    Diagnostic::error(
                        MessageCode::AmbiguousDefinition,
                        format!("file list '{name}' is defined {} times", rules.len()),
                    )
                    .at(location.as_ref()),
                );
                None
            }
        }
    }

    fn build_file_list(&mut self, id: FileListId, rule_id: RuleId) -> Option<FileList> {
        let rule = self.sheet.rule(rule_id)?.clone();
        let name = rule.parameter_or_empty().to_string();
        let location = rule.location.clone();
        self.file_lists.set_state(id, VisitState::InProgress);
        tracing::debug!(list = %name, "resolving file list");

        let root = self.list_root(&rule);
        let mut entries = Vec::new();
        let mut seen = HashSet::new();

        for raw in rule.property("include").to_strings() {
            let token = self.expand_at(&raw, Some(&location));
            for entry in self.include(&token, &root, &location) {
                if seen.insert(entry.source.clone()) {
                    entries.push(entry);
                }
            }
        }

        for raw in rule.property("exclude").to_strings() {
            let token = self.expand_at(&raw, Some(&location));
            self.exclude(&token, &location, &mut entries);
        }

        self.trim(&rule, &mut entries);

        if let Some(raw) = rule.property("destination").value() {
            let prefix = normalize_destination(&self.expand_at(raw, Some(&location)));
            if !prefix.is_empty() {
                for entry in &mut entries {
                    entry.destination = Path::new(&prefix).join(&entry.destination);
                }
            }
        }

        tracing::debug!(list = %name, entries = entries.len(), "resolved file list");
        self.file_lists.finish(id, entries)
    }

    /// Root directory patterns of `rule` are matched against.
    fn list_root(&self, rule: &Rule) -> PathBuf {
        let cwd = || self.fs.current_dir();
        let Some(raw) = rule.property("root").value() else {
            return cwd();
        };
        let root = PathBuf::from(self.expand_at(raw, Some(&rule.location)));
        if root.is_absolute() {
            return root;
        }
        rule.location
            .directory()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(cwd)
            .join(root)
    }

    fn include(&mut self, token: &str, root: &Path, location: &SourceLocation) -> Vec<FileEntry> {
        if let Some(id) = self.file_lists.id(token) {
            let list = self.get_file_list(token);
            if self.file_lists.state(id) != VisitState::Done {
                return Vec::new();
            }
            return list.map(|l| l.entries().to_vec()).unwrap_or_default();
        }

        match self.fs.glob(root, token) {
            Ok(matches) if matches.is_empty() => {
                self.diagnostics.report(
                    Diagnostic::warning(
                        MessageCode::ZeroMatches,
                        format!("'{token}' matched no files under {}", root.display()),
                    )
                    .at(Some(location)),
                );
                Vec::new()
            }
            Ok(matches) => matches
                .into_iter()
                .map(|source| FileEntry {
                    destination: relative_to(&source, root),
                    source,
                })
                .collect(),
            Err(e) => {
                self.report_bad_pattern(token, &e, location);
                Vec::new()
            }
        }
    }

    fn exclude(
        &mut self,
        token: &str,
        location: &SourceLocation,
        entries: &mut Vec<FileEntry>,
    ) {
        if let Some(id) = self.file_lists.id(token) {
            let list = self.get_file_list(token);
            if self.file_lists.state(id) != VisitState::Done {
                return;
            }
            if let Some(list) = list {
                let removed: HashSet<&Path> =
                    list.entries().iter().map(|e| e.source.as_path()).collect();
                entries.retain(|e| !removed.contains(e.source.as_path()));
            }
            return;
        }

        // Entries may come from lists with other roots, so a relative
        // pattern is matched against the tail of each source path.
        match ExcludePattern::new(token) {
            Ok(pattern) => entries.retain(|e| !pattern.matches(&e.source)),
            Err(e) => self.report_bad_pattern(token, &e, location),
        }
    }

    fn trim(&self, rule: &Rule, entries: &mut [FileEntry]) {
        let view = rule.property("trim-path");
        let Some(raw) = view.value() else {
            return;
        };
        let policy = match self.expand_at(raw, view.location()).parse::<TrimPolicy>() {
            Ok(policy) => policy,
            Err(message) => {
                self.diagnostics.report(
                    Diagnostic::warning(
                        MessageCode::InvalidEnumOption,
                        format!("{message}; expected none, all or minimal"),
                    )
                    .at(view.location()),
                );
                TrimPolicy::None
            }
        };

        match policy {
            TrimPolicy::None => {}
            TrimPolicy::All => {
                for entry in entries.iter_mut() {
                    entry.destination = trim_all(&entry.destination);
                }
            }
            TrimPolicy::Minimal => {
                let common = common_directory(entries.iter().map(|e| e.destination.as_path()));
                for entry in entries.iter_mut() {
                    entry.destination = strip_directory(&entry.destination, &common);
                }
            }
        }
    }

    fn report_bad_pattern(
        &self,
        token: &str,
        error: &glob::PatternError,
        location: &SourceLocation,
    ) {
        self.diagnostics.report(
            Diagnostic::error(
                MessageCode::InvalidPattern,
                format!("invalid pattern '{token}': {}", error.msg),
            )
            .at(Some(location)),
        );
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::operations::{FixedEnvironment, MockFileSystemOps};

    fn session(fs: MockFileSystemOps, text: &str) -> Session {
        Session::builder()
            .with_fs(Arc::new(fs))
            .with_env(Arc::new(FixedEnvironment::new()))
            .parse(text)
    }

    fn sources(list: &FileList) -> Vec<&Path> {
        list.entries().iter().map(|e| e.source.as_path()).collect()
    }

    fn destinations(list: &FileList) -> Vec<PathBuf> {
        list.entries().iter().map(|e| e.destination.clone()).collect()
    }

    fn bin_fs() -> MockFileSystemOps {
        MockFileSystemOps::new()
            .with_file("/out/a.dll")
            .with_file("/out/a.pdb")
            .with_file("/out/b.dll")
            .with_file("/out/sub/c.dll")
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    #[test]
    fn declared_lists_start_unvisited() {
        let s = session(MockFileSystemOps::new(), "files[a] { } files[b] { }");
        assert_eq!(s.file_list_names(), vec!["a", "b"]);
        assert_eq!(s.file_list_state("a"), Some(VisitState::Unvisited));
        assert_eq!(s.file_list_state("zzz"), None);
    }

    #[test]
    fn unknown_list_is_reported_once() {
        let mut s = session(MockFileSystemOps::new(), "");
        assert!(s.get_file_list("nope").is_none());
        assert!(s.get_file_list("nope").is_none());
        assert_eq!(s.diagnostics().count_code(MessageCode::UnknownFileList), 1);
    }

    #[test]
    fn ambiguous_list_is_reported_at_first_definition() {
        let mut s = session(MockFileSystemOps::new(), "files[a] { }\nfiles[a] { }");
        assert!(s.get_file_list("a").is_none());
        assert!(s.get_file_list("a").is_none());
        let diags = s.diagnostics().snapshot();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, MessageCode::AmbiguousDefinition);
        assert_eq!(diags[0].location.as_ref().unwrap().line, 1);
    }

    #[test]
    fn resolved_list_is_memoized() {
        let mut s = session(bin_fs(), "files[bin] { root: /out; include: \"*.dll\"; }");
        let first = s.get_file_list("bin").unwrap();
        let second = s.get_file_list("bin").unwrap();
        assert!(Arc::ptr_eq(&first.entries, &second.entries));
        assert_eq!(s.file_list_state("bin"), Some(VisitState::Done));
    }

    // ------------------------------------------------------------------
    // Includes and excludes
    // ------------------------------------------------------------------

    #[test]
    fn glob_include_relative_to_root() {
        let mut s = session(bin_fs(), "files[bin] { root: /out; include: \"*.dll\"; }");
        let list = s.get_file_list("bin").unwrap();
        assert_eq!(sources(&list), [Path::new("/out/a.dll"), Path::new("/out/b.dll")]);
        assert_eq!(
            destinations(&list),
            [PathBuf::from("a.dll"), PathBuf::from("b.dll")]
        );
        assert!(s.diagnostics().is_empty());
    }

    #[test]
    fn missing_root_uses_current_dir() {
        let fs = MockFileSystemOps::new().with_cwd("/out").with_file("/out/a.dll");
        let mut s = session(fs, "files[bin] { include: \"*.dll\"; }");
        assert_eq!(s.get_file_list("bin").unwrap().len(), 1);
    }

    #[test]
    fn duplicate_sources_are_kept_once() {
        let mut s = session(
            bin_fs(),
            "files[bin] { root: /out; include: \"a.*\", \"*.dll\"; }",
        );
        let list = s.get_file_list("bin").unwrap();
        assert_eq!(
            sources(&list),
            [
                Path::new("/out/a.dll"),
                Path::new("/out/a.pdb"),
                Path::new("/out/b.dll")
            ]
        );
    }

    #[test]
    fn zero_matches_is_a_warning() {
        let mut s = session(bin_fs(), "files[x] { root: /out; include: \"*.so\"; }");
        let list = s.get_file_list("x").unwrap();
        assert!(list.is_empty());
        assert_eq!(s.diagnostics().count_code(MessageCode::ZeroMatches), 1);
        assert!(!s.diagnostics().has_errors());
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let mut s = session(bin_fs(), "files[x] { root: /out; include: \"[\"; }");
        assert!(s.get_file_list("x").unwrap().is_empty());
        assert_eq!(s.diagnostics().count_code(MessageCode::InvalidPattern), 1);
    }

    #[test]
    fn list_difference_by_exclude_pattern() {
        let mut s = session(
            bin_fs(),
            "files[common] { root: /out; include: \"*.*\"; }\n\
             files[app] { include: common; exclude: \"*.pdb\"; root: /out; }",
        );
        let app = s.get_file_list("app").unwrap();
        assert_eq!(sources(&app), [Path::new("/out/a.dll"), Path::new("/out/b.dll")]);
    }

    #[test]
    fn exclude_by_list_removes_its_sources() {
        let mut s = session(
            bin_fs(),
            "files[all] { root: /out; include: \"**/*\"; }\n\
             files[debug] { root: /out; include: \"*.pdb\"; }\n\
             files[ship] { include: all; exclude: debug; }",
        );
        let ship = s.get_file_list("ship").unwrap();
        assert_eq!(ship.len(), 3);
        assert!(sources(&ship).iter().all(|p| p.extension().unwrap() == "dll"));
    }

    #[test]
    fn included_list_keeps_its_destinations() {
        let mut s = session(
            bin_fs(),
            "files[lib] { root: /out; include: \"a.dll\"; destination: lib; }\n\
             files[pkg] { include: lib; }",
        );
        let pkg = s.get_file_list("pkg").unwrap();
        assert_eq!(destinations(&pkg), [Path::new("lib").join("a.dll")]);
    }

    #[test]
    fn exclude_pattern_reaches_entries_from_another_root() {
        let fs = MockFileSystemOps::new()
            .with_file("/r/a.dll")
            .with_file("/r/a.pdb")
            .with_file("/r/sub/b.pdb");
        let mut s = session(
            fs,
            "files[common] { root: /r; include: \"*.*\", \"sub/*.pdb\"; }\n\
             files[app] { include: common; exclude: \"*.pdb\"; }",
        );
        let app = s.get_file_list("app").unwrap();
        assert_eq!(sources(&app), [Path::new("/r/a.dll")]);
    }

    #[test]
    fn exclude_pattern_with_directory_matches_trailing_components() {
        let fs = MockFileSystemOps::new()
            .with_file("/r/debug/x.dll")
            .with_file("/r/release/x.dll");
        let mut s = session(
            fs,
            "files[common] { root: /r; include: \"*/*.dll\"; }\n\
             files[app] { root: /elsewhere; include: common; exclude: \"debug/*\"; }",
        );
        let app = s.get_file_list("app").unwrap();
        assert_eq!(sources(&app), [Path::new("/r/release/x.dll")]);
    }

    #[test]
    fn absolute_exclude_pattern_matches_whole_source() {
        let mut s = session(
            bin_fs(),
            "files[x] { root: /out; include: \"**/*.dll\"; exclude: \"/out/sub/*\", \"/sub/*\"; }",
        );
        let x = s.get_file_list("x").unwrap();
        assert_eq!(sources(&x), [Path::new("/out/a.dll"), Path::new("/out/b.dll")]);
    }

    // ------------------------------------------------------------------
    // Cycles
    // ------------------------------------------------------------------

    #[test]
    fn self_reference_terminates_with_one_diagnostic() {
        let mut s = session(bin_fs(), "files[a] { root: /out; include: a, \"a.dll\"; }");
        let list = s.get_file_list("a").unwrap();
        assert_eq!(sources(&list), [Path::new("/out/a.dll")]);
        assert_eq!(s.diagnostics().count_code(MessageCode::CircularReference), 1);
    }

    #[test]
    fn two_cycle_reports_once() {
        let mut s = session(
            MockFileSystemOps::new(),
            "files[a] { include: b; } files[b] { include: a; }",
        );
        assert!(s.get_file_list("a").unwrap().is_empty());
        assert!(s.get_file_list("b").unwrap().is_empty());
        assert_eq!(s.diagnostics().count_code(MessageCode::CircularReference), 1);
        assert_eq!(s.file_list_state("a"), Some(VisitState::Done));
        assert_eq!(s.file_list_state("b"), Some(VisitState::Done));
    }

    #[test]
    fn three_cycle_reports_once_and_finishes_every_list() {
        let mut s = session(
            bin_fs(),
            "files[a] { root: /out; include: b, \"a.dll\"; }\n\
             files[b] { root: /out; include: c, \"b.dll\"; }\n\
             files[c] { root: /out; include: a, \"a.pdb\"; }",
        );
        let a = s.get_file_list("a").unwrap();
        assert_eq!(
            sources(&a),
            [
                Path::new("/out/a.pdb"),
                Path::new("/out/b.dll"),
                Path::new("/out/a.dll")
            ]
        );
        assert_eq!(s.get_file_list("b").unwrap().len(), 2);
        assert_eq!(s.get_file_list("c").unwrap().len(), 1);
        assert_eq!(s.diagnostics().count_code(MessageCode::CircularReference), 1);
        assert_eq!(s.diagnostics().snapshot().len(), 1);
        for name in ["a", "b", "c"] {
            assert_eq!(s.file_list_state(name), Some(VisitState::Done), "{name}");
        }
    }

    #[test]
    fn cycle_through_exclude_terminates() {
        let mut s = session(
            bin_fs(),
            "files[a] { root: /out; include: \"*.dll\"; exclude: b; }\n\
             files[b] { include: a; }",
        );
        assert_eq!(s.get_file_list("a").unwrap().len(), 2);
        assert_eq!(s.diagnostics().count_code(MessageCode::CircularReference), 1);
    }

    // ------------------------------------------------------------------
    // Trimming and destinations
    // ------------------------------------------------------------------

    #[test]
    fn trim_all_flattens() {
        let mut s = session(
            bin_fs(),
            "files[x] { root: /out; include: \"**/*.dll\"; trim-path: all; }",
        );
        let list = s.get_file_list("x").unwrap();
        assert!(
            list.entries()
                .iter()
                .all(|e| e.destination.components().count() == 1)
        );
    }

    #[test]
    fn trim_minimal_strips_common_directory() {
        let fs = MockFileSystemOps::new()
            .with_file("/r/bin/x/a.dll")
            .with_file("/r/bin/y/a.dll");
        let mut s = session(
            fs,
            "files[x] { root: /r; include: \"bin/*/*.dll\"; trim-path: minimal; }",
        );
        let list = s.get_file_list("x").unwrap();
        assert_eq!(
            destinations(&list),
            [Path::new("x").join("a.dll"), Path::new("y").join("a.dll")]
        );
    }

    #[test]
    fn unknown_trim_value_degrades_to_none() {
        let mut s = session(
            bin_fs(),
            "files[x] { root: /out; include: \"sub/*.dll\"; trim-path: some; }",
        );
        let list = s.get_file_list("x").unwrap();
        assert_eq!(destinations(&list), [Path::new("sub").join("c.dll")]);
        assert_eq!(s.diagnostics().count_code(MessageCode::InvalidEnumOption), 1);
    }

    #[test]
    fn destination_is_normalized_prefix() {
        let mut s = session(
            bin_fs(),
            "files[x] { root: /out; include: \"a.dll\"; destination: \"../lib//net45/\"; }",
        );
        let list = s.get_file_list("x").unwrap();
        let dest = &list.entries()[0].destination;
        assert_eq!(dest, &Path::new("lib").join("net45").join("a.dll"));
        assert!(!dest.to_string_lossy().contains(".."));
    }

    #[test]
    fn macros_expand_in_properties() {
        let fs = bin_fs();
        let mut s = Session::builder()
            .with_fs(Arc::new(fs))
            .with_env(Arc::new(FixedEnvironment::new()))
            .with_macro("outdir", "/out")
            .parse("#define { EXT: dll; } files[x] { root: ${outdir}; include: \"*.${EXT}\"; }");
        assert_eq!(s.get_file_list("x").unwrap().len(), 2);
    }

    #[test]
    fn relative_root_joins_sheet_directory() {
        let fs = MockFileSystemOps::new()
            .with_contents("/p/pkg.sheet", "files[x] { root: out; include: \"*.dll\"; }")
            .with_file("/p/out/a.dll");
        let mut s = Session::builder()
            .with_fs(Arc::new(fs))
            .with_env(Arc::new(FixedEnvironment::new()))
            .load(Path::new("/p/pkg.sheet"))
            .unwrap();
        let list = s.get_file_list("x").unwrap();
        assert_eq!(sources(&list), [Path::new("/p/out/a.dll")]);
        assert_eq!(destinations(&list), [PathBuf::from("a.dll")]);
    }
}
