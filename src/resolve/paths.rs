//! Destination path normalization and trimming.
use std::path::{Component, MAIN_SEPARATOR, Path, PathBuf};
use std::str::FromStr;

/// How much leading directory structure `trim-path` removes from
/// destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrimPolicy {
    /// Keep destinations as they are.
    #[default]
    None,
    /// Keep only the file name.
    All,
    /// Remove the longest directory prefix shared by every destination.
    Minimal,
}

impl FromStr for TrimPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "all" => Ok(Self::All),
            "minimal" => Ok(Self::Minimal),
            other => Err(format!("unknown trim-path value '{other}'")),
        }
    }
}

/// Normalize a destination prefix.
///
/// Converts `/` and `\` to the platform separator, removes every `..`,
/// collapses repeated separators, strips leading `./` and `../` and trims
/// separators from both ends.  A bare `.` becomes empty.  The function is
/// idempotent.
#[must_use]
pub fn normalize_destination(raw: &str) -> String {
    let mut current: String = raw
        .chars()
        .map(|c| if c == '/' || c == '\\' { MAIN_SEPARATOR } else { c })
        .collect();
    loop {
        let next = normalize_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn normalize_once(s: &str) -> String {
    let double = format!("{MAIN_SEPARATOR}{MAIN_SEPARATOR}");
    let dot_dot_sep = format!("..{MAIN_SEPARATOR}");
    let dot_sep = format!(".{MAIN_SEPARATOR}");

    let mut out = s.replace("..", "");
    while out.contains(&double) {
        out = out.replace(&double, &MAIN_SEPARATOR.to_string());
    }
    loop {
        if let Some(rest) = out.strip_prefix(&dot_dot_sep) {
            out = rest.to_string();
        } else if let Some(rest) = out.strip_prefix(&dot_sep) {
            out = rest.to_string();
        } else {
            break;
        }
    }
    let out = out.trim_matches(MAIN_SEPARATOR);
    if out == "." {
        String::new()
    } else {
        out.to_string()
    }
}

/// Keep only the final component of `path`.
#[must_use]
pub fn trim_all(path: &Path) -> PathBuf {
    path.file_name().map(PathBuf::from).unwrap_or_default()
}

/// Longest directory shared by every path in `paths`.
///
/// The final component of each path is treated as a file and never becomes
/// part of the prefix, so stripping the result never empties a path.
#[must_use]
pub fn common_directory<'a>(paths: impl IntoIterator<Item = &'a Path>) -> PathBuf {
    let mut prefix: Option<Vec<Component<'a>>> = None;
    for path in paths {
        let dirs: Vec<Component<'a>> = path
            .parent()
            .map(|p| p.components().collect())
            .unwrap_or_default();
        prefix = Some(match prefix {
            None => dirs,
            Some(current) => current
                .into_iter()
                .zip(dirs)
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| a)
                .collect(),
        });
    }
    prefix.unwrap_or_default().into_iter().collect()
}

/// Strip `prefix` from `path`; paths outside `prefix` are returned unchanged.
#[must_use]
pub fn strip_directory(path: &Path, prefix: &Path) -> PathBuf {
    path.strip_prefix(prefix)
        .map_or_else(|_| path.to_path_buf(), Path::to_path_buf)
}

/// `path` relative to `root`.
///
/// The result only ever holds normal components: paths outside `root` lose
/// their root, `.` and `..` parts instead of escaping it.
#[must_use]
pub fn relative_to(path: &Path, root: &Path) -> PathBuf {
    strip_directory(path, root)
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}

/// A compiled `exclude` glob.
///
/// Absolute patterns must match the whole source path.  Relative patterns
/// match any trailing run of its components, so `*.pdb` excludes
/// `/r/x.pdb` whatever root the entry was collected under.  `*` never
/// crosses a separator.
#[derive(Debug, Clone)]
pub struct ExcludePattern {
    pattern: glob::Pattern,
    absolute: bool,
}

impl ExcludePattern {
    const OPTIONS: glob::MatchOptions = glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    /// Compile `token`.
    ///
    /// # Errors
    ///
    /// Returns the glob error if `token` is not a valid pattern.
    pub fn new(token: &str) -> Result<Self, glob::PatternError> {
        let absolute = Path::new(token).is_absolute();
        let text = if absolute {
            token
        } else {
            token.trim_start_matches("./")
        };
        Ok(Self {
            pattern: glob::Pattern::new(text)?,
            absolute,
        })
    }

    /// Returns `true` if `source` is excluded.
    #[must_use]
    pub fn matches(&self, source: &Path) -> bool {
        if self.absolute {
            return self.pattern.matches_path_with(source, Self::OPTIONS);
        }
        let normal: Vec<Component<'_>> = source
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect();
        (0..normal.len()).any(|start| {
            let tail: PathBuf = normal.iter().skip(start).collect();
            self.pattern.matches_path_with(&tail, Self::OPTIONS)
        })
    }
}
