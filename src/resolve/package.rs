//! Typed views of the `package` rule and of role rules.
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

use super::Session;
use super::files::FileEntry;
use super::index::SelectorIndex;
use crate::diagnostics::SourceLocation;
use crate::sheet::{Properties, RuleId, Sheet};

/// Package metadata from the `package { ... }` rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    /// `name` property.
    pub name: Option<String>,
    /// `version` property.
    pub version: Option<String>,
    /// `arch` property.
    pub arch: Option<String>,
    /// `publisher` property.
    pub publisher: Option<String>,
    /// Location of the backing rule.
    pub location: SourceLocation,
    /// `true` if the sheet has no `package` rule.
    pub synthesized: bool,
}

impl Package {
    /// Name of the rule backing the package.
    pub const RULE: &'static str = "package";

    pub(crate) fn index() -> SelectorIndex<Self> {
        SelectorIndex::by_parameter(Self::RULE, Self::from_rule)
    }

    fn from_rule(sheet: &Sheet, id: RuleId) -> Self {
        let value = |name: &str| {
            sheet
                .rule(id)
                .and_then(|r| r.property(name).value().map(str::to_string))
        };
        Self {
            name: value("name"),
            version: value("version"),
            arch: value("arch"),
            publisher: value("publisher"),
            location: sheet.rule(id).map(|r| r.location.clone()).unwrap_or_default(),
            synthesized: sheet.rule(id).is_some_and(|r| r.synthesized),
        }
    }
}

/// The kinds of role a package can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoleKind {
    /// Executables.
    Application,
    /// Managed assemblies.
    Assembly,
    /// Headers and import libraries.
    DeveloperLibrary,
    /// Background services.
    Service,
    /// Web applications.
    WebApplication,
    /// Device drivers.
    Driver,
}

impl RoleKind {
    /// Every role kind, in display order.
    pub const ALL: [Self; 6] = [
        Self::Application,
        Self::Assembly,
        Self::DeveloperLibrary,
        Self::Service,
        Self::WebApplication,
        Self::Driver,
    ];

    /// The rule name for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Assembly => "assembly",
            Self::DeveloperLibrary => "developer-library",
            Self::Service => "service",
            Self::WebApplication => "web-application",
            Self::Driver => "driver",
        }
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown role '{s}'"))
    }
}

/// A role rule such as `application[tools] { include: bin; }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Role {
    /// Role kind, the rule name.
    pub kind: RoleKind,
    /// Role name, the rule parameter.
    pub name: String,
    /// File lists named by `include`, unexpanded.
    pub file_lists: Vec<String>,
    /// Location of the backing rule.
    pub location: SourceLocation,
    /// `true` if no rule defined this role.
    pub synthesized: bool,
}

impl Role {
    pub(crate) fn index(kind: RoleKind) -> SelectorIndex<Self> {
        SelectorIndex::by_parameter(kind.as_str(), move |sheet, id| Self::from_rule(kind, sheet, id))
    }

    fn from_rule(kind: RoleKind, sheet: &Sheet, id: RuleId) -> Self {
        let rule = sheet.rule(id);
        Self {
            kind,
            name: rule.map(|r| r.parameter_or_empty().to_string()).unwrap_or_default(),
            file_lists: rule
                .map(|r| r.property("include").to_strings())
                .unwrap_or_default(),
            location: rule.map(|r| r.location.clone()).unwrap_or_default(),
            synthesized: rule.is_some_and(|r| r.synthesized),
        }
    }
}

impl Session {
    /// The package metadata, synthesizing an empty `package` rule if the
    /// sheet has none.
    pub fn package(&mut self) -> Arc<Package> {
        self.packages.get(&mut self.sheet, "")
    }

    /// The role `kind[name]`, synthesizing it if the sheet has none.
    pub fn role(&mut self, kind: RoleKind, name: &str) -> Arc<Role> {
        match self.roles.get_mut(&kind) {
            Some(index) => index.get(&mut self.sheet, name),
            None => {
                let mut index = Role::index(kind);
                let role = index.get(&mut self.sheet, name);
                self.roles.insert(kind, index);
                role
            }
        }
    }

    /// Every role the sheet defines, grouped by kind.
    pub fn roles(&mut self) -> Vec<Arc<Role>> {
        let mut roles = Vec::new();
        for index in self.roles.values_mut() {
            roles.extend(index.entries(&mut self.sheet).map(|(_, role)| role));
        }
        roles
    }

    /// Concatenated entries of every file list `role` includes.
    ///
    /// A source that appears in more than one list is kept once, with the
    /// destination of the first list that provides it.
    pub fn role_files(&mut self, role: &Role) -> Vec<FileEntry> {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for raw in &role.file_lists {
            let name = self.expand_at(raw, Some(&role.location));
            if let Some(list) = self.get_file_list(&name) {
                entries.extend(
                    list.entries()
                        .iter()
                        .filter(|e| seen.insert(e.source.clone()))
                        .cloned(),
                );
            }
        }
        entries
    }
}
