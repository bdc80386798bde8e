//! Rules, properties and the cascade.
use std::fmt;

use crate::diagnostics::SourceLocation;

/// Index of a rule inside its [`Sheet`](super::Sheet).
///
/// Rules are only ever appended to a sheet, so an id stays valid for the
/// lifetime of the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuleId(pub(crate) usize);

impl RuleId {
    /// Position of the rule in sheet order.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// One named property inside a rule, with all of its values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Property name, e.g. `include`.
    pub name: String,
    /// Values in declaration order.
    pub values: Vec<String>,
    /// Where the property was first declared.
    pub location: SourceLocation,
}

/// A selector with its properties: `name.class#id[parameter] { ... }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Rule name; empty for selectors such as `#define`.
    pub name: String,
    /// Optional `#id`.
    pub id: Option<String>,
    /// Optional `.class`.
    pub class: Option<String>,
    /// Optional `[parameter]`.
    pub parameter: Option<String>,
    /// Properties in first-declaration order.
    pub properties: Vec<Property>,
    /// Location of the selector.
    pub location: SourceLocation,
    /// `true` if the rule was created by the engine rather than parsed.
    pub synthesized: bool,
}

impl Rule {
    /// Create an empty rule for the selector `(name, parameter)`.
    #[must_use]
    pub fn new(name: impl Into<String>, parameter: Option<&str>, location: SourceLocation) -> Self {
        Self {
            name: name.into(),
            id: None,
            class: None,
            parameter: parameter.map(str::to_string),
            properties: Vec::new(),
            location,
            synthesized: false,
        }
    }

    /// Create an empty rule on behalf of the engine.
    #[must_use]
    pub fn synthesized(name: &str, parameter: Option<&str>) -> Self {
        Self {
            synthesized: true,
            ..Self::new(name, parameter, SourceLocation::default())
        }
    }

    /// Append `values` to the property `name`, creating it if needed.
    pub fn add_values(&mut self, name: &str, values: Vec<String>, location: SourceLocation) {
        if let Some(existing) = self.properties.iter_mut().find(|p| p.name == name) {
            existing.values.extend(values);
        } else {
            self.properties.push(Property {
                name: name.to_string(),
                values,
                location,
            });
        }
    }

    /// Returns `true` if this rule is the selector `(name, parameter)`.
    ///
    /// A missing parameter and an empty one are the same selector.
    #[must_use]
    pub fn is_selector(&self, name: &str, parameter: Option<&str>) -> bool {
        self.name == name
            && self.parameter.as_deref().unwrap_or("") == parameter.unwrap_or("")
    }

    /// Returns `true` for `#define { ... }` and `define { ... }` rules.
    #[must_use]
    pub fn is_define(&self) -> bool {
        self.name == "define" || (self.name.is_empty() && self.id.as_deref() == Some("define"))
    }

    /// The rule parameter, or `""` if it has none.
    #[must_use]
    pub fn parameter_or_empty(&self) -> &str {
        self.parameter.as_deref().unwrap_or("")
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(class) = &self.class {
            write!(f, ".{class}")?;
        }
        if let Some(id) = &self.id {
            write!(f, "#{id}")?;
        }
        if let Some(parameter) = &self.parameter {
            write!(f, "[{parameter}]")?;
        }
        Ok(())
    }
}

/// Read-only view of a property across one or more rules.
///
/// A property that does not exist yields an empty view, so callers can write
/// `rule.property("root").value().unwrap_or(default)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyView<'a> {
    values: Vec<&'a str>,
    location: Option<&'a SourceLocation>,
}

impl<'a> PropertyView<'a> {
    /// The single value of the property: the last one in cascade order.
    #[must_use]
    pub fn value(&self) -> Option<&'a str> {
        self.values.last().copied()
    }

    /// Every value, in insertion order.
    #[must_use]
    pub fn values(&self) -> &[&'a str] {
        &self.values
    }

    /// Owned copies of every value.
    #[must_use]
    pub fn to_strings(&self) -> Vec<String> {
        self.values.iter().map(|v| (*v).to_string()).collect()
    }

    /// Location of the declaration that supplied [`PropertyView::value`].
    #[must_use]
    pub const fn location(&self) -> Option<&'a SourceLocation> {
        self.location
    }

    /// Returns `true` if the property is absent or has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Property access shared by single rules and rule cascades.
pub trait Properties {
    /// View of the property `name`; empty if it is absent.
    fn property(&self, name: &str) -> PropertyView<'_>;

    /// Returns `true` if the property `name` is declared.
    fn has_property(&self, name: &str) -> bool {
        !self.property(name).is_empty()
    }
}

impl Properties for Rule {
    fn property(&self, name: &str) -> PropertyView<'_> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map_or_else(PropertyView::default, |p| PropertyView {
                values: p.values.iter().map(String::as_str).collect(),
                location: Some(&p.location),
            })
    }
}

/// An ordered cascade of rules; later rules win single-valued lookups.
#[derive(Debug, Clone, Default)]
pub struct RuleSet<'a> {
    rules: Vec<&'a Rule>,
}

impl<'a> RuleSet<'a> {
    /// Build a cascade from rules in sheet order.
    #[must_use]
    pub const fn new(rules: Vec<&'a Rule>) -> Self {
        Self { rules }
    }

    /// The rules in cascade order.
    #[must_use]
    pub fn rules(&self) -> &[&'a Rule] {
        &self.rules
    }

    /// Returns `true` if the cascade holds no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Properties for RuleSet<'_> {
    fn property(&self, name: &str) -> PropertyView<'_> {
        let mut view = PropertyView::default();
        for rule in &self.rules {
            if let Some(p) = rule.properties.iter().find(|p| p.name == name) {
                view.values.extend(p.values.iter().map(String::as_str));
                view.location = Some(&p.location);
            }
        }
        view
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn rule_with(name: &str, props: &[(&str, &[&str])]) -> Rule {
        let mut rule = Rule::new(name, None, SourceLocation::default());
        for (prop, values) in props {
            rule.add_values(
                prop,
                values.iter().map(|v| (*v).to_string()).collect(),
                SourceLocation::default(),
            );
        }
        rule
    }

    #[test]
    fn missing_property_is_an_empty_view() {
        let rule = rule_with("files", &[]);
        let view = rule.property("root");
        assert!(view.is_empty());
        assert_eq!(view.value(), None);
        assert_eq!(view.value().unwrap_or("default"), "default");
        assert!(!rule.has_property("root"));
    }

    #[test]
    fn repeated_property_appends_values() {
        let mut rule = rule_with("files", &[("include", &["*.dll"])]);
        rule.add_values("include", vec!["*.exe".to_string()], SourceLocation::default());
        assert_eq!(rule.property("include").values(), ["*.dll", "*.exe"]);
        assert_eq!(rule.properties.len(), 1);
    }

    #[test]
    fn single_value_is_the_last_one() {
        let rule = rule_with("package", &[("version", &["1.0", "2.0"])]);
        assert_eq!(rule.property("version").value(), Some("2.0"));
    }

    #[test]
    fn cascade_prefers_later_rules() {
        let base = rule_with("package", &[("version", &["1.0"]), ("name", &["base"])]);
        let over = rule_with("package", &[("version", &["2.0"])]);
        let set = RuleSet::new(vec![&base, &over]);
        assert_eq!(set.property("version").value(), Some("2.0"));
        assert_eq!(set.property("version").values(), ["1.0", "2.0"]);
        assert_eq!(set.property("name").value(), Some("base"));
        assert!(set.has_property("name"));
        assert!(!set.has_property("arch"));
    }

    #[test]
    fn selector_identity_is_name_and_parameter() {
        let rule = Rule::new("files", Some("bin"), SourceLocation::default());
        assert!(rule.is_selector("files", Some("bin")));
        assert!(!rule.is_selector("files", Some("lib")));
        assert!(!rule.is_selector("files", None));
        let bare = Rule::new("package", None, SourceLocation::default());
        assert!(bare.is_selector("package", Some("")));
    }

    #[test]
    fn define_rules_are_recognised() {
        let mut hash_define = Rule::new("", None, SourceLocation::default());
        hash_define.id = Some("define".to_string());
        assert!(hash_define.is_define());
        assert!(Rule::new("define", None, SourceLocation::default()).is_define());
        assert!(!Rule::new("package", None, SourceLocation::default()).is_define());
    }

    #[test]
    fn display_renders_full_selector() {
        let mut rule = Rule::new("files", Some("bin"), SourceLocation::default());
        rule.class = Some("x64".to_string());
        rule.id = Some("main".to_string());
        assert_eq!(rule.to_string(), "files.x64#main[bin]");
    }

    #[test]
    fn synthesized_rules_are_flagged() {
        let rule = Rule::synthesized("package", None);
        assert!(rule.synthesized);
        assert!(rule.properties.is_empty());
    }
}
