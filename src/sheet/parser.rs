//! Recursive-descent parser producing rules and import directives.
//!
//! ```text
//! sheet     := (directive | rule)*
//! directive := '@import' value ';'
//! rule      := selector '{' (property (';' property)* ';'?)? '}'
//! selector  := (Identifier | '*')? ('.' Identifier | '#' Identifier)* SelectorParameter?
//! property  := Identifier ':' value (',' value)*
//! ```
//!
//! Problems are reported to [`Diagnostics`] and the parser resynchronises
//! at the next `;` or `}`; it never gives up on the rest of the sheet.
use std::path::Path;
use std::sync::Arc;

use super::rule::Rule;
use super::tokenizer::{HyphenatedDialect, Token, TokenKind, Tokens};
use crate::diagnostics::{Diagnostic, Diagnostics, MessageCode, SourceLocation};

/// A top-level item of a parsed sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    /// A rule block.
    Rule(Rule),
    /// `@import "target";`
    Import {
        /// Path as written, relative to the importing file.
        target: String,
        /// Location of the directive.
        location: SourceLocation,
    },
}

/// Parse one source unit.  Imports are returned as items, not followed.
pub fn parse(text: &str, file: Option<Arc<Path>>, diagnostics: &Diagnostics) -> Vec<Item> {
    let mut tokens = Vec::new();
    for token in Tokens::new(text, HyphenatedDialect) {
        if token.kind == TokenKind::Unknown {
            let location = SourceLocation::new(file.clone(), token.line, token.column);
            diagnostics.report(
                Diagnostic::warning(
                    MessageCode::LexicalAnomaly,
                    format!("unrecognized text '{}'", token.text),
                )
                .at(Some(&location)),
            );
        } else {
            tokens.push(token);
        }
    }

    let mut parser = Parser {
        text,
        tokens,
        pos: 0,
        file,
        diagnostics,
    };
    parser.sheet()
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    file: Option<Arc<Path>>,
    diagnostics: &'a Diagnostics,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn location_of(&self, token: &Token) -> SourceLocation {
        SourceLocation::new(self.file.clone(), token.line, token.column)
    }

    fn here(&self) -> SourceLocation {
        match self.peek().or_else(|| self.tokens.last()) {
            Some(token) => self.location_of(token),
            None => SourceLocation::new(self.file.clone(), 1, 1),
        }
    }

    fn syntax_error(&self, location: &SourceLocation, message: impl Into<String>) {
        self.diagnostics
            .report(Diagnostic::error(MessageCode::SyntaxError, message).at(Some(location)));
    }

    /// Skip tokens until one of `stops` is next (not consumed) or input ends.
    fn skip_until(&mut self, stops: &[TokenKind]) {
        while let Some(kind) = self.peek_kind() {
            if stops.contains(&kind) {
                return;
            }
            self.pos += 1;
        }
    }

    fn sheet(&mut self) -> Vec<Item> {
        let mut items = Vec::new();
        while let Some(kind) = self.peek_kind() {
            match kind {
                TokenKind::Directive => {
                    if let Some(item) = self.directive() {
                        items.push(item);
                    }
                }
                TokenKind::Semicolon => {
                    self.pos += 1;
                }
                _ => {
                    if let Some(rule) = self.rule() {
                        items.push(Item::Rule(rule));
                    }
                }
            }
        }
        items
    }

    fn directive(&mut self) -> Option<Item> {
        let token = self.advance()?;
        let location = self.location_of(&token);
        if token.text != "import" {
            self.syntax_error(&location, format!("unknown directive '@{}'", token.text));
            self.skip_until(&[TokenKind::Semicolon]);
            self.pos += 1;
            return None;
        }
        let target = self.value();
        match self.peek_kind() {
            Some(TokenKind::Semicolon) => self.pos += 1,
            None => {}
            Some(_) => {
                let here = self.here();
                self.syntax_error(&here, "expected ';' after @import");
                self.skip_until(&[TokenKind::Semicolon]);
                self.pos += 1;
            }
        }
        if target.is_empty() {
            self.syntax_error(&location, "@import requires a file name");
            return None;
        }
        Some(Item::Import { target, location })
    }

    fn rule(&mut self) -> Option<Rule> {
        let start = self.peek()?.clone();
        let location = self.location_of(&start);
        let mut rule = Rule::new("", None, location.clone());

        match start.kind {
            TokenKind::Identifier => {
                rule.name = start.text;
                self.pos += 1;
            }
            TokenKind::Symbol if start.text == "*" => {
                rule.name = start.text;
                self.pos += 1;
            }
            _ => {}
        }

        loop {
            match self.peek_kind() {
                Some(TokenKind::Dot) => {
                    self.pos += 1;
                    rule.class = Some(self.selector_part("class")?);
                }
                Some(TokenKind::Hash) => {
                    self.pos += 1;
                    rule.id = Some(self.selector_part("id")?);
                }
                Some(TokenKind::SelectorParameter) if rule.parameter.is_none() => {
                    rule.parameter = self.advance().map(|t| t.text);
                }
                Some(TokenKind::OpenBrace) => {
                    self.pos += 1;
                    break;
                }
                _ => {
                    let here = self.here();
                    self.syntax_error(&here, format!("expected '{{' after selector '{rule}'"));
                    self.recover_past_block();
                    return None;
                }
            }
        }

        if rule.name.is_empty() && rule.id.is_none() && rule.class.is_none() {
            self.syntax_error(&location, "rule has no selector");
        }

        self.rule_body(&mut rule);
        Some(rule)
    }

    fn selector_part(&mut self, what: &str) -> Option<String> {
        if self.peek_kind() == Some(TokenKind::Identifier) {
            return self.advance().map(|t| t.text);
        }
        let here = self.here();
        self.syntax_error(&here, format!("expected {what} name in selector"));
        self.recover_past_block();
        None
    }

    /// Skip to the end of the current block, or the next statement if the
    /// block never opened.
    fn recover_past_block(&mut self) {
        self.skip_until(&[TokenKind::Semicolon, TokenKind::OpenBrace, TokenKind::CloseBrace]);
        match self.peek_kind() {
            Some(TokenKind::OpenBrace) => {
                self.skip_until(&[TokenKind::CloseBrace]);
                self.pos += 1;
            }
            Some(_) => self.pos += 1,
            None => {}
        }
    }

    fn rule_body(&mut self, rule: &mut Rule) {
        loop {
            match self.peek_kind() {
                Some(TokenKind::CloseBrace) => {
                    self.pos += 1;
                    return;
                }
                Some(TokenKind::Semicolon) => self.pos += 1,
                Some(TokenKind::Identifier) => self.property(rule),
                Some(_) => {
                    let here = self.here();
                    self.syntax_error(&here, "expected property name");
                    self.pos += 1;
                    self.skip_until(&[TokenKind::Semicolon, TokenKind::CloseBrace]);
                }
                None => {
                    let here = self.here();
                    self.syntax_error(&here, format!("unexpected end of sheet in rule '{rule}'"));
                    return;
                }
            }
        }
    }

    fn property(&mut self, rule: &mut Rule) {
        let Some(name) = self.advance() else {
            return;
        };
        let location = self.location_of(&name);
        if self.peek_kind() != Some(TokenKind::Colon) {
            let here = self.here();
            self.syntax_error(&here, format!("expected ':' after property '{}'", name.text));
            self.skip_until(&[TokenKind::Semicolon, TokenKind::CloseBrace]);
            return;
        }
        self.pos += 1;

        let mut values = Vec::new();
        loop {
            let value = self.value();
            if !value.is_empty() {
                values.push(value);
            }
            if self.peek_kind() == Some(TokenKind::Comma) {
                self.pos += 1;
            } else {
                break;
            }
        }

        match self.peek_kind() {
            Some(TokenKind::Semicolon | TokenKind::CloseBrace) | None => {}
            Some(_) => {
                let here = self.here();
                self.syntax_error(&here, format!("expected ';' after property '{}'", name.text));
                self.skip_until(&[TokenKind::Semicolon, TokenKind::CloseBrace]);
            }
        }
        rule.add_values(&name.text, values, location);
    }

    /// One property value: adjacent string literals concatenate, anything
    /// else is taken verbatim from the source up to the next separator.
    fn value(&mut self) -> String {
        let first = self.pos;
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Comma
                | TokenKind::Semicolon
                | TokenKind::CloseBrace
                | TokenKind::OpenBrace => break,
                TokenKind::Symbol if token.text == "$" => {
                    self.pos += 1;
                    if self.peek_kind() == Some(TokenKind::OpenBrace) {
                        self.skip_until(&[TokenKind::CloseBrace]);
                        self.pos = (self.pos + 1).min(self.tokens.len());
                    }
                }
                _ => self.pos += 1,
            }
        }

        let Some(taken) = self.tokens.get(first..self.pos) else {
            return String::new();
        };
        if taken.is_empty() {
            return String::new();
        }
        if taken.iter().all(Token::is_string) {
            return taken.iter().map(|t| t.text.as_str()).collect();
        }
        match (taken.first(), taken.last()) {
            (Some(a), Some(b)) => self
                .text
                .get(a.span.start..b.span.end)
                .unwrap_or_default()
                .trim()
                .to_string(),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::sheet::rule::Properties;

    fn rules(text: &str) -> (Vec<Rule>, Diagnostics) {
        let diags = Diagnostics::new();
        let rules = parse(text, None, &diags)
            .into_iter()
            .filter_map(|item| match item {
                Item::Rule(rule) => Some(rule),
                Item::Import { .. } => None,
            })
            .collect();
        (rules, diags)
    }

    #[test]
    fn parses_selector_parts() {
        let (rules, diags) = rules("files.x64#main[bin] { }");
        assert!(diags.is_empty());
        let rule = &rules[0];
        assert_eq!(rule.name, "files");
        assert_eq!(rule.class.as_deref(), Some("x64"));
        assert_eq!(rule.id.as_deref(), Some("main"));
        assert_eq!(rule.parameter.as_deref(), Some("bin"));
        assert_eq!(rule.location.line, 1);
    }

    #[test]
    fn parses_multi_valued_properties() {
        let (rules, diags) = rules(
            r#"files[bin] {
                root: "out";
                include: "*.dll", "*.exe";
                include: extra.txt;
                trim-path: minimal
            }"#,
        );
        assert!(diags.is_empty(), "{:?}", diags.snapshot());
        let rule = &rules[0];
        assert_eq!(rule.property("root").value(), Some("out"));
        assert_eq!(
            rule.property("include").values(),
            ["*.dll", "*.exe", "extra.txt"]
        );
        assert_eq!(rule.property("trim-path").value(), Some("minimal"));
    }

    #[test]
    fn raw_values_keep_source_text() {
        let (rules, _) = rules("files[a] { include: bin/**/*.dll; root: ${build}/out; }");
        assert_eq!(rules[0].property("include").value(), Some("bin/**/*.dll"));
        assert_eq!(rules[0].property("root").value(), Some("${build}/out"));
    }

    #[test]
    fn adjacent_strings_concatenate() {
        let (rules, _) = rules(r#"package { name: "pkg" @"-core"; }"#);
        assert_eq!(rules[0].property("name").value(), Some("pkg-core"));
    }

    #[test]
    fn hash_define_rule() {
        let (rules, _) = rules("#define { OUT: bin; }");
        assert!(rules[0].is_define());
        assert_eq!(rules[0].property("OUT").value(), Some("bin"));
    }

    #[test]
    fn imports_are_items() {
        let diags = Diagnostics::new();
        let items = parse("@import \"base.sheet\";\npackage { }", None, &diags);
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[0], Item::Import { target, .. } if target == "base.sheet"));
    }

    #[test]
    fn unknown_directive_is_a_syntax_error() {
        let (rules, diags) = rules("@frobnicate x; package { }");
        assert_eq!(rules.len(), 1);
        assert_eq!(diags.count_code(MessageCode::SyntaxError), 1);
    }

    #[test]
    fn missing_colon_recovers_at_next_property() {
        let (rules, diags) = rules("files[a] { root \"x\"; include: a.txt; }");
        assert_eq!(diags.count_code(MessageCode::SyntaxError), 1);
        assert_eq!(rules[0].property("include").value(), Some("a.txt"));
        assert!(!rules[0].has_property("root"));
    }

    #[test]
    fn bad_selector_skips_its_block() {
        let (rules, diags) = rules("files. { x: 1; } package { name: p; }");
        assert_eq!(diags.count_code(MessageCode::SyntaxError), 1);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "package");
    }

    #[test]
    fn unknown_tokens_are_lexical_anomalies() {
        let (rules, diags) = rules("package { name: p; } § files[x] { }");
        assert_eq!(diags.count_code(MessageCode::LexicalAnomaly), 1);
        assert_eq!(rules.len(), 2);
    }

    #[test]
    fn unterminated_rule_is_reported_and_kept() {
        let (rules, diags) = rules("package { name: p;");
        assert_eq!(rules.len(), 1);
        assert_eq!(diags.count_code(MessageCode::SyntaxError), 1);
        assert_eq!(rules[0].property("name").value(), Some("p"));
    }

    #[test]
    fn locations_carry_the_file() {
        let diags = Diagnostics::new();
        let file: Arc<Path> = Arc::from(Path::new("/s/main.sheet"));
        let items = parse("\n  package { }", Some(file.clone()), &diags);
        let Item::Rule(rule) = &items[0] else {
            panic!("expected a rule");
        };
        assert_eq!(rule.location.file.as_deref(), Some(file.as_ref()));
        assert_eq!((rule.location.line, rule.location.column), (2, 3));
    }
}
