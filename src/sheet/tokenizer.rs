//! Lexer for the rule-sheet language.
//!
//! The tokenizer never fails.  Anything it cannot classify (an unterminated
//! literal, a stray character) becomes a [`TokenKind::Unknown`] token and
//! lexing resumes right after it, so a single bad line does not hide the
//! rest of the sheet from the parser.
use std::fmt;
use std::ops::Range;

/// Classification of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// A name such as `files` or `trim-path`.
    Identifier,
    /// `@name`; the token text is the name without the `@`.
    Directive,
    /// `"..."` or `'...'` with backslash escapes; text is the unescaped value.
    StringLiteral,
    /// `@"..."` with doubled-quote escaping; text is the unescaped value.
    AtStringLiteral,
    /// A run of digits and dots, e.g. `1.0.2`.
    NumericLiteral,
    /// The trimmed contents of a `[...]` selector parameter.
    SelectorParameter,
    /// `:`
    Colon,
    /// `;`
    Semicolon,
    /// `,`
    Comma,
    /// `{`
    OpenBrace,
    /// `}`
    CloseBrace,
    /// `.`
    Dot,
    /// `#`
    Hash,
    /// `=`
    Equals,
    /// Any other ASCII punctuation character.
    Symbol,
    /// Text the lexer could not classify.
    Unknown,
}

/// A lexical token with its position in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Token classification.
    pub kind: TokenKind,
    /// Extracted text (unescaped for literals).
    pub text: String,
    /// Byte range in the source, including delimiters.
    pub span: Range<usize>,
    /// 1-based line of the first character.
    pub line: usize,
    /// 1-based column of the first character.
    pub column: usize,
}

impl Token {
    /// Returns `true` for string and at-string literals.
    #[must_use]
    pub const fn is_string(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::StringLiteral | TokenKind::AtStringLiteral
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {:?} {:?}", self.line, self.column, self.kind, self.text)
    }
}

/// Identifier rules for a language dialect.
///
/// The default methods accept letters, digits and `_`.  Dialects with
/// hyphenated rule names override [`Dialect::is_identifier_part`].
pub trait Dialect: Clone + fmt::Debug {
    /// Can `c` begin an identifier?
    fn is_identifier_start(&self, c: char) -> bool {
        c.is_alphabetic() || c == '_'
    }

    /// Can `c` continue an identifier?
    fn is_identifier_part(&self, c: char) -> bool {
        c.is_alphanumeric() || c == '_'
    }
}

/// Plain identifiers: letters, digits and `_`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDialect;

impl Dialect for StandardDialect {}

/// Identifiers may also contain `-` after the first character
/// (`trim-path`, `developer-library`).  This is the sheet dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct HyphenatedDialect;

impl Dialect for HyphenatedDialect {
    fn is_identifier_part(&self, c: char) -> bool {
        c.is_alphanumeric() || c == '_' || c == '-'
    }
}

/// Lex `text` with the [`StandardDialect`].
#[must_use]
pub fn tokenize(text: &str) -> Vec<Token> {
    Tokens::new(text, StandardDialect).collect()
}

/// Lex `text` with a specific dialect.
#[must_use]
pub fn tokenize_with<D: Dialect>(text: &str, dialect: D) -> Vec<Token> {
    Tokens::new(text, dialect).collect()
}

/// Lazy token stream over a source string.
///
/// The stream is finite and `Clone`; [`Tokens::restart`] yields a fresh
/// stream from the beginning of the same text.
#[derive(Debug, Clone)]
pub struct Tokens<'a, D> {
    text: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    dialect: D,
}

impl<'a, D: Dialect> Tokens<'a, D> {
    /// Start lexing `text`.
    #[must_use]
    pub const fn new(text: &'a str, dialect: D) -> Self {
        Self {
            text,
            pos: 0,
            line: 1,
            column: 1,
            dialect,
        }
    }

    /// A new stream over the same text, positioned at the start.
    #[must_use]
    pub fn restart(&self) -> Self {
        Self::new(self.text, self.dialect.clone())
    }

    fn peek(&self) -> Option<char> {
        self.text.get(self.pos..)?.chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.text.get(self.pos..)?.chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        loop {
            match (self.peek(), self.peek_second()) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => {
                    self.bump();
                    self.bump();
                    // An unterminated block comment runs to end of input.
                    while let Some(c) = self.bump() {
                        if c == '*' && self.peek() == Some('/') {
                            self.bump();
                            break;
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn identifier_rest(&mut self, mut text: String) -> String {
        while let Some(c) = self.peek() {
            if !self.dialect.is_identifier_part(c) {
                break;
            }
            text.push(c);
            self.bump();
        }
        text
    }

    fn number_rest(&mut self, mut text: String) -> String {
        while let Some(c) = self.peek() {
            if !(c.is_ascii_digit() || c == '.') {
                break;
            }
            text.push(c);
            self.bump();
        }
        text
    }

    /// Body of a `"..."` / `'...'` literal; the opening quote is consumed.
    /// A newline or end of input before the closing quote makes it Unknown.
    fn quoted(&mut self, quote: char) -> (TokenKind, String) {
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => return (TokenKind::Unknown, value),
                Some(c) if c == quote => {
                    self.bump();
                    return (TokenKind::StringLiteral, value);
                }
                Some('\\') => {
                    self.bump();
                    match self.bump() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('r') => value.push('\r'),
                        Some(other) => value.push(other),
                        None => return (TokenKind::Unknown, value),
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.bump();
                }
            }
        }
    }

    /// Body of an `@"..."` literal; `@"` is consumed.  `""` stands for one
    /// literal quote.
    fn at_string(&mut self) -> (TokenKind, String) {
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return (TokenKind::Unknown, value),
                Some('"') if self.peek() == Some('"') => {
                    self.bump();
                    value.push('"');
                }
                Some('"') => return (TokenKind::AtStringLiteral, value),
                Some(c) => value.push(c),
            }
        }
    }

    /// Body of a `[...]` parameter; `[` is consumed.  Nested brackets are
    /// balanced and only a `]` at nesting zero ends the parameter.
    fn selector_parameter(&mut self) -> (TokenKind, String) {
        let mut value = String::new();
        let mut depth = 0usize;
        loop {
            match self.bump() {
                None => return (TokenKind::Unknown, value.trim().to_string()),
                Some('[') => {
                    depth += 1;
                    value.push('[');
                }
                Some(']') if depth == 0 => {
                    return (TokenKind::SelectorParameter, value.trim().to_string());
                }
                Some(']') => {
                    depth -= 1;
                    value.push(']');
                }
                Some(c) => value.push(c),
            }
        }
    }

    fn at_sign(&mut self) -> (TokenKind, String) {
        match self.peek() {
            Some('"') => {
                self.bump();
                self.at_string()
            }
            Some(c) if self.dialect.is_identifier_start(c) => {
                (TokenKind::Directive, self.identifier_rest(String::new()))
            }
            // Lone `@`: only the sign is consumed, the next character is
            // lexed on its own.
            _ => (TokenKind::Unknown, "@".to_string()),
        }
    }
}

impl<D: Dialect> Iterator for Tokens<'_, D> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.skip_trivia();
        let start = self.pos;
        let (line, column) = (self.line, self.column);
        let c = self.bump()?;

        let (kind, text) = match c {
            '"' | '\'' => self.quoted(c),
            '@' => self.at_sign(),
            '[' => self.selector_parameter(),
            ':' => (TokenKind::Colon, c.to_string()),
            ';' => (TokenKind::Semicolon, c.to_string()),
            ',' => (TokenKind::Comma, c.to_string()),
            '{' => (TokenKind::OpenBrace, c.to_string()),
            '}' => (TokenKind::CloseBrace, c.to_string()),
            '.' => (TokenKind::Dot, c.to_string()),
            '#' => (TokenKind::Hash, c.to_string()),
            '=' => (TokenKind::Equals, c.to_string()),
            c if self.dialect.is_identifier_start(c) => {
                (TokenKind::Identifier, self.identifier_rest(c.to_string()))
            }
            c if c.is_ascii_digit() => (TokenKind::NumericLiteral, self.number_rest(c.to_string())),
            c if c.is_ascii_punctuation() => (TokenKind::Symbol, c.to_string()),
            c => (TokenKind::Unknown, c.to_string()),
        };

        Some(Token {
            kind,
            text,
            span: start..self.pos,
            line,
            column,
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn dump(tokens: &[Token]) -> String {
        tokens
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_a_simple_rule() {
        let tokens = tokenize_with(r#"files[main] { include: "*.dll"; }"#, HyphenatedDialect);
        insta::assert_snapshot!(dump(&tokens), @r#"
        1:1 Identifier "files"
        1:6 SelectorParameter "main"
        1:13 OpenBrace "{"
        1:15 Identifier "include"
        1:22 Colon ":"
        1:24 StringLiteral "*.dll"
        1:31 Semicolon ";"
        1:33 CloseBrace "}"
        "#);
    }

    #[test]
    fn nested_brackets_stay_in_one_parameter() {
        let tokens = tokenize("rule[ a[b[c]] d ]");
        assert_eq!(kinds(&tokens), vec![TokenKind::Identifier, TokenKind::SelectorParameter]);
        assert_eq!(tokens[1].text, "a[b[c]] d");
    }

    #[test]
    fn unterminated_parameter_is_unknown() {
        let tokens = tokenize("rule[ a[b] ");
        assert_eq!(tokens[1].kind, TokenKind::Unknown);
        assert_eq!(tokens[1].text, "a[b]");
    }

    #[test]
    fn at_string_collapses_doubled_quotes() {
        let tokens = tokenize(r#"@"say ""hi"" now""#);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::AtStringLiteral);
        assert_eq!(tokens[0].text, r#"say "hi" now"#);
    }

    #[test]
    fn at_string_may_span_lines_and_keep_backslashes() {
        let tokens = tokenize("@\"C:\\tools\nnext\" x");
        assert_eq!(tokens[0].kind, TokenKind::AtStringLiteral);
        assert_eq!(tokens[0].text, "C:\\tools\nnext");
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn unterminated_at_string_is_unknown() {
        let tokens = tokenize(r#"@"never ends"#);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Unknown);
    }

    #[test]
    fn lone_at_sign_is_unknown_and_next_char_is_rescanned() {
        let tokens = tokenize("@;name");
        assert_eq!(
            kinds(&tokens),
            vec![TokenKind::Unknown, TokenKind::Semicolon, TokenKind::Identifier]
        );
        assert_eq!(tokens[0].text, "@");
        assert_eq!(tokens[1].column, 2);
    }

    #[test]
    fn at_identifier_is_a_directive() {
        let tokens = tokenize(r#"@import "base.sheet";"#);
        assert_eq!(tokens[0].kind, TokenKind::Directive);
        assert_eq!(tokens[0].text, "import");
        assert_eq!(tokens[1].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[1].text, "base.sheet");
    }

    #[test]
    fn string_escapes_are_decoded() {
        let tokens = tokenize(r#""a\"b\\c\n" 'it\'s'"#);
        assert_eq!(tokens[0].text, "a\"b\\c\n");
        assert_eq!(tokens[1].text, "it's");
    }

    #[test]
    fn unterminated_string_does_not_swallow_next_line() {
        let tokens = tokenize("\"oops\nnext");
        assert_eq!(kinds(&tokens), vec![TokenKind::Unknown, TokenKind::Identifier]);
        assert_eq!(tokens[1].text, "next");
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn hyphen_only_joins_identifiers_in_hyphenated_dialect() {
        let standard = tokenize("trim-path");
        assert_eq!(
            kinds(&standard),
            vec![TokenKind::Identifier, TokenKind::Symbol, TokenKind::Identifier]
        );
        let hyphenated = tokenize_with("trim-path", HyphenatedDialect);
        assert_eq!(kinds(&hyphenated), vec![TokenKind::Identifier]);
        assert_eq!(hyphenated[0].text, "trim-path");
    }

    #[test]
    fn comments_are_skipped() {
        let tokens = tokenize("a // line\n/* block\n */ b /* open");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].text, "b");
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn numbers_keep_dots() {
        let tokens = tokenize("version: 1.0.2;");
        assert_eq!(tokens[2].kind, TokenKind::NumericLiteral);
        assert_eq!(tokens[2].text, "1.0.2");
    }

    #[test]
    fn non_ascii_symbols_are_unknown() {
        let tokens = tokenize("a § b");
        assert_eq!(tokens[1].kind, TokenKind::Unknown);
        assert_eq!(tokens[2].text, "b");
    }

    #[test]
    fn spans_cover_delimiters() {
        let src = r#"x "quoted" [p]"#;
        let tokens = tokenize(src);
        assert_eq!(&src[tokens[1].span.clone()], r#""quoted""#);
        assert_eq!(&src[tokens[2].span.clone()], "[p]");
    }

    #[test]
    fn restart_yields_the_same_sequence() {
        let mut stream = Tokens::new("a: b;", StandardDialect);
        let first: Vec<Token> = stream.by_ref().collect();
        assert!(stream.next().is_none(), "stream must be finite");
        let second: Vec<Token> = stream.restart().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \n\t ").is_empty());
    }
}
