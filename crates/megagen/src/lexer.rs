//! Token reader for project descriptions.
//!
//! Tokens are braces, double-quoted strings and bare words. Whitespace,
//! `// line` and `/* block */` comments separate tokens and are skipped.

use std::fs;
use std::io;
use std::path::Path;

use crate::{ParseError, ParseErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    Quoted,
    Punctuation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

impl Token {
    /// Quoted strings never match a literal, so `"}"` is data, not a brace.
    pub fn is(&self, literal: &str) -> bool {
        self.kind != TokenKind::Quoted && self.text == literal
    }
}

/// Exact source text of a `{ ... }` section, braces included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracedSection {
    pub text: String,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct Lexer {
    name: String,
    text: String,
    position: usize,
    line: usize,
}

impl Lexer {
    pub fn from_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Ok(Self::from_memory(text, path.display().to_string()))
    }

    pub fn from_memory(text: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            position: 0,
            line: 1,
        }
    }

    /// Reports lines relative to `line`, for text cut out of a larger file.
    pub fn starting_at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn error(&self, kind: ParseErrorKind) -> ParseError {
        self.error_at(self.line, kind)
    }

    pub fn error_at(&self, line: usize, kind: ParseErrorKind) -> ParseError {
        ParseError {
            source_name: self.name.clone(),
            line,
            kind,
        }
    }

    pub fn end_of_file(&mut self) -> Result<bool, ParseError> {
        self.skip_insignificant()?;
        Ok(self.peek_char().is_none())
    }

    pub fn read_token(&mut self) -> Result<Option<Token>, ParseError> {
        self.skip_insignificant()?;
        let line = self.line;
        let Some(first) = self.peek_char() else {
            return Ok(None);
        };

        let token = match first {
            '{' | '}' => {
                self.bump();
                Token {
                    kind: TokenKind::Punctuation,
                    text: first.to_string(),
                    line,
                }
            }
            '"' => {
                self.bump();
                let mut text = String::new();
                loop {
                    match self.bump() {
                        None | Some('\n') => {
                            return Err(self.error_at(line, ParseErrorKind::UnterminatedString));
                        }
                        Some('"') => break,
                        Some(character) => text.push(character),
                    }
                }
                Token {
                    kind: TokenKind::Quoted,
                    text,
                    line,
                }
            }
            _ => {
                let start = self.position;
                while let Some(character) = self.peek_char() {
                    if character.is_whitespace()
                        || matches!(character, '{' | '}' | '"')
                        || self.at_comment()
                    {
                        break;
                    }
                    self.bump();
                }
                Token {
                    kind: TokenKind::Word,
                    text: self.text[start..self.position].to_owned(),
                    line,
                }
            }
        };
        Ok(Some(token))
    }

    pub fn expect_token(&mut self, literal: &str) -> Result<Token, ParseError> {
        match self.read_token()? {
            Some(token) if token.is(literal) => Ok(token),
            Some(token) => Err(self.error_at(
                token.line,
                ParseErrorKind::UnexpectedToken {
                    expected: format!("'{literal}'"),
                    found: token.text,
                },
            )),
            None => Err(self.error(ParseErrorKind::UnexpectedEof {
                expected: format!("'{literal}'"),
            })),
        }
    }

    pub fn parse_int(&mut self) -> Result<i64, ParseError> {
        match self.read_token()? {
            Some(token) if token.kind == TokenKind::Word => token
                .text
                .parse::<i64>()
                .map_err(|_| self.error_at(token.line, ParseErrorKind::InvalidInteger(token.text))),
            Some(token) => Err(self.error_at(
                token.line,
                ParseErrorKind::InvalidInteger(token.text),
            )),
            None => Err(self.error(ParseErrorKind::UnexpectedEof {
                expected: "integer".to_owned(),
            })),
        }
    }

    /// Consumes a `{ ... }` section with nested braces and returns its text
    /// exactly as written. Braces inside strings and comments do not count.
    pub fn parse_braced_section(&mut self) -> Result<BracedSection, ParseError> {
        self.skip_insignificant()?;
        let start = self.position;
        let open = self.expect_token("{")?;
        let mut depth = 1usize;
        while depth > 0 {
            let Some(token) = self.read_token()? else {
                return Err(self.error_at(open.line, ParseErrorKind::UnmatchedBrace));
            };
            if token.is("{") {
                depth += 1;
            } else if token.is("}") {
                depth -= 1;
            }
        }
        Ok(BracedSection {
            text: self.text[start..self.position].to_owned(),
            line: open.line,
        })
    }

    fn skip_insignificant(&mut self) -> Result<(), ParseError> {
        loop {
            match (self.peek_char(), self.peek_nth(1)) {
                (Some(character), _) if character.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(character) = self.bump() {
                        if character == '\n' {
                            break;
                        }
                    }
                }
                (Some('/'), Some('*')) => {
                    let line = self.line;
                    self.bump();
                    self.bump();
                    loop {
                        match self.bump() {
                            None => {
                                return Err(
                                    self.error_at(line, ParseErrorKind::UnterminatedComment)
                                );
                            }
                            Some('*') if self.peek_char() == Some('/') => {
                                self.bump();
                                break;
                            }
                            Some(_) => {}
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn at_comment(&self) -> bool {
        self.peek_char() == Some('/') && matches!(self.peek_nth(1), Some('/' | '*'))
    }

    fn peek_char(&self) -> Option<char> {
        self.text[self.position..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.text[self.position..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let character = self.peek_char()?;
        self.position += character.len_utf8();
        if character == '\n' {
            self.line += 1;
        }
        Some(character)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(lexer: &mut Lexer) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(token) = lexer
            .read_token()
            .unwrap_or_else(|error| panic!("read token failed: {error}"))
        {
            out.push(token.text);
        }
        out
    }

    #[test]
    fn comments_are_skipped_and_lines_counted() {
        let mut lexer = Lexer::from_memory(
            "numlayers // two of them\n2 /* block\ncomment */ layer_0",
            "test",
        );
        let first = lexer.read_token().unwrap().unwrap();
        assert_eq!(first.text, "numlayers");
        assert_eq!(first.line, 1);
        assert_eq!(lexer.parse_int().unwrap(), 2);
        let layer = lexer.read_token().unwrap().unwrap();
        assert_eq!(layer.text, "layer_0");
        assert_eq!(layer.line, 3);
        assert!(lexer.end_of_file().unwrap());
    }

    #[test]
    fn words_stop_at_braces_and_comments() {
        let mut lexer = Lexer::from_memory("{albedo textures/grass.tga//note\n}", "test");
        assert_eq!(words(&mut lexer), ["{", "albedo", "textures/grass.tga", "}"]);
    }

    #[test]
    fn quoted_strings_keep_spaces_and_never_match_literals() {
        let mut lexer = Lexer::from_memory("\"my images/rock.tga\" \"}\"", "test");
        let path = lexer.read_token().unwrap().unwrap();
        assert_eq!(path.kind, TokenKind::Quoted);
        assert_eq!(path.text, "my images/rock.tga");
        let brace = lexer.read_token().unwrap().unwrap();
        assert!(!brace.is("}"));
    }

    #[test]
    fn unterminated_constructs_report_their_start_line() {
        let mut comment = Lexer::from_memory("a\n/* never\nclosed", "test");
        comment.read_token().unwrap();
        let error = comment.read_token().unwrap_err();
        assert!(matches!(error.kind, ParseErrorKind::UnterminatedComment));
        assert_eq!(error.line, 2);

        let mut string = Lexer::from_memory("\"open", "test");
        let error = string.read_token().unwrap_err();
        assert!(matches!(error.kind, ParseErrorKind::UnterminatedString));
    }

    #[test]
    fn expect_token_reports_found_text() {
        let mut lexer = Lexer::from_memory("numlayer 2", "island.megagen");
        let error = lexer.expect_token("numlayers").unwrap_err();
        match error.kind {
            ParseErrorKind::UnexpectedToken { found, .. } => assert_eq!(found, "numlayer"),
            other => panic!("unexpected error kind: {other:?}"),
        }
        assert_eq!(error.source_name, "island.megagen");
    }

    #[test]
    fn parse_int_rejects_words_and_eof() {
        let mut lexer = Lexer::from_memory("-3 two", "test");
        assert_eq!(lexer.parse_int().unwrap(), -3);
        assert!(matches!(
            lexer.parse_int().unwrap_err().kind,
            ParseErrorKind::InvalidInteger(text) if text == "two"
        ));
        assert!(matches!(
            lexer.parse_int().unwrap_err().kind,
            ParseErrorKind::UnexpectedEof { .. }
        ));
    }

    #[test]
    fn braced_section_is_exact_and_nested() {
        let mut lexer = Lexer::from_memory(
            "layer_0\n  { albedo a.tga /* } */ { mask \"}\" } }\nlayer_1",
            "test",
        );
        lexer.expect_token("layer_0").unwrap();
        let section = lexer.parse_braced_section().unwrap();
        assert_eq!(section.text, "{ albedo a.tga /* } */ { mask \"}\" } }");
        assert_eq!(section.line, 2);
        assert_eq!(lexer.read_token().unwrap().unwrap().text, "layer_1");
    }

    #[test]
    fn braced_section_without_close_is_unmatched() {
        let mut lexer = Lexer::from_memory("{ albedo a.tga\n", "test");
        let error = lexer.parse_braced_section().unwrap_err();
        assert!(matches!(error.kind, ParseErrorKind::UnmatchedBrace));
        assert_eq!(error.line, 1);
    }

    #[test]
    fn starting_line_offsets_reported_lines() {
        let mut lexer = Lexer::from_memory("{\nmask", "test").starting_at_line(7);
        lexer.read_token().unwrap();
        assert_eq!(lexer.read_token().unwrap().unwrap().line, 8);
    }
}
