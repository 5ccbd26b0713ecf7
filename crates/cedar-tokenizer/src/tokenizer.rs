//! Lexer for Cedar schema text.

use crate::{LineCol, Span, Token, TokenKind};
use tracing::trace;

/// A lexer over Cedar schema source text.
///
/// Tracks byte position and `(line, column)` live as it advances, including
/// through comments and escape sequences inside strings. `//` line comments
/// and `/* ... */` block comments (non-nesting) are skipped transparently
/// wherever whitespace is allowed.
#[derive(Clone)]
pub struct Lexer<'src> {
    source: &'src str,
    remaining: &'src str,
    pos: u32,
    line_col: LineCol,
}

/// An opaque snapshot of lexer position, restorable with [`Lexer::restore`].
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint {
    pos: u32,
    line_col: LineCol,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            remaining: source,
            pos: 0,
            line_col: LineCol::START,
        }
    }

    pub fn position(&self) -> u32 {
        self.pos
    }

    pub fn line_col(&self) -> LineCol {
        self.line_col
    }

    pub fn is_eof(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Capture a position the caller can [`restore`](Self::restore) to.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            line_col: self.line_col,
        }
    }

    /// Atomically restore `(pos, line, column)` to a prior checkpoint.
    pub fn restore(&mut self, checkpoint: Checkpoint) {
        self.pos = checkpoint.pos;
        self.line_col = checkpoint.line_col;
        self.remaining = &self.source[self.pos as usize..];
    }

    fn peek(&self) -> Option<char> {
        self.remaining.chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.remaining.chars().nth(n)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8() as u32;
        self.remaining = &self.remaining[c.len_utf8()..];
        self.line_col = self.line_col.advance(c);
        Some(c)
    }

    fn token(&self, kind: TokenKind, start: u32) -> Token<'src> {
        let span = Span::new(start, self.pos);
        let text = &self.source[start as usize..self.pos as usize];
        trace!(?kind, ?span, text, "token");
        Token::new(kind, span, text)
    }

    /// Skip whitespace and comments, then return the next significant token.
    pub fn next_token(&mut self) -> Token<'src> {
        loop {
            self.skip_whitespace();
            if self.starts_with("//") {
                self.skip_line_comment();
                continue;
            }
            if self.starts_with("/*") {
                self.skip_block_comment();
                continue;
            }
            break;
        }

        if self.is_eof() {
            return self.token(TokenKind::Eof, self.pos);
        }

        let start = self.pos;
        let c = self.peek().unwrap();

        match c {
            '{' => {
                self.advance();
                self.token(TokenKind::LBrace, start)
            }
            '}' => {
                self.advance();
                self.token(TokenKind::RBrace, start)
            }
            '(' => {
                self.advance();
                self.token(TokenKind::LParen, start)
            }
            ')' => {
                self.advance();
                self.token(TokenKind::RParen, start)
            }
            '[' => {
                self.advance();
                self.token(TokenKind::LBracket, start)
            }
            ']' => {
                self.advance();
                self.token(TokenKind::RBracket, start)
            }
            ',' => {
                self.advance();
                self.token(TokenKind::Comma, start)
            }
            ';' => {
                self.advance();
                self.token(TokenKind::Semicolon, start)
            }
            '?' => {
                self.advance();
                self.token(TokenKind::Question, start)
            }
            '=' => {
                self.advance();
                self.token(TokenKind::Equals, start)
            }
            '<' => {
                self.advance();
                self.token(TokenKind::Lt, start)
            }
            '>' => {
                self.advance();
                self.token(TokenKind::Gt, start)
            }
            '@' => {
                self.advance();
                self.token(TokenKind::At, start)
            }
            ':' if self.starts_with("::") => {
                self.advance();
                self.advance();
                self.token(TokenKind::ColonColon, start)
            }
            ':' => {
                self.advance();
                self.token(TokenKind::Colon, start)
            }
            '"' => self.tokenize_string(),
            c if is_ident_start(c) => self.tokenize_ident(),
            _ => {
                self.advance();
                self.token(TokenKind::Error, start)
            }
        }
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.remaining.starts_with(prefix)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn skip_line_comment(&mut self) {
        self.advance(); // /
        self.advance(); // /
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) {
        self.advance(); // /
        self.advance(); // *
        while !self.is_eof() {
            if self.starts_with("*/") {
                self.advance();
                self.advance();
                return;
            }
            self.advance();
        }
        // Unterminated block comment: consumed to EOF, caller sees no more tokens.
    }

    fn tokenize_ident(&mut self) -> Token<'src> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                self.advance();
            } else {
                break;
            }
        }
        self.token(TokenKind::Ident, start)
    }

    fn tokenize_string(&mut self) -> Token<'src> {
        let start = self.pos;
        self.advance(); // opening quote
        loop {
            match self.peek() {
                None => return self.token(TokenKind::Error, start),
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    if self.peek().is_some() {
                        self.advance();
                    }
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
        self.token(TokenKind::String, start)
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Token<'src>;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            None
        } else {
            Some(token)
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(source: &str) -> Vec<(TokenKind, &str)> {
        Lexer::new(source).map(|t| (t.kind, t.text)).collect()
    }

    #[test]
    fn structural_tokens() {
        assert_eq!(tokenize("{}()[],;?=<>@"), vec![
            (TokenKind::LBrace, "{"),
            (TokenKind::RBrace, "}"),
            (TokenKind::LParen, "("),
            (TokenKind::RParen, ")"),
            (TokenKind::LBracket, "["),
            (TokenKind::RBracket, "]"),
            (TokenKind::Comma, ","),
            (TokenKind::Semicolon, ";"),
            (TokenKind::Question, "?"),
            (TokenKind::Equals, "="),
            (TokenKind::Lt, "<"),
            (TokenKind::Gt, ">"),
            (TokenKind::At, "@"),
        ]);
    }

    #[test]
    fn double_colon() {
        assert_eq!(
            tokenize("App::User"),
            vec![
                (TokenKind::Ident, "App"),
                (TokenKind::ColonColon, "::"),
                (TokenKind::Ident, "User"),
            ]
        );
    }

    #[test]
    fn skips_line_and_block_comments() {
        assert_eq!(
            tokenize("entity // trailing\nUser /* inline */ in"),
            vec![
                (TokenKind::Ident, "entity"),
                (TokenKind::Ident, "User"),
                (TokenKind::Ident, "in"),
            ]
        );
    }

    #[test]
    fn quoted_string_with_escape() {
        assert_eq!(
            tokenize(r#""a \"b\" c""#),
            vec![(TokenKind::String, r#""a \"b\" c""#)]
        );
    }

    #[test]
    fn unterminated_string_is_error() {
        let tokens = tokenize("\"abc");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].0, TokenKind::Error);
    }

    #[test]
    fn line_column_advances_through_comment_and_string_newline() {
        let mut lexer = Lexer::new("// c\n\"a\\nb\"");
        let t1 = lexer.next_token();
        assert_eq!(t1.kind, TokenKind::String);
        // line comment consumed line 1, string starts on line 2.
        assert_eq!(lexer.line_col().line, 2);
    }

    #[test]
    fn checkpoint_restore_is_atomic() {
        let mut lexer = Lexer::new("abc def");
        let checkpoint = lexer.checkpoint();
        let first = lexer.next_token();
        assert_eq!(first.text, "abc");
        let after = lexer.line_col();
        lexer.restore(checkpoint);
        assert_eq!(lexer.line_col(), LineCol::START);
        let replayed = lexer.next_token();
        assert_eq!(replayed.text, "abc");
        assert_eq!(lexer.line_col(), after);
    }

    #[test]
    fn tokenizes_an_entity_declaration() {
        let rendered: Vec<String> = tokenize("entity User in [Group] { name: String };")
            .into_iter()
            .map(|(kind, text)| format!("{kind:?} {text:?}"))
            .collect();
        insta::assert_snapshot!(rendered.join("\n"), @r###"
        Ident "entity"
        Ident "User"
        Ident "in"
        LBracket "["
        Ident "Group"
        RBracket "]"
        LBrace "{"
        Ident "name"
        Colon ":"
        Ident "String"
        RBrace "}"
        Semicolon ";"
        "###);
    }
}
