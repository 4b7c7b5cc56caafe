//! The scanner that produces tokens from source text.

use unicode_xid::UnicodeXID;

use super::{Position, Span, Token, TokenKind};

/// A scanner that tokenizes source code on demand.
pub struct Scanner<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
    row: u32,
    col: u32,
}

impl<'a> Scanner<'a> {
    /// Creates a new scanner for the given source code.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current_pos: 0,
            row: 1,
            col: 1,
        }
    }

    /// Returns the next token from the source.
    ///
    /// Once the input is exhausted every further call returns `Eof`.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        let start = self.current_pos;
        let pos = Position::new(self.row, self.col);

        let Some((_, ch)) = self.advance() else {
            return Token::new(TokenKind::Eof, Span::new(start, start), pos);
        };

        let kind = match ch {
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,

            '+' => self.scan_pair('+', TokenKind::PlusPlus, TokenKind::Plus),
            '-' => self.scan_pair('-', TokenKind::MinusMinus, TokenKind::Minus),
            '*' => self.scan_pair('*', TokenKind::StarStar, TokenKind::Star),
            '=' => self.scan_pair('=', TokenKind::EqualEqual, TokenKind::Equal),
            '!' => self.scan_pair('=', TokenKind::NotEqual, TokenKind::Bang),
            '<' => self.scan_pair('=', TokenKind::LessThanEqual, TokenKind::LessThan),
            '>' => self.scan_pair('=', TokenKind::GreaterThanEqual, TokenKind::GreaterThan),
            '&' => self.scan_pair('&', TokenKind::AmpersandAmpersand, TokenKind::Invalid('&')),
            '|' => self.scan_pair('|', TokenKind::PipePipe, TokenKind::Invalid('|')),

            '"' | '\'' => self.scan_string(ch),
            '0'..='9' => self.scan_number(start),
            _ if is_id_start(ch) => self.scan_identifier(start),

            _ => TokenKind::Invalid(ch),
        };

        Token::new(kind, Span::new(start, self.current_pos), pos)
    }

    /// Scans the whole input, stopping after the first `Eof`.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((pos, ch)) = result {
            self.current_pos = pos + ch.len_utf8();
            if ch == '\n' {
                self.row += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        result
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn peek_next(&self) -> Option<char> {
        let mut iter = self.chars.clone();
        iter.next();
        iter.next().map(|(_, ch)| ch)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() => {
                    self.advance();
                }
                Some('/') => match self.peek_next() {
                    Some('/') => {
                        while let Some(ch) = self.peek() {
                            if ch == '\n' {
                                break;
                            }
                            self.advance();
                        }
                    }
                    Some('*') => {
                        self.advance();
                        self.advance();
                        let mut prev = ' ';
                        while let Some((_, ch)) = self.advance() {
                            if prev == '*' && ch == '/' {
                                break;
                            }
                            prev = ch;
                        }
                    }
                    _ => break,
                },
                _ => break,
            }
        }
    }

    /// Consumes `next` if it follows, choosing between the two token kinds.
    fn scan_pair(&mut self, next: char, matched: TokenKind, single: TokenKind) -> TokenKind {
        if self.peek() == Some(next) {
            self.advance();
            matched
        } else {
            single
        }
    }

    fn scan_string(&mut self, quote: char) -> TokenKind {
        let mut value = String::new();

        while let Some((_, ch)) = self.advance() {
            match ch {
                c if c == quote => return TokenKind::String(value),
                '\n' => return TokenKind::UnterminatedString,
                '\\' => match self.advance() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, 'r')) => value.push('\r'),
                    Some((_, '0')) => value.push('\0'),
                    Some((_, other)) => value.push(other),
                    None => return TokenKind::UnterminatedString,
                },
                c => value.push(c),
            }
        }

        TokenKind::UnterminatedString
    }

    fn scan_number(&mut self, start: usize) -> TokenKind {
        while matches!(self.peek(), Some('0'..='9')) {
            self.advance();
        }

        if self.peek() == Some('.') && matches!(self.peek_next(), Some('0'..='9')) {
            self.advance();
            while matches!(self.peek(), Some('0'..='9')) {
                self.advance();
            }
        }

        match self.source[start..self.current_pos].parse::<f64>() {
            Ok(n) => TokenKind::Number(n),
            Err(_) => TokenKind::Invalid(self.source[start..].chars().next().unwrap_or('0')),
        }
    }

    fn scan_identifier(&mut self, start: usize) -> TokenKind {
        while let Some(ch) = self.peek() {
            if !is_id_continue(ch) {
                break;
            }
            self.advance();
        }

        let ident = &self.source[start..self.current_pos];
        TokenKind::keyword(ident).unwrap_or_else(|| TokenKind::Identifier(ident.to_string()))
    }
}

fn is_id_start(ch: char) -> bool {
    ch == '_' || ch == '$' || UnicodeXID::is_xid_start(ch)
}

fn is_id_continue(ch: char) -> bool {
    ch == '$' || UnicodeXID::is_xid_continue(ch)
}
