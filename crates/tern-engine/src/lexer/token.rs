//! Token definitions for the lexer.

use std::fmt;

/// A span in the source code, representing a range of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
}

impl Span {
    /// Creates a new span.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Returns the length of this span in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true if this span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A 1-based row/column position in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    /// Line number
    pub row: u32,
    /// Column number, counted in characters
    pub col: u32,
}

impl Position {
    /// Creates a new position.
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self { row: 1, col: 1 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.col)
    }
}

/// A token produced by the scanner.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The byte range in the source code
    pub span: Span,
    /// Where the token starts
    pub pos: Position,
}

impl Token {
    /// Creates a new token.
    pub fn new(kind: TokenKind, span: Span, pos: Position) -> Self {
        Self { kind, span, pos }
    }
}

/// The different kinds of tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    /// Numeric literal (integer or floating point)
    Number(f64),
    /// String literal, escapes already resolved
    String(String),
    /// Boolean true
    True,
    /// Boolean false
    False,

    /// Identifier
    Identifier(String),

    // Keywords
    Var,
    Function,
    If,
    Else,
    While,
    Do,
    For,
    Return,

    // Punctuation
    /// {
    LeftBrace,
    /// }
    RightBrace,
    /// (
    LeftParen,
    /// )
    RightParen,
    /// ;
    Semicolon,
    /// ,
    Comma,

    // Operators
    /// +
    Plus,
    /// ++
    PlusPlus,
    /// -
    Minus,
    /// --
    MinusMinus,
    /// *
    Star,
    /// **
    StarStar,
    /// /
    Slash,
    /// %
    Percent,
    /// =
    Equal,
    /// ==
    EqualEqual,
    /// !
    Bang,
    /// !=
    NotEqual,
    /// <
    LessThan,
    /// <=
    LessThanEqual,
    /// >
    GreaterThan,
    /// >=
    GreaterThanEqual,
    /// &&
    AmpersandAmpersand,
    /// ||
    PipePipe,

    /// A string literal with no closing quote
    UnterminatedString,
    /// Any character the language does not use
    Invalid(char),
    /// End of input
    Eof,
}

impl TokenKind {
    /// Looks up the keyword for an identifier, if it is one.
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        let kind = match ident {
            "var" => TokenKind::Var,
            "function" => TokenKind::Function,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "do" => TokenKind::Do,
            "for" => TokenKind::For,
            "return" => TokenKind::Return,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "number {}", n),
            TokenKind::String(s) => write!(f, "string \"{}\"", s),
            TokenKind::True => f.write_str("'true'"),
            TokenKind::False => f.write_str("'false'"),
            TokenKind::Identifier(name) => write!(f, "identifier '{}'", name),
            TokenKind::Var => f.write_str("'var'"),
            TokenKind::Function => f.write_str("'function'"),
            TokenKind::If => f.write_str("'if'"),
            TokenKind::Else => f.write_str("'else'"),
            TokenKind::While => f.write_str("'while'"),
            TokenKind::Do => f.write_str("'do'"),
            TokenKind::For => f.write_str("'for'"),
            TokenKind::Return => f.write_str("'return'"),
            TokenKind::LeftBrace => f.write_str("'{'"),
            TokenKind::RightBrace => f.write_str("'}'"),
            TokenKind::LeftParen => f.write_str("'('"),
            TokenKind::RightParen => f.write_str("')'"),
            TokenKind::Semicolon => f.write_str("';'"),
            TokenKind::Comma => f.write_str("','"),
            TokenKind::Plus => f.write_str("'+'"),
            TokenKind::PlusPlus => f.write_str("'++'"),
            TokenKind::Minus => f.write_str("'-'"),
            TokenKind::MinusMinus => f.write_str("'--'"),
            TokenKind::Star => f.write_str("'*'"),
            TokenKind::StarStar => f.write_str("'**'"),
            TokenKind::Slash => f.write_str("'/'"),
            TokenKind::Percent => f.write_str("'%'"),
            TokenKind::Equal => f.write_str("'='"),
            TokenKind::EqualEqual => f.write_str("'=='"),
            TokenKind::Bang => f.write_str("'!'"),
            TokenKind::NotEqual => f.write_str("'!='"),
            TokenKind::LessThan => f.write_str("'<'"),
            TokenKind::LessThanEqual => f.write_str("'<='"),
            TokenKind::GreaterThan => f.write_str("'>'"),
            TokenKind::GreaterThanEqual => f.write_str("'>='"),
            TokenKind::AmpersandAmpersand => f.write_str("'&&'"),
            TokenKind::PipePipe => f.write_str("'||'"),
            TokenKind::UnterminatedString => f.write_str("unterminated string"),
            TokenKind::Invalid(ch) => write!(f, "unexpected character '{}'", ch),
            TokenKind::Eof => f.write_str("end of input"),
        }
    }
}
