use super::{Column, LineNumber};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i32),
    Real(f32),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Text,
    Keyword,
    Function,
    Constant(Literal),
    Symbol,
    Eol,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: LineNumber,
    pub col: Column,
    pub new_line: bool,
}

impl Token {
    pub fn new(kind: TokenKind, text: &str, line: LineNumber, col: Column) -> Token {
        Token {
            kind,
            text: text.to_string(),
            line,
            col,
            new_line: false,
        }
    }

    pub fn text(text: &str) -> Token {
        Token::new(TokenKind::Text, text, 0, 0)
    }

    pub fn symbol(text: &str) -> Token {
        Token::new(TokenKind::Symbol, text, 0, 0)
    }

    pub fn constant(literal: Literal) -> Token {
        let text = match &literal {
            Literal::Int(i) => i.to_string(),
            Literal::Real(r) => r.to_string(),
            Literal::String(s) => s.clone(),
        };
        Token::new(TokenKind::Constant(literal), &text, 0, 0)
    }

    /// True when the token spells `text`. String and number constants never match.
    pub fn is(&self, text: &str) -> bool {
        !self.is_constant() && self.text == text
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind, TokenKind::Constant(_))
    }

    pub fn is_end_of_line(&self) -> bool {
        matches!(self.kind, TokenKind::Eol | TokenKind::Eof)
    }
}
