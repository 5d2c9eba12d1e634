use super::{token::*, Column, Error, LineNumber};
use std::collections::VecDeque;

type Result<T> = std::result::Result<T, Error>;

fn is_basic_whitespace(c: char) -> bool {
    c == ' ' || c == '\t' || c == '\r'
}

fn is_basic_digit(c: char) -> bool {
    c.is_ascii_digit()
}

fn is_basic_alphabetic(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_type_suffix(c: char) -> bool {
    c == '$' || c == '#' || c == '%'
}

/// Position within the source. Saving and restoring a cursor replays tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    line: usize,
    col: usize,
    line_start: bool,
}

/// ## Token source
///
/// Produces one token at a time from program text.
/// A special mode replaces the text with a queued token sequence;
/// `for` loops use it to compile their increment at `next`.
pub struct TokenSource {
    lines: Vec<Vec<char>>,
    cursor: Cursor,
    special: Option<VecDeque<Token>>,
    special_position: (LineNumber, Column),
}

impl Default for TokenSource {
    fn default() -> Self {
        TokenSource::new("")
    }
}

impl TokenSource {
    pub fn new(source: &str) -> TokenSource {
        TokenSource {
            lines: source.lines().map(|line| line.chars().collect()).collect(),
            cursor: Cursor {
                line: 0,
                col: 0,
                line_start: true,
            },
            special: None,
            special_position: (0, 0),
        }
    }

    pub fn position(&self) -> Cursor {
        self.cursor
    }

    pub fn set_position(&mut self, cursor: Cursor) {
        self.cursor = cursor;
    }

    /// Queue tokens to be returned instead of source text.
    /// Once exhausted an end-of-line token is returned until `set_normal`.
    pub fn set_special(&mut self, tokens: Vec<Token>, line: LineNumber, col: Column) {
        self.special = Some(
            tokens
                .into_iter()
                .map(|mut t| {
                    t.line = line;
                    t.col = col;
                    t.new_line = false;
                    t
                })
                .collect(),
        );
        self.special_position = (line, col);
    }

    pub fn set_normal(&mut self) {
        self.special = None;
    }

    pub fn next_token(&mut self, skip_eol: bool, data_mode: bool) -> Result<Token> {
        if let Some(queue) = &mut self.special {
            let (line, col) = self.special_position;
            return Ok(match queue.pop_front() {
                Some(token) => token,
                None => Token::new(TokenKind::Eol, "", line, col),
            });
        }
        loop {
            let token = self.scan(data_mode)?;
            if token.kind == TokenKind::Eol && skip_eol {
                continue;
            }
            return Ok(token);
        }
    }

    pub fn peek_token(&mut self, skip_eol: bool) -> Result<Token> {
        if let Some(queue) = &self.special {
            let (line, col) = self.special_position;
            return Ok(match queue.front() {
                Some(token) => token.clone(),
                None => Token::new(TokenKind::Eol, "", line, col),
            });
        }
        let saved = self.cursor;
        let token = self.next_token(skip_eol, false);
        self.cursor = saved;
        token
    }

    fn scan(&mut self, data_mode: bool) -> Result<Token> {
        let line_number = (self.cursor.line + 1) as LineNumber;
        let line = match self.lines.get(self.cursor.line) {
            Some(line) => line,
            None => {
                let col = self.lines.last().map(|l| l.len()).unwrap_or(0) + 1;
                let line_number = self.lines.len().max(1) as LineNumber;
                return Ok(Token::new(TokenKind::Eof, "", line_number, clamp_col(col)));
            }
        };
        let mut scanner = Scanner {
            chars: line,
            pos: self.cursor.col,
        };
        scanner.skip_whitespace();
        let col = clamp_col(scanner.pos + 1);
        let token = match scanner.peek() {
            None | Some('\'') => None,
            Some(_) if data_mode => Some(scanner.data_item()),
            Some(c) if is_basic_digit(c) => {
                Some(scanner.number().map_err(|e| e.in_position(line_number, col))?)
            }
            Some('.') if scanner.peek_next().map_or(false, is_basic_digit) => {
                Some(scanner.number().map_err(|e| e.in_position(line_number, col))?)
            }
            Some('"') => Some(scanner.string().map_err(|e| e.in_position(line_number, col))?),
            Some(c) if is_basic_alphabetic(c) => {
                let token = scanner.identifier();
                if token.text.eq_ignore_ascii_case("rem") {
                    None
                } else {
                    Some(token)
                }
            }
            Some(_) => Some(scanner.symbol()),
        };
        match token {
            Some(mut token) => {
                token.line = line_number;
                token.col = col;
                token.new_line = self.cursor.line_start;
                self.cursor.col = scanner.pos;
                self.cursor.line_start = false;
                Ok(token)
            }
            None => {
                let col = clamp_col(line.len() + 1);
                self.cursor = Cursor {
                    line: self.cursor.line + 1,
                    col: 0,
                    line_start: true,
                };
                Ok(Token::new(TokenKind::Eol, "", line_number, col))
            }
        }
    }
}

fn clamp_col(col: usize) -> Column {
    col.min(Column::MAX as usize) as Column
}

struct Scanner<'a> {
    chars: &'a [char],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while self.peek().map_or(false, is_basic_whitespace) {
            self.pos += 1;
        }
    }

    fn number(&mut self) -> Result<Token> {
        if self.peek() == Some('0') && matches!(self.peek_next(), Some('x') | Some('X')) {
            return self.hex();
        }
        let mut s = String::new();
        let mut real = false;
        while let Some(c) = self.peek() {
            if is_basic_digit(c) {
                s.push(c);
            } else if c == '.' && !real {
                real = true;
                s.push(c);
            } else {
                break;
            }
            self.pos += 1;
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let exponent_digits = match self.peek_next() {
                Some('+') | Some('-') => self.chars.get(self.pos + 2).copied(),
                c => c,
            };
            if exponent_digits.map_or(false, is_basic_digit) {
                real = true;
                s.push('e');
                self.pos += 1;
                if let Some(sign) = self.peek().filter(|c| *c == '+' || *c == '-') {
                    s.push(sign);
                    self.pos += 1;
                }
                while let Some(c) = self.peek().filter(|c| is_basic_digit(*c)) {
                    s.push(c);
                    self.pos += 1;
                }
            }
        }
        Ok(number_token(&s, real))
    }

    fn hex(&mut self) -> Result<Token> {
        self.pos += 2;
        let mut s = String::new();
        while let Some(c) = self.peek().filter(|c| c.is_ascii_hexdigit()) {
            s.push(c);
            self.pos += 1;
        }
        match u32::from_str_radix(&s, 16) {
            Ok(n) => Ok(Token::constant(Literal::Int(n as i32))),
            Err(_) => Err(error!(SyntaxError; "Invalid hexadecimal number")),
        }
    }

    fn string(&mut self) -> Result<Token> {
        self.pos += 1;
        let mut s = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(Token::constant(Literal::String(s))),
                Some(c) => s.push(c),
                None => return Err(error!(SyntaxError; "Unterminated string")),
            }
        }
    }

    fn identifier(&mut self) -> Token {
        let mut s = String::new();
        while let Some(c) = self
            .peek()
            .filter(|c| is_basic_alphabetic(*c) || is_basic_digit(*c))
        {
            s.push(c);
            self.pos += 1;
        }
        if let Some(c) = self.peek().filter(|c| is_type_suffix(*c)) {
            s.push(c);
            self.pos += 1;
        }
        Token::new(TokenKind::Text, &s, 0, 0)
    }

    fn symbol(&mut self) -> Token {
        let c = self.bump().unwrap_or(' ');
        let mut s = c.to_string();
        if let Some(n) = self.peek() {
            if (c == '<' && (n == '>' || n == '=')) || (c == '>' && n == '=') {
                s.push(n);
                self.pos += 1;
            }
        }
        Token::new(TokenKind::Symbol, &s, 0, 0)
    }

    /// `data` items are quoted strings, signed numbers or bare text.
    fn data_item(&mut self) -> Token {
        match self.peek() {
            Some(',') | Some(':') => return self.symbol(),
            Some('"') => {
                if let Ok(token) = self.string() {
                    return token;
                }
            }
            _ => {}
        }
        let start = self.pos;
        let mut end = self.chars.len();
        let mut quoted = false;
        for (i, c) in self.chars[start..].iter().enumerate() {
            if *c == '"' {
                quoted = !quoted;
            } else if !quoted && (*c == ',' || *c == ':') {
                end = start + i;
                break;
            }
        }
        self.pos = end;
        let text: String = self.chars[start..end].iter().collect();
        let text = text.trim();
        if let Some(token) = signed_number(text) {
            return token;
        }
        Token::constant(Literal::String(text.to_string()))
    }
}

fn number_token(s: &str, real: bool) -> Token {
    if !real {
        if let Ok(n) = s.parse::<i32>() {
            return Token::constant(Literal::Int(n));
        }
    }
    let value = s.parse::<f64>().unwrap_or(0.0) as f32;
    Token::constant(Literal::Real(value))
}

fn signed_number(text: &str) -> Option<Token> {
    let (negative, digits) = match text.chars().next() {
        Some('-') => (true, text[1..].trim_start()),
        Some('+') => (false, text[1..].trim_start()),
        _ => (false, text),
    };
    let scanner_chars: Vec<char> = digits.chars().collect();
    if scanner_chars.is_empty() {
        return None;
    }
    let first = scanner_chars[0];
    let starts_number = is_basic_digit(first)
        || (first == '.' && scanner_chars.get(1).map_or(false, |c| is_basic_digit(*c)));
    if !starts_number {
        return None;
    }
    let mut scanner = Scanner {
        chars: &scanner_chars,
        pos: 0,
    };
    let token = scanner.number().ok()?;
    if scanner.pos != scanner_chars.len() {
        return None;
    }
    match token.kind {
        TokenKind::Constant(Literal::Int(n)) if negative => {
            Some(Token::constant(Literal::Int(n.wrapping_neg())))
        }
        TokenKind::Constant(Literal::Real(r)) if negative => {
            Some(Token::constant(Literal::Real(-r)))
        }
        _ => Some(token),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(s: &str) -> Vec<Token> {
        let mut source = TokenSource::new(s);
        let mut v = vec![];
        loop {
            let t = source.next_token(false, false).unwrap();
            if t.kind == TokenKind::Eof {
                break;
            }
            v.push(t);
        }
        v
    }

    #[test]
    fn test_identifiers_and_symbols() {
        let t = tokens("a$ = b# <> c%");
        let text: Vec<&str> = t.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(text, vec!["a$", "=", "b#", "<>", "c%", ""]);
        assert!(t[0].new_line);
        assert!(!t[1].new_line);
        assert_eq!(t[2].col, 6);
    }

    #[test]
    fn test_numbers() {
        let t = tokens("12 1.5 .5 2e3 0xff 3000000000");
        assert_eq!(t[0].kind, TokenKind::Constant(Literal::Int(12)));
        assert_eq!(t[1].kind, TokenKind::Constant(Literal::Real(1.5)));
        assert_eq!(t[2].kind, TokenKind::Constant(Literal::Real(0.5)));
        assert_eq!(t[3].kind, TokenKind::Constant(Literal::Real(2000.0)));
        assert_eq!(t[4].kind, TokenKind::Constant(Literal::Int(255)));
        assert_eq!(t[5].kind, TokenKind::Constant(Literal::Real(3e9)));
    }

    #[test]
    fn test_comments() {
        let t = tokens("a ' comment\nrem another\nb");
        let text: Vec<&str> = t.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(text, vec!["a", "", "", "b", ""]);
        assert_eq!(t[3].line, 3);
    }

    #[test]
    fn test_unterminated_string() {
        let mut source = TokenSource::new("print \"abc");
        source.next_token(false, false).unwrap();
        let e = source.next_token(false, false).unwrap_err();
        assert_eq!(e.code(), crate::lang::ErrorCode::SyntaxError);
        assert_eq!(e.line_number(), Some(1));
    }

    #[test]
    fn test_data_mode() {
        let mut source = TokenSource::new(" -5, hello world ,\"x,y\"");
        let t = source.next_token(false, true).unwrap();
        assert_eq!(t.kind, TokenKind::Constant(Literal::Int(-5)));
        assert!(source.next_token(false, false).unwrap().is(","));
        let t = source.next_token(false, true).unwrap();
        assert_eq!(
            t.kind,
            TokenKind::Constant(Literal::String("hello world".to_string()))
        );
        assert!(source.next_token(false, false).unwrap().is(","));
        let t = source.next_token(false, true).unwrap();
        assert_eq!(t.kind, TokenKind::Constant(Literal::String("x,y".to_string())));
    }

    #[test]
    fn test_peek_and_special() {
        let mut source = TokenSource::new("a b");
        assert_eq!(source.peek_token(false).unwrap().text, "a");
        assert_eq!(source.next_token(false, false).unwrap().text, "a");
        source.set_special(vec![Token::text("i"), Token::symbol("+")], 9, 4);
        let t = source.next_token(false, false).unwrap();
        assert_eq!((t.text.as_str(), t.line, t.col), ("i", 9, 4));
        assert!(source.next_token(false, false).unwrap().is("+"));
        assert_eq!(source.next_token(false, false).unwrap().kind, TokenKind::Eol);
        source.set_normal();
        assert_eq!(source.next_token(false, false).unwrap().text, "b");
    }
}
