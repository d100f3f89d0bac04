// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Matter Labs

//! Tokenizer for CUE source text

use super::CompileError;
use std::fmt::{Display, Formatter};

/// A CUE token
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    Int(i128),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Bottom,
    LBrace,
    RBrace,
    LBrack,
    RBrack,
    LParen,
    RParen,
    Colon,
    Comma,
    Question,
    Bang,
    Dot,
    Ellipsis,
    Or,
    And,
    Star,
    Plus,
    Minus,
    Assign,
    Lt,
    Le,
    Gt,
    Ge,
    Ne,
    Match,
    NotMatch,
    Eof,
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "identifier {s}"),
            Token::Int(i) => write!(f, "{i}"),
            Token::Float(x) => write!(f, "{x:?}"),
            Token::String(s) => write!(f, "{s:?}"),
            Token::Bytes(_) => f.write_str("bytes literal"),
            Token::Bottom => f.write_str("_|_"),
            Token::LBrace => f.write_str("'{'"),
            Token::RBrace => f.write_str("'}'"),
            Token::LBrack => f.write_str("'['"),
            Token::RBrack => f.write_str("']'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::Colon => f.write_str("':'"),
            Token::Comma => f.write_str("',' or newline"),
            Token::Question => f.write_str("'?'"),
            Token::Bang => f.write_str("'!'"),
            Token::Dot => f.write_str("'.'"),
            Token::Ellipsis => f.write_str("'...'"),
            Token::Or => f.write_str("'|'"),
            Token::And => f.write_str("'&'"),
            Token::Star => f.write_str("'*'"),
            Token::Plus => f.write_str("'+'"),
            Token::Minus => f.write_str("'-'"),
            Token::Assign => f.write_str("'='"),
            Token::Lt => f.write_str("'<'"),
            Token::Le => f.write_str("'<='"),
            Token::Gt => f.write_str("'>'"),
            Token::Ge => f.write_str("'>='"),
            Token::Ne => f.write_str("'!='"),
            Token::Match => f.write_str("'=~'"),
            Token::NotMatch => f.write_str("'!~'"),
            Token::Eof => f.write_str("end of input"),
        }
    }
}

/// A token with its source position
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub line: usize,
    pub col: usize,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    col: usize,
    tokens: Vec<Spanned>,
}

/// Split `src` into tokens.
///
/// Newlines after a token that can end an operand are turned into commas.
pub(crate) fn tokenize(src: &str) -> Result<Vec<Spanned>, CompileError> {
    let mut lexer = Lexer {
        chars: src.chars().peekable(),
        line: 1,
        col: 1,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

impl Lexer<'_> {
    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.chars.peek() == Some(&c) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn error(&self, line: usize, col: usize, msg: impl Display) -> CompileError {
        CompileError::new(format!("{line}:{col}: {msg}"))
    }

    fn ends_operand(&self) -> bool {
        matches!(
            self.tokens.last().map(|t| &t.token),
            Some(
                Token::Ident(_)
                    | Token::Int(_)
                    | Token::Float(_)
                    | Token::String(_)
                    | Token::Bytes(_)
                    | Token::Bottom
                    | Token::RBrace
                    | Token::RBrack
                    | Token::RParen
                    | Token::Ellipsis
            )
        )
    }

    fn run(&mut self) -> Result<(), CompileError> {
        while let Some(&c) = self.chars.peek() {
            let (line, col) = (self.line, self.col);
            let push = |lexer: &mut Self, token| lexer.tokens.push(Spanned { token, line, col });

            match c {
                '\n' => {
                    self.bump();
                    if self.ends_operand() {
                        push(self, Token::Comma);
                    }
                }
                c if c.is_whitespace() => {
                    self.bump();
                }
                '/' => {
                    self.bump();
                    if !self.eat('/') {
                        return Err(self.error(line, col, "division is not supported"));
                    }
                    while self.chars.peek().is_some_and(|&c| c != '\n') {
                        self.bump();
                    }
                }
                '"' | '\'' => {
                    let token = self.quoted(c, line, col)?;
                    push(self, token);
                }
                '0'..='9' => {
                    let token = self.number(line, col)?;
                    push(self, token);
                }
                c if c.is_alphabetic() || c == '_' || c == '#' || c == '$' => {
                    let token = self.ident(line, col)?;
                    push(self, token);
                }
                _ => {
                    self.bump();
                    let token = match c {
                        '{' => Token::LBrace,
                        '}' => Token::RBrace,
                        '[' => Token::LBrack,
                        ']' => Token::RBrack,
                        '(' => Token::LParen,
                        ')' => Token::RParen,
                        ':' => Token::Colon,
                        ',' => Token::Comma,
                        '?' => Token::Question,
                        '|' => Token::Or,
                        '&' => Token::And,
                        '*' => Token::Star,
                        '+' => Token::Plus,
                        '-' => Token::Minus,
                        '.' => {
                            if self.eat('.') {
                                if !self.eat('.') {
                                    return Err(self.error(line, col, "unexpected '..'"));
                                }
                                Token::Ellipsis
                            } else {
                                Token::Dot
                            }
                        }
                        '=' => {
                            if self.eat('~') {
                                Token::Match
                            } else if self.eat('=') {
                                return Err(self.error(line, col, "'==' is not supported"));
                            } else {
                                Token::Assign
                            }
                        }
                        '!' => {
                            if self.eat('=') {
                                Token::Ne
                            } else if self.eat('~') {
                                Token::NotMatch
                            } else {
                                Token::Bang
                            }
                        }
                        '<' => {
                            if self.eat('=') {
                                Token::Le
                            } else {
                                Token::Lt
                            }
                        }
                        '>' => {
                            if self.eat('=') {
                                Token::Ge
                            } else {
                                Token::Gt
                            }
                        }
                        other => {
                            return Err(self.error(line, col, format!("illegal character {other:?}")))
                        }
                    };
                    push(self, token);
                }
            }
        }

        let (line, col) = (self.line, self.col);
        if self.ends_operand() {
            self.tokens.push(Spanned {
                token: Token::Comma,
                line,
                col,
            });
        }
        self.tokens.push(Spanned {
            token: Token::Eof,
            line,
            col,
        });
        Ok(())
    }

    fn ident(&mut self, line: usize, col: usize) -> Result<Token, CompileError> {
        let mut name = String::new();
        if let Some(c) = self.bump() {
            name.push(c);
        }
        // `_|_` is the bottom literal
        if name == "_" && self.chars.peek() == Some(&'|') {
            let mut ahead = self.chars.clone();
            ahead.next();
            if ahead.next() == Some('_') {
                self.bump();
                self.bump();
                return Ok(Token::Bottom);
            }
        }
        if name == "_" && self.eat('#') {
            name.push('#');
        }
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if name == "#" || name == "_#" {
            if self.chars.peek() == Some(&'"') {
                return Err(self.error(line, col, "raw strings are not supported"));
            }
            return Err(self.error(line, col, "invalid identifier"));
        }
        Ok(Token::Ident(name))
    }

    fn number(&mut self, line: usize, col: usize) -> Result<Token, CompileError> {
        let mut text = String::new();
        let mut is_float = false;

        if self.chars.peek() == Some(&'0') {
            let mut ahead = self.chars.clone();
            ahead.next();
            let radix = match ahead.next() {
                Some('x') | Some('X') => Some(16),
                Some('o') | Some('O') => Some(8),
                Some('b') | Some('B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.bump();
                self.bump();
                while let Some(&c) = self.chars.peek() {
                    if c == '_' {
                        self.bump();
                    } else if c.is_digit(radix) {
                        text.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                return i128::from_str_radix(&text, radix)
                    .map(Token::Int)
                    .map_err(|e| self.error(line, col, format!("invalid number: {e}")));
            }
        }

        while let Some(&c) = self.chars.peek() {
            match c {
                '0'..='9' => text.push(c),
                '_' => {}
                '.' => {
                    // `1...` is not a float
                    let mut ahead = self.chars.clone();
                    ahead.next();
                    if is_float || !ahead.peek().is_some_and(|c| c.is_ascii_digit()) {
                        break;
                    }
                    is_float = true;
                    text.push(c);
                }
                'e' | 'E' => {
                    is_float = true;
                    text.push(c);
                    self.bump();
                    if let Some(&sign @ ('+' | '-')) = self.chars.peek() {
                        text.push(sign);
                        self.bump();
                    }
                    continue;
                }
                _ => break,
            }
            self.bump();
        }

        if is_float {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|e| self.error(line, col, format!("invalid number {text}: {e}")))
        } else {
            text.parse::<i128>()
                .map(Token::Int)
                .map_err(|e| self.error(line, col, format!("invalid number {text}: {e}")))
        }
    }

    fn quoted(&mut self, quote: char, line: usize, col: usize) -> Result<Token, CompileError> {
        self.bump();
        if self.chars.peek() == Some(&quote) {
            let mut ahead = self.chars.clone();
            ahead.next();
            if ahead.next() == Some(quote) {
                return Err(self.error(line, col, "multi-line strings are not supported"));
            }
        }

        let mut buf: Vec<u8> = Vec::new();
        loop {
            let c = self
                .bump()
                .ok_or_else(|| self.error(line, col, "string literal not terminated"))?;
            match c {
                '\n' => return Err(self.error(line, col, "string literal not terminated")),
                c if c == quote => break,
                '\\' => {
                    let esc = self
                        .bump()
                        .ok_or_else(|| self.error(line, col, "string literal not terminated"))?;
                    match esc {
                        'n' => buf.push(b'\n'),
                        't' => buf.push(b'\t'),
                        'r' => buf.push(b'\r'),
                        'a' => buf.push(0x07),
                        'b' => buf.push(0x08),
                        'f' => buf.push(0x0c),
                        'v' => buf.push(0x0b),
                        '/' => buf.push(b'/'),
                        '\\' => buf.push(b'\\'),
                        '"' => buf.push(b'"'),
                        '\'' => buf.push(b'\''),
                        '(' => {
                            return Err(self.error(
                                line,
                                col,
                                "string interpolation is not supported",
                            ))
                        }
                        'x' if quote == '\'' => {
                            let byte = self.hex_digits(2, line, col)?;
                            buf.push(byte as u8);
                        }
                        'u' | 'U' => {
                            let len = if esc == 'u' { 4 } else { 8 };
                            let code = self.hex_digits(len, line, col)?;
                            let c = char::from_u32(code).ok_or_else(|| {
                                self.error(line, col, format!("invalid code point {code:#x}"))
                            })?;
                            let mut tmp = [0u8; 4];
                            buf.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
                        }
                        other => {
                            return Err(self.error(
                                line,
                                col,
                                format!("unknown escape sequence \\{other}"),
                            ))
                        }
                    }
                }
                c => {
                    let mut tmp = [0u8; 4];
                    buf.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
                }
            }
        }

        if quote == '\'' {
            Ok(Token::Bytes(buf))
        } else {
            String::from_utf8(buf)
                .map(Token::String)
                .map_err(|_| self.error(line, col, "invalid UTF-8 in string literal"))
        }
    }

    fn hex_digits(&mut self, len: usize, line: usize, col: usize) -> Result<u32, CompileError> {
        let mut value = 0u32;
        for _ in 0..len {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error(line, col, "invalid hex escape"))?;
            value = value * 16 + digit;
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn test_field_with_bound() {
        assert_eq!(
            tokens("a?: >=1 & <10.5"),
            vec![
                Token::Ident("a".into()),
                Token::Question,
                Token::Colon,
                Token::Ge,
                Token::Int(1),
                Token::And,
                Token::Lt,
                Token::Float(10.5),
                Token::Comma,
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_newline_inserts_comma() {
        assert_eq!(
            tokens("a: 1 // one\n\nb: {\n}\n"),
            vec![
                Token::Ident("a".into()),
                Token::Colon,
                Token::Int(1),
                Token::Comma,
                Token::Ident("b".into()),
                Token::Colon,
                Token::LBrace,
                Token::RBrace,
                Token::Comma,
                Token::Eof
            ]
        );
        // no comma after an operator
        assert_eq!(
            tokens("int |\nstring")[..3],
            [Token::Ident("int".into()), Token::Or, Token::Ident("string".into())]
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            tokens(r#"_|_ _ #Def _#h "a\né" 'b\x00' 0x1F 1_000 2e3 [...]"#),
            vec![
                Token::Bottom,
                Token::Ident("_".into()),
                Token::Ident("#Def".into()),
                Token::Ident("_#h".into()),
                Token::String("a\né".into()),
                Token::Bytes(vec![b'b', 0]),
                Token::Int(31),
                Token::Int(1000),
                Token::Float(2000.0),
                Token::LBrack,
                Token::Ellipsis,
                Token::RBrack,
                Token::Comma,
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_integers_beyond_i64() {
        assert_eq!(
            tokens("18446744073709551615 0xFFFF_FFFF_FFFF_FFFF")[..2],
            [
                Token::Int(18_446_744_073_709_551_615),
                Token::Int(18_446_744_073_709_551_615)
            ]
        );
    }

    #[test]
    fn test_regex_operators() {
        assert_eq!(
            tokens(r#"=~"^a" !~"b" != 1"#)[..6],
            [
                Token::Match,
                Token::String("^a".into()),
                Token::NotMatch,
                Token::String("b".into()),
                Token::Ne,
                Token::Int(1)
            ]
        );
    }

    #[test]
    fn test_errors() {
        for src in [
            r#""unterminated"#,
            r#""\(x)""#,
            "\"\"\"\nmulti\n\"\"\"",
            "a: 1 / 2",
            "a: 1 == 1",
            "a: ~",
            "a: 99999999999999999999",
        ] {
            assert!(tokenize(src).is_err(), "{src}");
        }
        let err = tokenize("a: 1\nb: @").unwrap_err();
        assert!(err.to_string().starts_with("2:4:"), "{err}");
    }
}
