// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Matter Labs

//! Recursive descent parser for the supported CUE subset

use super::{
    ast::{BoundOp, Decl, Expr, LabelKind, Presence},
    lexer::{tokenize, Spanned, Token},
    CompileError,
};

const MAX_NESTING: usize = 256;

static EOF: Token = Token::Eof;

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

/// Parse a CUE file into the declarations of its top-level struct
pub(crate) fn parse_file(src: &str) -> Result<Vec<Decl>, CompileError> {
    let mut parser = Parser {
        tokens: tokenize(src)?,
        pos: 0,
        depth: 0,
    };
    parser.skip_commas();
    parser.package_clause()?;
    let decls = parser.decls(&Token::Eof)?;
    parser.expect(&Token::Eof)?;
    Ok(decls)
}

impl Parser {
    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        // the token stream always ends with Eof
        self.tokens
            .get(self.pos + offset)
            .or_else(|| self.tokens.last())
            .map_or(&EOF, |t| &t.token)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, msg: impl std::fmt::Display) -> CompileError {
        match self.tokens.get(self.pos).or_else(|| self.tokens.last()) {
            Some(t) => CompileError::new(format!("{}:{}: {msg}", t.line, t.col)),
            None => CompileError::new(msg.to_string()),
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), CompileError> {
        if self.peek() == token {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected {token}, found {}", self.peek())))
        }
    }

    fn skip_commas(&mut self) {
        while self.peek() == &Token::Comma {
            self.advance();
        }
    }

    fn package_clause(&mut self) -> Result<(), CompileError> {
        if let (Token::Ident(kw), Token::Ident(_)) = (self.peek(), self.peek_at(1)) {
            if kw == "package" {
                self.advance();
                self.advance();
                self.skip_commas();
            }
        }
        if let Token::Ident(kw) = self.peek() {
            if kw == "import" && matches!(self.peek_at(1), Token::String(_) | Token::LParen) {
                return Err(self.error("imports are not supported"));
            }
        }
        Ok(())
    }

    fn decls(&mut self, end: &Token) -> Result<Vec<Decl>, CompileError> {
        let mut decls = Vec::new();
        loop {
            self.skip_commas();
            if self.peek() == end {
                break;
            }
            decls.push(self.decl()?);
            match self.peek() {
                Token::Comma => {
                    self.advance();
                }
                t if t == end => {}
                t => return Err(self.error(format!("expected ',' or newline, found {t}"))),
            }
        }
        Ok(decls)
    }

    /// Returns the label, its kind and presence if a field starts at `offset`
    fn label_at(&self, offset: usize) -> Option<(String, LabelKind, Presence, usize)> {
        let (label, kind) = match self.peek_at(offset) {
            Token::Ident(name) if name != "_" => (name.clone(), LabelKind::of_ident(name)),
            Token::String(name) => (name.clone(), LabelKind::Regular),
            _ => return None,
        };
        match (self.peek_at(offset + 1), self.peek_at(offset + 2)) {
            (Token::Colon, _) => Some((label, kind, Presence::Regular, 2)),
            (Token::Question, Token::Colon) => Some((label, kind, Presence::Optional, 3)),
            (Token::Bang, Token::Colon) => Some((label, kind, Presence::Required, 3)),
            _ => None,
        }
    }

    fn decl(&mut self) -> Result<Decl, CompileError> {
        if let (Token::Ident(kw), Token::Ident(name), Token::Assign) =
            (self.peek(), self.peek_at(1), self.peek_at(2))
        {
            if kw == "let" {
                let name = name.clone();
                self.pos += 3;
                let value = self.expr()?;
                return Ok(Decl::Let { name, value });
            }
        }

        if self.peek() == &Token::Ellipsis
            && matches!(self.peek_at(1), Token::Comma | Token::RBrace | Token::Eof)
        {
            self.advance();
            return Ok(Decl::Ellipsis);
        }

        if self.peek() == &Token::LBrack {
            let start = self.pos;
            match self.pattern() {
                Ok(Some(decl)) => return Ok(decl),
                _ => self.pos = start,
            }
        }

        if let Some((label, kind, presence, len)) = self.label_at(0) {
            self.pos += len;
            let value = self.field_value()?;
            return Ok(Decl::Field {
                label,
                kind,
                presence,
                value,
            });
        }

        Ok(Decl::Embed(self.expr()?))
    }

    fn pattern(&mut self) -> Result<Option<Decl>, CompileError> {
        self.expect(&Token::LBrack)?;
        let label = self.expr()?;
        self.expect(&Token::RBrack)?;
        if self.peek() != &Token::Colon {
            return Ok(None);
        }
        self.advance();
        let value = self.field_value()?;
        Ok(Some(Decl::Pattern { label, value }))
    }

    fn field_value(&mut self) -> Result<Expr, CompileError> {
        // `a: b: 1` is short for `a: {b: 1}`
        if self.label_at(0).is_some() {
            self.enter()?;
            let decl = self.decl();
            self.depth -= 1;
            return Ok(Expr::Struct(vec![decl?]));
        }
        self.expr()
    }

    fn enter(&mut self) -> Result<(), CompileError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("expression nested too deeply"));
        }
        self.depth += 1;
        Ok(())
    }

    fn expr(&mut self) -> Result<Expr, CompileError> {
        self.enter()?;
        let expr = self.disjunction();
        self.depth -= 1;
        expr
    }

    fn disjunction(&mut self) -> Result<Expr, CompileError> {
        let first = self.conjunction()?;
        if self.peek() != &Token::Or {
            return Ok(first);
        }
        let mut alts = vec![first];
        while self.peek() == &Token::Or {
            self.advance();
            alts.push(self.conjunction()?);
        }
        Ok(Expr::Or(alts))
    }

    fn conjunction(&mut self) -> Result<Expr, CompileError> {
        let first = self.unary()?;
        if self.peek() != &Token::And {
            return Ok(first);
        }
        let mut parts = vec![first];
        while self.peek() == &Token::And {
            self.advance();
            parts.push(self.unary()?);
        }
        Ok(Expr::And(parts))
    }

    fn unary(&mut self) -> Result<Expr, CompileError> {
        let op = match self.peek() {
            Token::Star => {
                self.advance();
                return Ok(Expr::Default(Box::new(self.nested_unary()?)));
            }
            Token::Minus => {
                self.advance();
                return Ok(Expr::Neg(Box::new(self.nested_unary()?)));
            }
            Token::Plus => {
                self.advance();
                return self.nested_unary();
            }
            Token::Bang => return Err(self.error("'!' operator is not supported")),
            Token::Lt => BoundOp::Lt,
            Token::Le => BoundOp::Le,
            Token::Gt => BoundOp::Gt,
            Token::Ge => BoundOp::Ge,
            Token::Ne => BoundOp::Ne,
            Token::Match => BoundOp::Match,
            Token::NotMatch => BoundOp::NotMatch,
            _ => return self.postfix(),
        };
        self.advance();
        Ok(Expr::Bound(op, Box::new(self.nested_unary()?)))
    }

    fn nested_unary(&mut self) -> Result<Expr, CompileError> {
        self.enter()?;
        let expr = self.unary();
        self.depth -= 1;
        expr
    }

    fn postfix(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.primary()?;
        loop {
            if self.peek() == &Token::Dot {
                self.advance();
                let (name, kind) = match self.advance() {
                    Token::Ident(name) => {
                        let kind = LabelKind::of_ident(&name);
                        (name, kind)
                    }
                    Token::String(name) => (name, LabelKind::Regular),
                    t => return Err(self.error(format!("expected selector, found {t}"))),
                };
                expr = Expr::Select(Box::new(expr), name, kind);
                continue;
            }
            if self.peek() == &Token::LParen {
                if let Expr::Ident(name) = &expr {
                    let name = name.clone();
                    self.advance();
                    let mut args = Vec::new();
                    while self.peek() != &Token::RParen {
                        args.push(self.expr()?);
                        if self.peek() == &Token::Comma {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                    self.expect(&Token::RParen)?;
                    expr = Expr::Call(name, args);
                    continue;
                }
            }
            return Ok(expr);
        }
    }

    fn primary(&mut self) -> Result<Expr, CompileError> {
        let expr = match self.peek().clone() {
            Token::Int(i) => Expr::Int(i),
            Token::Float(f) => Expr::Float(f),
            Token::String(s) => Expr::String(s),
            Token::Bytes(b) => Expr::Bytes(b),
            Token::Bottom => Expr::Bottom,
            Token::Ident(name) => match name.as_str() {
                "_" => Expr::Top,
                "null" => Expr::Null,
                "true" => Expr::Bool(true),
                "false" => Expr::Bool(false),
                _ => Expr::Ident(name),
            },
            Token::LBrace => {
                self.advance();
                let decls = self.decls(&Token::RBrace)?;
                self.expect(&Token::RBrace)?;
                return Ok(Expr::Struct(decls));
            }
            Token::LBrack => {
                self.advance();
                return self.list();
            }
            Token::LParen => {
                self.advance();
                let expr = self.expr()?;
                self.expect(&Token::RParen)?;
                return Ok(expr);
            }
            t => return Err(self.error(format!("unexpected {t}"))),
        };
        self.advance();
        Ok(expr)
    }

    fn list(&mut self) -> Result<Expr, CompileError> {
        let mut elems = Vec::new();
        let mut tail = None;
        loop {
            self.skip_commas();
            match self.peek() {
                Token::RBrack => break,
                Token::Ellipsis => {
                    self.advance();
                    let tail_expr = match self.peek() {
                        Token::RBrack | Token::Comma => Expr::Top,
                        _ => self.expr()?,
                    };
                    tail = Some(Box::new(tail_expr));
                    self.skip_commas();
                    break;
                }
                _ => {
                    elems.push(self.expr()?);
                    if self.peek() != &Token::Comma {
                        break;
                    }
                }
            }
        }
        self.expect(&Token::RBrack)?;
        Ok(Expr::List(elems, tail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(label: &str, value: Expr) -> Decl {
        Decl::Field {
            label: label.into(),
            kind: LabelKind::of_ident(label),
            presence: Presence::Regular,
            value,
        }
    }

    #[test]
    fn test_simple_fields() {
        let decls = parse_file("package policy\n\nvalue: int\nname?: string | *\"x\"\n").unwrap();
        assert_eq!(
            decls,
            vec![
                field("value", Expr::Ident("int".into())),
                Decl::Field {
                    label: "name".into(),
                    kind: LabelKind::Regular,
                    presence: Presence::Optional,
                    value: Expr::Or(vec![
                        Expr::Ident("string".into()),
                        Expr::Default(Box::new(Expr::String("x".into())))
                    ])
                }
            ]
        );
    }

    #[test]
    fn test_nested_label_shorthand() {
        let decls = parse_file("a: b: c: 1").unwrap();
        assert_eq!(
            decls,
            vec![field(
                "a",
                Expr::Struct(vec![field("b", Expr::Struct(vec![field("c", Expr::Int(1))]))])
            )]
        );
    }

    #[test]
    fn test_struct_decls() {
        let decls = parse_file(
            r#"
#Def: {
    "quoted-label"!: >=0 & <10
    [=~"^x-"]: string
    let l = -1
    _hidden: l
    ...
}
out: #Def.x
list: [1, 2, ...int]
"#,
        )
        .unwrap();
        assert_eq!(decls.len(), 3);
        let Decl::Field { value: Expr::Struct(inner), kind, .. } = &decls[0] else {
            panic!("expected struct: {decls:?}");
        };
        assert_eq!(*kind, LabelKind::Definition);
        assert_eq!(inner.len(), 5);
        assert!(matches!(
            &inner[0],
            Decl::Field { presence: Presence::Required, value: Expr::And(_), .. }
        ));
        assert!(matches!(&inner[1], Decl::Pattern { .. }));
        assert!(matches!(&inner[2], Decl::Let { value: Expr::Neg(_), .. }));
        assert!(matches!(&inner[3], Decl::Field { kind: LabelKind::Hidden, .. }));
        assert_eq!(inner[4], Decl::Ellipsis);
        assert_eq!(
            decls[1],
            field(
                "out",
                Expr::Select(
                    Box::new(Expr::Ident("#Def".into())),
                    "x".into(),
                    LabelKind::Regular
                )
            )
        );
        assert_eq!(
            decls[2],
            field(
                "list",
                Expr::List(
                    vec![Expr::Int(1), Expr::Int(2)],
                    Some(Box::new(Expr::Ident("int".into())))
                )
            )
        );
    }

    #[test]
    fn test_embedding_and_call() {
        let decls = parse_file("close({a: 1})\n[1, 2]").unwrap();
        assert!(matches!(&decls[0], Decl::Embed(Expr::Call(name, args)) if name == "close" && args.len() == 1));
        assert!(matches!(&decls[1], Decl::Embed(Expr::List(elems, None)) if elems.len() == 2));
    }

    #[test]
    fn test_errors() {
        for src in [
            "value: {",
            "a: 1 b: 2",
            "import \"time\"",
            "a: !true",
            "a: [1, 2",
            "a: (1",
            "a: b.1",
        ] {
            assert!(parse_file(src).is_err(), "{src}");
        }

        let deep = format!("a: {}1{}", "(".repeat(1000), ")".repeat(1000));
        let err = parse_file(&deep).unwrap_err();
        assert!(err.to_string().contains("nested too deeply"));
    }
}
