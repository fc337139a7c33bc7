//! Parsed rule representation and the recursive-descent parser.
//!
//! Fields and builtins are resolved while parsing, against the scope the
//! rule is compiled for, so an unknown name never reaches evaluation.

use regex::Regex;

use super::builtins::{Arity, Builtin};
use super::lexer::{Spanned, Token};
use super::{RuleScope, SyntaxError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    ExporterName,
    ExporterIp,
    InterfaceIndex,
    InterfaceName,
    InterfaceDescription,
    InterfaceSpeed,
    InterfaceVlan,
}

impl Field {
    fn resolve(object: &str, member: &str, scope: RuleScope) -> Option<Self> {
        let field = match (object, member) {
            ("Exporter", "Name") => Self::ExporterName,
            ("Exporter", "IP") => Self::ExporterIp,
            ("Interface", "Index") => Self::InterfaceIndex,
            ("Interface", "Name") => Self::InterfaceName,
            ("Interface", "Description") => Self::InterfaceDescription,
            ("Interface", "Speed") => Self::InterfaceSpeed,
            ("Interface", "VLAN") => Self::InterfaceVlan,
            _ => return None,
        };
        match (field.is_interface(), scope) {
            (true, RuleScope::Exporter) => None,
            _ => Some(field),
        }
    }

    pub(crate) fn is_interface(self) -> bool {
        !matches!(self, Self::ExporterName | Self::ExporterIp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    StartsWith,
    EndsWith,
    Contains,
}

impl CmpOp {
    pub(crate) fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
            Self::Contains => "contains",
        }
    }
}

/// Regex operand: compiled up front when written as a literal.
#[derive(Debug, Clone)]
pub(crate) enum Pattern {
    Compiled(Regex),
    Dynamic(Box<Expr>),
}

#[derive(Debug, Clone)]
pub(crate) enum Expr {
    Str(String),
    Int(i64),
    Bool(bool),
    Field(Field),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
    Matches(Box<Expr>, Pattern),
    Call(Call),
}

#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub builtin: Builtin,
    pub args: Vec<Expr>,
    /// Pattern argument of `Classify*Regex`, when it is a literal
    pub regex: Option<Regex>,
}

/// Deepest expression tree a rule may produce. Parsing and evaluation both
/// recurse once per level.
pub(crate) const MAX_NESTING: usize = 128;

pub(crate) fn parse(tokens: &[Spanned], scope: RuleScope, len: usize) -> Result<Expr, SyntaxError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        scope,
        end: len,
        depth: 0,
    };
    if tokens.is_empty() {
        return Err(SyntaxError::new(0, "empty rule"));
    }
    let expr = parser.or()?;
    if let Some(extra) = parser.peek() {
        return Err(SyntaxError::new(
            extra.offset,
            format!("unexpected {}", describe(&extra.token)),
        ));
    }
    Ok(expr)
}

struct Parser<'t> {
    tokens: &'t [Spanned],
    pos: usize,
    scope: RuleScope,
    /// Offset reported for errors at end of input
    end: usize,
    /// Tree depth of the node being parsed
    depth: usize,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> Option<&'t Spanned> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'t Spanned> {
        let spanned = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(spanned)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek().is_some_and(|s| s.token == *token) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn expect(&mut self, token: &Token) -> Result<(), SyntaxError> {
        match self.next() {
            Some(s) if s.token == *token => Ok(()),
            Some(s) => Err(SyntaxError::new(
                s.offset,
                format!("expected {}, found {}", describe(token), describe(&s.token)),
            )),
            None => Err(SyntaxError::new(
                self.end,
                format!("expected {}, found end of rule", describe(token)),
            )),
        }
    }

    fn offset(&self) -> usize {
        self.peek().map_or(self.end, |s| s.offset)
    }

    /// Move `levels` below `base`, failing past [`MAX_NESTING`].
    fn nest(&mut self, base: usize, levels: usize) -> Result<(), SyntaxError> {
        self.depth = base + levels;
        if self.depth > MAX_NESTING {
            return Err(SyntaxError::new(
                self.offset(),
                format!("rule nested deeper than {MAX_NESTING} levels"),
            ));
        }
        Ok(())
    }

    fn or(&mut self) -> Result<Expr, SyntaxError> {
        let base = self.depth;
        let mut left = self.and()?;
        let mut chain = 0;
        while self.eat(&Token::Or) {
            chain += 1;
            self.nest(base, chain)?;
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    // A chain of n operators is a left-nested tree n levels deep.
    fn and(&mut self) -> Result<Expr, SyntaxError> {
        let base = self.depth;
        let mut left = self.comparison()?;
        let mut chain = 0;
        while self.eat(&Token::And) {
            chain += 1;
            self.nest(base, chain)?;
            let right = self.comparison()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Expr, SyntaxError> {
        let left = self.unary()?;
        let Some(spanned) = self.peek() else {
            return Ok(left);
        };
        let op = match &spanned.token {
            Token::Eq => CmpOp::Eq,
            Token::Ne => CmpOp::Ne,
            Token::Lt => CmpOp::Lt,
            Token::Le => CmpOp::Le,
            Token::Gt => CmpOp::Gt,
            Token::Ge => CmpOp::Ge,
            Token::Ident(word) => match word.as_str() {
                "startsWith" => CmpOp::StartsWith,
                "endsWith" => CmpOp::EndsWith,
                "contains" => CmpOp::Contains,
                "matches" => {
                    self.pos += 1;
                    let right = self.unary()?;
                    let pattern = literal_pattern(&right, spanned.offset)?
                        .map_or_else(|| Pattern::Dynamic(Box::new(right)), Pattern::Compiled);
                    return Ok(Expr::Matches(Box::new(left), pattern));
                }
                _ => return Ok(left),
            },
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.unary()?;
        Ok(Expr::Compare(op, Box::new(left), Box::new(right)))
    }

    fn unary(&mut self) -> Result<Expr, SyntaxError> {
        let base = self.depth;
        self.nest(base, 1)?;
        let expr = if self.eat(&Token::Not) {
            Expr::Not(Box::new(self.unary()?))
        } else {
            self.primary()?
        };
        self.depth = base;
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, SyntaxError> {
        let Some(spanned) = self.next() else {
            return Err(SyntaxError::new(self.end, "unexpected end of rule"));
        };
        match &spanned.token {
            Token::Str(s) => Ok(Expr::Str(s.clone())),
            Token::Int(i) => Ok(Expr::Int(*i)),
            Token::LParen => {
                let inner = self.or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(word) if word == "true" => Ok(Expr::Bool(true)),
            Token::Ident(word) if word == "false" => Ok(Expr::Bool(false)),
            Token::Ident(name) => {
                if self.eat(&Token::Dot) {
                    self.field(name, spanned.offset)
                } else if self.eat(&Token::LParen) {
                    self.call(name, spanned.offset)
                } else {
                    Err(SyntaxError::new(
                        spanned.offset,
                        format!("unknown name {name}"),
                    ))
                }
            }
            other => Err(SyntaxError::new(
                spanned.offset,
                format!("unexpected {}", describe(other)),
            )),
        }
    }

    fn field(&mut self, object: &str, offset: usize) -> Result<Expr, SyntaxError> {
        let member = match self.next() {
            Some(Spanned {
                token: Token::Ident(member),
                ..
            }) => member,
            _ => {
                return Err(SyntaxError::new(
                    offset,
                    format!("expected field name after {object}."),
                ));
            }
        };
        Field::resolve(object, member, self.scope)
            .map(Expr::Field)
            .ok_or_else(|| {
                SyntaxError::new(
                    offset,
                    format!("unknown field {object}.{member} in {} rules", self.scope),
                )
            })
    }

    fn call(&mut self, name: &str, offset: usize) -> Result<Expr, SyntaxError> {
        let builtin = Builtin::resolve(name, self.scope).ok_or_else(|| {
            SyntaxError::new(
                offset,
                format!("unknown function {name} in {} rules", self.scope),
            )
        })?;

        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.or()?);
                if self.eat(&Token::Comma) {
                    continue;
                }
                self.expect(&Token::RParen)?;
                break;
            }
        }

        let arity_ok = match builtin.arity() {
            Arity::Exact(n) => args.len() == n,
            Arity::AtLeast(n) => args.len() >= n,
        };
        if !arity_ok {
            return Err(SyntaxError::new(
                offset,
                format!(
                    "{name} expects {} argument(s), got {}",
                    builtin.arity(),
                    args.len()
                ),
            ));
        }

        let regex = match builtin {
            Builtin::ClassifyRegex(_) => literal_pattern(&args[1], offset)?,
            _ => None,
        };
        Ok(Expr::Call(Call {
            builtin,
            args,
            regex,
        }))
    }
}

fn literal_pattern(expr: &Expr, offset: usize) -> Result<Option<Regex>, SyntaxError> {
    match expr {
        Expr::Str(pattern) => Regex::new(pattern)
            .map(Some)
            .map_err(|e| SyntaxError::new(offset, format!("invalid regex {pattern:?}: {e}"))),
        _ => Ok(None),
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Ident(name) => format!("identifier {name}"),
        Token::Str(s) => format!("string {s:?}"),
        Token::Int(i) => format!("integer {i}"),
        Token::LParen => "'('".to_owned(),
        Token::RParen => "')'".to_owned(),
        Token::Comma => "','".to_owned(),
        Token::Dot => "'.'".to_owned(),
        Token::And => "'&&'".to_owned(),
        Token::Or => "'||'".to_owned(),
        Token::Not => "'!'".to_owned(),
        Token::Eq => "'=='".to_owned(),
        Token::Ne => "'!='".to_owned(),
        Token::Lt => "'<'".to_owned(),
        Token::Le => "'<='".to_owned(),
        Token::Gt => "'>'".to_owned(),
        Token::Ge => "'>='".to_owned(),
    }
}
