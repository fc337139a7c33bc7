//! Tokenizer for classifier rules.

use std::iter::Peekable;
use std::str::CharIndices;

use super::SyntaxError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    LParen,
    RParen,
    Comma,
    Dot,
    And,
    Or,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Spanned {
    pub token: Token,
    /// Byte offset of the first character
    pub offset: usize,
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Spanned>, SyntaxError> {
    let mut lexer = Lexer {
        chars: src.char_indices().peekable(),
        src,
    };
    let mut tokens = Vec::new();
    while let Some(spanned) = lexer.next_token()? {
        tokens.push(spanned);
    }
    Ok(tokens)
}

struct Lexer<'a> {
    chars: Peekable<CharIndices<'a>>,
    src: &'a str,
}

impl Lexer<'_> {
    fn next_token(&mut self) -> Result<Option<Spanned>, SyntaxError> {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}

        let Some((offset, c)) = self.chars.next() else {
            return Ok(None);
        };

        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            '.' => Token::Dot,
            '&' => self.expect_second('&', offset, Token::And)?,
            '|' => self.expect_second('|', offset, Token::Or)?,
            '=' => self.expect_second('=', offset, Token::Eq)?,
            '!' => self.with_equal(Token::Ne, Token::Not),
            '<' => self.with_equal(Token::Le, Token::Lt),
            '>' => self.with_equal(Token::Ge, Token::Gt),
            '"' | '\'' => Token::Str(self.quoted(c, offset)?),
            '`' => Token::Str(self.raw(offset)?),
            c if c.is_ascii_digit() => self.integer(offset)?,
            c if c.is_alphabetic() || c == '_' => self.word(offset),
            other => {
                return Err(SyntaxError::new(
                    offset,
                    format!("unexpected character {other:?}"),
                ));
            }
        };
        Ok(Some(Spanned { token, offset }))
    }

    fn expect_second(
        &mut self,
        second: char,
        offset: usize,
        token: Token,
    ) -> Result<Token, SyntaxError> {
        if self.chars.next_if(|(_, c)| *c == second).is_some() {
            Ok(token)
        } else {
            Err(SyntaxError::new(
                offset,
                format!("expected {second:?} after {second:?}"),
            ))
        }
    }

    fn with_equal(&mut self, with: Token, without: Token) -> Token {
        if self.chars.next_if(|(_, c)| *c == '=').is_some() {
            with
        } else {
            without
        }
    }

    fn quoted(&mut self, quote: char, offset: usize) -> Result<String, SyntaxError> {
        let mut out = String::new();
        loop {
            let Some((pos, c)) = self.chars.next() else {
                return Err(SyntaxError::new(offset, "unterminated string"));
            };
            match c {
                c if c == quote => return Ok(out),
                '\\' => {
                    let Some((_, escaped)) = self.chars.next() else {
                        return Err(SyntaxError::new(offset, "unterminated string"));
                    };
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '\\' | '"' | '\'' => escaped,
                        other => {
                            return Err(SyntaxError::new(
                                pos,
                                format!("unknown escape sequence \\{other}"),
                            ));
                        }
                    });
                }
                c => out.push(c),
            }
        }
    }

    fn raw(&mut self, offset: usize) -> Result<String, SyntaxError> {
        let start = offset + 1;
        for (pos, c) in self.chars.by_ref() {
            if c == '`' {
                return Ok(self.src[start..pos].to_owned());
            }
        }
        Err(SyntaxError::new(offset, "unterminated raw string"))
    }

    fn integer(&mut self, offset: usize) -> Result<Token, SyntaxError> {
        let mut end = offset + 1;
        while let Some((pos, c)) = self.chars.next_if(|(_, c)| c.is_ascii_digit() || *c == '_') {
            end = pos + c.len_utf8();
        }
        let digits: String = self.src[offset..end].chars().filter(|c| *c != '_').collect();
        digits
            .parse::<i64>()
            .map(Token::Int)
            .map_err(|e| SyntaxError::new(offset, format!("invalid integer: {e}")))
    }

    fn word(&mut self, offset: usize) -> Token {
        let mut end = offset + 1;
        while let Some((pos, c)) = self
            .chars
            .next_if(|(_, c)| c.is_alphanumeric() || *c == '_')
        {
            end = pos + c.len_utf8();
        }
        match &self.src[offset..end] {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            word => Token::Ident(word.to_owned()),
        }
    }
}
