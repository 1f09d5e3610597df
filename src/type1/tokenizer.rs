//! A tokenizer for the PostScript subset found in Type1 font programs.

use std::borrow::Cow;
use std::fmt;

use crate::error::ParseError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Kind {
    Integer,
    Float,
    /// A literal name, `/Name`. The value does not include the slash.
    Name,
    /// An executable name or operator.
    Other,
    String,
    HexString,
    /// Binary data introduced by `n RD` or `n -|`.
    CharString,
    StartProc,
    EndProc,
    StartArray,
    EndArray,
    StartDic,
    EndDic,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: Kind,
    pub value: Cow<'a, [u8]>,
}

impl<'a> Token<'a> {
    fn borrowed(kind: Kind, value: &'a [u8]) -> Self {
        Token {
            kind,
            value: Cow::Borrowed(value),
        }
    }

    pub fn is_other(&self, name: &str) -> bool {
        self.kind == Kind::Other && self.value.as_ref() == name.as_bytes()
    }

    pub fn is(&self, kind: Kind, name: &str) -> bool {
        self.kind == kind && self.value.as_ref() == name.as_bytes()
    }

    pub fn int(&self) -> Option<i32> {
        match self.kind {
            Kind::Integer => parse_integer(&self.value),
            Kind::Float => self.float().map(|f| f as i32),
            _ => None,
        }
    }

    pub fn float(&self) -> Option<f64> {
        match self.kind {
            Kind::Integer => parse_integer(&self.value).map(f64::from),
            Kind::Float => std::str::from_utf8(&self.value).ok()?.parse().ok(),
            _ => None,
        }
    }
}

pub fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

pub fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Parse a decimal or radix (`16#FF`) integer.
fn parse_integer(value: &[u8]) -> Option<i32> {
    let text = std::str::from_utf8(value).ok()?;
    match text.split_once('#') {
        Some((radix, digits)) => {
            let radix = radix.parse::<u32>().ok()?;
            if !(2..=36).contains(&radix) {
                return None;
            }
            u32::from_str_radix(digits, radix).ok().map(|v| v as i32)
        }
        None => text.parse().ok(),
    }
}

fn number_kind(value: &[u8]) -> Option<Kind> {
    if parse_integer(value).is_some() {
        return Some(Kind::Integer);
    }
    let text = std::str::from_utf8(value).ok()?;
    let looks_numeric = text
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'))
        && text.bytes().any(|b| b.is_ascii_digit());
    if looks_numeric && text.parse::<f64>().is_ok() {
        Some(Kind::Float)
    } else {
        None
    }
}

#[derive(Clone)]
pub struct Tokenizer<'a> {
    data: &'a [u8],
    pos: usize,
    /// Length announced by the last integer, consumed by a following `RD`.
    last_integer: Option<i32>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Tokenizer {
            data,
            pos: 0,
            last_integer: None,
        }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Return the next token without consuming it. Errors and the end of input both give
    /// `None`.
    pub fn peek(&self) -> Option<Token<'a>> {
        self.clone().next_token().ok().flatten()
    }

    pub fn next_token(&mut self) -> Result<Option<Token<'a>>, ParseError> {
        self.skip_whitespace_and_comments();
        let b = match self.data.get(self.pos) {
            Some(&b) => b,
            None => return Ok(None),
        };
        let start = self.pos;
        self.pos += 1;
        let token = match b {
            b'(' => self.read_string()?,
            b'<' if self.data.get(self.pos) == Some(&b'<') => {
                self.pos += 1;
                Token::borrowed(Kind::StartDic, &self.data[start..self.pos])
            }
            b'<' => self.read_hex_string()?,
            b'>' if self.data.get(self.pos) == Some(&b'>') => {
                self.pos += 1;
                Token::borrowed(Kind::EndDic, &self.data[start..self.pos])
            }
            b'[' => Token::borrowed(Kind::StartArray, &self.data[start..self.pos]),
            b']' => Token::borrowed(Kind::EndArray, &self.data[start..self.pos]),
            b'{' => Token::borrowed(Kind::StartProc, &self.data[start..self.pos]),
            b'}' => Token::borrowed(Kind::EndProc, &self.data[start..self.pos]),
            b'/' => {
                // immediately evaluated names, `//name`, are read as plain names
                if self.data.get(self.pos) == Some(&b'/') {
                    self.pos += 1;
                }
                let name_start = self.pos;
                self.skip_regular();
                Token::borrowed(Kind::Name, &self.data[name_start..self.pos])
            }
            _ if is_regular(b) => {
                self.skip_regular();
                let value = &self.data[start..self.pos];
                match number_kind(value) {
                    Some(kind) => Token::borrowed(kind, value),
                    None if value == b"RD" || value == b"-|" => {
                        match self.last_integer.take() {
                            Some(len) => return self.read_charstring(len).map(Some),
                            None => Token::borrowed(Kind::Other, value),
                        }
                    }
                    None => Token::borrowed(Kind::Other, value),
                }
            }
            _ => return Err(ParseError::BadValue),
        };
        self.last_integer = match token.kind {
            Kind::Integer => token.int(),
            _ => None,
        };
        Ok(Some(token))
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(&b) = self.data.get(self.pos) {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while let Some(&b) = self.data.get(self.pos) {
                    if b == b'\n' || b == b'\r' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn skip_regular(&mut self) {
        while self.data.get(self.pos).copied().map_or(false, is_regular) {
            self.pos += 1;
        }
    }

    fn read_charstring(&mut self, len: i32) -> Result<Token<'a>, ParseError> {
        let len = usize::try_from(len)?;
        // a single space separates RD from the binary data
        let start = self.pos + 1;
        let end = start.checked_add(len).ok_or(ParseError::BadValue)?;
        let value = self.data.get(start..end).ok_or(ParseError::BadEof)?;
        self.pos = end;
        self.last_integer = None;
        Ok(Token::borrowed(Kind::CharString, value))
    }

    fn read_string(&mut self) -> Result<Token<'a>, ParseError> {
        let mut out = Vec::new();
        let mut depth = 1;
        loop {
            let b = *self.data.get(self.pos).ok_or(ParseError::BadEof)?;
            self.pos += 1;
            match b {
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    out.push(b);
                }
                b'\\' => {
                    let escaped = *self.data.get(self.pos).ok_or(ParseError::BadEof)?;
                    self.pos += 1;
                    match escaped {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0C),
                        b'\r' => {
                            if self.data.get(self.pos) == Some(&b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'\n' => {}
                        b'0'..=b'7' => {
                            let mut code = u32::from(escaped - b'0');
                            for _ in 0..2 {
                                match self.data.get(self.pos) {
                                    Some(&d @ b'0'..=b'7') => {
                                        code = code * 8 + u32::from(d - b'0');
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            out.push(code as u8);
                        }
                        other => out.push(other),
                    }
                }
                _ => out.push(b),
            }
        }
        Ok(Token {
            kind: Kind::String,
            value: Cow::Owned(out),
        })
    }

    fn read_hex_string(&mut self) -> Result<Token<'a>, ParseError> {
        let mut digits = Vec::new();
        loop {
            let b = *self.data.get(self.pos).ok_or(ParseError::BadEof)?;
            self.pos += 1;
            if b == b'>' {
                break;
            }
            if let Some(d) = hex_value(b) {
                digits.push(d);
            } else if !is_whitespace(b) {
                return Err(ParseError::BadValue);
            }
        }
        // an odd final digit is followed by an implicit zero
        let value = digits
            .chunks(2)
            .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
            .collect();
        Ok(Token {
            kind: Kind::HexString,
            value: Cow::Owned(value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(data: &[u8]) -> Vec<(Kind, Vec<u8>)> {
        let mut tokenizer = Tokenizer::new(data);
        let mut tokens = Vec::new();
        while let Some(token) = tokenizer.next_token().unwrap() {
            tokens.push((token.kind, token.value.into_owned()));
        }
        tokens
    }

    #[test]
    fn simple_tokens() {
        let tokens = kinds(b"/FontName /Foo def % comment\n12 dict [1 2.5] {pop} <<>>");
        let expected: Vec<(Kind, &[u8])> = vec![
            (Kind::Name, b"FontName"),
            (Kind::Name, b"Foo"),
            (Kind::Other, b"def"),
            (Kind::Integer, b"12"),
            (Kind::Other, b"dict"),
            (Kind::StartArray, b"["),
            (Kind::Integer, b"1"),
            (Kind::Float, b"2.5"),
            (Kind::EndArray, b"]"),
            (Kind::StartProc, b"{"),
            (Kind::Other, b"pop"),
            (Kind::EndProc, b"}"),
            (Kind::StartDic, b"<<"),
            (Kind::EndDic, b">>"),
        ];
        let expected: Vec<(Kind, Vec<u8>)> =
            expected.into_iter().map(|(k, v)| (k, v.to_vec())).collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn strings() {
        let tokens = kinds(b"(a (nested) \\(x\\) \\101) <48 65 6c6>");
        assert_eq!(
            tokens,
            vec![
                (Kind::String, b"a (nested) (x) A".to_vec()),
                (Kind::HexString, b"Hel`".to_vec()),
            ]
        );
    }

    #[test]
    fn charstring() {
        let tokens = kinds(b"dup 0 3 RD \x01\x02\x03 NP /a 2 -| ab ND");
        assert_eq!(tokens[3], (Kind::CharString, vec![1, 2, 3]));
        assert_eq!(tokens[4], (Kind::Other, b"NP".to_vec()));
        assert_eq!(tokens[7], (Kind::CharString, b"ab".to_vec()));
    }

    #[test]
    fn numbers() {
        let mut tokenizer = Tokenizer::new(b"-12 16#ff 1e3 .5 -.001 abc");
        let values: Vec<_> = std::iter::from_fn(|| tokenizer.next_token().unwrap())
            .map(|token| (token.kind, token.float()))
            .collect();
        assert_eq!(
            values,
            vec![
                (Kind::Integer, Some(-12.0)),
                (Kind::Integer, Some(255.0)),
                (Kind::Float, Some(1000.0)),
                (Kind::Float, Some(0.5)),
                (Kind::Float, Some(-0.001)),
                (Kind::Other, None),
            ]
        );
    }

    #[test]
    fn peek_does_not_consume() {
        let mut tokenizer = Tokenizer::new(b"begin end");
        assert!(tokenizer.peek().unwrap().is_other("begin"));
        assert!(tokenizer.next_token().unwrap().unwrap().is_other("begin"));
        assert!(tokenizer.peek().unwrap().is_other("end"));
    }
}
