//! Cursor primitives shared by every block grammar. A `Cursor` walks a
//! borrowed span of the stripped source; every token it hands out is a view
//! into that same buffer, so the stripped text must outlive all parsing.
//!
//! Types:
//!
//! - `Cursor` tracks an offset into a block and exposes the scanning
//!   operations (`eat`, `identifier`, `line`, `expression`, `number`).
//! - `Blanks` selects whether leading-whitespace skipping may cross newlines.
//! - `Token` is the three-way identifier result resolvers use to tell a
//!   finished line or block apart from malformed input.
//! - `Numeric` describes the literal shapes `Cursor::number` accepts.
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blanks {
    /// Spaces, tabs and carriage returns only; stops at `\n`.
    Inline,
    /// Any whitespace, newlines included.
    AcrossLines,
}

impl Blanks {
    fn is_blank(self, byte: u8) -> bool {
        match self {
            Self::Inline => matches!(byte, b' ' | b'\t' | b'\r'),
            Self::AcrossLines => byte.is_ascii_whitespace() || byte == 0x0b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Ident(&'a str),
    /// Input remains but does not start with an identifier.
    Malformed,
    /// Nothing left: end of input, or end of line when scanning `Inline`.
    End,
}

#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    pub fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    pub fn skip_blanks(&mut self, blanks: Blanks) {
        let skipped = self
            .rest()
            .bytes()
            .take_while(|byte| blanks.is_blank(*byte))
            .count();
        self.pos += skipped;
    }

    /// Consumes `literal` if it follows the skipped blanks.
    pub fn eat(&mut self, literal: &str, blanks: Blanks) -> bool {
        self.skip_blanks(blanks);
        if self.rest().starts_with(literal) {
            self.pos += literal.len();
            true
        } else {
            false
        }
    }

    pub fn identifier(&mut self, blanks: Blanks) -> Token<'a> {
        self.skip_blanks(blanks);
        let rest = self.rest();
        let Some(&first) = rest.as_bytes().first() else {
            return Token::End;
        };

        if first.is_ascii_alphabetic() || first == b'_' {
            let len = rest
                .bytes()
                .take_while(|byte| byte.is_ascii_alphanumeric() || *byte == b'_')
                .count();
            self.pos += len;
            return Token::Ident(&rest[..len]);
        }

        if blanks == Blanks::Inline && first == b'\n' {
            Token::End
        } else {
            Token::Malformed
        }
    }

    /// True when only blanks remain on the current line.
    pub fn at_line_end(&mut self) -> bool {
        self.identifier(Blanks::Inline) == Token::End
    }

    /// True when only whitespace remains in the span.
    pub fn at_end(&mut self) -> bool {
        self.identifier(Blanks::AcrossLines) == Token::End
    }

    /// Takes the trimmed remainder of the current line, consuming its newline.
    pub fn line(&mut self) -> Option<&'a str> {
        self.skip_blanks(Blanks::Inline);
        let rest = self.rest();
        let (line, consumed) = match rest.find('\n') {
            Some(pos) => (&rest[..pos], pos + 1),
            None => (rest, rest.len()),
        };

        let value = line.trim();
        if value.is_empty() {
            return None;
        }
        self.pos += consumed;
        Some(value)
    }

    /// Like [`Cursor::line`] but drops every whitespace character, so
    /// `a + b , c` reads as `a+b,c`.
    pub fn expression(&mut self) -> Option<String> {
        self.skip_blanks(Blanks::Inline);
        let rest = self.rest();
        let consumed = rest.find('\n').map_or(rest.len(), |pos| pos + 1);

        let expr: String = rest[..consumed]
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if expr.is_empty() {
            return None;
        }
        self.pos += consumed;
        Some(expr)
    }

    /// Parses a leading numeric literal of type `T`.
    pub fn number<T: Numeric>(&mut self) -> Option<T> {
        self.skip_blanks(Blanks::Inline);
        let rest = self.rest();
        let len = numeric_prefix(rest, T::SIGNED, T::FRACTIONAL);
        if len == 0 {
            return None;
        }
        let value: T = rest[..len].parse().ok()?;
        if !value.is_finite() {
            return None;
        }
        self.pos += len;
        Some(value)
    }
}

/// Literal shapes accepted by [`Cursor::number`].
pub trait Numeric: FromStr + Copy {
    const SIGNED: bool;
    const FRACTIONAL: bool;

    /// Out-of-range literals overflow to infinity and are rejected.
    fn is_finite(self) -> bool {
        true
    }
}

impl Numeric for u32 {
    const SIGNED: bool = false;
    const FRACTIONAL: bool = false;
}

impl Numeric for i32 {
    const SIGNED: bool = true;
    const FRACTIONAL: bool = false;
}

impl Numeric for f32 {
    const SIGNED: bool = true;
    const FRACTIONAL: bool = true;

    fn is_finite(self) -> bool {
        f32::is_finite(self)
    }
}

/// Parses a complete string as `T`, allowing surrounding blanks.
pub fn parse_number<T: Numeric>(text: &str) -> Option<T> {
    let mut cursor = Cursor::new(text);
    let value = cursor.number()?;
    cursor.at_end().then_some(value)
}

fn numeric_prefix(text: &str, signed: bool, fractional: bool) -> usize {
    let bytes = text.as_bytes();
    let digits_from = |start: usize| {
        bytes[start.min(bytes.len())..]
            .iter()
            .take_while(|byte| byte.is_ascii_digit())
            .count()
    };

    let mut end = usize::from(signed && bytes.first() == Some(&b'-'));
    let integer = digits_from(end);
    end += integer;
    let mut mantissa = integer;

    if fractional && bytes.get(end) == Some(&b'.') {
        let fraction = digits_from(end + 1);
        if integer + fraction > 0 {
            end += 1 + fraction;
            mantissa += fraction;
        }
    }

    if mantissa == 0 {
        return 0;
    }

    if fractional && matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let digits = digits_from(exp);
        if digits > 0 {
            end = exp + digits;
        }
    }

    end
}
