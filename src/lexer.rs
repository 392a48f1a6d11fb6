use crate::error::{AsmError, AsmErrorKind};
use crate::span::{Idx, Span};

/// Represents a single "word" inside a line of source code.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Token<'a> {
    pub val: &'a str,
    pub span: Span,
}

impl<'a> Token<'a> {
    fn new(val: &'a str, offs: usize) -> Self {
        Token {
            val,
            span: Span::new(Idx(offs), val.len()),
        }
    }
}

/// Non-empty source line with comments removed.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Line<'a> {
    /// Line number inside the file, counting from 1
    pub number: usize,
    /// Raw line without its line terminator
    pub text: &'a str,
    /// Code portion of the line, comment and surrounding whitespace removed
    pub span: Span,
    pub toks: Vec<Token<'a>>,
}

impl Line<'_> {
    /// Attach this line's position to an error raised while processing it.
    pub fn error(&self, kind: AsmErrorKind, span: Span) -> AsmError {
        AsmError {
            kind,
            line: self.number,
            text: self.text.to_owned(),
            span,
        }
    }
}

/// Test if a character separates tokens. Commas are treated the same as whitespace.
pub(crate) fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == ','
}

/// Split source into lines of tokens.
///
/// Blank and comment-only lines are dropped, but line numbers keep counting them.
pub fn lines(src: &str) -> Vec<Line<'_>> {
    let mut res = Vec::new();
    let mut offs = 0;
    for (i, raw) in src.split_inclusive('\n').enumerate() {
        let text = raw.trim_end_matches(['\n', '\r']);
        let code = match text.find(';') {
            Some(idx) => &text[..idx],
            None => text,
        };
        let toks = tokenize(code, offs);
        if let (Some(first), Some(last)) = (toks.first(), toks.last()) {
            let span = Span::new(first.span.start(), last.span.end() - first.span.offs());
            res.push(Line {
                number: i + 1,
                text,
                span,
                toks,
            });
        }
        offs += raw.len();
    }
    res
}

/// Split a single comment-free line into tokens, `base` being its offset in the source.
///
/// A bracketed address keeps any whitespace inside the brackets, so `[ label + 2 ]` stays one
/// token.
fn tokenize(code: &str, base: usize) -> Vec<Token<'_>> {
    let mut toks = Vec::new();
    let mut start: Option<usize> = None;
    let mut in_brackets = false;
    for (i, c) in code.char_indices() {
        match start {
            Some(s) if !in_brackets && is_separator(c) => {
                toks.push(Token::new(&code[s..i], base + s));
                start = None;
            }
            Some(_) => {}
            None if is_separator(c) => continue,
            None => start = Some(i),
        }
        match c {
            '[' => in_brackets = true,
            ']' => in_brackets = false,
            _ => {}
        }
    }
    if let Some(s) = start {
        toks.push(Token::new(code[s..].trim_end(), base + s));
    }
    toks
}

/// Parse an integer literal in decimal, or with a `0x`, `0o` or `0b` prefix.
///
/// A single leading `-` is allowed, and single `_` separators may sit between digits or
/// after the prefix. Decimal literals other than zero cannot start with `0`. Returns `None`
/// for anything else, including overflow.
pub fn parse_int(s: &str) -> Option<i64> {
    let (neg, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (radix, digits) = match body.get(..2) {
        Some("0x" | "0X") => (16, body[2..].strip_prefix('_').unwrap_or(&body[2..])),
        Some("0o" | "0O") => (8, body[2..].strip_prefix('_').unwrap_or(&body[2..])),
        Some("0b" | "0B") => (2, body[2..].strip_prefix('_').unwrap_or(&body[2..])),
        _ => (10, body),
    };
    // `from_str_radix` would otherwise accept a second sign
    if digits
        .split('_')
        .any(|group| group.is_empty() || !group.chars().all(|c| c.is_digit(radix)))
    {
        return None;
    }
    let digits = digits.replace('_', "");
    if radix == 10 && digits.starts_with('0') && digits.chars().any(|c| c != '0') {
        return None;
    }
    let val = i64::from_str_radix(&digits, radix).ok()?;
    Some(if neg { -val } else { val })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vals<'a>(line: &Line<'a>) -> Vec<&'a str> {
        line.toks.iter().map(|tok| tok.val).collect()
    }

    #[test]
    fn strips_comments_and_blanks() {
        let src = "; header\n\n  LDI R0, #5 ; load\n\tHLT\n";
        let lines = lines(src);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].number, 3);
        assert_eq!(vals(&lines[0]), vec!["LDI", "R0", "#5"]);
        assert_eq!(lines[1].number, 4);
        assert_eq!(vals(&lines[1]), vec!["HLT"]);
    }

    #[test]
    fn token_spans_point_into_source() {
        let src = "NOP\r\nST R1,[data]\n";
        let lines = lines(src);
        let tok = lines[1].toks[2];
        assert_eq!(tok.val, "[data]");
        assert_eq!(&src[tok.span.as_range()], "[data]");
        assert_eq!(lines[1].text, "ST R1,[data]");
    }

    #[test]
    fn brackets_group_whitespace() {
        let lines = lines("LD R0, [ table + 2 ]  ");
        assert_eq!(vals(&lines[0]), vec!["LD", "R0", "[ table + 2 ]"]);
    }

    #[test]
    fn line_span_covers_code_only() {
        let src = "  ADD R0, R1   ; sum";
        let lines = lines(src);
        assert_eq!(&src[lines[0].span.as_range()], "ADD R0, R1");
    }

    #[test]
    fn int_literals() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("0x1F"), Some(31));
        assert_eq!(parse_int("0X1f"), Some(31));
        assert_eq!(parse_int("0o17"), Some(15));
        assert_eq!(parse_int("0b101"), Some(5));
        assert_eq!(parse_int("-1"), Some(-1));
        assert_eq!(parse_int("--1"), None);
        assert_eq!(parse_int("-+1"), None);
        assert_eq!(parse_int("0x"), None);
        assert_eq!(parse_int("12a"), None);
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("label"), None);
    }

    #[test]
    fn int_separators_and_zeros() {
        assert_eq!(parse_int("1_000"), Some(1000));
        assert_eq!(parse_int("0x_FF"), Some(255));
        assert_eq!(parse_int("0b1010_0101"), Some(0xA5));
        assert_eq!(parse_int("000"), Some(0));
        assert_eq!(parse_int("012"), None);
        assert_eq!(parse_int("1__0"), None);
        assert_eq!(parse_int("_1"), None);
        assert_eq!(parse_int("1_"), None);
        assert_eq!(parse_int("0x__1"), None);
    }
}
