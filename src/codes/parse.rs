//! Minimal line decoder used by [`CodeFile`](crate::CodeFile).
//!
//! Understands one code per line: a `G`/`M`/`T` letter with an optional
//! `major[.minor]` number, whitespace-separated letter parameters, quoted
//! strings with `""` escapes, and `;` comments. Meta commands and expressions
//! are not interpreted.

use std::iter::Peekable;
use std::str::Chars;

use super::code::{Code, CodeChannel, CodeKind, CodeParameter};

/// Decodes `line` into a code. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str, channel: CodeChannel) -> Result<Option<Code>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    if let Some(comment) = line.strip_prefix(';') {
        let mut code = Code::new(channel, CodeKind::Comment, None);
        code.comment = Some(comment.to_string());
        return Ok(Some(code));
    }

    let mut chars = line.chars().peekable();
    let kind = match chars.next().map(|c| c.to_ascii_uppercase()) {
        Some('G') => CodeKind::GCode,
        Some('M') => CodeKind::MCode,
        Some('T') => CodeKind::TCode,
        Some(other) => return Err(format!("Invalid code letter '{other}'")),
        None => return Ok(None),
    };

    let number = take_value(&mut chars);
    let (major, minor) = parse_number(&number)?;
    if major.is_none() && kind != CodeKind::TCode {
        return Err(format!("Missing number after '{}'", kind.letter().unwrap_or('?')));
    }

    let mut code = Code::new(channel, kind, major);
    code.minor = minor;

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == ';' {
            chars.next();
            code.comment = Some(chars.by_ref().collect());
        } else if c.is_ascii_alphabetic() {
            chars.next();
            if chars.peek() == Some(&'"') {
                chars.next();
                let value = take_string(&mut chars)?;
                code.parameters.push(CodeParameter::string(c, value));
            } else {
                let value = take_value(&mut chars);
                code.parameters.push(CodeParameter::new(c, value));
            }
        } else {
            return Err(format!("Unexpected character '{c}'"));
        }
    }

    Ok(Some(code))
}

/// Reads an unquoted token up to whitespace or a comment.
fn take_value(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut out = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() || c == ';' {
            break;
        }
        out.push(c);
        chars.next();
    }
    out
}

/// Reads a quoted string body; the opening quote is already consumed.
fn take_string(chars: &mut Peekable<Chars<'_>>) -> Result<String, String> {
    let mut out = String::new();
    while let Some(c) = chars.next() {
        if c == '"' {
            if chars.peek() == Some(&'"') {
                chars.next();
                out.push('"');
            } else {
                return Ok(out);
            }
        } else {
            out.push(c);
        }
    }
    Err("Unterminated string".to_string())
}

fn parse_number(text: &str) -> Result<(Option<i32>, Option<i8>), String> {
    if text.is_empty() {
        return Ok((None, None));
    }
    let (major, minor) = match text.split_once('.') {
        Some((major, minor)) => (major, Some(minor)),
        None => (text, None),
    };
    let major = major
        .parse::<i32>()
        .map_err(|_| format!("Invalid major number '{major}'"))?;
    let minor = minor
        .map(|m| m.parse::<i8>().map_err(|_| format!("Invalid minor number '{m}'")))
        .transpose()?;
    Ok((Some(major), minor))
}
