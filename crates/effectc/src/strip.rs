use std::borrow::Cow;

use crate::error::CompileError;

/// Marker that introduces every directive line (`//!PASS 1`, `//!VERSION 1`, ...).
pub const META_MARKER: &str = "//!";

/// Removes `//` line comments and `/* */` block comments in one left-to-right
/// pass.
///
/// Line comments collapse to a single newline so line structure survives;
/// `//!` directive lines are kept verbatim. A block comment closing at the very
/// end of the input truncates the output there.
pub fn strip_comments(source: &str) -> Result<String, CompileError> {
    let mut source = Cow::Borrowed(source);
    if !source.ends_with('\n') {
        source.to_mut().push('\n');
    }

    let bytes = source.as_bytes();
    let len = bytes.len();
    let mut out = String::with_capacity(len);
    let mut copied = 0;
    let mut i = 0;

    while i + 1 < len {
        if bytes[i] != b'/' {
            i += 1;
            continue;
        }

        match bytes[i + 1] {
            b'/' if bytes.get(i + 2) != Some(&b'!') => {
                out.push_str(&source[copied..i]);
                let newline = source[i + 2..].find('\n').map_or(len - 1, |pos| i + 2 + pos);
                out.push('\n');
                i = newline + 1;
                copied = i;
            }
            b'*' => {
                out.push_str(&source[copied..i]);
                let close = source[i + 2..]
                    .find("*/")
                    .ok_or(CompileError::UnterminatedComment)?;
                let end = i + 2 + close + 2;
                if end >= len - 1 {
                    return Ok(out);
                }
                i = end;
                copied = end;
            }
            _ => i += 1,
        }
    }

    out.push_str(&source[copied..]);
    Ok(out)
}
