//! Call-site scanning for signature help.
//!
//! Walks the text backwards from the cursor to the unmatched `(` of the
//! enclosing call, counting top-level commas, then reads the callee name.

use lsp_types::Position;

/// Callee name and zero-based argument index at a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub callee: String,
    pub argument: u32,
}

/// Find the call the cursor at `pos` sits in, if any.
pub fn call_site(text: &str, pos: Position) -> Option<CallSite> {
    let before = text_before(text, pos);
    let mut iter = before.chars().rev();
    let argument = read_arguments(&mut iter)?;
    let callee = read_ident(&mut iter)?;
    Some(CallSite { callee, argument })
}

fn text_before(text: &str, pos: Position) -> String {
    let mut out = String::new();
    for (i, line) in text.lines().enumerate() {
        let i = i as u32;
        if i < pos.line {
            out.push_str(line);
            out.push('\n');
        } else {
            out.extend(line.chars().take(pos.character as usize));
            break;
        }
    }
    out
}

fn read_arguments(iter: &mut impl Iterator<Item = char>) -> Option<u32> {
    let mut parens = 0i32;
    let mut brackets = 0i32;
    let mut braces = 0i32;
    let mut commas = 0u32;

    while let Some(ch) = iter.next() {
        match ch {
            '(' => {
                parens -= 1;
                if parens < 0 {
                    return Some(commas);
                }
            }
            ')' => parens += 1,
            '[' => brackets -= 1,
            ']' => brackets += 1,
            '{' => braces -= 1,
            '}' => braces += 1,
            '"' | '\'' => {
                // skip to the opening quote
                for c in iter.by_ref() {
                    if c == ch {
                        break;
                    }
                }
            }
            ',' if parens == 0 && brackets == 0 && braces == 0 => commas += 1,
            _ => {}
        }
    }
    None
}

fn read_ident(iter: &mut impl Iterator<Item = char>) -> Option<String> {
    let mut ident = Vec::new();
    for ch in iter {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            ident.push(ch);
        } else if ident.is_empty() && ch.is_whitespace() {
            continue;
        } else {
            break;
        }
    }
    if ident.is_empty() {
        return None;
    }
    Some(ident.into_iter().rev().collect())
}
