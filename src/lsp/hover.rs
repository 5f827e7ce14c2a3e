//! Literal classification for hover.

use std::sync::OnceLock;

use regex::Regex;

fn literal_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"^-?(0[xX][0-9a-fA-F]+|0[cC][0-7]+|0[bB][01]+|[0-9]+)$", "i32"),
            (r"^-?[0-9]+(\.[0-9]+)?$", "dbl"),
            (r#"^"(\\.|[^"\\])*"$"#, "chr*"),
        ]
        .into_iter()
        .map(|(re, ty)| (Regex::new(re).expect("static regex"), ty))
        .collect()
    })
}

/// The type of `word` when it is a literal constant.
pub fn literal_type(word: &str) -> Option<&'static str> {
    literal_patterns()
        .iter()
        .find(|(re, _)| re.is_match(word))
        .map(|(_, ty)| *ty)
}

/// Strip a variable's `$` sigil, if present.
pub fn variable_name(word: &str) -> Option<&str> {
    word.strip_prefix('$').filter(|name| !name.is_empty())
}
