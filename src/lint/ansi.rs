//! ANSI escape stripping for evi's stdout.

use std::sync::OnceLock;

use regex::Regex;

fn csi_regex() -> &'static Regex {
    static CSI: OnceLock<Regex> = OnceLock::new();
    // ESC [ parameter bytes, intermediate bytes, final byte
    CSI.get_or_init(|| Regex::new("\x1b\\[[0-?]*[ -/]*[@-~]").expect("static regex"))
}

/// Remove every CSI escape sequence (colors included) from `text`.
pub fn strip_ansi(text: &str) -> String {
    if !text.contains('\x1b') {
        return text.to_string();
    }
    csi_regex().replace_all(text, "").into_owned()
}
