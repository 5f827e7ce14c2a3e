//! `file://` URI conversion for lsp-types locations.

use std::path::{Path, PathBuf};

use lsp_types::Uri;

/// Convert a filesystem path to a `file://` URI. Relative paths are resolved
/// against the current directory first.
pub fn path_to_uri(path: &Path) -> Option<Uri> {
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    let mut path_str = abs.to_string_lossy().into_owned();
    if cfg!(windows) {
        path_str = path_str.replace('\\', "/");
        if !path_str.starts_with('/') {
            path_str.insert(0, '/');
        }
    }
    format!("file://{}", percent_encode(&path_str)).parse().ok()
}

/// Convert a `file://` URI back to a path. Other schemes yield `None`.
pub fn uri_to_path(uri: &Uri) -> Option<PathBuf> {
    let rest = uri.as_str().strip_prefix("file://")?;
    let rest = rest.strip_prefix("localhost").unwrap_or(rest);
    let mut path_str = percent_decode(rest)?;
    if cfg!(windows) {
        // `/C:/dir` -> `C:/dir`
        if path_str.starts_with('/') && path_str.get(2..3) == Some(":") {
            path_str.remove(0);
        }
        path_str = path_str.replace('/', "\\");
    }
    Some(PathBuf::from(path_str))
}

fn percent_encode(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for &b in path.as_bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                out.push(b as char)
            }
            b':' if cfg!(windows) => out.push(':'),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

fn percent_decode(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = s.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn encodes_spaces_and_unicode() {
        let uri = path_to_uri(Path::new("/src/my project/é.evi")).unwrap();
        assert_eq!(uri.as_str(), "file:///src/my%20project/%C3%A9.evi");
    }

    #[test]
    fn path_round_trips() {
        let path = Path::new("/tmp/hello world/main.evi");
        let uri = path_to_uri(path).unwrap();
        assert_eq!(uri_to_path(&uri).unwrap(), path);
    }

    #[test]
    fn localhost_authority_is_accepted() {
        let uri: Uri = "file://localhost/src/a.evi".parse().unwrap();
        assert_eq!(uri_to_path(&uri).unwrap(), PathBuf::from("/src/a.evi"));
    }

    #[test]
    fn non_file_scheme_is_rejected() {
        let uri: Uri = "untitled:Untitled-1".parse().unwrap();
        assert!(uri_to_path(&uri).is_none());
    }
}
