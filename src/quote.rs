use std::path::Path;

use crate::names::path_bytes;

/// Backslash-escapes every ASCII byte a POSIX shell would treat specially.
/// Bytes outside ASCII pass through untouched so UTF-8 names stay readable.
pub fn shell_escape(word: &[u8]) -> Vec<u8> {
    if word.is_empty() {
        return b"''".to_vec();
    }
    let mut out = Vec::with_capacity(word.len() + 4);
    for &byte in word {
        if !byte.is_ascii() || is_plain(byte) {
            out.push(byte);
        } else {
            out.push(b'\\');
            out.push(byte);
        }
    }
    out
}

fn is_plain(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(byte, b'_' | b'-' | b'.' | b'/' | b',' | b':' | b'@' | b'%' | b'+' | b'=')
}

/// `program flags... from to` as one line, ready to paste into a shell.
pub fn command_line(program: &str, flags: &[&str], from: &Path, to: &Path) -> Vec<u8> {
    let mut line = Vec::new();
    line.extend_from_slice(program.as_bytes());
    for flag in flags {
        line.push(b' ');
        line.extend_from_slice(flag.as_bytes());
    }
    for path in [from, to] {
        line.push(b' ');
        line.extend(shell_escape(&path_bytes(path)));
    }
    line.push(b'\n');
    line
}
