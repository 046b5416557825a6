//! Helpers for keeping user-supplied strings safe to drop into log lines.

use std::fmt::Write;

/// Longest preview kept for a user-supplied string (character names, user ids, item names).
const MAX_PREVIEW: usize = 64;

/// Escape a user-supplied string for single-line logging.
///
/// Backslashes and control characters are escaped so a name like `"a\nWARN forged"`
/// cannot start a new log record. Anything past [`MAX_PREVIEW`] characters is
/// replaced with an ellipsis.
pub fn escape_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 4);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Shorten a session token so log lines can correlate requests without leaking it.
pub fn mask_token(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    format!("{}…", escape_log(&prefix))
}
