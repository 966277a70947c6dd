//! Shell command construction.
//!
//! Every provisioning step ends up as a string handed to `sh -c`, so all
//! interpolated values go through these helpers.

use std::path::Path;

/// Escape a value for use inside single quotes.
/// Replaces `'` with `'\''` (end quote, escaped quote, start quote).
pub fn escape_single_quote_content(value: &str) -> String {
    value.replace('\'', "'\\''")
}

/// Quote a single argument for shell execution.
/// - Empty strings become `''`
/// - Strings with shell metacharacters are wrapped in single quotes
/// - Embedded single quotes are escaped
pub fn quote_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }

    const SHELL_META: &[char] = &[
        ' ', '\t', '\n', '\'', '"', '\\', '$', '`', '!', '*', '?', '[', ']', '(', ')', '{', '}',
        '<', '>', '|', '&', ';', '#', '~',
    ];

    if !arg.contains(SHELL_META) {
        return arg.to_string();
    }

    format!("'{}'", escape_single_quote_content(arg))
}

/// Quote a path for shell execution (always quotes).
pub fn quote_path(path: &Path) -> String {
    format!("'{}'", escape_single_quote_content(&path.to_string_lossy()))
}

/// Run `command` as `user` through a login shell: `su - go bash -c '...'`.
pub fn as_user(user: &str, command: &str) -> String {
    format!(
        "su - {} bash -c '{}'",
        quote_arg(user),
        escape_single_quote_content(command)
    )
}

/// `echo <line> >> <file>`.
pub fn append_line(line: &str, file: &Path) -> String {
    format!("echo {} >> {}", quote_arg(line), quote_path(file))
}

/// Stands in for a credential in commands that get logged or reported.
pub const MASK: &str = "****";
