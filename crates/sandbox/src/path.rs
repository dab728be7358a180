//! Remote path and shell helpers shared by the backends.

/// Resolve `path` against the sandbox home directory. Absolute paths pass
/// through unchanged.
pub fn resolve(home: &str, path: &str) -> String {
    if path.starts_with('/') {
        return path.to_string();
    }
    let rel = path.trim_start_matches("./");
    let home = home.trim_end_matches('/');
    if rel.is_empty() || rel == "." {
        return home.to_string();
    }
    format!("{home}/{rel}")
}

/// Quote a single argument for a POSIX shell.
pub fn shell_quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | '+' | ':'))
    {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// Prefix a command so it runs from `home`. The provider's default working
/// directory for sessions is not the home directory.
pub fn in_dir(home: &str, command: &str) -> String {
    format!("cd {} && {command}", shell_quote(home))
}
