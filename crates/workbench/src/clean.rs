//! Cleaning of accumulated command output.
//!
//! Applied to the final log blob a command returns, never to the chunks
//! streamed live to the terminal.

use vte::{Parser, Perform};

const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Collects printable text and the whitespace controls we keep; every escape
/// sequence (CSI, OSC, DCS) and every other C0 control is dropped.
#[derive(Default)]
struct PlainText {
    out: String,
}

impl Perform for PlainText {
    fn print(&mut self, c: char) {
        self.out.push(c);
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.out.push(char::from(byte));
        }
    }
}

/// Remove ANSI/OSC escape sequences and control bytes (including NUL).
pub fn strip_escapes(text: &str) -> String {
    let mut parser = Parser::new();
    let mut performer = PlainText::default();
    for byte in text.bytes() {
        parser.advance(&mut performer, byte);
    }
    performer.out
}

/// Wrap a chunk in red for terminal display.
pub fn colorize_error(text: &str) -> String {
    format!("{RED}{text}{RESET}")
}

fn is_keyword(word: &str) -> bool {
    let bare = word.trim_start_matches(['[', '(']);
    bare.ends_with("Error:")
        || bare.ends_with("Warning:")
        || matches!(bare, "error:" | "warning:" | "ERROR" | "ERROR:" | "WARN" | "WARN:" | "WARNING:")
}

/// `at` followed by something shaped like a stack frame: a location, or a
/// function name followed by a parenthesised location.
fn is_frame_start(words: &[&str], i: usize) -> bool {
    if words.get(i).copied() != Some("at") {
        return false;
    }
    let next = words.get(i + 1).copied();
    let after = words.get(i + 2).copied();
    next.is_some_and(|n| n == "async" || n == "new" || n.contains(['(', '/', ':', '<', '.']))
        || after.is_some_and(|a| a.starts_with('('))
}

/// Rebuild one line from its whitespace-separated words, starting a new line
/// before error/warning keywords and stack frames. Whole words are moved, so
/// path-like tokens are never split.
fn reflow_line(line: &str, out: &mut String) {
    let words: Vec<&str> = line.split_whitespace().collect();
    for (i, word) in words.iter().enumerate() {
        if i > 0 {
            if is_keyword(word) || is_frame_start(&words, i) {
                out.push('\n');
            } else {
                out.push(' ');
            }
        }
        out.push_str(word);
    }
}

/// Produce a readable plain-text version of raw terminal output.
pub fn clean_output(raw: &str) -> String {
    let plain = strip_escapes(raw);
    let normalized = plain.replace("\r\n", "\n").replace('\r', "\n");

    let mut reflowed = String::with_capacity(normalized.len());
    for (i, line) in normalized.split('\n').enumerate() {
        if i > 0 {
            reflowed.push('\n');
        }
        reflow_line(line, &mut reflowed);
    }

    let mut out = String::with_capacity(reflowed.len());
    let mut newlines = 0;
    for c in reflowed.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines > 2 {
                continue;
            }
        } else {
            newlines = 0;
        }
        out.push(c);
    }
    out.trim().to_string()
}
