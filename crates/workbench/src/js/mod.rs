//! Structural edits to build-tool config modules.
//!
//! Configs are parsed with oxc. Edits are computed on AST spans and spliced
//! into the original text, so formatting and comments outside the edited
//! span survive untouched.

mod next;
mod vite;

pub use next::NextConfigPatcher;
pub use vite::ViteConfigPatcher;

use oxc_allocator::Allocator;
use oxc_ast::ast::{Argument, Expression, Program, Statement};
use oxc_diagnostics::OxcDiagnostic;
use oxc_parser::Parser;
use oxc_span::SourceType;

use crate::error::{WorkbenchError, WorkbenchResult};

/// Module specifier of the generated build-tool plugin, relative to the
/// config file.
pub const PLUGIN_SPECIFIER: &str = "./preview-reporter-plugin.js";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigDialect {
    Vite,
    Next,
}

/// Config files probed in the workspace root, in order.
pub const CONFIG_FILES: &[(&str, ConfigDialect)] = &[
    ("vite.config.ts", ConfigDialect::Vite),
    ("vite.config.js", ConfigDialect::Vite),
    ("vite.config.mjs", ConfigDialect::Vite),
    ("vite.config.mts", ConfigDialect::Vite),
    ("next.config.js", ConfigDialect::Next),
    ("next.config.mjs", ConfigDialect::Next),
    ("next.config.ts", ConfigDialect::Next),
];

/// Registers and unregisters the preview reporter in one config dialect.
/// `file` selects the source type (TypeScript or JavaScript). Both operations
/// return the input unchanged when there is nothing to do.
pub trait ConfigPatcher: Send + Sync {
    fn inject(&self, file: &str, source: &str) -> WorkbenchResult<String>;
    fn remove(&self, file: &str, source: &str) -> WorkbenchResult<String>;
}

pub fn patcher_for(dialect: ConfigDialect) -> &'static dyn ConfigPatcher {
    match dialect {
        ConfigDialect::Vite => &ViteConfigPatcher,
        ConfigDialect::Next => &NextConfigPatcher,
    }
}

/// Fails with [`crate::WorkbenchError::ConfigSyntax`] when `source` does not
/// parse as a module.
pub fn check_syntax(file: &str, source: &str) -> WorkbenchResult<()> {
    with_program(file, source, |_| Ok(()))
}

fn source_type(file: &str) -> SourceType {
    SourceType::from_path(file).unwrap_or_else(|_| SourceType::mjs())
}

/// Parse `source` and hand the program to `f`. The first parse error wins.
pub(crate) fn with_program<T>(
    file: &str,
    source: &str,
    f: impl FnOnce(&Program<'_>) -> WorkbenchResult<T>,
) -> WorkbenchResult<T> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type(file)).parse();
    if let Some(err) = ret.errors.first() {
        return Err(syntax_error(source, err));
    }
    if ret.panicked {
        return Err(WorkbenchError::ConfigSyntax {
            line: 1,
            column: 1,
            message: "parser aborted".into(),
        });
    }
    f(&ret.program)
}

fn syntax_error(source: &str, err: &OxcDiagnostic) -> WorkbenchError {
    let offset = err
        .labels
        .as_ref()
        .and_then(|labels| labels.first())
        .map_or(0, |label| label.offset());
    let (line, column) = line_column(source, offset);
    WorkbenchError::ConfigSyntax {
        line,
        column,
        message: err.message.to_string(),
    }
}

/// 1-based line and column of a byte offset.
fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let before = source.get(..offset).unwrap_or(source);
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before.get(line_start..).map_or(0, |s| s.chars().count()) + 1;
    (line, column)
}

pub(crate) struct Edit {
    start: usize,
    end: usize,
    text: String,
}

impl Edit {
    fn insert(at: usize, text: impl Into<String>) -> Self {
        Self {
            start: at,
            end: at,
            text: text.into(),
        }
    }

    fn delete(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            text: String::new(),
        }
    }

    fn replace(start: usize, end: usize, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// Apply non-overlapping edits.
pub(crate) fn apply(source: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|e| std::cmp::Reverse(e.start));
    let mut out = source.to_string();
    for edit in edits {
        out.replace_range(edit.start..edit.end, &edit.text);
    }
    out
}

pub(crate) fn is_identifier(expr: &Expression<'_>, name: &str) -> bool {
    matches!(expr, Expression::Identifier(id) if id.name.as_str() == name)
}

/// A top-level `import ... "<specifier>"` or `const x = require("<specifier>")` statement.
struct ImportStatement {
    start: usize,
    end: usize,
    specifier: String,
}

fn required_specifier(expr: &Expression<'_>) -> Option<String> {
    let Expression::CallExpression(call) = expr else {
        return None;
    };
    if !is_identifier(&call.callee, "require") || call.arguments.len() != 1 {
        return None;
    }
    match call.arguments.first()? {
        Argument::StringLiteral(s) => Some(s.value.as_str().to_string()),
        _ => None,
    }
}

fn imports(program: &Program<'_>) -> Vec<ImportStatement> {
    program
        .body
        .iter()
        .filter_map(|stmt| match stmt {
            Statement::ImportDeclaration(decl) => Some(ImportStatement {
                start: decl.span.start as usize,
                end: decl.span.end as usize,
                specifier: decl.source.value.as_str().to_string(),
            }),
            Statement::VariableDeclaration(decl) => {
                let specifier = decl
                    .declarations
                    .iter()
                    .find_map(|d| d.init.as_ref().and_then(required_specifier))?;
                Some(ImportStatement {
                    start: decl.span.start as usize,
                    end: decl.span.end as usize,
                    specifier,
                })
            }
            _ => None,
        })
        .collect()
}

/// Insert `line` after the last import statement, or at the top of the
/// module. `None` when an import of `specifier` already exists.
fn add_import(program: &Program<'_>, line: &str, specifier: &str) -> Option<Edit> {
    let imports = imports(program);
    if imports.iter().any(|s| s.specifier == specifier) {
        return None;
    }
    Some(match imports.last() {
        Some(last) => Edit::insert(last.end, format!("\n{line}")),
        None => Edit::insert(0, format!("{line}\n")),
    })
}

/// Delete the import of `specifier` together with the line break
/// [`add_import`] introduced.
fn drop_import(program: &Program<'_>, source: &str, specifier: &str) -> Option<Edit> {
    let stmt = imports(program)
        .into_iter()
        .find(|s| s.specifier == specifier)?;
    let (mut start, mut end) = (stmt.start, stmt.end);
    if start > 0 && source.get(start - 1..start) == Some("\n") {
        start -= 1;
    } else if source.get(end..end + 1) == Some("\n") {
        end += 1;
    }
    Some(Edit::delete(start, end))
}
