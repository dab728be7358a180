use oxc_ast::ast::{Expression, Program, Statement};
use oxc_span::{GetSpan, Span};

use super::{
    ConfigPatcher, Edit, PLUGIN_SPECIFIER, add_import, apply, drop_import, is_identifier,
    with_program,
};
use crate::error::{WorkbenchError, WorkbenchResult};

const WRAPPER: &str = "withPreviewReporter";
const ESM_IMPORT: &str = "import withPreviewReporter from \"./preview-reporter-plugin.js\";";
const CJS_REQUIRE: &str =
    "const withPreviewReporter = require(\"./preview-reporter-plugin.js\");";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExportStyle {
    CommonJs,
    Esm,
}

/// `module.exports = x` and `export default x` configs. The exported value is
/// wrapped exactly once in `withPreviewReporter(...)`.
pub struct NextConfigPatcher;

struct Export<'p, 'a> {
    style: ExportStyle,
    value: &'p Expression<'a>,
}

fn export<'p, 'a>(program: &'p Program<'a>, source: &str) -> Option<Export<'p, 'a>> {
    program.body.iter().find_map(|stmt| match stmt {
        Statement::ExpressionStatement(stmt) => match &stmt.expression {
            Expression::AssignmentExpression(assign)
                if text(source, assign.left.span()) == "module.exports" =>
            {
                Some(Export {
                    style: ExportStyle::CommonJs,
                    value: &assign.right,
                })
            }
            _ => None,
        },
        Statement::ExportDefaultDeclaration(decl) => Some(Export {
            style: ExportStyle::Esm,
            value: decl.declaration.as_expression()?,
        }),
        _ => None,
    })
}

/// Strip every `withPreviewReporter(...)` layer. Returns the innermost
/// expression and the number of layers removed.
fn unwrap_reporter<'p, 'a>(mut expr: &'p Expression<'a>) -> (&'p Expression<'a>, usize) {
    let mut layers = 0;
    while let Expression::CallExpression(call) = expr
        && is_identifier(&call.callee, WRAPPER)
        && call.arguments.len() == 1
        && let Some(inner) = call.arguments.first().and_then(|a| a.as_expression())
    {
        expr = inner;
        layers += 1;
    }
    (expr, layers)
}

fn text(source: &str, span: Span) -> &str {
    source
        .get(span.start as usize..span.end as usize)
        .unwrap_or_default()
}

fn no_export() -> WorkbenchError {
    WorkbenchError::UnsupportedConfig("no module.exports or export default found".into())
}

impl ConfigPatcher for NextConfigPatcher {
    fn inject(&self, file: &str, source: &str) -> WorkbenchResult<String> {
        with_program(file, source, |program| {
            let export = export(program, source).ok_or_else(no_export)?;
            let import = match export.style {
                ExportStyle::CommonJs => CJS_REQUIRE,
                ExportStyle::Esm => ESM_IMPORT,
            };
            let mut edits: Vec<Edit> = add_import(program, import, PLUGIN_SPECIFIER)
                .into_iter()
                .collect();

            let (inner, layers) = unwrap_reporter(export.value);
            if layers != 1 {
                let outer = export.value.span();
                edits.push(Edit::replace(
                    outer.start as usize,
                    outer.end as usize,
                    format!("{WRAPPER}({})", text(source, inner.span())),
                ));
            }
            Ok(apply(source, edits))
        })
    }

    fn remove(&self, file: &str, source: &str) -> WorkbenchResult<String> {
        with_program(file, source, |program| {
            let mut edits: Vec<Edit> = drop_import(program, source, PLUGIN_SPECIFIER)
                .into_iter()
                .collect();

            if let Some(export) = export(program, source) {
                let (inner, layers) = unwrap_reporter(export.value);
                if layers > 0 {
                    let outer = export.value.span();
                    edits.push(Edit::replace(
                        outer.start as usize,
                        outer.end as usize,
                        text(source, inner.span()),
                    ));
                }
            }
            Ok(apply(source, edits))
        })
    }
}
