use oxc_ast::ast::{
    Argument, ArrayExpression, ArrayExpressionElement, Expression, ObjectExpression,
    ObjectProperty, ObjectPropertyKind, Program, PropertyKey, Statement,
};
use oxc_span::GetSpan;

use super::{
    ConfigPatcher, Edit, PLUGIN_SPECIFIER, add_import, apply, drop_import, is_identifier,
    with_program,
};
use crate::error::{WorkbenchError, WorkbenchResult};

const PLUGIN: &str = "previewReporter";
const IMPORT: &str = "import previewReporter from \"./preview-reporter-plugin.js\";";
/// Inserted right after the config object's `{` when it has no `plugins`.
const PLUGINS_PROPERTY: &str = "\n  plugins: [previewReporter()],";

/// `defineConfig({ plugins: [...] })` and `export default { plugins: [...] }`
/// configs. The reporter is appended as the last entry of the config
/// object's own `plugins`; nested `plugins` keys (Rollup, worker) are left
/// alone.
pub struct ViteConfigPatcher;

/// The object literal exported as the config, looking through
/// `defineConfig(...)`, parentheses and `satisfies`/`as` annotations.
fn config_object<'p, 'a>(expr: &'p Expression<'a>) -> Option<&'p ObjectExpression<'a>> {
    match expr {
        Expression::ObjectExpression(obj) => Some(&**obj),
        Expression::CallExpression(call) if is_identifier(&call.callee, "defineConfig") => {
            match call.arguments.first()? {
                Argument::ObjectExpression(obj) => Some(&**obj),
                _ => None,
            }
        }
        Expression::ParenthesizedExpression(p) => config_object(&p.expression),
        Expression::TSSatisfiesExpression(e) => config_object(&e.expression),
        Expression::TSAsExpression(e) => config_object(&e.expression),
        _ => None,
    }
}

fn exported_config<'p, 'a>(program: &'p Program<'a>) -> Option<&'p ObjectExpression<'a>> {
    program.body.iter().find_map(|stmt| match stmt {
        Statement::ExportDefaultDeclaration(decl) => {
            config_object(decl.declaration.as_expression()?)
        }
        _ => None,
    })
}

fn is_key(key: &PropertyKey<'_>, name: &str) -> bool {
    match key {
        PropertyKey::StaticIdentifier(id) => id.name.as_str() == name,
        PropertyKey::StringLiteral(s) => s.value.as_str() == name,
        _ => false,
    }
}

/// The top-level `plugins` property of the config object.
fn plugins_property<'p, 'a>(obj: &'p ObjectExpression<'a>) -> Option<&'p ObjectProperty<'a>> {
    obj.properties.iter().find_map(|p| match p {
        ObjectPropertyKind::ObjectProperty(prop) if !prop.computed && is_key(&prop.key, "plugins") => {
            Some(&**prop)
        }
        _ => None,
    })
}

fn plugins_array<'p, 'a>(prop: &'p ObjectProperty<'a>) -> WorkbenchResult<&'p ArrayExpression<'a>> {
    match &prop.value {
        Expression::ArrayExpression(arr) => Ok(&**arr),
        _ => Err(WorkbenchError::UnsupportedConfig(
            "plugins is not an array literal".into(),
        )),
    }
}

/// Position of the `previewReporter()` call among the array's elements.
fn reporter_call(arr: &ArrayExpression<'_>) -> Option<usize> {
    arr.elements.iter().position(|el| {
        matches!(el, ArrayExpressionElement::CallExpression(call)
            if is_identifier(&call.callee, PLUGIN) && call.arguments.is_empty())
    })
}

/// Byte range of a [`PLUGINS_PROPERTY`] this patcher inserted.
fn inserted_property(obj: &ObjectExpression<'_>, source: &str) -> Option<(usize, usize)> {
    let after_brace = obj.span.start as usize + 1;
    source
        .get(after_brace..)?
        .starts_with(PLUGINS_PROPERTY)
        .then_some((after_brace, after_brace + PLUGINS_PROPERTY.len()))
}

fn unsupported() -> WorkbenchError {
    WorkbenchError::UnsupportedConfig("no exported config object found".into())
}

impl ConfigPatcher for ViteConfigPatcher {
    fn inject(&self, file: &str, source: &str) -> WorkbenchResult<String> {
        with_program(file, source, |program| {
            let obj = exported_config(program).ok_or_else(unsupported)?;
            let mut edits: Vec<Edit> = add_import(program, IMPORT, PLUGIN_SPECIFIER)
                .into_iter()
                .collect();

            match plugins_property(obj) {
                Some(prop) => {
                    let arr = plugins_array(prop)?;
                    if reporter_call(arr).is_none() {
                        // Inserted after the last element, so before a trailing comma.
                        edits.push(match arr.elements.last() {
                            Some(last) => {
                                Edit::insert(last.span().end as usize, format!(", {PLUGIN}()"))
                            }
                            None => Edit::insert(arr.span.start as usize + 1, format!("{PLUGIN}()")),
                        });
                    }
                }
                None => edits.push(Edit::insert(obj.span.start as usize + 1, PLUGINS_PROPERTY)),
            }
            Ok(apply(source, edits))
        })
    }

    fn remove(&self, file: &str, source: &str) -> WorkbenchResult<String> {
        with_program(file, source, |program| {
            let mut edits: Vec<Edit> = drop_import(program, source, PLUGIN_SPECIFIER)
                .into_iter()
                .collect();
            let Some(obj) = exported_config(program) else {
                return Ok(apply(source, edits));
            };

            if let Some((start, end)) = inserted_property(obj, source) {
                edits.push(Edit::delete(start, end));
            } else if let Some(prop) = plugins_property(obj)
                && let Ok(arr) = plugins_array(prop)
                && let Some(i) = reporter_call(arr)
                && let Some(call) = arr.elements.get(i)
            {
                let call = call.span();
                let edit = match (i.checked_sub(1).and_then(|p| arr.elements.get(p)), arr.elements.get(i + 1)) {
                    (Some(prev), _) => Edit::delete(prev.span().end as usize, call.end as usize),
                    (None, Some(next)) => {
                        Edit::delete(call.start as usize, next.span().start as usize)
                    }
                    (None, None) => Edit::delete(call.start as usize, call.end as usize),
                };
                edits.push(edit);
            }
            Ok(apply(source, edits))
        })
    }
}
