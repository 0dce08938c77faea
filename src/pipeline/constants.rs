/// Compile-time constant substitution
///
/// References to the reserved `dopeVars` namespace in source text are
/// rewritten to literal scalar values before the source reaches the
/// compiler. Names without a bound value stay untouched so the compiler
/// still sees them; a bound value that is not a scalar is a fatal
/// configuration error.
use serde_json::Value;
use std::path::Path;

use crate::asset::{is_scalar, Variables};
use crate::error::PipelineError;

/// Reserved namespace for compile-time variable references.
pub const NAMESPACE: &str = "dopeVars";

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Render a scalar as a source literal. JSON literals for null, booleans,
/// numbers, and strings are valid in the target dialect as-is.
fn render_literal(value: &Value) -> String {
    value.to_string()
}

/// Rewrite every `dopeVars.<name>` reference bound in `variables` to its
/// literal value.
pub fn emplace_constants(
    source: &str,
    variables: &Variables,
    identity: &Path,
) -> Result<String, PipelineError> {
    let mut output = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(found) = rest.find(NAMESPACE) {
        let (before, at) = rest.split_at(found);
        output.push_str(before);

        // A real reference starts at an identifier boundary and is followed
        // by a dot and a member name; anything else is ordinary text. The
        // boundary is judged against everything emitted so far, not just the
        // current chunk.
        let boundary_ok = !output
            .chars()
            .next_back()
            .is_some_and(|c| is_ident_char(c) || c == '.');
        let after = &at[NAMESPACE.len()..];

        let member = if boundary_ok && after.starts_with('.') {
            let name: String = after[1..].chars().take_while(|&c| is_ident_char(c)).collect();
            (!name.is_empty()).then_some(name)
        } else {
            None
        };

        match member {
            Some(name) => match variables.get(&name) {
                Some(value) if is_scalar(value) => {
                    output.push_str(&render_literal(value));
                    rest = &after[1 + name.len()..];
                }
                Some(_) => {
                    return Err(PipelineError::UnsupportedSubstitution {
                        name,
                        identity: identity.to_path_buf(),
                    });
                }
                None => {
                    // Unbound name: leave the reference for the compiler.
                    output.push_str(NAMESPACE);
                    rest = after;
                }
            },
            None => {
                output.push_str(NAMESPACE);
                rest = after;
            }
        }
    }

    output.push_str(rest);
    Ok(output)
}
