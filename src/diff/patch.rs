use super::{DiffOp, EditScript};
use crate::err::{Error, Result, Side};

/// Rebuilds the after-text from `before`.
///
/// Fails with `ScriptMismatch` unless the script's copy and delete spans,
/// in order, spell out `before` exactly.
pub fn apply_forward(before: &str, script: &EditScript) -> Result<String> {
    replay(before, script, Side::Before)
}

/// Rebuilds the before-text from `after`.
///
/// Fails with `ScriptMismatch` unless the script's copy and add spans, in
/// order, spell out `after` exactly.
pub fn apply_backward(after: &str, script: &EditScript) -> Result<String> {
    replay(after, script, Side::After)
}

/// Walks the script consuming `input` on `side` and emitting the other side.
fn replay(input: &str, script: &EditScript, side: Side) -> Result<String> {
    let consumes = |op: &DiffOp| match side {
        Side::Before => op.in_before(),
        Side::After => op.in_after(),
    };
    let emits = |op: &DiffOp| match side {
        Side::Before => op.in_after(),
        Side::After => op.in_before(),
    };

    let mut output = String::with_capacity(input.len());
    let mut cursor = 0;
    for (i, op) in script.ops().iter().enumerate() {
        if consumes(op) {
            let span = op.text();
            if !input[cursor..].starts_with(span) {
                return Err(Error::ScriptMismatch {
                    side,
                    detail: format!("op #{} does not match the text at byte {}", i, cursor),
                });
            }
            cursor += span.len();
        }
        if emits(op) {
            output.push_str(op.text());
        }
    }
    if cursor != input.len() {
        return Err(Error::ScriptMismatch {
            side,
            detail: format!(
                "script covers {} of {} bytes",
                cursor,
                input.len()
            ),
        });
    }
    Ok(output)
}
