//! List-vs-list operation transformation
//!
//! Rebases two concurrent operation sequences against each other so that
//! applying `a` then `transformed.ops_b` yields the same document as
//! applying `b` then `transformed.ops_a`. Pair transformation can fan one
//! operation out into several, so the walk recurses over the fan-out.

use std::collections::VecDeque;

use ops::OpSpec;
use tracing::debug;

use crate::matrix::transform_op_vs_op;

/// Two concurrent operation sequences, each rebased past the other
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformResult {
    pub ops_a: Vec<OpSpec>,
    pub ops_b: Vec<OpSpec>,
}

/// A pair of operations the matrix refuses to reconcile
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("operations cannot be transformed: {optype_a} against {optype_b}")]
pub struct TransformError {
    pub optype_a: &'static str,
    pub optype_b: &'static str,
}

/// Transforms `ops_a` past `ops_b` and vice versa.
///
/// On a tie the matrix favours the `ops_b` side, so callers pass the
/// sequence that should win (typically the server's) as `ops_b`.
pub fn transform(
    ops_a: Vec<OpSpec>,
    ops_b: Vec<OpSpec>,
) -> Result<TransformResult, TransformError> {
    let mut queue_a: VecDeque<OpSpec> = ops_a.into();
    let mut transformed_b = Vec::new();
    for op_b in ops_b {
        let step = transform_op_list_vs_op(queue_a, op_b)?;
        queue_a = step.remaining_a;
        transformed_b.extend(step.transformed_b);
    }
    Ok(TransformResult {
        ops_a: queue_a.into(),
        ops_b: transformed_b,
    })
}

struct ListVsOp {
    remaining_a: VecDeque<OpSpec>,
    transformed_b: Vec<OpSpec>,
}

fn transform_op_list_vs_op(
    mut ops_a: VecDeque<OpSpec>,
    op_b: OpSpec,
) -> Result<ListVsOp, TransformError> {
    let mut transformed_a = Vec::new();
    let mut transformed_b = Vec::new();
    let mut op_b = Some(op_b);

    while op_b.is_some() && !ops_a.is_empty() {
        let op_a = match ops_a.pop_front() {
            Some(op) => op,
            None => break,
        };
        let b = match op_b.take() {
            Some(op) => op,
            None => break,
        };
        let error = TransformError {
            optype_a: op_a.optype(),
            optype_b: b.optype(),
        };
        let result = match transform_op_vs_op(op_a, b) {
            Some(result) => result,
            None => {
                debug!(
                    optype_a = error.optype_a,
                    optype_b = error.optype_b,
                    "unresolvable operation pair"
                );
                return Err(error);
            }
        };
        transformed_a.extend(result.ops_a);
        let mut specs_b = result.ops_b;
        if specs_b.is_empty() {
            // op_b became a no-op; the rest of ops_a passes through
            transformed_a.extend(ops_a.drain(..));
            break;
        }
        // a fan-out on the b side means every extra b op must itself be
        // transformed against the remaining a ops
        while specs_b.len() > 1 {
            let step = transform_op_list_vs_op(ops_a, specs_b.remove(0))?;
            transformed_b.extend(step.transformed_b);
            ops_a = step.remaining_a;
        }
        op_b = specs_b.pop();
    }

    if let Some(op) = op_b {
        transformed_b.push(op);
    }
    let mut remaining_a: VecDeque<OpSpec> = transformed_a.into();
    remaining_a.extend(ops_a);
    Ok(ListVsOp {
        remaining_a,
        transformed_b,
    })
}
