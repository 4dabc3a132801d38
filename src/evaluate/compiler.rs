use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use super::{
    diagnostic::{EvalDiagnostic, EvalDiagnosticKind},
    node::{CompilerNode, Operation},
    parser::parse_expr_tokens,
    scanner::read_expr_tokens,
    value::Value,
};

/// Variable lookup seam between compiled expressions and whoever owns the
/// variables (the structure compiler at check time, the engine at run time).
pub trait LookupContext {
    fn get(&self, name: &str) -> Option<Value>;

    fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// A context with no variables at all.
pub struct EmptyContext;

impl LookupContext for EmptyContext {
    fn get(&self, _name: &str) -> Option<Value> {
        None
    }
}

impl LookupContext for IndexMap<String, Value> {
    fn get(&self, name: &str) -> Option<Value> {
        IndexMap::get(self, name).cloned()
    }
}

impl LookupContext for HashMap<String, Value> {
    fn get(&self, name: &str) -> Option<Value> {
        HashMap::get(self, name).cloned()
    }
}

/// Compiles inline expression source into [`CompiledExpression`]s.
#[derive(Clone, Debug, Default)]
pub struct ExpressionCompiler;

impl ExpressionCompiler {
    /// Compiles without checking variable references. References are still
    /// resolved (and diagnosed) at evaluation time.
    pub fn compile(&self, source: &str) -> CompiledExpression {
        self.compile_internal(source, None)
    }

    /// Compiles and additionally diagnoses references to variables absent
    /// from `known` as `variable-not-found`.
    pub fn compile_checked(&self, source: &str, known: &HashSet<String>) -> CompiledExpression {
        self.compile_internal(source, Some(known))
    }

    fn compile_internal(
        &self,
        source: &str,
        known: Option<&HashSet<String>>,
    ) -> CompiledExpression {
        let mut diagnostics = Vec::new();
        let mut tokens = read_expr_tokens(source);
        tokens.reverse();
        let root = parse_expr_tokens(&mut tokens, &mut diagnostics);
        if root.is_none() {
            diagnostics.push(EvalDiagnostic::new(
                0,
                EvalDiagnosticKind::ParseError {
                    message: "empty expression".to_string(),
                },
            ));
        }
        if let (Some(root), Some(known)) = (&root, known) {
            root.walk(&mut |node| {
                if let Operation::Variable(name) = &node.operation
                    && !known.contains(name)
                    && !crate::constants::is_reserved_keyword(name)
                {
                    diagnostics.push(EvalDiagnostic::new(
                        0,
                        EvalDiagnosticKind::VariableNotFound { name: name.clone() },
                    ));
                }
            });
        }
        CompiledExpression {
            source: source.to_string(),
            root,
            diagnostics,
        }
    }
}

/// The evaluable form of one inline expression.
///
/// The source text is kept so programs stay serializable; the node tree is
/// the compiled artifact. Evaluation never fails: problems surface as
/// diagnostics beside a fallback value.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledExpression {
    pub source: String,
    pub root: Option<CompilerNode>,
    pub diagnostics: Vec<EvalDiagnostic>,
}

impl CompiledExpression {
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn evaluate(&self, context: &dyn LookupContext) -> Evaluation {
        let mut diagnostics = Vec::new();
        let value = match &self.root {
            Some(root) => evaluate_node(root, context, &mut diagnostics),
            None => Value::Null,
        };
        Evaluation { value, diagnostics }
    }
}

/// The outcome of evaluating a compiled expression: the value (a fallback
/// if anything went wrong) plus any evaluation-time diagnostics.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    pub value: Value,
    pub diagnostics: Vec<EvalDiagnostic>,
}

impl Evaluation {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

fn evaluate_node(
    node: &CompilerNode,
    context: &dyn LookupContext,
    diagnostics: &mut Vec<EvalDiagnostic>,
) -> Value {
    match &node.operation {
        Operation::Literal(value) => value.clone(),
        Operation::Variable(name) => context.get(name).unwrap_or_else(|| {
            diagnostics.push(EvalDiagnostic::new(
                0,
                EvalDiagnosticKind::VariableNotFound { name: name.clone() },
            ));
            Value::Null
        }),
        Operation::Negate => {
            let right = evaluate_operand(&node.right, context, diagnostics);
            match right.as_num() {
                Some(value) => Value::Num(-value),
                None => unsupported(&node.operation, &Value::Null, &right, diagnostics),
            }
        }
        Operation::Not => {
            let right = evaluate_operand(&node.right, context, diagnostics);
            Value::Bool(!right.is_truthy())
        }
        Operation::And => {
            let left = evaluate_operand(&node.left, context, diagnostics);
            if !left.is_truthy() {
                Value::Bool(false)
            } else {
                let right = evaluate_operand(&node.right, context, diagnostics);
                Value::Bool(right.is_truthy())
            }
        }
        Operation::Or => {
            let left = evaluate_operand(&node.left, context, diagnostics);
            if left.is_truthy() {
                Value::Bool(true)
            } else {
                let right = evaluate_operand(&node.right, context, diagnostics);
                Value::Bool(right.is_truthy())
            }
        }
        Operation::Equal => {
            let left = evaluate_operand(&node.left, context, diagnostics);
            let right = evaluate_operand(&node.right, context, diagnostics);
            Value::Bool(left == right)
        }
        Operation::NotEqual => {
            let left = evaluate_operand(&node.left, context, diagnostics);
            let right = evaluate_operand(&node.right, context, diagnostics);
            Value::Bool(left != right)
        }
        Operation::Add => {
            let left = evaluate_operand(&node.left, context, diagnostics);
            let right = evaluate_operand(&node.right, context, diagnostics);
            match (&left, &right) {
                (Value::Num(l), Value::Num(r)) => Value::Num(l + r),
                (Value::Str(_), _) | (_, Value::Str(_)) => Value::Str(format!("{left}{right}")),
                _ => unsupported(&node.operation, &left, &right, diagnostics),
            }
        }
        Operation::Subtract
        | Operation::Multiply
        | Operation::Divide
        | Operation::Modulo => {
            let left = evaluate_operand(&node.left, context, diagnostics);
            let right = evaluate_operand(&node.right, context, diagnostics);
            match (left.as_num(), right.as_num()) {
                (Some(l), Some(r)) => Value::Num(match node.operation {
                    Operation::Subtract => l - r,
                    Operation::Multiply => l * r,
                    Operation::Divide => l / r,
                    _ => l % r,
                }),
                _ => unsupported(&node.operation, &left, &right, diagnostics),
            }
        }
        Operation::Less | Operation::LessEq | Operation::Greater | Operation::GreaterEq => {
            let left = evaluate_operand(&node.left, context, diagnostics);
            let right = evaluate_operand(&node.right, context, diagnostics);
            match (left.as_num(), right.as_num()) {
                (Some(l), Some(r)) => Value::Bool(match node.operation {
                    Operation::Less => l < r,
                    Operation::LessEq => l <= r,
                    Operation::Greater => l > r,
                    _ => l >= r,
                }),
                _ => unsupported(&node.operation, &left, &right, diagnostics),
            }
        }
        Operation::Unknown(_) => evaluate_operand(&node.left, context, diagnostics),
    }
}

fn evaluate_operand(
    operand: &Option<Box<CompilerNode>>,
    context: &dyn LookupContext,
    diagnostics: &mut Vec<EvalDiagnostic>,
) -> Value {
    match operand {
        Some(node) => evaluate_node(node, context, diagnostics),
        None => Value::Null,
    }
}

fn unsupported(
    operation: &Operation,
    left: &Value,
    right: &Value,
    diagnostics: &mut Vec<EvalDiagnostic>,
) -> Value {
    diagnostics.push(EvalDiagnostic::new(
        0,
        EvalDiagnosticKind::UnsupportedOperation {
            operator: operation.symbol().to_string(),
            left: left.type_name().to_string(),
            right: right.type_name().to_string(),
        },
    ));
    Value::Null
}
