use crate::constants::is_reserved_keyword;

use super::{
    diagnostic::{EvalDiagnostic, EvalDiagnosticKind},
    node::{CompilerNode, Operation},
    token::{ExprToken, ExprTokens, ExprTokensExt},
    value::Value,
};

/// Parses a reversed token stream into a [`CompilerNode`] tree.
///
/// Parsing is fault tolerant: an unexpected token records a `parse-error`
/// diagnostic and a null literal stands in for the missing operand, so a
/// tree is produced for every non-empty input.
pub fn parse_expr_tokens(
    tokens: &mut ExprTokens,
    diagnostics: &mut Vec<EvalDiagnostic>,
) -> Option<CompilerNode> {
    if matches!(tokens.peek(), ExprToken::Eof { .. }) {
        return None;
    }
    let node = parse_pratt(tokens, 0, diagnostics);
    match tokens.peek() {
        ExprToken::Eof { .. } => {}
        token => {
            diagnostics.push(EvalDiagnostic::new(
                token.pos(),
                EvalDiagnosticKind::ParseError {
                    message: format!("unexpected token: {}", token.kind()),
                },
            ));
        }
    }
    Some(node)
}

enum Prefix {
    Minus,
    Not,
}

impl Prefix {
    fn bp(&self) -> u8 {
        match self {
            Prefix::Minus => 14,
            Prefix::Not => 14,
        }
    }

    fn operation(&self) -> Operation {
        match self {
            Prefix::Minus => Operation::Negate,
            Prefix::Not => Operation::Not,
        }
    }
}

enum Infix {
    Asterisk,
    Slash,
    Percent,
    Plus,
    Minus,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq2,
    NotEq,
    And2,
    Or2,
    Unknown(String),
}

impl Infix {
    fn lbp(&self) -> u8 {
        match self {
            Infix::Asterisk => 12,
            Infix::Slash => 12,
            Infix::Percent => 12,
            Infix::Plus => 10,
            Infix::Minus => 10,
            Infix::Lt => 8,
            Infix::LtEq => 8,
            Infix::Gt => 8,
            Infix::GtEq => 8,
            Infix::Eq2 => 6,
            Infix::NotEq => 6,
            Infix::And2 => 4,
            Infix::Or2 => 2,
            Infix::Unknown(_) => 10,
        }
    }

    fn rbp(&self) -> u8 {
        match self {
            Infix::Asterisk => 13,
            Infix::Slash => 13,
            Infix::Percent => 13,
            Infix::Plus => 11,
            Infix::Minus => 11,
            Infix::Lt => 9,
            Infix::LtEq => 9,
            Infix::Gt => 9,
            Infix::GtEq => 9,
            Infix::Eq2 => 7,
            Infix::NotEq => 7,
            Infix::And2 => 5,
            Infix::Or2 => 3,
            Infix::Unknown(_) => 11,
        }
    }

    fn operation(self) -> Operation {
        match self {
            Infix::Asterisk => Operation::Multiply,
            Infix::Slash => Operation::Divide,
            Infix::Percent => Operation::Modulo,
            Infix::Plus => Operation::Add,
            Infix::Minus => Operation::Subtract,
            Infix::Lt => Operation::Less,
            Infix::LtEq => Operation::LessEq,
            Infix::Gt => Operation::Greater,
            Infix::GtEq => Operation::GreaterEq,
            Infix::Eq2 => Operation::Equal,
            Infix::NotEq => Operation::NotEqual,
            Infix::And2 => Operation::And,
            Infix::Or2 => Operation::Or,
            Infix::Unknown(text) => Operation::Unknown(text),
        }
    }
}

fn parse_pratt(
    tokens: &mut ExprTokens,
    min_bp: u8,
    diagnostics: &mut Vec<EvalDiagnostic>,
) -> CompilerNode {
    let mut left = parse_atom(tokens, diagnostics);

    loop {
        let op = match tokens.peek() {
            ExprToken::Asterisk { .. } => Infix::Asterisk,
            ExprToken::Slash { .. } => Infix::Slash,
            ExprToken::Percent { .. } => Infix::Percent,
            ExprToken::Plus { .. } => Infix::Plus,
            ExprToken::Minus { .. } => Infix::Minus,
            ExprToken::Lt { .. } => Infix::Lt,
            ExprToken::LtEq { .. } => Infix::LtEq,
            ExprToken::Gt { .. } => Infix::Gt,
            ExprToken::GtEq { .. } => Infix::GtEq,
            ExprToken::Eq2 { .. } => Infix::Eq2,
            ExprToken::NotEq { .. } => Infix::NotEq,
            ExprToken::And2 { .. } => Infix::And2,
            ExprToken::Or2 { .. } => Infix::Or2,
            ExprToken::UnknownOperator { text, .. } => Infix::Unknown(text.to_string()),
            _ => break,
        };
        if op.lbp() < min_bp {
            break;
        }
        let token = tokens.pop_token();
        if let Infix::Unknown(text) = &op {
            diagnostics.push(EvalDiagnostic::new(
                token.pos(),
                EvalDiagnosticKind::UnknownOperation {
                    operator: text.clone(),
                },
            ));
        }
        let right = parse_pratt(tokens, op.rbp(), diagnostics);
        left = CompilerNode::infix(op.operation(), left, right);
    }

    left
}

fn parse_atom(tokens: &mut ExprTokens, diagnostics: &mut Vec<EvalDiagnostic>) -> CompilerNode {
    match tokens.pop_token() {
        ExprToken::NumberLiteral { value, .. } => CompilerNode::literal(Value::Num(value)),
        ExprToken::StringLiteral { value, .. } => CompilerNode::literal(Value::Str(value)),
        ExprToken::NullKeyword { .. } => CompilerNode::literal(Value::Null),
        ExprToken::TrueKeyword { .. } => CompilerNode::literal(Value::Bool(true)),
        ExprToken::FalseKeyword { .. } => CompilerNode::literal(Value::Bool(false)),
        ExprToken::Identifier { pos, name } => {
            if is_reserved_keyword(name) {
                diagnostics.push(EvalDiagnostic::new(
                    pos,
                    EvalDiagnosticKind::ReservedKeyword {
                        name: name.to_string(),
                    },
                ));
            }
            CompilerNode::leaf(Operation::Variable(name.to_string()))
        }
        ExprToken::Minus { .. } => {
            let right = parse_pratt(tokens, Prefix::Minus.bp(), diagnostics);
            CompilerNode::prefix(Prefix::Minus.operation(), right)
        }
        ExprToken::Not { .. } => {
            let right = parse_pratt(tokens, Prefix::Not.bp(), diagnostics);
            CompilerNode::prefix(Prefix::Not.operation(), right)
        }
        ExprToken::OpenParen { .. } => {
            let inner = parse_pratt(tokens, 0, diagnostics);
            match tokens.peek() {
                ExprToken::CloseParen { .. } => {
                    tokens.pop_token();
                }
                token => {
                    diagnostics.push(EvalDiagnostic::new(
                        token.pos(),
                        EvalDiagnosticKind::ParseError {
                            message: "expected ')'".to_string(),
                        },
                    ));
                }
            }
            inner.grouped()
        }
        token => {
            diagnostics.push(EvalDiagnostic::new(
                token.pos(),
                EvalDiagnosticKind::ParseError {
                    message: format!("unexpected token: {}", token.kind()),
                },
            ));
            CompilerNode::literal(Value::Null)
        }
    }
}
