use super::value::Value;

/// One node of a compiled expression tree. Leaves carry a literal or a
/// variable reference; inner nodes carry an operation over `left`/`right`.
/// `grouped` records explicit parenthesization so the tree preserves the
/// author's grouping exactly.
#[derive(Clone, Debug, PartialEq)]
pub struct CompilerNode {
    pub operation: Operation,
    pub left: Option<Box<CompilerNode>>,
    pub right: Option<Box<CompilerNode>>,
    pub grouped: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    Literal(Value),
    Variable(String),

    // prefix
    Negate,
    Not,

    // infix
    Multiply,
    Divide,
    Modulo,
    Add,
    Subtract,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Equal,
    NotEqual,
    And,
    Or,

    /// An operator that could not be recognized; evaluates to its left
    /// operand so the surrounding expression still produces a value.
    Unknown(String),
}

impl Operation {
    pub fn symbol(&self) -> &str {
        match self {
            Operation::Literal(_) => "literal",
            Operation::Variable(_) => "variable",
            Operation::Negate => "-",
            Operation::Not => "!",
            Operation::Multiply => "*",
            Operation::Divide => "/",
            Operation::Modulo => "%",
            Operation::Add => "+",
            Operation::Subtract => "-",
            Operation::Less => "<",
            Operation::LessEq => "<=",
            Operation::Greater => ">",
            Operation::GreaterEq => ">=",
            Operation::Equal => "==",
            Operation::NotEqual => "!=",
            Operation::And => "&&",
            Operation::Or => "||",
            Operation::Unknown(text) => text,
        }
    }
}

impl CompilerNode {
    pub fn leaf(operation: Operation) -> Self {
        CompilerNode {
            operation,
            left: None,
            right: None,
            grouped: false,
        }
    }

    pub fn literal(value: Value) -> Self {
        CompilerNode::leaf(Operation::Literal(value))
    }

    pub fn prefix(operation: Operation, right: CompilerNode) -> Self {
        CompilerNode {
            operation,
            left: None,
            right: Some(right.into()),
            grouped: false,
        }
    }

    pub fn infix(operation: Operation, left: CompilerNode, right: CompilerNode) -> Self {
        CompilerNode {
            operation,
            left: Some(left.into()),
            right: Some(right.into()),
            grouped: false,
        }
    }

    pub fn grouped(mut self) -> Self {
        self.grouped = true;
        self
    }

    /// Calls `visit` on this node and every descendant, outside-in.
    pub fn walk(&self, visit: &mut impl FnMut(&CompilerNode)) {
        visit(self);
        if let Some(left) = &self.left {
            left.walk(visit);
        }
        if let Some(right) = &self.right {
            right.walk(visit);
        }
    }
}
