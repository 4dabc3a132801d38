#[derive(Debug, PartialEq, Clone)]
pub enum ExprToken<'a> {
    Eof {
        pos: usize,
    },
    Identifier {
        pos: usize,
        name: &'a str,
    },
    NumberLiteral {
        pos: usize,
        value: f64,
    },
    StringLiteral {
        pos: usize,
        value: String,
    },

    // keyword
    NullKeyword {
        pos: usize,
    },
    TrueKeyword {
        pos: usize,
    },
    FalseKeyword {
        pos: usize,
    },

    /// "!"
    Not {
        pos: usize,
    },
    /// "!="
    NotEq {
        pos: usize,
    },
    /// "%"
    Percent {
        pos: usize,
    },
    /// "&&"
    And2 {
        pos: usize,
    },
    /// "("
    OpenParen {
        pos: usize,
    },
    /// ")"
    CloseParen {
        pos: usize,
    },
    /// "*"
    Asterisk {
        pos: usize,
    },
    /// "+"
    Plus {
        pos: usize,
    },
    /// "-"
    Minus {
        pos: usize,
    },
    /// "/"
    Slash {
        pos: usize,
    },
    /// "<"
    Lt {
        pos: usize,
    },
    /// "<="
    LtEq {
        pos: usize,
    },
    /// "=="
    Eq2 {
        pos: usize,
    },
    /// ">"
    Gt {
        pos: usize,
    },
    /// ">="
    GtEq {
        pos: usize,
    },
    /// "||"
    Or2 {
        pos: usize,
    },

    /// An operator character sequence the scanner does not recognize.
    UnknownOperator {
        pos: usize,
        text: &'a str,
    },
}

impl<'a> ExprToken<'a> {
    pub fn pos(&self) -> usize {
        match self {
            ExprToken::Eof { pos }
            | ExprToken::Identifier { pos, .. }
            | ExprToken::NumberLiteral { pos, .. }
            | ExprToken::StringLiteral { pos, .. }
            | ExprToken::NullKeyword { pos }
            | ExprToken::TrueKeyword { pos }
            | ExprToken::FalseKeyword { pos }
            | ExprToken::Not { pos }
            | ExprToken::NotEq { pos }
            | ExprToken::Percent { pos }
            | ExprToken::And2 { pos }
            | ExprToken::OpenParen { pos }
            | ExprToken::CloseParen { pos }
            | ExprToken::Asterisk { pos }
            | ExprToken::Plus { pos }
            | ExprToken::Minus { pos }
            | ExprToken::Slash { pos }
            | ExprToken::Lt { pos }
            | ExprToken::LtEq { pos }
            | ExprToken::Eq2 { pos }
            | ExprToken::Gt { pos }
            | ExprToken::GtEq { pos }
            | ExprToken::Or2 { pos }
            | ExprToken::UnknownOperator { pos, .. } => *pos,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ExprToken::Eof { .. } => "Eof",
            ExprToken::Identifier { .. } => "Identifier",
            ExprToken::NumberLiteral { .. } => "NumberLiteral",
            ExprToken::StringLiteral { .. } => "StringLiteral",
            ExprToken::NullKeyword { .. } => "NullKeyword",
            ExprToken::TrueKeyword { .. } => "TrueKeyword",
            ExprToken::FalseKeyword { .. } => "FalseKeyword",
            ExprToken::Not { .. } => "Not",
            ExprToken::NotEq { .. } => "NotEq",
            ExprToken::Percent { .. } => "Percent",
            ExprToken::And2 { .. } => "And2",
            ExprToken::OpenParen { .. } => "OpenParen",
            ExprToken::CloseParen { .. } => "CloseParen",
            ExprToken::Asterisk { .. } => "Asterisk",
            ExprToken::Plus { .. } => "Plus",
            ExprToken::Minus { .. } => "Minus",
            ExprToken::Slash { .. } => "Slash",
            ExprToken::Lt { .. } => "Lt",
            ExprToken::LtEq { .. } => "LtEq",
            ExprToken::Eq2 { .. } => "Eq2",
            ExprToken::Gt { .. } => "Gt",
            ExprToken::GtEq { .. } => "GtEq",
            ExprToken::Or2 { .. } => "Or2",
            ExprToken::UnknownOperator { .. } => "UnknownOperator",
        }
    }
}

pub type ExprTokens<'a> = Vec<ExprToken<'a>>;

/// Token streams are reversed so that the next token is `last()`.
pub trait ExprTokensExt<'a> {
    fn pop_token(&mut self) -> ExprToken<'a>;

    fn peek(&self) -> &ExprToken<'a>;
}

const EOF: ExprToken<'static> = ExprToken::Eof { pos: 0 };

impl<'a> ExprTokensExt<'a> for ExprTokens<'a> {
    fn pop_token(&mut self) -> ExprToken<'a> {
        self.pop().unwrap_or(EOF)
    }

    fn peek(&self) -> &ExprToken<'a> {
        self.last().unwrap_or(&EOF)
    }
}
