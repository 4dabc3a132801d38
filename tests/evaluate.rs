use std::collections::HashSet;

use indexmap::IndexMap;
use sparkdown::evaluate::{
    EmptyContext, EvalDiagnosticKind, ExpressionCompiler, Operation, Value,
};

fn eval(source: &str) -> Value {
    ExpressionCompiler.compile(source).evaluate(&EmptyContext).value
}

fn eval_with(source: &str, vars: &[(&str, Value)]) -> Value {
    let context: IndexMap<String, Value> = vars
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect();
    ExpressionCompiler.compile(source).evaluate(&context).value
}

mod arithmetic {
    use super::*;

    #[test]
    fn addition() {
        assert_eq!(eval("1 + 2"), Value::Num(3.0));
    }

    #[test]
    fn precedence() {
        assert_eq!(eval("1 + 2 * 3"), Value::Num(7.0));
        assert_eq!(eval("(1 + 2) * 3"), Value::Num(9.0));
        assert_eq!(eval("10 - 2 - 3"), Value::Num(5.0));
        assert_eq!(eval("7 % 4"), Value::Num(3.0));
    }

    #[test]
    fn negation() {
        assert_eq!(eval("-3 + 5"), Value::Num(2.0));
        assert_eq!(eval("-(2 + 3)"), Value::Num(-5.0));
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(eval(r#""ab" + "cd""#), Value::str("abcd"));
        assert_eq!(eval(r#""n=" + 4"#), Value::str("n=4"));
    }

    #[test]
    fn grouping_is_preserved_in_the_tree() {
        let compiled = ExpressionCompiler.compile("(1 + 2) * 3");
        let root = compiled.root.expect("tree");
        assert_eq!(root.operation, Operation::Multiply);
        assert!(root.left.expect("left").grouped);
    }
}

mod comparison {
    use super::*;

    #[test]
    fn numeric_comparisons() {
        assert_eq!(eval("1 < 2"), Value::Bool(true));
        assert_eq!(eval("2 <= 2"), Value::Bool(true));
        assert_eq!(eval("3 > 4"), Value::Bool(false));
        assert_eq!(eval("4 >= 5"), Value::Bool(false));
    }

    #[test]
    fn equality_works_on_any_type() {
        assert_eq!(eval(r#""a" == "a""#), Value::Bool(true));
        assert_eq!(eval("null == null"), Value::Bool(true));
        assert_eq!(eval("1 != 2"), Value::Bool(true));
        assert_eq!(eval(r#"1 == "1""#), Value::Bool(false));
    }

    #[test]
    fn boolean_operators() {
        assert_eq!(eval("true && false"), Value::Bool(false));
        assert_eq!(eval("true || false"), Value::Bool(true));
        assert_eq!(eval("!true"), Value::Bool(false));
    }

    #[test]
    fn word_operators() {
        assert_eq!(eval("true and false"), Value::Bool(false));
        assert_eq!(eval("false or true"), Value::Bool(true));
        assert_eq!(eval("not false"), Value::Bool(true));
    }

    #[test]
    fn and_short_circuits() {
        // The right-hand variable does not exist; && must not evaluate it.
        let evaluation = ExpressionCompiler
            .compile("false && missing")
            .evaluate(&EmptyContext);
        assert_eq!(evaluation.value, Value::Bool(false));
        assert!(evaluation.diagnostics.is_empty());
    }
}

mod variables {
    use super::*;

    #[test]
    fn lookup() {
        assert_eq!(
            eval_with("x + 1", &[("x", Value::Num(41.0))]),
            Value::Num(42.0)
        );
    }

    #[test]
    fn undefined_variable_yields_diagnostic_and_fallback() {
        let evaluation = ExpressionCompiler
            .compile("undefinedVar")
            .evaluate(&EmptyContext);
        assert_eq!(evaluation.value, Value::Null);
        assert!(matches!(
            evaluation.diagnostics.first().map(|d| &d.kind),
            Some(EvalDiagnosticKind::VariableNotFound { name }) if name == "undefinedVar"
        ));
    }

    #[test]
    fn checked_compile_reports_unknown_names() {
        let known: HashSet<String> = ["x".to_string()].into_iter().collect();
        let compiled = ExpressionCompiler.compile_checked("x + y", &known);
        assert!(matches!(
            compiled.diagnostics.first().map(|d| &d.kind),
            Some(EvalDiagnosticKind::VariableNotFound { name }) if name == "y"
        ));
    }

    #[test]
    fn reserved_keyword_is_diagnosed() {
        let compiled = ExpressionCompiler.compile("if");
        assert!(matches!(
            compiled.diagnostics.first().map(|d| &d.kind),
            Some(EvalDiagnosticKind::ReservedKeyword { name }) if name == "if"
        ));
    }
}

mod fault_tolerance {
    use super::*;

    #[test]
    fn trailing_operator_is_a_parse_error() {
        let compiled = ExpressionCompiler.compile("2 +");
        assert!(matches!(
            compiled.diagnostics.first().map(|d| &d.kind),
            Some(EvalDiagnosticKind::ParseError { .. })
        ));
        // Still evaluates to a fallback instead of panicking.
        let evaluation = compiled.evaluate(&EmptyContext);
        assert!(evaluation.value == Value::Null || evaluation.value == Value::Num(2.0));
    }

    #[test]
    fn empty_expression_is_a_parse_error() {
        let compiled = ExpressionCompiler.compile("   ");
        assert!(matches!(
            compiled.diagnostics.first().map(|d| &d.kind),
            Some(EvalDiagnosticKind::ParseError { .. })
        ));
        assert_eq!(compiled.evaluate(&EmptyContext).value, Value::Null);
    }

    #[test]
    fn unknown_operator_keeps_the_left_operand() {
        let compiled = ExpressionCompiler.compile("1 @ 2");
        assert!(matches!(
            compiled.diagnostics.first().map(|d| &d.kind),
            Some(EvalDiagnosticKind::UnknownOperation { operator }) if operator == "@"
        ));
        assert_eq!(compiled.evaluate(&EmptyContext).value, Value::Num(1.0));
    }

    #[test]
    fn type_mismatch_is_an_unsupported_operation() {
        let evaluation = ExpressionCompiler
            .compile(r#"1 - "a""#)
            .evaluate(&EmptyContext);
        assert_eq!(evaluation.value, Value::Null);
        assert!(matches!(
            evaluation.diagnostics.first().map(|d| &d.kind),
            Some(EvalDiagnosticKind::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn unbalanced_parenthesis_is_a_parse_error() {
        let compiled = ExpressionCompiler.compile("(1 + 2");
        assert!(matches!(
            compiled.diagnostics.first().map(|d| &d.kind),
            Some(EvalDiagnosticKind::ParseError { .. })
        ));
        assert_eq!(compiled.evaluate(&EmptyContext).value, Value::Num(3.0));
    }
}

mod literals {
    use super::*;

    #[test]
    fn numbers() {
        assert_eq!(eval("1.5"), Value::Num(1.5));
        assert_eq!(eval("0"), Value::Num(0.0));
    }

    #[test]
    fn strings_with_escapes() {
        assert_eq!(eval(r#""a\"b""#), Value::str("a\"b"));
        assert_eq!(eval(r#""line\nbreak""#), Value::str("line\nbreak"));
        assert_eq!(eval(r#""""#), Value::str(""));
    }

    #[test]
    fn keywords() {
        assert_eq!(eval("null"), Value::Null);
        assert_eq!(eval("true"), Value::Bool(true));
        assert_eq!(eval("false"), Value::Bool(false));
    }

    #[test]
    fn truthiness() {
        assert!(Value::Num(1.0).is_truthy());
        assert!(!Value::Num(0.0).is_truthy());
        assert!(Value::str("x").is_truthy());
        assert!(!Value::str("").is_truthy());
        assert!(!Value::Null.is_truthy());
    }
}
