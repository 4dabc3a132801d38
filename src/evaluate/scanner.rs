use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{is_not, tag},
    character::{
        anychar,
        complete::{alpha1, alphanumeric1, char, digit1, space0},
    },
    combinator::{map, map_res, opt, recognize, success, value},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated},
};
use nom_locate::LocatedSpan;

use super::token::{ExprToken, ExprTokens};

type Span<'a> = LocatedSpan<&'a str>;

/// Tokenizes an inline expression. The scanner is total: characters it does
/// not recognize become [`ExprToken::UnknownOperator`] tokens and are
/// diagnosed later, so lexing malformed input still yields a token stream.
pub fn read_expr_tokens(source: &str) -> ExprTokens<'_> {
    let input = Span::new(source);
    match terminated(many0(preceded(space0, read_expr_token)), space0).parse(input) {
        Ok((rest, mut tokens)) => {
            tokens.push(ExprToken::Eof {
                pos: rest.location_offset(),
            });
            tokens
        }
        Err(_) => vec![ExprToken::Eof { pos: 0 }],
    }
}

fn read_expr_token(input: Span) -> IResult<Span, ExprToken> {
    let pos = input.location_offset();
    alt((
        |input| read_string_literal(input, pos),
        |input| read_number_literal(input, pos),
        |input| read_word(input, pos),
        |input| read_operator(input, pos),
        map(recognize(anychar), move |span: Span| {
            ExprToken::UnknownOperator {
                pos,
                text: *span.fragment(),
            }
        }),
    ))
    .parse(input)
}

fn read_string_literal(input: Span, pos: usize) -> IResult<Span, ExprToken> {
    map(
        delimited(
            char('"'),
            many0(alt((
                map(is_not("\"\\"), |span: Span| span.fragment().to_string()),
                preceded(
                    char('\\'),
                    alt((
                        value("\"".to_string(), char('"')),
                        value("\\".to_string(), char('\\')),
                        value("\n".to_string(), char('n')),
                        value("\t".to_string(), char('t')),
                    )),
                ),
            ))),
            char('"'),
        ),
        move |parts| ExprToken::StringLiteral {
            pos,
            value: parts.concat(),
        },
    )
    .parse(input)
}

fn read_number_literal(input: Span, pos: usize) -> IResult<Span, ExprToken> {
    map_res(
        recognize(pair(digit1, opt(pair(char('.'), digit1)))),
        move |span: Span| {
            span.fragment()
                .parse()
                .map(|value| ExprToken::NumberLiteral { pos, value })
        },
    )
    .parse(input)
}

fn read_word(input: Span, pos: usize) -> IResult<Span, ExprToken> {
    map(
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0(alt((alphanumeric1, tag("_")))),
        )),
        move |span: Span| match *span.fragment() {
            "null" => ExprToken::NullKeyword { pos },
            "true" => ExprToken::TrueKeyword { pos },
            "false" => ExprToken::FalseKeyword { pos },
            "and" => ExprToken::And2 { pos },
            "or" => ExprToken::Or2 { pos },
            "not" => ExprToken::Not { pos },
            name => ExprToken::Identifier { pos, name },
        },
    )
    .parse(input)
}

fn read_operator(input: Span, pos: usize) -> IResult<Span, ExprToken> {
    alt((
        value(ExprToken::And2 { pos }, tag("&&")),
        value(ExprToken::Or2 { pos }, tag("||")),
        value(ExprToken::Eq2 { pos }, tag("==")),
        value(ExprToken::NotEq { pos }, tag("!=")),
        value(ExprToken::LtEq { pos }, tag("<=")),
        value(ExprToken::GtEq { pos }, tag(">=")),
        value(ExprToken::Lt { pos }, char('<')),
        value(ExprToken::Gt { pos }, char('>')),
        preceded(
            char('!'),
            alt((
                value(ExprToken::NotEq { pos }, char('=')),
                success(ExprToken::Not { pos }),
            )),
        ),
        value(ExprToken::Percent { pos }, char('%')),
        value(ExprToken::OpenParen { pos }, char('(')),
        value(ExprToken::CloseParen { pos }, char(')')),
        value(ExprToken::Asterisk { pos }, char('*')),
        value(ExprToken::Plus { pos }, char('+')),
        value(ExprToken::Minus { pos }, char('-')),
        value(ExprToken::Slash { pos }, char('/')),
    ))
    .parse(input)
}
