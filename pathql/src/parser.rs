//! PathQL Parser using nom
//!
//! Parses PathQL statement strings into AST nodes.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while1},
    character::complete::{char, multispace0, multispace1, digit1, none_of},
    combinator::{map, opt, value},
    multi::{many0, separated_list1},
    sequence::{delimited, preceded, tuple},
};

use crate::ast::*;
use crate::error::ParseError;

/// Parse a complete statement
pub fn parse_statement(input: &str) -> Result<Statement, ParseError> {
    let input = input.trim();
    let (remaining, stmt) = statement(input).map_err(|e| locate(input, e))?;

    // Check for trailing content (ignoring whitespace and semicolons)
    let rest = remaining.trim().trim_end_matches(';').trim();
    if !rest.is_empty() {
        return Err(ParseError::located(
            format!("Unexpected trailing content: {}", rest),
            input,
            remaining.trim_start(),
        ));
    }

    Ok(stmt)
}

/// Parse a bare context chain (no SELECT/MODIFY wrapper)
pub fn parse_path(input: &str) -> Result<Vec<PathStep>, ParseError> {
    let input = input.trim();
    let (remaining, steps) = path(input).map_err(|e| locate(input, e))?;

    let rest = remaining.trim();
    if !rest.is_empty() {
        return Err(ParseError::located(
            format!("Unexpected trailing content: {}", rest),
            input,
            remaining.trim_start(),
        ));
    }

    Ok(steps)
}

/// Turn a nom error into a ParseError carrying the spot where parsing stopped
fn locate(input: &str, err: nom::Err<nom::error::Error<&str>>) -> ParseError {
    match err {
        nom::Err::Incomplete(_) => ParseError::new("Incomplete input"),
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let near: String = e.input.chars().take(20).collect();
            if near.is_empty() {
                ParseError::located("Unexpected end of input", input, e.input)
            } else {
                ParseError::located(format!("Unexpected input near: {}", near), input, e.input)
            }
        }
    }
}

// ============================================================================
// Statement Parsers
// ============================================================================

fn statement(input: &str) -> IResult<&str, Statement> {
    alt((
        map(select_stmt, Statement::Select),
        map(modify_stmt, Statement::Modify),
    ))(input)
}

// ============================================================================
// SELECT
// ============================================================================

fn select_stmt(input: &str) -> IResult<&str, SelectStmt> {
    let (input, _) = tag_no_case("SELECT")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, mode) = select_mode(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = tag_no_case("FROM")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, bin) = identifier(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = tag_no_case("AT")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, steps) = path(input)?;
    let (input, no_fail) = opt(preceded(multispace1, tag_no_case("NOFAIL")))(input)?;

    Ok((input, SelectStmt {
        bin: bin.to_string(),
        steps,
        selection: Selection {
            mode,
            no_fail: no_fail.is_some(),
        },
    }))
}

fn select_mode(input: &str) -> IResult<&str, SelectMode> {
    alt((
        value(SelectMode::Tree, tag_no_case("TREE")),
        value(SelectMode::Values, tag_no_case("VALUES")),
        value(SelectMode::Keys, tag_no_case("KEYS")),
        value(SelectMode::Count, tag_no_case("COUNT")),
    ))(input)
}

// ============================================================================
// MODIFY
// ============================================================================

fn modify_stmt(input: &str) -> IResult<&str, ModifyStmt> {
    let (input, _) = tag_no_case("MODIFY")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, bin) = identifier(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = tag_no_case("AT")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, steps) = path(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = tag_no_case("SET")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, set) = set_clause(input)?;
    let (input, target_bin) = opt(preceded(
        tuple((multispace1, tag_no_case("INTO"), multispace1)),
        identifier,
    ))(input)?;
    let (input, no_fail) = opt(preceded(multispace1, tag_no_case("NOFAIL")))(input)?;

    Ok((input, ModifyStmt {
        bin: bin.to_string(),
        steps,
        set,
        target_bin: target_bin.map(String::from),
        no_fail: no_fail.is_some(),
    }))
}

fn set_clause(input: &str) -> IResult<&str, SetClause> {
    let (input, key) = identifier(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char('=')(input)?;
    let (input, _) = multispace0(input)?;
    let (input, val) = arith_expr(input)?;

    Ok((input, SetClause {
        key: key.to_string(),
        value: val,
    }))
}

// ============================================================================
// Context chains
// ============================================================================

fn path(input: &str) -> IResult<&str, Vec<PathStep>> {
    separated_list1(
        tuple((multispace0, char('.'), multispace0)),
        step,
    )(input)
}

fn step(input: &str) -> IResult<&str, PathStep> {
    alt((
        star_step,
        index_step,
        map(string_literal, PathStep::Key),
        map(identifier, |s| PathStep::Key(s.to_string())),
    ))(input)
}

fn star_step(input: &str) -> IResult<&str, PathStep> {
    let (input, _) = char('*')(input)?;
    let (input, filter) = opt(preceded(
        multispace0,
        delimited(
            tuple((char('{'), multispace0)),
            expr,
            tuple((multispace0, char('}'))),
        ),
    ))(input)?;

    Ok((input, match filter {
        Some(f) => PathStep::Filtered(f),
        None => PathStep::AllChildren,
    }))
}

fn index_step(input: &str) -> IResult<&str, PathStep> {
    map(
        delimited(
            tuple((char('['), multispace0)),
            integer_literal,
            tuple((multispace0, char(']'))),
        ),
        PathStep::Index,
    )(input)
}

// ============================================================================
// Expressions
// ============================================================================

fn expr(input: &str) -> IResult<&str, Exp> {
    or_expr(input)
}

fn or_expr(input: &str) -> IResult<&str, Exp> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(
        tuple((multispace1, tag_no_case("OR"), multispace1)),
        and_expr,
    ))(input)?;

    Ok((input, rest.into_iter().fold(first, Exp::or)))
}

fn and_expr(input: &str) -> IResult<&str, Exp> {
    let (input, first) = not_expr(input)?;
    let (input, rest) = many0(preceded(
        tuple((multispace1, tag_no_case("AND"), multispace1)),
        not_expr,
    ))(input)?;

    Ok((input, rest.into_iter().fold(first, Exp::and)))
}

fn not_expr(input: &str) -> IResult<&str, Exp> {
    alt((
        map(
            preceded(tuple((tag_no_case("NOT"), multispace1)), not_expr),
            Exp::not,
        ),
        comparison_expr,
    ))(input)
}

fn comparison_expr(input: &str) -> IResult<&str, Exp> {
    alt((matches_expr, binary_comparison))(input)
}

fn matches_expr(input: &str) -> IResult<&str, Exp> {
    let (input, operand) = arith_expr(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = tag_no_case("MATCHES")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, pattern) = string_literal(input)?;

    Ok((input, Exp::regex_match(pattern, operand)))
}

fn binary_comparison(input: &str) -> IResult<&str, Exp> {
    let (input, left) = arith_expr(input)?;
    let (input, rest) = opt(tuple((
        multispace0,
        alt((
            value(BinaryOp::Eq, tag("=")),
            value(BinaryOp::Ne, alt((tag("!="), tag("<>")))),
            value(BinaryOp::Le, tag("<=")),
            value(BinaryOp::Lt, tag("<")),
            value(BinaryOp::Ge, tag(">=")),
            value(BinaryOp::Gt, tag(">")),
        )),
        multispace0,
        arith_expr,
    )))(input)?;

    match rest {
        Some((_, op, _, right)) => Ok((input, Exp::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })),
        None => Ok((input, left)),
    }
}

fn arith_expr(input: &str) -> IResult<&str, Exp> {
    let (input, first) = term_expr(input)?;
    let (input, rest) = many0(tuple((
        delimited(
            multispace0,
            alt((
                value(BinaryOp::Add, char('+')),
                value(BinaryOp::Sub, char('-')),
            )),
            multispace0,
        ),
        term_expr,
    )))(input)?;

    Ok((input, rest.into_iter().fold(first, |acc, (op, e)| Exp::Binary {
        left: Box::new(acc),
        op,
        right: Box::new(e),
    })))
}

fn term_expr(input: &str) -> IResult<&str, Exp> {
    let (input, first) = factor(input)?;
    let (input, rest) = many0(tuple((
        delimited(
            multispace0,
            alt((
                value(BinaryOp::Mul, char('*')),
                value(BinaryOp::Div, char('/')),
            )),
            multispace0,
        ),
        factor,
    )))(input)?;

    Ok((input, rest.into_iter().fold(first, |acc, (op, e)| Exp::Binary {
        left: Box::new(acc),
        op,
        right: Box::new(e),
    })))
}

fn factor(input: &str) -> IResult<&str, Exp> {
    alt((
        delimited(
            tuple((char('('), multispace0)),
            expr,
            tuple((multispace0, char(')'))),
        ),
        map(literal, Exp::Literal),
        field_or_loop,
    ))(input)
}

/// Bare identifiers inside a filter: `key`, `value`, and `index` refer to the
/// loop variable; anything else is a lookup of that key on the loop value,
/// optionally annotated with an expected type (`quantity:int`).
fn field_or_loop(input: &str) -> IResult<&str, Exp> {
    let (input, name) = identifier(input)?;

    match name.to_lowercase().as_str() {
        "key" => Ok((input, Exp::loop_key())),
        "value" => Ok((input, Exp::loop_value())),
        "index" => Ok((input, Exp::loop_index())),
        _ => {
            let (input, expected) = opt(preceded(char(':'), value_type))(input)?;
            Ok((input, Exp::map_get(
                name,
                expected.unwrap_or(ValueType::Any),
                Exp::loop_value(),
            )))
        }
    }
}

fn value_type(input: &str) -> IResult<&str, ValueType> {
    alt((
        value(ValueType::Bool, tag_no_case("BOOL")),
        value(ValueType::Int, tag_no_case("INT")),
        value(ValueType::Float, tag_no_case("FLOAT")),
        value(ValueType::String, tag_no_case("STRING")),
        value(ValueType::List, tag_no_case("LIST")),
        value(ValueType::Map, tag_no_case("MAP")),
        value(ValueType::Any, tag_no_case("ANY")),
    ))(input)
}

// ============================================================================
// Primitives
// ============================================================================

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-')(input)
}

fn literal(input: &str) -> IResult<&str, Literal> {
    alt((
        value(Literal::Null, tag_no_case("NULL")),
        value(Literal::Bool(true), tag_no_case("true")),
        value(Literal::Bool(false), tag_no_case("false")),
        map(float_literal, Literal::Float),
        map(integer_literal, Literal::Int),
        map(string_literal, Literal::String),
    ))(input)
}

fn integer_literal(input: &str) -> IResult<&str, i64> {
    let (input, neg) = opt(char('-'))(input)?;
    let (rest, digits) = digit1(input)?;
    // Failure, not Error: a literal too large for i64 must not backtrack
    // into being read as an identifier
    let val: i64 = digits
        .parse()
        .map_err(|_| nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Digit)))?;
    Ok((rest, if neg.is_some() { -val } else { val }))
}

fn float_literal(input: &str) -> IResult<&str, f64> {
    let (input, neg) = opt(char('-'))(input)?;
    let (rest, int_part) = digit1(input)?;
    let (rest, _) = char('.')(rest)?;
    let (rest, frac_part) = digit1(rest)?;
    let val: f64 = format!("{}.{}", int_part, frac_part)
        .parse()
        .map_err(|_| nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Float)))?;
    Ok((rest, if neg.is_some() { -val } else { val }))
}

fn string_literal(input: &str) -> IResult<&str, String> {
    alt((
        delimited(
            char('\''),
            map(
                many0(alt((
                    map(tag("''"), |_| "'".to_string()),
                    map(none_of("'"), |c| c.to_string()),
                ))),
                |v| v.join(""),
            ),
            char('\''),
        ),
        delimited(
            char('"'),
            map(
                many0(alt((
                    map(tag("\\\""), |_| "\"".to_string()),
                    map(tag("\\n"), |_| "\n".to_string()),
                    map(tag("\\t"), |_| "\t".to_string()),
                    map(tag("\\\\"), |_| "\\".to_string()),
                    map(none_of("\"\\"), |c| c.to_string()),
                ))),
                |v| v.join(""),
            ),
            char('"'),
        ),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_select() {
        let stmt = parse_statement("SELECT TREE FROM catalog AT *").unwrap();
        if let Statement::Select(s) = stmt {
            assert_eq!(s.bin, "catalog");
            assert_eq!(s.steps, vec![PathStep::AllChildren]);
            assert_eq!(s.selection.mode, SelectMode::Tree);
            assert!(!s.selection.no_fail);
        } else {
            panic!("Expected Select");
        }
    }

    #[test]
    fn test_parse_select_with_filters() {
        let stmt = parse_statement(
            "SELECT TREE FROM catalog AT *.*{featured = true}.variants.*{quantity:int > 0}",
        ).unwrap();
        if let Statement::Select(s) = stmt {
            assert_eq!(s.steps.len(), 4);
            assert!(matches!(s.steps[1], PathStep::Filtered(_)));
            assert_eq!(s.steps[2], PathStep::Key("variants".to_string()));
            if let PathStep::Filtered(Exp::Binary { left, op, .. }) = &s.steps[3] {
                assert_eq!(*op, BinaryOp::Gt);
                assert!(matches!(**left, Exp::MapGet { expected: ValueType::Int, .. }));
            } else {
                panic!("Expected filtered step");
            }
        } else {
            panic!("Expected Select");
        }
    }

    #[test]
    fn test_parse_select_keys_mode_nofail() {
        let stmt = parse_statement("SELECT KEYS FROM catalog AT *.* NOFAIL").unwrap();
        if let Statement::Select(s) = stmt {
            assert_eq!(s.selection.mode, SelectMode::Keys);
            assert!(s.selection.no_fail);
        } else {
            panic!("Expected Select");
        }
    }

    #[test]
    fn test_parse_matches_filter() {
        let stmt = parse_statement("SELECT TREE FROM catalog AT *.*{key MATCHES '10000.*'}").unwrap();
        if let Statement::Select(s) = stmt {
            if let PathStep::Filtered(Exp::Regex { pattern, exp }) = &s.steps[1] {
                assert_eq!(pattern, "10000.*");
                assert_eq!(**exp, Exp::loop_key());
            } else {
                panic!("Expected regex filter");
            }
        } else {
            panic!("Expected Select");
        }
    }

    #[test]
    fn test_parse_and_filter() {
        let stmt = parse_statement(
            "SELECT COUNT FROM catalog AT *{quantity > 0 AND price < 50}",
        ).unwrap();
        if let Statement::Select(s) = stmt {
            if let PathStep::Filtered(Exp::Binary { op, .. }) = &s.steps[0] {
                assert_eq!(*op, BinaryOp::And);
            } else {
                panic!("Expected AND filter");
            }
        } else {
            panic!("Expected Select");
        }
    }

    #[test]
    fn test_parse_modify() {
        let stmt = parse_statement(
            "MODIFY catalog AT *.*{featured = true}.variants.* SET quantity = quantity + 10",
        ).unwrap();
        if let Statement::Modify(m) = stmt {
            assert_eq!(m.bin, "catalog");
            assert_eq!(m.set.key, "quantity");
            assert!(m.target_bin.is_none());
            assert!(matches!(m.set.value, Exp::Binary { op: BinaryOp::Add, .. }));
        } else {
            panic!("Expected Modify");
        }
    }

    #[test]
    fn test_parse_modify_into_bin() {
        let stmt = parse_statement(
            "MODIFY catalog AT *.* SET quantity = 0 INTO updated NOFAIL",
        ).unwrap();
        if let Statement::Modify(m) = stmt {
            assert_eq!(m.target_bin.as_deref(), Some("updated"));
            assert!(m.no_fail);
        } else {
            panic!("Expected Modify");
        }
    }

    #[test]
    fn test_parse_quoted_key_and_index_steps() {
        let steps = parse_path("inventory.'10000001'.variants.[0]").unwrap();
        assert_eq!(steps[0], PathStep::Key("inventory".to_string()));
        assert_eq!(steps[1], PathStep::Key("10000001".to_string()));
        assert_eq!(steps[3], PathStep::Index(0));
    }

    #[test]
    fn test_parse_rejects_trailing_garbage() {
        assert!(parse_statement("SELECT TREE FROM catalog AT * garbage here").is_err());
    }

    #[test]
    fn test_parse_error_carries_location() {
        let err = parse_statement("SELECT TREE FROM catalog AT *{quantity >}").unwrap_err();
        assert!(err.offset.is_some());
        assert_eq!(err.line, Some(1));
        assert!(err.to_string().contains("line 1, column"));

        let err = parse_statement("SELECT TREE FROM catalog AT * garbage").unwrap_err();
        assert_eq!(err.offset, Some(30));
        assert_eq!(err.column, Some(31));
    }

    #[test]
    fn test_oversized_integer_literal_is_an_error() {
        // One past i64::MAX
        let err = parse_statement(
            "SELECT COUNT FROM catalog AT *{quantity > 9223372036854775808}",
        )
        .unwrap_err();
        assert!(err.offset.is_some());

        assert!(parse_statement("SELECT COUNT FROM catalog AT *{quantity > 9223372036854775807}").is_ok());
    }
}
