//! JavaScript literal parser for shell query arguments.
//!
//! Shell arguments are JavaScript, not JSON: keys may be unquoted, strings
//! may use single quotes, and values may be constructor calls such as
//! `ObjectId("...")` or `new Date("...")`. Everything is read into
//! [`serde_json::Value`], with BSON-only values in extended-JSON form
//! (`{"$oid": ...}`, `{"$date": ...}`, `{"$regex": ..., "$options": ...}`).

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{is_not, tag, take_until, take_while, take_while1},
    character::complete::{alpha0, char, multispace1, satisfy},
    combinator::{map, not, opt, peek, recognize, value},
    error::{Error, ErrorKind},
    multi::{many0_count, separated_list0},
    number::complete::recognize_float,
    sequence::{delimited, pair, terminated, tuple},
};
use serde_json::{Map, Number, Value};

/// Skip whitespace and comments.
pub(crate) fn ws(input: &str) -> IResult<&str, &str> {
    recognize(many0_count(alt((
        multispace1,
        recognize(pair(tag("//"), opt(is_not("\n\r")))),
        recognize(tuple((tag("/*"), take_until("*/"), tag("*/")))),
    ))))(input)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// A JavaScript identifier.
pub(crate) fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(satisfy(is_ident_start), take_while(is_ident_char)))(input)
}

/// Any literal value.
pub(crate) fn literal(input: &str) -> IResult<&str, Value> {
    alt((
        object,
        array,
        map(quoted, Value::String),
        regex,
        number,
        keyword,
        constructor,
    ))(input)
}

/// Comma-separated values up to (not including) `close`, trailing comma allowed.
pub(crate) fn sequence(close: char) -> impl FnMut(&str) -> IResult<&str, Vec<Value>> {
    move |input| {
        terminated(
            separated_list0(delimited(ws, char(','), ws), literal),
            tuple((ws, opt(char(',')), ws, peek(char(close)))),
        )(input)
    }
}

fn object(input: &str) -> IResult<&str, Value> {
    let entry = tuple((object_key, ws, char(':'), ws, literal));
    map(
        delimited(
            pair(char('{'), ws),
            separated_list0(delimited(ws, char(','), ws), entry),
            tuple((ws, opt(char(',')), ws, char('}'))),
        ),
        |entries| {
            let mut fields = Map::new();
            for (key, _, _, _, value) in entries {
                fields.insert(key, value);
            }
            Value::Object(fields)
        },
    )(input)
}

fn object_key(input: &str) -> IResult<&str, String> {
    alt((
        quoted,
        map(identifier, str::to_string),
        map(take_while1(|c: char| c.is_ascii_digit()), str::to_string),
    ))(input)
}

fn array(input: &str) -> IResult<&str, Value> {
    map(
        delimited(pair(char('['), ws), sequence(']'), char(']')),
        Value::Array,
    )(input)
}

/// A single- or double-quoted string with backslash escapes.
pub(crate) fn quoted(input: &str) -> IResult<&str, String> {
    let mut chars = input.char_indices();
    let quote = match chars.next() {
        Some((_, q @ ('"' | '\''))) => q,
        _ => return Err(nom::Err::Error(Error::new(input, ErrorKind::Char))),
    };

    let mut out = String::new();
    let mut escaped = false;
    for (i, c) in chars {
        if escaped {
            out.push(match c {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                other => other,
            });
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Ok((&input[i + c.len_utf8()..], out));
        } else {
            out.push(c);
        }
    }

    // Unterminated string: nothing else can match here.
    Err(nom::Err::Failure(Error::new(input, ErrorKind::Char)))
}

fn regex(input: &str) -> IResult<&str, Value> {
    let (rest, _) = char('/')(input)?;
    let mut escaped = false;
    let mut end = None;
    for (i, c) in rest.char_indices() {
        match c {
            '\n' => break,
            '\\' if !escaped => escaped = true,
            '/' if !escaped => {
                end = Some(i);
                break;
            }
            _ => escaped = false,
        }
    }
    let Some(end) = end.filter(|&end| end > 0) else {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::Char)));
    };

    let pattern = &rest[..end];
    let (rest, flags) = alpha0(&rest[end + 1..])?;
    let mut regex = Map::new();
    regex.insert("$regex".to_string(), Value::String(pattern.to_string()));
    if !flags.is_empty() {
        regex.insert("$options".to_string(), Value::String(flags.to_string()));
    }
    Ok((rest, Value::Object(regex)))
}

fn number(input: &str) -> IResult<&str, Value> {
    let (rest, text) = terminated(recognize_float, not(satisfy(is_ident_char)))(input)?;
    match number_value(text) {
        Some(value) => Ok((rest, value)),
        None => Err(nom::Err::Error(Error::new(input, ErrorKind::Float))),
    }
}

fn number_value(text: &str) -> Option<Value> {
    let text = text.strip_prefix('+').unwrap_or(text);
    if !text.contains(['.', 'e', 'E']) {
        if let Ok(n) = text.parse::<i64>() {
            return Some(Value::Number(n.into()));
        }
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn keyword(input: &str) -> IResult<&str, Value> {
    terminated(
        alt((
            value(Value::Bool(true), tag("true")),
            value(Value::Bool(false), tag("false")),
            value(Value::Null, tag("null")),
            value(Value::Null, tag("undefined")),
        )),
        not(satisfy(is_ident_char)),
    )(input)
}

/// `ObjectId("..")`, `ISODate("..")`, `new Date("..")`, `NumberLong(..)` and friends.
fn constructor(input: &str) -> IResult<&str, Value> {
    let (rest, (_, name, _, args)) = tuple((
        opt(terminated(tag("new"), multispace1)),
        identifier,
        ws,
        delimited(pair(char('('), ws), sequence(')'), char(')')),
    ))(input)?;

    let failure = || nom::Err::Failure(Error::new(input, ErrorKind::Verify));
    let first = args.into_iter().next();
    let parsed = match name {
        "ObjectId" => match first {
            Some(Value::String(id)) => single("$oid", Value::String(id)),
            _ => return Err(failure()),
        },
        "ISODate" | "Date" => match first {
            Some(Value::String(date)) => single("$date", Value::String(date)),
            Some(Value::Number(millis)) => single("$date", Value::Number(millis)),
            None => single("$date", Value::Null),
            _ => return Err(failure()),
        },
        "NumberInt" | "NumberLong" | "NumberDecimal" | "Decimal128" => match first {
            Some(Value::Number(n)) => Value::Number(n),
            Some(Value::String(text)) => match number_value(&text) {
                Some(number) if name != "NumberDecimal" && name != "Decimal128" => number,
                _ => single("$numberDecimal", Value::String(text)),
            },
            _ => return Err(failure()),
        },
        _ => return Err(failure()),
    };
    Ok((rest, parsed))
}

fn single(key: &str, value: Value) -> Value {
    let mut fields = Map::new();
    fields.insert(key.to_string(), value);
    Value::Object(fields)
}

/// Parse exactly one literal, ignoring surrounding whitespace.
#[cfg(test)]
pub(crate) fn parse_literal(input: &str) -> Option<Value> {
    nom::combinator::all_consuming(delimited(ws, literal, ws))(input)
        .ok()
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_case::test_case;

    #[test_case("{location: 'New York'}", json!({"location": "New York"}); "unquoted key single quotes")]
    #[test_case("{\"a\": 1, 'b': -2.5, c: true, d: null}", json!({"a": 1, "b": -2.5, "c": true, "d": null}); "mixed keys")]
    #[test_case("[1, 2, 3,]", json!([1, 2, 3]); "trailing comma")]
    #[test_case("{ $and: [ {age: {$gte: 18}}, {age: {$lt: 65}} ] }", json!({"$and": [{"age": {"$gte": 18}}, {"age": {"$lt": 65}}]}); "operators")]
    #[test_case("ObjectId('5f1d7a3b2c4e5a6b7c8d9e0f')", json!({"$oid": "5f1d7a3b2c4e5a6b7c8d9e0f"}); "object id")]
    #[test_case("new Date(\"2024-10-24\")", json!({"$date": "2024-10-24"}); "new date")]
    #[test_case("ISODate('2024-01-01T00:00:00Z')", json!({"$date": "2024-01-01T00:00:00Z"}); "iso date")]
    #[test_case("NumberLong('42')", json!(42); "number long")]
    #[test_case("NumberDecimal('9.99')", json!({"$numberDecimal": "9.99"}); "decimal")]
    #[test_case("/^john/i", json!({"$regex": "^john", "$options": "i"}); "regex")]
    #[test_case("{ // owner\n name: 'x' /* inline */ }", json!({"name": "x"}); "comments")]
    #[test_case("'it\\'s'", json!("it's"); "escaped quote")]
    fn test_literals(input: &str, expected: Value) {
        assert_eq!(parse_literal(input), Some(expected));
    }

    #[test_case("{a: }"; "missing value")]
    #[test_case("{'a': 1"; "unclosed object")]
    #[test_case("'unterminated"; "unterminated string")]
    #[test_case("{address.city: 1}"; "dotted unquoted key")]
    #[test_case("Foo(1)"; "unknown constructor")]
    #[test_case("trueish"; "keyword prefix")]
    fn test_rejects(input: &str) {
        assert_eq!(parse_literal(input), None);
    }

    #[test]
    fn test_integer_and_float_numbers() {
        assert_eq!(parse_literal("7"), Some(json!(7)));
        assert_eq!(parse_literal("1e3"), Some(json!(1000.0)));
        assert!(parse_literal("7").unwrap().is_i64());
    }
}
