//! Shell statement grammar.
//!
//! ```text
//! statement  := "db" collection "." call ( "." call )* ";"?
//! collection := "." ident | ".getCollection(" string ")" | "[" string "]"
//! call       := ident "(" literal ( "," literal )* ")"
//! ```

use docanalyst_core::{AnalystError, ParsedQuery, QueryOperation, Result};
use nom::{
    IResult,
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, satisfy},
    combinator::{map, not, opt},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated, tuple},
};
use serde_json::Value;

use super::literal::{identifier, is_ident_char, quoted, sequence, ws};

/// One method call, with the input it started at.
#[derive(Debug)]
struct Call<'a> {
    name: &'a str,
    at: &'a str,
    args: Vec<Value>,
}

#[derive(Debug)]
struct Statement<'a> {
    collection: String,
    call: Call<'a>,
    chain: Vec<Call<'a>>,
}

fn call(input: &str) -> IResult<&str, Call<'_>> {
    let at = input;
    let (rest, (name, _, args)) = tuple((
        identifier,
        ws,
        delimited(pair(char('('), ws), sequence(')'), char(')')),
    ))(input)?;
    Ok((rest, Call { name, at, args }))
}

fn collection(input: &str) -> IResult<&str, String> {
    alt((
        preceded(
            tuple((char('.'), ws, tag("getCollection"), ws, char('('), ws)),
            terminated(quoted, pair(ws, char(')'))),
        ),
        delimited(pair(char('['), ws), quoted, pair(ws, char(']'))),
        map(preceded(pair(char('.'), ws), identifier), str::to_string),
    ))(input)
}

fn statement(input: &str) -> IResult<&str, Statement<'_>> {
    let (input, _) = tuple((ws, tag("db"), not(satisfy(is_ident_char)), ws))(input)?;
    let (input, collection) = collection(input)?;
    let (input, first) = preceded(tuple((ws, char('.'), ws)), call)(input)?;
    let (input, chain) = many0(preceded(tuple((ws, char('.'), ws)), call))(input)?;
    let (input, _) = tuple((ws, opt(char(';')), ws))(input)?;
    Ok((
        input,
        Statement {
            collection,
            call: first,
            chain,
        },
    ))
}

/// Parse a shell statement into its structural reading, without references.
pub(crate) fn parse_statement(text: &str) -> Result<ParsedQuery> {
    let (rest, statement) = statement(text).map_err(|e| nom_error(text, &e))?;
    if !rest.is_empty() {
        return Err(AnalystError::syntax(
            format!("unexpected input after the query: '{}'", snippet(rest)),
            offset(text, rest),
        ));
    }
    interpret(text, statement)
}

fn interpret(text: &str, statement: Statement<'_>) -> Result<ParsedQuery> {
    let Statement {
        collection,
        call,
        chain,
    } = statement;

    let operation = match call.name {
        "find" => QueryOperation::Find,
        "findOne" => QueryOperation::FindOne,
        "aggregate" => QueryOperation::Aggregate,
        "countDocuments" | "count" => QueryOperation::Count,
        "distinct" => QueryOperation::Distinct,
        other => {
            return Err(AnalystError::syntax(
                format!("unsupported method '{other}'"),
                offset(text, call.at),
            ));
        }
    };

    let arguments = check_arguments(operation, &call, text)?;
    let mut parsed = ParsedQuery::new(collection, operation);
    parsed.arguments = arguments;

    let method = call.name;
    for link in chain {
        let misplaced = || {
            AnalystError::syntax(
                format!("'.{}()' cannot follow {method}()", link.name),
                offset(text, link.at),
            )
        };
        match link.name {
            "sort" | "limit" | "skip" | "count" if parsed.operation != QueryOperation::Find => {
                return Err(misplaced());
            }
            "sort" => match link.args.as_slice() {
                [sort @ Value::Object(_)] => parsed.modifiers.sort = Some(sort.clone()),
                _ => return Err(bad_arguments(text, &link, "a sort document")),
            },
            "limit" => parsed.modifiers.limit = Some(count_argument(text, &link)?),
            "skip" => parsed.modifiers.skip = Some(count_argument(text, &link)?),
            "count" => parsed.operation = QueryOperation::Count,
            "toArray" | "pretty"
                if matches!(
                    parsed.operation,
                    QueryOperation::Find | QueryOperation::Aggregate
                ) => {}
            "toArray" | "pretty" => return Err(misplaced()),
            other => {
                return Err(AnalystError::syntax(
                    format!("unsupported cursor method '{other}'"),
                    offset(text, link.at),
                ));
            }
        }
    }

    Ok(parsed)
}

fn check_arguments(operation: QueryOperation, call: &Call<'_>, text: &str) -> Result<Vec<Value>> {
    let args = call.args.as_slice();
    let all_documents = |values: &[Value]| values.iter().all(Value::is_object);

    match operation {
        QueryOperation::Find | QueryOperation::FindOne if args.len() <= 2 && all_documents(args) => {
            Ok(args.to_vec())
        }
        QueryOperation::Find | QueryOperation::FindOne => Err(bad_arguments(
            text,
            call,
            "an optional filter document and projection",
        )),
        QueryOperation::Count if args.len() <= 2 && all_documents(args) => Ok(args.to_vec()),
        QueryOperation::Count => Err(bad_arguments(text, call, "an optional filter document")),
        QueryOperation::Aggregate => match args {
            [Value::Array(stages), rest @ ..]
                if rest.len() <= 1 && all_documents(rest) && stages.iter().all(is_stage) =>
            {
                Ok(args.to_vec())
            }
            // Stages passed one by one, as the legacy shell allows.
            stages if !stages.is_empty() && stages.iter().all(is_stage) => {
                Ok(vec![Value::Array(stages.to_vec())])
            }
            _ => Err(bad_arguments(text, call, "a pipeline of stage documents")),
        },
        QueryOperation::Distinct => match args {
            [Value::String(_)] => Ok(args.to_vec()),
            [Value::String(_), Value::Object(_)] => Ok(args.to_vec()),
            _ => Err(bad_arguments(
                text,
                call,
                "a field name and an optional filter document",
            )),
        },
    }
}

/// A stage is a document with exactly one `$`-prefixed key.
fn is_stage(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|stage| stage.len() == 1 && stage.keys().all(|k| k.starts_with('$')))
}

fn count_argument(text: &str, call: &Call<'_>) -> Result<u64> {
    match call.args.as_slice() {
        [Value::Number(n)] => n
            .as_u64()
            .ok_or_else(|| bad_arguments(text, call, "a non-negative integer")),
        _ => Err(bad_arguments(text, call, "a non-negative integer")),
    }
}

fn bad_arguments(text: &str, call: &Call<'_>, expected: &str) -> AnalystError {
    AnalystError::syntax(
        format!("{}() expects {expected}", call.name),
        offset(text, call.at),
    )
}

fn nom_error(text: &str, error: &nom::Err<nom::error::Error<&str>>) -> AnalystError {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) if e.input.is_empty() => {
            AnalystError::syntax("unexpected end of query", text.len())
        }
        nom::Err::Error(e) | nom::Err::Failure(e) => AnalystError::syntax(
            format!("unexpected input near '{}'", snippet(e.input)),
            offset(text, e.input),
        ),
        nom::Err::Incomplete(_) => AnalystError::syntax("unexpected end of query", text.len()),
    }
}

/// Byte offset of `rest` inside `text`.
pub(crate) fn offset(text: &str, rest: &str) -> usize {
    text.len().saturating_sub(rest.len())
}

fn snippet(rest: &str) -> String {
    const SNIPPET_CHARS: usize = 20;
    let line = rest.lines().next().unwrap_or(rest);
    let mut snippet: String = line.chars().take(SNIPPET_CHARS).collect();
    if line.chars().count() > SNIPPET_CHARS {
        snippet.push_str("...");
    }
    snippet
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_case::test_case;

    #[test]
    fn test_find_with_modifiers() {
        let parsed = parse_statement(
            "db.customers.find({city: 'New York'}, {name: 1}).sort({name: 1}).limit(10).skip(5);",
        )
        .unwrap();

        assert_eq!(parsed.collection, "customers");
        assert_eq!(parsed.operation, QueryOperation::Find);
        assert_eq!(
            parsed.arguments,
            vec![json!({"city": "New York"}), json!({"name": 1})]
        );
        assert_eq!(parsed.modifiers.sort, Some(json!({"name": 1})));
        assert_eq!(parsed.modifiers.limit, Some(10));
        assert_eq!(parsed.modifiers.skip, Some(5));
    }

    #[test_case("db.orders.countDocuments({})", QueryOperation::Count; "count documents")]
    #[test_case("db.orders.count()", QueryOperation::Count; "count")]
    #[test_case("db.orders.find({status: 'open'}).count()", QueryOperation::Count; "cursor count")]
    #[test_case("db.orders.findOne()", QueryOperation::FindOne; "find one")]
    #[test_case("db.orders.distinct('status')", QueryOperation::Distinct; "distinct")]
    #[test_case("db.getCollection('order-items').find()", QueryOperation::Find; "get collection")]
    #[test_case("db['orders'].aggregate([{$match: {}}])", QueryOperation::Aggregate; "bracket access")]
    fn test_operations(text: &str, expected: QueryOperation) {
        assert_eq!(parse_statement(text).unwrap().operation, expected);
    }

    #[test]
    fn test_legacy_stage_arguments_become_a_pipeline() {
        let parsed =
            parse_statement("db.orders.aggregate({$match: {paid: true}}, {$count: 'n'})").unwrap();
        assert_eq!(
            parsed.arguments,
            vec![json!([{"$match": {"paid": true}}, {"$count": "n"}])]
        );
    }

    #[test]
    fn test_cursor_chain_after_first_call() {
        let parsed = parse_statement("db.customers .find({})\n  .limit(3) .skip(1)").unwrap();
        assert_eq!(parsed.operation, QueryOperation::Find);
        assert_eq!(parsed.modifiers.limit, Some(3));
        assert_eq!(parsed.modifiers.skip, Some(1));
    }

    #[test]
    fn test_multiline_statement() {
        let text = "db.orders.aggregate([\n  { $match: { total: { $gt: 100 } } },\n  { $group: { _id: '$city', n: { $sum: 1 } } }\n])";
        let parsed = parse_statement(text).unwrap();
        assert_eq!(parsed.arguments[0].as_array().map(Vec::len), Some(2));
    }

    #[test_case("db.customers.drop()", "unsupported method 'drop'"; "unsupported method")]
    #[test_case("db.customers.findOne({}).limit(1)", "'.limit()' cannot follow findOne()"; "cursor method on document")]
    #[test_case("db.customers.find({}).explain()", "unsupported cursor method 'explain'"; "unsupported cursor method")]
    #[test_case("db.customers.find({}).limit(-1)", "limit() expects a non-negative integer"; "negative limit")]
    #[test_case("db.customers.distinct({city: 1})", "distinct() expects a field name"; "distinct without key")]
    #[test_case("db.customers.aggregate([{$match: {}, $limit: 1}])", "aggregate() expects a pipeline"; "two-key stage")]
    #[test_case("db.customers.find('city')", "find() expects an optional filter"; "string filter")]
    #[test_case("db.customers.find({city: 'NY'})\nprint('done')", "unexpected input after the query"; "trailing statement")]
    #[test_case("db.customers.find({city: 'NY'}", "unexpected"; "unclosed call")]
    #[test_case("SELECT * FROM customers", "unexpected input near 'SELECT * FROM custom...'"; "not a shell query")]
    #[test_case("", "unexpected end of query"; "empty")]
    fn test_rejections(text: &str, message: &str) {
        let err = parse_statement(text).unwrap_err();
        assert!(matches!(err, AnalystError::Syntax { .. }));
        assert!(
            err.to_string().contains(message),
            "{err} does not mention {message}"
        );
    }

    #[test]
    fn test_error_offset_points_at_the_method() {
        let err = parse_statement("db.customers.remove({})").unwrap_err();
        match err {
            AnalystError::Syntax { offset, .. } => assert_eq!(offset, 13),
            other => panic!("unexpected error: {other}"),
        }
    }
}
