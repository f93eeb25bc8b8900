use crate::language::{
    ast::{Expr, FunctionDef, Stmt},
    errors::ParseError,
};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, digit1, multispace1, not_line_ending, satisfy},
    combinator::{cut, map, map_res, not, opt, recognize, value},
    error::{Error as NomError, ErrorKind},
    multi::{many0, separated_list0},
    sequence::{pair, preceded, terminated, tuple},
    IResult,
};

type PResult<'a, T> = IResult<&'a str, T>;

const KEYWORDS: [&str; 6] = ["fun", "return", "if", "then", "else", "null"];

pub fn parse_program(source: &str) -> Result<Vec<Stmt>, ParseError> {
    let mut statements = Vec::new();
    let mut input = source;
    loop {
        let (rest, _) = skip_ws(input);
        if rest.is_empty() {
            return Ok(statements);
        }
        match statement(rest) {
            Ok((rest, stmt)) => {
                statements.push(stmt);
                input = rest;
            }
            Err(err) => return Err(to_parse_error(source, err)),
        }
    }
}

fn to_parse_error(source: &str, err: nom::Err<NomError<&str>>) -> ParseError {
    let failure = match err {
        nom::Err::Incomplete(_) => {
            return ParseError::new("unexpected end of input", source.len(), 0);
        }
        nom::Err::Error(failure) | nom::Err::Failure(failure) => failure,
    };
    let (remaining, _) = skip_ws(failure.input);
    let offset = source.len() - remaining.len();
    if remaining.is_empty() {
        return ParseError::new("unexpected end of input", offset, 0)
            .with_help("a closing `)`, `}` or `;` may be missing");
    }
    let len = remaining
        .split(|c: char| c.is_whitespace())
        .next()
        .map_or(1, |word| word.len().max(1));
    match failure.code {
        ErrorKind::Escaped => ParseError::new("unknown escape sequence", offset, len)
            .with_help("supported escapes are \\n, \\t, \\\" and \\\\"),
        ErrorKind::Char if remaining.starts_with(|c: char| c.is_ascii_alphanumeric()) => {
            ParseError::new("expected punctuation", offset, len)
        }
        _ => ParseError::new(format!("unexpected `{}`", &remaining[..len]), offset, len),
    }
}

fn skip_ws(input: &str) -> (&str, ()) {
    match ws(input) {
        Ok(done) => done,
        Err(_) => (input, ()),
    }
}

fn ws(input: &str) -> PResult<'_, ()> {
    value((), many0(alt((multispace1, line_comment))))(input)
}

fn line_comment(input: &str) -> PResult<'_, &str> {
    recognize(pair(tag("//"), not_line_ending))(input)
}

fn symbol<'a>(text: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    preceded(ws, tag(text))
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    preceded(ws, terminated(tag(word), not(satisfy(is_ident_char))))
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn identifier(input: &str) -> PResult<'_, String> {
    let (start, _) = ws(input)?;
    let (rest, name) = recognize(pair(satisfy(is_ident_start), take_while(is_ident_char)))(start)?;
    if KEYWORDS.contains(&name) {
        return Err(nom::Err::Error(NomError::new(start, ErrorKind::Tag)));
    }
    Ok((rest, name.to_string()))
}

fn statement(input: &str) -> PResult<'_, Stmt> {
    alt((function_def, return_stmt, expression_stmt))(input)
}

fn function_def(input: &str) -> PResult<'_, Stmt> {
    let (input, _) = keyword("fun")(input)?;
    cut(map(
        tuple((
            identifier,
            symbol("("),
            separated_list0(symbol(","), identifier),
            symbol(")"),
            symbol("{"),
            many0(statement),
            symbol("}"),
        )),
        |(name, _, params, _, _, body, _)| Stmt::Function(FunctionDef { name, params, body }),
    ))(input)
}

fn return_stmt(input: &str) -> PResult<'_, Stmt> {
    let (input, _) = keyword("return")(input)?;
    cut(map(terminated(opt(expression), symbol(";")), Stmt::Return))(input)
}

fn expression_stmt(input: &str) -> PResult<'_, Stmt> {
    let (input, expr) = expression(input)?;
    let (input, _) = cut(symbol(";"))(input)?;
    Ok((input, Stmt::Expr(expr)))
}

fn expression(input: &str) -> PResult<'_, Expr> {
    alt((
        if_expr,
        null_literal,
        number,
        string_literal,
        call_or_variable,
        parenthesized,
    ))(input)
}

fn if_expr(input: &str) -> PResult<'_, Expr> {
    let (input, _) = keyword("if")(input)?;
    cut(map(
        tuple((
            expression,
            keyword("then"),
            expression,
            keyword("else"),
            expression,
        )),
        |(condition, _, then_branch, _, else_branch)| Expr::If {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        },
    ))(input)
}

fn null_literal(input: &str) -> PResult<'_, Expr> {
    value(Expr::Null, keyword("null"))(input)
}

fn number(input: &str) -> PResult<'_, Expr> {
    let float = map_res(
        recognize(tuple((opt(char('-')), digit1, char('.'), digit1))),
        |text: &str| text.parse::<f64>().map(Expr::Float),
    );
    let int = map_res(recognize(pair(opt(char('-')), digit1)), |text: &str| {
        text.parse::<i64>().map(Expr::Int)
    });
    preceded(ws, terminated(alt((float, int)), not(satisfy(is_ident_char))))(input)
}

fn string_literal(input: &str) -> PResult<'_, Expr> {
    let (input, _) = preceded(ws, char('"'))(input)?;
    cut(map(terminated(string_body, char('"')), Expr::Str))(input)
}

fn string_body(input: &str) -> PResult<'_, String> {
    let mut text = String::new();
    let mut rest = input;
    loop {
        let (after, chunk) = take_while(|c| c != '"' && c != '\\')(rest)?;
        text.push_str(chunk);
        rest = after;
        let Some(stripped) = rest.strip_prefix('\\') else {
            return Ok((rest, text));
        };
        let mut chars = stripped.chars();
        let escaped = match chars.next() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('"') => '"',
            Some('\\') => '\\',
            _ => return Err(nom::Err::Failure(NomError::new(rest, ErrorKind::Escaped))),
        };
        text.push(escaped);
        rest = chars.as_str();
    }
}

fn call_or_variable(input: &str) -> PResult<'_, Expr> {
    let (input, name) = identifier(input)?;
    let (input, args) = opt(preceded(
        symbol("("),
        cut(terminated(
            separated_list0(symbol(","), expression),
            symbol(")"),
        )),
    ))(input)?;
    let expr = match args {
        Some(args) => Expr::Call { name, args },
        None => Expr::Variable(name),
    };
    Ok((input, expr))
}

fn parenthesized(input: &str) -> PResult<'_, Expr> {
    preceded(symbol("("), cut(terminated(expression, symbol(")"))))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Expr>) -> Expr {
        Expr::Call {
            name: name.into(),
            args,
        }
    }

    #[test]
    fn parses_function_with_params_and_return() {
        let program = parse_program(
            "// pick the second argument\nfun second(a, b) {\n  return b;\n}\n",
        )
        .expect("parse");
        assert_eq!(
            program,
            vec![Stmt::Function(FunctionDef {
                name: "second".into(),
                params: vec!["a".into(), "b".into()],
                body: vec![Stmt::Return(Some(Expr::Variable("b".into())))],
            })]
        );
    }

    #[test]
    fn parses_literals_in_call_arguments() {
        let program =
            parse_program("fun main() { println(null, 42, -7, 2.5, \"a\\tb\\n\"); return; }")
                .expect("parse");
        let Stmt::Function(def) = &program[0] else {
            panic!("expected a function, got {:?}", program[0]);
        };
        assert_eq!(
            def.body,
            vec![
                Stmt::Expr(call(
                    "println",
                    vec![
                        Expr::Null,
                        Expr::Int(42),
                        Expr::Int(-7),
                        Expr::Float(2.5),
                        Expr::Str("a\tb\n".into()),
                    ]
                )),
                Stmt::Return(None),
            ]
        );
    }

    #[test]
    fn nested_if_expressions_associate_to_the_right() {
        let program =
            parse_program("fun f(x) { return if x then 1 else if (0) then 2 else 3; }")
                .expect("parse");
        let Stmt::Function(def) = &program[0] else {
            panic!("expected a function");
        };
        let expected = Expr::If {
            condition: Box::new(Expr::Variable("x".into())),
            then_branch: Box::new(Expr::Int(1)),
            else_branch: Box::new(Expr::If {
                condition: Box::new(Expr::Int(0)),
                then_branch: Box::new(Expr::Int(2)),
                else_branch: Box::new(Expr::Int(3)),
            }),
        };
        assert_eq!(def.body, vec![Stmt::Return(Some(expected))]);
    }

    #[test]
    fn keywords_need_a_word_boundary() {
        let program = parse_program("funky(nullable, iffy);").expect("parse");
        assert_eq!(
            program,
            vec![Stmt::Expr(call(
                "funky",
                vec![
                    Expr::Variable("nullable".into()),
                    Expr::Variable("iffy".into())
                ]
            ))]
        );
    }

    #[test]
    fn missing_semicolon_points_at_next_token() {
        let source = "fun main() {\n  println(1)\n}";
        let err = parse_program(source).unwrap_err();
        assert_eq!(err.offset, source.rfind('}').unwrap());
        assert_eq!(err.message, "unexpected `}`");
    }

    #[test]
    fn unterminated_body_reports_end_of_input() {
        let source = "fun main() { println(1);";
        let err = parse_program(source).unwrap_err();
        assert_eq!(err.message, "unexpected end of input");
        assert_eq!(err.offset, source.len());
        assert!(err.help.is_some());
    }

    #[test]
    fn bad_escape_is_reported_at_the_backslash() {
        let source = "fun main() { print(\"a\\q\"); }";
        let err = parse_program(source).unwrap_err();
        assert_eq!(err.message, "unknown escape sequence");
        assert_eq!(err.offset, source.find('\\').unwrap());
    }

    #[test]
    fn keyword_cannot_name_a_function() {
        let err = parse_program("fun if() {}").unwrap_err();
        assert_eq!(err.offset, 4);
    }
}
