use super::lexer::{Span, Token, tokenize};
use super::{
    BinaryOp, Builtin, Expression, Literal, ObjectEntry, PathSegment, UnaryOp, format_number,
};
use crate::error::ParseError;
use chumsky::{error::RichReason, input::ValueInput, pratt::*, prelude::*};
use serde::{Deserialize, Serialize};

type Extra<'tokens, 'src> = extra::Err<Rich<'tokens, Token<'src>, Span>>;

/// Local bindings followed by the returned expression.
type Body = (Vec<(String, Expression)>, Expression);

/// A parsed function-node handler: `(params) => { const x = ...; return ...; }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handler {
    /// Declared parameters. The first is bound to the record context, the rest to `null`.
    /// Destructuring patterns are kept as empty names and bind nothing.
    pub params: Vec<String>,
    pub bindings: Vec<(String, Expression)>,
    pub result: Expression,
}

/// Parses a standalone expression.
pub fn parse_expression(source: &str) -> Result<Expression, ParseError> {
    let (tokens, spans) = tokenize(source)?;
    expression(None)
        .then_ignore(end())
        .parse(tokens.as_slice())
        .into_result()
        .map_err(|errors| first_error(errors, &spans, source))
}

/// Parses a decision-table cell where `$` stands for the column's field reference.
pub fn parse_cell_expression(source: &str, field: &Expression) -> Result<Expression, ParseError> {
    let (tokens, spans) = tokenize(source)?;
    expression(Some(field.clone()))
        .then_ignore(end())
        .parse(tokens.as_slice())
        .into_result()
        .map_err(|errors| first_error(errors, &spans, source))
}

/// Parses the source of a function node into a single handler.
pub fn parse_handler(source: &str) -> Result<Handler, ParseError> {
    let (tokens, spans) = tokenize(source)?;
    handler()
        .then_ignore(end())
        .parse(tokens.as_slice())
        .into_result()
        .map_err(|errors| first_error(errors, &spans, source))
}

/// Reports the earliest error, translating its token span back to a byte offset.
fn first_error(errors: Vec<Rich<'_, Token<'_>, Span>>, spans: &[Span], source: &str) -> ParseError {
    let Some(error) = errors.into_iter().next() else {
        return ParseError::new("Invalid expression", 0, source);
    };
    let position = spans
        .get(error.span().start)
        .map(|span| span.start)
        .unwrap_or(source.len());
    let message = match error.reason() {
        RichReason::Custom(message) => message.clone(),
        _ => match error.found() {
            Some(token) => format!("Unexpected token '{}'", token),
            None => "Unexpected end of input".to_string(),
        },
    };
    ParseError::new(message, position, source)
}

fn keyword<'tokens, 'src: 'tokens, I>(
    word: &'static str,
) -> impl Parser<'tokens, I, (), Extra<'tokens, 'src>> + Clone
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = Span>,
{
    just(Token::Ident(word)).ignored()
}

fn name<'tokens, 'src: 'tokens, I>() -> impl Parser<'tokens, I, &'src str, Extra<'tokens, 'src>> + Clone
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = Span>,
{
    select! { Token::Ident(name) => name }
}

fn expression<'tokens, 'src: 'tokens, I>(
    dollar: Option<Expression>,
) -> impl Parser<'tokens, I, Expression, Extra<'tokens, 'src>> + Clone
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = Span>,
{
    recursive(|expression| {
        let dollar = dollar.clone();
        let args = expression
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        // `x => ...` and `(a, b) => ...`
        let params = choice((
            name().map(|param: &str| vec![param.to_string()]),
            name()
                .map(|param: &str| param.to_string())
                .separated_by(just(Token::Comma))
                .allow_trailing()
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        ));
        let lambda_body = choice((
            block_body(expression.clone()).validate(|(bindings, result), extra, emitter| {
                if !bindings.is_empty() {
                    emitter.emit(Rich::custom(
                        extra.span(),
                        "Local bindings are only supported in handler bodies",
                    ));
                }
                result
            }),
            expression.clone(),
        ));
        let lambda = params
            .then_ignore(just(Token::Arrow))
            .then(lambda_body)
            .map(|(params, body)| Expression::Lambda {
                params,
                body: Box::new(body),
            });

        // `Object.keys(x)`, `Math.max(a, b, ...)`
        let namespace_call = name()
            .filter(|namespace: &&str| matches!(*namespace, "Object" | "Math"))
            .then_ignore(just(Token::Dot))
            .then(name())
            .then(args.clone())
            .validate(|((namespace, member), args), extra, emitter| {
                let call = match namespace_member(namespace, member) {
                    Some(function @ (Builtin::Min | Builtin::Max)) => {
                        helper_call(function, vec![Expression::Array(args)])
                    }
                    Some(function) => helper_call(function, args),
                    None => Err(format!("Unsupported member '{}.{}'", namespace, member)),
                };
                call.unwrap_or_else(|message| {
                    emitter.emit(Rich::custom(extra.span(), message));
                    null()
                })
            });

        let function_call = name()
            .then(args.clone())
            .validate(|(function, args), extra, emitter| {
                Builtin::from_name(function)
                    .ok_or_else(|| format!("Unknown function '{}'", function))
                    .and_then(|function| helper_call(function, args))
                    .unwrap_or_else(|message| {
                        emitter.emit(Rich::custom(extra.span(), message));
                        null()
                    })
            });

        let identifier = name().map(|name: &str| match name {
            "true" => Expression::Literal(Literal::Bool(true)),
            "false" => Expression::Literal(Literal::Bool(false)),
            "null" | "undefined" => null(),
            name => Expression::Identifier(name.to_string()),
        });

        let literal = select! {
            Token::Number(n) => Expression::Literal(Literal::Number(n)),
            Token::Str(text) => Expression::Literal(Literal::String(text)),
            Token::Hash => Expression::Identifier("#".to_string()),
        };

        let field = just(Token::Dollar).validate(move |_, extra, emitter| match &dollar {
            Some(field) => field.clone(),
            None => {
                emitter.emit(Rich::custom(
                    extra.span(),
                    "'$' is only valid inside decision table cells",
                ));
                null()
            }
        });

        let array = expression
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBracket), just(Token::RBracket))
            .map(Expression::Array);

        let key = select! {
            Token::Ident(name) => name.to_string(),
            Token::Str(text) => text,
            Token::Number(n) => format_number(n),
        };
        let property = key
            .then(just(Token::Colon).ignore_then(expression.clone()).or_not())
            .map(|(key, value)| {
                let value = value.unwrap_or_else(|| Expression::Identifier(key.clone()));
                ObjectEntry::Property { key, value }
            });
        let spread = just(Token::Ellipsis)
            .ignore_then(expression.clone())
            .map(ObjectEntry::Spread);
        let object = spread
            .or(property)
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
            .map(Expression::Object);

        let parenthesized = expression
            .clone()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let primary = choice((
            lambda,
            namespace_call,
            function_call,
            identifier,
            parenthesized,
            array,
            object,
            literal,
            field,
        ));

        let member = just(Token::Dot)
            .or(just(Token::QuestionDot))
            .ignore_then(name());
        let method = member
            .clone()
            .then(args)
            .validate(|(method, args), extra, emitter| {
                Builtin::from_method(method)
                    .ok_or_else(|| format!("Unsupported method '{}'", method))
                    .and_then(|function| {
                        check_arity(function, args.len() + 1)?;
                        Ok(Suffix::Method(function, args))
                    })
                    .unwrap_or_else(|message| {
                        emitter.emit(Rich::custom(extra.span(), message));
                        Suffix::Invalid
                    })
            });
        let suffix = choice((
            method,
            member.map(|field: &str| Suffix::Field(field.to_string())),
            expression
                .clone()
                .delimited_by(just(Token::LBracket), just(Token::RBracket))
                .map(Suffix::Index),
        ));
        let postfix = primary.foldl(suffix.repeated(), apply_suffix);

        let binary = postfix.pratt((
            prefix(8, just(Token::Minus), |_, operand, _| negate(operand)),
            prefix(
                8,
                just(Token::Bang).ignored().or(keyword("not")),
                |_, operand, _| Expression::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
            ),
            prefix(
                8,
                just(Token::Plus).ignored().or(keyword("await")),
                |_, operand, _| operand,
            ),
            infix(
                left(7),
                choice((
                    just(Token::Star).to(BinaryOp::Multiply),
                    just(Token::Slash).to(BinaryOp::Divide),
                    just(Token::Percent).to(BinaryOp::Modulo),
                )),
                |left, op, right, _| Expression::binary(op, left, right),
            ),
            infix(
                left(6),
                choice((
                    just(Token::Plus).to(BinaryOp::Add),
                    just(Token::Minus).to(BinaryOp::Subtract),
                )),
                |left, op, right, _| Expression::binary(op, left, right),
            ),
            infix(
                left(5),
                choice((
                    just(Token::Le).to(BinaryOp::SmallerThanOrEqual),
                    just(Token::Ge).to(BinaryOp::GreaterThanOrEqual),
                    just(Token::Lt).to(BinaryOp::SmallerThan),
                    just(Token::Gt).to(BinaryOp::GreaterThan),
                    keyword("in").to(BinaryOp::In),
                    keyword("not").then(keyword("in")).to(BinaryOp::NotIn),
                )),
                |left, op, right, _| Expression::binary(op, left, right),
            ),
            infix(
                left(4),
                choice((
                    just(Token::EqEq).to(BinaryOp::Equal),
                    just(Token::NotEq).to(BinaryOp::NotEqual),
                )),
                |left, op, right, _| Expression::binary(op, left, right),
            ),
            infix(
                left(3),
                just(Token::AndAnd)
                    .ignored()
                    .or(keyword("and"))
                    .to(BinaryOp::And),
                |left, op, right, _| Expression::binary(op, left, right),
            ),
            infix(
                left(2),
                just(Token::OrOr)
                    .ignored()
                    .or(keyword("or"))
                    .to(BinaryOp::Or),
                |left, op, right, _| Expression::binary(op, left, right),
            ),
            infix(
                left(1),
                just(Token::QuestionQuestion).to(BinaryOp::Coalesce),
                |left, op, right, _| Expression::binary(op, left, right),
            ),
        ));

        // `condition ? then : otherwise`, right-associative and lowest of all
        binary
            .then(
                just(Token::Question)
                    .ignore_then(expression.clone())
                    .then_ignore(just(Token::Colon))
                    .then(expression)
                    .or_not(),
            )
            .map(|(condition, branches)| match branches {
                Some((then, otherwise)) => Expression::Conditional {
                    condition: Box::new(condition),
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                },
                None => condition,
            })
    })
}

/// `{ const a = ...; let b = ...; return expr; }`
fn block_body<'tokens, 'src: 'tokens, I>(
    expression: impl Parser<'tokens, I, Expression, Extra<'tokens, 'src>> + Clone,
) -> impl Parser<'tokens, I, Body, Extra<'tokens, 'src>> + Clone
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = Span>,
{
    let semicolons = just(Token::Semicolon).repeated();
    let binding = choice((keyword("const"), keyword("let"), keyword("var")))
        .ignore_then(name())
        .then_ignore(just(Token::Assign))
        .then(expression.clone())
        .then_ignore(semicolons.clone())
        .map(|(name, value): (&str, Expression)| (name.to_string(), value));

    let result = choice((
        keyword("return")
            .ignore_then(expression)
            .then_ignore(semicolons.clone())
            .then_ignore(just(Token::RBrace)),
        just(Token::RBrace).validate(|_, extra, emitter| {
            emitter.emit(Rich::custom(
                extra.span(),
                "Handler body must end with a return statement",
            ));
            null()
        }),
        any().then(any().repeated()).validate(|_, extra, emitter| {
            emitter.emit(Rich::custom(
                extra.span(),
                "Unsupported statement in handler body",
            ));
            null()
        }),
    ));

    just(Token::LBrace)
        .ignore_then(semicolons)
        .ignore_then(binding.repeated().collect::<Vec<_>>())
        .then(result)
}

/// `export const handler = async (input) => ...`, `function (input) { ... }` and
/// `input => ...`. Destructuring parameters are skipped.
fn handler<'tokens, 'src: 'tokens, I>() -> impl Parser<'tokens, I, Handler, Extra<'tokens, 'src>>
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = Span>,
{
    let expression = expression(None);

    let pattern = recursive(|pattern| {
        let inner = pattern
            .or(any()
                .filter(|token: &Token<'src>| {
                    !matches!(
                        token,
                        Token::LBrace | Token::RBrace | Token::LBracket | Token::RBracket
                    )
                })
                .ignored())
            .repeated();
        choice((
            inner
                .clone()
                .delimited_by(just(Token::LBrace), just(Token::RBrace)),
            inner.delimited_by(just(Token::LBracket), just(Token::RBracket)),
        ))
    });
    let param = choice((
        name().map(|param: &str| param.to_string()),
        pattern.to(String::new()),
    ));
    let params = param
        .separated_by(just(Token::Comma))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen));

    let function = keyword("function")
        .ignore_then(name().or_not())
        .ignore_then(params.clone())
        .then(block_body(expression.clone()));
    let arrow = choice((name().map(|param: &str| vec![param.to_string()]), params))
        .then_ignore(just(Token::Arrow))
        .then(choice((
            block_body(expression.clone()),
            expression.map(|result| (Vec::new(), result)),
        )));

    let declaration = choice((keyword("const"), keyword("let"), keyword("var")))
        .ignore_then(name())
        .ignore_then(just(Token::Assign))
        .or_not();

    keyword("export")
        .or_not()
        .ignore_then(keyword("default").or_not())
        .ignore_then(declaration)
        .ignore_then(keyword("async").or_not())
        .ignore_then(function.or(arrow))
        .then_ignore(just(Token::Semicolon).repeated())
        .map(|(params, (bindings, result))| Handler {
            params,
            bindings,
            result,
        })
}

enum Suffix {
    Field(String),
    Index(Expression),
    Method(Builtin, Vec<Expression>),
    Invalid,
}

fn apply_suffix(expr: Expression, suffix: Suffix) -> Expression {
    let segment = match suffix {
        Suffix::Field(name) => PathSegment::Field(name),
        Suffix::Index(index) => PathSegment::Index(index),
        Suffix::Method(function, rest) => {
            let mut args = vec![expr];
            args.extend(rest);
            return build_call(function, args);
        }
        Suffix::Invalid => return null(),
    };
    match expr {
        Expression::FieldPath { base, mut segments } => {
            segments.push(segment);
            Expression::FieldPath { base, segments }
        }
        base => Expression::FieldPath {
            base: Box::new(base),
            segments: vec![segment],
        },
    }
}

fn namespace_member(namespace: &str, member: &str) -> Option<Builtin> {
    let builtin = match (namespace, member) {
        ("Object", "keys") => Builtin::Keys,
        ("Object", "values") => Builtin::Values,
        ("Math", "abs") => Builtin::Abs,
        ("Math", "round") => Builtin::Round,
        ("Math", "floor") => Builtin::Floor,
        ("Math", "ceil") => Builtin::Ceil,
        ("Math", "min") => Builtin::Min,
        ("Math", "max") => Builtin::Max,
        _ => return None,
    };
    Some(builtin)
}

fn negate(operand: Expression) -> Expression {
    match operand {
        Expression::Literal(Literal::Number(n)) => Expression::Literal(Literal::Number(-n)),
        operand => Expression::Unary {
            op: UnaryOp::Negate,
            operand: Box::new(operand),
        },
    }
}

fn null() -> Expression {
    Expression::Literal(Literal::Null)
}

fn check_arity(function: Builtin, received: usize) -> Result<(), String> {
    if received == function.arity() {
        return Ok(());
    }
    Err(format!(
        "{}() takes {} argument(s), but received {}",
        function.name(),
        function.arity(),
        received
    ))
}

fn helper_call(function: Builtin, args: Vec<Expression>) -> Result<Expression, String> {
    check_arity(function, args.len())?;
    Ok(build_call(function, args))
}

/// Expands implicit-item shorthand in a callback argument into an explicit lambda.
fn build_call(function: Builtin, mut args: Vec<Expression>) -> Expression {
    if let (Some(params), Some(callback)) = (function.callback_params(), args.get_mut(1)) {
        if !matches!(callback, Expression::Lambda { .. }) {
            let mut body = std::mem::replace(callback, null());
            if function == Builtin::Reduce {
                body.rename_identifier("total", "acc");
            }
            *callback = Expression::Lambda {
                params: params.iter().map(|p| p.to_string()).collect(),
                body: Box::new(body),
            };
        }
    }
    Expression::Call { function, args }
}
