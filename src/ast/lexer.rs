use super::format_number;
use crate::error::ParseError;
use chumsky::prelude::*;
use std::fmt;

pub(crate) type Span = SimpleSpan;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token<'src> {
    Number(f64),
    Str(String),
    Ident(&'src str),
    Hash,
    Dollar,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Ellipsis,
    QuestionDot,
    Colon,
    Semicolon,
    Question,
    QuestionQuestion,
    Arrow,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Number(n) => return write!(f, "{}", format_number(*n)),
            Self::Str(text) => return write!(f, "\"{}\"", text),
            Self::Ident(name) => *name,
            Self::Hash => "#",
            Self::Dollar => "$",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::Comma => ",",
            Self::Dot => ".",
            Self::Ellipsis => "...",
            Self::QuestionDot => "?.",
            Self::Colon => ":",
            Self::Semicolon => ";",
            Self::Question => "?",
            Self::QuestionQuestion => "??",
            Self::Arrow => "=>",
            Self::Assign => "=",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Bang => "!",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::EqEq => "==",
            Self::NotEq => "!=",
            Self::AndAnd => "&&",
            Self::OrOr => "||",
        };
        f.write_str(symbol)
    }
}

/// Splits source text into tokens. Line (`//`) and block (`/* */`) comments are skipped
/// so that function handler sources can carry them.
pub(crate) fn lexer<'src>()
-> impl Parser<'src, &'src str, Vec<(Token<'src>, Span)>, extra::Err<Rich<'src, char, Span>>> {
    let digit = any().filter(char::is_ascii_digit);

    // `1_000`, `2.5`, `.5` and `1e-3`
    let integer = digit.clone().then(digit.clone().or(just('_')).repeated());
    let fraction = just('.').then(text::digits(10));
    let exponent = one_of("eE").then(one_of("+-").or_not()).then(text::digits(10));
    let number = choice((integer.then(fraction.or_not()).ignored(), fraction.ignored()))
        .then(exponent.or_not())
        .to_slice()
        .try_map(|literal: &str, span| {
            literal
                .replace('_', "")
                .parse()
                .map(Token::Number)
                .map_err(|_| Rich::custom(span, format!("Invalid number '{}'", literal)))
        });

    let unicode_escape = just('u').ignore_then(
        any()
            .filter(char::is_ascii_hexdigit)
            .repeated()
            .exactly(4)
            .to_slice()
            .try_map(|hex: &str, span| {
                u32::from_str_radix(hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| Rich::custom(span, format!("Invalid escape \\u{}", hex)))
            }),
    );
    let escape = just('\\').ignore_then(choice((
        just('n').to('\n'),
        just('t').to('\t'),
        just('r').to('\r'),
        unicode_escape,
        any(),
    )));
    let double_quoted = none_of("\"\\")
        .or(escape.clone())
        .repeated()
        .collect::<String>()
        .delimited_by(just('"'), just('"'));
    let single_quoted = none_of("'\\")
        .or(escape)
        .repeated()
        .collect::<String>()
        .delimited_by(just('\''), just('\''));
    let string = double_quoted.or(single_quoted).map(Token::Str);

    let identifier = text::ascii::ident().map(Token::Ident);

    let compound = choice((
        just("...").to(Token::Ellipsis),
        just("===").to(Token::EqEq),
        just("!==").to(Token::NotEq),
        just("==").to(Token::EqEq),
        just("!=").to(Token::NotEq),
        just("=>").to(Token::Arrow),
        just("<=").to(Token::Le),
        just(">=").to(Token::Ge),
        just("&&").to(Token::AndAnd),
        just("||").to(Token::OrOr),
        just("??").to(Token::QuestionQuestion),
        // `a?.5:1` is a conditional, not an optional member
        just("?.").then_ignore(digit.not()).to(Token::QuestionDot),
    ));

    let operator = choice((
        just('=').to(Token::Assign),
        just('<').to(Token::Lt),
        just('>').to(Token::Gt),
        just('!').to(Token::Bang),
        just('?').to(Token::Question),
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('*').to(Token::Star),
        just('/').to(Token::Slash),
        just('%').to(Token::Percent),
    ));

    let punctuation = choice((
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just('[').to(Token::LBracket),
        just(']').to(Token::RBracket),
        just('{').to(Token::LBrace),
        just('}').to(Token::RBrace),
        just(',').to(Token::Comma),
        just('.').to(Token::Dot),
        just(':').to(Token::Colon),
        just(';').to(Token::Semicolon),
        just('#').to(Token::Hash),
        just('$').to(Token::Dollar),
    ));

    let line_comment = just("//")
        .then(any().and_is(just('\n').not()).repeated())
        .ignored();
    let block_comment = just("/*")
        .then(any().and_is(just("*/").not()).repeated())
        .then(just("*/"))
        .ignored();
    let skip = text::whitespace()
        .at_least(1)
        .or(line_comment)
        .or(block_comment)
        .repeated();

    let token = choice((number, string, identifier, compound, operator, punctuation));

    token
        .map_with(|token, extra| (token, extra.span()))
        .then_ignore(skip.clone())
        .repeated()
        .collect()
        .padded_by(skip)
        .then_ignore(end())
}

/// Tokenizes `source`, returning the tokens alongside the byte span of each one.
pub(crate) fn tokenize(source: &str) -> Result<(Vec<Token<'_>>, Vec<Span>), ParseError> {
    lexer()
        .parse(source)
        .into_result()
        .map(|tokens| tokens.into_iter().unzip())
        .map_err(|errors| {
            let Some(error) = errors.into_iter().next() else {
                return ParseError::new("Invalid source", 0, source);
            };
            let message = match error.found() {
                Some(found) => format!("Unexpected character '{}'", found),
                None => "Unexpected end of input".to_string(),
            };
            let message = match error.reason() {
                chumsky::error::RichReason::Custom(custom) => custom.clone(),
                _ => message,
            };
            ParseError::new(message, error.span().start, source)
        })
}
