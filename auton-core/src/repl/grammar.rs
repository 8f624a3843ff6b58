#![allow(clippy::module_name_repetitions)]

//! Lexer and parser for the match REPL.
//!
//! The lexer uses `regal` to produce a bounded token stream, while the parser
//! composes `winnow` combinators over those tokens to build [`Command`] values.

use core::fmt;
use core::ops::Range;
use core::time::Duration;

use heapless::Vec as HeaplessVec;
use regal::IncrementalError;
use regal::TokenCache;
use regal_macros::RegalLexer;
#[allow(deprecated)]
use winnow::error::ErrorKind;
use winnow::error::{ErrMode, ParserError};
use winnow::prelude::*;
use winnow::stream::Stream;

use super::catalog::{self, CommandTag};
use crate::stages::Seconds;

/// Maximum number of tokens produced per REPL line.
pub const MAX_TOKENS: usize = 16;
const MAX_CACHE_RECORDS: usize = MAX_TOKENS * 2;

/// Lexical token kinds recognized by the REPL grammar.
#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Duration literal ending in `ms` or `s`.
    #[regex(r"[0-9]+(?:ms|s)", priority = 2)]
    Duration,
    /// Number with a fractional part.
    #[regex(r"[0-9]+\.[0-9]+", priority = 2)]
    Decimal,
    /// Unsuffixed integer literal.
    #[regex(r"[0-9]+")]
    Integer,
    /// Identifier or keyword (case-insensitive match performed later).
    #[regex(r"[A-Za-z][A-Za-z0-9-]*")]
    Ident,
    /// Sign prefix for negative clock readings.
    #[token("-")]
    Minus,
    /// Inline whitespace is ignored.
    #[regex(r"[ \t]+", skip)]
    Whitespace,
    /// End-of-line token (`\r`, `\n`, or `\r\n`).
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    Eol,
    /// Pseudo variant used when the lexer encounters unsupported input.
    #[default]
    #[regex(r".", priority = 1024)]
    Error,
}

/// Token emitted by the lexer with a byte span back into the source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub span: Range<usize>,
}

/// Bounded token buffer.
pub type TokenBuffer<'a> = HeaplessVec<Token<'a>, MAX_TOKENS>;

/// Lexer errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexError {
    /// Input produced more tokens than the static buffer allows.
    TooManyTokens { processed: usize },
    /// Underlying lexer reported an unrecoverable error.
    Engine,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::TooManyTokens { processed } => {
                write!(f, "token buffer exhausted after {processed} items")
            }
            LexError::Engine => write!(f, "lexer engine error"),
        }
    }
}

/// Grammar errors emitted by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarErrorKind<'a> {
    UnexpectedToken {
        expected: &'static str,
        found: Option<TokenKind>,
        span: Range<usize>,
    },
    UnexpectedEnd {
        expected: &'static str,
    },
    InvalidNumber {
        span: Range<usize>,
    },
    InvalidDuration {
        span: Range<usize>,
    },
    InvalidToken {
        span: Range<usize>,
        lexeme: &'a str,
    },
}

impl fmt::Display for GrammarErrorKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarErrorKind::UnexpectedToken {
                expected,
                found,
                span,
            } => write!(f, "expected {expected}, found {found:?} at {span:?}"),
            GrammarErrorKind::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            GrammarErrorKind::InvalidNumber { span } => {
                write!(f, "invalid number literal at {span:?}")
            }
            GrammarErrorKind::InvalidDuration { span } => {
                write!(f, "invalid duration literal at {span:?}")
            }
            GrammarErrorKind::InvalidToken { span, lexeme } => {
                write!(f, "unsupported token `{lexeme}` at {span:?}")
            }
        }
    }
}

/// Wrapper type enabling a consistent error surface for consumers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarError<'a> {
    pub kind: GrammarErrorKind<'a>,
}

impl fmt::Display for GrammarError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl<'a> GrammarError<'a> {
    fn unexpected(expected: &'static str, token: Option<&Token<'a>>) -> Self {
        GrammarError {
            kind: match token {
                Some(tok) => GrammarErrorKind::UnexpectedToken {
                    expected,
                    found: Some(tok.kind),
                    span: tok.span.clone(),
                },
                None => GrammarErrorKind::UnexpectedEnd { expected },
            },
        }
    }

    fn invalid_number(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidNumber {
                span: token.span.clone(),
            },
        }
    }

    fn invalid_duration(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidDuration {
                span: token.span.clone(),
            },
        }
    }

    fn invalid_token(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidToken {
                span: token.span.clone(),
                lexeme: token.lexeme,
            },
        }
    }
}

type Input<'src, 'slice> = &'slice [Token<'src>];

#[allow(deprecated)]
impl<'src, 'slice> ParserError<Input<'src, 'slice>> for GrammarError<'src>
where
    'src: 'slice,
{
    fn from_error_kind(input: &Input<'src, 'slice>, _kind: ErrorKind) -> Self {
        GrammarError::unexpected("token", input.first())
    }

    fn append(
        self,
        _input: &Input<'src, 'slice>,
        _token_start: &<Input<'src, 'slice> as Stream>::Checkpoint,
        _kind: ErrorKind,
    ) -> Self {
        self
    }

    fn or(self, other: Self) -> Self {
        other
    }
}

/// Combined lex/parse error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Lex(LexError),
    Grammar(GrammarError<'a>),
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(err) => err.fmt(f),
            ParseError::Grammar(err) => err.fmt(f),
        }
    }
}

/// Structured commands produced by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    /// Dispatch one tick.
    Run,
    /// Move the simulated clock forward.
    Advance(Duration),
    /// Override the simulated clock reading.
    Remaining(Seconds),
    /// Tick until the period expires. `None` uses the default cadence.
    Play { step: Option<Duration> },
    Stages,
    Status,
    Reset,
    Help(HelpCommand<'a>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelpCommand<'a> {
    pub topic: Option<&'a str>,
}

pub(crate) fn parse_tokens_partial<'src, 'slice>(
    tokens: &'slice [Token<'src>],
) -> Result<(Command<'src>, &'slice [Token<'src>]), GrammarError<'src>>
where
    'src: 'slice,
{
    let mut input = tokens;
    match command().parse_next(&mut input) {
        Ok(cmd) => Ok((cmd, input)),
        Err(ErrMode::Backtrack(err) | ErrMode::Cut(err)) => Err(err),
        Err(ErrMode::Incomplete(_)) => Err(GrammarError::unexpected("token", input.first())),
    }
}

/// Tokenize the provided line.
pub fn lex(line: &str) -> Result<TokenBuffer<'_>, LexError> {
    let compiled = TokenKind::lexer();
    let mut cache: TokenCache<TokenKind, MAX_CACHE_RECORDS> = TokenCache::new();
    let partial = cache
        .rebuild(compiled, line)
        .map_err(map_incremental_error)?;
    let mut buffer = TokenBuffer::new();

    for record in cache.tokens() {
        if record.skipped {
            continue;
        }

        let span = record.start..record.end;
        let lexeme = &line[span.clone()];
        push_token(
            &mut buffer,
            Token {
                kind: record.token,
                lexeme,
                span,
            },
        )?;
    }

    if let Some(partial) = partial.filter(|partial| !partial.fragment.is_empty()) {
        let start = partial.start;
        let end = start + partial.fragment.len();
        push_token(
            &mut buffer,
            Token {
                kind: TokenKind::Error,
                lexeme: partial.fragment,
                span: start..end,
            },
        )?;
    }

    Ok(buffer)
}

fn push_token<'a>(buffer: &mut TokenBuffer<'a>, token: Token<'a>) -> Result<(), LexError> {
    buffer.push(token).map_err(|_| LexError::TooManyTokens {
        processed: buffer.len() + 1,
    })
}

fn map_incremental_error(error: IncrementalError) -> LexError {
    match error {
        IncrementalError::TokenOverflow => LexError::TooManyTokens {
            processed: MAX_TOKENS,
        },
        _ => LexError::Engine,
    }
}

/// Parse a REPL command from the provided line.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let tokens = lex(line).map_err(ParseError::Lex)?;

    if let Some(token) = tokens.iter().find(|token| token.kind == TokenKind::Error) {
        return Err(ParseError::Grammar(GrammarError::invalid_token(token)));
    }

    let (command, mut rest) =
        parse_tokens_partial(tokens.as_slice()).map_err(ParseError::Grammar)?;

    while let Some((token, remaining)) = rest.split_first() {
        if token.kind == TokenKind::Eol {
            rest = remaining;
        } else {
            return Err(ParseError::Grammar(GrammarError::unexpected(
                "end of command",
                Some(token),
            )));
        }
    }

    Ok(command)
}

fn command<'src, 'slice>() -> impl Parser<Input<'src, 'slice>, Command<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| {
        let snapshot = *input;
        let keyword = expect_kind(TokenKind::Ident, "command keyword").parse_next(input)?;

        let Some(spec) = catalog::find(keyword.lexeme) else {
            *input = snapshot;
            return Err(ErrMode::Backtrack(GrammarError::unexpected(
                "command keyword",
                Some(&keyword),
            )));
        };

        match spec.tag {
            CommandTag::Run => Ok(Command::Run),
            CommandTag::Advance => {
                let token = expect_kind(TokenKind::Duration, "duration").parse_next(input)?;
                let duration = parse_duration(&token).map_err(ErrMode::Cut)?;
                Ok(Command::Advance(duration))
            }
            CommandTag::Remaining => parse_seconds(input).map(Command::Remaining),
            CommandTag::Play => {
                let step = optional_duration(input)?;
                Ok(Command::Play { step })
            }
            CommandTag::Stages => Ok(Command::Stages),
            CommandTag::Status => Ok(Command::Status),
            CommandTag::Reset => Ok(Command::Reset),
            CommandTag::Help => {
                let topic = optional_ident(input);
                Ok(Command::Help(HelpCommand { topic }))
            }
        }
    }
}

fn optional_duration<'src>(
    input: &mut Input<'src, '_>,
) -> Result<Option<Duration>, ErrMode<GrammarError<'src>>> {
    match input.split_first() {
        Some((token, rest)) if token.kind == TokenKind::Duration => {
            let duration = parse_duration(token).map_err(ErrMode::Cut)?;
            *input = rest;
            Ok(Some(duration))
        }
        _ => Ok(None),
    }
}

fn optional_ident<'src>(input: &mut Input<'src, '_>) -> Option<&'src str> {
    match input.split_first() {
        Some((token, rest)) if token.kind == TokenKind::Ident => {
            *input = rest;
            Some(token.lexeme)
        }
        _ => None,
    }
}

fn parse_seconds<'src>(input: &mut Input<'src, '_>) -> Result<Seconds, ErrMode<GrammarError<'src>>> {
    let negative = match input.split_first() {
        Some((token, rest)) if token.kind == TokenKind::Minus => {
            *input = rest;
            true
        }
        _ => false,
    };

    match input.split_first() {
        Some((token, rest)) if matches!(token.kind, TokenKind::Integer | TokenKind::Decimal) => {
            let value = token
                .lexeme
                .parse::<f64>()
                .map_err(|_| ErrMode::Cut(GrammarError::invalid_number(token)))?;
            *input = rest;
            Ok(Seconds::new(if negative { -value } else { value }))
        }
        Some((token, _)) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            "seconds",
            Some(token),
        ))),
        None => Err(ErrMode::Backtrack(GrammarError::unexpected("seconds", None))),
    }
}

fn expect_kind<'src, 'slice>(
    kind: TokenKind,
    label: &'static str,
) -> impl Parser<Input<'src, 'slice>, Token<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| match input.split_first() {
        Some((token, rest)) if token.kind == kind => {
            *input = rest;
            Ok(token.clone())
        }
        Some((token, _)) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            label,
            Some(token),
        ))),
        None => Err(ErrMode::Backtrack(GrammarError::unexpected(label, None))),
    }
}

fn parse_duration<'a>(token: &Token<'a>) -> Result<Duration, GrammarError<'a>> {
    let text = token.lexeme;
    if let Some(rest) = text.strip_suffix("ms") {
        let millis = rest
            .parse::<u32>()
            .map_err(|_| GrammarError::invalid_duration(token))?;
        Ok(Duration::from_millis(millis.into()))
    } else if let Some(rest) = text.strip_suffix('s') {
        let seconds = rest
            .parse::<u32>()
            .map_err(|_| GrammarError::invalid_duration(token))?;
        Ok(Duration::from_secs(seconds.into()))
    } else {
        Err(GrammarError::invalid_duration(token))
    }
}
