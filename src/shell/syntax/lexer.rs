use nom::branch::alt;
use nom::character::complete::{char, digit1};
use nom::combinator::{all_consuming, map, map_res, value, verify};
use nom::sequence::preceded;
use nom::IResult;

use super::tokens::Token;

fn pipe_offset(input: &str) -> IResult<&str, u32> {
    // A zero offset is not a numbered pipe; the whole token degrades to a word.
    verify(map_res(digit1, str::parse), |n: &u32| *n >= 1)(input)
}

fn numbered_pipe(input: &str) -> IResult<&str, Token<'_>> {
    map(preceded(char('|'), pipe_offset), Token::PipeNum)(input)
}

fn numbered_pipe_err(input: &str) -> IResult<&str, Token<'_>> {
    map(preceded(char('!'), pipe_offset), Token::PipeNumErr)(input)
}

fn operator(input: &str) -> IResult<&str, Token<'_>> {
    alt((
        numbered_pipe,
        numbered_pipe_err,
        value(Token::Pipe, char('|')),
        value(Token::RedirOut, char('>')),
    ))(input)
}

/// Classify a single whitespace-free token. Anything that is not exactly an
/// operator (`|`, `>`, `|N`, `!N` with N >= 1) is a word, including `|0`,
/// `!0`, `|abc`, a bare `!`, and digit runs too large for `u32`.
pub fn classify(word: &str) -> Token<'_> {
    match all_consuming(operator)(word) {
        Ok((_, token)) => token,
        Err(_) => Token::Word(word),
    }
}

/// Split a raw command line on whitespace and classify each token, keeping
/// the raw text alongside so the parser can defer unconsumed tokens verbatim.
pub fn lex(line: &str) -> Vec<(&str, Token<'_>)> {
    line.split_whitespace()
        .map(|word| (word, classify(word)))
        .collect()
}
