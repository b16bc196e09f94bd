use nom::branch::alt;
use nom::bytes::complete::{tag, take_till1, take_while};
use nom::character::complete::anychar;
use nom::combinator::recognize;
use nom::error::ErrorKind;
use nom::IResult;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'a> {
    pub text: &'a str,
    /// 1-based source line.
    pub line: usize,
}

/// Splits BVH text into words separated by any Unicode whitespace; `{` and
/// `}` are always tokens of their own. Cloning the lexer restarts from its
/// current position. Only the end of the input ends the stream.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    input: &'a str,
    line: usize,
}

fn is_separator(c: char) -> bool {
    c.is_whitespace()
}

fn whitespace(i: &str) -> IResult<&str, &str, (&str, ErrorKind)> {
    take_while(is_separator)(i)
}

fn word(i: &str) -> IResult<&str, &str, (&str, ErrorKind)> {
    alt((
        tag("{"),
        tag("}"),
        take_till1(|c: char| is_separator(c) || c == '{' || c == '}'),
        // never leave unread input behind
        recognize(anychar),
    ))(i)
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, line: 1 }
    }

    /// Line of the last consumed position.
    pub fn line(&self) -> usize {
        self.line
    }

    fn skip_whitespace(&mut self) {
        if let Ok((rest, ws)) = whitespace(self.input) {
            self.line += ws.matches('\n').count();
            self.input = rest;
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();
        let (rest, text) = word(self.input).ok()?;
        self.input = rest;
        Some(Token {
            text,
            line: self.line,
        })
    }
}
