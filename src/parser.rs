//! Command reader for one translation unit.
//!
//! The reader walks the unit's source lines, drops comments and blank
//! content, and classifies everything else into [`Command`]s.  It is lazy and
//! forward-only: commands come out in file order, one per meaningful line.
//! Lines whose first token is not a recognised command are surfaced as
//! [`LineClass::Unclassified`] rather than silently coerced; the driver
//! decides whether that is fatal.  Malformed operands of a recognised command
//! are always fatal.

use std::iter::Enumerate;
use std::str::Lines;

use thiserror::Error;

use crate::command::{ArithmeticOp, Command, Segment};

/// A command together with the 1-based source line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcedCommand {
    pub command: Command,
    pub line: usize,
}

/// Classification outcome for one meaningful source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    /// The line parsed into a VM command.
    Command(SourcedCommand),
    /// The first token is not a known command mnemonic.
    Unclassified { line: usize, token: String },
}

/// Forward-only reader over one unit's source text.
#[derive(Debug)]
pub struct CommandReader<'a> {
    unit: &'a str,
    lines: Enumerate<Lines<'a>>,
}

impl<'a> CommandReader<'a> {
    /// Create a reader for the named unit over its full source text.
    pub fn new(unit: &'a str, source: &'a str) -> Self {
        Self {
            unit,
            lines: source.lines().enumerate(),
        }
    }

    fn classify(&self, line: usize, tokens: &[&str]) -> Result<LineClass, ParseError> {
        let head = tokens[0];
        if let Some(op) = ArithmeticOp::from_mnemonic(head) {
            return Ok(self.command(line, Command::Arithmetic(op)));
        }
        let command = match head {
            "push" | "pop" => {
                let (segment, index) = self.transfer_operands(line, head, tokens)?;
                if head == "push" {
                    Command::Push { segment, index }
                } else {
                    Command::Pop { segment, index }
                }
            }
            "label" => Command::Label(self.name_operand(line, head, tokens)?),
            "goto" => Command::Goto(self.name_operand(line, head, tokens)?),
            "if-goto" => Command::IfGoto(self.name_operand(line, head, tokens)?),
            "function" => {
                let name = self.name_operand(line, head, tokens)?;
                let locals = self.count_operand(line, head, tokens)?;
                Command::Function { name, locals }
            }
            "call" => {
                let name = self.name_operand(line, head, tokens)?;
                let args = self.count_operand(line, head, tokens)?;
                Command::Call { name, args }
            }
            "return" => Command::Return,
            other => {
                return Ok(LineClass::Unclassified {
                    line,
                    token: other.to_owned(),
                })
            }
        };
        Ok(self.command(line, command))
    }

    fn command(&self, line: usize, command: Command) -> LineClass {
        LineClass::Command(SourcedCommand { command, line })
    }

    fn transfer_operands(
        &self,
        line: usize,
        head: &str,
        tokens: &[&str],
    ) -> Result<(Segment, u16), ParseError> {
        if tokens.len() < 3 {
            return Err(self.missing(line, head, 2));
        }
        let segment = Segment::from_name(tokens[1]).ok_or_else(|| ParseError::UnknownSegment {
            unit: self.unit.to_owned(),
            line,
            token: tokens[1].to_owned(),
        })?;
        let index = self.index(line, tokens[2])?;
        Ok((segment, index))
    }

    fn name_operand(&self, line: usize, head: &str, tokens: &[&str]) -> Result<String, ParseError> {
        tokens
            .get(1)
            .map(|token| (*token).to_owned())
            .ok_or_else(|| self.missing(line, head, 1))
    }

    fn count_operand(&self, line: usize, head: &str, tokens: &[&str]) -> Result<u16, ParseError> {
        let token = tokens.get(2).ok_or_else(|| self.missing(line, head, 2))?;
        self.index(line, token)
    }

    fn index(&self, line: usize, token: &str) -> Result<u16, ParseError> {
        token.parse::<u16>().map_err(|_| ParseError::InvalidIndex {
            unit: self.unit.to_owned(),
            line,
            token: token.to_owned(),
        })
    }

    fn missing(&self, line: usize, head: &str, expected: usize) -> ParseError {
        ParseError::MissingOperands {
            unit: self.unit.to_owned(),
            line,
            command: head.to_owned(),
            expected,
        }
    }
}

impl<'a> Iterator for CommandReader<'a> {
    type Item = Result<LineClass, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (index, raw) = self.lines.next()?;
            let content = match raw.find("//") {
                Some(at) => &raw[..at],
                None => raw,
            };
            let tokens: Vec<&str> = content.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }
            return Some(self.classify(index + 1, &tokens));
        }
    }
}

/// Errors raised while reading a unit's command stream.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{unit}:{line}: '{token}' is not a memory segment")]
    UnknownSegment {
        unit: String,
        line: usize,
        token: String,
    },
    #[error("{unit}:{line}: '{command}' expects {expected} operand(s)")]
    MissingOperands {
        unit: String,
        line: usize,
        command: String,
        expected: usize,
    },
    #[error("{unit}:{line}: '{token}' is not a valid index")]
    InvalidIndex {
        unit: String,
        line: usize,
        token: String,
    },
}
