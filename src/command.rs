//! Command model for the stack VM language.
//!
//! A translation unit is a sequence of commands operating on a global operand
//! stack and a set of named memory segments.  The types below describe one
//! parsed command; they are immutable once constructed and carry everything
//! the code generator needs.  Commands serialise cleanly so tooling around the
//! translator can inspect parsed units without re-reading source text.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Arithmetic and logical operators recognised by the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArithmeticOp {
    Add,
    Sub,
    Neg,
    Eq,
    Gt,
    Lt,
    And,
    Or,
    Not,
}

impl ArithmeticOp {
    /// Parse the operator from its VM mnemonic.
    pub fn from_mnemonic(token: &str) -> Option<Self> {
        Some(match token {
            "add" => ArithmeticOp::Add,
            "sub" => ArithmeticOp::Sub,
            "neg" => ArithmeticOp::Neg,
            "eq" => ArithmeticOp::Eq,
            "gt" => ArithmeticOp::Gt,
            "lt" => ArithmeticOp::Lt,
            "and" => ArithmeticOp::And,
            "or" => ArithmeticOp::Or,
            "not" => ArithmeticOp::Not,
            _ => return None,
        })
    }

    /// VM mnemonic for the operator.
    pub fn mnemonic(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "add",
            ArithmeticOp::Sub => "sub",
            ArithmeticOp::Neg => "neg",
            ArithmeticOp::Eq => "eq",
            ArithmeticOp::Gt => "gt",
            ArithmeticOp::Lt => "lt",
            ArithmeticOp::And => "and",
            ArithmeticOp::Or => "or",
            ArithmeticOp::Not => "not",
        }
    }

    /// Binary operators consume two stack values; unary operators rewrite the
    /// top slot in place.
    pub fn is_binary(self) -> bool {
        !matches!(self, ArithmeticOp::Neg | ArithmeticOp::Not)
    }

    /// True for the three comparison operators, which produce a canonical
    /// boolean encoding (0 for false, -1 for true).
    pub fn is_comparison(self) -> bool {
        matches!(self, ArithmeticOp::Eq | ArithmeticOp::Gt | ArithmeticOp::Lt)
    }
}

/// Named memory segment addressed by push/pop commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Segment {
    /// Not real memory; `push constant k` pushes the literal k.
    Constant,
    /// Based at the pointer held in LCL (RAM[1]).
    Local,
    /// Based at the pointer held in ARG (RAM[2]).
    Argument,
    /// Based at the pointer held in THIS (RAM[3]).
    This,
    /// Based at the pointer held in THAT (RAM[4]).
    That,
    /// Index 0 addresses THIS itself, index 1 addresses THAT itself.
    Pointer,
    /// Fixed eight-slot register window R5..R12.
    Temp,
    /// Per-unit variable namespace `<unit>.<index>`, resolved downstream.
    Static,
}

impl Segment {
    /// Parse a segment from its VM name.
    pub fn from_name(token: &str) -> Option<Self> {
        Some(match token {
            "constant" => Segment::Constant,
            "local" => Segment::Local,
            "argument" => Segment::Argument,
            "this" => Segment::This,
            "that" => Segment::That,
            "pointer" => Segment::Pointer,
            "temp" => Segment::Temp,
            "static" => Segment::Static,
            _ => return None,
        })
    }

    /// VM name of the segment.
    pub fn name(self) -> &'static str {
        match self {
            Segment::Constant => "constant",
            Segment::Local => "local",
            Segment::Argument => "argument",
            Segment::This => "this",
            Segment::That => "that",
            Segment::Pointer => "pointer",
            Segment::Temp => "temp",
            Segment::Static => "static",
        }
    }

    /// Assembly symbol holding the segment's base pointer, for the four
    /// pointer-indirected segments.
    pub fn base_symbol(self) -> Option<&'static str> {
        match self {
            Segment::Local => Some("LCL"),
            Segment::Argument => Some("ARG"),
            Segment::This => Some("THIS"),
            Segment::That => Some("THAT"),
            _ => None,
        }
    }
}

/// One parsed VM command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum Command {
    /// Arithmetic or logical operation on the operand stack.
    Arithmetic(ArithmeticOp),
    /// Copy segment[index] (or the literal, for constant) onto the stack top.
    Push { segment: Segment, index: u16 },
    /// Remove the stack top and store it into segment[index].
    Pop { segment: Segment, index: u16 },
    /// Declare a jump target scoped to the enclosing function.
    Label(String),
    /// Unconditional jump to a function-scoped label.
    Goto(String),
    /// Pop the stack and jump iff the popped value is non-zero.
    IfGoto(String),
    /// Declare a function entry point with `locals` zero-initialised slots.
    Function { name: String, locals: u16 },
    /// Invoke a function with `args` already-pushed arguments.
    Call { name: String, args: u16 },
    /// Return control and a single stack value to the caller.
    Return,
}

impl Command {
    /// Stable name of the command kind, used for summary accounting.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Arithmetic(_) => "arithmetic",
            Command::Push { .. } => "push",
            Command::Pop { .. } => "pop",
            Command::Label(_) => "label",
            Command::Goto(_) => "goto",
            Command::IfGoto(_) => "if-goto",
            Command::Function { .. } => "function",
            Command::Call { .. } => "call",
            Command::Return => "return",
        }
    }
}

impl fmt::Display for Command {
    /// Renders the canonical source form, e.g. `push local 2`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Arithmetic(op) => f.write_str(op.mnemonic()),
            Command::Push { segment, index } => write!(f, "push {} {}", segment.name(), index),
            Command::Pop { segment, index } => write!(f, "pop {} {}", segment.name(), index),
            Command::Label(name) => write!(f, "label {name}"),
            Command::Goto(name) => write!(f, "goto {name}"),
            Command::IfGoto(name) => write!(f, "if-goto {name}"),
            Command::Function { name, locals } => write!(f, "function {name} {locals}"),
            Command::Call { name, args } => write!(f, "call {name} {args}"),
            Command::Return => f.write_str("return"),
        }
    }
}
