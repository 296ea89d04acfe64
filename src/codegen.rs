//! Assembly generation for VM commands.
//!
//! One command in, a fixed sequence of Hack assembly lines out.  The emitter
//! owns every piece of naming state the calling convention needs: the
//! comparison label counters, the call-site counter, the current enclosing
//! function (for label scoping), and the active unit name (for static
//! variable naming).  The counters increase monotonically across the whole
//! output and are never reset, which is what guarantees label uniqueness when
//! the same operator or callee appears many times.
//!
//! The generated sequences maintain the stack-pointer discipline strictly:
//! SP (RAM[0]) always points one past the stack top, every push nets +1 and
//! every pop nets -1.  R13 is scratch for resolved pop addresses and the
//! frame snapshot during return; R14 holds the read-back return address.

use log::debug;
use thiserror::Error;

use crate::command::{ArithmeticOp, Command, Segment};

/// Result alias for code generation.
pub type CodegenResult<T> = Result<T, CodegenError>;

/// Base register of the fixed temp window (R5..R12).
const TEMP_BASE: u16 = 5;
/// Base register of the pointer pair (R3 = THIS, R4 = THAT).
const POINTER_BASE: u16 = 3;
/// Number of slots in the temp window.
const TEMP_SLOTS: u16 = 8;
/// First stack address; the bootstrap points SP here.
const STACK_BASE: u16 = 256;
/// Conventional entry function invoked by the bootstrap.
const ENTRY_FUNCTION: &str = "Sys.init";

/// Stateful assembly emitter for one translation pass.
///
/// All mutable naming state lives here rather than in process-wide globals,
/// so independent passes (and tests) never interfere with each other.
#[derive(Debug, Default)]
pub struct Emitter {
    unit: String,
    function: Option<String>,
    eq_count: u32,
    gt_count: u32,
    lt_count: u32,
    call_count: u32,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch the active translation unit.  Resets the label-scoping function
    /// but deliberately leaves every counter untouched.
    pub fn set_unit(&mut self, unit: &str) {
        debug!("emitter: entering unit {unit}");
        self.unit = unit.to_owned();
        self.function = None;
    }

    /// Total comparison labels generated so far.
    pub fn comparison_labels(&self) -> u64 {
        u64::from(self.eq_count) + u64::from(self.gt_count) + u64::from(self.lt_count)
    }

    /// Total call sites translated so far.
    pub fn call_sites(&self) -> u64 {
        u64::from(self.call_count)
    }

    /// Translate one command into its assembly sequence.
    ///
    /// The first emitted line is always a `//` comment echoing the command,
    /// so the output stays traceable back to its source.
    pub fn emit(&mut self, command: &Command) -> CodegenResult<Vec<String>> {
        let mut out = vec![format!("// {command}")];
        match command {
            Command::Arithmetic(op) => self.arithmetic(*op, &mut out),
            Command::Push { segment, index } => self.push(*segment, *index, &mut out)?,
            Command::Pop { segment, index } => self.pop(*segment, *index, &mut out)?,
            Command::Label(name) => self.label(name, &mut out),
            Command::Goto(name) => self.goto(name, &mut out),
            Command::IfGoto(name) => self.if_goto(name, &mut out),
            Command::Function { name, locals } => self.function(name, *locals, &mut out),
            Command::Call { name, args } => self.call(name, *args, &mut out),
            Command::Return => self.ret(&mut out),
        }
        Ok(out)
    }

    /// Emit the fixed bootstrap: point SP at the stack base, then call the
    /// entry function with zero arguments.
    pub fn bootstrap(&mut self) -> Vec<String> {
        let mut out = vec![
            "// bootstrap".to_owned(),
            format!("@{STACK_BASE}"),
            "D=A".to_owned(),
            "@SP".to_owned(),
            "M=D".to_owned(),
        ];
        self.call(ENTRY_FUNCTION, 0, &mut out);
        out
    }

    fn push(&mut self, segment: Segment, index: u16, out: &mut Vec<String>) -> CodegenResult<()> {
        match segment {
            Segment::Constant => {
                out.push(format!("@{index}"));
                out.push("D=A".to_owned());
            }
            Segment::Static => {
                out.push(format!("@{}.{index}", self.unit));
                out.push("D=M".to_owned());
            }
            Segment::Pointer => {
                out.push(format!("@R{}", self.pointer_slot(index)?));
                out.push("D=M".to_owned());
            }
            Segment::Temp => {
                out.push(format!("@R{}", self.temp_slot(index)?));
                out.push("D=M".to_owned());
            }
            Segment::Local | Segment::Argument | Segment::This | Segment::That => {
                self.indirect_address(segment, index, out);
                out.push("D=M".to_owned());
            }
        }
        push_d(out);
        Ok(())
    }

    fn pop(&mut self, segment: Segment, index: u16, out: &mut Vec<String>) -> CodegenResult<()> {
        // Resolve the target address into D, park it in R13, then move the
        // popped value through D into the parked address.
        match segment {
            Segment::Constant => return Err(CodegenError::ConstantPop),
            Segment::Static => {
                out.push(format!("@{}.{index}", self.unit));
                out.push("D=A".to_owned());
            }
            Segment::Pointer => {
                out.push(format!("@R{}", self.pointer_slot(index)?));
                out.push("D=A".to_owned());
            }
            Segment::Temp => {
                out.push(format!("@R{}", self.temp_slot(index)?));
                out.push("D=A".to_owned());
            }
            Segment::Local | Segment::Argument | Segment::This | Segment::That => {
                self.indirect_address(segment, index, out);
                out.push("D=A".to_owned());
            }
        }
        out.push("@R13".to_owned());
        out.push("M=D".to_owned());
        pop_d(out);
        out.push("@R13".to_owned());
        out.push("A=M".to_owned());
        out.push("M=D".to_owned());
        Ok(())
    }

    /// Leave A holding base-pointer + index for the four indirected segments.
    fn indirect_address(&self, segment: Segment, index: u16, out: &mut Vec<String>) {
        // base_symbol is total over the four segments routed here.
        let base = segment.base_symbol().unwrap_or("LCL");
        out.push(format!("@{base}"));
        out.push("D=M".to_owned());
        out.push(format!("@{index}"));
        out.push("A=D+A".to_owned());
    }

    fn pointer_slot(&self, index: u16) -> CodegenResult<u16> {
        if index > 1 {
            return Err(CodegenError::PointerIndexOutOfRange(index));
        }
        Ok(POINTER_BASE + index)
    }

    fn temp_slot(&self, index: u16) -> CodegenResult<u16> {
        if index >= TEMP_SLOTS {
            return Err(CodegenError::TempIndexOutOfRange(index));
        }
        Ok(TEMP_BASE + index)
    }

    fn arithmetic(&mut self, op: ArithmeticOp, out: &mut Vec<String>) {
        if op.is_binary() {
            // y lands in D, then A is pointed at x (the new stack top).
            pop_d(out);
        }
        out.push("@SP".to_owned());
        out.push("M=M-1".to_owned());
        out.push("@SP".to_owned());
        out.push("A=M".to_owned());
        match op {
            ArithmeticOp::Add => out.push("M=M+D".to_owned()),
            ArithmeticOp::Sub => out.push("M=M-D".to_owned()),
            ArithmeticOp::And => out.push("M=M&D".to_owned()),
            ArithmeticOp::Or => out.push("M=M|D".to_owned()),
            ArithmeticOp::Neg => out.push("M=-M".to_owned()),
            ArithmeticOp::Not => out.push("M=!M".to_owned()),
            ArithmeticOp::Eq => {
                let count = self.eq_count;
                self.eq_count += 1;
                comparison_branch("EQ", "JEQ", count, out);
            }
            ArithmeticOp::Gt => {
                let count = self.gt_count;
                self.gt_count += 1;
                comparison_branch("GT", "JGT", count, out);
            }
            ArithmeticOp::Lt => {
                let count = self.lt_count;
                self.lt_count += 1;
                comparison_branch("LT", "JLT", count, out);
            }
        }
        out.push("@SP".to_owned());
        out.push("M=M+1".to_owned());
    }

    fn label(&mut self, name: &str, out: &mut Vec<String>) {
        out.push(format!("({})", self.scoped_label(name)));
    }

    fn goto(&mut self, name: &str, out: &mut Vec<String>) {
        out.push(format!("@{}", self.scoped_label(name)));
        out.push("0;JMP".to_owned());
    }

    fn if_goto(&mut self, name: &str, out: &mut Vec<String>) {
        pop_d(out);
        out.push(format!("@{}", self.scoped_label(name)));
        out.push("D;JNE".to_owned());
    }

    /// Namespace a label with the enclosing function so identical label text
    /// in different functions never collides in the flat assembly namespace.
    fn scoped_label(&self, name: &str) -> String {
        match &self.function {
            Some(function) => format!("{function}${name}"),
            None => name.to_owned(),
        }
    }

    fn function(&mut self, name: &str, locals: u16, out: &mut Vec<String>) {
        debug!("emitter: entering function {name} ({locals} locals)");
        out.push(format!("({name})"));
        for _ in 0..locals {
            out.push("D=0".to_owned());
            push_d(out);
        }
        self.function = Some(name.to_owned());
    }

    fn call(&mut self, name: &str, args: u16, out: &mut Vec<String>) {
        let return_label = format!("{name}$ret.{}", self.call_count);
        self.call_count += 1;

        // Push the return address, then the caller's four base pointers.
        out.push(format!("@{return_label}"));
        out.push("D=A".to_owned());
        push_d(out);
        for symbol in ["LCL", "ARG", "THIS", "THAT"] {
            out.push(format!("@{symbol}"));
            out.push("D=M".to_owned());
            push_d(out);
        }

        // ARG = SP - (args + 5), pointing at the first pushed argument.
        out.push("@SP".to_owned());
        out.push("D=M".to_owned());
        out.push(format!("@{}", u32::from(args) + 5));
        out.push("D=D-A".to_owned());
        out.push("@ARG".to_owned());
        out.push("M=D".to_owned());

        // LCL = SP.
        out.push("@SP".to_owned());
        out.push("D=M".to_owned());
        out.push("@LCL".to_owned());
        out.push("M=D".to_owned());

        out.push(format!("@{name}"));
        out.push("0;JMP".to_owned());
        out.push(format!("({return_label})"));
    }

    fn ret(&mut self, out: &mut Vec<String>) {
        // R13 = LCL, the frame base.
        out.push("@LCL".to_owned());
        out.push("D=M".to_owned());
        out.push("@R13".to_owned());
        out.push("M=D".to_owned());

        // R14 = *(frame - 5), the return address.  Read before the return
        // value is placed: for a zero-argument callee this slot and *ARG are
        // the same RAM word.
        out.push("@5".to_owned());
        out.push("D=D-A".to_owned());
        out.push("A=D".to_owned());
        out.push("D=M".to_owned());
        out.push("@R14".to_owned());
        out.push("M=D".to_owned());

        // *ARG = pop(), using the pre-restore ARG.
        pop_d(out);
        out.push("@ARG".to_owned());
        out.push("A=M".to_owned());
        out.push("M=D".to_owned());

        // SP = ARG + 1.
        out.push("@ARG".to_owned());
        out.push("D=M".to_owned());
        out.push("@SP".to_owned());
        out.push("M=D+1".to_owned());

        // Restore THAT, THIS, ARG, LCL from the saved frame.  ARG and LCL
        // are clobbered last; nothing after this point depends on them.
        for (offset, symbol) in [(1u16, "THAT"), (2, "THIS"), (3, "ARG"), (4, "LCL")] {
            out.push("@R13".to_owned());
            out.push("D=M".to_owned());
            out.push(format!("@{offset}"));
            out.push("D=D-A".to_owned());
            out.push("A=D".to_owned());
            out.push("D=M".to_owned());
            out.push(format!("@{symbol}"));
            out.push("M=D".to_owned());
        }

        out.push("@R14".to_owned());
        out.push("A=M".to_owned());
        out.push("0;JMP".to_owned());
    }
}

/// Comparison tail: on entry D holds y and A addresses x.  Computes
/// D = x - y and branches to the true arm, writing -1 there and 0 on the
/// fall-through, converging on a unique end label.  The jump condition is
/// evaluated on x - y, so `gt` is true exactly when x > y.
fn comparison_branch(tag: &str, jump: &str, count: u32, out: &mut Vec<String>) {
    out.push("D=M-D".to_owned());
    out.push(format!("@{tag}.{count}"));
    out.push(format!("D;{jump}"));
    out.push("@SP".to_owned());
    out.push("A=M".to_owned());
    out.push("M=0".to_owned());
    out.push(format!("@END_{tag}.{count}"));
    out.push("0;JMP".to_owned());
    out.push(format!("({tag}.{count})"));
    out.push("@SP".to_owned());
    out.push("A=M".to_owned());
    out.push("M=-1".to_owned());
    out.push(format!("(END_{tag}.{count})"));
}

/// Push D onto the stack and advance SP.
fn push_d(out: &mut Vec<String>) {
    out.push("@SP".to_owned());
    out.push("A=M".to_owned());
    out.push("M=D".to_owned());
    out.push("@SP".to_owned());
    out.push("M=M+1".to_owned());
}

/// Retreat SP and load the popped value into D.
fn pop_d(out: &mut Vec<String>) {
    out.push("@SP".to_owned());
    out.push("M=M-1".to_owned());
    out.push("A=M".to_owned());
    out.push("D=M".to_owned());
}

/// Semantic errors with no valid code-generation fallback.
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("cannot pop into the constant segment")]
    ConstantPop,
    #[error("pointer index must be 0 or 1, got {0}")]
    PointerIndexOutOfRange(u16),
    #[error("temp index must be below 8, got {0}")]
    TempIndexOutOfRange(u16),
}
