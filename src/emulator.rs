//! Hack machine emulator for emitted assembly.
//!
//! The emulator loads the translator's text output directly: A-instructions,
//! C-instructions and parenthesised label declarations.  Symbol handling is
//! two-phase, matching the downstream assembler's discipline: a pre-scan
//! collects declared jump targets, then a second pass assigns RAM addresses
//! to undeclared symbols on first use, starting at address 16.  Execution is
//! deterministic and bounded by an explicit step budget, so tests can run
//! programs that end in a spin loop and then inspect memory.

use std::collections::HashMap;

use thiserror::Error;

use crate::translator::AsmSink;

/// Addressable RAM size of the target machine, in 16-bit words.
pub const RAM_WORDS: usize = 32768;
/// First RAM address handed out to undeclared symbols.
const VARIABLE_BASE: u16 = 16;

/// Resource budget for one emulated run.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionLimits {
    pub max_steps: u64,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_steps: 1_000_000,
        }
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    /// The program counter advanced past the last instruction.
    EndOfProgram,
    /// The step budget ran out (e.g. the program ended in a spin loop).
    StepBudget,
}

/// Destination bits of a C-instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Dest {
    a: bool,
    d: bool,
    m: bool,
}

impl Dest {
    fn parse(text: &str) -> Option<Self> {
        let mut dest = Dest::default();
        for c in text.chars() {
            match c {
                'A' => dest.a = true,
                'D' => dest.d = true,
                'M' => dest.m = true,
                _ => return None,
            }
        }
        Some(dest)
    }
}

/// Computation field of a C-instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comp {
    Zero,
    One,
    NegOne,
    D,
    A,
    M,
    NotD,
    NotA,
    NotM,
    NegD,
    NegA,
    NegM,
    DPlusOne,
    APlusOne,
    MPlusOne,
    DMinusOne,
    AMinusOne,
    MMinusOne,
    DPlusA,
    DPlusM,
    DMinusA,
    DMinusM,
    AMinusD,
    MMinusD,
    DAndA,
    DAndM,
    DOrA,
    DOrM,
}

impl Comp {
    fn parse(text: &str) -> Option<Self> {
        Some(match text {
            "0" => Comp::Zero,
            "1" => Comp::One,
            "-1" => Comp::NegOne,
            "D" => Comp::D,
            "A" => Comp::A,
            "M" => Comp::M,
            "!D" => Comp::NotD,
            "!A" => Comp::NotA,
            "!M" => Comp::NotM,
            "-D" => Comp::NegD,
            "-A" => Comp::NegA,
            "-M" => Comp::NegM,
            "D+1" | "1+D" => Comp::DPlusOne,
            "A+1" | "1+A" => Comp::APlusOne,
            "M+1" | "1+M" => Comp::MPlusOne,
            "D-1" => Comp::DMinusOne,
            "A-1" => Comp::AMinusOne,
            "M-1" => Comp::MMinusOne,
            "D+A" | "A+D" => Comp::DPlusA,
            "D+M" | "M+D" => Comp::DPlusM,
            "D-A" => Comp::DMinusA,
            "D-M" => Comp::DMinusM,
            "A-D" => Comp::AMinusD,
            "M-D" => Comp::MMinusD,
            "D&A" | "A&D" => Comp::DAndA,
            "D&M" | "M&D" => Comp::DAndM,
            "D|A" | "A|D" => Comp::DOrA,
            "D|M" | "M|D" => Comp::DOrM,
            _ => return None,
        })
    }

    fn uses_m(self) -> bool {
        matches!(
            self,
            Comp::M
                | Comp::NotM
                | Comp::NegM
                | Comp::MPlusOne
                | Comp::MMinusOne
                | Comp::DPlusM
                | Comp::DMinusM
                | Comp::MMinusD
                | Comp::DAndM
                | Comp::DOrM
        )
    }

    fn eval(self, a: i16, d: i16, m: i16) -> i16 {
        match self {
            Comp::Zero => 0,
            Comp::One => 1,
            Comp::NegOne => -1,
            Comp::D => d,
            Comp::A => a,
            Comp::M => m,
            Comp::NotD => !d,
            Comp::NotA => !a,
            Comp::NotM => !m,
            Comp::NegD => d.wrapping_neg(),
            Comp::NegA => a.wrapping_neg(),
            Comp::NegM => m.wrapping_neg(),
            Comp::DPlusOne => d.wrapping_add(1),
            Comp::APlusOne => a.wrapping_add(1),
            Comp::MPlusOne => m.wrapping_add(1),
            Comp::DMinusOne => d.wrapping_sub(1),
            Comp::AMinusOne => a.wrapping_sub(1),
            Comp::MMinusOne => m.wrapping_sub(1),
            Comp::DPlusA => d.wrapping_add(a),
            Comp::DPlusM => d.wrapping_add(m),
            Comp::DMinusA => d.wrapping_sub(a),
            Comp::DMinusM => d.wrapping_sub(m),
            Comp::AMinusD => a.wrapping_sub(d),
            Comp::MMinusD => m.wrapping_sub(d),
            Comp::DAndA => d & a,
            Comp::DAndM => d & m,
            Comp::DOrA => d | a,
            Comp::DOrM => d | m,
        }
    }
}

/// Jump condition of a C-instruction, evaluated on the computed value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Jump {
    #[default]
    None,
    Jgt,
    Jeq,
    Jge,
    Jlt,
    Jne,
    Jle,
    Jmp,
}

impl Jump {
    fn parse(text: &str) -> Option<Self> {
        Some(match text {
            "JGT" => Jump::Jgt,
            "JEQ" => Jump::Jeq,
            "JGE" => Jump::Jge,
            "JLT" => Jump::Jlt,
            "JNE" => Jump::Jne,
            "JLE" => Jump::Jle,
            "JMP" => Jump::Jmp,
            _ => return None,
        })
    }

    fn taken(self, value: i16) -> bool {
        match self {
            Jump::None => false,
            Jump::Jgt => value > 0,
            Jump::Jeq => value == 0,
            Jump::Jge => value >= 0,
            Jump::Jlt => value < 0,
            Jump::Jne => value != 0,
            Jump::Jle => value <= 0,
            Jump::Jmp => true,
        }
    }
}

/// One decoded instruction with all symbols already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AsmInstruction {
    /// `@value`: load a constant or resolved address into A.
    Load(i16),
    /// `dest=comp;jump`.
    Compute { dest: Dest, comp: Comp, jump: Jump },
}

/// Emulated Hack machine over a loaded assembly program.
#[derive(Debug)]
pub struct Machine {
    program: Vec<AsmInstruction>,
    symbols: HashMap<String, u16>,
    ram: Vec<i16>,
    a: i16,
    d: i16,
    pc: usize,
    steps: u64,
    limits: ExecutionLimits,
}

impl Machine {
    /// Load an assembly program with default limits.
    pub fn load(source: &str) -> Result<Self, EmulatorError> {
        Self::load_with_limits(source, ExecutionLimits::default())
    }

    /// Load an assembly program with an explicit step budget.
    pub fn load_with_limits(
        source: &str,
        limits: ExecutionLimits,
    ) -> Result<Self, EmulatorError> {
        let cleaned = clean_lines(source);
        let labels = scan_labels(&cleaned)?;
        let (program, symbols) = assemble(&cleaned, labels)?;
        Ok(Self {
            program,
            symbols,
            ram: vec![0; RAM_WORDS],
            a: 0,
            d: 0,
            pc: 0,
            steps: 0,
            limits,
        })
    }

    /// RAM word at `address`.
    pub fn ram(&self, address: usize) -> i16 {
        self.ram[address]
    }

    /// Overwrite a RAM word, e.g. to seed segment base pointers before a run.
    pub fn set_ram(&mut self, address: usize, value: i16) {
        self.ram[address] = value;
    }

    /// Resolved address of a symbol, if the program references it.
    pub fn symbol(&self, name: &str) -> Option<u16> {
        self.symbols.get(name).copied()
    }

    /// Steps executed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Run until the program counter leaves the program or the step budget
    /// is exhausted.
    pub fn run(&mut self) -> Result<Halt, EmulatorError> {
        while self.pc < self.program.len() {
            if self.steps >= self.limits.max_steps {
                return Ok(Halt::StepBudget);
            }
            self.step()?;
        }
        Ok(Halt::EndOfProgram)
    }

    fn step(&mut self) -> Result<(), EmulatorError> {
        let instruction = self.program[self.pc];
        self.steps += 1;
        match instruction {
            AsmInstruction::Load(value) => {
                self.a = value;
                self.pc += 1;
            }
            AsmInstruction::Compute { dest, comp, jump } => {
                let a_before = self.a;
                let m = if comp.uses_m() {
                    self.read_m(a_before)?
                } else {
                    0
                };
                let value = comp.eval(a_before, self.d, m);
                // The memory write addresses through A as it was before this
                // instruction, matching the hardware's register timing.
                if dest.m {
                    self.write_m(a_before, value)?;
                }
                if dest.a {
                    self.a = value;
                }
                if dest.d {
                    self.d = value;
                }
                if jump.taken(value) {
                    if a_before < 0 {
                        return Err(EmulatorError::AddressOutOfRange(i32::from(a_before)));
                    }
                    self.pc = a_before as usize;
                } else {
                    self.pc += 1;
                }
            }
        }
        Ok(())
    }

    fn read_m(&self, address: i16) -> Result<i16, EmulatorError> {
        if address < 0 || address as usize >= RAM_WORDS {
            return Err(EmulatorError::AddressOutOfRange(i32::from(address)));
        }
        Ok(self.ram[address as usize])
    }

    fn write_m(&mut self, address: i16, value: i16) -> Result<(), EmulatorError> {
        if address < 0 || address as usize >= RAM_WORDS {
            return Err(EmulatorError::AddressOutOfRange(i32::from(address)));
        }
        self.ram[address as usize] = value;
        Ok(())
    }
}

/// The emulator doubles as a sink, letting tests wire a translator straight
/// into a fresh machine image without an intermediate buffer.
#[derive(Debug, Default)]
pub struct AsmBuffer {
    lines: Vec<String>,
}

impl AsmBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Load the buffered program into a machine.
    pub fn into_machine(self, limits: ExecutionLimits) -> Result<Machine, EmulatorError> {
        Machine::load_with_limits(&self.text(), limits)
    }
}

impl AsmSink for AsmBuffer {
    fn line(&mut self, line: &str) -> std::io::Result<()> {
        self.lines.push(line.to_owned());
        Ok(())
    }
}

fn clean_lines(source: &str) -> Vec<(usize, String)> {
    source
        .lines()
        .enumerate()
        .filter_map(|(index, raw)| {
            let content = match raw.find("//") {
                Some(at) => &raw[..at],
                None => raw,
            };
            let compact: String = content.split_whitespace().collect();
            if compact.is_empty() {
                None
            } else {
                Some((index + 1, compact))
            }
        })
        .collect()
}

/// First pass: map each label declaration to the address of the following
/// instruction.
fn scan_labels(lines: &[(usize, String)]) -> Result<HashMap<String, u16>, EmulatorError> {
    let mut labels = HashMap::new();
    let mut address: u16 = 0;
    for (line, text) in lines {
        if let Some(label) = text.strip_prefix('(') {
            let label = label
                .strip_suffix(')')
                .ok_or_else(|| EmulatorError::UnrecognizedInstruction {
                    line: *line,
                    text: text.clone(),
                })?;
            if !is_symbol(label) {
                return Err(EmulatorError::InvalidSymbol {
                    line: *line,
                    text: label.to_owned(),
                });
            }
            if labels.insert(label.to_owned(), address).is_some() {
                return Err(EmulatorError::DuplicateLabel {
                    line: *line,
                    label: label.to_owned(),
                });
            }
        } else {
            address += 1;
        }
    }
    Ok(labels)
}

/// Second pass: decode instructions, resolving symbols against labels, the
/// predefined register names, and first-use variable allocation from 16 up.
fn assemble(
    lines: &[(usize, String)],
    labels: HashMap<String, u16>,
) -> Result<(Vec<AsmInstruction>, HashMap<String, u16>), EmulatorError> {
    let mut symbols = labels;
    let mut next_variable = VARIABLE_BASE;
    let mut program = Vec::new();

    for (line, text) in lines {
        if text.starts_with('(') {
            continue;
        }
        if let Some(operand) = text.strip_prefix('@') {
            let address = if let Ok(value) = operand.parse::<u16>() {
                if value > i16::MAX as u16 {
                    return Err(EmulatorError::ConstantOutOfRange {
                        line: *line,
                        value: u32::from(value),
                    });
                }
                value
            } else if let Some(value) = predefined_symbol(operand) {
                value
            } else if is_symbol(operand) {
                match symbols.get(operand) {
                    Some(value) => *value,
                    None => {
                        let value = next_variable;
                        symbols.insert(operand.to_owned(), value);
                        next_variable += 1;
                        value
                    }
                }
            } else {
                return Err(EmulatorError::InvalidSymbol {
                    line: *line,
                    text: operand.to_owned(),
                });
            };
            program.push(AsmInstruction::Load(address as i16));
        } else {
            program.push(decode_compute(*line, text)?);
        }
    }
    Ok((program, symbols))
}

fn decode_compute(line: usize, text: &str) -> Result<AsmInstruction, EmulatorError> {
    let unrecognized = || EmulatorError::UnrecognizedInstruction {
        line,
        text: text.to_owned(),
    };

    let (rest, jump) = match text.split_once(';') {
        Some((rest, jump)) => (rest, Jump::parse(jump).ok_or_else(unrecognized)?),
        None => (text, Jump::None),
    };
    let (dest, comp) = match rest.split_once('=') {
        Some((dest, comp)) => (Dest::parse(dest).ok_or_else(unrecognized)?, comp),
        None => (Dest::default(), rest),
    };
    let comp = Comp::parse(comp).ok_or_else(unrecognized)?;
    Ok(AsmInstruction::Compute { dest, comp, jump })
}

fn predefined_symbol(name: &str) -> Option<u16> {
    Some(match name {
        "SP" => 0,
        "LCL" => 1,
        "ARG" => 2,
        "THIS" => 3,
        "THAT" => 4,
        "SCREEN" => 16384,
        "KBD" => 24576,
        _ => {
            let index = name.strip_prefix('R')?.parse::<u16>().ok()?;
            if index > 15 {
                return None;
            }
            index
        }
    })
}

fn is_symbol(text: &str) -> bool {
    !text.is_empty()
        && !text.starts_with(|c: char| c.is_ascii_digit())
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$' | ':'))
}

/// Errors raised while loading or running a program.
#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("line {line}: unrecognized instruction '{text}'")]
    UnrecognizedInstruction { line: usize, text: String },
    #[error("line {line}: invalid symbol '{text}'")]
    InvalidSymbol { line: usize, text: String },
    #[error("line {line}: duplicate label '{label}'")]
    DuplicateLabel { line: usize, label: String },
    #[error("line {line}: constant {value} exceeds the address range")]
    ConstantOutOfRange { line: usize, value: u32 },
    #[error("memory access out of range: address {0}")]
    AddressOutOfRange(i32),
}
