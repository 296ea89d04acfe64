//! Program driver sequencing translation units into one assembly output.
//!
//! The driver pulls commands from the reader and pushes their translations
//! into a sink, one unit after another.  It decides the one cross-unit
//! question — whether the entry bootstrap is needed — and handles the
//! per-unit state handoff: switching units resets the static-variable
//! namespace and the label-scoping function, but the emitter's uniqueness
//! counters keep increasing across the whole output.
//!
//! Translation is single-threaded and stops on the first fatal error.  The
//! sink is appended to monotonically; on failure the output is a valid
//! prefix of the intended program, never corrupted.

use std::io::{self, Write};

use log::{debug, warn};
use thiserror::Error;

use crate::codegen::{CodegenError, Emitter};
use crate::parser::{CommandReader, LineClass, ParseError};
use crate::summary::{SummaryCollector, TranslationSummary};

/// One named translation unit and its full source text.
#[derive(Debug, Clone)]
pub struct TranslationUnit {
    pub name: String,
    pub source: String,
}

impl TranslationUnit {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// Destination for emitted assembly lines.
///
/// The driver never reads back what it wrote; implementations only need to
/// append.  Write failures are fatal to the pass.
pub trait AsmSink {
    fn line(&mut self, line: &str) -> io::Result<()>;
}

impl AsmSink for Vec<String> {
    fn line(&mut self, line: &str) -> io::Result<()> {
        self.push(line.to_owned());
        Ok(())
    }
}

/// Sink writing through any [`Write`] implementation, one line at a time.
#[derive(Debug)]
pub struct WriterSink<W: Write> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> AsmSink for WriterSink<W> {
    fn line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")
    }
}

/// Driver configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct TranslatorOptions {
    /// Skip lines the reader cannot classify instead of failing the pass.
    pub skip_unclassified: bool,
}

/// Orchestrates one translation pass over a set of units.
#[derive(Debug)]
pub struct Translator<S: AsmSink> {
    emitter: Emitter,
    sink: S,
    options: TranslatorOptions,
}

impl<S: AsmSink> Translator<S> {
    pub fn new(sink: S) -> Self {
        Self::with_options(sink, TranslatorOptions::default())
    }

    pub fn with_options(sink: S, options: TranslatorOptions) -> Self {
        Self {
            emitter: Emitter::new(),
            sink,
            options,
        }
    }

    /// Translate the units in order into the sink.
    ///
    /// The bootstrap (stack-pointer initialisation plus a call to the entry
    /// function) is emitted exactly once, before any unit content, iff the
    /// program spans more than one unit.
    pub fn run(&mut self, units: &[TranslationUnit]) -> Result<TranslationSummary, TranslateError> {
        let mut collector = SummaryCollector::new();

        if units.len() > 1 {
            let lines = self.emitter.bootstrap();
            self.write_block(&lines, &mut collector)?;
            collector.record_bootstrap();
        }

        for unit in units {
            debug!("translating unit {}", unit.name);
            collector.record_unit(&unit.name);
            self.translate_unit(unit, &mut collector)?;
        }

        Ok(collector.finish(self.emitter.comparison_labels(), self.emitter.call_sites()))
    }

    /// Consume the driver and hand back the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    fn translate_unit(
        &mut self,
        unit: &TranslationUnit,
        collector: &mut SummaryCollector,
    ) -> Result<(), TranslateError> {
        self.emitter.set_unit(&unit.name);
        for item in CommandReader::new(&unit.name, &unit.source) {
            match item? {
                LineClass::Command(sourced) => {
                    let lines = self.emitter.emit(&sourced.command).map_err(|source| {
                        TranslateError::Codegen {
                            unit: unit.name.clone(),
                            line: sourced.line,
                            source,
                        }
                    })?;
                    collector.record_command(&sourced.command);
                    self.write_block(&lines, collector)?;
                }
                LineClass::Unclassified { line, token } => {
                    if self.options.skip_unclassified {
                        warn!("{}:{line}: skipping unclassified line '{token}'", unit.name);
                        continue;
                    }
                    return Err(TranslateError::Unclassified {
                        unit: unit.name.clone(),
                        line,
                        token,
                    });
                }
            }
        }
        Ok(())
    }

    /// Write one command's translation followed by a separator blank line.
    fn write_block(
        &mut self,
        lines: &[String],
        collector: &mut SummaryCollector,
    ) -> Result<(), TranslateError> {
        for line in lines {
            self.sink.line(line)?;
        }
        self.sink.line("")?;
        collector.record_lines(lines.len() + 1);
        Ok(())
    }
}

/// Fatal errors terminating a translation pass.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("{unit}:{line}: {source}")]
    Codegen {
        unit: String,
        line: usize,
        source: CodegenError,
    },
    #[error("{unit}:{line}: unrecognized command '{token}'")]
    Unclassified {
        unit: String,
        line: usize,
        token: String,
    },
    #[error("failed to write assembly output: {0}")]
    Sink(#[from] io::Error),
}
