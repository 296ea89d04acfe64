//! Command-line front end for the VM-to-assembly translator.
//!
//! Thin glue only: locate the input unit(s), derive the output path, and
//! hand everything to the library driver.  A single `.vm` file translates to
//! a sibling `.asm` file; a directory translates every `.vm` file inside it
//! (sorted by name) into `<dir>/<dirname>.asm`, with the entry bootstrap
//! emitted when the program spans more than one unit.

use std::error::Error;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Arg, ArgAction, ArgMatches, Command};
use log::info;

use vm_translator::translator::{
    TranslationUnit, Translator, TranslatorOptions, WriterSink,
};

fn args() -> ArgMatches {
    Command::new("vm-translator")
        .about("translates stack VM code into Hack assembly")
        .arg(
            Arg::new("path")
                .required(true)
                .help("a .vm file, or a directory containing .vm files"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("output .asm path (defaults to a sibling of the input)"),
        )
        .arg(
            Arg::new("summary")
                .long("summary")
                .action(ArgAction::SetTrue)
                .help("print a JSON translation summary to stdout"),
        )
        .arg(
            Arg::new("lenient")
                .long("lenient")
                .action(ArgAction::SetTrue)
                .help("skip unclassified lines instead of failing"),
        )
        .get_matches()
}

fn main() {
    env_logger::init();
    if let Err(err) = run(&args()) {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let path = PathBuf::from(
        matches
            .get_one::<String>("path")
            .map(String::as_str)
            .unwrap_or_default(),
    );

    let (units, default_output) = collect_units(&path)?;
    let output = match matches.get_one::<String>("output") {
        Some(explicit) => PathBuf::from(explicit),
        None => default_output,
    };

    let options = TranslatorOptions {
        skip_unclassified: matches.get_flag("lenient"),
    };
    let sink = WriterSink::new(BufWriter::new(File::create(&output)?));
    let mut translator = Translator::with_options(sink, options);
    let summary = translator.run(&units)?;
    info!(
        "translated {} command(s) from {} unit(s) into {}",
        summary.total_commands(),
        summary.units.len(),
        output.display()
    );

    if matches.get_flag("summary") {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

/// Gather translation units and the derived output path.
fn collect_units(path: &Path) -> Result<(Vec<TranslationUnit>, PathBuf), Box<dyn Error>> {
    if path.is_dir() {
        let mut sources: Vec<PathBuf> = fs::read_dir(path)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "vm"))
            .collect();
        sources.sort();
        if sources.is_empty() {
            return Err(format!("no .vm files found in {}", path.display()).into());
        }
        let units = sources
            .iter()
            .map(|p| read_unit(p))
            .collect::<Result<Vec<_>, _>>()?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "out".to_owned());
        Ok((units, path.join(format!("{name}.asm"))))
    } else {
        let unit = read_unit(path)?;
        Ok((vec![unit], path.with_extension("asm")))
    }
}

fn read_unit(path: &Path) -> Result<TranslationUnit, Box<dyn Error>> {
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .ok_or_else(|| format!("cannot derive a unit name from {}", path.display()))?;
    let source = fs::read_to_string(path)
        .map_err(|err| format!("cannot read {}: {err}", path.display()))?;
    Ok(TranslationUnit::new(name, source))
}
