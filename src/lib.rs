//! Stack-VM to Hack-assembly translation toolkit.

pub mod codegen;
pub mod command;
pub mod emulator;
pub mod parser;
pub mod summary;
pub mod translator;
