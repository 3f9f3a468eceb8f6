use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use memmap2::Mmap;

use crate::disasm::{self, Summary};

#[derive(clap::Parser, Debug)]
#[command(version, about = "Disassembles Y86-64 object code into assembler-ready text")]
pub struct Args {
    /// Binary file holding the object code
    pub input: PathBuf,

    /// Text file the listing is written to
    pub output: PathBuf,

    /// Address of the first input byte: decimal, 0x-prefixed hex or 0-prefixed octal
    #[arg(value_parser = parse_offset, default_value = "0", allow_negative_numbers = true)]
    pub offset: u64,

    /// Also write JSON logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum OffsetError {
    #[display("Invalid offset {literal:?}: expected a decimal, 0x-prefixed hex or 0-prefixed octal number")]
    Malformed { literal: String },
    #[display("Invalid offset {literal:?}: does not fit in 64 bits")]
    OutOfRange { literal: String },
}

/// Parses an address the way C's `strtol(literal, NULL, 0)` reads it, but rejects
/// trailing garbage. Negative values wrap to their two's complement address.
pub fn parse_offset(literal: &str) -> Result<u64, OffsetError> {
    let trimmed = literal.trim_start();
    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let (radix, digits) = if let Some(hex) = unsigned.strip_prefix("0x").or_else(|| unsigned.strip_prefix("0X")) {
        (16, hex)
    } else if unsigned.len() > 1 && unsigned.starts_with('0') {
        (8, &unsigned[1..])
    } else {
        (10, unsigned)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(OffsetError::Malformed { literal: literal.to_string() });
    }
    let magnitude = u64::from_str_radix(digits, radix)
        .map_err(|_| OffsetError::OutOfRange { literal: literal.to_string() })?;

    Ok(if negative { magnitude.wrapping_neg() } else { magnitude })
}

#[derive(Debug, Display, Error)]
pub enum DisasmError {
    #[display("Failed to open {}: {}", path.display(), source)]
    OpenInput { path: PathBuf, source: std::io::Error },
    #[display("Failed to map {}: {}", path.display(), source)]
    MapInput { path: PathBuf, source: std::io::Error },
    #[display("Failed to open {}: {}", path.display(), source)]
    CreateOutput { path: PathBuf, source: std::io::Error },
    #[display("Failed to write {}: {}", path.display(), source)]
    WriteOutput { path: PathBuf, source: std::io::Error },
    #[display("Failed to open log file {}: {}", path.display(), source)]
    OpenLog { path: PathBuf, source: std::io::Error },
}

/// Opens both files and writes the listing of `args.input` to `args.output`.
pub fn run(args: &Args) -> Result<Summary, DisasmError> {
    let input = File::open(&args.input)
        .map_err(|source| DisasmError::OpenInput { path: args.input.clone(), source })?;
    let output = File::create(&args.output)
        .map_err(|source| DisasmError::CreateOutput { path: args.output.clone(), source })?;

    info!("Opened {}, starting offset 0x{:X}", args.input.display(), args.offset);
    info!("Saving output to {}", args.output.display());

    // SAFETY: the mapping is read-only and dropped before this function returns; the
    // input is not expected to change while it is being disassembled.
    let code = unsafe { Mmap::map(&input) }
        .map_err(|source| DisasmError::MapInput { path: args.input.clone(), source })?;

    let write_error = |source| DisasmError::WriteOutput { path: args.output.clone(), source };
    let mut writer = BufWriter::new(output);
    let summary = disasm::disassemble(&code, args.offset, &mut writer).map_err(write_error)?;
    writer.flush().map_err(write_error)?;

    Ok(summary)
}
