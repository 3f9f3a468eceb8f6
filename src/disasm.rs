use std::io::Write;

use crate::decoder::Decoder;
use crate::formatter::Formatter;

/// Counters collected over one disassembly run.
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq)]
#[display(
    "Decoded {records} records from {bytes} bytes: {lines} lines written, {suppressed} repeated halts suppressed, {faults} undecodable, {skipped} padding bytes skipped"
)]
pub struct Summary {
    pub bytes: usize,
    pub skipped: usize,
    pub records: usize,
    pub lines: usize,
    pub suppressed: usize,
    pub faults: usize,
}

/// Decodes `code` as if its first byte sat at address `start`, writing one line per
/// emitted record to `out`.
pub fn disassemble(code: &[u8], start: u64, out: &mut impl Write) -> std::io::Result<Summary> {
    let mut decoder = Decoder::new(code, start);
    let mut formatter = Formatter::new();
    let mut summary = Summary::default();

    for record in decoder.by_ref() {
        summary.records += 1;
        if record.fault().is_some() {
            summary.faults += 1;
        }
        match formatter.format(&record) {
            Some(line) => {
                writeln!(out, "{line}")?;
                summary.lines += 1;
            }
            None => summary.suppressed += 1,
        }
    }
    summary.skipped = decoder.skipped();
    summary.bytes = decoder.position();

    Ok(summary)
}
