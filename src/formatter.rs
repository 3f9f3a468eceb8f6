use crate::decoder::{Body, Record, Span};
use crate::opcodes::{Icode, Instruction};

/// Directive for undecodable bytes spanning exactly one quad word.
pub const QUAD_DIRECTIVE: &str = ".quad";

/// Directive for undecodable spans of any other length, one value per byte.
pub const BYTE_DIRECTIVE: &str = ".byte";

const BYTES_COLUMN: usize = 22;
const MNEMONIC_COLUMN: usize = 8;

fn operands(instruction: &Instruction) -> String {
    match *instruction {
        Instruction::Halt | Instruction::Nop | Instruction::Ret => String::new(),
        Instruction::Move { ra, rb, .. } | Instruction::Op { ra, rb, .. } => format!("{ra}, {rb}"),
        Instruction::Irmovq { rb, value } => format!("${value:#x}, {rb}"),
        Instruction::Mrmovq { ra, rb, displacement } => format!("{displacement:#x}({rb}), {ra}"),
        Instruction::Rmmovq { ra, rb, displacement } => format!("{ra},{displacement:#x}({rb})"),
        Instruction::Jump { dest, .. } | Instruction::Call { dest } => format!("{dest:#x}"),
        Instruction::Pushq { ra } | Instruction::Popq { ra } => format!("{ra}"),
    }
}

/// Undecodable bytes as a directive that assembles back to exactly the same span.
fn raw_directive(bytes: &Span, value: u64) -> (&'static str, String) {
    if bytes.len() == size_of::<u64>() {
        return (QUAD_DIRECTIVE, format!("{value:#x}"));
    }
    let values: Vec<String> = bytes.as_slice().iter().map(|byte| format!("{byte:#x}")).collect();
    (BYTE_DIRECTIVE, values.join(", "))
}

/// Renders one record as an output line, without the trailing newline.
///
/// The line is `<address>: <bytes><mnemonic><operands>` where the address is 16 zero-padded
/// hex digits, the bytes column is 22 characters wide and the mnemonic column 8. Numbers
/// are unsigned lowercase hex with a `0x` prefix. Returns `None` for a record that consumed
/// nothing.
pub fn render(record: &Record) -> Option<String> {
    if record.bytes.is_empty() {
        return None;
    }
    let (mnemonic, operands) = match &record.body {
        Body::Instruction(instruction) => (instruction.mnemonic(), operands(instruction)),
        Body::Raw { value, .. } => raw_directive(&record.bytes, *value),
    };
    Some(format!(
        "{:016x}: {:<BYTES_COLUMN$}{:<MNEMONIC_COLUMN$}{}",
        record.address,
        record.bytes.to_string(),
        mnemonic,
        operands,
    ))
}

/// Turns records into lines, remembering the previous instruction class so that a run
/// of `halt`s prints only its first member.
#[derive(Debug, Default)]
pub struct Formatter {
    previous: Option<Icode>,
}

impl Formatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The line to emit for `record`, or `None` if it is suppressed.
    pub fn format(&mut self, record: &Record) -> Option<String> {
        if record.bytes.is_empty() {
            return None;
        }
        // Raw records have no class, so they end a run of halts.
        let icode = record.icode();
        let repeated_halt = icode == Some(Icode::HALT) && self.previous == Some(Icode::HALT);
        self.previous = icode;
        if repeated_halt {
            trace!("{:#018x}: suppressed repeated halt", record.address);
            return None;
        }
        render(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{Decoder, Fault};

    fn lines(code: &[u8], start: u64) -> Vec<String> {
        let mut formatter = Formatter::new();
        Decoder::new(code, start).filter_map(|record| formatter.format(&record)).collect()
    }

    fn line(code: &[u8], start: u64) -> String {
        let record = Decoder::new(code, start).next().unwrap();
        render(&record).unwrap()
    }

    #[test]
    fn irmovq_line() {
        assert_eq!(
            line(&[0x30, 0xF2, 0x10, 0, 0, 0, 0, 0, 0, 0], 0x1016),
            "0000000000001016: 30F21000000000000000  irmovq  $0x10, %rdx"
        );
    }

    #[test]
    fn rrmovq_line() {
        assert_eq!(line(&[0x20, 0x02], 0x1000), "0000000000001000: 2002                  rrmovq  %rax, %rdx");
        assert_eq!(line(&[0x20, 0x20], 0x1021), "0000000000001021: 2020                  rrmovq  %rdx, %rax");
    }

    #[test]
    fn jump_line_has_no_dollar() {
        assert_eq!(
            line(&[0x74, 0x01, 0x20, 0, 0, 0, 0, 0, 0], 0x1002),
            "0000000000001002: 740120000000000000    jne     0x2001"
        );
        assert_eq!(
            line(&[0x80, 0, 0, 0, 0, 0, 0, 0, 0], 0),
            "0000000000000000: 800000000000000000    call    0x0"
        );
    }

    #[test]
    fn memory_move_lines() {
        assert_eq!(
            line(&[0x50, 0x02, 0, 0, 0x01, 0, 0, 0, 0, 0], 0x1020),
            "0000000000001020: 50020000010000000000  mrmovq  0x10000(%rdx), %rax"
        );
        assert_eq!(
            line(&[0x40, 0x35, 0x08, 0, 0, 0, 0, 0, 0, 0], 0),
            "0000000000000000: 40350800000000000000  rmmovq  %rbx,0x8(%rbp)"
        );
    }

    #[test]
    fn arithmetic_and_stack_lines() {
        assert_eq!(line(&[0x61, 0x9E], 0x10), "0000000000000010: 619E                  subq    %r9, %r14");
        assert_eq!(line(&[0xA0, 0x4F], 0x10), "0000000000000010: A04F                  pushq   %rsp");
        assert_eq!(line(&[0xB0, 0x7F], 0x10), "0000000000000010: B07F                  popq    %rdi");
        assert_eq!(line(&[0x25, 0x0F], 0x10), "0000000000000010: 250F                  cmovge  %rax, %r-1");
    }

    #[test]
    fn operandless_lines_keep_column_padding() {
        assert_eq!(line(&[0x90], 0x30), "0000000000000030: 90                    ret     ");
        assert_eq!(line(&[0x10], 0x31), "0000000000000031: 10                    nop     ");
    }

    #[test]
    fn large_values_are_unsigned() {
        assert_eq!(
            line(&[0x30, 0xF0, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF], u64::MAX),
            "ffffffffffffffff: 30F0FFFFFFFFFFFFFFFF  irmovq  $0xffffffffffffffff, %rax"
        );
    }

    #[test]
    fn invalid_encoding_renders_as_quad() {
        assert_eq!(
            line(&[0xF0, 0x01, 0, 0, 0, 0, 0, 0], 0x40),
            "0000000000000040: F001000000000000      .quad   0x1f0"
        );
    }

    #[test]
    fn unassigned_alu_function_renders_as_bytes() {
        let code = [0x65, 0x12];
        let record = Decoder::new(&code, 0).next().unwrap();
        assert_eq!(record.fault(), Some(Fault::UnassignedAluFunction));
        assert_eq!(render(&record).unwrap(), "0000000000000000: 6512                  .byte   0x65, 0x12");
    }

    #[test]
    fn truncated_tail_renders_as_bytes() {
        assert_eq!(lines(&[0x10, 0x70, 0x00], 0), vec![
            "0000000000000000: 10                    nop     ".to_string(),
            "0000000000000001: 7000                  .byte   0x70, 0x0".to_string(),
        ]);
    }

    fn directive_width(line: &str) -> usize {
        let directive = &line[40..];
        if let Some(value) = directive.strip_prefix(".quad   ") {
            assert!(!value.contains(','));
            8
        } else if let Some(values) = directive.strip_prefix(".byte   ") {
            values.split(", ").count()
        } else {
            panic!("not a raw directive: {line:?}");
        }
    }

    #[test]
    fn raw_directives_cover_exactly_the_consumed_bytes() {
        let streams: &[(&[u8], Fault)] = &[
            (&[0xF0, 1, 2, 3, 4, 5, 6, 7], Fault::InvalidEncoding),
            (&[0x01, 0, 0, 0, 0, 0, 0, 0], Fault::InvalidEncoding),
            (&[0x64, 0x01], Fault::UnassignedAluFunction),
            (&[0x66, 0x23], Fault::UnassignedAluFunction),
            (&[0x30], Fault::Truncated),
            (&[0x30, 0xF2, 0x10], Fault::Truncated),
            (&[0x30, 0xF2, 1, 2, 3, 4, 5, 6, 7], Fault::Truncated),
            (&[0xD0, 1, 2, 3], Fault::Truncated),
        ];
        for &(code, fault) in streams {
            let record = Decoder::new(code, 0).next().unwrap();
            assert_eq!(record.fault(), Some(fault), "{code:02X?}");
            let line = render(&record).unwrap();
            assert_eq!(directive_width(&line), record.bytes.len(), "{line:?}");
        }
    }

    #[test]
    fn halt_runs_print_once() {
        let output = lines(&[0x10, 0x00, 0x00, 0x00, 0x10, 0x00], 0x100);
        assert_eq!(output, vec![
            "0000000000000100: 10                    nop     ".to_string(),
            "0000000000000101: 00                    halt    ".to_string(),
            "0000000000000104: 10                    nop     ".to_string(),
            "0000000000000105: 00                    halt    ".to_string(),
        ]);
    }

    #[test]
    fn raw_record_breaks_a_halt_run() {
        let output = lines(&[0x10, 0x00, 0xC0, 1, 2, 3, 4, 5, 6, 7, 0x00], 0);
        assert_eq!(output.len(), 4);
        assert!(output[3].ends_with("halt    "));
    }

    #[test]
    fn formatters_keep_separate_history() {
        let code = [0x10, 0x00];
        let records: Vec<_> = Decoder::new(&code, 0).collect();
        let mut first = Formatter::new();
        let mut second = Formatter::new();
        assert!(first.format(&records[0]).is_some());
        assert!(first.format(&records[1]).is_some());
        assert!(first.format(&records[1]).is_none());
        assert!(second.format(&records[1]).is_some());
    }

    #[test]
    fn render_is_repeatable() {
        let code = [0x63, 0x01];
        let record = Decoder::new(&code, 0x2000).next().unwrap();
        assert_eq!(render(&record), render(&record));
        assert_eq!(render(&record).unwrap(), "0000000000002000: 6301                  xorq    %rax, %rcx");
    }

    #[test]
    fn empty_span_prints_nothing() {
        let record = Record {
            address: 0,
            bytes: Span::default(),
            body: Body::Raw { fault: Fault::Truncated, value: 0 },
        };
        assert_eq!(render(&record), None);
        assert_eq!(Formatter::new().format(&record), None);
    }
}
