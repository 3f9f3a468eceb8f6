use crate::opcodes::{AluOp, Condition, Icode, Instruction, Register};

/// Longest encoding: opcode, register byte and an 8-byte constant.
pub const MAX_INSTRUCTION_LEN: usize = 10;

/// Bytes consumed after an unrecognised opcode byte, keeping the stream aligned.
pub const RECOVERY_LEN: usize = 7;

/// The exact bytes one decode step consumed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Span {
    bytes: [u8; MAX_INSTRUCTION_LEN],
    len: usize,
}

impl Span {
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn extend_from_slice(&mut self, bytes: &[u8]) {
        let end = self.len + bytes.len();
        assert!(end <= MAX_INSTRUCTION_LEN, "instruction span overflow: {end} bytes");
        self.bytes[self.len..end].copy_from_slice(bytes);
        self.len = end;
    }

    /// The first eight bytes as a little-endian quad word, zero-extended when shorter.
    pub fn quad(&self) -> u64 {
        let mut quad = [0u8; 8];
        let len = self.len.min(8);
        quad[..len].copy_from_slice(&self.bytes[..len]);
        u64::from_le_bytes(quad)
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.as_slice().iter().try_for_each(|byte| write!(f, "{byte:02X}"))
    }
}

/// Why a decode step produced raw data instead of an instruction.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum Fault {
    #[display("unknown opcode/function combination")]
    InvalidEncoding,
    #[display("arithmetic function code without a mnemonic")]
    UnassignedAluFunction,
    #[display("stream ends mid-instruction")]
    Truncated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Body {
    Instruction(Instruction),
    Raw { fault: Fault, value: u64 },
}

/// One decode step: where it started, what it consumed and what it means.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Record {
    pub address: u64,
    pub bytes: Span,
    pub body: Body,
}

impl Record {
    pub fn icode(&self) -> Option<Icode> {
        match &self.body {
            Body::Instruction(instruction) => Some(instruction.icode()),
            Body::Raw { .. } => None,
        }
    }

    pub fn fault(&self) -> Option<Fault> {
        match self.body {
            Body::Instruction(_) => None,
            Body::Raw { fault, .. } => Some(fault),
        }
    }
}

/// Opcode byte with its function code already checked against the class.
#[derive(Clone, Copy, Debug)]
enum Class {
    Halt,
    Nop,
    Move(Condition),
    Irmov,
    Rmmov,
    Mrmov,
    Op(Option<AluOp>),
    Jump(Condition),
    Call,
    Ret,
    Push,
    Pop,
}

impl Class {
    fn classify(byte: u8) -> Option<Self> {
        let icode = Icode::try_from(byte >> 4).ok()?;
        let ifun = byte & 0xF;
        if ifun > icode.max_function() {
            return None;
        }
        Some(match icode {
            Icode::HALT => Class::Halt,
            Icode::NOP => Class::Nop,
            Icode::RRMOV => Class::Move(Condition::try_from(ifun).ok()?),
            Icode::IRMOV => Class::Irmov,
            Icode::RMMOV => Class::Rmmov,
            Icode::MRMOV => Class::Mrmov,
            Icode::MATH => Class::Op(AluOp::try_from(ifun).ok()),
            Icode::JUMP => Class::Jump(Condition::try_from(ifun).ok()?),
            Icode::CALL => Class::Call,
            Icode::RET => Class::Ret,
            Icode::PUSH => Class::Push,
            Icode::POP => Class::Pop,
        })
    }

    fn icode(self) -> Icode {
        match self {
            Class::Halt => Icode::HALT,
            Class::Nop => Icode::NOP,
            Class::Move(_) => Icode::RRMOV,
            Class::Irmov => Icode::IRMOV,
            Class::Rmmov => Icode::RMMOV,
            Class::Mrmov => Icode::MRMOV,
            Class::Op(_) => Icode::MATH,
            Class::Jump(_) => Icode::JUMP,
            Class::Call => Icode::CALL,
            Class::Ret => Icode::RET,
            Class::Push => Icode::PUSH,
            Class::Pop => Icode::POP,
        }
    }
}

/// Walks a read-only byte buffer one instruction at a time.
///
/// Leading zero bytes are treated as alignment padding: they advance the address but
/// produce no record. A record whose instruction runs past the end of the buffer is
/// yielded with [`Fault::Truncated`] and ends the iteration.
#[derive(Debug)]
pub struct Decoder<'a> {
    code: &'a [u8],
    position: usize,
    address: u64,
    skipped: usize,
    exhausted: bool,
}

impl<'a> Decoder<'a> {
    pub fn new(code: &'a [u8], start: u64) -> Self {
        let skipped = code.iter().take_while(|&&byte| byte == 0).count();
        if skipped > 0 {
            debug!("Skipped {skipped} bytes of leading padding");
        }
        Self {
            code,
            position: skipped,
            address: start.wrapping_add(skipped as u64),
            skipped,
            exhausted: false,
        }
    }

    /// Number of leading padding bytes that were not decoded.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Offset into the buffer of the next undecoded byte.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Consumes up to `N` bytes into `span`. Returns `None` when fewer were left.
    fn take<const N: usize>(&mut self, span: &mut Span) -> Option<[u8; N]> {
        let end = self.code.len().min(self.position + N);
        let bytes = &self.code[self.position..end];
        span.extend_from_slice(bytes);
        self.position = end;
        bytes.try_into().ok()
    }

    fn decode_body(&mut self, span: &mut Span) -> Body {
        let truncated = |span: &Span| Body::Raw { fault: Fault::Truncated, value: span.quad() };

        let Some([opcode]) = self.take::<1>(span) else {
            return truncated(span);
        };

        let Some(class) = Class::classify(opcode) else {
            return match self.take::<RECOVERY_LEN>(span) {
                Some(_) => Body::Raw { fault: Fault::InvalidEncoding, value: span.quad() },
                None => truncated(span),
            };
        };

        let icode = class.icode();
        // 0xFF leaves both fields as "no register" for classes without a register byte.
        let registers = if icode.has_registers() {
            match self.take::<1>(span) {
                Some([registers]) => registers,
                None => return truncated(span),
            }
        } else {
            0xFF
        };
        let ra = Register::from(registers >> 4);
        let rb = Register::from(registers & 0xF);

        let constant = if icode.has_constant() {
            match self.take::<8>(span) {
                Some(bytes) => u64::from_le_bytes(bytes),
                None => return truncated(span),
            }
        } else {
            0
        };

        Body::Instruction(match class {
            Class::Halt => Instruction::Halt,
            Class::Nop => Instruction::Nop,
            Class::Move(cond) => Instruction::Move { cond, ra, rb },
            Class::Irmov => Instruction::Irmovq { rb, value: constant },
            Class::Rmmov => Instruction::Rmmovq { ra, rb, displacement: constant },
            Class::Mrmov => Instruction::Mrmovq { ra, rb, displacement: constant },
            Class::Op(Some(op)) => Instruction::Op { op, ra, rb },
            Class::Op(None) => {
                return Body::Raw { fault: Fault::UnassignedAluFunction, value: span.quad() };
            }
            Class::Jump(cond) => Instruction::Jump { cond, dest: constant },
            Class::Call => Instruction::Call { dest: constant },
            Class::Ret => Instruction::Ret,
            Class::Push => Instruction::Pushq { ra },
            Class::Pop => Instruction::Popq { ra },
        })
    }
}

impl Iterator for Decoder<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        if self.exhausted || self.position >= self.code.len() {
            return None;
        }

        let address = self.address;
        let mut bytes = Span::default();
        let body = self.decode_body(&mut bytes);
        self.address = self.address.wrapping_add(bytes.len() as u64);

        let record = Record { address, bytes, body };
        if let Some(icode) = record.icode() {
            debug_assert_eq!(bytes.len(), icode.encoded_len());
        }
        match record.fault() {
            Some(fault) => {
                warn!("{address:#018x}: {fault} ({bytes})");
                if fault == Fault::Truncated {
                    self.exhausted = true;
                }
            }
            None => trace!("{address:#018x}: {bytes}"),
        }
        Some(record)
    }
}
