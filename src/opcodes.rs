/// Primary operation class, stored in the high nibble of an instruction's first byte.
///
/// Nibbles `0xC..=0xF` have no class and fail conversion.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, num_enum::TryFromPrimitive)]
#[allow(non_camel_case_types)]
pub enum Icode {
    /// OP
    HALT = 0x0,

    /// OP
    NOP = 0x1,

    /// OP|FN - RA|RB
    RRMOV = 0x2,

    /// OP - F|RB - V(8)
    IRMOV = 0x3,

    /// OP - RA|RB - D(8)
    RMMOV = 0x4,

    /// OP - RA|RB - D(8)
    MRMOV = 0x5,

    /// OP|FN - RA|RB
    MATH = 0x6,

    /// OP|FN - DEST(8)
    JUMP = 0x7,

    /// OP - DEST(8)
    CALL = 0x8,

    /// OP
    RET = 0x9,

    /// OP - RA|F
    PUSH = 0xA,

    /// OP - RA|F
    POP = 0xB,
}

impl Icode {
    /// Largest function code this class accepts. This is the whole validity rule for the
    /// function nibble.
    pub fn max_function(self) -> u8 {
        match self {
            Icode::RRMOV | Icode::MATH | Icode::JUMP => 6,
            _ => 0,
        }
    }

    pub fn has_registers(self) -> bool {
        matches!(
            self,
            Icode::RRMOV | Icode::IRMOV | Icode::RMMOV | Icode::MRMOV | Icode::MATH | Icode::PUSH | Icode::POP
        )
    }

    /// Whether the class carries an 8-byte immediate, displacement or destination.
    pub fn has_constant(self) -> bool {
        matches!(self, Icode::IRMOV | Icode::RMMOV | Icode::MRMOV | Icode::JUMP | Icode::CALL)
    }

    /// Encoded length of a valid instruction of this class.
    pub fn encoded_len(self) -> usize {
        1 + usize::from(self.has_registers()) + if self.has_constant() { 8 } else { 0 }
    }
}

/// Condition shared by the register-move and jump classes.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, num_enum::TryFromPrimitive)]
pub enum Condition {
    Always = 0x0,
    Le = 0x1,
    L = 0x2,
    E = 0x3,
    Ne = 0x4,
    Ge = 0x5,
    G = 0x6,
}

impl Condition {
    pub fn move_mnemonic(self) -> &'static str {
        match self {
            Condition::Always => "rrmovq",
            Condition::Le => "cmovle",
            Condition::L => "cmovl",
            Condition::E => "cmove",
            Condition::Ne => "cmovne",
            Condition::Ge => "cmovge",
            Condition::G => "cmovg",
        }
    }

    pub fn jump_mnemonic(self) -> &'static str {
        match self {
            Condition::Always => "jmp",
            Condition::Le => "jle",
            Condition::L => "jl",
            Condition::E => "je",
            Condition::Ne => "jne",
            Condition::Ge => "jge",
            Condition::G => "jg",
        }
    }
}

/// Arithmetic function. Codes 4 through 6 pass validation but name no operation.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, num_enum::TryFromPrimitive)]
pub enum AluOp {
    Add = 0x0,
    Sub = 0x1,
    And = 0x2,
    Xor = 0x3,
}

impl AluOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            AluOp::Add => "addq",
            AluOp::Sub => "subq",
            AluOp::And => "andq",
            AluOp::Xor => "xorq",
        }
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, num_enum::FromPrimitive)]
pub enum Register {
    #[display("%rax")]
    Rax = 0x0,
    #[display("%rcx")]
    Rcx = 0x1,
    #[display("%rdx")]
    Rdx = 0x2,
    #[display("%rbx")]
    Rbx = 0x3,
    #[display("%rsp")]
    Rsp = 0x4,
    #[display("%rbp")]
    Rbp = 0x5,
    #[display("%rsi")]
    Rsi = 0x6,
    #[display("%rdi")]
    Rdi = 0x7,
    #[display("%r8")]
    R8 = 0x8,
    #[display("%r9")]
    R9 = 0x9,
    #[display("%r10")]
    R10 = 0xA,
    #[display("%r11")]
    R11 = 0xB,
    #[display("%r12")]
    R12 = 0xC,
    #[display("%r13")]
    R13 = 0xD,
    #[display("%r14")]
    R14 = 0xE,
    /// "No register". Also absorbs any code above 0xF.
    #[num_enum(default)]
    #[display("%r-1")]
    NoRegister = 0xF,
}

/// A successfully decoded instruction, one variant per operation class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    Halt,
    Nop,
    Move { cond: Condition, ra: Register, rb: Register },
    Irmovq { rb: Register, value: u64 },
    Rmmovq { ra: Register, rb: Register, displacement: u64 },
    Mrmovq { ra: Register, rb: Register, displacement: u64 },
    Op { op: AluOp, ra: Register, rb: Register },
    Jump { cond: Condition, dest: u64 },
    Call { dest: u64 },
    Ret,
    Pushq { ra: Register },
    Popq { ra: Register },
}

impl Instruction {
    pub fn icode(&self) -> Icode {
        match self {
            Instruction::Halt => Icode::HALT,
            Instruction::Nop => Icode::NOP,
            Instruction::Move { .. } => Icode::RRMOV,
            Instruction::Irmovq { .. } => Icode::IRMOV,
            Instruction::Rmmovq { .. } => Icode::RMMOV,
            Instruction::Mrmovq { .. } => Icode::MRMOV,
            Instruction::Op { .. } => Icode::MATH,
            Instruction::Jump { .. } => Icode::JUMP,
            Instruction::Call { .. } => Icode::CALL,
            Instruction::Ret => Icode::RET,
            Instruction::Pushq { .. } => Icode::PUSH,
            Instruction::Popq { .. } => Icode::POP,
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Halt => "halt",
            Instruction::Nop => "nop",
            Instruction::Move { cond, .. } => cond.move_mnemonic(),
            Instruction::Irmovq { .. } => "irmovq",
            Instruction::Rmmovq { .. } => "rmmovq",
            Instruction::Mrmovq { .. } => "mrmovq",
            Instruction::Op { op, .. } => op.mnemonic(),
            Instruction::Jump { cond, .. } => cond.jump_mnemonic(),
            Instruction::Call { .. } => "call",
            Instruction::Ret => "ret",
            Instruction::Pushq { .. } => "pushq",
            Instruction::Popq { .. } => "popq",
        }
    }
}
