//! Static decode tables of the 6502 instruction set, including the unofficial opcodes.
//!
//! Naming of unofficial mnemonics follows http://www.oxyron.de/html/opcodes02.html.
//! Branch penalties are not part of the table, branches account for them when taken.

/// How an instruction locates its operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressMode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    /// `JMP ($nnnn)` only.
    Indirect,
    /// `($nn,X)`
    IndexedIndirect,
    /// `($nn),Y`
    IndirectIndexed,
    Relative,
}

impl AddressMode {
    /// Number of operand bytes following the opcode.
    pub fn operand_len(self) -> u16 {
        use AddressMode::*;
        match self {
            Implied | Accumulator => 0,
            Immediate | ZeroPage | ZeroPageX | ZeroPageY | IndexedIndirect | IndirectIndexed
            | Relative => 1,
            Absolute | AbsoluteX | AbsoluteY | Indirect => 2,
        }
    }
}

/// Decode information for a single opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Opcode {
    pub mnemonic: &'static str,
    pub mode: AddressMode,
    /// Base cycle cost. Never zero.
    pub cycles: u8,
    /// Whether crossing a page during address calculation costs one more cycle.
    pub page_penalty: bool,
}

macro_rules! op {
    ($mnemonic: ident, $mode: ident, $cycles: literal) => {
        Opcode {
            mnemonic: stringify!($mnemonic),
            mode: AddressMode::$mode,
            cycles: $cycles,
            page_penalty: false,
        }
    };
    ($mnemonic: ident, $mode: ident, $cycles: literal, page) => {
        Opcode {
            mnemonic: stringify!($mnemonic),
            mode: AddressMode::$mode,
            cycles: $cycles,
            page_penalty: true,
        }
    };
}

pub static OPCODES: [Opcode; 256] = [
    // 0x00
    op!(BRK, Implied, 7),
    op!(ORA, IndexedIndirect, 6),
    op!(KIL, Implied, 2),
    op!(SLO, IndexedIndirect, 8),
    op!(NOP, ZeroPage, 3),
    op!(ORA, ZeroPage, 3),
    op!(ASL, ZeroPage, 5),
    op!(SLO, ZeroPage, 5),
    op!(PHP, Implied, 3),
    op!(ORA, Immediate, 2),
    op!(ASL, Accumulator, 2),
    op!(ANC, Immediate, 2),
    op!(NOP, Absolute, 4),
    op!(ORA, Absolute, 4),
    op!(ASL, Absolute, 6),
    op!(SLO, Absolute, 6),
    // 0x10
    op!(BPL, Relative, 2),
    op!(ORA, IndirectIndexed, 5, page),
    op!(KIL, Implied, 2),
    op!(SLO, IndirectIndexed, 8),
    op!(NOP, ZeroPageX, 4),
    op!(ORA, ZeroPageX, 4),
    op!(ASL, ZeroPageX, 6),
    op!(SLO, ZeroPageX, 6),
    op!(CLC, Implied, 2),
    op!(ORA, AbsoluteY, 4, page),
    op!(NOP, Implied, 2),
    op!(SLO, AbsoluteY, 7),
    op!(NOP, AbsoluteX, 4, page),
    op!(ORA, AbsoluteX, 4, page),
    op!(ASL, AbsoluteX, 7),
    op!(SLO, AbsoluteX, 7),
    // 0x20
    op!(JSR, Absolute, 6),
    op!(AND, IndexedIndirect, 6),
    op!(KIL, Implied, 2),
    op!(RLA, IndexedIndirect, 8),
    op!(BIT, ZeroPage, 3),
    op!(AND, ZeroPage, 3),
    op!(ROL, ZeroPage, 5),
    op!(RLA, ZeroPage, 5),
    op!(PLP, Implied, 4),
    op!(AND, Immediate, 2),
    op!(ROL, Accumulator, 2),
    op!(ANC, Immediate, 2),
    op!(BIT, Absolute, 4),
    op!(AND, Absolute, 4),
    op!(ROL, Absolute, 6),
    op!(RLA, Absolute, 6),
    // 0x30
    op!(BMI, Relative, 2),
    op!(AND, IndirectIndexed, 5, page),
    op!(KIL, Implied, 2),
    op!(RLA, IndirectIndexed, 8),
    op!(NOP, ZeroPageX, 4),
    op!(AND, ZeroPageX, 4),
    op!(ROL, ZeroPageX, 6),
    op!(RLA, ZeroPageX, 6),
    op!(SEC, Implied, 2),
    op!(AND, AbsoluteY, 4, page),
    op!(NOP, Implied, 2),
    op!(RLA, AbsoluteY, 7),
    op!(NOP, AbsoluteX, 4, page),
    op!(AND, AbsoluteX, 4, page),
    op!(ROL, AbsoluteX, 7),
    op!(RLA, AbsoluteX, 7),
    // 0x40
    op!(RTI, Implied, 6),
    op!(EOR, IndexedIndirect, 6),
    op!(KIL, Implied, 2),
    op!(SRE, IndexedIndirect, 8),
    op!(NOP, ZeroPage, 3),
    op!(EOR, ZeroPage, 3),
    op!(LSR, ZeroPage, 5),
    op!(SRE, ZeroPage, 5),
    op!(PHA, Implied, 3),
    op!(EOR, Immediate, 2),
    op!(LSR, Accumulator, 2),
    op!(ALR, Immediate, 2),
    op!(JMP, Absolute, 3),
    op!(EOR, Absolute, 4),
    op!(LSR, Absolute, 6),
    op!(SRE, Absolute, 6),
    // 0x50
    op!(BVC, Relative, 2),
    op!(EOR, IndirectIndexed, 5, page),
    op!(KIL, Implied, 2),
    op!(SRE, IndirectIndexed, 8),
    op!(NOP, ZeroPageX, 4),
    op!(EOR, ZeroPageX, 4),
    op!(LSR, ZeroPageX, 6),
    op!(SRE, ZeroPageX, 6),
    op!(CLI, Implied, 2),
    op!(EOR, AbsoluteY, 4, page),
    op!(NOP, Implied, 2),
    op!(SRE, AbsoluteY, 7),
    op!(NOP, AbsoluteX, 4, page),
    op!(EOR, AbsoluteX, 4, page),
    op!(LSR, AbsoluteX, 7),
    op!(SRE, AbsoluteX, 7),
    // 0x60
    op!(RTS, Implied, 6),
    op!(ADC, IndexedIndirect, 6),
    op!(KIL, Implied, 2),
    op!(RRA, IndexedIndirect, 8),
    op!(NOP, ZeroPage, 3),
    op!(ADC, ZeroPage, 3),
    op!(ROR, ZeroPage, 5),
    op!(RRA, ZeroPage, 5),
    op!(PLA, Implied, 4),
    op!(ADC, Immediate, 2),
    op!(ROR, Accumulator, 2),
    op!(ARR, Immediate, 2),
    op!(JMP, Indirect, 5),
    op!(ADC, Absolute, 4),
    op!(ROR, Absolute, 6),
    op!(RRA, Absolute, 6),
    // 0x70
    op!(BVS, Relative, 2),
    op!(ADC, IndirectIndexed, 5, page),
    op!(KIL, Implied, 2),
    op!(RRA, IndirectIndexed, 8),
    op!(NOP, ZeroPageX, 4),
    op!(ADC, ZeroPageX, 4),
    op!(ROR, ZeroPageX, 6),
    op!(RRA, ZeroPageX, 6),
    op!(SEI, Implied, 2),
    op!(ADC, AbsoluteY, 4, page),
    op!(NOP, Implied, 2),
    op!(RRA, AbsoluteY, 7),
    op!(NOP, AbsoluteX, 4, page),
    op!(ADC, AbsoluteX, 4, page),
    op!(ROR, AbsoluteX, 7),
    op!(RRA, AbsoluteX, 7),
    // 0x80
    op!(NOP, Immediate, 2),
    op!(STA, IndexedIndirect, 6),
    op!(NOP, Immediate, 2),
    op!(SAX, IndexedIndirect, 6),
    op!(STY, ZeroPage, 3),
    op!(STA, ZeroPage, 3),
    op!(STX, ZeroPage, 3),
    op!(SAX, ZeroPage, 3),
    op!(DEY, Implied, 2),
    op!(NOP, Immediate, 2),
    op!(TXA, Implied, 2),
    op!(XAA, Immediate, 2),
    op!(STY, Absolute, 4),
    op!(STA, Absolute, 4),
    op!(STX, Absolute, 4),
    op!(SAX, Absolute, 4),
    // 0x90
    op!(BCC, Relative, 2),
    op!(STA, IndirectIndexed, 6),
    op!(KIL, Implied, 2),
    op!(AHX, IndirectIndexed, 6),
    op!(STY, ZeroPageX, 4),
    op!(STA, ZeroPageX, 4),
    op!(STX, ZeroPageY, 4),
    op!(SAX, ZeroPageY, 4),
    op!(TYA, Implied, 2),
    op!(STA, AbsoluteY, 5),
    op!(TXS, Implied, 2),
    op!(TAS, AbsoluteY, 5),
    op!(SHY, AbsoluteX, 5),
    op!(STA, AbsoluteX, 5),
    op!(SHX, AbsoluteY, 5),
    op!(AHX, AbsoluteY, 5),
    // 0xA0
    op!(LDY, Immediate, 2),
    op!(LDA, IndexedIndirect, 6),
    op!(LDX, Immediate, 2),
    op!(LAX, IndexedIndirect, 6),
    op!(LDY, ZeroPage, 3),
    op!(LDA, ZeroPage, 3),
    op!(LDX, ZeroPage, 3),
    op!(LAX, ZeroPage, 3),
    op!(TAY, Implied, 2),
    op!(LDA, Immediate, 2),
    op!(TAX, Implied, 2),
    op!(LAX, Immediate, 2),
    op!(LDY, Absolute, 4),
    op!(LDA, Absolute, 4),
    op!(LDX, Absolute, 4),
    op!(LAX, Absolute, 4),
    // 0xB0
    op!(BCS, Relative, 2),
    op!(LDA, IndirectIndexed, 5, page),
    op!(KIL, Implied, 2),
    op!(LAX, IndirectIndexed, 5, page),
    op!(LDY, ZeroPageX, 4),
    op!(LDA, ZeroPageX, 4),
    op!(LDX, ZeroPageY, 4),
    op!(LAX, ZeroPageY, 4),
    op!(CLV, Implied, 2),
    op!(LDA, AbsoluteY, 4, page),
    op!(TSX, Implied, 2),
    op!(LAS, AbsoluteY, 4, page),
    op!(LDY, AbsoluteX, 4, page),
    op!(LDA, AbsoluteX, 4, page),
    op!(LDX, AbsoluteY, 4, page),
    op!(LAX, AbsoluteY, 4, page),
    // 0xC0
    op!(CPY, Immediate, 2),
    op!(CMP, IndexedIndirect, 6),
    op!(NOP, Immediate, 2),
    op!(DCP, IndexedIndirect, 8),
    op!(CPY, ZeroPage, 3),
    op!(CMP, ZeroPage, 3),
    op!(DEC, ZeroPage, 5),
    op!(DCP, ZeroPage, 5),
    op!(INY, Implied, 2),
    op!(CMP, Immediate, 2),
    op!(DEX, Implied, 2),
    op!(AXS, Immediate, 2),
    op!(CPY, Absolute, 4),
    op!(CMP, Absolute, 4),
    op!(DEC, Absolute, 6),
    op!(DCP, Absolute, 6),
    // 0xD0
    op!(BNE, Relative, 2),
    op!(CMP, IndirectIndexed, 5, page),
    op!(KIL, Implied, 2),
    op!(DCP, IndirectIndexed, 8),
    op!(NOP, ZeroPageX, 4),
    op!(CMP, ZeroPageX, 4),
    op!(DEC, ZeroPageX, 6),
    op!(DCP, ZeroPageX, 6),
    op!(CLD, Implied, 2),
    op!(CMP, AbsoluteY, 4, page),
    op!(NOP, Implied, 2),
    op!(DCP, AbsoluteY, 7),
    op!(NOP, AbsoluteX, 4, page),
    op!(CMP, AbsoluteX, 4, page),
    op!(DEC, AbsoluteX, 7),
    op!(DCP, AbsoluteX, 7),
    // 0xE0
    op!(CPX, Immediate, 2),
    op!(SBC, IndexedIndirect, 6),
    op!(NOP, Immediate, 2),
    op!(ISC, IndexedIndirect, 8),
    op!(CPX, ZeroPage, 3),
    op!(SBC, ZeroPage, 3),
    op!(INC, ZeroPage, 5),
    op!(ISC, ZeroPage, 5),
    op!(INX, Implied, 2),
    op!(SBC, Immediate, 2),
    op!(NOP, Implied, 2),
    op!(SBC, Immediate, 2),
    op!(CPX, Absolute, 4),
    op!(SBC, Absolute, 4),
    op!(INC, Absolute, 6),
    op!(ISC, Absolute, 6),
    // 0xF0
    op!(BEQ, Relative, 2),
    op!(SBC, IndirectIndexed, 5, page),
    op!(KIL, Implied, 2),
    op!(ISC, IndirectIndexed, 8),
    op!(NOP, ZeroPageX, 4),
    op!(SBC, ZeroPageX, 4),
    op!(INC, ZeroPageX, 6),
    op!(ISC, ZeroPageX, 6),
    op!(SED, Implied, 2),
    op!(SBC, AbsoluteY, 4, page),
    op!(NOP, Implied, 2),
    op!(ISC, AbsoluteY, 7),
    op!(NOP, AbsoluteX, 4, page),
    op!(SBC, AbsoluteX, 4, page),
    op!(INC, AbsoluteX, 7),
    op!(ISC, AbsoluteX, 7),
];

/// Unofficial opcodes that lock up the real CPU.
pub fn is_jam(opcode: u8) -> bool {
    OPCODES[opcode as usize].mnemonic == "KIL"
}
