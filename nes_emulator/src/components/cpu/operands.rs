//! Resolution of addressing modes into operands.
use super::opcode_table::AddressMode;

/// The resolved operand of an instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
    Implied,
    Accumulator,
    Immediate(u8),
    /// Effective address in memory.
    Address(u16),
    /// Target of a relative branch.
    Branch(u16),
}

/// Result of resolving an addressing mode.
pub struct Resolved {
    pub operand: Operand,
    /// Indexing moved the effective address onto another page.
    pub page_crossed: bool,
    /// Raw operand bytes as they follow the opcode, used for disassembly.
    pub raw: u16,
}

fn read_u16(read: &mut impl FnMut(u16) -> u8, addr: u16, page_wrapped: bool) -> u16 {
    let high_addr = if page_wrapped {
        (addr & 0xFF00) | (addr.wrapping_add(1) & 0x00FF)
    } else {
        addr.wrapping_add(1)
    };
    u16::from_le_bytes([read(addr), read(high_addr)])
}

#[inline]
fn pages_differ(a: u16, b: u16) -> bool {
    (a ^ b) & 0xFF00 != 0
}

/// Resolves `mode` for the operand bytes starting at `addr`.
///
/// `read` is used for all memory accesses. The CPU passes a cycle read, the disassembler a peek.
pub fn resolve(
    mode: AddressMode,
    addr: u16,
    x: u8,
    y: u8,
    mut read: impl FnMut(u16) -> u8,
) -> Resolved {
    use AddressMode::*;
    let (operand, page_crossed, raw) = match mode {
        Implied => (Operand::Implied, false, 0),
        Accumulator => (Operand::Accumulator, false, 0),
        Immediate => {
            let value = read(addr);
            (Operand::Immediate(value), false, value as u16)
        }
        ZeroPage | ZeroPageX | ZeroPageY => {
            let base = read(addr) as u16;
            let index = match mode {
                ZeroPageX => x,
                ZeroPageY => y,
                _ => 0,
            };
            let effective = (base as u8).wrapping_add(index) as u16;
            (Operand::Address(effective), false, base)
        }
        Absolute => {
            let base = read_u16(&mut read, addr, false);
            (Operand::Address(base), false, base)
        }
        AbsoluteX | AbsoluteY => {
            let base = read_u16(&mut read, addr, false);
            let index = if mode == AbsoluteX { x } else { y };
            let effective = base.wrapping_add(index as u16);
            (
                Operand::Address(effective),
                pages_differ(base, effective),
                base,
            )
        }
        Indirect => {
            let pointer = read_u16(&mut read, addr, false);
            // The high byte of the target is read from the same page as the low byte.
            let target = read_u16(&mut read, pointer, true);
            (Operand::Address(target), false, pointer)
        }
        IndexedIndirect => {
            let zp = read(addr) as u16;
            let pointer = (zp as u8).wrapping_add(x) as u16;
            let target = read_u16(&mut read, pointer, true);
            (Operand::Address(target), false, zp)
        }
        IndirectIndexed => {
            let zp = read(addr) as u16;
            let base = read_u16(&mut read, zp, true);
            let effective = base.wrapping_add(y as u16);
            (
                Operand::Address(effective),
                pages_differ(base, effective),
                zp,
            )
        }
        Relative => {
            let offset = read(addr);
            let next_pc = addr.wrapping_add(1);
            let target = next_pc.wrapping_add(offset as i8 as u16);
            (
                Operand::Branch(target),
                pages_differ(next_pc, target),
                offset as u16,
            )
        }
    };
    Resolved {
        operand,
        page_crossed,
        raw,
    }
}

/// Formats the operand in the usual assembler syntax.
pub fn format_operand(mode: AddressMode, resolved: &Resolved) -> String {
    use AddressMode::*;
    let raw = resolved.raw;
    match mode {
        Implied => String::new(),
        Accumulator => "A".to_string(),
        Immediate => format!("#${:02X}", raw),
        ZeroPage => format!("${:02X}", raw),
        ZeroPageX => format!("${:02X},X", raw),
        ZeroPageY => format!("${:02X},Y", raw),
        Absolute => format!("${:04X}", raw),
        AbsoluteX => format!("${:04X},X", raw),
        AbsoluteY => format!("${:04X},Y", raw),
        Indirect => format!("(${:04X})", raw),
        IndexedIndirect => format!("(${:02X},X)", raw),
        IndirectIndexed => format!("(${:02X}),Y", raw),
        Relative => match resolved.operand {
            Operand::Branch(target) => format!("${:04X}", target),
            _ => String::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_reader(memory: &[(u16, u8)]) -> impl FnMut(u16) -> u8 + '_ {
        move |addr| {
            memory
                .iter()
                .find(|(a, _)| *a == addr)
                .map(|(_, v)| *v)
                .unwrap_or_default()
        }
    }

    #[test]
    fn test_indirect_jump_wraps_within_page() {
        let memory = [(0x8001, 0xFF), (0x8002, 0x02), (0x02FF, 0x34), (0x0200, 0x12)];
        let resolved = resolve(AddressMode::Indirect, 0x8001, 0, 0, memory_reader(&memory));
        assert_eq!(resolved.operand, Operand::Address(0x1234));
        assert_eq!(format_operand(AddressMode::Indirect, &resolved), "($02FF)");
    }

    #[test]
    fn test_zero_page_indexing_wraps() {
        let memory = [(0x8001, 0xF0)];
        let resolved = resolve(AddressMode::ZeroPageX, 0x8001, 0x20, 0, memory_reader(&memory));
        assert_eq!(resolved.operand, Operand::Address(0x0010));
    }

    #[test]
    fn test_indirect_indexed_page_cross() {
        let memory = [(0x8001, 0x10), (0x0010, 0xF0), (0x0011, 0x12)];
        let resolved =
            resolve(AddressMode::IndirectIndexed, 0x8001, 0, 0x20, memory_reader(&memory));
        assert_eq!(resolved.operand, Operand::Address(0x1310));
        assert!(resolved.page_crossed);
    }

    #[test]
    fn test_relative_branch_target() {
        let memory = [(0x80FE, 0xFC)];
        let resolved = resolve(AddressMode::Relative, 0x80FE, 0, 0, memory_reader(&memory));
        assert_eq!(resolved.operand, Operand::Branch(0x80FB));
        assert!(!resolved.page_crossed);
        assert_eq!(format_operand(AddressMode::Relative, &resolved), "$80FB");
    }
}
