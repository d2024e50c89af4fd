//! Implements the 6502 instruction set, including the unofficial opcodes.
//!
//! One function per mnemonic. The operand has already been resolved according to the addressing
//! mode of the opcode table, so the same function serves all addressing modes of a mnemonic.
use super::opcode_table::OPCODES;
use super::operands::Operand;
use super::status::StatusFlags;
use super::Cpu;
use super::CpuBus;
use super::InterruptKind;

pub type Handler<BusT> = fn(&mut Cpu<BusT>, Operand);

pub fn build_handler_table<BusT: CpuBus>() -> [Handler<BusT>; 256] {
    std::array::from_fn(|opcode| handler_for(OPCODES[opcode].mnemonic))
}

fn handler_for<BusT: CpuBus>(mnemonic: &str) -> Handler<BusT> {
    match mnemonic {
        // Loads, stores and transfers
        "LDA" => lda,
        "LDX" => ldx,
        "LDY" => ldy,
        "STA" => sta,
        "STX" => stx,
        "STY" => sty,
        "TAX" => tax,
        "TAY" => tay,
        "TXA" => txa,
        "TYA" => tya,
        "TSX" => tsx,
        "TXS" => txs,
        "PHA" => pha,
        "PHP" => php,
        "PLA" => pla,
        "PLP" => plp,
        // Arithmetic and logic
        "ADC" => adc,
        "SBC" => sbc,
        "AND" => and,
        "ORA" => ora,
        "EOR" => eor,
        "BIT" => bit,
        "CMP" => cmp,
        "CPX" => cpx,
        "CPY" => cpy,
        "INC" => inc,
        "DEC" => dec,
        "INX" => inx,
        "INY" => iny,
        "DEX" => dex,
        "DEY" => dey,
        "ASL" => asl,
        "LSR" => lsr,
        "ROL" => rol,
        "ROR" => ror,
        // Jumps and flags
        "JMP" => jmp,
        "JSR" => jsr,
        "RTS" => rts,
        "RTI" => rti,
        "BRK" => brk,
        "BPL" => bpl,
        "BMI" => bmi,
        "BVC" => bvc,
        "BVS" => bvs,
        "BCC" => bcc,
        "BCS" => bcs,
        "BNE" => bne,
        "BEQ" => beq,
        "CLC" => clc,
        "SEC" => sec,
        "CLI" => cli,
        "SEI" => sei,
        "CLD" => cld,
        "SED" => sed,
        "CLV" => clv,
        "NOP" => nop,
        // Unofficial
        "SLO" => slo,
        "RLA" => rla,
        "SRE" => sre,
        "RRA" => rra,
        "SAX" => sax,
        "LAX" => lax,
        "DCP" => dcp,
        "ISC" => isc,
        "ANC" => anc,
        "ALR" => alr,
        "ARR" => arr,
        "XAA" => xaa,
        "AXS" => axs,
        "AHX" => ahx,
        "TAS" => tas,
        "SHY" => shy,
        "SHX" => shx,
        "LAS" => las,
        _ => kil,
    }
}

fn load(cpu: &mut Cpu<impl CpuBus>, operand: Operand) -> u8 {
    match operand {
        Operand::Immediate(value) => value,
        Operand::Address(addr) => cpu.bus.cycle_read_u8(addr),
        Operand::Accumulator => cpu.a,
        Operand::Implied | Operand::Branch(_) => 0,
    }
}

fn store(cpu: &mut Cpu<impl CpuBus>, operand: Operand, value: u8) {
    match operand {
        Operand::Address(addr) => cpu.bus.cycle_write_u8(addr, value),
        Operand::Accumulator => cpu.a = value,
        _ => log::error!("Store to operand without address: {:?}", operand),
    }
}

/// Read-modify-write helper shared by shifts, increments and their unofficial combinations.
fn modify(
    cpu: &mut Cpu<impl CpuBus>,
    operand: Operand,
    f: impl FnOnce(&mut StatusFlags, u8) -> u8,
) -> u8 {
    let value = load(cpu, operand);
    let result = f(&mut cpu.status, value);
    store(cpu, operand, result);
    result
}

fn shift_left(status: &mut StatusFlags, value: u8) -> u8 {
    status.carry = value & 0x80 != 0;
    let result = value << 1;
    status.update_negative_zero(result);
    result
}

fn shift_right(status: &mut StatusFlags, value: u8) -> u8 {
    status.carry = value & 0x01 != 0;
    let result = value >> 1;
    status.update_negative_zero(result);
    result
}

fn rotate_left(status: &mut StatusFlags, value: u8) -> u8 {
    let result = (value << 1) | status.carry as u8;
    status.carry = value & 0x80 != 0;
    status.update_negative_zero(result);
    result
}

fn rotate_right(status: &mut StatusFlags, value: u8) -> u8 {
    let result = (value >> 1) | ((status.carry as u8) << 7);
    status.carry = value & 0x01 != 0;
    status.update_negative_zero(result);
    result
}

fn increment(status: &mut StatusFlags, value: u8) -> u8 {
    let result = value.wrapping_add(1);
    status.update_negative_zero(result);
    result
}

fn decrement(status: &mut StatusFlags, value: u8) -> u8 {
    let result = value.wrapping_sub(1);
    status.update_negative_zero(result);
    result
}

fn add_with_carry(cpu: &mut Cpu<impl CpuBus>, value: u8) {
    let sum = cpu.a as u16 + value as u16 + cpu.status.carry as u16;
    let result = sum as u8;
    cpu.status.carry = sum > 0xFF;
    cpu.status.overflow = (!(cpu.a ^ value) & (cpu.a ^ result) & 0x80) != 0;
    cpu.a = result;
    cpu.status.update_negative_zero(result);
}

fn compare(cpu: &mut Cpu<impl CpuBus>, register: u8, value: u8) {
    cpu.status.carry = register >= value;
    cpu.status.update_negative_zero(register.wrapping_sub(value));
}

fn branch(cpu: &mut Cpu<impl CpuBus>, operand: Operand, condition: bool) {
    if let (true, Operand::Branch(target)) = (condition, operand) {
        cpu.skip_cycles += 1;
        if (cpu.pc ^ target) & 0xFF00 != 0 {
            cpu.skip_cycles += 1;
        }
        cpu.pc = target;
    }
}

/// Store of the unstable SHA/SHX/SHY/SHS family: the value is masked with the high byte of the
/// base address plus one, and a page crossing replaces the high byte of the target with it.
fn store_high_byte_masked(cpu: &mut Cpu<impl CpuBus>, operand: Operand, index: u8, value: u8) {
    if let Operand::Address(addr) = operand {
        let base = addr.wrapping_sub(index as u16);
        let masked = value & ((base >> 8) as u8).wrapping_add(1);
        let target = if (base ^ addr) & 0xFF00 != 0 {
            (addr & 0x00FF) | ((masked as u16) << 8)
        } else {
            addr
        };
        cpu.bus.cycle_write_u8(target, masked);
    }
}

pub fn lda(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    cpu.a = load(cpu, operand);
    cpu.status.update_negative_zero(cpu.a);
}

pub fn ldx(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    cpu.x = load(cpu, operand);
    cpu.status.update_negative_zero(cpu.x);
}

pub fn ldy(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    cpu.y = load(cpu, operand);
    cpu.status.update_negative_zero(cpu.y);
}

pub fn sta(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let value = cpu.a;
    store(cpu, operand, value);
}

pub fn stx(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let value = cpu.x;
    store(cpu, operand, value);
}

pub fn sty(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let value = cpu.y;
    store(cpu, operand, value);
}

pub fn tax(cpu: &mut Cpu<impl CpuBus>, _: Operand) {
    cpu.x = cpu.a;
    cpu.status.update_negative_zero(cpu.x);
}

pub fn tay(cpu: &mut Cpu<impl CpuBus>, _: Operand) {
    cpu.y = cpu.a;
    cpu.status.update_negative_zero(cpu.y);
}

pub fn txa(cpu: &mut Cpu<impl CpuBus>, _: Operand) {
    cpu.a = cpu.x;
    cpu.status.update_negative_zero(cpu.a);
}

pub fn tya(cpu: &mut Cpu<impl CpuBus>, _: Operand) {
    cpu.a = cpu.y;
    cpu.status.update_negative_zero(cpu.a);
}

pub fn tsx(cpu: &mut Cpu<impl CpuBus>, _: Operand) {
    cpu.x = cpu.s;
    cpu.status.update_negative_zero(cpu.x);
}

pub fn txs(cpu: &mut Cpu<impl CpuBus>, _: Operand) {
    cpu.s = cpu.x;
}

pub fn pha(cpu: &mut Cpu<impl CpuBus>, _: Operand) {
    cpu.stack_push_u8(cpu.a);
}

pub fn php(cpu: &mut Cpu<impl CpuBus>, _: Operand) {
    cpu.stack_push_u8(u8::from(cpu.status) | 0x30);
}

pub fn pla(cpu: &mut Cpu<impl CpuBus>, _: Operand) {
    cpu.a = cpu.stack_pop_u8();
    cpu.status.update_negative_zero(cpu.a);
}

pub fn plp(cpu: &mut Cpu<impl CpuBus>, _: Operand) {
    // Bits 4 and 5 do not exist in the register and keep their value.
    let value = cpu.stack_pop_u8();
    cpu.status = StatusFlags::from((value & 0xCF) | (u8::from(cpu.status) & 0x30));
}

pub fn adc(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let value = load(cpu, operand);
    add_with_carry(cpu, value);
}

pub fn sbc(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let value = load(cpu, operand);
    add_with_carry(cpu, !value);
}

pub fn and(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let value = load(cpu, operand);
    cpu.a &= value;
    cpu.status.update_negative_zero(cpu.a);
}

pub fn ora(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let value = load(cpu, operand);
    cpu.a |= value;
    cpu.status.update_negative_zero(cpu.a);
}

pub fn eor(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let value = load(cpu, operand);
    cpu.a ^= value;
    cpu.status.update_negative_zero(cpu.a);
}

pub fn bit(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let value = load(cpu, operand);
    cpu.status.zero = cpu.a & value == 0;
    cpu.status.negative = value & 0x80 != 0;
    cpu.status.overflow = value & 0x40 != 0;
}

pub fn cmp(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let value = load(cpu, operand);
    let register = cpu.a;
    compare(cpu, register, value);
}

pub fn cpx(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let value = load(cpu, operand);
    let register = cpu.x;
    compare(cpu, register, value);
}

pub fn cpy(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let value = load(cpu, operand);
    let register = cpu.y;
    compare(cpu, register, value);
}

pub fn inc(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    modify(cpu, operand, increment);
}

pub fn dec(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    modify(cpu, operand, decrement);
}

pub fn inx(cpu: &mut Cpu<impl CpuBus>, _: Operand) {
    cpu.x = increment(&mut cpu.status, cpu.x);
}

pub fn iny(cpu: &mut Cpu<impl CpuBus>, _: Operand) {
    cpu.y = increment(&mut cpu.status, cpu.y);
}

pub fn dex(cpu: &mut Cpu<impl CpuBus>, _: Operand) {
    cpu.x = decrement(&mut cpu.status, cpu.x);
}

pub fn dey(cpu: &mut Cpu<impl CpuBus>, _: Operand) {
    cpu.y = decrement(&mut cpu.status, cpu.y);
}

pub fn asl(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    modify(cpu, operand, shift_left);
}

pub fn lsr(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    modify(cpu, operand, shift_right);
}

pub fn rol(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    modify(cpu, operand, rotate_left);
}

pub fn ror(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    modify(cpu, operand, rotate_right);
}

pub fn jmp(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    if let Operand::Address(addr) = operand {
        cpu.pc = addr;
    }
}

pub fn jsr(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    // The pushed return address points at the last byte of the JSR instruction.
    cpu.stack_push_u16(cpu.pc.wrapping_sub(1));
    jmp(cpu, operand);
}

pub fn rts(cpu: &mut Cpu<impl CpuBus>, _: Operand) {
    cpu.pc = cpu.stack_pop_u16().wrapping_add(1);
}

pub fn rti(cpu: &mut Cpu<impl CpuBus>, _: Operand) {
    cpu.status = StatusFlags::from(cpu.stack_pop_u8());
    cpu.pc = cpu.stack_pop_u16();
}

pub fn brk(cpu: &mut Cpu<impl CpuBus>, _: Operand) {
    cpu.interrupt(InterruptKind::Brk);
}

pub fn bpl(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    branch(cpu, operand, !cpu.status.negative);
}

pub fn bmi(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    branch(cpu, operand, cpu.status.negative);
}

pub fn bvc(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    branch(cpu, operand, !cpu.status.overflow);
}

pub fn bvs(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    branch(cpu, operand, cpu.status.overflow);
}

pub fn bcc(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    branch(cpu, operand, !cpu.status.carry);
}

pub fn bcs(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    branch(cpu, operand, cpu.status.carry);
}

pub fn bne(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    branch(cpu, operand, !cpu.status.zero);
}

pub fn beq(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    branch(cpu, operand, cpu.status.zero);
}

pub fn clc(cpu: &mut Cpu<impl CpuBus>, _: Operand) {
    cpu.status.carry = false;
}

pub fn sec(cpu: &mut Cpu<impl CpuBus>, _: Operand) {
    cpu.status.carry = true;
}

pub fn cli(cpu: &mut Cpu<impl CpuBus>, _: Operand) {
    cpu.status.irq_disable = false;
}

pub fn sei(cpu: &mut Cpu<impl CpuBus>, _: Operand) {
    cpu.status.irq_disable = true;
}

pub fn cld(cpu: &mut Cpu<impl CpuBus>, _: Operand) {
    cpu.status.decimal = false;
}

pub fn sed(cpu: &mut Cpu<impl CpuBus>, _: Operand) {
    cpu.status.decimal = true;
}

pub fn clv(cpu: &mut Cpu<impl CpuBus>, _: Operand) {
    cpu.status.overflow = false;
}

pub fn nop(_: &mut Cpu<impl CpuBus>, _: Operand) {}

pub fn slo(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let value = modify(cpu, operand, shift_left);
    cpu.a |= value;
    cpu.status.update_negative_zero(cpu.a);
}

pub fn rla(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let value = modify(cpu, operand, rotate_left);
    cpu.a &= value;
    cpu.status.update_negative_zero(cpu.a);
}

pub fn sre(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let value = modify(cpu, operand, shift_right);
    cpu.a ^= value;
    cpu.status.update_negative_zero(cpu.a);
}

pub fn rra(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let value = modify(cpu, operand, rotate_right);
    add_with_carry(cpu, value);
}

pub fn sax(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let value = cpu.a & cpu.x;
    store(cpu, operand, value);
}

pub fn lax(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let value = load(cpu, operand);
    cpu.a = value;
    cpu.x = value;
    cpu.status.update_negative_zero(value);
}

pub fn dcp(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let value = load(cpu, operand).wrapping_sub(1);
    store(cpu, operand, value);
    let register = cpu.a;
    compare(cpu, register, value);
}

pub fn isc(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let value = load(cpu, operand).wrapping_add(1);
    store(cpu, operand, value);
    add_with_carry(cpu, !value);
}

pub fn anc(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    and(cpu, operand);
    cpu.status.carry = cpu.status.negative;
}

pub fn alr(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let value = load(cpu, operand);
    cpu.a &= value;
    cpu.a = shift_right(&mut cpu.status, cpu.a);
}

pub fn arr(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let value = load(cpu, operand) & cpu.a;
    cpu.a = (value >> 1) | ((cpu.status.carry as u8) << 7);
    cpu.status.update_negative_zero(cpu.a);
    cpu.status.carry = cpu.a & 0x40 != 0;
    cpu.status.overflow = ((cpu.a >> 6) ^ (cpu.a >> 5)) & 1 != 0;
}

pub fn xaa(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let value = load(cpu, operand);
    cpu.a = cpu.x & value;
    cpu.status.update_negative_zero(cpu.a);
}

pub fn axs(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let value = load(cpu, operand);
    let masked = cpu.a & cpu.x;
    cpu.status.carry = masked >= value;
    cpu.x = masked.wrapping_sub(value);
    cpu.status.update_negative_zero(cpu.x);
}

pub fn ahx(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let (index, value) = (cpu.y, cpu.a & cpu.x);
    store_high_byte_masked(cpu, operand, index, value);
}

pub fn tas(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    cpu.s = cpu.a & cpu.x;
    let (index, value) = (cpu.y, cpu.s);
    store_high_byte_masked(cpu, operand, index, value);
}

pub fn shy(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let (index, value) = (cpu.x, cpu.y);
    store_high_byte_masked(cpu, operand, index, value);
}

pub fn shx(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let (index, value) = (cpu.y, cpu.x);
    store_high_byte_masked(cpu, operand, index, value);
}

pub fn las(cpu: &mut Cpu<impl CpuBus>, operand: Operand) {
    let value = load(cpu, operand) & cpu.s;
    cpu.a = value;
    cpu.x = value;
    cpu.s = value;
    cpu.status.update_negative_zero(value);
}

/// Jams the real CPU. Reported and otherwise treated as a two cycle no-op.
pub fn kil(cpu: &mut Cpu<impl CpuBus>, _: Operand) {
    let opcode_addr = cpu.pc.wrapping_sub(1);
    log::error!(
        "Opcode not handled: KIL (${:02X}) at ${:04X}",
        cpu.bus.peek_u8(opcode_addr).unwrap_or_default(),
        opcode_addr
    );
    cpu.debug_event_collector
        .on_error(format!("Unhandled opcode at ${:04X}", opcode_addr));
}
