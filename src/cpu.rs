//! CPU implementation for the Ricoh 2A03 (modified MOS 6502)
//!
//! The 2A03 is a MOS 6502 with decimal mode disabled. This implementation
//! is a fetch-decode-execute interpreter driven by a 256-entry opcode table
//! holding each opcode's addressing mode, instruction length and base cycle
//! cost. Extended/unofficial opcodes decode as invalid and are skipped as
//! one-byte no-ops.
//!
//! `step` advances the CPU by one scanline's slice of work (113 cycles);
//! `step_instruction` retires exactly one instruction and is the unit the
//! tests drive.

use log::trace;

/// Status register flag bits
pub mod flags {
    pub const CARRY: u8 = 0x01;
    pub const ZERO: u8 = 0x02;
    pub const INTERRUPT_DISABLE: u8 = 0x04;
    pub const DECIMAL: u8 = 0x08; // Settable on the 2A03, but decimal mode is dead
    pub const BREAK: u8 = 0x10;
    pub const UNUSED: u8 = 0x20; // Reads back as 1 after PLP/RTI
    pub const OVERFLOW: u8 = 0x40;
    pub const NEGATIVE: u8 = 0x80;
}

/// Non-maskable interrupt vector (vblank NMI)
pub const NMI_VECTOR: u16 = 0xFFFA;

/// Reset vector
pub const RESET_VECTOR: u16 = 0xFFFC;

/// BRK / IRQ vector
pub const BREAK_VECTOR: u16 = 0xFFFE;

/// Base address of the stack page
const STACK_BASE: u16 = 0x0100;

/// Stack pointer value after reset
const RESET_STACK_OFFSET: u8 = 0xFD;

/// CPU cycles of work per `step` call (one scanline's slice)
pub const CPU_SLICE_CYCLES: u64 = 113;

/// Addressing modes for CPU instructions
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AddressingMode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Relative,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndexedIndirect, // (Indirect,X)
    IndirectIndexed, // (Indirect),Y
    Invalid,
}

/// Instruction mnemonics. The accumulator-targeted shift/rotate forms are
/// their own variants because they mutate A rather than memory.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Mnemonic {
    Adc, And, Asl, AslAcc, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Brk, Bvc, Bvs,
    Clc, Cld, Cli, Clv, Cmp, Cpx, Cpy, Dec, Dex, Dey, Eor, Inc, Inx, Iny,
    Jmp, Jsr, Lda, Ldx, Ldy, Lsr, LsrAcc, Nop, Ora, Pha, Php, Pla, Plp,
    Rol, RolAcc, Ror, RorAcc, Rti, Rts, Sbc, Sec, Sed, Sei, Sta, Stx, Sty,
    Tax, Tay, Tsx, Txa, Txs, Tya, Unknown,
}

/// One row of the opcode table
#[derive(Copy, Clone)]
struct Opcode {
    mnemonic: Mnemonic,
    mode: AddressingMode,
    length: u8,
    cycles: u8,
}

const fn op(mnemonic: Mnemonic, mode: AddressingMode, length: u8, cycles: u8) -> Opcode {
    Opcode { mnemonic, mode, length, cycles }
}

/// Unofficial opcodes are skipped as one-byte no-ops.
const UNKNOWN_OP: Opcode = op(Mnemonic::Unknown, AddressingMode::Invalid, 1, 2);

static OPCODES: [Opcode; 256] = build_opcode_table();

#[rustfmt::skip]
const fn build_opcode_table() -> [Opcode; 256] {
    use AddressingMode::*;
    use Mnemonic::*;

    let mut t = [UNKNOWN_OP; 256];

    t[0x69] = op(Adc, Immediate, 2, 2);
    t[0x65] = op(Adc, ZeroPage, 2, 3);
    t[0x75] = op(Adc, ZeroPageX, 2, 4);
    t[0x6D] = op(Adc, Absolute, 3, 4);
    t[0x7D] = op(Adc, AbsoluteX, 3, 4);
    t[0x79] = op(Adc, AbsoluteY, 3, 4);
    t[0x61] = op(Adc, IndexedIndirect, 2, 6);
    t[0x71] = op(Adc, IndirectIndexed, 2, 5);

    t[0x29] = op(And, Immediate, 2, 2);
    t[0x25] = op(And, ZeroPage, 2, 3);
    t[0x35] = op(And, ZeroPageX, 2, 4);
    t[0x2D] = op(And, Absolute, 3, 4);
    t[0x3D] = op(And, AbsoluteX, 3, 4);
    t[0x39] = op(And, AbsoluteY, 3, 4);
    t[0x21] = op(And, IndexedIndirect, 2, 6);
    t[0x31] = op(And, IndirectIndexed, 2, 5);

    t[0x0A] = op(AslAcc, Accumulator, 1, 2);
    t[0x06] = op(Asl, ZeroPage, 2, 5);
    t[0x16] = op(Asl, ZeroPageX, 2, 6);
    t[0x0E] = op(Asl, Absolute, 3, 6);
    t[0x1E] = op(Asl, AbsoluteX, 3, 7);

    t[0x90] = op(Bcc, Relative, 2, 2);
    t[0xB0] = op(Bcs, Relative, 2, 2);
    t[0xF0] = op(Beq, Relative, 2, 2);
    t[0x30] = op(Bmi, Relative, 2, 2);
    t[0xD0] = op(Bne, Relative, 2, 2);
    t[0x10] = op(Bpl, Relative, 2, 2);
    t[0x50] = op(Bvc, Relative, 2, 2);
    t[0x70] = op(Bvs, Relative, 2, 2);

    t[0x24] = op(Bit, ZeroPage, 2, 3);
    t[0x2C] = op(Bit, Absolute, 3, 4);

    t[0x00] = op(Brk, Implied, 1, 7);

    t[0x18] = op(Clc, Implied, 1, 2);
    t[0xD8] = op(Cld, Implied, 1, 2);
    t[0x58] = op(Cli, Implied, 1, 2);
    t[0xB8] = op(Clv, Implied, 1, 2);
    t[0x38] = op(Sec, Implied, 1, 2);
    t[0xF8] = op(Sed, Implied, 1, 2);
    t[0x78] = op(Sei, Implied, 1, 2);

    t[0xC9] = op(Cmp, Immediate, 2, 2);
    t[0xC5] = op(Cmp, ZeroPage, 2, 3);
    t[0xD5] = op(Cmp, ZeroPageX, 2, 4);
    t[0xCD] = op(Cmp, Absolute, 3, 4);
    t[0xDD] = op(Cmp, AbsoluteX, 3, 4);
    t[0xD9] = op(Cmp, AbsoluteY, 3, 4);
    t[0xC1] = op(Cmp, IndexedIndirect, 2, 6);
    t[0xD1] = op(Cmp, IndirectIndexed, 2, 5);

    t[0xE0] = op(Cpx, Immediate, 2, 2);
    t[0xE4] = op(Cpx, ZeroPage, 2, 3);
    t[0xEC] = op(Cpx, Absolute, 3, 4);

    t[0xC0] = op(Cpy, Immediate, 2, 2);
    t[0xC4] = op(Cpy, ZeroPage, 2, 3);
    t[0xCC] = op(Cpy, Absolute, 3, 4);

    t[0xC6] = op(Dec, ZeroPage, 2, 5);
    t[0xD6] = op(Dec, ZeroPageX, 2, 6);
    t[0xCE] = op(Dec, Absolute, 3, 6);
    t[0xDE] = op(Dec, AbsoluteX, 3, 7);

    t[0xCA] = op(Dex, Implied, 1, 2);
    t[0x88] = op(Dey, Implied, 1, 2);

    t[0x49] = op(Eor, Immediate, 2, 2);
    t[0x45] = op(Eor, ZeroPage, 2, 3);
    t[0x55] = op(Eor, ZeroPageX, 2, 4);
    t[0x4D] = op(Eor, Absolute, 3, 4);
    t[0x5D] = op(Eor, AbsoluteX, 3, 4);
    t[0x59] = op(Eor, AbsoluteY, 3, 4);
    t[0x41] = op(Eor, IndexedIndirect, 2, 6);
    t[0x51] = op(Eor, IndirectIndexed, 2, 5);

    t[0xE6] = op(Inc, ZeroPage, 2, 5);
    t[0xF6] = op(Inc, ZeroPageX, 2, 6);
    t[0xEE] = op(Inc, Absolute, 3, 6);
    t[0xFE] = op(Inc, AbsoluteX, 3, 7);

    t[0xE8] = op(Inx, Implied, 1, 2);
    t[0xC8] = op(Iny, Implied, 1, 2);

    t[0x4C] = op(Jmp, Absolute, 3, 3);
    t[0x6C] = op(Jmp, Indirect, 3, 5);
    t[0x20] = op(Jsr, Absolute, 3, 6);

    t[0xA9] = op(Lda, Immediate, 2, 2);
    t[0xA5] = op(Lda, ZeroPage, 2, 3);
    t[0xB5] = op(Lda, ZeroPageX, 2, 4);
    t[0xAD] = op(Lda, Absolute, 3, 4);
    t[0xBD] = op(Lda, AbsoluteX, 3, 4);
    t[0xB9] = op(Lda, AbsoluteY, 3, 4);
    t[0xA1] = op(Lda, IndexedIndirect, 2, 6);
    t[0xB1] = op(Lda, IndirectIndexed, 2, 5);

    t[0xA2] = op(Ldx, Immediate, 2, 2);
    t[0xA6] = op(Ldx, ZeroPage, 2, 3);
    t[0xB6] = op(Ldx, ZeroPageY, 2, 4);
    t[0xAE] = op(Ldx, Absolute, 3, 4);
    t[0xBE] = op(Ldx, AbsoluteY, 3, 4);

    t[0xA0] = op(Ldy, Immediate, 2, 2);
    t[0xA4] = op(Ldy, ZeroPage, 2, 3);
    t[0xB4] = op(Ldy, ZeroPageX, 2, 4);
    t[0xAC] = op(Ldy, Absolute, 3, 4);
    t[0xBC] = op(Ldy, AbsoluteX, 3, 4);

    t[0x4A] = op(LsrAcc, Accumulator, 1, 2);
    t[0x46] = op(Lsr, ZeroPage, 2, 5);
    t[0x56] = op(Lsr, ZeroPageX, 2, 6);
    t[0x4E] = op(Lsr, Absolute, 3, 6);
    t[0x5E] = op(Lsr, AbsoluteX, 3, 7);

    t[0xEA] = op(Nop, Implied, 1, 2);

    t[0x09] = op(Ora, Immediate, 2, 2);
    t[0x05] = op(Ora, ZeroPage, 2, 3);
    t[0x15] = op(Ora, ZeroPageX, 2, 4);
    t[0x0D] = op(Ora, Absolute, 3, 4);
    t[0x1D] = op(Ora, AbsoluteX, 3, 4);
    t[0x19] = op(Ora, AbsoluteY, 3, 4);
    t[0x01] = op(Ora, IndexedIndirect, 2, 6);
    t[0x11] = op(Ora, IndirectIndexed, 2, 5);

    t[0x48] = op(Pha, Implied, 1, 3);
    t[0x08] = op(Php, Implied, 1, 3);
    t[0x68] = op(Pla, Implied, 1, 4);
    t[0x28] = op(Plp, Implied, 1, 4);

    t[0x2A] = op(RolAcc, Accumulator, 1, 2);
    t[0x26] = op(Rol, ZeroPage, 2, 5);
    t[0x36] = op(Rol, ZeroPageX, 2, 6);
    t[0x2E] = op(Rol, Absolute, 3, 6);
    t[0x3E] = op(Rol, AbsoluteX, 3, 7);

    t[0x6A] = op(RorAcc, Accumulator, 1, 2);
    t[0x66] = op(Ror, ZeroPage, 2, 5);
    t[0x76] = op(Ror, ZeroPageX, 2, 6);
    t[0x6E] = op(Ror, Absolute, 3, 6);
    t[0x7E] = op(Ror, AbsoluteX, 3, 7);

    t[0x40] = op(Rti, Implied, 1, 6);
    t[0x60] = op(Rts, Implied, 1, 6);

    t[0xE9] = op(Sbc, Immediate, 2, 2);
    t[0xE5] = op(Sbc, ZeroPage, 2, 3);
    t[0xF5] = op(Sbc, ZeroPageX, 2, 4);
    t[0xED] = op(Sbc, Absolute, 3, 4);
    t[0xFD] = op(Sbc, AbsoluteX, 3, 4);
    t[0xF9] = op(Sbc, AbsoluteY, 3, 4);
    t[0xE1] = op(Sbc, IndexedIndirect, 2, 6);
    t[0xF1] = op(Sbc, IndirectIndexed, 2, 5);

    t[0x85] = op(Sta, ZeroPage, 2, 3);
    t[0x95] = op(Sta, ZeroPageX, 2, 4);
    t[0x8D] = op(Sta, Absolute, 3, 4);
    t[0x9D] = op(Sta, AbsoluteX, 3, 5);
    t[0x99] = op(Sta, AbsoluteY, 3, 5);
    t[0x81] = op(Sta, IndexedIndirect, 2, 6);
    t[0x91] = op(Sta, IndirectIndexed, 2, 6);

    t[0x86] = op(Stx, ZeroPage, 2, 3);
    t[0x96] = op(Stx, ZeroPageY, 2, 4);
    t[0x8E] = op(Stx, Absolute, 3, 4);

    t[0x84] = op(Sty, ZeroPage, 2, 3);
    t[0x94] = op(Sty, ZeroPageX, 2, 4);
    t[0x8C] = op(Sty, Absolute, 3, 4);

    t[0xAA] = op(Tax, Implied, 1, 2);
    t[0xA8] = op(Tay, Implied, 1, 2);
    t[0xBA] = op(Tsx, Implied, 1, 2);
    t[0x8A] = op(Txa, Implied, 1, 2);
    t[0x9A] = op(Txs, Implied, 1, 2);
    t[0x98] = op(Tya, Implied, 1, 2);

    t
}

/// Represents a bus the CPU can read from and write to
pub trait CpuBus {
    fn read(&mut self, address: u16) -> u8;
    fn write(&mut self, address: u16, value: u8);

    /// Read a 16-bit little-endian word. The two byte reads do not wrap
    /// within a page.
    fn read_word(&mut self, address: u16) -> u16 {
        let low = self.read(address);
        let high = self.read(address.wrapping_add(1));
        u16::from_le_bytes([low, high])
    }

    /// Collect a pending interrupt vector (0 = none)
    fn take_interrupt(&mut self) -> u16 {
        0
    }
}

/// Represents the Ricoh 2A03 CPU
pub struct Cpu {
    /// Accumulator register
    pub a: u8,
    /// X index register
    pub x: u8,
    /// Y index register
    pub y: u8,
    /// Stack pointer (offset into page $0100)
    pub sp: u8,
    /// Program counter
    pub pc: u16,
    /// Status register
    pub p: u8,

    /// Latched interrupt vector (0 = none)
    interrupt_signal: u16,
    /// Total cycles executed
    cycle_count: u64,
    /// Total instructions retired
    instruction_count: u64,
}

impl Cpu {
    /// Create a new CPU. Registers hold their post-reset values, but the
    /// program counter is only valid after `reset` has read the vector.
    pub fn new() -> Self {
        Cpu {
            a: 0,
            x: 0,
            y: 0,
            sp: RESET_STACK_OFFSET,
            pc: 0,
            p: flags::INTERRUPT_DISABLE | flags::UNUSED,
            interrupt_signal: 0,
            cycle_count: 0,
            instruction_count: 0,
        }
    }

    /// Reset the CPU and load the program counter from the reset vector
    pub fn reset(&mut self, bus: &mut impl CpuBus) {
        self.interrupt_signal = 0;

        self.pc = bus.read_word(RESET_VECTOR);
        self.sp = RESET_STACK_OFFSET;
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.p = flags::INTERRUPT_DISABLE | flags::UNUSED;

        self.cycle_count = 0;
        self.instruction_count = 0;
    }

    /// Total cycles executed since reset
    pub fn cycles(&self) -> u64 {
        self.cycle_count
    }

    /// Total instructions retired since reset
    pub fn instructions(&self) -> u64 {
        self.instruction_count
    }

    /// Advance the CPU by one scanline's slice: whole instructions are
    /// retired until at least 113 cycles of work (including interrupt
    /// entry) have been accounted to this call.
    pub fn step(&mut self, bus: &mut impl CpuBus) {
        let target = self.cycle_count + CPU_SLICE_CYCLES;

        while self.cycle_count < target {
            self.step_instruction(bus);
        }
    }

    /// Service any pending interrupt, then fetch, decode and execute a
    /// single instruction.
    pub fn step_instruction(&mut self, bus: &mut impl CpuBus) {
        let pending = bus.take_interrupt();
        if pending != 0 {
            self.fire_interrupt(pending);
        }
        self.handle_interrupt(bus);

        let previous_pc = self.pc;
        let opcode = bus.read(self.pc);
        let entry = OPCODES[opcode as usize];

        trace!(
            "{:04X}  {:02X} {:?} A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X} CYC:{}",
            self.pc, opcode, entry.mnemonic, self.a, self.x, self.y, self.p, self.sp,
            self.cycle_count
        );

        self.execute_opcode(bus, opcode);

        self.cycle_count += entry.cycles as u64;

        if Self::is_branch(entry.mnemonic)
            && self.pc != previous_pc.wrapping_add(entry.length as u16)
        {
            // The branch was taken; charge one cycle, two if the target
            // lies in a different page.
            self.cycle_count += 1;
            if (self.pc & 0xFF00) != (previous_pc & 0xFF00) {
                self.cycle_count += 1;
            }
        }
    }

    /// Request an interrupt. While the interrupt-disable flag is set only
    /// the NMI vector is accepted.
    pub fn fire_interrupt(&mut self, vector: u16) {
        if self.get_flag(flags::INTERRUPT_DISABLE) {
            if vector == NMI_VECTOR {
                self.interrupt_signal = vector;
            }
        } else {
            self.interrupt_signal = vector;
        }
    }

    /// Enter a latched interrupt: push PC and status (with the break bit
    /// set), mask further IRQs, and jump through the vector.
    fn handle_interrupt(&mut self, bus: &mut impl CpuBus) {
        if self.interrupt_signal == 0 {
            return;
        }

        let vector = self.interrupt_signal;
        self.push_word(bus, self.pc);
        self.push_byte(bus, self.p | flags::BREAK);
        self.set_flag(flags::INTERRUPT_DISABLE, true);
        self.pc = bus.read_word(vector);

        self.interrupt_signal = 0;
        self.cycle_count += 7;
    }

    /// Set or clear a flag in the status register
    pub fn set_flag(&mut self, flag: u8, value: bool) {
        if value {
            self.p |= flag;
        } else {
            self.p &= !flag;
        }
    }

    /// Check whether a status flag is set
    pub fn get_flag(&self, flag: u8) -> bool {
        (self.p & flag) != 0
    }

    fn update_zero_and_negative_flags(&mut self, value: u8) {
        self.set_flag(flags::ZERO, value == 0);
        self.set_flag(flags::NEGATIVE, (value & 0x80) != 0);
    }

    fn is_branch(mnemonic: Mnemonic) -> bool {
        matches!(
            mnemonic,
            Mnemonic::Bcc
                | Mnemonic::Bcs
                | Mnemonic::Beq
                | Mnemonic::Bmi
                | Mnemonic::Bne
                | Mnemonic::Bpl
                | Mnemonic::Bvc
                | Mnemonic::Bvs
        )
    }

    /// Resolve an indirect pointer, replicating the 6502 page-wrap bug: a
    /// pointer whose low byte is $FF fetches its high byte from the start
    /// of the same page.
    fn read_indirect_target(bus: &mut impl CpuBus, pointer: u16) -> u16 {
        if pointer & 0x00FF == 0x00FF {
            let low = bus.read(pointer);
            let high = bus.read(pointer & 0xFF00);
            u16::from_le_bytes([low, high])
        } else {
            bus.read_word(pointer)
        }
    }

    /// Compute the operand address for the opcode at the current (not yet
    /// advanced) program counter.
    fn decode_operand(&mut self, bus: &mut impl CpuBus, entry: &Opcode) -> u16 {
        match entry.mode {
            AddressingMode::Implied
            | AddressingMode::Accumulator
            | AddressingMode::Invalid => 0,

            AddressingMode::Immediate => self.pc.wrapping_add(1),

            AddressingMode::ZeroPage => bus.read(self.pc.wrapping_add(1)) as u16,

            AddressingMode::ZeroPageX => {
                bus.read(self.pc.wrapping_add(1)).wrapping_add(self.x) as u16
            }

            AddressingMode::ZeroPageY => {
                bus.read(self.pc.wrapping_add(1)).wrapping_add(self.y) as u16
            }

            AddressingMode::Relative => {
                // The handler runs after PC has advanced, so the target
                // already includes the instruction length.
                let offset = bus.read(self.pc.wrapping_add(1)) as i8;
                self.pc
                    .wrapping_add(offset as u16)
                    .wrapping_add(entry.length as u16)
            }

            AddressingMode::Absolute => bus.read_word(self.pc.wrapping_add(1)),

            AddressingMode::AbsoluteX => bus
                .read_word(self.pc.wrapping_add(1))
                .wrapping_add(self.x as u16),

            AddressingMode::AbsoluteY => bus
                .read_word(self.pc.wrapping_add(1))
                .wrapping_add(self.y as u16),

            AddressingMode::Indirect => {
                let pointer = bus.read_word(self.pc.wrapping_add(1));
                Self::read_indirect_target(bus, pointer)
            }

            AddressingMode::IndexedIndirect => {
                let pointer = bus.read(self.pc.wrapping_add(1)).wrapping_add(self.x) as u16;
                Self::read_indirect_target(bus, pointer)
            }

            AddressingMode::IndirectIndexed => {
                let pointer = bus.read(self.pc.wrapping_add(1)) as u16;
                Self::read_indirect_target(bus, pointer).wrapping_add(self.y as u16)
            }
        }
    }

    fn execute_opcode(&mut self, bus: &mut impl CpuBus, opcode: u8) {
        let entry = OPCODES[opcode as usize];
        let operand_address = self.decode_operand(bus, &entry);

        self.pc = self.pc.wrapping_add(entry.length as u16);
        self.instruction_count += 1;

        match entry.mnemonic {
            Mnemonic::Adc => self.adc(bus, operand_address),
            Mnemonic::And => self.and(bus, operand_address),
            Mnemonic::Asl => self.asl(bus, operand_address),
            Mnemonic::AslAcc => self.asl_accumulator(),
            Mnemonic::Bit => self.bit(bus, operand_address),
            Mnemonic::Brk => self.brk(bus),
            Mnemonic::Cmp => self.compare(bus, operand_address, self.a),
            Mnemonic::Cpx => self.compare(bus, operand_address, self.x),
            Mnemonic::Cpy => self.compare(bus, operand_address, self.y),
            Mnemonic::Dec => self.dec(bus, operand_address),
            Mnemonic::Eor => self.eor(bus, operand_address),
            Mnemonic::Inc => self.inc(bus, operand_address),
            Mnemonic::Jmp => self.pc = operand_address,
            Mnemonic::Jsr => self.jsr(bus, operand_address),
            Mnemonic::Lda => {
                self.a = bus.read(operand_address);
                self.update_zero_and_negative_flags(self.a);
            }
            Mnemonic::Ldx => {
                self.x = bus.read(operand_address);
                self.update_zero_and_negative_flags(self.x);
            }
            Mnemonic::Ldy => {
                self.y = bus.read(operand_address);
                self.update_zero_and_negative_flags(self.y);
            }
            Mnemonic::Lsr => self.lsr(bus, operand_address),
            Mnemonic::LsrAcc => self.lsr_accumulator(),
            Mnemonic::Ora => self.ora(bus, operand_address),
            Mnemonic::Pha => self.push_byte(bus, self.a),
            Mnemonic::Php => self.push_byte(bus, self.p | flags::BREAK),
            Mnemonic::Pla => {
                self.a = self.pop_byte(bus);
                self.update_zero_and_negative_flags(self.a);
            }
            Mnemonic::Plp => {
                self.p = self.pop_byte(bus);
                self.p = flags::UNUSED | (self.p & !flags::BREAK);
            }
            Mnemonic::Rol => self.rol(bus, operand_address),
            Mnemonic::RolAcc => self.rol_accumulator(),
            Mnemonic::Ror => self.ror(bus, operand_address),
            Mnemonic::RorAcc => self.ror_accumulator(),
            Mnemonic::Rti => self.rti(bus),
            Mnemonic::Rts => self.pc = self.pop_word(bus).wrapping_add(1),
            Mnemonic::Sbc => self.sbc(bus, operand_address),
            Mnemonic::Sta => bus.write(operand_address, self.a),
            Mnemonic::Stx => bus.write(operand_address, self.x),
            Mnemonic::Sty => bus.write(operand_address, self.y),

            Mnemonic::Bcc => self.branch_if(!self.get_flag(flags::CARRY), operand_address),
            Mnemonic::Bcs => self.branch_if(self.get_flag(flags::CARRY), operand_address),
            Mnemonic::Beq => self.branch_if(self.get_flag(flags::ZERO), operand_address),
            Mnemonic::Bmi => self.branch_if(self.get_flag(flags::NEGATIVE), operand_address),
            Mnemonic::Bne => self.branch_if(!self.get_flag(flags::ZERO), operand_address),
            Mnemonic::Bpl => self.branch_if(!self.get_flag(flags::NEGATIVE), operand_address),
            Mnemonic::Bvc => self.branch_if(!self.get_flag(flags::OVERFLOW), operand_address),
            Mnemonic::Bvs => self.branch_if(self.get_flag(flags::OVERFLOW), operand_address),

            Mnemonic::Clc => self.set_flag(flags::CARRY, false),
            Mnemonic::Cld => self.set_flag(flags::DECIMAL, false),
            Mnemonic::Cli => self.set_flag(flags::INTERRUPT_DISABLE, false),
            Mnemonic::Clv => self.set_flag(flags::OVERFLOW, false),
            Mnemonic::Sec => self.set_flag(flags::CARRY, true),
            Mnemonic::Sed => self.set_flag(flags::DECIMAL, true),
            Mnemonic::Sei => self.set_flag(flags::INTERRUPT_DISABLE, true),

            Mnemonic::Tax => {
                self.x = self.a;
                self.update_zero_and_negative_flags(self.x);
            }
            Mnemonic::Tay => {
                self.y = self.a;
                self.update_zero_and_negative_flags(self.y);
            }
            Mnemonic::Tsx => {
                self.x = self.sp;
                self.update_zero_and_negative_flags(self.x);
            }
            Mnemonic::Txa => {
                self.a = self.x;
                self.update_zero_and_negative_flags(self.a);
            }
            Mnemonic::Txs => self.sp = self.x,
            Mnemonic::Tya => {
                self.a = self.y;
                self.update_zero_and_negative_flags(self.a);
            }

            Mnemonic::Nop => {}
            Mnemonic::Unknown => {
                trace!("Skipping unrecognized opcode ${:02X}", opcode);
            }
        }
    }

    // Stack helpers. Word pushes store the high byte first so that the
    // value sits little-endian in memory.

    fn push_byte(&mut self, bus: &mut impl CpuBus, value: u8) {
        bus.write(STACK_BASE + self.sp as u16, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn push_word(&mut self, bus: &mut impl CpuBus, value: u16) {
        bus.write(STACK_BASE + self.sp as u16, (value >> 8) as u8);
        bus.write(
            (STACK_BASE + self.sp as u16).wrapping_sub(1),
            (value & 0xFF) as u8,
        );
        self.sp = self.sp.wrapping_sub(2);
    }

    fn pop_byte(&mut self, bus: &mut impl CpuBus) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        bus.read(STACK_BASE + self.sp as u16)
    }

    fn pop_word(&mut self, bus: &mut impl CpuBus) -> u16 {
        self.sp = self.sp.wrapping_add(2);
        let high = bus.read(STACK_BASE + self.sp as u16);
        let low = bus.read((STACK_BASE + self.sp as u16).wrapping_sub(1));
        u16::from_le_bytes([low, high])
    }

    // Instruction handlers

    fn adc(&mut self, bus: &mut impl CpuBus, operand_address: u16) {
        let operand = bus.read(operand_address);
        let result = self.a as u16 + operand as u16 + (self.p & flags::CARRY) as u16;

        self.set_flag(flags::CARRY, result & 0xFF00 != 0);
        self.update_zero_and_negative_flags(result as u8);

        // Inputs of the same sign producing a result of the other sign
        // means the signed sum overflowed.
        self.set_flag(
            flags::OVERFLOW,
            same_sign(self.a, operand) && !same_sign(operand, result as u8),
        );

        self.a = result as u8;
    }

    fn sbc(&mut self, bus: &mut impl CpuBus, operand_address: u16) {
        let operand = bus.read(operand_address);
        let borrow = 1 - (self.p & flags::CARRY);
        let result = self.a.wrapping_sub(operand).wrapping_sub(borrow);
        let carry_test = self.a as i16 - operand as i16 - borrow as i16;

        self.update_zero_and_negative_flags(result);
        self.set_flag(flags::CARRY, carry_test >= 0);
        self.set_flag(
            flags::OVERFLOW,
            !same_sign(self.a, result) && !same_sign(self.a, operand),
        );

        self.a = result;
    }

    fn and(&mut self, bus: &mut impl CpuBus, operand_address: u16) {
        self.a &= bus.read(operand_address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn ora(&mut self, bus: &mut impl CpuBus, operand_address: u16) {
        self.a |= bus.read(operand_address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn eor(&mut self, bus: &mut impl CpuBus, operand_address: u16) {
        self.a ^= bus.read(operand_address);
        self.update_zero_and_negative_flags(self.a);
    }

    fn compare(&mut self, bus: &mut impl CpuBus, operand_address: u16, register: u8) {
        let operand = bus.read(operand_address);
        let result = (register as u16).wrapping_sub(operand as u16);

        self.set_flag(flags::CARRY, register >= operand);
        self.update_zero_and_negative_flags(result as u8);
    }

    fn bit(&mut self, bus: &mut impl CpuBus, operand_address: u16) {
        let operand = bus.read(operand_address);

        self.set_flag(flags::OVERFLOW, operand & 0x40 != 0);
        self.set_flag(flags::NEGATIVE, operand & 0x80 != 0);
        self.set_flag(flags::ZERO, self.a & operand == 0);
    }

    fn asl(&mut self, bus: &mut impl CpuBus, operand_address: u16) {
        let operand = bus.read(operand_address);
        let result = operand << 1;

        self.update_zero_and_negative_flags(result);
        self.set_flag(flags::CARRY, operand & 0x80 != 0);
        bus.write(operand_address, result);
    }

    fn asl_accumulator(&mut self) {
        let result = self.a << 1;

        self.update_zero_and_negative_flags(result);
        self.set_flag(flags::CARRY, self.a & 0x80 != 0);
        self.a = result;
    }

    fn lsr(&mut self, bus: &mut impl CpuBus, operand_address: u16) {
        let operand = bus.read(operand_address);
        let result = operand >> 1;

        self.update_zero_and_negative_flags(result);
        self.set_flag(flags::CARRY, operand & 0x01 != 0);
        bus.write(operand_address, result);
    }

    fn lsr_accumulator(&mut self) {
        let result = self.a >> 1;

        self.update_zero_and_negative_flags(result);
        self.set_flag(flags::CARRY, self.a & 0x01 != 0);
        self.a = result;
    }

    fn rol(&mut self, bus: &mut impl CpuBus, operand_address: u16) {
        let operand = bus.read(operand_address);
        let result = (self.p & flags::CARRY) | (operand << 1);

        self.update_zero_and_negative_flags(result);
        self.set_flag(flags::CARRY, operand & 0x80 != 0);
        bus.write(operand_address, result);
    }

    fn rol_accumulator(&mut self) {
        let result = (self.p & flags::CARRY) | (self.a << 1);

        self.update_zero_and_negative_flags(result);
        self.set_flag(flags::CARRY, self.a & 0x80 != 0);
        self.a = result;
    }

    fn ror(&mut self, bus: &mut impl CpuBus, operand_address: u16) {
        let operand = bus.read(operand_address);
        let result = (operand >> 1) | ((self.p & flags::CARRY) << 7);

        self.update_zero_and_negative_flags(result);
        self.set_flag(flags::CARRY, operand & 0x01 != 0);
        bus.write(operand_address, result);
    }

    fn ror_accumulator(&mut self) {
        let result = (self.a >> 1) | ((self.p & flags::CARRY) << 7);

        self.update_zero_and_negative_flags(result);
        self.set_flag(flags::CARRY, self.a & 0x01 != 0);
        self.a = result;
    }

    fn inc(&mut self, bus: &mut impl CpuBus, operand_address: u16) {
        let result = bus.read(operand_address).wrapping_add(1);
        self.update_zero_and_negative_flags(result);
        bus.write(operand_address, result);
    }

    fn dec(&mut self, bus: &mut impl CpuBus, operand_address: u16) {
        let result = bus.read(operand_address).wrapping_sub(1);
        self.update_zero_and_negative_flags(result);
        bus.write(operand_address, result);
    }

    fn jsr(&mut self, bus: &mut impl CpuBus, operand_address: u16) {
        // PC has already advanced past the JSR; back up one byte so RTS
        // lands on the following instruction.
        self.pc = self.pc.wrapping_sub(1);
        self.push_word(bus, self.pc);
        self.pc = operand_address;
    }

    fn brk(&mut self, bus: &mut impl CpuBus) {
        self.push_word(bus, self.pc);
        self.push_byte(bus, self.p | flags::BREAK);
        self.set_flag(flags::INTERRUPT_DISABLE, true);
        self.pc = bus.read_word(BREAK_VECTOR);
    }

    fn rti(&mut self, bus: &mut impl CpuBus) {
        self.p = self.pop_byte(bus);
        self.pc = self.pop_word(bus);

        self.set_flag(flags::BREAK, false);
        self.set_flag(flags::UNUSED, true);
    }

    fn branch_if(&mut self, condition: bool, target: u16) {
        if condition {
            self.pc = target;
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

fn same_sign(a: u8, b: u8) -> bool {
    (a ^ b) & 0x80 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestBus {
        mem: Vec<u8>,
        pending: u16,
    }

    impl TestBus {
        fn new() -> Self {
            TestBus { mem: vec![0; 0x10000], pending: 0 }
        }
    }

    impl CpuBus for TestBus {
        fn read(&mut self, address: u16) -> u8 {
            self.mem[address as usize]
        }

        fn write(&mut self, address: u16, value: u8) {
            self.mem[address as usize] = value;
        }

        fn take_interrupt(&mut self) -> u16 {
            std::mem::take(&mut self.pending)
        }
    }

    fn cpu_with_program(program: &[u8]) -> (Cpu, TestBus) {
        let mut bus = TestBus::new();
        bus.mem[0x8000..0x8000 + program.len()].copy_from_slice(program);
        bus.mem[0xFFFC] = 0x00;
        bus.mem[0xFFFD] = 0x80;

        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        (cpu, bus)
    }

    #[test]
    fn reset_loads_vector_and_initial_state() {
        let (cpu, _) = cpu_with_program(&[]);

        assert_eq!(cpu.pc, 0x8000);
        assert_eq!(cpu.sp, 0xFD);
        assert_eq!(cpu.p, 0x24);
        assert_eq!(cpu.cycles(), 0);
    }

    #[test]
    fn lda_immediate_sets_zero_then_negative() {
        let (mut cpu, mut bus) = cpu_with_program(&[0xA9, 0x00, 0xA9, 0x80]);

        cpu.step_instruction(&mut bus);
        assert_eq!(cpu.a, 0x00);
        assert!(cpu.get_flag(flags::ZERO));
        assert!(!cpu.get_flag(flags::NEGATIVE));

        cpu.step_instruction(&mut bus);
        assert_eq!(cpu.a, 0x80);
        assert!(!cpu.get_flag(flags::ZERO));
        assert!(cpu.get_flag(flags::NEGATIVE));
    }

    #[test]
    fn adc_signals_signed_overflow() {
        let (mut cpu, mut bus) = cpu_with_program(&[0xA9, 0x50, 0x69, 0x50]);

        cpu.step_instruction(&mut bus);
        cpu.step_instruction(&mut bus);

        assert_eq!(cpu.a, 0xA0);
        assert!(cpu.get_flag(flags::NEGATIVE));
        assert!(cpu.get_flag(flags::OVERFLOW));
        assert!(!cpu.get_flag(flags::CARRY));
        assert!(!cpu.get_flag(flags::ZERO));
    }

    #[test]
    fn adc_carries_out_and_in() {
        // 0xFF + 0x01 wraps to zero with carry out.
        let (mut cpu, mut bus) = cpu_with_program(&[0xA9, 0xFF, 0x69, 0x01, 0x69, 0x00]);

        cpu.step_instruction(&mut bus);
        cpu.step_instruction(&mut bus);
        assert_eq!(cpu.a, 0x00);
        assert!(cpu.get_flag(flags::CARRY));
        assert!(cpu.get_flag(flags::ZERO));

        // The carry feeds the next addition.
        cpu.step_instruction(&mut bus);
        assert_eq!(cpu.a, 0x01);
        assert!(!cpu.get_flag(flags::CARRY));
    }

    #[test]
    fn sbc_clears_carry_on_borrow() {
        let (mut cpu, mut bus) = cpu_with_program(&[0x38, 0xA9, 0x10, 0xE9, 0x20]);

        for _ in 0..3 {
            cpu.step_instruction(&mut bus);
        }

        assert_eq!(cpu.a, 0xF0);
        assert!(!cpu.get_flag(flags::CARRY));
        assert!(cpu.get_flag(flags::NEGATIVE));
        assert!(!cpu.get_flag(flags::OVERFLOW));
    }

    #[test]
    fn compare_sets_carry_zero_negative() {
        let (mut cpu, mut bus) = cpu_with_program(&[0xA9, 0x42, 0xC9, 0x42, 0xC9, 0x50]);

        cpu.step_instruction(&mut bus);
        cpu.step_instruction(&mut bus);
        assert!(cpu.get_flag(flags::CARRY));
        assert!(cpu.get_flag(flags::ZERO));

        cpu.step_instruction(&mut bus);
        assert!(!cpu.get_flag(flags::CARRY));
        assert!(!cpu.get_flag(flags::ZERO));
        assert!(cpu.get_flag(flags::NEGATIVE));
    }

    #[test]
    fn stack_byte_round_trip_restores_pointer() {
        // PHA, LDA #$00, PLA
        let (mut cpu, mut bus) = cpu_with_program(&[0xA9, 0x7C, 0x48, 0xA9, 0x00, 0x68]);
        let initial_sp = cpu.sp;

        for _ in 0..4 {
            cpu.step_instruction(&mut bus);
        }

        assert_eq!(cpu.a, 0x7C);
        assert_eq!(cpu.sp, initial_sp);
    }

    #[test]
    fn jsr_pushes_return_minus_one_little_endian() {
        let (mut cpu, mut bus) = cpu_with_program(&[0x20, 0x10, 0x90]);

        cpu.step_instruction(&mut bus);

        assert_eq!(cpu.pc, 0x9010);
        assert_eq!(cpu.sp, 0xFB);
        // Return-minus-one (0x8002) sits little-endian on the stack.
        assert_eq!(bus.mem[0x01FC], 0x02);
        assert_eq!(bus.mem[0x01FD], 0x80);
    }

    #[test]
    fn rts_resumes_after_the_call() {
        let mut program = vec![0x20, 0x10, 0x80]; // JSR $8010
        program.resize(0x10, 0xEA);
        program.push(0x60); // $8010: RTS
        let (mut cpu, mut bus) = cpu_with_program(&program);

        cpu.step_instruction(&mut bus);
        cpu.step_instruction(&mut bus);

        assert_eq!(cpu.pc, 0x8003);
        assert_eq!(cpu.sp, 0xFD);
    }

    #[test]
    fn php_sets_break_on_the_stack_plp_clears_it() {
        // SEC, PHP, CLC, PLP
        let (mut cpu, mut bus) = cpu_with_program(&[0x38, 0x08, 0x18, 0x28]);

        cpu.step_instruction(&mut bus);
        cpu.step_instruction(&mut bus);
        assert_ne!(bus.mem[0x01FD] & flags::BREAK, 0);

        cpu.step_instruction(&mut bus);
        assert!(!cpu.get_flag(flags::CARRY));

        cpu.step_instruction(&mut bus);
        assert!(cpu.get_flag(flags::CARRY));
        assert!(!cpu.get_flag(flags::BREAK));
        assert!(cpu.get_flag(flags::UNUSED));
    }

    #[test]
    fn indirect_jmp_wraps_within_the_pointer_page() {
        let (mut cpu, mut bus) = cpu_with_program(&[0x6C, 0xFF, 0x30]);
        bus.mem[0x30FF] = 0x40;
        bus.mem[0x3000] = 0x80;
        bus.mem[0x3100] = 0x99; // would be the high byte without the bug

        cpu.step_instruction(&mut bus);

        assert_eq!(cpu.pc, 0x8040);
    }

    #[test]
    fn zero_page_indexing_wraps() {
        // LDX #$10, LDA $F8,X -> effective address $0008
        let (mut cpu, mut bus) = cpu_with_program(&[0xA2, 0x10, 0xB5, 0xF8]);
        bus.mem[0x0008] = 0x77;

        cpu.step_instruction(&mut bus);
        cpu.step_instruction(&mut bus);

        assert_eq!(cpu.a, 0x77);
    }

    #[test]
    fn indirect_indexed_adds_y_after_the_fetch() {
        // LDY #$04, LDA ($20),Y
        let (mut cpu, mut bus) = cpu_with_program(&[0xA0, 0x04, 0xB1, 0x20]);
        bus.mem[0x0020] = 0x00;
        bus.mem[0x0021] = 0x90;
        bus.mem[0x9004] = 0x5A;

        cpu.step_instruction(&mut bus);
        cpu.step_instruction(&mut bus);

        assert_eq!(cpu.a, 0x5A);
    }

    #[test]
    fn taken_branch_costs_an_extra_cycle() {
        // LDA #$01 (Z clear), BNE +2
        let (mut cpu, mut bus) = cpu_with_program(&[0xA9, 0x01, 0xD0, 0x02]);

        cpu.step_instruction(&mut bus);
        let before = cpu.cycles();
        cpu.step_instruction(&mut bus);

        assert_eq!(cpu.pc, 0x8006);
        assert_eq!(cpu.cycles() - before, 3);
    }

    #[test]
    fn page_crossing_branch_costs_two_extra_cycles() {
        let mut bus = TestBus::new();
        bus.mem[0xFFFC] = 0xF0;
        bus.mem[0xFFFD] = 0x80;
        bus.mem[0x80F0] = 0xA9; // LDA #$01
        bus.mem[0x80F1] = 0x01;
        bus.mem[0x80F2] = 0xD0; // BNE +$20 -> $8114
        bus.mem[0x80F3] = 0x20;

        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);

        cpu.step_instruction(&mut bus);
        let before = cpu.cycles();
        cpu.step_instruction(&mut bus);

        assert_eq!(cpu.pc, 0x8114);
        assert_eq!(cpu.cycles() - before, 4);
    }

    #[test]
    fn untaken_branch_costs_base_cycles_only() {
        // Carry is clear after reset, so BCS falls through.
        let (mut cpu, mut bus) = cpu_with_program(&[0xB0, 0x10]);

        cpu.step_instruction(&mut bus);

        assert_eq!(cpu.pc, 0x8002);
        assert_eq!(cpu.cycles(), 2);
    }

    #[test]
    fn backward_branch_targets_resolve() {
        // NOP, NOP, BNE -4 lands back on the first NOP.
        let (mut cpu, mut bus) = cpu_with_program(&[0xEA, 0xEA, 0xA9, 0x01, 0xD0, 0xFA]);

        for _ in 0..4 {
            cpu.step_instruction(&mut bus);
        }

        assert_eq!(cpu.pc, 0x8000);
    }

    #[test]
    fn unknown_opcode_is_skipped_as_a_one_byte_nop() {
        let (mut cpu, mut bus) = cpu_with_program(&[0x02, 0xA9, 0x33]);

        cpu.step_instruction(&mut bus);
        assert_eq!(cpu.pc, 0x8001);
        assert_eq!(cpu.cycles(), 2);

        cpu.step_instruction(&mut bus);
        assert_eq!(cpu.a, 0x33);
    }

    #[test]
    fn accumulator_shift_and_rotate_carry_chain() {
        // LDA #$80, ASL A, ROL A
        let (mut cpu, mut bus) = cpu_with_program(&[0xA9, 0x80, 0x0A, 0x2A]);

        cpu.step_instruction(&mut bus);
        cpu.step_instruction(&mut bus);
        assert_eq!(cpu.a, 0x00);
        assert!(cpu.get_flag(flags::CARRY));
        assert!(cpu.get_flag(flags::ZERO));

        cpu.step_instruction(&mut bus);
        assert_eq!(cpu.a, 0x01);
        assert!(!cpu.get_flag(flags::CARRY));
    }

    #[test]
    fn bit_copies_operand_bits_into_flags() {
        let (mut cpu, mut bus) = cpu_with_program(&[0xA9, 0x00, 0x24, 0x10]);
        bus.mem[0x0010] = 0xC0;

        cpu.step_instruction(&mut bus);
        cpu.step_instruction(&mut bus);

        assert!(cpu.get_flag(flags::ZERO));
        assert!(cpu.get_flag(flags::NEGATIVE));
        assert!(cpu.get_flag(flags::OVERFLOW));
    }

    #[test]
    fn inc_and_dec_read_modify_write_memory() {
        let (mut cpu, mut bus) = cpu_with_program(&[0xE6, 0x40, 0xC6, 0x41]);
        bus.mem[0x0040] = 0xFF;
        bus.mem[0x0041] = 0x00;

        cpu.step_instruction(&mut bus);
        assert_eq!(bus.mem[0x0040], 0x00);
        assert!(cpu.get_flag(flags::ZERO));

        cpu.step_instruction(&mut bus);
        assert_eq!(bus.mem[0x0041], 0xFF);
        assert!(cpu.get_flag(flags::NEGATIVE));
    }

    #[test]
    fn txs_does_not_touch_flags() {
        let (mut cpu, mut bus) = cpu_with_program(&[0xA2, 0x00, 0x9A]);

        cpu.step_instruction(&mut bus);
        assert!(cpu.get_flag(flags::ZERO));

        cpu.step_instruction(&mut bus);
        assert_eq!(cpu.sp, 0x00);
        assert!(cpu.get_flag(flags::ZERO)); // unchanged from LDX
    }

    #[test]
    fn brk_and_rti_round_trip() {
        let (mut cpu, mut bus) = cpu_with_program(&[0x00]);
        bus.mem[0xFFFE] = 0x00;
        bus.mem[0xFFFF] = 0x90;
        bus.mem[0x9000] = 0x40; // RTI

        cpu.step_instruction(&mut bus);
        assert_eq!(cpu.pc, 0x9000);
        assert!(cpu.get_flag(flags::INTERRUPT_DISABLE));

        cpu.step_instruction(&mut bus);
        assert_eq!(cpu.pc, 0x8001);
        assert!(!cpu.get_flag(flags::BREAK));
        assert!(cpu.get_flag(flags::UNUSED));
    }

    #[test]
    fn nmi_entry_pushes_state_and_jumps_through_the_vector() {
        let (mut cpu, mut bus) = cpu_with_program(&[0xEA]);
        bus.mem[0xFFFA] = 0x00;
        bus.mem[0xFFFB] = 0x90;
        bus.mem[0x9000] = 0xA9; // LDA #$01
        bus.mem[0x9001] = 0x01;
        bus.pending = NMI_VECTOR;

        let before = cpu.cycles();
        cpu.step_instruction(&mut bus);

        assert_eq!(cpu.pc, 0x9002);
        assert_eq!(cpu.a, 0x01);
        assert_eq!(cpu.sp, 0xFA);
        // Old PC pushed little-endian, then status with the break bit set.
        assert_eq!(bus.mem[0x01FC], 0x00);
        assert_eq!(bus.mem[0x01FD], 0x80);
        assert_eq!(bus.mem[0x01FB], 0x24 | flags::BREAK);
        // 7 cycles of interrupt entry plus the LDA.
        assert_eq!(cpu.cycles() - before, 9);
    }

    #[test]
    fn irq_vector_is_masked_while_interrupts_are_disabled() {
        let (mut cpu, mut bus) = cpu_with_program(&[0xEA]);

        // I is set after reset: a BRK/IRQ vector must be dropped.
        cpu.fire_interrupt(BREAK_VECTOR);
        cpu.step_instruction(&mut bus);
        assert_eq!(cpu.pc, 0x8001);

        // The NMI vector is accepted regardless.
        let (mut cpu, mut bus) = cpu_with_program(&[0xEA]);
        bus.mem[0xFFFA] = 0x00;
        bus.mem[0xFFFB] = 0x90;
        bus.mem[0x9000] = 0xEA;
        cpu.fire_interrupt(NMI_VECTOR);
        cpu.step_instruction(&mut bus);
        assert_eq!(cpu.pc, 0x9001);
    }

    #[test]
    fn irq_vector_is_accepted_once_interrupts_are_enabled() {
        let (mut cpu, mut bus) = cpu_with_program(&[0x58, 0xEA]);
        bus.mem[0xFFFE] = 0x00;
        bus.mem[0xFFFF] = 0xA0;
        bus.mem[0xA000] = 0xEA;

        cpu.step_instruction(&mut bus); // CLI
        cpu.fire_interrupt(BREAK_VECTOR);
        cpu.step_instruction(&mut bus);

        assert_eq!(cpu.pc, 0xA001);
    }

    #[test]
    fn step_retires_instructions_until_the_slice_budget_is_met() {
        let program = vec![0xEA; 0x100];
        let (mut cpu, mut bus) = cpu_with_program(&program);

        cpu.step(&mut bus);

        // 57 NOPs at 2 cycles apiece clear the 113-cycle budget.
        assert_eq!(cpu.cycles(), 114);
        assert_eq!(cpu.instructions(), 57);
        assert_eq!(cpu.pc, 0x8000 + 57);
    }
}
