//! The 6502 CPU core: instruction execution, cycle accounting, and interrupt line handling.
//!
//! The core is instruction-stepped: [`CpuState::execute`] runs whole instructions until a
//! caller-supplied cycle budget is exhausted, overshooting at most to the end of the
//! instruction in progress. All memory accesses go through the [`BusInterface`] seam, which is
//! how the mapper subsystem intercepts cartridge-range accesses.

mod instructions;

use crate::num::GetBit;
use bincode::{Decode, Encode};

pub const NMI_VECTOR: u16 = 0xFFFA;
pub const RESET_VECTOR: u16 = 0xFFFC;
pub const IRQ_VECTOR: u16 = 0xFFFE;

const STACK_START: u16 = 0x0100;

// NMI/IRQ/BRK all take 7 cycles to vector
const INTERRUPT_SERVICE_CYCLES: u32 = 7;

/// The memory access seam between the CPU core and the surrounding system.
///
/// The emulated machine routes cartridge-range accesses through the active mapper; tests can
/// supply a flat 64KB RAM implementation instead.
pub trait BusInterface {
    fn read(&mut self, address: u16) -> u8;
    fn write(&mut self, address: u16, value: u8);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum StatusReadContext {
    HardwareInterruptHandler,
    Brk,
    PushStack,
}

#[derive(Debug, Clone, Copy, Encode, Decode)]
pub struct StatusFlags {
    pub negative: bool,
    pub overflow: bool,
    pub decimal: bool,
    pub interrupt_disable: bool,
    pub zero: bool,
    pub carry: bool,
}

impl StatusFlags {
    #[must_use]
    pub fn new() -> Self {
        // I flag defaults to 1 at power-on, others default to 0
        Self {
            negative: false,
            overflow: false,
            decimal: false,
            interrupt_disable: true,
            zero: false,
            carry: false,
        }
    }

    pub fn set_zero(&mut self, zero: bool) -> &mut Self {
        self.zero = zero;
        self
    }

    pub fn set_negative(&mut self, negative: bool) -> &mut Self {
        self.negative = negative;
        self
    }

    #[must_use]
    pub fn to_byte(self, read_ctx: StatusReadContext) -> u8 {
        // B flag is set during BRK and PHA/PHP, cleared during NMI & IRQ handlers
        let b_flag = match read_ctx {
            StatusReadContext::Brk | StatusReadContext::PushStack => 0x10,
            StatusReadContext::HardwareInterruptHandler => 0x00,
        };

        // Bit 5 is unused, always reads as 1
        (u8::from(self.negative) << 7)
            | (u8::from(self.overflow) << 6)
            | 0x20
            | b_flag
            | (u8::from(self.decimal) << 3)
            | (u8::from(self.interrupt_disable) << 2)
            | (u8::from(self.zero) << 1)
            | u8::from(self.carry)
    }

    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        Self {
            negative: byte.bit(7),
            overflow: byte.bit(6),
            decimal: byte.bit(3),
            interrupt_disable: byte.bit(2),
            zero: byte.bit(1),
            carry: byte.bit(0),
        }
    }
}

impl Default for StatusFlags {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct CpuRegisters {
    pub accumulator: u8,
    pub x: u8,
    pub y: u8,
    pub status: StatusFlags,
    pub pc: u16,
    pub sp: u8,
}

impl CpuRegisters {
    fn new(reset_vector: u16) -> Self {
        Self { accumulator: 0, x: 0, y: 0, status: StatusFlags::new(), pc: reset_vector, sp: 0xFD }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct CpuState {
    registers: CpuRegisters,
    irq_line: bool,
    nmi_line: bool,
    nmi_pending: bool,
    irq_deferred: bool,
}

impl CpuState {
    /// Create a new CPU with the PC pointing to the RESET vector, read from $FFFC.
    pub fn new<B: BusInterface>(bus: &mut B) -> Self {
        let reset_vector = read_vector(bus, RESET_VECTOR);

        Self {
            registers: CpuRegisters::new(reset_vector),
            irq_line: false,
            nmi_line: false,
            nmi_pending: false,
            irq_deferred: false,
        }
    }

    /// Reset the CPU:
    /// * Update PC to point to the RESET vector
    /// * Restore SP and the status flags to their power-on pattern (interrupt-disable set)
    /// * Clear all latched interrupt state
    ///
    /// Resetting twice in a row yields identical CPU state both times.
    pub fn reset<B: BusInterface>(&mut self, bus: &mut B) {
        self.registers = CpuRegisters::new(read_vector(bus, RESET_VECTOR));
        self.nmi_pending = false;
        self.irq_line = false;
        self.irq_deferred = false;
    }

    /// Run instructions until at least `cycle_budget` cycles have been consumed, returning the
    /// number of cycles actually consumed. Execution only stops at instruction boundaries, so
    /// the return value can overshoot the budget by the tail of the final instruction.
    pub fn execute<B: BusInterface>(&mut self, bus: &mut B, cycle_budget: u32) -> u32 {
        let mut cycles = 0;
        while cycles < cycle_budget {
            cycles += self.step(bus);
        }
        cycles
    }

    /// Service any pending interrupt, then execute one instruction. Returns cycles consumed.
    pub(crate) fn step<B: BusInterface>(&mut self, bus: &mut B) -> u32 {
        // NMI is serviced unconditionally; IRQ only when the I flag is clear and the previous
        // instruction did not just clear it (the one-instruction CLI latency)
        if self.nmi_pending {
            self.nmi_pending = false;
            return self.service_interrupt(bus, NMI_VECTOR);
        }

        if self.irq_line && !self.registers.status.interrupt_disable && !self.irq_deferred {
            return self.service_interrupt(bus, IRQ_VECTOR);
        }
        self.irq_deferred = false;

        let i_before = self.registers.status.interrupt_disable;

        let opcode = bus.read(self.registers.pc);
        self.registers.pc = self.registers.pc.wrapping_add(1);

        let cycles = instructions::execute(self, bus, opcode);

        // RTI's flag restore takes effect immediately; CLI and PLP have a one-instruction delay
        if i_before && !self.registers.status.interrupt_disable && opcode != 0x40 {
            self.irq_deferred = true;
        }

        cycles
    }

    fn service_interrupt<B: BusInterface>(&mut self, bus: &mut B, vector: u16) -> u32 {
        let [pc_lsb, pc_msb] = self.registers.pc.to_le_bytes();
        self.push_stack(bus, pc_msb);
        self.push_stack(bus, pc_lsb);
        self.push_stack(
            bus,
            self.registers.status.to_byte(StatusReadContext::HardwareInterruptHandler),
        );

        self.registers.status.interrupt_disable = true;
        self.registers.pc = read_vector(bus, vector);

        INTERRUPT_SERVICE_CYCLES
    }

    fn push_stack<B: BusInterface>(&mut self, bus: &mut B, value: u8) {
        bus.write(STACK_START + u16::from(self.registers.sp), value);
        self.registers.sp = self.registers.sp.wrapping_sub(1);
    }

    fn pull_stack<B: BusInterface>(&mut self, bus: &mut B) -> u8 {
        self.registers.sp = self.registers.sp.wrapping_add(1);
        bus.read(STACK_START + u16::from(self.registers.sp))
    }

    /// Set the level-triggered IRQ line. The line is sampled at every instruction boundary; it
    /// stays asserted until the caller clears it.
    pub fn set_irq_line(&mut self, asserted: bool) {
        self.irq_line = asserted;
    }

    /// Set the edge-triggered NMI line. Only a deasserted-to-asserted transition latches an
    /// NMI; holding the line asserted after servicing does not re-trigger it.
    pub fn set_nmi_line(&mut self, asserted: bool) {
        if asserted && !self.nmi_line {
            self.nmi_pending = true;
        }
        self.nmi_line = asserted;
    }

    #[must_use]
    pub fn registers(&self) -> &CpuRegisters {
        &self.registers
    }

    pub fn set_registers(&mut self, registers: CpuRegisters) {
        self.registers = registers;
    }

    #[inline]
    #[must_use]
    pub fn pc(&self) -> u16 {
        self.registers.pc
    }
}

fn read_vector<B: BusInterface>(bus: &mut B, vector: u16) -> u16 {
    let lsb = bus.read(vector);
    let msb = bus.read(vector.wrapping_add(1));
    u16::from_le_bytes([lsb, msb])
}
