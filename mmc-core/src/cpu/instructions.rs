//! 6502 instruction decoding and execution.
//!
//! Instructions execute atomically: [`execute`] decodes one opcode, performs all of its memory
//! accesses through the bus, and returns the documented cycle count for that opcode including
//! any page-crossing and taken-branch penalties. The 2A03 has no BCD unit, so ADC/SBC ignore
//! the decimal flag (the flag itself is still storable via SED/CLD/PLP).

#[cfg(test)]
mod tests;

use crate::cpu::{BusInterface, CpuRegisters, CpuState, StatusReadContext, IRQ_VECTOR};
use crate::num::GetBit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndirectX,
    IndirectY,
    Implied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuRegister {
    A,
    X,
    Y,
    S,
    P,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadInstruction {
    // ADC
    AddWithCarry(AddressingMode),
    // AND
    And(AddressingMode),
    // BIT
    BitTest(AddressingMode),
    // CMP / CPX / CPY
    Compare(CpuRegister, AddressingMode),
    // EOR
    ExclusiveOr(AddressingMode),
    // LDA / LDX / LDY
    LoadRegister(CpuRegister, AddressingMode),
    // ORA
    InclusiveOr(AddressingMode),
    // SBC
    SubtractWithCarry(AddressingMode),
}

impl ReadInstruction {
    fn addressing_mode(self) -> AddressingMode {
        match self {
            Self::AddWithCarry(addressing_mode)
            | Self::And(addressing_mode)
            | Self::BitTest(addressing_mode)
            | Self::Compare(_, addressing_mode)
            | Self::ExclusiveOr(addressing_mode)
            | Self::LoadRegister(_, addressing_mode)
            | Self::InclusiveOr(addressing_mode)
            | Self::SubtractWithCarry(addressing_mode) => addressing_mode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModifyInstruction {
    // ASL
    ShiftLeft(AddressingMode),
    // DEC
    DecrementMemory(AddressingMode),
    // INC
    IncrementMemory(AddressingMode),
    // LSR
    LogicalShiftRight(AddressingMode),
    // ROL
    RotateLeft(AddressingMode),
    // ROR
    RotateRight(AddressingMode),
}

impl ModifyInstruction {
    fn addressing_mode(self) -> AddressingMode {
        match self {
            Self::ShiftLeft(addressing_mode)
            | Self::DecrementMemory(addressing_mode)
            | Self::IncrementMemory(addressing_mode)
            | Self::LogicalShiftRight(addressing_mode)
            | Self::RotateLeft(addressing_mode)
            | Self::RotateRight(addressing_mode) => addressing_mode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegistersInstruction {
    // CLC
    ClearCarryFlag,
    // CLD
    ClearDecimalFlag,
    // CLI
    ClearInterruptDisable,
    // CLV
    ClearOverflowFlag,
    // DEX / DEY
    DecrementRegister(CpuRegister),
    // INX / INY
    IncrementRegister(CpuRegister),
    // NOP
    NoOp,
    // SEC
    SetCarryFlag,
    // SED
    SetDecimalFlag,
    // SEI
    SetInterruptDisable,
    // TAX / TAY / TSX / TXA / TXS / TYA
    TransferBetweenRegisters { to: CpuRegister, from: CpuRegister },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchCondition {
    // BCC
    CarryClear,
    // BCS
    CarrySet,
    // BEQ
    Equal,
    // BMI
    Minus,
    // BNE
    NotEqual,
    // BPL
    Positive,
    // BVC
    OverflowClear,
    // BVS
    OverflowSet,
}

impl BranchCondition {
    fn check(self, registers: &CpuRegisters) -> bool {
        match self {
            Self::CarryClear => !registers.status.carry,
            Self::CarrySet => registers.status.carry,
            Self::Equal => registers.status.zero,
            Self::Minus => registers.status.negative,
            Self::NotEqual => !registers.status.zero,
            Self::Positive => !registers.status.negative,
            Self::OverflowClear => !registers.status.overflow,
            Self::OverflowSet => registers.status.overflow,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Instruction {
    Read(ReadInstruction),
    ReadModifyWrite(ModifyInstruction),
    RegistersOnly(RegistersInstruction),
    Branch(BranchCondition),
    // STA / STX / STY
    StoreRegister(CpuRegister, AddressingMode),
    // BRK
    ForceInterrupt,
    // JMP
    Jump(AddressingMode),
    // JSR
    JumpToSubroutine,
    // PHA / PHP
    PushStack(CpuRegister),
    // PLA / PLP
    PullStack(CpuRegister),
    // RTI
    ReturnFromInterrupt,
    // RTS
    ReturnFromSubroutine,
}

impl Instruction {
    fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode {
            0x00 => Some(Self::ForceInterrupt),
            0x01 => Some(Self::Read(ReadInstruction::InclusiveOr(AddressingMode::IndirectX))),
            0x05 => Some(Self::Read(ReadInstruction::InclusiveOr(AddressingMode::ZeroPage))),
            0x06 => Some(Self::ReadModifyWrite(ModifyInstruction::ShiftLeft(
                AddressingMode::ZeroPage,
            ))),
            0x08 => Some(Self::PushStack(CpuRegister::P)),
            0x09 => Some(Self::Read(ReadInstruction::InclusiveOr(AddressingMode::Immediate))),
            0x0A => Some(Self::ReadModifyWrite(ModifyInstruction::ShiftLeft(
                AddressingMode::Accumulator,
            ))),
            0x0D => Some(Self::Read(ReadInstruction::InclusiveOr(AddressingMode::Absolute))),
            0x0E => Some(Self::ReadModifyWrite(ModifyInstruction::ShiftLeft(
                AddressingMode::Absolute,
            ))),
            0x10 => Some(Self::Branch(BranchCondition::Positive)),
            0x11 => Some(Self::Read(ReadInstruction::InclusiveOr(AddressingMode::IndirectY))),
            0x15 => Some(Self::Read(ReadInstruction::InclusiveOr(AddressingMode::ZeroPageX))),
            0x16 => Some(Self::ReadModifyWrite(ModifyInstruction::ShiftLeft(
                AddressingMode::ZeroPageX,
            ))),
            0x18 => Some(Self::RegistersOnly(RegistersInstruction::ClearCarryFlag)),
            0x19 => Some(Self::Read(ReadInstruction::InclusiveOr(AddressingMode::AbsoluteY))),
            0x1D => Some(Self::Read(ReadInstruction::InclusiveOr(AddressingMode::AbsoluteX))),
            0x1E => Some(Self::ReadModifyWrite(ModifyInstruction::ShiftLeft(
                AddressingMode::AbsoluteX,
            ))),
            0x20 => Some(Self::JumpToSubroutine),
            0x21 => Some(Self::Read(ReadInstruction::And(AddressingMode::IndirectX))),
            0x24 => Some(Self::Read(ReadInstruction::BitTest(AddressingMode::ZeroPage))),
            0x25 => Some(Self::Read(ReadInstruction::And(AddressingMode::ZeroPage))),
            0x26 => Some(Self::ReadModifyWrite(ModifyInstruction::RotateLeft(
                AddressingMode::ZeroPage,
            ))),
            0x28 => Some(Self::PullStack(CpuRegister::P)),
            0x29 => Some(Self::Read(ReadInstruction::And(AddressingMode::Immediate))),
            0x2A => Some(Self::ReadModifyWrite(ModifyInstruction::RotateLeft(
                AddressingMode::Accumulator,
            ))),
            0x2C => Some(Self::Read(ReadInstruction::BitTest(AddressingMode::Absolute))),
            0x2D => Some(Self::Read(ReadInstruction::And(AddressingMode::Absolute))),
            0x2E => Some(Self::ReadModifyWrite(ModifyInstruction::RotateLeft(
                AddressingMode::Absolute,
            ))),
            0x30 => Some(Self::Branch(BranchCondition::Minus)),
            0x31 => Some(Self::Read(ReadInstruction::And(AddressingMode::IndirectY))),
            0x35 => Some(Self::Read(ReadInstruction::And(AddressingMode::ZeroPageX))),
            0x36 => Some(Self::ReadModifyWrite(ModifyInstruction::RotateLeft(
                AddressingMode::ZeroPageX,
            ))),
            0x38 => Some(Self::RegistersOnly(RegistersInstruction::SetCarryFlag)),
            0x39 => Some(Self::Read(ReadInstruction::And(AddressingMode::AbsoluteY))),
            0x3D => Some(Self::Read(ReadInstruction::And(AddressingMode::AbsoluteX))),
            0x3E => Some(Self::ReadModifyWrite(ModifyInstruction::RotateLeft(
                AddressingMode::AbsoluteX,
            ))),
            0x40 => Some(Self::ReturnFromInterrupt),
            0x41 => Some(Self::Read(ReadInstruction::ExclusiveOr(AddressingMode::IndirectX))),
            0x45 => Some(Self::Read(ReadInstruction::ExclusiveOr(AddressingMode::ZeroPage))),
            0x46 => Some(Self::ReadModifyWrite(ModifyInstruction::LogicalShiftRight(
                AddressingMode::ZeroPage,
            ))),
            0x48 => Some(Self::PushStack(CpuRegister::A)),
            0x49 => Some(Self::Read(ReadInstruction::ExclusiveOr(AddressingMode::Immediate))),
            0x4A => Some(Self::ReadModifyWrite(ModifyInstruction::LogicalShiftRight(
                AddressingMode::Accumulator,
            ))),
            0x4C => Some(Self::Jump(AddressingMode::Absolute)),
            0x4D => Some(Self::Read(ReadInstruction::ExclusiveOr(AddressingMode::Absolute))),
            0x4E => Some(Self::ReadModifyWrite(ModifyInstruction::LogicalShiftRight(
                AddressingMode::Absolute,
            ))),
            0x50 => Some(Self::Branch(BranchCondition::OverflowClear)),
            0x51 => Some(Self::Read(ReadInstruction::ExclusiveOr(AddressingMode::IndirectY))),
            0x55 => Some(Self::Read(ReadInstruction::ExclusiveOr(AddressingMode::ZeroPageX))),
            0x56 => Some(Self::ReadModifyWrite(ModifyInstruction::LogicalShiftRight(
                AddressingMode::ZeroPageX,
            ))),
            0x58 => Some(Self::RegistersOnly(RegistersInstruction::ClearInterruptDisable)),
            0x59 => Some(Self::Read(ReadInstruction::ExclusiveOr(AddressingMode::AbsoluteY))),
            0x5D => Some(Self::Read(ReadInstruction::ExclusiveOr(AddressingMode::AbsoluteX))),
            0x5E => Some(Self::ReadModifyWrite(ModifyInstruction::LogicalShiftRight(
                AddressingMode::AbsoluteX,
            ))),
            0x60 => Some(Self::ReturnFromSubroutine),
            0x61 => Some(Self::Read(ReadInstruction::AddWithCarry(AddressingMode::IndirectX))),
            0x65 => Some(Self::Read(ReadInstruction::AddWithCarry(AddressingMode::ZeroPage))),
            0x66 => Some(Self::ReadModifyWrite(ModifyInstruction::RotateRight(
                AddressingMode::ZeroPage,
            ))),
            0x68 => Some(Self::PullStack(CpuRegister::A)),
            0x69 => Some(Self::Read(ReadInstruction::AddWithCarry(AddressingMode::Immediate))),
            0x6A => Some(Self::ReadModifyWrite(ModifyInstruction::RotateRight(
                AddressingMode::Accumulator,
            ))),
            0x6C => Some(Self::Jump(AddressingMode::Indirect)),
            0x6D => Some(Self::Read(ReadInstruction::AddWithCarry(AddressingMode::Absolute))),
            0x6E => Some(Self::ReadModifyWrite(ModifyInstruction::RotateRight(
                AddressingMode::Absolute,
            ))),
            0x70 => Some(Self::Branch(BranchCondition::OverflowSet)),
            0x71 => Some(Self::Read(ReadInstruction::AddWithCarry(AddressingMode::IndirectY))),
            0x75 => Some(Self::Read(ReadInstruction::AddWithCarry(AddressingMode::ZeroPageX))),
            0x76 => Some(Self::ReadModifyWrite(ModifyInstruction::RotateRight(
                AddressingMode::ZeroPageX,
            ))),
            0x78 => Some(Self::RegistersOnly(RegistersInstruction::SetInterruptDisable)),
            0x79 => Some(Self::Read(ReadInstruction::AddWithCarry(AddressingMode::AbsoluteY))),
            0x7D => Some(Self::Read(ReadInstruction::AddWithCarry(AddressingMode::AbsoluteX))),
            0x7E => Some(Self::ReadModifyWrite(ModifyInstruction::RotateRight(
                AddressingMode::AbsoluteX,
            ))),
            0x81 => Some(Self::StoreRegister(CpuRegister::A, AddressingMode::IndirectX)),
            0x84 => Some(Self::StoreRegister(CpuRegister::Y, AddressingMode::ZeroPage)),
            0x85 => Some(Self::StoreRegister(CpuRegister::A, AddressingMode::ZeroPage)),
            0x86 => Some(Self::StoreRegister(CpuRegister::X, AddressingMode::ZeroPage)),
            0x88 => Some(Self::RegistersOnly(RegistersInstruction::DecrementRegister(
                CpuRegister::Y,
            ))),
            0x8A => Some(Self::RegistersOnly(RegistersInstruction::TransferBetweenRegisters {
                to: CpuRegister::A,
                from: CpuRegister::X,
            })),
            0x8C => Some(Self::StoreRegister(CpuRegister::Y, AddressingMode::Absolute)),
            0x8D => Some(Self::StoreRegister(CpuRegister::A, AddressingMode::Absolute)),
            0x8E => Some(Self::StoreRegister(CpuRegister::X, AddressingMode::Absolute)),
            0x90 => Some(Self::Branch(BranchCondition::CarryClear)),
            0x91 => Some(Self::StoreRegister(CpuRegister::A, AddressingMode::IndirectY)),
            0x94 => Some(Self::StoreRegister(CpuRegister::Y, AddressingMode::ZeroPageX)),
            0x95 => Some(Self::StoreRegister(CpuRegister::A, AddressingMode::ZeroPageX)),
            0x96 => Some(Self::StoreRegister(CpuRegister::X, AddressingMode::ZeroPageY)),
            0x98 => Some(Self::RegistersOnly(RegistersInstruction::TransferBetweenRegisters {
                to: CpuRegister::A,
                from: CpuRegister::Y,
            })),
            0x99 => Some(Self::StoreRegister(CpuRegister::A, AddressingMode::AbsoluteY)),
            0x9A => Some(Self::RegistersOnly(RegistersInstruction::TransferBetweenRegisters {
                to: CpuRegister::S,
                from: CpuRegister::X,
            })),
            0x9D => Some(Self::StoreRegister(CpuRegister::A, AddressingMode::AbsoluteX)),
            0xA0 => Some(Self::Read(ReadInstruction::LoadRegister(
                CpuRegister::Y,
                AddressingMode::Immediate,
            ))),
            0xA1 => Some(Self::Read(ReadInstruction::LoadRegister(
                CpuRegister::A,
                AddressingMode::IndirectX,
            ))),
            0xA2 => Some(Self::Read(ReadInstruction::LoadRegister(
                CpuRegister::X,
                AddressingMode::Immediate,
            ))),
            0xA4 => Some(Self::Read(ReadInstruction::LoadRegister(
                CpuRegister::Y,
                AddressingMode::ZeroPage,
            ))),
            0xA5 => Some(Self::Read(ReadInstruction::LoadRegister(
                CpuRegister::A,
                AddressingMode::ZeroPage,
            ))),
            0xA6 => Some(Self::Read(ReadInstruction::LoadRegister(
                CpuRegister::X,
                AddressingMode::ZeroPage,
            ))),
            0xA8 => Some(Self::RegistersOnly(RegistersInstruction::TransferBetweenRegisters {
                to: CpuRegister::Y,
                from: CpuRegister::A,
            })),
            0xA9 => Some(Self::Read(ReadInstruction::LoadRegister(
                CpuRegister::A,
                AddressingMode::Immediate,
            ))),
            0xAA => Some(Self::RegistersOnly(RegistersInstruction::TransferBetweenRegisters {
                to: CpuRegister::X,
                from: CpuRegister::A,
            })),
            0xAC => Some(Self::Read(ReadInstruction::LoadRegister(
                CpuRegister::Y,
                AddressingMode::Absolute,
            ))),
            0xAD => Some(Self::Read(ReadInstruction::LoadRegister(
                CpuRegister::A,
                AddressingMode::Absolute,
            ))),
            0xAE => Some(Self::Read(ReadInstruction::LoadRegister(
                CpuRegister::X,
                AddressingMode::Absolute,
            ))),
            0xB0 => Some(Self::Branch(BranchCondition::CarrySet)),
            0xB1 => Some(Self::Read(ReadInstruction::LoadRegister(
                CpuRegister::A,
                AddressingMode::IndirectY,
            ))),
            0xB4 => Some(Self::Read(ReadInstruction::LoadRegister(
                CpuRegister::Y,
                AddressingMode::ZeroPageX,
            ))),
            0xB5 => Some(Self::Read(ReadInstruction::LoadRegister(
                CpuRegister::A,
                AddressingMode::ZeroPageX,
            ))),
            0xB6 => Some(Self::Read(ReadInstruction::LoadRegister(
                CpuRegister::X,
                AddressingMode::ZeroPageY,
            ))),
            0xB8 => Some(Self::RegistersOnly(RegistersInstruction::ClearOverflowFlag)),
            0xB9 => Some(Self::Read(ReadInstruction::LoadRegister(
                CpuRegister::A,
                AddressingMode::AbsoluteY,
            ))),
            0xBA => Some(Self::RegistersOnly(RegistersInstruction::TransferBetweenRegisters {
                to: CpuRegister::X,
                from: CpuRegister::S,
            })),
            0xBC => Some(Self::Read(ReadInstruction::LoadRegister(
                CpuRegister::Y,
                AddressingMode::AbsoluteX,
            ))),
            0xBD => Some(Self::Read(ReadInstruction::LoadRegister(
                CpuRegister::A,
                AddressingMode::AbsoluteX,
            ))),
            0xBE => Some(Self::Read(ReadInstruction::LoadRegister(
                CpuRegister::X,
                AddressingMode::AbsoluteY,
            ))),
            0xC0 => Some(Self::Read(ReadInstruction::Compare(
                CpuRegister::Y,
                AddressingMode::Immediate,
            ))),
            0xC1 => Some(Self::Read(ReadInstruction::Compare(
                CpuRegister::A,
                AddressingMode::IndirectX,
            ))),
            0xC4 => Some(Self::Read(ReadInstruction::Compare(
                CpuRegister::Y,
                AddressingMode::ZeroPage,
            ))),
            0xC5 => Some(Self::Read(ReadInstruction::Compare(
                CpuRegister::A,
                AddressingMode::ZeroPage,
            ))),
            0xC6 => Some(Self::ReadModifyWrite(ModifyInstruction::DecrementMemory(
                AddressingMode::ZeroPage,
            ))),
            0xC8 => Some(Self::RegistersOnly(RegistersInstruction::IncrementRegister(
                CpuRegister::Y,
            ))),
            0xC9 => Some(Self::Read(ReadInstruction::Compare(
                CpuRegister::A,
                AddressingMode::Immediate,
            ))),
            0xCA => Some(Self::RegistersOnly(RegistersInstruction::DecrementRegister(
                CpuRegister::X,
            ))),
            0xCC => Some(Self::Read(ReadInstruction::Compare(
                CpuRegister::Y,
                AddressingMode::Absolute,
            ))),
            0xCD => Some(Self::Read(ReadInstruction::Compare(
                CpuRegister::A,
                AddressingMode::Absolute,
            ))),
            0xCE => Some(Self::ReadModifyWrite(ModifyInstruction::DecrementMemory(
                AddressingMode::Absolute,
            ))),
            0xD0 => Some(Self::Branch(BranchCondition::NotEqual)),
            0xD1 => Some(Self::Read(ReadInstruction::Compare(
                CpuRegister::A,
                AddressingMode::IndirectY,
            ))),
            0xD5 => Some(Self::Read(ReadInstruction::Compare(
                CpuRegister::A,
                AddressingMode::ZeroPageX,
            ))),
            0xD6 => Some(Self::ReadModifyWrite(ModifyInstruction::DecrementMemory(
                AddressingMode::ZeroPageX,
            ))),
            0xD8 => Some(Self::RegistersOnly(RegistersInstruction::ClearDecimalFlag)),
            0xD9 => Some(Self::Read(ReadInstruction::Compare(
                CpuRegister::A,
                AddressingMode::AbsoluteY,
            ))),
            0xDD => Some(Self::Read(ReadInstruction::Compare(
                CpuRegister::A,
                AddressingMode::AbsoluteX,
            ))),
            0xDE => Some(Self::ReadModifyWrite(ModifyInstruction::DecrementMemory(
                AddressingMode::AbsoluteX,
            ))),
            0xE0 => Some(Self::Read(ReadInstruction::Compare(
                CpuRegister::X,
                AddressingMode::Immediate,
            ))),
            0xE1 => Some(Self::Read(ReadInstruction::SubtractWithCarry(
                AddressingMode::IndirectX,
            ))),
            0xE4 => Some(Self::Read(ReadInstruction::Compare(
                CpuRegister::X,
                AddressingMode::ZeroPage,
            ))),
            0xE5 => Some(Self::Read(ReadInstruction::SubtractWithCarry(AddressingMode::ZeroPage))),
            0xE6 => Some(Self::ReadModifyWrite(ModifyInstruction::IncrementMemory(
                AddressingMode::ZeroPage,
            ))),
            0xE8 => Some(Self::RegistersOnly(RegistersInstruction::IncrementRegister(
                CpuRegister::X,
            ))),
            0xE9 => Some(Self::Read(ReadInstruction::SubtractWithCarry(AddressingMode::Immediate))),
            0xEA => Some(Self::RegistersOnly(RegistersInstruction::NoOp)),
            0xEC => Some(Self::Read(ReadInstruction::Compare(
                CpuRegister::X,
                AddressingMode::Absolute,
            ))),
            0xED => Some(Self::Read(ReadInstruction::SubtractWithCarry(AddressingMode::Absolute))),
            0xEE => Some(Self::ReadModifyWrite(ModifyInstruction::IncrementMemory(
                AddressingMode::Absolute,
            ))),
            0xF0 => Some(Self::Branch(BranchCondition::Equal)),
            0xF1 => Some(Self::Read(ReadInstruction::SubtractWithCarry(AddressingMode::IndirectY))),
            0xF5 => Some(Self::Read(ReadInstruction::SubtractWithCarry(AddressingMode::ZeroPageX))),
            0xF6 => Some(Self::ReadModifyWrite(ModifyInstruction::IncrementMemory(
                AddressingMode::ZeroPageX,
            ))),
            0xF8 => Some(Self::RegistersOnly(RegistersInstruction::SetDecimalFlag)),
            0xF9 => Some(Self::Read(ReadInstruction::SubtractWithCarry(AddressingMode::AbsoluteY))),
            0xFD => Some(Self::Read(ReadInstruction::SubtractWithCarry(AddressingMode::AbsoluteX))),
            0xFE => Some(Self::ReadModifyWrite(ModifyInstruction::IncrementMemory(
                AddressingMode::AbsoluteX,
            ))),
            _ => None,
        }
    }
}

/// Execute the instruction whose opcode byte was just fetched, returning cycles consumed.
pub(super) fn execute<B: BusInterface>(cpu: &mut CpuState, bus: &mut B, opcode: u8) -> u32 {
    match Instruction::from_opcode(opcode) {
        Some(instruction) => execute_instruction(cpu, bus, instruction),
        None => execute_unofficial_nop(cpu, bus, opcode),
    }
}

fn execute_instruction<B: BusInterface>(
    cpu: &mut CpuState,
    bus: &mut B,
    instruction: Instruction,
) -> u32 {
    match instruction {
        Instruction::Read(read) => {
            let (operand, cycles) = read_operand(cpu, bus, read.addressing_mode());
            execute_read(cpu, read, operand);
            cycles
        }
        Instruction::ReadModifyWrite(modify) => match modify.addressing_mode() {
            AddressingMode::Accumulator => {
                let value = apply_modify(cpu, modify, cpu.registers.accumulator);
                cpu.registers.accumulator = value;
                2
            }
            addressing_mode => {
                let (address, cycles) = modify_address(cpu, bus, addressing_mode);
                let value = bus.read(address);
                let modified = apply_modify(cpu, modify, value);
                bus.write(address, modified);
                cycles
            }
        },
        Instruction::RegistersOnly(registers_op) => {
            execute_registers_only(cpu, registers_op);
            2
        }
        Instruction::Branch(condition) => execute_branch(cpu, bus, condition),
        Instruction::StoreRegister(register, addressing_mode) => {
            let value = read_register(&cpu.registers, register);
            let (address, cycles) = store_address(cpu, bus, addressing_mode);
            bus.write(address, value);
            cycles
        }
        Instruction::ForceInterrupt => execute_brk(cpu, bus),
        Instruction::Jump(AddressingMode::Absolute) => {
            cpu.registers.pc = fetch_operand_u16(cpu, bus);
            3
        }
        Instruction::Jump(_) => {
            // JMP ($xxFF) wraps within the page when reading the pointer MSB
            let pointer = fetch_operand_u16(cpu, bus);
            let lsb = bus.read(pointer);
            let msb_address = (pointer & 0xFF00) | u16::from((pointer as u8).wrapping_add(1));
            let msb = bus.read(msb_address);
            cpu.registers.pc = u16::from_le_bytes([lsb, msb]);
            5
        }
        Instruction::JumpToSubroutine => {
            let target = fetch_operand_u16(cpu, bus);
            let return_address = cpu.registers.pc.wrapping_sub(1);
            let [return_lsb, return_msb] = return_address.to_le_bytes();
            cpu.push_stack(bus, return_msb);
            cpu.push_stack(bus, return_lsb);
            cpu.registers.pc = target;
            6
        }
        Instruction::PushStack(register) => {
            let value = match register {
                CpuRegister::P => cpu.registers.status.to_byte(StatusReadContext::PushStack),
                _ => read_register(&cpu.registers, register),
            };
            cpu.push_stack(bus, value);
            3
        }
        Instruction::PullStack(register) => {
            let value = cpu.pull_stack(bus);
            match register {
                CpuRegister::P => {
                    cpu.registers.status = crate::cpu::StatusFlags::from_byte(value);
                }
                _ => {
                    cpu.registers.accumulator = value;
                    cpu.registers.status.set_zero(value == 0).set_negative(value.bit(7));
                }
            }
            4
        }
        Instruction::ReturnFromInterrupt => {
            let status = cpu.pull_stack(bus);
            cpu.registers.status = crate::cpu::StatusFlags::from_byte(status);
            let pc_lsb = cpu.pull_stack(bus);
            let pc_msb = cpu.pull_stack(bus);
            cpu.registers.pc = u16::from_le_bytes([pc_lsb, pc_msb]);
            6
        }
        Instruction::ReturnFromSubroutine => {
            let pc_lsb = cpu.pull_stack(bus);
            let pc_msb = cpu.pull_stack(bus);
            cpu.registers.pc = u16::from_le_bytes([pc_lsb, pc_msb]).wrapping_add(1);
            6
        }
    }
}

fn execute_read(cpu: &mut CpuState, instruction: ReadInstruction, operand: u8) {
    match instruction {
        ReadInstruction::AddWithCarry(..) => add(cpu, operand),
        ReadInstruction::SubtractWithCarry(..) => add(cpu, !operand),
        ReadInstruction::And(..) => {
            let value = cpu.registers.accumulator & operand;
            cpu.registers.accumulator = value;
            cpu.registers.status.set_zero(value == 0).set_negative(value.bit(7));
        }
        ReadInstruction::InclusiveOr(..) => {
            let value = cpu.registers.accumulator | operand;
            cpu.registers.accumulator = value;
            cpu.registers.status.set_zero(value == 0).set_negative(value.bit(7));
        }
        ReadInstruction::ExclusiveOr(..) => {
            let value = cpu.registers.accumulator ^ operand;
            cpu.registers.accumulator = value;
            cpu.registers.status.set_zero(value == 0).set_negative(value.bit(7));
        }
        ReadInstruction::BitTest(..) => {
            cpu.registers.status.overflow = operand.bit(6);
            cpu.registers.status.negative = operand.bit(7);
            cpu.registers.status.zero = cpu.registers.accumulator & operand == 0;
        }
        ReadInstruction::Compare(register, ..) => {
            let register_value = read_register(&cpu.registers, register);
            let difference = register_value.wrapping_sub(operand);
            cpu.registers.status.carry = register_value >= operand;
            cpu.registers.status.set_zero(difference == 0).set_negative(difference.bit(7));
        }
        ReadInstruction::LoadRegister(register, ..) => {
            write_register(&mut cpu.registers, register, operand);
            cpu.registers.status.set_zero(operand == 0).set_negative(operand.bit(7));
        }
    }
}

// The 2A03 ignores the decimal flag; addition is always binary
fn add(cpu: &mut CpuState, operand: u8) {
    let accumulator = cpu.registers.accumulator;
    let carry = u8::from(cpu.registers.status.carry);

    let (partial_sum, carry1) = accumulator.overflowing_add(operand);
    let (sum, carry2) = partial_sum.overflowing_add(carry);

    cpu.registers.status.carry = carry1 || carry2;
    cpu.registers.status.overflow = (accumulator ^ sum) & (operand ^ sum) & 0x80 != 0;
    cpu.registers.status.set_zero(sum == 0).set_negative(sum.bit(7));

    cpu.registers.accumulator = sum;
}

fn apply_modify(cpu: &mut CpuState, instruction: ModifyInstruction, value: u8) -> u8 {
    let modified = match instruction {
        ModifyInstruction::ShiftLeft(..) => {
            cpu.registers.status.carry = value.bit(7);
            value << 1
        }
        ModifyInstruction::LogicalShiftRight(..) => {
            cpu.registers.status.carry = value.bit(0);
            value >> 1
        }
        ModifyInstruction::RotateLeft(..) => {
            let carry_in = u8::from(cpu.registers.status.carry);
            cpu.registers.status.carry = value.bit(7);
            (value << 1) | carry_in
        }
        ModifyInstruction::RotateRight(..) => {
            let carry_in = u8::from(cpu.registers.status.carry);
            cpu.registers.status.carry = value.bit(0);
            (value >> 1) | (carry_in << 7)
        }
        ModifyInstruction::IncrementMemory(..) => value.wrapping_add(1),
        ModifyInstruction::DecrementMemory(..) => value.wrapping_sub(1),
    };

    cpu.registers.status.set_zero(modified == 0).set_negative(modified.bit(7));

    modified
}

fn execute_registers_only(cpu: &mut CpuState, instruction: RegistersInstruction) {
    match instruction {
        RegistersInstruction::ClearCarryFlag => {
            cpu.registers.status.carry = false;
        }
        RegistersInstruction::SetCarryFlag => {
            cpu.registers.status.carry = true;
        }
        RegistersInstruction::ClearDecimalFlag => {
            cpu.registers.status.decimal = false;
        }
        RegistersInstruction::SetDecimalFlag => {
            cpu.registers.status.decimal = true;
        }
        RegistersInstruction::ClearInterruptDisable => {
            cpu.registers.status.interrupt_disable = false;
        }
        RegistersInstruction::SetInterruptDisable => {
            cpu.registers.status.interrupt_disable = true;
        }
        RegistersInstruction::ClearOverflowFlag => {
            cpu.registers.status.overflow = false;
        }
        RegistersInstruction::IncrementRegister(register) => {
            let value = read_register(&cpu.registers, register).wrapping_add(1);
            write_register(&mut cpu.registers, register, value);
            cpu.registers.status.set_zero(value == 0).set_negative(value.bit(7));
        }
        RegistersInstruction::DecrementRegister(register) => {
            let value = read_register(&cpu.registers, register).wrapping_sub(1);
            write_register(&mut cpu.registers, register, value);
            cpu.registers.status.set_zero(value == 0).set_negative(value.bit(7));
        }
        RegistersInstruction::TransferBetweenRegisters { to, from } => {
            let value = read_register(&cpu.registers, from);
            write_register(&mut cpu.registers, to, value);
            // TXS does not modify flags
            if to != CpuRegister::S {
                cpu.registers.status.set_zero(value == 0).set_negative(value.bit(7));
            }
        }
        RegistersInstruction::NoOp => {}
    }
}

fn execute_branch<B: BusInterface>(
    cpu: &mut CpuState,
    bus: &mut B,
    condition: BranchCondition,
) -> u32 {
    let offset = fetch_operand(cpu, bus) as i8;
    if !condition.check(&cpu.registers) {
        return 2;
    }

    let pc = cpu.registers.pc;
    let target = pc.wrapping_add(offset as u16);
    cpu.registers.pc = target;

    3 + u32::from(page_crossed(pc, target))
}

fn execute_brk<B: BusInterface>(cpu: &mut CpuState, bus: &mut B) -> u32 {
    // BRK skips the byte following the opcode
    let return_address = cpu.registers.pc.wrapping_add(1);
    let [return_lsb, return_msb] = return_address.to_le_bytes();
    cpu.push_stack(bus, return_msb);
    cpu.push_stack(bus, return_lsb);
    cpu.push_stack(bus, cpu.registers.status.to_byte(StatusReadContext::Brk));

    cpu.registers.status.interrupt_disable = true;

    let vector_lsb = bus.read(IRQ_VECTOR);
    let vector_msb = bus.read(IRQ_VECTOR + 1);
    cpu.registers.pc = u16::from_le_bytes([vector_lsb, vector_msb]);

    7
}

// Unofficial opcodes execute as NOPs with the operand size and base timing implied by their
// position in the opcode grid; the dummy operand read still goes over the bus so that any
// read side effects are observed.
fn execute_unofficial_nop<B: BusInterface>(cpu: &mut CpuState, bus: &mut B, opcode: u8) -> u32 {
    match unofficial_addressing_mode(opcode) {
        AddressingMode::Implied => 2,
        addressing_mode => read_operand(cpu, bus, addressing_mode).1,
    }
}

fn unofficial_addressing_mode(opcode: u8) -> AddressingMode {
    // The KIL opcodes take no operand; execute them as 1-byte NOPs instead of jamming
    if opcode & 0x1F == 0x12 || matches!(opcode, 0x02 | 0x22 | 0x42 | 0x62) {
        return AddressingMode::Implied;
    }

    match ((opcode >> 2) & 0x07, opcode & 0x03) {
        (0, 1 | 3) => AddressingMode::IndirectX,
        (0, _) => AddressingMode::Immediate,
        (1, _) => AddressingMode::ZeroPage,
        (2, 1 | 3) => AddressingMode::Immediate,
        (2, _) => AddressingMode::Implied,
        (3, _) => AddressingMode::Absolute,
        (4, _) => AddressingMode::IndirectY,
        (5, _) => AddressingMode::ZeroPageX,
        (6, 1 | 3) => AddressingMode::AbsoluteY,
        (6, _) => AddressingMode::Implied,
        (7, _) => AddressingMode::AbsoluteX,
        _ => unreachable!("(opcode >> 2) & 0x07 is always <= 7"),
    }
}

fn read_register(registers: &CpuRegisters, register: CpuRegister) -> u8 {
    match register {
        CpuRegister::A => registers.accumulator,
        CpuRegister::X => registers.x,
        CpuRegister::Y => registers.y,
        CpuRegister::S => registers.sp,
        CpuRegister::P => registers.status.to_byte(StatusReadContext::PushStack),
    }
}

fn write_register(registers: &mut CpuRegisters, register: CpuRegister, value: u8) {
    match register {
        CpuRegister::A => {
            registers.accumulator = value;
        }
        CpuRegister::X => {
            registers.x = value;
        }
        CpuRegister::Y => {
            registers.y = value;
        }
        CpuRegister::S => {
            registers.sp = value;
        }
        CpuRegister::P => {
            registers.status = crate::cpu::StatusFlags::from_byte(value);
        }
    }
}

fn fetch_operand<B: BusInterface>(cpu: &mut CpuState, bus: &mut B) -> u8 {
    let operand = bus.read(cpu.registers.pc);
    cpu.registers.pc = cpu.registers.pc.wrapping_add(1);
    operand
}

fn fetch_operand_u16<B: BusInterface>(cpu: &mut CpuState, bus: &mut B) -> u16 {
    let lsb = fetch_operand(cpu, bus);
    let msb = fetch_operand(cpu, bus);
    u16::from_le_bytes([lsb, msb])
}

fn read_zero_page_u16<B: BusInterface>(bus: &mut B, address: u8) -> u16 {
    let lsb = bus.read(u16::from(address));
    let msb = bus.read(u16::from(address.wrapping_add(1)));
    u16::from_le_bytes([lsb, msb])
}

fn page_crossed(base: u16, indexed: u16) -> bool {
    base & 0xFF00 != indexed & 0xFF00
}

/// Resolve a read operand, returning the value and the instruction's cycle count including any
/// page-crossing penalty.
fn read_operand<B: BusInterface>(
    cpu: &mut CpuState,
    bus: &mut B,
    addressing_mode: AddressingMode,
) -> (u8, u32) {
    match addressing_mode {
        AddressingMode::Immediate => (fetch_operand(cpu, bus), 2),
        AddressingMode::ZeroPage => {
            let address = u16::from(fetch_operand(cpu, bus));
            (bus.read(address), 3)
        }
        AddressingMode::ZeroPageX => {
            let address = u16::from(fetch_operand(cpu, bus).wrapping_add(cpu.registers.x));
            (bus.read(address), 4)
        }
        AddressingMode::ZeroPageY => {
            let address = u16::from(fetch_operand(cpu, bus).wrapping_add(cpu.registers.y));
            (bus.read(address), 4)
        }
        AddressingMode::Absolute => {
            let address = fetch_operand_u16(cpu, bus);
            (bus.read(address), 4)
        }
        AddressingMode::AbsoluteX => indexed_read(cpu, bus, cpu.registers.x),
        AddressingMode::AbsoluteY => indexed_read(cpu, bus, cpu.registers.y),
        AddressingMode::IndirectX => {
            let zero_page_address = fetch_operand(cpu, bus).wrapping_add(cpu.registers.x);
            let address = read_zero_page_u16(bus, zero_page_address);
            (bus.read(address), 6)
        }
        AddressingMode::IndirectY => {
            let zero_page_address = fetch_operand(cpu, bus);
            let base = read_zero_page_u16(bus, zero_page_address);
            let address = base.wrapping_add(u16::from(cpu.registers.y));
            (bus.read(address), 5 + u32::from(page_crossed(base, address)))
        }
        AddressingMode::Accumulator | AddressingMode::Implied | AddressingMode::Indirect => {
            panic!("not a read operand addressing mode: {addressing_mode:?}")
        }
    }
}

fn indexed_read<B: BusInterface>(cpu: &mut CpuState, bus: &mut B, index: u8) -> (u8, u32) {
    let base = fetch_operand_u16(cpu, bus);
    let address = base.wrapping_add(u16::from(index));
    (bus.read(address), 4 + u32::from(page_crossed(base, address)))
}

/// Resolve a store target address. Indexed stores always pay the fix-up cycle regardless of
/// page crossing.
fn store_address<B: BusInterface>(
    cpu: &mut CpuState,
    bus: &mut B,
    addressing_mode: AddressingMode,
) -> (u16, u32) {
    match addressing_mode {
        AddressingMode::ZeroPage => (u16::from(fetch_operand(cpu, bus)), 3),
        AddressingMode::ZeroPageX => {
            (u16::from(fetch_operand(cpu, bus).wrapping_add(cpu.registers.x)), 4)
        }
        AddressingMode::ZeroPageY => {
            (u16::from(fetch_operand(cpu, bus).wrapping_add(cpu.registers.y)), 4)
        }
        AddressingMode::Absolute => (fetch_operand_u16(cpu, bus), 4),
        AddressingMode::AbsoluteX => {
            (fetch_operand_u16(cpu, bus).wrapping_add(u16::from(cpu.registers.x)), 5)
        }
        AddressingMode::AbsoluteY => {
            (fetch_operand_u16(cpu, bus).wrapping_add(u16::from(cpu.registers.y)), 5)
        }
        AddressingMode::IndirectX => {
            let zero_page_address = fetch_operand(cpu, bus).wrapping_add(cpu.registers.x);
            (read_zero_page_u16(bus, zero_page_address), 6)
        }
        AddressingMode::IndirectY => {
            let zero_page_address = fetch_operand(cpu, bus);
            let base = read_zero_page_u16(bus, zero_page_address);
            (base.wrapping_add(u16::from(cpu.registers.y)), 6)
        }
        AddressingMode::Accumulator
        | AddressingMode::Immediate
        | AddressingMode::Implied
        | AddressingMode::Indirect => {
            panic!("not a store addressing mode: {addressing_mode:?}")
        }
    }
}

/// Resolve a read-modify-write target address and fixed cycle count.
fn modify_address<B: BusInterface>(
    cpu: &mut CpuState,
    bus: &mut B,
    addressing_mode: AddressingMode,
) -> (u16, u32) {
    match addressing_mode {
        AddressingMode::ZeroPage => (u16::from(fetch_operand(cpu, bus)), 5),
        AddressingMode::ZeroPageX => {
            (u16::from(fetch_operand(cpu, bus).wrapping_add(cpu.registers.x)), 6)
        }
        AddressingMode::Absolute => (fetch_operand_u16(cpu, bus), 6),
        AddressingMode::AbsoluteX => {
            (fetch_operand_u16(cpu, bus).wrapping_add(u16::from(cpu.registers.x)), 7)
        }
        _ => panic!("not a read-modify-write addressing mode: {addressing_mode:?}"),
    }
}
