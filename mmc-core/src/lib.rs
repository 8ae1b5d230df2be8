//! The NES cartridge mapper (MMC) subsystem together with the 6502 CPU core that drives it.
//!
//! The crate owns the instruction execution engine, the cartridge-range bus dispatch, the
//! mapper registry, and the per-board bank-switch/IRQ state machines. Video rendering, sound
//! synthesis, ROM file parsing, and persistence are external collaborators reached only
//! through the interfaces on [`Emulator`].

#![forbid(unsafe_code)]

mod api;
mod bus;
mod cpu;
mod num;

pub use api::{CartridgeData, CartridgeError, Emulator, MapperSupport};
pub use bus::cartridge::{mapper_descriptor, MapperDescriptor, NametableMirroring, MAPPER_TABLE};
pub use cpu::{BusInterface, CpuRegisters, CpuState, StatusFlags, StatusReadContext};
