//! The public machine API: cartridge load input, the `Emulator` type, and the interrupt
//! entry points used by the external video/IO subsystems.

use crate::bus::cartridge::{self, NametableMirroring};
use crate::bus::Bus;
use crate::cpu::CpuState;
use bincode::{Decode, Encode};
use thiserror::Error;

/// Cartridge contents as supplied by an external ROM loader. This crate does no file-format
/// parsing; the loader is responsible for splitting out the ROM buffers and header fields.
#[derive(Debug, Clone)]
pub struct CartridgeData {
    pub prg_rom: Vec<u8>,
    pub chr_rom: Vec<u8>,
    pub prg_ram_len: u32,
    pub chr_ram_len: u32,
    pub mapper_number: u16,
    pub sub_mapper_number: u8,
    pub nametable_mirroring: NametableMirroring,
    pub has_battery: bool,
}

#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("cartridge contains no PRG ROM")]
    NoPrgRom,
    #[error("{memory} size {size} is not a power of two")]
    NonPowerOfTwoSize { memory: &'static str, size: u32 },
}

/// Whether the loaded cartridge's mapper number is actually implemented, or whether the
/// machine was created with the open-bus placeholder board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapperSupport {
    Supported,
    Unsupported(u16),
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Emulator {
    cpu: CpuState,
    bus: Bus,
    external_irq: bool,
}

impl Emulator {
    /// Creates a machine out of the given cartridge. An unrecognized mapper number is not an
    /// error; the machine degrades to the placeholder board and reports it through
    /// [`Emulator::mapper_support`].
    pub fn create(cartridge_data: CartridgeData) -> Result<Emulator, CartridgeError> {
        validate_sizes(&cartridge_data)?;

        let mapper = cartridge::new_mapper(cartridge_data);
        let mut bus = Bus::new(mapper);
        let cpu = CpuState::new(&mut bus);

        Ok(Self { cpu, bus, external_irq: false })
    }

    /// Resets the CPU (through the $FFFC vector) and restores the mapper's power-on register
    /// state. RAM contents are preserved, as on the actual console's reset button.
    pub fn reset(&mut self) {
        self.bus.mapper_mut().reset();
        self.cpu.reset(&mut self.bus);
        self.external_irq = false;
        self.sync_irq_line();
    }

    /// Runs whole CPU instructions until at least `cycle_budget` cycles have elapsed.
    ///
    /// The mapper's CPU-cycle IRQ counters are clocked and the CPU IRQ line re-sampled after
    /// every instruction; the line is level-triggered, so an acknowledge write inside the
    /// slice must deassert it before the next instruction boundary.
    ///
    /// Returns the number of cycles run, which can overshoot the budget by up to one
    /// instruction.
    pub fn run_cycles(&mut self, cycle_budget: u32) -> u32 {
        let mut cycles = 0;
        while cycles < cycle_budget {
            let instruction_cycles = self.cpu.step(&mut self.bus);
            self.bus.mapper_mut().tick_cpu(instruction_cycles);
            self.sync_irq_line();
            cycles += instruction_cycles;
        }
        cycles
    }

    /// Per-scanline callback from the video subsystem; drives the MMC3/MMC5 scanline IRQ
    /// counters.
    pub fn scanline(&mut self, scanline: u16, in_vblank: bool, rendering_enabled: bool) {
        self.bus.mapper_mut().scanline(scanline, in_vblank, rendering_enabled);
        self.sync_irq_line();
    }

    /// Asserts an IRQ from a source outside the cartridge (e.g. the APU frame counter). The
    /// CPU IRQ line stays asserted until [`Emulator::clear_irq`].
    pub fn assert_irq(&mut self) {
        self.external_irq = true;
        self.sync_irq_line();
    }

    pub fn clear_irq(&mut self) {
        self.external_irq = false;
        self.sync_irq_line();
    }

    /// Asserts the NMI line. The CPU latches NMIs on the line's low-to-high transition, so
    /// the line must be released via [`Emulator::set_nmi_line`] before the next NMI.
    pub fn assert_nmi(&mut self) {
        self.cpu.set_nmi_line(true);
    }

    pub fn set_nmi_line(&mut self, asserted: bool) {
        self.cpu.set_nmi_line(asserted);
    }

    /// PPU bus read in $0000-$3EFF through the active mapper's CHR banking and nametable
    /// mirroring.
    pub fn ppu_read(&mut self, address: u16) -> u8 {
        self.bus.ppu_read(address)
    }

    pub fn ppu_write(&mut self, address: u16, value: u8) {
        self.bus.ppu_write(address, value);
    }

    pub fn mapper_support(&self) -> MapperSupport {
        match self.bus.mapper().unsupported_mapper_number() {
            Some(mapper_number) => MapperSupport::Unsupported(mapper_number),
            None => MapperSupport::Supported,
        }
    }

    pub fn mapper_name(&self) -> &'static str {
        self.bus.mapper().name()
    }

    /// Battery-backed PRG RAM contents, for an external save-file writer.
    pub fn prg_ram(&self) -> &[u8] {
        self.bus.mapper().get_prg_ram()
    }

    /// Whether battery-backed PRG RAM has been written since the last call.
    pub fn get_and_clear_prg_ram_dirty_bit(&mut self) -> bool {
        self.bus.mapper_mut().get_and_clear_ram_dirty_bit()
    }

    fn sync_irq_line(&mut self) {
        self.cpu.set_irq_line(self.bus.mapper().interrupt_flag() || self.external_irq);
    }
}

fn validate_sizes(cartridge_data: &CartridgeData) -> Result<(), CartridgeError> {
    if cartridge_data.prg_rom.is_empty() {
        return Err(CartridgeError::NoPrgRom);
    }

    // the cartridge accessors mask with len - 1, which only wraps correctly for power-of-two
    // sizes
    for (memory, size) in [
        ("PRG ROM", cartridge_data.prg_rom.len() as u32),
        ("CHR ROM", cartridge_data.chr_rom.len() as u32),
        ("PRG RAM", cartridge_data.prg_ram_len),
        ("CHR RAM", cartridge_data.chr_ram_len),
    ] {
        if size != 0 && !size.is_power_of_two() {
            return Err(CartridgeError::NonPowerOfTwoSize { memory, size });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::BusInterface;

    fn cartridge_data(mapper_number: u16, prg_rom: Vec<u8>) -> CartridgeData {
        CartridgeData {
            prg_rom,
            chr_rom: Vec::new(),
            prg_ram_len: 0x2000,
            chr_ram_len: 0x2000,
            mapper_number,
            sub_mapper_number: 0,
            nametable_mirroring: NametableMirroring::Vertical,
            has_battery: false,
        }
    }

    #[test]
    fn create_rejects_structurally_invalid_cartridges() {
        assert!(matches!(
            Emulator::create(cartridge_data(0, Vec::new())),
            Err(CartridgeError::NoPrgRom)
        ));

        assert!(matches!(
            Emulator::create(cartridge_data(0, vec![0; 0x6000])),
            Err(CartridgeError::NonPowerOfTwoSize { memory: "PRG ROM", size: 0x6000 })
        ));

        let mut data = cartridge_data(0, vec![0; 0x8000]);
        data.chr_ram_len = 0x1800;
        assert!(matches!(
            Emulator::create(data),
            Err(CartridgeError::NonPowerOfTwoSize { memory: "CHR RAM", size: 0x1800 })
        ));
    }

    #[test]
    fn unsupported_mapper_degrades_instead_of_failing() {
        let mut emulator =
            Emulator::create(cartridge_data(229, vec![0; 0x8000])).expect("create should succeed");

        assert_eq!(emulator.mapper_support(), MapperSupport::Unsupported(229));
        assert_eq!(emulator.mapper_name(), "Unsupported");
        // distinct from a real NROM cartridge
        let nrom = Emulator::create(cartridge_data(0, vec![0; 0x8000])).unwrap();
        assert_eq!(nrom.mapper_support(), MapperSupport::Supported);

        // PRG space reads open bus, writes are swallowed
        assert_eq!(emulator.bus.read(0x9234), 0x92);
        emulator.bus.write(0x8000, 0xFF);
        assert_eq!(emulator.bus.read(0x8000), 0x80);
    }

    #[test]
    fn mmc1_prg_bank_switch_end_to_end() {
        let mut prg_rom = vec![0; 2 * 0x4000];
        prg_rom[0x0000] = 0x11;
        prg_rom[0x4000] = 0x22;
        let mut emulator = Emulator::create(cartridge_data(1, prg_rom)).unwrap();

        // power-on: first chunk switchable at $8000, last chunk fixed at $C000
        assert_eq!(emulator.bus.read(0x8000), 0x11);
        assert_eq!(emulator.bus.read(0xC000), 0x22);

        // select PRG bank 1 through the serial port, LSB first
        for value in [0x01, 0x00, 0x00, 0x00, 0x00] {
            emulator.bus.write(0xE000, value);
        }
        assert_eq!(emulator.bus.read(0x8000), 0x22);
        assert_eq!(emulator.bus.read(0xC000), 0x22);
    }

    #[test]
    fn run_cycles_executes_from_the_reset_vector() {
        // LDA #$42 / STA $0000 / JMP $8004 (spin)
        let program = [0xA9, 0x42, 0x85, 0x00, 0x4C, 0x04, 0x80];
        let mut prg_rom = vec![0; 0x8000];
        prg_rom[..program.len()].copy_from_slice(&program);
        // reset vector -> $8000
        prg_rom[0x7FFC] = 0x00;
        prg_rom[0x7FFD] = 0x80;

        let mut emulator = Emulator::create(cartridge_data(0, prg_rom)).unwrap();

        let cycles = emulator.run_cycles(20);
        assert!(cycles >= 20);
        assert_eq!(emulator.bus.read(0x0000), 0x42);
    }

    #[test]
    fn mapper_irq_acknowledge_takes_effect_mid_slice() {
        // main: latch 0 into the MMC3 IRQ counter, reload, enable IRQs, CLI, spin
        let main = [
            0xA9, 0x00, 0x8D, 0x00, 0xC0, 0x8D, 0x01, 0xC0, 0x8D, 0x01, 0xE0, 0x58, 0x4C, 0x0C,
            0x80,
        ];
        // handler: INC $00 / STA $E000 (acknowledge and disable) / RTI
        let handler = [0xE6, 0x00, 0x8D, 0x00, 0xE0, 0x40];
        let mut prg_rom = vec![0; 0x8000];
        prg_rom[..main.len()].copy_from_slice(&main);
        prg_rom[0x0090..0x0090 + handler.len()].copy_from_slice(&handler);
        // reset vector -> $8000, IRQ vector -> $8090
        prg_rom[0x7FFC] = 0x00;
        prg_rom[0x7FFD] = 0x80;
        prg_rom[0x7FFE] = 0x90;
        prg_rom[0x7FFF] = 0x80;

        let mut emulator = Emulator::create(cartridge_data(4, prg_rom)).unwrap();

        // reach the spin loop with IRQs enabled, then clock the scanline counter once
        emulator.run_cycles(40);
        emulator.scanline(0, false, true);
        assert!(emulator.bus.mapper().interrupt_flag());

        emulator.run_cycles(200);

        // the handler's $E000 write deasserts the line mid-slice; it must run exactly once
        assert_eq!(emulator.bus.read(0x0000), 0x01);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut emulator = Emulator::create(cartridge_data(1, vec![0; 0x8000])).unwrap();
        emulator.bus.write(0xE000, 0x01);
        emulator.assert_irq();

        emulator.reset();
        let first = bincode::encode_to_vec(&emulator, bincode::config::standard()).unwrap();
        emulator.reset();
        let second = bincode::encode_to_vec(&emulator, bincode::config::standard()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn prg_ram_round_trips_through_the_persistence_interface() {
        let mut data = cartridge_data(0, vec![0; 0x8000]);
        data.has_battery = true;
        let mut emulator = Emulator::create(data).unwrap();

        emulator.bus.write(0x6010, 0x5C);
        assert!(emulator.get_and_clear_prg_ram_dirty_bit());
        assert_eq!(emulator.prg_ram()[0x10], 0x5C);
        assert!(!emulator.get_and_clear_prg_ram_dirty_bit());
    }
}
