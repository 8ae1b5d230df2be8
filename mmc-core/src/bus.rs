//! CPU address-space routing between internal RAM and the active cartridge mapper.

pub(crate) mod cartridge;

use crate::cpu::BusInterface;
use bincode::{Decode, Encode};
use cartridge::Mapper;

/// Approximation of CPU open bus: the last value on the bus is usually the high byte of the
/// address just driven onto it.
pub(crate) fn cpu_open_bus(address: u16) -> u8 {
    (address >> 8) as u8
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Bus {
    cpu_ram: [u8; 2048],
    vram: [u8; 2048],
    mapper: Mapper,
    logged_unhandled_read: bool,
    logged_unhandled_write: bool,
}

impl Bus {
    pub(crate) fn new(mapper: Mapper) -> Self {
        Self {
            cpu_ram: [0; 2048],
            vram: [0; 2048],
            mapper,
            logged_unhandled_read: false,
            logged_unhandled_write: false,
        }
    }

    pub(crate) fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    pub(crate) fn mapper_mut(&mut self) -> &mut Mapper {
        &mut self.mapper
    }

    /// PPU bus read in $0000-$3EFF: pattern tables through the mapper's CHR banking,
    /// nametables through the mapper's mirroring. Palette RAM lives in the PPU, not here.
    pub(crate) fn ppu_read(&mut self, address: u16) -> u8 {
        let address = ppu_bus_address(address);
        self.mapper.read_ppu_address(address, &self.vram)
    }

    pub(crate) fn ppu_write(&mut self, address: u16, value: u8) {
        let address = ppu_bus_address(address);
        self.mapper.write_ppu_address(address, value, &mut self.vram);
    }

    fn unhandled_read(&mut self, address: u16) -> u8 {
        if !self.logged_unhandled_read {
            log::warn!(
                "CPU read from {address:04X} not handled by mapper {}; this and any further unhandled reads return open bus",
                self.mapper.name()
            );
            self.logged_unhandled_read = true;
        }
        cpu_open_bus(address)
    }

    fn unhandled_write(&mut self, address: u16, value: u8) {
        if !self.logged_unhandled_write {
            log::warn!(
                "CPU write of {value:02X} to {address:04X} not handled by mapper {}; this and any further unhandled writes are ignored",
                self.mapper.name()
            );
            self.logged_unhandled_write = true;
        }
    }
}

/// Accesses in the palette range read the underlying nametable address.
fn ppu_bus_address(address: u16) -> u16 {
    let address = address & 0x3FFF;
    if address >= 0x3F00 { address - 0x1000 } else { address }
}

impl BusInterface for Bus {
    fn read(&mut self, address: u16) -> u8 {
        match address {
            0x0000..=0x1FFF => self.cpu_ram[(address & 0x07FF) as usize],
            // PPU/APU/IO registers are handled outside of this crate
            0x2000..=0x401F => cpu_open_bus(address),
            0x4020..=0x5FFF => match self.mapper.low_read(address) {
                Some(value) => value,
                None => self.unhandled_read(address),
            },
            0x6000..=0x7FFF => match self.mapper.mid_read(address) {
                Some(value) => value,
                None => self.unhandled_read(address),
            },
            0x8000..=0xFFFF => self.mapper.high_read(address),
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            0x0000..=0x1FFF => {
                self.cpu_ram[(address & 0x07FF) as usize] = value;
            }
            0x2000..=0x401F => {}
            0x4020..=0x5FFF => {
                if !self.mapper.low_write(address, value) {
                    self.unhandled_write(address, value);
                }
            }
            0x6000..=0x7FFF => {
                if !self.mapper.mid_write(address, value) {
                    self.unhandled_write(address, value);
                }
            }
            0x8000..=0xFFFF => {
                if !self.mapper.high_write(address, value) {
                    self.unhandled_write(address, value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::CartridgeData;
    use cartridge::NametableMirroring;

    fn nrom_bus() -> Bus {
        let mut prg_rom = vec![0; 0x8000];
        prg_rom[0] = 0xAB;
        Bus::new(cartridge::new_mapper(CartridgeData {
            prg_rom,
            chr_rom: vec![0; 0x2000],
            prg_ram_len: 0,
            chr_ram_len: 0,
            mapper_number: 0,
            sub_mapper_number: 0,
            nametable_mirroring: NametableMirroring::Vertical,
            has_battery: false,
        }))
    }

    #[test]
    fn internal_ram_is_mirrored() {
        let mut bus = nrom_bus();

        bus.write(0x0042, 0x99);
        assert_eq!(bus.read(0x0042), 0x99);
        assert_eq!(bus.read(0x0842), 0x99);
        assert_eq!(bus.read(0x1842), 0x99);

        bus.write(0x1FFF, 0x17);
        assert_eq!(bus.read(0x07FF), 0x17);
    }

    #[test]
    fn external_register_space_reads_open_bus() {
        let mut bus = nrom_bus();

        assert_eq!(bus.read(0x2002), 0x20);
        assert_eq!(bus.read(0x4016), 0x40);
        bus.write(0x2000, 0xFF);
        assert!(!bus.logged_unhandled_write);
    }

    #[test]
    fn unhandled_accesses_warn_once_then_fall_through() {
        let mut bus = nrom_bus();

        // NROM with no PRG RAM claims nothing below $8000
        assert_eq!(bus.read(0x6123), 0x61);
        assert!(bus.logged_unhandled_read);
        assert_eq!(bus.read(0x5000), 0x50);

        bus.write(0x8000, 0x01);
        assert!(bus.logged_unhandled_write);
        // ROM contents unaffected
        assert_eq!(bus.read(0x8000), 0xAB);
    }

    #[test]
    fn ppu_nametables_follow_mapper_mirroring() {
        let mut bus = nrom_bus();

        bus.ppu_write(0x2000, 0x5A);
        // vertical mirroring: $2800 shares VRAM with $2000
        assert_eq!(bus.ppu_read(0x2800), 0x5A);
        assert_eq!(bus.ppu_read(0x2400), 0x00);
    }
}
