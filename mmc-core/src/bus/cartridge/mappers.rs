//! Types and helpers shared between the individual mapper boards.

mod konami;
mod mmc1;
mod mmc2;
mod mmc3;
mod mmc5;
mod namco163;
mod nrom;

pub(crate) use konami::{Vrc4, Vrc6, Vrc7};
pub(crate) use mmc1::Mmc1;
pub(crate) use mmc2::Mmc2;
pub(crate) use mmc3::Mmc3;
pub(crate) use mmc5::Mmc5;
pub(crate) use namco163::Namco163;
pub(crate) use nrom::{Axrom, Bandai74161, Cnrom, Nrom, Unsupported, Uxrom};

use crate::bus;
use crate::bus::cartridge::{Cartridge, MapperImpl};
use bincode::{Decode, Encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub(crate) enum ChrType {
    ROM,
    RAM,
}

impl ChrType {
    pub(crate) fn to_map_result(self, address: u32) -> PpuMapResult {
        match self {
            Self::ROM => PpuMapResult::ChrROM(address),
            Self::RAM => PpuMapResult::ChrRAM(address),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum NametableMirroring {
    Horizontal,
    Vertical,
    SingleScreenBank0,
    SingleScreenBank1,
}

impl NametableMirroring {
    /// Map a PPU address in $2000-$3EFF to an address into the console's 2KB of VRAM.
    pub(crate) fn map_to_vram(self, address: u16) -> u16 {
        debug_assert!((0x2000..=0x3EFF).contains(&address));

        let relative_addr = address & 0x0FFF;
        match self {
            Self::Horizontal => ((relative_addr & 0x0800) >> 1) | (relative_addr & 0x03FF),
            Self::Vertical => relative_addr & 0x07FF,
            Self::SingleScreenBank0 => relative_addr & 0x03FF,
            Self::SingleScreenBank1 => 0x0400 | (relative_addr & 0x03FF),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CpuMapResult {
    PrgROM(u32),
    PrgRAM(u32),
    None { original_address: u16 },
}

impl CpuMapResult {
    pub(crate) fn read(self, cartridge: &Cartridge) -> u8 {
        match self {
            Self::PrgROM(address) => cartridge.get_prg_rom(address),
            Self::PrgRAM(address) => cartridge.get_prg_ram(address),
            Self::None { original_address } => bus::cpu_open_bus(original_address),
        }
    }

    pub(crate) fn write(self, value: u8, cartridge: &mut Cartridge) {
        match self {
            Self::PrgROM(_) | Self::None { .. } => {}
            Self::PrgRAM(address) => {
                cartridge.set_prg_ram(address, value);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PpuMapResult {
    ChrROM(u32),
    ChrRAM(u32),
    Vram(u16),
}

impl PpuMapResult {
    pub(crate) fn read(self, cartridge: &Cartridge, vram: &[u8; 2048]) -> u8 {
        match self {
            Self::ChrROM(address) => cartridge.get_chr_rom(address),
            Self::ChrRAM(address) => cartridge.get_chr_ram(address),
            Self::Vram(address) => vram[(address & 0x07FF) as usize],
        }
    }

    pub(crate) fn write(self, value: u8, cartridge: &mut Cartridge, vram: &mut [u8; 2048]) {
        match self {
            Self::ChrROM(_) => {}
            Self::ChrRAM(address) => {
                cartridge.set_chr_ram(address, value);
            }
            Self::Vram(address) => {
                vram[(address & 0x07FF) as usize] = value;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub(crate) enum BankSizeKb {
    One,
    Two,
    Four,
    Eight,
    Sixteen,
    ThirtyTwo,
}

impl BankSizeKb {
    fn shift(self) -> u32 {
        match self {
            Self::One => 10,
            Self::Two => 11,
            Self::Four => 12,
            Self::Eight => 13,
            Self::Sixteen => 14,
            Self::ThirtyTwo => 15,
        }
    }

    fn address_mask(self) -> u16 {
        (1_u16 << self.shift()) - 1
    }

    pub(crate) fn to_absolute_address<N: Into<u32>>(self, bank_number: N, address: u16) -> u32 {
        (bank_number.into() << self.shift()) | u32::from(address & self.address_mask())
    }

    pub(crate) fn to_absolute_address_from_end<N: Into<u32>>(
        self,
        inverse_bank_number: N,
        memory_len: u32,
        address: u16,
    ) -> u32 {
        let relative_addr = (inverse_bank_number.into() + 1) << self.shift();
        let bank_addr = memory_len.wrapping_sub(relative_addr);
        bank_addr | u32::from(address & self.address_mask())
    }

    pub(crate) fn to_absolute_address_last_bank(self, memory_len: u32, address: u16) -> u32 {
        self.to_absolute_address_from_end(0_u32, memory_len, address)
    }
}

/// Implemented by every board whose PPU mapping is stateless, which is all of them except
/// MMC2/MMC4 (pattern table latches) and MMC5 (extended RAM and fill mode nametables).
pub(crate) trait HasBasicPpuMapping {
    fn map_ppu_address(&self, address: u16) -> PpuMapResult;
}

impl<D> MapperImpl<D>
where
    MapperImpl<D>: HasBasicPpuMapping,
{
    pub(crate) fn read_ppu_address(&mut self, address: u16, vram: &[u8; 2048]) -> u8 {
        self.map_ppu_address(address).read(&self.cartridge, vram)
    }

    pub(crate) fn write_ppu_address(&mut self, address: u16, value: u8, vram: &mut [u8; 2048]) {
        self.map_ppu_address(address).write(value, &mut self.cartridge, vram);
    }
}

/// Standard $6000-$7FFF PRG RAM read for boards with no banking or protection in that range.
pub(crate) fn basic_mid_read<D>(mapper: &MapperImpl<D>, address: u16) -> Option<u8> {
    debug_assert!((0x6000..=0x7FFF).contains(&address));

    if mapper.cartridge.prg_ram.is_empty() {
        return None;
    }
    Some(mapper.cartridge.get_prg_ram(u32::from(address & 0x1FFF)))
}

/// Standard $6000-$7FFF PRG RAM write; returns whether the board claimed the write.
pub(crate) fn basic_mid_write<D>(mapper: &mut MapperImpl<D>, address: u16, value: u8) -> bool {
    debug_assert!((0x6000..=0x7FFF).contains(&address));

    if mapper.cartridge.prg_ram.is_empty() {
        return false;
    }
    mapper.cartridge.set_prg_ram(u32::from(address & 0x1FFF), value);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_size_absolute_addresses() {
        assert_eq!(BankSizeKb::Sixteen.to_absolute_address(0_u8, 0x8532), 0x0532);
        assert_eq!(BankSizeKb::Sixteen.to_absolute_address(3_u8, 0xC532), 0xC532);
        assert_eq!(BankSizeKb::Eight.to_absolute_address(5_u8, 0x9FFF), 5 * 0x2000 + 0x1FFF);
        assert_eq!(BankSizeKb::One.to_absolute_address(0x41_u8, 0x07FF), 0x41 * 0x0400 + 0x03FF);
        assert_eq!(BankSizeKb::ThirtyTwo.to_absolute_address(2_u8, 0xFFFF), 2 * 0x8000 + 0x7FFF);
    }

    #[test]
    fn bank_size_from_end() {
        // 128KB of PRG ROM, fixed last 16KB bank
        assert_eq!(
            BankSizeKb::Sixteen.to_absolute_address_last_bank(1 << 17, 0xC000),
            (1 << 17) - 0x4000
        );
        // second-to-last 8KB bank
        assert_eq!(
            BankSizeKb::Eight.to_absolute_address_from_end(1_u8, 1 << 17, 0xC005),
            (1 << 17) - 2 * 0x2000 + 0x0005
        );
    }

    #[test]
    fn nametable_mirroring_maps() {
        assert_eq!(NametableMirroring::Vertical.map_to_vram(0x2000), 0x0000);
        assert_eq!(NametableMirroring::Vertical.map_to_vram(0x2400), 0x0400);
        assert_eq!(NametableMirroring::Vertical.map_to_vram(0x2800), 0x0000);
        assert_eq!(NametableMirroring::Vertical.map_to_vram(0x2C00), 0x0400);

        assert_eq!(NametableMirroring::Horizontal.map_to_vram(0x2000), 0x0000);
        assert_eq!(NametableMirroring::Horizontal.map_to_vram(0x2400), 0x0000);
        assert_eq!(NametableMirroring::Horizontal.map_to_vram(0x2800), 0x0400);
        assert_eq!(NametableMirroring::Horizontal.map_to_vram(0x2C00), 0x0400);

        assert_eq!(NametableMirroring::SingleScreenBank0.map_to_vram(0x2C33), 0x0033);
        assert_eq!(NametableMirroring::SingleScreenBank1.map_to_vram(0x2C33), 0x0433);

        // $3000-$3EFF mirrors $2000-$2EFF
        assert_eq!(NametableMirroring::Vertical.map_to_vram(0x3400), 0x0400);
    }
}
