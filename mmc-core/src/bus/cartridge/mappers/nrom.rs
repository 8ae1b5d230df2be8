//! Boards built from discrete logic (or nothing at all): NROM, UxROM, CNROM, AxROM, and the
//! Bandai 74161/32 boards (iNES mappers 0 / 2 / 3 / 7 / 70 / 152), plus the placeholder used
//! for mapper numbers this crate does not implement.

use crate::bus::cartridge::mappers::{
    BankSizeKb, ChrType, HasBasicPpuMapping, NametableMirroring, PpuMapResult,
};
use crate::bus::cartridge::{mappers, MapperImpl};
use crate::num::GetBit;
use bincode::{Decode, Encode};

fn basic_map_ppu_address(
    address: u16,
    chr_type: ChrType,
    nametable_mirroring: NametableMirroring,
) -> PpuMapResult {
    match address {
        0x0000..=0x1FFF => chr_type.to_map_result(address.into()),
        0x2000..=0x3EFF => PpuMapResult::Vram(nametable_mirroring.map_to_vram(address)),
        _ => panic!("invalid PPU map address: {address:04X}"),
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Nrom {
    chr_type: ChrType,
    nametable_mirroring: NametableMirroring,
}

impl Nrom {
    pub(crate) fn new(chr_type: ChrType, nametable_mirroring: NametableMirroring) -> Self {
        Self { chr_type, nametable_mirroring }
    }
}

impl MapperImpl<Nrom> {
    pub(crate) fn mid_read(&self, address: u16) -> Option<u8> {
        mappers::basic_mid_read(self, address)
    }

    pub(crate) fn mid_write(&mut self, address: u16, value: u8) -> bool {
        mappers::basic_mid_write(self, address, value)
    }

    pub(crate) fn high_read(&mut self, address: u16) -> u8 {
        self.cartridge.get_prg_rom(u32::from(address & 0x7FFF))
    }

    pub(crate) fn high_write(&mut self, _address: u16, _value: u8) -> bool {
        false
    }

    pub(crate) fn reset(&mut self) {}
}

impl HasBasicPpuMapping for MapperImpl<Nrom> {
    fn map_ppu_address(&self, address: u16) -> PpuMapResult {
        basic_map_ppu_address(address, self.data.chr_type, self.data.nametable_mirroring)
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Uxrom {
    prg_bank: u8,
    chr_type: ChrType,
    nametable_mirroring: NametableMirroring,
}

impl Uxrom {
    pub(crate) fn new(chr_type: ChrType, nametable_mirroring: NametableMirroring) -> Self {
        Self { prg_bank: 0, chr_type, nametable_mirroring }
    }
}

impl MapperImpl<Uxrom> {
    pub(crate) fn mid_read(&self, address: u16) -> Option<u8> {
        mappers::basic_mid_read(self, address)
    }

    pub(crate) fn mid_write(&mut self, address: u16, value: u8) -> bool {
        mappers::basic_mid_write(self, address, value)
    }

    pub(crate) fn high_read(&mut self, address: u16) -> u8 {
        let prg_rom_addr = match address {
            0x8000..=0xBFFF => BankSizeKb::Sixteen.to_absolute_address(self.data.prg_bank, address),
            0xC000..=0xFFFF => BankSizeKb::Sixteen
                .to_absolute_address_last_bank(self.cartridge.prg_rom.len() as u32, address),
            _ => panic!("invalid PRG ROM map address: {address:04X}"),
        };
        self.cartridge.get_prg_rom(prg_rom_addr)
    }

    pub(crate) fn high_write(&mut self, _address: u16, value: u8) -> bool {
        self.data.prg_bank = value;
        true
    }

    pub(crate) fn reset(&mut self) {
        self.data.prg_bank = 0;
    }
}

impl HasBasicPpuMapping for MapperImpl<Uxrom> {
    fn map_ppu_address(&self, address: u16) -> PpuMapResult {
        basic_map_ppu_address(address, self.data.chr_type, self.data.nametable_mirroring)
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Cnrom {
    chr_type: ChrType,
    chr_bank: u8,
    nametable_mirroring: NametableMirroring,
}

impl Cnrom {
    pub(crate) fn new(chr_type: ChrType, nametable_mirroring: NametableMirroring) -> Self {
        Self { chr_type, chr_bank: 0, nametable_mirroring }
    }
}

impl MapperImpl<Cnrom> {
    pub(crate) fn mid_read(&self, address: u16) -> Option<u8> {
        mappers::basic_mid_read(self, address)
    }

    pub(crate) fn mid_write(&mut self, address: u16, value: u8) -> bool {
        mappers::basic_mid_write(self, address, value)
    }

    pub(crate) fn high_read(&mut self, address: u16) -> u8 {
        self.cartridge.get_prg_rom(u32::from(address & 0x7FFF))
    }

    pub(crate) fn high_write(&mut self, _address: u16, value: u8) -> bool {
        self.data.chr_bank = value;
        true
    }

    pub(crate) fn reset(&mut self) {
        self.data.chr_bank = 0;
    }
}

impl HasBasicPpuMapping for MapperImpl<Cnrom> {
    fn map_ppu_address(&self, address: u16) -> PpuMapResult {
        match address {
            0x0000..=0x1FFF => self
                .data
                .chr_type
                .to_map_result(BankSizeKb::Eight.to_absolute_address(self.data.chr_bank, address)),
            0x2000..=0x3EFF => {
                PpuMapResult::Vram(self.data.nametable_mirroring.map_to_vram(address))
            }
            _ => panic!("invalid PPU map address: {address:04X}"),
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Axrom {
    chr_type: ChrType,
    prg_bank: u8,
    nametable_mirroring: NametableMirroring,
}

impl Axrom {
    pub(crate) fn new(chr_type: ChrType) -> Self {
        Self { chr_type, prg_bank: 0, nametable_mirroring: NametableMirroring::SingleScreenBank0 }
    }
}

impl MapperImpl<Axrom> {
    pub(crate) fn mid_read(&self, address: u16) -> Option<u8> {
        mappers::basic_mid_read(self, address)
    }

    pub(crate) fn mid_write(&mut self, address: u16, value: u8) -> bool {
        mappers::basic_mid_write(self, address, value)
    }

    pub(crate) fn high_read(&mut self, address: u16) -> u8 {
        self.cartridge
            .get_prg_rom(BankSizeKb::ThirtyTwo.to_absolute_address(self.data.prg_bank, address))
    }

    pub(crate) fn high_write(&mut self, _address: u16, value: u8) -> bool {
        self.data.prg_bank = value & 0x07;
        self.data.nametable_mirroring = if value.bit(4) {
            NametableMirroring::SingleScreenBank1
        } else {
            NametableMirroring::SingleScreenBank0
        };
        true
    }

    pub(crate) fn reset(&mut self) {
        self.data.prg_bank = 0;
        self.data.nametable_mirroring = NametableMirroring::SingleScreenBank0;
    }
}

impl HasBasicPpuMapping for MapperImpl<Axrom> {
    fn map_ppu_address(&self, address: u16) -> PpuMapResult {
        basic_map_ppu_address(address, self.data.chr_type, self.data.nametable_mirroring)
    }
}

/// The Bandai 74161/32 boards (iNES mappers 70 and 152). A single register selects a 16KB
/// PRG bank and an 8KB CHR bank; mapper 152 additionally controls one-screen mirroring.
#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Bandai74161 {
    chr_type: ChrType,
    prg_bank: u8,
    chr_bank: u8,
    nametable_mirroring: NametableMirroring,
    mirroring_switchable: bool,
}

impl Bandai74161 {
    pub(crate) fn new(
        chr_type: ChrType,
        nametable_mirroring: NametableMirroring,
        mirroring_switchable: bool,
    ) -> Self {
        let nametable_mirroring = if mirroring_switchable {
            NametableMirroring::SingleScreenBank0
        } else {
            nametable_mirroring
        };
        Self { chr_type, prg_bank: 0, chr_bank: 0, nametable_mirroring, mirroring_switchable }
    }
}

impl MapperImpl<Bandai74161> {
    pub(crate) fn mid_read(&self, address: u16) -> Option<u8> {
        mappers::basic_mid_read(self, address)
    }

    pub(crate) fn mid_write(&mut self, address: u16, value: u8) -> bool {
        mappers::basic_mid_write(self, address, value)
    }

    pub(crate) fn high_read(&mut self, address: u16) -> u8 {
        let prg_rom_addr = match address {
            0x8000..=0xBFFF => BankSizeKb::Sixteen.to_absolute_address(self.data.prg_bank, address),
            0xC000..=0xFFFF => BankSizeKb::Sixteen
                .to_absolute_address_last_bank(self.cartridge.prg_rom.len() as u32, address),
            _ => panic!("invalid PRG ROM map address: {address:04X}"),
        };
        self.cartridge.get_prg_rom(prg_rom_addr)
    }

    pub(crate) fn high_write(&mut self, _address: u16, value: u8) -> bool {
        self.data.chr_bank = value & 0x0F;
        self.data.prg_bank = (value >> 4) & 0x07;
        if self.data.mirroring_switchable {
            self.data.nametable_mirroring = if value.bit(7) {
                NametableMirroring::SingleScreenBank1
            } else {
                NametableMirroring::SingleScreenBank0
            };
        }
        true
    }

    pub(crate) fn reset(&mut self) {
        self.data.prg_bank = 0;
        self.data.chr_bank = 0;
        if self.data.mirroring_switchable {
            self.data.nametable_mirroring = NametableMirroring::SingleScreenBank0;
        }
    }
}

impl HasBasicPpuMapping for MapperImpl<Bandai74161> {
    fn map_ppu_address(&self, address: u16) -> PpuMapResult {
        match address {
            0x0000..=0x1FFF => self
                .data
                .chr_type
                .to_map_result(BankSizeKb::Eight.to_absolute_address(self.data.chr_bank, address)),
            0x2000..=0x3EFF => {
                PpuMapResult::Vram(self.data.nametable_mirroring.map_to_vram(address))
            }
            _ => panic!("invalid PPU map address: {address:04X}"),
        }
    }
}

/// Placeholder for cartridges whose mapper number has no implementation in this crate. The CPU
/// ranges read as open bus and every write is ignored, which is enough for a frontend to boot
/// the console and display a diagnostic instead of crashing.
#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Unsupported {
    mapper_number: u16,
    nametable_mirroring: NametableMirroring,
}

impl Unsupported {
    pub(crate) fn new(mapper_number: u16, nametable_mirroring: NametableMirroring) -> Self {
        Self { mapper_number, nametable_mirroring }
    }
}

impl MapperImpl<Unsupported> {
    pub(crate) fn mapper_number(&self) -> u16 {
        self.data.mapper_number
    }

    pub(crate) fn mid_read(&self, _address: u16) -> Option<u8> {
        None
    }

    pub(crate) fn mid_write(&mut self, _address: u16, _value: u8) -> bool {
        false
    }

    pub(crate) fn high_read(&mut self, address: u16) -> u8 {
        crate::bus::cpu_open_bus(address)
    }

    pub(crate) fn high_write(&mut self, _address: u16, _value: u8) -> bool {
        false
    }

    pub(crate) fn reset(&mut self) {}
}

impl HasBasicPpuMapping for MapperImpl<Unsupported> {
    fn map_ppu_address(&self, address: u16) -> PpuMapResult {
        match address {
            0x0000..=0x1FFF => {
                if !self.cartridge.chr_rom.is_empty() {
                    PpuMapResult::ChrROM(address.into())
                } else {
                    PpuMapResult::ChrRAM(address.into())
                }
            }
            0x2000..=0x3EFF => {
                PpuMapResult::Vram(self.data.nametable_mirroring.map_to_vram(address))
            }
            _ => panic!("invalid PPU map address: {address:04X}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::cartridge::test_fixtures::mapper_with_prg_rom;

    #[test]
    fn uxrom_fixed_last_bank() {
        // 4 x 16KB banks, each filled with its bank index
        let mut mapper = mapper_with_prg_rom(
            Uxrom::new(ChrType::RAM, NametableMirroring::Vertical),
            (0..4).flat_map(|bank| [bank as u8; 0x4000]).collect(),
        );

        assert_eq!(mapper.high_read(0x8000), 0);
        assert_eq!(mapper.high_read(0xC000), 3);

        mapper.high_write(0x8000, 2);
        assert_eq!(mapper.high_read(0x8000), 2);
        assert_eq!(mapper.high_read(0xC000), 3);

        // bank index masking wraps out-of-range banks
        mapper.high_write(0x8000, 0x41);
        assert_eq!(mapper.high_read(0x8000), 1);
    }

    #[test]
    fn axrom_single_screen_select() {
        let mut mapper = mapper_with_prg_rom(Axrom::new(ChrType::RAM), vec![0; 0x8000]);

        assert_eq!(
            mapper.map_ppu_address(0x2C10),
            PpuMapResult::Vram(0x0010),
            "power-on state should map the first VRAM bank"
        );

        mapper.high_write(0x8000, 0x10);
        assert_eq!(mapper.map_ppu_address(0x2C10), PpuMapResult::Vram(0x0410));

        mapper.reset();
        assert_eq!(mapper.map_ppu_address(0x2C10), PpuMapResult::Vram(0x0010));
    }
}
