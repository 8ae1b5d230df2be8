//! Code for the MMC2 and MMC4 boards (iNES mappers 9 and 10).
//!
//! Both boards pair two CHR banks per pattern table with a latch that flips between them when
//! the PPU fetches specific tile addresses, so the PPU read path is stateful and does not go
//! through the shared basic mapping.

use crate::bus::cartridge::mappers::{BankSizeKb, NametableMirroring, PpuMapResult};
use crate::bus::cartridge::{mappers, MapperImpl};
use crate::num::GetBit;
use bincode::{Decode, Encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum Variant {
    Mmc2,
    Mmc4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum ChrLatch {
    FD,
    FE,
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Mmc2 {
    variant: Variant,
    prg_bank: u8,
    chr_0_fd_bank: u8,
    chr_0_fe_bank: u8,
    chr_1_fd_bank: u8,
    chr_1_fe_bank: u8,
    chr_0_latch: ChrLatch,
    chr_1_latch: ChrLatch,
    nametable_mirroring: NametableMirroring,
}

impl Mmc2 {
    pub(crate) fn new_mmc2() -> Self {
        Self::new(Variant::Mmc2)
    }

    pub(crate) fn new_mmc4() -> Self {
        Self::new(Variant::Mmc4)
    }

    fn new(variant: Variant) -> Self {
        Self {
            variant,
            prg_bank: 0,
            chr_0_fd_bank: 0,
            chr_0_fe_bank: 0,
            chr_1_fd_bank: 0,
            chr_1_fe_bank: 0,
            chr_0_latch: ChrLatch::FD,
            chr_1_latch: ChrLatch::FD,
            nametable_mirroring: NametableMirroring::Vertical,
        }
    }
}

impl MapperImpl<Mmc2> {
    pub(crate) fn name(&self) -> &'static str {
        match self.data.variant {
            Variant::Mmc2 => "MMC2",
            Variant::Mmc4 => "MMC4",
        }
    }

    pub(crate) fn mid_read(&self, address: u16) -> Option<u8> {
        mappers::basic_mid_read(self, address)
    }

    pub(crate) fn mid_write(&mut self, address: u16, value: u8) -> bool {
        mappers::basic_mid_write(self, address, value)
    }

    pub(crate) fn high_read(&mut self, address: u16) -> u8 {
        let prg_rom_len = self.cartridge.prg_rom.len() as u32;
        let prg_rom_addr = match self.data.variant {
            Variant::Mmc2 => match address {
                0x8000..=0x9FFF => {
                    BankSizeKb::Eight.to_absolute_address(self.data.prg_bank, address)
                }
                // last three 8KB banks are fixed
                0xA000..=0xFFFF => BankSizeKb::Eight.to_absolute_address_from_end(
                    (0xFFFF - address) / 0x2000,
                    prg_rom_len,
                    address,
                ),
                _ => panic!("invalid PRG ROM map address: {address:04X}"),
            },
            Variant::Mmc4 => match address {
                0x8000..=0xBFFF => {
                    BankSizeKb::Sixteen.to_absolute_address(self.data.prg_bank, address)
                }
                0xC000..=0xFFFF => {
                    BankSizeKb::Sixteen.to_absolute_address_last_bank(prg_rom_len, address)
                }
                _ => panic!("invalid PRG ROM map address: {address:04X}"),
            },
        };
        self.cartridge.get_prg_rom(prg_rom_addr)
    }

    pub(crate) fn high_write(&mut self, address: u16, value: u8) -> bool {
        match address {
            0x8000..=0x9FFF => false,
            0xA000..=0xAFFF => {
                self.data.prg_bank = value & 0x0F;
                true
            }
            0xB000..=0xBFFF => {
                self.data.chr_0_fd_bank = value & 0x1F;
                true
            }
            0xC000..=0xCFFF => {
                self.data.chr_0_fe_bank = value & 0x1F;
                true
            }
            0xD000..=0xDFFF => {
                self.data.chr_1_fd_bank = value & 0x1F;
                true
            }
            0xE000..=0xEFFF => {
                self.data.chr_1_fe_bank = value & 0x1F;
                true
            }
            0xF000..=0xFFFF => {
                self.data.nametable_mirroring = if value.bit(0) {
                    NametableMirroring::Horizontal
                } else {
                    NametableMirroring::Vertical
                };
                true
            }
            _ => panic!("invalid CPU map address: {address:04X}"),
        }
    }

    fn map_ppu_address(&self, address: u16) -> PpuMapResult {
        match address {
            0x0000..=0x0FFF => {
                let bank = match self.data.chr_0_latch {
                    ChrLatch::FD => self.data.chr_0_fd_bank,
                    ChrLatch::FE => self.data.chr_0_fe_bank,
                };
                PpuMapResult::ChrROM(BankSizeKb::Four.to_absolute_address(bank, address))
            }
            0x1000..=0x1FFF => {
                let bank = match self.data.chr_1_latch {
                    ChrLatch::FD => self.data.chr_1_fd_bank,
                    ChrLatch::FE => self.data.chr_1_fe_bank,
                };
                PpuMapResult::ChrROM(BankSizeKb::Four.to_absolute_address(bank, address))
            }
            0x2000..=0x3EFF => {
                PpuMapResult::Vram(self.data.nametable_mirroring.map_to_vram(address))
            }
            _ => panic!("invalid PPU map address: {address:04X}"),
        }
    }

    // The latch flips *after* the triggering fetch completes
    fn update_chr_latches(&mut self, address: u16) {
        match self.data.variant {
            Variant::Mmc2 => match address {
                0x0FD8 => self.data.chr_0_latch = ChrLatch::FD,
                0x0FE8 => self.data.chr_0_latch = ChrLatch::FE,
                0x1FD8..=0x1FDF => self.data.chr_1_latch = ChrLatch::FD,
                0x1FE8..=0x1FEF => self.data.chr_1_latch = ChrLatch::FE,
                _ => {}
            },
            Variant::Mmc4 => match address {
                0x0FD8..=0x0FDF => self.data.chr_0_latch = ChrLatch::FD,
                0x0FE8..=0x0FEF => self.data.chr_0_latch = ChrLatch::FE,
                0x1FD8..=0x1FDF => self.data.chr_1_latch = ChrLatch::FD,
                0x1FE8..=0x1FEF => self.data.chr_1_latch = ChrLatch::FE,
                _ => {}
            },
        }
    }

    pub(crate) fn read_ppu_address(&mut self, address: u16, vram: &[u8; 2048]) -> u8 {
        let value = self.map_ppu_address(address).read(&self.cartridge, vram);
        if address <= 0x1FFF {
            self.update_chr_latches(address);
        }
        value
    }

    pub(crate) fn write_ppu_address(&mut self, address: u16, value: u8, vram: &mut [u8; 2048]) {
        self.map_ppu_address(address).write(value, &mut self.cartridge, vram);
    }

    pub(crate) fn reset(&mut self) {
        self.data.chr_0_latch = ChrLatch::FD;
        self.data.chr_1_latch = ChrLatch::FD;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::cartridge::test_fixtures::mapper_with_prg_and_chr_rom;

    fn mmc2_mapper() -> MapperImpl<Mmc2> {
        // 8 x 4KB CHR banks, each filled with its bank index
        mapper_with_prg_and_chr_rom(
            Mmc2::new_mmc2(),
            vec![0; 0x20000],
            (0..8).flat_map(|bank| [bank as u8; 0x1000]).collect(),
        )
    }

    #[test]
    fn latch_flips_after_triggering_fetch() {
        let mut mapper = mmc2_mapper();
        let vram = [0; 2048];

        mapper.high_write(0xB000, 1);
        mapper.high_write(0xC000, 2);

        // FD latch selected at power-on
        assert_eq!(mapper.read_ppu_address(0x0000, &vram), 1);

        // The $0FE8 fetch itself still reads through the FD bank
        assert_eq!(mapper.read_ppu_address(0x0FE8, &vram), 1);
        assert_eq!(mapper.read_ppu_address(0x0000, &vram), 2);

        assert_eq!(mapper.read_ppu_address(0x0FD8, &vram), 2);
        assert_eq!(mapper.read_ppu_address(0x0000, &vram), 1);
    }

    #[test]
    fn pattern_table_latches_are_independent() {
        let mut mapper = mmc2_mapper();
        let vram = [0; 2048];

        mapper.high_write(0xB000, 1);
        mapper.high_write(0xC000, 2);
        mapper.high_write(0xD000, 3);
        mapper.high_write(0xE000, 4);

        mapper.read_ppu_address(0x0FE8, &vram);
        assert_eq!(mapper.read_ppu_address(0x0000, &vram), 2);
        assert_eq!(mapper.read_ppu_address(0x1000, &vram), 3);

        mapper.read_ppu_address(0x1FE8, &vram);
        assert_eq!(mapper.read_ppu_address(0x1000, &vram), 4);
    }

    #[test]
    fn mmc2_exact_address_vs_mmc4_range() {
        let mut mmc2 = mmc2_mapper();
        let vram = [0; 2048];

        mmc2.high_write(0xB000, 1);
        mmc2.high_write(0xC000, 2);

        // MMC2 only triggers the left pattern table latch on the exact $0FD8/$0FE8 addresses
        mmc2.read_ppu_address(0x0FE9, &vram);
        assert_eq!(mmc2.read_ppu_address(0x0000, &vram), 1);

        let mut mmc4 = mapper_with_prg_and_chr_rom(
            Mmc2::new_mmc4(),
            vec![0; 0x20000],
            (0..8).flat_map(|bank| [bank as u8; 0x1000]).collect(),
        );
        mmc4.high_write(0xB000, 1);
        mmc4.high_write(0xC000, 2);

        mmc4.read_ppu_address(0x0FE9, &vram);
        assert_eq!(mmc4.read_ppu_address(0x0000, &vram), 2);
    }
}
