//! Code for the MMC1 board (iNES mapper 1).
//!
//! All four internal registers are written through a single serial port: five 1-bit writes to
//! $8000-$FFFF fill a shift register, and the address of the fifth write selects which register
//! receives the accumulated value.

use crate::bus::cartridge::mappers::{
    BankSizeKb, ChrType, HasBasicPpuMapping, NametableMirroring, PpuMapResult,
};
use crate::bus::cartridge::MapperImpl;
use crate::num::GetBit;
use bincode::{Decode, Encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum PrgBankingMode {
    Switch32Kb,
    Switch16KbFirstBankFixed,
    Switch16KbLastBankFixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum ChrBankingMode {
    Single8KbBank,
    Two4KbBanks,
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Mmc1 {
    chr_type: ChrType,
    shift_register: u8,
    shift_register_len: u8,
    nametable_mirroring: NametableMirroring,
    prg_banking_mode: PrgBankingMode,
    chr_banking_mode: ChrBankingMode,
    chr_bank_0: u8,
    chr_bank_1: u8,
    prg_bank: u8,
    ram_disabled: bool,
}

impl Mmc1 {
    pub(crate) fn new(chr_type: ChrType) -> Self {
        Self {
            chr_type,
            shift_register: 0,
            shift_register_len: 0,
            nametable_mirroring: NametableMirroring::SingleScreenBank0,
            prg_banking_mode: PrgBankingMode::Switch16KbLastBankFixed,
            chr_banking_mode: ChrBankingMode::Single8KbBank,
            chr_bank_0: 0,
            chr_bank_1: 0,
            prg_bank: 0,
            ram_disabled: false,
        }
    }
}

impl MapperImpl<Mmc1> {
    pub(crate) fn mid_read(&self, address: u16) -> Option<u8> {
        if self.data.ram_disabled || self.cartridge.prg_ram.is_empty() {
            return None;
        }
        Some(self.cartridge.get_prg_ram(u32::from(address & 0x1FFF)))
    }

    pub(crate) fn mid_write(&mut self, address: u16, value: u8) -> bool {
        if self.data.ram_disabled || self.cartridge.prg_ram.is_empty() {
            return false;
        }
        self.cartridge.set_prg_ram(u32::from(address & 0x1FFF), value);
        true
    }

    pub(crate) fn high_read(&mut self, address: u16) -> u8 {
        let prg_rom_addr = match self.data.prg_banking_mode {
            PrgBankingMode::Switch32Kb => {
                BankSizeKb::ThirtyTwo.to_absolute_address(self.data.prg_bank >> 1, address)
            }
            PrgBankingMode::Switch16KbFirstBankFixed => match address {
                0x8000..=0xBFFF => u32::from(address & 0x3FFF),
                0xC000..=0xFFFF => {
                    BankSizeKb::Sixteen.to_absolute_address(self.data.prg_bank, address)
                }
                _ => panic!("invalid PRG ROM map address: {address:04X}"),
            },
            PrgBankingMode::Switch16KbLastBankFixed => match address {
                0x8000..=0xBFFF => {
                    BankSizeKb::Sixteen.to_absolute_address(self.data.prg_bank, address)
                }
                0xC000..=0xFFFF => BankSizeKb::Sixteen
                    .to_absolute_address_last_bank(self.cartridge.prg_rom.len() as u32, address),
                _ => panic!("invalid PRG ROM map address: {address:04X}"),
            },
        };
        self.cartridge.get_prg_rom(prg_rom_addr)
    }

    pub(crate) fn high_write(&mut self, address: u16, value: u8) -> bool {
        if value.bit(7) {
            self.data.shift_register = 0;
            self.data.shift_register_len = 0;
            self.data.prg_banking_mode = PrgBankingMode::Switch16KbLastBankFixed;
            return true;
        }

        self.data.shift_register = (self.data.shift_register >> 1) | ((value & 0x01) << 4);
        self.data.shift_register_len += 1;

        if self.data.shift_register_len == 5 {
            // Bits 13-14 of the fifth write's address select the destination register
            let register_value = self.data.shift_register;
            self.data.shift_register = 0;
            self.data.shift_register_len = 0;

            match address {
                0x8000..=0x9FFF => self.write_control(register_value),
                0xA000..=0xBFFF => {
                    self.data.chr_bank_0 = register_value;
                }
                0xC000..=0xDFFF => {
                    self.data.chr_bank_1 = register_value;
                }
                0xE000..=0xFFFF => {
                    self.data.prg_bank = register_value & 0x0F;
                    self.data.ram_disabled = register_value.bit(4);
                }
                _ => panic!("invalid MMC1 register address: {address:04X}"),
            }
        }

        true
    }

    fn write_control(&mut self, value: u8) {
        self.data.nametable_mirroring = match value & 0x03 {
            0x00 => NametableMirroring::SingleScreenBank0,
            0x01 => NametableMirroring::SingleScreenBank1,
            0x02 => NametableMirroring::Vertical,
            0x03 => NametableMirroring::Horizontal,
            _ => unreachable!("value & 0x03 is always <= 0x03"),
        };
        self.data.prg_banking_mode = match (value >> 2) & 0x03 {
            0x00 | 0x01 => PrgBankingMode::Switch32Kb,
            0x02 => PrgBankingMode::Switch16KbFirstBankFixed,
            0x03 => PrgBankingMode::Switch16KbLastBankFixed,
            _ => unreachable!("value & 0x03 is always <= 0x03"),
        };
        self.data.chr_banking_mode =
            if value.bit(4) { ChrBankingMode::Two4KbBanks } else { ChrBankingMode::Single8KbBank };

        log::trace!(
            "MMC1 control write: mirroring={:?}, PRG mode={:?}, CHR mode={:?}",
            self.data.nametable_mirroring,
            self.data.prg_banking_mode,
            self.data.chr_banking_mode
        );
    }

    pub(crate) fn reset(&mut self) {
        self.data.shift_register = 0;
        self.data.shift_register_len = 0;
        self.data.prg_banking_mode = PrgBankingMode::Switch16KbLastBankFixed;
    }
}

impl HasBasicPpuMapping for MapperImpl<Mmc1> {
    fn map_ppu_address(&self, address: u16) -> PpuMapResult {
        match address {
            0x0000..=0x1FFF => {
                let chr_addr = match self.data.chr_banking_mode {
                    ChrBankingMode::Single8KbBank => {
                        BankSizeKb::Eight.to_absolute_address(self.data.chr_bank_0 >> 1, address)
                    }
                    ChrBankingMode::Two4KbBanks => match address {
                        0x0000..=0x0FFF => {
                            BankSizeKb::Four.to_absolute_address(self.data.chr_bank_0, address)
                        }
                        0x1000..=0x1FFF => {
                            BankSizeKb::Four.to_absolute_address(self.data.chr_bank_1, address)
                        }
                        _ => unreachable!("address is <= 0x1FFF"),
                    },
                };
                self.data.chr_type.to_map_result(chr_addr)
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

    fn serial_write(mapper: &mut MapperImpl<Mmc1>, address: u16, value: u8) {
        for i in 0..5 {
            mapper.high_write(address, (value >> i) & 0x01);
        }
    }

    #[test]
    fn serial_port_shifts_lsb_first() {
        let mut mapper = mapper_with_prg_rom(Mmc1::new(ChrType::RAM), vec![0; 0x20000]);

        // 0, 1, 0, 1, 0 commits %01010 to the control register
        serial_write(&mut mapper, 0x8000, 0x0A);
        assert_eq!(mapper.data.nametable_mirroring, NametableMirroring::Vertical);
        assert_eq!(mapper.data.prg_banking_mode, PrgBankingMode::Switch16KbFirstBankFixed);
        assert_eq!(mapper.data.chr_banking_mode, ChrBankingMode::Single8KbBank);
        assert_eq!(mapper.data.shift_register_len, 0);
    }

    #[test]
    fn fifth_write_address_selects_register() {
        let mut mapper = mapper_with_prg_rom(Mmc1::new(ChrType::RAM), vec![0; 0x20000]);

        // Only the final write's address matters for register selection
        for _ in 0..4 {
            mapper.high_write(0x8000, 0x01);
        }
        mapper.high_write(0xA000, 0x01);
        assert_eq!(mapper.data.chr_bank_0, 0x1F);
        assert_eq!(mapper.data.prg_banking_mode, PrgBankingMode::Switch16KbLastBankFixed);
    }

    #[test]
    fn bit_7_resets_shift_register_and_prg_mode() {
        let mut mapper = mapper_with_prg_rom(Mmc1::new(ChrType::RAM), vec![0; 0x20000]);

        serial_write(&mut mapper, 0x8000, 0x08);
        assert_eq!(mapper.data.prg_banking_mode, PrgBankingMode::Switch32Kb);

        mapper.high_write(0x8000, 0x01);
        mapper.high_write(0x8000, 0x01);
        mapper.high_write(0x8000, 0x80);
        assert_eq!(mapper.data.shift_register_len, 0);
        assert_eq!(mapper.data.prg_banking_mode, PrgBankingMode::Switch16KbLastBankFixed);

        // The interrupted sequence must not leak into the next one
        serial_write(&mut mapper, 0xE000, 0x03);
        assert_eq!(mapper.data.prg_bank, 0x03);
    }

    #[test]
    fn prg_banking_modes() {
        // 8 x 16KB banks, each filled with its bank index
        let mut mapper = mapper_with_prg_rom(
            Mmc1::new(ChrType::RAM),
            (0..8).flat_map(|bank| [bank as u8; 0x4000]).collect(),
        );

        // power-on: last bank fixed at $C000
        assert_eq!(mapper.high_read(0x8000), 0);
        assert_eq!(mapper.high_read(0xC000), 7);

        serial_write(&mut mapper, 0xE000, 0x02);
        assert_eq!(mapper.high_read(0x8000), 2);
        assert_eq!(mapper.high_read(0xC000), 7);

        // first bank fixed
        serial_write(&mut mapper, 0x8000, 0x08);
        assert_eq!(mapper.high_read(0x8000), 0);
        assert_eq!(mapper.high_read(0xC000), 2);

        // 32KB mode ignores the low bank bit
        serial_write(&mut mapper, 0x8000, 0x00);
        serial_write(&mut mapper, 0xE000, 0x03);
        assert_eq!(mapper.high_read(0x8000), 2);
        assert_eq!(mapper.high_read(0xC000), 3);
    }

    #[test]
    fn single_chunk_rom_masks_bank_select() {
        let mut prg_rom = vec![0; 0x4000];
        prg_rom[0] = 0x77;
        let mut mapper = mapper_with_prg_rom(Mmc1::new(ChrType::RAM), prg_rom);

        serial_write(&mut mapper, 0xE000, 0x0F);
        assert_eq!(mapper.high_read(0x8000), 0x77);
        assert_eq!(mapper.high_read(0xC000), 0x77);
    }

    #[test]
    fn ram_disable_bit_unmaps_prg_ram() {
        let mut mapper = mapper_with_prg_rom(Mmc1::new(ChrType::RAM), vec![0; 0x20000]);
        mapper.cartridge.prg_ram = vec![0; 0x2000];

        assert!(mapper.mid_write(0x6000, 0xAB));
        assert_eq!(mapper.mid_read(0x6000), Some(0xAB));

        serial_write(&mut mapper, 0xE000, 0x10);
        assert_eq!(mapper.mid_read(0x6000), None);
        assert!(!mapper.mid_write(0x6000, 0xCD));
    }
}
