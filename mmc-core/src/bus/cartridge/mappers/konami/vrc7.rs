//! Code for the Konami VRC7 boards (iNES mapper 85). The FM synthesis expansion audio is not
//! implemented; the banking and IRQ hardware is.

use crate::bus::cartridge::mappers::konami::irq::VrcIrqCounter;
use crate::bus::cartridge::mappers::{BankSizeKb, ChrType, NametableMirroring, PpuMapResult};
use crate::bus::cartridge::MapperImpl;
use crate::num::GetBit;
use bincode::{Decode, Encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum Variant {
    Vrc7a,
    Vrc7b,
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Vrc7 {
    variant: Variant,
    prg_bank_0: u8,
    prg_bank_1: u8,
    prg_bank_2: u8,
    chr_banks: [u8; 8],
    chr_type: ChrType,
    nametable_mirroring: NametableMirroring,
    irq: VrcIrqCounter,
    ram_enabled: bool,
}

impl Vrc7 {
    pub(crate) fn new(sub_mapper_number: u8, chr_type: ChrType) -> Self {
        let variant = match sub_mapper_number {
            0 | 1 => Variant::Vrc7b,
            2 => Variant::Vrc7a,
            _ => panic!("invalid VRC7 sub mapper: {sub_mapper_number}"),
        };

        log::info!("VRC7 variant: {variant:?}");

        Self {
            variant,
            prg_bank_0: 0,
            prg_bank_1: 0,
            prg_bank_2: 0,
            chr_banks: [0; 8],
            chr_type,
            nametable_mirroring: NametableMirroring::Vertical,
            irq: VrcIrqCounter::new(),
            ram_enabled: false,
        }
    }
}

impl MapperImpl<Vrc7> {
    pub(crate) fn mid_read(&self, address: u16) -> Option<u8> {
        if self.data.ram_enabled && !self.cartridge.prg_ram.is_empty() {
            Some(self.cartridge.get_prg_ram(u32::from(address & 0x1FFF)))
        } else {
            None
        }
    }

    pub(crate) fn mid_write(&mut self, address: u16, value: u8) -> bool {
        if self.data.ram_enabled && !self.cartridge.prg_ram.is_empty() {
            self.cartridge.set_prg_ram(u32::from(address & 0x1FFF), value);
            true
        } else {
            false
        }
    }

    pub(crate) fn high_read(&mut self, address: u16) -> u8 {
        let prg_rom_addr = match address {
            0x8000..=0x9FFF => BankSizeKb::Eight.to_absolute_address(self.data.prg_bank_0, address),
            0xA000..=0xBFFF => BankSizeKb::Eight.to_absolute_address(self.data.prg_bank_1, address),
            0xC000..=0xDFFF => BankSizeKb::Eight.to_absolute_address(self.data.prg_bank_2, address),
            0xE000..=0xFFFF => BankSizeKb::Eight
                .to_absolute_address_last_bank(self.cartridge.prg_rom.len() as u32, address),
            _ => panic!("invalid PRG ROM map address: {address:04X}"),
        };
        self.cartridge.get_prg_rom(prg_rom_addr)
    }

    pub(crate) fn high_write(&mut self, address: u16, value: u8) -> bool {
        match (self.data.variant, address) {
            (_, 0x8000) => {
                self.data.prg_bank_0 = value & 0x3F;
            }
            (Variant::Vrc7a, 0x8010) | (Variant::Vrc7b, 0x8008) => {
                self.data.prg_bank_1 = value & 0x3F;
            }
            (_, 0x9000) => {
                self.data.prg_bank_2 = value & 0x3F;
            }
            (_, 0xA000..=0xD010) => {
                let address_mask = match self.data.variant {
                    Variant::Vrc7a => 0x0010,
                    Variant::Vrc7b => 0x0008,
                };
                let chr_bank_index =
                    2 * ((address - 0xA000) / 0x1000) + u16::from(address & address_mask != 0);
                self.data.chr_banks[chr_bank_index as usize] = value;
            }
            (_, 0xE000) => {
                self.data.nametable_mirroring = match value & 0x03 {
                    0x00 => NametableMirroring::Vertical,
                    0x01 => NametableMirroring::Horizontal,
                    0x02 => NametableMirroring::SingleScreenBank0,
                    0x03 => NametableMirroring::SingleScreenBank1,
                    _ => unreachable!("value & 0x03 is always <= 0x03"),
                };
                self.data.ram_enabled = value.bit(7);
            }
            (Variant::Vrc7a, 0xE010) | (Variant::Vrc7b, 0xE008) => {
                self.data.irq.set_reload_value(value);
            }
            (_, 0xF000) => {
                self.data.irq.set_control(value);
            }
            (Variant::Vrc7a, 0xF010) | (Variant::Vrc7b, 0xF008) => {
                self.data.irq.acknowledge();
            }
            // FM synthesis registers ($9010/$9030) and undecoded addresses
            _ => return false,
        }
        true
    }

    fn map_ppu_address(&self, address: u16) -> PpuMapResult {
        super::map_ppu_address(
            address,
            &self.data.chr_banks,
            self.data.chr_type,
            self.data.nametable_mirroring,
        )
    }

    pub(crate) fn read_ppu_address(&mut self, address: u16, vram: &[u8; 2048]) -> u8 {
        self.map_ppu_address(address).read(&self.cartridge, vram)
    }

    pub(crate) fn write_ppu_address(&mut self, address: u16, value: u8, vram: &mut [u8; 2048]) {
        self.map_ppu_address(address).write(value, &mut self.cartridge, vram);
    }

    pub(crate) fn tick_cpu(&mut self, cycles: u32) {
        self.data.irq.tick_cpu(cycles);
    }

    pub(crate) fn interrupt_flag(&self) -> bool {
        self.data.irq.interrupt_flag()
    }

    pub(crate) fn reset(&mut self) {
        self.data.prg_bank_0 = 0;
        self.data.prg_bank_1 = 0;
        self.data.prg_bank_2 = 0;
        self.data.chr_banks = [0; 8];
        self.data.nametable_mirroring = NametableMirroring::Vertical;
        self.data.irq = VrcIrqCounter::new();
        self.data.ram_enabled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::cartridge::test_fixtures::mapper_with_prg_rom;

    #[test]
    fn variant_register_addressing() {
        let mut vrc7b = mapper_with_prg_rom(Vrc7::new(0, ChrType::ROM), vec![0; 0x20000]);
        let mut vrc7a = mapper_with_prg_rom(Vrc7::new(2, ChrType::ROM), vec![0; 0x20000]);

        vrc7b.high_write(0x8008, 5);
        assert_eq!(vrc7b.data.prg_bank_1, 5);

        // $8008 is not decoded on VRC7a boards
        vrc7a.high_write(0x8008, 5);
        assert_eq!(vrc7a.data.prg_bank_1, 0);
        vrc7a.high_write(0x8010, 5);
        assert_eq!(vrc7a.data.prg_bank_1, 5);
    }

    #[test]
    fn undecoded_writes_are_not_claimed() {
        let mut vrc7b = mapper_with_prg_rom(Vrc7::new(0, ChrType::ROM), vec![0; 0x20000]);

        // FM synthesis registers are not implemented
        assert!(!vrc7b.high_write(0x9010, 0xFF));
        // $8010 is only decoded on VRC7a boards
        assert!(!vrc7b.high_write(0x8010, 5));
        assert!(vrc7b.high_write(0x8000, 1));
    }

    #[test]
    fn chr_bank_register_index() {
        let mut mapper = mapper_with_prg_rom(Vrc7::new(0, ChrType::ROM), vec![0; 0x20000]);

        mapper.high_write(0xA000, 1);
        mapper.high_write(0xA008, 2);
        mapper.high_write(0xD000, 7);
        mapper.high_write(0xD008, 8);

        assert_eq!(mapper.data.chr_banks, [1, 2, 0, 0, 0, 0, 7, 8]);
    }

    #[test]
    fn prg_banking_last_bank_fixed() {
        // 16 x 8KB banks
        let mut mapper = mapper_with_prg_rom(
            Vrc7::new(0, ChrType::ROM),
            (0..16).flat_map(|bank| [bank as u8; 0x2000]).collect(),
        );

        mapper.high_write(0x8000, 3);
        mapper.high_write(0x8008, 4);
        mapper.high_write(0x9000, 5);

        assert_eq!(mapper.high_read(0x8000), 3);
        assert_eq!(mapper.high_read(0xA000), 4);
        assert_eq!(mapper.high_read(0xC000), 5);
        assert_eq!(mapper.high_read(0xE000), 15);
    }
}
