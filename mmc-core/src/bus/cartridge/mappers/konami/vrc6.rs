//! Code for the Konami VRC6 boards (iNES mappers 24 and 26). The expansion audio channels are
//! not implemented.

use crate::bus::cartridge::mappers::konami::irq::VrcIrqCounter;
use crate::bus::cartridge::mappers::{BankSizeKb, ChrType, NametableMirroring, PpuMapResult};
use crate::bus::cartridge::MapperImpl;
use bincode::{Decode, Encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum Variant {
    Vrc6a,
    Vrc6b,
}

impl Variant {
    fn remap_address(self, address: u16) -> u16 {
        match self {
            // Leave address unchanged
            Self::Vrc6a => address,
            // Swap A0 and A1
            Self::Vrc6b => {
                (address & 0xFFFC) | ((address & 0x0001) << 1) | ((address & 0x0002) >> 1)
            }
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Vrc6 {
    variant: Variant,
    prg_16kb_bank: u8,
    prg_8kb_bank: u8,
    chr_banks: [u8; 8],
    chr_type: ChrType,
    nametable_mirroring: NametableMirroring,
    ram_enabled: bool,
    irq: VrcIrqCounter,
}

impl Vrc6 {
    pub(crate) fn new(mapper_number: u16, chr_type: ChrType) -> Self {
        let variant = match mapper_number {
            24 => Variant::Vrc6a,
            26 => Variant::Vrc6b,
            _ => panic!("invalid VRC6 mapper number, expected 24/26: {mapper_number}"),
        };

        log::info!("VRC6 variant: {variant:?}");

        Self {
            variant,
            prg_16kb_bank: 0,
            prg_8kb_bank: 0,
            chr_banks: [0; 8],
            chr_type,
            nametable_mirroring: NametableMirroring::Vertical,
            ram_enabled: false,
            irq: VrcIrqCounter::new(),
        }
    }
}

impl MapperImpl<Vrc6> {
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
            0x8000..=0xBFFF => {
                BankSizeKb::Sixteen.to_absolute_address(self.data.prg_16kb_bank, address)
            }
            0xC000..=0xDFFF => {
                BankSizeKb::Eight.to_absolute_address(self.data.prg_8kb_bank, address)
            }
            0xE000..=0xFFFF => BankSizeKb::Eight
                .to_absolute_address_last_bank(self.cartridge.prg_rom.len() as u32, address),
            _ => panic!("invalid PRG ROM map address: {address:04X}"),
        };
        self.cartridge.get_prg_rom(prg_rom_addr)
    }

    pub(crate) fn high_write(&mut self, address: u16, value: u8) -> bool {
        let remapped = self.data.variant.remap_address(address & 0xF003);
        match remapped {
            0x8000..=0x8003 => {
                self.data.prg_16kb_bank = value & 0x0F;
            }
            0xB003 => {
                self.data.nametable_mirroring = match value & 0x0C {
                    0x00 => NametableMirroring::Vertical,
                    0x04 => NametableMirroring::Horizontal,
                    0x08 => NametableMirroring::SingleScreenBank0,
                    0x0C => NametableMirroring::SingleScreenBank1,
                    _ => unreachable!("value & 0x0C is always 0x00/0x04/0x08/0x0C"),
                };
                self.data.ram_enabled = value & 0x80 != 0;
            }
            0xC000..=0xC003 => {
                self.data.prg_8kb_bank = value & 0x1F;
            }
            0xD000..=0xE003 => {
                // $D000-$D003 => 0-3, $E000-$E003 => 4-7
                let chr_bank_index = 4 * ((remapped - 0xD000) / 0x1000) + (remapped & 0x03);
                self.data.chr_banks[chr_bank_index as usize] = value;
            }
            0xF000 => {
                self.data.irq.set_reload_value(value);
            }
            0xF001 => {
                self.data.irq.set_control(value);
            }
            0xF002 => {
                self.data.irq.acknowledge();
            }
            // audio channel registers ($9000-$B002) and undecoded addresses
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

    pub(crate) fn interrupt_flag(&self) -> bool {
        self.data.irq.interrupt_flag()
    }

    pub(crate) fn tick_cpu(&mut self, cycles: u32) {
        self.data.irq.tick_cpu(cycles);
    }

    pub(crate) fn reset(&mut self) {
        self.data.prg_16kb_bank = 0;
        self.data.prg_8kb_bank = 0;
        self.data.chr_banks = [0; 8];
        self.data.nametable_mirroring = NametableMirroring::Vertical;
        self.data.ram_enabled = false;
        self.data.irq = VrcIrqCounter::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::cartridge::test_fixtures::mapper_with_prg_rom;

    #[test]
    fn vrc6b_swaps_register_address_bits() {
        let mut vrc6a = mapper_with_prg_rom(Vrc6::new(24, ChrType::ROM), vec![0; 0x20000]);
        let mut vrc6b = mapper_with_prg_rom(Vrc6::new(26, ChrType::ROM), vec![0; 0x20000]);

        vrc6a.high_write(0xD001, 0x12);
        assert_eq!(vrc6a.data.chr_banks[1], 0x12);

        // On VRC6b the same physical address reaches CHR register 2
        vrc6b.high_write(0xD001, 0x12);
        assert_eq!(vrc6b.data.chr_banks[2], 0x12);
        assert_eq!(vrc6b.data.chr_banks[1], 0);
    }

    #[test]
    fn prg_banking_layout() {
        // 8 x 16KB banks
        let mut mapper = mapper_with_prg_rom(
            Vrc6::new(24, ChrType::ROM),
            (0..8).flat_map(|bank| [bank as u8; 0x4000]).collect(),
        );

        mapper.high_write(0x8000, 2);
        mapper.high_write(0xC000, 9);

        assert_eq!(mapper.high_read(0x8000), 2);
        assert_eq!(mapper.high_read(0xA000), 2);
        // 8KB bank number 9 is the second half of 16KB bank 4
        assert_eq!(mapper.high_read(0xC000), 4);
        assert_eq!(mapper.high_read(0xE000), 7);
    }

    #[test]
    fn undecoded_writes_are_not_claimed() {
        let mut mapper = mapper_with_prg_rom(Vrc6::new(24, ChrType::ROM), vec![0; 0x20000]);

        // pulse channel registers are not implemented
        assert!(!mapper.high_write(0x9000, 0xFF));
        assert!(!mapper.high_write(0xB000, 0xFF));
        assert!(mapper.high_write(0x8000, 1));
    }

    #[test]
    fn b003_controls_mirroring_and_ram() {
        let mut mapper = mapper_with_prg_rom(Vrc6::new(24, ChrType::ROM), vec![0; 0x20000]);
        mapper.cartridge.prg_ram = vec![0; 0x2000];

        assert_eq!(mapper.mid_read(0x6000), None);

        mapper.high_write(0xB003, 0x84);
        assert_eq!(mapper.data.nametable_mirroring, NametableMirroring::Horizontal);
        assert!(mapper.mid_write(0x6000, 0x55));
        assert_eq!(mapper.mid_read(0x6000), Some(0x55));
    }
}
