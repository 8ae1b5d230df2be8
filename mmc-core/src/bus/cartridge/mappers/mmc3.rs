//! Code for the MMC3 board (iNES mapper 4).

use crate::bus::cartridge::mappers::{
    BankSizeKb, ChrType, HasBasicPpuMapping, NametableMirroring, PpuMapResult,
};
use crate::bus::cartridge::MapperImpl;
use crate::num::GetBit;
use bincode::{Decode, Encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum PrgMode {
    Mode0,
    Mode1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum ChrMode {
    Mode0,
    Mode1,
}

#[derive(Debug, Clone, Encode, Decode)]
struct Mmc3BankMapping {
    prg_mode: PrgMode,
    chr_mode: ChrMode,
    prg_rom_len: u32,
    prg_bank_0: u8,
    prg_bank_1: u8,
    chr_banks: [u8; 6],
}

impl Mmc3BankMapping {
    fn new(prg_rom_len: u32) -> Self {
        Self {
            prg_mode: PrgMode::Mode0,
            chr_mode: ChrMode::Mode0,
            prg_rom_len,
            prg_bank_0: 0,
            prg_bank_1: 0,
            chr_banks: [0; 6],
        }
    }

    fn prg_bank_address(&self, bank_number: u8, address: u16) -> u32 {
        BankSizeKb::Eight.to_absolute_address(bank_number, address)
    }

    fn prg_rom_address(&self, address: u16) -> u32 {
        match (self.prg_mode, address) {
            (PrgMode::Mode0, 0x8000..=0x9FFF) => self.prg_bank_address(self.prg_bank_0, address),
            (PrgMode::Mode1, 0x8000..=0x9FFF) => {
                BankSizeKb::Eight.to_absolute_address_from_end(1_u8, self.prg_rom_len, address)
            }
            (_, 0xA000..=0xBFFF) => self.prg_bank_address(self.prg_bank_1, address),
            (PrgMode::Mode0, 0xC000..=0xDFFF) => {
                BankSizeKb::Eight.to_absolute_address_from_end(1_u8, self.prg_rom_len, address)
            }
            (PrgMode::Mode1, 0xC000..=0xDFFF) => self.prg_bank_address(self.prg_bank_0, address),
            (_, 0xE000..=0xFFFF) => {
                BankSizeKb::Eight.to_absolute_address_last_bank(self.prg_rom_len, address)
            }
            _ => panic!("invalid PRG ROM map address: {address:04X}"),
        }
    }

    fn chr_2kb_bank_address(&self, bank_index: usize, address: u16) -> u32 {
        // 2KB banks ignore bit 0 of the bank number
        BankSizeKb::Two.to_absolute_address(self.chr_banks[bank_index] >> 1, address)
    }

    fn chr_1kb_bank_address(&self, bank_index: usize, address: u16) -> u32 {
        BankSizeKb::One.to_absolute_address(self.chr_banks[bank_index], address)
    }

    fn chr_address(&self, address: u16) -> u32 {
        match (self.chr_mode, address) {
            (ChrMode::Mode0, 0x0000..=0x07FF) => self.chr_2kb_bank_address(0, address),
            (ChrMode::Mode0, 0x0800..=0x0FFF) => self.chr_2kb_bank_address(1, address),
            (ChrMode::Mode0, 0x1000..=0x13FF) => self.chr_1kb_bank_address(2, address),
            (ChrMode::Mode0, 0x1400..=0x17FF) => self.chr_1kb_bank_address(3, address),
            (ChrMode::Mode0, 0x1800..=0x1BFF) => self.chr_1kb_bank_address(4, address),
            (ChrMode::Mode0, 0x1C00..=0x1FFF) => self.chr_1kb_bank_address(5, address),
            (ChrMode::Mode1, 0x0000..=0x03FF) => self.chr_1kb_bank_address(2, address),
            (ChrMode::Mode1, 0x0400..=0x07FF) => self.chr_1kb_bank_address(3, address),
            (ChrMode::Mode1, 0x0800..=0x0BFF) => self.chr_1kb_bank_address(4, address),
            (ChrMode::Mode1, 0x0C00..=0x0FFF) => self.chr_1kb_bank_address(5, address),
            (ChrMode::Mode1, 0x1000..=0x17FF) => self.chr_2kb_bank_address(0, address),
            (ChrMode::Mode1, 0x1800..=0x1FFF) => self.chr_2kb_bank_address(1, address),
            _ => panic!("invalid CHR map address: {address:04X}"),
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Mmc3 {
    chr_type: ChrType,
    bank_mapping: Mmc3BankMapping,
    nametable_mirroring: NametableMirroring,
    bank_update_select: u8,
    ram_enabled: bool,
    ram_writes_disabled: bool,
    irq_counter: u8,
    irq_reload_value: u8,
    irq_reload_flag: bool,
    irq_enabled: bool,
    interrupt_flag: bool,
}

impl Mmc3 {
    pub(crate) fn new(chr_type: ChrType, prg_rom_len: u32) -> Self {
        Self {
            chr_type,
            bank_mapping: Mmc3BankMapping::new(prg_rom_len),
            nametable_mirroring: NametableMirroring::Vertical,
            bank_update_select: 0,
            ram_enabled: false,
            ram_writes_disabled: false,
            irq_counter: 0,
            irq_reload_value: 0,
            irq_reload_flag: false,
            irq_enabled: false,
            interrupt_flag: false,
        }
    }

    fn clock_irq(&mut self) {
        if self.irq_counter == 0 || self.irq_reload_flag {
            self.irq_counter = self.irq_reload_value;
            self.irq_reload_flag = false;
        } else {
            self.irq_counter -= 1;
        }

        if self.irq_counter == 0 && self.irq_enabled {
            log::trace!("MMC3 scanline IRQ triggered");
            self.interrupt_flag = true;
        }
    }
}

impl MapperImpl<Mmc3> {
    pub(crate) fn mid_read(&self, address: u16) -> Option<u8> {
        if !self.data.ram_enabled || self.cartridge.prg_ram.is_empty() {
            return None;
        }
        Some(self.cartridge.get_prg_ram(u32::from(address & 0x1FFF)))
    }

    pub(crate) fn mid_write(&mut self, address: u16, value: u8) -> bool {
        if !self.data.ram_enabled
            || self.data.ram_writes_disabled
            || self.cartridge.prg_ram.is_empty()
        {
            return false;
        }
        self.cartridge.set_prg_ram(u32::from(address & 0x1FFF), value);
        true
    }

    pub(crate) fn high_read(&mut self, address: u16) -> u8 {
        self.cartridge.get_prg_rom(self.data.bank_mapping.prg_rom_address(address))
    }

    pub(crate) fn high_write(&mut self, address: u16, value: u8) -> bool {
        match address & 0xE001 {
            0x8000 => {
                self.data.bank_update_select = value & 0x07;
                self.data.bank_mapping.prg_mode =
                    if value.bit(6) { PrgMode::Mode1 } else { PrgMode::Mode0 };
                self.data.bank_mapping.chr_mode =
                    if value.bit(7) { ChrMode::Mode1 } else { ChrMode::Mode0 };
            }
            0x8001 => match self.data.bank_update_select {
                chr @ 0..=5 => {
                    self.data.bank_mapping.chr_banks[chr as usize] = value;
                }
                6 => {
                    self.data.bank_mapping.prg_bank_0 = value & 0x3F;
                }
                7 => {
                    self.data.bank_mapping.prg_bank_1 = value & 0x3F;
                }
                _ => unreachable!("bank_update_select is always <= 7"),
            },
            0xA000 => {
                self.data.nametable_mirroring = if value.bit(0) {
                    NametableMirroring::Horizontal
                } else {
                    NametableMirroring::Vertical
                };
            }
            0xA001 => {
                self.data.ram_enabled = value.bit(7);
                self.data.ram_writes_disabled = value.bit(6);
            }
            0xC000 => {
                self.data.irq_reload_value = value;
            }
            0xC001 => {
                self.data.irq_reload_flag = true;
            }
            0xE000 => {
                // Disabling also reloads the counter from the latch
                self.data.irq_enabled = false;
                self.data.interrupt_flag = false;
                self.data.irq_counter = self.data.irq_reload_value;
            }
            0xE001 => {
                self.data.irq_enabled = true;
            }
            _ => unreachable!("address & 0xE001 only produces the register addresses"),
        }
        true
    }

    pub(crate) fn scanline(&mut self, _scanline: u16, in_vblank: bool, rendering_enabled: bool) {
        if !in_vblank && rendering_enabled {
            self.data.clock_irq();
        }
    }

    pub(crate) fn interrupt_flag(&self) -> bool {
        self.data.interrupt_flag
    }

    pub(crate) fn reset(&mut self) {
        let prg_rom_len = self.data.bank_mapping.prg_rom_len;
        self.data.bank_mapping = Mmc3BankMapping::new(prg_rom_len);
        self.data.bank_update_select = 0;
        self.data.irq_counter = 0;
        self.data.irq_reload_value = 0;
        self.data.irq_reload_flag = false;
        self.data.irq_enabled = false;
        self.data.interrupt_flag = false;
    }
}

impl HasBasicPpuMapping for MapperImpl<Mmc3> {
    fn map_ppu_address(&self, address: u16) -> PpuMapResult {
        match address {
            0x0000..=0x1FFF => {
                self.data.chr_type.to_map_result(self.data.bank_mapping.chr_address(address))
            }
            0x2000..=0x3EFF => {
                PpuMapResult::Vram(self.data.nametable_mirroring.map_to_vram(address))
            }
            _ => panic!("invalid PPU map address: {address:04X}"),
        }
    }
}
