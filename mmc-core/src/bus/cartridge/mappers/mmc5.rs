//! Code for the MMC5 board (iNES mapper 5).
//!
//! Only the documented register set is implemented: PRG/CHR banking, RAM protection, extended
//! RAM as a raw CPU window, nametable mapping with fill mode, the scanline IRQ, and the
//! multiplier. Vertical-split mode and extended-attribute CHR mapping are not implemented.

use crate::bus;
use crate::bus::cartridge::mappers::{BankSizeKb, CpuMapResult};
use crate::bus::cartridge::MapperImpl;
use crate::num::GetBit;
use bincode::{Decode, Encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum PrgBankingMode {
    Mode0,
    Mode1,
    Mode2,
    Mode3,
}

impl PrgBankingMode {
    fn map_result(bank_number: u8, bank_size: BankSizeKb, address: u16) -> CpuMapResult {
        let is_rom = bank_number.bit(7);

        let masked_bank_number = if is_rom { bank_number & 0x7F } else { bank_number & 0x0F };

        // All bank numbers are treated as 8KB banks while selectively ignoring lower bits
        let shifted_bank_number = match bank_size {
            BankSizeKb::Eight => masked_bank_number,
            BankSizeKb::Sixteen => masked_bank_number >> 1,
            BankSizeKb::ThirtyTwo => masked_bank_number >> 2,
            _ => panic!("MMC5 PRG bank size should only be 8KB/16KB/32KB, was {bank_size:?}"),
        };

        let mapped_address = bank_size.to_absolute_address(shifted_bank_number, address);
        if is_rom { CpuMapResult::PrgROM(mapped_address) } else { CpuMapResult::PrgRAM(mapped_address) }
    }

    fn map_prg_address(self, prg_bank_registers: [u8; 5], address: u16) -> CpuMapResult {
        match address {
            0x0000..=0x5FFF => panic!("invalid MMC5 PRG map address: {address:04X}"),
            0x6000..=0x7FFF => {
                Self::map_result(prg_bank_registers[0] & 0x7F, BankSizeKb::Eight, address)
            }
            0x8000..=0xFFFF => match self {
                // 1x32KB
                Self::Mode0 => {
                    Self::map_result(prg_bank_registers[4] | 0x80, BankSizeKb::ThirtyTwo, address)
                }
                // 2x16KB
                Self::Mode1 => match address {
                    0x8000..=0xBFFF => {
                        Self::map_result(prg_bank_registers[2], BankSizeKb::Sixteen, address)
                    }
                    _ => Self::map_result(
                        prg_bank_registers[4] | 0x80,
                        BankSizeKb::Sixteen,
                        address,
                    ),
                },
                // 1x16KB + 2x8KB
                Self::Mode2 => match address {
                    0x8000..=0xBFFF => {
                        Self::map_result(prg_bank_registers[2], BankSizeKb::Sixteen, address)
                    }
                    0xC000..=0xDFFF => {
                        Self::map_result(prg_bank_registers[3], BankSizeKb::Eight, address)
                    }
                    _ => Self::map_result(prg_bank_registers[4] | 0x80, BankSizeKb::Eight, address),
                },
                // 4x8KB
                Self::Mode3 => {
                    let bank_register = (address & 0x7FFF) / 0x2000 + 1;
                    Self::map_result(
                        prg_bank_registers[bank_register as usize],
                        BankSizeKb::Eight,
                        address,
                    )
                }
            },
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
struct ChrMapper {
    bank_size: BankSizeKb,
    bank_registers: [u8; 12],
    last_register_written: u8,
}

impl ChrMapper {
    fn new() -> Self {
        Self { bank_size: BankSizeKb::Eight, bank_registers: [0; 12], last_register_written: 0 }
    }

    fn map_sprite_chr_address(&self, address: u16) -> u32 {
        match self.bank_size {
            BankSizeKb::Eight => {
                BankSizeKb::Eight.to_absolute_address(self.bank_registers[7], address)
            }
            BankSizeKb::Four => {
                // $0000-$0FFF to bank 3, $1000-$1FFF to bank 7
                let bank_register = 4 * (address / 0x1000) + 3;
                BankSizeKb::Four
                    .to_absolute_address(self.bank_registers[bank_register as usize], address)
            }
            BankSizeKb::Two => {
                let bank_register = 2 * (address / 0x0800) + 1;
                BankSizeKb::Two
                    .to_absolute_address(self.bank_registers[bank_register as usize], address)
            }
            BankSizeKb::One => {
                let bank_register = address / 0x0400;
                BankSizeKb::One
                    .to_absolute_address(self.bank_registers[bank_register as usize], address)
            }
            _ => panic!("MMC5 CHR bank size should always be 1/2/4/8"),
        }
    }

    fn map_bg_chr_address(&self, address: u16) -> u32 {
        match self.bank_size {
            BankSizeKb::Eight => {
                BankSizeKb::Eight.to_absolute_address(self.bank_registers[11], address)
            }
            BankSizeKb::Four => {
                BankSizeKb::Four.to_absolute_address(self.bank_registers[11], address)
            }
            BankSizeKb::Two => {
                let bank_register = 2 * ((address & 0x0FFF) / 0x0800) + 9;
                BankSizeKb::Two
                    .to_absolute_address(self.bank_registers[bank_register as usize], address)
            }
            BankSizeKb::One => {
                let bank_register = (address & 0x0FFF) / 0x0400 + 8;
                BankSizeKb::One
                    .to_absolute_address(self.bank_registers[bank_register as usize], address)
            }
            _ => panic!("MMC5 CHR bank size should always be 1/2/4/8"),
        }
    }

    // Without per-fetch sprite/BG tracking, the most recently written register set decides
    // which half of the bank registers is active
    fn map_chr_address(&self, address: u16) -> u32 {
        if self.last_register_written < 8 {
            self.map_sprite_chr_address(address)
        } else {
            self.map_bg_chr_address(address)
        }
    }

    fn process_bank_register_update(&mut self, address: u16, value: u8) {
        debug_assert!((0x5120..=0x512B).contains(&address));

        let register_index = (address - 0x5120) as usize;
        self.bank_registers[register_index] = value;
        self.last_register_written = register_index as u8;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum ExtendedRamMode {
    Nametable,
    NametableExtendedAttributes,
    ReadWrite,
    ReadOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum NametableMapping {
    VramPage0,
    VramPage1,
    ExtendedRam,
    FillMode,
}

impl NametableMapping {
    fn from_bits(bits: u8) -> Self {
        match bits {
            0x00 => Self::VramPage0,
            0x01 => Self::VramPage1,
            0x02 => Self::ExtendedRam,
            0x03 => Self::FillMode,
            _ => panic!("invalid nametable mapping bits: {bits:02X}"),
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
struct ScanlineCounter {
    compare_value: u8,
    irq_enabled: bool,
    irq_pending: bool,
    in_frame: bool,
}

impl ScanlineCounter {
    fn new() -> Self {
        Self { compare_value: 0, irq_enabled: false, irq_pending: false, in_frame: false }
    }

    fn scanline(&mut self, scanline: u16, in_vblank: bool, rendering_enabled: bool) {
        if in_vblank {
            self.in_frame = false;
            self.irq_pending = false;
            return;
        }

        if !rendering_enabled {
            self.in_frame = false;
            return;
        }

        self.in_frame = true;
        if self.compare_value != 0 && scanline == u16::from(self.compare_value) {
            log::trace!("MMC5 scanline IRQ pending at scanline {scanline}");
            self.irq_pending = true;
        }
    }

    fn interrupt_flag(&self) -> bool {
        self.irq_enabled && self.irq_pending
    }
}

#[derive(Debug, Clone, Copy, Encode, Decode)]
struct MultiplierUnit {
    operand_l: u16,
    operand_r: u16,
}

impl MultiplierUnit {
    fn new() -> Self {
        Self { operand_l: 0xFF, operand_r: 0xFF }
    }

    fn output(self) -> u16 {
        self.operand_l * self.operand_r
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Mmc5 {
    extended_ram: [u8; 1024],
    extended_ram_mode: ExtendedRamMode,
    prg_banking_mode: PrgBankingMode,
    prg_bank_registers: [u8; 5],
    chr_mapper: ChrMapper,
    nametable_mappings: [NametableMapping; 4],
    fill_mode_tile_data: u8,
    fill_mode_attributes: u8,
    scanline_counter: ScanlineCounter,
    multiplier: MultiplierUnit,
    ram_writes_enabled_1: bool,
    ram_writes_enabled_2: bool,
}

impl Mmc5 {
    pub(crate) fn new() -> Self {
        Self {
            extended_ram: [0; 1024],
            extended_ram_mode: ExtendedRamMode::ReadOnly,
            prg_banking_mode: PrgBankingMode::Mode3,
            prg_bank_registers: [0xFF; 5],
            chr_mapper: ChrMapper::new(),
            nametable_mappings: [NametableMapping::VramPage0; 4],
            fill_mode_tile_data: 0,
            fill_mode_attributes: 0,
            scanline_counter: ScanlineCounter::new(),
            multiplier: MultiplierUnit::new(),
            ram_writes_enabled_1: false,
            ram_writes_enabled_2: false,
        }
    }
}

impl MapperImpl<Mmc5> {
    pub(crate) fn low_read(&mut self, address: u16) -> Option<u8> {
        match address {
            0x5204 => {
                let result = (u8::from(self.data.scanline_counter.irq_pending) << 7)
                    | (u8::from(self.data.scanline_counter.in_frame) << 6);
                self.data.scanline_counter.irq_pending = false;
                Some(result)
            }
            0x5205 => Some((self.data.multiplier.output() & 0x00FF) as u8),
            0x5206 => Some((self.data.multiplier.output() >> 8) as u8),
            0x5C00..=0x5FFF => match self.data.extended_ram_mode {
                ExtendedRamMode::ReadWrite | ExtendedRamMode::ReadOnly => {
                    Some(self.data.extended_ram[(address - 0x5C00) as usize])
                }
                ExtendedRamMode::Nametable | ExtendedRamMode::NametableExtendedAttributes => None,
            },
            _ => None,
        }
    }

    pub(crate) fn low_write(&mut self, address: u16, value: u8) -> bool {
        match address {
            0x5100 => {
                self.data.prg_banking_mode = match value & 0x03 {
                    0x00 => PrgBankingMode::Mode0,
                    0x01 => PrgBankingMode::Mode1,
                    0x02 => PrgBankingMode::Mode2,
                    0x03 => PrgBankingMode::Mode3,
                    _ => unreachable!("value & 0x03 is always <= 0x03"),
                };
            }
            0x5101 => {
                self.data.chr_mapper.bank_size = match value & 0x03 {
                    0x00 => BankSizeKb::Eight,
                    0x01 => BankSizeKb::Four,
                    0x02 => BankSizeKb::Two,
                    0x03 => BankSizeKb::One,
                    _ => unreachable!("value & 0x03 is always <= 0x03"),
                };
            }
            0x5102 => {
                self.data.ram_writes_enabled_1 = value & 0x03 == 0x02;
            }
            0x5103 => {
                self.data.ram_writes_enabled_2 = value & 0x03 == 0x01;
            }
            0x5104 => {
                self.data.extended_ram_mode = match value & 0x03 {
                    0x00 => ExtendedRamMode::Nametable,
                    0x01 => ExtendedRamMode::NametableExtendedAttributes,
                    0x02 => ExtendedRamMode::ReadWrite,
                    0x03 => ExtendedRamMode::ReadOnly,
                    _ => unreachable!("value & 0x03 is always <= 0x03"),
                };
            }
            0x5105 => {
                self.data.nametable_mappings[0] = NametableMapping::from_bits(value & 0x03);
                self.data.nametable_mappings[1] = NametableMapping::from_bits((value >> 2) & 0x03);
                self.data.nametable_mappings[2] = NametableMapping::from_bits((value >> 4) & 0x03);
                self.data.nametable_mappings[3] = NametableMapping::from_bits((value >> 6) & 0x03);
            }
            0x5106 => {
                self.data.fill_mode_tile_data = value;
            }
            0x5107 => {
                let palette_index = value & 0x03;
                self.data.fill_mode_attributes = palette_index
                    | (palette_index << 2)
                    | (palette_index << 4)
                    | (palette_index << 6);
            }
            0x5113..=0x5117 => {
                self.data.prg_bank_registers[(address - 0x5113) as usize] = value;
            }
            0x5120..=0x512B => {
                self.data.chr_mapper.process_bank_register_update(address, value);
            }
            0x5203 => {
                self.data.scanline_counter.compare_value = value;
            }
            0x5204 => {
                self.data.scanline_counter.irq_enabled = value.bit(7);
            }
            0x5205 => {
                self.data.multiplier.operand_l = value.into();
            }
            0x5206 => {
                self.data.multiplier.operand_r = value.into();
            }
            0x5C00..=0x5FFF => {
                if self.data.extended_ram_mode == ExtendedRamMode::ReadOnly {
                    return false;
                }
                self.data.extended_ram[(address - 0x5C00) as usize] = value;
            }
            _ => return false,
        }
        true
    }

    pub(crate) fn mid_read(&self, address: u16) -> Option<u8> {
        if self.cartridge.prg_ram.is_empty() {
            return None;
        }
        Some(
            self.data
                .prg_banking_mode
                .map_prg_address(self.data.prg_bank_registers, address)
                .read(&self.cartridge),
        )
    }

    pub(crate) fn mid_write(&mut self, address: u16, value: u8) -> bool {
        if self.cartridge.prg_ram.is_empty() || !self.prg_ram_writes_enabled() {
            return false;
        }
        self.data
            .prg_banking_mode
            .map_prg_address(self.data.prg_bank_registers, address)
            .write(value, &mut self.cartridge);
        true
    }

    pub(crate) fn high_read(&mut self, address: u16) -> u8 {
        if address == 0xFFFA || address == 0xFFFB {
            // NMI vector fetch ends the rendered frame
            self.data.scanline_counter.in_frame = false;
            self.data.scanline_counter.irq_pending = false;
        }

        self.data
            .prg_banking_mode
            .map_prg_address(self.data.prg_bank_registers, address)
            .read(&self.cartridge)
    }

    pub(crate) fn high_write(&mut self, address: u16, value: u8) -> bool {
        let map_result =
            self.data.prg_banking_mode.map_prg_address(self.data.prg_bank_registers, address);
        match map_result {
            CpuMapResult::PrgRAM(_) if self.prg_ram_writes_enabled() => {
                map_result.write(value, &mut self.cartridge);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn read_ppu_address(&mut self, address: u16, vram: &[u8; 2048]) -> u8 {
        match address {
            0x0000..=0x1FFF => {
                let chr_addr = self.data.chr_mapper.map_chr_address(address);
                if !self.cartridge.chr_rom.is_empty() {
                    self.cartridge.get_chr_rom(chr_addr)
                } else {
                    self.cartridge.get_chr_ram(chr_addr)
                }
            }
            0x2000..=0x3EFF => {
                let relative_addr = address & 0x0FFF;
                let nametable_mapping =
                    self.data.nametable_mappings[(relative_addr >> 10) as usize];
                match nametable_mapping {
                    NametableMapping::VramPage0 => vram[(relative_addr & 0x03FF) as usize],
                    NametableMapping::VramPage1 => {
                        vram[(0x0400 | (relative_addr & 0x03FF)) as usize]
                    }
                    NametableMapping::ExtendedRam => match self.data.extended_ram_mode {
                        ExtendedRamMode::Nametable
                        | ExtendedRamMode::NametableExtendedAttributes => {
                            self.data.extended_ram[(relative_addr & 0x03FF) as usize]
                        }
                        ExtendedRamMode::ReadWrite | ExtendedRamMode::ReadOnly => {
                            bus::cpu_open_bus(address)
                        }
                    },
                    NametableMapping::FillMode => {
                        if relative_addr & 0x03FF < 0x03C0 {
                            self.data.fill_mode_tile_data
                        } else {
                            self.data.fill_mode_attributes
                        }
                    }
                }
            }
            _ => panic!("invalid PPU map address: {address:04X}"),
        }
    }

    pub(crate) fn write_ppu_address(&mut self, address: u16, value: u8, vram: &mut [u8; 2048]) {
        match address {
            0x0000..=0x1FFF => {
                if self.cartridge.chr_rom.is_empty() {
                    self.cartridge.set_chr_ram(self.data.chr_mapper.map_chr_address(address), value);
                }
            }
            0x2000..=0x3EFF => {
                let relative_addr = address & 0x0FFF;
                let nametable_mapping =
                    self.data.nametable_mappings[(relative_addr >> 10) as usize];
                match nametable_mapping {
                    NametableMapping::VramPage0 => {
                        vram[(relative_addr & 0x03FF) as usize] = value;
                    }
                    NametableMapping::VramPage1 => {
                        vram[(0x0400 | (relative_addr & 0x03FF)) as usize] = value;
                    }
                    NametableMapping::ExtendedRam => {
                        self.data.extended_ram[(relative_addr & 0x03FF) as usize] = value;
                    }
                    NametableMapping::FillMode => {}
                }
            }
            _ => panic!("invalid PPU map address: {address:04X}"),
        }
    }

    fn prg_ram_writes_enabled(&self) -> bool {
        self.data.ram_writes_enabled_1 && self.data.ram_writes_enabled_2
    }

    pub(crate) fn scanline(&mut self, scanline: u16, in_vblank: bool, rendering_enabled: bool) {
        self.data.scanline_counter.scanline(scanline, in_vblank, rendering_enabled);
    }

    pub(crate) fn interrupt_flag(&self) -> bool {
        self.data.scanline_counter.interrupt_flag()
    }

    pub(crate) fn reset(&mut self) {
        self.data.extended_ram_mode = ExtendedRamMode::ReadOnly;
        self.data.prg_banking_mode = PrgBankingMode::Mode3;
        self.data.prg_bank_registers = [0xFF; 5];
        self.data.chr_mapper = ChrMapper::new();
        self.data.nametable_mappings = [NametableMapping::VramPage0; 4];
        self.data.fill_mode_tile_data = 0;
        self.data.fill_mode_attributes = 0;
        self.data.scanline_counter = ScanlineCounter::new();
        self.data.multiplier = MultiplierUnit::new();
        self.data.ram_writes_enabled_1 = false;
        self.data.ram_writes_enabled_2 = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::cartridge::test_fixtures::mapper_with_prg_rom;

    fn mmc5_mapper() -> MapperImpl<Mmc5> {
        // 16 x 8KB banks, each filled with its bank index
        let mut mapper = mapper_with_prg_rom(
            Mmc5::new(),
            (0..16).flat_map(|bank| [bank as u8; 0x2000]).collect(),
        );
        mapper.cartridge.prg_ram = vec![0; 0x10000];
        mapper
    }

    #[test]
    fn prg_mode_3_banking() {
        let mut mapper = mmc5_mapper();

        // power-on maps the last ROM bank everywhere
        assert_eq!(mapper.high_read(0x8000), 15);
        assert_eq!(mapper.high_read(0xE000), 15);

        mapper.low_write(0x5114, 0x82);
        mapper.low_write(0x5115, 0x83);
        mapper.low_write(0x5116, 0x84);
        assert_eq!(mapper.high_read(0x8000), 2);
        assert_eq!(mapper.high_read(0xA000), 3);
        assert_eq!(mapper.high_read(0xC000), 4);
        assert_eq!(mapper.high_read(0xE000), 15);
    }

    #[test]
    fn prg_bank_rom_bit_selects_ram() {
        let mut mapper = mmc5_mapper();

        mapper.low_write(0x5102, 0x02);
        mapper.low_write(0x5103, 0x01);

        // bank register bit 7 clear maps PRG RAM
        mapper.low_write(0x5114, 0x01);
        assert!(mapper.high_write(0x8000, 0xAB));
        assert_eq!(mapper.high_read(0x8000), 0xAB);

        mapper.low_write(0x5114, 0x81);
        assert_eq!(mapper.high_read(0x8000), 1);
        assert!(!mapper.high_write(0x8000, 0xCD));
    }

    #[test]
    fn multiplier() {
        let mut mapper = mmc5_mapper();

        mapper.low_write(0x5205, 13);
        mapper.low_write(0x5206, 200);
        assert_eq!(mapper.low_read(0x5205), Some((2600_u16 & 0x00FF) as u8));
        assert_eq!(mapper.low_read(0x5206), Some((2600_u16 >> 8) as u8));
    }

    #[test]
    fn scanline_irq_and_status_read() {
        let mut mapper = mmc5_mapper();

        mapper.low_write(0x5203, 100);
        mapper.low_write(0x5204, 0x80);

        mapper.scanline(99, false, true);
        assert!(!mapper.interrupt_flag());

        mapper.scanline(100, false, true);
        assert!(mapper.interrupt_flag());

        // status read reports pending + in frame, then clears pending
        assert_eq!(mapper.low_read(0x5204), Some(0xC0));
        assert!(!mapper.interrupt_flag());
        assert_eq!(mapper.low_read(0x5204), Some(0x40));

        // entering vblank clears the in-frame flag
        mapper.scanline(241, true, true);
        assert_eq!(mapper.low_read(0x5204), Some(0x00));
    }

    #[test]
    fn extended_ram_window_modes() {
        let mut mapper = mmc5_mapper();

        // read-only at power-on
        assert!(!mapper.low_write(0x5C00, 0xAB));
        assert_eq!(mapper.low_read(0x5C00), Some(0x00));

        mapper.low_write(0x5104, 0x02);
        assert!(mapper.low_write(0x5C00, 0xAB));
        assert_eq!(mapper.low_read(0x5C00), Some(0xAB));

        // nametable modes hide the CPU window
        mapper.low_write(0x5104, 0x00);
        assert_eq!(mapper.low_read(0x5C00), None);
    }
}
