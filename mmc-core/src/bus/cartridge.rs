//! Cartridge memory arenas, the mapper registry, and the `Mapper` dispatch enum.

mod mappers;

use crate::api::CartridgeData;
use crate::bus::cartridge::mappers::{
    Axrom, Bandai74161, ChrType, Cnrom, Mmc1, Mmc2, Mmc3, Mmc5, Namco163, Nrom, Unsupported, Uxrom,
    Vrc4, Vrc6, Vrc7,
};
use bincode::{Decode, Encode};
use mmc_proc_macros::MatchEachVariantMacro;

pub use mappers::NametableMirroring;

/// All ROM/RAM owned by the loaded cartridge.
///
/// Every accessor masks the address with `len - 1`, which is why ROM lengths are validated
/// power-of-two at load: out-of-range bank indices wrap instead of indexing out of bounds.
#[derive(Debug, Clone, Encode, Decode)]
struct Cartridge {
    prg_rom: Vec<u8>,
    prg_ram: Vec<u8>,
    has_ram_battery: bool,
    prg_ram_dirty_bit: bool,
    chr_rom: Vec<u8>,
    chr_ram: Vec<u8>,
}

impl Cartridge {
    fn get_prg_rom(&self, address: u32) -> u8 {
        self.prg_rom[(address as usize) & (self.prg_rom.len() - 1)]
    }

    fn get_prg_ram(&self, address: u32) -> u8 {
        if !self.prg_ram.is_empty() {
            self.prg_ram[(address as usize) & (self.prg_ram.len() - 1)]
        } else {
            0xFF
        }
    }

    fn set_prg_ram(&mut self, address: u32, value: u8) {
        if !self.prg_ram.is_empty() {
            let prg_ram_len = self.prg_ram.len();
            self.prg_ram[(address as usize) & (prg_ram_len - 1)] = value;
            if self.has_ram_battery {
                self.prg_ram_dirty_bit = true;
            }
        }
    }

    fn get_chr_rom(&self, address: u32) -> u8 {
        self.chr_rom[(address as usize) & (self.chr_rom.len() - 1)]
    }

    fn get_chr_ram(&self, address: u32) -> u8 {
        if !self.chr_ram.is_empty() {
            self.chr_ram[(address as usize) & (self.chr_ram.len() - 1)]
        } else {
            0xFF
        }
    }

    fn set_chr_ram(&mut self, address: u32, value: u8) {
        if !self.chr_ram.is_empty() {
            let chr_ram_len = self.chr_ram.len();
            self.chr_ram[(address as usize) & (chr_ram_len - 1)] = value;
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct MapperImpl<MapperData> {
    cartridge: Cartridge,
    data: MapperData,
}

#[allow(clippy::large_enum_variant)]
#[derive(Debug, Clone, Encode, Decode, MatchEachVariantMacro)]
pub(crate) enum Mapper {
    Axrom(MapperImpl<Axrom>),
    Bandai74161(MapperImpl<Bandai74161>),
    Cnrom(MapperImpl<Cnrom>),
    Mmc1(MapperImpl<Mmc1>),
    // Used for both MMC2 and MMC4 because they're almost exactly the same
    Mmc2(MapperImpl<Mmc2>),
    Mmc3(MapperImpl<Mmc3>),
    Mmc5(MapperImpl<Mmc5>),
    Namco163(MapperImpl<Namco163>),
    Nrom(MapperImpl<Nrom>),
    Unsupported(MapperImpl<Unsupported>),
    Uxrom(MapperImpl<Uxrom>),
    Vrc4(MapperImpl<Vrc4>),
    Vrc6(MapperImpl<Vrc6>),
    Vrc7(MapperImpl<Vrc7>),
}

impl Mapper {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Axrom(..) => "AxROM",
            Self::Bandai74161(..) => "74161/32 discrete",
            Self::Cnrom(..) => "CNROM",
            Self::Mmc1(..) => "MMC1",
            Self::Mmc2(mmc2) => mmc2.name(),
            Self::Mmc3(..) => "MMC3",
            Self::Mmc5(..) => "MMC5",
            Self::Namco163(..) => "Namco 163",
            Self::Nrom(..) => "NROM",
            Self::Unsupported(..) => "Unsupported",
            Self::Uxrom(..) => "UxROM",
            Self::Vrc4(vrc4) => vrc4.name(),
            Self::Vrc6(..) => "VRC6",
            Self::Vrc7(..) => "VRC7",
        }
    }

    /// Cartridge expansion reads in $4020-$5FFF; None means the board does not drive the bus.
    pub(crate) fn low_read(&mut self, address: u16) -> Option<u8> {
        match self {
            Self::Mmc5(mmc5) => mmc5.low_read(address),
            Self::Namco163(namco163) => namco163.low_read(address),
            _ => None,
        }
    }

    /// Cartridge expansion writes in $4020-$5FFF; false means the board ignored the write.
    pub(crate) fn low_write(&mut self, address: u16, value: u8) -> bool {
        match self {
            Self::Mmc5(mmc5) => mmc5.low_write(address, value),
            Self::Namco163(namco163) => namco163.low_write(address, value),
            _ => false,
        }
    }

    pub(crate) fn mid_read(&self, address: u16) -> Option<u8> {
        match_each_variant!(self, mapper => mapper.mid_read(address))
    }

    pub(crate) fn mid_write(&mut self, address: u16, value: u8) -> bool {
        match_each_variant!(self, mapper => mapper.mid_write(address, value))
    }

    pub(crate) fn high_read(&mut self, address: u16) -> u8 {
        match_each_variant!(self, mapper => mapper.high_read(address))
    }

    pub(crate) fn high_write(&mut self, address: u16, value: u8) -> bool {
        match_each_variant!(self, mapper => mapper.high_write(address, value))
    }

    pub(crate) fn read_ppu_address(&mut self, address: u16, vram: &[u8; 2048]) -> u8 {
        match_each_variant!(self, mapper => mapper.read_ppu_address(address, vram))
    }

    pub(crate) fn write_ppu_address(&mut self, address: u16, value: u8, vram: &mut [u8; 2048]) {
        match_each_variant!(self, mapper => mapper.write_ppu_address(address, value, vram));
    }

    /// Called by the video subsystem once per scanline; drives the MMC3 and MMC5 scanline
    /// IRQ counters.
    pub(crate) fn scanline(&mut self, scanline: u16, in_vblank: bool, rendering_enabled: bool) {
        match self {
            Self::Mmc3(mmc3) => {
                mmc3.scanline(scanline, in_vblank, rendering_enabled);
            }
            Self::Mmc5(mmc5) => {
                mmc5.scanline(scanline, in_vblank, rendering_enabled);
            }
            _ => {}
        }
    }

    /// Advances the CPU-cycle-clocked IRQ counters (VRC and Namco boards).
    pub(crate) fn tick_cpu(&mut self, cycles: u32) {
        match self {
            Self::Namco163(namco163) => {
                namco163.tick_cpu(cycles);
            }
            Self::Vrc4(vrc4) => {
                vrc4.tick_cpu(cycles);
            }
            Self::Vrc6(vrc6) => {
                vrc6.tick_cpu(cycles);
            }
            Self::Vrc7(vrc7) => {
                vrc7.tick_cpu(cycles);
            }
            _ => {}
        }
    }

    pub(crate) fn interrupt_flag(&self) -> bool {
        match self {
            Self::Mmc3(mmc3) => mmc3.interrupt_flag(),
            Self::Mmc5(mmc5) => mmc5.interrupt_flag(),
            Self::Namco163(namco163) => namco163.interrupt_flag(),
            Self::Vrc4(vrc4) => vrc4.interrupt_flag(),
            Self::Vrc6(vrc6) => vrc6.interrupt_flag(),
            Self::Vrc7(vrc7) => vrc7.interrupt_flag(),
            _ => false,
        }
    }

    /// Restores the board's documented power-on register state. RAM contents are preserved.
    pub(crate) fn reset(&mut self) {
        match_each_variant!(self, mapper => mapper.reset());
    }

    pub(crate) fn unsupported_mapper_number(&self) -> Option<u16> {
        match self {
            Self::Unsupported(unsupported) => Some(unsupported.mapper_number()),
            _ => None,
        }
    }

    pub(crate) fn get_and_clear_ram_dirty_bit(&mut self) -> bool {
        match_each_variant!(self, mapper => {
            let dirty_bit = mapper.cartridge.prg_ram_dirty_bit;
            mapper.cartridge.prg_ram_dirty_bit = false;
            dirty_bit
        })
    }

    pub(crate) fn get_prg_ram(&self) -> &[u8] {
        match_each_variant!(self, mapper => &mapper.cartridge.prg_ram)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapperDescriptor {
    pub number: u16,
    pub name: &'static str,
}

/// Every iNES mapper number this crate implements.
pub static MAPPER_TABLE: &[MapperDescriptor] = &[
    MapperDescriptor { number: 0, name: "NROM" },
    MapperDescriptor { number: 1, name: "MMC1" },
    MapperDescriptor { number: 2, name: "UxROM" },
    MapperDescriptor { number: 3, name: "CNROM" },
    MapperDescriptor { number: 4, name: "MMC3" },
    MapperDescriptor { number: 5, name: "MMC5" },
    MapperDescriptor { number: 7, name: "AxROM" },
    MapperDescriptor { number: 9, name: "MMC2" },
    MapperDescriptor { number: 10, name: "MMC4" },
    MapperDescriptor { number: 19, name: "Namco 163" },
    MapperDescriptor { number: 21, name: "VRC4" },
    MapperDescriptor { number: 22, name: "VRC2" },
    MapperDescriptor { number: 23, name: "VRC2/VRC4" },
    MapperDescriptor { number: 24, name: "VRC6" },
    MapperDescriptor { number: 25, name: "VRC2/VRC4" },
    MapperDescriptor { number: 26, name: "VRC6" },
    MapperDescriptor { number: 70, name: "74161/32 discrete" },
    MapperDescriptor { number: 85, name: "VRC7" },
    MapperDescriptor { number: 152, name: "74161/32 discrete" },
];

pub fn mapper_descriptor(mapper_number: u16) -> Option<MapperDescriptor> {
    MAPPER_TABLE.iter().copied().find(|descriptor| descriptor.number == mapper_number)
}

pub(crate) fn new_mapper(cartridge_data: CartridgeData) -> Mapper {
    let CartridgeData {
        prg_rom,
        chr_rom,
        prg_ram_len,
        chr_ram_len,
        mapper_number,
        sub_mapper_number,
        nametable_mirroring,
        has_battery,
    } = cartridge_data;

    let prg_rom_len = prg_rom.len() as u32;
    let chr_rom_len = chr_rom.len() as u32;
    let chr_type = if chr_rom.is_empty() { ChrType::RAM } else { ChrType::ROM };

    let cartridge = Cartridge {
        prg_rom,
        prg_ram: vec![0; prg_ram_len as usize],
        has_ram_battery: has_battery,
        prg_ram_dirty_bit: false,
        chr_rom,
        chr_ram: vec![0; chr_ram_len as usize],
    };

    let mapper = match mapper_number {
        0 => Mapper::Nrom(MapperImpl {
            cartridge,
            data: Nrom::new(chr_type, nametable_mirroring),
        }),
        1 => Mapper::Mmc1(MapperImpl { cartridge, data: Mmc1::new(chr_type) }),
        2 => Mapper::Uxrom(MapperImpl {
            cartridge,
            data: Uxrom::new(chr_type, nametable_mirroring),
        }),
        3 => Mapper::Cnrom(MapperImpl {
            cartridge,
            data: Cnrom::new(chr_type, nametable_mirroring),
        }),
        4 => Mapper::Mmc3(MapperImpl { cartridge, data: Mmc3::new(chr_type, prg_rom_len) }),
        5 => Mapper::Mmc5(MapperImpl { cartridge, data: Mmc5::new() }),
        7 => Mapper::Axrom(MapperImpl { cartridge, data: Axrom::new(chr_type) }),
        9 => Mapper::Mmc2(MapperImpl { cartridge, data: Mmc2::new_mmc2() }),
        10 => Mapper::Mmc2(MapperImpl { cartridge, data: Mmc2::new_mmc4() }),
        19 => Mapper::Namco163(MapperImpl { cartridge, data: Namco163::new(chr_type) }),
        21 | 22 | 23 | 25 => Mapper::Vrc4(MapperImpl {
            cartridge,
            data: Vrc4::new(mapper_number, sub_mapper_number, chr_type),
        }),
        24 | 26 => Mapper::Vrc6(MapperImpl {
            cartridge,
            data: Vrc6::new(mapper_number, chr_type),
        }),
        70 | 152 => Mapper::Bandai74161(MapperImpl {
            cartridge,
            data: Bandai74161::new(chr_type, nametable_mirroring, mapper_number == 152),
        }),
        85 => Mapper::Vrc7(MapperImpl {
            cartridge,
            data: Vrc7::new(sub_mapper_number, chr_type),
        }),
        _ => {
            log::warn!(
                "Unsupported mapper number {mapper_number}; PRG reads will return open bus and all cartridge writes will be ignored"
            );
            Mapper::Unsupported(MapperImpl {
                cartridge,
                data: Unsupported::new(mapper_number, nametable_mirroring),
            })
        }
    };

    log::info!("Mapper number: {} ({})", mapper_number, mapper.name());
    log::info!("PRG ROM size: {prg_rom_len}");
    log::info!("PRG RAM size: {prg_ram_len}");
    log::info!("Cartridge has battery-backed PRG RAM: {has_battery}");
    log::info!("CHR ROM size: {chr_rom_len}");
    log::info!("CHR RAM size: {chr_ram_len}");
    log::info!("CHR memory type: {chr_type:?}");
    log::info!(
        "Hardwired nametable mirroring: {nametable_mirroring:?} (not applicable to all mappers)"
    );

    mapper
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use super::*;

    pub(crate) fn mapper_with_prg_rom<D>(data: D, prg_rom: Vec<u8>) -> MapperImpl<D> {
        MapperImpl {
            cartridge: Cartridge {
                prg_rom,
                prg_ram: Vec::new(),
                has_ram_battery: false,
                prg_ram_dirty_bit: false,
                chr_rom: Vec::new(),
                chr_ram: vec![0; 8192],
            },
            data,
        }
    }

    pub(crate) fn mapper_with_prg_and_chr_rom<D>(
        data: D,
        prg_rom: Vec<u8>,
        chr_rom: Vec<u8>,
    ) -> MapperImpl<D> {
        MapperImpl {
            cartridge: Cartridge {
                prg_rom,
                prg_ram: Vec::new(),
                has_ram_battery: false,
                prg_ram_dirty_bit: false,
                chr_rom,
                chr_ram: Vec::new(),
            },
            data,
        }
    }
}
