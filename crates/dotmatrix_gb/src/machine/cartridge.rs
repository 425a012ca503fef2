mod mbc1;
mod mbc2;
mod mbc3;
mod mbc5;

use std::fmt;

use mbc1::Mbc1;
use mbc2::Mbc2;
use mbc3::Mbc3;
use mbc5::Mbc5;

/// Errors surfaced once at cartridge load time. After a successful load
/// the cartridge never fails: out-of-range accesses read 0xFF and writes
/// to absent RAM are dropped, as on hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartridgeError {
    /// The image is smaller than the 0x150-byte header area.
    TooShort(usize),
    /// The cartridge-type byte names a mapper this core does not support.
    UnsupportedMapper(u8),
}

impl fmt::Display for CartridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CartridgeError::TooShort(len) => {
                write!(f, "cartridge image too short: {len} bytes")
            }
            CartridgeError::UnsupportedMapper(code) => {
                write!(f, "unsupported cartridge type 0x{code:02X}")
            }
        }
    }
}

impl std::error::Error for CartridgeError {}

/// Fields parsed from the cartridge header at 0x0100-0x014F.
///
/// The header checksum is recorded but not enforced.
#[derive(Debug, Clone)]
pub struct Header {
    pub title: String,
    pub cart_type: u8,
    pub rom_size_code: u8,
    pub ram_size_code: u8,
    pub destination: u8,
    pub header_checksum: u8,
}

impl Header {
    fn parse(rom: &[u8]) -> Self {
        let title = rom[0x0134..=0x0143]
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| b as char)
            .collect();
        Self {
            title,
            cart_type: rom[0x0147],
            rom_size_code: rom[0x0148],
            ram_size_code: rom[0x0149],
            destination: rom[0x014A],
            header_checksum: rom[0x014D],
        }
    }

    pub fn is_japanese(&self) -> bool {
        self.destination == 0x00
    }
}

/// External RAM size in bytes for a header RAM-size code. 2 KiB carts get
/// a full 8 KiB bank internally; the mapper masks accesses to the real
/// size.
fn ram_size_bytes(code: u8) -> usize {
    match code {
        0x01 => 0x0800,
        0x02 => 0x2000,
        0x03 => 0x8000,
        0x04 => 0x2_0000,
        0x05 => 0x1_0000,
        _ => 0,
    }
}

enum Mapper {
    Rom { rom: Vec<u8>, ram: Vec<u8> },
    Mbc1(Mbc1),
    Mbc2(Mbc2),
    Mbc3(Mbc3),
    Mbc5(Mbc5),
}

/// A loaded cartridge: parsed header plus the mapper that answers bus
/// accesses to 0x0000-0x7FFF and 0xA000-0xBFFF.
pub struct Cartridge {
    header: Header,
    mapper: Mapper,
}

impl Cartridge {
    /// Parse the header and build the mapper for a ROM image.
    pub fn load(rom: &[u8]) -> Result<Self, CartridgeError> {
        if rom.len() < 0x0150 {
            return Err(CartridgeError::TooShort(rom.len()));
        }

        let header = Header::parse(rom);
        let ram_bytes = ram_size_bytes(header.ram_size_code);

        let mapper = match header.cart_type {
            0x00 | 0x08 | 0x09 => Mapper::Rom {
                rom: rom.to_vec(),
                ram: vec![0xFF; ram_bytes],
            },
            0x01..=0x03 => Mapper::Mbc1(Mbc1::new(rom, ram_bytes)),
            0x05 | 0x06 => Mapper::Mbc2(Mbc2::new(rom)),
            0x0F..=0x13 => Mapper::Mbc3(Mbc3::new(rom, ram_bytes)),
            0x19..=0x1E => Mapper::Mbc5(Mbc5::new(rom, ram_bytes)),
            code => return Err(CartridgeError::UnsupportedMapper(code)),
        };

        log::info!(
            "cartridge \"{}\": type=0x{:02X} rom_code={} ram_code={}",
            header.title,
            header.cart_type,
            header.rom_size_code,
            header.ram_size_code,
        );

        Ok(Self { header, mapper })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Whether the cartridge declares battery-backed RAM that the shell
    /// should persist across power cycles.
    pub fn has_battery(&self) -> bool {
        matches!(
            self.header.cart_type,
            0x03 | 0x06 | 0x09 | 0x0F | 0x10 | 0x13 | 0x1B | 0x1E
        )
    }

    /// Read from the CPU-visible ROM area (0x0000-0x7FFF).
    pub fn rom_read(&self, addr: u16) -> u8 {
        match &self.mapper {
            Mapper::Rom { rom, .. } => rom.get(addr as usize).copied().unwrap_or(0xFF),
            Mapper::Mbc1(m) => m.rom_read(addr),
            Mapper::Mbc2(m) => m.rom_read(addr),
            Mapper::Mbc3(m) => m.rom_read(addr),
            Mapper::Mbc5(m) => m.rom_read(addr),
        }
    }

    /// A CPU write to the ROM area: interpreted by the mapper's control
    /// registers, never stored.
    pub fn rom_write(&mut self, addr: u16, value: u8) {
        match &mut self.mapper {
            Mapper::Rom { .. } => {}
            Mapper::Mbc1(m) => m.rom_write(addr, value),
            Mapper::Mbc2(m) => m.rom_write(addr, value),
            Mapper::Mbc3(m) => m.rom_write(addr, value),
            Mapper::Mbc5(m) => m.rom_write(addr, value),
        }
    }

    /// Read from the external RAM area (0xA000-0xBFFF).
    pub fn ram_read(&self, addr: u16) -> u8 {
        match &self.mapper {
            Mapper::Rom { ram, .. } => {
                let offset = addr as usize - 0xA000;
                ram.get(offset).copied().unwrap_or(0xFF)
            }
            Mapper::Mbc1(m) => m.ram_read(addr),
            Mapper::Mbc2(m) => m.ram_read(addr),
            Mapper::Mbc3(m) => m.ram_read(addr),
            Mapper::Mbc5(m) => m.ram_read(addr),
        }
    }

    /// Write to the external RAM area (0xA000-0xBFFF).
    pub fn ram_write(&mut self, addr: u16, value: u8) {
        match &mut self.mapper {
            Mapper::Rom { ram, .. } => {
                let offset = addr as usize - 0xA000;
                if let Some(slot) = ram.get_mut(offset) {
                    *slot = value;
                }
            }
            Mapper::Mbc1(m) => m.ram_write(addr, value),
            Mapper::Mbc2(m) => m.ram_write(addr, value),
            Mapper::Mbc3(m) => m.ram_write(addr, value),
            Mapper::Mbc5(m) => m.ram_write(addr, value),
        }
    }

    /// Byte-exact copy of the external RAM for battery persistence, or
    /// `None` when the cartridge has no battery.
    pub fn save_sram(&self) -> Option<Vec<u8>> {
        if !self.has_battery() {
            return None;
        }
        let ram = match &self.mapper {
            Mapper::Rom { ram, .. } => ram.as_slice(),
            Mapper::Mbc1(m) => m.ram(),
            Mapper::Mbc2(m) => m.ram(),
            Mapper::Mbc3(m) => m.ram(),
            Mapper::Mbc5(m) => m.ram(),
        };
        Some(ram.to_vec())
    }

    /// Restore external RAM contents previously produced by `save_sram`.
    /// Length mismatches copy the overlapping prefix.
    pub fn load_sram(&mut self, data: &[u8]) {
        let ram = match &mut self.mapper {
            Mapper::Rom { ram, .. } => ram.as_mut_slice(),
            Mapper::Mbc1(m) => m.ram_mut(),
            Mapper::Mbc2(m) => m.ram_mut(),
            Mapper::Mbc3(m) => m.ram_mut(),
            Mapper::Mbc5(m) => m.ram_mut(),
        };
        let len = ram.len().min(data.len());
        ram[..len].copy_from_slice(&data[..len]);
    }
}
