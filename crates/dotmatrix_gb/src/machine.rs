mod apu;
mod bus;
mod cartridge;
mod gameboy;
mod ppu;
mod serial;
mod timer;

pub(crate) use bus::GameBoyBus;
pub use cartridge::{Cartridge, CartridgeError, Header};
pub use gameboy::{Button, GameBoy};

/// Total addressable memory (64 KiB). Cartridge, VRAM, OAM and the IO
/// registers are routed to their owners; the flat array backs WRAM, the
/// echo region and HRAM.
const MEMORY_SIZE: usize = 0x10000;

#[cfg(test)]
mod tests;
