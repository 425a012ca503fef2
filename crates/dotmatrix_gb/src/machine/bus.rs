use super::{
    apu::Apu, cartridge::Cartridge, cartridge::CartridgeError, ppu::Ppu, serial::Serial,
    timer::Timer, MEMORY_SIZE,
};

mod dma;
mod init;
mod joypad;
mod mmio;

/// The machine bus: a flat backing array for WRAM/echo/HRAM plus the
/// routed peripherals (cartridge, PPU, APU, timer, serial, joypad).
///
/// The bus is the single mutator of every memory region; the CPU reaches
/// memory exclusively through `read8`/`write8` and advances the
/// peripherals through `tick`.
pub(crate) struct GameBoyBus {
    pub(crate) memory: [u8; MEMORY_SIZE],
    pub(crate) serial: Serial,
    pub(crate) if_reg: u8,
    pub(crate) ie_reg: u8,
    pub(crate) cartridge: Option<Cartridge>,
    pub(crate) timer: Timer,
    pub(crate) ppu: Ppu,
    pub(crate) apu: Apu,
    // Joypad state. Selection bits correspond to P1 bits 5 (buttons) and
    // 4 (d-pad). The masks use bit=1 for "pressed":
    // - joyp_buttons: bit0=A, bit1=B, bit2=Select, bit3=Start
    // - joyp_dpad:    bit0=Right, bit1=Left, bit2=Up, bit3=Down
    joyp_select: u8,
    joyp_buttons: u8,
    joyp_dpad: u8,
}

impl Default for GameBoyBus {
    fn default() -> Self {
        let mut bus = Self {
            memory: [0; MEMORY_SIZE],
            serial: Serial::default(),
            if_reg: 0,
            ie_reg: 0,
            cartridge: None,
            timer: Timer::new(),
            ppu: Ppu::new(),
            apu: Apu::new(),
            joyp_select: 0x00,
            joyp_buttons: 0x00,
            joyp_dpad: 0x00,
        };
        bus.apply_dmg_initial_io_state();
        bus
    }
}

impl crate::cpu::Bus for GameBoyBus {
    fn read8(&mut self, addr: u16) -> u8 {
        self.read8_mmio(addr)
    }

    fn write8(&mut self, addr: u16, value: u8) {
        self.write8_mmio(addr, value)
    }

    /// Advance the peripherals by the T-cycles an instruction consumed.
    /// The order is fixed: timer first, then PPU, then APU; interrupt
    /// requests raised here become visible to the CPU on its next step.
    fn tick(&mut self, cycles: u32) {
        self.timer.tick(cycles, &mut self.if_reg);
        self.ppu.tick(cycles, &mut self.if_reg);
        self.apu.tick(cycles);
    }
}

impl GameBoyBus {
    /// Install a cartridge image. Images without a parseable header are
    /// rejected once, here; afterwards the mapper answers all accesses.
    pub(super) fn load_rom(&mut self, rom: &[u8]) -> Result<(), CartridgeError> {
        let cartridge = Cartridge::load(rom)?;
        self.cartridge = Some(cartridge);
        Ok(())
    }
}
