use dotmatrix_common::key::Key;

use crate::cpu::Cpu;
use crate::{SCREEN_HEIGHT, SCREEN_WIDTH};

use super::cartridge::CartridgeError;
use super::GameBoyBus;

/// T-cycles per LCD frame (154 lines of 456 cycles).
pub const CYCLES_PER_FRAME: u32 = 70_224;

/// The eight physical buttons, in joypad-matrix bit order.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Button {
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    Select,
    Start,
}

/// High-level machine: the CPU core plus the bus holding every
/// peripheral. This is the single owning context; the advance loop is
/// the only mutator of machine state.
pub struct GameBoy {
    pub cpu: Cpu,
    pub(crate) bus: GameBoyBus,
}

impl Default for GameBoy {
    fn default() -> Self {
        Self::new()
    }
}

impl GameBoy {
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(),
            bus: GameBoyBus::default(),
        }
    }

    pub fn reset(&mut self) {
        self.cpu.reset();
        self.bus = GameBoyBus::default();
    }

    /// Install a cartridge image. Fails once, at load time, when the
    /// image has no parseable header or names an unsupported mapper.
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), CartridgeError> {
        self.bus.load_rom(rom)
    }

    /// Title string from the loaded cartridge header.
    pub fn cartridge_title(&self) -> Option<&str> {
        self.bus
            .cartridge
            .as_ref()
            .map(|cart| cart.header().title.as_str())
    }

    /// Execute one CPU instruction (or interrupt entry) and advance the
    /// timer, PPU and APU in lockstep. Returns the T-cycles consumed.
    pub fn step(&mut self) -> u32 {
        self.cpu.step(&mut self.bus)
    }

    /// Step the machine for one frame worth of time (~70 224 T-cycles).
    pub fn step_frame(&mut self) {
        let mut cycles = 0u32;
        while cycles < CYCLES_PER_FRAME {
            cycles += self.step();
        }
    }

    /// The 160x144 framebuffer as 2-bit shade indices, refreshed at every
    /// VBlank entry. Copy it out before the next frame begins if tearing
    /// matters.
    pub fn framebuffer(&self) -> &[u8; SCREEN_WIDTH * SCREEN_HEIGHT] {
        self.bus.ppu.framebuffer()
    }

    /// Number of completed frames since power-on.
    pub fn frame_count(&self) -> u64 {
        self.bus.ppu.frame_count()
    }

    /// Number of completed CPU steps since power-on.
    pub fn step_count(&self) -> u64 {
        self.cpu.step_count()
    }

    /// Current PPU mode (0-3), also visible in STAT bits 1-0.
    pub fn ppu_mode(&self) -> u8 {
        self.bus.ppu.mode()
    }

    /// Current scanline (LY) and position within it, for deterministic
    /// test checkpoints.
    pub fn ppu_position(&self) -> (u8, u32) {
        (self.bus.ppu.ly(), self.bus.ppu.cycle_count())
    }

    /// Interleaved stereo samples currently buffered by the APU.
    pub fn buffered_samples(&self) -> usize {
        self.bus.apu.buffered_samples()
    }

    /// Read-only view of any bus address, for tests and debugging shells.
    pub fn read8(&mut self, addr: u16) -> u8 {
        self.bus.read8_mmio(addr)
    }

    /// Bytes captured from the serial port (test ROMs print through it).
    pub fn serial_output(&self) -> &[u8] {
        &self.bus.serial.output
    }

    /// Host sample rate for the audio stream.
    pub fn set_sample_rate(&mut self, rate: u32) {
        self.bus.apu.set_sample_rate(rate);
    }

    /// Drain buffered interleaved stereo samples; returns the count
    /// actually written.
    pub fn take_samples(&mut self, dst: &mut [i16]) -> usize {
        self.bus.apu.take_samples(dst)
    }

    /// Byte-exact external RAM image for battery-backed cartridges.
    pub fn save_sram(&self) -> Option<Vec<u8>> {
        self.bus.cartridge.as_ref().and_then(|cart| cart.save_sram())
    }

    /// Restore a previously saved external RAM image.
    pub fn load_sram(&mut self, data: &[u8]) {
        if let Some(cart) = self.bus.cartridge.as_mut() {
            cart.load_sram(data);
        }
    }

    /// Press or release one of the eight buttons. A press raises the
    /// joypad interrupt.
    pub fn set_button(&mut self, button: Button, pressed: bool) {
        match button {
            Button::Right => self.bus.joypad_set_dpad_bit(0, pressed),
            Button::Left => self.bus.joypad_set_dpad_bit(1, pressed),
            Button::Up => self.bus.joypad_set_dpad_bit(2, pressed),
            Button::Down => self.bus.joypad_set_dpad_bit(3, pressed),
            Button::A => self.bus.joypad_set_button_bit(0, pressed),
            Button::B => self.bus.joypad_set_button_bit(1, pressed),
            Button::Select => self.bus.joypad_set_button_bit(2, pressed),
            Button::Start => self.bus.joypad_set_button_bit(3, pressed),
        }
    }

    /// Map a frontend key event onto the joypad:
    /// Z => A, X => B, A => Select, S => Start, arrows => d-pad.
    pub fn handle_key(&mut self, key: Key, pressed: bool) {
        match key {
            Key::Right => self.set_button(Button::Right, pressed),
            Key::Left => self.set_button(Button::Left, pressed),
            Key::Up => self.set_button(Button::Up, pressed),
            Key::Down => self.set_button(Button::Down, pressed),
            Key::Z => self.set_button(Button::A, pressed),
            Key::X => self.set_button(Button::B, pressed),
            Key::A => self.set_button(Button::Select, pressed),
            Key::S => self.set_button(Button::Start, pressed),
            _ => {}
        }
    }
}
