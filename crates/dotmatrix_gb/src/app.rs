use crate::{GameBoy, SCREEN_HEIGHT, SCREEN_SCALE, SCREEN_WIDTH};
use dotmatrix_common::app::App;
use dotmatrix_common::key::Key;
use dotmatrix_common::Color;

/// Shell-facing wrapper for the machine.
///
/// Implements the shared `App` trait so any presentation shell can drive
/// the emulator: one `update` per host frame, key events forwarded to the
/// joypad. Also logs a periodic machine-state line that has proven
/// useful when a ROM wedges itself.
#[derive(Default)]
pub struct GameBoyApp {
    should_exit: bool,
    pub gb: GameBoy,
    frame_counter: u64,
    last_pc: u16,
    pc_stagnant_frames: u32,
    last_lcdc: u8,
}

impl App for GameBoyApp {
    fn init(&mut self) {
        log::info!("machine init");
        self.last_pc = self.gb.cpu.regs.pc;
        self.last_lcdc = self.gb.read8(0xFF40);
    }

    fn update(&mut self, screen_state: &mut [u8]) {
        self.gb.step_frame();

        // Translate the PPU's shade indices into RGB24 for the shell.
        let framebuffer = self.gb.framebuffer();
        for (i, &shade) in framebuffer.iter().enumerate() {
            let color = Color::DMG_SHADES[(shade & 0x03) as usize];
            let index = i * 3;
            if index + 2 < screen_state.len() {
                screen_state[index] = color.r;
                screen_state[index + 1] = color.g;
                screen_state[index + 2] = color.b;
            }
        }

        self.frame_counter = self.frame_counter.wrapping_add(1);

        let pc = self.gb.cpu.regs.pc;
        if pc == self.last_pc {
            self.pc_stagnant_frames = self.pc_stagnant_frames.saturating_add(1);
        } else {
            self.pc_stagnant_frames = 0;
            self.last_pc = pc;
        }

        let lcdc = self.gb.read8(0xFF40);
        if lcdc != self.last_lcdc {
            log::debug!("LCDC changed: 0x{:02X} -> 0x{:02X}", self.last_lcdc, lcdc);
            self.last_lcdc = lcdc;
        }

        if self.frame_counter == 1 || self.frame_counter % 60 == 0 {
            let regs = &self.gb.cpu.regs;
            let (reg_pc, reg_sp, reg_af, reg_bc, reg_de, reg_hl) =
                (regs.pc, regs.sp, regs.af(), regs.bc(), regs.de(), regs.hl());
            let ime = self.gb.cpu.ime;
            let halted = self.gb.cpu.halted;
            let stopped = self.gb.cpu.is_stopped();
            log::info!(
                "frame={} pc=0x{:04X} sp=0x{:04X} af=0x{:04X} bc=0x{:04X} de=0x{:04X} hl=0x{:04X} ime={} halted={} stopped={} IF=0x{:02X} IE=0x{:02X} LY={}",
                self.frame_counter,
                reg_pc,
                reg_sp,
                reg_af,
                reg_bc,
                reg_de,
                reg_hl,
                ime,
                halted,
                stopped,
                self.gb.read8(0xFF0F),
                self.gb.read8(0xFFFF),
                self.gb.read8(0xFF44),
            );
        }

        if self.pc_stagnant_frames == 600 {
            log::warn!(
                "PC unchanged for ~600 frames at 0x{:04X} (halted={} stopped={})",
                pc,
                self.gb.cpu.halted,
                self.gb.cpu.is_stopped(),
            );
        }
    }

    fn handle_key_event(&mut self, key: Key, is_pressed: bool) {
        if key == Key::Escape && is_pressed {
            self.should_exit = true;
            return;
        }
        self.gb.handle_key(key, is_pressed);
    }

    fn should_exit(&self) -> bool {
        self.should_exit
    }

    fn exit(&mut self) {
        log::info!("machine exit");
    }

    fn width(&self) -> u32 {
        SCREEN_WIDTH as u32
    }

    fn height(&self) -> u32 {
        SCREEN_HEIGHT as u32
    }

    fn scale(&self) -> u32 {
        SCREEN_SCALE
    }

    fn title(&self) -> String {
        "DotMatrix".to_string()
    }
}
