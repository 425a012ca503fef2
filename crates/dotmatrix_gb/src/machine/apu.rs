use std::collections::VecDeque;

const CPU_CLOCK_HZ: u32 = 4_194_304;
/// The frame sequencer ticks at 512 Hz.
const FRAME_SEQUENCER_PERIOD: u32 = 8192;
const VOLUME_FACTOR: i16 = 64;
/// Cap on buffered stereo samples (~100 ms at 44.1 kHz); older samples
/// are dropped if the shell stops draining.
const MAX_SAMPLES: usize = 44100 / 10 * 2;

/// Duty waveforms for the pulse channels, selected by NRx1 bits 7-6.
const DUTY_TABLE: [[u8; 8]; 4] = [
    [0, 0, 0, 0, 0, 0, 0, 1], // 12.5%
    [1, 0, 0, 0, 0, 0, 0, 1], // 25%
    [1, 0, 0, 0, 0, 1, 1, 1], // 50%
    [0, 1, 1, 1, 1, 1, 1, 0], // 75%
];

/// Noise channel divisor table, indexed by NR43 bits 2-0.
const NOISE_DIVISORS: [u16; 8] = [8, 16, 32, 48, 64, 80, 96, 112];

/// Per-register behavior for 0xFF10-0xFF26.
///
/// `read_or` holds the bits that always read back as 1 (unreadable or
/// unused); `writable_when_off` marks the registers the CPU can still
/// reach while NR52 bit 7 is clear. On DMG the length fields of NRx1
/// stay writable when the APU is off, alongside NR52 itself.
struct RegDescriptor {
    read_or: u8,
    writable_when_off: bool,
}

#[rustfmt::skip]
const REG_TABLE: [RegDescriptor; 0x17] = [
    RegDescriptor { read_or: 0x80, writable_when_off: false }, // NR10
    RegDescriptor { read_or: 0x3F, writable_when_off: true  }, // NR11
    RegDescriptor { read_or: 0x00, writable_when_off: false }, // NR12
    RegDescriptor { read_or: 0xFF, writable_when_off: false }, // NR13
    RegDescriptor { read_or: 0xBF, writable_when_off: false }, // NR14
    RegDescriptor { read_or: 0xFF, writable_when_off: false }, // FF15 (unused)
    RegDescriptor { read_or: 0x3F, writable_when_off: true  }, // NR21
    RegDescriptor { read_or: 0x00, writable_when_off: false }, // NR22
    RegDescriptor { read_or: 0xFF, writable_when_off: false }, // NR23
    RegDescriptor { read_or: 0xBF, writable_when_off: false }, // NR24
    RegDescriptor { read_or: 0x7F, writable_when_off: false }, // NR30
    RegDescriptor { read_or: 0xFF, writable_when_off: true  }, // NR31
    RegDescriptor { read_or: 0x9F, writable_when_off: false }, // NR32
    RegDescriptor { read_or: 0xFF, writable_when_off: false }, // NR33
    RegDescriptor { read_or: 0xBF, writable_when_off: false }, // NR34
    RegDescriptor { read_or: 0xFF, writable_when_off: false }, // FF1F (unused)
    RegDescriptor { read_or: 0xFF, writable_when_off: true  }, // NR41
    RegDescriptor { read_or: 0x00, writable_when_off: false }, // NR42
    RegDescriptor { read_or: 0x00, writable_when_off: false }, // NR43
    RegDescriptor { read_or: 0xBF, writable_when_off: false }, // NR44
    RegDescriptor { read_or: 0x00, writable_when_off: false }, // NR50
    RegDescriptor { read_or: 0x00, writable_when_off: false }, // NR51
    RegDescriptor { read_or: 0x70, writable_when_off: true  }, // NR52
];

#[derive(Default, Clone, Copy)]
struct Envelope {
    initial: u8,
    period: u8,
    add: bool,
    volume: u8,
    timer: u8,
}

impl Envelope {
    /// Sequencer step 7: walk the 4-bit volume toward its limit when a
    /// period is configured.
    fn clock(&mut self) {
        if self.period == 0 {
            return;
        }
        if self.timer > 0 {
            self.timer -= 1;
        }
        if self.timer == 0 {
            self.timer = self.period;
            if self.add && self.volume < 15 {
                self.volume += 1;
            } else if !self.add && self.volume > 0 {
                self.volume -= 1;
            }
        }
    }

    fn set_params(&mut self, val: u8) {
        self.initial = val >> 4;
        self.period = val & 0x07;
        self.add = val & 0x08 != 0;
    }

    fn restart(&mut self) {
        self.volume = self.initial;
        self.timer = self.period;
    }
}

#[derive(Default)]
struct Sweep {
    period: u8,
    negate: bool,
    shift: u8,
    timer: u8,
    shadow: u16,
    enabled: bool,
}

impl Sweep {
    fn set_params(&mut self, val: u8) {
        self.period = (val >> 4) & 0x07;
        self.negate = val & 0x08 != 0;
        self.shift = val & 0x07;
    }

    fn calculate(&self) -> u16 {
        let delta = self.shadow >> self.shift;
        if self.negate {
            self.shadow.wrapping_sub(delta)
        } else {
            self.shadow.wrapping_add(delta)
        }
    }

    /// Restart on channel trigger. Returns false when the first
    /// calculation already overflows and the channel must be disabled.
    fn reload(&mut self, freq: u16) -> bool {
        self.shadow = freq;
        self.timer = if self.period == 0 { 8 } else { self.period };
        self.enabled = self.period != 0 || self.shift != 0;
        if self.shift != 0 && self.calculate() > 2047 {
            return false;
        }
        true
    }

    /// Sequencer sweep tick. Returns the new frequency to apply, or an
    /// error when the channel overflowed and must be disabled.
    fn clock(&mut self) -> Result<Option<u16>, ()> {
        if self.timer > 0 {
            self.timer -= 1;
        }
        if self.timer != 0 {
            return Ok(None);
        }
        self.timer = if self.period == 0 { 8 } else { self.period };
        if !self.enabled || self.period == 0 {
            return Ok(None);
        }

        let new_freq = self.calculate();
        if new_freq > 2047 {
            return Err(());
        }
        if self.shift == 0 {
            return Ok(None);
        }
        self.shadow = new_freq;
        // A second calculation runs purely as an overflow check, without
        // being applied.
        if self.calculate() > 2047 {
            return Err(());
        }
        Ok(Some(new_freq))
    }
}

#[derive(Default)]
struct SquareChannel {
    enabled: bool,
    dac_enabled: bool,
    length: u16,
    length_enable: bool,
    duty: u8,
    duty_pos: u8,
    frequency: u16,
    timer: i32,
    envelope: Envelope,
    /// Frequency sweep unit; only channel 1's instance is ever clocked.
    sweep: Sweep,
}

impl SquareChannel {
    fn period(&self) -> i32 {
        ((2048 - self.frequency) * 4) as i32
    }

    fn step(&mut self, cycles: u32) {
        if !self.enabled {
            return;
        }
        let mut cycles = cycles as i32;
        while self.timer <= cycles {
            cycles -= self.timer;
            self.timer = self.period().max(1);
            self.duty_pos = (self.duty_pos + 1) & 7;
        }
        self.timer -= cycles;
    }

    fn clock_length(&mut self) {
        if self.length_enable && self.length > 0 {
            self.length -= 1;
            if self.length == 0 {
                self.enabled = false;
            }
        }
    }

    fn output(&self) -> u8 {
        if !self.enabled || !self.dac_enabled {
            return 0;
        }
        DUTY_TABLE[self.duty as usize][self.duty_pos as usize] * self.envelope.volume
    }
}

#[derive(Default)]
struct WaveChannel {
    enabled: bool,
    dac_enabled: bool,
    length: u16,
    length_enable: bool,
    /// NR32 volume code: 0=mute, 1=100%, 2=50%, 3=25%.
    volume_code: u8,
    position: u8,
    sample_buffer: u8,
    frequency: u16,
    timer: i32,
}

impl WaveChannel {
    fn period(&self) -> i32 {
        ((2048 - self.frequency) * 2) as i32
    }

    fn step(&mut self, cycles: u32, wave_ram: &[u8; 0x10]) {
        if !self.enabled || !self.dac_enabled {
            return;
        }
        let mut cycles = cycles as i32;
        while self.timer <= cycles {
            cycles -= self.timer;
            self.timer = self.period().max(1);
            self.position = (self.position + 1) & 0x1F;
            let byte = wave_ram[(self.position / 2) as usize];
            self.sample_buffer = if self.position & 1 == 0 {
                byte >> 4
            } else {
                byte & 0x0F
            };
        }
        self.timer -= cycles;
    }

    fn clock_length(&mut self) {
        if self.length_enable && self.length > 0 {
            self.length -= 1;
            if self.length == 0 {
                self.enabled = false;
            }
        }
    }

    fn output(&self) -> u8 {
        if !self.enabled || !self.dac_enabled {
            return 0;
        }
        match self.volume_code {
            0 => 0,
            1 => self.sample_buffer,
            2 => self.sample_buffer >> 1,
            _ => self.sample_buffer >> 2,
        }
    }
}

#[derive(Default)]
struct NoiseChannel {
    enabled: bool,
    dac_enabled: bool,
    length: u16,
    length_enable: bool,
    envelope: Envelope,
    clock_shift: u8,
    divisor_code: u8,
    width7: bool,
    lfsr: u16,
    timer: i32,
}

impl NoiseChannel {
    fn period(&self) -> i32 {
        (NOISE_DIVISORS[self.divisor_code as usize] as i32) << (self.clock_shift + 1)
    }

    fn step(&mut self, cycles: u32) {
        if !self.enabled || !self.dac_enabled {
            return;
        }
        let mut cycles = cycles as i32;
        while self.timer <= cycles {
            cycles -= self.timer;
            self.timer = self.period();
            // Feedback: XOR of bits 0 and 1 shifts into bit 14, and also
            // into bit 6 in 7-bit width mode.
            let bit = (self.lfsr ^ (self.lfsr >> 1)) & 1;
            self.lfsr >>= 1;
            self.lfsr |= bit << 14;
            if self.width7 {
                self.lfsr = (self.lfsr & !0x40) | (bit << 6);
            }
        }
        self.timer -= cycles;
    }

    fn clock_length(&mut self) {
        if self.length_enable && self.length > 0 {
            self.length -= 1;
            if self.length == 0 {
                self.enabled = false;
            }
        }
    }

    fn output(&self) -> u8 {
        if !self.enabled || !self.dac_enabled {
            return 0;
        }
        if self.lfsr & 1 == 0 {
            self.envelope.volume
        } else {
            0
        }
    }
}

/// Audio processing unit: two pulse channels, one wave channel, one
/// noise channel, driven by a 512 Hz frame sequencer, mixed into an
/// interleaved stereo sample queue at the host sample rate.
pub(super) struct Apu {
    ch1: SquareChannel,
    ch2: SquareChannel,
    ch3: WaveChannel,
    ch4: NoiseChannel,
    wave_ram: [u8; 0x10],
    /// Raw stored register values for masked readback, FF10-FF26.
    regs: [u8; 0x17],
    nr50: u8,
    nr51: u8,
    power: bool,

    sequencer_counter: u32,
    /// Next frame-sequencer step to execute (0-7).
    sequencer_step: u8,

    sample_timer: u32,
    sample_rate: u32,
    samples: VecDeque<i16>,

    // Single-pole high-pass ("DC blocking") filter state.
    hp_coef: f32,
    hp_prev_input_left: f32,
    hp_prev_output_left: f32,
    hp_prev_input_right: f32,
    hp_prev_output_right: f32,
}

impl Apu {
    pub(super) fn new() -> Self {
        let mut apu = Self {
            ch1: SquareChannel::default(),
            ch2: SquareChannel::default(),
            ch3: WaveChannel::default(),
            ch4: NoiseChannel::default(),
            wave_ram: [0; 0x10],
            regs: [0; 0x17],
            nr50: 0,
            nr51: 0,
            power: false,
            sequencer_counter: 0,
            sequencer_step: 0,
            sample_timer: 0,
            sample_rate: 44100,
            samples: VecDeque::new(),
            hp_coef: Self::calc_hp_coef(44100),
            hp_prev_input_left: 0.0,
            hp_prev_output_left: 0.0,
            hp_prev_input_right: 0.0,
            hp_prev_output_right: 0.0,
        };
        apu.apply_dmg_boot_state();
        apu
    }

    /// Register state the boot ROM leaves behind: APU powered, channel 1
    /// mid-beep, master volume and panning configured.
    fn apply_dmg_boot_state(&mut self) {
        self.power = true;
        let boot: [(u16, u8); 20] = [
            (0xFF10, 0x80),
            (0xFF11, 0xBF),
            (0xFF12, 0xF3),
            (0xFF13, 0xFF),
            (0xFF14, 0xBF),
            (0xFF16, 0x3F),
            (0xFF17, 0x00),
            (0xFF18, 0xFF),
            (0xFF19, 0xBF),
            (0xFF1A, 0x7F),
            (0xFF1B, 0xFF),
            (0xFF1C, 0x9F),
            (0xFF1D, 0xFF),
            (0xFF1E, 0xBF),
            (0xFF20, 0xFF),
            (0xFF21, 0x00),
            (0xFF22, 0x00),
            (0xFF23, 0xBF),
            (0xFF24, 0x77),
            (0xFF25, 0xF3),
        ];
        for (addr, value) in boot {
            self.apply_write(addr, value);
        }
        // Channel 1 is left playing the boot chime's tail.
        self.ch1.enabled = true;
        self.ch1.envelope.restart();
    }

    fn calc_hp_coef(rate: u32) -> f32 {
        0.999_958_f32.powf(CPU_CLOCK_HZ as f32 / rate as f32)
    }

    pub(super) fn set_sample_rate(&mut self, rate: u32) {
        self.sample_rate = rate.max(1);
        self.hp_coef = Self::calc_hp_coef(self.sample_rate);
    }

    /// Drain up to `dst.len()` buffered samples; returns how many were
    /// written. Samples are interleaved stereo.
    pub(super) fn take_samples(&mut self, dst: &mut [i16]) -> usize {
        let n = dst.len().min(self.samples.len());
        for slot in dst.iter_mut().take(n) {
            *slot = self.samples.pop_front().unwrap_or(0);
        }
        n
    }

    pub(super) fn buffered_samples(&self) -> usize {
        self.samples.len()
    }

    /// NR52 channel-status nibble.
    fn channel_status(&self) -> u8 {
        (self.ch1.enabled as u8)
            | (self.ch2.enabled as u8) << 1
            | (self.ch3.enabled as u8) << 2
            | (self.ch4.enabled as u8) << 3
    }

    pub(super) fn read_reg(&self, addr: u16) -> u8 {
        if (0xFF30..=0xFF3F).contains(&addr) {
            // Wave RAM reads are blocked while channel 3 is playing.
            if self.ch3.enabled && self.ch3.dac_enabled {
                return 0xFF;
            }
            return self.wave_ram[(addr - 0xFF30) as usize];
        }
        if !(0xFF10..=0xFF26).contains(&addr) {
            return 0xFF;
        }

        let index = (addr - 0xFF10) as usize;
        if addr == 0xFF26 {
            return ((self.power as u8) << 7) | 0x70 | self.channel_status();
        }
        self.regs[index] | REG_TABLE[index].read_or
    }

    pub(super) fn write_reg(&mut self, addr: u16, value: u8) {
        if (0xFF30..=0xFF3F).contains(&addr) {
            // Wave RAM stays writable with the APU off; writes are
            // dropped while channel 3 is playing.
            if !(self.ch3.enabled && self.ch3.dac_enabled) {
                self.wave_ram[(addr - 0xFF30) as usize] = value;
            }
            return;
        }
        if !(0xFF10..=0xFF26).contains(&addr) {
            return;
        }

        let index = (addr - 0xFF10) as usize;
        if !self.power && !REG_TABLE[index].writable_when_off {
            return;
        }
        if !self.power && addr != 0xFF26 {
            // DMG: only the length fields survive writes while off.
            let length_mask = if addr == 0xFF1B { 0xFF } else { 0x3F };
            self.regs[index] = (self.regs[index] & !length_mask) | (value & length_mask);
            self.apply_length_write(addr, value);
            return;
        }

        self.apply_write(addr, value);
    }

    /// Reload a channel's length counter from an NRx1 write.
    fn apply_length_write(&mut self, addr: u16, value: u8) {
        match addr {
            0xFF11 => self.ch1.length = 64 - (value & 0x3F) as u16,
            0xFF16 => self.ch2.length = 64 - (value & 0x3F) as u16,
            0xFF1B => self.ch3.length = 256 - value as u16,
            0xFF20 => self.ch4.length = 64 - (value & 0x3F) as u16,
            _ => {}
        }
    }

    /// Store a register value and run its side effects (power on).
    fn apply_write(&mut self, addr: u16, value: u8) {
        let index = (addr - 0xFF10) as usize;
        if addr != 0xFF26 {
            self.regs[index] = value;
        }

        match addr {
            0xFF10 => {
                self.ch1.sweep.set_params(value);
            }
            0xFF11 => {
                self.ch1.duty = value >> 6;
                self.ch1.length = 64 - (value & 0x3F) as u16;
            }
            0xFF12 => {
                self.ch1.envelope.set_params(value);
                self.ch1.dac_enabled = value & 0xF0 != 0;
                if !self.ch1.dac_enabled {
                    self.ch1.enabled = false;
                }
            }
            0xFF13 => {
                self.ch1.frequency = (self.ch1.frequency & 0x0700) | value as u16;
            }
            0xFF14 => {
                self.ch1.frequency =
                    (self.ch1.frequency & 0x00FF) | (((value & 0x07) as u16) << 8);
                let was_enabled = self.ch1.length_enable;
                self.ch1.length_enable = value & 0x40 != 0;
                if !was_enabled
                    && self.ch1.length_enable
                    && !self.next_step_clocks_length()
                    && self.ch1.length > 0
                {
                    self.ch1.clock_length();
                }
                if value & 0x80 != 0 {
                    self.trigger_ch1();
                }
            }
            0xFF16 => {
                self.ch2.duty = value >> 6;
                self.ch2.length = 64 - (value & 0x3F) as u16;
            }
            0xFF17 => {
                self.ch2.envelope.set_params(value);
                self.ch2.dac_enabled = value & 0xF0 != 0;
                if !self.ch2.dac_enabled {
                    self.ch2.enabled = false;
                }
            }
            0xFF18 => {
                self.ch2.frequency = (self.ch2.frequency & 0x0700) | value as u16;
            }
            0xFF19 => {
                self.ch2.frequency =
                    (self.ch2.frequency & 0x00FF) | (((value & 0x07) as u16) << 8);
                let was_enabled = self.ch2.length_enable;
                self.ch2.length_enable = value & 0x40 != 0;
                if !was_enabled
                    && self.ch2.length_enable
                    && !self.next_step_clocks_length()
                    && self.ch2.length > 0
                {
                    self.ch2.clock_length();
                }
                if value & 0x80 != 0 {
                    self.trigger_ch2();
                }
            }
            0xFF1A => {
                self.ch3.dac_enabled = value & 0x80 != 0;
                if !self.ch3.dac_enabled {
                    self.ch3.enabled = false;
                }
            }
            0xFF1B => {
                self.ch3.length = 256 - value as u16;
            }
            0xFF1C => {
                self.ch3.volume_code = (value >> 5) & 0x03;
            }
            0xFF1D => {
                self.ch3.frequency = (self.ch3.frequency & 0x0700) | value as u16;
            }
            0xFF1E => {
                self.ch3.frequency =
                    (self.ch3.frequency & 0x00FF) | (((value & 0x07) as u16) << 8);
                let was_enabled = self.ch3.length_enable;
                self.ch3.length_enable = value & 0x40 != 0;
                if !was_enabled
                    && self.ch3.length_enable
                    && !self.next_step_clocks_length()
                    && self.ch3.length > 0
                {
                    self.ch3.clock_length();
                }
                if value & 0x80 != 0 {
                    self.trigger_ch3();
                }
            }
            0xFF20 => {
                self.ch4.length = 64 - (value & 0x3F) as u16;
            }
            0xFF21 => {
                self.ch4.envelope.set_params(value);
                self.ch4.dac_enabled = value & 0xF0 != 0;
                if !self.ch4.dac_enabled {
                    self.ch4.enabled = false;
                }
            }
            0xFF22 => {
                self.ch4.clock_shift = value >> 4;
                self.ch4.width7 = value & 0x08 != 0;
                self.ch4.divisor_code = value & 0x07;
            }
            0xFF23 => {
                let was_enabled = self.ch4.length_enable;
                self.ch4.length_enable = value & 0x40 != 0;
                if !was_enabled
                    && self.ch4.length_enable
                    && !self.next_step_clocks_length()
                    && self.ch4.length > 0
                {
                    self.ch4.clock_length();
                }
                if value & 0x80 != 0 {
                    self.trigger_ch4();
                }
            }
            0xFF24 => self.nr50 = value,
            0xFF25 => self.nr51 = value,
            0xFF26 => {
                let was_on = self.power;
                let now_on = value & 0x80 != 0;
                self.power = now_on;
                if was_on && !now_on {
                    self.power_off();
                } else if !was_on && now_on {
                    // The frame sequencer restarts so the next tick is
                    // step 0.
                    self.sequencer_step = 0;
                    self.sequencer_counter = 0;
                }
            }
            _ => {}
        }
    }

    /// Whether the sequencer step about to fire is a length step. The
    /// extra-decrement rule on NRx4 writes keys off the *opposite* case.
    fn next_step_clocks_length(&self) -> bool {
        matches!(self.sequencer_step, 0 | 2 | 4 | 6)
    }

    /// Power-off: every register is cleared except the length counters
    /// and wave RAM, all channels stop, and the register file becomes
    /// read-only until NR52.7 is set again.
    fn power_off(&mut self) {
        let lengths = (
            self.ch1.length,
            self.ch2.length,
            self.ch3.length,
            self.ch4.length,
        );
        self.ch1 = SquareChannel::default();
        self.ch2 = SquareChannel::default();
        self.ch3 = WaveChannel::default();
        self.ch4 = NoiseChannel::default();
        self.ch1.length = lengths.0;
        self.ch2.length = lengths.1;
        self.ch3.length = lengths.2;
        self.ch4.length = lengths.3;
        self.regs.fill(0);
        self.nr50 = 0;
        self.nr51 = 0;
    }

    fn trigger_ch1(&mut self) {
        self.ch1.enabled = self.ch1.dac_enabled;
        if self.ch1.length == 0 {
            self.ch1.length = 64 - (self.regs[0x01] & 0x3F) as u16;
        }
        self.ch1.timer = self.ch1.period().max(1);
        self.ch1.envelope.restart();
        if !self.ch1.sweep.reload(self.ch1.frequency) {
            self.ch1.enabled = false;
        }
    }

    fn trigger_ch2(&mut self) {
        self.ch2.enabled = self.ch2.dac_enabled;
        if self.ch2.length == 0 {
            self.ch2.length = 64 - (self.regs[0x06] & 0x3F) as u16;
        }
        self.ch2.timer = self.ch2.period().max(1);
        self.ch2.envelope.restart();
    }

    fn trigger_ch3(&mut self) {
        self.ch3.enabled = self.ch3.dac_enabled;
        if self.ch3.length == 0 {
            self.ch3.length = 256 - self.regs[0x0B] as u16;
        }
        self.ch3.position = 0;
        self.ch3.timer = self.ch3.period().max(1);
    }

    fn trigger_ch4(&mut self) {
        self.ch4.enabled = self.ch4.dac_enabled;
        if self.ch4.length == 0 {
            self.ch4.length = 64 - (self.regs[0x10] & 0x3F) as u16;
        }
        self.ch4.lfsr = 0x7FFF;
        self.ch4.timer = self.ch4.period();
        self.ch4.envelope.restart();
    }

    /// One frame-sequencer tick.
    fn clock_frame_sequencer(&mut self) {
        let step = self.sequencer_step;
        self.sequencer_step = (step + 1) & 7;

        if matches!(step, 0 | 2 | 4 | 6) {
            self.ch1.clock_length();
            self.ch2.clock_length();
            self.ch3.clock_length();
            self.ch4.clock_length();
        }
        if step == 2 || step == 6 {
            match self.ch1.sweep.clock() {
                Ok(Some(new_freq)) => {
                    self.ch1.frequency = new_freq;
                    // Mirror the swept frequency into NR13/NR14 so the CPU
                    // observes it.
                    self.regs[0x03] = (new_freq & 0xFF) as u8;
                    self.regs[0x04] = (self.regs[0x04] & !0x07) | ((new_freq >> 8) as u8 & 0x07);
                }
                Ok(None) => {}
                Err(()) => self.ch1.enabled = false,
            }
        }
        if step == 7 {
            self.ch1.envelope.clock();
            self.ch2.envelope.clock();
            self.ch4.envelope.clock();
        }
    }

    /// Advance the APU by a batch of T-cycles.
    pub(super) fn tick(&mut self, cycles: u32) {
        let cycles_per_sample = (CPU_CLOCK_HZ / self.sample_rate).max(1);

        for _ in 0..cycles {
            if self.power {
                self.sequencer_counter += 1;
                if self.sequencer_counter >= FRAME_SEQUENCER_PERIOD {
                    self.sequencer_counter -= FRAME_SEQUENCER_PERIOD;
                    self.clock_frame_sequencer();
                }

                self.ch1.step(1);
                self.ch2.step(1);
                self.ch3.step(1, &self.wave_ram);
                self.ch4.step(1);
            }

            self.sample_timer += 1;
            if self.sample_timer >= cycles_per_sample {
                self.sample_timer -= cycles_per_sample;
                let (left, right) = self.mix_output();
                self.push_sample(left);
                self.push_sample(right);
            }
        }
    }

    fn push_sample(&mut self, sample: i16) {
        if self.samples.len() >= MAX_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Mix the four channel DACs through NR51 panning and NR50 master
    /// volume into one stereo sample pair.
    fn mix_output(&mut self) -> (i16, i16) {
        let dacs_on = self.ch1.dac_enabled
            || self.ch2.dac_enabled
            || self.ch3.dac_enabled
            || self.ch4.dac_enabled;

        // A DAC maps its 0-15 input onto a signed amplitude.
        let ch1 = 8 - self.ch1.output() as i16;
        let ch2 = 8 - self.ch2.output() as i16;
        let ch3 = 8 - self.ch3.output() as i16;
        let ch4 = 8 - self.ch4.output() as i16;

        let mut left = 0i16;
        let mut right = 0i16;

        if self.nr51 & 0x10 != 0 {
            left += ch1;
        }
        if self.nr51 & 0x01 != 0 {
            right += ch1;
        }
        if self.nr51 & 0x20 != 0 {
            left += ch2;
        }
        if self.nr51 & 0x02 != 0 {
            right += ch2;
        }
        if self.nr51 & 0x40 != 0 {
            left += ch3;
        }
        if self.nr51 & 0x04 != 0 {
            right += ch3;
        }
        if self.nr51 & 0x80 != 0 {
            left += ch4;
        }
        if self.nr51 & 0x08 != 0 {
            right += ch4;
        }

        let left_vol = ((self.nr50 >> 4) & 0x07) as i16 + 1;
        let right_vol = (self.nr50 & 0x07) as i16 + 1;

        if !dacs_on {
            self.hp_prev_input_left = 0.0;
            self.hp_prev_output_left = 0.0;
            self.hp_prev_input_right = 0.0;
            self.hp_prev_output_right = 0.0;
            return (0, 0);
        }

        self.dc_block(left * left_vol * VOLUME_FACTOR, right * right_vol * VOLUME_FACTOR)
    }

    fn dc_block(&mut self, left: i16, right: i16) -> (i16, i16) {
        let r = self.hp_coef;
        let left_in = left as f32;
        let right_in = right as f32;
        let left_out = left_in - self.hp_prev_input_left + r * self.hp_prev_output_left;
        let right_out = right_in - self.hp_prev_input_right + r * self.hp_prev_output_right;
        self.hp_prev_input_left = left_in;
        self.hp_prev_output_left = left_out;
        self.hp_prev_input_right = right_in;
        self.hp_prev_output_right = right_out;
        (left_out.round() as i16, right_out.round() as i16)
    }
}
