use super::{cycles, Bus, Cpu, Flag};

impl Cpu {
    /// Evaluate the condition encoded in bits 4-3 of a conditional
    /// branch opcode: 0=NZ, 1=Z, 2=NC, 3=C.
    #[inline]
    fn branch_condition(&self, opcode: u8) -> bool {
        match (opcode >> 3) & 0x03 {
            0 => !self.get_flag(Flag::Z),
            1 => self.get_flag(Flag::Z),
            2 => !self.get_flag(Flag::C),
            _ => self.get_flag(Flag::C),
        }
    }

    /// Decode and execute a single opcode and return its T-cycle cost.
    ///
    /// Costs come from the canonical table in `cpu::cycles`; conditional
    /// branches add their taken bonus inside the jr/jp/call/ret helpers.
    pub(super) fn exec_opcode<B: Bus>(&mut self, bus: &mut B, opcode: u8) -> u32 {
        if opcode == 0xCB {
            return self.step_cb(bus);
        }

        let base = cycles::BASE[opcode as usize];
        match opcode {
            // NOP
            0x00 => base,

            // LD rr, d16
            0x01 => {
                let value = self.fetch16(bus);
                self.regs.set_bc(value);
                base
            }
            0x11 => {
                let value = self.fetch16(bus);
                self.regs.set_de(value);
                base
            }
            0x21 => {
                let value = self.fetch16(bus);
                self.regs.set_hl(value);
                base
            }
            0x31 => {
                let value = self.fetch16(bus);
                self.regs.sp = value;
                base
            }

            // Rotates on A. Unlike their CB twins these always clear Z.
            0x07 => {
                // RLCA
                let a = self.regs.a;
                self.regs.a = a.rotate_left(1);
                self.clear_flags();
                self.set_flag(Flag::C, (a & 0x80) != 0);
                base
            }
            0x0F => {
                // RRCA
                let a = self.regs.a;
                self.regs.a = a.rotate_right(1);
                self.clear_flags();
                self.set_flag(Flag::C, (a & 0x01) != 0);
                base
            }
            0x17 => {
                // RLA
                let a = self.regs.a;
                let carry_in = if self.get_flag(Flag::C) { 1 } else { 0 };
                self.regs.a = (a << 1) | carry_in;
                self.clear_flags();
                self.set_flag(Flag::C, (a & 0x80) != 0);
                base
            }
            0x1F => {
                // RRA
                let a = self.regs.a;
                let carry_in = if self.get_flag(Flag::C) { 0x80 } else { 0 };
                self.regs.a = (a >> 1) | carry_in;
                self.clear_flags();
                self.set_flag(Flag::C, (a & 0x01) != 0);
                base
            }

            // INC rr / DEC rr (no flags)
            0x03 => {
                let v = self.regs.bc().wrapping_add(1);
                self.regs.set_bc(v);
                base
            }
            0x13 => {
                let v = self.regs.de().wrapping_add(1);
                self.regs.set_de(v);
                base
            }
            0x23 => {
                let v = self.regs.hl().wrapping_add(1);
                self.regs.set_hl(v);
                base
            }
            0x33 => {
                self.regs.sp = self.regs.sp.wrapping_add(1);
                base
            }
            0x0B => {
                let v = self.regs.bc().wrapping_sub(1);
                self.regs.set_bc(v);
                base
            }
            0x1B => {
                let v = self.regs.de().wrapping_sub(1);
                self.regs.set_de(v);
                base
            }
            0x2B => {
                let v = self.regs.hl().wrapping_sub(1);
                self.regs.set_hl(v);
                base
            }
            0x3B => {
                self.regs.sp = self.regs.sp.wrapping_sub(1);
                base
            }

            // INC r / INC (HL)
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                let index = (opcode >> 3) & 0x07;
                let value = self.read_reg8(bus, index);
                let result = self.alu_inc8(value);
                self.write_reg8(bus, index, result);
                base
            }

            // DEC r / DEC (HL)
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                let index = (opcode >> 3) & 0x07;
                let value = self.read_reg8(bus, index);
                let result = self.alu_dec8(value);
                self.write_reg8(bus, index, result);
                base
            }

            // LD r, d8 / LD (HL), d8
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
                let index = (opcode >> 3) & 0x07;
                let value = self.fetch8(bus);
                self.write_reg8(bus, index, value);
                base
            }

            // LD (BC)/(DE)/(HL+)/(HL-), A
            0x02 => {
                bus.write8(self.regs.bc(), self.regs.a);
                base
            }
            0x12 => {
                bus.write8(self.regs.de(), self.regs.a);
                base
            }
            0x22 => {
                let addr = self.regs.hl();
                bus.write8(addr, self.regs.a);
                self.regs.set_hl(addr.wrapping_add(1));
                base
            }
            0x32 => {
                let addr = self.regs.hl();
                bus.write8(addr, self.regs.a);
                self.regs.set_hl(addr.wrapping_sub(1));
                base
            }

            // LD A, (BC)/(DE)/(HL+)/(HL-)
            0x0A => {
                self.regs.a = bus.read8(self.regs.bc());
                base
            }
            0x1A => {
                self.regs.a = bus.read8(self.regs.de());
                base
            }
            0x2A => {
                let addr = self.regs.hl();
                self.regs.a = bus.read8(addr);
                self.regs.set_hl(addr.wrapping_add(1));
                base
            }
            0x3A => {
                let addr = self.regs.hl();
                self.regs.a = bus.read8(addr);
                self.regs.set_hl(addr.wrapping_sub(1));
                base
            }

            // LD (a16), SP
            0x08 => {
                let addr = self.fetch16(bus);
                let sp = self.regs.sp;
                bus.write8(addr, sp as u8);
                bus.write8(addr.wrapping_add(1), (sp >> 8) as u8);
                base
            }

            // STOP
            0x10 => {
                // STOP is a 2-byte instruction; the padding byte is fetched
                // and discarded so PC matches hardware.
                let _padding = self.fetch8(bus);
                self.stopped = true;
                self.halted = false;
                base
            }

            // JR r8 / JR cc, r8
            0x18 => self.jr(bus, opcode, true),
            0x20 | 0x28 | 0x30 | 0x38 => {
                let cond = self.branch_condition(opcode);
                self.jr(bus, opcode, cond)
            }

            // ADD HL, rr
            0x09 => {
                let v = self.regs.bc();
                self.alu_add16_hl(v);
                base
            }
            0x19 => {
                let v = self.regs.de();
                self.alu_add16_hl(v);
                base
            }
            0x29 => {
                let v = self.regs.hl();
                self.alu_add16_hl(v);
                base
            }
            0x39 => {
                let v = self.regs.sp;
                self.alu_add16_hl(v);
                base
            }

            // DAA / CPL / SCF / CCF
            0x27 => {
                self.alu_daa();
                base
            }
            0x2F => {
                self.regs.a = !self.regs.a;
                self.set_flag(Flag::N, true);
                self.set_flag(Flag::H, true);
                base
            }
            0x37 => {
                self.set_flag(Flag::C, true);
                self.set_flag(Flag::N, false);
                self.set_flag(Flag::H, false);
                base
            }
            0x3F => {
                let carry = self.get_flag(Flag::C);
                self.set_flag(Flag::C, !carry);
                self.set_flag(Flag::N, false);
                self.set_flag(Flag::H, false);
                base
            }

            // LD r1, r2 block (0x40-0x7F) and HALT (0x76)
            0x40..=0x7F => {
                if opcode == 0x76 {
                    self.exec_halt(bus)
                } else {
                    let dst = (opcode >> 3) & 0x07;
                    let src = opcode & 0x07;
                    let value = self.read_reg8(bus, src);
                    self.write_reg8(bus, dst, value);
                    base
                }
            }

            // 8-bit ALU on A with register/(HL) operand (0x80-0xBF).
            0x80..=0xBF => {
                let value = self.read_reg8(bus, opcode & 0x07);
                self.apply_alu_op((opcode >> 3) & 0x07, value);
                base
            }

            // 8-bit ALU on A with immediate operand.
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let value = self.fetch8(bus);
                self.apply_alu_op((opcode >> 3) & 0x07, value);
                base
            }

            // RET cc / RET / RETI
            0xC0 | 0xC8 | 0xD0 | 0xD8 => {
                let cond = self.branch_condition(opcode);
                self.ret_cond(bus, opcode, cond)
            }
            0xC9 => {
                let addr = self.pop_u16(bus);
                self.regs.pc = addr;
                base
            }
            0xD9 => {
                // RETI enables IME immediately, without the EI delay.
                let addr = self.pop_u16(bus);
                self.regs.pc = addr;
                self.ime = true;
                base
            }

            // POP rr
            0xC1 => {
                let v = self.pop_u16(bus);
                self.regs.set_bc(v);
                base
            }
            0xD1 => {
                let v = self.pop_u16(bus);
                self.regs.set_de(v);
                base
            }
            0xE1 => {
                let v = self.pop_u16(bus);
                self.regs.set_hl(v);
                base
            }
            0xF1 => {
                // POP AF forces the low nibble of F to zero.
                let v = self.pop_u16(bus);
                self.regs.set_af(v);
                base
            }

            // PUSH rr
            0xC5 => {
                let v = self.regs.bc();
                self.push_u16(bus, v);
                base
            }
            0xD5 => {
                let v = self.regs.de();
                self.push_u16(bus, v);
                base
            }
            0xE5 => {
                let v = self.regs.hl();
                self.push_u16(bus, v);
                base
            }
            0xF5 => {
                let v = self.regs.af();
                self.push_u16(bus, v);
                base
            }

            // JP a16 / JP cc, a16 / JP HL
            0xC3 => {
                let addr = self.fetch16(bus);
                self.regs.pc = addr;
                base
            }
            0xC2 | 0xCA | 0xD2 | 0xDA => {
                let cond = self.branch_condition(opcode);
                self.jp_cond(bus, opcode, cond)
            }
            0xE9 => {
                self.regs.pc = self.regs.hl();
                base
            }

            // CALL a16 / CALL cc, a16
            0xCD => {
                let addr = self.fetch16(bus);
                let ret = self.regs.pc;
                self.push_u16(bus, ret);
                self.regs.pc = addr;
                base
            }
            0xC4 | 0xCC | 0xD4 | 0xDC => {
                let cond = self.branch_condition(opcode);
                self.call_cond(bus, opcode, cond)
            }

            // RST nn: call to a fixed page-zero vector.
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                let vector = (opcode & 0x38) as u16;
                let ret = self.regs.pc;
                self.push_u16(bus, ret);
                self.regs.pc = vector;
                base
            }

            // High-page loads: LDH (a8),A / LDH A,(a8) / LDH (C),A / LDH A,(C)
            0xE0 => {
                let offset = self.fetch8(bus) as u16;
                bus.write8(0xFF00u16.wrapping_add(offset), self.regs.a);
                base
            }
            0xF0 => {
                let offset = self.fetch8(bus) as u16;
                self.regs.a = bus.read8(0xFF00u16.wrapping_add(offset));
                base
            }
            0xE2 => {
                let addr = 0xFF00u16.wrapping_add(self.regs.c as u16);
                bus.write8(addr, self.regs.a);
                base
            }
            0xF2 => {
                let addr = 0xFF00u16.wrapping_add(self.regs.c as u16);
                self.regs.a = bus.read8(addr);
                base
            }

            // LD (a16), A / LD A, (a16)
            0xEA => {
                let addr = self.fetch16(bus);
                bus.write8(addr, self.regs.a);
                base
            }
            0xFA => {
                let addr = self.fetch16(bus);
                self.regs.a = bus.read8(addr);
                base
            }

            // ADD SP, r8 / LD HL, SP+r8 / LD SP, HL
            0xE8 => {
                let imm = self.fetch8(bus);
                self.regs.sp = self.alu_add16_signed(self.regs.sp, imm);
                base
            }
            0xF8 => {
                let imm = self.fetch8(bus);
                let result = self.alu_add16_signed(self.regs.sp, imm);
                self.regs.set_hl(result);
                base
            }
            0xF9 => {
                self.regs.sp = self.regs.hl();
                base
            }

            // DI / EI
            0xF3 => {
                self.ime = false;
                self.ime_enable_pending = false;
                self.ime_enable_delay = false;
                base
            }
            0xFB => {
                // IME becomes 1 only after the *next* instruction completes.
                self.ime_enable_pending = true;
                base
            }

            // Opcode holes: D3, DB, DD, E3, E4, EB, EC, ED, F4, FC, FD.
            // Hardware locks up on these; this core logs and carries on as
            // if they were NOP so broken ROMs keep running.
            _ => {
                log::warn!(
                    "invalid opcode 0x{opcode:02X} at PC=0x{pc:04X}, treating as NOP",
                    pc = self.regs.pc.wrapping_sub(1),
                );
                base
            }
        }
    }

    /// Shared 8-bit ALU dispatch: 0=ADD 1=ADC 2=SUB 3=SBC 4=AND 5=XOR
    /// 6=OR 7=CP (the y field of the 0x80-0xBF block and of the
    /// immediate forms).
    #[inline]
    fn apply_alu_op(&mut self, op: u8, value: u8) {
        match op {
            0 => self.alu_add(value, false),
            1 => self.alu_add(value, true),
            2 => self.alu_sub(value, false),
            3 => self.alu_sub(value, true),
            4 => self.alu_and(value),
            5 => self.alu_xor(value),
            6 => self.alu_or(value),
            _ => self.alu_cp(value),
        }
    }

    /// HALT, including the documented fetch glitch.
    ///
    /// With IME clear and an enabled interrupt already pending, the CPU
    /// does not halt; instead the next opcode fetch skips its PC
    /// increment so the byte after HALT executes twice.
    fn exec_halt<B: Bus>(&mut self, bus: &mut B) -> u32 {
        if !self.ime {
            let ie = bus.read8(0xFFFF);
            let iflags = bus.read8(0xFF0F);
            if ie & iflags & 0x1F != 0 {
                self.halt_bug = true;
                return cycles::BASE[0x76];
            }
        }
        self.halted = true;
        cycles::BASE[0x76]
    }
}
