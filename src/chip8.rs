use core::convert::TryFrom;

use heapless::Vec;
use log::{debug, trace};

use crate::context::Context;
use crate::error::Error;
use crate::font;
use crate::frame::{Frame, FrameView, HEIGHT, WIDTH};
use crate::opcode::OpCode;
use crate::quirks::Quirks;
use crate::timer::TimerState;

#[cfg(feature = "atomic")]
use crate::timer::atomic::Timer;
#[cfg(not(feature = "atomic"))]
use crate::timer::racy::Timer;

/// The chip-8 virtual machine
///
/// Owns the whole machine state and mutates it through two entry points
/// paced by the caller: [`step`](Chip8::step) executes one instruction at
/// whatever rate the program is throttled to, [`tick_timers`](Chip8::tick_timers)
/// decrements the two timers and is meant to fire at 60Hz. The two schedules
/// share nothing but the timers; callers driving them from separate threads
/// wrap the machine in a mutex, or rely on the `atomic` timer feature when
/// only the tick runs elsewhere.
pub struct Chip8<C: Context> {
    ctx: C,
    quirks: Quirks,
    v: [u8; 16],
    i: u16,
    pc: u16,
    memory: [u8; 4096],
    stack: Vec<u16, 16>,
    frame: Frame,
    delay_timer: Timer,
    sound_timer: Timer,
    keys: [bool; 16],
    awaiting_key: Option<u8>,
}

impl<C: Context> Chip8<C> {
    /// Create a machine in its power-on state, font installed, pc at 0x200
    pub fn new(ctx: C) -> Self {
        let mut memory = [0u8; 4096];
        memory[font::BASE_ADDR..font::BASE_ADDR + font::GLYPHS.len()]
            .copy_from_slice(&font::GLYPHS);
        Self {
            ctx,
            quirks: Quirks::default(),
            v: [0; 16],
            i: 0,
            pc: 0x200,
            memory,
            stack: Vec::new(),
            frame: Frame::new(),
            delay_timer: Timer::new(),
            sound_timer: Timer::new(),
            keys: [false; 16],
            awaiting_key: None,
        }
    }

    /// Load program from slice of bytes to memory from 0x200 (_start address)
    ///
    /// Leaves execution state alone; combine with [`reset`](Chip8::reset)
    /// to swap programs.
    pub fn load(&mut self, prog: &[u8]) -> Result<(), Error> {
        if prog.len() > self.memory.len() - 0x200 {
            return Err(Error::RomTooLarge { len: prog.len() });
        }
        self.memory[0x200..0x200 + prog.len()].copy_from_slice(prog);
        debug!("loaded a {} byte program at 0x200", prog.len());
        Ok(())
    }

    /// Select the behaviour dialect, effective from the next step
    pub fn configure(&mut self, quirks: Quirks) {
        debug!("reconfigured quirks: {:?}", quirks);
        self.quirks = quirks;
    }

    /// Execute exactly one instruction
    ///
    /// Fetches the big-endian word at pc, decodes it, advances pc by 2 and
    /// runs the operation. Jumps, calls, skips and returns override the
    /// default advance. While a keypress is awaited no state changes and
    /// `WouldBlock` is returned; a failed instruction reports its fault and
    /// leaves the machine exactly as it was before the fetch.
    pub fn step(&mut self) -> nb::Result<(), Error> {
        if self.awaiting_key.is_some() {
            return Err(nb::Error::WouldBlock);
        }
        let pc = self.pc;
        let raw = self.fetch()?;
        let opcode = OpCode::try_from(raw)?;
        trace!("{:#05X}: executing {:#06X}", pc, raw);
        self.execute(opcode).map_err(|err| {
            self.pc = pc;
            nb::Error::Other(err)
        })
    }

    /// Decrement both timers by at most one, flooring at zero
    ///
    /// Driven by the caller's clock at 60Hz, independently of the
    /// instruction rate. Notifies the context when the sound timer expires.
    pub fn tick_timers(&mut self) {
        self.delay_timer.decrement();
        if let TimerState::Finished = self.sound_timer.decrement() {
            self.ctx.sound_off();
        }
    }

    /// Restore the power-on execution state, keeping memory contents
    ///
    /// The recovery path after a fault: font and the loaded program stay in
    /// place, everything else goes back to its initial value.
    pub fn reset(&mut self) {
        self.v = [0; 16];
        self.i = 0;
        self.pc = 0x200;
        self.stack.clear();
        self.keys = [false; 16];
        self.awaiting_key = None;
        self.delay_timer.store(0);
        self.sound_timer.store(0);
        self.ctx.sound_off();
        self.frame.clear();
        self.ctx.on_frame(self.frame.view());
        debug!("machine reset, memory preserved");
    }

    /// Get a read-only view of the current frame
    pub fn frame(&self) -> FrameView<'_> {
        self.frame.view()
    }

    /// Record a key transition reported by the input collaborator
    ///
    /// A release is just stored; a fresh press additionally satisfies a
    /// pending key-wait, storing the key index into the awaited register.
    pub fn set_key(&mut self, key: u8, pressed: bool) {
        let key = key & 0x0F;
        let was_pressed = self.keys[key as usize];
        self.keys[key as usize] = pressed;
        if pressed && !was_pressed {
            if let Some(x) = self.awaiting_key.take() {
                self.v[x as usize] = key;
                debug!("key {:X} pressed, resuming execution", key);
            }
        }
    }

    pub fn is_key_pressed(&self, key: u8) -> bool {
        self.keys[(key & 0x0F) as usize]
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer.load()
    }

    /// Current sound timer value, nonzero gates tone playback
    pub fn sound_timer(&self) -> u8 {
        self.sound_timer.load()
    }

    fn fetch(&self) -> Result<u16, Error> {
        let pc = self.pc as usize;
        if pc + 1 >= self.memory.len() {
            return Err(Error::MemoryOutOfBounds { addr: self.pc });
        }
        Ok(u16::from_be_bytes([self.memory[pc], self.memory[pc + 1]]))
    }

    fn skip_next(&mut self) {
        self.pc = self.pc.wrapping_add(2);
    }
}

// OpCodes impls
impl<C: Context> Chip8<C> {
    #[rustfmt::skip]
    fn execute(&mut self, opcode: OpCode) -> Result<(), Error> {
        // Default advance happens up front; jumps and skips override it.
        self.pc = self.pc.wrapping_add(2);
        match opcode {
            OpCode::_0NNN { nnn }     => self.exec_ml_subroutine_at(nnn),
            OpCode::_00E0             => self.clear_screen(),
            OpCode::_00EE             => self.subroutine_return(),
            OpCode::_1NNN { nnn }     => self.jump_to(nnn),
            OpCode::_2NNN { nnn }     => self.exec_subroutine_at(nnn),
            OpCode::_3XNN { x, nn }   => self.skip_if_vx_eq_nn(x, nn),
            OpCode::_4XNN { x, nn }   => self.skip_if_vx_ne_nn(x, nn),
            OpCode::_5XY0 { x, y }    => self.skip_if_vx_eq_vy(x, y),
            OpCode::_6XNN { x, nn }   => self.assign_vx_nn(x, nn),
            OpCode::_7XNN { x, nn }   => self.assign_add_vx_nn(x, nn),
            OpCode::_8XY0 { x, y }    => self.assign_vx_vy(x, y),
            OpCode::_8XY1 { x, y }    => self.assign_or_vx_vy(x, y),
            OpCode::_8XY2 { x, y }    => self.assign_and_vx_vy(x, y),
            OpCode::_8XY3 { x, y }    => self.assign_xor_vx_vy(x, y),
            OpCode::_8XY4 { x, y }    => self.assign_add_vx_vy(x, y),
            OpCode::_8XY5 { x, y }    => self.assign_sub_vx_vy(x, y),
            OpCode::_8XY6 { x, y }    => self.assign_vx_shifted_r(x, y),
            OpCode::_8XY7 { x, y }    => self.assign_vx_vy_sub_vx(x, y),
            OpCode::_8XYE { x, y }    => self.assign_vx_shifted_l(x, y),
            OpCode::_9XY0 { x, y }    => self.skip_if_vx_ne_vy(x, y),
            OpCode::_ANNN { nnn }     => self.assign_i_nnn(nnn),
            OpCode::_BNNN { nnn }     => self.jump_with_offset(nnn),
            OpCode::_CXNN { x, nn }   => self.assign_vx_random_and_nn(x, nn),
            OpCode::_DXYN { x, y, n } => self.draw_n_at_vx_vy(x, y, n),
            OpCode::_EX9E { x }       => self.skip_if_vx_in_keys(x),
            OpCode::_EXA1 { x }       => self.skip_if_vx_not_in_keys(x),
            OpCode::_FX07 { x }       => self.assign_vx_delay_t(x),
            OpCode::_FX0A { x }       => self.assign_vx_wait_for_key(x),
            OpCode::_FX15 { x }       => self.assign_delay_t_vx(x),
            OpCode::_FX18 { x }       => self.assign_sound_t_vx(x),
            OpCode::_FX1E { x }       => self.assign_add_i_vx(x),
            OpCode::_FX29 { x }       => self.assign_i_addr_of_sprite_vx(x),
            OpCode::_FX33 { x }       => self.assign_mem_at_i_bcd_of_vx(x),
            OpCode::_FX55 { x }       => self.assign_mem_at_i_v0_to_vx(x),
            OpCode::_FX65 { x }       => self.assign_v0_to_vx_mem_at_i(x),
        }
    }

    /// Execute machine language subroutine at address NNN
    ///
    /// Meaningless without the original host hardware, executed as a no-op
    /// 0NNN { nnn: u16 },
    fn exec_ml_subroutine_at(&mut self, _nnn: u16) -> Result<(), Error> {
        Ok(())
    }

    /// Clear the screen
    /// 00E0,
    fn clear_screen(&mut self) -> Result<(), Error> {
        self.frame.clear();
        self.ctx.on_frame(self.frame.view());
        Ok(())
    }

    /// Return from a subroutine
    /// 00EE,
    fn subroutine_return(&mut self) -> Result<(), Error> {
        self.stack
            .pop()
            .ok_or(Error::StackUnderflow)
            .map(|addr| self.pc = addr)
    }

    /// Jump to address NNN
    /// 1NNN { nnn: u16 },
    fn jump_to(&mut self, nnn: u16) -> Result<(), Error> {
        self.pc = nnn;
        Ok(())
    }

    /// Execute subroutine starting at address NNN
    ///
    /// The already-advanced pc is the return address
    /// 2NNN { nnn: u16 },
    fn exec_subroutine_at(&mut self, nnn: u16) -> Result<(), Error> {
        self.stack
            .push(self.pc)
            .or(Err(Error::StackOverflow))
            .map(|_| self.pc = nnn)
    }

    /// Skip the following instruction if the value of register VX equals NN
    /// 3XNN { x: u8, nn: u8 },
    fn skip_if_vx_eq_nn(&mut self, x: u8, nn: u8) -> Result<(), Error> {
        if self.v[x as usize] == nn {
            self.skip_next();
        }
        Ok(())
    }

    /// Skip the following instruction if the value of register VX is not equal to NN
    /// 4XNN { x: u8, nn: u8 },
    fn skip_if_vx_ne_nn(&mut self, x: u8, nn: u8) -> Result<(), Error> {
        if self.v[x as usize] != nn {
            self.skip_next();
        }
        Ok(())
    }

    /// Skip the following instruction if the value of register VX is equal to the value of register VY
    /// 5XY0 { x: u8, y: u8 },
    fn skip_if_vx_eq_vy(&mut self, x: u8, y: u8) -> Result<(), Error> {
        if self.v[x as usize] == self.v[y as usize] {
            self.skip_next();
        }
        Ok(())
    }

    /// Store number NN in register VX
    /// 6XNN { x: u8, nn: u8 },
    fn assign_vx_nn(&mut self, x: u8, nn: u8) -> Result<(), Error> {
        self.v[x as usize] = nn;
        Ok(())
    }

    /// Add the value NN to register VX
    ///
    /// Wraps around without touching VF
    /// 7XNN { x: u8, nn: u8 },
    fn assign_add_vx_nn(&mut self, x: u8, nn: u8) -> Result<(), Error> {
        self.v[x as usize] = self.v[x as usize].wrapping_add(nn);
        Ok(())
    }

    /// Store the value of register VY in register VX
    /// 8XY0 { x: u8, y: u8 },
    fn assign_vx_vy(&mut self, x: u8, y: u8) -> Result<(), Error> {
        self.v[x as usize] = self.v[y as usize];
        Ok(())
    }

    /// Set VX to VX OR VY
    /// 8XY1 { x: u8, y: u8 },
    fn assign_or_vx_vy(&mut self, x: u8, y: u8) -> Result<(), Error> {
        self.v[x as usize] |= self.v[y as usize];
        Ok(())
    }

    /// Set VX to VX AND VY
    /// 8XY2 { x: u8, y: u8 },
    fn assign_and_vx_vy(&mut self, x: u8, y: u8) -> Result<(), Error> {
        self.v[x as usize] &= self.v[y as usize];
        Ok(())
    }

    /// Set VX to VX XOR VY
    /// 8XY3 { x: u8, y: u8 },
    fn assign_xor_vx_vy(&mut self, x: u8, y: u8) -> Result<(), Error> {
        self.v[x as usize] ^= self.v[y as usize];
        Ok(())
    }

    /// Add the value of register VY to register VX, Set VF to 01 if a carry occurs, Set VF to 00 if a carry does not occur
    ///
    /// The flag is computed from the pre-operation operands and written
    /// last, so it wins when VF is also the destination
    /// 8XY4 { x: u8, y: u8 },
    fn assign_add_vx_vy(&mut self, x: u8, y: u8) -> Result<(), Error> {
        let (value, carry) = self.v[x as usize].overflowing_add(self.v[y as usize]);
        self.v[x as usize] = value;
        self.v[0xF] = carry as u8;
        Ok(())
    }

    /// Subtract the value of register VY from register VX, Set VF to 00 if a borrow occurs, Set VF to 01 if a borrow does not occur
    /// 8XY5 { x: u8, y: u8 },
    fn assign_sub_vx_vy(&mut self, x: u8, y: u8) -> Result<(), Error> {
        let (value, borrow) = self.v[x as usize].overflowing_sub(self.v[y as usize]);
        self.v[x as usize] = value;
        self.v[0xF] = !borrow as u8;
        Ok(())
    }

    /// Store the source register shifted right one bit in register VX, Set register VF to the least significant bit prior to the shift
    ///
    /// The source is VY or VX itself, selected by the shift quirk
    /// 8XY6 { x: u8, y: u8 },
    fn assign_vx_shifted_r(&mut self, x: u8, y: u8) -> Result<(), Error> {
        let source = if self.quirks.shift_source_vy { y } else { x };
        let lsb = self.v[source as usize] & 1;
        self.v[x as usize] = self.v[source as usize] >> 1;
        self.v[0xF] = lsb;
        Ok(())
    }

    /// Set register VX to the value of VY minus VX, Set VF to 00 if a borrow occurs, Set VF to 01 if a borrow does not occur
    /// 8XY7 { x: u8, y: u8 },
    fn assign_vx_vy_sub_vx(&mut self, x: u8, y: u8) -> Result<(), Error> {
        let (value, borrow) = self.v[y as usize].overflowing_sub(self.v[x as usize]);
        self.v[x as usize] = value;
        self.v[0xF] = !borrow as u8;
        Ok(())
    }

    /// Store the source register shifted left one bit in register VX, Set register VF to the most significant bit prior to the shift
    ///
    /// The source is VY or VX itself, selected by the shift quirk
    /// 8XYE { x: u8, y: u8 },
    fn assign_vx_shifted_l(&mut self, x: u8, y: u8) -> Result<(), Error> {
        let source = if self.quirks.shift_source_vy { y } else { x };
        let msb = self.v[source as usize] >> 7;
        self.v[x as usize] = self.v[source as usize] << 1;
        self.v[0xF] = msb;
        Ok(())
    }

    /// Skip the following instruction if the value of register VX is not equal to the value of register VY
    /// 9XY0 { x: u8, y: u8 },
    fn skip_if_vx_ne_vy(&mut self, x: u8, y: u8) -> Result<(), Error> {
        if self.v[x as usize] != self.v[y as usize] {
            self.skip_next();
        }
        Ok(())
    }

    /// Store memory address NNN in register I
    /// ANNN { nnn: u16 },
    fn assign_i_nnn(&mut self, nnn: u16) -> Result<(), Error> {
        self.i = nnn;
        Ok(())
    }

    /// Jump to address NNN plus an offset register
    ///
    /// The offset register is V0, or VX indexed by the high nibble of NNN
    /// when the jump quirk selects it
    /// BNNN { nnn: u16 },
    fn jump_with_offset(&mut self, nnn: u16) -> Result<(), Error> {
        let x = if self.quirks.jump_offset_uses_vx {
            (nnn >> 8) as u8
        } else {
            0
        };
        let addr = nnn + self.v[x as usize] as u16;
        if addr <= 0x0FFF {
            self.pc = addr;
            Ok(())
        } else {
            Err(Error::MemoryOutOfBounds { addr })
        }
    }

    /// Set VX to a random number with a mask of NN
    /// CXNN { x: u8, nn: u8 },
    fn assign_vx_random_and_nn(&mut self, x: u8, nn: u8) -> Result<(), Error> {
        self.v[x as usize] = self.ctx.gen_random() & nn;
        Ok(())
    }

    /// Draw a sprite at position VX, VY with N bytes of sprite data starting at the address stored in I, Set VF to 01 if any set pixels are changed to unset, and 00 otherwise
    ///
    /// The start position wraps modulo the frame size. Pixels past the
    /// right or bottom edge wrap as well, or are dropped when the clip
    /// quirk is on; dropped pixels cannot collide.
    /// DXYN { x: u8, y: u8, n: u8 },
    fn draw_n_at_vx_vy(&mut self, x: u8, y: u8, n: u8) -> Result<(), Error> {
        let start = self.i as usize;
        let end = start + n as usize;
        if end > self.memory.len() {
            return Err(Error::MemoryOutOfBounds {
                addr: self.i + n as u16 - 1,
            });
        }
        let origin_x = self.v[x as usize] as usize % WIDTH;
        let origin_y = self.v[y as usize] as usize % HEIGHT;
        let clip = self.quirks.clip_sprite_wrap;
        let mut collision = false;
        for (row, &byte) in self.memory[start..end].iter().enumerate() {
            for col in 0..8 {
                if byte & (0x80 >> col) == 0 {
                    continue;
                }
                let (px, py) = (origin_x + col, origin_y + row);
                if clip && (px >= WIDTH || py >= HEIGHT) {
                    continue;
                }
                if let Some(previous) = self.frame.xor_pixel(px % WIDTH, py % HEIGHT) {
                    collision |= previous;
                }
            }
        }
        self.v[0xF] = collision as u8;
        self.ctx.on_frame(self.frame.view());
        Ok(())
    }

    /// Skip the following instruction if the key corresponding to the hex value currently stored in register VX is pressed
    /// EX9E { x: u8 },
    fn skip_if_vx_in_keys(&mut self, x: u8) -> Result<(), Error> {
        if self.keys[(self.v[x as usize] & 0x0F) as usize] {
            self.skip_next();
        }
        Ok(())
    }

    /// Skip the following instruction if the key corresponding to the hex value currently stored in register VX is not pressed
    /// EXA1 { x: u8 },
    fn skip_if_vx_not_in_keys(&mut self, x: u8) -> Result<(), Error> {
        if !self.keys[(self.v[x as usize] & 0x0F) as usize] {
            self.skip_next();
        }
        Ok(())
    }

    /// Store the current value of the delay timer in register VX
    /// FX07 { x: u8 },
    fn assign_vx_delay_t(&mut self, x: u8) -> Result<(), Error> {
        self.v[x as usize] = self.delay_timer.load();
        Ok(())
    }

    /// Wait for a keypress and store the result in register VX
    ///
    /// Parks the machine: further steps report `WouldBlock` until
    /// `set_key` records a fresh press. Timer ticks keep running.
    /// FX0A { x: u8 },
    fn assign_vx_wait_for_key(&mut self, x: u8) -> Result<(), Error> {
        debug!("awaiting a keypress into V{:X}", x);
        self.awaiting_key = Some(x);
        Ok(())
    }

    /// Set the delay timer to the value of register VX
    /// FX15 { x: u8 },
    fn assign_delay_t_vx(&mut self, x: u8) -> Result<(), Error> {
        self.delay_timer.store(self.v[x as usize]);
        Ok(())
    }

    /// Set the sound timer to the value of register VX
    ///
    /// A nonzero value starts the tone
    /// FX18 { x: u8 },
    fn assign_sound_t_vx(&mut self, x: u8) -> Result<(), Error> {
        let value = self.v[x as usize];
        self.sound_timer.store(value);
        if value > 0 {
            self.ctx.sound_on();
        }
        Ok(())
    }

    /// Add the value stored in register VX to register I
    /// FX1E { x: u8 },
    fn assign_add_i_vx(&mut self, x: u8) -> Result<(), Error> {
        let addr = self.i + self.v[x as usize] as u16;
        if addr <= 0x0FFF {
            self.i = addr;
            Ok(())
        } else {
            Err(Error::MemoryOutOfBounds { addr })
        }
    }

    /// Set I to the memory address of the sprite data corresponding to the hexadecimal digit stored in register VX
    /// FX29 { x: u8 },
    fn assign_i_addr_of_sprite_vx(&mut self, x: u8) -> Result<(), Error> {
        let digit = (self.v[x as usize] & 0x0F) as usize;
        self.i = (font::BASE_ADDR + 5 * digit) as u16;
        Ok(())
    }

    /// Store the binary-coded decimal equivalent of the value stored in register VX at addresses I, I+1, and I+2
    /// FX33 { x: u8 },
    fn assign_mem_at_i_bcd_of_vx(&mut self, x: u8) -> Result<(), Error> {
        if (self.i as usize + 2) < self.memory.len() {
            let value = self.v[x as usize];
            self.memory[self.i as usize] = value / 100;
            self.memory[(self.i + 1) as usize] = (value % 100) / 10;
            self.memory[(self.i + 2) as usize] = value % 10;
            Ok(())
        } else {
            Err(Error::MemoryOutOfBounds { addr: self.i + 2 })
        }
    }

    /// Store the values of registers V0 to VX inclusive in memory starting at address I
    ///
    /// I ends up at I + X + 1 when the load-store quirk is on, untouched
    /// otherwise. Bounds are validated before any byte moves.
    /// FX55 { x: u8 },
    fn assign_mem_at_i_v0_to_vx(&mut self, x: u8) -> Result<(), Error> {
        let start = self.i as usize;
        let end = start + x as usize;
        if end >= self.memory.len() {
            return Err(Error::MemoryOutOfBounds {
                addr: self.i + x as u16,
            });
        }
        self.memory[start..=end]
            .iter_mut()
            .zip(self.v.iter())
            .for_each(|(mem, &v)| *mem = v);
        if self.quirks.load_store_increments_i {
            self.i += x as u16 + 1;
        }
        Ok(())
    }

    /// Fill registers V0 to VX inclusive with the values stored in memory starting at address I
    ///
    /// I ends up at I + X + 1 when the load-store quirk is on, untouched
    /// otherwise. Bounds are validated before any register changes.
    /// FX65 { x: u8 },
    fn assign_v0_to_vx_mem_at_i(&mut self, x: u8) -> Result<(), Error> {
        let start = self.i as usize;
        let end = start + x as usize;
        if end >= self.memory.len() {
            return Err(Error::MemoryOutOfBounds {
                addr: self.i + x as u16,
            });
        }
        self.v[..=x as usize]
            .iter_mut()
            .zip(self.memory[start..=end].iter())
            .for_each(|(v, &mem)| *v = mem);
        if self.quirks.load_store_increments_i {
            self.i += x as u16 + 1;
        }
        Ok(())
    }
}
