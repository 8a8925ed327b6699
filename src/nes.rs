//! NES system facade
//!
//! `Famicom` owns the CPU, PPU and memory bus and wires them together. The
//! host inserts a ROM, attaches controllers, calls `tick` once per frame
//! and copies the display window out with `read_frame_buffer`.
//!
//! A frame is 262 scanlines; for each the CPU runs its cycle slice first
//! and then the PPU renders one scanline. An NMI raised at the vblank
//! scanline is therefore latched and observed at the start of the next
//! frame's first CPU slice.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use log::debug;

use crate::cartridge::{Cartridge, RomError};
use crate::controller::Controller;
use crate::cpu::Cpu;
use crate::memory::{CpuMemory, MemoryBus};
use crate::ppu::{Ppu, DISPLAY_BUFFER_SIZE, SCANLINES_PER_FRAME};

/// Represents the NES hardware system
pub struct Famicom {
    cpu: Cpu,
    ppu: Ppu,
    bus: MemoryBus,
    frame: u64,
}

impl Famicom {
    /// Create a new system with no cartridge inserted
    pub fn new() -> Self {
        Famicom {
            cpu: Cpu::new(),
            ppu: Ppu::new(),
            bus: MemoryBus::new(),
            frame: 0,
        }
    }

    /// Load an iNES ROM file and reset the system around it
    pub fn insert_rom<P: AsRef<Path>>(&mut self, path: P) -> Result<(), RomError> {
        let cartridge = Cartridge::from_file(path)?;
        self.install_cartridge(cartridge);
        Ok(())
    }

    /// Load a cartridge from in-memory iNES data and reset the system
    pub fn load_cartridge(&mut self, data: &[u8]) -> Result<(), RomError> {
        let cartridge = Cartridge::from_bytes(data)?;
        self.install_cartridge(cartridge);
        Ok(())
    }

    fn install_cartridge(&mut self, cartridge: Cartridge) {
        self.eject_rom();

        let mirror_mode = cartridge.header.mirror_mode();

        self.bus.reset();
        self.bus.insert_cartridge(cartridge);

        self.ppu.reset();
        self.ppu.set_mirror_mode(mirror_mode);

        // The CPU reset reads the vector through the freshly mapped ROM.
        self.cpu.reset(&mut CpuMemory {
            bus: &mut self.bus,
            ppu: &mut self.ppu,
        });

        self.frame = 0;
        debug!("System reset, execution begins at ${:04X}", self.cpu.pc);
    }

    /// Remove the cartridge. Save RAM contents are discarded.
    pub fn eject_rom(&mut self) {
        self.bus.remove_cartridge();
    }

    /// Attach a controller to port 0 or 1. The host keeps its own handle
    /// for setting button states.
    pub fn attach_controller(&mut self, index: usize, controller: Rc<RefCell<Controller>>) {
        self.bus.attach_controller(index, controller);
    }

    /// Advance the simulation by one video frame
    pub fn tick(&mut self) {
        if self.bus.cartridge().is_some() {
            for _ in 0..SCANLINES_PER_FRAME {
                self.cpu.step(&mut CpuMemory {
                    bus: &mut self.bus,
                    ppu: &mut self.ppu,
                });
                self.ppu.step(&mut self.bus);
            }
        }

        self.frame += 1;
    }

    /// Copy the visible 256x224 RGB window out of the framebuffer
    pub fn read_frame_buffer(&self, output: &mut [u8; DISPLAY_BUFFER_SIZE]) {
        self.ppu.read_frame_buffer(output);
    }

    /// Frames ticked since the last reset
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// The CPU, for inspection and debugging
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// The PPU, for inspection and debugging
    pub fn ppu(&self) -> &Ppu {
        &self.ppu
    }

    /// The memory bus, for inspection and debugging
    pub fn bus(&self) -> &MemoryBus {
        &self.bus
    }
}

impl Default for Famicom {
    fn default() -> Self {
        Self::new()
    }
}
