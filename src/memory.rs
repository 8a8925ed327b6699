//! Memory bus implementation for the NES
//!
//! The bus decodes two address spaces. CPU space (16-bit):
//!
//! - 0x0000 - 0x1FFF: 2KB internal RAM, mirrored every 0x0800 bytes
//! - 0x2000 - 0x3FFF: PPU registers, mirrored every 8 bytes
//! - 0x4000 - 0x5FFF: APU and I/O (only $4014/$4016/$4017 are wired)
//! - 0x6000 - 0x7FFF: cartridge save RAM
//! - 0x8000 - 0xFFFF: program ROM (a single 16KB bank is mirrored)
//!
//! PPU space (14-bit):
//!
//! - 0x0000 - 0x1FFF: cartridge tile ROM (pattern tables)
//! - 0x2000 - 0x3EFF: nametable RAM through the cartridge mirror mode
//! - 0x3F00 - 0x3FFF: palette RAM, with the sprite backdrops collapsed
//!   onto the universal backdrop
//!
//! The bus also owns the controller ports, performs OAM DMA, and carries
//! the PPU's interrupt requests to the CPU as a latched vector.

use std::cell::RefCell;
use std::rc::Rc;

use log::{trace, warn};

use crate::cartridge::Cartridge;
use crate::controller::Controller;
use crate::cpu::CpuBus;
use crate::ppu::Ppu;

/// Size of the internal CPU RAM (2KB)
const RAM_SIZE: usize = 0x0800;

/// Size of the nametable RAM (4KB address space backing)
const VIDEO_RAM_SIZE: usize = 0x1000;

/// Size of the palette RAM
const PALETTE_RAM_SIZE: usize = 0x20;

/// Represents the memory bus connecting all NES components
pub struct MemoryBus {
    /// Internal RAM (2KB)
    ram: [u8; RAM_SIZE],

    /// Nametable RAM
    video_ram: [u8; VIDEO_RAM_SIZE],

    /// Palette RAM
    palette_ram: [u8; PALETTE_RAM_SIZE],

    /// Cartridge connected to the system
    cartridge: Option<Cartridge>,

    /// Nametable mirroring arrangement, copied from the cartridge header
    mirror_mode: bool,

    /// Controller ports
    controllers: [Option<Rc<RefCell<Controller>>>; 2],

    /// Latched interrupt vector awaiting CPU pickup (0 = none)
    pending_interrupt: u16,
}

impl MemoryBus {
    /// Create a new memory bus with no cartridge inserted
    pub fn new() -> Self {
        MemoryBus {
            ram: [0; RAM_SIZE],
            video_ram: [0; VIDEO_RAM_SIZE],
            palette_ram: [0; PALETTE_RAM_SIZE],
            cartridge: None,
            mirror_mode: false,
            controllers: [None, None],
            pending_interrupt: 0,
        }
    }

    /// Reset the bus: zero all RAM banks and drop any pending interrupt.
    /// The cartridge and controllers stay attached.
    pub fn reset(&mut self) {
        self.ram = [0; RAM_SIZE];
        self.video_ram = [0; VIDEO_RAM_SIZE];
        self.palette_ram = [0; PALETTE_RAM_SIZE];
        self.pending_interrupt = 0;
    }

    /// Insert a cartridge, adopting its mirroring arrangement
    pub fn insert_cartridge(&mut self, cartridge: Cartridge) {
        self.mirror_mode = cartridge.header.mirror_mode();
        self.cartridge = Some(cartridge);
    }

    /// Remove the cartridge from the system
    pub fn remove_cartridge(&mut self) -> Option<Cartridge> {
        self.cartridge.take()
    }

    /// The currently inserted cartridge, if any
    pub fn cartridge(&self) -> Option<&Cartridge> {
        self.cartridge.as_ref()
    }

    /// Attach a controller to port 0 or 1
    pub fn attach_controller(&mut self, index: usize, controller: Rc<RefCell<Controller>>) {
        if index < 2 {
            self.controllers[index] = Some(controller);
        } else {
            warn!("Controller port out of range: {}", index);
            debug_assert!(false, "controller port out of range");
        }
    }

    /// Request an interrupt on behalf of a device. The vector is latched
    /// until the CPU collects it at its next instruction boundary.
    pub fn fire_interrupt(&mut self, vector: u16) {
        self.pending_interrupt = vector;
    }

    /// Collect and clear the latched interrupt vector (0 = none)
    pub fn take_interrupt(&mut self) -> u16 {
        std::mem::take(&mut self.pending_interrupt)
    }

    /// Read a byte from CPU address space
    pub fn read_cpu_byte(&mut self, ppu: &mut Ppu, address: u16) -> u8 {
        if address >= 0x8000 {
            let Some(cart) = &self.cartridge else {
                warn!("Read from program ROM with no cartridge: ${:04X}", address);
                debug_assert!(false, "read with no cartridge");
                return 0;
            };
            match cart.header.prg_pages {
                1 => cart.program_rom[(address - 0x8000) as usize % 0x4000],
                2 => cart.program_rom[(address - 0x8000) as usize],
                pages => {
                    warn!("Unsupported program bank count: {}", pages);
                    0
                }
            }
        } else if address >= 0x6000 {
            match &self.cartridge {
                Some(cart) => cart.save_ram[(address - 0x6000) as usize],
                None => {
                    warn!("Read from save RAM with no cartridge: ${:04X}", address);
                    debug_assert!(false, "read with no cartridge");
                    0
                }
            }
        } else if address >= 0x4000 {
            match address {
                0x4014 => {
                    // The DMA register is write-only.
                    warn!("Read from OAM DMA register");
                    debug_assert!(false, "read from write-only DMA register");
                    0
                }
                0x4016 => self.read_controller(0),
                0x4017 => self.read_controller(1),
                _ => {
                    trace!("Read from unsupported I/O: ${:04X}", address);
                    0
                }
            }
        } else if address >= 0x2000 {
            ppu.read_register(self, (address - 0x2000) & 0x7)
        } else {
            self.ram[(address & 0x07FF) as usize]
        }
    }

    /// Read a 16-bit little-endian word from CPU address space.
    ///
    /// The two byte reads are independent; no page wrapping is applied.
    pub fn read_cpu_word(&mut self, ppu: &mut Ppu, address: u16) -> u16 {
        let low = self.read_cpu_byte(ppu, address);
        let high = self.read_cpu_byte(ppu, address.wrapping_add(1));
        u16::from_le_bytes([low, high])
    }

    /// Write a byte to CPU address space
    pub fn write_cpu_byte(&mut self, ppu: &mut Ppu, address: u16, value: u8) {
        if address >= 0x8000 {
            warn!("Write to program ROM: ${:04X} = ${:02X}", address, value);
            debug_assert!(false, "write to program ROM address space");
        } else if address >= 0x6000 {
            match &mut self.cartridge {
                Some(cart) => cart.save_ram[(address - 0x6000) as usize] = value,
                None => {
                    warn!("Write to save RAM with no cartridge: ${:04X}", address);
                    debug_assert!(false, "write with no cartridge");
                }
            }
        } else if address >= 0x4000 {
            match address {
                0x4014 => self.oam_dma(ppu, value),
                0x4016 => {
                    // The strobe reaches both controllers.
                    for port in &self.controllers {
                        if let Some(pad) = port {
                            pad.borrow_mut().write(value);
                        }
                    }
                }
                _ => {
                    trace!("Write to unsupported I/O: ${:04X} = ${:02X}", address, value);
                }
            }
        } else if address >= 0x2000 {
            ppu.write_register(self, (address - 0x2000) & 0x7, value);
        } else {
            self.ram[(address & 0x07FF) as usize] = value;
        }
    }

    /// Write a 16-bit little-endian word to CPU address space
    pub fn write_cpu_word(&mut self, ppu: &mut Ppu, address: u16, value: u16) {
        self.write_cpu_byte(ppu, address, (value & 0xFF) as u8);
        self.write_cpu_byte(ppu, address.wrapping_add(1), (value >> 8) as u8);
    }

    /// Read a byte from PPU address space
    pub fn read_ppu_byte(&self, address: u16) -> u8 {
        debug_assert!(address <= 0x3FFF, "PPU address out of range: ${:04X}", address);

        if address >= 0x3F00 {
            self.palette_ram[Self::palette_index(address)]
        } else if address >= 0x2000 {
            self.video_ram[self.nametable_index(address)]
        } else {
            match &self.cartridge {
                Some(cart) => cart.tile_rom[address as usize],
                None => {
                    warn!("Read from tile ROM with no cartridge: ${:04X}", address);
                    0
                }
            }
        }
    }

    /// Write a byte to PPU address space.
    ///
    /// Writes below 0x2000 land in tile ROM; real NROM hardware ignores
    /// them, but this core writes through.
    pub fn write_ppu_byte(&mut self, address: u16, value: u8) {
        if address >= 0x3FFF {
            warn!("Write past PPU address space: ${:04X} = ${:02X}", address, value);
            debug_assert!(false, "PPU write out of range");
        } else if address >= 0x3F00 {
            self.palette_ram[Self::palette_index(address)] = value;
        } else if address >= 0x2000 {
            let index = self.nametable_index(address);
            self.video_ram[index] = value;
        } else {
            match &mut self.cartridge {
                Some(cart) => cart.tile_rom[address as usize] = value,
                None => warn!("Write to tile ROM with no cartridge: ${:04X}", address),
            }
        }
    }

    /// Collapse a palette address onto its RAM slot. The sprite backdrop
    /// entries $3F10/$3F14/$3F18/$3F1C mirror the background set.
    fn palette_index(address: u16) -> usize {
        let address = if address >= 0x3F10 && address % 4 == 0 {
            address - 0x10
        } else {
            address
        };
        ((address - 0x3F00) & 0x1F) as usize
    }

    /// Apply the cartridge's nametable mirroring to a PPU-space address
    fn nametable_index(&self, address: u16) -> usize {
        if self.mirror_mode {
            // Vertical mirroring: $2000 and $2400 hold the two horizontal
            // tables, with mirrors at $2800 and $2C00.
            (address & 0x07FF) as usize
        } else {
            // Horizontal mirroring: $2000 and $2800 hold the two vertical
            // tables, with mirrors at $2400 and $2C00.
            (address & 0x0BFF) as usize
        }
    }

    fn read_controller(&mut self, port: usize) -> u8 {
        match &self.controllers[port] {
            Some(pad) => pad.borrow_mut().read(),
            None => 0,
        }
    }

    /// OAM DMA ($4014 write): copy 256 bytes from CPU space, starting at
    /// `page << 8`, into the PPU's OAM at its current OAM address.
    fn oam_dma(&mut self, ppu: &mut Ppu, page: u8) {
        let base = (page as u16) << 8;
        for offset in 0..256 {
            let value = self.read_cpu_byte(ppu, base + offset);
            ppu.write_oam_data(value);
        }
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

/// The CPU's view of the machine: the memory bus plus the PPU register
/// window. Implements the CPU's bus trait by routing every access through
/// the bus decode above.
pub struct CpuMemory<'a> {
    pub bus: &'a mut MemoryBus,
    pub ppu: &'a mut Ppu,
}

impl CpuBus for CpuMemory<'_> {
    fn read(&mut self, address: u16) -> u8 {
        self.bus.read_cpu_byte(self.ppu, address)
    }

    fn write(&mut self, address: u16, value: u8) {
        self.bus.write_cpu_byte(self.ppu, address, value)
    }

    fn take_interrupt(&mut self) -> u16 {
        self.bus.take_interrupt()
    }
}
