//! # famicom
//!
//! A scanline-accurate Famicom / Nintendo Entertainment System emulator
//! core for NROM (mapper 0) cartridges.
//!
//! The system is a synchronous, single-threaded simulation: the [`Famicom`]
//! facade advances one whole video frame per [`Famicom::tick`], stepping
//! the 2A03 CPU and the 2C02 PPU scanline by scanline over a shared memory
//! bus. Audio, mappers beyond NROM and dot-accurate PPU timing are out of
//! scope.

pub mod cartridge;
pub mod controller;
pub mod cpu;
pub mod memory;
pub mod nes;
pub mod ppu;

pub use cartridge::{Cartridge, RomError};
pub use controller::Controller;
pub use cpu::Cpu;
pub use memory::MemoryBus;
pub use nes::Famicom;
pub use ppu::Ppu;
