//! NES cartridge implementation
//!
//! Parses the iNES container format: a 16-byte header followed by the
//! program-ROM payload (16KB pages) and the tile-ROM payload (8KB pages).
//! Only the plain NROM layout is supported; trainers, battery-backed save
//! RAM and four-screen VRAM expansion are rejected at load time.

use std::fs;
use std::path::Path;

use log::info;
use thiserror::Error;

/// Size of the iNES header
pub const INES_HEADER_SIZE: usize = 16;

/// Size of a program-ROM page (16KB)
pub const PROGRAM_PAGE_SIZE: usize = 0x4000;

/// Size of a tile-ROM (pattern table) page (8KB)
pub const TILE_PAGE_SIZE: usize = 0x2000;

/// Size of a save-RAM page (8KB)
pub const SAVE_RAM_PAGE_SIZE: usize = 0x2000;

/// Errors that can occur when loading a ROM file
#[derive(Error, Debug)]
pub enum RomError {
    #[error("failed to read ROM file: {0}")]
    Io(#[from] std::io::Error),

    #[error("ROM file is shorter than its header declares")]
    Truncated,

    #[error("invalid iNES header")]
    InvalidHeader,

    #[error("unsupported cartridge feature: {0}")]
    Unsupported(&'static str),
}

/// Parsed 16-byte iNES header.
///
/// The flag bytes are kept packed, exactly as read from disk, with accessor
/// methods for the individual fields.
#[derive(Debug, Clone, Copy)]
pub struct RomHeader {
    /// Program-ROM page count (16KB units)
    pub prg_pages: u8,

    /// Tile-ROM page count (8KB units)
    pub tile_pages: u8,

    /// Flags byte 6: mirroring, SRAM, trainer, VRAM expansion, mapper low
    pub flags1: u8,

    /// Flags byte 7: mapper high nibble
    pub flags2: u8,

    /// Save-RAM page count (8KB units)
    pub sram_pages: u8,
}

impl RomHeader {
    /// Parse and validate the 16-byte iNES header.
    pub fn parse(data: &[u8]) -> Result<Self, RomError> {
        if data.len() < INES_HEADER_SIZE {
            return Err(RomError::Truncated);
        }

        if data[0..4] != [b'N', b'E', b'S', 0x1A] {
            return Err(RomError::InvalidHeader);
        }

        let header = RomHeader {
            prg_pages: data[4],
            tile_pages: data[5],
            flags1: data[6],
            flags2: data[7],
            sram_pages: data[8],
        };

        if header.prg_pages == 0 || header.tile_pages == 0 || header.sram_pages >= 2 {
            return Err(RomError::InvalidHeader);
        }

        if header.has_trainer() {
            return Err(RomError::Unsupported("trainer"));
        }
        if header.sram_available() {
            return Err(RomError::Unsupported("battery-backed save RAM"));
        }
        if header.vram_expansion() {
            return Err(RomError::Unsupported("four-screen VRAM expansion"));
        }

        Ok(header)
    }

    /// Nametable mirroring arrangement: `true` selects vertical mirroring
    /// ($2000/$2400 hold the two horizontal tables), `false` horizontal.
    pub fn mirror_mode(&self) -> bool {
        (self.flags1 & 0x01) != 0
    }

    /// Whether battery-backed save RAM is present
    pub fn sram_available(&self) -> bool {
        (self.flags1 & 0x02) != 0
    }

    /// Whether a 512-byte trainer precedes the program ROM
    pub fn has_trainer(&self) -> bool {
        (self.flags1 & 0x04) != 0
    }

    /// Whether the cartridge provides four-screen nametable VRAM
    pub fn vram_expansion(&self) -> bool {
        (self.flags1 & 0x08) != 0
    }

    /// Mapper number, assembled from both flag-byte nibbles
    pub fn mapper_number(&self) -> u8 {
        (self.flags2 & 0xF0) | (self.flags1 >> 4)
    }
}

/// Represents an inserted NES cartridge: the parsed header plus the ROM
/// payloads and resident save RAM.
pub struct Cartridge {
    /// Parsed iNES header
    pub header: RomHeader,

    /// Program ROM (`prg_pages` x 16KB)
    pub program_rom: Vec<u8>,

    /// Tile ROM / pattern tables (`tile_pages` x 8KB)
    pub tile_rom: Vec<u8>,

    /// Save RAM (at least one 8KB page, zero-filled; never persisted)
    pub save_ram: Vec<u8>,
}

impl Cartridge {
    /// Create a cartridge from ROM data in iNES format.
    pub fn from_bytes(data: &[u8]) -> Result<Self, RomError> {
        let header = RomHeader::parse(data)?;

        let program_size = PROGRAM_PAGE_SIZE * header.prg_pages as usize;
        let tile_size = TILE_PAGE_SIZE * header.tile_pages as usize;
        let save_ram_size = SAVE_RAM_PAGE_SIZE * header.sram_pages.max(1) as usize;

        let program_start = INES_HEADER_SIZE;
        let tile_start = program_start + program_size;

        if data.len() < tile_start + tile_size {
            return Err(RomError::Truncated);
        }

        let program_rom = data[program_start..tile_start].to_vec();
        let tile_rom = data[tile_start..tile_start + tile_size].to_vec();

        info!(
            "Loaded cartridge - PRG: {}KB, CHR: {}KB, Mirroring: {}, Mapper: {}",
            program_size / 1024,
            tile_size / 1024,
            if header.mirror_mode() { "vertical" } else { "horizontal" },
            header.mapper_number()
        );

        Ok(Cartridge {
            header,
            program_rom,
            tile_rom,
            save_ram: vec![0; save_ram_size],
        })
    }

    /// Load a cartridge from an iNES ROM file on disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RomError> {
        let data = fs::read(path)?;
        Self::from_bytes(&data)
    }
}
