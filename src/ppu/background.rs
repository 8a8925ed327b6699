//! Background rendering for the PPU
//!
//! The background is a 32x30 grid of 8x8 tiles per nametable, colored
//! through the attribute table's 2-bit palette quadrants. Rendering is
//! run-based: each scanline is walked in spans of up to eight pixels that
//! share a tile row, so the nametable, attribute and pattern bytes are
//! fetched once per span.

use log::warn;

use crate::memory::MemoryBus;

use super::{control, mask, Ppu, FRAME_WIDTH};

impl Ppu {
    /// Render the background for framebuffer row `y`
    pub(super) fn render_background_to_scanline(&mut self, bus: &MemoryBus, y: u32) {
        let start_x = if self.mask & mask::SCREEN_MASK != 0 { 0 } else { 8 };

        let mut x = start_x;
        while x < FRAME_WIDTH as u32 {
            let nametable_x = x + self.scroll_x as u32;
            let nametable_y = y + self.scroll_y as u32;

            // Run length: to the end of the current tile, clipped to the
            // right screen edge.
            let count = (8 - nametable_x % 8).min(FRAME_WIDTH as u32 - x);

            let pattern_index =
                self.fetch_nametable_byte(bus, (nametable_x >> 3) as u16, (nametable_y >> 3) as u16);
            let attrib =
                self.fetch_attrib_byte(bus, (nametable_x >> 4) as u16, (nametable_y >> 4) as u16);

            let pixel_offset = ((y * FRAME_WIDTH as u32 + x) * 3) as usize;
            self.render_background_pattern(
                bus,
                pixel_offset,
                pattern_index,
                attrib,
                (nametable_x % 8) as u8,
                (nametable_y % 8) as u8,
                count as u8,
            );

            x += count;
        }
    }

    /// Fetch a tile index from the nametable, wrapping across the
    /// mirrored table when scrolling crosses a nametable edge.
    fn fetch_nametable_byte(&self, bus: &MemoryBus, tile_x: u16, tile_y: u16) -> u8 {
        // Recomputed per fetch so mid-frame control writes take effect.
        let mut address =
            0x2000 | (((self.control & control::NAMETABLE_SELECT) as u16) << 10);
        let mut tile_x = tile_x;
        let mut tile_y = tile_y;

        if self.mirror_mode {
            // Vertical mirroring: $2000 and $2400 hold the two horizontal
            // tables.
            if tile_y >= 30 {
                warn!("Nametable row out of range under vertical mirroring: {}", tile_y);
                debug_assert!(false, "nametable row out of range");
            }

            if tile_x >= 32 {
                address ^= 0x0400;
                tile_x -= 32;
            }
        } else {
            // Horizontal mirroring: $2000 and $2800 hold the two vertical
            // tables.
            if tile_x >= 32 {
                warn!("Nametable column out of range under horizontal mirroring: {}", tile_x);
                debug_assert!(false, "nametable column out of range");
            }

            if tile_y >= 30 {
                address ^= 0x0800;
                tile_y -= 30;
            }
        }

        address += tile_y * 32 + tile_x;
        bus.read_ppu_byte(address)
    }

    /// Fetch the 2-bit palette quadrant for a 16-pixel block from the
    /// attribute table.
    fn fetch_attrib_byte(&self, bus: &MemoryBus, tile_x: u16, tile_y: u16) -> u8 {
        let mut address =
            0x23C0 | (((self.control & control::NAMETABLE_SELECT) as u16) << 10);

        // Position within the 8x8 attribute grid, and within the byte.
        let mut block_x = tile_x >> 1;
        let mut block_y = tile_y >> 1;
        let sub_tile_x = tile_x % 2;
        let sub_tile_y = tile_y % 2;

        if self.mirror_mode {
            if block_y >= 8 {
                warn!("Attribute row out of range under vertical mirroring: {}", block_y);
                debug_assert!(false, "attribute row out of range");
            }

            if block_x >= 8 {
                address ^= 0x0400;
                block_x -= 8;
            }
        } else {
            if block_x >= 8 {
                warn!("Attribute column out of range under horizontal mirroring: {}", block_x);
                debug_assert!(false, "attribute column out of range");
            }

            if block_y >= 8 {
                address ^= 0x0800;
                block_y -= 8;
            }
        }

        address += block_y * 8 + block_x;
        let attrib = bus.read_ppu_byte(address);

        (attrib >> (4 * sub_tile_y + 2 * sub_tile_x)) & 0x3
    }

    /// Render up to eight pixels of one background tile row
    fn render_background_pattern(
        &mut self,
        bus: &MemoryBus,
        pixel_offset: usize,
        pattern_index: u8,
        palette_index: u8,
        internal_x: u8,
        internal_y: u8,
        count: u8,
    ) {
        let pattern_base: u16 = if self.control & control::SCREEN_PATTERN_TABLE != 0 {
            0x1000
        } else {
            0x0000
        };
        let low_address = pattern_base + pattern_index as u16 * 16 + internal_y as u16;

        // Pre-shift so the span's first pixel sits at the MSB.
        let low = bus.read_ppu_byte(low_address) << internal_x;
        let high = bus.read_ppu_byte(low_address + 8) << internal_x;

        let palette_base: u16 = match palette_index {
            0x0 => 0x3F01,
            0x1 => 0x3F05,
            0x2 => 0x3F09,
            _ => 0x3F0D,
        };

        self.render_background_pattern_line(bus, pixel_offset, low, high, palette_base, count);
    }

    fn render_background_pattern_line(
        &mut self,
        bus: &MemoryBus,
        pixel_offset: usize,
        mut low_byte: u8,
        mut high_byte: u8,
        palette_base: u16,
        count: u8,
    ) {
        // Pattern value 0 normally reads the universal backdrop, but while
        // the VRAM pointer parks inside palette space the hardware shows
        // that entry instead; this core honours the quirk.
        let mut backdrop_address = 0x3F00;
        if self.vram_addr >= 0x3F00 && self.vram_addr <= 0x3FFF {
            backdrop_address = self.vram_addr;
        }

        let color_indices = [
            bus.read_ppu_byte(backdrop_address),
            bus.read_ppu_byte(palette_base),
            bus.read_ppu_byte(palette_base + 1),
            bus.read_ppu_byte(palette_base + 2),
        ];

        for i in 0..count as usize {
            let pattern = ((low_byte & 0x80) >> 7) | ((high_byte & 0x80) >> 6);
            self.render_pixel(pixel_offset + i * 3, pattern, &color_indices, false);

            low_byte <<= 1;
            high_byte <<= 1;
        }
    }
}
