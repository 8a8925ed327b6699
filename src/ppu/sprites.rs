//! Sprite rendering for the PPU
//!
//! OAM holds 64 four-byte sprite descriptors. For each scanline the first
//! eight intersecting sprites are gathered in OAM order and composited in
//! reverse (painter's algorithm), so lower OAM indices end up on top.
//! Sprites flagged behind the background are not composited at all.

use crate::memory::MemoryBus;

use super::{control, status, Ppu, FRAME_WIDTH};

/// Hardware limit of sprites drawn per scanline
pub const MAX_SPRITES_PER_SCANLINE: usize = 8;

/// One OAM sprite descriptor: `y, tile, attributes, x`.
///
/// Attribute bits: palette (0-1), priority (5, 1 = behind background),
/// flip-x (6), flip-y (7).
#[derive(Copy, Clone, Default)]
struct SpriteDesc {
    y: u8,
    tile: u8,
    attributes: u8,
    x: u8,
}

impl Ppu {
    fn sprite_desc(&self, index: usize) -> SpriteDesc {
        let base = index * 4;
        SpriteDesc {
            y: self.oam[base],
            tile: self.oam[base + 1],
            attributes: self.oam[base + 2],
            x: self.oam[base + 3],
        }
    }

    /// Render the sprites intersecting framebuffer row `y`
    pub(super) fn render_sprites_to_scanline(&mut self, bus: &MemoryBus, y: u32) {
        let mut sprites = [SpriteDesc::default(); MAX_SPRITES_PER_SCANLINE];
        let count = self.gather_sprite_hits(y, &mut sprites);

        // Reverse order so the lowest OAM index is painted last, on top.
        for desc in sprites[..count].iter().rev() {
            self.render_one_sprite(bus, *desc, y);
        }
    }

    /// Collect the first eight sprites that intersect scanline `y`, in OAM
    /// order. Finding a ninth sets the sprite-overflow flag.
    fn gather_sprite_hits(
        &mut self,
        y: u32,
        sprites: &mut [SpriteDesc; MAX_SPRITES_PER_SCANLINE],
    ) -> usize {
        let mut count = 0;

        for index in 0..64 {
            let desc = self.sprite_desc(index);

            if desc.y >= 240 {
                continue;
            }
            let sprite_y = desc.y as u32;
            if sprite_y > y || sprite_y + 7 < y {
                continue;
            }

            if count < MAX_SPRITES_PER_SCANLINE {
                sprites[count] = desc;
                count += 1;
            } else {
                self.status |= status::SPRITE_OVERFLOW;
                break;
            }
        }

        count
    }

    fn render_one_sprite(&mut self, bus: &MemoryBus, desc: SpriteDesc, y: u32) {
        if desc.attributes & 0x20 != 0 {
            // Background-priority sprites are not composited.
            return;
        }

        self.status |= status::SPRITE_ZERO_HIT;

        let internal_y = (y - desc.y as u32) as u8;
        let pixel_offset = ((y * FRAME_WIDTH as u32 + desc.x as u32) * 3) as usize;
        let count = 8.min(FRAME_WIDTH as u32 - desc.x as u32) as u8;

        self.render_sprite_pattern(bus, pixel_offset, desc.tile, desc.attributes, internal_y, count);
    }

    fn render_sprite_pattern(
        &mut self,
        bus: &MemoryBus,
        pixel_offset: usize,
        pattern_index: u8,
        attributes: u8,
        internal_y: u8,
        count: u8,
    ) {
        let internal_y = if attributes & 0x80 != 0 {
            7 - internal_y
        } else {
            internal_y
        };

        let pattern_base: u16 = if self.control & control::SPRITE_PATTERN_TABLE != 0 {
            0x1000
        } else {
            0x0000
        };
        let low_address = pattern_base + pattern_index as u16 * 16 + internal_y as u16;

        let low_byte = bus.read_ppu_byte(low_address);
        let high_byte = bus.read_ppu_byte(low_address + 8);

        let palette_base: u16 = match attributes & 0x3 {
            0x0 => 0x3F11,
            0x1 => 0x3F15,
            0x2 => 0x3F19,
            _ => 0x3F1D,
        };

        self.render_sprite_pattern_line(
            bus,
            pixel_offset,
            low_byte,
            high_byte,
            attributes,
            palette_base,
            count,
        );
    }

    fn render_sprite_pattern_line(
        &mut self,
        bus: &MemoryBus,
        pixel_offset: usize,
        mut low_byte: u8,
        mut high_byte: u8,
        attributes: u8,
        palette_base: u16,
        count: u8,
    ) {
        let color_indices = [
            bus.read_ppu_byte(0x3F00),
            bus.read_ppu_byte(palette_base),
            bus.read_ppu_byte(palette_base + 1),
            bus.read_ppu_byte(palette_base + 2),
        ];

        if attributes & 0x40 != 0 {
            // Horizontal flip: shift the pattern out LSB-first.
            for i in 0..count as usize {
                let pattern = (low_byte & 0x1) | ((high_byte & 0x1) << 1);
                self.render_pixel(pixel_offset + i * 3, pattern, &color_indices, true);

                low_byte >>= 1;
                high_byte >>= 1;
            }
        } else {
            for i in 0..count as usize {
                let pattern = ((low_byte & 0x80) >> 7) | ((high_byte & 0x80) >> 6);
                self.render_pixel(pixel_offset + i * 3, pattern, &color_indices, true);

                low_byte <<= 1;
                high_byte <<= 1;
            }
        }
    }
}
