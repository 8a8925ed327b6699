//! End-to-end tests driving the `Famicom` facade with synthetic iNES
//! images: reset behaviour, CPU programs running against the real bus,
//! OAM DMA, controller input and NMI delivery across frames.

use std::cell::RefCell;
use std::rc::Rc;

use famicom::ppu::SYSTEM_PALETTE;
use famicom::{Controller, Famicom};

/// Builds a one-bank NROM image: 16KB of program ROM (vectors included)
/// plus 8KB of tile ROM.
struct RomBuilder {
    prg: Vec<u8>,
    chr: Vec<u8>,
}

impl RomBuilder {
    fn new() -> Self {
        RomBuilder {
            prg: vec![0; 0x4000],
            chr: vec![0; 0x2000],
        }
    }

    /// Place bytes at a CPU-space address (the single bank mirrors across
    /// $8000-$FFFF).
    fn code(mut self, address: u16, bytes: &[u8]) -> Self {
        let offset = (address as usize - 0x8000) % 0x4000;
        self.prg[offset..offset + bytes.len()].copy_from_slice(bytes);
        self
    }

    fn chr(mut self, offset: usize, bytes: &[u8]) -> Self {
        self.chr[offset..offset + bytes.len()].copy_from_slice(bytes);
        self
    }

    fn reset_vector(self, address: u16) -> Self {
        self.code(0xFFFC, &address.to_le_bytes())
    }

    fn nmi_vector(self, address: u16) -> Self {
        self.code(0xFFFA, &address.to_le_bytes())
    }

    fn build(self) -> Vec<u8> {
        let mut image = vec![0u8; 16];
        image[0..4].copy_from_slice(b"NES\x1A");
        image[4] = 1;
        image[5] = 1;
        image.extend(self.prg);
        image.extend(self.chr);
        image
    }
}

fn famicom_with(rom: Vec<u8>) -> Famicom {
    let mut nes = Famicom::new();
    nes.load_cartridge(&rom).expect("test ROM should load");
    nes
}

#[test]
fn reset_jumps_through_the_reset_vector() {
    let nes = famicom_with(RomBuilder::new().reset_vector(0x8000).build());

    assert_eq!(nes.cpu().pc, 0x8000);
    assert_eq!(nes.cpu().sp, 0xFD);
    assert_eq!(nes.cpu().p, 0x24);
}

#[test]
fn programs_execute_against_the_bus() {
    // LDA #$80, then spin.
    let rom = RomBuilder::new()
        .reset_vector(0x8000)
        .code(0x8000, &[0xA9, 0x80, 0x4C, 0x02, 0x80])
        .build();
    let mut nes = famicom_with(rom);

    nes.tick();

    assert_eq!(nes.cpu().a, 0x80);
    assert_ne!(nes.cpu().p & 0x80, 0); // negative
    assert_eq!(nes.frame(), 1);
}

#[test]
fn adc_overflow_is_visible_in_the_status_register() {
    // LDA #$50, ADC #$50, then spin.
    let rom = RomBuilder::new()
        .reset_vector(0x8000)
        .code(0x8000, &[0xA9, 0x50, 0x69, 0x50, 0x4C, 0x04, 0x80])
        .build();
    let mut nes = famicom_with(rom);

    nes.tick();

    assert_eq!(nes.cpu().a, 0xA0);
    assert_ne!(nes.cpu().p & 0x40, 0); // overflow
    assert_ne!(nes.cpu().p & 0x80, 0); // negative
    assert_eq!(nes.cpu().p & 0x01, 0); // carry clear
}

#[test]
fn indirect_jmp_honours_the_page_wrap_bug() {
    // Store $40 at $02FF and $80 at $0200, then JMP ($02FF). The buggy
    // high-byte fetch wraps back to $0200 instead of reading $0300,
    // landing on the spin loop at $8040.
    let rom = RomBuilder::new()
        .reset_vector(0x8000)
        .code(
            0x8000,
            &[
                0xA9, 0x40, 0x8D, 0xFF, 0x02, // LDA #$40, STA $02FF
                0xA9, 0x80, 0x8D, 0x00, 0x02, // LDA #$80, STA $0200
                0x6C, 0xFF, 0x02, // JMP ($02FF)
            ],
        )
        .code(0x8040, &[0x4C, 0x40, 0x80])
        .build();
    let mut nes = famicom_with(rom);

    nes.tick();

    assert_eq!(nes.cpu().pc, 0x8040);
}

#[test]
fn oam_dma_copies_a_ramp_into_sprite_memory() {
    // Fill $0200-$02FF with 0..255, then write $02 to $4014.
    let rom = RomBuilder::new()
        .reset_vector(0x8000)
        .code(
            0x8000,
            &[
                0xA2, 0x00, // LDX #$00
                0x8A, // loop: TXA
                0x9D, 0x00, 0x02, // STA $0200,X
                0xE8, // INX
                0xD0, 0xF9, // BNE loop
                0xA9, 0x02, 0x8D, 0x14, 0x40, // LDA #$02, STA $4014
                0x4C, 0x0E, 0x80, // spin
            ],
        )
        .build();
    let mut nes = famicom_with(rom);

    nes.tick();

    for i in 0..256usize {
        assert_eq!(nes.ppu().oam()[i], i as u8);
    }
}

#[test]
fn vblank_nmi_is_serviced_on_the_following_frame() {
    // Enable the vblank NMI, then spin. The handler loads a marker and
    // spins at $9002.
    let rom = RomBuilder::new()
        .reset_vector(0x8000)
        .nmi_vector(0x9000)
        .code(
            0x8000,
            &[
                0xA9, 0x80, 0x8D, 0x00, 0x20, // LDA #$80, STA $2000
                0x4C, 0x05, 0x80, // spin
            ],
        )
        .code(0x9000, &[0xA9, 0x42, 0x4C, 0x02, 0x90])
        .build();
    let mut nes = famicom_with(rom);

    // The NMI fires on this frame's final scanline, after every CPU slice
    // of the frame has already run.
    nes.tick();
    assert_ne!(nes.cpu().a, 0x42);

    nes.tick();
    assert_eq!(nes.cpu().a, 0x42);
    assert_eq!(nes.cpu().pc, 0x9002);
    // PC and status were pushed on entry.
    assert_eq!(nes.cpu().sp, 0xFA);
}

#[test]
fn controller_reads_reach_the_program() {
    // Strobe the controller, then read $4016 once and spin.
    let rom = RomBuilder::new()
        .reset_vector(0x8000)
        .code(
            0x8000,
            &[
                0xA9, 0x01, 0x8D, 0x16, 0x40, // LDA #$01, STA $4016
                0xA9, 0x00, 0x8D, 0x16, 0x40, // LDA #$00, STA $4016
                0xAD, 0x16, 0x40, // LDA $4016
                0x4C, 0x0D, 0x80, // spin
            ],
        )
        .build();
    let mut nes = famicom_with(rom);

    let pad = Rc::new(RefCell::new(Controller::new()));
    nes.attach_controller(0, pad.clone());
    pad.borrow_mut().set_button(0, true); // press A

    nes.tick();

    assert_eq!(nes.cpu().a, 0x01);
}

#[test]
fn background_rendering_reaches_the_framebuffer() {
    // Through $2006/$2007: palette entry $3F01 = $16, nametable tile
    // (0,0) = 1. Then enable the background with the left mask open.
    let rom = RomBuilder::new()
        .reset_vector(0x8000)
        .code(
            0x8000,
            &[
                0xA9, 0x3F, 0x8D, 0x06, 0x20, // $2006 <- $3F
                0xA9, 0x01, 0x8D, 0x06, 0x20, // $2006 <- $01
                0xA9, 0x16, 0x8D, 0x07, 0x20, // $2007 <- $16
                0xA9, 0x20, 0x8D, 0x06, 0x20, // $2006 <- $20
                0xA9, 0x00, 0x8D, 0x06, 0x20, // $2006 <- $00
                0xA9, 0x01, 0x8D, 0x07, 0x20, // $2007 <- $01 (tile index)
                0xA9, 0x0A, 0x8D, 0x01, 0x20, // mask: background + left edge
                0x4C, 0x23, 0x80, // spin
            ],
        )
        .chr(16, &[0xFF; 8]) // tile 1: solid low plane
        .build();
    let mut nes = famicom_with(rom);

    nes.tick();

    let expected = SYSTEM_PALETTE[0x16];
    let frame = nes.ppu().frame_buffer();
    assert_eq!((frame[0], frame[1], frame[2]), expected);
}

#[test]
fn eject_stops_the_simulation() {
    let rom = RomBuilder::new()
        .reset_vector(0x8000)
        .code(0x8000, &[0x4C, 0x00, 0x80])
        .build();
    let mut nes = famicom_with(rom);

    nes.tick();
    let cycles = nes.cpu().cycles();

    nes.eject_rom();
    nes.tick();

    assert_eq!(nes.cpu().cycles(), cycles);
    assert_eq!(nes.frame(), 2);
}
