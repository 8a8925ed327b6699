//! SDL2 host for the famicom emulator core.
//!
//! Opens a scaled window, maps the keyboard onto controller 0, ticks the
//! emulator once per displayed frame and streams the 256x224 display
//! window into an RGB24 texture. If the ROM fails to load the window
//! shows animated static instead, matching the behaviour of the
//! original hardware tuned to a dead channel.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{error, info, warn};
use sdl2::{event::Event, keyboard::Keycode, pixels::PixelFormatEnum};

use famicom::ppu::{DISPLAY_BUFFER_SIZE, DISPLAY_HEIGHT, FRAME_WIDTH};
use famicom::{Controller, Famicom};

/// A scanline-accurate NES emulator for NROM cartridges
#[derive(Parser)]
#[command(name = "emu", version)]
struct Args {
    /// Path to an iNES ROM image
    rom: PathBuf,

    /// Window scale factor
    #[arg(long, default_value_t = 3)]
    scale: u32,
}

/// Keyboard layout for controller 0, in button order
/// A, B, Select, Start, Up, Down, Left, Right.
fn button_for_key(key: Keycode) -> Option<usize> {
    match key {
        Keycode::Z => Some(0),
        Keycode::X => Some(1),
        Keycode::RShift => Some(2),
        Keycode::Return => Some(3),
        Keycode::Up => Some(4),
        Keycode::Down => Some(5),
        Keycode::Left => Some(6),
        Keycode::Right => Some(7),
        _ => None,
    }
}

/// Greyscale noise source for the no-cartridge screen
struct StaticNoise {
    state: u32,
}

impl StaticNoise {
    fn new() -> Self {
        StaticNoise { state: 0x2A03 }
    }

    fn fill(&mut self, frame: &mut [u8]) {
        for pixel in frame.chunks_exact_mut(3) {
            self.state ^= self.state << 13;
            self.state ^= self.state >> 17;
            self.state ^= self.state << 5;
            let value = self.state as u8;
            pixel.fill(value);
        }
    }
}

fn save_screenshot(frame: &[u8], index: u32) {
    let filename = format!("screenshot-{}.png", index);
    match image::save_buffer(
        &filename,
        frame,
        FRAME_WIDTH as u32,
        DISPLAY_HEIGHT as u32,
        image::ExtendedColorType::Rgb8,
    ) {
        Ok(()) => info!("Saved {}", filename),
        Err(e) => warn!("Failed to save {}: {}", filename, e),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut nes = Famicom::new();
    let pad = Rc::new(RefCell::new(Controller::new()));
    nes.attach_controller(0, pad.clone());

    let has_valid_rom = match nes.insert_rom(&args.rom) {
        Ok(()) => true,
        Err(e) => {
            error!("Failed to load {}: {}", args.rom.display(), e);
            false
        }
    };

    let sdl_context = sdl2::init().map_err(|e| anyhow!("Failed to initialize SDL2: {}", e))?;
    let video_subsystem = sdl_context
        .video()
        .map_err(|e| anyhow!("Failed to initialize SDL2 video subsystem: {}", e))?;

    let window = video_subsystem
        .window(
            "famicom",
            FRAME_WIDTH as u32 * args.scale,
            DISPLAY_HEIGHT as u32 * args.scale,
        )
        .position_centered()
        .build()
        .with_context(|| "Failed to create window")?;

    let mut canvas = window
        .into_canvas()
        .accelerated()
        .present_vsync()
        .build()
        .with_context(|| "Failed to create canvas")?;
    canvas
        .set_scale(args.scale as f32, args.scale as f32)
        .map_err(|e| anyhow!("Failed to set canvas scale: {}", e))?;

    let texture_creator = canvas.texture_creator();
    let mut texture = texture_creator
        .create_texture_streaming(
            PixelFormatEnum::RGB24,
            FRAME_WIDTH as u32,
            DISPLAY_HEIGHT as u32,
        )
        .with_context(|| "Failed to create texture")?;

    let mut event_pump = sdl_context
        .event_pump()
        .map_err(|e| anyhow!("Failed to get event pump: {}", e))?;

    let mut frame = [0u8; DISPLAY_BUFFER_SIZE];
    let mut noise = StaticNoise::new();
    let mut screenshots = 0u32;

    'running: loop {
        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown { keycode: Some(Keycode::Escape), .. } => break 'running,

                Event::KeyDown { keycode: Some(Keycode::F12), .. } => {
                    save_screenshot(&frame, screenshots);
                    screenshots += 1;
                }

                Event::KeyDown { keycode: Some(key), .. } => {
                    if let Some(button) = button_for_key(key) {
                        pad.borrow_mut().set_button(button, true);
                    }
                }

                Event::KeyUp { keycode: Some(key), .. } => {
                    if let Some(button) = button_for_key(key) {
                        pad.borrow_mut().set_button(button, false);
                    }
                }

                _ => {}
            }
        }

        if has_valid_rom {
            nes.tick();
            nes.read_frame_buffer(&mut frame);
        } else {
            noise.fill(&mut frame);
        }

        texture
            .update(None, &frame, FRAME_WIDTH * 3)
            .with_context(|| "Failed to update texture")?;
        canvas
            .copy(&texture, None, None)
            .map_err(|e| anyhow!("Failed to copy texture to canvas: {}", e))?;
        canvas.present();
    }

    Ok(())
}
