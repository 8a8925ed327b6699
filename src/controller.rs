//! Controller implementation
//!
//! The NES reads its two controllers serially: a strobe write latches the
//! button states, then each read of the port shifts out one button bit.
//! This core models the shift register as a read index over the eight
//! buttons; while the strobe bit is held high the index stays pinned to 0,
//! so reads keep returning button A.

use log::warn;

/// Number of buttons on a standard controller
pub const BUTTON_COUNT: usize = 8;

/// NES controller.
///
/// Button indices, in shift order: 0 = A, 1 = B, 2 = Select, 3 = Start,
/// 4 = Up, 5 = Down, 6 = Left, 7 = Right.
pub struct Controller {
    buttons: [bool; BUTTON_COUNT],
    index: usize,
    strobe: u8,
}

impl Controller {
    /// Create a new controller with no buttons pressed
    pub fn new() -> Self {
        Controller {
            buttons: [false; BUTTON_COUNT],
            index: 0,
            strobe: 0,
        }
    }

    /// Set the state of a single button
    pub fn set_button(&mut self, index: usize, pressed: bool) {
        if index < BUTTON_COUNT {
            self.buttons[index] = pressed;
        } else {
            warn!("Controller button index out of range: {}", index);
            debug_assert!(false, "controller button index out of range");
        }
    }

    /// Get the state of a single button
    pub fn button(&self, index: usize) -> bool {
        index < BUTTON_COUNT && self.buttons[index]
    }

    /// Read one bit from the shift register ($4016/$4017 read).
    ///
    /// Returns the button at the current index and advances it; reads past
    /// the eighth button return 0. A held strobe re-pins the index to 0
    /// after every read.
    pub fn read(&mut self) -> u8 {
        let result = if self.index < BUTTON_COUNT {
            self.buttons[self.index] as u8
        } else {
            0
        };

        self.index += 1;
        self.apply_strobe();

        result
    }

    /// Write the strobe register ($4016 write).
    pub fn write(&mut self, value: u8) {
        self.strobe = value;
        self.apply_strobe();
    }

    fn apply_strobe(&mut self) {
        if self.strobe & 0x01 != 0 {
            self.index = 0;
        }
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}
