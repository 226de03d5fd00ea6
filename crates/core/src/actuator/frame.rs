//! LEDDMX command frames. Every frame is nine bytes, opening with
//! `7B FF <opcode>` and closing with `BF`.

use std::fmt::Write;

use crate::{Percent, Rgb};

const HEAD: u8 = 0x7B;
const TAIL: u8 = 0xBF;

const OP_BRIGHTNESS: u8 = 0x01;
const OP_POWER: u8 = 0x04;
const OP_COLOR: u8 = 0x07;

pub type Frame = [u8; 9];

pub fn power(on: bool) -> Frame {
    let state = if on { 0x03 } else { 0x02 };
    [HEAD, 0xFF, OP_POWER, state, 0xFF, 0xFF, 0xFF, 0xFF, TAIL]
}

pub fn color(color: Rgb) -> Frame {
    [HEAD, 0xFF, OP_COLOR, color.r, color.g, color.b, 0x00, 0xFF, TAIL]
}

/// The device takes both a 0..=32 level and the raw percentage.
pub fn brightness(brightness: Percent) -> Frame {
    let pct = brightness.get();
    let level = (u16::from(pct) * 32 / 100) as u8;
    [HEAD, 0xFF, OP_BRIGHTNESS, level, pct, 0x00, 0xFF, 0xFF, TAIL]
}

pub fn hex(frame: &[u8]) -> String {
    let mut out = String::with_capacity(frame.len() * 3);
    for (i, byte) in frame.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02X}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_power_frames() {
        assert_eq!(power(true)[3], 0x03);
        assert_eq!(power(false)[3], 0x02);
        assert_eq!(hex(&power(true)), "7B FF 04 03 FF FF FF FF BF");
    }

    #[test]
    fn encodes_colour_frame() {
        assert_eq!(
            color(Rgb::new(255, 165, 0)),
            [0x7B, 0xFF, 0x07, 255, 165, 0, 0x00, 0xFF, 0xBF]
        );
    }

    #[test]
    fn brightness_frame_carries_level_and_percent() {
        assert_eq!(
            brightness(Percent::FULL),
            [0x7B, 0xFF, 0x01, 32, 100, 0x00, 0xFF, 0xFF, 0xBF]
        );
        assert_eq!(brightness(Percent::saturating(50))[3], 16);
        assert_eq!(brightness(Percent::saturating(30))[3], 9);
    }
}
