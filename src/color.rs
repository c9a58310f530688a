//! Pixel colors and the packed 32-bit color word used inside patches.
//!
//! Every color in the engine is an `image::Rgba<u8>`.  Patches store colors
//! packed as `(A << 24) | (R << 16) | (G << 8) | B` (alpha in the top byte).

use image::Rgba;

/// Fully transparent black, returned for every out-of-bounds read.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// A color packed as `(A << 24) | (R << 16) | (G << 8) | B`.
pub type PackedRgba = u32;

/// Pack a color into its patch representation.
#[inline]
pub fn pack_rgba(color: Rgba<u8>) -> PackedRgba {
    let [r, g, b, a] = color.0;
    ((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

/// Inverse of [`pack_rgba`].
#[inline]
pub fn unpack_rgba(packed: PackedRgba) -> Rgba<u8> {
    Rgba([
        ((packed >> 16) & 0xff) as u8,
        ((packed >> 8) & 0xff) as u8,
        (packed & 0xff) as u8,
        (packed >> 24) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_lives_in_the_top_byte() {
        assert_eq!(pack_rgba(Rgba([0x11, 0x22, 0x33, 0x44])), 0x4411_2233);
        assert_eq!(pack_rgba(Rgba([0, 0, 0, 255])), 0xff00_0000);
        assert_eq!(pack_rgba(TRANSPARENT), 0);
    }

    #[test]
    fn unpack_restores_channels() {
        assert_eq!(unpack_rgba(0x4411_2233), Rgba([0x11, 0x22, 0x33, 0x44]));
        assert_eq!(unpack_rgba(0xff0a_141e), Rgba([10, 20, 30, 255]));
    }
}
