use intbits::Bits;

/// 32-bit RGBA format used on modern machines for interop with image-rs.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub struct Rgba32(pub [u8; 4]);

impl Rgba32 {
    /// Converts a pixel of the frame buffer, which stores colors as 0xAARRGGBB.
    pub fn from_argb(argb: u32) -> Self {
        Self([
            argb.bits(16..=23) as u8,
            argb.bits(8..=15) as u8,
            argb.bits(0..=7) as u8,
            argb.bits(24..=31) as u8,
        ])
    }

    pub fn to_argb(self) -> u32 {
        let [r, g, b, a] = self.0;
        (a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32
    }
}

/// Abstract interface for image::RgbaImage (used in tests and the headless runner).
pub trait Image {
    fn new(width: u32, height: u32) -> Self;
    fn set_pixel(&mut self, index: (u32, u32), value: Rgba32);
}

/// Copies an ARGB frame buffer into a new image.
pub fn image_from_argb<ImageT: Image>(width: u32, height: u32, pixels: &[u32]) -> ImageT {
    let mut image = ImageT::new(width, height);
    for (idx, pixel) in pixels.iter().enumerate().take((width * height) as usize) {
        let idx = idx as u32;
        image.set_pixel((idx % width, idx / width), Rgba32::from_argb(*pixel));
    }
    image
}
