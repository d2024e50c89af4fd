//! Per-title PPU timing adjustments.

/// Dot of the scanline at which the cartridge scanline IRQ is signaled.
pub const DEFAULT_SCANLINE_IRQ_DOT: u16 = 280;

/// Timing values that some titles need adjusted to render correctly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PpuPatch {
    pub scanline_irq_dot: u16,
}

impl Default for PpuPatch {
    fn default() -> Self {
        Self {
            scanline_irq_dot: DEFAULT_SCANLINE_IRQ_DOT,
        }
    }
}

/// Titles with adjusted timing, keyed by ROM checksum.
static PATCHES: &[(u32, PpuPatch)] = &[];

impl PpuPatch {
    /// Returns the patch for the ROM with checksum `crc`, or the default timing.
    pub fn for_checksum(crc: u32) -> PpuPatch {
        PATCHES
            .iter()
            .find(|(patch_crc, _)| *patch_crc == crc)
            .map(|(_, patch)| *patch)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_title_uses_default_timing() {
        assert_eq!(PpuPatch::for_checksum(0x12345678).scanline_irq_dot, 280);
    }
}
