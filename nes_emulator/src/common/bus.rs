//! Bus trait shared by the CPU and PPU address spaces.
//!
//! Both the 6502 and the PPU use a 16-bit address space, so unlike larger systems there is no
//! need to abstract over the address type.

/// Generic trait shared by all bus implementations.
pub trait Bus {
    /// Reads a byte without triggering any side effects (register latches, mapper latches).
    ///
    /// Returns None for addresses that cannot be peeked safely.
    fn peek_u8(&self, addr: u16) -> Option<u8>;
    fn cycle_read_u8(&mut self, addr: u16) -> u8;
    fn cycle_write_u8(&mut self, addr: u16, value: u8);
    fn reset(&mut self);

    #[inline]
    fn cycle_read_u16(&mut self, addr: u16) -> u16 {
        u16::from_le_bytes([
            self.cycle_read_u8(addr),
            self.cycle_read_u8(addr.wrapping_add(1)),
        ])
    }

    /// Reads a u16 where the high byte wraps within the page of `addr`.
    ///
    /// Models the 6502 page-wrap behavior of indirect jumps and zero page pointers.
    #[inline]
    fn cycle_read_u16_page_wrapped(&mut self, addr: u16) -> u16 {
        let high_addr = (addr & 0xFF00) | (addr.wrapping_add(1) & 0x00FF);
        u16::from_le_bytes([self.cycle_read_u8(addr), self.cycle_read_u8(high_addr)])
    }

    #[inline]
    fn peek_u16(&self, addr: u16) -> Option<u16> {
        Some(u16::from_le_bytes([
            self.peek_u8(addr)?,
            self.peek_u8(addr.wrapping_add(1))?,
        ]))
    }

    fn peek_range(&self, start: u16, len: usize) -> Vec<u8> {
        (0..len)
            .map(|offset| {
                self.peek_u8(start.wrapping_add(offset as u16))
                    .unwrap_or_default()
            })
            .collect()
    }
}
