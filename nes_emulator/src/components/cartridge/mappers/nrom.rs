//! Mapper 000: 16 or 32 KB of fixed PRG-ROM and 8 KB of CHR.
use anyhow::Result;
use log::warn;

use crate::common::save_state::ensure_version;
use crate::common::save_state::SaveStateComponent;
use crate::components::cartridge::mapper::Mapper;
use crate::components::cartridge::mapper::MapperBase;

pub struct Nrom {
    base: MapperBase,
}

impl Nrom {
    pub fn new(base: MapperBase) -> Self {
        Self { base }
    }
}

impl Mapper for Nrom {
    fn base(&self) -> &MapperBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MapperBase {
        &mut self.base
    }

    /// A 16 KB image is mirrored into $C000-$FFFF.
    fn read_prg(&self, addr: u16) -> u8 {
        self.base.read_prg_bank(0, 0x8000, addr)
    }

    fn write_prg(&mut self, addr: u16, value: u8) {
        warn!(
            "Can't write ${:02X} to PRG address ${:04X}, it is read only",
            value, addr
        );
    }

    fn peek_chr(&self, addr: u16) -> u8 {
        self.base.read_chr_bank(0, 0x2000, addr)
    }
}

impl SaveStateComponent for Nrom {
    fn save_state(&self, out: &mut Vec<u8>) -> Result<()> {
        self.base.save_state(out)
    }

    fn load_state(&mut self, version: u32, input: &mut &[u8]) -> Result<()> {
        ensure_version("Mapper", version)?;
        self.base.load_state(input)
    }
}

#[cfg(test)]
mod tests {
    use crate::components::cartridge::mapper::test::banked_mapper;

    #[test]
    fn test_16k_prg_is_mirrored() {
        let mapper = banked_mapper(0, 1, 1);
        for addr in (0x8000..0xC000).step_by(0x123) {
            assert_eq!(mapper.read_prg(addr), mapper.read_prg(addr + 0x4000));
        }
        assert_eq!(mapper.read_prg(0xE000), 1);
    }

    #[test]
    fn test_32k_prg_is_linear() {
        let mapper = banked_mapper(0, 2, 1);
        assert_eq!(mapper.read_prg(0x8000), 0);
        assert_eq!(mapper.read_prg(0xC000), 2);
        assert_eq!(mapper.read_prg(0xFFFF), 3);
    }

    #[test]
    fn test_chr_ram() {
        let mut mapper = banked_mapper(0, 1, 0);
        mapper.write_chr(0x1234, 0x56);
        assert_eq!(mapper.read_chr(0x1234), 0x56);
    }
}
