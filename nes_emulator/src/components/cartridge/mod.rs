//! The cartridge: the parsed iNES image and the mapper hardware selected by it.
mod mapper;
mod mappers;
mod rom_data;

use std::path::Path;
use std::sync::Arc;

use anyhow::ensure;
use anyhow::Context;
use anyhow::Result;

use crate::common::save_state::decode_from;
use crate::common::save_state::encode_into;
use crate::common::save_state::SaveStateComponent;

pub use self::mapper::is_mapper_supported;
pub use self::mapper::Mapper;
pub use self::mapper::MapperBase;
pub use self::rom_data::ConsoleType;
pub use self::rom_data::Mirroring;
pub use self::rom_data::RomData;
pub use self::rom_data::CHR_BANK_SIZE;
pub use self::rom_data::INES_HEADER_SIZE;
pub use self::rom_data::PRG_BANK_SIZE;

pub struct Cartridge {
    rom: Arc<RomData>,
    mapper: Box<dyn Mapper>,
}

impl Cartridge {
    /// Parses an iNES image. Fails without side effects on malformed images and unsupported
    /// mappers.
    pub fn with_ines_data(data: &[u8]) -> Result<Cartridge> {
        let rom = Arc::new(RomData::parse(data)?);
        let mapper = mapper::create_mapper(rom.clone())?;
        Ok(Cartridge { rom, mapper })
    }

    pub fn with_ines_file(path: &Path) -> Result<Cartridge> {
        let data =
            std::fs::read(path).with_context(|| format!("Cannot read {}", path.display()))?;
        Self::with_ines_data(&data)
    }

    pub fn rom(&self) -> &RomData {
        &self.rom
    }

    pub fn checksum(&self) -> u32 {
        self.rom.crc
    }

    pub fn mapper(&self) -> &dyn Mapper {
        self.mapper.as_ref()
    }

    pub fn mapper_mut(&mut self) -> &mut dyn Mapper {
        self.mapper.as_mut()
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mapper.mirroring()
    }

    pub fn reset(&mut self) {
        self.mapper.reset();
    }
}

impl SaveStateComponent for Cartridge {
    fn save_state(&self, out: &mut Vec<u8>) -> Result<()> {
        encode_into(&self.rom.crc, out)?;
        self.mapper.save_state(out)
    }

    fn load_state(&mut self, version: u32, input: &mut &[u8]) -> Result<()> {
        let crc: u32 = decode_from(input)?;
        ensure!(
            crc == self.rom.crc,
            "Save state is for ROM {:08X}, loaded ROM is {:08X}",
            crc,
            self.rom.crc
        );
        self.mapper.load_state(version, input)
    }
}
