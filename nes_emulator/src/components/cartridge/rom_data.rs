//! Parsing of iNES files.
use anyhow::anyhow;
use anyhow::bail;
use anyhow::ensure;
use anyhow::Result;
use intbits::Bits;
use log::info;
use packed_struct::prelude::*;
use serde::Deserialize;
use serde::Serialize;

use crate::common::checksum::Crc32;

pub const INES_HEADER_SIZE: usize = 16;
pub const PRG_BANK_SIZE: usize = 0x4000;
pub const CHR_BANK_SIZE: usize = 0x2000;

const INES_MAGIC: [u8; 4] = *b"NES\x1A";

/// How the four logical nametables map to physical nametable memory.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum Mirroring {
    #[default]
    Horizontal,
    Vertical,
    FourScreen,
    OneScreenLow,
    OneScreenHigh,
}

impl Mirroring {
    /// Returns the physical 1 KB page for logical nametable `table` (0..=3).
    pub fn physical_page(self, table: u16) -> usize {
        let table = (table & 3) as usize;
        match self {
            Mirroring::Horizontal => table >> 1,
            Mirroring::Vertical => table & 1,
            Mirroring::FourScreen => table,
            Mirroring::OneScreenLow => 0,
            Mirroring::OneScreenHigh => 1,
        }
    }
}

#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, strum::Display)]
pub enum ConsoleType {
    #[default]
    NesFamicom,
    VsSystem,
    Playchoice10,
    Extended,
}

/// Contents of an iNES file. Immutable once parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RomData {
    pub raw_header: [u8; INES_HEADER_SIZE],
    pub prg: Vec<u8>,
    pub chr: Vec<u8>,
    pub mapper: u8,
    pub submapper: u8,
    pub mirroring: Mirroring,
    pub console_type: ConsoleType,
    pub has_extended_ram: bool,
    pub is_nes2: bool,
    /// CRC-32 of PRG followed by CHR.
    pub crc: u32,
}

impl RomData {
    pub fn parse(data: &[u8]) -> Result<Self> {
        ensure!(data.len() >= INES_HEADER_SIZE, "Not a valid iNES image");
        let raw = RawInesHeader::unpack_from_slice(&data[0..INES_HEADER_SIZE])
            .map_err(|err| anyhow!("Invalid iNES header: {:?}", err))?;
        ensure!(raw.magic == INES_MAGIC, "Not a valid iNES image");
        ensure!(raw.prg_banks > 0, "ROM has no PRG banks");
        info!("PRG-ROM banks: {}", raw.prg_banks);
        if raw.chr_banks == 0 {
            info!("No CHR-ROM banks, using CHR-RAM");
        } else {
            info!("CHR-ROM banks: {}", raw.chr_banks);
        }

        if raw.flags6.bit(2) {
            bail!("Trainer is not supported");
        }
        if raw.flags10.bits(0..=1) == 2 || raw.flags10.bit(0) {
            bail!("PAL ROM not supported");
        }

        let mirroring = if raw.flags6.bit(3) {
            Mirroring::FourScreen
        } else if raw.flags6.bit(0) {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };
        let console_type = match raw.flags7.bits(0..=1) {
            0 => ConsoleType::NesFamicom,
            1 => ConsoleType::VsSystem,
            2 => ConsoleType::Playchoice10,
            _ => ConsoleType::Extended,
        };
        let mapper = raw.flags6.bits(4..=7) | (raw.flags7 & 0xF0);
        let submapper = raw.flags8.bits(4..=7);
        let has_extended_ram = raw.flags6.bit(1);
        let is_nes2 = raw.flags7 & 0x0C == 0x08;
        info!(
            "Mapper {}.{}, {} mirroring, console {}",
            mapper, submapper, mirroring, console_type
        );

        let prg_start = INES_HEADER_SIZE;
        let prg_end = prg_start + PRG_BANK_SIZE * raw.prg_banks as usize;
        let chr_end = prg_end + CHR_BANK_SIZE * raw.chr_banks as usize;
        ensure!(
            data.len() >= chr_end,
            "ROM is truncated: expected {} bytes, got {}",
            chr_end,
            data.len()
        );
        let prg = data[prg_start..prg_end].to_vec();
        let chr = data[prg_end..chr_end].to_vec();

        let mut crc = Crc32::new();
        crc.update(&prg);
        crc.update(&chr);

        let mut raw_header = [0; INES_HEADER_SIZE];
        raw_header.copy_from_slice(&data[0..INES_HEADER_SIZE]);
        Ok(RomData {
            raw_header,
            prg,
            chr,
            mapper,
            submapper,
            mirroring,
            console_type,
            has_extended_ram,
            is_nes2,
            crc: crc.finalize(),
        })
    }

    pub fn uses_chr_ram(&self) -> bool {
        self.chr.is_empty()
    }
}

#[derive(PackedStruct, Clone, Debug, Default, PartialEq, Eq)]
#[packed_struct(bit_numbering = "msb0", endian = "lsb")]
struct RawInesHeader {
    magic: [u8; 4],
    prg_banks: u8,
    chr_banks: u8,
    flags6: u8,
    flags7: u8,
    flags8: u8,
    flags9: u8,
    flags10: u8,
    padding: [u8; 5],
}
