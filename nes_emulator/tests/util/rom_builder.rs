//! Builds small iNES images in memory.
use nes_emulator::components::cartridge::Cartridge;
use nes_emulator::components::cartridge::Mirroring;
use nes_emulator::components::cartridge::CHR_BANK_SIZE;
use nes_emulator::components::cartridge::PRG_BANK_SIZE;
use nes_emulator::Nes;

/// Address of the RTI the NMI and IRQ vectors point to by default.
pub const DEFAULT_HANDLER: u16 = 0xFFF0;

/// Program of a ROM that does nothing: `JMP $C000`.
pub const IDLE_LOOP: &[u8] = &[0x4C, 0x00, 0xC0];

/// iNES image builder.
///
/// Each PRG byte holds the number of its 16 KB bank and each CHR byte the number of its 1 KB
/// bank, so bank switching can be observed. Code is placed into the last PRG bank, which is the
/// one mapped at $C000-$FFFF after power on.
pub struct RomBuilder {
    prg: Vec<u8>,
    chr: Vec<u8>,
    mapper: u8,
    mirroring: Mirroring,
    extended_ram: bool,
}

impl RomBuilder {
    pub fn new(prg_banks: usize, chr_banks: usize) -> Self {
        let prg = (0..prg_banks * PRG_BANK_SIZE)
            .map(|i| (i / PRG_BANK_SIZE) as u8)
            .collect();
        let chr = (0..chr_banks * CHR_BANK_SIZE)
            .map(|i| (i / 0x400) as u8)
            .collect();
        Self {
            prg,
            chr,
            mapper: 0,
            mirroring: Mirroring::Horizontal,
            extended_ram: false,
        }
        .program(0xC000, IDLE_LOOP)
        .program(DEFAULT_HANDLER, &[0x40])
        .reset_vector(0xC000)
        .nmi_vector(DEFAULT_HANDLER)
        .irq_vector(DEFAULT_HANDLER)
    }

    /// NROM with 16 KB PRG and 8 KB CHR-ROM.
    pub fn nrom() -> Self {
        Self::new(1, 1)
    }

    pub fn mapper(mut self, mapper: u8) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn mirroring(mut self, mirroring: Mirroring) -> Self {
        self.mirroring = mirroring;
        self
    }

    pub fn extended_ram(mut self) -> Self {
        self.extended_ram = true;
        self
    }

    /// Places `code` at CPU address `addr` ($C000-$FFFF) of the last PRG bank.
    pub fn program(mut self, addr: u16, code: &[u8]) -> Self {
        let bank_start = self.prg.len() - PRG_BANK_SIZE;
        let start = bank_start + (addr as usize & (PRG_BANK_SIZE - 1));
        self.prg[start..start + code.len()].copy_from_slice(code);
        self
    }

    pub fn nmi_vector(self, addr: u16) -> Self {
        self.program(0xFFFA, &addr.to_le_bytes())
    }

    pub fn reset_vector(self, addr: u16) -> Self {
        self.program(0xFFFC, &addr.to_le_bytes())
    }

    pub fn irq_vector(self, addr: u16) -> Self {
        self.program(0xFFFE, &addr.to_le_bytes())
    }

    pub fn build(&self) -> Vec<u8> {
        let mut flags6 = (self.mapper & 0x0F) << 4;
        match self.mirroring {
            Mirroring::Vertical => flags6 |= 0x01,
            Mirroring::FourScreen => flags6 |= 0x08,
            _ => (),
        }
        if self.extended_ram {
            flags6 |= 0x02;
        }
        let mut data = vec![
            b'N',
            b'E',
            b'S',
            0x1A,
            (self.prg.len() / PRG_BANK_SIZE) as u8,
            (self.chr.len() / CHR_BANK_SIZE) as u8,
            flags6,
            self.mapper & 0xF0,
        ];
        data.resize(16, 0);
        data.extend_from_slice(&self.prg);
        data.extend_from_slice(&self.chr);
        data
    }

    pub fn cartridge(&self) -> Cartridge {
        Cartridge::with_ines_data(&self.build()).unwrap()
    }

    pub fn nes(&self) -> Nes {
        Nes::new(self.cartridge())
    }
}
