//! Mapper implementations, one module per board family.
mod axrom;
mod cnrom;
mod color_dreams;
mod gxrom;
mod jaleco87;
mod mmc1;
mod mmc2;
mod mmc3;
mod nrom;
mod smb2j;
mod taito;
mod uxrom;
mod vrc1;

pub use self::axrom::AxRom;
pub use self::cnrom::CnRom;
pub use self::color_dreams::ColorDreams;
pub use self::gxrom::GxRom;
pub use self::jaleco87::Jaleco87;
pub use self::mmc1::Mmc1;
pub use self::mmc2::LatchChip;
pub use self::mmc2::Mmc2;
pub use self::mmc3::Mmc3;
pub use self::nrom::Nrom;
pub use self::smb2j::Smb2j;
pub use self::taito::Taito;
pub use self::taito::TaitoChip;
pub use self::uxrom::UxRom;
pub use self::vrc1::Vrc1;
