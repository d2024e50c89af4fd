//! Save state blobs of the whole system.
//!
//! A blob is a 20 byte header (signature and little endian version) followed by the state of each
//! component in a fixed order. For a given ROM the blob always has the same length.
use anyhow::bail;
use anyhow::ensure;
use anyhow::Context;
use anyhow::Result;
use log::error;

use crate::common::save_state::SaveStateComponent;
use crate::common::save_state::STATE_VERSION;

pub const SIGNATURE: &[u8; 16] = b"NES_EMU_STATE\0\0\0";
pub const HEADER_SIZE: usize = SIGNATURE.len() + 4;

/// A system made of save state components.
pub trait SaveStateSystem {
    /// Calls `visitor` for each component in save state order.
    fn visit_components(
        &self,
        visitor: &mut dyn FnMut(&dyn SaveStateComponent) -> Result<()>,
    ) -> Result<()>;

    fn visit_components_mut(
        &mut self,
        visitor: &mut dyn FnMut(&mut dyn SaveStateComponent) -> Result<()>,
    ) -> Result<()>;
}

pub fn write_header(out: &mut Vec<u8>, version: u32) {
    out.extend_from_slice(SIGNATURE);
    out.extend_from_slice(&version.to_le_bytes());
}

/// Checks the signature and returns the version. Advances `input` past the header.
pub fn read_header(input: &mut &[u8]) -> Result<u32> {
    ensure!(input.len() >= HEADER_SIZE, "Save state is truncated");
    let (header, rest) = input.split_at(HEADER_SIZE);
    ensure!(
        &header[..SIGNATURE.len()] == SIGNATURE,
        "Invalid save state signature"
    );
    let mut version = [0; 4];
    version.copy_from_slice(&header[SIGNATURE.len()..]);
    *input = rest;
    Ok(u32::from_le_bytes(version))
}

pub fn build(system: &impl SaveStateSystem) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_header(&mut out, STATE_VERSION);
    system.visit_components(&mut |component| component.save_state(&mut out))?;
    Ok(out)
}

/// Restores `data` into `system`. On failure, the system is left in the state it had before.
pub fn restore(system: &mut impl SaveStateSystem, data: &[u8]) -> Result<()> {
    let backup = build(system).context("Cannot back up current state")?;
    ensure!(
        data.len() == backup.len(),
        "Save state has size {}, expected {}",
        data.len(),
        backup.len()
    );
    let mut input = data;
    let version = read_header(&mut input)?;

    if let Err(err) = load_components(system, version, input) {
        if let Err(rollback_err) = load_components(system, STATE_VERSION, &backup[HEADER_SIZE..]) {
            error!("Cannot roll back failed save state restore: {rollback_err:#}");
        }
        return Err(err);
    }
    Ok(())
}

fn load_components(system: &mut impl SaveStateSystem, version: u32, data: &[u8]) -> Result<()> {
    let mut input = data;
    system.visit_components_mut(&mut |component| component.load_state(version, &mut input))?;
    if !input.is_empty() {
        bail!("Save state has {} unused bytes", input.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::common::save_state::decode_from;
    use crate::common::save_state::encode_into;
    use crate::common::save_state::ensure_version;

    #[derive(Default)]
    struct Register(u16);

    impl SaveStateComponent for Register {
        fn save_state(&self, out: &mut Vec<u8>) -> Result<()> {
            encode_into(&self.0, out)
        }

        fn load_state(&mut self, version: u32, input: &mut &[u8]) -> Result<()> {
            ensure_version("Register", version)?;
            self.0 = decode_from(input)?;
            ensure!(self.0 != 0xDEAD, "Invalid register value");
            Ok(())
        }
    }

    #[derive(Default)]
    struct TwoRegisters {
        first: Register,
        second: Register,
    }

    impl SaveStateSystem for TwoRegisters {
        fn visit_components(
            &self,
            visitor: &mut dyn FnMut(&dyn SaveStateComponent) -> Result<()>,
        ) -> Result<()> {
            visitor(&self.first)?;
            visitor(&self.second)
        }

        fn visit_components_mut(
            &mut self,
            visitor: &mut dyn FnMut(&mut dyn SaveStateComponent) -> Result<()>,
        ) -> Result<()> {
            visitor(&mut self.first)?;
            visitor(&mut self.second)
        }
    }

    fn system(first: u16, second: u16) -> TwoRegisters {
        TwoRegisters {
            first: Register(first),
            second: Register(second),
        }
    }

    #[test]
    fn test_header_layout() {
        let blob = build(&system(0x1234, 0x5678)).unwrap();
        assert_eq!(blob.len(), HEADER_SIZE + 4);
        assert_eq!(&blob[..16], b"NES_EMU_STATE\0\0\0");
        assert_eq!(&blob[16..20], &[1, 0, 0, 0]);
        assert_eq!(&blob[20..], &[0x34, 0x12, 0x78, 0x56]);
    }

    #[test]
    fn test_round_trip() {
        let blob = build(&system(1, 2)).unwrap();
        let mut restored = TwoRegisters::default();
        restore(&mut restored, &blob).unwrap();
        assert_eq!((restored.first.0, restored.second.0), (1, 2));
    }

    #[test]
    fn test_size_and_signature_are_checked() {
        let mut blob = build(&system(1, 2)).unwrap();
        let mut target = system(3, 4);
        assert!(restore(&mut target, &blob[..blob.len() - 1]).is_err());
        blob[0] = b'X';
        assert!(restore(&mut target, &blob).is_err());
        assert_eq!((target.first.0, target.second.0), (3, 4));
    }

    #[test]
    fn test_failed_restore_rolls_back() {
        let blob = build(&system(1, 0xDEAD)).unwrap();
        let mut target = system(3, 4);
        assert!(restore(&mut target, &blob).is_err());
        assert_eq!((target.first.0, target.second.0), (3, 4));

        let mut blob = build(&system(1, 2)).unwrap();
        blob[16] = 2;
        assert!(restore(&mut target, &blob).is_err());
        assert_eq!((target.first.0, target.second.0), (3, 4));
    }
}
