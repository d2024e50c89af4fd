//! Building blocks for the save state format.
//!
//! Component state is encoded with bincode's default (fixed-width integer) encoding, so the size
//! of each component only depends on the loaded ROM.
use anyhow::ensure;
use anyhow::Context;
use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Version of the save state layout written by this build.
pub const STATE_VERSION: u32 = 1;

/// Implemented by every component that is part of a save state.
pub trait SaveStateComponent {
    /// Appends the encoded component state to `out`.
    fn save_state(&self, out: &mut Vec<u8>) -> Result<()>;

    /// Decodes the component state from the front of `input` and advances it past the consumed
    /// bytes.
    fn load_state(&mut self, version: u32, input: &mut &[u8]) -> Result<()>;
}

pub fn encode_into<T: Serialize>(value: &T, out: &mut Vec<u8>) -> Result<()> {
    bincode::serialize_into(out, value).context("Cannot encode state")
}

pub fn decode_from<T: DeserializeOwned>(input: &mut &[u8]) -> Result<T> {
    bincode::deserialize_from(input).context("Cannot decode state")
}

pub fn ensure_version(component: &str, version: u32) -> Result<()> {
    ensure!(
        version == STATE_VERSION,
        "{} state has unsupported version {}",
        component,
        version
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Registers {
        a: u8,
        pc: u16,
        ram: Vec<u8>,
    }

    #[test]
    fn test_encoded_size_is_independent_of_values() {
        let mut small = Vec::new();
        encode_into(&Registers { a: 0, pc: 0, ram: vec![0; 16] }, &mut small).unwrap();
        let mut large = Vec::new();
        let registers = Registers { a: 0xFF, pc: 0xFFFF, ram: vec![0xFF; 16] };
        encode_into(&registers, &mut large).unwrap();
        assert_eq!(small.len(), large.len());

        let mut input = &large[..];
        let decoded: Registers = decode_from(&mut input).unwrap();
        assert_eq!(decoded, registers);
        assert!(input.is_empty());
    }

    #[test]
    fn test_decode_truncated_input_fails() {
        let mut encoded = Vec::new();
        encode_into(&(1_u32, 2_u32), &mut encoded).unwrap();
        let mut input = &encoded[..5];
        assert!(decode_from::<(u32, u32)>(&mut input).is_err());
    }

    #[test]
    fn test_ensure_version() {
        assert!(ensure_version("CPU", STATE_VERSION).is_ok());
        assert!(ensure_version("CPU", STATE_VERSION + 1).is_err());
    }
}
