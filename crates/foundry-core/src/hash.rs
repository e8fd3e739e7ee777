//! Deterministic state hashing for replay and desync checks.

use std::hash::Hasher;
use std::io;

use crate::state::GameState;

/// 64-bit FNV-1a. Stable across platforms and releases, unlike
/// `DefaultHasher`. Not suitable where collisions must be resisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fnv1a(u64);

const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const PRIME: u64 = 0x0000_0100_0000_01b3;

impl Default for Fnv1a {
    fn default() -> Self {
        Fnv1a(OFFSET_BASIS)
    }
}

impl Hasher for Fnv1a {
    fn write(&mut self, bytes: &[u8]) {
        self.0 = bytes
            .iter()
            .fold(self.0, |acc, &byte| (acc ^ u64::from(byte)).wrapping_mul(PRIME));
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

// Lets serde_json stream straight into the hasher.
impl io::Write for Fnv1a {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Hasher::write(self, buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Hash the canonical JSON form of a state. Every map in the state is a
/// `BTreeMap`, so equal states always serialize to identical bytes.
pub fn state_hash(state: &GameState) -> Result<u64, serde_json::Error> {
    let mut hasher = Fnv1a::default();
    serde_json::to_writer(&mut hasher, state)?;
    Ok(hasher.finish())
}
