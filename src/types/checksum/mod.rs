#![forbid(unsafe_code)]

//! CRC32 guarding encoded cell envelopes.

use crc32fast::Hasher;

use super::{ArcDir, VertexId};

/// Checksum of an encoded cell stream, salted with the owning vertex and the
/// cell side so an envelope cannot be replayed onto another cell.
pub fn stream_crc32(owner: VertexId, side: ArcDir, payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&owner.0.to_be_bytes());
    hasher.update(&[side.bits() as u8]);
    hasher.update(payload);
    hasher.finalize()
}
