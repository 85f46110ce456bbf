//! Payload masking (RFC 6455 Section 5.3).
//!
//! Client-to-server payloads are XOR-masked with a 32-bit key:
//! `out[i] = payload[i] ^ key[i % 4]`. Masking is its own inverse, so the
//! same routines serve both directions.

/// Byte-by-byte XOR masking.
#[inline]
pub fn apply_mask(data: &mut [u8], key: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

/// XOR masking processing four bytes at a time.
///
/// Produces identical output to [`apply_mask`]; preferred for payloads
/// longer than a handful of bytes.
#[inline]
pub fn apply_mask_fast(data: &mut [u8], key: [u8; 4]) {
    let key_word = u32::from_ne_bytes(key);
    let mut chunks = data.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        chunk.copy_from_slice(&(word ^ key_word).to_ne_bytes());
    }
    for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
        *byte ^= key[i];
    }
}

/// Per-frame masking-key generator.
///
/// Seeded once from the OS entropy source, then stepped through an integer
/// mixer per frame. RFC 6455 does not require cryptographic keys, only
/// keys that are not predictable in a patterned way across frames of the
/// same connection.
#[derive(Debug)]
pub struct MaskKeySource {
    state: u32,
}

impl MaskKeySource {
    /// Create a key source seeded from the OS.
    ///
    /// Falls back to the system clock if the entropy source is unavailable.
    #[must_use]
    pub fn new() -> Self {
        let mut seed = [0u8; 4];
        let state = if getrandom::getrandom(&mut seed).is_ok() {
            u32::from_le_bytes(seed)
        } else {
            use std::time::{SystemTime, UNIX_EPOCH};
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u32)
                .unwrap_or(0x9E37_79B9)
        };
        Self { state }
    }

    /// Produce the next masking key.
    pub fn next_key(&mut self) -> [u8; 4] {
        self.state = self.state.wrapping_add(0x9E37_79B9);
        let mut x = self.state;
        x = (x ^ (x >> 16)).wrapping_mul(0x85EB_CA6B);
        x = (x ^ (x >> 13)).wrapping_mul(0xC2B2_AE35);
        (x ^ (x >> 16)).to_le_bytes()
    }
}

impl Default for MaskKeySource {
    fn default() -> Self {
        Self::new()
    }
}
