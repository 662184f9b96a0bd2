//! Opaque public article identifiers.
//!
//! A handle is a 63-bit non-negative integer drawn uniformly at random,
//! so externally visible identifiers reveal neither insertion order nor
//! table size. For URLs it is serialized as the base64url (no padding)
//! encoding of its unsigned 64-bit little-endian bytes, always 11
//! characters.

use std::collections::HashSet;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::{rng, Rng};

use crate::db::Repository;
use crate::error::{AppError, Result};

/// Retry budget per allocation. Exhausting it at realistic table sizes
/// indicates an operational anomaly, not contention.
const MAX_ATTEMPTS: u32 = 10;

/// Allocates handles that are absent from the store and distinct from
/// every handle already handed out during this run. The run-local
/// reservation matters because batch rows are not visible to the store
/// until their source commits.
#[derive(Debug, Default)]
pub struct HandleAllocator {
    reserved: HashSet<i64>,
}

impl HandleAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn allocate(&mut self, repo: &Repository) -> Result<i64> {
        for _ in 0..MAX_ATTEMPTS {
            let candidate = (rng().random::<u64>() >> 1) as i64;
            if self.reserved.contains(&candidate) {
                continue;
            }
            if repo.handle_exists(candidate).await? {
                continue;
            }
            self.reserved.insert(candidate);
            return Ok(candidate);
        }
        Err(AppError::HandleSpaceExhausted)
    }
}

/// Encodes a handle as its fixed-length URL-safe token.
pub fn encode(handle: i64) -> String {
    URL_SAFE_NO_PAD.encode((handle as u64).to_le_bytes())
}

/// Decodes an external token. Anything that is not the encoding of a
/// valid 63-bit handle is rejected as `InvalidHandle`.
pub fn decode(token: &str) -> Result<i64> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| AppError::InvalidHandle)?;
    let bytes: [u8; 8] = bytes.try_into().map_err(|_| AppError::InvalidHandle)?;
    let raw = u64::from_le_bytes(bytes);
    if raw > i64::MAX as u64 {
        return Err(AppError::InvalidHandle);
    }
    Ok(raw as i64)
}
