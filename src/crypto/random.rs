//! Operating-system backed randomness for protocol values
//!
//! Nothing here keeps state between calls, so it is safe to use from any
//! number of threads at once.

use crate::{Error, Result};
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

/// AES-256 key length in bytes
pub const SYMMETRIC_KEY_LEN: usize = 32;

/// GCM initialization vector length in bytes
pub const IV_LEN: usize = 16;

/// CSPRNG access for nonces, keys and unbiased integers
pub struct SecureRandom;

impl SecureRandom {
    /// Uniform integer in `[min, max)` without modulo bias
    ///
    /// Draws `ceil(bits / 8)` bytes, keeps the low `bits` bits and rejects
    /// any draw at or above the largest multiple of the range that fits, so
    /// every residue is equally likely.
    pub fn uniform_int(min: i64, max: i64) -> Result<i64> {
        if max <= min {
            return Err(Error::InvalidRange { min, max });
        }

        let range = (i128::from(max) - i128::from(min)) as u128;
        let bits = u128::BITS - range.leading_zeros();
        let bytes_needed = bits.div_ceil(8) as usize;
        let span = 1u128 << bits;
        let limit = (span / range) * range;

        let mut buf = [0u8; 8];
        loop {
            let draw = &mut buf[..bytes_needed];
            OsRng.fill_bytes(draw);
            let r = draw
                .iter()
                .fold(0u128, |acc, byte| (acc << 8) | u128::from(*byte))
                & (span - 1);

            if r < limit {
                return Ok((i128::from(min) + (r % range) as i128) as i64);
            }
        }
    }

    /// Fill a buffer with random bytes
    pub fn fill(buf: &mut [u8]) {
        OsRng.fill_bytes(buf);
    }

    /// Fixed-size random byte array
    pub fn bytes<const N: usize>() -> [u8; N] {
        let mut bytes = [0u8; N];
        OsRng.fill_bytes(&mut bytes);
        bytes
    }

    /// Hex nonce built from `len` random bytes
    pub fn nonce(len: usize) -> String {
        let mut raw = Zeroizing::new(vec![0u8; len]);
        OsRng.fill_bytes(raw.as_mut_slice());
        hex::encode(raw.as_slice())
    }

    /// Fresh single-use AES-256 key
    pub fn symmetric_key() -> Zeroizing<[u8; SYMMETRIC_KEY_LEN]> {
        let mut key = Zeroizing::new([0u8; SYMMETRIC_KEY_LEN]);
        OsRng.fill_bytes(&mut key[..]);
        key
    }

    /// Fresh single-use GCM initialization vector
    pub fn iv() -> [u8; IV_LEN] {
        Self::bytes::<IV_LEN>()
    }
}
