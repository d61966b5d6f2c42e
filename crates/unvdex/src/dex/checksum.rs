//! DEX header checksum.
//!
//! The checksum is Adler-32 over everything after the checksum field itself,
//! so any in-place instruction rewrite invalidates it.

use super::{DEX_CHECKSUM_OFFSET, DEX_SIGNATURE_OFFSET};
use unvdex_bytes::{load_u32, store_u32, BoundsError};

const ADLER_MOD: u32 = 65521;
/// Largest run of bytes that can be summed before `b` may overflow `u32`.
const ADLER_NMAX: usize = 5552;

pub fn adler32(data: &[u8]) -> u32 {
    let mut a: u32 = 1;
    let mut b: u32 = 0;
    for chunk in data.chunks(ADLER_NMAX) {
        for &byte in chunk {
            a += u32::from(byte);
            b += a;
        }
        a %= ADLER_MOD;
        b %= ADLER_MOD;
    }
    (b << 16) | a
}

/// Checksum `dex` should carry in its header.
pub fn compute_checksum(dex: &[u8]) -> Result<u32, BoundsError> {
    let covered = dex
        .get(DEX_SIGNATURE_OFFSET..)
        .ok_or(BoundsError::OutOfBounds)?;
    Ok(adler32(covered))
}

pub fn verify_checksum(dex: &[u8]) -> Result<bool, BoundsError> {
    Ok(load_u32(dex, DEX_CHECKSUM_OFFSET)? == compute_checksum(dex)?)
}

/// Recompute and store the header checksum. Returns whether it changed.
pub fn repair_checksum(dex: &mut [u8]) -> Result<bool, BoundsError> {
    let stored = load_u32(dex, DEX_CHECKSUM_OFFSET)?;
    let computed = compute_checksum(dex)?;
    if stored == computed {
        return Ok(false);
    }
    store_u32(dex, DEX_CHECKSUM_OFFSET, computed)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ClassSpec, DexImage};

    #[test]
    fn adler32_known_values() {
        assert_eq!(adler32(b""), 1);
        assert_eq!(adler32(b"a"), 0x00620062);
        assert_eq!(adler32(b"Wikipedia"), 0x11e60398);
    }

    #[test]
    fn adler32_long_input_does_not_overflow() {
        let data = vec![0xffu8; 3 * ADLER_NMAX + 17];
        let mut a: u64 = 1;
        let mut b: u64 = 0;
        for &byte in &data {
            a = (a + u64::from(byte)) % 65521;
            b = (b + a) % 65521;
        }
        assert_eq!(adler32(&data), ((b << 16) | a) as u32);
    }

    #[test]
    fn built_images_carry_valid_checksums() {
        let image = DexImage::new()
            .class(ClassSpec::new().direct_method(vec![0x000e]))
            .build();
        assert_eq!(verify_checksum(&image.bytes), Ok(true));
    }

    #[test]
    fn repair_after_mutation() {
        let mut image = DexImage::new()
            .class(ClassSpec::new().direct_method(vec![0x0073]))
            .build();
        let insns = image.insns_offsets[0];
        image.bytes[insns] = 0x0e;
        assert_eq!(verify_checksum(&image.bytes), Ok(false));
        assert_eq!(repair_checksum(&mut image.bytes), Ok(true));
        assert_eq!(verify_checksum(&image.bytes), Ok(true));
        assert_eq!(repair_checksum(&mut image.bytes), Ok(false));
    }

    #[test]
    fn too_short_for_checksum() {
        assert_eq!(compute_checksum(&[0u8; 4]), Err(BoundsError::OutOfBounds));
        assert_eq!(verify_checksum(&[0u8; 4]), Err(BoundsError::OutOfBounds));
    }
}
