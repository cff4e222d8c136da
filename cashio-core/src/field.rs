//! Scalar field arithmetic for commitments.
//!
//! Commitments are elements of the BN254 scalar field, the field the
//! deposit/withdraw circuits operate over. Values are carried as 32-byte
//! big-endian arrays and checked against the modulus with a 256-bit integer.

// Allow clippy warnings from the uint crate's construct_uint macro
#![allow(clippy::manual_div_ceil)]
#![allow(clippy::assign_op_pattern)]

use uint::construct_uint;

construct_uint! {
    /// 256-bit unsigned integer used for modulus comparisons and reduction.
    pub struct U256(4);
}

/// BN254 scalar field modulus, big-endian.
pub const FIELD_MODULUS: [u8; 32] = [
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29,
    0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x28, 0x33, 0xe8, 0x48, 0x79, 0xb9, 0x70, 0x91,
    0x43, 0xe1, 0xf5, 0x93, 0xf0, 0x00, 0x00, 0x01,
];

/// The field modulus as an integer.
pub fn modulus() -> U256 {
    U256::from_big_endian(&FIELD_MODULUS)
}

/// Check that `bytes` encodes an integer strictly below the modulus.
pub fn is_canonical(bytes: &[u8; 32]) -> bool {
    U256::from_big_endian(bytes) < modulus()
}

/// Reduce an arbitrary 32-byte big-endian integer into the field.
pub fn reduce(bytes: &[u8; 32]) -> [u8; 32] {
    let reduced = U256::from_big_endian(bytes) % modulus();
    let mut out = [0u8; 32];
    reduced.to_big_endian(&mut out);
    out
}
