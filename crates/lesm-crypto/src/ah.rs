//! Random address hash function `ah` and resolvable private addresses
//! (Bluetooth Core Vol 3, Part H, 2.2.2 and Vol 6, Part B, 1.3.2.2).
//!
//! The Bluetooth definitions are written most significant octet first, while
//! keys and addresses travel least significant octet first. The AES-128 block
//! cipher from the `aes` crate follows FIPS-197 byte order, so key, plaintext
//! and ciphertext are reversed around the cipher call. Getting this wrong does
//! not fail loudly: every resolution simply stops matching.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use rand_core::{CryptoRng, OsRng, RngCore};

use crate::address::{mark_resolvable, BdAddr};
use crate::keys::{Irk, KEY_LEN};
use crate::utils::constant_time_compare_array;

/// Security function `e`: AES-128 over most-significant-first buffers.
fn e(key_be: &[u8; KEY_LEN], block_be: &mut [u8; 16]) {
    let cipher = Aes128::new(GenericArray::from_slice(key_be));
    cipher.encrypt_block(GenericArray::from_mut_slice(block_be));
}

/// 24-bit hash `ah(k, r) = e(k, padding || r) mod 2^24`.
///
/// `key` and `r` are least significant byte first; so is the returned hash.
pub fn ah(key: &[u8; KEY_LEN], r: &[u8; 3]) -> [u8; 3] {
    let mut key_be = *key;
    key_be.reverse();

    // r' = 104 zero bits || r, most significant octet first.
    let mut block = [0u8; 16];
    block[13] = r[2];
    block[14] = r[1];
    block[15] = r[0];

    e(&key_be, &mut block);

    let hash = [block[15], block[14], block[13]];
    block.iter_mut().for_each(|b| *b = 0);
    key_be.iter_mut().for_each(|b| *b = 0);
    hash
}

/// Check whether `address` was generated from `irk`.
pub fn resolve(address: &BdAddr, irk: &Irk) -> bool {
    let local_hash = ah(irk.as_le_bytes(), &address.prand_part());
    constant_time_compare_array(&local_hash, &address.hash_part())
}

/// Generate a resolvable private address from `irk` using the OS random
/// number generator for the prand.
pub fn generate(irk: &Irk) -> BdAddr {
    generate_with_rng(irk, &mut OsRng)
}

/// Generate a resolvable private address with a caller-provided RNG.
pub fn generate_with_rng<R: RngCore + CryptoRng>(irk: &Irk, rng: &mut R) -> BdAddr {
    let mut prand = [0u8; 3];
    rng.fill_bytes(&mut prand);
    mark_resolvable(&mut prand);

    let hash = ah(irk.as_le_bytes(), &prand);
    BdAddr::from_parts(hash, prand)
}
