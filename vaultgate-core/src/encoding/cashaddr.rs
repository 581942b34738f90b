//! Bitcoin Cash CashAddr encoding.
//!
//! Pure implementation of the `bitcoincash:` P2PKH address derivation:
//! SHA-256 -> RIPEMD-160 -> 5-bit repack -> BCH polymod checksum. Used to
//! recover the spending address from the compressed pubkey found in a
//! transaction input's `scriptSig`.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use thiserror::Error;

const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// The `"bitcoincash"` prefix expanded to its low-5-bit form, terminated by
/// the zero separator. Part of the checksum contract.
const PREFIX_5BIT: [u8; 12] = [2, 9, 20, 3, 15, 9, 14, 3, 1, 19, 8, 0];

const GENERATOR: [u64; 5] = [
    0x98f2bc8e61,
    0x79b76d99e2,
    0xf33e5fb3c4,
    0xae2eabe2a8,
    0x1e4f43e470,
];

/// Failure to derive an address from a pubkey.
#[derive(Debug, Error)]
pub enum CashAddrError {
    /// The pubkey was not valid hex.
    #[error("pubkey is not valid hex: {0}")]
    BadHex(#[from] hex::FromHexError),
}

fn polymod(values: impl IntoIterator<Item = u8>) -> u64 {
    let mut checksum: u64 = 1;
    for value in values {
        let top = checksum >> 35;
        checksum = ((checksum & 0x07ffffffff) << 5) ^ u64::from(value);
        for (i, gen) in GENERATOR.iter().enumerate() {
            if (top >> i) & 1 == 1 {
                checksum ^= gen;
            }
        }
    }
    checksum ^ 1
}

fn convert_bits_8_to_5(data: &[u8]) -> Vec<u8> {
    let mut acc: u32 = 0;
    let mut bits = 0u32;
    let mut out = Vec::with_capacity(data.len() * 8 / 5 + 1);
    for &value in data {
        acc = (acc << 8) | u32::from(value);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(((acc >> bits) & 0x1f) as u8);
        }
    }
    if bits > 0 {
        out.push(((acc << (5 - bits)) & 0x1f) as u8);
    }
    out
}

/// Encode a 20-byte hash160 as a `bitcoincash:` P2PKH address.
pub fn encode_p2pkh(hash160: &[u8; 20]) -> String {
    // version byte 0 = P2PKH
    let mut payload = Vec::with_capacity(21);
    payload.push(0u8);
    payload.extend_from_slice(hash160);
    let payload_5bit = convert_bits_8_to_5(&payload);

    let checksum_input = PREFIX_5BIT
        .iter()
        .copied()
        .chain(payload_5bit.iter().copied())
        .chain(std::iter::repeat(0u8).take(8));
    let checksum = polymod(checksum_input);
    let checksum_5bit = (0..8).rev().map(|i| ((checksum >> (5 * i)) & 31) as u8);

    let body: String = payload_5bit
        .into_iter()
        .chain(checksum_5bit)
        .map(|d| CHARSET[d as usize] as char)
        .collect();
    format!("bitcoincash:{body}")
}

/// Derive the CashAddr for a hex-encoded pubkey.
pub fn pubkey_to_cashaddr(pubkey_hex: &str) -> Result<String, CashAddrError> {
    let pub_bytes = hex::decode(pubkey_hex)?;
    let sha = Sha256::digest(&pub_bytes);
    let hash160: [u8; 20] = Ripemd160::digest(sha).into();
    Ok(encode_p2pkh(&hash160))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_vector_p2pkh() {
        // CashAddr specification test vector: hash160 of the legacy address
        // 1BpEi6DfDAUFd7GtittLSdBeYJvcoaVggu.
        let hash160: [u8; 20] = hex::decode("76a04053bda0a88bda5177b86a15c3b29f559873")
            .unwrap()
            .try_into()
            .unwrap();
        assert_eq!(
            encode_p2pkh(&hash160),
            "bitcoincash:qpm2qsznhks23z7629mms6s4cwef74vcwvy22gdx6a"
        );
    }

    #[test]
    fn pubkey_derivation_matches_manual_hashing() {
        let pubkey = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
        let bytes = hex::decode(pubkey).unwrap();
        let hash160: [u8; 20] = Ripemd160::digest(Sha256::digest(&bytes)).into();
        assert_eq!(
            pubkey_to_cashaddr(pubkey).unwrap(),
            encode_p2pkh(&hash160)
        );
    }

    #[test]
    fn bad_hex_is_an_error() {
        assert!(pubkey_to_cashaddr("zz").is_err());
    }
}
