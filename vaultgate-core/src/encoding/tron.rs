//! Tron Base58Check address handling.

use thiserror::Error;

/// Failure to convert a Tron address.
#[derive(Debug, Error)]
pub enum TronAddressError {
    /// Base58Check decoding failed (bad alphabet or checksum).
    #[error("invalid base58check address")]
    BadBase58,
    /// The decoded payload did not carry the Tron `0x41` prefix.
    #[error("decoded address does not start with the tron prefix")]
    BadPrefix,
}

/// Convert a Base58Check Tron address (`T...`) into the 64-hex-character
/// zero-padded positional parameter used in TVM contract-call ABI encoding.
pub fn tron_address_to_parameter(address: &str) -> Result<String, TronAddressError> {
    let decoded = bs58::decode(address)
        .with_check(None)
        .into_vec()
        .map_err(|_| TronAddressError::BadBase58)?;
    let raw = decoded
        .strip_prefix(&[0x41])
        .ok_or(TronAddressError::BadPrefix)?;
    Ok(format!("{:0>64}", hex::encode(raw)))
}
