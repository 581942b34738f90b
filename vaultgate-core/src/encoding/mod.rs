//! Chain-specific address encodings needed by the normalization layer.

pub mod cashaddr;
pub mod tron;

pub use cashaddr::pubkey_to_cashaddr;
pub use tron::tron_address_to_parameter;
