//! Loading of sr25519 signing keys.

use hex::FromHex;
use snafu::ResultExt;
use subxt_signer::sr25519::Keypair;

use crate::error::{Error, KeyFileReadSnafu, KeyParseSnafu, Result};

/// Loads a hex-encoded sr25519 secret key from `path`.
pub async fn load_keypair(path: &str) -> Result<Keypair> {
    let hex_string = tokio::fs::read_to_string(path)
        .await
        .context(KeyFileReadSnafu { path })?;

    let bytes = Vec::from_hex(hex_string.trim()).context(KeyParseSnafu)?;
    let secret: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| Error::InvalidKeyLength {
            length: bytes.len(),
        })?;

    Keypair::from_secret_key(secret).map_err(|_| Error::KeypairCreation)
}
