pub mod verify;

use thiserror::Error;

use crate::util::env::EnvErr;

pub type VerifyResult<T> = core::result::Result<T, VerifyErr>;

#[derive(Debug, Error)]
pub enum VerifyErr {
    #[error(transparent)]
    EnvErr(#[from] EnvErr),

    #[error("public key is not valid hex: {0}")]
    HexError(#[from] hex::FromHexError),

    #[error("expected a 32 byte ed25519 public key (got {0} bytes)")]
    InvalidKeyLength(usize),
}
