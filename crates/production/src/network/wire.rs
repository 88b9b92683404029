//! LZ4 framing of SBOR payloads.

use thiserror::Error;

/// Largest payload accepted after decompression.
pub const MAX_DECOMPRESSED_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("Compressed frame too short")]
    TooShort,

    #[error("Frame claims {0} bytes, limit is {MAX_DECOMPRESSED_SIZE}")]
    TooLarge(usize),

    #[error("LZ4 error: {0}")]
    Lz4(#[from] lz4_flex::block::DecompressError),
}

/// Compress `payload`, prefixed with its uncompressed size.
pub fn compress(payload: &[u8]) -> Vec<u8> {
    lz4_flex::compress_prepend_size(payload)
}

/// Inverse of [`compress`]. The size prefix is checked before allocating.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, WireError> {
    let prefix: [u8; 4] = data
        .get(..4)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(WireError::TooShort)?;
    let size = u32::from_le_bytes(prefix) as usize;
    if size > MAX_DECOMPRESSED_SIZE {
        return Err(WireError::TooLarge(size));
    }
    Ok(lz4_flex::decompress_size_prepended(data)?)
}
