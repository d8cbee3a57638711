//! Save slot encryption and integrity checksums.
//!
//! Both SL2 container formats wrap each character slot in AES-128-CBC with
//! a per-slot IV stored alongside the ciphertext, and tag the encrypted
//! payload with an MD5 digest. Slot payloads are stored block-aligned, so
//! no padding scheme is involved; a round trip must preserve the payload
//! length exactly or the container layout breaks.

#[allow(deprecated)]
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use md5::{Digest, Md5};

/// AES block size; every slot payload length is a multiple of this.
pub const BLOCK_SIZE: usize = 16;

/// Errors that can occur during slot encryption/decryption
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Payload size {0} is not a multiple of 16 bytes")]
    NotAligned(usize),
}

/// Decrypt an AES-128-CBC slot payload.
///
/// The IV comes from the slot header in the container; it is never derived
/// here. Fails if the ciphertext is not block-aligned.
pub fn decrypt_cbc(
    ciphertext: &[u8],
    key: &[u8; 16],
    iv: &[u8; 16],
) -> Result<Vec<u8>, CryptoError> {
    if !ciphertext.len().is_multiple_of(BLOCK_SIZE) {
        return Err(CryptoError::NotAligned(ciphertext.len()));
    }

    #[allow(deprecated)]
    let cipher = Aes128::new(GenericArray::from_slice(key));

    let mut plaintext = ciphertext.to_vec();
    let mut prev = *iv;

    for chunk in plaintext.chunks_exact_mut(BLOCK_SIZE) {
        let mut saved = [0u8; BLOCK_SIZE];
        saved.copy_from_slice(chunk);

        #[allow(deprecated)]
        cipher.decrypt_block(GenericArray::from_mut_slice(chunk));

        for (byte, prev_byte) in chunk.iter_mut().zip(prev.iter()) {
            *byte ^= prev_byte;
        }
        prev = saved;
    }

    Ok(plaintext)
}

/// Encrypt a slot payload with AES-128-CBC.
///
/// Output length always equals the input length; callers re-encrypting a
/// slot must pass the same IV the slot was loaded with so the container
/// stays readable by the game.
pub fn encrypt_cbc(
    plaintext: &[u8],
    key: &[u8; 16],
    iv: &[u8; 16],
) -> Result<Vec<u8>, CryptoError> {
    if !plaintext.len().is_multiple_of(BLOCK_SIZE) {
        return Err(CryptoError::NotAligned(plaintext.len()));
    }

    #[allow(deprecated)]
    let cipher = Aes128::new(GenericArray::from_slice(key));

    let mut ciphertext = plaintext.to_vec();
    let mut prev = *iv;

    for chunk in ciphertext.chunks_exact_mut(BLOCK_SIZE) {
        for (byte, prev_byte) in chunk.iter_mut().zip(prev.iter()) {
            *byte ^= prev_byte;
        }

        #[allow(deprecated)]
        cipher.encrypt_block(GenericArray::from_mut_slice(chunk));

        prev.copy_from_slice(chunk);
    }

    Ok(ciphertext)
}

/// MD5 digest used as the containers' integrity tag.
///
/// The archive format verifies this against the stored tag on load; both
/// formats stamp freshly encrypted data with it on export.
pub fn md5_digest(data: &[u8]) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(data);
    hasher.finalize().into()
}
