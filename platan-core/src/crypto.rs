//! Challenge encryption for the join handshake: AES-128-CBC over a shared
//! device key. The cipher is a proof-of-possession mechanism, not a
//! confidentiality layer; the server recomputes the same encryption and
//! compares ciphertexts.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;

/// Block-cipher primitive, injected so the CBC chaining and padding stay
/// testable against a stand-in cipher.
pub trait BlockCipher {
    fn block_size(&self) -> usize;
    /// Encrypt one block in place. `block` is exactly `block_size` bytes.
    fn encrypt_block(&self, block: &mut [u8]);
}

/// AES-128 over the shared device key.
pub struct Aes128Key(Aes128);

impl Aes128Key {
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        Aes128::new_from_slice(key)
            .map(Aes128Key)
            .map_err(|_| CryptoError::KeyLength(key.len()))
    }
}

impl BlockCipher for Aes128Key {
    fn block_size(&self) -> usize {
        16
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        let block = GenericArray::from_mut_slice(block);
        self.0.encrypt_block(block);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid key length {0}")]
    KeyLength(usize),
    #[error("iv length {got}, expected {expected}")]
    IvLength { expected: usize, got: usize },
}

/// PKCS#7 padding. The pad length is never zero: input that is already a
/// multiple of the block size gains one full padding block. The server
/// recomputes exactly this, so the degenerate case is wire format, not an
/// implementation choice to revisit.
pub fn pad_pkcs7(data: &[u8], block_size: usize) -> Vec<u8> {
    let pad_len = block_size - (data.len() % block_size);
    let mut out = Vec::with_capacity(data.len() + pad_len);
    out.extend_from_slice(data);
    out.extend(std::iter::repeat(pad_len as u8).take(pad_len));
    out
}

/// CBC-encrypt `plaintext` after padding it to the cipher's block size.
pub fn cbc_encrypt<C: BlockCipher>(
    cipher: &C,
    iv: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let bs = cipher.block_size();
    if iv.len() != bs {
        return Err(CryptoError::IvLength {
            expected: bs,
            got: iv.len(),
        });
    }
    let padded = pad_pkcs7(plaintext, bs);
    let mut out = Vec::with_capacity(padded.len());
    let mut chain = iv.to_vec();
    for block in padded.chunks(bs) {
        let mut buf: Vec<u8> = block.iter().zip(&chain).map(|(p, c)| p ^ c).collect();
        cipher.encrypt_block(&mut buf);
        chain.copy_from_slice(&buf);
        out.extend_from_slice(&buf);
    }
    Ok(out)
}

/// Encrypt a server challenge under the shared key with the server-supplied
/// IV. Entry point for the join handshake; the mock server in tests uses
/// the same function to validate responses.
pub fn encrypt_challenge(key: &[u8], iv: &[u8], challenge: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes128Key::new(key)?;
    cbc_encrypt(&cipher, iv, challenge)
}
