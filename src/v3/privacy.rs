//! USM privacy: DES-CBC (RFC 3414 8.1) and AES-CFB (RFC 3826).

use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut};
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use des::Des;

use super::PrivProtocol;
use super::auth::LocalizedKey;
use crate::error::{CryptoErrorKind, Error, Result};

/// Values that seed the cipher IV for one message.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IvInputs<'a> {
    pub engine_boots: u32,
    pub engine_time: u32,
    pub salt: &'a [u8],
}

/// Encrypt a serialized scoped PDU.
pub(crate) fn encrypt(
    protocol: PrivProtocol,
    key: &LocalizedKey,
    iv: IvInputs<'_>,
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    check_salt(protocol, iv.salt).map_err(Error::encrypt)?;
    let key = key.as_bytes();

    match protocol {
        PrivProtocol::Des => {
            let (des_key, des_iv) = des_key_iv(key, iv.salt).map_err(Error::encrypt)?;
            // Zero padding up to the block size; the BER length ignores the tail.
            let padded_len = plaintext.len().div_ceil(8) * 8;
            let mut buf = plaintext.to_vec();
            buf.resize(padded_len, 0);
            cbc::Encryptor::<Des>::new_from_slices(&des_key, &des_iv)
                .map_err(|_| Error::encrypt(CryptoErrorKind::InvalidKeyLength))?
                .encrypt_padded_mut::<NoPadding>(&mut buf, padded_len)
                .map_err(|_| Error::encrypt(CryptoErrorKind::CipherError))?;
            Ok(buf)
        }
        aes => {
            let aes_iv = aes_iv(iv);
            let mut buf = plaintext.to_vec();
            let key = key
                .get(..aes.key_len())
                .ok_or_else(|| Error::encrypt(CryptoErrorKind::InvalidKeyLength))?;
            let result = match aes {
                PrivProtocol::Aes192 => cfb_mode::Encryptor::<Aes192>::new_from_slices(key, &aes_iv)
                    .map(|c| c.encrypt(&mut buf)),
                PrivProtocol::Aes256 => cfb_mode::Encryptor::<Aes256>::new_from_slices(key, &aes_iv)
                    .map(|c| c.encrypt(&mut buf)),
                _ => cfb_mode::Encryptor::<Aes128>::new_from_slices(key, &aes_iv)
                    .map(|c| c.encrypt(&mut buf)),
            };
            result.map_err(|_| Error::encrypt(CryptoErrorKind::InvalidKeyLength))?;
            Ok(buf)
        }
    }
}

/// Decrypt an encryptedPDU.
pub(crate) fn decrypt(
    protocol: PrivProtocol,
    key: &LocalizedKey,
    iv: IvInputs<'_>,
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    check_salt(protocol, iv.salt).map_err(Error::decrypt)?;
    let key = key.as_bytes();

    match protocol {
        PrivProtocol::Des => {
            if ciphertext.len() % 8 != 0 {
                return Err(Error::decrypt(CryptoErrorKind::InvalidCiphertextLength {
                    length: ciphertext.len(),
                    block_size: 8,
                }));
            }
            let (des_key, des_iv) = des_key_iv(key, iv.salt).map_err(Error::decrypt)?;
            let mut buf = ciphertext.to_vec();
            cbc::Decryptor::<Des>::new_from_slices(&des_key, &des_iv)
                .map_err(|_| Error::decrypt(CryptoErrorKind::InvalidKeyLength))?
                .decrypt_padded_mut::<NoPadding>(&mut buf)
                .map_err(|_| Error::decrypt(CryptoErrorKind::CipherError))?;
            Ok(buf)
        }
        aes => {
            let aes_iv = aes_iv(iv);
            let mut buf = ciphertext.to_vec();
            let key = key
                .get(..aes.key_len())
                .ok_or_else(|| Error::decrypt(CryptoErrorKind::InvalidKeyLength))?;
            let result = match aes {
                PrivProtocol::Aes192 => cfb_mode::Decryptor::<Aes192>::new_from_slices(key, &aes_iv)
                    .map(|c| c.decrypt(&mut buf)),
                PrivProtocol::Aes256 => cfb_mode::Decryptor::<Aes256>::new_from_slices(key, &aes_iv)
                    .map(|c| c.decrypt(&mut buf)),
                _ => cfb_mode::Decryptor::<Aes128>::new_from_slices(key, &aes_iv)
                    .map(|c| c.decrypt(&mut buf)),
            };
            result.map_err(|_| Error::decrypt(CryptoErrorKind::InvalidKeyLength))?;
            Ok(buf)
        }
    }
}

fn check_salt(protocol: PrivProtocol, salt: &[u8]) -> std::result::Result<(), CryptoErrorKind> {
    if salt.len() != protocol.salt_len() {
        return Err(CryptoErrorKind::InvalidPrivParamsLength {
            expected: protocol.salt_len(),
            actual: salt.len(),
        });
    }
    Ok(())
}

/// DES key is the first 8 octets; the IV is the pre-IV (octets 8..16) XOR salt.
fn des_key_iv(
    key: &[u8],
    salt: &[u8],
) -> std::result::Result<([u8; 8], [u8; 8]), CryptoErrorKind> {
    if key.len() < 16 {
        return Err(CryptoErrorKind::InvalidKeyLength);
    }
    let mut des_key = [0u8; 8];
    des_key.copy_from_slice(&key[..8]);
    let mut iv = [0u8; 8];
    for (i, b) in iv.iter_mut().enumerate() {
        *b = key[8 + i] ^ salt[i];
    }
    Ok((des_key, iv))
}

/// AES IV: engine boots, engine time, then the 64-bit salt.
fn aes_iv(iv: IvInputs<'_>) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[..4].copy_from_slice(&iv.engine_boots.to_be_bytes());
    out[4..8].copy_from_slice(&iv.engine_time.to_be_bytes());
    out[8..].copy_from_slice(iv.salt);
    out
}

/// Fresh random salt for an outgoing message.
pub(crate) fn fresh_salt(protocol: PrivProtocol) -> Result<Vec<u8>> {
    let mut salt = vec![0u8; protocol.salt_len()];
    getrandom::fill(&mut salt).map_err(|_| Error::encrypt(CryptoErrorKind::RandomUnavailable))?;
    Ok(salt)
}
