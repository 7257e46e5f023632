//! USM key derivation and message authentication.
//!
//! Passphrases become master keys once (RFC 3414 A.2.1, one megabyte of
//! hashing), and master keys are localized to an engine id per message
//! (`H(Ku || engineID || Ku)`). Privacy keys shorter than the cipher needs are
//! stretched with the Blumenthal extension.

use digest::{Digest, KeyInit};
use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::AuthProtocol;
use crate::error::{AuthErrorKind, Error, Result};

/// Bytes of passphrase material hashed into a master key.
const EXPANSION_LEN: usize = 1_048_576;

/// Passphrase-derived key, not yet bound to an engine.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    #[zeroize(skip)]
    protocol: AuthProtocol,
    key: Vec<u8>,
}

impl MasterKey {
    /// Run the password-to-key algorithm.
    pub fn from_passphrase(protocol: AuthProtocol, passphrase: &[u8]) -> Self {
        let key = match protocol {
            AuthProtocol::Md5 => expand::<Md5>(passphrase),
            AuthProtocol::Sha1 => expand::<Sha1>(passphrase),
            AuthProtocol::Sha224 => expand::<Sha224>(passphrase),
            AuthProtocol::Sha256 => expand::<Sha256>(passphrase),
            AuthProtocol::Sha384 => expand::<Sha384>(passphrase),
            AuthProtocol::Sha512 => expand::<Sha512>(passphrase),
        };
        Self { protocol, key }
    }

    pub fn protocol(&self) -> AuthProtocol {
        self.protocol
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    /// Bind this key to an authoritative engine.
    pub fn localize(&self, engine_id: &[u8]) -> LocalizedKey {
        let key = hash(self.protocol, &[&self.key, engine_id, &self.key]);
        LocalizedKey {
            protocol: self.protocol,
            key,
        }
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("protocol", &self.protocol)
            .finish_non_exhaustive()
    }
}

/// Key localized to one engine id.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct LocalizedKey {
    #[zeroize(skip)]
    protocol: AuthProtocol,
    key: Vec<u8>,
}

impl LocalizedKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    /// Truncated HMAC over `data`.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut mac = match self.protocol {
            AuthProtocol::Md5 => hmac::<Hmac<Md5>>(&self.key, data)?,
            AuthProtocol::Sha1 => hmac::<Hmac<Sha1>>(&self.key, data)?,
            AuthProtocol::Sha224 => hmac::<Hmac<Sha224>>(&self.key, data)?,
            AuthProtocol::Sha256 => hmac::<Hmac<Sha256>>(&self.key, data)?,
            AuthProtocol::Sha384 => hmac::<Hmac<Sha384>>(&self.key, data)?,
            AuthProtocol::Sha512 => hmac::<Hmac<Sha512>>(&self.key, data)?,
        };
        mac.truncate(self.protocol.mac_len());
        Ok(mac)
    }

    /// Check a received MAC in constant time.
    pub fn verify(&self, data: &[u8], received: &[u8]) -> Result<()> {
        let expected = self.sign(data)?;
        if received.len() != expected.len() {
            return Err(Error::auth(AuthErrorKind::WrongMacLength {
                expected: expected.len(),
                actual: received.len(),
            }));
        }
        if bool::from(expected.ct_eq(received)) {
            Ok(())
        } else {
            Err(Error::auth(AuthErrorKind::HmacMismatch))
        }
    }

    /// Stretch to at least `len` octets: `K || H(K) || H(K || H(K)) ...`.
    pub(crate) fn extend_to(mut self, len: usize) -> Self {
        while self.key.len() < len {
            let more = hash(self.protocol, &[&self.key]);
            self.key.extend_from_slice(&more);
        }
        self
    }
}

impl std::fmt::Debug for LocalizedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalizedKey")
            .field("protocol", &self.protocol)
            .finish_non_exhaustive()
    }
}

fn expand<D: Digest>(passphrase: &[u8]) -> Vec<u8> {
    let mut hasher = D::new();
    if !passphrase.is_empty() {
        let mut block = [0u8; 64];
        let mut index = 0;
        let mut count = 0;
        while count < EXPANSION_LEN {
            for b in block.iter_mut() {
                *b = passphrase[index % passphrase.len()];
                index += 1;
            }
            hasher.update(block);
            count += block.len();
        }
        block.zeroize();
    }
    hasher.finalize().to_vec()
}

fn hash(protocol: AuthProtocol, parts: &[&[u8]]) -> Vec<u8> {
    fn run<D: Digest>(parts: &[&[u8]]) -> Vec<u8> {
        let mut hasher = D::new();
        for part in parts {
            hasher.update(part);
        }
        hasher.finalize().to_vec()
    }

    match protocol {
        AuthProtocol::Md5 => run::<Md5>(parts),
        AuthProtocol::Sha1 => run::<Sha1>(parts),
        AuthProtocol::Sha224 => run::<Sha224>(parts),
        AuthProtocol::Sha256 => run::<Sha256>(parts),
        AuthProtocol::Sha384 => run::<Sha384>(parts),
        AuthProtocol::Sha512 => run::<Sha512>(parts),
    }
}

fn hmac<M: Mac + KeyInit>(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = <M as KeyInit>::new_from_slice(key)
        .map_err(|_| Error::auth(AuthErrorKind::NoAuthKey))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}
