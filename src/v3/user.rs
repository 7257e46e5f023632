//! Registered USM users.

use bytes::Bytes;
use zeroize::Zeroizing;

use super::auth::{LocalizedKey, MasterKey};
use super::{AuthProtocol, PrivProtocol};
use crate::error::{AuthErrorKind, ConfigErrorKind, CryptoErrorKind, Error, Result};
use crate::message::SecurityLevel;

#[derive(Clone)]
struct Secret<P> {
    protocol: P,
    passphrase: Zeroizing<Vec<u8>>,
    master: Option<MasterKey>,
}

/// A USM user: name, protocols and passphrases.
///
/// Passphrases are turned into master keys by
/// [`AgentBuilder::prepare`](crate::agent::AgentBuilder::prepare); a user
/// that was never prepared derives its keys on every use.
///
/// ```
/// use async_snmp_agent::v3::{AuthProtocol, PrivProtocol, UsmUser};
///
/// let user = UsmUser::new("monitor")
///     .auth(AuthProtocol::Sha256, "authpassword")
///     .privacy(PrivProtocol::Aes128, "privpassword");
/// assert_eq!(user.name(), "monitor".as_bytes());
/// ```
#[derive(Clone)]
pub struct UsmUser {
    name: Bytes,
    auth: Option<Secret<AuthProtocol>>,
    privacy: Option<Secret<PrivProtocol>>,
}

impl UsmUser {
    /// A noAuthNoPriv user.
    pub fn new(name: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            auth: None,
            privacy: None,
        }
    }

    pub fn auth(mut self, protocol: AuthProtocol, passphrase: impl AsRef<[u8]>) -> Self {
        self.auth = Some(Secret {
            protocol,
            passphrase: Zeroizing::new(passphrase.as_ref().to_vec()),
            master: None,
        });
        self
    }

    pub fn privacy(mut self, protocol: PrivProtocol, passphrase: impl AsRef<[u8]>) -> Self {
        self.privacy = Some(Secret {
            protocol,
            passphrase: Zeroizing::new(passphrase.as_ref().to_vec()),
            master: None,
        });
        self
    }

    pub fn name(&self) -> &Bytes {
        &self.name
    }

    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    pub fn auth_protocol(&self) -> Option<AuthProtocol> {
        self.auth.as_ref().map(|s| s.protocol)
    }

    pub fn priv_protocol(&self) -> Option<PrivProtocol> {
        self.privacy.as_ref().map(|s| s.protocol)
    }

    /// Highest security level this user can take part in.
    pub fn security_level(&self) -> SecurityLevel {
        match (&self.auth, &self.privacy) {
            (Some(_), Some(_)) => SecurityLevel::AuthPriv,
            (Some(_), None) => SecurityLevel::AuthNoPriv,
            _ => SecurityLevel::NoAuthNoPriv,
        }
    }

    /// Check the configuration and derive master keys.
    pub(crate) fn prepare(&mut self) -> Result<()> {
        let name = self.name_lossy();
        let Some(auth) = self.auth.as_mut() else {
            if self.privacy.is_some() {
                return Err(Error::config(ConfigErrorKind::PrivWithoutAuth(name.into())));
            }
            return Ok(());
        };
        if auth.passphrase.is_empty() {
            return Err(Error::config(ConfigErrorKind::EmptyPassphrase(name.into())));
        }
        let auth_protocol = auth.protocol;
        auth.master = Some(MasterKey::from_passphrase(auth_protocol, &auth.passphrase));

        if let Some(privacy) = self.privacy.as_mut() {
            if privacy.passphrase.is_empty() {
                return Err(Error::config(ConfigErrorKind::EmptyPassphrase(name.into())));
            }
            // Privacy keys are derived with the authentication hash.
            privacy.master = Some(MasterKey::from_passphrase(
                auth_protocol,
                &privacy.passphrase,
            ));
        }
        Ok(())
    }

    /// Authentication key localized to `engine_id`.
    pub(crate) fn auth_key(&self, engine_id: &[u8]) -> Result<LocalizedKey> {
        let auth = self
            .auth
            .as_ref()
            .ok_or_else(|| Error::auth(AuthErrorKind::NoAuthKey))?;
        Ok(master_key(auth, auth.protocol).localize(engine_id))
    }

    /// Privacy protocol and key localized to `engine_id`.
    pub(crate) fn priv_key(&self, engine_id: &[u8]) -> Result<(PrivProtocol, LocalizedKey)> {
        let (Some(auth), Some(privacy)) = (self.auth.as_ref(), self.privacy.as_ref()) else {
            return Err(Error::decrypt(CryptoErrorKind::NoPrivKey));
        };
        let key = master_key(privacy, auth.protocol)
            .localize(engine_id)
            .extend_to(privacy.protocol.key_len());
        Ok((privacy.protocol, key))
    }
}

fn master_key<P>(secret: &Secret<P>, hash: AuthProtocol) -> MasterKey {
    secret
        .master
        .clone()
        .unwrap_or_else(|| MasterKey::from_passphrase(hash, &secret.passphrase))
}

impl std::fmt::Debug for UsmUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsmUser")
            .field("name", &self.name_lossy())
            .field("auth", &self.auth_protocol())
            .field("privacy", &self.priv_protocol())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_level() {
        assert_eq!(
            UsmUser::new("a").security_level(),
            SecurityLevel::NoAuthNoPriv
        );
        let user = UsmUser::new("b").auth(AuthProtocol::Md5, "authpassword");
        assert_eq!(user.security_level(), SecurityLevel::AuthNoPriv);
        let user = user.privacy(PrivProtocol::Des, "privpassword");
        assert_eq!(user.security_level(), SecurityLevel::AuthPriv);
    }

    #[test]
    fn test_prepare_rejects_priv_without_auth() {
        let mut user = UsmUser::new("eve").privacy(PrivProtocol::Aes128, "privpassword");
        let err = user.prepare().unwrap_err();
        assert!(matches!(
            err,
            Error::Config {
                kind: ConfigErrorKind::PrivWithoutAuth(_)
            }
        ));
    }

    #[test]
    fn test_prepared_keys_match_lazy_keys() {
        let lazy = UsmUser::new("op")
            .auth(AuthProtocol::Sha1, "authpassword")
            .privacy(PrivProtocol::Aes256, "privpassword");
        let mut prepared = lazy.clone();
        prepared.prepare().unwrap();

        let engine = b"\x80\x00\x4f\xb8\x05test";
        assert_eq!(
            lazy.auth_key(engine).unwrap().as_bytes(),
            prepared.auth_key(engine).unwrap().as_bytes()
        );
        let (protocol, key) = prepared.priv_key(engine).unwrap();
        assert_eq!(protocol, PrivProtocol::Aes256);
        assert_eq!(key.as_bytes().len(), 40);
    }

    #[test]
    fn test_missing_keys() {
        let user = UsmUser::new("plain");
        assert!(user.auth_key(b"e").is_err());
        assert!(user.priv_key(b"e").is_err());
        assert!(!format!("{:?}", user).contains("passphrase"));
    }
}
