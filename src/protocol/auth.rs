//! Authentication plugin responses.
//!
//! - `mysql_native_password`: `SHA1(pw) XOR SHA1(seed + SHA1(SHA1(pw)))`
//! - `caching_sha2_password`: `SHA256(pw) XOR SHA256(SHA256(SHA256(pw)) + seed)`
//! - full authentication (`caching_sha2_password` slow path and `sha256_password`):
//!   the NUL-terminated password, sent as-is over TLS or RSA-OAEP encrypted
//!   after XOR with the seed otherwise.

use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::protocol::constant::auth_plugin;

/// Byte sent to ask the server for its RSA public key.
pub const REQUEST_PUBLIC_KEY: u8 = 0x02;
/// AuthMoreData status: the cached scramble matched.
pub const FAST_AUTH_SUCCESS: u8 = 0x03;
/// AuthMoreData status: the server needs the full password.
pub const PERFORM_FULL_AUTH: u8 = 0x04;

/// Scramble length used by both SHA-based plugins.
const SEED_LEN: usize = 20;

fn seed(auth_data: &[u8]) -> &[u8] {
    &auth_data[..auth_data.len().min(SEED_LEN)]
}

/// `mysql_native_password` response. Empty password gives an empty response.
pub fn native_password(password: &[u8], auth_data: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }
    let stage1 = Sha1::digest(password);
    let stage2 = Sha1::digest(stage1);
    let mut hasher = Sha1::new();
    hasher.update(seed(auth_data));
    hasher.update(stage2);
    let stage3 = hasher.finalize();
    stage1.iter().zip(stage3.iter()).map(|(a, b)| a ^ b).collect()
}

/// `caching_sha2_password` fast-path response. Empty password gives an empty response.
pub fn caching_sha2_password(password: &[u8], auth_data: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }
    let hash1 = Sha256::digest(password);
    let hash2 = Sha256::digest(hash1);
    let mut hasher = Sha256::new();
    hasher.update(hash2);
    hasher.update(seed(auth_data));
    let hash3 = hasher.finalize();
    hash1.iter().zip(hash3.iter()).map(|(a, b)| a ^ b).collect()
}

/// The NUL-terminated cleartext password.
pub fn cleartext_password(password: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(password.len() + 1);
    out.extend_from_slice(password);
    out.push(0);
    out
}

/// Encrypt the password with the server's PEM public key (RSA-OAEP/SHA1).
pub fn encrypt_password(password: &[u8], auth_data: &[u8], public_key_pem: &[u8]) -> Result<Vec<u8>> {
    let seed = seed(auth_data);
    if seed.is_empty() {
        return Err(Error::Protocol("empty authentication seed".into()));
    }
    let mut plain = cleartext_password(password);
    for (i, b) in plain.iter_mut().enumerate() {
        *b ^= seed[i % seed.len()];
    }

    let pem = simdutf8::compat::from_utf8(public_key_pem)
        .map_err(|e| Error::Protocol(format!("server public key is not valid PEM: {e}")))?;
    let key = RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| Error::Protocol(format!("failed to parse server public key: {e}")))?;
    key.encrypt(&mut OsRng, Oaep::new::<Sha1>(), &plain)
        .map_err(|e| Error::Protocol(format!("RSA encryption failed: {e}")))
}

/// Initial response for `plugin`, sent in the HandshakeResponse or after an AuthSwitchRequest.
///
/// `secure` is true when the transport is TLS or a Unix socket.
pub fn initial_response(plugin: &str, password: &[u8], auth_data: &[u8], secure: bool) -> Result<Vec<u8>> {
    match plugin {
        auth_plugin::MYSQL_NATIVE_PASSWORD => Ok(native_password(password, auth_data)),
        auth_plugin::CACHING_SHA2_PASSWORD => Ok(caching_sha2_password(password, auth_data)),
        auth_plugin::SHA256_PASSWORD => {
            if password.is_empty() {
                Ok(vec![0])
            } else if secure {
                Ok(cleartext_password(password))
            } else {
                Ok(vec![REQUEST_PUBLIC_KEY])
            }
        }
        auth_plugin::MYSQL_CLEAR_PASSWORD => {
            if !secure {
                return Err(Error::Unsupported(
                    "mysql_clear_password requires a TLS or Unix socket connection".into(),
                ));
            }
            Ok(cleartext_password(password))
        }
        other => Err(Error::AuthPluginUnsupported(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_seed() -> Vec<u8> {
        (1..=20).collect()
    }

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn native_password_vector() {
        let response = native_password(b"secret", &test_seed());
        assert_eq!(hex(&response), "b32bb3a583e1340c0a1108d58b1be49781ad8c2f");
    }

    #[test]
    fn native_password_ignores_trailing_nul() {
        let mut seed = test_seed();
        seed.push(0);
        assert_eq!(
            native_password(b"secret", &seed),
            native_password(b"secret", &test_seed())
        );
    }

    #[test]
    fn caching_sha2_vector() {
        let response = caching_sha2_password(b"secret", &test_seed());
        assert_eq!(
            hex(&response),
            "746ebe205d56a0707acb3e796e834e0dd7b1d61743b26bd5202c7a623230c7c9"
        );
    }

    #[test]
    fn empty_password() {
        assert!(native_password(b"", &test_seed()).is_empty());
        assert!(caching_sha2_password(b"", &test_seed()).is_empty());
    }

    #[test]
    fn plugin_dispatch() {
        let seed = test_seed();
        assert_eq!(
            initial_response("mysql_native_password", b"secret", &seed, false).unwrap().len(),
            20
        );
        assert_eq!(
            initial_response("caching_sha2_password", b"secret", &seed, false).unwrap().len(),
            32
        );
        assert_eq!(
            initial_response("sha256_password", b"secret", &seed, false).unwrap(),
            vec![REQUEST_PUBLIC_KEY]
        );
        assert_eq!(
            initial_response("mysql_clear_password", b"pw", &seed, true).unwrap(),
            b"pw\0".to_vec()
        );
        assert!(matches!(
            initial_response("auth_gssapi_client", b"pw", &seed, true),
            Err(Error::AuthPluginUnsupported(name)) if name == "auth_gssapi_client"
        ));
    }

    #[test]
    fn encrypt_rejects_garbage_key() {
        assert!(encrypt_password(b"pw", &test_seed(), b"not a key").is_err());
    }
}
