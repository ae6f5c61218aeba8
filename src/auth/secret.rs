//! Credential generation and secret hashing.
//!
//! Wire format: `sh_live_` + 40 hex chars from 20 CSPRNG bytes. The first
//! 8 chars of the hex portion double as the plaintext lookup prefix; the
//! full secret is stored only as `salt$sha256(salt || secret)`.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Fixed, versioned credential prefix. Case-sensitive, part of the wire
/// format; a presented credential that does not start with this exact
/// literal is rejected before any store lookup.
pub const CREDENTIAL_PREFIX: &str = "sh_live_";

/// Length of the plaintext lookup prefix stored alongside the hash.
pub const LOOKUP_PREFIX_LEN: usize = 8;

const SECRET_BYTES: usize = 20;
const SALT_BYTES: usize = 16;

/// Output of credential generation. `plaintext` is shown to the caller
/// exactly once at issuance; only `secret_prefix` and `secret_hash` are
/// ever persisted.
pub struct IssuedSecret {
    pub plaintext: String,
    pub secret_prefix: String,
    pub secret_hash: String,
}

impl std::fmt::Debug for IssuedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedSecret")
            .field("plaintext", &"[REDACTED]")
            .field("secret_prefix", &self.secret_prefix)
            .field("secret_hash", &"[REDACTED]")
            .finish()
    }
}

/// Generate a fresh credential: random secret, lookup prefix, salted hash.
pub fn generate() -> IssuedSecret {
    let mut raw = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut raw);
    let secret = hex::encode(raw);

    IssuedSecret {
        secret_prefix: secret[..LOOKUP_PREFIX_LEN].to_string(),
        secret_hash: hash_secret(&secret),
        plaintext: format!("{}{}", CREDENTIAL_PREFIX, secret),
    }
}

/// Salted one-way hash of the secret portion, encoded as `salt$digest`.
pub fn hash_secret(secret: &str) -> String {
    let mut salt = [0u8; SALT_BYTES];
    OsRng.fill_bytes(&mut salt);

    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(secret.as_bytes());
    format!("{}${}", hex::encode(salt), hex::encode(hasher.finalize()))
}

/// Constant-time comparison of a presented secret against a stored
/// `salt$digest` value. A stored value that does not parse is treated as
/// a mismatch, never as an error the caller could act on.
pub fn verify_secret(secret: &str, stored: &str) -> bool {
    let Some((salt_hex, digest_hex)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(digest_hex)) else {
        return false;
    };

    let mut hasher = Sha256::new();
    hasher.update(&salt);
    hasher.update(secret.as_bytes());
    let actual = hasher.finalize();

    actual.as_slice().ct_eq(expected.as_slice()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secret_verifies_against_its_own_hash() {
        let issued = generate();
        let secret = issued.plaintext.strip_prefix(CREDENTIAL_PREFIX).unwrap();
        assert_eq!(secret.len(), SECRET_BYTES * 2);
        assert_eq!(&secret[..LOOKUP_PREFIX_LEN], issued.secret_prefix);
        assert!(verify_secret(secret, &issued.secret_hash));
    }

    #[test]
    fn wrong_secret_does_not_verify() {
        let issued = generate();
        assert!(!verify_secret("not-the-secret", &issued.secret_hash));
    }

    #[test]
    fn same_secret_hashes_differently_per_salt() {
        let a = hash_secret("s3cr3t");
        let b = hash_secret("s3cr3t");
        assert_ne!(a, b);
        assert!(verify_secret("s3cr3t", &a));
        assert!(verify_secret("s3cr3t", &b));
    }

    #[test]
    fn corrupt_stored_hash_is_a_mismatch() {
        assert!(!verify_secret("anything", "no-dollar-sign"));
        assert!(!verify_secret("anything", "zz$zz"));
    }

    #[test]
    fn debug_never_prints_the_secret() {
        let issued = generate();
        let rendered = format!("{:?}", issued);
        assert!(!rendered.contains(&issued.plaintext));
        assert!(rendered.contains("[REDACTED]"));
    }
}
