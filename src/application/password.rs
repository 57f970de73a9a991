use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Credential hashing contract. The core never sees plaintext handling
/// beyond this seam; deployments can plug a hardened KDF.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, plain: &str) -> String;
    fn verify(&self, plain: &str, hashed: &str) -> bool;
}

/// Salted SHA-256 hasher, stored as `salt$hexdigest`.
pub struct Sha256Hasher;

impl Sha256Hasher {
    fn digest(salt: &str, plain: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(b"$");
        hasher.update(plain.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl CredentialHasher for Sha256Hasher {
    fn hash(&self, plain: &str) -> String {
        let salt = Uuid::new_v4().simple().to_string();
        let digest = Self::digest(&salt, plain);
        format!("{}${}", salt, digest)
    }

    fn verify(&self, plain: &str, hashed: &str) -> bool {
        match hashed.split_once('$') {
            Some((salt, digest)) => Self::digest(salt, plain) == digest,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_verifies() {
        let hasher = Sha256Hasher;
        let hashed = hasher.hash("hunter22-hunter22");
        assert!(hasher.verify("hunter22-hunter22", &hashed));
        assert!(!hasher.verify("hunter22-wrong", &hashed));
    }

    #[test]
    fn test_hashes_are_salted() {
        let hasher = Sha256Hasher;
        assert_ne!(hasher.hash("same-password"), hasher.hash("same-password"));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        let hasher = Sha256Hasher;
        assert!(!hasher.verify("anything", "no-separator-here"));
    }
}
