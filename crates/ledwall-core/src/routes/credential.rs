// Admin pin check.
//
// Both sides are hashed with SHA-256 and the digests compared with
// `subtle`, so neither the length nor the content of the stored pin leaks
// through timing.

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub(crate) struct AdminPin {
    digest: [u8; 32],
}

impl AdminPin {
    pub(crate) fn new(secret: &SecretString) -> Self {
        Self {
            digest: Sha256::digest(secret.expose_secret().as_bytes()).into(),
        }
    }

    pub(crate) fn verify(&self, candidate: &str) -> bool {
        let candidate: [u8; 32] = Sha256::digest(candidate.as_bytes()).into();
        self.digest[..].ct_eq(&candidate[..]).into()
    }
}

impl std::fmt::Debug for AdminPin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AdminPin(<redacted>)")
    }
}
