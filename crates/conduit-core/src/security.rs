//! Payload confidentiality and request signing.
//!
//! Both the dispatcher and the session route every payload through a
//! [`SecurityProvider`]. Failures are soft: `encrypt`/`decrypt` return an
//! empty string instead of an error, and every caller treats an empty
//! decryption as a parsing failure. [`SecurityProvider::try_decrypt`] is
//! the checked form of that contract.

use std::fmt::Write as _;

use sha2::{Digest, Sha256};

use crate::Params;

/// Parameter excluded from its own signature input.
const SIGN_KEY: &str = "sign";

/// Pluggable payload cipher and request signer.
pub trait SecurityProvider: Send + Sync {
    /// Encrypt `plaintext`. Returns an empty string on failure.
    fn encrypt(&self, plaintext: &str) -> String;

    /// Inverse of [`encrypt`](Self::encrypt). Returns an empty string on
    /// failure.
    fn decrypt(&self, ciphertext: &str) -> String;

    /// Deterministic signature over `params`, in their iteration order,
    /// and the provider's shared secret.
    fn generate_sign(&self, params: &Params) -> String;

    /// `decrypt`, with the empty result mapped to `None`.
    fn try_decrypt(&self, ciphertext: &str) -> Option<String> {
        let plaintext = self.decrypt(ciphertext);
        (!plaintext.is_empty()).then_some(plaintext)
    }
}

/// Shared-secret provider used when the host does not plug in its own.
///
/// The cipher shifts every Unicode scalar value by a keystream derived
/// from SHA-256 of the secret, skipping the surrogate gap. It is a
/// bijection on strings, so encrypt and decrypt are inverses in both
/// directions. It hides payloads from casual inspection only; hosts that
/// need authenticated encryption supply their own provider.
///
/// Signatures are the lowercase hex SHA-256 of
/// `k1=v1&k2=v2&...&key=<secret>` over every parameter except `sign`.
pub struct SharedSecretCipher {
    secret: String,
    keystream: [u8; 32],
}

const SURROGATE_START: u32 = 0xD800;
const SURROGATE_LEN: u32 = 0x800;
const SCALAR_COUNT: u32 = 0x11_0000 - SURROGATE_LEN;

impl SharedSecretCipher {
    pub fn new(secret: impl Into<String>) -> Self {
        let secret = secret.into();
        let digest = Sha256::digest(secret.as_bytes());
        let mut keystream = [0u8; 32];
        keystream.copy_from_slice(&digest);
        Self { secret, keystream }
    }

    fn shift_at(&self, position: usize) -> u32 {
        u32::from(self.keystream[position % self.keystream.len()]) + 1
    }

    fn rotate(&self, text: &str, forward: bool) -> String {
        text.chars()
            .enumerate()
            .map(|(i, c)| {
                let shift = self.shift_at(i);
                let index = scalar_to_index(c);
                let moved = if forward {
                    (index + shift) % SCALAR_COUNT
                } else {
                    (index + SCALAR_COUNT - shift) % SCALAR_COUNT
                };
                index_to_scalar(moved)
            })
            .collect::<Option<String>>()
            .unwrap_or_else(|| {
                tracing::warn!("cipher produced an invalid scalar value");
                String::new()
            })
    }
}

impl std::fmt::Debug for SharedSecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSecretCipher").finish_non_exhaustive()
    }
}

fn scalar_to_index(c: char) -> u32 {
    let v = u32::from(c);
    if v < SURROGATE_START { v } else { v - SURROGATE_LEN }
}

fn index_to_scalar(index: u32) -> Option<char> {
    let v = if index < SURROGATE_START {
        index
    } else {
        index + SURROGATE_LEN
    };
    char::from_u32(v)
}

impl SecurityProvider for SharedSecretCipher {
    fn encrypt(&self, plaintext: &str) -> String {
        self.rotate(plaintext, true)
    }

    fn decrypt(&self, ciphertext: &str) -> String {
        self.rotate(ciphertext, false)
    }

    fn generate_sign(&self, params: &Params) -> String {
        let mut input = String::new();
        for (key, value) in params.iter().filter(|(k, _)| *k != SIGN_KEY) {
            let _ = write!(input, "{key}={value}&");
        }
        let _ = write!(input, "key={}", self.secret);

        let mut hasher = Sha256::new();
        hasher.update(input.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
