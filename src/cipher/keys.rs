//! Sub-key derivation and lazy secret resolution
//!
//! One caller-supplied secret fans out into two independent 32-byte
//! sub-keys: one for encryption, one for signing. Never use the master
//! secret directly for either job.

use crate::error::Result;
use futures::future::BoxFuture;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

type HmacSha256 = Hmac<Sha256>;

/// Domain-separation tag for the encryption sub-key
const ENCRYPTION_TAG: u8 = 0x01;
/// Domain-separation tag for the signing sub-key
const SIGNING_TAG: u8 = 0x02;

/// The two sub-keys the token cipher needs
#[derive(Clone, PartialEq, Eq)]
pub struct SubKeys {
    /// AES-256 key
    pub(crate) encryption: [u8; 32],
    /// HMAC-SHA256 key
    pub(crate) signing: [u8; 32],
}

impl fmt::Debug for SubKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubKeys")
            .field("encryption", &"[redacted]")
            .field("signing", &"[redacted]")
            .finish()
    }
}

/// Derive the encryption and signing sub-keys from one secret.
///
/// Pure and deterministic: the same secret always yields the same pair.
pub fn derive_sub_keys(secret: &[u8]) -> SubKeys {
    SubKeys {
        encryption: prf(secret, ENCRYPTION_TAG),
        signing: prf(secret, SIGNING_TAG),
    }
}

fn prf(secret: &[u8], tag: u8) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(&[tag]);
    mac.finalize().into_bytes().into()
}

/// Future-producing closure that resolves the secret on demand
pub type SecretProvider = Arc<dyn Fn() -> BoxFuture<'static, Result<Vec<u8>>> + Send + Sync>;

/// The master secret, supplied eagerly or resolved lazily.
///
/// A provider is awaited at most once per owning `Paginator`, on the first
/// operation that needs the sub-keys.
#[derive(Clone)]
pub enum Secret {
    /// Raw secret bytes
    Bytes(Vec<u8>),
    /// Deferred secret, fetched on first use
    Provider(SecretProvider),
}

impl Secret {
    /// Create a lazy secret from an async closure
    pub fn provider<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<u8>>> + Send + 'static,
    {
        Self::Provider(Arc::new(move || Box::pin(f())))
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(_) => f.write_str("Secret::Bytes([redacted])"),
            Self::Provider(_) => f.write_str("Secret::Provider(..)"),
        }
    }
}

impl From<Vec<u8>> for Secret {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for Secret {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<&str> for Secret {
    fn from(secret: &str) -> Self {
        Self::Bytes(secret.as_bytes().to_vec())
    }
}

impl From<String> for Secret {
    fn from(secret: String) -> Self {
        Self::Bytes(secret.into_bytes())
    }
}

/// Memoized sub-key resolution for one secret.
///
/// Shared by every pager and scanner a `Paginator` produces; the derivation
/// runs once, concurrent initializers are deduplicated, and the result is
/// cached for the lifetime of the owner.
#[derive(Debug)]
pub struct KeyCache {
    secret: Secret,
    keys: OnceCell<SubKeys>,
}

impl KeyCache {
    /// Create a cache around a secret
    pub fn new(secret: Secret) -> Self {
        Self {
            secret,
            keys: OnceCell::new(),
        }
    }

    /// Resolve the sub-keys, deriving them on first call
    pub async fn sub_keys(&self) -> Result<&SubKeys> {
        self.keys
            .get_or_try_init(|| async {
                let material = match &self.secret {
                    Secret::Bytes(bytes) => bytes.clone(),
                    Secret::Provider(provider) => provider().await?,
                };
                Ok(derive_sub_keys(&material))
            })
            .await
    }

    /// The cached sub-keys, if already resolved
    pub fn resolved(&self) -> Option<&SubKeys> {
        self.keys.get()
    }
}
