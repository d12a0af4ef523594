//! Token cipher
//!
//! Authenticated encryption of continuation-key bytes into URL-safe opaque
//! tokens, and back. Encrypting (not merely encoding) the key prevents an
//! untrusted client from reading or tampering with partition/sort key
//! material when it resumes a query.
//!
//! # Token layout (before Base64-URL)
//!
//! ```text
//! +----------+--------------------------+---------------------+
//! | IV (16B) | AES-256-CBC/PKCS7 bytes  | HMAC tag (16B)      |
//! +----------+--------------------------+---------------------+
//! ```
//!
//! The tag is HMAC-SHA256 over `aad ‖ IV ‖ ciphertext ‖ be32(len(aad))`,
//! truncated to 16 bytes. The associated data binds a token to a
//! caller-supplied context (a user or session id, say) so tokens cannot be
//! replayed across contexts.
//!
//! Every failure on the decode path surfaces as the same `Error::Token`:
//! a bad signature is indistinguishable from bad padding or a truncated
//! token, which keeps this from becoming a padding oracle.

mod keys;

pub use keys::{derive_sub_keys, KeyCache, Secret, SecretProvider, SubKeys};

use crate::error::{Error, Result};
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Initialization vector length
const IV_LEN: usize = 16;
/// AES block length
const BLOCK_LEN: usize = 16;
/// Truncated HMAC tag length
const TAG_LEN: usize = 16;
/// Smallest well-formed token body: IV + one cipher block + tag
const MIN_DECODED_LEN: usize = IV_LEN + BLOCK_LEN + TAG_LEN;

/// Encrypt and sign a payload into an opaque token.
///
/// A fresh random IV is drawn per call; reusing one would break CBC
/// confidentiality.
pub fn seal(plaintext: &[u8], keys: &SubKeys, aad: &[u8]) -> String {
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::new(&keys.encryption.into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut body = Vec::with_capacity(IV_LEN + ciphertext.len() + TAG_LEN);
    body.extend_from_slice(&iv);
    body.extend_from_slice(&ciphertext);

    let tag = signature(keys, aad, &body);
    body.extend_from_slice(&tag[..TAG_LEN]);

    URL_SAFE_NO_PAD.encode(body)
}

/// Verify and decrypt a token back into its payload.
///
/// Fails uniformly with `Error::Token` on any malformed input, signature
/// mismatch, wrong context, or padding failure.
pub fn open(token: &str, keys: &SubKeys, aad: &[u8]) -> Result<Vec<u8>> {
    let decoded = URL_SAFE_NO_PAD.decode(token).map_err(|_| Error::Token)?;
    if decoded.len() < MIN_DECODED_LEN || (decoded.len() - TAG_LEN) % BLOCK_LEN != 0 {
        return Err(Error::Token);
    }

    let (body, tag) = decoded.split_at(decoded.len() - TAG_LEN);

    // Verify before touching the ciphertext; comparison is constant-time.
    let mut mac = HmacSha256::new_from_slice(&keys.signing).expect("HMAC accepts any key length");
    mac.update(aad);
    mac.update(body);
    mac.update(&(aad.len() as u32).to_be_bytes());
    mac.verify_truncated_left(tag).map_err(|_| Error::Token)?;

    let (iv, ciphertext) = body.split_at(IV_LEN);
    let iv: [u8; IV_LEN] = iv.try_into().map_err(|_| Error::Token)?;

    Aes256CbcDec::new(&keys.encryption.into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::Token)
}

fn signature(keys: &SubKeys, aad: &[u8], body: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(&keys.signing).expect("HMAC accepts any key length");
    mac.update(aad);
    mac.update(body);
    mac.update(&(aad.len() as u32).to_be_bytes());
    mac.finalize().into_bytes().into()
}
