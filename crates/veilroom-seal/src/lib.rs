//! Client-side hybrid encryption for Veilroom.
//!
//! The relay forwards ciphertext without looking at it. This crate is what
//! a client uses to produce and consume that ciphertext:
//!
//! - [`seal`] encrypts a message once under a random content key and wraps
//!   that key for every recipient, producing a [`SealedPayload`] for an
//!   addressed `message`.
//! - [`open`] unwraps the caller's entry and decrypts. A member with no
//!   entry in `keys` fails closed with [`SealError::MissingKey`].
//! - [`seal_directed`] / [`open_directed`] produce a single-recipient blob
//!   for directed messages (`message` with `to`).
//!
//! # Construction
//!
//! ```text
//! content:  ChaCha20-Poly1305(k, iv, plaintext)  → content, tag (detached)
//! wrap:     e ← fresh X25519 secret
//!           w = HKDF-SHA256(ikm = DH(e, R), info = label ‖ E ‖ R)
//!           keys[name] = base64(E ‖ ChaCha20-Poly1305(w, 0, k))
//! ```
//!
//! `E`/`R` are the ephemeral and recipient public keys. Every wrap key is
//! derived from a fresh ephemeral secret, so the all-zero nonce is never
//! reused under the same key.

mod error;

use std::collections::BTreeMap;
use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chacha20poly1305::{AeadInPlace, ChaCha20Poly1305, Key, KeyInit, Nonce, Tag};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use x25519_dalek::{PublicKey as DhPublicKey, StaticSecret};

pub use error::SealError;
pub use veilroom_protocol::{PublicKey, SealedPayload};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

const WRAP_INFO: &[u8] = b"veilroom-wrap";
const DIRECT_INFO: &[u8] = b"veilroom-direct";

/// Wrapped keys are only ever used once per derived key.
const ZERO_NONCE: [u8; NONCE_LEN] = [0; NONCE_LEN];

// ---------------------------------------------------------------------------
// KeyPair
// ---------------------------------------------------------------------------

/// A client's long-term X25519 key pair.
///
/// The public half is what the client sends as `publicKey` on `username`.
pub struct KeyPair {
    secret: StaticSecret,
    public: DhPublicKey,
}

impl KeyPair {
    /// Generates a fresh key pair from the thread-local CSPRNG.
    pub fn generate() -> Self {
        Self::from_secret_bytes(random_bytes())
    }

    /// Rebuilds a key pair from stored secret bytes.
    pub fn from_secret_bytes(bytes: [u8; KEY_LEN]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = DhPublicKey::from(&secret);
        Self { secret, public }
    }

    /// Returns the public key in its wire form (standard base64).
    pub fn public_key(&self) -> PublicKey {
        PublicKey(STANDARD.encode(self.public.as_bytes()))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public_key().0)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Addressed messages
// ---------------------------------------------------------------------------

/// Encrypts `plaintext` once and wraps the content key for each entry of
/// `recipients` (identity → public key).
///
/// # Errors
/// - [`SealError::EmptyPlaintext`] / [`SealError::NoRecipients`]
/// - [`SealError::Encoding`] / [`SealError::Length`] for a malformed
///   recipient key, [`SealError::WeakPublicKey`] for a degenerate one
pub fn seal(
    plaintext: &str,
    recipients: &BTreeMap<String, PublicKey>,
) -> Result<SealedPayload, SealError> {
    if plaintext.is_empty() {
        return Err(SealError::EmptyPlaintext);
    }
    if recipients.is_empty() {
        return Err(SealError::NoRecipients);
    }

    let content_key: [u8; KEY_LEN] = random_bytes();
    let iv: [u8; NONCE_LEN] = random_bytes();

    let mut content = plaintext.as_bytes().to_vec();
    let tag = cipher(&content_key)
        .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut content)
        .map_err(|_| SealError::Encrypt)?;

    let keys = recipients
        .iter()
        .map(|(name, public_key)| {
            Ok((name.clone(), wrap_content_key(&content_key, public_key)?))
        })
        .collect::<Result<BTreeMap<_, _>, SealError>>()?;

    Ok(SealedPayload {
        iv: STANDARD.encode(iv),
        tag: STANDARD.encode(tag),
        content: STANDARD.encode(content),
        keys,
    })
}

/// Decrypts an addressed payload as `identity`.
///
/// # Errors
/// - [`SealError::MissingKey`]: the payload wasn't addressed to `identity`
/// - [`SealError::Decrypt`]: wrong key pair or tampered payload
pub fn open(
    payload: &SealedPayload,
    identity: &str,
    keypair: &KeyPair,
) -> Result<String, SealError> {
    let wrapped = payload
        .keys
        .get(identity)
        .ok_or_else(|| SealError::MissingKey(identity.to_string()))?;
    let content_key = unwrap_content_key(wrapped, keypair)?;

    let iv: [u8; NONCE_LEN] = decode_array("iv", &payload.iv)?;
    let tag: [u8; TAG_LEN] = decode_array("tag", &payload.tag)?;
    let mut content = decode("content", &payload.content)?;

    cipher(&content_key)
        .decrypt_in_place_detached(
            Nonce::from_slice(&iv),
            b"",
            &mut content,
            Tag::from_slice(&tag),
        )
        .map_err(|_| SealError::Decrypt)?;

    Ok(String::from_utf8(content)?)
}

fn wrap_content_key(
    content_key: &[u8; KEY_LEN],
    recipient: &PublicKey,
) -> Result<String, SealError> {
    let recipient = parse_public_key(recipient)?;
    let (ephemeral, wrap_key) = agree_ephemeral(&recipient, WRAP_INFO)?;
    let sealed = seal_box(&wrap_key, content_key)?;
    Ok(encode_with_ephemeral(&ephemeral, &sealed))
}

fn unwrap_content_key(
    wrapped: &str,
    keypair: &KeyPair,
) -> Result<[u8; KEY_LEN], SealError> {
    let bytes = decode("keys", wrapped)?;
    let expected = KEY_LEN + KEY_LEN + TAG_LEN;
    if bytes.len() != expected {
        return Err(SealError::Length {
            field: "keys",
            expected,
            actual: bytes.len(),
        });
    }

    let (ephemeral, sealed) = split_ephemeral("keys", &bytes)?;
    let wrap_key = agree_static(keypair, &ephemeral, WRAP_INFO)?;
    let content_key = open_box(&wrap_key, sealed)?;
    <[u8; KEY_LEN]>::try_from(content_key.as_slice()).map_err(|_| {
        SealError::Length {
            field: "keys",
            expected: KEY_LEN,
            actual: content_key.len(),
        }
    })
}

// ---------------------------------------------------------------------------
// Directed messages
// ---------------------------------------------------------------------------

/// Encrypts `plaintext` for exactly one recipient.
///
/// The result is a single base64 string, meant for the `content` of a
/// directed `message`.
pub fn seal_directed(
    plaintext: &str,
    recipient: &PublicKey,
) -> Result<String, SealError> {
    if plaintext.is_empty() {
        return Err(SealError::EmptyPlaintext);
    }
    let recipient = parse_public_key(recipient)?;
    let (ephemeral, key) = agree_ephemeral(&recipient, DIRECT_INFO)?;
    let sealed = seal_box(&key, plaintext.as_bytes())?;
    Ok(encode_with_ephemeral(&ephemeral, &sealed))
}

/// Decrypts a blob produced by [`seal_directed`].
pub fn open_directed(blob: &str, keypair: &KeyPair) -> Result<String, SealError> {
    let bytes = decode("content", blob)?;
    if bytes.len() < KEY_LEN + TAG_LEN {
        return Err(SealError::Length {
            field: "content",
            expected: KEY_LEN + TAG_LEN,
            actual: bytes.len(),
        });
    }

    let (ephemeral, sealed) = split_ephemeral("content", &bytes)?;
    let key = agree_static(keypair, &ephemeral, DIRECT_INFO)?;
    let plaintext = open_box(&key, sealed)?;
    Ok(String::from_utf8(plaintext)?)
}

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}

fn cipher(key: &[u8; KEY_LEN]) -> ChaCha20Poly1305 {
    ChaCha20Poly1305::new(Key::from_slice(key))
}

/// Encrypts under a single-use key; output is `ciphertext ‖ tag`.
fn seal_box(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<Vec<u8>, SealError> {
    let mut buffer = plaintext.to_vec();
    cipher(key)
        .encrypt_in_place(Nonce::from_slice(&ZERO_NONCE), b"", &mut buffer)
        .map_err(|_| SealError::Encrypt)?;
    Ok(buffer)
}

fn open_box(key: &[u8; KEY_LEN], sealed: &[u8]) -> Result<Vec<u8>, SealError> {
    let mut buffer = sealed.to_vec();
    cipher(key)
        .decrypt_in_place(Nonce::from_slice(&ZERO_NONCE), b"", &mut buffer)
        .map_err(|_| SealError::Decrypt)?;
    Ok(buffer)
}

/// Sender side: fresh ephemeral secret, agreement with `recipient`.
fn agree_ephemeral(
    recipient: &DhPublicKey,
    label: &[u8],
) -> Result<(DhPublicKey, [u8; KEY_LEN]), SealError> {
    let ephemeral = StaticSecret::from(random_bytes::<KEY_LEN>());
    let ephemeral_public = DhPublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(recipient);
    if !shared.was_contributory() {
        return Err(SealError::WeakPublicKey);
    }
    let key = derive_key(shared.as_bytes(), label, &ephemeral_public, recipient)?;
    Ok((ephemeral_public, key))
}

/// Recipient side: agreement between our secret and the sender's ephemeral.
fn agree_static(
    keypair: &KeyPair,
    ephemeral: &DhPublicKey,
    label: &[u8],
) -> Result<[u8; KEY_LEN], SealError> {
    let shared = keypair.secret.diffie_hellman(ephemeral);
    if !shared.was_contributory() {
        return Err(SealError::WeakPublicKey);
    }
    derive_key(shared.as_bytes(), label, ephemeral, &keypair.public)
}

fn derive_key(
    shared: &[u8],
    label: &[u8],
    ephemeral: &DhPublicKey,
    recipient: &DhPublicKey,
) -> Result<[u8; KEY_LEN], SealError> {
    let mut info = Vec::with_capacity(label.len() + 2 * KEY_LEN);
    info.extend_from_slice(label);
    info.extend_from_slice(ephemeral.as_bytes());
    info.extend_from_slice(recipient.as_bytes());

    let mut okm = [0u8; KEY_LEN];
    Hkdf::<Sha256>::new(None, shared)
        .expand(&info, &mut okm)
        .map_err(|_| SealError::KeyDerivation)?;
    Ok(okm)
}

fn encode_with_ephemeral(ephemeral: &DhPublicKey, sealed: &[u8]) -> String {
    let mut out = Vec::with_capacity(KEY_LEN + sealed.len());
    out.extend_from_slice(ephemeral.as_bytes());
    out.extend_from_slice(sealed);
    STANDARD.encode(out)
}

fn split_ephemeral<'a>(
    field: &'static str,
    bytes: &'a [u8],
) -> Result<(DhPublicKey, &'a [u8]), SealError> {
    let (head, rest) = bytes.split_at(KEY_LEN.min(bytes.len()));
    let head = <[u8; KEY_LEN]>::try_from(head).map_err(|_| SealError::Length {
        field,
        expected: KEY_LEN,
        actual: bytes.len(),
    })?;
    Ok((DhPublicKey::from(head), rest))
}

fn parse_public_key(key: &PublicKey) -> Result<DhPublicKey, SealError> {
    decode_array::<KEY_LEN>("publicKey", key.as_str()).map(DhPublicKey::from)
}

fn decode(field: &'static str, value: &str) -> Result<Vec<u8>, SealError> {
    STANDARD
        .decode(value)
        .map_err(|source| SealError::Encoding { field, source })
}

fn decode_array<const N: usize>(
    field: &'static str,
    value: &str,
) -> Result<[u8; N], SealError> {
    let bytes = decode(field, value)?;
    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| SealError::Length {
        field,
        expected: N,
        actual: bytes.len(),
    })
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(members: &[(&str, &KeyPair)]) -> BTreeMap<String, PublicKey> {
        members
            .iter()
            .map(|(name, kp)| (name.to_string(), kp.public_key()))
            .collect()
    }

    #[test]
    fn test_seal_open_for_each_recipient() {
        let (bob, carol) = (KeyPair::generate(), KeyPair::generate());
        let payload =
            seal("meet at noon", &roster(&[("bob", &bob), ("carol", &carol)]))
                .unwrap();

        assert_eq!(open(&payload, "bob", &bob).unwrap(), "meet at noon");
        assert_eq!(open(&payload, "carol", &carol).unwrap(), "meet at noon");
    }

    #[test]
    fn test_open_without_entry_fails_closed() {
        let (bob, dave) = (KeyPair::generate(), KeyPair::generate());
        let payload = seal("secret", &roster(&[("bob", &bob)])).unwrap();

        let result = open(&payload, "dave", &dave);
        assert!(matches!(result, Err(SealError::MissingKey(ref n)) if n == "dave"));
    }

    #[test]
    fn test_open_with_someone_elses_entry_fails() {
        let (bob, dave) = (KeyPair::generate(), KeyPair::generate());
        let payload = seal("secret", &roster(&[("bob", &bob)])).unwrap();

        // Dave claims to be bob but holds the wrong secret.
        assert!(matches!(open(&payload, "bob", &dave), Err(SealError::Decrypt)));
    }

    #[test]
    fn test_open_tampered_content_fails() {
        let bob = KeyPair::generate();
        let mut payload = seal("secret", &roster(&[("bob", &bob)])).unwrap();

        let mut content = STANDARD.decode(&payload.content).unwrap();
        content[0] ^= 0x01;
        payload.content = STANDARD.encode(content);

        assert!(matches!(open(&payload, "bob", &bob), Err(SealError::Decrypt)));
    }

    #[test]
    fn test_seal_field_sizes() {
        let bob = KeyPair::generate();
        let payload = seal("hi", &roster(&[("bob", &bob)])).unwrap();

        assert_eq!(STANDARD.decode(&payload.iv).unwrap().len(), NONCE_LEN);
        assert_eq!(STANDARD.decode(&payload.tag).unwrap().len(), TAG_LEN);
        assert_eq!(STANDARD.decode(&payload.content).unwrap().len(), 2);
        assert_eq!(
            STANDARD.decode(&payload.keys["bob"]).unwrap().len(),
            KEY_LEN + KEY_LEN + TAG_LEN
        );
    }

    #[test]
    fn test_seal_rejects_empty_input() {
        let bob = KeyPair::generate();
        assert!(matches!(
            seal("", &roster(&[("bob", &bob)])),
            Err(SealError::EmptyPlaintext)
        ));
        assert!(matches!(
            seal("hi", &BTreeMap::new()),
            Err(SealError::NoRecipients)
        ));
    }

    #[test]
    fn test_seal_rejects_malformed_recipient_key() {
        let recipients =
            BTreeMap::from([("bob".to_string(), PublicKey::from("not base64!"))]);
        assert!(matches!(
            seal("hi", &recipients),
            Err(SealError::Encoding { field: "publicKey", .. })
        ));

        let short = BTreeMap::from([("bob".to_string(), PublicKey::from("QUJD"))]);
        assert!(matches!(
            seal("hi", &short),
            Err(SealError::Length { expected: KEY_LEN, actual: 3, .. })
        ));
    }

    #[test]
    fn test_seal_rejects_low_order_key() {
        let zero = PublicKey(STANDARD.encode([0u8; KEY_LEN]));
        let recipients = BTreeMap::from([("bob".to_string(), zero)]);
        assert!(matches!(seal("hi", &recipients), Err(SealError::WeakPublicKey)));
    }

    #[test]
    fn test_directed_round_trip_and_wrong_recipient() {
        let (bob, carol) = (KeyPair::generate(), KeyPair::generate());
        let blob = seal_directed("just for bob", &bob.public_key()).unwrap();

        assert_eq!(open_directed(&blob, &bob).unwrap(), "just for bob");
        assert!(matches!(open_directed(&blob, &carol), Err(SealError::Decrypt)));
    }

    #[test]
    fn test_open_directed_short_blob() {
        let bob = KeyPair::generate();
        let result = open_directed(&STANDARD.encode([1u8; 10]), &bob);
        assert!(matches!(result, Err(SealError::Length { field: "content", .. })));
    }

    #[test]
    fn test_keypair_from_secret_bytes_is_deterministic() {
        let a = KeyPair::from_secret_bytes([7; KEY_LEN]);
        let b = KeyPair::from_secret_bytes([7; KEY_LEN]);
        assert_eq!(a.public_key(), b.public_key());
        assert!(!format!("{a:?}").contains("secret:"));
    }

    #[test]
    fn test_payload_survives_json() {
        let bob = KeyPair::generate();
        let payload = seal("over the wire", &roster(&[("bob", &bob)])).unwrap();

        let json = serde_json::to_string(&payload).unwrap();
        let decoded: SealedPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(open(&decoded, "bob", &bob).unwrap(), "over the wire");
    }
}
