// ============================================
// File: crates/slashauth-core/src/crypto/kdf.rs
// ============================================
//! # Key Derivation Functions
//!
//! ## Main Functionality
//! - `derive_channel_keys`: two directional keys from the X25519 output
//! - `hkdf_expand`: raw HKDF-SHA256 expansion
//!
//! ## Info Layout
//! ```text
//! label || initiator_static || responder_static || initiator_eph || responder_eph
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Directional channel keys

use hkdf::Hkdf;
use sha2::Sha256;
use tracing::trace;
use zeroize::Zeroize;

use super::{
    CHACHA20_KEY_SIZE, ED25519_PUBLIC_KEY_SIZE, HKDF_LABEL_INITIATOR, HKDF_LABEL_RESPONDER,
    HKDF_SALT, X25519_PUBLIC_KEY_SIZE,
};
use crate::crypto::SessionKey;
use crate::error::{CoreError, Result};

// ============================================
// Key Derivation
// ============================================

/// Public values bound into the channel keys.
#[derive(Debug, Clone, Copy)]
pub struct Transcript<'a> {
    /// Initiator's Ed25519 key
    pub initiator_static: &'a [u8; ED25519_PUBLIC_KEY_SIZE],
    /// Responder's Ed25519 key
    pub responder_static: &'a [u8; ED25519_PUBLIC_KEY_SIZE],
    /// Initiator's X25519 ephemeral key
    pub initiator_ephemeral: &'a [u8; X25519_PUBLIC_KEY_SIZE],
    /// Responder's X25519 ephemeral key
    pub responder_ephemeral: &'a [u8; X25519_PUBLIC_KEY_SIZE],
}

/// Directional keys of one channel.
#[derive(Debug)]
pub struct ChannelKeys {
    /// Protects initiator→responder frames
    pub initiator_to_responder: SessionKey,
    /// Protects responder→initiator frames
    pub responder_to_initiator: SessionKey,
}

/// Derives both directional keys from the X25519 shared secret.
///
/// The two keys differ only by label, so swapping the direction of a
/// frame makes it fail authentication.
pub fn derive_channel_keys(shared_secret: &[u8; 32], transcript: &Transcript<'_>) -> Result<ChannelKeys> {
    let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), shared_secret);

    let expand = |label: &[u8]| -> Result<SessionKey> {
        let mut info = Vec::with_capacity(label.len() + ED25519_PUBLIC_KEY_SIZE * 2 + X25519_PUBLIC_KEY_SIZE * 2);
        info.extend_from_slice(label);
        info.extend_from_slice(transcript.initiator_static);
        info.extend_from_slice(transcript.responder_static);
        info.extend_from_slice(transcript.initiator_ephemeral);
        info.extend_from_slice(transcript.responder_ephemeral);

        let mut key_bytes = [0u8; CHACHA20_KEY_SIZE];
        let result = hk.expand(&info, &mut key_bytes);
        info.zeroize();
        result.map_err(|_| CoreError::KeyDerivation {
            reason: "HKDF expansion failed".into(),
        })?;
        Ok(SessionKey::from_bytes(key_bytes))
    };

    let keys = ChannelKeys {
        initiator_to_responder: expand(HKDF_LABEL_INITIATOR)?,
        responder_to_initiator: expand(HKDF_LABEL_RESPONDER)?,
    };
    trace!("Channel keys derived");
    Ok(keys)
}

/// Derives `output_len` bytes of key material.
///
/// # Errors
/// `KeyDerivation` if `output_len` exceeds 255 * 32 bytes.
pub fn hkdf_expand(
    shared_secret: &[u8],
    salt: &[u8],
    info: &[u8],
    output_len: usize,
) -> Result<Vec<u8>> {
    let hk = Hkdf::<Sha256>::new(Some(salt), shared_secret);

    let mut output = vec![0u8; output_len];
    hk.expand(info, &mut output)
        .map_err(|_| CoreError::KeyDerivation {
            reason: format!("HKDF expansion failed for {output_len} bytes"),
        })?;

    Ok(output)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript<'a>(
        a: &'a [u8; 32],
        b: &'a [u8; 32],
        c: &'a [u8; 32],
        d: &'a [u8; 32],
    ) -> Transcript<'a> {
        Transcript {
            initiator_static: a,
            responder_static: b,
            initiator_ephemeral: c,
            responder_ephemeral: d,
        }
    }

    #[test]
    fn test_directional_keys_differ() {
        let shared = [0x42u8; 32];
        let keys = derive_channel_keys(&shared, &transcript(&[1; 32], &[2; 32], &[3; 32], &[4; 32])).unwrap();
        assert_ne!(keys.initiator_to_responder, keys.responder_to_initiator);
        assert_ne!(keys.initiator_to_responder.as_bytes(), &[0u8; 32]);
    }

    #[test]
    fn test_derivation_deterministic() {
        let shared = [0x42u8; 32];
        let t = transcript(&[1; 32], &[2; 32], &[3; 32], &[4; 32]);
        let k1 = derive_channel_keys(&shared, &t).unwrap();
        let k2 = derive_channel_keys(&shared, &t).unwrap();
        assert_eq!(k1.initiator_to_responder, k2.initiator_to_responder);
        assert_eq!(k1.responder_to_initiator, k2.responder_to_initiator);
    }

    #[test]
    fn test_transcript_binding() {
        let shared = [0x42u8; 32];
        let base = derive_channel_keys(&shared, &transcript(&[1; 32], &[2; 32], &[3; 32], &[4; 32])).unwrap();
        let swapped = derive_channel_keys(&shared, &transcript(&[2; 32], &[1; 32], &[3; 32], &[4; 32])).unwrap();
        let new_eph = derive_channel_keys(&shared, &transcript(&[1; 32], &[2; 32], &[3; 32], &[5; 32])).unwrap();

        assert_ne!(base.initiator_to_responder, swapped.initiator_to_responder);
        assert_ne!(base.initiator_to_responder, new_eph.initiator_to_responder);
    }

    #[test]
    fn test_hkdf_expand() {
        let output = hkdf_expand(&[0x42u8; 32], b"test-salt", b"test-info", 64).unwrap();
        assert_eq!(output.len(), 64);
        assert!(hkdf_expand(&[0x42u8; 32], b"s", b"i", 255 * 32 + 1).is_err());
    }
}
