// ============================================
// File: crates/slashauth-server/src/key_file.rs
// ============================================
//! # Server Key File
//!
//! The server's long-term Ed25519 identity on disk:
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "key_type": "ed25519",
//!   "public_key": "<base64>",
//!   "private_key": "<base64>",
//!   "created_at": "1700000000Z"
//! }
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Written with mode 0600 on Unix
//! - `public_key` is informational; the identity is rebuilt from
//!   `private_key` and the two are cross-checked on load

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use slashauth_common::time::Timestamp;
use slashauth_core::crypto::IdentityKeyPair;

use crate::error::{Result, ServerError};

/// On-disk key file format.
#[derive(Debug, Serialize, Deserialize)]
struct KeyFile {
    version: String,
    key_type: String,
    public_key: String,
    private_key: String,
    created_at: String,
}

/// Loads an identity from a JSON key file.
///
/// # Errors
/// `KeyFile` when the file is unreadable, malformed, or its public key
/// does not match the private key.
pub async fn load_key(path: impl AsRef<Path>) -> Result<IdentityKeyPair> {
    let path = path.as_ref();
    let path_str = path.display().to_string();

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ServerError::key_file(&path_str, e))?;
    let key_data: KeyFile =
        serde_json::from_str(&content).map_err(|e| ServerError::key_file(&path_str, e))?;

    if key_data.key_type != "ed25519" {
        return Err(ServerError::key_file(
            &path_str,
            format!("unsupported key type '{}'", key_data.key_type),
        ));
    }

    let private_bytes = BASE64
        .decode(&key_data.private_key)
        .map_err(|e| ServerError::key_file(&path_str, e))?;
    let identity = IdentityKeyPair::from_bytes(&private_bytes)
        .map_err(|e| ServerError::key_file(&path_str, e))?;

    if BASE64.encode(identity.public_key_bytes()) != key_data.public_key {
        return Err(ServerError::key_file(
            &path_str,
            "public key does not match private key",
        ));
    }

    Ok(identity)
}

/// Saves an identity to a JSON key file, creating parent directories.
///
/// # Errors
/// `KeyFile` on any I/O failure.
pub async fn save_key(identity: &IdentityKeyPair, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let path_str = path.display().to_string();

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ServerError::key_file(&path_str, e))?;
    }

    let key_data = KeyFile {
        version: "1.0".to_string(),
        key_type: "ed25519".to_string(),
        public_key: BASE64.encode(identity.public_key_bytes()),
        private_key: BASE64.encode(identity.to_bytes()),
        created_at: format!("{}Z", Timestamp::now().as_secs()),
    };

    let content =
        serde_json::to_string_pretty(&key_data).map_err(|e| ServerError::key_file(&path_str, e))?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| ServerError::key_file(&path_str, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(|e| ServerError::key_file(&path_str, e))?;
    }

    Ok(())
}
