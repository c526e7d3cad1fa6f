// nestdb-core/src/sessions.rs
// ============================================================================
// Module: Sessions
// Description: Bearer-token session table with expiry.
// Purpose: Map tokens to usernames for request authentication.
// Dependencies: parking_lot, rand, thiserror
// ============================================================================

//! ## Overview
//! Sessions live only in process memory: logging in stores a fresh 128-bit
//! random token for one hour, tokens installed from a startup file last a
//! day, and a restart forgets everything. Validation parses the bearer
//! header, looks the token up, and fails closed on anything missing,
//! unknown, or expired.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::Duration;
use std::time::Instant;

use parking_lot::Mutex;
use rand::RngCore;
use rand::rngs::OsRng;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Lifetime of a session created by login.
pub const LOGIN_TTL: Duration = Duration::from_secs(60 * 60);
/// Lifetime of a session installed from the startup token file.
pub const INSTALLED_TTL: Duration = Duration::from_secs(24 * 60 * 60);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Bearer validation failures; all map to 401 at the boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// No `Authorization: Bearer <token>` header, or a malformed one.
    #[error("missing or malformed bearer token")]
    Malformed,
    /// The token is not in the session table.
    #[error("invalid bearer token")]
    Unknown,
    /// The token's session has expired.
    #[error("expired bearer token")]
    Expired,
}

// ============================================================================
// SECTION: Session Table
// ============================================================================

/// One authenticated session.
#[derive(Debug, Clone)]
struct Session {
    /// Username the token was issued to.
    username: String,
    /// Expiry instant; sessions are rejected at or after this point.
    expires_at: Instant,
}

/// Process-wide token-to-session map.
#[derive(Debug, Default)]
pub struct SessionTable {
    /// Sessions keyed by token.
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionTable {
    /// Creates an empty session table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a known token for `username` with the given lifetime.
    ///
    /// Used for the startup token file; later installs for the same token
    /// replace the earlier session.
    pub fn install(&self, username: &str, token: &str, ttl: Duration) {
        self.sessions.lock().insert(
            token.to_string(),
            Session {
                username: username.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Starts a session for `username` and returns its fresh token.
    pub fn login(&self, username: &str) -> String {
        let token = generate_token();
        self.install(username, &token, LOGIN_TTL);
        token
    }

    /// Ends the session behind `token`. Returns false when unknown.
    pub fn logout(&self, token: &str) -> bool {
        self.sessions.lock().remove(token).is_some()
    }

    /// Validates an `Authorization` header value and returns the username.
    pub fn validate_bearer(&self, header: Option<&str>) -> Result<String, SessionError> {
        let header = header.ok_or(SessionError::Malformed)?;
        let token = header
            .strip_prefix("Bearer ")
            .filter(|token| !token.is_empty())
            .ok_or(SessionError::Malformed)?;
        let sessions = self.sessions.lock();
        let session = sessions.get(token).ok_or(SessionError::Unknown)?;
        if session.expires_at <= Instant::now() {
            return Err(SessionError::Expired);
        }
        Ok(session.username.clone())
    }

    /// The raw token out of an `Authorization` header, if well formed.
    #[must_use]
    pub fn bearer_token(header: Option<&str>) -> Option<&str> {
        header?.strip_prefix("Bearer ").filter(|token| !token.is_empty())
    }
}

// ============================================================================
// SECTION: Token Generation
// ============================================================================

/// 128 bits of OS randomness as a 32-character lower-hex string.
///
/// Shared with POST document naming, which needs the same collision
/// resistance.
#[must_use]
pub fn generate_token() -> String {
    let mut bytes = [0_u8; 16];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().fold(String::with_capacity(32), |mut token, byte| {
        let _ = write!(token, "{byte:02x}");
        token
    })
}
