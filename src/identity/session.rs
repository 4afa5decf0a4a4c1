use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use base64::Engine;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::tprintln;

use super::principal::Principal;

pub type SessionToken = String;

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub token: SessionToken,
    pub principal: Principal,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

// Process-wide registry keyed by token. Revoked tokens stay tombstoned so a
// logged-out token can never validate again within the process lifetime.
static REGISTRY: Lazy<RwLock<HashMap<String, Session>>> = Lazy::new(|| RwLock::new(HashMap::new()));
static REVOKED: Lazy<RwLock<HashSet<String>>> = Lazy::new(|| RwLock::new(HashSet::new()));

// Token generation must not silently fall back on a failed RNG: an all-zeros
// token would collide across users and sessions.
fn gen_token() -> Result<String> {
    // 256-bit random token, base64url without padding
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).map_err(|e| anyhow!(e.to_string()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

pub struct SessionManager {
    pub ttl: Duration,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self { ttl: Duration::from_secs(8 * 60 * 60) }
    }
}

impl SessionManager {
    pub fn issue(&self, principal: Principal) -> Result<Session> {
        let now = Instant::now();
        let sess = Session {
            session_id: Uuid::new_v4().to_string(),
            token: gen_token()?,
            principal,
            issued_at: now,
            expires_at: now + self.ttl,
        };
        REGISTRY.write().insert(sess.token.clone(), sess.clone());
        tprintln!(
            "session.issue user={} sid={} ttl_secs={}",
            sess.principal.user_id,
            sess.session_id,
            self.ttl.as_secs()
        );
        Ok(sess)
    }

    /// The principal behind a live token, pruning it when expired.
    pub fn validate(&self, token: &str) -> Option<Principal> {
        if REVOKED.read().contains(token) {
            return None;
        }
        let now = Instant::now();
        let expired = {
            let map = REGISTRY.read();
            match map.get(token) {
                Some(s) if s.expires_at > now => return Some(s.principal.clone()),
                Some(_) => true,
                None => false,
            }
        };
        if expired {
            REGISTRY.write().remove(token);
        }
        None
    }

    /// Convenience for the permission resolver's session step.
    pub fn current_user(&self, token: &str) -> Option<String> {
        self.validate(token).map(|p| p.user_id)
    }

    pub fn logout(&self, token: &str) -> bool {
        let removed = REGISTRY.write().remove(token).is_some();
        if removed {
            REVOKED.write().insert(token.to_string());
        }
        removed
    }

    /// Drop every live session belonging to a user; returns how many.
    pub fn revoke_user(&self, user_id: &str) -> usize {
        let tokens: Vec<String> = REGISTRY
            .read()
            .iter()
            .filter(|(_, s)| s.principal.user_id == user_id)
            .map(|(t, _)| t.clone())
            .collect();
        let mut reg = REGISTRY.write();
        let mut rev = REVOKED.write();
        let mut count = 0usize;
        for t in tokens {
            if reg.remove(&t).is_some() {
                count += 1;
            }
            rev.insert(t);
        }
        tprintln!("session.revoke user={} count={}", user_id, count);
        count
    }
}
