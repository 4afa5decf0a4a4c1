use anyhow::{Result, anyhow};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};

// Keep provider request/response plain Rust structs to avoid serde requirements on Session
use crate::tprintln;

use super::principal::{Attrs, Principal};
use super::session::{Session, SessionManager};
use crate::store::SharedDirectory;

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!(e.to_string()))?
        .to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else {
        false
    }
}

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub ip: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub session: Session,
}

pub trait AuthProvider: Send + Sync {
    fn login(&self, req: &LoginRequest) -> Result<LoginResponse>;
}

/// Login against the directory's user table: Argon2 verify, then snapshot the
/// role set and profile attributes into the issued Principal.
pub struct DirectoryAuthProvider {
    pub dir: SharedDirectory,
    pub sm: SessionManager,
}

impl DirectoryAuthProvider {
    pub fn new(dir: SharedDirectory, sm: SessionManager) -> Self {
        Self { dir, sm }
    }
}

impl AuthProvider for DirectoryAuthProvider {
    fn login(&self, req: &LoginRequest) -> Result<LoginResponse> {
        let Some(user) = self.dir.find_user(&req.username)? else {
            return Err(anyhow!("invalid_credentials"));
        };
        if !verify_password(&user.password_hash, &req.password) {
            return Err(anyhow!("invalid_credentials"));
        }
        let roles = self.dir.roles_for_user(&user.user_id)?;
        let principal = Principal {
            user_id: user.user_id.clone(),
            roles,
            attrs: Attrs { email: user.email, phone: user.phone, ip: req.ip.clone() },
        };
        let session = self.sm.issue(principal)?;
        tprintln!("auth.login user={} sid={}", user.user_id, session.session_id);
        Ok(LoginResponse { session })
    }
}
