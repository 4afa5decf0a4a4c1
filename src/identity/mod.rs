//! Identity and session management for the CRM backend.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod provider;
mod session;

pub use principal::{Attrs, Principal};
pub use provider::{
    AuthProvider, DirectoryAuthProvider, LoginRequest, LoginResponse, hash_password,
    verify_password,
};
pub use session::{Session, SessionManager, SessionToken};
