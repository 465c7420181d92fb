//! One-time invitation tokens. The plaintext goes to the user exactly once;
//! only its SHA-256 digest is persisted.

use sha2::{Digest, Sha256};
use uuid::Uuid;

pub struct InvitationToken {
    pub plaintext: String,
    pub hash: String,
}

pub fn new_token() -> InvitationToken {
    let plaintext = Uuid::new_v4().to_string();
    let hash = hash_token(&plaintext);
    InvitationToken { plaintext, hash }
}

pub fn hash_token(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}
