use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims carried by the session token. Role is deliberately absent: it is
/// re-read from storage on every request so role changes apply immediately.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,   // user ID
    pub exp: usize,  // expiration time
    pub iat: usize,  // issued at
    pub iss: String, // issuer
    pub aud: String, // audience
}
