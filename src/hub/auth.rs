//! Signed-challenge authentication for hubs that require it. The client asks
//! for a challenge, signs it with its API secret, and echoes the signature
//! back as part of negotiation before the websocket is opened.

use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub api_key: String,
    pub challenge: String,
}

/// Signs `challenge` with `api_secret` using HMAC-SHA-512, rendered as
/// uppercase hex with no separators.
pub fn sign(api_secret: &str, challenge: &str) -> String {
    let mut mac = HmacSha512::new_from_slice(api_secret.as_bytes()).expect("HMAC accepts a key of any length");
    mac.update(challenge.as_bytes());
    let digest = mac.finalize().into_bytes();
    hex::encode_upper(digest)
}

/// Produces the `{apiKey, signature}` pair to send as the authenticate
/// invocation's arguments for a given [`AuthContext`].
pub fn authenticate_args(api_secret: &str, context: &AuthContext) -> (String, String) {
    (context.api_key.clone(), sign(api_secret, &context.challenge))
}
