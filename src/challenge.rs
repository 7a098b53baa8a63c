use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Computes the session password for a login challenge.
///
/// `password = hex(HMAC-SHA1(key = app_token, message = challenge))`, lowercase.
/// The app token itself never leaves the client.
#[must_use]
pub fn compute_password(app_token: &str, challenge: &str) -> String {
    let mut mac =
        HmacSha1::new_from_slice(app_token.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(challenge.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        assert_eq!(
            compute_password("secret", "abc123"),
            "8657345ce1d0a7304b31540a34ec4355a86c2b69"
        );
    }

    #[test]
    fn test_rfc_style_vector() {
        assert_eq!(
            compute_password("key", "The quick brown fox jumps over the lazy dog"),
            "de7c9b85b8b78aa6bc8a7a36f70a90701c9db4d9"
        );
    }

    #[test]
    fn test_lowercase_hex_of_sha1_length() {
        let password = compute_password("token", "challenge");
        assert_eq!(password.len(), 40);
        assert!(
            password
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)),
            "password should be lowercase hex: {password}"
        );
    }

    #[test]
    fn test_depends_on_challenge() {
        let p1 = compute_password("token", "challenge-1");
        let p2 = compute_password("token", "challenge-2");
        assert_ne!(p1, p2);
    }
}
