use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

use crate::{errors::Error, Result};

/// Scheme marker of the authorization header carrying the token.
pub const AUTH_HEADER_SCHEME: &str = "Bearer";

/// A bearer token (JWT) for the conversation backend.
///
/// Only the structure is checked: three base64url segments, the first two being JSON objects.
/// Signatures are never verified. The `exp` claim is re-derived from the raw string every time a
/// token is parsed, so the raw string is all that needs persisting.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    raw: String,
    expires_at: Option<i64>,
}

impl Token {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let mut parts = raw.split('.');
        let (Some(header), Some(claims), Some(_signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::InvalidToken(
                "expected three dot-separated segments".to_string(),
            ));
        };

        decode_object(header, "header")?;
        let claims = decode_object(claims, "claims")?;

        let expires_at = claims.get("exp").and_then(|exp| {
            exp.as_i64()
                .or_else(|| exp.as_f64().map(|f| f as i64))
        });

        Ok(Self {
            raw: raw.to_string(),
            expires_at,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Expiry claim in seconds since the Unix epoch.
    pub fn expires_at(&self) -> Option<i64> {
        self.expires_at
    }

    /// A token is live when it carries an expiry claim that lies after `now`.
    pub fn is_live_at(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(exp) if exp > now)
    }

    /// Extract a well-formed token from an `Authorization` header value.
    pub fn from_authorization_header(value: &str) -> Option<Self> {
        let candidate = strip_auth_scheme(value)?;
        Self::parse(candidate).ok()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("raw", &mask(&self.raw))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Short, log-safe rendering of a token.
pub fn mask(raw: &str) -> String {
    let prefix: String = raw.chars().take(8).collect();
    format!("{prefix}…({} chars)", raw.chars().count())
}

fn strip_auth_scheme(value: &str) -> Option<&str> {
    let value = value.trim();
    let scheme = value.get(..AUTH_HEADER_SCHEME.len())?;
    if !scheme.eq_ignore_ascii_case(AUTH_HEADER_SCHEME) {
        return None;
    }
    let rest = &value[AUTH_HEADER_SCHEME.len()..];
    let token = rest.strip_prefix(' ')?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

fn decode_object(segment: &str, what: &str) -> Result<serde_json::Map<String, serde_json::Value>> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| Error::InvalidToken(format!("{what} is not base64url: {e}")))?;
    match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(Error::InvalidToken(format!("{what} is not a JSON object"))),
        Err(e) => Err(Error::InvalidToken(format!("{what} is not JSON: {e}"))),
    }
}

#[cfg(test)]
pub(crate) fn fake_jwt(exp: Option<i64>) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let claims = match exp {
        Some(exp) => serde_json::json!({ "sub": "user-1", "exp": exp }),
        None => serde_json::json!({ "sub": "user-1" }),
    };
    let claims = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{claims}.c2lnbmF0dXJl")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exp_claim() {
        let token = Token::parse(&fake_jwt(Some(1_900_000_000))).unwrap();
        assert_eq!(token.expires_at(), Some(1_900_000_000));
        assert!(token.is_live_at(1_800_000_000));
        assert!(!token.is_live_at(1_900_000_000));
    }

    #[test]
    fn token_without_exp_is_never_live() {
        let token = Token::parse(&fake_jwt(None)).unwrap();
        assert_eq!(token.expires_at(), None);
        assert!(!token.is_live_at(0));
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(Token::parse("").is_err());
        assert!(Token::parse("not-a-jwt").is_err());
        assert!(Token::parse("a.b").is_err());
        assert!(Token::parse("!!!.???.sig").is_err());
        let array_claims = format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#),
            URL_SAFE_NO_PAD.encode(b"[1,2]")
        );
        assert!(Token::parse(&array_claims).is_err());
    }

    #[test]
    fn extracts_bearer_token_from_header() {
        let jwt = fake_jwt(Some(1_900_000_000));
        let token = Token::from_authorization_header(&format!("Bearer {jwt}")).unwrap();
        assert_eq!(token.as_str(), jwt);

        assert!(Token::from_authorization_header(&format!("Basic {jwt}")).is_none());
        assert!(Token::from_authorization_header("Bear").is_none());
        assert!(Token::from_authorization_header("Bearer ").is_none());
        assert!(Token::from_authorization_header("Bearer not-a-jwt").is_none());
    }

    #[test]
    fn debug_output_masks_the_token() {
        let jwt = fake_jwt(Some(1));
        let token = Token::parse(&jwt).unwrap();
        let dbg = format!("{token:?}");
        assert!(!dbg.contains(&jwt));
    }
}
