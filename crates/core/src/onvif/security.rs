use base64::prelude::{BASE64_STANDARD, Engine as _};
use chrono::{SecondsFormat, Utc};
use sha1::{Digest, Sha1};

const WSSE_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
const WSU_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
const PASSWORD_DIGEST_TYPE: &str = concat!(
    "http://docs.oasis-open.org/wss/2004/01/",
    "oasis-200401-wss-username-token-profile-1.0#PasswordDigest"
);

/// WS-Security `UsernameToken` with a `PasswordDigest` (WSS UsernameToken
/// Profile 1.0 §3.1).
///
/// ```text
/// digest = base64( SHA-1( nonce ‖ created ‖ password ) )
/// ```
///
/// `nonce` is 16 random bytes (sent base64-encoded) and `created` is the
/// current UTC time in RFC 3339 with nanoseconds. The password itself never
/// goes on the wire.
#[derive(Debug, Clone)]
pub struct UsernameToken {
    username: String,
    nonce: [u8; 16],
    created: String,
    digest: String,
}

impl UsernameToken {
    /// Build a token with a fresh nonce and the current timestamp.
    pub fn new(username: &str, password: &str) -> Self {
        let nonce: [u8; 16] = rand::random();
        let created = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);
        Self::with_parts(username, password, nonce, created)
    }

    /// Build a token from explicit nonce and timestamp.
    pub fn with_parts(username: &str, password: &str, nonce: [u8; 16], created: String) -> Self {
        let digest = password_digest(&nonce, &created, password);
        Self {
            username: username.to_string(),
            nonce,
            created,
            digest,
        }
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn nonce_base64(&self) -> String {
        BASE64_STANDARD.encode(self.nonce)
    }

    pub fn created(&self) -> &str {
        &self.created
    }

    /// Serialize as a `<wsse:Security>` SOAP header block.
    pub fn to_header_xml(&self) -> String {
        format!(
            r#"
<wsse:Security xmlns:wsse="{WSSE_NS}"
               xmlns:wsu="{WSU_NS}">
  <wsse:UsernameToken>
    <wsse:Username>{}</wsse:Username>
    <wsse:Password Type="{PASSWORD_DIGEST_TYPE}">{}</wsse:Password>
    <wsse:Nonce>{}</wsse:Nonce>
    <wsu:Created>{}</wsu:Created>
  </wsse:UsernameToken>
</wsse:Security>"#,
            quick_xml::escape::escape(self.username.as_str()),
            self.digest,
            self.nonce_base64(),
            self.created
        )
    }
}

/// `base64(SHA-1(nonce ‖ created ‖ password))`.
pub fn password_digest(nonce: &[u8], created: &str, password: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(nonce);
    hasher.update(created.as_bytes());
    hasher.update(password.as_bytes());
    BASE64_STANDARD.encode(hasher.finalize())
}

/// Value for an HTTP Basic `Authorization` header, or `None` when there is
/// no username (anonymous request).
pub fn basic_authorization(username: &str, password: &str) -> Option<String> {
    if username.is_empty() {
        return None;
    }
    Some(format!(
        "Basic {}",
        BASE64_STANDARD.encode(format!("{username}:{password}"))
    ))
}
