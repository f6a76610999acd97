use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

use super::security::{UsernameToken, basic_authorization};
use crate::error::{CamsnapError, Result};
use crate::xml::SoapDocument;

/// Per-attempt HTTP timeout.
pub const DEFAULT_INFO_TIMEOUT: Duration = Duration::from_secs(5);

/// Bytes of a failing response body kept for the error message.
const EXCERPT_LIMIT: usize = 256;

const SOAP_CONTENT_TYPE: &str = "application/soap+xml; charset=utf-8";

const RESPONSE_PATH: [&str; 2] = ["Body", "GetDeviceInformationResponse"];

/// Identity reported by ONVIF `GetDeviceInformation`.
///
/// Every field is whitespace-trimmed; elements missing from the response
/// come back as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub manufacturer: String,
    pub model: String,
    pub firmware: String,
    pub serial: String,
    pub hardware_id: String,
}

impl DeviceInfo {
    /// Decode a `GetDeviceInformationResponse` envelope.
    pub fn from_soap(raw: &[u8]) -> Result<Self> {
        let doc = SoapDocument::parse(raw).map_err(|e| CamsnapError::Decode(e.to_string()))?;
        let field = |name: &str| {
            let path = [RESPONSE_PATH[0], RESPONSE_PATH[1], name];
            doc.first_text(&path).trim().to_string()
        };
        Ok(Self {
            manufacturer: field("Manufacturer"),
            model: field("Model"),
            firmware: field("FirmwareVersion"),
            serial: field("SerialNumber"),
            hardware_id: field("HardwareId"),
        })
    }

    /// Short human summary, e.g. `"C200, fw 1.3.4, TP-Link"`.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.model.is_empty() {
            parts.push(self.model.clone());
        }
        if !self.firmware.is_empty() {
            parts.push(format!("fw {}", self.firmware));
        }
        if !self.manufacturer.is_empty() {
            parts.push(self.manufacturer.clone());
        }
        parts.join(", ")
    }
}

/// How a single HTTP attempt ended.
///
/// The fallback decision in [`DeviceInfoClient::fetch`] is made on this
/// tag alone: only [`AuthFailed`](Self::AuthFailed) earns a second attempt.
#[derive(Debug)]
pub enum AttemptOutcome {
    Success(DeviceInfo),
    /// HTTP 401 or 403.
    AuthFailed { status: u16 },
    /// Network error, other non-200 status, or undecodable body.
    Failed(CamsnapError),
}

/// Credentials mode for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// WS-Security `UsernameToken` in the SOAP header, no HTTP auth.
    WsSecurity,
    /// HTTP Basic when a username is set, anonymous otherwise.
    BasicOrAnonymous,
}

/// Blocking client for ONVIF `GetDeviceInformation`.
///
/// Each fetch makes at most two sequential requests and shares no state
/// with other fetches, so one client can serve many devices from several
/// threads.
#[derive(Debug, Clone)]
pub struct DeviceInfoClient {
    http: Client,
}

impl DeviceInfoClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_INFO_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// Fetch device identity from `address`.
    ///
    /// 1. With a username, try a WS-Security digest first.
    /// 2. Only if that attempt is rejected with 401/403, retry once with
    ///    HTTP Basic (or anonymously when `username` is empty).
    ///
    /// Any other failure on the first attempt is returned as-is.
    pub fn fetch(&self, address: &str, username: &str, password: &str) -> Result<DeviceInfo> {
        if address.is_empty() {
            return Err(CamsnapError::InvalidInput("device address required".to_string()));
        }

        if !username.is_empty() {
            match self.attempt(address, username, password, AuthScheme::WsSecurity) {
                AttemptOutcome::Success(info) => return Ok(info),
                AttemptOutcome::AuthFailed { status } => {
                    tracing::debug!(
                        address,
                        status,
                        "WS-Security rejected, falling back to basic auth"
                    );
                }
                AttemptOutcome::Failed(e) => return Err(e),
            }
        }

        match self.attempt(address, username, password, AuthScheme::BasicOrAnonymous) {
            AttemptOutcome::Success(info) => Ok(info),
            AttemptOutcome::AuthFailed { status } => Err(CamsnapError::Auth { status }),
            AttemptOutcome::Failed(e) => Err(e),
        }
    }

    /// Make one request and classify the result.
    pub fn attempt(
        &self,
        address: &str,
        username: &str,
        password: &str,
        scheme: AuthScheme,
    ) -> AttemptOutcome {
        let (security_header, authorization) = match scheme {
            AuthScheme::WsSecurity => {
                (UsernameToken::new(username, password).to_header_xml(), None)
            }
            AuthScheme::BasicOrAnonymous => {
                (String::new(), basic_authorization(username, password))
            }
        };

        let mut request = self
            .http
            .post(address)
            .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)
            .body(request_body(&security_header));
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }

        let response = match request.send() {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(address, ?scheme, error = %e, "device info request failed");
                return AttemptOutcome::Failed(e.into());
            }
        };

        let status = response.status().as_u16();
        tracing::debug!(address, ?scheme, status, "device info response");

        if status == 401 || status == 403 {
            return AttemptOutcome::AuthFailed { status };
        }

        let body = match response.bytes() {
            Ok(b) => b,
            Err(e) => return AttemptOutcome::Failed(e.into()),
        };

        if status != 200 {
            return AttemptOutcome::Failed(CamsnapError::Status {
                status,
                excerpt: excerpt(&body),
            });
        }

        match DeviceInfo::from_soap(&body) {
            Ok(info) => AttemptOutcome::Success(info),
            Err(e) => AttemptOutcome::Failed(e),
        }
    }
}

/// Fetch device identity with a default client.
pub fn fetch_device_info(address: &str, username: &str, password: &str) -> Result<DeviceInfo> {
    DeviceInfoClient::new()?.fetch(address, username, password)
}

fn request_body(security_header: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope">
  <s:Header>{security_header}</s:Header>
  <s:Body>
    <tds:GetDeviceInformation xmlns:tds="http://www.onvif.org/ver10/device/wsdl"/>
  </s:Body>
</s:Envelope>"#
    )
}

fn excerpt(body: &[u8]) -> String {
    let end = body.len().min(EXCERPT_LIMIT);
    String::from_utf8_lossy(&body[..end]).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://www.w3.org/2003/05/soap-envelope"
    xmlns:tds="http://www.onvif.org/ver10/device/wsdl">
  <SOAP-ENV:Body>
    <tds:GetDeviceInformationResponse>
      <tds:Manufacturer> TP-Link </tds:Manufacturer>
      <tds:Model>C200</tds:Model>
      <tds:FirmwareVersion>
        1.3.4
      </tds:FirmwareVersion>
      <tds:SerialNumber>abc123</tds:SerialNumber>
    </tds:GetDeviceInformationResponse>
  </SOAP-ENV:Body>
</SOAP-ENV:Envelope>"#;

    #[test]
    fn decodes_and_trims_fields() {
        let info = DeviceInfo::from_soap(RESPONSE.as_bytes()).unwrap();
        assert_eq!(info.manufacturer, "TP-Link");
        assert_eq!(info.model, "C200");
        assert_eq!(info.firmware, "1.3.4");
        assert_eq!(info.serial, "abc123");
        assert_eq!(info.hardware_id, "");
    }

    #[test]
    fn undecodable_body_is_decode_error() {
        let err = DeviceInfo::from_soap(b"<html>oops").unwrap_err();
        assert!(matches!(err, CamsnapError::Decode(_)));
    }

    #[test]
    fn summary_skips_empty_fields() {
        let info = DeviceInfo {
            model: "C200".to_string(),
            manufacturer: "TP-Link".to_string(),
            ..DeviceInfo::default()
        };
        assert_eq!(info.summary(), "C200, TP-Link");
    }

    #[test]
    fn request_body_embeds_header() {
        let body = request_body("<X/>");
        assert!(body.contains("<s:Header><X/></s:Header>"));
        assert!(body.contains("GetDeviceInformation"));
    }

    #[test]
    fn empty_address_is_rejected() {
        let client = DeviceInfoClient::new().unwrap();
        assert!(matches!(
            client.fetch("", "admin", "pw"),
            Err(CamsnapError::InvalidInput(_))
        ));
    }

    #[test]
    fn excerpt_is_bounded() {
        let body = vec![b'x'; 1000];
        assert_eq!(excerpt(&body).len(), EXCERPT_LIMIT);
    }
}
