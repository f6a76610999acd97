use uuid::Uuid;

/// Outbound WS-Discovery `Probe` for ONVIF network video transmitters.
///
/// ```text
/// <e:Envelope ...>
///   <e:Header>
///     <w:MessageID>uuid:xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx</w:MessageID>
///     <w:To>urn:schemas-xmlsoap-org:ws:2005:04:discovery</w:To>
///     <w:Action>.../discovery/Probe</w:Action>
///   </e:Header>
///   <e:Body><d:Probe><d:Types>dn:NetworkVideoTransmitter</d:Types></d:Probe></e:Body>
/// </e:Envelope>
/// ```
///
/// Each probe carries a fresh random message id so replies from a previous
/// scan cannot be mistaken for this one. Single use: build, send, drop.
#[must_use]
pub struct ProbeEnvelope {
    message_id: String,
}

impl ProbeEnvelope {
    pub fn new() -> Self {
        Self::with_message_id(Uuid::new_v4().to_string())
    }

    /// Build a probe with a caller-chosen message id (no `uuid:` prefix).
    pub fn with_message_id(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
        }
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Serialize to the SOAP 1.2 wire format.
    pub fn serialize(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<e:Envelope xmlns:e="http://www.w3.org/2003/05/soap-envelope"
            xmlns:w="http://schemas.xmlsoap.org/ws/2004/08/addressing"
            xmlns:d="http://schemas.xmlsoap.org/ws/2005/04/discovery">
  <e:Header>
    <w:MessageID>uuid:{}</w:MessageID>
    <w:To>urn:schemas-xmlsoap-org:ws:2005:04:discovery</w:To>
    <w:Action>http://schemas.xmlsoap.org/ws/2005/04/discovery/Probe</w:Action>
  </e:Header>
  <e:Body>
    <d:Probe>
      <d:Types>dn:NetworkVideoTransmitter</d:Types>
    </d:Probe>
  </e:Body>
</e:Envelope>"#,
            self.message_id
        )
    }
}

impl Default for ProbeEnvelope {
    fn default() -> Self {
        Self::new()
    }
}
