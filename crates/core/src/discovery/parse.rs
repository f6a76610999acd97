use crate::error::{CamsnapError, Result};
use crate::xml::SoapDocument;

const XADDRS_PATH: &[&str] = &["Body", "ProbeMatches", "ProbeMatch", "XAddrs"];

/// Extract candidate service addresses from a WS-Discovery `ProbeMatches` reply.
///
/// Each `ProbeMatch/XAddrs` element may list several whitespace-separated
/// endpoints; every token becomes one address, in document order. Extra
/// elements anywhere in the envelope are ignored.
///
/// Fails on malformed XML, and also when the reply decodes but yields no
/// addresses at all ([`CamsnapError::NoProbeMatches`]).
pub fn parse_probe_matches(raw: &[u8]) -> Result<Vec<String>> {
    let doc = SoapDocument::parse(raw)?;

    let addrs: Vec<String> = doc
        .texts_at(XADDRS_PATH)
        .flat_map(str::split_whitespace)
        .map(str::to_string)
        .collect();

    if addrs.is_empty() {
        return Err(CamsnapError::NoProbeMatches);
    }
    Ok(addrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(matches: &[&str]) -> String {
        let body: String = matches
            .iter()
            .map(|x| {
                format!(
                    "<d:ProbeMatch><w:EndpointReference><w:Address>urn:uuid:1</w:Address>\
                     </w:EndpointReference><d:XAddrs>{x}</d:XAddrs></d:ProbeMatch>"
                )
            })
            .collect();
        format!(
            "<?xml version=\"1.0\"?>\
             <e:Envelope xmlns:e=\"a\" xmlns:d=\"b\" xmlns:w=\"c\">\
             <e:Header><w:RelatesTo>uuid:1</w:RelatesTo></e:Header>\
             <e:Body><d:ProbeMatches>{body}</d:ProbeMatches></e:Body></e:Envelope>"
        )
    }

    #[test]
    fn counts_every_address_in_order() {
        let xml = envelope(&[
            "http://10.0.0.2/onvif/device_service http://[fe80::1]/onvif/device_service",
            "http://10.0.0.3:8080/onvif/device_service",
        ]);
        let addrs = parse_probe_matches(xml.as_bytes()).unwrap();
        assert_eq!(
            addrs,
            vec![
                "http://10.0.0.2/onvif/device_service",
                "http://[fe80::1]/onvif/device_service",
                "http://10.0.0.3:8080/onvif/device_service",
            ]
        );
    }

    #[test]
    fn tolerates_surrounding_whitespace() {
        let xml = envelope(&["\n   http://10.0.0.9/onvif   \n"]);
        assert_eq!(
            parse_probe_matches(xml.as_bytes()).unwrap(),
            vec!["http://10.0.0.9/onvif"]
        );
    }

    #[test]
    fn zero_matches_fails() {
        let xml = envelope(&[]);
        assert!(matches!(
            parse_probe_matches(xml.as_bytes()),
            Err(CamsnapError::NoProbeMatches)
        ));
    }

    #[test]
    fn blank_xaddrs_fails() {
        let xml = envelope(&["   "]);
        assert!(parse_probe_matches(xml.as_bytes()).is_err());
    }

    #[test]
    fn malformed_fails() {
        assert!(parse_probe_matches(b"<Envelope><Body><ProbeMatches>").is_err());
        assert!(parse_probe_matches(b"\x00\x01garbage").is_err());
    }
}
