//! Device info fetches against a canned HTTP server on loopback.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;

use camsnap::CamsnapError;
use camsnap::onvif::DeviceInfoClient;

const OK_BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope"
    xmlns:tds="http://www.onvif.org/ver10/device/wsdl">
  <env:Body>
    <tds:GetDeviceInformationResponse>
      <tds:Manufacturer>TP-Link</tds:Manufacturer>
      <tds:Model>C200</tds:Model>
      <tds:FirmwareVersion>1.3.4 Build 230424</tds:FirmwareVersion>
      <tds:SerialNumber>0123abcd</tds:SerialNumber>
      <tds:HardwareId>2.0</tds:HardwareId>
    </tds:GetDeviceInformationResponse>
  </env:Body>
</env:Envelope>"#;

/// Serve `responses` in order, one per connection, and forward each
/// request (head and body, lowercased) to the returned channel.
fn serve(responses: Vec<(u16, &'static str)>) -> (String, mpsc::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/onvif/device_service", listener.local_addr().unwrap());
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for (status, body) in responses {
            let Ok((stream, _)) = listener.accept() else {
                return;
            };
            let mut reader = BufReader::new(stream);
            let mut head = String::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                    break;
                }
                let lower = line.to_ascii_lowercase();
                if let Some(v) = lower.strip_prefix("content-length:") {
                    content_length = v.trim().parse().unwrap();
                }
                head.push_str(&lower);
            }
            let mut request_body = vec![0u8; content_length];
            reader.read_exact(&mut request_body).unwrap();
            let recorded = format!("{head}\n{}", String::from_utf8_lossy(&request_body));
            tx.send(recorded.to_ascii_lowercase()).unwrap();

            let reason = match status {
                200 => "OK",
                401 => "Unauthorized",
                403 => "Forbidden",
                _ => "Internal Server Error",
            };
            let response = format!(
                "HTTP/1.1 {status} {reason}\r\nContent-Type: application/soap+xml\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let mut stream = reader.into_inner();
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
        }
    });

    (url, rx)
}

fn client() -> DeviceInfoClient {
    DeviceInfoClient::with_timeout(std::time::Duration::from_secs(5)).unwrap()
}

#[test]
fn digest_rejected_then_basic_succeeds() {
    let (url, requests) = serve(vec![(401, ""), (200, OK_BODY)]);

    let info = client().fetch(&url, "admin", "secret").unwrap();
    assert_eq!(info.manufacturer, "TP-Link");
    assert_eq!(info.model, "C200");
    assert_eq!(info.firmware, "1.3.4 Build 230424");
    assert_eq!(info.serial, "0123abcd");
    assert_eq!(info.hardware_id, "2.0");

    let first = requests.recv().unwrap();
    assert!(first.contains("<wsse:usernametoken>"));
    assert!(first.contains("passworddigest"));
    assert!(!first.contains("authorization:"));

    let second = requests.recv().unwrap();
    assert!(second.contains("authorization: basic ywrtaw46c2vjcmv0"));
    assert!(!second.contains("usernametoken"));
    assert!(second.contains("getdeviceinformation"));
}

#[test]
fn digest_accepted_needs_one_request() {
    let (url, requests) = serve(vec![(200, OK_BODY), (200, OK_BODY)]);
    let info = client().fetch(&url, "admin", "secret").unwrap();
    assert_eq!(info.summary(), "C200, fw 1.3.4 Build 230424, TP-Link");
    assert_eq!(requests.try_iter().count(), 1);
}

#[test]
fn server_error_is_not_retried() {
    let (url, requests) = serve(vec![(500, "boom"), (200, OK_BODY)]);
    let err = client().fetch(&url, "admin", "secret").unwrap_err();
    match err {
        CamsnapError::Status { status, excerpt } => {
            assert_eq!(status, 500);
            assert_eq!(excerpt, "boom");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(requests.try_iter().count(), 1);
}

#[test]
fn both_attempts_rejected_is_auth_error() {
    let (url, requests) = serve(vec![(401, ""), (403, "")]);
    let err = client().fetch(&url, "admin", "wrong").unwrap_err();
    assert!(err.is_auth());
    assert!(matches!(err, CamsnapError::Auth { status: 403 }));
    assert_eq!(requests.try_iter().count(), 2);
}

#[test]
fn anonymous_sends_no_credentials() {
    let (url, requests) = serve(vec![(200, OK_BODY)]);
    client().fetch(&url, "", "").unwrap();
    let only = requests.recv().unwrap();
    assert!(!only.contains("authorization:"));
    assert!(!only.contains("usernametoken"));
}

#[test]
fn unreachable_device_is_http_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let url = format!("http://127.0.0.1:{port}/onvif/device_service");
    let err = client().fetch(&url, "admin", "secret").unwrap_err();
    assert!(matches!(err, CamsnapError::Http(_)));
}
