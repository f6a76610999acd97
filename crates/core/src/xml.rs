//! Namespace-agnostic SOAP reader.
//!
//! ONVIF devices disagree on namespace prefixes (`d:`, `wsdd:`, `tds:`, or
//! none at all), so lookups here match on element *local names* only. The
//! reader walks the whole document, which doubles as a well-formedness
//! check: mismatched tags, bad entities, and truncated documents are errors
//! even when the interesting elements were already seen.
//!
//! Unknown elements are ignored. Callers ask for the text of elements at a
//! fixed path below the root `Envelope`, e.g.
//! `["Body", "ProbeMatches", "ProbeMatch", "XAddrs"]`.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{CamsnapError, Result, XmlErrorKind};

const ENVELOPE: &str = "Envelope";

/// A closed element: its local-name path from the root and direct text.
#[derive(Debug)]
struct Element {
    path: Vec<String>,
    text: String,
}

/// A parsed SOAP envelope, flattened into closed elements in document order.
#[derive(Debug)]
pub(crate) struct SoapDocument {
    elements: Vec<Element>,
}

impl SoapDocument {
    /// Parse raw bytes, requiring a well-formed document rooted at `Envelope`.
    pub(crate) fn parse(raw: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(raw).map_err(|_| xml_error(XmlErrorKind::Encoding))?;
        let mut reader = Reader::from_str(text);

        let mut stack: Vec<(String, String)> = Vec::new();
        let mut elements = Vec::new();
        let mut saw_root = false;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| xml_error(XmlErrorKind::Syntax(e.to_string())))?;
            match event {
                Event::Start(start) => {
                    let name = local_name(start.local_name().as_ref());
                    if stack.is_empty() {
                        check_root(&name, saw_root)?;
                        saw_root = true;
                    }
                    stack.push((name, String::new()));
                }
                Event::Empty(start) => {
                    let name = local_name(start.local_name().as_ref());
                    if stack.is_empty() {
                        check_root(&name, saw_root)?;
                        saw_root = true;
                    }
                    let mut path: Vec<String> = stack.iter().map(|(n, _)| n.clone()).collect();
                    path.push(name);
                    elements.push(Element {
                        path,
                        text: String::new(),
                    });
                }
                Event::End(_) => {
                    let path: Vec<String> = stack.iter().map(|(n, _)| n.clone()).collect();
                    if let Some((_, text)) = stack.pop() {
                        elements.push(Element { path, text });
                    }
                }
                Event::Text(t) => {
                    let unescaped = t
                        .unescape()
                        .map_err(|e| xml_error(XmlErrorKind::Syntax(e.to_string())))?;
                    if let Some((_, buf)) = stack.last_mut() {
                        buf.push_str(&unescaped);
                    }
                }
                Event::CData(c) => {
                    if let Some((_, buf)) = stack.last_mut() {
                        buf.push_str(&String::from_utf8_lossy(&c));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(xml_error(XmlErrorKind::Unclosed));
        }
        if !saw_root {
            return Err(xml_error(XmlErrorKind::Empty));
        }

        Ok(Self { elements })
    }

    /// Text of every element at `path` (relative to `Envelope`), in document order.
    pub(crate) fn texts_at<'a>(
        &'a self,
        path: &'a [&'a str],
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.elements
            .iter()
            .filter(move |el| matches_path(&el.path, path))
            .map(|el| el.text.as_str())
    }

    /// Text of the first element at `path`, or empty when absent.
    pub(crate) fn first_text(&self, path: &[&str]) -> String {
        self.texts_at(path).next().unwrap_or_default().to_string()
    }
}

fn matches_path(actual: &[String], wanted: &[&str]) -> bool {
    actual.len() == wanted.len() + 1
        && actual[0] == ENVELOPE
        && actual[1..].iter().zip(wanted).all(|(a, w)| a == w)
}

fn check_root(name: &str, saw_root: bool) -> Result<()> {
    if saw_root {
        return Err(xml_error(XmlErrorKind::Syntax(
            "multiple root elements".to_string(),
        )));
    }
    if name != ENVELOPE {
        return Err(xml_error(XmlErrorKind::UnexpectedRoot(name.to_string())));
    }
    Ok(())
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn xml_error(kind: XmlErrorKind) -> CamsnapError {
    CamsnapError::Xml { kind }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_are_ignored() {
        let raw = br#"<s:Envelope xmlns:s="x"><s:Body><a:Item>one</a:Item></s:Body></s:Envelope>"#;
        let doc = SoapDocument::parse(raw).unwrap();
        assert_eq!(doc.first_text(&["Body", "Item"]), "one");
    }

    #[test]
    fn entities_are_unescaped() {
        let raw = b"<Envelope><Body><V>a &amp; b</V></Body></Envelope>";
        let doc = SoapDocument::parse(raw).unwrap();
        assert_eq!(doc.first_text(&["Body", "V"]), "a & b");
    }

    #[test]
    fn missing_element_is_empty() {
        let raw = b"<Envelope><Body/></Envelope>";
        let doc = SoapDocument::parse(raw).unwrap();
        assert_eq!(doc.first_text(&["Body", "Nope"]), "");
    }

    #[test]
    fn truncated_document_fails() {
        assert!(SoapDocument::parse(b"<Envelope><Body>").is_err());
    }

    #[test]
    fn mismatched_tags_fail() {
        assert!(SoapDocument::parse(b"<Envelope><Body></Other></Envelope>").is_err());
    }

    #[test]
    fn plain_text_fails() {
        assert!(SoapDocument::parse(b"hello there").is_err());
    }

    #[test]
    fn wrong_root_fails() {
        let err = SoapDocument::parse(b"<Html><Body/></Html>").unwrap_err();
        assert!(matches!(
            err,
            CamsnapError::Xml {
                kind: XmlErrorKind::UnexpectedRoot(_)
            }
        ));
    }
}
