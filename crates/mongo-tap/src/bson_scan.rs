//! Lenient top-level BSON document scanning.
//!
//! The tap only needs a handful of audit-relevant fields out of each BSON
//! document (command name, `$db`, credential fields, `_id`). A full BSON
//! library is overkill for that, and the tap must never fail a message over
//! a payload it cannot read: truncated or exotic documents simply yield
//! fewer fields. This module walks the top-level elements of one document,
//! records string values and a rendered `_id`, and stops quietly at the
//! first thing it does not understand.

/// What a scan recovered from one document's top level.
#[derive(Debug, Default, Clone)]
pub struct DocSummary {
    /// Name of the first element. For command documents this is the command
    /// itself (`find`, `insert`, ...).
    pub first_key: Option<String>,
    /// Top-level string fields, in document order.
    pub strings: Vec<(String, String)>,
    /// The `_id` element rendered as a string, when its type allows it.
    pub id: Option<String>,
    /// Total declared length of the document, for advancing past it.
    pub doc_len: usize,
}

impl DocSummary {
    /// Look up a top-level string field by name.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.strings
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

// BSON element type tags we know how to traverse.
const T_DOUBLE: u8 = 0x01;
const T_STRING: u8 = 0x02;
const T_DOCUMENT: u8 = 0x03;
const T_ARRAY: u8 = 0x04;
const T_BINARY: u8 = 0x05;
const T_UNDEFINED: u8 = 0x06;
const T_OBJECT_ID: u8 = 0x07;
const T_BOOL: u8 = 0x08;
const T_DATETIME: u8 = 0x09;
const T_NULL: u8 = 0x0A;
const T_REGEX: u8 = 0x0B;
const T_INT32: u8 = 0x10;
const T_TIMESTAMP: u8 = 0x11;
const T_INT64: u8 = 0x12;
const T_DECIMAL128: u8 = 0x13;

/// Scan the BSON document at the start of `buf`.
///
/// Never errors: anything malformed, truncated, or of an untraversable type
/// ends the scan with whatever was collected so far. Returns `None` only
/// when there are not even enough bytes for the document length prefix.
pub fn scan_document(buf: &[u8]) -> Option<DocSummary> {
    if buf.len() < 4 {
        return None;
    }
    let doc_len = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]).max(0) as usize;

    let mut summary = DocSummary {
        doc_len,
        ..DocSummary::default()
    };

    // Walk within the smaller of the declared length and the actual buffer.
    let end = doc_len.min(buf.len());
    let mut pos = 4;

    while pos < end {
        let tag = buf[pos];
        if tag == 0 {
            break;
        }
        pos += 1;

        let Some(name) = read_cstring(buf, &mut pos, end) else {
            break;
        };

        if summary.first_key.is_none() {
            summary.first_key = Some(name.to_string());
        }

        match tag {
            T_STRING => {
                let Some(value) = read_string(buf, &mut pos, end) else {
                    break;
                };
                if name == "_id" && summary.id.is_none() {
                    summary.id = Some(value.to_string());
                }
                summary.strings.push((name.to_string(), value.to_string()));
            }
            T_OBJECT_ID => {
                if pos + 12 > end {
                    break;
                }
                if name == "_id" && summary.id.is_none() {
                    summary.id = Some(hex::encode(&buf[pos..pos + 12]));
                }
                pos += 12;
            }
            T_INT32 => {
                if pos + 4 > end {
                    break;
                }
                if name == "_id" && summary.id.is_none() {
                    let v = i32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]]);
                    summary.id = Some(v.to_string());
                }
                pos += 4;
            }
            T_INT64 => {
                if pos + 8 > end {
                    break;
                }
                if name == "_id" && summary.id.is_none() {
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(&buf[pos..pos + 8]);
                    summary.id = Some(i64::from_le_bytes(raw).to_string());
                }
                pos += 8;
            }
            T_DOUBLE | T_DATETIME | T_TIMESTAMP => {
                if pos + 8 > end {
                    break;
                }
                pos += 8;
            }
            T_DECIMAL128 => {
                if pos + 16 > end {
                    break;
                }
                pos += 16;
            }
            T_BOOL => {
                if pos + 1 > end {
                    break;
                }
                pos += 1;
            }
            T_NULL | T_UNDEFINED => {}
            T_DOCUMENT | T_ARRAY => {
                // Skip embedded documents wholesale; nested fields are not
                // audit-relevant at this level.
                if pos + 4 > end {
                    break;
                }
                let len =
                    i32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]]);
                if len < 4 {
                    break;
                }
                pos += len as usize;
                if pos > end {
                    break;
                }
            }
            T_BINARY => {
                if pos + 5 > end {
                    break;
                }
                let len =
                    i32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]]);
                if len < 0 {
                    break;
                }
                pos += 5 + len as usize;
                if pos > end {
                    break;
                }
            }
            T_REGEX => {
                if read_cstring(buf, &mut pos, end).is_none() {
                    break;
                }
                if read_cstring(buf, &mut pos, end).is_none() {
                    break;
                }
            }
            // Unknown element type: cannot compute its width, stop here.
            _ => break,
        }
    }

    Some(summary)
}

/// Read a NUL-terminated UTF-8 string, advancing `pos` past the terminator.
fn read_cstring<'a>(buf: &'a [u8], pos: &mut usize, end: usize) -> Option<&'a str> {
    let start = *pos;
    let nul = buf[start..end].iter().position(|&b| b == 0)?;
    let s = std::str::from_utf8(&buf[start..start + nul]).ok()?;
    *pos = start + nul + 1;
    Some(s)
}

/// Read a length-prefixed BSON string value, advancing `pos` past it.
fn read_string<'a>(buf: &'a [u8], pos: &mut usize, end: usize) -> Option<&'a str> {
    if *pos + 4 > end {
        return None;
    }
    let len = i32::from_le_bytes([buf[*pos], buf[*pos + 1], buf[*pos + 2], buf[*pos + 3]]);
    // Length includes the trailing NUL and must be at least 1.
    if len < 1 {
        return None;
    }
    let start = *pos + 4;
    let stop = start + len as usize;
    if stop > end {
        return None;
    }
    let s = std::str::from_utf8(&buf[start..stop - 1]).ok()?;
    *pos = stop;
    Some(s)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Hand-build a BSON document from (name, element-bytes-with-tag) parts.
    pub(crate) fn doc(elements: &[Vec<u8>]) -> Vec<u8> {
        let body_len: usize = elements.iter().map(Vec::len).sum();
        let total = 4 + body_len + 1;
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(&(total as i32).to_le_bytes());
        for e in elements {
            out.extend_from_slice(e);
        }
        out.push(0);
        out
    }

    pub(crate) fn str_elem(name: &str, value: &str) -> Vec<u8> {
        let mut out = vec![T_STRING];
        out.extend_from_slice(name.as_bytes());
        out.push(0);
        out.extend_from_slice(&((value.len() + 1) as i32).to_le_bytes());
        out.extend_from_slice(value.as_bytes());
        out.push(0);
        out
    }

    pub(crate) fn i32_elem(name: &str, value: i32) -> Vec<u8> {
        let mut out = vec![T_INT32];
        out.extend_from_slice(name.as_bytes());
        out.push(0);
        out.extend_from_slice(&value.to_le_bytes());
        out
    }

    pub(crate) fn oid_elem(name: &str, oid: [u8; 12]) -> Vec<u8> {
        let mut out = vec![T_OBJECT_ID];
        out.extend_from_slice(name.as_bytes());
        out.push(0);
        out.extend_from_slice(&oid);
        out
    }

    #[test]
    fn collects_string_fields_in_order() {
        let bytes = doc(&[str_elem("insert", "users"), str_elem("$db", "app")]);
        let summary = scan_document(&bytes).unwrap();
        assert_eq!(summary.first_key.as_deref(), Some("insert"));
        assert_eq!(summary.get_str("insert"), Some("users"));
        assert_eq!(summary.get_str("$db"), Some("app"));
        assert_eq!(summary.doc_len, bytes.len());
    }

    #[test]
    fn renders_objectid_primary_key_as_hex() {
        let bytes = doc(&[oid_elem("_id", [0xAB; 12]), str_elem("name", "x")]);
        let summary = scan_document(&bytes).unwrap();
        assert_eq!(summary.id.as_deref(), Some("abababababababababababab"));
        // Later fields still collected past the objectid.
        assert_eq!(summary.get_str("name"), Some("x"));
    }

    #[test]
    fn renders_numeric_primary_key() {
        let bytes = doc(&[i32_elem("_id", 42)]);
        let summary = scan_document(&bytes).unwrap();
        assert_eq!(summary.id.as_deref(), Some("42"));
    }

    #[test]
    fn truncated_document_yields_partial_fields() {
        let full = doc(&[str_elem("find", "users"), str_elem("$db", "app")]);
        // Cut the document mid-way through the second element.
        let cut = &full[..full.len() - 6];
        let summary = scan_document(cut).unwrap();
        assert_eq!(summary.get_str("find"), Some("users"));
        assert_eq!(summary.get_str("$db"), None);
    }

    #[test]
    fn unknown_element_type_stops_scan_quietly() {
        let mut elements = vec![str_elem("cmd", "ok")];
        // Type 0x7F is not a BSON type we traverse.
        let mut weird = vec![0x7Fu8];
        weird.extend_from_slice(b"junk\0");
        weird.extend_from_slice(&[1, 2, 3]);
        elements.push(weird);
        elements.push(str_elem("after", "lost"));

        let summary = scan_document(&doc(&elements)).unwrap();
        assert_eq!(summary.get_str("cmd"), Some("ok"));
        assert_eq!(summary.get_str("after"), None);
    }

    #[test]
    fn too_short_for_length_prefix() {
        assert!(scan_document(&[1, 2]).is_none());
    }

    #[test]
    fn skips_embedded_documents() {
        let inner = doc(&[str_elem("hidden", "yes")]);
        let mut embedded = vec![T_DOCUMENT];
        embedded.extend_from_slice(b"nested\0");
        embedded.extend_from_slice(&inner);

        let bytes = doc(&[embedded, str_elem("visible", "yes")]);
        let summary = scan_document(&bytes).unwrap();
        assert_eq!(summary.get_str("hidden"), None);
        assert_eq!(summary.get_str("visible"), Some("yes"));
    }
}
