use crate::bson_scan::{scan_document, DocSummary};
use crate::error::CodecError;
use crate::header::{MessageHeader, HEADER_LEN};
use crate::opcode::OpCode;

/// Audit-relevant metadata derived from one decoded message.
///
/// Every implemented decoder returns this same normalized shape, so adding
/// an opcode never touches the dispatcher or the extractor. Fields are empty
/// when the opcode's payload does not carry them (or the payload was too
/// short to read them).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Derived {
    pub user: String,
    pub database: String,
    pub collection: String,
    pub operation: String,
    pub document_id: Option<String>,
}

/// A fully decoded wire message.
#[derive(Debug, Clone)]
pub struct Message {
    pub header: MessageHeader,
    pub opcode: OpCode,
    pub derived: Derived,
}

/// Decoder signature shared by every opcode.
///
/// Decoders receive the payload only (header already stripped) and are
/// lenient: a short or unreadable payload produces empty derived fields,
/// never an error. Framing correctness is the extractor's job, not theirs.
type DecodeFn = fn(&[u8]) -> Derived;

/// Look up the decoder registered for an opcode.
///
/// This is the single dispatch point: each arm only maps a variant to its
/// decoder function. Reply-direction opcodes are recognized but have no
/// decoder yet; response-side payload decoding is an extension point.
fn decoder_for(opcode: OpCode) -> Result<DecodeFn, CodecError> {
    match opcode {
        OpCode::Update => Ok(decode_update),
        OpCode::Insert => Ok(decode_insert),
        OpCode::Query => Ok(decode_query),
        OpCode::GetMore => Ok(decode_get_more),
        OpCode::Delete => Ok(decode_delete),
        OpCode::KillCursors => Ok(decode_kill_cursors),
        OpCode::Msg => Ok(decode_msg),
        OpCode::Reply | OpCode::Reserved | OpCode::Command | OpCode::CommandReply => {
            Err(CodecError::NotImplemented { opcode })
        }
    }
}

/// Decode a complete message from its exact `message_size`-bounded frame.
///
/// `frame` must be the full message including the 16-byte header, with
/// length equal to `header.message_size`. Dispatches on the header's opcode:
/// an unrecognized tag is [`CodecError::UnknownOpcode`], a recognized but
/// undecodable one is [`CodecError::NotImplemented`].
pub fn extract_message(header: &MessageHeader, frame: &[u8]) -> Result<Message, CodecError> {
    debug_assert_eq!(frame.len(), header.message_size as usize);

    let opcode = OpCode::try_from(header.op_code)?;
    let decode = decoder_for(opcode)?;
    let body = &frame[HEADER_LEN.min(frame.len())..];

    Ok(Message {
        header: header.clone(),
        opcode,
        derived: decode(body),
    })
}

// ---------------------------------------------------------------------------
// Payload readers
// ---------------------------------------------------------------------------

/// Sequential reader over a message payload. All accessors return `None`
/// past the end instead of panicking, keeping decoders lenient by default.
struct BodyReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BodyReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn i32(&mut self) -> Option<i32> {
        let end = self.pos.checked_add(4)?;
        if end > self.buf.len() {
            return None;
        }
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.buf[self.pos..end]);
        self.pos = end;
        Some(i32::from_le_bytes(raw))
    }

    fn u8(&mut self) -> Option<u8> {
        let b = *self.buf.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    fn cstring(&mut self) -> Option<&'a str> {
        let rest = &self.buf[self.pos.min(self.buf.len())..];
        let nul = rest.iter().position(|&b| b == 0)?;
        let s = std::str::from_utf8(&rest[..nul]).ok()?;
        self.pos += nul + 1;
        Some(s)
    }

    fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos.min(self.buf.len())..]
    }
}

/// Split a `db.collection` namespace string.
fn split_namespace(ns: &str) -> (String, String) {
    match ns.split_once('.') {
        Some((db, coll)) => (db.to_string(), coll.to_string()),
        None => (ns.to_string(), String::new()),
    }
}

/// Pull a caller identity out of a scanned document, if it carries one.
///
/// Legacy authenticate commands carry `user`; some drivers send `username`.
fn user_from(doc: &DocSummary) -> String {
    doc.get_str("user")
        .or_else(|| doc.get_str("username"))
        .unwrap_or_default()
        .to_string()
}

// ---------------------------------------------------------------------------
// Per-opcode decoders
// ---------------------------------------------------------------------------

/// OP_QUERY: flags, fullCollectionName, numberToSkip, numberToReturn, query.
fn decode_query(body: &[u8]) -> Derived {
    let mut derived = Derived {
        operation: OpCode::Query.label().to_string(),
        ..Derived::default()
    };

    let mut r = BodyReader::new(body);
    if r.i32().is_none() {
        return derived;
    }
    let Some(ns) = r.cstring() else {
        return derived;
    };
    (derived.database, derived.collection) = split_namespace(ns);

    if r.i32().is_none() || r.i32().is_none() {
        return derived;
    }
    if let Some(doc) = scan_document(r.rest()) {
        derived.user = user_from(&doc);
        derived.document_id = doc.id;
    }
    derived
}

/// OP_INSERT: flags, fullCollectionName, documents.
fn decode_insert(body: &[u8]) -> Derived {
    let mut derived = Derived {
        operation: OpCode::Insert.label().to_string(),
        ..Derived::default()
    };

    let mut r = BodyReader::new(body);
    if r.i32().is_none() {
        return derived;
    }
    let Some(ns) = r.cstring() else {
        return derived;
    };
    (derived.database, derived.collection) = split_namespace(ns);

    // Only the first document's primary key is recorded.
    if let Some(doc) = scan_document(r.rest()) {
        derived.document_id = doc.id;
    }
    derived
}

/// OP_UPDATE: ZERO, fullCollectionName, flags, selector, update.
fn decode_update(body: &[u8]) -> Derived {
    let mut derived = Derived {
        operation: OpCode::Update.label().to_string(),
        ..Derived::default()
    };

    let mut r = BodyReader::new(body);
    if r.i32().is_none() {
        return derived;
    }
    let Some(ns) = r.cstring() else {
        return derived;
    };
    (derived.database, derived.collection) = split_namespace(ns);

    if r.i32().is_none() {
        return derived;
    }
    // The selector names the affected document.
    if let Some(doc) = scan_document(r.rest()) {
        derived.document_id = doc.id;
    }
    derived
}

/// OP_DELETE: ZERO, fullCollectionName, flags, selector.
fn decode_delete(body: &[u8]) -> Derived {
    let mut derived = Derived {
        operation: OpCode::Delete.label().to_string(),
        ..Derived::default()
    };

    let mut r = BodyReader::new(body);
    if r.i32().is_none() {
        return derived;
    }
    let Some(ns) = r.cstring() else {
        return derived;
    };
    (derived.database, derived.collection) = split_namespace(ns);

    if r.i32().is_none() {
        return derived;
    }
    if let Some(doc) = scan_document(r.rest()) {
        derived.document_id = doc.id;
    }
    derived
}

/// OP_GET_MORE: ZERO, fullCollectionName, numberToReturn, cursorID.
fn decode_get_more(body: &[u8]) -> Derived {
    let mut derived = Derived {
        operation: OpCode::GetMore.label().to_string(),
        ..Derived::default()
    };

    let mut r = BodyReader::new(body);
    if r.i32().is_none() {
        return derived;
    }
    if let Some(ns) = r.cstring() {
        (derived.database, derived.collection) = split_namespace(ns);
    }
    derived
}

/// OP_KILL_CURSORS: ZERO, numberOfCursorIDs, cursorIDs. Carries no
/// namespace or document.
fn decode_kill_cursors(_body: &[u8]) -> Derived {
    Derived {
        operation: OpCode::KillCursors.label().to_string(),
        ..Derived::default()
    }
}

/// OP_MSG: flagBits, then sections. Only a leading kind-0 (body) section is
/// examined; document sequences add nothing audit-relevant at this level.
///
/// The body document is a command: its first key is the command name, its
/// value the target collection, `$db` the database.
fn decode_msg(body: &[u8]) -> Derived {
    let mut derived = Derived {
        operation: OpCode::Msg.label().to_string(),
        ..Derived::default()
    };

    let mut r = BodyReader::new(body);
    if r.i32().is_none() {
        return derived;
    }
    match r.u8() {
        // Kind 0: a single BSON command document.
        Some(0) => {}
        _ => return derived,
    }

    let Some(doc) = scan_document(r.rest()) else {
        return derived;
    };

    if let Some(command) = &doc.first_key {
        derived.operation = command.clone();
        // For CRUD commands the command's own value is the collection name.
        if let Some(coll) = doc.get_str(command) {
            derived.collection = coll.to_string();
        }
    }
    if let Some(db) = doc.get_str("$db") {
        derived.database = db.to_string();
    }
    derived.user = user_from(&doc);
    derived.document_id = doc.id;

    derived
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test payload builders live in bson_scan's test module.
    use crate::bson_scan::tests::{doc, i32_elem, oid_elem, str_elem};

    fn frame(op: OpCode, body: &[u8]) -> (MessageHeader, Vec<u8>) {
        frame_raw(op.code(), body)
    }

    fn frame_raw(op_code: i32, body: &[u8]) -> (MessageHeader, Vec<u8>) {
        let size = (HEADER_LEN + body.len()) as u32;
        let mut bytes = Vec::with_capacity(size as usize);
        bytes.extend_from_slice(&size.to_le_bytes());
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&(-1i32).to_le_bytes());
        bytes.extend_from_slice(&op_code.to_le_bytes());
        bytes.extend_from_slice(body);

        let header = crate::header::decode_header(&bytes).unwrap();
        (header, bytes)
    }

    fn ns_bytes(ns: &str) -> Vec<u8> {
        let mut out = ns.as_bytes().to_vec();
        out.push(0);
        out
    }

    #[test]
    fn query_extracts_namespace_and_user() {
        let mut body = Vec::new();
        body.extend_from_slice(&0i32.to_le_bytes()); // flags
        body.extend_from_slice(&ns_bytes("admin.$cmd"));
        body.extend_from_slice(&0i32.to_le_bytes()); // numberToSkip
        body.extend_from_slice(&1i32.to_le_bytes()); // numberToReturn
        body.extend_from_slice(&doc(&[
            i32_elem("authenticate", 1),
            str_elem("user", "alice"),
        ]));

        let (header, bytes) = frame(OpCode::Query, &body);
        let msg = extract_message(&header, &bytes).unwrap();
        assert_eq!(msg.derived.operation, "query");
        assert_eq!(msg.derived.database, "admin");
        assert_eq!(msg.derived.collection, "$cmd");
        assert_eq!(msg.derived.user, "alice");
    }

    #[test]
    fn query_with_truncated_payload_has_empty_fields() {
        // Four bytes of flags and nothing else: still a valid message.
        let (header, bytes) = frame(OpCode::Query, &0i32.to_le_bytes());
        let msg = extract_message(&header, &bytes).unwrap();
        assert_eq!(msg.derived.operation, "query");
        assert!(msg.derived.database.is_empty());
        assert!(msg.derived.user.is_empty());
        assert!(msg.derived.document_id.is_none());
    }

    #[test]
    fn insert_reports_first_document_id() {
        let mut body = Vec::new();
        body.extend_from_slice(&0i32.to_le_bytes());
        body.extend_from_slice(&ns_bytes("app.users"));
        body.extend_from_slice(&doc(&[oid_elem("_id", [0x01; 12]), str_elem("name", "x")]));
        body.extend_from_slice(&doc(&[oid_elem("_id", [0x02; 12])]));

        let (header, bytes) = frame(OpCode::Insert, &body);
        let msg = extract_message(&header, &bytes).unwrap();
        assert_eq!(msg.derived.operation, "insert");
        assert_eq!(msg.derived.database, "app");
        assert_eq!(msg.derived.collection, "users");
        assert_eq!(
            msg.derived.document_id.as_deref(),
            Some("010101010101010101010101")
        );
    }

    #[test]
    fn update_takes_id_from_selector() {
        let mut body = Vec::new();
        body.extend_from_slice(&0i32.to_le_bytes()); // ZERO
        body.extend_from_slice(&ns_bytes("app.users"));
        body.extend_from_slice(&1i32.to_le_bytes()); // flags
        body.extend_from_slice(&doc(&[i32_elem("_id", 7)])); // selector
        body.extend_from_slice(&doc(&[str_elem("name", "renamed")])); // update

        let (header, bytes) = frame(OpCode::Update, &body);
        let msg = extract_message(&header, &bytes).unwrap();
        assert_eq!(msg.derived.operation, "update");
        assert_eq!(msg.derived.document_id.as_deref(), Some("7"));
    }

    #[test]
    fn delete_takes_id_from_selector() {
        let mut body = Vec::new();
        body.extend_from_slice(&0i32.to_le_bytes());
        body.extend_from_slice(&ns_bytes("app.users"));
        body.extend_from_slice(&0i32.to_le_bytes());
        body.extend_from_slice(&doc(&[str_elem("_id", "user-9")]));

        let (header, bytes) = frame(OpCode::Delete, &body);
        let msg = extract_message(&header, &bytes).unwrap();
        assert_eq!(msg.derived.operation, "delete");
        assert_eq!(msg.derived.collection, "users");
        assert_eq!(msg.derived.document_id.as_deref(), Some("user-9"));
    }

    #[test]
    fn get_more_reports_namespace_only() {
        let mut body = Vec::new();
        body.extend_from_slice(&0i32.to_le_bytes());
        body.extend_from_slice(&ns_bytes("app.events"));
        body.extend_from_slice(&100i32.to_le_bytes());
        body.extend_from_slice(&99i64.to_le_bytes());

        let (header, bytes) = frame(OpCode::GetMore, &body);
        let msg = extract_message(&header, &bytes).unwrap();
        assert_eq!(msg.derived.operation, "get_more");
        assert_eq!(msg.derived.collection, "events");
        assert!(msg.derived.document_id.is_none());
    }

    #[test]
    fn msg_command_document() {
        let mut body = Vec::new();
        body.extend_from_slice(&0u32.to_le_bytes()); // flagBits
        body.push(0); // section kind 0
        body.extend_from_slice(&doc(&[
            str_elem("insert", "orders"),
            str_elem("$db", "shop"),
        ]));

        let (header, bytes) = frame(OpCode::Msg, &body);
        let msg = extract_message(&header, &bytes).unwrap();
        assert_eq!(msg.derived.operation, "insert");
        assert_eq!(msg.derived.collection, "orders");
        assert_eq!(msg.derived.database, "shop");
    }

    #[test]
    fn msg_non_body_section_yields_defaults() {
        let mut body = Vec::new();
        body.extend_from_slice(&0u32.to_le_bytes());
        body.push(1); // document-sequence section
        body.extend_from_slice(&[0u8; 8]);

        let (header, bytes) = frame(OpCode::Msg, &body);
        let msg = extract_message(&header, &bytes).unwrap();
        assert_eq!(msg.derived.operation, "msg");
        assert!(msg.derived.collection.is_empty());
    }

    #[test]
    fn reply_opcode_is_not_implemented() {
        let (header, bytes) = frame(OpCode::Reply, &[0u8; 20]);
        let err = extract_message(&header, &bytes).unwrap_err();
        assert!(matches!(
            err,
            CodecError::NotImplemented {
                opcode: OpCode::Reply
            }
        ));
    }

    #[test]
    fn unknown_opcode_is_a_hard_error() {
        let (header, bytes) = frame_raw(0xFFFF, &[0u8; 4]);
        let err = extract_message(&header, &bytes).unwrap_err();
        assert!(matches!(err, CodecError::UnknownOpcode { code: 0xFFFF }));
    }

    #[test]
    fn kill_cursors_has_no_namespace() {
        let mut body = Vec::new();
        body.extend_from_slice(&0i32.to_le_bytes());
        body.extend_from_slice(&1i32.to_le_bytes());
        body.extend_from_slice(&5i64.to_le_bytes());

        let (header, bytes) = frame(OpCode::KillCursors, &body);
        let msg = extract_message(&header, &bytes).unwrap();
        assert_eq!(msg.derived.operation, "kill_cursors");
        assert!(msg.derived.database.is_empty());
    }
}
