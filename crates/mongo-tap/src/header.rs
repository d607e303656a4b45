use crate::error::CodecError;

/// Length of the fixed wire message header in bytes.
pub const HEADER_LEN: usize = 16;

/// The fixed header that prefixes every wire message.
///
/// `message_size` is the total length of the message *including* this
/// header, and is the sole framing authority: the extractor defers until
/// exactly that many bytes are buffered and consumes exactly that many.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub message_size: u32,
    pub request_id: i32,
    pub response_to: i32,
    /// Raw opcode tag. Converted to [`crate::OpCode`] at dispatch time so an
    /// unknown tag still frames correctly (the size field is trusted even
    /// when the opcode is not recognized).
    pub op_code: i32,
}

/// Decode the fixed-size header from a byte prefix.
///
/// Pure function of its input: requires at least [`HEADER_LEN`] bytes and
/// rejects a declared size smaller than the header itself. All fields are
/// little-endian per the wire format.
pub fn decode_header(buf: &[u8]) -> Result<MessageHeader, CodecError> {
    if buf.len() < HEADER_LEN {
        return Err(CodecError::InsufficientBytes {
            expected: HEADER_LEN,
            got: buf.len(),
        });
    }

    let message_size = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let request_id = i32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let response_to = i32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
    let op_code = i32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]);

    if (message_size as usize) < HEADER_LEN {
        return Err(CodecError::InvalidSize {
            size: message_size,
            header_len: HEADER_LEN,
        });
    }

    Ok(MessageHeader {
        message_size,
        request_id,
        response_to,
        op_code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::OpCode;

    pub(crate) fn header_bytes(size: u32, request_id: i32, response_to: i32, op: i32) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN);
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&request_id.to_le_bytes());
        out.extend_from_slice(&response_to.to_le_bytes());
        out.extend_from_slice(&op.to_le_bytes());
        out
    }

    #[test]
    fn decodes_all_fields_little_endian() {
        let bytes = header_bytes(20, 1, -1, OpCode::Query.code());
        let header = decode_header(&bytes).unwrap();
        assert_eq!(header.message_size, 20);
        assert_eq!(header.request_id, 1);
        assert_eq!(header.response_to, -1);
        assert_eq!(header.op_code, OpCode::Query.code());
    }

    #[test]
    fn short_prefix_needs_more_data() {
        let err = decode_header(&[0u8; 15]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::InsufficientBytes { expected: 16, got: 15 }
        ));
    }

    #[test]
    fn size_smaller_than_header_is_rejected() {
        let bytes = header_bytes(8, 1, 0, OpCode::Query.code());
        let err = decode_header(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::InvalidSize { size: 8, .. }));
    }

    #[test]
    fn unknown_opcode_still_decodes_as_raw_tag() {
        // Framing trusts the size field even for opcodes outside the set;
        // rejection happens at dispatch, not here.
        let bytes = header_bytes(24, 7, 0, 0xFFFF);
        let header = decode_header(&bytes).unwrap();
        assert_eq!(header.op_code, 0xFFFF);
    }

    #[test]
    fn ignores_trailing_bytes_beyond_header() {
        let mut bytes = header_bytes(32, 2, 0, OpCode::Insert.code());
        bytes.extend_from_slice(&[0xAB; 40]);
        let header = decode_header(&bytes).unwrap();
        assert_eq!(header.message_size, 32);
    }
}
