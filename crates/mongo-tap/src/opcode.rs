use crate::error::CodecError;

/// The fixed opcode set of the MongoDB wire protocol.
///
/// Extending protocol coverage means adding a variant here and registering a
/// decoder in [`crate::message`]; nothing else changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// Server reply to OP_QUERY / OP_GET_MORE.
    Reply,
    Update,
    Insert,
    /// Formerly OP_MSG in ancient servers; kept reserved on the wire.
    Reserved,
    Query,
    GetMore,
    Delete,
    KillCursors,
    Command,
    CommandReply,
    /// The modern extensible message format (MongoDB 3.6+).
    Msg,
}

impl OpCode {
    /// The numeric tag carried in the message header.
    pub fn code(self) -> i32 {
        match self {
            OpCode::Reply => 1,
            OpCode::Update => 2001,
            OpCode::Insert => 2002,
            OpCode::Reserved => 2003,
            OpCode::Query => 2004,
            OpCode::GetMore => 2005,
            OpCode::Delete => 2006,
            OpCode::KillCursors => 2007,
            OpCode::Command => 2010,
            OpCode::CommandReply => 2011,
            OpCode::Msg => 2013,
        }
    }

    /// A lowercase label for logs and event payloads.
    pub fn label(self) -> &'static str {
        match self {
            OpCode::Reply => "reply",
            OpCode::Update => "update",
            OpCode::Insert => "insert",
            OpCode::Reserved => "reserved",
            OpCode::Query => "query",
            OpCode::GetMore => "get_more",
            OpCode::Delete => "delete",
            OpCode::KillCursors => "kill_cursors",
            OpCode::Command => "command",
            OpCode::CommandReply => "command_reply",
            OpCode::Msg => "msg",
        }
    }
}

impl TryFrom<i32> for OpCode {
    type Error = CodecError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(OpCode::Reply),
            2001 => Ok(OpCode::Update),
            2002 => Ok(OpCode::Insert),
            2003 => Ok(OpCode::Reserved),
            2004 => Ok(OpCode::Query),
            2005 => Ok(OpCode::GetMore),
            2006 => Ok(OpCode::Delete),
            2007 => Ok(OpCode::KillCursors),
            2010 => Ok(OpCode::Command),
            2011 => Ok(OpCode::CommandReply),
            2013 => Ok(OpCode::Msg),
            code => Err(CodecError::UnknownOpcode { code }),
        }
    }
}
