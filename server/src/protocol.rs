//! Line framing and message/command (de)serialization (§4.2, §6).
//!
//! Frames are CRLF/LF-terminated ASCII lines. Commands are capped at
//! [`MAX_COMMAND_LEN`] bytes; server messages that can carry a room list or
//! move history are capped at [`MAX_PAYLOAD_LEN`].

use std::fmt;

pub const MAX_COMMAND_LEN: usize = 256;
pub const MAX_PAYLOAD_LEN: usize = 4096;

/// A single line received from the client, already stripped of its
/// terminator and classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Heartbeat,
    Command(ClientCommand),
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Hello { name: String, id: String },
    List,
    New,
    Join { room_id: u64 },
    Move { text: String },
    Resign,
    DrawOffer,
    DrawAccept,
    DrawDecline,
    Exit,
}

/// Classifies a trimmed line (CR/LF already removed). Lines longer than
/// [`MAX_COMMAND_LEN`] are a framing error and must be rejected by the
/// caller before reaching this function.
pub fn classify(line: &str) -> Frame {
    if line == "PING" {
        return Frame::Heartbeat;
    }
    let mut parts = line.split(' ');
    let Some(opcode) = parts.next() else {
        return Frame::Malformed;
    };
    let rest: Vec<&str> = parts.collect();

    let command = match opcode {
        "HELLO" if rest.len() == 2 => ClientCommand::Hello {
            name: rest[0].to_string(),
            id: rest[1].to_string(),
        },
        "LIST" if rest.is_empty() => ClientCommand::List,
        "NEW" if rest.is_empty() => ClientCommand::New,
        "JOIN" if rest.len() == 1 => match rest[0].parse() {
            Ok(room_id) => ClientCommand::Join { room_id },
            Err(_) => return Frame::Malformed,
        },
        "MV" if rest.len() == 1 => ClientCommand::Move {
            text: rest[0].to_string(),
        },
        "RES" if rest.is_empty() => ClientCommand::Resign,
        "DRW_OFF" if rest.is_empty() => ClientCommand::DrawOffer,
        "DRW_ACC" if rest.is_empty() => ClientCommand::DrawAccept,
        "DRW_DEC" if rest.is_empty() => ClientCommand::DrawDecline,
        "EXT" if rest.is_empty() => ClientCommand::Exit,
        _ => return Frame::Malformed,
    };
    Frame::Command(command)
}

/// Every message the server can send. `Display` renders the wire form,
/// always newline-terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Welcome,
    RoomList(String),
    WaitingRoom(u64),
    Start { opponent_name: String, color: &'static str },
    OkMove,
    OppMove(String),
    Check,
    Checkmate,
    WinCheckmate,
    Stalemate,
    DrawOffer,
    DrawAccepted,
    DrawDeclined,
    Resigned,
    OppResigned,
    Timeout,
    OppTimeout,
    OppExit,
    OppKick,
    WaitConn,
    Resume { opponent_name: String, color: &'static str },
    OppResume { name: String, color: &'static str },
    History(String),
    Time(i64),
    Err(String),
    Full,
    Pong,
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Welcome => write!(f, "WELCOME"),
            ServerMessage::RoomList(s) => write!(f, "ROOMLIST {s}"),
            ServerMessage::WaitingRoom(id) => write!(f, "WAITING Room {id}"),
            ServerMessage::Start { opponent_name, color } => {
                write!(f, "START {opponent_name} {color}")
            }
            ServerMessage::OkMove => write!(f, "OK_MV"),
            ServerMessage::OppMove(mv) => write!(f, "OPP_MV {mv}"),
            ServerMessage::Check => write!(f, "CHK"),
            ServerMessage::Checkmate => write!(f, "CHKM"),
            ServerMessage::WinCheckmate => write!(f, "WIN_CHKM"),
            ServerMessage::Stalemate => write!(f, "SM"),
            ServerMessage::DrawOffer => write!(f, "DRW_OFF"),
            ServerMessage::DrawAccepted => write!(f, "DRW_ACD"),
            ServerMessage::DrawDeclined => write!(f, "DRW_DCD"),
            ServerMessage::Resigned => write!(f, "RES"),
            ServerMessage::OppResigned => write!(f, "OPP_RES"),
            ServerMessage::Timeout => write!(f, "TOUT"),
            ServerMessage::OppTimeout => write!(f, "OPP_TOUT"),
            ServerMessage::OppExit => write!(f, "OPP_EXT"),
            ServerMessage::OppKick => write!(f, "OPP_KICK"),
            ServerMessage::WaitConn => write!(f, "WAIT_CONN"),
            ServerMessage::Resume { opponent_name, color } => {
                write!(f, "RESUME {opponent_name} {color}")
            }
            ServerMessage::OppResume { name, color } => write!(f, "OPP_RESUME {name} {color}"),
            ServerMessage::History(moves) => write!(f, "HISTORY {moves}"),
            ServerMessage::Time(seconds) => write!(f, "TIME {seconds}"),
            ServerMessage::Err(reason) => write!(f, "ERR {reason}"),
            ServerMessage::Full => write!(f, "FULL"),
            ServerMessage::Pong => write!(f, "PNG"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_ping_as_heartbeat() {
        assert_eq!(classify("PING"), Frame::Heartbeat);
    }

    #[test]
    fn classifies_hello() {
        assert_eq!(
            classify("HELLO Alice id-a"),
            Frame::Command(ClientCommand::Hello {
                name: "Alice".to_string(),
                id: "id-a".to_string(),
            })
        );
    }

    #[test]
    fn classifies_move() {
        assert_eq!(
            classify("MV e2e4"),
            Frame::Command(ClientCommand::Move { text: "e2e4".to_string() })
        );
    }

    #[test]
    fn rejects_unknown_opcode() {
        assert_eq!(classify("FROBNICATE"), Frame::Malformed);
    }

    #[test]
    fn rejects_wrong_arity() {
        assert_eq!(classify("HELLO onlyonearg"), Frame::Malformed);
        assert_eq!(classify("LIST extra"), Frame::Malformed);
    }

    #[test]
    fn renders_start_message() {
        let msg = ServerMessage::Start { opponent_name: "Bob".to_string(), color: "white" };
        assert_eq!(msg.to_string(), "START Bob white");
    }

    #[test]
    fn renders_time_message() {
        assert_eq!(ServerMessage::Time(180).to_string(), "TIME 180");
    }
}
