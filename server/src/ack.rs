//! The closed ack-code table (§6). The server sends one of these two-digit
//! codes immediately after receiving a recognized client command, before
//! any other handler output. §9 notes the source's mapping drifted across
//! iterations; this table is the fixed replacement.

use crate::protocol::ClientCommand;

pub const HELLO_ACCEPTED: u8 = 18;
pub const MOVE_RECEIVED: u8 = 19;
pub const DRAW_OFFER_RECEIVED: u8 = 20;
pub const DRAW_DECLINE_RECEIVED: u8 = 21;
pub const DRAW_ACCEPT_RECEIVED: u8 = 22;
pub const RESIGN_RECEIVED: u8 = 23;
pub const LIST_RECEIVED: u8 = 30;
pub const NEW_RECEIVED: u8 = 28;
pub const JOIN_RECEIVED: u8 = 29;
pub const EXIT_RECEIVED: u8 = 31;
pub const GENERIC_ERROR: u8 = 4;
pub const GENERIC_FALLBACK: u8 = 99;

/// Ack code for a recognized client command. `PING` has no ack; it never
/// reaches here since `classify` resolves it to `Frame::Heartbeat` (§4.2),
/// not a `ClientCommand`.
pub fn ack_for(command: &ClientCommand) -> u8 {
    match command {
        ClientCommand::Hello { .. } => HELLO_ACCEPTED,
        ClientCommand::List => LIST_RECEIVED,
        ClientCommand::New => NEW_RECEIVED,
        ClientCommand::Join { .. } => JOIN_RECEIVED,
        ClientCommand::Move { .. } => MOVE_RECEIVED,
        ClientCommand::Resign => RESIGN_RECEIVED,
        ClientCommand::DrawOffer => DRAW_OFFER_RECEIVED,
        ClientCommand::DrawAccept => DRAW_ACCEPT_RECEIVED,
        ClientCommand::DrawDecline => DRAW_DECLINE_RECEIVED,
        ClientCommand::Exit => EXIT_RECEIVED,
    }
}

/// Two-digit, zero-padded ack line as sent on the wire.
pub fn format_ack(code: u8) -> String {
    format!("{code:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_as_two_digits() {
        assert_eq!(format_ack(4), "04");
        assert_eq!(format_ack(18), "18");
        assert_eq!(format_ack(99), "99");
    }

    #[test]
    fn every_non_ping_command_has_an_ack() {
        let commands = [
            ClientCommand::Hello { name: "a".into(), id: "b".into() },
            ClientCommand::List,
            ClientCommand::New,
            ClientCommand::Join { room_id: 1 },
            ClientCommand::Move { text: "e2e4".into() },
            ClientCommand::Resign,
            ClientCommand::DrawOffer,
            ClientCommand::DrawAccept,
            ClientCommand::DrawDecline,
            ClientCommand::Exit,
        ];
        for command in commands {
            let _ = ack_for(&command);
        }
    }
}
