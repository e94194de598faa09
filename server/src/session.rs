//! The per-connection session state machine (§4.6): Handshake → Lobby →
//! Waiting → Game → Disconnected. Runs on a dedicated tokio task pair per
//! connection — a reader task (this module's entry point) and a writer
//! task draining an mpsc channel — following the split used by the
//! teacher's `actors::websocket::handle_socket`.

use crate::ack::{ack_for, format_ack};
use crate::counter::PlayerCounter;
use crate::errors::ProtocolError;
use crate::matchroom::{MatchHandle, MatchState};
use crate::protocol::{classify, ClientCommand, Frame, ServerMessage, MAX_COMMAND_LEN};
use crate::registry::Registry;
use crate::seat::{OutboundHandle, Seat};
use chess_rules::{
    apply_move, is_checkmate, is_fifty_move_draw, is_in_check, is_stalemate, legal_moves, Color, Move, PieceKind,
    Square,
};
use chrono::Utc;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

const MAX_ERRORS: u32 = 3;

/// Accumulates bytes from the socket into a line buffer that outlives any
/// single `read_line` call. `tokio::io::AsyncReadExt::read` is cancel-safe
/// (a cancelled call is guaranteed to have consumed nothing), so wrapping
/// `read_line` in `tokio::time::timeout` — needed to poll match state
/// alongside waiting on the client — never loses a partial line the way
/// cancelling a raw `read_until` would.
struct Reader {
    socket: tokio::net::tcp::OwnedReadHalf,
    pending: Vec<u8>,
}

impl Reader {
    fn new(socket: tokio::net::tcp::OwnedReadHalf) -> Self {
        Reader { socket, pending: Vec::new() }
    }

    async fn read_line(&mut self) -> anyhow::Result<Option<String>> {
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
                while line.last() == Some(&b'\n') || line.last() == Some(&b'\r') {
                    line.pop();
                }
                let line = String::from_utf8(line).map_err(|_| anyhow::anyhow!("non-ASCII line"))?;
                return Ok(Some(line));
            }
            if self.pending.len() > MAX_COMMAND_LEN {
                anyhow::bail!("command line exceeds {MAX_COMMAND_LEN} bytes");
            }
            let mut chunk = [0u8; 512];
            let n = self.socket.read(&mut chunk).await?;
            if n == 0 {
                return if self.pending.is_empty() {
                    Ok(None)
                } else {
                    anyhow::bail!("connection closed mid-line")
                };
            }
            self.pending.extend_from_slice(&chunk[..n]);
        }
    }
}

pub struct SessionContext {
    pub registry: Arc<Registry>,
    pub counter: Arc<PlayerCounter>,
}

/// Drives one accepted connection through its whole lifetime. Errors from
/// the transport itself are logged and simply end the task; the watchdog
/// (for an in-progress match) and the counter are the only state that
/// outlives this function returning.
pub async fn handle_connection(stream: TcpStream, ctx: Arc<SessionContext>) {
    let peer = stream.peer_addr().ok();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = Reader::new(read_half);
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer_task = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if write_half.write_all(b"\r\n").await.is_err() {
                break;
            }
        }
    });
    let outbound = OutboundHandle::new(tx);

    outbound.send(ServerMessage::Welcome);

    if let Err(err) = run(&mut reader, outbound, ctx).await {
        log::info!("session for {peer:?} ended: {err}");
    }

    writer_task.abort();
}

async fn run(reader: &mut Reader, outbound: OutboundHandle, ctx: Arc<SessionContext>) -> anyhow::Result<()> {
    let Some(line) = reader.read_line().await? else {
        return Ok(());
    };
    let Frame::Command(ClientCommand::Hello { name, id }) = classify(&line) else {
        outbound.send(ServerMessage::Err("expected HELLO".to_string()));
        return Ok(());
    };

    if let Some(handle) = ctx.registry.find_reconnectable(&name, &id) {
        reconnect(reader, outbound, ctx, handle, name, id).await
    } else {
        fresh_session(reader, outbound, ctx, name, id).await
    }
}

async fn reconnect(
    reader: &mut Reader,
    outbound: OutboundHandle,
    ctx: Arc<SessionContext>,
    handle: MatchHandle,
    name: String,
    id: String,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let (my_color, opponent_name, opponent_color, history, remaining) = {
        let mut state = handle.lock();
        let my_color = [Color::White, Color::Black]
            .into_iter()
            .find(|&c| state.seat(c).as_ref().is_some_and(|s| s.matches_identity(&name, &id)))
            .expect("find_reconnectable only returns matches with a matching seat");
        if let Some(seat) = state.seat_mut(my_color) {
            seat.reconnect(outbound.clone(), now);
        }
        state.try_resume(now);
        let opponent_color = my_color.opposite();
        let opponent_name = state.seat(opponent_color).as_ref().map(|s| s.name.clone());
        let history = state.history_line();
        let remaining = state.remaining_seconds(now);
        (my_color, opponent_name, opponent_color, history, remaining)
    };

    send_ack(&outbound, &ClientCommand::Hello { name: name.clone(), id: id.clone() });
    let color_str = color_name(my_color);
    if let Some(opp_name) = &opponent_name {
        outbound.send(ServerMessage::Resume { opponent_name: opp_name.clone(), color: color_str });
        let opp_color_str = color_name(opponent_color);
        let state = handle.lock();
        if let Some(opp_seat) = state.seat(opponent_color) {
            opp_seat.send(ServerMessage::OppResume { name: name.clone(), color: opp_color_str });
        }
    }
    outbound.send(ServerMessage::History(history));
    {
        let state = handle.lock();
        state.broadcast(ServerMessage::Time(remaining));
    }

    let paired = handle.lock().black.is_some();
    if paired {
        game_loop(reader, outbound, ctx, handle, my_color, name, id).await
    } else {
        waiting_loop(reader, outbound, ctx, handle, name, id).await
    }
}

async fn fresh_session(
    reader: &mut Reader,
    outbound: OutboundHandle,
    ctx: Arc<SessionContext>,
    name: String,
    id: String,
) -> anyhow::Result<()> {
    if ctx.counter.try_admit().is_err() {
        outbound.send(ServerMessage::Full);
        return Ok(());
    }
    send_ack(&outbound, &ClientCommand::Hello { name: name.clone(), id: id.clone() });

    lobby_loop(reader, outbound, ctx, name, id).await
}

fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "white",
        Color::Black => "black",
    }
}

fn send_ack(outbound: &OutboundHandle, command: &ClientCommand) {
    outbound.send_raw(format_ack(ack_for(command)));
}

/// Registers one protocol violation and reports whether this trips the
/// kick threshold (§7: "each" violation increments the session's error
/// counter, in every FSM state, not just mid-game). `error_count` is
/// whichever counter is live in the caller's current state: a seat's
/// match-scoped count in Waiting/Game, or a loop-local count in Lobby
/// where no seat exists yet.
fn record_violation(outbound: &OutboundHandle, err: ProtocolError, error_count: &mut u32) -> bool {
    outbound.send(ServerMessage::Err(err.to_string()));
    *error_count += 1;
    if *error_count >= MAX_ERRORS {
        outbound.send(ServerMessage::Err("Too many invalid messages. Disconnecting.".to_string()));
        true
    } else {
        false
    }
}

async fn lobby_loop(
    reader: &mut Reader,
    outbound: OutboundHandle,
    ctx: Arc<SessionContext>,
    name: String,
    id: String,
) -> anyhow::Result<()> {
    let mut error_count = 0u32;
    loop {
        let Some(line) = reader.read_line().await? else {
            ctx.counter.release();
            return Ok(());
        };
        match classify(&line) {
            Frame::Heartbeat => outbound.send(ServerMessage::Pong),
            Frame::Command(ClientCommand::List) => {
                send_ack(&outbound, &ClientCommand::List);
                outbound.send(ServerMessage::RoomList(ctx.registry.list_open()));
            }
            Frame::Command(ClientCommand::New) => {
                send_ack(&outbound, &ClientCommand::New);
                let seat = Seat::new(name.clone(), id.clone(), outbound.clone(), Utc::now());
                let state = MatchState::new(0, seat);
                let handle = MatchHandle::new(state);
                let room_id = match ctx.registry.register(handle.clone()) {
                    Ok(room_id) => room_id,
                    Err(_) => {
                        outbound.send(ServerMessage::Err("Server room limit reached".to_string()));
                        continue;
                    }
                };
                handle.lock().add_ref(); // the watchdog's own holder
                crate::watchdog::spawn_watchdog(handle.clone(), ctx.registry.clone(), ctx.counter.clone());
                outbound.send(ServerMessage::WaitingRoom(room_id));
                return waiting_loop(reader, outbound, ctx, handle, name, id).await;
            }
            Frame::Command(ClientCommand::Join { room_id }) => {
                send_ack(&outbound, &ClientCommand::Join { room_id });
                let Some(handle) = ctx.registry.find_open(room_id) else {
                    outbound.send(ServerMessage::Err("room not found or already full".to_string()));
                    continue;
                };
                let seat = Seat::new(name.clone(), id.clone(), outbound.clone(), Utc::now());
                if handle.lock().join(seat, Utc::now()).is_err() {
                    outbound.send(ServerMessage::Err("room not found or already full".to_string()));
                    continue;
                }
                let remaining = {
                    let state = handle.lock();
                    if let Some(white) = &state.white {
                        white.send(ServerMessage::Start { opponent_name: name.clone(), color: "white" });
                    }
                    outbound.send(ServerMessage::Start {
                        opponent_name: state.host_name().unwrap_or_default().to_string(),
                        color: "black",
                    });
                    state.remaining_seconds(Utc::now())
                };
                handle.lock().broadcast(ServerMessage::Time(remaining));
                return game_loop(reader, outbound, ctx, handle, Color::Black, name, id).await;
            }
            Frame::Command(ClientCommand::Exit) => {
                send_ack(&outbound, &ClientCommand::Exit);
                ctx.counter.release();
                return Ok(());
            }
            _ => {
                if record_violation(&outbound, ProtocolError::UnknownCommand, &mut error_count) {
                    ctx.counter.release();
                    return Ok(());
                }
            }
        }
    }
}

async fn waiting_loop(
    reader: &mut Reader,
    outbound: OutboundHandle,
    ctx: Arc<SessionContext>,
    handle: MatchHandle,
    name: String,
    id: String,
) -> anyhow::Result<()> {
    loop {
        if handle.lock().black.is_some() {
            return game_loop(reader, outbound, ctx, handle, Color::White, name, id).await;
        }

        let line = match tokio::time::timeout(std::time::Duration::from_millis(250), reader.read_line()).await {
            Ok(result) => result?,
            Err(_elapsed) => continue,
        };
        let Some(line) = line else {
            leave_waiting_room(&ctx, &handle);
            return Ok(());
        };

        match classify(&line) {
            Frame::Heartbeat => outbound.send(ServerMessage::Pong),
            Frame::Command(ClientCommand::Exit) => {
                send_ack(&outbound, &ClientCommand::Exit);
                destroy_waiting_room(&ctx, &handle);
                return lobby_loop(reader, outbound, ctx, name, id).await;
            }
            _ => {
                let kicked = {
                    let mut state = handle.lock();
                    match state.seat_mut(Color::White) {
                        Some(seat) => record_violation(&outbound, ProtocolError::UnknownCommand, &mut seat.error_count),
                        None => false,
                    }
                };
                if kicked {
                    leave_waiting_room(&ctx, &handle);
                    return Ok(());
                }
            }
        }
    }
}

/// Removes `color`'s seat from the match and, if that was the last live
/// holder, unregisters it — the refcount bookkeeping shared by every exit
/// path (§9 "refcount soundness"). Never touches the admission counter:
/// callers decide separately whether this session's slot is released.
fn leave_match(ctx: &SessionContext, handle: &MatchHandle, color: Color) {
    let mut state = handle.lock();
    let destroyed = state.leave_by_client(color);
    drop(state);
    if destroyed {
        ctx.registry.unregister(handle.id());
    }
}

/// A waiting host's transport actually dropped, or the host was kicked for
/// protocol violations: real teardown, so the admission slot is released
/// here (§9/original `client_worker`'s cleanup — `decrement_player_count`
/// only fires at true disconnect, never when a session merely returns to
/// Lobby).
fn leave_waiting_room(ctx: &SessionContext, handle: &MatchHandle) {
    {
        let mut state = handle.lock();
        state.mark_finished();
        if let Some(seat) = state.seat_mut(Color::White) {
            seat.release_count(&ctx.counter);
        }
    }
    leave_match(ctx, handle, Color::White);
}

/// The host cancelled the room with `EXT`: the room is destroyed but the
/// session stays connected and returns to Lobby, so its admission slot is
/// kept (§4.6 Waiting: "destroy it, return to Lobby").
fn destroy_waiting_room(ctx: &SessionContext, handle: &MatchHandle) {
    handle.lock().mark_finished();
    leave_match(ctx, handle, Color::White);
}

async fn game_loop(
    reader: &mut Reader,
    outbound: OutboundHandle,
    ctx: Arc<SessionContext>,
    handle: MatchHandle,
    my_color: Color,
    name: String,
    id: String,
) -> anyhow::Result<()> {
    loop {
        // `finished` may have been set by the opponent's session or by the
        // watchdog, not just by our own last command, so it is checked
        // before every read rather than only after processing our own
        // input (§4.6's "observing finished... set by another thread"). In
        // every case this means returning to Lobby, never disconnecting —
        // the only path that disconnects is this session's own kick, below.
        if handle.lock().finished {
            leave_match(&ctx, &handle, my_color);
            return lobby_loop(reader, outbound, ctx, name, id).await;
        }

        let line = match tokio::time::timeout(std::time::Duration::from_millis(250), reader.read_line()).await {
            Ok(result) => result?,
            Err(_elapsed) => continue,
        };
        let Some(line) = line else {
            let now = Utc::now();
            handle.lock().release_after_client(my_color, now);
            return Ok(());
        };

        let command = classify(&line);
        if let Frame::Command(cmd) = &command {
            send_ack(&outbound, cmd);
        }

        let error = match &command {
            Frame::Heartbeat => {
                outbound.send(ServerMessage::Pong);
                None
            }
            Frame::Command(ClientCommand::Move { text }) => handle_move(&handle, my_color, text),
            Frame::Command(ClientCommand::Resign) => {
                handle_resign(&handle, my_color);
                None
            }
            Frame::Command(ClientCommand::DrawOffer) => {
                handle_draw_offer(&handle, my_color);
                None
            }
            Frame::Command(ClientCommand::DrawAccept) => handle_draw_accept(&handle, my_color),
            Frame::Command(ClientCommand::DrawDecline) => handle_draw_decline(&handle, my_color),
            Frame::Command(ClientCommand::Exit) => {
                handle_exit(&handle, my_color);
                None
            }
            _ => Some(ProtocolError::UnknownCommand),
        };

        if let Some(err) = error {
            let kicked = {
                let mut state = handle.lock();
                match state.seat_mut(my_color) {
                    Some(seat) => record_violation(&outbound, err, &mut seat.error_count),
                    None => false,
                }
            };
            if kicked {
                {
                    let mut state = handle.lock();
                    state.mark_finished();
                    if let Some(opponent) = state.seat(my_color.opposite()) {
                        opponent.send(ServerMessage::OppKick);
                    }
                    if let Some(seat) = state.seat_mut(my_color) {
                        seat.release_count(&ctx.counter);
                    }
                }
                leave_match(&ctx, &handle, my_color);
                return Ok(());
            }
        }

        if handle.lock().finished {
            leave_match(&ctx, &handle, my_color);
            return lobby_loop(reader, outbound, ctx, name, id).await;
        }
    }
}

fn handle_resign(handle: &MatchHandle, color: Color) {
    let mut state = handle.lock();
    state.mark_finished();
    if let Some(seat) = state.seat(color) {
        seat.send(ServerMessage::Resigned);
    }
    if let Some(seat) = state.seat(color.opposite()) {
        seat.send(ServerMessage::OppResigned);
    }
}

fn handle_exit(handle: &MatchHandle, color: Color) {
    let mut state = handle.lock();
    state.mark_finished();
    if let Some(opponent) = state.seat(color.opposite()) {
        opponent.send(ServerMessage::OppExit);
    }
}

fn handle_draw_offer(handle: &MatchHandle, color: Color) {
    let mut state = handle.lock();
    state.draw_offered_by = Some(color);
    if let Some(opponent) = state.seat(color.opposite()) {
        opponent.send(ServerMessage::DrawOffer);
    }
}

fn handle_draw_accept(handle: &MatchHandle, color: Color) -> Option<ProtocolError> {
    let mut state = handle.lock();
    if state.draw_offered_by != Some(color.opposite()) {
        return Some(ProtocolError::NoStandingDrawOffer);
    }
    state.draw_offered_by = None;
    state.mark_finished();
    state.broadcast(ServerMessage::DrawAccepted);
    None
}

fn handle_draw_decline(handle: &MatchHandle, color: Color) -> Option<ProtocolError> {
    let mut state = handle.lock();
    if state.draw_offered_by != Some(color.opposite()) {
        return Some(ProtocolError::NoStandingDrawOffer);
    }
    state.draw_offered_by = None;
    if let Some(offerer) = state.seat(color.opposite()) {
        offerer.send(ServerMessage::DrawDeclined);
    }
    None
}

/// Parses and applies `text` as a move for `color`, driving the full
/// outcome sequence from §4.6's `MV` handler.
fn handle_move(handle: &MatchHandle, color: Color, text: &str) -> Option<ProtocolError> {
    let mv = match parse_move(text) {
        Ok(mv) => mv,
        Err(err) => return Some(err),
    };
    let mut state = handle.lock();

    if state.position.turn != color {
        return Some(ProtocolError::NotYourTurn);
    }

    let legal = legal_moves(&state.position);
    let chosen = legal
        .iter()
        .find(|c| c.from == mv.from && c.to == mv.to && c.promotion == mv.promotion)
        .or_else(|| {
            // A pawn reaching the last rank with no promo character
            // defaults to queen (§8 boundary behavior); an unrecognized
            // promo char never reaches here since `parse_move` already
            // folds that case to `Some(Queen)`.
            if mv.promotion.is_none() {
                legal.iter().find(|c| c.from == mv.from && c.to == mv.to && c.promotion == Some(PieceKind::Queen))
            } else {
                None
            }
        })
        .copied();
    let Some(chosen) = chosen else {
        return Some(ProtocolError::IllegalMove);
    };

    let next = apply_move(&state.position, chosen);
    state.position = next;
    state.append_move(text.to_string());
    state.timer.reset_turn(Utc::now());
    state.draw_offered_by = None;

    if let Some(seat) = state.seat(color) {
        seat.send(ServerMessage::OkMove);
    }
    if let Some(seat) = state.seat(color.opposite()) {
        seat.send(ServerMessage::OppMove(text.to_string()));
    }

    if is_checkmate(&state.position) {
        state.mark_finished();
        if let Some(seat) = state.seat(color) {
            seat.send(ServerMessage::WinCheckmate);
        }
        if let Some(seat) = state.seat(color.opposite()) {
            seat.send(ServerMessage::Checkmate);
        }
    } else if is_stalemate(&state.position) {
        state.mark_finished();
        state.broadcast(ServerMessage::Stalemate);
    } else if is_fifty_move_draw(&state.position) {
        state.mark_finished();
        state.broadcast(ServerMessage::Stalemate);
    } else if is_in_check(&state.position) {
        let mover = state.position.turn;
        if let Some(seat) = state.seat(mover) {
            seat.send(ServerMessage::Check);
        }
    }

    if !state.finished {
        let remaining = state.remaining_seconds(Utc::now());
        state.broadcast(ServerMessage::Time(remaining));
    }

    None
}

/// Promotes the engine-agnostic parse result into a `Move`, folding an
/// unrecognized or missing promotion letter to Queen — the server's
/// leniency policy, not a rules-engine concern.
fn parse_move(text: &str) -> Result<Move, ProtocolError> {
    let parsed = chess_rules::parse_uci_move(text).map_err(|_| ProtocolError::MalformedMove)?;
    let promotion = parsed
        .promotion
        .map(|c| PieceKind::from_promo_char(c).unwrap_or(PieceKind::Queen));
    Ok(Move { from: parsed.from, to: parsed.to, promotion, kind: chess_rules::MoveKind::Normal })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_move() {
        let mv = parse_move("e2e4").unwrap();
        assert_eq!(mv.from, Square::new(6, 4));
        assert_eq!(mv.to, Square::new(4, 4));
        assert_eq!(mv.promotion, None);
    }

    #[test]
    fn parses_promotion_move() {
        let mv = parse_move("a7a8q").unwrap();
        assert_eq!(mv.promotion, Some(PieceKind::Queen));
    }

    #[test]
    fn unrecognized_promo_char_defaults_to_queen() {
        let mv = parse_move("a7a8z").unwrap();
        assert_eq!(mv.promotion, Some(PieceKind::Queen));
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(parse_move("e2e"), Err(ProtocolError::MalformedMove));
        assert_eq!(parse_move("e2e4qq"), Err(ProtocolError::MalformedMove));
    }
}
