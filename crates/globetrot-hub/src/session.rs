//! Per-connection protocol state machine.
//!
//! A [`Session`] is driven by the transport: [`open`](Session::open) once the
//! socket is upgraded, [`handle_text`](Session::handle_text) for every text
//! frame, and [`close`](Session::close) when the socket goes away. Close is
//! idempotent and safe to race with the liveness sweeper.

use std::sync::Arc;

use globetrot_core::{
    ChatMessage, ErrorCode, HubError, InboundEvent, OutboundEvent, Result, ServerEvent, Topic,
};
use metrics::{counter, gauge};
use tracing::{debug, error, info, instrument, warn};

use crate::connection::ClientConnection;
use crate::hub::Hub;
use crate::metrics::{
    INBOUND_EVENTS_TOTAL, MALFORMED_PAYLOADS_TOTAL, PARTICIPANTS_ACTIVE, SESSIONS_CLOSED_TOTAL,
    SESSIONS_OPENED_TOTAL,
};

/// Lifecycle of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Name allocated, not yet registered.
    Connecting,
    /// Registered and subscribed; accepting events.
    Open,
    /// Terminal.
    Closed,
}

impl SessionState {
    /// Lowercase label for errors and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

/// Protocol handler bound to one connection and one display name.
pub struct Session {
    hub: Arc<Hub>,
    conn: Arc<ClientConnection>,
    name: String,
    state: SessionState,
}

impl Session {
    /// Create a session for a connection that was assigned `name`.
    pub fn new(hub: Arc<Hub>, conn: Arc<ClientConnection>, name: impl Into<String>) -> Self {
        Self {
            hub,
            conn,
            name: name.into(),
            state: SessionState::Connecting,
        }
    }

    /// Display name assigned to this session.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Arc<ClientConnection> {
        &self.conn
    }

    /// Register the participant, subscribe its topics and send `init`.
    ///
    /// On a duplicate name the client receives an `error` event, the session
    /// closes and the error is returned so the transport drops the socket.
    /// The name is not released: it belongs to the live holder.
    #[instrument(skip_all, fields(name = %self.name, conn_id = %self.conn.id))]
    pub fn open(&mut self) -> Result<()> {
        self.expect_state(SessionState::Connecting)?;

        if let Err(e) = self.hub.registry().register(&self.name, &self.conn.id) {
            error!(error = %e, "failed to register participant");
            let _ = self
                .conn
                .send_event(&OutboundEvent::error(ErrorCode::DuplicateName, e.to_string()).into());
            self.state = SessionState::Closed;
            return Err(e);
        }

        self.hub.attach(self.conn.clone());
        let router = self.hub.router();
        router.subscribe(&Topic::Users, &self.conn);
        router.subscribe(&Topic::chat(self.name.clone()), &self.conn);

        let users = self.hub.registry().snapshot();
        let _ = self.send(OutboundEvent::Init {
            username: self.name.clone(),
            users,
        });

        self.state = SessionState::Open;
        counter!(SESSIONS_OPENED_TOTAL).increment(1);
        gauge!(PARTICIPANTS_ACTIVE).set(self.hub.registry().len() as f64);
        info!("participant joined");
        Ok(())
    }

    /// Handle one inbound text frame.
    ///
    /// Malformed frames are answered with an `error` event and leave the
    /// session open without refreshing liveness.
    ///
    /// Outside the `Open` state the client is told with an `INVALID_STATE`
    /// error event and the error is returned so the transport stops reading.
    #[instrument(skip_all, fields(name = %self.name, conn_id = %self.conn.id))]
    pub fn handle_text(&mut self, text: &str) -> Result<()> {
        if let Err(e) = self.expect_state(SessionState::Open) {
            let _ = self.send(OutboundEvent::error(ErrorCode::InvalidState, e.to_string()));
            return Err(e);
        }

        if self.conn.is_closed() {
            debug!("ignoring frame on evicted connection");
            return Ok(());
        }

        let event = match InboundEvent::parse(text) {
            Ok(event) => event,
            Err(e) => {
                counter!(MALFORMED_PAYLOADS_TOTAL).increment(1);
                warn!(error = %e, len = text.len(), "rejected malformed frame");
                let _ = self.send(OutboundEvent::error(ErrorCode::InvalidPayload, e.to_string()));
                return Ok(());
            }
        };

        if !self.hub.registry().touch(&self.name, &self.conn.id) {
            debug!(kind = event.kind(), "ignoring frame for participant no longer registered");
            return Ok(());
        }
        counter!(INBOUND_EVENTS_TOTAL, "type" => event.kind()).increment(1);

        match event {
            InboundEvent::Heartbeat {} => {
                let _ = self.send(OutboundEvent::HeartbeatAck {});
            }
            InboundEvent::Position { pos_x, pos_y } => {
                let updated = self
                    .hub
                    .registry()
                    .update_position(&self.name, &self.conn.id, pos_x, pos_y);
                if let Some(updated) = updated {
                    let _ = self
                        .hub
                        .router()
                        .publish(&Topic::Users, &ServerEvent::Participant(updated));
                }
            }
            InboundEvent::VisitedCountry { countries } => {
                let _ = self
                    .hub
                    .registry()
                    .update_countries(&self.name, &self.conn.id, countries);
            }
            InboundEvent::GetCountries { username } => {
                let reply = match self.hub.registry().countries(&username) {
                    Some(countries) => OutboundEvent::GetCountries { username, countries },
                    None => {
                        let e = HubError::NotFound(username);
                        debug!(error = %e, "countries query for absent participant");
                        OutboundEvent::error(ErrorCode::ParticipantNotFound, e.to_string())
                    }
                };
                let _ = self.send(reply);
            }
            InboundEvent::Chat {
                recipient_username,
                message,
            } => {
                let topic = Topic::chat(recipient_username.clone());
                let msg = ChatMessage::new(
                    self.name.clone(),
                    recipient_username,
                    message,
                    self.hub.clock().now_millis(),
                );
                let delivered = self
                    .hub
                    .router()
                    .publish(&topic, &OutboundEvent::from(msg).into());
                debug!(%topic, delivered, "chat routed");
            }
        }
        Ok(())
    }

    /// Tear the session down.
    ///
    /// Returns `true` if this call removed the participant (and therefore
    /// broadcast the refreshed roster). Later calls, or a close that lost the
    /// race with the sweeper, return `false` and broadcast nothing.
    #[instrument(skip_all, fields(name = %self.name, conn_id = %self.conn.id))]
    pub fn close(&mut self) -> bool {
        let previous = self.state;
        self.state = SessionState::Closed;
        match previous {
            SessionState::Closed => false,
            SessionState::Connecting => {
                self.hub.names().release(&self.name);
                false
            }
            SessionState::Open => {
                self.hub.forget(&self.conn.id);
                counter!(SESSIONS_CLOSED_TOTAL).increment(1);
                if !self.hub.detach(&self.name, &self.conn.id) {
                    return false;
                }
                let notified = self.hub.announce_roster();
                info!(notified, "participant left");
                true
            }
        }
    }

    fn send(&self, event: OutboundEvent) -> bool {
        let sent = self.conn.send_event(&event.into());
        if !sent {
            warn!("outbound queue full or closed, frame dropped");
        }
        sent
    }

    fn expect_state(&self, expected: SessionState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(HubError::InvalidState {
                expected: expected.as_str(),
                actual: self.state.as_str(),
            })
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("conn_id", &self.conn.id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::HubConfig;
    use crate::names::{NameAllocator, NamePool};
    use globetrot_core::{Clock, ConnectionId, ManualClock};
    use serde_json::Value;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Harness {
        hub: Arc<Hub>,
        names: Arc<NamePool>,
        clock: Arc<ManualClock>,
    }

    struct Client {
        session: Session,
        rx: mpsc::Receiver<Arc<String>>,
    }

    impl Client {
        fn next(&mut self) -> Value {
            let frame = self.rx.try_recv().expect("expected a frame");
            serde_json::from_str(&frame).unwrap()
        }

        fn drain(&mut self) -> Vec<Value> {
            std::iter::from_fn(|| self.rx.try_recv().ok())
                .map(|f| serde_json::from_str(&f).unwrap())
                .collect()
        }

        fn send(&mut self, text: &str) {
            self.session.handle_text(text).unwrap();
        }
    }

    impl Harness {
        fn new() -> Self {
            let names = Arc::new(NamePool::default());
            let clock = Arc::new(ManualClock::new(1_700_000_000_000));
            let hub = Arc::new(Hub::new(HubConfig::default(), names.clone(), clock.clone()));
            Self { hub, names, clock }
        }

        fn session(&self, name: &str) -> Client {
            let (tx, rx) = mpsc::channel(32);
            let conn = Arc::new(ClientConnection::new(ConnectionId::new(), tx));
            Client {
                session: Session::new(self.hub.clone(), conn, name),
                rx,
            }
        }

        fn connect(&self, name: &str) -> Client {
            let mut client = self.session(name);
            client.session.open().unwrap();
            client
        }

        fn connect_from_pool(&self) -> Client {
            let name = self.names.acquire().unwrap();
            self.connect(&name)
        }
    }

    #[test]
    fn open_sends_init_with_self() {
        let h = Harness::new();
        let mut lynx = h.connect("Lynx philosophe");
        assert_eq!(lynx.session.state(), SessionState::Open);

        let init = lynx.next();
        assert_eq!(init["type"], "init");
        assert_eq!(init["username"], "Lynx philosophe");
        let users = init["users"].as_array().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0]["username"], "Lynx philosophe");
        assert_eq!(users[0]["posX"], 0.0);
    }

    #[test]
    fn each_init_snapshot_lists_everyone_so_far() {
        let h = Harness::new();
        let mut clients: Vec<Client> = (0..4).map(|_| h.connect_from_pool()).collect();
        for (i, client) in clients.iter_mut().enumerate() {
            let init = client.next();
            assert_eq!(init["users"].as_array().unwrap().len(), i + 1);
            assert_eq!(init["users"][i]["username"], client.session.name());
        }
    }

    #[test]
    fn open_twice_is_invalid_state() {
        let h = Harness::new();
        let mut lynx = h.connect("Lynx");
        let err = lynx.session.open().unwrap_err();
        assert!(matches!(
            err,
            HubError::InvalidState {
                expected: "connecting",
                actual: "open"
            }
        ));
    }

    #[test]
    fn duplicate_name_closes_without_releasing() {
        let h = Harness::new();
        let name = h.names.acquire().unwrap();
        let _first = h.connect(&name);
        let available = h.names.available();

        let mut second = h.session(&name);
        let err = second.session.open().unwrap_err();
        assert!(matches!(err, HubError::DuplicateName(_)));
        assert_eq!(second.session.state(), SessionState::Closed);
        let frame = second.next();
        assert_eq!(frame["type"], "error");
        assert_eq!(frame["code"], "DUPLICATE_NAME");

        assert!(!second.session.close());
        assert!(h.hub.registry().contains(&name));
        assert_eq!(h.names.available(), available);
    }

    #[test]
    fn handle_text_before_open_is_invalid_state() {
        let h = Harness::new();
        let mut client = h.session("Lynx");
        let err = client.session.handle_text(r#"{"type":"heartbeat"}"#).unwrap_err();
        assert!(matches!(err, HubError::InvalidState { .. }));
        let frame = client.next();
        assert_eq!(frame["type"], "error");
        assert_eq!(frame["code"], "INVALID_STATE");
    }

    #[test]
    fn heartbeat_acks_and_refreshes_liveness() {
        let h = Harness::new();
        let mut lynx = h.connect("Lynx");
        let _ = lynx.drain();
        h.clock.advance(Duration::from_secs(3));

        lynx.send(r#"{"type":"heartbeat"}"#);
        assert_eq!(lynx.next()["type"], "heartbeat_ack");
        assert_eq!(
            h.hub.registry().find("Lynx").unwrap().last_heartbeat,
            1_700_000_003_000
        );
    }

    #[test]
    fn position_broadcasts_bare_record_to_everyone() {
        let h = Harness::new();
        let mut lynx = h.connect("Lynx");
        let mut kangourou = h.connect("Kangourou");
        let _ = lynx.drain();
        let _ = kangourou.drain();

        lynx.send(r#"{"type":"position","posX":5,"posY":3}"#);

        for client in [&mut lynx, &mut kangourou] {
            let frames = client.drain();
            assert_eq!(frames.len(), 1);
            let record = &frames[0];
            assert!(record.get("type").is_none());
            assert_eq!(record["username"], "Lynx");
            assert_eq!(record["posX"], 5.0);
            assert_eq!(record["posY"], 3.0);
        }
        let other = h.hub.registry().find("Kangourou").unwrap();
        assert!(other.pos_x.abs() < f64::EPSILON);
    }

    #[test]
    fn visited_countries_are_stored_and_queried() {
        let h = Harness::new();
        let mut lynx = h.connect("Lynx");
        let mut kangourou = h.connect("Kangourou");
        let _ = lynx.drain();
        let _ = kangourou.drain();

        lynx.send(r#"{"type":"visitedCountry","countries":["FR","JP"]}"#);
        assert!(lynx.drain().is_empty());
        assert!(kangourou.drain().is_empty());

        kangourou.send(r#"{"type":"getCountries","username":"Lynx"}"#);
        let reply = kangourou.next();
        assert_eq!(reply["type"], "getCountries");
        assert_eq!(reply["username"], "Lynx");
        assert_eq!(reply["countries"], serde_json::json!(["FR", "JP"]));
    }

    #[test]
    fn get_countries_for_absent_participant_is_error_event() {
        let h = Harness::new();
        let mut lynx = h.connect("Lynx");
        let _ = lynx.drain();

        lynx.send(r#"{"type":"getCountries","username":"Fantôme"}"#);
        let reply = lynx.next();
        assert_eq!(reply["type"], "error");
        assert_eq!(reply["code"], "PARTICIPANT_NOT_FOUND");
        assert_eq!(lynx.session.state(), SessionState::Open);
    }

    #[test]
    fn chat_reaches_only_recipient() {
        let h = Harness::new();
        let mut lynx = h.connect("Lynx");
        let mut kangourou = h.connect("Kangourou");
        let mut chat = h.connect("Chat sprinteur");
        let _ = lynx.drain();
        let _ = kangourou.drain();
        let _ = chat.drain();

        lynx.send(r#"{"type":"chat","recipientUsername":"Kangourou","message":"hi"}"#);

        let frames = kangourou.drain();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "chat");
        assert_eq!(frames[0]["username"], "Lynx");
        assert_eq!(frames[0]["recipientUsername"], "Kangourou");
        assert_eq!(frames[0]["message"], "hi");
        assert_eq!(frames[0]["timestamp"], 1_700_000_000_000_i64);
        assert!(lynx.drain().is_empty());
        assert!(chat.drain().is_empty());
    }

    #[test]
    fn chat_to_nobody_is_silent() {
        let h = Harness::new();
        let mut lynx = h.connect("Lynx");
        let _ = lynx.drain();
        lynx.send(r#"{"type":"chat","recipientUsername":"Personne","message":"allo?"}"#);
        assert!(lynx.drain().is_empty());
    }

    #[test]
    fn malformed_frame_is_reported_without_touch() {
        let h = Harness::new();
        let mut lynx = h.connect("Lynx");
        let _ = lynx.drain();
        h.clock.advance(Duration::from_secs(4));

        lynx.send("not json at all");
        let reply = lynx.next();
        assert_eq!(reply["type"], "error");
        assert_eq!(reply["code"], "INVALID_PAYLOAD");
        assert_eq!(lynx.session.state(), SessionState::Open);
        assert_eq!(
            h.hub.registry().find("Lynx").unwrap().last_heartbeat,
            1_700_000_000_000
        );

        lynx.send(r#"{"type":"heartbeat"}"#);
        assert_eq!(lynx.next()["type"], "heartbeat_ack");
    }

    #[test]
    fn close_broadcasts_roster_once() {
        let h = Harness::new();
        let mut lynx = h.connect_from_pool();
        let mut kangourou = h.connect_from_pool();
        let _ = lynx.drain();
        let _ = kangourou.drain();
        let available = h.names.available();

        assert!(lynx.session.close());
        assert!(!lynx.session.close());

        let frames = kangourou.drain();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "userDisconnected");
        let users = frames[0]["users"].as_array().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0]["username"], kangourou.session.name());

        assert_eq!(h.names.available(), available + 1);
        assert_eq!(h.hub.connection_count(), 1);
        assert!(lynx.drain().is_empty());
    }

    #[test]
    fn close_after_eviction_is_silent() {
        let h = Harness::new();
        let mut lynx = h.connect("Lynx");
        let mut kangourou = h.connect("Kangourou");
        let _ = kangourou.drain();

        let threshold = h.clock.now_millis() + 1;
        assert!(h.hub.evict_inactive("Lynx", threshold));
        assert!(lynx.session.connection().is_closed());

        // Frames arriving after eviction are ignored.
        let _ = lynx.drain();
        lynx.send(r#"{"type":"heartbeat"}"#);
        assert!(lynx.drain().is_empty());

        assert!(!lynx.session.close());
        assert!(kangourou.drain().is_empty());
    }

    #[test]
    fn close_before_open_returns_name() {
        let h = Harness::new();
        let name = h.names.acquire().unwrap();
        let before = h.names.available();
        let mut client = h.session(&name);
        assert!(!client.session.close());
        assert_eq!(h.names.available(), before + 1);
    }

    #[test]
    fn stale_close_does_not_remove_recycled_name() {
        let h = Harness::new();
        let mut old = h.connect("Lynx");
        let threshold = h.clock.now_millis() + 1;
        assert!(h.hub.evict_inactive("Lynx", threshold));

        let mut new = h.connect("Lynx");
        let _ = new.drain();
        assert!(!old.session.close());
        assert!(h.hub.registry().contains("Lynx"));
        assert_eq!(h.hub.router().subscriber_count(&Topic::Users), 1);
    }

    #[test]
    fn frames_from_replaced_connection_leave_new_holder_alone() {
        let h = Harness::new();
        let mut old = h.connect("Lynx");
        let _ = old.drain();

        // The old participant is gone and the name recycled, but the old
        // socket has not been told to close yet.
        let threshold = h.clock.now_millis() + 1;
        let _ = h.hub.registry().remove_if_inactive("Lynx", threshold).unwrap();
        let mut new = h.connect("Lynx");
        let _ = new.drain();
        h.clock.advance(Duration::from_secs(2));

        old.send(r#"{"type":"position","posX":99,"posY":99}"#);
        old.send(r#"{"type":"visitedCountry","countries":["FR"]}"#);
        old.send(r#"{"type":"heartbeat"}"#);

        let lynx = h.hub.registry().find("Lynx").unwrap();
        assert!(lynx.pos_x.abs() < f64::EPSILON);
        assert!(lynx.pos_y.abs() < f64::EPSILON);
        assert!(lynx.visited_countries.is_empty());
        assert_eq!(lynx.last_heartbeat, 1_700_000_000_000);
        assert!(new.drain().is_empty());
        assert!(old.drain().is_empty());
    }
}
