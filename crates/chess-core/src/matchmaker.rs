//! Session set and matchmaking.
//!
//! Thread-safe: the outer `RwLock` guards membership of the session set and
//! is taken exclusively for matchmaking and removal. Each session is
//! individually `Mutex`-protected so independent games never contend.
//!
//! Lock order is always set → session. Nothing holds a session lock while
//! acquiring the set lock.

use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::{Mutex, RwLock};

use crate::error::HubError;
use crate::hub::ConnectionId;
use crate::protocol::{INITIAL_POSITION, Role};
use crate::session::{JoinOutcome, Seat, Session, SessionSummary};

pub type SessionHandle = Arc<Mutex<Session>>;

type SessionMap = IndexMap<String, SessionHandle>;

#[derive(Default)]
pub struct Matchmaker {
    sessions: RwLock<SessionMap>,
}

impl Matchmaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seat a participant in the first open session for `role`, creating a
    /// new session when none qualifies.
    ///
    /// Sessions are scanned in creation order and the first match wins. The
    /// whole scan-and-join runs under the exclusive set lock, so two
    /// concurrent requests can never both claim the same seat.
    pub async fn find_or_create_and_join(
        &self,
        seat: Seat,
        role: Role,
    ) -> Result<(String, JoinOutcome), HubError> {
        tracing::debug!(player = %seat.player_id, %role, "Finding a game");
        let mut sessions = self.sessions.write().await;

        // Asking again for a seat one already holds lands back in it.
        for (game_id, handle) in sessions.iter() {
            let mut session = handle.lock().await;
            if session.holds(role, &seat) {
                let outcome = session.join(seat, role)?;
                return Ok((game_id.clone(), outcome));
            }
        }

        for (game_id, handle) in sessions.iter() {
            let mut session = handle.lock().await;
            if session.is_open_for(role, seat.connection) {
                let outcome = session.join(seat, role)?;
                return Ok((game_id.clone(), outcome));
            }
        }

        tracing::debug!("Suitable game not found, creating a new game");
        let handle = create_session(&mut sessions, &generate_game_id())?;
        let mut session = handle.lock().await;
        let outcome = session.join(seat, role)?;
        Ok((session.id().to_string(), outcome))
    }

    /// Look up a session by id.
    pub async fn session(&self, game_id: &str) -> Result<SessionHandle, HubError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(game_id)
            .cloned()
            .ok_or_else(|| HubError::SessionNotFound(game_id.to_string()))
    }

    /// Remove a participant from a session, dropping the session once both
    /// of its seats are empty.
    ///
    /// The seat held through `connection` is vacated; failing that, the one
    /// held by a non-empty `player_id`.
    pub async fn leave(
        &self,
        game_id: &str,
        connection: ConnectionId,
        player_id: &str,
    ) -> Result<Option<Role>, HubError> {
        let mut sessions = self.sessions.write().await;
        let handle = sessions
            .get(game_id)
            .cloned()
            .ok_or_else(|| HubError::SessionNotFound(game_id.to_string()))?;

        let mut session = handle.lock().await;
        let role = session
            .role_of_connection(connection)
            .or_else(|| session.role_of(player_id));
        if let Some(role) = role {
            session.vacate(role);
        }
        if session.is_empty() {
            sessions.shift_remove(game_id);
            tracing::info!(game = %game_id, "Deleting game");
        }
        Ok(role)
    }

    /// Vacate every seat held through `connection` and drop sessions left
    /// with no players. Returns the number of seats vacated.
    pub async fn disconnect(&self, connection: ConnectionId) -> usize {
        let mut sessions = self.sessions.write().await;
        let mut vacated = 0;
        let mut emptied = Vec::new();

        for (game_id, handle) in sessions.iter() {
            let mut session = handle.lock().await;
            while let Some(role) = session.role_of_connection(connection) {
                session.vacate(role);
                vacated += 1;
            }
            if session.is_empty() {
                emptied.push(game_id.clone());
            }
        }

        for game_id in emptied {
            sessions.shift_remove(&game_id);
            tracing::info!(game = %game_id, "Deleting game");
        }
        vacated
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Snapshot of every session, in creation order.
    pub async fn summaries(&self) -> Vec<SessionSummary> {
        let handles: Vec<SessionHandle> = self.sessions.read().await.values().cloned().collect();
        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            out.push(handle.lock().await.summary());
        }
        out
    }
}

fn create_session(sessions: &mut SessionMap, game_id: &str) -> Result<SessionHandle, HubError> {
    if sessions.contains_key(game_id) {
        return Err(HubError::SessionAlreadyExists(game_id.to_string()));
    }
    let handle = Arc::new(Mutex::new(Session::new(game_id, INITIAL_POSITION)));
    sessions.insert(game_id.to_string(), Arc::clone(&handle));
    tracing::info!(game = %game_id, "New game created");
    Ok(handle)
}

/// Generate a random game id (32-char hex string).
fn generate_game_id() -> String {
    use rand::RngExt;
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::next_connection_id;
    use crate::outbox::{self, OutboxReceiver};
    use crate::protocol::{Envelope, MessageKind};

    fn seat(player_id: &str) -> (Seat, OutboxReceiver) {
        let (tx, rx) = outbox::channel(16);
        (Seat::new(player_id, next_connection_id(), tx), rx)
    }

    fn drain(rx: &mut OutboxReceiver) -> Vec<Envelope> {
        std::iter::from_fn(|| rx.try_recv()).collect()
    }

    #[tokio::test]
    async fn creates_session_when_none_open() {
        let mm = Matchmaker::new();
        let (a, _ra) = seat("a");

        let (game_id, outcome) = mm.find_or_create_and_join(a, Role::White).await.unwrap();
        assert_eq!(outcome, JoinOutcome::Waiting);
        assert_eq!(game_id.len(), 32);
        assert_eq!(mm.len().await, 1);

        let handle = mm.session(&game_id).await.unwrap();
        let session = handle.lock().await;
        assert_eq!(session.position(), INITIAL_POSITION);
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn opposite_role_joins_open_session() {
        let mm = Matchmaker::new();
        let (a, mut ra) = seat("a");
        let (b, mut rb) = seat("b");

        let (g1, _) = mm.find_or_create_and_join(a, Role::White).await.unwrap();
        let (g2, outcome) = mm.find_or_create_and_join(b, Role::Black).await.unwrap();
        assert_eq!(g1, g2);
        assert_eq!(outcome, JoinOutcome::Started);
        assert_eq!(mm.len().await, 1);

        for rx in [&mut ra, &mut rb] {
            let got = drain(rx);
            assert_eq!(got.len(), 1);
            assert_eq!(got[0].kind().unwrap(), MessageKind::GameStarted);
        }
    }

    #[tokio::test]
    async fn same_role_gets_a_new_session() {
        let mm = Matchmaker::new();
        let (a, _ra) = seat("a");
        let (c, _rc) = seat("c");

        let (g1, _) = mm.find_or_create_and_join(a, Role::White).await.unwrap();
        let (g2, _) = mm.find_or_create_and_join(c, Role::White).await.unwrap();
        assert_ne!(g1, g2);
        assert_eq!(mm.len().await, 2);
    }

    #[tokio::test]
    async fn connection_is_not_paired_with_itself() {
        let mm = Matchmaker::new();
        let (a, _ra) = seat("a");
        let (tx, _rx) = outbox::channel(16);
        let same_conn = Seat::new("a", a.connection, tx);

        let (g1, _) = mm.find_or_create_and_join(a, Role::White).await.unwrap();
        let (g2, _) = mm.find_or_create_and_join(same_conn, Role::Black).await.unwrap();
        assert_ne!(g1, g2);
    }

    #[tokio::test]
    async fn anonymous_connections_are_paired() {
        let mm = Matchmaker::new();
        let (a, mut ra) = seat("");
        let (b, mut rb) = seat("");

        let (g1, _) = mm.find_or_create_and_join(a, Role::White).await.unwrap();
        let (g2, outcome) = mm.find_or_create_and_join(b, Role::Black).await.unwrap();
        assert_eq!(g1, g2);
        assert_eq!(outcome, JoinOutcome::Started);
        assert_eq!(mm.len().await, 1);
        assert_eq!(drain(&mut ra).len(), 1);
        assert_eq!(drain(&mut rb).len(), 1);
    }

    #[tokio::test]
    async fn asking_again_for_held_seat_is_idempotent() {
        let mm = Matchmaker::new();
        let (a, mut ra) = seat("a");
        let conn = a.connection;
        let (g1, _) = mm.find_or_create_and_join(a, Role::White).await.unwrap();

        let (tx, _rx) = outbox::channel(16);
        let again = Seat::new("a", conn, tx);
        let (g2, outcome) = mm.find_or_create_and_join(again, Role::White).await.unwrap();
        assert_eq!(g1, g2);
        assert_eq!(outcome, JoinOutcome::AlreadySeated);
        assert_eq!(mm.len().await, 1);
        assert!(drain(&mut ra).is_empty());
    }

    #[tokio::test]
    async fn first_open_session_wins() {
        let mm = Matchmaker::new();
        let mut keep = Vec::new();
        let mut ids = Vec::new();
        for p in ["w1", "w2", "w3"] {
            let (s, rx) = seat(p);
            keep.push(rx);
            ids.push(mm.find_or_create_and_join(s, Role::White).await.unwrap().0);
        }

        let (b, _rb) = seat("b");
        let (joined, _) = mm.find_or_create_and_join(b, Role::Black).await.unwrap();
        assert_eq!(joined, ids[0]);

        let (b2, _rb2) = seat("b2");
        let (joined, _) = mm.find_or_create_and_join(b2, Role::Black).await.unwrap();
        assert_eq!(joined, ids[1]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_never_share_a_seat() {
        let mm = Arc::new(Matchmaker::new());
        let (host, _rh) = seat("host");
        let (open, _) = mm.find_or_create_and_join(host, Role::Black).await.unwrap();

        let mut tasks = Vec::new();
        let mut keep = Vec::new();
        for p in ["x", "y"] {
            let (s, rx) = seat(p);
            keep.push(rx);
            let mm = Arc::clone(&mm);
            tasks.push(tokio::spawn(async move {
                mm.find_or_create_and_join(s, Role::White).await
            }));
        }

        let mut joined_open = 0;
        for task in tasks {
            let (game_id, _) = task.await.unwrap().unwrap();
            if game_id == open {
                joined_open += 1;
            }
        }
        assert_eq!(joined_open, 1);
        assert_eq!(mm.len().await, 2);

        for summary in mm.summaries().await {
            assert!(summary.white.is_some());
        }
    }

    #[tokio::test]
    async fn session_lookup_fails_for_unknown_id() {
        let mm = Matchmaker::new();
        assert!(matches!(
            mm.session("nope").await,
            Err(HubError::SessionNotFound(id)) if id == "nope"
        ));
        assert!(matches!(
            mm.leave("nope", next_connection_id(), "a").await,
            Err(HubError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn explicit_leave_removes_empty_session() {
        let mm = Matchmaker::new();
        let (a, _ra) = seat("a");
        let (b, mut rb) = seat("");
        let (a_conn, b_conn) = (a.connection, b.connection);
        let (g, _) = mm.find_or_create_and_join(a, Role::White).await.unwrap();
        mm.find_or_create_and_join(b, Role::Black).await.unwrap();
        drain(&mut rb);

        assert_eq!(mm.leave(&g, a_conn, "").await.unwrap(), Some(Role::White));
        assert_eq!(mm.len().await, 1);
        assert_eq!(drain(&mut rb)[0].kind().unwrap(), MessageKind::PlayerLeft);

        assert_eq!(mm.leave(&g, a_conn, "a").await.unwrap(), None);
        assert_eq!(mm.leave(&g, b_conn, "").await.unwrap(), Some(Role::Black));
        assert!(mm.is_empty().await);
    }

    #[tokio::test]
    async fn disconnect_vacates_seats_of_that_connection() {
        let mm = Matchmaker::new();
        let (a, mut ra) = seat("a");
        let (b, _rb) = seat("b");
        let b_conn = b.connection;
        let (g, _) = mm.find_or_create_and_join(a, Role::White).await.unwrap();
        mm.find_or_create_and_join(b, Role::Black).await.unwrap();
        drain(&mut ra);

        assert_eq!(mm.disconnect(b_conn).await, 1);
        let got = drain(&mut ra);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].kind().unwrap(), MessageKind::PlayerLeft);

        let handle = mm.session(&g).await.unwrap();
        assert!(handle.lock().await.seat(Role::Black).is_none());

        assert_eq!(mm.disconnect(b_conn).await, 0);
        assert_eq!(mm.len().await, 1);
    }

    #[tokio::test]
    async fn disconnect_drops_sessions_left_empty() {
        let mm = Matchmaker::new();
        let (a, _ra) = seat("a");
        let conn = a.connection;
        mm.find_or_create_and_join(a, Role::White).await.unwrap();

        assert_eq!(mm.disconnect(conn).await, 1);
        assert!(mm.is_empty().await);
    }

    #[test]
    fn id_collision_is_reported() {
        let mut sessions = SessionMap::new();
        create_session(&mut sessions, "dup").unwrap();
        assert!(matches!(
            create_session(&mut sessions, "dup"),
            Err(HubError::SessionAlreadyExists(id)) if id == "dup"
        ));
    }
}
