//! The lobby roster: who is in, what they picked, whether they are ready.
//!
//! The host owns the authoritative roster and mutates it in response to
//! lobby messages; clients hold a mirror that is only ever overwritten
//! wholesale from `LobbyState` snapshots. Snapshots instead of deltas
//! keep late joiners trivial: there is no event history to replay, a
//! new peer just receives the current roster and is caught up.

use partyline_protocol::{CharacterId, LobbyPlayer, PeerId, StartEntry};
use rand::seq::SliceRandom;

use crate::LobbyError;

/// Longest display name kept in the roster; anything longer is cut.
pub const MAX_NAME_CHARS: usize = 32;

/// An ordered lobby roster.
///
/// Entries keep join order, which is also the order every peer sees in
/// snapshots. Not thread-safe by design: the roster is owned by the
/// simulation thread and touched from nowhere else.
#[derive(Debug, Default, Clone)]
pub struct Roster {
    players: Vec<LobbyPlayer>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a peer to the roster.
    ///
    /// Names are trimmed and truncated to [`MAX_NAME_CHARS`]; an empty
    /// name falls back to the peer id's display form.
    pub fn join(
        &mut self,
        peer: PeerId,
        name: &str,
        host: bool,
    ) -> Result<(), LobbyError> {
        if self.contains(peer) {
            return Err(LobbyError::AlreadyJoined(peer));
        }

        let trimmed = name.trim();
        let name = if trimmed.is_empty() {
            peer.to_string()
        } else {
            trimmed.chars().take(MAX_NAME_CHARS).collect()
        };

        tracing::info!(%peer, name, host, "joined lobby");
        self.players.push(LobbyPlayer {
            peer,
            name,
            character: CharacterId::default(),
            ready: false,
            host,
        });
        Ok(())
    }

    /// Removes a peer's entry, returning it.
    pub fn leave(&mut self, peer: PeerId) -> Result<LobbyPlayer, LobbyError> {
        let idx = self
            .players
            .iter()
            .position(|p| p.peer == peer)
            .ok_or(LobbyError::NotInLobby(peer))?;
        let entry = self.players.remove(idx);
        tracing::info!(%peer, "left lobby");
        Ok(entry)
    }

    /// Records a character pick. Duplicate picks across players are
    /// allowed; the game decides whether that matters.
    pub fn select_character(
        &mut self,
        peer: PeerId,
        character: CharacterId,
    ) -> Result<(), LobbyError> {
        let entry = self.entry_mut(peer)?;
        entry.character = character;
        tracing::debug!(%peer, %character, "character selected");
        Ok(())
    }

    /// Sets or clears a peer's ready flag.
    pub fn set_ready(&mut self, peer: PeerId, ready: bool) -> Result<(), LobbyError> {
        let entry = self.entry_mut(peer)?;
        entry.ready = ready;
        tracing::debug!(%peer, ready, "ready changed");
        Ok(())
    }

    /// True when the roster is non-empty and every player is ready.
    pub fn all_ready(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| p.ready)
    }

    /// The full roster in join order, for a `LobbyState` snapshot.
    pub fn snapshot(&self) -> Vec<LobbyPlayer> {
        self.players.clone()
    }

    /// Overwrites the whole roster from a snapshot. Client-side only;
    /// the host never applies snapshots to itself.
    pub fn replace(&mut self, players: Vec<LobbyPlayer>) {
        self.players = players;
    }

    /// Builds the per-player start assignments, one spawn point each.
    ///
    /// Spawn indices `0..n` are shuffled so seating does not always
    /// follow join order. Fails unless everyone is ready.
    pub fn start_entries(&self) -> Result<Vec<StartEntry>, LobbyError> {
        if self.players.is_empty() {
            return Err(LobbyError::Empty);
        }
        if !self.all_ready() {
            return Err(LobbyError::NotAllReady {
                ready: self.players.iter().filter(|p| p.ready).count(),
                total: self.players.len(),
            });
        }

        let mut spawns: Vec<u8> = (0..self.players.len() as u8).collect();
        spawns.shuffle(&mut rand::rng());

        Ok(self
            .players
            .iter()
            .zip(spawns)
            .map(|(p, spawn_index)| StartEntry {
                peer: p.peer,
                character: p.character,
                spawn_index,
            })
            .collect())
    }

    pub fn contains(&self, peer: PeerId) -> bool {
        self.players.iter().any(|p| p.peer == peer)
    }

    pub fn get(&self, peer: PeerId) -> Option<&LobbyPlayer> {
        self.players.iter().find(|p| p.peer == peer)
    }

    /// The peer flagged as host, if present.
    pub fn host_peer(&self) -> Option<PeerId> {
        self.players.iter().find(|p| p.host).map(|p| p.peer)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    fn entry_mut(&mut self, peer: PeerId) -> Result<&mut LobbyPlayer, LobbyError> {
        self.players
            .iter_mut()
            .find(|p| p.peer == peer)
            .ok_or(LobbyError::NotInLobby(peer))
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -- Helpers ----------------------------------------------------------

    fn pid(id: u32) -> PeerId {
        PeerId(id)
    }

    /// Roster with the host and `extra` remote players joined.
    fn roster_with(extra: u32) -> Roster {
        let mut roster = Roster::new();
        roster.join(pid(1), "host", true).unwrap();
        for i in 0..extra {
            roster.join(pid(2 + i), &format!("player{i}"), false).unwrap();
        }
        roster
    }

    fn ready_all(roster: &mut Roster) {
        for peer in roster.snapshot().iter().map(|p| p.peer) {
            roster.set_ready(peer, true).unwrap();
        }
    }

    // =====================================================================
    // join() / leave()
    // =====================================================================

    #[test]
    fn test_join_preserves_join_order_in_snapshot() {
        let roster = roster_with(2);
        let snap = roster.snapshot();
        let order: Vec<PeerId> = snap.iter().map(|p| p.peer).collect();
        assert_eq!(order, vec![pid(1), pid(2), pid(3)]);
    }

    #[test]
    fn test_join_duplicate_peer_returns_error() {
        let mut roster = roster_with(0);
        let result = roster.join(pid(1), "again", false);
        assert!(matches!(result, Err(LobbyError::AlreadyJoined(p)) if p == pid(1)));
    }

    #[test]
    fn test_join_blank_name_falls_back_to_peer_display() {
        let mut roster = Roster::new();
        roster.join(pid(4), "   ", false).unwrap();
        assert_eq!(roster.get(pid(4)).unwrap().name, "peer-4");
    }

    #[test]
    fn test_join_truncates_very_long_names() {
        let mut roster = Roster::new();
        let long = "x".repeat(100);
        roster.join(pid(2), &long, false).unwrap();
        assert_eq!(roster.get(pid(2)).unwrap().name.len(), MAX_NAME_CHARS);
    }

    #[test]
    fn test_leave_removes_only_that_entry() {
        let mut roster = roster_with(2);
        let gone = roster.leave(pid(2)).unwrap();
        assert_eq!(gone.peer, pid(2));
        assert_eq!(roster.len(), 2);
        assert!(roster.contains(pid(1)));
        assert!(roster.contains(pid(3)));
    }

    #[test]
    fn test_leave_unknown_peer_returns_error() {
        let mut roster = roster_with(0);
        assert!(matches!(
            roster.leave(pid(9)),
            Err(LobbyError::NotInLobby(p)) if p == pid(9)
        ));
    }

    // =====================================================================
    // select_character() / set_ready()
    // =====================================================================

    #[test]
    fn test_select_character_updates_entry() {
        let mut roster = roster_with(1);
        roster.select_character(pid(2), CharacterId(3)).unwrap();
        assert_eq!(roster.get(pid(2)).unwrap().character, CharacterId(3));
    }

    #[test]
    fn test_select_character_allows_duplicates() {
        let mut roster = roster_with(1);
        roster.select_character(pid(1), CharacterId(3)).unwrap();
        roster.select_character(pid(2), CharacterId(3)).unwrap();
        assert_eq!(roster.get(pid(1)).unwrap().character, CharacterId(3));
        assert_eq!(roster.get(pid(2)).unwrap().character, CharacterId(3));
    }

    #[test]
    fn test_set_ready_toggles_both_ways() {
        let mut roster = roster_with(0);
        roster.set_ready(pid(1), true).unwrap();
        assert!(roster.get(pid(1)).unwrap().ready);
        roster.set_ready(pid(1), false).unwrap();
        assert!(!roster.get(pid(1)).unwrap().ready);
    }

    #[test]
    fn test_ready_for_unknown_peer_returns_error() {
        let mut roster = roster_with(0);
        assert!(matches!(
            roster.set_ready(pid(5), true),
            Err(LobbyError::NotInLobby(_))
        ));
    }

    // =====================================================================
    // all_ready()
    // =====================================================================

    #[test]
    fn test_all_ready_false_when_empty() {
        assert!(!Roster::new().all_ready());
    }

    #[test]
    fn test_all_ready_requires_every_player() {
        let mut roster = roster_with(2);
        roster.set_ready(pid(1), true).unwrap();
        roster.set_ready(pid(2), true).unwrap();
        assert!(!roster.all_ready());
        roster.set_ready(pid(3), true).unwrap();
        assert!(roster.all_ready());
    }

    #[test]
    fn test_all_ready_after_unready_player_leaves() {
        let mut roster = roster_with(1);
        roster.set_ready(pid(1), true).unwrap();
        assert!(!roster.all_ready());
        roster.leave(pid(2)).unwrap();
        assert!(roster.all_ready());
    }

    // =====================================================================
    // Snapshots
    // =====================================================================

    #[test]
    fn test_snapshot_for_late_joiner_carries_everyone() {
        // Two players are in and configured; a third joins and must
        // see the complete current state in one snapshot.
        let mut roster = roster_with(1);
        roster.select_character(pid(1), CharacterId(2)).unwrap();
        roster.set_ready(pid(2), true).unwrap();

        roster.join(pid(3), "late", false).unwrap();
        let snap = roster.snapshot();

        assert_eq!(snap.len(), 3);
        assert_eq!(snap[0].character, CharacterId(2));
        assert!(snap[1].ready);
        assert_eq!(snap[2].name, "late");
        assert!(!snap[2].ready);
    }

    #[test]
    fn test_replace_overwrites_wholesale() {
        let mut roster = roster_with(2);
        roster.replace(vec![LobbyPlayer {
            peer: pid(7),
            name: "only".into(),
            character: CharacterId(1),
            ready: true,
            host: false,
        }]);
        assert_eq!(roster.len(), 1);
        assert!(roster.contains(pid(7)));
        assert!(!roster.contains(pid(1)));
    }

    #[test]
    fn test_host_peer_follows_host_flag() {
        let roster = roster_with(2);
        assert_eq!(roster.host_peer(), Some(pid(1)));
        assert_eq!(Roster::new().host_peer(), None);
    }

    // =====================================================================
    // start_entries()
    // =====================================================================

    #[test]
    fn test_start_entries_empty_lobby_returns_error() {
        assert!(matches!(Roster::new().start_entries(), Err(LobbyError::Empty)));
    }

    #[test]
    fn test_start_entries_not_all_ready_reports_counts() {
        let mut roster = roster_with(2);
        roster.set_ready(pid(2), true).unwrap();
        match roster.start_entries() {
            Err(LobbyError::NotAllReady { ready, total }) => {
                assert_eq!(ready, 1);
                assert_eq!(total, 3);
            }
            other => panic!("expected NotAllReady, got {other:?}"),
        }
    }

    #[test]
    fn test_start_entries_assigns_each_spawn_once() {
        let mut roster = roster_with(3);
        ready_all(&mut roster);

        let entries = roster.start_entries().unwrap();
        assert_eq!(entries.len(), 4);

        let mut spawns: Vec<u8> = entries.iter().map(|e| e.spawn_index).collect();
        spawns.sort();
        assert_eq!(spawns, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_start_entries_carries_character_picks() {
        let mut roster = roster_with(1);
        roster.select_character(pid(2), CharacterId(5)).unwrap();
        ready_all(&mut roster);

        let entries = roster.start_entries().unwrap();
        let e2 = entries.iter().find(|e| e.peer == pid(2)).unwrap();
        assert_eq!(e2.character, CharacterId(5));
    }

    #[test]
    fn test_start_entries_solo_host_gets_spawn_zero() {
        let mut roster = roster_with(0);
        ready_all(&mut roster);

        let entries = roster.start_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].spawn_index, 0);
    }
}
