//! Ephemeral presence state shared between collaborators.
//!
//! Each peer owns one entry: a display name, a colour and (optionally) its
//! current selection as encoded logical cursors. Entries carry a logical
//! clock so stale updates relayed out of order are ignored, and remote
//! entries that are not refreshed within the timeout are dropped.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use web_time::Instant;

use crate::crdt::PeerId;
use crate::error::BindingError;
use crate::event::{Listeners, Subscription};

/// Remote entries older than this are dropped by [`Awareness::remove_outdated`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

/// Predefined collaborator colours (pastel-ish for readability).
const COLLABORATOR_COLORS: [u32; 8] = [
    0xFF6B6BFF, // Red
    0x4ECDC4FF, // Teal
    0xFFE66DFF, // Yellow
    0x95E1D3FF, // Mint
    0xF38181FF, // Coral
    0xAA96DAFF, // Purple
    0xFCBF49FF, // Orange
    0x2EC4B6FF, // Cyan
];

/// Palette colour (RGBA) for a peer. Stable for a given peer id.
pub fn color_for_peer(peer: PeerId) -> u32 {
    COLLABORATOR_COLORS[(peer % COLLABORATOR_COLORS.len() as u64) as usize]
}

/// A peer's published selection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PresenceSelection {
    /// Nothing selected, or nothing published yet.
    #[default]
    Absent,
    /// Encoded logical cursors. `anchor` is where the drag started.
    Range { anchor: Vec<u8>, head: Vec<u8> },
}

/// Presence state published by one peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerState {
    pub display_name: SmolStr,
    /// RGBA.
    pub color: u32,
    pub selection: PresenceSelection,
}

impl PeerState {
    pub fn new(display_name: impl Into<SmolStr>, color: u32) -> Self {
        Self {
            display_name: display_name.into(),
            color,
            selection: PresenceSelection::Absent,
        }
    }

    /// State for a peer that never set a display name.
    pub fn anonymous(peer: PeerId) -> Self {
        Self::new("Anonymous", color_for_peer(peer))
    }
}

/// What caused an awareness change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwarenessOrigin {
    Local,
    Remote,
    Timeout,
}

/// Peers whose state changed in one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwarenessEvent {
    pub added: Vec<PeerId>,
    pub updated: Vec<PeerId>,
    pub removed: Vec<PeerId>,
    pub origin: AwarenessOrigin,
}

impl AwarenessEvent {
    fn new(origin: AwarenessOrigin) -> Self {
        Self {
            added: Vec::new(),
            updated: Vec::new(),
            removed: Vec::new(),
            origin,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// One peer's entry on the wire. `state: None` means the peer went offline.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireEntry {
    peer: PeerId,
    clock: u64,
    state: Option<PeerState>,
}

/// Versioned wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum WireMessage {
    V0 { entries: Vec<WireEntry> },
}

#[derive(Debug)]
struct PeerEntry {
    clock: u64,
    state: Option<PeerState>,
    updated_at: Instant,
}

/// Presence store for one replica.
pub struct Awareness {
    peer: PeerId,
    timeout: Duration,
    entries: RefCell<BTreeMap<PeerId, PeerEntry>>,
    listeners: Listeners<AwarenessEvent>,
}

impl Awareness {
    pub fn new(peer: PeerId, timeout: Duration) -> Self {
        Self {
            peer,
            timeout,
            entries: RefCell::new(BTreeMap::new()),
            listeners: Listeners::new(),
        }
    }

    pub fn peer(&self) -> PeerId {
        self.peer
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn local_state(&self) -> Option<PeerState> {
        self.entries
            .borrow()
            .get(&self.peer)
            .and_then(|e| e.state.clone())
    }

    pub fn set_local_state(&self, state: PeerState) {
        self.update_local(Some(state));
    }

    /// Mark the local peer as offline. Peers learn about it on the next encode.
    pub fn clear_local_state(&self) {
        self.update_local(None);
    }

    fn update_local(&self, state: Option<PeerState>) {
        let mut event = AwarenessEvent::new(AwarenessOrigin::Local);
        {
            let mut entries = self.entries.borrow_mut();
            let entry = entries.entry(self.peer).or_insert_with(|| PeerEntry {
                clock: 0,
                state: None,
                updated_at: Instant::now(),
            });
            match (&entry.state, &state) {
                (None, Some(_)) => event.added.push(self.peer),
                (Some(_), Some(_)) => event.updated.push(self.peer),
                (Some(_), None) => event.removed.push(self.peer),
                (None, None) => {}
            }
            entry.clock += 1;
            entry.state = state;
            entry.updated_at = Instant::now();
        }
        if !event.is_empty() {
            self.listeners.emit(&event);
        }
    }

    /// Every peer currently online, the local one included.
    pub fn all_states(&self) -> BTreeMap<PeerId, PeerState> {
        self.entries
            .borrow()
            .iter()
            .filter_map(|(peer, e)| e.state.clone().map(|s| (*peer, s)))
            .collect()
    }

    pub fn subscribe(&self, listener: Rc<dyn Fn(&AwarenessEvent)>) -> Subscription {
        self.listeners.add(listener)
    }

    /// Encode the entries of `peers` for transport. Unknown peers are skipped.
    pub fn encode(&self, peers: &[PeerId]) -> Result<Vec<u8>, BindingError> {
        let entries = self.entries.borrow();
        let entries = peers
            .iter()
            .filter_map(|peer| {
                entries.get(peer).map(|e| WireEntry {
                    peer: *peer,
                    clock: e.clock,
                    state: e.state.clone(),
                })
            })
            .collect();
        Ok(postcard::to_stdvec(&WireMessage::V0 { entries })?)
    }

    pub fn encode_all(&self) -> Result<Vec<u8>, BindingError> {
        let peers: Vec<PeerId> = self.entries.borrow().keys().copied().collect();
        self.encode(&peers)
    }

    /// Merge entries received from another replica.
    ///
    /// Entries with a clock not newer than what we hold are ignored, as are
    /// entries claiming to be the local peer.
    pub fn apply(&self, bytes: &[u8]) -> Result<(), BindingError> {
        let WireMessage::V0 { entries: incoming } = postcard::from_bytes(bytes)?;
        let now = Instant::now();
        let mut event = AwarenessEvent::new(AwarenessOrigin::Remote);
        {
            let mut entries = self.entries.borrow_mut();
            for wire in incoming {
                if wire.peer == self.peer {
                    tracing::warn!(peer = wire.peer, "ignoring remote awareness entry for local peer");
                    continue;
                }
                let previous = match entries.get(&wire.peer) {
                    Some(e) if e.clock >= wire.clock => continue,
                    Some(e) => e.state.clone(),
                    None => None,
                };
                match (&previous, &wire.state) {
                    (None, Some(_)) => event.added.push(wire.peer),
                    (Some(old), Some(new)) if old != new => event.updated.push(wire.peer),
                    (Some(_), None) => event.removed.push(wire.peer),
                    _ => {}
                }
                entries.insert(
                    wire.peer,
                    PeerEntry {
                        clock: wire.clock,
                        state: wire.state,
                        updated_at: now,
                    },
                );
            }
        }
        tracing::trace!(
            added = event.added.len(),
            updated = event.updated.len(),
            removed = event.removed.len(),
            "applied awareness update"
        );
        if !event.is_empty() {
            self.listeners.emit(&event);
        }
        Ok(())
    }

    /// Drop remote peers not refreshed within the timeout.
    pub fn remove_outdated(&self) -> Vec<PeerId> {
        self.remove_outdated_at(Instant::now())
    }

    pub fn remove_outdated_at(&self, now: Instant) -> Vec<PeerId> {
        let mut event = AwarenessEvent::new(AwarenessOrigin::Timeout);
        {
            let mut entries = self.entries.borrow_mut();
            entries.retain(|peer, e| {
                let expired = *peer != self.peer
                    && now.saturating_duration_since(e.updated_at) > self.timeout;
                if expired && e.state.is_some() {
                    event.removed.push(*peer);
                }
                !expired
            });
        }
        if !event.is_empty() {
            tracing::debug!(removed = ?event.removed, "awareness peers timed out");
            self.listeners.emit(&event);
        }
        event.removed
    }
}

impl std::fmt::Debug for Awareness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Awareness")
            .field("peer", &self.peer)
            .field("timeout", &self.timeout)
            .field("entries", &self.entries.borrow().len())
            .finish()
    }
}
