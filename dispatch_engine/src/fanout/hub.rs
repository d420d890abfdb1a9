use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
        PoisonError,
        RwLock,
        RwLockReadGuard,
        RwLockWriteGuard,
    },
};

use log::*;
use tokio::sync::mpsc;

use crate::{
    db_types::{OrderId, VendorId},
    fanout::ServerMessage,
};

pub type ConnectionId = u64;

/// A broadcast group. Every connection interested in an order joins its order group; every vendor connection joins its
/// vendor group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Order(OrderId),
    Vendor(VendorId),
}

impl Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupKey::Order(id) => write!(f, "order:{}", id.as_str()),
            GroupKey::Vendor(id) => write!(f, "vendor:{id}"),
        }
    }
}

#[derive(Default)]
struct HubState {
    connections: HashMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>,
    groups: HashMap<GroupKey, HashSet<ConnectionId>>,
    memberships: HashMap<ConnectionId, HashSet<GroupKey>>,
}

impl HubState {
    fn drop_connection(&mut self, id: ConnectionId) {
        self.connections.remove(&id);
        for group in self.memberships.remove(&id).unwrap_or_default() {
            if let Some(members) = self.groups.get_mut(&group) {
                members.remove(&id);
                if members.is_empty() {
                    self.groups.remove(&group);
                }
            }
        }
    }
}

/// The registry of live real-time connections and the groups they belong to. Cheap to clone; all clones share state.
#[derive(Clone, Default)]
pub struct FanoutHub {
    state: Arc<RwLock<HubState>>,
    next_id: Arc<AtomicU64>,
}

impl FanoutHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HubState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HubState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new connection. Messages for it arrive on the returned receiver.
    pub fn register(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = mpsc::unbounded_channel();
        self.write().connections.insert(id, tx);
        trace!("📡️ Connection {id} registered");
        (id, rx)
    }

    /// Adds the connection to the group. Returns `false` if the connection is not registered.
    pub fn join(&self, id: ConnectionId, group: GroupKey) -> bool {
        let mut state = self.write();
        if !state.connections.contains_key(&id) {
            return false;
        }
        trace!("📡️ Connection {id} joined {group}");
        state.memberships.entry(id).or_default().insert(group.clone());
        state.groups.entry(group).or_default().insert(id);
        true
    }

    pub fn leave(&self, id: ConnectionId, group: &GroupKey) {
        let mut state = self.write();
        if let Some(groups) = state.memberships.get_mut(&id) {
            groups.remove(group);
        }
        if let Some(members) = state.groups.get_mut(group) {
            members.remove(&id);
            if members.is_empty() {
                state.groups.remove(group);
            }
        }
    }

    /// Removes the connection from the registry and from every group it joined.
    pub fn disconnect(&self, id: ConnectionId) {
        self.write().drop_connection(id);
        trace!("📡️ Connection {id} disconnected");
    }

    /// Sends the message to every member of the group and returns the number of connections it reached. Members whose
    /// receiver has gone away are pruned.
    pub fn broadcast(&self, group: &GroupKey, msg: &ServerMessage) -> usize {
        let mut closed = Vec::new();
        let mut delivered = 0;
        {
            let state = self.read();
            let Some(members) = state.groups.get(group) else {
                trace!("📡️ Nobody is listening on {group}");
                return 0;
            };
            for id in members {
                match state.connections.get(id).map(|tx| tx.send(msg.clone())) {
                    Some(Ok(())) => delivered += 1,
                    _ => closed.push(*id),
                }
            }
        }
        if !closed.is_empty() {
            let mut state = self.write();
            closed.into_iter().for_each(|id| state.drop_connection(id));
        }
        trace!("📡️ Broadcast to {group} reached {delivered} connections");
        delivered
    }

    /// Sends the message to a single connection.
    pub fn send_to(&self, id: ConnectionId, msg: ServerMessage) -> bool {
        let sent = self.read().connections.get(&id).map(|tx| tx.send(msg).is_ok()).unwrap_or(false);
        if !sent {
            self.disconnect(id);
        }
        sent
    }

    pub fn group_size(&self, group: &GroupKey) -> usize {
        self.read().groups.get(group).map(HashSet::len).unwrap_or(0)
    }

    pub fn connection_count(&self) -> usize {
        self.read().connections.len()
    }
}
