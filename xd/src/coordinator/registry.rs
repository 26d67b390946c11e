//! ClientRegistry - connected clients and their outbound queues
//!
//! The registry only holds a weak reference to each client's queue. The
//! connection handler owns the strong sender; once it drops it, deliveries
//! to that client fail with [`DeliveryFailure::Disconnected`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use super::error::{CoordResult, CoordinatorError, DeliveryFailure, FailedDelivery};
use super::messages::Notice;

/// Snapshot of a connected client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    /// Guesses submitted in the current round
    pub guesses: u32,
    #[serde(rename = "last-guess")]
    pub last_guess: Option<i32>,
    #[serde(rename = "connected-at")]
    pub connected_at: DateTime<Utc>,
}

struct ClientEntry {
    guesses: u32,
    last_guess: Option<i32>,
    connected_at: DateTime<Utc>,
    outbound: mpsc::WeakSender<Notice>,
}

impl ClientEntry {
    fn info(&self, name: &str) -> ClientInfo {
        ClientInfo {
            name: name.to_string(),
            guesses: self.guesses,
            last_guess: self.last_guess,
            connected_at: self.connected_at,
        }
    }

    fn deliver(&self, notice: Notice) -> Result<(), DeliveryFailure> {
        let Some(tx) = self.outbound.upgrade() else {
            return Err(DeliveryFailure::Disconnected);
        };
        tx.try_send(notice).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryFailure::QueueFull,
            TrySendError::Closed(_) => DeliveryFailure::Disconnected,
        })
    }
}

/// Outcome of a fan-out to every registered client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Broadcast {
    pub delivered: usize,
    pub failures: Vec<FailedDelivery>,
}

/// Registry of currently connected clients keyed by name
#[derive(Default)]
pub struct ClientRegistry {
    clients: HashMap<String, ClientEntry>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client; a name can only be connected once
    pub fn register(&mut self, name: &str, outbound: mpsc::WeakSender<Notice>) -> CoordResult<()> {
        debug!(%name, "ClientRegistry::register: called");
        if name.trim().is_empty() {
            return Err(CoordinatorError::InvalidIdentity);
        }
        if self.clients.contains_key(name) {
            return Err(CoordinatorError::AlreadyConnected(name.to_string()));
        }

        self.clients.insert(
            name.to_string(),
            ClientEntry {
                guesses: 0,
                last_guess: None,
                connected_at: Utc::now(),
                outbound,
            },
        );
        Ok(())
    }

    /// Remove a client. Removing an unknown name is a no-op.
    pub fn unregister(&mut self, name: &str) -> bool {
        debug!(%name, "ClientRegistry::unregister: called");
        self.clients.remove(name).is_some()
    }

    pub fn lookup(&self, name: &str) -> Option<ClientInfo> {
        self.clients.get(name).map(|entry| entry.info(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.clients.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Names of all connected clients, sorted
    pub fn list_identities(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clients.keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshots of all connected clients, sorted by name
    pub fn list(&self) -> Vec<ClientInfo> {
        let mut clients: Vec<ClientInfo> = self.clients.iter().map(|(name, entry)| entry.info(name)).collect();
        clients.sort_by(|a, b| a.name.cmp(&b.name));
        clients
    }

    /// Count a guess against the client's current round
    pub fn record_guess(&mut self, name: &str, value: i32) -> CoordResult<u32> {
        let entry = self
            .clients
            .get_mut(name)
            .ok_or_else(|| CoordinatorError::UnknownClient(name.to_string()))?;
        entry.guesses += 1;
        entry.last_guess = Some(value);
        Ok(entry.guesses)
    }

    /// Forget per-round guess statistics for every client
    pub fn reset_round(&mut self) {
        debug!(clients = self.clients.len(), "ClientRegistry::reset_round: called");
        for entry in self.clients.values_mut() {
            entry.guesses = 0;
            entry.last_guess = None;
        }
    }

    /// Queue a notice for one client without waiting
    pub fn send(&self, name: &str, notice: Notice) -> Result<(), FailedDelivery> {
        let entry = self
            .clients
            .get(name)
            .ok_or_else(|| FailedDelivery::new(name, DeliveryFailure::Disconnected))?;
        entry.deliver(notice).map_err(|reason| {
            warn!(%name, %reason, "Failed to deliver notice");
            FailedDelivery::new(name, reason)
        })
    }

    /// Queue a notice for every client; failures are isolated per recipient
    pub fn broadcast(&self, notice: &Notice) -> Broadcast {
        debug!(?notice, clients = self.clients.len(), "ClientRegistry::broadcast: called");
        let mut outcome = Broadcast::default();
        for (name, entry) in &self.clients {
            match entry.deliver(notice.clone()) {
                Ok(()) => outcome.delivered += 1,
                Err(reason) => {
                    warn!(%name, %reason, "Failed to deliver broadcast");
                    outcome.failures.push(FailedDelivery::new(name.clone(), reason));
                }
            }
        }
        outcome.failures.sort_by(|a, b| a.name.cmp(&b.name));
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn queue(capacity: usize) -> (mpsc::Sender<Notice>, mpsc::Receiver<Notice>) {
        mpsc::channel(capacity)
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ClientRegistry::new();
        let (tx, _rx) = queue(4);
        registry.register("harry", tx.downgrade()).unwrap();

        let info = registry.lookup("harry").unwrap();
        assert_eq!(info.name, "harry");
        assert_eq!(info.guesses, 0);
        assert_eq!(info.last_guess, None);
        assert!(registry.lookup("draco").is_none());
    }

    #[test]
    fn test_register_rejects_duplicate() {
        let mut registry = ClientRegistry::new();
        let (tx1, _rx1) = queue(4);
        let (tx2, _rx2) = queue(4);
        registry.register("harry", tx1.downgrade()).unwrap();

        let err = registry.register("harry", tx2.downgrade()).unwrap_err();
        assert_eq!(err, CoordinatorError::AlreadyConnected("harry".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_rejects_blank_name() {
        let mut registry = ClientRegistry::new();
        let (tx, _rx) = queue(4);
        assert_eq!(registry.register("  ", tx.downgrade()), Err(CoordinatorError::InvalidIdentity));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let mut registry = ClientRegistry::new();
        let (tx, _rx) = queue(4);
        registry.register("ron", tx.downgrade()).unwrap();

        assert!(registry.unregister("ron"));
        assert!(!registry.unregister("ron"));
        assert!(registry.lookup("ron").is_none());
    }

    #[test]
    fn test_record_guess_and_reset() {
        let mut registry = ClientRegistry::new();
        let (tx, _rx) = queue(4);
        registry.register("ron", tx.downgrade()).unwrap();

        assert_eq!(registry.record_guess("ron", 10).unwrap(), 1);
        assert_eq!(registry.record_guess("ron", 20).unwrap(), 2);
        assert_eq!(registry.lookup("ron").unwrap().last_guess, Some(20));

        registry.reset_round();
        let info = registry.lookup("ron").unwrap();
        assert_eq!(info.guesses, 0);
        assert_eq!(info.last_guess, None);

        assert!(matches!(
            registry.record_guess("ginny", 1),
            Err(CoordinatorError::UnknownClient(_))
        ));
    }

    #[test]
    fn test_broadcast_isolates_failures() {
        let mut registry = ClientRegistry::new();
        let (tx_ok, mut rx_ok) = queue(4);
        let (tx_full, _rx_full) = queue(1);
        let (tx_gone, rx_gone) = queue(4);
        registry.register("ok", tx_ok.downgrade()).unwrap();
        registry.register("full", tx_full.downgrade()).unwrap();
        registry.register("gone", tx_gone.downgrade()).unwrap();

        tx_full.try_send(Notice::Ended { round: 0 }).unwrap();
        drop(tx_gone);
        drop(rx_gone);

        let outcome = registry.broadcast(&Notice::Started { round: 1 });
        assert_eq!(outcome.delivered, 1);
        assert_eq!(
            outcome.failures,
            vec![
                FailedDelivery::new("full", DeliveryFailure::QueueFull),
                FailedDelivery::new("gone", DeliveryFailure::Disconnected),
            ]
        );
        assert_eq!(rx_ok.try_recv().unwrap(), Notice::Started { round: 1 });
    }

    #[test]
    fn test_send_after_handler_drops_sender() {
        let mut registry = ClientRegistry::new();
        let (tx, _rx) = queue(4);
        registry.register("cedric", tx.downgrade()).unwrap();
        drop(tx);

        let failure = registry.send("cedric", Notice::Ended { round: 1 }).unwrap_err();
        assert_eq!(failure.reason, DeliveryFailure::Disconnected);
    }

    #[test]
    fn test_list_identities_sorted() {
        let mut registry = ClientRegistry::new();
        let (tx, _rx) = queue(4);
        for name in ["luna", "cho", "dean"] {
            registry.register(name, tx.downgrade()).unwrap();
        }
        assert_eq!(registry.list_identities(), vec!["cho", "dean", "luna"]);
        assert_eq!(registry.list().len(), 3);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Register(u8),
        Unregister(u8),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![(0u8..5).prop_map(Op::Register), (0u8..5).prop_map(Op::Unregister)]
    }

    proptest! {
        #[test]
        fn registry_never_holds_duplicates(ops in prop::collection::vec(op_strategy(), 1..64)) {
            let mut registry = ClientRegistry::new();
            let (tx, _rx) = queue(1);
            let mut expected = std::collections::HashSet::new();

            for op in ops {
                match op {
                    Op::Register(id) => {
                        let name = format!("client-{id}");
                        let result = registry.register(&name, tx.downgrade());
                        prop_assert_eq!(result.is_ok(), expected.insert(name));
                    }
                    Op::Unregister(id) => {
                        let name = format!("client-{id}");
                        registry.unregister(&name);
                        expected.remove(&name);
                        prop_assert!(registry.lookup(&name).is_none());
                    }
                }
                let names = registry.list_identities();
                let unique: std::collections::HashSet<_> = names.iter().collect();
                prop_assert_eq!(unique.len(), names.len());
                prop_assert_eq!(names.len(), expected.len());
            }
        }
    }
}
