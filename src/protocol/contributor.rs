//! Contributor Node.
//!
//! Runs one secure-sum round for one private value:
//! 1. Register the node's port with the aggregator.
//! 2. On the peer list push, split the private value into one share per contributor.
//! 3. Dispatch one share to every peer and keep the last one.
//! 4. Accumulate the retained share and every share pushed by peers.
//! 5. When the store completes, submit the aggregate to the aggregator.
//!
//! Inbound shares race the node's own dispatch and can arrive in any state. The
//! `ShareStore` decides which `add` completes the round, so the aggregate is
//! computed and submitted exactly once.
//!
//! A failed share send is logged and reported in the `DispatchReport`; the
//! destination then never completes its round. Nothing retries.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::state_machine::{State, StateMachine};
use super::ProtocolError;
use crate::config::ContributorConfig;
use crate::entropy::ShareRng;
use crate::mpc::{split_secret, PrivateValue, Share, ShareStore};
use crate::net::{NetError, PeerAddress, PeerList, Transport};

/// Outcome of the share fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Number of peers that accepted their share.
    pub delivered: usize,
    /// Peers whose share was lost, with the transport error.
    pub failures: Vec<(PeerAddress, NetError)>,
}

impl DispatchReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A contributor taking part in a single round.
pub struct ContributorNode<T: Transport> {
    config: ContributorConfig,
    secret: PrivateValue,
    rng: Mutex<ShareRng>,
    transport: Arc<T>,
    store: ShareStore,
    state: Mutex<StateMachine>,
    aggregate: OnceLock<i64>,
    dispatch: Mutex<Option<JoinHandle<DispatchReport>>>,
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<T: Transport> ContributorNode<T> {
    /// Creates a node in the Idle state with an empty share store.
    ///
    /// # Errors
    /// Returns `ProtocolError::Share` if the configured population is zero.
    pub fn new(
        config: ContributorConfig,
        secret: PrivateValue,
        rng: ShareRng,
        transport: Arc<T>,
    ) -> Result<Self, ProtocolError> {
        let store = ShareStore::new(config.population)?;
        Ok(Self {
            config,
            secret,
            rng: Mutex::new(rng),
            transport,
            store,
            state: Mutex::new(StateMachine::new()),
            aggregate: OnceLock::new(),
            dispatch: Mutex::new(None),
        })
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn config(&self) -> &ContributorConfig {
        &self.config
    }

    pub fn state(&self) -> State {
        lock(&self.state).state()
    }

    pub fn subscribe(&self) -> watch::Receiver<State> {
        lock(&self.state).subscribe()
    }

    /// Number of shares accumulated so far.
    pub fn received(&self) -> usize {
        self.store.len()
    }

    /// The aggregate computed for this round, once the store completed.
    pub fn aggregate(&self) -> Option<i64> {
        self.aggregate.get().copied()
    }

    /// Waits until the round reaches `Submitted` or `Failed`.
    pub async fn wait_finished(&self) -> State {
        let mut rx = self.subscribe();
        let finished = match rx.wait_for(|s| s.is_terminal()).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        finished
    }

    /// Waits for the share fan-out started by the peer list and returns its report.
    ///
    /// Returns None if no fan-out was started or its report was already taken.
    pub async fn dispatch_report(&self) -> Option<DispatchReport> {
        let handle = lock(&self.dispatch).take()?;
        match handle.await {
            Ok(report) => Some(report),
            Err(e) => {
                log::error!("{}: Share dispatch task failed: {}", self.port(), e);
                None
            }
        }
    }

    /// Registers this node with the aggregator.
    ///
    /// The outcome of the request is logged but not acted upon: the node moves to
    /// `AwaitingPeers` either way, and nothing retries.
    pub async fn register(&self) -> Result<(), ProtocolError> {
        lock(&self.state).start_registration()?;

        let own = self.config.own_address();
        let aggregator = self.config.aggregator_address();
        log::info!("{}: Registering with aggregator {}", self.port(), aggregator);

        match self.transport.register(&aggregator, &own).await {
            Ok(()) => log::info!("{}: Registered with aggregator", self.port()),
            Err(e) => log::warn!("{}: Error when registering with aggregator: {}", self.port(), e),
        }

        lock(&self.state).registration_finished()
    }

    /// Handles the peer list pushed by the aggregator.
    ///
    /// Splits the private value, starts the share fan-out in the background and
    /// stores the retained share. Submits the aggregate if that completed the round
    /// (a single contributor, or every peer share already arrived).
    ///
    /// # Errors
    /// * `InvalidState` if the node has not registered or already received a list.
    /// * `PopulationMismatch` if the list disagrees with the configured population.
    pub async fn receive_peer_list(&self, list: PeerList) -> Result<(), ProtocolError> {
        if list.port != self.port() {
            log::warn!(
                "{}: Peer list addressed to port {}, using own port",
                self.port(),
                list.port
            );
        }

        let peers = self.peers_from(&list.ports);
        let delivered = peers.len() + 1;
        if delivered != self.store.population() {
            log::warn!(
                "{}: Peer list implies {} contributors, expected {}",
                self.port(),
                delivered,
                self.store.population()
            );
            return Err(ProtocolError::PopulationMismatch {
                expected: self.store.population(),
                delivered,
            });
        }

        lock(&self.state).start_distribution()?;
        log::info!("{}: Received list of peers: {:?}", self.port(), list.ports);

        let shares = {
            let mut rng = lock(&self.rng);
            split_secret(self.secret.value(), delivered, self.config.max_range, &mut *rng)
        };

        let outbound: Vec<(PeerAddress, i64)> = peers
            .into_iter()
            .zip(shares.outbound().iter().map(Share::value))
            .collect();
        let handle = tokio::spawn(dispatch_shares(
            Arc::clone(&self.transport),
            self.port(),
            outbound,
            self.config.client.fanout,
        ));
        *lock(&self.dispatch) = Some(handle);

        let completed = self.store.add_and_check(shares.retained().value())?;
        lock(&self.state).start_aggregation()?;

        if completed {
            self.submit().await;
        }
        Ok(())
    }

    /// Handles one share pushed by a peer.
    ///
    /// Accepted in every state. Returns the number of shares held after this one.
    ///
    /// # Errors
    /// Returns `Share(RoundClosed)` once the store is complete; the share is dropped.
    pub async fn receive_share(&self, share: i64) -> Result<usize, ProtocolError> {
        let size = self.store.add(share).map_err(|e| {
            log::warn!("{}: Rejecting share: {}", self.port(), e);
            e
        })?;
        log::info!(
            "{}: Received share ({}/{})",
            self.port(),
            size,
            self.store.population()
        );

        if size == self.store.population() {
            self.submit().await;
        }
        Ok(size)
    }

    /// Peers other than this node, in list order, without duplicates.
    fn peers_from(&self, ports: &[u16]) -> Vec<PeerAddress> {
        let mut seen = Vec::with_capacity(ports.len());
        for &port in ports {
            if port != self.port() && !seen.contains(&port) {
                seen.push(port);
            }
        }
        seen.into_iter()
            .map(|port| PeerAddress::new(self.config.host.clone(), port))
            .collect()
    }

    /// Computes and submits the aggregate. Called only by the completing `add`.
    async fn submit(&self) {
        let aggregate = match self.store.aggregate() {
            Ok(value) => value,
            Err(e) => {
                log::error!("{}: Cannot compute aggregate: {}", self.port(), e);
                return;
            }
        };
        if self.aggregate.set(aggregate).is_err() {
            log::error!("{}: Aggregate already submitted", self.port());
            return;
        }
        log::info!("{}: Aggregate share is {}", self.port(), aggregate);

        let aggregator = self.config.aggregator_address();
        let transition = match self.transport.submit_aggregate(&aggregator, aggregate).await {
            Ok(()) => {
                log::info!("{}: Sent aggregate share to aggregator", self.port());
                lock(&self.state).mark_submitted()
            }
            Err(e) => {
                log::error!(
                    "{}: Error when sending aggregate share to aggregator: {}",
                    self.port(),
                    e
                );
                lock(&self.state).mark_failed()
            }
        };
        if let Err(e) = transition {
            log::warn!("{}: Round finished outside distribution: {}", self.port(), e);
        }
    }
}

/// Sends every outbound share, at most `fanout` at a time.
async fn dispatch_shares<T: Transport>(
    transport: Arc<T>,
    port: u16,
    outbound: Vec<(PeerAddress, i64)>,
    fanout: usize,
) -> DispatchReport {
    let results: Vec<(PeerAddress, Result<(), NetError>)> = stream::iter(outbound)
        .map(|(peer, share)| {
            let transport = Arc::clone(&transport);
            async move {
                let result = transport.send_share(&peer, share).await;
                (peer, result)
            }
        })
        .buffer_unordered(fanout.max(1))
        .collect()
        .await;

    let mut report = DispatchReport::default();
    for (peer, result) in results {
        match result {
            Ok(()) => {
                log::info!("{}: Sent share to {}", port, peer);
                report.delivered += 1;
            }
            Err(e) => {
                log::warn!("{}: Error when sending share to {}: {}", port, peer, e);
                report.failures.push((peer, e));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy;
    use crate::mpc::MpcError;
    use futures::future::BoxFuture;
    use std::collections::HashSet;

    #[derive(Default)]
    struct MockTransport {
        failing_peers: HashSet<u16>,
        fail_submit: bool,
        registered: Mutex<Vec<u16>>,
        sent: Mutex<Vec<(u16, i64)>>,
        submitted: Mutex<Vec<i64>>,
    }

    impl Transport for MockTransport {
        fn register<'a>(
            &'a self,
            _aggregator: &'a PeerAddress,
            own: &'a PeerAddress,
        ) -> BoxFuture<'a, Result<(), NetError>> {
            Box::pin(async move {
                self.registered.lock().unwrap().push(own.port());
                Ok(())
            })
        }

        fn send_share<'a>(
            &'a self,
            peer: &'a PeerAddress,
            share: i64,
        ) -> BoxFuture<'a, Result<(), NetError>> {
            Box::pin(async move {
                if self.failing_peers.contains(&peer.port()) {
                    return Err(NetError::ConnectionFailed);
                }
                self.sent.lock().unwrap().push((peer.port(), share));
                Ok(())
            })
        }

        fn submit_aggregate<'a>(
            &'a self,
            _aggregator: &'a PeerAddress,
            aggregate: i64,
        ) -> BoxFuture<'a, Result<(), NetError>> {
            Box::pin(async move {
                if self.fail_submit {
                    return Err(NetError::Rejected(500));
                }
                self.submitted.lock().unwrap().push(aggregate);
                Ok(())
            })
        }

        fn push_peer_list<'a>(
            &'a self,
            _contributor: &'a PeerAddress,
            _list: &'a PeerList,
        ) -> BoxFuture<'a, Result<(), NetError>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn node(
        population: usize,
        secret: i64,
        transport: Arc<MockTransport>,
    ) -> ContributorNode<MockTransport> {
        let config = ContributorConfig {
            port: 8081,
            population,
            max_range: 50,
            ..ContributorConfig::default()
        };
        ContributorNode::new(config, PrivateValue::new(secret), entropy::seeded(5), transport)
            .unwrap()
    }

    fn ports(n: u16) -> PeerList {
        PeerList {
            port: 8081,
            ports: (0..n).map(|i| 8081 + i).collect(),
        }
    }

    #[tokio::test]
    async fn test_single_contributor_completes_immediately() {
        let transport = Arc::new(MockTransport::default());
        let node = node(1, 37, Arc::clone(&transport));

        node.register().await.unwrap();
        assert_eq!(node.state(), State::AwaitingPeers);
        assert_eq!(*transport.registered.lock().unwrap(), vec![8081]);

        node.receive_peer_list(ports(1)).await.unwrap();
        assert_eq!(node.wait_finished().await, State::Submitted);
        assert_eq!(node.aggregate(), Some(37));
        assert_eq!(*transport.submitted.lock().unwrap(), vec![37]);

        let report = node.dispatch_report().await.unwrap();
        assert_eq!(report, DispatchReport::default());
    }

    #[tokio::test]
    async fn test_round_with_two_peers() {
        let transport = Arc::new(MockTransport::default());
        let node = node(3, 20, Arc::clone(&transport));

        node.register().await.unwrap();
        node.receive_peer_list(ports(3)).await.unwrap();
        assert_eq!(node.state(), State::Aggregating);
        assert_eq!(node.received(), 1);

        let report = node.dispatch_report().await.unwrap();
        assert_eq!(report.delivered, 2);
        assert!(report.is_complete());

        let sent = transport.sent.lock().unwrap().clone();
        let mut targets: Vec<u16> = sent.iter().map(|(p, _)| *p).collect();
        targets.sort_unstable();
        assert_eq!(targets, vec![8082, 8083]);
        let sent_total: i64 = sent.iter().map(|(_, s)| *s).sum();

        assert_eq!(node.receive_share(4).await.unwrap(), 2);
        assert_eq!(node.receive_share(6).await.unwrap(), 3);
        assert_eq!(node.wait_finished().await, State::Submitted);

        // retained + 4 + 6, where retained = 20 - sent_total
        let expected = 20 - sent_total + 10;
        assert_eq!(*transport.submitted.lock().unwrap(), vec![expected]);
    }

    #[tokio::test]
    async fn test_shares_before_peer_list() {
        let transport = Arc::new(MockTransport::default());
        let node = node(3, 9, Arc::clone(&transport));

        node.register().await.unwrap();
        node.receive_share(1).await.unwrap();
        node.receive_share(2).await.unwrap();
        assert_eq!(node.state(), State::AwaitingPeers);

        node.receive_peer_list(ports(3)).await.unwrap();
        assert_eq!(node.wait_finished().await, State::Submitted);
        assert_eq!(transport.submitted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_send_does_not_block_others() {
        let transport = Arc::new(MockTransport {
            failing_peers: [8082].into_iter().collect(),
            ..MockTransport::default()
        });
        let node = node(4, 11, Arc::clone(&transport));

        node.register().await.unwrap();
        node.receive_peer_list(ports(4)).await.unwrap();

        let report = node.dispatch_report().await.unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(
            report.failures,
            vec![(PeerAddress::new("localhost", 8082), NetError::ConnectionFailed)]
        );
        assert!(node.dispatch_report().await.is_none());
    }

    #[tokio::test]
    async fn test_round_closed_after_completion() {
        let transport = Arc::new(MockTransport::default());
        let node = node(2, 3, Arc::clone(&transport));

        node.register().await.unwrap();
        node.receive_peer_list(ports(2)).await.unwrap();
        node.receive_share(8).await.unwrap();

        assert_eq!(
            node.receive_share(8).await,
            Err(ProtocolError::Share(MpcError::RoundClosed { population: 2 }))
        );
        assert_eq!(transport.submitted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_population_mismatch() {
        let transport = Arc::new(MockTransport::default());
        let node = node(3, 3, transport);
        node.register().await.unwrap();

        let err = node.receive_peer_list(ports(5)).await.unwrap_err();
        assert_eq!(
            err,
            ProtocolError::PopulationMismatch {
                expected: 3,
                delivered: 5
            }
        );
        assert_eq!(node.state(), State::AwaitingPeers);
    }

    #[tokio::test]
    async fn test_peer_list_without_own_port() {
        let transport = Arc::new(MockTransport::default());
        let node = node(3, 3, transport);
        node.register().await.unwrap();

        // Only the other two peers listed; own port is implied.
        let list = PeerList {
            port: 8081,
            ports: vec![8082, 8083, 8082],
        };
        node.receive_peer_list(list).await.unwrap();
        assert_eq!(node.dispatch_report().await.unwrap().delivered, 2);
    }

    #[tokio::test]
    async fn test_peer_list_before_registration() {
        let transport = Arc::new(MockTransport::default());
        let node = node(2, 3, transport);
        assert_eq!(
            node.receive_peer_list(ports(2)).await,
            Err(ProtocolError::InvalidState(State::Idle))
        );
    }

    #[tokio::test]
    async fn test_second_peer_list_rejected() {
        let transport = Arc::new(MockTransport::default());
        let node = node(2, 3, transport);
        node.register().await.unwrap();
        node.receive_peer_list(ports(2)).await.unwrap();
        assert_eq!(
            node.receive_peer_list(ports(2)).await,
            Err(ProtocolError::InvalidState(State::Aggregating))
        );
    }

    #[tokio::test]
    async fn test_submission_failure_is_terminal() {
        let transport = Arc::new(MockTransport {
            fail_submit: true,
            ..MockTransport::default()
        });
        let node = node(1, 3, transport);
        node.register().await.unwrap();
        node.receive_peer_list(ports(1)).await.unwrap();
        assert_eq!(node.wait_finished().await, State::Failed);
        assert_eq!(node.aggregate(), Some(3));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_shares_submit_once() {
        const N: u16 = 50;
        let transport = Arc::new(MockTransport::default());
        let node = Arc::new(node(N as usize, 1000, Arc::clone(&transport)));

        node.register().await.unwrap();
        node.receive_peer_list(ports(N)).await.unwrap();

        let tasks: Vec<_> = (1..N)
            .map(|i| {
                let node = Arc::clone(&node);
                tokio::spawn(async move { node.receive_share(i as i64).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(node.wait_finished().await, State::Submitted);
        assert_eq!(transport.submitted.lock().unwrap().len(), 1);
        assert_eq!(node.received(), N as usize);
    }
}
