//! The sync service: inbound listener lifecycle and peer reconciliation.
//!
//! The listener is one task that accepts connections and hands each to a
//! detached handler, bounded by a semaphore. Reconciliation pulls from the
//! configured peers one at a time, either on demand or on a timer.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use formula_chain_store::Ledger;
use formula_chain_sync::PullReport;

use crate::config::PeerAddr;
use crate::error::{NodeError, Result};
use crate::node::Node;

/// Outcome of one pass over the configured peers.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Peers that completed a pull.
    pub pulled: Vec<(PeerAddr, PullReport)>,
    /// Peers whose attempt failed, with the error text.
    pub failed: Vec<(PeerAddr, String)>,
}

impl ReconcileReport {
    /// Blocks appended across all peers.
    pub fn appended(&self) -> u64 {
        self.pulled.iter().map(|(_, r)| r.appended).sum()
    }
}

struct RunningListener {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

/// Listener and reconciler for one node.
pub struct SyncService<L: Ledger + 'static> {
    node: Arc<Node<L>>,
    /// Guards the listener lifecycle.
    listener: Mutex<Option<RunningListener>>,
    shutdown: watch::Sender<bool>,
}

impl<L: Ledger + 'static> SyncService<L> {
    pub fn new(node: Arc<Node<L>>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            node,
            listener: Mutex::new(None),
            shutdown,
        }
    }

    pub fn node(&self) -> &Arc<Node<L>> {
        &self.node
    }

    /// Bind the listener and start accepting.
    ///
    /// Returns the bound address, or `None` when sync is disabled.
    pub async fn start(&self) -> Result<Option<SocketAddr>> {
        let sync = &self.node.config().sync;
        if !sync.enabled {
            info!("sync disabled; listener not started");
            return Ok(None);
        }

        let mut slot = self.listener.lock().await;
        if slot.is_some() {
            return Err(NodeError::AlreadyRunning);
        }

        let listener = bind(sync.listen_host.as_deref(), sync.listen_port).await?;
        let local_addr = listener.local_addr().map_err(|source| NodeError::Bind {
            addr: format!("port {}", sync.listen_port),
            source,
        })?;

        self.shutdown.send_replace(false);
        let task = tokio::spawn(accept_loop(
            listener,
            self.node.clone(),
            sync.max_connections.max(1),
            self.shutdown.subscribe(),
        ));

        info!(addr = %local_addr, node_id = self.node.node_id(), "sync listener started");
        *slot = Some(RunningListener { local_addr, task });
        Ok(Some(local_addr))
    }

    /// Stop accepting and wait for the listener task.
    ///
    /// Handlers already running finish on their own. Also ends a reconciler
    /// started with [`spawn_reconciler`](Self::spawn_reconciler). Stopping a
    /// stopped service does nothing.
    pub async fn stop(&self) {
        self.shutdown.send_replace(true);

        let running = self.listener.lock().await.take();
        if let Some(running) = running {
            if let Err(e) = running.task.await {
                warn!(error = %e, "listener task ended abnormally");
            }
            info!(addr = %running.local_addr, "sync listener stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.listener.lock().await.is_some()
    }

    /// Address the listener is bound to, while running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.lock().await.as_ref().map(|l| l.local_addr)
    }

    /// Pull once from every configured peer, in order.
    pub async fn reconcile_once(&self) -> ReconcileReport {
        reconcile(&self.node).await
    }

    /// Reconcile every `reconcile_interval_secs` until [`stop`](Self::stop).
    ///
    /// Returns `None` when sync is disabled.
    pub fn spawn_reconciler(&self) -> Option<JoinHandle<()>> {
        let sync = &self.node.config().sync;
        if !sync.enabled {
            return None;
        }

        let node = self.node.clone();
        let period = sync.reconcile_interval();
        let mut shutdown = self.shutdown.subscribe();

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = reconcile(&node).await;
                        debug!(
                            appended = report.appended(),
                            failed = report.failed.len(),
                            "reconcile tick"
                        );
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("reconciler stopped");
        }))
    }
}

async fn reconcile<L: Ledger>(node: &Node<L>) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    if !node.config().sync.enabled {
        return report;
    }

    for peer in &node.config().sync.peers {
        match node.pull(peer).await {
            Ok(pull) => {
                if pull.appended > 0 {
                    info!(peer = %peer, appended = pull.appended, "pulled blocks");
                }
                report.pulled.push((peer.clone(), pull));
            }
            Err(e) => {
                warn!(peer = %peer, error = %e, "pull failed");
                report.failed.push((peer.clone(), e.to_string()));
            }
        }
    }
    report
}

/// Bind `host:port`, or dual-stack `[::]:port` falling back to `0.0.0.0:port`.
async fn bind(host: Option<&str>, port: u16) -> Result<TcpListener> {
    if let Some(host) = host {
        let addr = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        };
        return TcpListener::bind(addr.as_str())
            .await
            .map_err(|source| NodeError::Bind { addr, source });
    }

    match TcpListener::bind((Ipv6Addr::UNSPECIFIED, port)).await {
        Ok(listener) => Ok(listener),
        Err(e) => {
            debug!(error = %e, "IPv6 bind failed, falling back to IPv4");
            TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
                .await
                .map_err(|source| NodeError::Bind {
                    addr: format!("0.0.0.0:{}", port),
                    source,
                })
        }
    }
}

async fn accept_loop<L: Ledger + 'static>(
    listener: TcpListener,
    node: Arc<Node<L>>,
    max_connections: usize,
    mut shutdown: watch::Receiver<bool>,
) {
    let permits = Arc::new(Semaphore::new(max_connections));

    loop {
        let permit = tokio::select! {
            _ = shutdown.changed() => break,
            permit = permits.clone().acquire_owned() => match permit {
                Ok(p) => p,
                Err(_) => break,
            },
        };

        let (stream, addr) = tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            },
        };

        let node = node.clone();
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = node.serve(stream).await {
                warn!(peer = %addr, error = %e, "inbound sync failed");
            }
        });
    }
    // dropping the listener closes the socket
}
