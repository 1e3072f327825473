use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};

use vitrina_core::domain::product::Product;
use vitrina_core::errors::ApplicationError;
use vitrina_db::ProductRepository;

pub type ViewerId = u64;

/// The complete product list at one point in time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CatalogSnapshot {
    pub revision: u64,
    pub products: Vec<Product>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub revision: u64,
    pub delivered: usize,
    pub evicted: usize,
}

/// Receives a push of the full catalog after every product mutation.
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    /// Never fails from the caller's point of view: read and delivery problems are logged.
    async fn broadcast_all(&self) -> BroadcastReport;
}

/// Notifier for contexts with no live viewers (CLI, tests).
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl ChangeNotifier for NoopNotifier {
    async fn broadcast_all(&self) -> BroadcastReport {
        BroadcastReport::default()
    }
}

/// Receiving half handed to a viewer transport.
#[derive(Debug)]
pub struct ViewerChannel {
    id: ViewerId,
    receiver: mpsc::Receiver<Arc<CatalogSnapshot>>,
}

impl ViewerChannel {
    pub fn id(&self) -> ViewerId {
        self.id
    }

    /// `None` once the registry has dropped this viewer.
    pub async fn recv(&mut self) -> Option<Arc<CatalogSnapshot>> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<CatalogSnapshot>> {
        self.receiver.try_recv().ok()
    }
}

/// Set of connected viewers. Owned by the running application and shared by handle.
pub struct ViewerRegistry {
    products: Arc<dyn ProductRepository>,
    viewers: RwLock<HashMap<ViewerId, mpsc::Sender<Arc<CatalogSnapshot>>>>,
    // Serializes connect and broadcast; holds the last published revision.
    publish_gate: Mutex<u64>,
    next_viewer_id: AtomicU64,
    channel_capacity: usize,
}

impl ViewerRegistry {
    pub fn new(products: Arc<dyn ProductRepository>, channel_capacity: usize) -> Self {
        Self {
            products,
            viewers: RwLock::new(HashMap::new()),
            publish_gate: Mutex::new(0),
            next_viewer_id: AtomicU64::new(1),
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Registers a viewer and queues the current snapshot as its first message.
    pub async fn connect(&self) -> Result<ViewerChannel, ApplicationError> {
        let revision = self.publish_gate.lock().await;

        let products = self
            .products
            .list_all()
            .await
            .map_err(|error| ApplicationError::persistence("notifier.connect", error))?;
        let snapshot = Arc::new(CatalogSnapshot { revision: *revision, products });

        let id = self.next_viewer_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.channel_capacity);
        // Fresh channel with capacity >= 1, so the first send always fits.
        let _ = sender.try_send(snapshot);

        self.viewers.write().await.insert(id, sender);
        info!(
            event_name = "notifier.viewer.connected",
            viewer_id = id,
            revision = *revision,
            "viewer connected"
        );

        Ok(ViewerChannel { id, receiver })
    }

    pub async fn disconnect(&self, id: ViewerId) {
        if self.viewers.write().await.remove(&id).is_some() {
            info!(event_name = "notifier.viewer.disconnected", viewer_id = id, "viewer disconnected");
        }
    }

    pub async fn viewer_count(&self) -> usize {
        self.viewers.read().await.len()
    }

    pub async fn current_revision(&self) -> u64 {
        *self.publish_gate.lock().await
    }
}

#[async_trait]
impl ChangeNotifier for ViewerRegistry {
    async fn broadcast_all(&self) -> BroadcastReport {
        let mut revision = self.publish_gate.lock().await;

        let products = match self.products.list_all().await {
            Ok(products) => products,
            Err(error) => {
                warn!(
                    event_name = "notifier.broadcast.read_failed",
                    error = %error,
                    "could not read catalog for broadcast"
                );
                return BroadcastReport { revision: *revision, ..BroadcastReport::default() };
            }
        };

        *revision += 1;
        let snapshot = Arc::new(CatalogSnapshot { revision: *revision, products });

        let targets: Vec<(ViewerId, mpsc::Sender<Arc<CatalogSnapshot>>)> = self
            .viewers
            .read()
            .await
            .iter()
            .map(|(id, sender)| (*id, sender.clone()))
            .collect();

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, sender) in targets {
            match sender.try_send(Arc::clone(&snapshot)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Closed(_)) => dead.push(id),
                Err(TrySendError::Full(_)) => {
                    debug!(
                        event_name = "notifier.viewer.lagging",
                        viewer_id = id,
                        "viewer buffer full, evicting"
                    );
                    dead.push(id);
                }
            }
        }

        if !dead.is_empty() {
            let mut viewers = self.viewers.write().await;
            for id in &dead {
                viewers.remove(id);
            }
        }

        info!(
            event_name = "notifier.broadcast.completed",
            revision = *revision,
            delivered,
            evicted = dead.len(),
            "catalog snapshot broadcast"
        );

        BroadcastReport { revision: *revision, delivered, evicted: dead.len() }
    }
}
