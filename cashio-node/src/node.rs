//! Node orchestrator.
//!
//! Opens storage, runs the ingest task and coordinates shutdown.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use cashio_storage::{KvBackend, RocksBackend};

use crate::config::NodeConfig;
use crate::service::{DepositEvent, IngestReceipt, Service, ServiceError, ServiceResult};
use crate::shutdown::{shutdown_channel, wait_for_shutdown_signal, ShutdownGuard, ShutdownTx};

/// Pending ingest requests before senders wait.
const INGEST_QUEUE_DEPTH: usize = 256;

/// Request to ingest one deposit.
pub struct IngestRequest {
    /// The observed deposit.
    pub event: DepositEvent,
    /// Artifact bytes to store and link, if any.
    pub artifact: Option<Vec<u8>>,
    /// Channel to send the result back.
    pub result_tx: oneshot::Sender<ServiceResult<IngestReceipt>>,
}

/// Sending side of the ingest task.
#[derive(Clone)]
pub struct IngestHandle {
    tx: mpsc::Sender<IngestRequest>,
}

impl IngestHandle {
    /// Submit a deposit and wait for it to be committed.
    pub async fn ingest(
        &self,
        event: DepositEvent,
        artifact: Option<Vec<u8>>,
    ) -> ServiceResult<IngestReceipt> {
        let (result_tx, result_rx) = oneshot::channel();
        self.tx
            .send(IngestRequest {
                event,
                artifact,
                result_tx,
            })
            .await
            .map_err(|_| ServiceError::Internal("ingest task stopped".into()))?;
        result_rx
            .await
            .map_err(|_| ServiceError::Internal("ingest task dropped request".into()))?
    }
}

/// Spawn the ingest task for `service`.
pub fn spawn_ingest<B: KvBackend + 'static>(
    service: Service<B>,
    shutdown_tx: &ShutdownTx,
) -> (IngestHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(INGEST_QUEUE_DEPTH);
    let guard = ShutdownGuard::new(shutdown_tx);
    let handle = tokio::spawn(run_ingest_task(service, rx, guard));
    (IngestHandle { tx }, handle)
}

/// Apply ingest requests one at a time until shutdown or until every
/// handle is dropped.
async fn run_ingest_task<B: KvBackend + 'static>(
    service: Service<B>,
    mut rx: mpsc::Receiver<IngestRequest>,
    mut shutdown: ShutdownGuard,
) {
    loop {
        tokio::select! {
            _ = shutdown.wait() => {
                tracing::info!("Ingest task received shutdown signal");
                break;
            }
            request = rx.recv() => {
                let Some(request) = request else { break };
                let service = service.clone();
                let IngestRequest { event, artifact, result_tx } = request;
                let result = tokio::task::spawn_blocking(move || {
                    service.ingest(&event, artifact.as_deref())
                })
                .await
                .unwrap_or_else(|e| Err(ServiceError::Internal(format!("ingest worker: {}", e))));
                if let Err(e) = &result {
                    tracing::warn!(error = %e, "deposit rejected");
                }
                let _ = result_tx.send(result);
            }
        }
    }
}

/// The main node structure.
pub struct Node {
    /// Node configuration.
    config: NodeConfig,

    /// Storage backend, shared by the tree and the blob store.
    backend: Arc<RocksBackend>,

    /// Tree and blob store.
    service: Service<RocksBackend>,

    /// Shutdown signal sender.
    shutdown_tx: ShutdownTx,
}

impl Node {
    /// Open storage for `config`.
    pub fn new(config: NodeConfig) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        tracing::info!("Data directory: {:?}", config.data_dir);

        let backend = Arc::new(RocksBackend::open(config.db_path())?);
        let cipher = config.key.cipher()?;
        let service = Service::open(backend.clone(), config.tree.clone(), config.shards.clone(), cipher)?;

        let state = service.tree_state();
        tracing::info!(
            "Commitment tree at depth {} with {} leaves (root: {})",
            state.depth,
            state.next_leaf_index,
            hex::encode(state.root)
        );

        let shutdown_tx = shutdown_channel();

        Ok(Self {
            config,
            backend,
            service,
            shutdown_tx,
        })
    }

    /// Tree and blob store.
    pub fn service(&self) -> &Service<RocksBackend> {
        &self.service
    }

    /// Node configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Start the ingest task.
    pub fn spawn_ingest(&self) -> (IngestHandle, JoinHandle<()>) {
        spawn_ingest(self.service.clone(), &self.shutdown_tx)
    }

    /// Signal every task to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Run until SIGINT or SIGTERM with no event source attached.
    ///
    /// The store is hosted and flushed on exit, but nothing submits
    /// deposits; embedders that own an event source use [`Node::run_with`].
    pub async fn run(&self) -> anyhow::Result<()> {
        self.run_with(|_ingest| async {}).await
    }

    /// Run until SIGINT, SIGTERM or [`Node::shutdown`], feeding deposits
    /// from `source`.
    ///
    /// `source` receives the ingest handle and runs as its own task; it is
    /// aborted on shutdown if still running.
    pub async fn run_with<F, Fut>(&self, source: F) -> anyhow::Result<()>
    where
        F: FnOnce(IngestHandle) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tracing::info!("Starting Cash.io node...");
        tracing::info!("  Tree depth: {}", self.config.tree.depth);
        tracing::info!("  Shards per blob: {}", self.config.shards.shard_count);
        tracing::info!("  Max blob size: {}", self.config.shards.max_blob_size);
        tracing::info!("  Blob key: {:?}", self.config.key);

        let mut shutdown = ShutdownGuard::new(&self.shutdown_tx);
        let (ingest, ingest_handle) = self.spawn_ingest();
        let source_handle = tokio::spawn(source(ingest));

        tokio::select! {
            signal = wait_for_shutdown_signal() => signal?,
            _ = shutdown.wait() => {}
        }

        tracing::info!("Shutting down node...");
        self.shutdown();

        source_handle.abort();
        let _ = source_handle.await;
        let _ = ingest_handle.await;
        tracing::info!("Ingest task stopped");

        self.backend.flush()?;
        tracing::info!("Node shutdown complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cashio_core::{BlobCipher, Commitment, ShardConfig};
    use cashio_storage::{MemoryBackend, TreeConfig};

    fn memory_service() -> Service<MemoryBackend> {
        Service::open(
            Arc::new(MemoryBackend::new()),
            TreeConfig::with_depth(3),
            ShardConfig::with_shard_count(2),
            BlobCipher::ephemeral(),
        )
        .unwrap()
    }

    fn event(seed: u8) -> DepositEvent {
        DepositEvent {
            commitment: Commitment::hash_to_field(&[seed]),
            block_number: u64::from(seed),
            tx_hash: [seed; 32],
            timestamp: 0,
            rollup_id: "r".into(),
            epoch: 0,
        }
    }

    #[tokio::test]
    async fn test_ingest_task_assigns_sequential_indices() {
        let shutdown_tx = shutdown_channel();
        let (handle, task) = spawn_ingest(memory_service(), &shutdown_tx);

        for i in 0..4u8 {
            let receipt = handle.ingest(event(i), None).await.unwrap();
            assert_eq!(receipt.leaf_index, u64::from(i));
            assert!(receipt.cid.is_none());
        }

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();
        assert!(handle.ingest(event(9), None).await.is_err());
    }

    #[tokio::test]
    async fn test_ingest_task_reports_errors() {
        let shutdown_tx = shutdown_channel();
        let (handle, _task) = spawn_ingest(memory_service(), &shutdown_tx);

        handle.ingest(event(1), Some(b"a".to_vec())).await.unwrap();
        let err = handle.ingest(event(1), None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_ingest_task_stops_when_handles_dropped() {
        let shutdown_tx = shutdown_channel();
        let (handle, task) = spawn_ingest(memory_service(), &shutdown_tx);
        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_with_feeds_deposits_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig {
            data_dir: dir.path().to_path_buf(),
            tree: TreeConfig::with_depth(4),
            shards: ShardConfig::with_shard_count(2),
            ..NodeConfig::default()
        };
        let node = Node::new(config).unwrap();
        let (done_tx, done_rx) = oneshot::channel();

        let run = node.run_with(|ingest| async move {
            for i in 0..3u8 {
                ingest.ingest(event(i), Some(vec![i])).await.unwrap();
            }
            let _ = done_tx.send(());
        });
        let stop = async {
            done_rx.await.unwrap();
            node.shutdown();
        };
        let (result, ()) = tokio::join!(run, stop);
        result.unwrap();

        assert_eq!(node.service().tree_state().next_leaf_index, 3);
        assert_eq!(node.service().blob_stats().unwrap().total_blobs, 3);
    }
}
