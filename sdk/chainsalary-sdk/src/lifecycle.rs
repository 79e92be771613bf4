use crate::capability::CapabilityHandle;
use crate::core::connection::ChainConnection;
use crate::error::{Result, SdkError};
use crate::resolver::RuntimeResolver;
use crate::types::{ChainId, RuntimeStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Marks one bootstrap attempt. Only the newest, uncancelled token may commit.
#[derive(Debug, Clone)]
pub struct CancelToken {
    generation: u64,
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

struct ControllerState {
    status: RuntimeStatus,
    current: Option<CapabilityHandle>,
    last_error: Option<SdkError>,
    chain_id: Option<ChainId>,
    connection: Option<ChainConnection>,
    enabled: bool,
    token: Option<CancelToken>,
    generation: u64,
}

struct ControllerInner {
    resolver: Arc<RuntimeResolver>,
    state: Mutex<ControllerState>,
    status_tx: watch::Sender<RuntimeStatus>,
}

/// Owns the capability for the current `(chain, connection)` binding.
///
/// Changing the binding cancels any bootstrap in flight and discards the
/// current capability. A superseded bootstrap may still finish, but its
/// outcome is dropped. A runtime that comes up on a chain other than the bound
/// one is reported as a bootstrap error. Bootstraps run on the tokio runtime,
/// so the mutating methods must be called from within one.
#[derive(Clone)]
pub struct RuntimeController {
    inner: Arc<ControllerInner>,
}

impl RuntimeController {
    pub fn new(resolver: Arc<RuntimeResolver>) -> Self {
        let (status_tx, _) = watch::channel(RuntimeStatus::Idle);
        Self {
            inner: Arc::new(ControllerInner {
                resolver,
                state: Mutex::new(ControllerState {
                    status: RuntimeStatus::Idle,
                    current: None,
                    last_error: None,
                    chain_id: None,
                    connection: None,
                    enabled: true,
                    token: None,
                    generation: 0,
                }),
                status_tx,
            }),
        }
    }

    pub fn status(&self) -> RuntimeStatus {
        self.inner.lock().status
    }

    pub fn capability(&self) -> Option<CapabilityHandle> {
        self.inner.lock().current.clone()
    }

    pub fn error(&self) -> Option<SdkError> {
        self.inner.lock().last_error.clone()
    }

    /// Human-readable status line
    pub fn message(&self) -> String {
        let state = self.inner.lock();
        match (&state.status, &state.last_error) {
            (RuntimeStatus::Error, Some(e)) => format!("error: {e}"),
            (status, _) => status.to_string(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<RuntimeStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Bind to `(chain_id, connection)`. A no-op if nothing changed; otherwise the
    /// old binding is torn down and, when possible, a bootstrap starts.
    pub fn bind(
        &self,
        chain_id: Option<ChainId>,
        connection: Option<ChainConnection>,
    ) -> Option<JoinHandle<()>> {
        {
            let mut state = self.inner.lock();
            let same_connection = match (&state.connection, &connection) {
                (Some(a), Some(b)) => a.same_as(b),
                (None, None) => true,
                _ => false,
            };
            if state.generation > 0 && state.chain_id == chain_id && same_connection {
                return None;
            }
            if state.chain_id != chain_id {
                info!(from = ?state.chain_id, to = ?chain_id, "chain changed, dropping runtime");
            }
            state.chain_id = chain_id;
            state.connection = connection;
            self.inner.reset(&mut state);
        }
        self.start()
    }

    pub fn set_enabled(&self, enabled: bool) -> Option<JoinHandle<()>> {
        {
            let mut state = self.inner.lock();
            if state.enabled == enabled {
                return None;
            }
            state.enabled = enabled;
            self.inner.reset(&mut state);
        }
        self.start()
    }

    /// Repeat the idle -> loading cycle with the same inputs
    pub fn refresh(&self) -> Option<JoinHandle<()>> {
        {
            let mut state = self.inner.lock();
            self.inner.reset(&mut state);
        }
        self.start()
    }

    /// Wait until the current binding is ready or has failed
    pub async fn wait_ready(&self) -> Result<CapabilityHandle> {
        let mut rx = self.subscribe();
        loop {
            let status = *rx.borrow_and_update();
            match status {
                RuntimeStatus::Ready => {
                    if let Some(capability) = self.capability() {
                        return Ok(capability);
                    }
                },
                RuntimeStatus::Error => return Err(self.error().unwrap_or(SdkError::NotReady)),
                RuntimeStatus::Idle | RuntimeStatus::Loading => {},
            }
            if rx.changed().await.is_err() {
                return Err(SdkError::NotReady);
            }
        }
    }

    fn start(&self) -> Option<JoinHandle<()>> {
        let (token, connection) = {
            let mut state = self.inner.lock();
            if !state.enabled {
                return None;
            }
            let connection = state.connection.clone()?;
            state.generation += 1;
            let token = CancelToken::new(state.generation);
            state.token = Some(token.clone());
            state.last_error = None;
            self.inner.set_status(&mut state, RuntimeStatus::Loading);
            (token, connection)
        };

        debug!(generation = token.generation(), "bootstrap started");
        let inner = self.inner.clone();
        Some(tokio::spawn(async move {
            let outcome = inner.resolver.resolve(&connection).await;
            inner.commit(&token, outcome);
        }))
    }
}

impl ControllerInner {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, state: &mut ControllerState, status: RuntimeStatus) {
        state.status = status;
        self.status_tx.send_replace(status);
    }

    fn reset(&self, state: &mut ControllerState) {
        if let Some(token) = state.token.take() {
            token.cancel();
        }
        state.current = None;
        state.last_error = None;
        self.set_status(state, RuntimeStatus::Idle);
    }

    fn commit(&self, token: &CancelToken, outcome: Result<CapabilityHandle>) {
        let mut state = self.lock();
        let is_current = state
            .token
            .as_ref()
            .is_some_and(|t| t.generation() == token.generation());
        if token.is_cancelled() || !is_current {
            debug!(generation = token.generation(), "discarding superseded bootstrap");
            return;
        }
        let outcome = match (outcome, state.chain_id) {
            (Ok(capability), Some(bound)) if capability.chain_id() != bound => {
                Err(SdkError::Bootstrap(format!(
                    "chain mismatch: bound to {bound}, connection is on {}",
                    capability.chain_id()
                )))
            },
            (outcome, _) => outcome,
        };
        match outcome {
            Ok(capability) => {
                info!(chain_id = capability.chain_id(), "runtime ready");
                state.current = Some(capability);
                state.last_error = None;
                self.set_status(&mut state, RuntimeStatus::Ready);
            },
            Err(e) => {
                warn!(error = %e, "runtime bootstrap failed");
                state.current = None;
                state.last_error = Some(e);
                self.set_status(&mut state, RuntimeStatus::Error);
            },
        }
    }
}
