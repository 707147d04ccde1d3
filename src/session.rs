//! Transient state of one "generate" interaction: the chosen modality, the
//! busy flag, and the attempt counter that lets a newer attempt replace a
//! stale one.

use std::future::Future;
use std::sync::Arc;

use futures::future::{AbortHandle, AbortRegistration, Abortable};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;

use crate::collector::{CollectionError, Collector, InputModality, ModalityKind, RecipeBackend};
use crate::enrichment::{ImageResolver, ImageSearch};
use crate::view::ResultsView;

/// The loading flag shown while a request is in flight. Overlapping attempts
/// share it; it reads `true` until the last live guard is dropped.
#[derive(Debug, Clone)]
pub struct BusyFlag {
    inner: Arc<BusyInner>,
}

#[derive(Debug)]
struct BusyInner {
    tx: watch::Sender<bool>,
    holders: Mutex<usize>,
}

impl Default for BusyFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl BusyFlag {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            inner: Arc::new(BusyInner {
                tx,
                holders: Mutex::new(0),
            }),
        }
    }

    pub fn is_busy(&self) -> bool {
        *self.inner.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.tx.subscribe()
    }

    /// Sets the flag until the returned guard, and every other live guard,
    /// is dropped.
    pub fn raise(&self) -> BusyGuard {
        let mut holders = self.inner.holders.lock();
        *holders += 1;
        if *holders == 1 {
            self.inner.tx.send_replace(true);
        }
        BusyGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[must_use = "the busy flag drops back to false as soon as the guard is dropped"]
pub struct BusyGuard {
    inner: Arc<BusyInner>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let mut holders = self.inner.holders.lock();
        *holders = holders.saturating_sub(1);
        if *holders == 0 {
            self.inner.tx.send_replace(false);
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("attempt {0} was superseded by a newer attempt")]
pub struct Superseded(pub u64);

#[derive(Debug, Default)]
struct GateState {
    current: u64,
    abort: Option<AbortHandle>,
}

/// Hands out attempts. Beginning a new attempt aborts the previous one.
#[derive(Debug, Clone, Default)]
pub struct AttemptGate {
    state: Arc<Mutex<GateState>>,
}

impl AttemptGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> Attempt {
        let mut state = self.state.lock();
        if let Some(previous) = state.abort.take() {
            info!(attempt = state.current, "superseding in-flight attempt");
            previous.abort();
        }
        state.current += 1;
        let (handle, registration) = AbortHandle::new_pair();
        state.abort = Some(handle);
        Attempt {
            id: state.current,
            gate: self.clone(),
            registration: Mutex::new(Some(registration)),
        }
    }

    pub fn current(&self) -> u64 {
        self.state.lock().current
    }
}

#[derive(Debug)]
pub struct Attempt {
    id: u64,
    gate: AttemptGate,
    registration: Mutex<Option<AbortRegistration>>,
}

impl Attempt {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_current(&self) -> bool {
        self.gate.current() == self.id
    }

    /// Runs `fut` until it finishes or a newer attempt begins. Only the first
    /// guarded future is abortable; later ones still fail fast when stale.
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, Superseded> {
        if !self.is_current() {
            return Err(Superseded(self.id));
        }
        let registration = self.registration.lock().take();
        match registration {
            Some(registration) => Abortable::new(fut, registration)
                .await
                .map_err(|_| Superseded(self.id)),
            None => Ok(fut.await),
        }
    }
}

#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Collection(#[from] CollectionError),
    #[error(transparent)]
    Superseded(#[from] Superseded),
}

/// Owns the collector, the image resolver and the per-session flags.
pub struct Session<B, S> {
    collector: Collector<B>,
    resolver: ImageResolver<S>,
    busy: BusyFlag,
    attempts: AttemptGate,
    selection: Mutex<Option<ModalityKind>>,
}

impl<B: RecipeBackend, S: ImageSearch> Session<B, S> {
    pub fn new(collector: Collector<B>, resolver: ImageResolver<S>) -> Self {
        Self {
            collector,
            resolver,
            busy: BusyFlag::new(),
            attempts: AttemptGate::new(),
            selection: Mutex::new(None),
        }
    }

    pub fn busy(&self) -> &BusyFlag {
        &self.busy
    }

    pub fn resolver(&self) -> &ImageResolver<S> {
        &self.resolver
    }

    pub fn selection(&self) -> Option<ModalityKind> {
        *self.selection.lock()
    }

    /// Collects recipes for `input` and opens the results view in its loading
    /// (or empty) state. Enrichment is left to [`ResultsView::enrich`].
    ///
    /// A generator that answers with no recipes opens the empty view; every
    /// other collection failure is returned and no view is opened.
    pub async fn submit(&self, input: InputModality) -> Result<ResultsView, CollectionError> {
        let attempt = self.attempts.begin();
        *self.selection.lock() = Some(input.kind());
        match self.collector.collect(input, &self.busy).await {
            Ok(payload) => Ok(ResultsView::open(&payload, attempt)),
            Err(CollectionError::NoRecipes { ingredients }) => {
                info!(attempt = attempt.id(), "generator returned no recipes");
                Ok(ResultsView::empty(ingredients, attempt))
            }
            Err(e) => {
                self.selection.lock().take();
                Err(e)
            }
        }
    }

    /// Full attempt: collect, open the view, and enrich it.
    pub async fn generate(&self, input: InputModality) -> Result<ResultsView, AttemptError> {
        let view = self.submit(input).await?;
        view.enrich(&self.resolver).await?;
        Ok(view)
    }
}
