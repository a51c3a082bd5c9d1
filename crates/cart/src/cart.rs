//! The cart handle used by UI layers.
//!
//! [`Cart`] ties the pieces together: mutations apply to the local
//! [`CartState`] immediately, are snapshotted through the
//! [`PersistenceAdapter`], published to observers, and wake the background
//! sync worker. Nothing here waits on the network except the explicit
//! lifecycle calls (`flush`, `login`, `logout`, `clear_remote`, `shutdown`).

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, instrument, warn};

use grocer_core::{CartLineItem, LineId, Price, SessionToken, SyncStatus, UserId};

use crate::api::CartApi;
use crate::config::CartConfig;
use crate::persistence::{CartStorage, PersistenceAdapter};
use crate::store::{AuthState, CartState, CartView, NewLineItem};
use crate::sync::{Command, SyncFailure, Worker};

/// State shared between the handle and the sync worker.
pub(crate) struct Shared {
    state: Mutex<CartState>,
    persistence: PersistenceAdapter,
    view: watch::Sender<CartView>,
}

impl Shared {
    /// Mutate the state, persist the snapshot and notify observers.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut CartState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let result = f(&mut state);
        self.persistence.save(&state.to_persisted());
        self.view.send_replace(state.view());
        result
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&CartState) -> R) -> R {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Empty the cart and drop the persisted record.
    fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.clear();
        self.persistence.clear();
        self.view.send_replace(state.view());
    }
}

/// Local-first shopping cart with background sync.
///
/// Cheap to clone; clones share the same cart and worker.
pub struct Cart<A: CartApi> {
    inner: Arc<CartInner<A>>,
}

struct CartInner<A> {
    shared: Arc<Shared>,
    api: Arc<A>,
    commands: mpsc::UnboundedSender<Command>,
}

impl<A: CartApi> Clone for Cart<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: CartApi> Cart<A> {
    /// Load the persisted cart (if still current) and start the sync worker.
    ///
    /// Actions left pending by a previous run are scheduled for sync.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn open(
        config: &CartConfig,
        api: A,
        storage: Arc<dyn CartStorage>,
        auth: AuthState,
    ) -> Self {
        let persistence =
            PersistenceAdapter::new(storage, config.storage_key.clone(), config.retention);
        let mut state = persistence
            .load()
            .map_or_else(CartState::default, CartState::from_persisted);
        state.auth = auth;

        let has_pending = !state.pending().is_empty();
        info!(
            items = state.lines().len(),
            pending = state.pending().len(),
            authenticated = auth.is_authenticated(),
            "Cart opened"
        );

        let (view, _) = watch::channel(state.view());
        let shared = Arc::new(Shared {
            state: Mutex::new(state),
            persistence,
            view,
        });
        let api = Arc::new(api);
        let (commands, rx) = mpsc::unbounded_channel();

        tokio::spawn(Worker::new(Arc::clone(&shared), Arc::clone(&api), config, rx).run());

        let cart = Self {
            inner: Arc::new(CartInner {
                shared,
                api,
                commands,
            }),
        };
        if has_pending {
            cart.schedule();
        }
        cart
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add units of a variant. Returns `false` if nothing changed.
    pub fn add_item(&self, item: NewLineItem) -> bool {
        let line = LineId::new(item.product_id, item.variant_id);
        let quantity = item.quantity;
        let changed = self.mutate(|state| state.add_item(item));
        debug!(%line, quantity, changed, "add_item");
        changed
    }

    /// Remove a line. Returns `false` if it was not in the cart.
    pub fn remove_item(&self, line: LineId) -> bool {
        let changed = self.mutate(|state| state.remove_item(line));
        debug!(%line, changed, "remove_item");
        changed
    }

    /// Set a line's quantity; zero or less removes it.
    pub fn update_item(&self, line: LineId, quantity: i64) -> bool {
        let changed = self.mutate(|state| state.update_item(line, quantity));
        debug!(%line, quantity, changed, "update_item");
        changed
    }

    /// Empty the local cart without contacting the server.
    pub fn clear_cart(&self) {
        self.inner.shared.update(CartState::clear);
        debug!("Cart cleared locally");
    }

    /// An order went through: drop the cart and its persisted record.
    pub fn order_placed(&self) {
        self.inner.shared.reset();
        info!("Order placed, cart reset");
    }

    fn mutate(&self, f: impl FnOnce(&mut CartState) -> bool) -> bool {
        let changed = self.inner.shared.update(f);
        if changed {
            self.schedule();
        }
        changed
    }

    fn schedule(&self) {
        if self.inner.commands.send(Command::Schedule).is_err() {
            debug!("Sync worker stopped; change kept locally");
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current snapshot.
    #[must_use]
    pub fn view(&self) -> CartView {
        self.inner.shared.read(CartState::view)
    }

    /// Receive a new [`CartView`] after every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartView> {
        self.inner.shared.view.subscribe()
    }

    #[must_use]
    pub fn items(&self) -> Vec<CartLineItem> {
        self.inner.shared.read(|state| state.lines().to_vec())
    }

    #[must_use]
    pub fn total(&self) -> Price {
        self.inner.shared.read(CartState::total)
    }

    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.inner.shared.read(CartState::item_count)
    }

    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.inner.shared.read(CartState::status)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner
            .shared
            .read(|state| state.auth().is_authenticated())
    }

    /// Token scoping the guest cart on the server.
    #[must_use]
    pub fn session_token(&self) -> SessionToken {
        self.inner.shared.read(CartState::session_token)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Sync now, superseding any pending debounce timer.
    ///
    /// # Errors
    ///
    /// Returns the [`SyncFailure`] of this attempt. Transient failures are
    /// retried in the background after the error is returned.
    pub async fn flush(&self) -> Result<(), SyncFailure> {
        let (reply, outcome) = oneshot::channel();
        self.inner
            .commands
            .send(Command::Flush(reply))
            .map_err(|_| SyncFailure::EngineStopped)?;
        outcome.await.map_err(|_| SyncFailure::EngineStopped)?
    }

    /// Switch to the signed-in user's server cart.
    ///
    /// An empty local cart is hydrated from the server (new device); otherwise
    /// the local cart is pushed and replaces the server copy.
    ///
    /// # Errors
    ///
    /// Returns the failure of the fetch or push.
    #[instrument(skip(self), fields(user = %user))]
    pub async fn login(&self, user: UserId) -> Result<(), SyncFailure> {
        let was_empty = self.inner.shared.update(|state| {
            state.set_auth(AuthState::Authenticated(user));
            if state.is_empty() {
                // Leftover guest removals have nothing to apply to
                let revision = state.revision();
                state.acknowledge_through(revision);
            }
            state.is_empty()
        });

        if !was_empty {
            info!("Carrying local cart into account");
            return self.flush().await;
        }

        match self.inner.api.fetch().await {
            Ok(snapshot) => {
                let count = snapshot.items.len();
                self.inner.shared.update(|state| {
                    if state.is_empty() {
                        state.hydrate(snapshot.items);
                    }
                    state.last_synced_at = Some(Utc::now());
                });
                info!(lines = count, "Hydrated cart from account");
                Ok(())
            }
            Err(e) => {
                let failure = SyncFailure::from_api(&e);
                warn!(error = %e, "Failed to fetch account cart");
                self.inner.shared.update(|state| {
                    state.status = SyncStatus::Error;
                    state.last_error = Some(failure.clone());
                });
                Err(failure)
            }
        }
    }

    /// Push the signed-in cart, then continue as a guest with a fresh token.
    ///
    /// The local lines are kept and queued for the new guest cart. If the
    /// final push fails, the account keeps its last synced copy; the edits
    /// live on in the guest cart and reach the account when the user signs
    /// in again, since login pushes a non-empty local cart.
    ///
    /// # Errors
    ///
    /// Returns the failure of the final push. The switch to guest happens
    /// regardless.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), SyncFailure> {
        let flushed = self.flush().await;
        if let Err(e) = &flushed {
            warn!(error = %e, "Final sync before logout failed");
        }

        self.inner.shared.update(|state| {
            // Account actions cannot be replayed against the guest scope;
            // requeue_all rebuilds it from the lines instead
            let revision = state.revision();
            state.acknowledge_through(revision);
            state.set_auth(AuthState::Guest);
            state.status = SyncStatus::Idle;
            state.retry_count = 0;
            state.requeue_all();
        });
        self.schedule();
        info!("Signed out, continuing as guest");

        flushed
    }

    /// Empty the cart locally and on the server.
    ///
    /// # Errors
    ///
    /// Returns the failure of the push.
    #[instrument(skip(self))]
    pub async fn clear_remote(&self) -> Result<(), SyncFailure> {
        self.inner.shared.update(|state| {
            if state.auth().is_authenticated() {
                state.clear();
            } else {
                state.clear_with_removals();
            }
        });
        self.flush().await
    }

    /// Push anything pending and stop the worker.
    ///
    /// Later mutations still apply and persist locally but are not synced.
    pub async fn shutdown(&self) {
        let (reply, done) = oneshot::channel();
        if self.inner.commands.send(Command::Shutdown(reply)).is_ok() {
            let _ = done.await;
        }
        info!("Cart sync stopped");
    }
}
