//! Background task that pushes the cart to the server.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, instrument, warn};

use grocer_core::api::SyncRequest;
use grocer_core::{CartLineItem, LineId, SessionToken, SyncStatus};

use super::SyncFailure;
use crate::api::{ApiError, CartApi, FailureKind};
use crate::cart::Shared;
use crate::config::{CartConfig, RetryPolicy};
use crate::store::{AuthState, CartState, PendingAction, PendingActionKind};

/// Messages from [`crate::Cart`] to the worker.
pub(crate) enum Command {
    /// A local mutation happened: re-arm the debounce timer.
    Schedule,
    /// Sync now and report the outcome.
    Flush(oneshot::Sender<Result<(), SyncFailure>>),
    /// Push anything pending, then stop.
    Shutdown(oneshot::Sender<()>),
}

/// What one attempt will send.
enum Plan {
    /// Full-replace push for a signed-in user.
    Push { request: SyncRequest, revision: u64 },
    /// Replay of queued actions against the guest endpoints, one net
    /// operation per line.
    Replay {
        token: SessionToken,
        ops: Vec<GuestOp>,
        revision: u64,
    },
}

/// The net effect of every queued action on one line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct GuestOp {
    /// Revisions of the actions this operation stands for.
    revisions: Vec<u64>,
    kind: GuestOpKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum GuestOpKind {
    /// Only additions were queued: add their sum.
    Add(CartLineItem),
    /// The line is gone locally.
    Remove(LineId),
    /// The line was set or removed and re-added: replace the server line.
    Replace(CartLineItem),
}

struct Attempt {
    result: Result<(), SyncFailure>,
    retry_in: Option<Duration>,
}

impl Attempt {
    const fn done() -> Self {
        Self {
            result: Ok(()),
            retry_in: None,
        }
    }
}

pub(crate) struct Worker<A> {
    shared: Arc<Shared>,
    api: Arc<A>,
    debounce: Duration,
    retry: RetryPolicy,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl<A: CartApi> Worker<A> {
    pub(crate) fn new(
        shared: Arc<Shared>,
        api: Arc<A>,
        config: &CartConfig,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        Self {
            shared,
            api,
            debounce: config.debounce,
            retry: config.retry,
            commands,
        }
    }

    /// Run until shut down or until every [`crate::Cart`] handle is dropped.
    pub(crate) async fn run(mut self) {
        let mut deadline: Option<Instant> = None;

        loop {
            let command = if let Some(at) = deadline {
                tokio::select! {
                    command = self.commands.recv() => command,
                    () = sleep_until(at) => {
                        deadline = self.attempt(false).await.retry_in.map(|d| Instant::now() + d);
                        continue;
                    }
                }
            } else {
                self.commands.recv().await
            };

            match command {
                Some(Command::Schedule) => {
                    self.rearm_after_error();
                    deadline = Some(Instant::now() + self.debounce);
                }
                Some(Command::Flush(reply)) => {
                    self.rearm_after_error();
                    let attempt = self.attempt(true).await;
                    deadline = attempt.retry_in.map(|d| Instant::now() + d);
                    // The caller may have stopped waiting
                    let _ = reply.send(attempt.result);
                }
                Some(Command::Shutdown(reply)) => {
                    if let Err(e) = self.attempt(false).await.result {
                        warn!(error = %e, "Final cart sync before shutdown failed");
                    }
                    let _ = reply.send(());
                    break;
                }
                None => break,
            }
        }

        debug!("Cart sync worker stopped");
    }

    /// A new trigger after a terminal error starts a fresh retry budget.
    fn rearm_after_error(&self) {
        self.shared.update(|state| {
            if state.status == SyncStatus::Error {
                state.retry_count = 0;
            }
        });
    }

    #[instrument(skip(self))]
    async fn attempt(&self, force: bool) -> Attempt {
        let Some(plan) = self.shared.update(|state| {
            let next = plan(state, force);
            if next.is_some() {
                state.status = SyncStatus::Syncing;
            }
            next
        }) else {
            return Attempt::done();
        };

        let outcome = match plan {
            Plan::Push { request, revision } => {
                debug!(revision, items = request.items.len(), "Pushing cart");
                self.api
                    .push(&request)
                    .await
                    .map(|response| (revision, response.updated_items))
            }
            Plan::Replay {
                token,
                ops,
                revision,
            } => {
                debug!(revision, ops = ops.len(), "Replaying guest cart actions");
                self.replay(token, ops)
                    .await
                    .map(|items| (revision, items))
            }
        };

        match outcome {
            Ok((revision, items)) => {
                self.shared.update(|state| {
                    if let Some(items) = items {
                        state.reconcile(revision, items);
                    }
                    state.acknowledge_through(revision);
                    state.status = SyncStatus::Idle;
                    state.retry_count = 0;
                    state.last_error = None;
                    state.last_synced_at = Some(Utc::now());
                });
                info!(revision, "Cart synced");
                Attempt::done()
            }
            Err(error) => self.fail(&error),
        }
    }

    /// Send coalesced guest operations, acknowledging each as it lands.
    async fn replay(
        &self,
        token: SessionToken,
        ops: Vec<GuestOp>,
    ) -> Result<Option<Vec<CartLineItem>>, ApiError> {
        let mut latest = None;

        for op in ops {
            let response = match &op.kind {
                GuestOpKind::Add(item) => self.api.guest_add(token, item).await?,
                GuestOpKind::Remove(line) => self.api.guest_remove(token, *line).await?,
                GuestOpKind::Replace(item) => {
                    self.api.guest_remove(token, item.line_id()).await?;
                    self.api.guest_add(token, item).await?
                }
            };
            self.shared.update(|state| state.acknowledge(&op.revisions));
            if response.updated_items.is_some() {
                latest = response.updated_items;
            }
        }

        Ok(latest)
    }

    fn fail(&self, error: &ApiError) -> Attempt {
        let kind = error.kind();
        let max_retries = self.retry.max_retries;
        let policy = self.retry;

        let (failure, retry_in) = self.shared.update(|state| {
            let (failure, retry_in) = match kind {
                FailureKind::Transient => {
                    state.retry_count = state.retry_count.saturating_add(1);
                    if state.retry_count > max_retries {
                        (
                            SyncFailure::RetriesExhausted {
                                attempts: state.retry_count,
                                last: error.to_string(),
                            },
                            None,
                        )
                    } else {
                        (
                            SyncFailure::Transient(error.to_string()),
                            Some(policy.delay_for(state.retry_count)),
                        )
                    }
                }
                FailureKind::StaleSession => (SyncFailure::StaleSession, None),
                FailureKind::Validation => (SyncFailure::Validation(error.to_string()), None),
            };
            state.status = if retry_in.is_some() {
                SyncStatus::Retrying
            } else {
                SyncStatus::Error
            };
            state.last_error = Some(failure.clone());
            (failure, retry_in)
        });

        match &failure {
            SyncFailure::Transient(_) => {
                warn!(error = %error, retry_in = ?retry_in, "Cart sync failed, retrying");
            }
            SyncFailure::StaleSession => {
                warn!("Cart sync rejected: session is stale, re-authentication required");
            }
            _ => warn!(error = %failure, "Cart sync failed"),
        }

        Attempt {
            result: Err(failure),
            retry_in,
        }
    }
}

/// Decide what an attempt sends, or `None` when there is nothing to do.
fn plan(state: &CartState, force: bool) -> Option<Plan> {
    match state.auth() {
        AuthState::Authenticated(_) => {
            if !force && state.pending().is_empty() {
                return None;
            }
            Some(Plan::Push {
                request: SyncRequest::new(state.lines().to_vec(), Utc::now().timestamp_millis()),
                revision: state.revision(),
            })
        }
        AuthState::Guest => {
            if state.pending().is_empty() {
                return None;
            }
            Some(Plan::Replay {
                token: state.session_token(),
                ops: coalesce(state),
                revision: state.revision(),
            })
        }
    }
}

/// Collapse the pending queue into one operation per line, in the order the
/// lines were first touched.
fn coalesce(state: &CartState) -> Vec<GuestOp> {
    let mut lines: Vec<LineId> = Vec::new();
    for action in state.pending() {
        let id = action.kind.line_id();
        if !lines.contains(&id) {
            lines.push(id);
        }
    }

    lines
        .into_iter()
        .map(|id| {
            let actions: Vec<&PendingAction> = state
                .pending()
                .iter()
                .filter(|action| action.kind.line_id() == id)
                .collect();
            let revisions = actions.iter().map(|action| action.revision).collect();

            let mut added = 0u32;
            let mut last_add = None;
            let mut only_adds = true;
            for action in &actions {
                if let PendingActionKind::Add { item } = &action.kind {
                    added = added.saturating_add(item.quantity);
                    last_add = Some(item);
                } else {
                    only_adds = false;
                }
            }

            let kind = match (only_adds, last_add, state.line(id)) {
                (true, Some(item), _) => GuestOpKind::Add(CartLineItem {
                    quantity: added,
                    ..item.clone()
                }),
                (_, _, Some(current)) => GuestOpKind::Replace(current.clone()),
                (_, _, None) => GuestOpKind::Remove(id),
            };
            GuestOp { revisions, kind }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use grocer_core::{Price, ProductId, VariantId};
    use rust_decimal::Decimal;

    use super::*;
    use crate::store::NewLineItem;

    fn item(variant: i32, quantity: u32) -> NewLineItem {
        NewLineItem {
            product_id: ProductId::new(3),
            variant_id: VariantId::new(variant),
            product_name: "Toor Dal".to_string(),
            variant_unit: "kg".to_string(),
            variant_amount: Decimal::ONE,
            price: Price::from_minor(16500),
            quantity,
            image_url: None,
            max_stock: None,
        }
    }

    fn line(variant: i32) -> LineId {
        LineId::new(ProductId::new(3), VariantId::new(variant))
    }

    fn kinds(state: &CartState) -> Vec<GuestOpKind> {
        coalesce(state).into_iter().map(|op| op.kind).collect()
    }

    #[test]
    fn test_adds_sum_into_one_operation() {
        let mut state = CartState::default();
        state.add_item(item(1, 1));
        state.add_item(item(1, 2));
        state.add_item(item(1, 1));

        let ops = coalesce(&state);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].revisions, vec![1, 2, 3]);
        match &ops[0].kind {
            GuestOpKind::Add(item) => assert_eq!(item.quantity, 4),
            other => panic!("unexpected operation {other:?}"),
        }
    }

    #[test]
    fn test_removed_then_readded_line_is_replaced() {
        let mut state = CartState::default();
        state.add_item(item(1, 2));
        state.remove_item(line(1));
        state.add_item(item(1, 1));

        match kinds(&state).as_slice() {
            [GuestOpKind::Replace(item)] => assert_eq!(item.quantity, 1),
            other => panic!("unexpected operations {other:?}"),
        }
    }

    #[test]
    fn test_lines_keep_first_touch_order() {
        let mut state = CartState::default();
        state.add_item(item(2, 1));
        state.add_item(item(1, 1));
        state.update_item(line(2), 4);
        state.remove_item(line(1));

        match kinds(&state).as_slice() {
            [GuestOpKind::Replace(first), GuestOpKind::Remove(second)] => {
                assert_eq!(first.line_id(), line(2));
                assert_eq!(first.quantity, 4);
                assert_eq!(*second, line(1));
            }
            other => panic!("unexpected operations {other:?}"),
        }
    }
}
