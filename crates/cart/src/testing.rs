//! Scripted in-memory [`CartApi`] for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use grocer_core::api::{CartSnapshotResponse, SyncRequest, SyncResponse};
use grocer_core::{CartLineItem, LineId, Price, SessionToken};

use crate::api::{ApiError, CartApi};

/// A call the engine made, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Push(Vec<CartLineItem>),
    Fetch,
    GuestAdd(LineId, u32),
    GuestRemove(LineId),
}

#[derive(Default)]
struct MockState {
    calls: Vec<Call>,
    failures: VecDeque<ApiError>,
    failures_at: HashMap<usize, ApiError>,
    delay: Option<Duration>,
    user_cart: Vec<CartLineItem>,
    guest_carts: HashMap<SessionToken, Vec<CartLineItem>>,
    prices: HashMap<LineId, Price>,
}

#[derive(Clone, Default)]
pub(crate) struct MockApi {
    state: Arc<Mutex<MockState>>,
}

impl MockApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.with_state(|s| s.calls.clone())
    }

    pub(crate) fn push_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Push(_)))
            .count()
    }

    /// Fail the next `times` calls with `error`.
    pub(crate) fn fail_next(&self, times: usize, error: &ApiError) {
        self.with_state(|s| s.failures.extend(std::iter::repeat_n(error.clone(), times)));
    }

    /// Fail only the call at `index` (0-based, counting every call).
    pub(crate) fn fail_call(&self, index: usize, error: &ApiError) {
        self.with_state(|s| {
            s.failures_at.insert(index, error.clone());
        });
    }

    /// Every call sleeps for `delay` before answering.
    pub(crate) fn set_delay(&self, delay: Duration) {
        self.with_state(|s| s.delay = Some(delay));
    }

    /// The server reprices `line` on the next write.
    pub(crate) fn set_price(&self, line: LineId, price: Price) {
        self.with_state(|s| {
            s.prices.insert(line, price);
        });
    }

    pub(crate) fn set_user_cart(&self, items: Vec<CartLineItem>) {
        self.with_state(|s| s.user_cart = items);
    }

    pub(crate) fn user_cart(&self) -> Vec<CartLineItem> {
        self.with_state(|s| s.user_cart.clone())
    }

    pub(crate) fn guest_cart(&self, token: SessionToken) -> Vec<CartLineItem> {
        self.with_state(|s| s.guest_carts.get(&token).cloned().unwrap_or_default())
    }

    /// Record the call and pop a scripted failure, if any.
    async fn begin(&self, call: Call) -> Result<(), ApiError> {
        let (delay, failure) = self.with_state(|s| {
            let index = s.calls.len();
            s.calls.push(call);
            let failure = s
                .failures_at
                .remove(&index)
                .or_else(|| s.failures.pop_front());
            (s.delay, failure)
        });
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        failure.map_or(Ok(()), Err)
    }

    fn reprice(prices: &HashMap<LineId, Price>, items: &mut [CartLineItem]) {
        for item in items {
            if let Some(price) = prices.get(&item.line_id()) {
                item.price = *price;
            }
        }
    }
}

impl CartApi for MockApi {
    async fn push(&self, request: &SyncRequest) -> Result<SyncResponse, ApiError> {
        self.begin(Call::Push(request.items.clone())).await?;
        Ok(self.with_state(|s| {
            let mut items = request.items.clone();
            Self::reprice(&s.prices, &mut items);
            s.user_cart.clone_from(&items);
            SyncResponse::ok(items)
        }))
    }

    async fn fetch(&self) -> Result<CartSnapshotResponse, ApiError> {
        self.begin(Call::Fetch).await?;
        Ok(self.with_state(|s| CartSnapshotResponse::new(s.user_cart.clone(), Some(0))))
    }

    async fn guest_add(
        &self,
        token: SessionToken,
        item: &CartLineItem,
    ) -> Result<SyncResponse, ApiError> {
        self.begin(Call::GuestAdd(item.line_id(), item.quantity))
            .await?;
        Ok(self.with_state(|s| {
            let prices = s.prices.clone();
            let cart = s.guest_carts.entry(token).or_default();
            if let Some(line) = cart.iter_mut().find(|l| l.line_id() == item.line_id()) {
                line.quantity += item.quantity;
            } else {
                cart.push(item.clone());
            }
            Self::reprice(&prices, cart);
            SyncResponse::ok(cart.clone())
        }))
    }

    async fn guest_remove(
        &self,
        token: SessionToken,
        line: LineId,
    ) -> Result<SyncResponse, ApiError> {
        self.begin(Call::GuestRemove(line)).await?;
        Ok(self.with_state(|s| {
            let cart = s.guest_carts.entry(token).or_default();
            cart.retain(|l| l.line_id() != line);
            SyncResponse::ok(cart.clone())
        }))
    }
}
