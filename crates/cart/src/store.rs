//! Local cart state and its mutations.
//!
//! [`CartState`] is plain data: every mutation is synchronous, applies
//! immediately, bumps the revision and records a [`PendingAction`]. Persisting
//! the snapshot and waking the sync engine is the job of [`crate::Cart`].

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use grocer_core::{
    CartLineItem, LineId, Price, ProductId, SessionToken, SyncStatus, UserId, VariantId,
    cart_item_count, cart_total,
};

use crate::persistence::PersistedCart;
use crate::sync::SyncFailure;

/// Input for [`CartState::add_item`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLineItem {
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub product_name: String,
    pub variant_unit: String,
    pub variant_amount: Decimal,
    pub price: Price,
    pub quantity: u32,
    pub image_url: Option<String>,
    pub max_stock: Option<u32>,
}

impl NewLineItem {
    fn into_line(self) -> CartLineItem {
        CartLineItem {
            product_id: self.product_id,
            variant_id: self.variant_id,
            product_name: self.product_name,
            variant_unit: self.variant_unit,
            variant_amount: self.variant_amount,
            price: self.price,
            quantity: self.quantity,
            image_url: self.image_url,
            max_stock: self.max_stock,
        }
    }
}

/// A local mutation the server has not acknowledged yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAction {
    /// Cart revision this action produced.
    pub revision: u64,
    pub kind: PendingActionKind,
}

/// What a pending action did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PendingActionKind {
    /// Quantity was increased by `item.quantity` (or the line was created).
    Add { item: CartLineItem },
    /// The line was removed.
    Remove { line: LineId },
    /// The line's quantity was set to `item.quantity`.
    Update { item: CartLineItem },
}

impl PendingActionKind {
    /// The line this action touched.
    #[must_use]
    pub const fn line_id(&self) -> LineId {
        match self {
            Self::Add { item } | Self::Update { item } => item.line_id(),
            Self::Remove { line } => *line,
        }
    }
}

/// Who the cart belongs to on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    /// Scoped by the cart's session token.
    #[default]
    Guest,
    /// Scoped by the signed-in user.
    Authenticated(UserId),
}

impl AuthState {
    /// Whether a user is signed in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// Read-only view of the cart for UI layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartView {
    pub items: Vec<CartLineItem>,
    pub total: Price,
    pub item_count: u32,
    pub status: SyncStatus,
    pub retry_count: u32,
    pub pending_actions: usize,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_error: Option<SyncFailure>,
    pub auth: AuthState,
}

impl CartView {
    /// The server no longer accepts this session; the user must sign in again.
    #[must_use]
    pub const fn needs_reauth(&self) -> bool {
        matches!(self.last_error, Some(SyncFailure::StaleSession))
    }
}

/// The cart held on the client.
#[derive(Debug, Clone)]
pub struct CartState {
    lines: Vec<CartLineItem>,
    pending: Vec<PendingAction>,
    revision: u64,
    pub(crate) status: SyncStatus,
    pub(crate) retry_count: u32,
    pub(crate) last_synced_at: Option<DateTime<Utc>>,
    pub(crate) last_error: Option<SyncFailure>,
    pub(crate) session_token: SessionToken,
    pub(crate) auth: AuthState,
}

impl Default for CartState {
    fn default() -> Self {
        Self::new(SessionToken::generate())
    }
}

impl CartState {
    /// Empty cart for a first visit.
    #[must_use]
    pub fn new(session_token: SessionToken) -> Self {
        Self {
            lines: Vec::new(),
            pending: Vec::new(),
            revision: 0,
            status: SyncStatus::Idle,
            retry_count: 0,
            last_synced_at: None,
            last_error: None,
            session_token,
            auth: AuthState::Guest,
        }
    }

    /// Rebuild from a persisted snapshot.
    #[must_use]
    pub fn from_persisted(persisted: PersistedCart) -> Self {
        let revision = persisted
            .pending
            .iter()
            .map(|action| action.revision)
            .max()
            .unwrap_or(0);
        Self {
            lines: persisted.items,
            pending: persisted.pending,
            revision,
            last_synced_at: persisted.last_synced_at,
            ..Self::new(persisted.session_token)
        }
    }

    /// Snapshot for the persistence adapter.
    #[must_use]
    pub fn to_persisted(&self) -> PersistedCart {
        PersistedCart {
            items: self.lines.clone(),
            session_token: self.session_token,
            pending: self.pending.clone(),
            last_synced_at: self.last_synced_at,
        }
    }

    /// Snapshot for observers.
    #[must_use]
    pub fn view(&self) -> CartView {
        CartView {
            items: self.lines.clone(),
            total: self.total(),
            item_count: self.item_count(),
            status: self.status,
            retry_count: self.retry_count,
            pending_actions: self.pending.len(),
            last_synced_at: self.last_synced_at,
            last_error: self.last_error.clone(),
            auth: self.auth,
        }
    }

    /// Lines in display order.
    #[must_use]
    pub fn lines(&self) -> &[CartLineItem] {
        &self.lines
    }

    /// Look up one line.
    #[must_use]
    pub fn line(&self, id: LineId) -> Option<&CartLineItem> {
        self.lines.iter().find(|line| line.line_id() == id)
    }

    /// Sum of price x quantity.
    #[must_use]
    pub fn total(&self) -> Price {
        cart_total(&self.lines)
    }

    /// Sum of quantities.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        cart_item_count(&self.lines)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Monotonic counter bumped by every local mutation.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Actions not yet acknowledged by the server.
    #[must_use]
    pub fn pending(&self) -> &[PendingAction] {
        &self.pending
    }

    #[must_use]
    pub const fn status(&self) -> SyncStatus {
        self.status
    }

    #[must_use]
    pub const fn session_token(&self) -> SessionToken {
        self.session_token
    }

    #[must_use]
    pub const fn auth(&self) -> AuthState {
        self.auth
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `item.quantity` units of a variant, merging into an existing line.
    ///
    /// Quantity is capped at the known stock ceiling. A ceiling below the
    /// current quantity lowers the line instead. Returns `false` when nothing
    /// changed.
    pub fn add_item(&mut self, item: NewLineItem) -> bool {
        if item.quantity == 0 {
            return false;
        }
        let id = LineId::new(item.product_id, item.variant_id);

        let kind = if let Some(line) = self.lines.iter_mut().find(|l| l.line_id() == id) {
            if item.max_stock.is_some() {
                line.max_stock = item.max_stock;
            }
            let before = line.quantity;
            line.quantity = line.cap_quantity(before.saturating_add(item.quantity));
            match line.quantity.cmp(&before) {
                Ordering::Greater => {
                    let mut delta = line.clone();
                    delta.quantity = line.quantity.saturating_sub(before);
                    PendingActionKind::Add { item: delta }
                }
                Ordering::Less if line.quantity == 0 => return self.remove_item(id),
                Ordering::Less => PendingActionKind::Update { item: line.clone() },
                Ordering::Equal => return false,
            }
        } else {
            let mut line = item.into_line();
            line.quantity = line.cap_quantity(line.quantity);
            if line.quantity == 0 {
                return false;
            }
            self.lines.push(line.clone());
            PendingActionKind::Add { item: line }
        };

        self.record(|revision| PendingAction { revision, kind });
        true
    }

    /// Remove a line. Returns `false` if it was not in the cart.
    pub fn remove_item(&mut self, id: LineId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| line.line_id() != id);
        if self.lines.len() == before {
            return false;
        }
        self.record(|revision| PendingAction {
            revision,
            kind: PendingActionKind::Remove { line: id },
        });
        true
    }

    /// Set a line's quantity; zero or negative removes the line.
    pub fn update_item(&mut self, id: LineId, quantity: i64) -> bool {
        let Ok(quantity) = u32::try_from(quantity) else {
            return if quantity <= 0 {
                self.remove_item(id)
            } else {
                self.update_item(id, i64::from(u32::MAX))
            };
        };
        if quantity == 0 {
            return self.remove_item(id);
        }

        let Some(line) = self.lines.iter_mut().find(|l| l.line_id() == id) else {
            return false;
        };
        let capped = line.cap_quantity(quantity);
        if capped == line.quantity {
            return false;
        }
        line.quantity = capped;
        let item = line.clone();
        self.record(|revision| PendingAction {
            revision,
            kind: PendingActionKind::Update { item },
        });
        true
    }

    /// Empty the cart and reset sync metadata. Queues nothing for the server.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.pending.clear();
        self.revision += 1;
        self.status = SyncStatus::Idle;
        self.retry_count = 0;
        self.last_error = None;
    }

    /// Queue a removal for every line, then empty the cart.
    ///
    /// Used when the server copy must be cleared as well.
    pub(crate) fn clear_with_removals(&mut self) {
        let ids: Vec<LineId> = self.lines.iter().map(CartLineItem::line_id).collect();
        for id in ids {
            self.remove_item(id);
        }
    }

    /// Replace the lines with a server copy without queueing anything.
    pub(crate) fn hydrate(&mut self, items: Vec<CartLineItem>) {
        self.lines = items.into_iter().filter(|item| item.quantity > 0).collect();
        self.revision += 1;
    }

    /// Queue an `Add` for every line so a fresh server scope can be rebuilt.
    pub(crate) fn requeue_all(&mut self) {
        let items = self.lines.clone();
        for item in items {
            self.record(|revision| PendingAction {
                revision,
                kind: PendingActionKind::Add { item },
            });
        }
    }

    /// Switch identity. A new guest scope gets a fresh session token.
    pub(crate) fn set_auth(&mut self, auth: AuthState) {
        if auth == AuthState::Guest && self.auth != AuthState::Guest {
            self.session_token = SessionToken::generate();
        }
        self.auth = auth;
        self.last_error = None;
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Merge the server's authoritative item list into the local lines.
    ///
    /// `sent_revision` is the revision the request was built from. When nothing
    /// changed locally since then the server list is adopted wholesale (prices,
    /// stock caps and server-capped quantities). Otherwise only `price` and
    /// `max_stock` are copied onto lines that still exist, so edits made during
    /// the round trip survive. A line left above its new stock ceiling is
    /// lowered and the change queued.
    pub(crate) fn reconcile(&mut self, sent_revision: u64, server: Vec<CartLineItem>) {
        if self.revision == sent_revision {
            self.lines = server.into_iter().filter(|item| item.quantity > 0).collect();
            return;
        }

        let mut lowered = Vec::new();
        for line in &mut self.lines {
            if let Some(authoritative) = server.iter().find(|s| s.line_id() == line.line_id()) {
                line.price = authoritative.price;
                line.max_stock = authoritative.max_stock;
                let capped = line.cap_quantity(line.quantity);
                if capped < line.quantity {
                    line.quantity = capped;
                    lowered.push(line.clone());
                }
            }
        }

        for item in lowered {
            if item.quantity == 0 {
                self.remove_item(item.line_id());
            } else {
                self.record(|revision| PendingAction {
                    revision,
                    kind: PendingActionKind::Update { item },
                });
            }
        }
    }

    /// Drop actions the server has acknowledged.
    pub(crate) fn acknowledge_through(&mut self, revision: u64) {
        self.pending.retain(|action| action.revision > revision);
    }

    /// Drop the replayed actions with these revisions.
    pub(crate) fn acknowledge(&mut self, revisions: &[u64]) {
        self.pending.retain(|action| !revisions.contains(&action.revision));
    }

    fn record(&mut self, action: impl FnOnce(u64) -> PendingAction) {
        self.revision += 1;
        self.pending.push(action(self.revision));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn new_item(variant: i32, price: i64, quantity: u32) -> NewLineItem {
        NewLineItem {
            product_id: ProductId::new(100),
            variant_id: VariantId::new(variant),
            product_name: "Fresh Paneer".to_string(),
            variant_unit: "g".to_string(),
            variant_amount: Decimal::new(200, 0),
            price: Price::from_minor(price),
            quantity,
            image_url: None,
            max_stock: None,
        }
    }

    fn line_id(variant: i32) -> LineId {
        LineId::new(ProductId::new(100), VariantId::new(variant))
    }

    #[test]
    fn test_worked_example_totals() {
        let mut cart = CartState::default();

        cart.add_item(new_item(1, 8000, 2));
        assert_eq!(cart.total(), Price::from_minor(16000));
        assert_eq!(cart.item_count(), 2);

        cart.add_item(new_item(2, 5000, 1));
        assert_eq!(cart.total(), Price::from_minor(21000));
        assert_eq!(cart.item_count(), 3);

        cart.remove_item(line_id(1));
        assert_eq!(cart.total(), Price::from_minor(5000));
        assert_eq!(cart.item_count(), 1);
    }

    #[test]
    fn test_adding_same_variant_merges_lines() {
        let mut cart = CartState::default();
        cart.add_item(new_item(1, 1000, 2));
        cart.add_item(new_item(1, 1000, 3));

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.line(line_id(1)).unwrap().quantity, 5);
        assert_eq!(cart.pending().len(), 2);
        assert_eq!(cart.revision(), 2);
    }

    #[test]
    fn test_insertion_order_is_display_order() {
        let mut cart = CartState::default();
        cart.add_item(new_item(3, 100, 1));
        cart.add_item(new_item(1, 100, 1));
        cart.add_item(new_item(3, 100, 1));

        let variants: Vec<i32> = cart
            .lines()
            .iter()
            .map(|l| l.variant_id.as_i32())
            .collect();
        assert_eq!(variants, vec![3, 1]);
    }

    #[test]
    fn test_update_to_zero_or_negative_removes() {
        for quantity in [0, -1, -50] {
            let mut cart = CartState::default();
            cart.add_item(new_item(1, 1000, 2));
            assert!(cart.update_item(line_id(1), quantity));
            assert!(cart.is_empty());
            assert!(matches!(
                cart.pending().last().unwrap().kind,
                PendingActionKind::Remove { .. }
            ));
        }
    }

    #[test]
    fn test_update_sets_quantity() {
        let mut cart = CartState::default();
        cart.add_item(new_item(1, 250, 1));
        assert!(cart.update_item(line_id(1), 4));
        assert_eq!(cart.item_count(), 4);
        assert_eq!(cart.total(), Price::from_minor(1000));

        // Same value is not a mutation
        assert!(!cart.update_item(line_id(1), 4));
        // Unknown line is not a mutation
        assert!(!cart.update_item(line_id(9), 4));
    }

    #[test]
    fn test_stock_ceiling_caps_quantity() {
        let mut cart = CartState::default();
        let mut item = new_item(1, 100, 4);
        item.max_stock = Some(5);
        cart.add_item(item.clone());
        cart.add_item(item);
        assert_eq!(cart.item_count(), 5);

        // The second add only recorded the single unit that fit
        match &cart.pending().last().unwrap().kind {
            PendingActionKind::Add { item } => assert_eq!(item.quantity, 1),
            other => panic!("unexpected action {other:?}"),
        }

        cart.update_item(line_id(1), 50);
        assert_eq!(cart.item_count(), 5);
    }

    #[test]
    fn test_add_with_lower_stock_ceiling_lowers_line() {
        let mut cart = CartState::default();
        cart.add_item(new_item(1, 100, 5));

        let mut item = new_item(1, 100, 1);
        item.max_stock = Some(3);
        assert!(cart.add_item(item));

        let line = cart.line(line_id(1)).unwrap();
        assert_eq!(line.quantity, 3);
        assert_eq!(line.max_stock, Some(3));
        match &cart.pending().last().unwrap().kind {
            PendingActionKind::Update { item } => assert_eq!(item.quantity, 3),
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_add_with_no_stock_left() {
        let mut cart = CartState::default();
        let mut sold_out = new_item(1, 100, 2);
        sold_out.max_stock = Some(0);
        assert!(!cart.add_item(sold_out.clone()));
        assert!(cart.is_empty());
        assert!(cart.pending().is_empty());

        cart.add_item(new_item(1, 100, 2));
        assert!(cart.add_item(sold_out));
        assert!(cart.is_empty());
        assert!(matches!(
            cart.pending().last().unwrap().kind,
            PendingActionKind::Remove { .. }
        ));
    }

    #[test]
    fn test_zero_quantity_add_is_noop() {
        let mut cart = CartState::default();
        assert!(!cart.add_item(new_item(1, 100, 0)));
        assert!(cart.is_empty());
        assert_eq!(cart.revision(), 0);
    }

    #[test]
    fn test_aggregates_hold_over_mixed_sequence() {
        let mut cart = CartState::default();
        let ops: [(i32, i64, i64); 8] = [
            (1, 1200, 2),
            (2, 999, 1),
            (1, 1200, 3),
            (3, 15, 7),
            (2, 999, -1),
            (3, 15, 2),
            (4, 70000, 1),
            (1, 1200, 0),
        ];
        for (variant, price, quantity) in ops {
            if cart.line(line_id(variant)).is_some() {
                cart.update_item(line_id(variant), quantity);
            } else if quantity > 0 {
                cart.add_item(new_item(variant, price, u32::try_from(quantity).unwrap()));
            }

            let expected_total: i64 = cart
                .lines()
                .iter()
                .map(|l| l.price.minor_units() * i64::from(l.quantity))
                .sum();
            let expected_count: u32 = cart.lines().iter().map(|l| l.quantity).sum();
            assert_eq!(cart.total(), Price::from_minor(expected_total));
            assert_eq!(cart.item_count(), expected_count);
            assert!(cart.lines().iter().all(|l| l.quantity >= 1));
        }
    }

    #[test]
    fn test_clear_resets_metadata_without_queueing() {
        let mut cart = CartState::default();
        cart.add_item(new_item(1, 100, 1));
        cart.status = SyncStatus::Error;
        cart.retry_count = 3;

        cart.clear();
        assert!(cart.is_empty());
        assert!(cart.pending().is_empty());
        assert_eq!(cart.status(), SyncStatus::Idle);
        assert_eq!(cart.retry_count, 0);
    }

    #[test]
    fn test_reconcile_adopts_server_when_unchanged() {
        let mut cart = CartState::default();
        cart.add_item(new_item(1, 1000, 9));
        let sent = cart.revision();

        let mut server = cart.lines().to_vec();
        server[0].price = Price::from_minor(900);
        server[0].quantity = 4;
        server[0].max_stock = Some(4);
        cart.reconcile(sent, server);

        let line = cart.line(line_id(1)).unwrap();
        assert_eq!(line.price, Price::from_minor(900));
        assert_eq!(line.quantity, 4);
        assert_eq!(line.max_stock, Some(4));
    }

    #[test]
    fn test_reconcile_keeps_edits_made_during_round_trip() {
        let mut cart = CartState::default();
        cart.add_item(new_item(1, 1000, 2));
        let sent = cart.revision();
        let mut server = cart.lines().to_vec();
        server[0].price = Price::from_minor(1100);

        // Edits while the request is in flight
        cart.update_item(line_id(1), 5);
        cart.add_item(new_item(2, 300, 1));

        cart.reconcile(sent, server);
        assert_eq!(cart.lines().len(), 2);
        let first = cart.line(line_id(1)).unwrap();
        assert_eq!(first.quantity, 5);
        assert_eq!(first.price, Price::from_minor(1100));
        assert_eq!(cart.line(line_id(2)).unwrap().price, Price::from_minor(300));
    }

    #[test]
    fn test_reconcile_lowers_line_above_new_stock_ceiling() {
        let mut cart = CartState::default();
        cart.add_item(new_item(1, 1000, 2));
        let sent = cart.revision();
        let mut server = cart.lines().to_vec();
        server[0].max_stock = Some(3);

        cart.update_item(line_id(1), 5);
        cart.reconcile(sent, server);

        let line = cart.line(line_id(1)).unwrap();
        assert_eq!(line.quantity, 3);
        assert_eq!(line.max_stock, Some(3));
        match &cart.pending().last().unwrap().kind {
            PendingActionKind::Update { item } => assert_eq!(item.quantity, 3),
            other => panic!("unexpected action {other:?}"),
        }

        // Another tap stays at the ceiling
        assert!(!cart.add_item(new_item(1, 1000, 1)));
        assert_eq!(cart.line(line_id(1)).unwrap().quantity, 3);
    }

    #[test]
    fn test_reconcile_does_not_resurrect_removed_lines() {
        let mut cart = CartState::default();
        cart.add_item(new_item(1, 1000, 2));
        let sent = cart.revision();
        let server = cart.lines().to_vec();

        cart.remove_item(line_id(1));
        cart.reconcile(sent, server);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_acknowledge_through_keeps_newer_actions() {
        let mut cart = CartState::default();
        cart.add_item(new_item(1, 1000, 1));
        cart.add_item(new_item(2, 1000, 1));
        let sent = cart.revision();
        cart.add_item(new_item(3, 1000, 1));

        cart.acknowledge_through(sent);
        assert_eq!(cart.pending().len(), 1);
        assert_eq!(cart.pending()[0].revision, sent + 1);
    }

    #[test]
    fn test_persisted_roundtrip_restores_revision() {
        let mut cart = CartState::default();
        cart.add_item(new_item(1, 1000, 1));
        cart.add_item(new_item(2, 1000, 1));

        let restored = CartState::from_persisted(cart.to_persisted());
        assert_eq!(restored.lines(), cart.lines());
        assert_eq!(restored.revision(), cart.revision());
        assert_eq!(restored.session_token(), cart.session_token());
    }

    #[test]
    fn test_logout_rotates_session_token() {
        let mut cart = CartState::default();
        let guest_token = cart.session_token();

        cart.set_auth(AuthState::Authenticated(UserId::new(7)));
        assert_eq!(cart.session_token(), guest_token);

        cart.set_auth(AuthState::Guest);
        assert_ne!(cart.session_token(), guest_token);
    }
}
