//! Cart line items and aggregate helpers.
//!
//! Totals are never stored next to the lines; callers recompute them with
//! [`cart_total`] and [`cart_item_count`] whenever they need them.

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{ProductId, VariantId};
use super::price::Price;

/// Identity of a cart line: one line per product variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineId {
    pub product_id: ProductId,
    pub variant_id: VariantId,
}

impl LineId {
    /// Create a line identity.
    #[must_use]
    pub const fn new(product_id: ProductId, variant_id: VariantId) -> Self {
        Self {
            product_id,
            variant_id,
        }
    }
}

/// Renders as `product:variant`.
impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.product_id, self.variant_id)
    }
}

/// Errors that can occur when parsing a [`LineId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LineIdError {
    /// The input is not of the form `product:variant`.
    #[error("line id must look like <product>:<variant>, got {0:?}")]
    Malformed(String),
    /// One of the halves is not an integer.
    #[error("invalid id in line id: {0}")]
    InvalidId(#[from] core::num::ParseIntError),
}

impl FromStr for LineId {
    type Err = LineIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (product, variant) = s
            .split_once(':')
            .ok_or_else(|| LineIdError::Malformed(s.to_owned()))?;
        Ok(Self::new(product.parse()?, variant.parse()?))
    }
}

/// One entry in a cart: a product variant, its quantity and display data.
///
/// Serialized in the camelCase shape the cart endpoints exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub product_name: String,
    /// Unit the variant is sold in (e.g., "g", "kg", "pcs").
    pub variant_unit: String,
    /// Amount of `variant_unit` per item (e.g., 500 for a 500 g pack).
    pub variant_amount: Decimal,
    /// Unit price in minor currency units.
    pub price: Price,
    /// Always at least 1.
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Stock ceiling reported by the server, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_stock: Option<u32>,
}

impl CartLineItem {
    /// Identity of this line.
    #[must_use]
    pub const fn line_id(&self) -> LineId {
        LineId::new(self.product_id, self.variant_id)
    }

    /// Price multiplied by quantity.
    #[must_use]
    pub const fn line_total(&self) -> Price {
        self.price.times(self.quantity)
    }

    /// Clamp a requested quantity to the known stock ceiling.
    #[must_use]
    pub fn cap_quantity(&self, quantity: u32) -> u32 {
        self.max_stock.map_or(quantity, |max| quantity.min(max))
    }
}

/// Sum of price x quantity over all lines.
#[must_use]
pub fn cart_total(items: &[CartLineItem]) -> Price {
    items.iter().map(CartLineItem::line_total).sum()
}

/// Sum of quantities over all lines.
#[must_use]
pub fn cart_item_count(items: &[CartLineItem]) -> u32 {
    items
        .iter()
        .fold(0u32, |count, item| count.saturating_add(item.quantity))
}
