//! Product catalog: the source of truth for prices and stock.
//!
//! Loaded once at startup from a YAML file:
//!
//! ```yaml
//! products:
//!   - id: 100
//!     name: Fresh Paneer
//!     image_url: /images/paneer.jpg
//!     variants:
//!       - id: 1
//!         unit: g
//!         amount: "200"
//!         price: 8000      # minor units (paise)
//!         stock: 25
//! ```
//!
//! Every line a client sends is rebuilt from the catalog, so clients cannot
//! set their own prices and quantities never exceed stock.

use std::collections::HashMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use grocer_core::{CartLineItem, LineId, Price, ProductId, VariantId};

/// Errors loading the catalog or validating cart lines against it.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid catalog YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("duplicate variant {0} in catalog")]
    DuplicateVariant(LineId),

    #[error("unknown product variant {0}")]
    UnknownVariant(LineId),

    #[error("quantity for {0} must be at least 1")]
    ZeroQuantity(LineId),
}

impl CatalogError {
    /// Whether this error was caused by the request rather than the file.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::UnknownVariant(_) | Self::ZeroQuantity(_))
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    products: Vec<ProductEntry>,
}

#[derive(Debug, Deserialize)]
struct ProductEntry {
    id: ProductId,
    name: String,
    #[serde(default)]
    image_url: Option<String>,
    variants: Vec<VariantEntry>,
}

#[derive(Debug, Deserialize)]
struct VariantEntry {
    id: VariantId,
    unit: String,
    amount: Decimal,
    price: Price,
    stock: u32,
}

/// A sellable variant as the server knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogVariant {
    pub product_name: String,
    pub unit: String,
    pub amount: Decimal,
    pub price: Price,
    pub stock: u32,
    pub image_url: Option<String>,
}

/// In-memory catalog keyed by line identity.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    variants: HashMap<LineId, CatalogVariant>,
}

impl Catalog {
    /// Load the catalog from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path)?;
        let catalog = Self::from_yaml(&contents)?;
        info!(path = %path.display(), variants = catalog.len(), "Catalog loaded");
        Ok(catalog)
    }

    /// Parse a catalog from YAML.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Parse` on malformed YAML and
    /// `CatalogError::DuplicateVariant` if a variant is listed twice.
    pub fn from_yaml(yaml: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_yaml::from_str(yaml)?;
        let mut variants = HashMap::new();

        for product in file.products {
            for variant in product.variants {
                let id = LineId::new(product.id, variant.id);
                let entry = CatalogVariant {
                    product_name: product.name.clone(),
                    unit: variant.unit,
                    amount: variant.amount,
                    price: variant.price,
                    stock: variant.stock,
                    image_url: product.image_url.clone(),
                };
                if variants.insert(id, entry).is_some() {
                    return Err(CatalogError::DuplicateVariant(id));
                }
            }
        }

        Ok(Self { variants })
    }

    #[must_use]
    pub fn get(&self, id: LineId) -> Option<&CatalogVariant> {
        self.variants.get(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Rebuild a client line from the catalog, clamping quantity to stock.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::UnknownVariant` or `CatalogError::ZeroQuantity`.
    pub fn price_line(&self, item: &CartLineItem) -> Result<CartLineItem, CatalogError> {
        let id = item.line_id();
        let variant = self.get(id).ok_or(CatalogError::UnknownVariant(id))?;
        if item.quantity == 0 {
            return Err(CatalogError::ZeroQuantity(id));
        }
        Ok(variant.line(id, item.quantity))
    }

    /// Validate and reprice a full cart.
    ///
    /// Lines for the same variant are merged; lines left with no stock are
    /// dropped.
    ///
    /// # Errors
    ///
    /// Fails on the first line that does not validate.
    pub fn price_cart(&self, items: &[CartLineItem]) -> Result<Vec<CartLineItem>, CatalogError> {
        let mut priced: Vec<CartLineItem> = Vec::with_capacity(items.len());

        for item in items {
            let line = self.price_line(item)?;
            if let Some(existing) = priced.iter_mut().find(|l| l.line_id() == line.line_id()) {
                existing.quantity = existing.cap_quantity(existing.quantity.saturating_add(item.quantity));
            } else {
                priced.push(line);
            }
        }

        priced.retain(|line| {
            let keep = line.quantity > 0;
            if !keep {
                debug!(line = %line.line_id(), "Dropping out-of-stock line");
            }
            keep
        });
        Ok(priced)
    }

    /// Reprice stored lines for display, dropping any that left the catalog.
    #[must_use]
    pub fn refresh(&self, items: &[CartLineItem]) -> Vec<CartLineItem> {
        items
            .iter()
            .filter_map(|item| {
                let id = item.line_id();
                self.get(id).map(|variant| variant.line(id, item.quantity))
            })
            .filter(|line| line.quantity > 0)
            .collect()
    }
}

impl CatalogVariant {
    fn line(&self, id: LineId, quantity: u32) -> CartLineItem {
        CartLineItem {
            product_id: id.product_id,
            variant_id: id.variant_id,
            product_name: self.product_name.clone(),
            variant_unit: self.unit.clone(),
            variant_amount: self.amount,
            price: self.price,
            quantity: quantity.min(self.stock),
            image_url: self.image_url.clone(),
            max_stock: Some(self.stock),
        }
    }
}
