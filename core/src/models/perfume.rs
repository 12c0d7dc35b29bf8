// parfum/src/models/perfume.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A catalog product. Prices are keyed by size, e.g. `"50ml"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Perfume {
  pub id: String,
  pub name: String,
  pub brand: String,
  pub image_url: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub prices: BTreeMap<String, f64>,
}

impl Perfume {
  pub fn new(id: impl Into<String>, name: impl Into<String>, brand: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      name: name.into(),
      brand: brand.into(),
      image_url: String::new(),
      description: None,
      prices: BTreeMap::new(),
    }
  }

  pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
    self.image_url = image_url.into();
    self
  }

  pub fn with_price(mut self, size: impl Into<String>, price: f64) -> Self {
    self.prices.insert(size.into(), price);
    self
  }

  /// Unit price for `size`, or `0.0` when the size is not offered.
  pub fn price_for(&self, size: &str) -> f64 {
    self.prices.get(size).copied().unwrap_or(0.0)
  }

  pub fn offers_size(&self, size: &str) -> bool {
    self.prices.contains_key(size)
  }

  pub fn sizes(&self) -> impl Iterator<Item = &str> {
    self.prices.keys().map(String::as_str)
  }
}
