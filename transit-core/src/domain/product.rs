//! Transport mode classification.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when parsing an unknown product code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown product code: {0:?}")]
pub struct InvalidProduct(pub char);

/// The kind of vehicle serving a line.
///
/// Each product has a stable single-character code used in serialized
/// data and in derived trip ids.
///
/// # Examples
///
/// ```
/// use transit_core::domain::Product;
///
/// assert_eq!(Product::SuburbanTrain.code(), 'S');
/// assert_eq!(Product::from_code('U').unwrap(), Product::Subway);
/// assert!(Product::from_code('X').is_err());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(into = "char", try_from = "char")]
pub enum Product {
    HighSpeedTrain,
    RegionalTrain,
    SuburbanTrain,
    Subway,
    Tram,
    Bus,
    OnDemand,
    Ferry,
    Cablecar,
}

impl Product {
    /// Every product, in code order.
    pub const ALL: [Product; 9] = [
        Product::HighSpeedTrain,
        Product::RegionalTrain,
        Product::SuburbanTrain,
        Product::Subway,
        Product::Tram,
        Product::Bus,
        Product::OnDemand,
        Product::Ferry,
        Product::Cablecar,
    ];

    /// Returns the single-character code for this product.
    pub fn code(self) -> char {
        match self {
            Product::HighSpeedTrain => 'I',
            Product::RegionalTrain => 'R',
            Product::SuburbanTrain => 'S',
            Product::Subway => 'U',
            Product::Tram => 'T',
            Product::Bus => 'B',
            Product::OnDemand => 'P',
            Product::Ferry => 'F',
            Product::Cablecar => 'C',
        }
    }

    /// Parses a product from its single-character code.
    pub fn from_code(code: char) -> Result<Self, InvalidProduct> {
        Product::ALL
            .into_iter()
            .find(|p| p.code() == code)
            .ok_or(InvalidProduct(code))
    }

    /// Returns true for rail-bound products.
    pub fn is_rail(self) -> bool {
        matches!(
            self,
            Product::HighSpeedTrain
                | Product::RegionalTrain
                | Product::SuburbanTrain
                | Product::Subway
                | Product::Tram
        )
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Product::HighSpeedTrain => "high-speed train",
            Product::RegionalTrain => "regional train",
            Product::SuburbanTrain => "suburban train",
            Product::Subway => "subway",
            Product::Tram => "tram",
            Product::Bus => "bus",
            Product::OnDemand => "on-demand",
            Product::Ferry => "ferry",
            Product::Cablecar => "cablecar",
        };
        f.write_str(label)
    }
}

impl From<Product> for char {
    fn from(product: Product) -> Self {
        product.code()
    }
}

impl TryFrom<char> for Product {
    type Error = InvalidProduct;

    fn try_from(code: char) -> Result<Self, Self::Error> {
        Product::from_code(code)
    }
}

/// Encodes a product set as a compact code string, e.g. `"IRS"`.
pub fn products_to_codes(products: &BTreeSet<Product>) -> String {
    products.iter().map(|p| p.code()).collect()
}

/// Parses a code string produced by [`products_to_codes`].
pub fn products_from_codes(codes: &str) -> Result<BTreeSet<Product>, InvalidProduct> {
    codes.chars().map(Product::from_code).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique() {
        let codes: BTreeSet<char> = Product::ALL.iter().map(|p| p.code()).collect();
        assert_eq!(codes.len(), Product::ALL.len());
    }

    #[test]
    fn every_code_parses_back() {
        for product in Product::ALL {
            assert_eq!(Product::from_code(product.code()), Ok(product));
        }
    }

    #[test]
    fn code_string_round_trip() {
        let set: BTreeSet<Product> = [Product::Bus, Product::HighSpeedTrain, Product::Tram]
            .into_iter()
            .collect();
        let codes = products_to_codes(&set);
        assert_eq!(codes, "ITB");
        assert_eq!(products_from_codes(&codes).unwrap(), set);
        assert_eq!(products_from_codes("IZ"), Err(InvalidProduct('Z')));
    }

    #[test]
    fn serializes_as_code() {
        let json = serde_json::to_string(&Product::Ferry).unwrap();
        assert_eq!(json, "\"F\"");
        let back: Product = serde_json::from_str("\"C\"").unwrap();
        assert_eq!(back, Product::Cablecar);
        assert!(serde_json::from_str::<Product>("\"Q\"").is_err());
    }
}
