//! Rate table and pricing value types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Category rate card. Rates are in the smallest currency unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateCategory {
    /// Lookup key, matched case-sensitively (e.g. "Special Furniture A")
    pub key: String,
    pub display_name: String,
    /// Price per billed kilogram
    pub weight_rate: i64,
    /// Price per volumetric unit
    pub volume_rate: i64,
}

/// Global pricing constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConstants {
    /// cm³ per volumetric unit
    pub volume_divisor: Decimal,
    /// Volumetric units per cubic metre
    pub cbm_to_volumetric_factor: Decimal,
    /// Floor for a positive shipment base fee
    pub minimum_charge: i64,
    pub oversized_limit_cm: Decimal,
    pub oversized_fee: i64,
    pub overweight_limit_kg: Decimal,
    pub overweight_fee: i64,
}

impl Default for PricingConstants {
    fn default() -> Self {
        Self {
            volume_divisor: Decimal::from(28_317),
            cbm_to_volumetric_factor: Decimal::new(353, 1),
            minimum_charge: 2000,
            oversized_limit_cm: Decimal::from(150),
            oversized_fee: 500,
            overweight_limit_kg: Decimal::from(100),
            overweight_fee: 500,
        }
    }
}

/// Immutable snapshot of every rate used by a pricing call.
///
/// Never mutated after construction; updates publish a new table through
/// [`RateTableStore`](crate::application::services::RateTableStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateTable {
    version: String,
    default_category: String,
    strict_categories: bool,
    categories: Vec<RateCategory>,
    constants: PricingConstants,
}

#[derive(Serialize)]
struct Fingerprint<'a> {
    default_category: &'a str,
    strict_categories: bool,
    categories: &'a [RateCategory],
    constants: &'a PricingConstants,
}

/// Result of a category lookup.
#[derive(Debug, Clone, Copy)]
pub struct CategoryLookup<'a> {
    pub category: &'a RateCategory,
    /// True when the requested key was not found and the default was used
    pub fell_back: bool,
}

impl RateTable {
    /// Build a table and compute its version fingerprint.
    ///
    /// Call [`RateTable::validate`] before publishing.
    pub fn new(
        default_category: impl Into<String>,
        strict_categories: bool,
        categories: Vec<RateCategory>,
        constants: PricingConstants,
    ) -> Self {
        let default_category = default_category.into();
        let version = {
            let canonical = serde_json::to_vec(&Fingerprint {
                default_category: &default_category,
                strict_categories,
                categories: &categories,
                constants: &constants,
            })
            .unwrap_or_default();
            let digest = Sha256::digest(&canonical);
            hex::encode(&digest[..8])
        };

        Self {
            version,
            default_category,
            strict_categories,
            categories,
            constants,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn constants(&self) -> &PricingConstants {
        &self.constants
    }

    pub fn categories(&self) -> &[RateCategory] {
        &self.categories
    }

    pub fn default_category_key(&self) -> &str {
        &self.default_category
    }

    pub fn is_strict(&self) -> bool {
        self.strict_categories
    }

    /// Case-sensitive lookup with fallback to the default category.
    ///
    /// Returns `None` only when the key is unknown and the table is strict,
    /// or when the default category itself is missing (rejected by `validate`).
    pub fn category(&self, key: &str) -> Option<CategoryLookup<'_>> {
        if let Some(category) = self.categories.iter().find(|c| c.key == key) {
            return Some(CategoryLookup {
                category,
                fell_back: false,
            });
        }
        if self.strict_categories {
            return None;
        }
        self.categories
            .iter()
            .find(|c| c.key == self.default_category)
            .map(|category| CategoryLookup {
                category,
                fell_back: true,
            })
    }

    /// Structural checks run before a table may be published.
    pub fn validate(&self) -> Result<(), String> {
        let c = &self.constants;
        if c.volume_divisor <= Decimal::ZERO {
            return Err("volume_divisor must be positive".into());
        }
        if c.cbm_to_volumetric_factor <= Decimal::ZERO {
            return Err("cbm_to_volumetric_factor must be positive".into());
        }
        if c.minimum_charge < 0 || c.oversized_fee < 0 || c.overweight_fee < 0 {
            return Err("fees must not be negative".into());
        }
        if c.oversized_limit_cm <= Decimal::ZERO || c.overweight_limit_kg <= Decimal::ZERO {
            return Err("surcharge limits must be positive".into());
        }
        for (i, category) in self.categories.iter().enumerate() {
            if category.key.is_empty() {
                return Err(format!("category #{} has an empty key", i));
            }
            if category.weight_rate < 0 || category.volume_rate < 0 {
                return Err(format!("category '{}' has a negative rate", category.key));
            }
            if self.categories[..i].iter().any(|c| c.key == category.key) {
                return Err(format!("duplicate category '{}'", category.key));
            }
        }
        if !self.categories.iter().any(|c| c.key == self.default_category) {
            return Err(format!(
                "default category '{}' is not defined",
                self.default_category
            ));
        }
        Ok(())
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::new(
            "general",
            false,
            vec![RateCategory {
                key: "general".into(),
                display_name: "General cargo".into(),
                weight_rate: 22,
                volume_rate: 125,
            }],
            PricingConstants::default(),
        )
    }
}

/// One physical box as measured at the warehouse.
///
/// A missing value means "not yet measured". When `cbm` is present and
/// positive it takes precedence over the three dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CargoBox {
    pub name: String,
    pub category_key: String,
    pub weight_kg: Option<Decimal>,
    pub length_cm: Option<Decimal>,
    pub width_cm: Option<Decimal>,
    pub height_cm: Option<Decimal>,
    pub cbm: Option<Decimal>,
}

impl CargoBox {
    /// Positive weight, if measured.
    pub fn measured_weight(&self) -> Option<Decimal> {
        self.weight_kg.filter(|w| *w > Decimal::ZERO)
    }

    /// Positive dimensions, if all three are measured.
    pub fn measured_dimensions(&self) -> Option<[Decimal; 3]> {
        match (self.length_cm, self.width_cm, self.height_cm) {
            (Some(l), Some(w), Some(h))
                if l > Decimal::ZERO && w > Decimal::ZERO && h > Decimal::ZERO =>
            {
                Some([l, w, h])
            }
            _ => None,
        }
    }

    pub fn measured_cbm(&self) -> Option<Decimal> {
        self.cbm.filter(|v| *v > Decimal::ZERO)
    }
}

/// Per-box fee breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoxQuote {
    /// Category actually billed (the default one after a fallback)
    pub billed_category: String,
    pub fell_back: bool,
    pub volumetric_units: i64,
    pub volume_cost: i64,
    pub weight_cost: i64,
    pub fee: i64,
}

/// A measured box together with the quote it was priced at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedBox {
    pub measurement: CargoBox,
    pub quote: BoxQuote,
}

/// Shipment-level fee breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentQuote {
    /// Sum of box fees, floored to the minimum charge when positive
    pub base_fee: i64,
    pub minimum_applied: bool,
    pub oversized_fee: i64,
    pub overweight_fee: i64,
    pub remote_area_fee: i64,
    pub total_fee: i64,
    pub total_volumetric_units: i64,
    pub remote_area_rate: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(strict: bool) -> RateTable {
        RateTable::new(
            "general",
            strict,
            vec![
                RateCategory {
                    key: "general".into(),
                    display_name: "General".into(),
                    weight_rate: 22,
                    volume_rate: 125,
                },
                RateCategory {
                    key: "Special Furniture A".into(),
                    display_name: "Furniture".into(),
                    weight_rate: 30,
                    volume_rate: 160,
                },
            ],
            PricingConstants::default(),
        )
    }

    #[test]
    fn lookup_is_case_sensitive_with_fallback() {
        let t = table(false);
        let hit = t.category("Special Furniture A").unwrap();
        assert!(!hit.fell_back);
        assert_eq!(hit.category.volume_rate, 160);

        let miss = t.category("special furniture a").unwrap();
        assert!(miss.fell_back);
        assert_eq!(miss.category.key, "general");
    }

    #[test]
    fn strict_table_refuses_unknown_key() {
        assert!(table(true).category("furniture").is_none());
    }

    #[test]
    fn version_tracks_content() {
        let a = table(false);
        let b = table(false);
        assert_eq!(a.version(), b.version());
        assert_eq!(a.version().len(), 16);

        let mut constants = PricingConstants::default();
        constants.minimum_charge = 2500;
        let c = RateTable::new("general", false, a.categories().to_vec(), constants);
        assert_ne!(a.version(), c.version());
    }

    #[test]
    fn validate_rejects_missing_default_and_duplicates() {
        let t = RateTable::new("missing", false, table(false).categories().to_vec(), PricingConstants::default());
        assert!(t.validate().is_err());

        let mut cats = table(false).categories().to_vec();
        cats.push(cats[0].clone());
        let t = RateTable::new("general", false, cats, PricingConstants::default());
        assert!(t.validate().unwrap_err().contains("duplicate"));

        let mut constants = PricingConstants::default();
        constants.volume_divisor = Decimal::ZERO;
        let t = RateTable::new("general", false, table(false).categories().to_vec(), constants);
        assert!(t.validate().is_err());

        assert!(table(false).validate().is_ok());
    }
}
