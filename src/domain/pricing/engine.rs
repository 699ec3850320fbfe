//! Box and shipment pricing
//!
//! Everything here is a pure function of its inputs: the same boxes and the
//! same [`RateTable`] snapshot always produce the same quote.
//!
//! Rules:
//! - volumetric units round up, from either dimensions or CBM
//! - billed weight rounds up to 0.1 kg before multiplying by the rate
//! - a box is billed at whichever of volume cost and weight cost is higher
//! - a box without a positive weight and a positive volume is "not measured"
//!   and prices at zero

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::warn;

use super::model::{
    BoxQuote, CargoBox, PricedBox, PricingConstants, RateTable, ShipmentQuote,
};
use crate::shared::errors::DomainError;

fn too_large(what: &str) -> DomainError {
    DomainError::Validation(format!("{} is out of range", what))
}

fn to_amount(value: Decimal, what: &str) -> Result<i64, DomainError> {
    value.to_i64().ok_or_else(|| too_large(what))
}

fn checked_sum<I: IntoIterator<Item = i64>>(values: I, what: &str) -> Result<i64, DomainError> {
    values
        .into_iter()
        .try_fold(0i64, |acc, v| acc.checked_add(v))
        .ok_or_else(|| too_large(what))
}

/// Volumetric units for a box, rounded up. Zero when unmeasured.
///
/// Measurements too large to compute are a validation error, never a panic.
pub fn volumetric_units(cargo: &CargoBox, constants: &PricingConstants) -> Result<i64, DomainError> {
    if let Some(cbm) = cargo.measured_cbm() {
        let units = cbm
            .checked_mul(constants.cbm_to_volumetric_factor)
            .ok_or_else(|| too_large("cbm"))?;
        return to_amount(units.ceil(), "volumetric units");
    }
    match cargo.measured_dimensions() {
        Some([l, w, h]) => {
            let units = l
                .checked_mul(w)
                .and_then(|lw| lw.checked_mul(h))
                .and_then(|v| v.checked_div(constants.volume_divisor))
                .ok_or_else(|| too_large("box dimensions"))?;
            to_amount(units.ceil(), "volumetric units")
        }
        None => Ok(0),
    }
}

/// Weight rounded up to one decimal place.
pub fn billed_weight(weight_kg: Decimal) -> Result<Decimal, DomainError> {
    let tenths = weight_kg
        .checked_mul(Decimal::TEN)
        .ok_or_else(|| too_large("weight"))?;
    Ok(tenths.ceil() / Decimal::TEN)
}

/// Price a single box.
///
/// Fails when the category key is unknown and the table is strict, or when a
/// measurement is too large to price.
pub fn price_box(cargo: &CargoBox, table: &RateTable) -> Result<BoxQuote, DomainError> {
    let lookup = table.category(&cargo.category_key).ok_or_else(|| {
        DomainError::Validation(format!(
            "unknown category '{}' for box '{}'",
            cargo.category_key, cargo.name
        ))
    })?;

    if lookup.fell_back {
        warn!(
            requested = cargo.category_key.as_str(),
            billed = lookup.category.key.as_str(),
            rate_version = table.version(),
            "Unknown category key, billing at default category"
        );
    }

    let mut quote = BoxQuote {
        billed_category: lookup.category.key.clone(),
        fell_back: lookup.fell_back,
        ..BoxQuote::default()
    };

    let constants = table.constants();
    let measured_volume =
        cargo.measured_cbm().is_some() || cargo.measured_dimensions().is_some();
    let Some(weight) = cargo.measured_weight().filter(|_| measured_volume) else {
        return Ok(quote);
    };

    quote.volumetric_units = volumetric_units(cargo, constants)?;
    quote.volume_cost = quote
        .volumetric_units
        .checked_mul(lookup.category.volume_rate)
        .ok_or_else(|| too_large("volume cost"))?;
    let weight_cost = billed_weight(weight)?
        .checked_mul(Decimal::from(lookup.category.weight_rate))
        .ok_or_else(|| too_large("weight cost"))?;
    quote.weight_cost = to_amount(weight_cost.ceil(), "weight cost")?;
    quote.fee = quote.volume_cost.max(quote.weight_cost);

    Ok(quote)
}

fn is_oversized(cargo: &CargoBox, constants: &PricingConstants) -> bool {
    cargo
        .measured_dimensions()
        .is_some_and(|dims| dims.iter().any(|d| *d >= constants.oversized_limit_cm))
}

fn is_overweight(cargo: &CargoBox, constants: &PricingConstants) -> bool {
    cargo
        .measured_weight()
        .is_some_and(|w| w >= constants.overweight_limit_kg)
}

/// Aggregate already-priced boxes into a shipment quote.
///
/// The minimum charge only lifts a positive base; oversized and overweight
/// are flat, shipment-wide surcharges applied once no matter how many boxes
/// trigger them. Totals that do not fit an amount are a validation error.
pub fn price_shipment(
    boxes: &[PricedBox],
    remote_area_rate: i64,
    constants: &PricingConstants,
) -> Result<ShipmentQuote, DomainError> {
    let sum = checked_sum(boxes.iter().map(|b| b.quote.fee), "shipment fee")?;
    let total_volumetric_units =
        checked_sum(boxes.iter().map(|b| b.quote.volumetric_units), "volumetric units")?;

    let minimum_applied = sum > 0 && sum < constants.minimum_charge;
    let base_fee = if minimum_applied {
        constants.minimum_charge
    } else {
        sum
    };

    let oversized_fee = if boxes.iter().any(|b| is_oversized(&b.measurement, constants)) {
        constants.oversized_fee
    } else {
        0
    };
    let overweight_fee = if boxes.iter().any(|b| is_overweight(&b.measurement, constants)) {
        constants.overweight_fee
    } else {
        0
    };

    let remote_area_rate = remote_area_rate.max(0);
    let remote_area_fee = if remote_area_rate == 0 || total_volumetric_units == 0 {
        0
    } else {
        let fee = Decimal::from(total_volumetric_units)
            .checked_div(constants.cbm_to_volumetric_factor)
            .and_then(|cbm| cbm.checked_mul(Decimal::from(remote_area_rate)))
            .ok_or_else(|| too_large("remote area fee"))?;
        to_amount(
            fee.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero),
            "remote area fee",
        )?
    };

    let total_fee = checked_sum(
        [base_fee, oversized_fee, overweight_fee, remote_area_fee],
        "total fee",
    )?;

    Ok(ShipmentQuote {
        base_fee,
        minimum_applied,
        oversized_fee,
        overweight_fee,
        remote_area_fee,
        total_fee,
        total_volumetric_units,
        remote_area_rate,
    })
}

/// Price raw boxes individually.
pub fn price_boxes(boxes: &[CargoBox], table: &RateTable) -> Result<Vec<PricedBox>, DomainError> {
    boxes
        .iter()
        .map(|cargo| {
            price_box(cargo, table).map(|quote| PricedBox {
                measurement: cargo.clone(),
                quote,
            })
        })
        .collect()
}

/// Price raw boxes and aggregate them, for estimates before anything is saved.
pub fn quote_boxes(
    boxes: &[CargoBox],
    remote_area_rate: i64,
    table: &RateTable,
) -> Result<(Vec<PricedBox>, ShipmentQuote), DomainError> {
    let priced = price_boxes(boxes, table)?;
    let quote = price_shipment(&priced, remote_area_rate, table.constants())?;
    Ok((priced, quote))
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pricing::model::RateCategory;
    use rust_decimal_macros::dec;

    fn table() -> RateTable {
        RateTable::new(
            "general",
            false,
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
                    weight_rate: 40,
                    volume_rate: 200,
                },
            ],
            PricingConstants::default(),
        )
    }

    fn cargo(weight: Decimal, l: Decimal, w: Decimal, h: Decimal) -> CargoBox {
        CargoBox {
            name: "box".into(),
            category_key: "general".into(),
            weight_kg: Some(weight),
            length_cm: Some(l),
            width_cm: Some(w),
            height_cm: Some(h),
            cbm: None,
        }
    }

    fn priced(cargo: CargoBox) -> PricedBox {
        let quote = price_box(&cargo, &table()).unwrap();
        PricedBox {
            measurement: cargo,
            quote,
        }
    }

    #[test]
    fn reference_box_bills_volume() {
        let q = price_box(&cargo(dec!(10), dec!(50), dec!(50), dec!(50)), &table()).unwrap();
        // 125000 / 28317 = 4.41 -> 5
        assert_eq!(q.volumetric_units, 5);
        assert_eq!(q.volume_cost, 625);
        assert_eq!(q.weight_cost, 220);
        assert_eq!(q.fee, 625);
        assert!(!q.fell_back);
    }

    #[test]
    fn heavy_small_box_bills_weight() {
        let q = price_box(&cargo(dec!(40), dec!(20), dec!(20), dec!(20)), &table()).unwrap();
        assert_eq!(q.volumetric_units, 1);
        assert_eq!(q.volume_cost, 125);
        assert_eq!(q.weight_cost, 880);
        assert_eq!(q.fee, 880);
    }

    #[test]
    fn weight_rounds_up_to_one_decimal() {
        assert_eq!(billed_weight(dec!(10.01)).unwrap(), dec!(10.1));
        assert_eq!(billed_weight(dec!(10.1)).unwrap(), dec!(10.1));
        assert_eq!(billed_weight(dec!(0.01)).unwrap(), dec!(0.1));

        // 10.01 kg -> 10.1 kg * 22 = 222.2 -> 223
        let q = price_box(&cargo(dec!(10.01), dec!(1), dec!(1), dec!(1)), &table()).unwrap();
        assert_eq!(q.weight_cost, 223);
    }

    #[test]
    fn cbm_path_rounds_up_independently() {
        let mut c = cargo(dec!(1), dec!(0), dec!(0), dec!(0));
        c.cbm = Some(dec!(0.1));
        // 0.1 * 35.3 = 3.53 -> 4
        let q = price_box(&c, &table()).unwrap();
        assert_eq!(q.volumetric_units, 4);
        assert_eq!(q.fee, 500);
    }

    #[test]
    fn cbm_takes_precedence_over_dimensions() {
        let mut c = cargo(dec!(1), dec!(100), dec!(100), dec!(100));
        c.cbm = Some(dec!(1));
        assert_eq!(volumetric_units(&c, table().constants()).unwrap(), 36);
    }

    #[test]
    fn unmeasured_boxes_price_at_zero() {
        let cases = [
            cargo(dec!(0), dec!(50), dec!(50), dec!(50)),
            cargo(dec!(-3), dec!(50), dec!(50), dec!(50)),
            cargo(dec!(10), dec!(0), dec!(50), dec!(50)),
            cargo(dec!(10), dec!(50), dec!(-1), dec!(50)),
            CargoBox {
                category_key: "general".into(),
                ..CargoBox::default()
            },
        ];
        for c in &cases {
            let q = price_box(c, &table()).unwrap();
            assert_eq!(q.fee, 0, "{:?}", c);
            assert_eq!(q.volumetric_units, 0);
        }
    }

    #[test]
    fn fee_is_max_of_costs() {
        for (w, l) in [(dec!(1), dec!(80)), (dec!(55.55), dec!(30)), (dec!(12.3), dec!(61))] {
            let q = price_box(&cargo(w, l, l, l), &table()).unwrap();
            assert_eq!(q.fee, q.volume_cost.max(q.weight_cost));
        }
    }

    #[test]
    fn unknown_category_falls_back_preserving_case_rules() {
        let mut c = cargo(dec!(10), dec!(50), dec!(50), dec!(50));
        c.category_key = "special furniture a".into();
        let q = price_box(&c, &table()).unwrap();
        assert!(q.fell_back);
        assert_eq!(q.billed_category, "general");
        assert_eq!(q.fee, 625);

        c.category_key = "Special Furniture A".into();
        let q = price_box(&c, &table()).unwrap();
        assert!(!q.fell_back);
        assert_eq!(q.fee, 1000);
    }

    #[test]
    fn strict_table_rejects_unknown_category() {
        let strict = RateTable::new(
            "general",
            true,
            table().categories().to_vec(),
            PricingConstants::default(),
        );
        let mut c = cargo(dec!(10), dec!(50), dec!(50), dec!(50));
        c.category_key = "furniture".into();
        assert!(matches!(price_box(&c, &strict), Err(DomainError::Validation(_))));
    }

    #[test]
    fn minimum_charge_lifts_positive_base() {
        let boxes = vec![
            priced(cargo(dec!(10), dec!(50), dec!(50), dec!(50))),
            priced(cargo(dec!(10), dec!(50), dec!(50), dec!(50))),
            priced(cargo(dec!(1), dec!(40), dec!(40), dec!(40))),
        ];
        // 625 + 625 + 3 * 125 = 1625 < 2000
        let q = price_shipment(&boxes, 0, table().constants()).unwrap();
        assert!(q.minimum_applied);
        assert_eq!(q.base_fee, 2000);
        assert_eq!(q.total_fee, 2000);
    }

    #[test]
    fn minimum_charge_scenario_1500() {
        let mut b = priced(cargo(dec!(10), dec!(50), dec!(50), dec!(50)));
        b.quote.fee = 1500;
        let q = price_shipment(&[b], 0, table().constants()).unwrap();
        assert_eq!(q.total_fee, 2000);
    }

    #[test]
    fn empty_shipment_is_not_bumped() {
        let q = price_shipment(&[], 0, table().constants()).unwrap();
        assert_eq!(q.base_fee, 0);
        assert_eq!(q.total_fee, 0);
        assert!(!q.minimum_applied);

        let unmeasured = priced(CargoBox {
            category_key: "general".into(),
            ..CargoBox::default()
        });
        assert_eq!(price_shipment(&[unmeasured], 0, table().constants()).unwrap().total_fee, 0);
    }

    #[test]
    fn overweight_surcharge_applies_once() {
        let boxes = vec![
            priced(cargo(dec!(150), dec!(50), dec!(50), dec!(50))),
            priced(cargo(dec!(120), dec!(50), dec!(50), dec!(50))),
        ];
        let q = price_shipment(&boxes, 0, table().constants()).unwrap();
        assert_eq!(q.overweight_fee, 500);
        assert_eq!(q.oversized_fee, 0);
        // 150 * 22 + 120 * 22 = 5940
        assert_eq!(q.base_fee, 5940);
        assert_eq!(q.total_fee, 6440);
    }

    #[test]
    fn oversized_triggers_at_limit() {
        let boxes = vec![priced(cargo(dec!(10), dec!(150), dec!(20), dec!(20)))];
        let q = price_shipment(&boxes, 0, table().constants()).unwrap();
        assert_eq!(q.oversized_fee, 500);

        let boxes = vec![priced(cargo(dec!(10), dec!(149.9), dec!(20), dec!(20)))];
        assert_eq!(price_shipment(&boxes, 0, table().constants()).unwrap().oversized_fee, 0);
    }

    #[test]
    fn remote_area_fee_scales_with_volume() {
        // 5 units / 35.3 * 1000 = 141.64 -> 142
        let boxes = vec![priced(cargo(dec!(10), dec!(50), dec!(50), dec!(50)))];
        let q = price_shipment(&boxes, 1000, table().constants()).unwrap();
        assert_eq!(q.total_volumetric_units, 5);
        assert_eq!(q.remote_area_fee, 142);
        assert_eq!(q.total_fee, 2000 + 142);
    }

    #[test]
    fn total_is_sum_of_parts() {
        let boxes = vec![
            priced(cargo(dec!(130), dec!(160), dec!(60), dec!(60))),
            priced(cargo(dec!(2), dec!(30), dec!(30), dec!(30))),
        ];
        let q = price_shipment(&boxes, 800, table().constants()).unwrap();
        assert_eq!(
            q.total_fee,
            q.base_fee + q.oversized_fee + q.overweight_fee + q.remote_area_fee
        );
    }

    #[test]
    fn shipment_pricing_is_deterministic() {
        let raw = vec![
            cargo(dec!(33.33), dec!(71), dec!(52), dec!(48)),
            cargo(dec!(101), dec!(155), dec!(40), dec!(40)),
        ];
        let first = quote_boxes(&raw, 650, &table()).unwrap();
        let second = quote_boxes(&raw, 650, &table()).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first.1).unwrap(),
            serde_json::to_string(&second.1).unwrap()
        );
    }

    #[test]
    fn huge_dimensions_are_a_validation_error() {
        let c = cargo(
            dec!(10),
            dec!(1000000000000),
            dec!(1000000000000),
            dec!(1000000000000),
        );
        assert!(matches!(price_box(&c, &table()), Err(DomainError::Validation(_))));

        // fits a Decimal but not an amount of volumetric units
        let raw = vec![
            cargo(dec!(10), dec!(1000000000), dec!(1000000000), dec!(1000000000)),
            cargo(dec!(10), dec!(1000000000), dec!(1000000000), dec!(1000000000)),
        ];
        assert!(matches!(
            quote_boxes(&raw, 0, &table()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn huge_weight_and_cbm_are_a_validation_error() {
        let heavy = cargo(Decimal::MAX, dec!(50), dec!(50), dec!(50));
        assert!(matches!(price_box(&heavy, &table()), Err(DomainError::Validation(_))));

        let mut bulky = cargo(dec!(10), dec!(0), dec!(0), dec!(0));
        bulky.cbm = Some(Decimal::MAX);
        assert!(matches!(price_box(&bulky, &table()), Err(DomainError::Validation(_))));
    }

    #[test]
    fn shipment_totals_do_not_overflow() {
        let mut a = priced(cargo(dec!(10), dec!(50), dec!(50), dec!(50)));
        a.quote.fee = i64::MAX / 2 + 1;
        let b = a.clone();
        assert!(matches!(
            price_shipment(&[a.clone(), b], 0, table().constants()),
            Err(DomainError::Validation(_))
        ));

        // base fits, surcharges push it over
        a.quote.fee = i64::MAX - 1;
        let mut heavy = priced(cargo(dec!(150), dec!(50), dec!(50), dec!(50)));
        heavy.quote.fee = 0;
        assert!(matches!(
            price_shipment(&[a, heavy], 0, table().constants()),
            Err(DomainError::Validation(_))
        ));
    }
}
