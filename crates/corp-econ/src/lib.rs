#![deny(warnings)]

//! Economic models: cost curves and production math for corp-pilot.
//!
//! This module provides validated utilities for:
//! - Geometric upgrade cost curves and their budget inversions
//! - The off-by-one warehouse cost family and office seat quantization
//! - Office, boost-material and division production multipliers
//! - Advertising reach: the market factor and the per-campaign recurrence
//!
//! Everything here is a pure function of its arguments. Balance constants
//! (base prices, multipliers, benefits) always arrive as data (see
//! `corp_core::UpgradeCatalog`), so the math stays valid whatever values
//! the host publishes.

use corp_core::{IndustryFactors, MaterialInput, ResearchBonuses, UpgradeSpec, WarehouseSpec};
use thiserror::Error;

/// Errors produced by economic helpers.
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    /// Geometric cost curves require a price multiplier strictly above one.
    #[error("invalid price multiplier: {0}")]
    InvalidMultiplier(f64),
    /// Base prices must be positive and finite.
    #[error("invalid price or cost value")]
    InvalidPrice,
    /// A numeric argument was NaN or positively infinite.
    #[error("non-finite numeric value")]
    NonFinite,
}

fn check_curve(base_price: f64, price_multiplier: f64) -> Result<(), EconError> {
    if !base_price.is_finite() || !price_multiplier.is_finite() {
        return Err(EconError::NonFinite);
    }
    if base_price <= 0.0 {
        return Err(EconError::InvalidPrice);
    }
    if price_multiplier <= 1.0 {
        return Err(EconError::InvalidMultiplier(price_multiplier));
    }
    Ok(())
}

fn check_budget(budget: f64) -> Result<(), EconError> {
    // Negative budgets are a valid "buy nothing"; NaN and +inf are not.
    if budget.is_nan() || budget == f64::INFINITY {
        return Err(EconError::NonFinite);
    }
    Ok(())
}

/// Total cost of raising a geometric-cost upgrade from `from` to `to`.
///
/// Buying level `n + 1` costs `base * mult^n`, which telescopes to
/// `base * (mult^to - mult^from) / (mult - 1)`. Requesting `to <= from`
/// costs nothing.
///
/// Example:
/// let spec = UpgradeSpec { base_price: 1e9, price_multiplier: 1.06 };
/// assert_eq!(upgrade_cost(&spec, 3, 3).unwrap(), 0.0);
pub fn upgrade_cost(spec: &UpgradeSpec, from: u32, to: u32) -> Result<f64, EconError> {
    check_curve(spec.base_price, spec.price_multiplier)?;
    if to <= from {
        return Ok(0.0);
    }
    let m = spec.price_multiplier;
    Ok(spec.base_price * (m.powf(f64::from(to)) - m.powf(f64::from(from))) / (m - 1.0))
}

/// Highest level reachable from `from` without spending more than `budget`.
///
/// Inverse of [`upgrade_cost`]: the result `level` satisfies
/// `upgrade_cost(from, level) <= budget < upgrade_cost(from, level + 1)`.
/// The closed-form log inversion is corrected by unit steps so that
/// bracket holds exactly under floating point. Budgets at or below zero
/// buy nothing and return `from`.
pub fn max_affordable_level(spec: &UpgradeSpec, from: u32, budget: f64) -> Result<u32, EconError> {
    check_curve(spec.base_price, spec.price_multiplier)?;
    check_budget(budget)?;
    if budget <= 0.0 || upgrade_cost(spec, from, from.saturating_add(1))? > budget {
        return Ok(from);
    }
    let m = spec.price_multiplier;
    let reach = budget * (m - 1.0) / spec.base_price + m.powf(f64::from(from));
    let mut level = ((reach.ln() / m.ln()).floor() as u32).max(from);
    while level < u32::MAX && upgrade_cost(spec, from, level + 1)? <= budget {
        level += 1;
    }
    while level > from && upgrade_cost(spec, from, level)? > budget {
        level -= 1;
    }
    Ok(level)
}

/// Cost of advertising campaigns from `from` through `to` purchases.
///
/// Campaigns follow the generic geometric family; the host publishes their
/// base price and multiplier in the catalog's advert spec.
pub fn advert_cost(spec: &UpgradeSpec, from: u32, to: u32) -> Result<f64, EconError> {
    upgrade_cost(spec, from, to)
}

/// Number of advertising campaigns affordable under `budget`, starting
/// from `from` purchases.
pub fn max_affordable_advert_level(
    spec: &UpgradeSpec,
    from: u32,
    budget: f64,
) -> Result<u32, EconError> {
    max_affordable_level(spec, from, budget)
}

/// Total cost of raising a warehouse from level `from` to `to`.
///
/// Warehouses follow their own recurrence: level `n` to `n + 1` costs
/// `base * mult^(n + 1)`, one exponent above the generic family. The
/// telescoped form is `base * (mult^(to+1) - mult^(from+1)) / (mult - 1)`.
pub fn warehouse_cost(spec: &WarehouseSpec, from: u32, to: u32) -> Result<f64, EconError> {
    check_curve(spec.base_cost, spec.cost_multiplier)?;
    if to <= from {
        return Ok(0.0);
    }
    let m = spec.cost_multiplier;
    Ok(spec.base_cost * (m.powf(f64::from(to) + 1.0) - m.powf(f64::from(from) + 1.0)) / (m - 1.0))
}

/// Highest warehouse level reachable from `from` under `budget`.
///
/// Same bracket contract as [`max_affordable_level`], over the warehouse
/// cost family.
pub fn max_affordable_warehouse_level(
    spec: &WarehouseSpec,
    from: u32,
    budget: f64,
) -> Result<u32, EconError> {
    check_curve(spec.base_cost, spec.cost_multiplier)?;
    check_budget(budget)?;
    if budget <= 0.0 || warehouse_cost(spec, from, from.saturating_add(1))? > budget {
        return Ok(from);
    }
    let m = spec.cost_multiplier;
    let reach = budget * (m - 1.0) / spec.base_cost + m.powf(f64::from(from) + 1.0);
    let mut level = ((reach.ln() / m.ln() - 1.0).floor() as u32).max(from);
    while level < u32::MAX && warehouse_cost(spec, from, level + 1)? <= budget {
        level += 1;
    }
    while level > from && warehouse_cost(spec, from, level)? > budget {
        level -= 1;
    }
    Ok(level)
}

/// Seats are sold three at a time: size `s` maps to upgrade level
/// `ceil(s / 3)`.
fn office_level(size: u32) -> u32 {
    size.div_ceil(3)
}

/// Cost of growing an office from `from_size` to `to_size` seats.
///
/// Sizes quantize to levels of three seats before the generic curve
/// applies, so partial steps are never billed.
pub fn office_upgrade_cost(
    spec: &UpgradeSpec,
    from_size: u32,
    to_size: u32,
) -> Result<f64, EconError> {
    upgrade_cost(spec, office_level(from_size), office_level(to_size))
}

/// Largest office size reachable from `from_size` under `budget`.
///
/// The result is always a multiple of three and never below the quantized
/// current size.
pub fn max_affordable_office_size(
    spec: &UpgradeSpec,
    from_size: u32,
    budget: f64,
) -> Result<u32, EconError> {
    let level = max_affordable_level(spec, office_level(from_size), budget)?;
    Ok(level.saturating_mul(3))
}

/// Output multiplier of a single office from its staffing production.
///
/// Operations and engineering carry diminishing-return exponents and
/// management scales the pair; the 0.05 balancing constant keeps raw
/// staffing numbers in a sane output range. Product assembly runs at half
/// the material rate. Returns zero when all three inputs are zero rather
/// than dividing by zero.
pub fn office_production_multiplier(
    operations: f64,
    engineer: f64,
    management: f64,
    is_product: bool,
) -> f64 {
    let total = operations + engineer + management;
    if total <= 0.0 {
        return 0.0;
    }
    let management_factor = management / (1.2 * total) + 1.0;
    let mut production = (operations.powf(0.4) + engineer.powf(0.3)) * management_factor * 0.05;
    if is_product {
        production *= 0.5;
    }
    production
}

/// Theoretical per-tick output ceiling for one office.
///
/// Combines the office multiplier, the division-wide boost multiplier,
/// smart-factory levels and unlocked research bonuses.
pub fn office_max_production(
    office_multiplier: f64,
    division_multiplier: f64,
    smart_factories_level: u32,
    smart_factories_benefit: f64,
    research: &ResearchBonuses,
    is_product: bool,
) -> f64 {
    let factories = 1.0 + f64::from(smart_factories_level) * smart_factories_benefit;
    office_multiplier * division_multiplier * factories * research.production_multiplier(is_product)
}

/// Space-limited throughput over one full production cycle.
///
/// A full cycle runs ten ticks of [`office_max_production`]. Producing a
/// unit consumes its inputs' warehouse space and occupies the output's;
/// only when that net delta is positive can the warehouse fill up, and
/// output is then capped at the units that still fit.
pub fn office_limited_production(
    max_production: f64,
    output_size: f64,
    inputs: &[MaterialInput],
    available_space: f64,
) -> f64 {
    let mut production = max_production * 10.0;
    let input_space: f64 = inputs.iter().map(|input| input.coefficient * input.size).sum();
    let net_delta = output_size - input_space;
    if net_delta > 0.0 {
        production = production.min(available_space / net_delta);
    }
    production.max(0.0)
}

/// Per-city production bonus from stocked boost materials.
///
/// `prod of (0.002 * amount + 1)^factor` over the four boost materials, in
/// the canonical hardware / AI cores / robots / real estate order.
pub fn boost_material_multiplier(factors: &IndustryFactors, amounts: &[f64; 4]) -> f64 {
    factors
        .as_array()
        .iter()
        .zip(amounts)
        .map(|(factor, amount)| (0.002 * amount + 1.0).powf(*factor))
        .product()
}

/// Division-level production multiplier across identically stocked cities.
///
/// Each city contributes its boost multiplier (floored at one) raised to
/// 0.73; with a uniform stocking plan that sum collapses to
/// `cities * max(city_mult, 1)^0.73`.
pub fn upgraded_production_multiplier(
    factors: &IndustryFactors,
    amounts: &[f64; 4],
    cities: usize,
) -> f64 {
    let city = boost_material_multiplier(factors, amounts);
    cities as f64 * city.max(1.0).powf(0.73)
}

/// Awareness growth constant applied per advertising campaign.
pub const AWARENESS_GROWTH: f64 = 1.005;

/// Expected value of the host's random popularity growth roll (uniform
/// over 1.005..=1.015). Using the expectation keeps planning deterministic.
pub const EXPECTED_POPULARITY_GROWTH: f64 = 1.01;

/// Market-facing advertising factor from awareness and popularity.
///
/// `((awareness+1)^e * (popularity+1)^e * ratio)^0.85`, where `ratio` is
/// popularity relative to awareness floored at 0.01, and pinned to 0.01
/// when awareness is zero.
pub fn advertising_factor(awareness: f64, popularity: f64, exponent: f64) -> f64 {
    let ratio = if awareness <= 0.0 {
        0.01
    } else {
        ((popularity + 0.001) / awareness).max(0.01)
    };
    let awareness_factor = (awareness + 1.0).powf(exponent);
    let popularity_factor = (popularity + 1.0).powf(exponent);
    (awareness_factor * popularity_factor * ratio).powf(0.85)
}

/// Awareness and popularity after buying one advertising campaign.
///
/// `advert_multiplier` is the Wilson Analytics multiplier in effect for
/// the purchase (one when the upgrade is absent). Campaign effects
/// compound, so projecting `n` campaigns means applying this `n` times.
pub fn apply_advert(awareness: f64, popularity: f64, advert_multiplier: f64) -> (f64, f64) {
    let awareness = (awareness + 3.0 * advert_multiplier) * (AWARENESS_GROWTH * advert_multiplier);
    let popularity =
        (popularity + advert_multiplier) * (EXPECTED_POPULARITY_GROWTH * advert_multiplier);
    (awareness, popularity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use corp_core::UpgradeCatalog;
    use proptest::prelude::*;

    fn advert_spec() -> UpgradeSpec {
        UpgradeSpec { base_price: 1e9, price_multiplier: 1.06 }
    }

    #[test]
    fn upgrade_cost_matches_naive_loop() {
        let spec = advert_spec();
        let mut naive = 0.0;
        for level in 0..5 {
            naive += spec.base_price * spec.price_multiplier.powi(level);
        }
        let closed = upgrade_cost(&spec, 0, 5).unwrap();
        assert!((closed - naive).abs() / naive < 1e-12);
    }

    #[test]
    fn upgrade_cost_zero_for_no_purchase() {
        let spec = advert_spec();
        assert_eq!(upgrade_cost(&spec, 4, 4).unwrap(), 0.0);
        assert_eq!(upgrade_cost(&spec, 7, 3).unwrap(), 0.0);
    }

    #[test]
    fn upgrade_cost_rejects_bad_curves() {
        let flat = UpgradeSpec { base_price: 1e9, price_multiplier: 1.0 };
        assert_eq!(upgrade_cost(&flat, 0, 1), Err(EconError::InvalidMultiplier(1.0)));
        let free = UpgradeSpec { base_price: 0.0, price_multiplier: 1.06 };
        assert_eq!(upgrade_cost(&free, 0, 1), Err(EconError::InvalidPrice));
        let nan = UpgradeSpec { base_price: f64::NAN, price_multiplier: 1.06 };
        assert_eq!(upgrade_cost(&nan, 0, 1), Err(EconError::NonFinite));
    }

    #[test]
    fn max_affordable_level_zero_budget_buys_nothing() {
        let spec = advert_spec();
        assert_eq!(max_affordable_level(&spec, 12, 0.0).unwrap(), 12);
        assert_eq!(max_affordable_level(&spec, 12, -5e9).unwrap(), 12);
    }

    #[test]
    fn max_affordable_level_rejects_nan_budget() {
        let spec = advert_spec();
        assert_eq!(max_affordable_level(&spec, 0, f64::NAN), Err(EconError::NonFinite));
        assert_eq!(max_affordable_level(&spec, 0, f64::INFINITY), Err(EconError::NonFinite));
    }

    #[test]
    fn warehouse_cost_matches_naive_loop() {
        let catalog = UpgradeCatalog::default();
        let spec = &catalog.warehouse;
        let mut naive = 0.0;
        for level in 2..9 {
            naive += spec.base_cost * spec.cost_multiplier.powi(level + 1);
        }
        let closed = warehouse_cost(spec, 2, 9).unwrap();
        assert!((closed - naive).abs() / naive < 1e-12);
    }

    #[test]
    fn warehouse_family_costs_more_than_generic() {
        // The off-by-one exponent makes each step one multiplier dearer.
        let catalog = UpgradeCatalog::default();
        let warehouse = &catalog.warehouse;
        let generic = UpgradeSpec {
            base_price: warehouse.base_cost,
            price_multiplier: warehouse.cost_multiplier,
        };
        let wh = warehouse_cost(warehouse, 3, 6).unwrap();
        let plain = upgrade_cost(&generic, 3, 6).unwrap();
        assert!((wh - plain * warehouse.cost_multiplier).abs() / wh < 1e-12);
    }

    #[test]
    fn office_sizes_quantize_to_three_seats() {
        let catalog = UpgradeCatalog::default();
        let office = &catalog.office;
        let by_size = office_upgrade_cost(office, 9, 15).unwrap();
        let by_level = upgrade_cost(office, 3, 5).unwrap();
        assert_eq!(by_size, by_level);
        // Partial seats round up to the next level before pricing.
        assert_eq!(
            office_upgrade_cost(office, 7, 15).unwrap(),
            upgrade_cost(office, 3, 5).unwrap()
        );
    }

    #[test]
    fn max_affordable_office_size_is_a_multiple_of_three() {
        let catalog = UpgradeCatalog::default();
        let size = max_affordable_office_size(&catalog.office, 9, 5e10).unwrap();
        assert_eq!(size % 3, 0);
        assert!(size >= 9);
    }

    #[test]
    fn office_multiplier_zero_when_unstaffed() {
        assert_eq!(office_production_multiplier(0.0, 0.0, 0.0, false), 0.0);
    }

    #[test]
    fn office_multiplier_halved_for_products() {
        let materials = office_production_multiplier(30.0, 25.0, 20.0, false);
        let products = office_production_multiplier(30.0, 25.0, 20.0, true);
        assert!(materials > 0.0);
        assert!((products - materials * 0.5).abs() < 1e-12);
    }

    #[test]
    fn limited_production_caps_on_space() {
        let inputs = [
            MaterialInput { name: "Water".into(), coefficient: 0.5, size: 0.05 },
            MaterialInput { name: "Chemicals".into(), coefficient: 0.2, size: 0.05 },
        ];
        // Net delta: 0.1 - 0.035 = 0.065 space per unit.
        let unconstrained = office_limited_production(40.0, 0.1, &inputs, 1e9);
        assert_eq!(unconstrained, 400.0);
        let capped = office_limited_production(40.0, 0.1, &inputs, 13.0);
        assert!((capped - 13.0 / 0.065).abs() < 1e-9);
        assert_eq!(office_limited_production(40.0, 0.1, &inputs, -5.0), 0.0);
    }

    #[test]
    fn limited_production_unbounded_when_inputs_outweigh_output() {
        let inputs = [MaterialInput { name: "Ore".into(), coefficient: 4.0, size: 0.1 }];
        // Producing frees more space than it takes; space never binds.
        let production = office_limited_production(40.0, 0.1, &inputs, 0.0);
        assert_eq!(production, 400.0);
    }

    #[test]
    fn boost_multiplier_is_one_with_empty_warehouse() {
        let factors =
            IndustryFactors { hardware: 0.2, ai_cores: 0.3, robots: 0.3, real_estate: 0.72 };
        assert_eq!(boost_material_multiplier(&factors, &[0.0; 4]), 1.0);
        assert_eq!(upgraded_production_multiplier(&factors, &[0.0; 4], 6), 6.0);
    }

    #[test]
    fn advertising_factor_pins_ratio_without_awareness() {
        let exponent = 0.04;
        let cold = advertising_factor(0.0, 50.0, exponent);
        let expected = (1.0f64.powf(exponent) * 51.0f64.powf(exponent) * 0.01).powf(0.85);
        assert!((cold - expected).abs() < 1e-12);
    }

    #[test]
    fn apply_advert_compounds() {
        let wilson = 1.0 + 2.0 * 0.005;
        let (aw1, pop1) = apply_advert(100.0, 40.0, wilson);
        assert!((aw1 - (100.0 + 3.0 * wilson) * (1.005 * wilson)).abs() < 1e-9);
        assert!((pop1 - (40.0 + wilson) * (1.01 * wilson)).abs() < 1e-9);
        let (aw2, pop2) = apply_advert(aw1, pop1, wilson);
        assert!(aw2 > aw1);
        assert!(pop2 > pop1);
    }

    proptest! {
        #[test]
        fn upgrade_cost_monotonic_in_target_level(
            base in 1e3f64..1e12,
            mult in 1.01f64..3.0,
            from in 0u32..200,
            span in 1u32..200,
        ) {
            let spec = UpgradeSpec { base_price: base, price_multiplier: mult };
            let near = upgrade_cost(&spec, from, from + span).unwrap();
            let far = upgrade_cost(&spec, from, from + span + 1).unwrap();
            prop_assert!(far > near);
        }

        #[test]
        fn max_affordable_level_brackets_budget(
            base in 1e3f64..1e9,
            mult in 1.02f64..2.0,
            from in 0u32..100,
            budget in 0.0f64..1e15,
        ) {
            let spec = UpgradeSpec { base_price: base, price_multiplier: mult };
            let level = max_affordable_level(&spec, from, budget).unwrap();
            prop_assert!(level >= from);
            prop_assert!(upgrade_cost(&spec, from, level).unwrap() <= budget);
            prop_assert!(upgrade_cost(&spec, from, level + 1).unwrap() > budget);
        }

        #[test]
        fn max_affordable_warehouse_level_brackets_budget(
            base in 1e3f64..1e9,
            mult in 1.02f64..2.0,
            from in 0u32..100,
            budget in 0.0f64..1e15,
        ) {
            let spec = WarehouseSpec {
                base_cost: base,
                cost_multiplier: mult,
                size_per_level: 100.0,
            };
            let level = max_affordable_warehouse_level(&spec, from, budget).unwrap();
            prop_assert!(level >= from);
            prop_assert!(warehouse_cost(&spec, from, level).unwrap() <= budget);
            prop_assert!(warehouse_cost(&spec, from, level + 1).unwrap() > budget);
        }

        #[test]
        fn boost_multiplier_never_below_one(
            hw in 0.0f64..1e6,
            ai in 0.0f64..1e6,
            rb in 0.0f64..1e6,
            re in 0.0f64..1e6,
        ) {
            let factors = IndustryFactors {
                hardware: 0.2, ai_cores: 0.3, robots: 0.3, real_estate: 0.72,
            };
            let mult = boost_material_multiplier(&factors, &[hw, ai, rb, re]);
            prop_assert!(mult >= 1.0);
            prop_assert!(mult.is_finite());
        }
    }
}
