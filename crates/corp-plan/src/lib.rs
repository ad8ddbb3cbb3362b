#![deny(warnings)]

//! Planning layer for corp-pilot: given host snapshots and the upgrade
//! catalog, decide what to buy and what to charge.
//!
//! Three planners live here:
//! - the boost-material allocator (closed-form space split),
//! - the capital grid search (storage x warehouse x factories, plus the
//!   advertising variant),
//! - the pricing solver (hidden-stat recovery and market-clearing prices).
//!
//! Planners are pure: they read snapshots, never the host. Applying the
//! returned plans is the driver's job, which also means a stale plan can
//! simply be recomputed from fresher snapshots.

use corp_core::{
    CorporationSnapshot, DivisionSnapshot, IndustryFactors, IndustrySpec, MaterialSizes,
    MaterialSnapshot, OfficeSnapshot, OptimalAdvertPlan, OptimalCapitalPlan, ProductSnapshot,
    UpgradeCatalog,
};
use corp_econ::{
    advert_cost, advertising_factor, apply_advert, max_affordable_advert_level,
    max_affordable_level, max_affordable_warehouse_level, upgrade_cost,
    upgraded_production_multiplier, warehouse_cost, EconError,
};
use thiserror::Error;
use tracing::{debug, trace};

/// Errors from the capital planners.
#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    /// The boost-material share of warehouse space must lie in [0, 1].
    #[error("materials ratio {0} must lie within [0, 1]")]
    InvalidRatio(f64),
    /// A cost-curve violation reported by the economic model.
    #[error(transparent)]
    Econ(#[from] EconError),
}

/// Errors from the product pricing solver.
#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    /// The hidden per-job stat contributions could not be recovered.
    #[error("unable to determine hidden product stats: {0}")]
    HiddenStats(#[from] lsq::SolveError),
    /// The recovered staffing sums to a non-positive production total,
    /// which has no meaningful job ratios.
    #[error("solved staffing production {0} is not positive")]
    NonPhysicalStats(f64),
}

/// How many levels above the current one each planner axis will consider.
///
/// This is a performance cap, not a domain rule: at sane budgets the
/// affordability bound binds long before the span does, and a budget large
/// enough to hit it can buy the remaining levels on the next cycle.
pub const SEARCH_SPAN: u32 = 1000;

/// Optimal boost-material stocking for `storage_size` units of warehouse
/// space.
///
/// The division production multiplier rewards each material `i` with
/// `(0.002 * x_i + 1)^f_i` per unit stored, so space is best spent where
/// marginal gain per unit of space is equal across materials. That
/// condition has the closed form
///
/// `x_i = f_i * (W + 500 * sum(s_j)) / (s_i * sum(f_j)) - 500`
///
/// over the materials still in play. A negative component means the
/// material is not worth its footprint at this warehouse size; it is
/// pinned to zero and the remainder re-solved, which terminates because
/// the active set strictly shrinks. Materials with a zero factor or a
/// non-positive footprint never participate, and an all-zero factor set
/// yields an all-zero mix.
///
/// `integer_result` rounds the final mix to whole units; the rounded mix
/// may overshoot `storage_size` by at most half a unit of each active
/// material.
pub fn optimal_material_mix(
    factors: &IndustryFactors,
    sizes: &MaterialSizes,
    storage_size: f64,
    integer_result: bool,
) -> [f64; 4] {
    let factor = factors.as_array();
    let size = sizes.as_array();
    let storage = storage_size.max(0.0);
    let mut active = [false; 4];
    for index in 0..4 {
        active[index] = factor[index] > 0.0 && size[index] > 0.0;
    }
    let mut mix = [0.0f64; 4];
    loop {
        let factor_sum: f64 = (0..4).filter(|&i| active[i]).map(|i| factor[i]).sum();
        if factor_sum <= 0.0 {
            return [0.0; 4];
        }
        let size_sum: f64 = (0..4).filter(|&i| active[i]).map(|i| size[i]).sum();
        let budgeted_space = storage + 500.0 * size_sum;
        let mut dropped = false;
        for index in 0..4 {
            if !active[index] {
                mix[index] = 0.0;
                continue;
            }
            let amount = factor[index] * budgeted_space / (size[index] * factor_sum) - 500.0;
            if amount < 0.0 {
                active[index] = false;
                dropped = true;
            }
            mix[index] = amount.max(0.0);
        }
        if !dropped {
            break;
        }
    }
    if integer_result {
        for amount in &mut mix {
            *amount = amount.round();
        }
    }
    mix
}

/// Best joint spend of `budget` on smart storage, warehouse levels and
/// smart factories for one division.
///
/// Grid search over (storage level, warehouse level) pairs from the
/// division's current levels up to what the budget affords, capped at
/// [`SEARCH_SPAN`] levels below the affordability maximum per axis. For
/// each pair the leftover budget goes to smart factories, and the
/// candidate is scored by the projected division production multiplier.
/// Costs grow monotonically along both axes, so each loop breaks at the
/// first unaffordable candidate. Ties in production go to the cheaper
/// plan, which makes a zero budget resolve to a no-op plan of cost zero.
///
/// Returns `Ok(None)` only for a negative budget, where even the no-op
/// plan is infeasible.
pub fn optimal_factory_and_storage(
    division: &DivisionSnapshot,
    industry: &IndustrySpec,
    catalog: &UpgradeCatalog,
    budget: f64,
    materials_ratio: f64,
) -> Result<Option<OptimalCapitalPlan>, PlanError> {
    if !(0.0..=1.0).contains(&materials_ratio) {
        return Err(PlanError::InvalidRatio(materials_ratio));
    }
    if budget < 0.0 {
        return Ok(None);
    }
    let storage_spec = &catalog.smart_storage.spec;
    let max_storage = max_affordable_level(storage_spec, division.smart_storage_level, budget)?;
    let max_warehouse =
        max_affordable_warehouse_level(&catalog.warehouse, division.warehouse_level, budget)?;
    let storage_floor = division
        .smart_storage_level
        .max(max_storage.saturating_sub(SEARCH_SPAN));
    let warehouse_floor = division
        .warehouse_level
        .max(max_warehouse.saturating_sub(SEARCH_SPAN));
    let cities = division.cities.len();

    let mut best: Option<OptimalCapitalPlan> = None;
    for storage_level in storage_floor..=max_storage {
        let storage_cost =
            upgrade_cost(storage_spec, division.smart_storage_level, storage_level)?;
        if storage_cost > budget {
            break;
        }
        for warehouse_level in warehouse_floor..=max_warehouse {
            let base_cost = storage_cost
                + warehouse_cost(&catalog.warehouse, division.warehouse_level, warehouse_level)?;
            if base_cost > budget {
                break;
            }
            let warehouse_size = f64::from(warehouse_level)
                * catalog.warehouse.size_per_level
                * (1.0 + f64::from(storage_level) * catalog.smart_storage.benefit);
            let mix = optimal_material_mix(
                &industry.factors,
                &industry.material_sizes,
                warehouse_size * materials_ratio,
                false,
            );
            let boosted = upgraded_production_multiplier(&industry.factors, &mix, cities);
            let factories_level = max_affordable_level(
                &catalog.smart_factories.spec,
                division.smart_factories_level,
                budget - base_cost,
            )?;
            let cost = base_cost
                + upgrade_cost(
                    &catalog.smart_factories.spec,
                    division.smart_factories_level,
                    factories_level,
                )?;
            let production =
                boosted * (1.0 + f64::from(factories_level) * catalog.smart_factories.benefit);
            let better = match &best {
                None => true,
                Some(plan) => {
                    production > plan.production
                        || (production == plan.production && cost < plan.cost)
                }
            };
            if better {
                trace!(
                    storage_level,
                    warehouse_level,
                    factories_level,
                    production,
                    cost,
                    "capital candidate improved"
                );
                best = Some(OptimalCapitalPlan {
                    production,
                    cost,
                    warehouse_size,
                    smart_storage_level: storage_level,
                    warehouse_level,
                    smart_factories_level: factories_level,
                });
            }
        }
    }
    if let Some(plan) = &best {
        debug!(
            division = %division.name,
            storage = plan.smart_storage_level,
            warehouse = plan.warehouse_level,
            factories = plan.smart_factories_level,
            cost = plan.cost,
            "capital plan selected"
        );
    }
    Ok(best)
}

/// Best joint spend of `budget` on Wilson Analytics and advertising
/// campaigns for one division.
///
/// Campaign effects compound, so for every Wilson level the awareness and
/// popularity recurrence is replayed from the division's current values,
/// one application per additional campaign, and each stop is scored by
/// the projected advertising factor. Both axes are capped at
/// [`SEARCH_SPAN`] purchases above the current level to bound the replay.
/// Ties go to the cheaper plan; `Ok(None)` only for a negative budget.
pub fn optimal_advert(
    division: &DivisionSnapshot,
    industry: &IndustrySpec,
    catalog: &UpgradeCatalog,
    budget: f64,
) -> Result<Option<OptimalAdvertPlan>, PlanError> {
    if budget < 0.0 {
        return Ok(None);
    }
    let wilson = &catalog.wilson_analytics;
    let max_wilson = max_affordable_level(&wilson.spec, division.wilson_level, budget)?
        .min(division.wilson_level.saturating_add(SEARCH_SPAN));
    let max_advert = max_affordable_advert_level(&catalog.advert, division.advert_level, budget)?
        .min(division.advert_level.saturating_add(SEARCH_SPAN));

    let mut best: Option<OptimalAdvertPlan> = None;
    for wilson_level in division.wilson_level..=max_wilson {
        let wilson_cost = upgrade_cost(&wilson.spec, division.wilson_level, wilson_level)?;
        if wilson_cost > budget {
            break;
        }
        let advert_multiplier = 1.0 + f64::from(wilson_level) * wilson.benefit;
        let mut awareness = division.awareness;
        let mut popularity = division.popularity;
        for advert_level in division.advert_level..=max_advert {
            let cost =
                wilson_cost + advert_cost(&catalog.advert, division.advert_level, advert_level)?;
            if cost > budget {
                break;
            }
            if advert_level > division.advert_level {
                (awareness, popularity) = apply_advert(awareness, popularity, advert_multiplier);
            }
            let factor = advertising_factor(awareness, popularity, industry.advertising_exponent);
            let better = match &best {
                None => true,
                Some(plan) => {
                    factor > plan.advertising_factor
                        || (factor == plan.advertising_factor && cost < plan.cost)
                }
            };
            if better {
                best = Some(OptimalAdvertPlan {
                    wilson_level,
                    advert_level,
                    advertising_factor: factor,
                    cost,
                });
            }
        }
    }
    if let Some(plan) = &best {
        debug!(
            division = %division.name,
            wilson = plan.wilson_level,
            adverts = plan.advert_level,
            factor = plan.advertising_factor,
            cost = plan.cost,
            "advert plan selected"
        );
    }
    Ok(best)
}

/// Per-job weights of the five visible product stats. Rows in quality,
/// performance, durability, reliability, aesthetics order; columns in
/// operations, engineer, business, management, research order.
const PRODUCT_STAT_WEIGHTS: [[f64; 5]; 5] = [
    [0.02, 0.10, 0.02, 0.05, 0.05],
    [0.02, 0.15, 0.02, 0.02, 0.02],
    [0.05, 0.05, 0.05, 0.02, 0.08],
    [0.05, 0.02, 0.08, 0.08, 0.02],
    [0.02, 0.00, 0.10, 0.08, 0.05],
];

/// Weights of the job-balance multiplier over per-job production ratios.
const JOB_BALANCE_WEIGHTS: [f64; 5] = [1.5, 1.2, 1.0, 0.9, 1.3];

/// Scalar bonus every stat shares: design investment times the division's
/// research output.
fn product_factor(design_investment: f64, research_points: f64, science_exponent: f64) -> f64 {
    let design = 1.0 + design_investment.powf(0.1) / 100.0;
    let science = 1.0 + research_points.powf(science_exponent) / 800.0;
    design * science
}

/// Forward stat model: the five visible stats a product would show if it
/// was created by per-job production `staffing`.
fn predicted_stats(staffing: &[f64], factor: f64) -> [f64; 5] {
    let total: f64 = staffing.iter().sum();
    let safe_total = total.max(1e-9);
    let balance: f64 = JOB_BALANCE_WEIGHTS
        .iter()
        .zip(staffing)
        .map(|(weight, value)| weight * value / safe_total)
        .sum();
    let mult = balance * factor;
    let mut stats = [0.0f64; 5];
    for (stat, row) in stats.iter_mut().zip(&PRODUCT_STAT_WEIGHTS) {
        let linear: f64 = row.iter().zip(staffing).map(|(weight, value)| weight * value).sum();
        *stat = mult * linear;
    }
    stats
}

/// Recover a product's markup from its visible stats.
///
/// The host never exposes the per-job production the product was created
/// with, but the five visible stats are a known function of it (see
/// [`PRODUCT_STAT_WEIGHTS`]): five equations, five unknowns. The system is
/// solved numerically, seeded with the office's current per-job
/// production, and the markup follows from the recovered business and
/// management share:
///
/// `markup = 100 / (adv_mult * (quality + 0.001)^0.65 * sales_ratio)`
///
/// with `adv_mult = 1 + advertising_investment^0.1 / 100` and
/// `sales_ratio = max((r_bus + r_mgmt), 1 / total)`.
///
/// Inputs are assumed validated (`corp_core::validate_product`): negative
/// investments or stats produce NaN models and surface as
/// [`PricingError::HiddenStats`].
pub fn optimal_product_markup(
    division: &DivisionSnapshot,
    industry: &IndustrySpec,
    office: &OfficeSnapshot,
    product: &ProductSnapshot,
) -> Result<f64, PricingError> {
    let observed = [
        product.quality,
        product.performance,
        product.durability,
        product.reliability,
        product.aesthetics,
    ];
    let factor = product_factor(
        product.design_investment,
        division.research_points,
        industry.science_exponent,
    );
    // Stats scale with investment; the convergence target has to as well.
    let observed_norm = observed.iter().map(|stat| stat * stat).sum::<f64>().sqrt();
    let options = lsq::Options {
        tolerance: 1e-8 * (1.0 + observed_norm),
        ..lsq::Options::default()
    };
    let solution = lsq::solve(
        |staffing, residuals| {
            let predicted = predicted_stats(staffing, factor);
            for (residual, (predicted, observed)) in
                residuals.iter_mut().zip(predicted.iter().zip(&observed))
            {
                *residual = predicted - observed;
            }
        },
        &office.production.as_array(),
        5,
        &options,
    )?;
    let staffing = solution.values;
    let total: f64 = staffing.iter().sum();
    if total <= 0.0 {
        return Err(PricingError::NonPhysicalStats(total));
    }
    let sales_ratio = ((staffing[2] + staffing[3]) / total).max(1.0 / total);
    let advert_mult = 1.0 + product.advertising_investment.powf(0.1) / 100.0;
    let markup = 100.0 / (advert_mult * (product.quality + 0.001).powf(0.65) * sales_ratio);
    debug!(
        total,
        sales_ratio,
        markup,
        iterations = solution.iterations,
        "product markup solved"
    );
    Ok(markup)
}

/// One sellable item in one city.
#[derive(Clone, Copy, Debug)]
pub enum SaleItem<'a> {
    /// A raw material; quality and base markup are host-visible.
    Material(&'a MaterialSnapshot),
    /// A finished product plus its recovered markup, when known.
    Product {
        product: &'a ProductSnapshot,
        markup: Option<f64>,
    },
}

/// Market-clearing sell price for one item, or `None` when no meaningful
/// price exists.
///
/// `None` covers three cases the caller handles by falling back to the
/// host's market price: demand/competition research not yet unlocked,
/// negligible stock (under a hundred-thousandth of a unit per tick), and
/// a product whose markup has not been recovered. Otherwise the price is
/// the highest one at which the projected sales volume still clears the
/// warehouse:
///
/// `market_price + markup_limit / sqrt(expected_volume / sales_multiplier)`
///
/// where `expected_volume` is a tenth of the stored amount and
/// `sales_multiplier` folds together item appeal, the office's business
/// output, the division's advertising factor, the demand/competition
/// market factor and the sales-bot bonus.
pub fn optimal_selling_price(
    division: &DivisionSnapshot,
    industry: &IndustrySpec,
    office: &OfficeSnapshot,
    corp: &CorporationSnapshot,
    catalog: &UpgradeCatalog,
    item: SaleItem<'_>,
) -> Option<f64> {
    if !corp.market.pricing_unlocked() {
        return None;
    }
    let (stored, market_price, markup_limit, item_factor, demand, competition) = match item {
        SaleItem::Material(material) => (
            material.stored,
            material.market_price,
            material.quality / material.base_markup,
            material.quality + 0.001,
            material.demand,
            material.competition,
        ),
        SaleItem::Product { product, markup } => (
            product.stored,
            product.market_price,
            product.effective_rating / markup?,
            0.5 * product.effective_rating.powf(0.65),
            product.demand,
            product.competition,
        ),
    };
    let expected_volume = stored / 10.0;
    if expected_volume < 1e-5 {
        return None;
    }
    let business = office.production.business;
    let business_factor = (business + 1.0).powf(0.26) + (business + 1.0) / 10_000.0;
    let advert_factor = advertising_factor(
        division.awareness,
        division.popularity,
        industry.advertising_exponent,
    );
    let market_factor = (demand * (100.0 - competition) / 100.0).max(0.1);
    let bots_bonus = 1.0 + f64::from(corp.sales_bots_level) * catalog.sales_bots.benefit;
    let sales_multiplier =
        item_factor * business_factor * advert_factor * market_factor * bots_bonus;
    Some(markup_limit / (expected_volume / sales_multiplier).sqrt() + market_price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use corp_core::{JobProduction, MarketInfo, ResearchBonuses};
    use proptest::prelude::*;

    fn catalog() -> UpgradeCatalog {
        UpgradeCatalog::default()
    }

    fn division() -> DivisionSnapshot {
        DivisionSnapshot {
            name: "AgroCore".into(),
            cities: vec!["Oslo".into(), "Kyoto".into()],
            smart_storage_level: 2,
            warehouse_level: 3,
            smart_factories_level: 1,
            wilson_level: 0,
            advert_level: 4,
            awareness: 120.0,
            popularity: 40.0,
            research_points: 800.0,
            research: ResearchBonuses::default(),
        }
    }

    fn industry() -> IndustrySpec {
        IndustrySpec {
            factors: IndustryFactors {
                hardware: 0.2,
                ai_cores: 0.3,
                robots: 0.3,
                real_estate: 0.72,
            },
            material_sizes: MaterialSizes::default(),
            advertising_exponent: 0.04,
            science_exponent: 0.5,
            is_product: false,
            output_size: 0.05,
            inputs: vec![corp_core::MaterialInput {
                name: "Water".into(),
                coefficient: 0.5,
                size: 0.05,
            }],
        }
    }

    fn office() -> OfficeSnapshot {
        OfficeSnapshot {
            size: 9,
            production: JobProduction {
                operations: 32.5,
                engineer: 28.0,
                business: 12.4,
                management: 25.1,
                research: 18.7,
            },
        }
    }

    fn corp() -> CorporationSnapshot {
        CorporationSnapshot {
            funds: 1e12,
            market: MarketInfo {
                demand_research: true,
                competition_research: true,
            },
            sales_bots_level: 3,
        }
    }

    fn water() -> MaterialSnapshot {
        MaterialSnapshot {
            stored: 800.0,
            quality: 42.0,
            demand: 65.0,
            competition: 32.0,
            market_price: 110.0,
            base_markup: 2.0,
        }
    }

    #[test]
    fn material_mix_matches_closed_form() {
        let factors = IndustryFactors {
            hardware: 0.15,
            ai_cores: 0.15,
            robots: 0.2,
            real_estate: 0.5,
        };
        let sizes = MaterialSizes {
            hardware: 0.1,
            ai_cores: 0.1,
            robots: 0.5,
            real_estate: 0.005,
        };
        let mix = optimal_material_mix(&factors, &sizes, 10_000.0, false);
        let expected = [15_028.75, 15_028.75, 3_641.0, 1_034_750.0];
        for (got, want) in mix.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "{got} vs {want}");
        }
        let space: f64 = mix
            .iter()
            .zip(sizes.as_array())
            .map(|(amount, size)| amount * size)
            .sum();
        assert!((space - 10_000.0).abs() < 1e-6);
    }

    #[test]
    fn material_mix_rounds_to_whole_units() {
        let factors = IndustryFactors {
            hardware: 0.15,
            ai_cores: 0.15,
            robots: 0.2,
            real_estate: 0.5,
        };
        let sizes = MaterialSizes {
            hardware: 0.1,
            ai_cores: 0.1,
            robots: 0.5,
            real_estate: 0.005,
        };
        let mix = optimal_material_mix(&factors, &sizes, 10_000.0, true);
        assert_eq!(mix, [15_029.0, 15_029.0, 3_641.0, 1_034_750.0]);
    }

    #[test]
    fn material_mix_skips_zero_factor_materials() {
        let factors = IndustryFactors {
            hardware: 0.0,
            ai_cores: 0.3,
            robots: 0.3,
            real_estate: 0.72,
        };
        let mix = optimal_material_mix(&factors, &MaterialSizes::default(), 5_000.0, false);
        assert_eq!(mix[0], 0.0);
        assert!(mix[1] > 0.0);
        assert!(mix[2] > 0.0);
        assert!(mix[3] > 0.0);
    }

    #[test]
    fn material_mix_degenerates_on_all_zero_factors() {
        let factors = IndustryFactors {
            hardware: 0.0,
            ai_cores: 0.0,
            robots: 0.0,
            real_estate: 0.0,
        };
        let mix = optimal_material_mix(&factors, &MaterialSizes::default(), 5_000.0, false);
        assert_eq!(mix, [0.0; 4]);
    }

    #[test]
    fn material_mix_drops_unprofitable_materials() {
        // At ten units of space, hardware and robots are not worth their
        // footprint and must be pinned to zero, not traded negative.
        let factors = IndustryFactors {
            hardware: 0.001,
            ai_cores: 0.9,
            robots: 0.05,
            real_estate: 0.049,
        };
        let sizes = MaterialSizes::default();
        let mix = optimal_material_mix(&factors, &sizes, 10.0, false);
        assert_eq!(mix[0], 0.0);
        assert_eq!(mix[2], 0.0);
        assert!(mix[1] > 0.0);
        assert!(mix[3] > 0.0);
        let space: f64 = mix
            .iter()
            .zip(sizes.as_array())
            .map(|(amount, size)| amount * size)
            .sum();
        assert!((space - 10.0).abs() < 1e-9);
    }

    #[test]
    fn capital_plan_rejects_bad_ratio() {
        let err = optimal_factory_and_storage(&division(), &industry(), &catalog(), 1e9, 1.5);
        assert_eq!(err, Err(PlanError::InvalidRatio(1.5)));
        let err = optimal_factory_and_storage(&division(), &industry(), &catalog(), 1e9, -0.1);
        assert_eq!(err, Err(PlanError::InvalidRatio(-0.1)));
        let err =
            optimal_factory_and_storage(&division(), &industry(), &catalog(), 1e9, f64::NAN);
        assert!(matches!(err, Err(PlanError::InvalidRatio(ratio)) if ratio.is_nan()));
    }

    #[test]
    fn capital_plan_zero_budget_is_a_noop() {
        let plan = optimal_factory_and_storage(&division(), &industry(), &catalog(), 0.0, 0.8)
            .unwrap()
            .unwrap();
        assert_eq!(plan.cost, 0.0);
        assert_eq!(plan.smart_storage_level, 2);
        assert_eq!(plan.warehouse_level, 3);
        assert_eq!(plan.smart_factories_level, 1);
        // Current installation: 3 levels x 100 units x (1 + 2 * 10%).
        assert!((plan.warehouse_size - 360.0).abs() < 1e-9);
    }

    #[test]
    fn capital_plan_infeasible_below_zero() {
        let plan = optimal_factory_and_storage(&division(), &industry(), &catalog(), -1.0, 0.8)
            .unwrap();
        assert_eq!(plan, None);
    }

    #[test]
    fn capital_plan_spends_toward_more_production() {
        let noop = optimal_factory_and_storage(&division(), &industry(), &catalog(), 0.0, 0.8)
            .unwrap()
            .unwrap();
        let modest = optimal_factory_and_storage(&division(), &industry(), &catalog(), 5e10, 0.8)
            .unwrap()
            .unwrap();
        let rich = optimal_factory_and_storage(&division(), &industry(), &catalog(), 5e11, 0.8)
            .unwrap()
            .unwrap();
        assert!(modest.production > noop.production);
        assert!(rich.production > modest.production);
        assert!(modest.cost <= 5e10);
        assert!(rich.cost <= 5e11);
        // The reported warehouse size must match the chosen levels.
        let expected_size = f64::from(rich.warehouse_level)
            * 100.0
            * (1.0 + f64::from(rich.smart_storage_level) * 0.1);
        assert!((rich.warehouse_size - expected_size).abs() < 1e-9);
    }

    #[test]
    fn advert_plan_zero_budget_keeps_current_reach() {
        let division = division();
        let industry = industry();
        let plan = optimal_advert(&division, &industry, &catalog(), 0.0)
            .unwrap()
            .unwrap();
        assert_eq!(plan.cost, 0.0);
        assert_eq!(plan.wilson_level, 0);
        assert_eq!(plan.advert_level, 4);
        let current = advertising_factor(
            division.awareness,
            division.popularity,
            industry.advertising_exponent,
        );
        assert!((plan.advertising_factor - current).abs() < 1e-12);
    }

    #[test]
    fn advert_plan_infeasible_below_zero() {
        let plan = optimal_advert(&division(), &industry(), &catalog(), -1.0).unwrap();
        assert_eq!(plan, None);
    }

    #[test]
    fn advert_plan_buys_reach_under_budget() {
        let division = division();
        let industry = industry();
        let plan = optimal_advert(&division, &industry, &catalog(), 5e10)
            .unwrap()
            .unwrap();
        assert!(plan.cost <= 5e10);
        assert!(plan.advert_level > division.advert_level);
        let current = advertising_factor(
            division.awareness,
            division.popularity,
            industry.advertising_exponent,
        );
        assert!(plan.advertising_factor > current);
    }

    #[test]
    fn markup_roundtrip_recovers_hidden_staffing() {
        let mut division = division();
        division.research_points = 1200.0;
        let mut industry = industry();
        industry.is_product = true;
        industry.science_exponent = 0.75;
        // Forward-evaluate a known staffing vector, then ask the solver to
        // recover it from the stats alone.
        let hidden = [40.0, 60.0, 25.0, 35.0, 30.0];
        let factor = product_factor(1e9, division.research_points, industry.science_exponent);
        let stats = predicted_stats(&hidden, factor);
        let product = ProductSnapshot {
            stored: 600.0,
            quality: stats[0],
            performance: stats[1],
            durability: stats[2],
            reliability: stats[3],
            aesthetics: stats[4],
            effective_rating: 15.2,
            production_cost: 120.0,
            design_investment: 1e9,
            advertising_investment: 5e8,
            demand: 72.0,
            competition: 38.0,
            market_price: 2400.0,
        };
        let seed_office = OfficeSnapshot {
            size: 63,
            production: JobProduction {
                operations: 50.0,
                engineer: 50.0,
                business: 30.0,
                management: 30.0,
                research: 25.0,
            },
        };
        let markup =
            optimal_product_markup(&division, &industry, &seed_office, &product).unwrap();
        let total: f64 = hidden.iter().sum();
        let sales_ratio = ((hidden[2] + hidden[3]) / total).max(1.0 / total);
        let advert_mult = 1.0 + product.advertising_investment.powf(0.1) / 100.0;
        let expected = 100.0 / (advert_mult * (stats[0] + 0.001).powf(0.65) * sales_ratio);
        assert!(
            (markup - expected).abs() / expected < 1e-4,
            "markup {markup} vs expected {expected}"
        );
    }

    #[test]
    fn selling_price_requires_market_research() {
        let mut corp = corp();
        corp.market.competition_research = false;
        let price = optimal_selling_price(
            &division(),
            &industry(),
            &office(),
            &corp,
            &catalog(),
            SaleItem::Material(&water()),
        );
        assert_eq!(price, None);
    }

    #[test]
    fn selling_price_requires_meaningful_stock() {
        let mut material = water();
        material.stored = 1e-5;
        let price = optimal_selling_price(
            &division(),
            &industry(),
            &office(),
            &corp(),
            &catalog(),
            SaleItem::Material(&material),
        );
        assert_eq!(price, None);
    }

    #[test]
    fn selling_price_requires_recovered_markup_for_products() {
        let product = ProductSnapshot {
            stored: 500.0,
            quality: 18.0,
            performance: 20.0,
            durability: 15.0,
            reliability: 14.0,
            aesthetics: 12.0,
            effective_rating: 16.0,
            production_cost: 120.0,
            design_investment: 1e9,
            advertising_investment: 5e8,
            demand: 72.0,
            competition: 38.0,
            market_price: 2400.0,
        };
        let unsolved = optimal_selling_price(
            &division(),
            &industry(),
            &office(),
            &corp(),
            &catalog(),
            SaleItem::Product {
                product: &product,
                markup: None,
            },
        );
        assert_eq!(unsolved, None);
        let solved = optimal_selling_price(
            &division(),
            &industry(),
            &office(),
            &corp(),
            &catalog(),
            SaleItem::Product {
                product: &product,
                markup: Some(46.0),
            },
        );
        let price = solved.unwrap();
        assert!(price > product.market_price);
    }

    #[test]
    fn selling_price_softens_as_stock_grows() {
        let mut scarce = water();
        scarce.stored = 50.0;
        let mut flooded = water();
        flooded.stored = 5_000.0;
        let high = optimal_selling_price(
            &division(),
            &industry(),
            &office(),
            &corp(),
            &catalog(),
            SaleItem::Material(&scarce),
        )
        .unwrap();
        let low = optimal_selling_price(
            &division(),
            &industry(),
            &office(),
            &corp(),
            &catalog(),
            SaleItem::Material(&flooded),
        )
        .unwrap();
        assert!(high > low);
        assert!(low > water().market_price);
    }

    proptest! {
        #[test]
        fn material_mix_components_never_negative(
            hw in 0.0f64..10.0,
            ai in 0.0f64..10.0,
            rb in 0.0f64..10.0,
            re in 0.0f64..10.0,
            storage in 0.0f64..1e6,
        ) {
            let factors = IndustryFactors {
                hardware: hw, ai_cores: ai, robots: rb, real_estate: re,
            };
            let sizes = MaterialSizes::default();
            let mix = optimal_material_mix(&factors, &sizes, storage, false);
            let mut space = 0.0;
            for (amount, size) in mix.iter().zip(sizes.as_array()) {
                prop_assert!(amount.is_finite());
                prop_assert!(*amount >= 0.0);
                space += amount * size;
            }
            prop_assert!(space <= storage + 1e-6 * (1.0 + storage));
        }

        #[test]
        fn capital_plan_never_overspends(budget in 0.0f64..1e12) {
            let plan = optimal_factory_and_storage(
                &division(), &industry(), &catalog(), budget, 0.8,
            )
            .unwrap()
            .unwrap();
            prop_assert!(plan.cost <= budget);
            prop_assert!(plan.smart_storage_level >= 2);
            prop_assert!(plan.warehouse_level >= 3);
            prop_assert!(plan.smart_factories_level >= 1);
        }

        #[test]
        fn advert_plan_never_overspends(budget in 0.0f64..1e12) {
            let plan = optimal_advert(&division(), &industry(), &catalog(), budget)
                .unwrap()
                .unwrap();
            prop_assert!(plan.cost <= budget);
            prop_assert!(plan.advert_level >= 4);
        }
    }
}
