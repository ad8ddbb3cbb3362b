#![deny(warnings)]

//! Orchestration for corp-pilot: the provider boundary to the host game,
//! a serde-loadable in-memory corporation for tests and the CLI, and the
//! two recurring passes that put the planners to work.
//!
//! A capital cycle splits the available funds between storage, boost
//! materials, advertising and office growth per division and applies the
//! winning plans through [`CorpWriter`]. A pricing cycle recovers product
//! markups (cached across cycles) and posts market-clearing prices for
//! every sellable item. Neither pass talks to the host directly; both run
//! against the [`CorpReader`]/[`CorpWriter`] traits so the real game
//! adapter and the bundled [`InMemoryCorp`] are interchangeable.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use corp_core::{
    validate_catalog, validate_corporation, validate_division, validate_industry,
    validate_job_production, validate_material, validate_product, BoostMaterial,
    CorporationSnapshot, DivisionSnapshot, IndustrySpec, MaterialSnapshot, OfficeSnapshot,
    ProductSnapshot, UpgradeCatalog, ValidationError, WarehouseSnapshot,
};
use corp_econ::{
    advert_cost, apply_advert, max_affordable_office_size, office_limited_production,
    office_max_production, office_production_multiplier, office_upgrade_cost, upgrade_cost,
    upgraded_production_multiplier, warehouse_cost, EconError,
};
use corp_plan::{
    optimal_advert, optimal_factory_and_storage, optimal_material_mix, optimal_product_markup,
    optimal_selling_price, PlanError, SaleItem,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors surfaced by the driver and the in-memory provider.
#[derive(Debug, Error)]
pub enum DriverError {
    /// No division with that name exists.
    #[error("unknown division: {0}")]
    UnknownDivision(String),
    /// The division does not operate in that city.
    #[error("unknown city {city} in division {division}")]
    UnknownCity { division: String, city: String },
    /// No such material or product is stocked there.
    #[error("unknown item {item} in {division}/{city}")]
    UnknownItem {
        division: String,
        city: String,
        item: String,
    },
    /// The funds ledger cannot cover a purchase.
    #[error("insufficient funds: need {needed:.2}, have {available:.2}")]
    InsufficientFunds { needed: f64, available: f64 },
    /// The city warehouse cannot hold a boost-material batch.
    #[error("not enough warehouse space: need {needed:.2}, have {available:.2}")]
    NotEnoughSpace { needed: f64, available: f64 },
    /// A scenario map key disagrees with the division it holds.
    #[error("scenario key {key} does not name division {name}")]
    MismatchedDivision { key: String, name: String },
    /// A division city has no office or warehouse entry.
    #[error("scenario is missing office or warehouse for {division}/{city}")]
    IncompleteScenario { division: String, city: String },
    /// Cycle options are out of range.
    #[error("invalid cycle options: {0}")]
    InvalidOptions(&'static str),
    #[error(transparent)]
    Econ(#[from] EconError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    /// A scenario violated a domain invariant.
    #[error("invalid scenario: {0}")]
    InvalidScenario(#[from] ValidationError),
    /// A scenario file failed to parse.
    #[error("malformed scenario: {0}")]
    MalformedScenario(#[from] serde_json::Error),
}

/// Division-scoped leveled upgrades the capital cycle can buy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpgradeKind {
    SmartStorage,
    SmartFactories,
    WilsonAnalytics,
}

/// Price instruction for one item in one city.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PriceDirective {
    /// Follow the host's market price.
    Market,
    /// Sell at a fixed computed price.
    Fixed(f64),
}

/// Read access to the corporation's state.
///
/// Implementations return owned snapshots so a cycle works against a
/// consistent copy even while the underlying state moves. The bundled
/// [`InMemoryCorp`] is one implementation; the adapter talking to the
/// real host is the other.
pub trait CorpReader {
    fn corporation(&self) -> CorporationSnapshot;
    fn catalog(&self) -> UpgradeCatalog;
    /// Host market prices of the four boost materials, canonical order.
    fn boost_material_prices(&self) -> [f64; 4];
    fn divisions(&self) -> Vec<String>;
    fn division(&self, name: &str) -> Option<DivisionSnapshot>;
    fn industry(&self, division: &str) -> Option<IndustrySpec>;
    fn office(&self, division: &str, city: &str) -> Option<OfficeSnapshot>;
    fn warehouse(&self, division: &str, city: &str) -> Option<WarehouseSnapshot>;
    /// Sellable material stock by city, in a stable order.
    fn materials(&self, division: &str, city: &str) -> Vec<(String, MaterialSnapshot)>;
    /// Names of the division's products, in a stable order.
    fn products(&self, division: &str) -> Vec<String>;
    fn product(&self, division: &str, city: &str, name: &str) -> Option<ProductSnapshot>;
}

/// Mutations the cycles apply.
///
/// Money-moving calls debit the corporation's funds and fail with
/// [`DriverError::InsufficientFunds`] when the ledger cannot cover them.
/// Level-setting calls treat a target at or below the current level as a
/// no-op, so applying a break-even plan is always safe.
pub trait CorpWriter {
    fn buy_upgrade_to(
        &mut self,
        division: &str,
        kind: UpgradeKind,
        level: u32,
    ) -> Result<(), DriverError>;
    /// Raise every city warehouse of the division to `level`.
    fn set_warehouse_level(&mut self, division: &str, level: u32) -> Result<(), DriverError>;
    /// Grow one office to `size` seats.
    fn hire_to_size(&mut self, division: &str, city: &str, size: u32) -> Result<(), DriverError>;
    /// Buy advertising campaigns up to `level` purchases total.
    fn buy_advert_to(&mut self, division: &str, level: u32) -> Result<(), DriverError>;
    /// Stock a batch of boost materials in one city warehouse.
    fn buy_boost_materials(
        &mut self,
        division: &str,
        city: &str,
        amounts: &[f64; 4],
    ) -> Result<(), DriverError>;
    fn set_material_price(
        &mut self,
        division: &str,
        city: &str,
        material: &str,
        price: PriceDirective,
    ) -> Result<(), DriverError>;
    fn set_product_price(
        &mut self,
        division: &str,
        city: &str,
        product: &str,
        price: PriceDirective,
    ) -> Result<(), DriverError>;
}

/// Solved product markups, keyed by (division, city, product).
///
/// Markup recovery is the expensive part of a pricing cycle; the result
/// only changes when the product itself does, so callers keep one cache
/// across cycles and invalidate on redesign or discontinuation.
#[derive(Debug, Default)]
pub struct MarkupCache {
    entries: HashMap<(String, String, String), f64>,
}

impl MarkupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, division: &str, city: &str, product: &str) -> Option<f64> {
        self.entries
            .get(&(division.to_owned(), city.to_owned(), product.to_owned()))
            .copied()
    }

    pub fn insert(&mut self, division: &str, city: &str, product: &str, markup: f64) {
        self.entries.insert(
            (division.to_owned(), city.to_owned(), product.to_owned()),
            markup,
        );
    }

    /// Drop every cached markup of one product across all cities.
    pub fn invalidate_product(&mut self, division: &str, product: &str) {
        self.entries
            .retain(|(cached_division, _, cached_product), _| {
                cached_division != division || cached_product != product
            });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Budget split and knobs for one capital cycle.
///
/// The fractions are shares of the per-division budget base (current
/// funds, capped by `funds_cap` when set) and must sum to at most one so
/// a cycle can never overdraw the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CycleOptions {
    /// Share spent on smart storage, warehouses and smart factories.
    pub capital_fraction: f64,
    /// Share spent on Wilson Analytics and advertising campaigns.
    pub advert_fraction: f64,
    /// Share spent on office growth, split evenly across cities.
    pub office_fraction: f64,
    /// Share spent on boost materials, split evenly across cities.
    pub boost_fraction: f64,
    /// Fraction of warehouse space reserved for boost materials.
    pub materials_ratio: f64,
    /// Hard cap on total spending for the cycle, across all divisions.
    pub funds_cap: Option<f64>,
}

impl Default for CycleOptions {
    fn default() -> Self {
        Self {
            capital_fraction: 0.5,
            advert_fraction: 0.2,
            office_fraction: 0.1,
            boost_fraction: 0.15,
            materials_ratio: 0.8,
            funds_cap: None,
        }
    }
}

/// Validate a cycle options bundle.
pub fn validate_cycle_options(options: &CycleOptions) -> Result<(), DriverError> {
    let fractions = [
        options.capital_fraction,
        options.advert_fraction,
        options.office_fraction,
        options.boost_fraction,
    ];
    if fractions.iter().any(|f| !f.is_finite() || *f < 0.0) {
        return Err(DriverError::InvalidOptions(
            "budget fractions must be finite and non-negative",
        ));
    }
    if fractions.iter().sum::<f64>() > 1.0 {
        return Err(DriverError::InvalidOptions(
            "budget fractions must not sum above one",
        ));
    }
    if !(0.0..=1.0).contains(&options.materials_ratio) {
        return Err(DriverError::InvalidOptions(
            "materials ratio must lie within [0, 1]",
        ));
    }
    if let Some(cap) = options.funds_cap {
        if !cap.is_finite() || cap < 0.0 {
            return Err(DriverError::InvalidOptions(
                "funds cap must be finite and non-negative",
            ));
        }
    }
    Ok(())
}

/// What one capital cycle did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub divisions_processed: usize,
    /// Level-raising upgrade purchases (storage, warehouse, factories,
    /// Wilson Analytics).
    pub upgrades_applied: usize,
    pub campaigns_bought: u32,
    pub offices_grown: usize,
    /// Successful per-city boost material batches.
    pub boost_batches: usize,
    /// Cities whose boost batch did not fit its warehouse.
    pub skipped_cities: usize,
    pub funds_spent: f64,
    /// Space-limited output projected across all divisions after the
    /// purchases, in units per production cycle.
    pub projected_production: f64,
}

/// What one pricing cycle did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingReport {
    pub materials_priced: usize,
    pub products_priced: usize,
    /// Items left at the host's market price.
    pub market_priced: usize,
    /// Products skipped because markup recovery failed.
    pub solver_failures: usize,
}

/// Run one capital allocation pass over every division.
///
/// Per division, in order: the factory/storage plan under
/// `capital_fraction` of the budget base, a boost-material batch per city
/// under `boost_fraction` (scaled down to fit the money, skipped with a
/// warning when the warehouse is full), the advertising plan under
/// `advert_fraction`, and office growth under `office_fraction`. The
/// budget base is re-read per division so later divisions spend from
/// what is actually left.
pub fn run_capital_cycle<C>(corp: &mut C, options: &CycleOptions) -> Result<CycleReport, DriverError>
where
    C: CorpReader + CorpWriter,
{
    validate_cycle_options(options)?;
    let catalog = corp.catalog();
    let mut remaining_cap = options.funds_cap.unwrap_or(f64::INFINITY);
    let mut report = CycleReport::default();

    for name in corp.divisions() {
        let Some(division) = corp.division(&name) else {
            warn!(division = %name, "division vanished mid-cycle");
            continue;
        };
        let Some(industry) = corp.industry(&name) else {
            warn!(division = %name, "division has no industry data");
            continue;
        };
        let funds_before = corp.corporation().funds;
        let base = funds_before.min(remaining_cap);
        if base <= 0.0 {
            debug!(division = %name, "budget exhausted for this cycle");
            break;
        }

        // Storage and factories gate everything else, so they go first.
        let capital_budget = base * options.capital_fraction;
        let Some(plan) = optimal_factory_and_storage(
            &division,
            &industry,
            &catalog,
            capital_budget,
            options.materials_ratio,
        )?
        else {
            warn!(division = %name, budget = capital_budget, "no feasible capital plan");
            continue;
        };
        corp.buy_upgrade_to(&name, UpgradeKind::SmartStorage, plan.smart_storage_level)?;
        corp.set_warehouse_level(&name, plan.warehouse_level)?;
        corp.buy_upgrade_to(&name, UpgradeKind::SmartFactories, plan.smart_factories_level)?;
        if plan.smart_storage_level > division.smart_storage_level {
            report.upgrades_applied += 1;
        }
        if plan.warehouse_level > division.warehouse_level {
            report.upgrades_applied += 1;
        }
        if plan.smart_factories_level > division.smart_factories_level {
            report.upgrades_applied += 1;
        }

        // Boost materials for the new warehouse size, one batch per city,
        // scaled down to what boost_fraction of the base can pay for.
        let mix = optimal_material_mix(
            &industry.factors,
            &industry.material_sizes,
            plan.warehouse_size * options.materials_ratio,
            true,
        );
        let prices = corp.boost_material_prices();
        let full_cost: f64 = mix.iter().zip(prices).map(|(amount, price)| amount * price).sum();
        let per_city_budget = base * options.boost_fraction / division.cities.len() as f64;
        let amounts = if full_cost > per_city_budget && full_cost > 0.0 {
            let scale = per_city_budget / full_cost;
            let mut scaled = [0.0f64; 4];
            for (out, amount) in scaled.iter_mut().zip(mix) {
                *out = (amount * scale).floor();
            }
            scaled
        } else {
            mix
        };
        for city in &division.cities {
            match corp.buy_boost_materials(&name, city, &amounts) {
                Ok(()) => report.boost_batches += 1,
                Err(DriverError::NotEnoughSpace { needed, available }) => {
                    warn!(
                        division = %name,
                        %city,
                        needed,
                        available,
                        "boost batch does not fit, skipping city"
                    );
                    report.skipped_cities += 1;
                }
                Err(err) => return Err(err),
            }
        }

        let advert_budget = base * options.advert_fraction;
        if let Some(plan) = optimal_advert(&division, &industry, &catalog, advert_budget)? {
            if plan.wilson_level > division.wilson_level {
                corp.buy_upgrade_to(&name, UpgradeKind::WilsonAnalytics, plan.wilson_level)?;
                report.upgrades_applied += 1;
            }
            if plan.advert_level > division.advert_level {
                corp.buy_advert_to(&name, plan.advert_level)?;
                report.campaigns_bought += plan.advert_level - division.advert_level;
            }
        }

        let office_budget = base * options.office_fraction / division.cities.len() as f64;
        for city in &division.cities {
            let Some(office) = corp.office(&name, city) else {
                continue;
            };
            let target = max_affordable_office_size(&catalog.office, office.size, office_budget)?;
            if target > office.size {
                corp.hire_to_size(&name, city, target)?;
                report.offices_grown += 1;
            }
        }

        // Project what the division should now produce per cycle; this is
        // the number worth watching across runs.
        let Some(updated) = corp.division(&name) else {
            continue;
        };
        let division_multiplier =
            upgraded_production_multiplier(&industry.factors, &amounts, updated.cities.len());
        let mut projected = 0.0;
        for city in &updated.cities {
            let (Some(office), Some(warehouse)) =
                (corp.office(&name, city), corp.warehouse(&name, city))
            else {
                continue;
            };
            let office_multiplier = office_production_multiplier(
                office.production.operations,
                office.production.engineer,
                office.production.management,
                industry.is_product,
            );
            let ceiling = office_max_production(
                office_multiplier,
                division_multiplier,
                updated.smart_factories_level,
                catalog.smart_factories.benefit,
                &updated.research,
                industry.is_product,
            );
            projected += office_limited_production(
                ceiling,
                industry.output_size,
                &industry.inputs,
                warehouse.available(),
            );
        }
        report.projected_production += projected;

        let spent = funds_before - corp.corporation().funds;
        report.funds_spent += spent;
        remaining_cap = (remaining_cap - spent).max(0.0);
        report.divisions_processed += 1;
        info!(division = %name, spent, projected, "capital cycle applied");
    }
    Ok(report)
}

/// Run one pricing pass over every division and city.
///
/// Materials are priced directly. Products first need their markup, taken
/// from `cache` or recovered by the solver and cached; a solver failure
/// is logged and the product falls back to the market price, as does any
/// item with no applicable price.
pub fn run_pricing_cycle<C>(
    corp: &mut C,
    cache: &mut MarkupCache,
) -> Result<PricingReport, DriverError>
where
    C: CorpReader + CorpWriter,
{
    let corporation = corp.corporation();
    let catalog = corp.catalog();
    let mut report = PricingReport::default();

    for name in corp.divisions() {
        let Some(division) = corp.division(&name) else {
            continue;
        };
        let Some(industry) = corp.industry(&name) else {
            continue;
        };
        for city in &division.cities {
            let Some(office) = corp.office(&name, city) else {
                continue;
            };
            for (material_name, material) in corp.materials(&name, city) {
                let price = optimal_selling_price(
                    &division,
                    &industry,
                    &office,
                    &corporation,
                    &catalog,
                    SaleItem::Material(&material),
                );
                let directive = match price {
                    Some(price) => {
                        report.materials_priced += 1;
                        PriceDirective::Fixed(price)
                    }
                    None => {
                        report.market_priced += 1;
                        PriceDirective::Market
                    }
                };
                corp.set_material_price(&name, city, &material_name, directive)?;
            }
            for product_name in corp.products(&name) {
                let Some(product) = corp.product(&name, city, &product_name) else {
                    continue;
                };
                let markup = match cache.get(&name, city, &product_name) {
                    Some(markup) => Some(markup),
                    None => match optimal_product_markup(&division, &industry, &office, &product) {
                        Ok(markup) => {
                            cache.insert(&name, city, &product_name, markup);
                            Some(markup)
                        }
                        Err(err) => {
                            warn!(
                                division = %name,
                                %city,
                                product = %product_name,
                                error = %err,
                                "markup recovery failed, leaving market price"
                            );
                            report.solver_failures += 1;
                            None
                        }
                    },
                };
                let price = optimal_selling_price(
                    &division,
                    &industry,
                    &office,
                    &corporation,
                    &catalog,
                    SaleItem::Product {
                        product: &product,
                        markup,
                    },
                );
                let directive = match price {
                    Some(price) => {
                        report.products_priced += 1;
                        PriceDirective::Fixed(price)
                    }
                    None => {
                        report.market_priced += 1;
                        PriceDirective::Market
                    }
                };
                corp.set_product_price(&name, city, &product_name, directive)?;
            }
        }
    }
    info!(
        materials = report.materials_priced,
        products = report.products_priced,
        market = report.market_priced,
        failures = report.solver_failures,
        "pricing cycle applied"
    );
    Ok(report)
}

/// Full state of one division in a scenario.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DivisionState {
    pub division: DivisionSnapshot,
    pub industry: IndustrySpec,
    /// One office per city.
    pub offices: BTreeMap<String, OfficeSnapshot>,
    /// One warehouse per city.
    pub warehouses: BTreeMap<String, WarehouseSnapshot>,
    /// Sellable material stock: city -> material name -> snapshot. Boost
    /// materials do not belong here; the warehouse `used` figure carries
    /// their footprint.
    #[serde(default)]
    pub materials: BTreeMap<String, BTreeMap<String, MaterialSnapshot>>,
    /// Product stock: city -> product name -> snapshot.
    #[serde(default)]
    pub products: BTreeMap<String, BTreeMap<String, ProductSnapshot>>,
}

/// A whole corporation held in memory, loadable from scenario JSON.
///
/// Implements both provider traits with a strict funds ledger: every
/// purchase debits `corporation.funds` or fails, and warehouse sizes are
/// kept consistent with storage and warehouse levels on every change.
/// Tests and the CLI run against this; the adapter for the live host
/// implements the same traits elsewhere.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InMemoryCorp {
    pub corporation: CorporationSnapshot,
    #[serde(default)]
    pub catalog: UpgradeCatalog,
    /// Host market prices of the four boost materials, canonical order.
    pub boost_material_prices: [f64; 4],
    pub divisions: BTreeMap<String, DivisionState>,
    #[serde(skip)]
    prices: BTreeMap<(String, String, String), PriceDirective>,
}

impl InMemoryCorp {
    /// Parse and validate a scenario.
    pub fn from_json(text: &str) -> Result<Self, DriverError> {
        let corp: Self = serde_json::from_str(text)?;
        corp.validate()?;
        Ok(corp)
    }

    /// Check every domain invariant the planners rely on.
    pub fn validate(&self) -> Result<(), DriverError> {
        validate_corporation(&self.corporation)?;
        validate_catalog(&self.catalog)?;
        for price in self.boost_material_prices {
            if !price.is_finite() {
                return Err(ValidationError::NonFinite.into());
            }
            if price <= 0.0 {
                return Err(ValidationError::NonPositive("boost material price").into());
            }
        }
        for (key, state) in &self.divisions {
            if key != &state.division.name {
                return Err(DriverError::MismatchedDivision {
                    key: key.clone(),
                    name: state.division.name.clone(),
                });
            }
            validate_division(&state.division)?;
            validate_industry(&state.industry)?;
            for city in &state.division.cities {
                if !state.offices.contains_key(city) || !state.warehouses.contains_key(city) {
                    return Err(DriverError::IncompleteScenario {
                        division: key.clone(),
                        city: city.clone(),
                    });
                }
            }
            for office in state.offices.values() {
                validate_job_production(&office.production)?;
            }
            for warehouse in state.warehouses.values() {
                if !warehouse.size.is_finite() || !warehouse.used.is_finite() {
                    return Err(ValidationError::NonFinite.into());
                }
                if warehouse.size <= 0.0 {
                    return Err(ValidationError::NonPositive("warehouse size").into());
                }
                if warehouse.used < 0.0 {
                    return Err(ValidationError::Negative("warehouse used").into());
                }
            }
            for stock in state.materials.values() {
                for material in stock.values() {
                    validate_material(material)?;
                }
            }
            for products in state.products.values() {
                for product in products.values() {
                    validate_product(product)?;
                }
            }
        }
        Ok(())
    }

    /// The price directive last posted for an item, if any.
    pub fn price_of(&self, division: &str, city: &str, item: &str) -> Option<PriceDirective> {
        self.prices
            .get(&(division.to_owned(), city.to_owned(), item.to_owned()))
            .copied()
    }

    fn division_state(&self, name: &str) -> Result<&DivisionState, DriverError> {
        self.divisions
            .get(name)
            .ok_or_else(|| DriverError::UnknownDivision(name.to_owned()))
    }

    fn division_state_mut(&mut self, name: &str) -> Result<&mut DivisionState, DriverError> {
        self.divisions
            .get_mut(name)
            .ok_or_else(|| DriverError::UnknownDivision(name.to_owned()))
    }

    fn charge(&mut self, cost: f64) -> Result<(), DriverError> {
        if cost <= 0.0 {
            return Ok(());
        }
        let available = self.corporation.funds;
        if cost > available {
            return Err(DriverError::InsufficientFunds {
                needed: cost,
                available,
            });
        }
        self.corporation.funds -= cost;
        Ok(())
    }

    /// Recompute every city warehouse size from the division's levels.
    fn refresh_warehouses(state: &mut DivisionState, catalog: &UpgradeCatalog) {
        let level = state.division.warehouse_level;
        let bonus =
            1.0 + f64::from(state.division.smart_storage_level) * catalog.smart_storage.benefit;
        for warehouse in state.warehouses.values_mut() {
            warehouse.level = level;
            warehouse.size = f64::from(level) * catalog.warehouse.size_per_level * bonus;
        }
    }
}

impl CorpReader for InMemoryCorp {
    fn corporation(&self) -> CorporationSnapshot {
        self.corporation.clone()
    }

    fn catalog(&self) -> UpgradeCatalog {
        self.catalog
    }

    fn boost_material_prices(&self) -> [f64; 4] {
        self.boost_material_prices
    }

    fn divisions(&self) -> Vec<String> {
        self.divisions.keys().cloned().collect()
    }

    fn division(&self, name: &str) -> Option<DivisionSnapshot> {
        self.divisions.get(name).map(|state| state.division.clone())
    }

    fn industry(&self, division: &str) -> Option<IndustrySpec> {
        self.divisions
            .get(division)
            .map(|state| state.industry.clone())
    }

    fn office(&self, division: &str, city: &str) -> Option<OfficeSnapshot> {
        self.divisions
            .get(division)
            .and_then(|state| state.offices.get(city))
            .cloned()
    }

    fn warehouse(&self, division: &str, city: &str) -> Option<WarehouseSnapshot> {
        self.divisions
            .get(division)
            .and_then(|state| state.warehouses.get(city))
            .cloned()
    }

    fn materials(&self, division: &str, city: &str) -> Vec<(String, MaterialSnapshot)> {
        self.divisions
            .get(division)
            .and_then(|state| state.materials.get(city))
            .map(|stock| {
                stock
                    .iter()
                    .map(|(name, material)| (name.clone(), material.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn products(&self, division: &str) -> Vec<String> {
        let Some(state) = self.divisions.get(division) else {
            return Vec::new();
        };
        let names: BTreeSet<String> = state
            .products
            .values()
            .flat_map(|stock| stock.keys().cloned())
            .collect();
        names.into_iter().collect()
    }

    fn product(&self, division: &str, city: &str, name: &str) -> Option<ProductSnapshot> {
        self.divisions
            .get(division)
            .and_then(|state| state.products.get(city))
            .and_then(|stock| stock.get(name))
            .cloned()
    }
}

impl CorpWriter for InMemoryCorp {
    fn buy_upgrade_to(
        &mut self,
        division: &str,
        kind: UpgradeKind,
        level: u32,
    ) -> Result<(), DriverError> {
        let catalog = self.catalog;
        let current = {
            let snapshot = &self.division_state(division)?.division;
            match kind {
                UpgradeKind::SmartStorage => snapshot.smart_storage_level,
                UpgradeKind::SmartFactories => snapshot.smart_factories_level,
                UpgradeKind::WilsonAnalytics => snapshot.wilson_level,
            }
        };
        if level <= current {
            return Ok(());
        }
        let spec = match kind {
            UpgradeKind::SmartStorage => catalog.smart_storage.spec,
            UpgradeKind::SmartFactories => catalog.smart_factories.spec,
            UpgradeKind::WilsonAnalytics => catalog.wilson_analytics.spec,
        };
        let cost = upgrade_cost(&spec, current, level)?;
        self.charge(cost)?;
        let state = self.division_state_mut(division)?;
        match kind {
            UpgradeKind::SmartStorage => state.division.smart_storage_level = level,
            UpgradeKind::SmartFactories => state.division.smart_factories_level = level,
            UpgradeKind::WilsonAnalytics => state.division.wilson_level = level,
        }
        if kind == UpgradeKind::SmartStorage {
            Self::refresh_warehouses(state, &catalog);
        }
        Ok(())
    }

    fn set_warehouse_level(&mut self, division: &str, level: u32) -> Result<(), DriverError> {
        let catalog = self.catalog;
        let current = self.division_state(division)?.division.warehouse_level;
        if level <= current {
            return Ok(());
        }
        let cost = warehouse_cost(&catalog.warehouse, current, level)?;
        self.charge(cost)?;
        let state = self.division_state_mut(division)?;
        state.division.warehouse_level = level;
        Self::refresh_warehouses(state, &catalog);
        Ok(())
    }

    fn hire_to_size(&mut self, division: &str, city: &str, size: u32) -> Result<(), DriverError> {
        let catalog = self.catalog;
        let current = {
            let state = self.division_state(division)?;
            state
                .offices
                .get(city)
                .ok_or_else(|| DriverError::UnknownCity {
                    division: division.to_owned(),
                    city: city.to_owned(),
                })?
                .size
        };
        if size <= current {
            return Ok(());
        }
        let cost = office_upgrade_cost(&catalog.office, current, size)?;
        self.charge(cost)?;
        if let Some(office) = self.division_state_mut(division)?.offices.get_mut(city) {
            office.size = size;
        }
        Ok(())
    }

    fn buy_advert_to(&mut self, division: &str, level: u32) -> Result<(), DriverError> {
        let catalog = self.catalog;
        let (current, wilson_level) = {
            let snapshot = &self.division_state(division)?.division;
            (snapshot.advert_level, snapshot.wilson_level)
        };
        if level <= current {
            return Ok(());
        }
        let cost = advert_cost(&catalog.advert, current, level)?;
        self.charge(cost)?;
        let multiplier = 1.0 + f64::from(wilson_level) * catalog.wilson_analytics.benefit;
        let snapshot = &mut self.division_state_mut(division)?.division;
        for _ in current..level {
            (snapshot.awareness, snapshot.popularity) =
                apply_advert(snapshot.awareness, snapshot.popularity, multiplier);
        }
        snapshot.advert_level = level;
        Ok(())
    }

    fn buy_boost_materials(
        &mut self,
        division: &str,
        city: &str,
        amounts: &[f64; 4],
    ) -> Result<(), DriverError> {
        let (needed, available) = {
            let state = self.division_state(division)?;
            let warehouse = state
                .warehouses
                .get(city)
                .ok_or_else(|| DriverError::UnknownCity {
                    division: division.to_owned(),
                    city: city.to_owned(),
                })?;
            let sizes = state.industry.material_sizes.as_array();
            let needed: f64 = amounts
                .iter()
                .zip(sizes)
                .map(|(amount, size)| amount * size)
                .sum();
            (needed, warehouse.available())
        };
        if needed > available {
            return Err(DriverError::NotEnoughSpace { needed, available });
        }
        let cost: f64 = amounts
            .iter()
            .zip(self.boost_material_prices)
            .map(|(amount, price)| amount * price)
            .sum();
        self.charge(cost)?;
        let state = self.division_state_mut(division)?;
        if let Some(warehouse) = state.warehouses.get_mut(city) {
            warehouse.used += needed;
        }
        // Mirror the stock into the materials map when the scenario lists
        // the boost materials explicitly.
        if let Some(stock) = state.materials.get_mut(city) {
            for (material, amount) in BoostMaterial::ALL.iter().zip(amounts) {
                if let Some(snapshot) = stock.get_mut(material.name()) {
                    snapshot.stored += amount;
                }
            }
        }
        Ok(())
    }

    fn set_material_price(
        &mut self,
        division: &str,
        city: &str,
        material: &str,
        price: PriceDirective,
    ) -> Result<(), DriverError> {
        let known = self
            .division_state(division)?
            .materials
            .get(city)
            .map_or(false, |stock| stock.contains_key(material));
        if !known {
            return Err(DriverError::UnknownItem {
                division: division.to_owned(),
                city: city.to_owned(),
                item: material.to_owned(),
            });
        }
        self.prices.insert(
            (division.to_owned(), city.to_owned(), material.to_owned()),
            price,
        );
        Ok(())
    }

    fn set_product_price(
        &mut self,
        division: &str,
        city: &str,
        product: &str,
        price: PriceDirective,
    ) -> Result<(), DriverError> {
        let known = self
            .division_state(division)?
            .products
            .get(city)
            .map_or(false, |stock| stock.contains_key(product));
        if !known {
            return Err(DriverError::UnknownItem {
                division: division.to_owned(),
                city: city.to_owned(),
                item: product.to_owned(),
            });
        }
        self.prices.insert(
            (division.to_owned(), city.to_owned(), product.to_owned()),
            price,
        );
        Ok(())
    }
}
