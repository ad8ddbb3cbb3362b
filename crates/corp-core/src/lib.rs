#![deny(warnings)]

//! Core domain snapshots and invariants for corp-pilot.
//!
//! This crate defines the immutable value types exchanged with the host
//! game's query interface, plus validation helpers that guarantee basic
//! invariants before the planners run. Nothing here performs I/O or holds
//! state: every type is a point-in-time snapshot supplied by the caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The four production-boosting input materials, in canonical order.
///
/// The order fixes the index layout used by `IndustryFactors`,
/// `MaterialSizes`, and every `[f64; 4]` allocation the planners exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoostMaterial {
    /// Server racks and other compute hardware.
    Hardware,
    /// AI cores.
    AiCores,
    /// Factory robots.
    Robots,
    /// Real estate.
    RealEstate,
}

impl BoostMaterial {
    /// All boost materials in canonical index order.
    pub const ALL: [BoostMaterial; 4] = [
        BoostMaterial::Hardware,
        BoostMaterial::AiCores,
        BoostMaterial::Robots,
        BoostMaterial::RealEstate,
    ];

    /// Canonical index of this material into `[f64; 4]` vectors.
    pub fn index(self) -> usize {
        match self {
            BoostMaterial::Hardware => 0,
            BoostMaterial::AiCores => 1,
            BoostMaterial::Robots => 2,
            BoostMaterial::RealEstate => 3,
        }
    }

    /// Display name matching the host game's material naming.
    pub fn name(self) -> &'static str {
        match self {
            BoostMaterial::Hardware => "Hardware",
            BoostMaterial::AiCores => "AI Cores",
            BoostMaterial::Robots => "Robots",
            BoostMaterial::RealEstate => "Real Estate",
        }
    }
}

/// Per-industry weighting of the four boost materials (all >= 0).
///
/// At least one factor should be positive for a non-degenerate stocking
/// plan; an all-zero set is valid input and yields an all-zero mix.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndustryFactors {
    pub hardware: f64,
    pub ai_cores: f64,
    pub robots: f64,
    pub real_estate: f64,
}

impl IndustryFactors {
    /// Factors in canonical `BoostMaterial` order.
    pub fn as_array(&self) -> [f64; 4] {
        [self.hardware, self.ai_cores, self.robots, self.real_estate]
    }
}

/// Warehouse footprint of one unit of each boost material.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialSizes {
    pub hardware: f64,
    pub ai_cores: f64,
    pub robots: f64,
    pub real_estate: f64,
}

impl MaterialSizes {
    /// Sizes in canonical `BoostMaterial` order.
    pub fn as_array(&self) -> [f64; 4] {
        [self.hardware, self.ai_cores, self.robots, self.real_estate]
    }
}

impl Default for MaterialSizes {
    /// Host-published unit footprints, used by fixtures and tests.
    fn default() -> Self {
        Self {
            hardware: 0.06,
            ai_cores: 0.1,
            robots: 0.5,
            real_estate: 0.005,
        }
    }
}

/// A leveled upgrade with a geometric cost curve: raising the level from
/// `n` to `n+1` costs `base_price * price_multiplier^n`.
///
/// Invariants: `base_price > 0`, `price_multiplier > 1`, both finite.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpgradeSpec {
    /// Cost of the very first level.
    pub base_price: f64,
    /// Per-level price growth factor (> 1).
    pub price_multiplier: f64,
}

/// An upgrade spec plus its per-level linear benefit (e.g. +3% production
/// per Smart Factories level, +10% storage per Smart Storage level).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeveledUpgrade {
    pub spec: UpgradeSpec,
    /// Additive benefit contributed by each level.
    pub benefit: f64,
}

/// Warehouse cost/size characteristics. Warehouse levels follow their own
/// cost recurrence (level `n` to `n+1` costs `base_cost * mult^(n+1)`),
/// distinct from the generic upgrade family.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WarehouseSpec {
    /// Base cost of the level recurrence.
    pub base_cost: f64,
    /// Per-level cost growth factor (> 1).
    pub cost_multiplier: f64,
    /// Storage units granted per warehouse level before upgrades.
    pub size_per_level: f64,
}

/// The host-supplied bundle of upgrade definitions the planners price
/// against. Balance values are opaque inputs; `Default` carries the host
/// game's published constants so fixtures and tests have a realistic
/// catalog to work with.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpgradeCatalog {
    /// Warehouse capacity upgrade (benefit = fractional storage per level).
    pub smart_storage: LeveledUpgrade,
    /// Production multiplier upgrade (benefit = fractional output per level).
    pub smart_factories: LeveledUpgrade,
    /// Advertising effectiveness upgrade (benefit per level).
    pub wilson_analytics: LeveledUpgrade,
    /// One advertising campaign purchase; level counts campaigns bought.
    pub advert: UpgradeSpec,
    /// Sales volume upgrade (benefit = fractional sales per level).
    pub sales_bots: LeveledUpgrade,
    /// Office size upgrade; levels are quantized to 3 seats each.
    pub office: UpgradeSpec,
    /// Warehouse cost/size family.
    pub warehouse: WarehouseSpec,
}

impl Default for UpgradeCatalog {
    fn default() -> Self {
        Self {
            smart_storage: LeveledUpgrade {
                spec: UpgradeSpec {
                    base_price: 9e9,
                    price_multiplier: 1.06,
                },
                benefit: 0.1,
            },
            smart_factories: LeveledUpgrade {
                spec: UpgradeSpec {
                    base_price: 2e9,
                    price_multiplier: 1.06,
                },
                benefit: 0.03,
            },
            wilson_analytics: LeveledUpgrade {
                spec: UpgradeSpec {
                    base_price: 4e9,
                    price_multiplier: 2.0,
                },
                benefit: 0.005,
            },
            advert: UpgradeSpec {
                base_price: 1e9,
                price_multiplier: 1.06,
            },
            sales_bots: LeveledUpgrade {
                spec: UpgradeSpec {
                    base_price: 1e9,
                    price_multiplier: 1.07,
                },
                benefit: 0.01,
            },
            office: UpgradeSpec {
                base_price: 4e9,
                price_multiplier: 1.09,
            },
            warehouse: WarehouseSpec {
                base_cost: 1e9,
                cost_multiplier: 1.07,
                size_per_level: 100.0,
            },
        }
    }
}

/// Research unlocks that scale production output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchBonuses {
    /// Drone-assisted assembly lines.
    pub drone_assembly: bool,
    /// Self-correcting assemblers.
    pub self_correcting_assemblers: bool,
    /// Fulcrum upgrade; applies to product manufacturing only.
    pub fulcrum: bool,
}

/// Production multiplier granted by `drone_assembly`.
pub const DRONE_ASSEMBLY_MULT: f64 = 1.2;
/// Production multiplier granted by `self_correcting_assemblers`.
pub const SELF_CORRECTING_ASSEMBLERS_MULT: f64 = 1.1;
/// Product-only production multiplier granted by `fulcrum`.
pub const FULCRUM_MULT: f64 = 1.05;

impl ResearchBonuses {
    /// Compound production multiplier from the researched flags.
    pub fn production_multiplier(&self, is_product: bool) -> f64 {
        let mut mult = 1.0;
        if self.drone_assembly {
            mult *= DRONE_ASSEMBLY_MULT;
        }
        if self.self_correcting_assemblers {
            mult *= SELF_CORRECTING_ASSEMBLERS_MULT;
        }
        if self.fulcrum && is_product {
            mult *= FULCRUM_MULT;
        }
        mult
    }
}

/// Market intelligence unlocks required before optimal pricing applies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketInfo {
    /// Demand figures are visible.
    pub demand_research: bool,
    /// Competition figures are visible.
    pub competition_research: bool,
}

impl MarketInfo {
    /// True when both demand and competition data are available.
    pub fn pricing_unlocked(&self) -> bool {
        self.demand_research && self.competition_research
    }
}

/// Employee production output by job category for one office.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JobProduction {
    pub operations: f64,
    pub engineer: f64,
    pub business: f64,
    pub management: f64,
    pub research: f64,
}

impl JobProduction {
    /// Sum across all five job categories.
    pub fn total(&self) -> f64 {
        self.operations + self.engineer + self.business + self.management + self.research
    }

    /// Values in (operations, engineer, business, management, research)
    /// order, the layout the pricing solver seeds from.
    pub fn as_array(&self) -> [f64; 5] {
        [
            self.operations,
            self.engineer,
            self.business,
            self.management,
            self.research,
        ]
    }
}

/// Per-city staffing pool snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OfficeSnapshot {
    /// Seat capacity; grows in steps of 3.
    pub size: u32,
    /// Current employee production by job.
    pub production: JobProduction,
}

/// Division-level snapshot: upgrade levels, advertising state, research.
///
/// Offices and warehouses are per-city and queried separately; the fields
/// here are shared across the division's cities.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DivisionSnapshot {
    /// Division name.
    pub name: String,
    /// Cities the division operates in.
    pub cities: Vec<String>,
    /// Smart Storage upgrade level.
    pub smart_storage_level: u32,
    /// Warehouse level (uniform across cities in planner snapshots).
    pub warehouse_level: u32,
    /// Smart Factories upgrade level.
    pub smart_factories_level: u32,
    /// Wilson Analytics upgrade level.
    pub wilson_level: u32,
    /// Advertising campaigns purchased so far.
    pub advert_level: u32,
    /// Compounding advertising awareness metric (>= 0).
    pub awareness: f64,
    /// Compounding advertising popularity metric (>= 0).
    pub popularity: f64,
    /// Accumulated research points (>= 0).
    pub research_points: f64,
    /// Researched production bonuses.
    pub research: ResearchBonuses,
}

/// Per-city storage pool snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WarehouseSnapshot {
    pub level: u32,
    /// Total capacity in storage units.
    pub size: f64,
    /// Capacity currently occupied.
    pub used: f64,
}

impl WarehouseSnapshot {
    /// Free capacity, clamped at zero.
    pub fn available(&self) -> f64 {
        (self.size - self.used).max(0.0)
    }
}

/// Sellable raw material snapshot for one city.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialSnapshot {
    pub stored: f64,
    pub quality: f64,
    pub demand: f64,
    pub competition: f64,
    pub market_price: f64,
    /// Host-defined base markup divisor (> 0).
    pub base_markup: f64,
}

/// Finished product snapshot for one city.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub stored: f64,
    pub quality: f64,
    pub performance: f64,
    pub durability: f64,
    pub reliability: f64,
    pub aesthetics: f64,
    /// Host-computed overall rating.
    pub effective_rating: f64,
    pub production_cost: f64,
    /// Funds invested in design when development started.
    pub design_investment: f64,
    /// Funds invested in advertising when development started.
    pub advertising_investment: f64,
    pub demand: f64,
    pub competition: f64,
    pub market_price: f64,
}

/// Corporation-wide snapshot consumed by pricing and the driver.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorporationSnapshot {
    /// Liquid funds available for plans.
    pub funds: f64,
    /// Market intelligence unlocks.
    pub market: MarketInfo,
    /// ABC SalesBots upgrade level.
    pub sales_bots_level: u32,
}

/// One required input material of an industry's production recipe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialInput {
    pub name: String,
    /// Units consumed per unit of output.
    pub coefficient: f64,
    /// Warehouse footprint per unit.
    pub size: f64,
}

/// Industry characteristics queried from the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndustrySpec {
    /// Boost material weighting.
    pub factors: IndustryFactors,
    /// Boost material footprints.
    pub material_sizes: MaterialSizes,
    /// Exponent of the awareness/popularity advertising factor.
    pub advertising_exponent: f64,
    /// Exponent applied to research points in the product science bonus.
    pub science_exponent: f64,
    /// True when the industry manufactures products rather than materials.
    pub is_product: bool,
    /// Warehouse footprint of one unit of output.
    pub output_size: f64,
    /// Input recipe.
    pub inputs: Vec<MaterialInput>,
}

/// Result of the factory/storage capital search.
///
/// `production` is the plan's quality metric, used only for ranking;
/// `cost` never exceeds the budget the planner was given.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimalCapitalPlan {
    pub production: f64,
    pub cost: f64,
    pub warehouse_size: f64,
    pub smart_storage_level: u32,
    pub warehouse_level: u32,
    pub smart_factories_level: u32,
}

/// Result of the advertising capital search.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimalAdvertPlan {
    pub wilson_level: u32,
    pub advert_level: u32,
    pub advertising_factor: f64,
    pub cost: f64,
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Numeric field must be finite.
    #[error("non-finite numeric value encountered")]
    NonFinite,
    /// Field must be >= 0.
    #[error("{0} must be non-negative")]
    Negative(&'static str),
    /// Field must be > 0.
    #[error("{0} must be positive")]
    NonPositive(&'static str),
    /// Geometric cost curves require a multiplier above one.
    #[error("price multiplier {0} must be > 1")]
    MultiplierTooSmall(f64),
    /// Names must be non-empty.
    #[error("name must not be empty")]
    EmptyName,
    /// Divisions must operate in at least one city.
    #[error("division has no cities")]
    NoCities,
}

fn ensure_finite(values: &[f64]) -> Result<(), ValidationError> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ValidationError::NonFinite);
    }
    Ok(())
}

/// Validate a geometric upgrade spec.
pub fn validate_upgrade_spec(spec: &UpgradeSpec) -> Result<(), ValidationError> {
    ensure_finite(&[spec.base_price, spec.price_multiplier])?;
    if spec.base_price <= 0.0 {
        return Err(ValidationError::NonPositive("base_price"));
    }
    if spec.price_multiplier <= 1.0 {
        return Err(ValidationError::MultiplierTooSmall(spec.price_multiplier));
    }
    Ok(())
}

/// Validate an upgrade spec plus its benefit.
pub fn validate_leveled_upgrade(upgrade: &LeveledUpgrade) -> Result<(), ValidationError> {
    validate_upgrade_spec(&upgrade.spec)?;
    ensure_finite(&[upgrade.benefit])?;
    if upgrade.benefit < 0.0 {
        return Err(ValidationError::Negative("benefit"));
    }
    Ok(())
}

/// Validate warehouse cost/size characteristics.
pub fn validate_warehouse_spec(spec: &WarehouseSpec) -> Result<(), ValidationError> {
    ensure_finite(&[spec.base_cost, spec.cost_multiplier, spec.size_per_level])?;
    if spec.base_cost <= 0.0 {
        return Err(ValidationError::NonPositive("base_cost"));
    }
    if spec.cost_multiplier <= 1.0 {
        return Err(ValidationError::MultiplierTooSmall(spec.cost_multiplier));
    }
    if spec.size_per_level <= 0.0 {
        return Err(ValidationError::NonPositive("size_per_level"));
    }
    Ok(())
}

/// Validate a full upgrade catalog.
pub fn validate_catalog(catalog: &UpgradeCatalog) -> Result<(), ValidationError> {
    validate_leveled_upgrade(&catalog.smart_storage)?;
    validate_leveled_upgrade(&catalog.smart_factories)?;
    validate_leveled_upgrade(&catalog.wilson_analytics)?;
    validate_upgrade_spec(&catalog.advert)?;
    validate_leveled_upgrade(&catalog.sales_bots)?;
    validate_upgrade_spec(&catalog.office)?;
    validate_warehouse_spec(&catalog.warehouse)
}

/// Validate industry factors: non-negative and finite. An all-zero set is
/// permitted; it degrades the stocking plan to all zeros rather than
/// erroring.
pub fn validate_factors(factors: &IndustryFactors) -> Result<(), ValidationError> {
    ensure_finite(&factors.as_array())?;
    if factors.as_array().iter().any(|f| *f < 0.0) {
        return Err(ValidationError::Negative("industry factor"));
    }
    Ok(())
}

/// Validate material footprints: strictly positive and finite.
pub fn validate_sizes(sizes: &MaterialSizes) -> Result<(), ValidationError> {
    ensure_finite(&sizes.as_array())?;
    if sizes.as_array().iter().any(|s| *s <= 0.0) {
        return Err(ValidationError::NonPositive("material size"));
    }
    Ok(())
}

/// Validate an industry spec.
pub fn validate_industry(industry: &IndustrySpec) -> Result<(), ValidationError> {
    validate_factors(&industry.factors)?;
    validate_sizes(&industry.material_sizes)?;
    ensure_finite(&[
        industry.advertising_exponent,
        industry.science_exponent,
        industry.output_size,
    ])?;
    if industry.advertising_exponent < 0.0 || industry.science_exponent < 0.0 {
        return Err(ValidationError::Negative("industry exponent"));
    }
    if industry.output_size < 0.0 {
        return Err(ValidationError::Negative("output_size"));
    }
    for input in &industry.inputs {
        ensure_finite(&[input.coefficient, input.size])?;
        if input.coefficient < 0.0 || input.size < 0.0 {
            return Err(ValidationError::Negative("material input"));
        }
    }
    Ok(())
}

/// Validate employee production values.
pub fn validate_job_production(production: &JobProduction) -> Result<(), ValidationError> {
    ensure_finite(&production.as_array())?;
    if production.as_array().iter().any(|p| *p < 0.0) {
        return Err(ValidationError::Negative("job production"));
    }
    Ok(())
}

/// Validate a division snapshot.
pub fn validate_division(division: &DivisionSnapshot) -> Result<(), ValidationError> {
    if division.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if division.cities.is_empty() {
        return Err(ValidationError::NoCities);
    }
    ensure_finite(&[
        division.awareness,
        division.popularity,
        division.research_points,
    ])?;
    if division.awareness < 0.0 || division.popularity < 0.0 || division.research_points < 0.0 {
        return Err(ValidationError::Negative("advertising metric"));
    }
    Ok(())
}

/// Validate a sellable material snapshot.
pub fn validate_material(material: &MaterialSnapshot) -> Result<(), ValidationError> {
    ensure_finite(&[
        material.stored,
        material.quality,
        material.demand,
        material.competition,
        material.market_price,
        material.base_markup,
    ])?;
    if material.stored < 0.0 || material.quality < 0.0 || material.market_price < 0.0 {
        return Err(ValidationError::Negative("material field"));
    }
    if material.base_markup <= 0.0 {
        return Err(ValidationError::NonPositive("base_markup"));
    }
    Ok(())
}

/// Validate a product snapshot.
pub fn validate_product(product: &ProductSnapshot) -> Result<(), ValidationError> {
    let fields = [
        product.stored,
        product.quality,
        product.performance,
        product.durability,
        product.reliability,
        product.aesthetics,
        product.effective_rating,
        product.production_cost,
        product.design_investment,
        product.advertising_investment,
        product.demand,
        product.competition,
        product.market_price,
    ];
    ensure_finite(&fields)?;
    if fields.iter().any(|f| *f < 0.0) {
        return Err(ValidationError::Negative("product field"));
    }
    Ok(())
}

/// Validate a corporation snapshot.
pub fn validate_corporation(corp: &CorporationSnapshot) -> Result<(), ValidationError> {
    ensure_finite(&[corp.funds])?;
    Ok(())
}
