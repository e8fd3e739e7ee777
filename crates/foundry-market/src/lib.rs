//! Market engine: sale pricing and per-item demand dynamics.
//!
//! Every item carries a popularity multiplier that decays as it is sold and
//! recovers toward 1.0 on ticks without sales. Heavy overselling leaves
//! lasting damage that slows recovery. On top of popularity, prices respond
//! to how varied recent sales were (diversification), to research moving
//! past an item's age (obsolescence) and to timed random market events.
//!
//! # Usage
//!
//! ```ignore
//! // During an action:
//! let sale = foundry_market::sell(&mut state, &rules, "iron_ingot", 5)?;
//! // Each tick:
//! let skip = foundry_market::sold_at(&state, tick);
//! foundry_market::recover(&mut state, &rules, &skip);
//! foundry_market::roll_events(&mut state, &rules, &mut rng);
//! ```

use std::collections::BTreeSet;

use foundry_core::error::{ActionError, RulesError};
use foundry_core::id::{MaterialId, Ticks};
use foundry_core::rng::SimRng;
use foundry_core::rules::{MarketRules, Rules};
use foundry_core::state::{GameState, MarketEvent, PricePoint, RecentSale};

// ---------------------------------------------------------------------------
// Sale quote
// ---------------------------------------------------------------------------

/// The priced outcome of selling a quantity of one item, computed without
/// touching the state.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleQuote {
    pub item: MaterialId,
    pub units: u64,
    pub revenue: f64,
    pub popularity_after: f64,
    pub damage_after: f64,
}

impl SaleQuote {
    pub fn average_price(&self) -> f64 {
        if self.units == 0 {
            0.0
        } else {
            self.revenue / self.units as f64
        }
    }
}

// ---------------------------------------------------------------------------
// Price components
// ---------------------------------------------------------------------------

fn clamp_popularity(market: &MarketRules, popularity: f64) -> f64 {
    popularity.clamp(market.min_popularity, market.max_popularity)
}

/// Multiplier from the number of distinct items sold within the
/// diversification window, counting `item` itself. The highest bonus whose
/// threshold is met wins; below every threshold the multiplier is 1.0.
pub fn diversification_multiplier(state: &GameState, rules: &Rules, item: &str) -> f64 {
    let window = rules.market.diversification_window;
    let mut unique: BTreeSet<&str> = state
        .market_recent_sales
        .iter()
        .filter(|sale| state.tick.saturating_sub(sale.tick) < window)
        .map(|sale| sale.item_id.as_str())
        .collect();
    unique.insert(item);

    rules
        .market
        .diversification_bonuses
        .iter()
        .filter(|bonus| unique.len() >= bonus.unique_items)
        .map(|bonus| bonus.multiplier)
        .fold(1.0, f64::max)
}

/// Price factor for items whose age has been overtaken by research.
///
/// Each discovered recipe one age above the item's age takes
/// `obsolescenceRate` off the price, bottoming out at
/// `1 - obsolescenceMaxDebuff`.
pub fn obsolescence_factor(state: &GameState, rules: &Rules, item: &str) -> Result<f64, RulesError> {
    let age = rules.material(item)?.age;
    let mut newer = 0u32;
    for recipe in &state.discovered_recipes {
        if rules.recipe(recipe.as_str())?.age == age + 1 {
            newer += 1;
        }
    }
    let market = &rules.market;
    let factor = 1.0 - newer as f64 * market.obsolescence_rate;
    Ok(factor.max(1.0 - market.obsolescence_max_debuff))
}

/// Multiplier of the active market event on `item`, or 1.0.
pub fn event_multiplier(state: &GameState, item: &str) -> f64 {
    state
        .market_events
        .iter()
        .find(|e| e.item_id.as_str() == item && e.expires_at > state.tick)
        .map_or(1.0, |e| e.multiplier)
}

/// Everything except popularity, which changes unit by unit during a sale.
fn static_multiplier(state: &GameState, rules: &Rules, item: &str) -> Result<f64, RulesError> {
    Ok(diversification_multiplier(state, rules, item)
        * obsolescence_factor(state, rules, item)?
        * event_multiplier(state, item))
}

/// Current price of one unit of `item`.
pub fn unit_price(state: &GameState, rules: &Rules, item: &str) -> Result<f64, RulesError> {
    let base = rules.material(item)?.base_price;
    let popularity = clamp_popularity(&rules.market, state.popularity(item));
    Ok(base * popularity * static_multiplier(state, rules, item)?)
}

/// Decay rate applied after the `index`-th unit (0-based) of one sale, and
/// whether that unit counts as oversold.
fn decay_tier(market: &MarketRules, index: u64) -> (f64, bool) {
    if index < market.base_tier_units {
        (market.decay_rate_base, false)
    } else if index < market.medium_tier_units {
        (market.decay_rate_medium, false)
    } else {
        (market.decay_rate_high, true)
    }
}

// ---------------------------------------------------------------------------
// Selling
// ---------------------------------------------------------------------------

/// Price a sale without applying it.
pub fn quote_sale(
    state: &GameState,
    rules: &Rules,
    item: &str,
    quantity: u64,
) -> Result<SaleQuote, ActionError> {
    if quantity == 0 {
        return Err(ActionError::InvalidQuantity);
    }
    let def = rules
        .material(item)
        .map_err(|_| ActionError::ItemNotFound(item.to_string()))?;
    let available = state.inventory.quantity(item);
    if available < quantity {
        return Err(ActionError::InsufficientMaterial {
            material: item.to_string(),
            needed: quantity,
            available,
        });
    }

    let market = &rules.market;
    let multiplier = static_multiplier(state, rules, item)?;
    let mut popularity = clamp_popularity(market, state.popularity(item));
    let mut damage = state.market_damage.get(item).copied().unwrap_or(0.0);
    let mut revenue = 0.0;

    for index in 0..quantity {
        revenue += def.base_price * popularity * multiplier;
        let (rate, oversold) = decay_tier(market, index);
        popularity = clamp_popularity(market, popularity * (1.0 - rate));
        if oversold {
            damage += market.damage_per_oversold_unit;
        }
    }

    Ok(SaleQuote {
        item: MaterialId::new(item),
        units: quantity,
        revenue,
        popularity_after: popularity,
        damage_after: damage,
    })
}

/// Sell `quantity` units of `item` from inventory.
///
/// Credits the revenue, records the sale and its average price, and applies
/// the tiered popularity decay. Nothing changes on error.
pub fn sell(state: &mut GameState, rules: &Rules, item: &str, quantity: u64) -> Result<SaleQuote, ActionError> {
    let quote = quote_sale(state, rules, item, quantity)?;
    if !state.inventory.try_remove(item, quantity) {
        return Err(ActionError::InsufficientMaterial {
            material: item.to_string(),
            needed: quantity,
            available: state.inventory.quantity(item),
        });
    }

    state.credits += quote.revenue;
    state
        .market_popularity
        .insert(quote.item.clone(), quote.popularity_after);
    if quote.damage_after > 0.0 {
        state.market_damage.insert(quote.item.clone(), quote.damage_after);
    }
    state.market_recent_sales.push(RecentSale {
        tick: state.tick,
        item_id: quote.item.clone(),
    });
    state.market_price_history.push(PricePoint {
        tick: state.tick,
        item_id: quote.item.clone(),
        price: quote.average_price(),
    });
    trim_front(&mut state.market_recent_sales, rules.market.recent_sales_limit);
    trim_front(&mut state.market_price_history, rules.market.price_history_limit);

    tracing::debug!(
        tick = state.tick,
        item,
        quantity,
        revenue = quote.revenue,
        popularity = quote.popularity_after,
        "goods sold"
    );
    Ok(quote)
}

fn trim_front<T>(items: &mut Vec<T>, limit: usize) {
    if items.len() > limit {
        let excess = items.len() - limit;
        items.drain(..excess);
    }
}

// ---------------------------------------------------------------------------
// Per-tick dynamics
// ---------------------------------------------------------------------------

/// Items sold at exactly `tick`.
pub fn sold_at(state: &GameState, tick: Ticks) -> BTreeSet<MaterialId> {
    state
        .market_recent_sales
        .iter()
        .filter(|sale| sale.tick == tick)
        .map(|sale| sale.item_id.clone())
        .collect()
}

/// Heal damage and pull popularity back toward 1.0 for every tracked item
/// not in `skip`.
///
/// Recovery is slowed by damage:
/// `recoveryRate / (1 + damage / damagePenaltyFactor)`.
pub fn recover(state: &mut GameState, rules: &Rules, skip: &BTreeSet<MaterialId>) {
    let market = &rules.market;

    state.market_damage.retain(|item, damage| {
        if !skip.contains(item) {
            *damage = (*damage - market.damage_healing_rate).max(0.0);
        }
        *damage > 0.0
    });

    for (item, popularity) in state.market_popularity.iter_mut() {
        if skip.contains(item) {
            continue;
        }
        let damage = state.market_damage.get(item).copied().unwrap_or(0.0);
        let recovery = market.recovery_rate / (1.0 + damage / market.damage_penalty_factor);
        *popularity = if *popularity < 1.0 {
            (*popularity + recovery).min(1.0)
        } else {
            (*popularity - recovery).max(1.0)
        };
        *popularity = clamp_popularity(market, *popularity);
    }
}

/// Expire finished events, then give each tracked item without an active
/// event a chance to start one. Returns the events started this call.
pub fn roll_events(state: &mut GameState, rules: &Rules, rng: &mut SimRng) -> Vec<MarketEvent> {
    let tick = state.tick;
    state.market_events.retain(|e| e.expires_at > tick);

    let market = &rules.market;
    let mut started = Vec::new();
    for item in state.market_popularity.keys() {
        if state.market_events.iter().any(|e| &e.item_id == item) {
            continue;
        }
        if !rng.chance(market.event_chance) {
            continue;
        }
        let multiplier = if rng.chance(0.5) {
            1.0 + market.event_magnitude
        } else {
            (1.0 - market.event_magnitude).max(0.0)
        };
        tracing::info!(tick, item = %item, multiplier, "market event started");
        started.push(MarketEvent {
            item_id: item.clone(),
            multiplier,
            expires_at: tick + market.event_duration,
        });
    }
    state.market_events.extend(started.iter().cloned());
    started
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundry_core::id::RecipeId;
    use foundry_core::test_utils::{sample_rules, sample_state};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn stocked(item: &str, quantity: u64) -> (Rules, GameState) {
        let rules = sample_rules();
        let mut state = sample_state(&rules);
        state.inventory.clear();
        state.credits = 0.0;
        state.inventory.add(&MaterialId::new(item), quantity);
        (rules, state)
    }

    // -----------------------------------------------------------------------
    // Selling
    // -----------------------------------------------------------------------

    #[test]
    fn selling_moves_goods_into_credits() {
        let (rules, mut state) = stocked("iron_ingot", 10);
        let sale = sell(&mut state, &rules, "iron_ingot", 5).unwrap();
        assert_eq!(state.inventory.quantity("iron_ingot"), 5);
        assert!(state.credits > 0.0);
        assert!(approx(state.credits, sale.revenue));
        assert_eq!(state.market_recent_sales.len(), 1);
        assert_eq!(state.market_price_history.len(), 1);
    }

    #[test]
    fn selling_everything_drops_the_key() {
        let (rules, mut state) = stocked("iron_ingot", 3);
        sell(&mut state, &rules, "iron_ingot", 3).unwrap();
        assert!(state.inventory.is_empty());
    }

    #[test]
    fn first_unit_sells_at_base_price() {
        let (rules, state) = stocked("iron_ingot", 1);
        let quote = quote_sale(&state, &rules, "iron_ingot", 1).unwrap();
        assert!(approx(quote.revenue, 5.0));
        assert!(approx(quote.popularity_after, 0.99));
    }

    #[test]
    fn selling_rejects_bad_requests_without_changes() {
        let (rules, mut state) = stocked("iron_ingot", 2);
        let before = state.clone();
        assert!(matches!(
            sell(&mut state, &rules, "iron_ingot", 3),
            Err(ActionError::InsufficientMaterial { .. })
        ));
        assert!(matches!(
            sell(&mut state, &rules, "unobtainium", 1),
            Err(ActionError::ItemNotFound(_))
        ));
        assert_eq!(sell(&mut state, &rules, "iron_ingot", 0), Err(ActionError::InvalidQuantity));
        assert_eq!(state, before);
    }

    #[test]
    fn decay_steepens_across_tiers() {
        let (rules, state) = stocked("iron_ingot", 100);
        let ten = quote_sale(&state, &rules, "iron_ingot", 10).unwrap();
        assert!(approx(ten.popularity_after, 0.99f64.powi(10)));
        assert_eq!(ten.damage_after, 0.0);

        let thirty = quote_sale(&state, &rules, "iron_ingot", 30).unwrap();
        let expected = 0.99f64.powi(10) * 0.98f64.powi(15) * 0.96f64.powi(5);
        assert!(approx(thirty.popularity_after, expected));
        // Five units in the high tier.
        assert!(approx(thirty.damage_after, 0.25));
    }

    #[test]
    fn popularity_never_falls_below_floor() {
        let (rules, mut state) = stocked("iron_ingot", 1000);
        sell(&mut state, &rules, "iron_ingot", 1000).unwrap();
        assert!(approx(state.popularity("iron_ingot"), rules.market.min_popularity));
    }

    #[test]
    fn history_is_bounded() {
        let (mut rules, mut state) = stocked("iron_ingot", 100);
        rules.market.price_history_limit = 3;
        rules.market.recent_sales_limit = 2;
        for _ in 0..5 {
            sell(&mut state, &rules, "iron_ingot", 1).unwrap();
        }
        assert_eq!(state.market_price_history.len(), 3);
        assert_eq!(state.market_recent_sales.len(), 2);
    }

    // -----------------------------------------------------------------------
    // Price components
    // -----------------------------------------------------------------------

    #[test]
    fn diversification_counts_the_current_item() {
        let (rules, mut state) = stocked("iron_ingot", 1);
        assert_eq!(diversification_multiplier(&state, &rules, "iron_ingot"), 1.0);
        for item in ["copper_ingot", "iron_plate"] {
            state.market_recent_sales.push(RecentSale {
                tick: 0,
                item_id: MaterialId::new(item),
            });
        }
        assert_eq!(diversification_multiplier(&state, &rules, "iron_ingot"), 1.10);
    }

    #[test]
    fn diversification_ignores_sales_outside_window() {
        let (rules, mut state) = stocked("iron_ingot", 1);
        for item in ["copper_ingot", "iron_plate"] {
            state.market_recent_sales.push(RecentSale {
                tick: 0,
                item_id: MaterialId::new(item),
            });
        }
        state.tick = rules.market.diversification_window;
        assert_eq!(diversification_multiplier(&state, &rules, "iron_ingot"), 1.0);
    }

    #[test]
    fn obsolescence_is_capped() {
        let (rules, mut state) = stocked("iron_ingot", 1);
        assert_eq!(obsolescence_factor(&state, &rules, "iron_ingot").unwrap(), 1.0);
        state.discovered_recipes.push(RecipeId::new("gear"));
        state.discovered_recipes.push(RecipeId::new("steel"));
        assert!(approx(obsolescence_factor(&state, &rules, "iron_ingot").unwrap(), 0.9));

        let mut rules = rules;
        rules.market.obsolescence_rate = 0.5;
        assert!(approx(obsolescence_factor(&state, &rules, "iron_ingot").unwrap(), 0.7));
        // Age-2 items are untouched by age-2 discoveries.
        assert_eq!(obsolescence_factor(&state, &rules, "gear").unwrap(), 1.0);
    }

    #[test]
    fn active_event_scales_price() {
        let (rules, mut state) = stocked("iron_ingot", 1);
        state.market_events.push(MarketEvent {
            item_id: MaterialId::new("iron_ingot"),
            multiplier: 1.25,
            expires_at: 10,
        });
        assert!(approx(unit_price(&state, &rules, "iron_ingot").unwrap(), 6.25));
        state.tick = 10;
        assert!(approx(unit_price(&state, &rules, "iron_ingot").unwrap(), 5.0));
    }

    // -----------------------------------------------------------------------
    // Dynamics
    // -----------------------------------------------------------------------

    #[test]
    fn recovery_moves_toward_neutral() {
        let (rules, mut state) = stocked("iron_ingot", 1);
        state.market_popularity.insert(MaterialId::new("iron_ingot"), 0.5);
        state.market_popularity.insert(MaterialId::new("gear"), 1.5);
        recover(&mut state, &rules, &BTreeSet::new());
        assert!(approx(state.popularity("iron_ingot"), 0.51));
        assert!(approx(state.popularity("gear"), 1.49));
    }

    #[test]
    fn damage_slows_recovery_and_heals() {
        let (rules, mut state) = stocked("iron_ingot", 1);
        state.market_popularity.insert(MaterialId::new("iron_ingot"), 0.5);
        state.market_damage.insert(MaterialId::new("iron_ingot"), 1.01);
        recover(&mut state, &rules, &BTreeSet::new());
        // Damage heals to 1.0 first, halving recovery.
        assert!(approx(state.market_damage["iron_ingot"], 1.0));
        assert!(approx(state.popularity("iron_ingot"), 0.505));
    }

    #[test]
    fn items_sold_this_tick_do_not_recover() {
        let (rules, mut state) = stocked("iron_ingot", 10);
        sell(&mut state, &rules, "iron_ingot", 5).unwrap();
        let after_sale = state.popularity("iron_ingot");
        let skip = sold_at(&state, state.tick);
        recover(&mut state, &rules, &skip);
        assert_eq!(state.popularity("iron_ingot"), after_sale);
    }

    #[test]
    fn certain_events_start_once_per_item_and_expire() {
        let (mut rules, mut state) = stocked("iron_ingot", 1);
        rules.market.event_chance = 1.0;
        state.market_popularity.insert(MaterialId::new("iron_ingot"), 1.0);
        state.market_popularity.insert(MaterialId::new("gear"), 1.0);
        let mut rng = SimRng::new(7);

        let started = roll_events(&mut state, &rules, &mut rng);
        assert_eq!(started.len(), 2);
        assert!(roll_events(&mut state, &rules, &mut rng).is_empty());

        state.tick = rules.market.event_duration;
        let started = roll_events(&mut state, &rules, &mut rng);
        assert_eq!(started.len(), 2);
        assert_eq!(state.market_events.len(), 2);
    }

    #[test]
    fn zero_chance_never_starts_events() {
        let (mut rules, mut state) = stocked("iron_ingot", 1);
        rules.market.event_chance = 0.0;
        state.market_popularity.insert(MaterialId::new("iron_ingot"), 1.0);
        let mut rng = SimRng::new(7);
        for _ in 0..100 {
            assert!(roll_events(&mut state, &rules, &mut rng).is_empty());
        }
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn popularity_stays_in_bounds(sales in prop::collection::vec(1u64..60, 1..20), idle in 0usize..50) {
                let (rules, mut state) = stocked("iron_ingot", 2000);
                for quantity in sales {
                    sell(&mut state, &rules, "iron_ingot", quantity).unwrap();
                    state.tick += 1;
                }
                for _ in 0..idle {
                    recover(&mut state, &rules, &BTreeSet::new());
                }
                let p = state.popularity("iron_ingot");
                prop_assert!(p >= rules.market.min_popularity && p <= rules.market.max_popularity);
                prop_assert!(state.credits >= 0.0);
                prop_assert!(state.market_damage.values().all(|d| *d > 0.0));
            }
        }
    }
}
