//! Deterministic synthetic purchase history.
//!
//! Customers are drawn from a few behavioural personas so that a fresh
//! database has visibly different groups to segment. Same seed, same
//! customers, same transactions.

use crate::{
    error::SegResult,
    features::TransactionRecord,
    name_generator::NameGenerator,
    rng::{AlgorithmRng, RngBank, RngSlot},
    store::SegStore,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

const CATEGORIES: [&str; 8] = [
    "Electronics",
    "Fashion",
    "Home",
    "Beauty",
    "Sports",
    "Books",
    "Grocery",
    "Toys",
];

/// Days of history generated before the anchor instant.
pub const HISTORY_DAYS: i64 = 365;

struct Persona {
    id: &'static str,
    share: f64,
    orders_min: u64,
    orders_max: u64,
    /// Pareto scale of a single basket amount.
    basket_scale: f64,
    categories: u64,
    /// Most recent activity happens this many days before the anchor, at most.
    recent_within_days: i64,
}

static PERSONAS: [Persona; 4] = [
    Persona {
        id: "champion",
        share: 0.15,
        orders_min: 12,
        orders_max: 30,
        basket_scale: 120.0,
        categories: 6,
        recent_within_days: 14,
    },
    Persona {
        id: "steady",
        share: 0.35,
        orders_min: 4,
        orders_max: 10,
        basket_scale: 45.0,
        categories: 4,
        recent_within_days: 60,
    },
    Persona {
        id: "lapsed",
        share: 0.25,
        orders_min: 2,
        orders_max: 6,
        basket_scale: 80.0,
        categories: 3,
        recent_within_days: 300,
    },
    Persona {
        id: "occasional",
        share: 0.25,
        orders_min: 1,
        orders_max: 2,
        basket_scale: 15.0,
        categories: 2,
        recent_within_days: 200,
    },
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemoStats {
    pub customers: usize,
    pub transactions: usize,
}

/// Insert `customers` synthetic customers and their history, ending at `anchor`.
pub fn seed_demo_transactions(
    store: &SegStore,
    customers: usize,
    seed: u64,
    anchor: DateTime<Utc>,
) -> SegResult<DemoStats> {
    let mut rng = RngBank::new(seed).for_slot(RngSlot::DemoData);
    let mut transactions = 0;

    for i in 0..customers {
        let persona = pick_persona(&mut rng);
        let customer_id = format!("C{i:05}");
        let name = NameGenerator::full_name(&mut rng);
        let first_seen = anchor - Duration::days(HISTORY_DAYS);
        store.upsert_customer(&customer_id, Some(&name), first_seen)?;

        let span = persona.orders_max - persona.orders_min + 1;
        let orders = persona.orders_min + rng.next_u64_below(span);
        let last_day = rng.next_u64_below(persona.recent_within_days as u64 + 1) as i64;

        for o in 0..orders {
            let days_ago = if o == 0 {
                last_day
            } else {
                last_day + rng.next_u64_below((HISTORY_DAYS - last_day).max(1) as u64) as i64
            };
            let occurred_at = anchor - Duration::days(days_ago) - Duration::minutes(o as i64);
            let order_id = format!("{customer_id}-O{o:03}");

            // One or two lines per order.
            let lines = if rng.chance(0.3) { 2 } else { 1 };
            for _ in 0..lines {
                let amount = rng.pareto(persona.basket_scale, 2.2).min(persona.basket_scale * 20.0);
                let category = if rng.chance(0.03) {
                    None
                } else {
                    let c = rng.next_u64_below(persona.categories) as usize;
                    Some(CATEGORIES[c].to_string())
                };
                store.insert_transaction(&TransactionRecord {
                    customer_id: customer_id.clone(),
                    amount: (amount * 100.0).round() / 100.0,
                    occurred_at,
                    category,
                    order_id: Some(order_id.clone()),
                })?;
                transactions += 1;
            }
        }
        log::debug!("demo: {customer_id} persona={} orders={orders}", persona.id);
    }

    log::info!("demo: {customers} customers, {transactions} transactions (seed {seed})");
    Ok(DemoStats {
        customers,
        transactions,
    })
}

fn pick_persona(rng: &mut AlgorithmRng) -> &'static Persona {
    let roll = rng.next_f64();
    let mut cumulative = 0.0;
    for persona in &PERSONAS {
        cumulative += persona.share;
        if roll < cumulative {
            return persona;
        }
    }
    &PERSONAS[PERSONAS.len() - 1]
}
