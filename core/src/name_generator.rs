//! Deterministic customer names for demo data.
//!
//! Same RNG stream, same names.

use crate::rng::AlgorithmRng;

pub struct NameGenerator;

impl NameGenerator {
    pub fn full_name(rng: &mut AlgorithmRng) -> String {
        let first = Self::pick(rng, FIRST_NAMES);
        let last = Self::pick(rng, LAST_NAMES);
        format!("{first} {last}")
    }

    fn pick(rng: &mut AlgorithmRng, names: &'static [&'static str]) -> &'static str {
        names[rng.next_u64_below(names.len() as u64) as usize]
    }
}

const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "Robert", "Patricia", "John", "Jennifer", "Michael", "Linda", "David",
    "Elizabeth", "William", "Barbara", "Richard", "Susan", "Joseph", "Jessica", "Thomas", "Sarah",
    "Carlos", "Maria", "Wei", "Mei", "Arjun", "Priya", "Kwame", "Amara", "Hiroshi", "Yuki",
    "Mateo", "Sofia", "Omar", "Fatima", "Lars", "Ingrid", "Minh", "Lan", "Diego", "Camila",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Wilson", "Anderson", "Thomas", "Taylor", "Moore", "Jackson",
    "Nguyen", "Tran", "Chen", "Wang", "Patel", "Singh", "Okafor", "Mensah", "Tanaka", "Sato",
    "Rossi", "Silva", "Haddad", "Larsen", "Kowalski", "Novak", "Pham", "Le",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{RngBank, RngSlot};

    #[test]
    fn same_stream_same_names() {
        let bank = RngBank::new(7);
        let mut a = bank.for_slot(RngSlot::DemoData);
        let mut b = bank.for_slot(RngSlot::DemoData);
        for _ in 0..10 {
            assert_eq!(NameGenerator::full_name(&mut a), NameGenerator::full_name(&mut b));
        }
    }
}
