use std::collections::BTreeMap;
use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const MAX_SUBSTAT: u8 = 15;
pub const MAX_SUBSTAT_SUM: u32 = 45;

/// Remote identifier of one owned creature.
///
/// The remote service hands these out as 64-bit integers, which some payload
/// producers emit as JSON strings to stay clear of double precision limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CreatureId(pub u64);

impl fmt::Display for CreatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for CreatureId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for CreatureId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum IdInput {
            String(String),
            Number(u64),
        }

        match IdInput::deserialize(deserializer)? {
            IdInput::String(raw) => raw.parse::<u64>().map(Self).map_err(D::Error::custom),
            IdInput::Number(value) => Ok(Self(value)),
        }
    }
}

/// Quality of a substat triple as a fraction of the best possible roll.
pub fn quality(stamina: u8, attack: u8, defense: u8) -> f64 {
    let sum = u32::from(stamina) + u32::from(attack) + u32::from(defense);
    f64::from(sum) / f64::from(MAX_SUBSTAT_SUM)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    pub id: CreatureId,
    pub species_id: u32,
    pub name: String,
    pub family_id: u32,
    pub stamina: u8,
    pub attack: u8,
    pub defense: u8,
    pub power: u32,
    /// Currency needed to evolve this species once; `None` for final stages.
    pub upgrade_cost: Option<u32>,
    /// Position in the snapshot, used to break quality ties.
    pub ordinal: usize,
}

impl Individual {
    pub fn substat_sum(&self) -> u32 {
        u32::from(self.stamina) + u32::from(self.attack) + u32::from(self.defense)
    }

    pub fn quality(&self) -> f64 {
        quality(self.stamina, self.attack, self.defense)
    }

    /// True when this individual is the root of its evolution family.
    pub fn is_base_form(&self) -> bool {
        self.species_id == self.family_id
    }
}

/// Flat view of one inventory read: every owned individual in payload order
/// plus the currency held per family.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub individuals: Vec<Individual>,
    pub balances: BTreeMap<u32, u32>,
}

impl Snapshot {
    pub fn balance(&self, family_id: u32) -> u32 {
        self.balances.get(&family_id).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }
}

/// Partition of a snapshot into retained and surplus individuals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionSet {
    pub keep: Vec<Individual>,
    pub surplus: Vec<Individual>,
}

impl SelectionSet {
    pub fn len(&self) -> usize {
        self.keep.len() + self.surplus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keep.is_empty() && self.surplus.is_empty()
    }

    pub fn is_surplus(&self, id: CreatureId) -> bool {
        self.surplus.iter().any(|individual| individual.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_spans_zero_to_one() {
        assert_eq!(quality(0, 0, 0), 0.0);
        assert_eq!(quality(15, 15, 15), 1.0);
        assert!((quality(15, 0, 0) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn creature_id_accepts_string_and_number() {
        let from_number: CreatureId = serde_json::from_str("1337").expect("numeric id");
        let from_string: CreatureId = serde_json::from_str("\"1337\"").expect("string id");
        assert_eq!(from_number, CreatureId(1337));
        assert_eq!(from_string, CreatureId(1337));
        assert_eq!(
            serde_json::to_string(&from_number).expect("serialize id"),
            "\"1337\""
        );
    }

    #[test]
    fn creature_id_rejects_non_numeric_string() {
        assert!(serde_json::from_str::<CreatureId>("\"abc\"").is_err());
    }
}
