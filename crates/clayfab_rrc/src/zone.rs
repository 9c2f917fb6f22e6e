//! Fly-by zones.
//!
//! A zone is the radius in millimetres the controller may cut a corner by
//! before reaching a target. `FINE` (-1) stops exactly on the target.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RrcError;

const NAMED: &[(&str, f64)] = &[
    ("FINE", -1.0),
    ("Z0", 0.0),
    ("Z1", 1.0),
    ("Z5", 5.0),
    ("Z10", 10.0),
    ("Z15", 15.0),
    ("Z20", 20.0),
    ("Z30", 30.0),
    ("Z40", 40.0),
    ("Z50", 50.0),
    ("Z60", 60.0),
    ("Z80", 80.0),
    ("Z100", 100.0),
    ("Z150", 150.0),
    ("Z200", 200.0),
];

pub const ZONE_MIN: f64 = -1.0;
pub const ZONE_MAX: f64 = 2000.0;

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Zone(f64);

impl Zone {
    pub const FINE: Zone = Zone(-1.0);
    pub const Z0: Zone = Zone(0.0);
    pub const Z1: Zone = Zone(1.0);
    pub const Z5: Zone = Zone(5.0);
    pub const Z10: Zone = Zone(10.0);
    pub const Z15: Zone = Zone(15.0);
    pub const Z20: Zone = Zone(20.0);
    pub const Z30: Zone = Zone(30.0);
    pub const Z40: Zone = Zone(40.0);
    pub const Z50: Zone = Zone(50.0);
    pub const Z60: Zone = Zone(60.0);
    pub const Z80: Zone = Zone(80.0);
    pub const Z100: Zone = Zone(100.0);
    pub const Z150: Zone = Zone(150.0);
    pub const Z200: Zone = Zone(200.0);

    /// Numeric zone in `[-1, 2000]`.
    pub fn new(value: f64) -> Result<Self, RrcError> {
        if !(ZONE_MIN..=ZONE_MAX).contains(&value) {
            return Err(RrcError::InvalidZone(format!(
                "{} is outside [{}, {}]",
                value, ZONE_MIN, ZONE_MAX
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Name from the controller's predefined set, if this zone is one.
    pub fn name(self) -> Option<&'static str> {
        NAMED.iter().find(|(_, v)| *v == self.0).map(|(n, _)| *n)
    }
}

impl Default for Zone {
    fn default() -> Self {
        Zone::FINE
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{}", self.0),
        }
    }
}

impl FromStr for Zone {
    type Err = RrcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();
        if let Some((_, value)) = NAMED.iter().find(|(name, _)| *name == upper) {
            return Ok(Zone(*value));
        }
        match trimmed.parse::<f64>() {
            Ok(value) => Zone::new(value),
            Err(_) => Err(RrcError::InvalidZone(format!("unknown zone name '{}'", trimmed))),
        }
    }
}

impl Serialize for Zone {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.name() {
            Some(name) => serializer.serialize_str(name),
            None => serializer.serialize_f64(self.0),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ZoneRepr {
    Name(String),
    Number(f64),
}

impl<'de> Deserialize<'de> for Zone {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match ZoneRepr::deserialize(deserializer)? {
            ZoneRepr::Name(name) => name.parse().map_err(serde::de::Error::custom),
            ZoneRepr::Number(value) => Zone::new(value).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_zones() {
        assert_eq!("fine".parse::<Zone>().unwrap(), Zone::FINE);
        assert_eq!("Z10".parse::<Zone>().unwrap().value(), 10.0);
        assert_eq!("z200".parse::<Zone>().unwrap(), Zone::Z200);
        assert!("Z7".parse::<Zone>().is_err());
    }

    #[test]
    fn test_numeric_range() {
        assert_eq!("25".parse::<Zone>().unwrap().value(), 25.0);
        assert!(Zone::new(-1.5).is_err());
        assert!(Zone::new(2000.5).is_err());
        assert!(Zone::new(2000.0).is_ok());
    }

    #[test]
    fn test_serde_forms() {
        let zones: Vec<Zone> = serde_json::from_str(r#"["FINE", "Z20", 12.5, -1]"#).unwrap();
        assert_eq!(zones, vec![Zone::FINE, Zone::Z20, Zone::new(12.5).unwrap(), Zone::FINE]);
        assert_eq!(serde_json::to_string(&zones).unwrap(), r#"["FINE","Z20",12.5,"FINE"]"#);
        assert!(serde_json::from_str::<Zone>("5000").is_err());
    }
}
