//! Fabrication elements: one clay cylinder to pick, place and compress.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::f64::consts::PI;

use chrono::{DateTime, Utc};
use clayfab_robotics::{Frame, MinimalTrajectories, MinimalTrajectory};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FabError;

/// Stable element identifier, numeric or textual.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ElementId {
    Int(i64),
    Text(String),
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementId::Int(n) => write!(f, "{}", n),
            ElementId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for ElementId {
    fn from(n: i64) -> Self {
        ElementId::Int(n)
    }
}

impl From<i32> for ElementId {
    fn from(n: i32) -> Self {
        ElementId::Int(n.into())
    }
}

impl From<String> for ElementId {
    fn from(s: String) -> Self {
        ElementId::Text(s)
    }
}

impl From<&str> for ElementId {
    fn from(s: &str) -> Self {
        ElementId::Text(s.to_string())
    }
}

/// One cylinder of the structure.
///
/// `location` is the bottom centre of the uncompressed cylinder. Geometry is
/// validated once at construction; derived frames and volumes never fail
/// afterwards.
///
/// Trajectories are optional. Missing place trajectories default to a
/// Cartesian approach `(egress → top)` followed by `(compressed top)`, and
/// missing return trajectories are the two-level reversal of their forward
/// counterparts. Defaults are computed on access and never stored, so a
/// round trip through JSON keeps absent fields absent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ElementData")]
pub struct FabricationElement {
    pub id: ElementId,
    location: Frame,
    radius: f64,
    height: f64,
    compression_ratio: f64,
    egress_distance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    density: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    travel_trajectories: Option<MinimalTrajectories>,
    #[serde(skip_serializing_if = "Option::is_none")]
    place_trajectories: Option<MinimalTrajectories>,
    #[serde(skip_serializing_if = "Option::is_none")]
    return_travel_trajectories: Option<MinimalTrajectories>,
    #[serde(skip_serializing_if = "Option::is_none")]
    return_place_trajectories: Option<MinimalTrajectories>,
    pub placed: bool,
    pub time_placed: Option<DateTime<Utc>>,
    /// Seconds, measured on the controller
    pub cycle_time: Option<f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, Value>,
}

/// On-disk form, validated into [`FabricationElement`].
#[derive(Deserialize)]
struct ElementData {
    #[serde(alias = "bullet_id")]
    id: ElementId,
    location: Frame,
    #[serde(default = "default_radius")]
    radius: f64,
    #[serde(default = "default_height")]
    height: f64,
    #[serde(default = "default_compression_ratio")]
    compression_ratio: f64,
    #[serde(default = "default_egress_distance")]
    egress_distance: f64,
    #[serde(default)]
    density: Option<f64>,
    #[serde(default)]
    travel_trajectories: Option<MinimalTrajectories>,
    #[serde(default)]
    place_trajectories: Option<MinimalTrajectories>,
    #[serde(default)]
    return_travel_trajectories: Option<MinimalTrajectories>,
    #[serde(default)]
    return_place_trajectories: Option<MinimalTrajectories>,
    #[serde(default)]
    placed: bool,
    #[serde(default)]
    time_placed: Option<DateTime<Utc>>,
    #[serde(default)]
    cycle_time: Option<f64>,
    #[serde(default)]
    attrs: BTreeMap<String, Value>,
}

fn default_radius() -> f64 {
    45.0
}

fn default_height() -> f64 {
    100.0
}

fn default_compression_ratio() -> f64 {
    0.5
}

fn default_egress_distance() -> f64 {
    150.0
}

impl TryFrom<ElementData> for FabricationElement {
    type Error = FabError;

    fn try_from(data: ElementData) -> Result<Self, Self::Error> {
        let mut elem = FabricationElement::new(
            data.id,
            data.location,
            data.radius,
            data.height,
            data.compression_ratio,
            data.egress_distance,
        )?;
        elem.set_density(data.density)?;
        if let Some(t) = data.travel_trajectories {
            elem.set_travel_trajectories(t);
        }
        if let Some(t) = data.place_trajectories {
            elem.set_place_trajectories(t)?;
        }
        if let Some(t) = data.return_travel_trajectories {
            elem.set_return_travel_trajectories(t);
        }
        if let Some(t) = data.return_place_trajectories {
            elem.set_return_place_trajectories(t)?;
        }
        elem.placed = data.placed;
        elem.time_placed = data.time_placed;
        elem.cycle_time = data.cycle_time;
        elem.attrs = data.attrs;
        Ok(elem)
    }
}

fn check_positive(name: &str, value: f64) -> Result<(), FabError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(FabError::Validation(format!("{} must be positive, got {}", name, value)))
    }
}

impl FabricationElement {
    pub fn new(
        id: impl Into<ElementId>,
        location: Frame,
        radius: f64,
        height: f64,
        compression_ratio: f64,
        egress_distance: f64,
    ) -> Result<Self, FabError> {
        let id = id.into();
        check_positive("radius", radius)?;
        check_positive("height", height)?;
        if !(compression_ratio > 0.0 && compression_ratio <= 1.0) {
            return Err(FabError::Validation(format!(
                "element {}: compression_ratio must be in (0, 1], got {}",
                id, compression_ratio
            )));
        }
        if !(egress_distance.is_finite() && egress_distance >= 0.0) {
            return Err(FabError::Validation(format!(
                "element {}: egress_distance must be non-negative, got {}",
                id, egress_distance
            )));
        }
        Ok(Self::unchecked(id, location, radius, height, compression_ratio, egress_distance))
    }

    /// Construction for values validated elsewhere, e.g. pick station
    /// defaults.
    pub(crate) fn unchecked(
        id: ElementId,
        location: Frame,
        radius: f64,
        height: f64,
        compression_ratio: f64,
        egress_distance: f64,
    ) -> Self {
        Self {
            id,
            location,
            radius,
            height,
            compression_ratio,
            egress_distance,
            density: None,
            travel_trajectories: None,
            place_trajectories: None,
            return_travel_trajectories: None,
            return_place_trajectories: None,
            placed: false,
            time_placed: None,
            cycle_time: None,
            attrs: BTreeMap::new(),
        }
    }

    pub fn from_json_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn to_json_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn location(&self) -> &Frame {
        &self.location
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn compression_ratio(&self) -> f64 {
        self.compression_ratio
    }

    pub fn egress_distance(&self) -> f64 {
        self.egress_distance
    }

    pub fn density(&self) -> Option<f64> {
        self.density
    }

    /// Density in kg/m³.
    pub fn set_density(&mut self, density: Option<f64>) -> Result<(), FabError> {
        if let Some(d) = density {
            check_positive("density", d)?;
        }
        self.density = density;
        Ok(())
    }

    /// Uncompressed top: `location` moved `height` along the approach.
    pub fn top_frame(&self) -> Frame {
        self.location.translated(&self.location.approach(), self.height)
    }

    pub fn compressed_top_frame(&self) -> Frame {
        self.location
            .translated(&self.location.approach(), self.compressed_height())
    }

    /// Stand-off above the element, `egress_distance` past the top.
    pub fn egress_frame(&self) -> Frame {
        self.top_frame()
            .translated(&self.location.approach(), self.egress_distance)
    }

    /// mm³
    pub fn volume(&self) -> f64 {
        PI * self.radius * self.radius * self.height
    }

    pub fn compressed_height(&self) -> f64 {
        self.height * self.compression_ratio
    }

    /// Radius after compression, assuming the volume is preserved.
    pub fn compressed_radius(&self) -> f64 {
        (self.volume() / (self.compressed_height() * PI)).sqrt()
    }

    /// Weight in kg when a density is known.
    pub fn weight_kg(&self) -> Option<f64> {
        self.density.map(|d| d * self.volume() * 1e-9)
    }

    pub fn travel_trajectories(&self) -> Cow<'_, MinimalTrajectories> {
        match &self.travel_trajectories {
            Some(t) => Cow::Borrowed(t),
            None => Cow::Owned(MinimalTrajectories::default()),
        }
    }

    pub fn place_trajectories(&self) -> Cow<'_, MinimalTrajectories> {
        match &self.place_trajectories {
            Some(t) => Cow::Borrowed(t),
            None => Cow::Owned(self.default_place_trajectories()),
        }
    }

    pub fn return_travel_trajectories(&self) -> Cow<'_, MinimalTrajectories> {
        match &self.return_travel_trajectories {
            Some(t) => Cow::Borrowed(t),
            None => Cow::Owned(self.travel_trajectories().reversed()),
        }
    }

    pub fn return_place_trajectories(&self) -> Cow<'_, MinimalTrajectories> {
        match &self.return_place_trajectories {
            Some(t) => Cow::Borrowed(t),
            None => Cow::Owned(self.place_trajectories().reversed()),
        }
    }

    fn default_place_trajectories(&self) -> MinimalTrajectories {
        MinimalTrajectories::new(vec![
            MinimalTrajectory::Frames(vec![self.egress_frame(), self.top_frame()]),
            MinimalTrajectory::Frames(vec![self.compressed_top_frame()]),
        ])
    }

    pub fn set_travel_trajectories(&mut self, trajectories: MinimalTrajectories) {
        self.travel_trajectories = Some(trajectories);
    }

    pub fn set_return_travel_trajectories(&mut self, trajectories: MinimalTrajectories) {
        self.return_travel_trajectories = Some(trajectories);
    }

    /// Place trajectories end with the compression stroke, so at least one
    /// is required.
    pub fn set_place_trajectories(&mut self, trajectories: MinimalTrajectories) -> Result<(), FabError> {
        if trajectories.is_empty() {
            return Err(FabError::Validation(format!(
                "element {}: place_trajectories must not be empty",
                self.id
            )));
        }
        self.place_trajectories = Some(trajectories);
        Ok(())
    }

    pub fn set_return_place_trajectories(&mut self, trajectories: MinimalTrajectories) -> Result<(), FabError> {
        if trajectories.is_empty() {
            return Err(FabError::Validation(format!(
                "element {}: return_place_trajectories must not be empty",
                self.id
            )));
        }
        self.return_place_trajectories = Some(trajectories);
        Ok(())
    }

    /// Mark placed now, keeping the invariant that placed elements carry a
    /// timestamp.
    pub fn mark_placed(&mut self, at: DateTime<Utc>) {
        self.placed = true;
        self.time_placed = Some(at);
    }

    pub fn mark_unplaced(&mut self) {
        self.placed = false;
        self.time_placed = None;
        self.cycle_time = None;
    }
}
