//! Pick stations: a ring of frames where fresh elements wait to be picked.

use clayfab_robotics::Frame;
use serde::{Deserialize, Serialize};

use crate::element::{ElementId, FabricationElement};
use crate::error::FabError;

/// Cyclic source of pick poses.
///
/// Owned by the runner; the counter only ever moves forward.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PickStationData")]
pub struct PickStation {
    pick_frames: Vec<Frame>,
    elem_height: f64,
    elem_egress_distance: f64,
    elem_radius: f64,
    station_egress_distance: f64,
    #[serde(skip)]
    counter: usize,
}

#[derive(Deserialize)]
struct PickStationData {
    pick_frames: Vec<Frame>,
    elem_height: f64,
    elem_egress_distance: f64,
    #[serde(default = "default_elem_radius")]
    elem_radius: f64,
    #[serde(default = "default_station_egress_distance")]
    station_egress_distance: f64,
}

fn default_elem_radius() -> f64 {
    45.0
}

fn default_station_egress_distance() -> f64 {
    500.0
}

impl TryFrom<PickStationData> for PickStation {
    type Error = FabError;

    fn try_from(data: PickStationData) -> Result<Self, Self::Error> {
        let mut station = PickStation::new(data.pick_frames, data.elem_height, data.elem_egress_distance)?;
        station.elem_radius = positive("elem_radius", data.elem_radius)?;
        station.station_egress_distance = non_negative("station_egress_distance", data.station_egress_distance)?;
        Ok(station)
    }
}

fn positive(name: &str, value: f64) -> Result<f64, FabError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(FabError::Validation(format!("pick station {} must be positive, got {}", name, value)))
    }
}

fn non_negative(name: &str, value: f64) -> Result<f64, FabError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(FabError::Validation(format!("pick station {} must be non-negative, got {}", name, value)))
    }
}

impl PickStation {
    pub fn new(pick_frames: Vec<Frame>, elem_height: f64, elem_egress_distance: f64) -> Result<Self, FabError> {
        if pick_frames.is_empty() {
            return Err(FabError::Validation("pick station needs at least one pick frame".to_string()));
        }
        Ok(Self {
            pick_frames,
            elem_height: positive("elem_height", elem_height)?,
            elem_egress_distance: non_negative("elem_egress_distance", elem_egress_distance)?,
            elem_radius: default_elem_radius(),
            station_egress_distance: default_station_egress_distance(),
            counter: 0,
        })
    }

    /// Element at the next pick frame, inheriting the station defaults.
    pub fn next_pick_element(&mut self) -> FabricationElement {
        let index = self.counter % self.pick_frames.len();
        let element = FabricationElement::unchecked(
            ElementId::Text(format!("pick-{}", self.counter)),
            self.pick_frames[index].clone(),
            self.elem_radius,
            self.elem_height,
            1.0,
            self.elem_egress_distance,
        );
        self.counter += 1;
        element
    }

    /// First pick frame moved `station_egress_distance` along its approach.
    pub fn station_egress_frame(&self) -> Frame {
        let first = &self.pick_frames[0];
        first.translated(&first.approach(), self.station_egress_distance)
    }

    pub fn pick_frames(&self) -> &[Frame] {
        &self.pick_frames
    }

    pub fn counter(&self) -> usize {
        self.counter
    }

    pub fn with_station_egress_distance(mut self, distance: f64) -> Result<Self, FabError> {
        self.station_egress_distance = non_negative("station_egress_distance", distance)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn frames(n: usize) -> Vec<Frame> {
        (0..n)
            .map(|i| Frame::worldxy().translated(&Vector3::x(), 100.0 * i as f64))
            .collect()
    }

    #[test]
    fn test_empty_frames_rejected() {
        assert!(matches!(PickStation::new(vec![], 100.0, 50.0), Err(FabError::Validation(_))));
        let json = serde_json::json!({"pick_frames": [], "elem_height": 100, "elem_egress_distance": 50});
        assert!(serde_json::from_value::<PickStation>(json).is_err());
    }

    #[test]
    fn test_cyclic_order() {
        let pick_frames = frames(3);
        let mut station = PickStation::new(pick_frames.clone(), 100.0, 50.0).unwrap();
        for i in 0..10 {
            let elem = station.next_pick_element();
            assert_eq!(elem.location(), &pick_frames[i % 3]);
            assert_eq!(elem.height(), 100.0);
            assert_eq!(elem.egress_distance(), 50.0);
        }
        assert_eq!(station.counter(), 10);
    }

    #[test]
    fn test_station_egress_frame() {
        let station = PickStation::new(frames(2), 100.0, 50.0)
            .unwrap()
            .with_station_egress_distance(300.0)
            .unwrap();
        assert!((station.station_egress_frame().point().z + 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_counter_not_persisted() {
        let mut station = PickStation::new(frames(2), 100.0, 50.0).unwrap();
        station.next_pick_element();
        let json = serde_json::to_value(&station).unwrap();
        assert!(json.get("counter").is_none());
        let back: PickStation = serde_json::from_value(json).unwrap();
        assert_eq!(back.counter(), 0);
        assert_eq!(back.pick_frames(), station.pick_frames());
    }
}
