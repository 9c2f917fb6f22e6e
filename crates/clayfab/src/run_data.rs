//! Run data: the structure to build plus everything needed to build it.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::element::FabricationElement;
use crate::error::FabError;
use crate::pick_station::PickStation;

/// Top-level run document, rewritten after every placement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunData {
    pub fab_data: Vec<FabricationElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pick_station: Option<PickStation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pick_conf_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conf_path: Option<PathBuf>,
    /// World to robot base, row major
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xform: Option<[[f64; 4]; 4]>,
    #[serde(flatten)]
    pub metadata: BTreeMap<String, Value>,
}

impl RunData {
    pub fn new(fab_data: Vec<FabricationElement>) -> Self {
        Self {
            fab_data,
            pick_station: None,
            pick_conf_path: None,
            log_dir: None,
            conf_path: None,
            xform: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn from_json(json: &str, path: &Path) -> Result<Self, FabError> {
        let data: RunData = serde_json::from_str(json).map_err(|source| FabError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        data.validate()?;
        Ok(data)
    }

    pub fn load(path: &Path) -> Result<Self, FabError> {
        let content = std::fs::read_to_string(path).map_err(|source| FabError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let data = Self::from_json(&content, path)?;
        info!(
            "📂 Loaded {} elements from {} ({} already placed)",
            data.fab_data.len(),
            path.display(),
            data.placed_count()
        );
        Ok(data)
    }

    /// Element ids must be unique within a run.
    pub fn validate(&self) -> Result<(), FabError> {
        let mut seen = HashSet::new();
        for (index, elem) in self.fab_data.iter().enumerate() {
            if !seen.insert(&elem.id) {
                return Err(FabError::Validation(format!(
                    "duplicate element id {} at index {}",
                    elem.id, index
                )));
            }
        }
        if let Some(xform) = &self.xform
            && !xform.iter().flatten().all(|v| v.is_finite())
        {
            return Err(FabError::Validation("xform contains non-finite values".to_string()));
        }
        Ok(())
    }

    pub fn placed_count(&self) -> usize {
        self.fab_data.iter().filter(|e| e.placed).count()
    }

    /// Inline pick station, else the one at `pick_conf_path`, else
    /// `fallback`. Relative paths resolve against `base_dir`.
    pub fn resolve_pick_station(&self, base_dir: &Path, fallback: Option<&Path>) -> Result<PickStation, FabError> {
        if let Some(station) = &self.pick_station {
            return Ok(station.clone());
        }
        let path = self
            .pick_conf_path
            .as_deref()
            .or(fallback)
            .ok_or_else(|| FabError::Validation("run data has neither pick_station nor pick_conf_path".to_string()))?;
        let path = resolve_path(base_dir, path);
        debug!("Loading pick station from {}", path.display());
        let content = std::fs::read_to_string(&path).map_err(|source| FabError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| FabError::Json { path, source })
    }
}

/// `path` as is when absolute, else joined onto `base_dir`.
pub fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PICK: &str = r#"{"pick_frames": [{"point": [0, 0, 0], "xaxis": [1, 0, 0], "yaxis": [0, 1, 0]}], "elem_height": 100, "elem_egress_distance": 50}"#;

    fn element(id: serde_json::Value) -> serde_json::Value {
        serde_json::json!({"id": id, "location": {"point": [0, 0, 0], "xaxis": [1, 0, 0], "yaxis": [0, 1, 0]}})
    }

    #[test]
    fn test_metadata_preserved() {
        let json = serde_json::json!({
            "fab_data": [element(serde_json::json!(1))],
            "log_dir": "logs",
            "xform": [[1, 0, 0, 0], [0, 1, 0, 0], [0, 0, 1, 0], [0, 0, 0, 1]],
            "designer": "studio"
        });
        let data = RunData::from_json(&json.to_string(), Path::new("run.json")).unwrap();
        assert_eq!(data.metadata["designer"], "studio");
        assert_eq!(data.log_dir, Some(PathBuf::from("logs")));
        let out = serde_json::to_value(&data).unwrap();
        assert_eq!(out["designer"], "studio");
        assert!(out.get("pick_station").is_none());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let json = serde_json::json!({"fab_data": [element(serde_json::json!(1)), element(serde_json::json!(1))]});
        assert!(matches!(
            RunData::from_json(&json.to_string(), Path::new("run.json")),
            Err(FabError::Validation(_))
        ));
    }

    #[test]
    fn test_pick_station_from_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pick.json"), PICK).unwrap();
        let json = serde_json::json!({"fab_data": [], "pick_conf_path": "pick.json"});
        let data = RunData::from_json(&json.to_string(), Path::new("run.json")).unwrap();
        let station = data.resolve_pick_station(dir.path(), None).unwrap();
        assert_eq!(station.pick_frames().len(), 1);

        let bare = RunData::new(vec![]);
        assert!(bare.resolve_pick_station(dir.path(), None).is_err());
        assert!(bare.resolve_pick_station(dir.path(), Some(Path::new("pick.json"))).is_ok());
    }
}
