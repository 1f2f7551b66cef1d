//! Zone classification attached to route waypoints.

use serde::{Deserialize, Serialize};

/// Known zone classes. Tags outside this set map to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneType {
    Hallway,
    RestArea,
    Stairs,
    Unknown,
}

impl ZoneType {
    /// Classify a raw `zoneType` property value
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("hallway") => ZoneType::Hallway,
            Some("rest_area") => ZoneType::RestArea,
            Some("stairs") => ZoneType::Stairs,
            _ => ZoneType::Unknown,
        }
    }

    /// Spoken description used in guidance text
    pub fn description(&self) -> &'static str {
        match self {
            ZoneType::Hallway => "un pasillo",
            ZoneType::RestArea => "una zona de descanso",
            ZoneType::Stairs => "unas escaleras",
            ZoneType::Unknown => "una zona desconocida",
        }
    }
}

impl std::fmt::Display for ZoneType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZoneType::Hallway => write!(f, "hallway"),
            ZoneType::RestArea => write!(f, "rest_area"),
            ZoneType::Stairs => write!(f, "stairs"),
            ZoneType::Unknown => write!(f, "unknown"),
        }
    }
}
