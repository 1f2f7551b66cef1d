//! Directions requests: waypoint assembly plus a passthrough client.
//!
//! Path computation itself is done by the remote routing service.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use url::Url;

use crate::config::DirectionsConfig;
use crate::error::PipelineError;

const PEDESTRIAN: &str = "pedestrian";

/// A directions request. Positions are `[lon, lat]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectionsRequest {
    pub start: Option<Vec<f64>>,
    pub end: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mid: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footpath_waypoints: Option<Vec<Vec<f64>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

impl DirectionsRequest {
    /// Sample request served to clients discovering the endpoint
    pub fn example() -> Self {
        Self {
            start: Some(vec![-76.5367933, 3.3745495]),
            end: Some(vec![-76.5355621, 3.3730322]),
            mid: Some(vec![-76.532817, 3.375936]),
            footpath_waypoints: Some(vec![vec![-76.534, 3.375], vec![-76.533, 3.376]]),
            mode: Some(PEDESTRIAN.to_string()),
        }
    }

    pub fn travel_mode(&self) -> &str {
        self.mode.as_deref().unwrap_or(PEDESTRIAN)
    }

    /// Ordered waypoints sent to the routing service.
    ///
    /// Pedestrian requests with footpath waypoints go start, footpath..., end and ignore
    /// `mid`. Otherwise: start, mid (when it is a 2-element position), end.
    pub fn waypoints(&self) -> Result<Vec<Vec<f64>>, PipelineError> {
        let (Some(start), Some(end)) = (&self.start, &self.end) else {
            return Err(PipelineError::Validation(
                "missing start or end coordinates".to_string(),
            ));
        };

        let mut waypoints = vec![start.clone()];
        match &self.footpath_waypoints {
            Some(footpath) if self.mode.as_deref() == Some(PEDESTRIAN) && !footpath.is_empty() => {
                waypoints.extend(footpath.iter().cloned());
            }
            _ => {
                if let Some(mid) = self.mid.as_ref().filter(|m| m.len() == 2) {
                    waypoints.push(mid.clone());
                }
            }
        }
        waypoints.push(end.clone());

        Ok(waypoints)
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct DirectionsBody<'a> {
    coordinates: Vec<Vec<f64>>,
    travel_mode: &'a str,
}

/// Raw reply from the routing service
#[derive(Debug, Clone)]
pub struct DirectionsReply {
    pub status: u16,
    pub body: String,
}

pub struct DirectionsClient {
    client: Client,
    key: String,
    config: DirectionsConfig,
}

impl DirectionsClient {
    pub fn new(config: DirectionsConfig, key: String) -> Self {
        Self {
            client: Client::new(),
            key,
            config,
        }
    }

    /// Forward a request to the routing service, returning its reply unchanged
    pub async fn route(&self, request: &DirectionsRequest) -> Result<DirectionsReply> {
        let body = DirectionsBody {
            coordinates: request.waypoints()?,
            travel_mode: request.travel_mode(),
        };

        let url = Url::parse_with_params(
            &self.config.endpoint,
            &[("api-version", "1.0"), ("subscription-key", self.key.as_str())],
        )
        .with_context(|| format!("Invalid directions endpoint {}", self.config.endpoint))?;

        let response = self.client.post(url).json(&body).send().await?;

        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            info!("Routing service returned {} bytes", text.len());
        } else {
            error!("Routing service error ({}): {}", status, text);
        }

        Ok(DirectionsReply {
            status: status.as_u16(),
            body: text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(mode: Option<&str>, mid: Option<Vec<f64>>, footpath: Option<Vec<Vec<f64>>>) -> DirectionsRequest {
        DirectionsRequest {
            start: Some(vec![0.0, 0.0]),
            end: Some(vec![9.0, 9.0]),
            mid,
            footpath_waypoints: footpath,
            mode: mode.map(String::from),
        }
    }

    #[test]
    fn test_start_mid_end() {
        let r = request(Some("car"), Some(vec![5.0, 5.0]), None);
        assert_eq!(
            r.waypoints().unwrap(),
            vec![vec![0.0, 0.0], vec![5.0, 5.0], vec![9.0, 9.0]]
        );
        assert_eq!(r.travel_mode(), "car");
    }

    #[test]
    fn test_malformed_mid_is_ignored() {
        let r = request(None, Some(vec![5.0]), None);
        assert_eq!(r.waypoints().unwrap(), vec![vec![0.0, 0.0], vec![9.0, 9.0]]);
        assert_eq!(r.travel_mode(), "pedestrian");
    }

    #[test]
    fn test_pedestrian_footpath_replaces_mid() {
        let r = request(
            Some("pedestrian"),
            Some(vec![5.0, 5.0]),
            Some(vec![vec![1.0, 1.0], vec![2.0, 2.0]]),
        );
        assert_eq!(
            r.waypoints().unwrap(),
            vec![vec![0.0, 0.0], vec![1.0, 1.0], vec![2.0, 2.0], vec![9.0, 9.0]]
        );
    }

    #[test]
    fn test_footpath_ignored_outside_pedestrian_mode() {
        let r = request(Some("car"), None, Some(vec![vec![1.0, 1.0]]));
        assert_eq!(r.waypoints().unwrap(), vec![vec![0.0, 0.0], vec![9.0, 9.0]]);
    }

    #[test]
    fn test_missing_endpoints() {
        let mut r = request(None, None, None);
        r.end = None;
        assert!(matches!(r.waypoints(), Err(PipelineError::Validation(_))));
    }

    #[test]
    fn test_example_parses_back() {
        let json = serde_json::to_string(&DirectionsRequest::example()).unwrap();
        let back: DirectionsRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.waypoints().unwrap().len(), 4);
    }
}
