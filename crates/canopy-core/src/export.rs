//! Serialisation of in-memory artifacts: polygons to GeoJSON, reports to JSON.
use geojson::{FeatureCollection, JsonObject};
use serde_json::json;

use crate::error::{ConnectivityError, Result};
use crate::report::RunReport;
use crate::vectorize::Polygons;

/// Polygons as a FeatureCollection. The CRS is recorded in a legacy `crs`
/// member so projected coordinates stay interpretable.
pub fn polygons_to_geojson(polygons: &Polygons) -> FeatureCollection {
    let mut foreign = JsonObject::new();
    foreign.insert(
        "crs".to_string(),
        json!({ "type": "name", "properties": { "name": polygons.crs().as_str() } }),
    );
    FeatureCollection {
        bbox: None,
        features: polygons.iter().map(|p| p.to_feature()).collect(),
        foreign_members: Some(foreign),
    }
}

pub fn geojson_string(polygons: &Polygons) -> String {
    polygons_to_geojson(polygons).to_string()
}

pub fn report_json(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report)
        .map_err(|e| ConnectivityError::input(format!("report serialisation failed: {e}")))
}
