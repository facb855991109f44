//! District boundary loading from `GeoJSON`.
//!
//! A country's boundary file is either a `FeatureCollection` of named
//! districts, a single named `Feature`, or a bare geometry. The last case
//! is one implicit district named after the country. Feature order is
//! preserved because binning is first-match-wins.

use std::path::{Path, PathBuf};

use cchf_map_geography_models::CountryDefinition;
use geo::MultiPolygon;
use geojson::{Feature, GeoJson};

use crate::GeographyError;

/// Property holding the district name on each feature.
const NAME_PROPERTY: &str = "name";

/// A named district boundary.
#[derive(Debug, Clone)]
pub struct GeoPolygon {
    /// District name from the feature's `name` property.
    pub name: String,
    /// District boundary. Single polygons are wrapped.
    pub boundary: MultiPolygon<f64>,
}

/// Path of the country's boundary file under `geodata_dir`.
#[must_use]
pub fn boundary_path(country: &CountryDefinition, geodata_dir: &Path) -> PathBuf {
    geodata_dir.join(&country.boundaries)
}

/// Reads and parses the district boundaries for a country.
///
/// # Errors
///
/// * [`GeographyError::MissingBoundaries`] if the file cannot be read.
/// * [`GeographyError::InvalidBoundaries`] if it is not usable `GeoJSON`.
pub fn load_boundaries(
    country: &CountryDefinition,
    geodata_dir: &Path,
) -> Result<Vec<GeoPolygon>, GeographyError> {
    let path = boundary_path(country, geodata_dir);
    let contents =
        std::fs::read_to_string(&path).map_err(|source| GeographyError::MissingBoundaries {
            country: country.id.clone(),
            path: path.display().to_string(),
            source,
        })?;

    let polygons = parse_boundaries(country, &contents)?;
    log::info!(
        "Loaded {} district boundaries for {} from {}",
        polygons.len(),
        country.name,
        path.display()
    );
    Ok(polygons)
}

/// Parses a boundary `GeoJSON` document for a country.
///
/// Features without a name or without polygonal geometry are skipped.
///
/// # Errors
///
/// Returns [`GeographyError::InvalidBoundaries`] if the document does not
/// parse or yields no usable polygon.
pub fn parse_boundaries(
    country: &CountryDefinition,
    geojson_str: &str,
) -> Result<Vec<GeoPolygon>, GeographyError> {
    let invalid = |message: String| GeographyError::InvalidBoundaries {
        country: country.id.clone(),
        message,
    };

    let geojson: GeoJson = geojson_str.parse().map_err(|e| invalid(format!("{e}")))?;

    let polygons: Vec<GeoPolygon> = match geojson {
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .filter_map(|feature| feature_to_polygon(country, feature))
            .collect(),
        GeoJson::Feature(feature) => feature_to_polygon(country, feature).into_iter().collect(),
        GeoJson::Geometry(geometry) => to_multipolygon(geometry)
            .map(|boundary| GeoPolygon {
                name: country.name.clone(),
                boundary,
            })
            .into_iter()
            .collect(),
    };

    if polygons.is_empty() {
        return Err(invalid("no polygon features found".to_string()));
    }

    Ok(polygons)
}

fn feature_to_polygon(country: &CountryDefinition, feature: Feature) -> Option<GeoPolygon> {
    let name = feature
        .property(NAME_PROPERTY)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string);

    let Some(name) = name else {
        log::warn!("Skipping unnamed boundary feature in {}", country.id);
        return None;
    };

    let Some(boundary) = feature.geometry.and_then(to_multipolygon) else {
        log::warn!("Skipping non-polygon boundary '{name}' in {}", country.id);
        return None;
    };

    Some(GeoPolygon { name, boundary })
}

/// Converts a `GeoJSON` geometry into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cchf_map_geography_models::BoundingBox;

    fn serbia() -> CountryDefinition {
        CountryDefinition {
            id: "serbia".to_string(),
            name: "Serbia".to_string(),
            bounding_box: BoundingBox {
                min_lat: 40.0,
                max_lat: 48.0,
                min_lon: 18.0,
                max_lon: 25.0,
            },
            boundaries: "serbia/serbia-districts.geojson".to_string(),
        }
    }

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "name": "North" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[20.0, 44.0], [22.0, 44.0], [22.0, 46.0], [20.0, 46.0], [20.0, 44.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "name": "South" },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [[[[20.0, 42.0], [22.0, 42.0], [22.0, 44.0], [20.0, 44.0], [20.0, 42.0]]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "id": 7 },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "name": "Marker" },
                "geometry": { "type": "Point", "coordinates": [21.0, 43.0] }
            }
        ]
    }"#;

    #[test]
    fn parses_feature_collection_in_order() {
        let polygons = parse_boundaries(&serbia(), COLLECTION).unwrap();
        let names: Vec<&str> = polygons.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["North", "South"]);
    }

    #[test]
    fn single_feature_uses_its_name() {
        let doc = r#"{
            "type": "Feature",
            "properties": { "name": "Belgrade" },
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[20.0, 44.0], [21.0, 44.0], [21.0, 45.0], [20.0, 44.0]]]
            }
        }"#;
        let polygons = parse_boundaries(&serbia(), doc).unwrap();
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].name, "Belgrade");
    }

    #[test]
    fn bare_geometry_is_one_district_named_after_the_country() {
        let doc = r#"{
            "type": "Polygon",
            "coordinates": [[[18.0, 40.0], [25.0, 40.0], [25.0, 48.0], [18.0, 48.0], [18.0, 40.0]]]
        }"#;
        let polygons = parse_boundaries(&serbia(), doc).unwrap();
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].name, "Serbia");
    }

    #[test]
    fn rejects_documents_without_polygons() {
        let doc = r#"{ "type": "Point", "coordinates": [21.0, 43.0] }"#;
        assert!(matches!(
            parse_boundaries(&serbia(), doc),
            Err(GeographyError::InvalidBoundaries { .. })
        ));
        assert!(parse_boundaries(&serbia(), "not json").is_err());
    }

    #[test]
    fn missing_file_is_a_configuration_error() {
        let err = load_boundaries(&serbia(), Path::new("/nonexistent/geodata")).unwrap_err();
        assert!(matches!(err, GeographyError::MissingBoundaries { .. }));
    }
}
