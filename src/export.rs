//! GeoJSON files consumed by the web map: one collection per boundary layer
//! plus the classified properties as point features.

use crate::classify::Classification;
use crate::resolve::{Layers, PolygonLayer};
use crate::types::{ClassifiedProperty, Level};
use anyhow::{Context, Result};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue};
use std::fs;
use std::path::Path;
use tracing::info;

pub fn layer_file_name(level: Level) -> &'static str {
    match level {
        Level::Subbarrio => "subbarrios.geojson",
        Level::Barrio => "barrios.geojson",
        Level::County => "counties.geojson",
    }
}

pub const PROPERTIES_FILE: &str = "properties.geojson";

pub fn layer_collection(layer: &PolygonLayer) -> FeatureCollection {
    let features = layer.areas().iter().map(|area| {
        let mut properties = JsonObject::new();
        properties.insert("name".to_string(), JsonValue::from(area.name.clone()));
        properties.insert("level".to_string(), JsonValue::from(layer.level().key()));

        Feature {
            bbox: None,
            geometry: Some(Geometry::new(geojson::Value::from(&area.geometry))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }).collect();

    FeatureCollection { bbox: None, features, foreign_members: None }
}

fn property_feature(record: &ClassifiedProperty) -> Feature {
    let optional = |value: Option<&str>| value.map_or(JsonValue::Null, JsonValue::from);

    let mut properties = JsonObject::new();
    properties.insert("id".to_string(), JsonValue::from(record.property.id.clone()));
    properties.insert("address".to_string(), optional(record.property.address.as_deref()));
    for (name, value) in &record.property.fields {
        properties.insert(name.clone(), JsonValue::from(value.clone()));
    }
    properties.insert("initial_subbarrio".to_string(), optional(record.containment.subbarrio.as_deref()));
    properties.insert("initial_barrio".to_string(), optional(record.containment.barrio.as_deref()));
    properties.insert("initial_county".to_string(), optional(record.containment.county.as_deref()));
    properties.insert("final_level".to_string(), JsonValue::from(record.assignment.level().as_str()));
    properties.insert("final_area".to_string(), optional(record.assignment.area()));
    properties.insert("classification_path".to_string(), JsonValue::from(record.classification_path()));

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geojson::Value::from(&record.point))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

pub fn properties_collection(classification: &Classification) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: classification.records.iter().map(property_feature).collect(),
        foreign_members: None,
    }
}

fn write_collection(path: &Path, collection: &FeatureCollection) -> Result<()> {
    let json = serde_json::to_string(collection).context("Failed to serialize GeoJSON")?;
    fs::write(path, json).with_context(|| format!("Failed to write GeoJSON: {:?}", path))?;
    info!(path = ?path, features = collection.features.len(), "wrote map layer");
    Ok(())
}

pub fn export_map_data(dir: &Path, layers: &Layers, classification: &Classification) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create map directory: {:?}", dir))?;

    for level in Level::ALL {
        write_collection(&dir.join(layer_file_name(level)), &layer_collection(layers.get(level)))?;
    }
    write_collection(&dir.join(PROPERTIES_FILE), &properties_collection(classification))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{classify, DEFAULT_MIN_PROPERTIES};
    use crate::resolve::resolve;
    use crate::resolve::tests::{property, square};

    fn layers() -> Layers {
        Layers {
            subbarrio: PolygonLayer::new(Level::Subbarrio, vec![square("A", 0.0, 0.0, 1.0, 1.0)]),
            barrio: PolygonLayer::new(Level::Barrio, vec![square("X", 0.0, 0.0, 2.0, 2.0)]),
            county: PolygonLayer::new(
                Level::County,
                vec![square("Arecibo", 0.0, 0.0, 3.0, 3.0), square("Ponce", 3.0, 0.0, 6.0, 3.0)],
            ),
        }
    }

    #[test]
    fn layer_collection_carries_name_and_level() {
        let layers = layers();
        let collection = layer_collection(&layers.county);
        assert_eq!(collection.features.len(), 2);

        let first = &collection.features[0];
        assert_eq!(first.property("name"), Some(&JsonValue::from("Arecibo")));
        assert_eq!(first.property("level"), Some(&JsonValue::from("county")));
        assert!(matches!(
            first.geometry.as_ref().map(|g| &g.value),
            Some(geojson::Value::MultiPolygon(_))
        ));
    }

    #[test]
    fn property_features_include_classification() {
        let layers = layers();
        let located = resolve(
            vec![property("1", Some((0.5, 0.5))), property("2", Some((4.0, 1.0)))],
            &layers,
        );
        let collection = properties_collection(&classify(located, DEFAULT_MIN_PROPERTIES));

        let ponce = &collection.features[1];
        assert_eq!(ponce.property("id"), Some(&JsonValue::from("2")));
        assert_eq!(ponce.property("final_level"), Some(&JsonValue::from("county")));
        assert_eq!(ponce.property("final_area"), Some(&JsonValue::from("Ponce")));
        assert_eq!(ponce.property("initial_subbarrio"), Some(&JsonValue::Null));
        assert_eq!(
            ponce.geometry.as_ref().map(|g| &g.value),
            Some(&geojson::Value::Point(vec![4.0, 1.0]))
        );
    }

    #[test]
    fn export_writes_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let layers = layers();
        let classification = classify(resolve(vec![property("1", Some((0.5, 0.5)))], &layers), 2);

        export_map_data(dir.path(), &layers, &classification).unwrap();

        for name in ["subbarrios.geojson", "barrios.geojson", "counties.geojson", PROPERTIES_FILE] {
            let text = fs::read_to_string(dir.path().join(name)).unwrap();
            assert!(text.parse::<geojson::GeoJson>().is_ok(), "{} is not valid GeoJSON", name);
        }
    }
}
