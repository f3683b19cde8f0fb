use crate::config::{ColumnConfig, FilterConfig, InputConfig, LayerConfig};
use crate::resolve::{Layers, PolygonLayer};
use crate::types::{Area, Level, Property};
use anyhow::{Context, Result, anyhow, ensure};
use csv::ReaderBuilder;
use geo::{MultiPolygon, Point};
use shapefile::dbase::FieldValue;
use shapefile::Reader;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{info, warn};

pub fn load_layers(config: &InputConfig) -> Result<Layers> {
    Ok(Layers {
        subbarrio: load_layer(Level::Subbarrio, &config.layers.subbarrio)?,
        barrio: load_layer(Level::Barrio, &config.layers.barrio)?,
        county: load_layer(Level::County, &config.layers.county)?,
    })
}

pub fn load_layer(level: Level, config: &LayerConfig) -> Result<PolygonLayer> {
    let extension = config.path.extension()
        .and_then(|e| e.to_str())
        .map(|s: &str| s.to_lowercase())
        .ok_or_else(|| anyhow!("{} layer file has no extension: {:?}", level.label(), config.path))?;

    let areas = match extension.as_str() {
        "shp" => load_shapefile_areas(config)?,
        "json" | "geojson" => {
            let file = File::open(&config.path)
                .with_context(|| format!("Failed to open GeoJSON file: {:?}", config.path))?;
            read_geojson_areas(BufReader::new(file), config)?
        }
        _ => return Err(anyhow!("Unsupported geometry format: {}", extension)),
    };

    ensure!(!areas.is_empty(), "{} layer {:?} has no polygons", level.label(), config.path);
    info!(level = level.key(), areas = areas.len(), path = ?config.path, "loaded boundary layer");

    Ok(PolygonLayer::new(level, areas))
}

fn load_shapefile_areas(config: &LayerConfig) -> Result<Vec<Area>> {
    let mut reader = Reader::from_path(&config.path)
        .with_context(|| format!("Failed to open Shapefile: {:?}", config.path))?;

    let mut areas = Vec::new();

    for (row, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = result
            .with_context(|| format!("Failed to read feature {} of {:?}", row, config.path))?;

        if let Some(filter) = &config.filter {
            let value = record.get(&filter.field)
                .ok_or_else(|| anyhow!("Filter field '{}' not found in Shapefile", filter.field))?;
            if dbase_string(value).as_deref() != Some(filter.value.as_str()) {
                continue;
            }
        }

        let name_value = record.get(&config.name_field)
            .ok_or_else(|| anyhow!("Name field '{}' not found in Shapefile", config.name_field))?;
        let name = dbase_string(name_value)
            .ok_or_else(|| anyhow!("Feature {} of {:?} has no '{}'", row, config.path, config.name_field))?;

        let geometry = match shape {
            shapefile::Shape::Polygon(polygon) => {
                let geo_polygon: MultiPolygon<f64> = polygon.try_into()
                    .map_err(|e| anyhow!("Failed to convert polygon: {:?}", e))?;
                geo_polygon
            },
            shapefile::Shape::PolygonM(polygon) => {
                let geo_polygon: MultiPolygon<f64> = polygon.try_into()
                    .map_err(|e| anyhow!("Failed to convert polygonM: {:?}", e))?;
                geo_polygon
            },
            shapefile::Shape::PolygonZ(polygon) => {
                let geo_polygon: MultiPolygon<f64> = polygon.try_into()
                    .map_err(|e| anyhow!("Failed to convert polygonZ: {:?}", e))?;
                geo_polygon
            },
            other => return Err(anyhow!(
                "Feature '{}' in {:?} is a {:?} shape, expected a polygon", name, config.path, other.shapetype()
            )),
        };

        areas.push(Area { name, geometry });
    }

    Ok(areas)
}

fn dbase_string(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Character(Some(s)) => Some(s.trim().to_string()),
        FieldValue::Numeric(Some(n)) => Some(n.to_string()),
        FieldValue::Integer(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn read_geojson_areas<R: Read>(reader: R, config: &LayerConfig) -> Result<Vec<Area>> {
    use geojson::GeoJson;

    // Loads the whole collection into memory
    let geojson = GeoJson::from_reader(reader).context("Failed to parse GeoJSON")?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("GeoJSON must be a FeatureCollection")),
    };

    let mut areas = Vec::new();

    for (row, feature) in collection.features.into_iter().enumerate() {
        if let Some(filter) = &config.filter {
            let value = feature.property(&filter.field)
                .ok_or_else(|| anyhow!("Filter field '{}' not found in feature {}", filter.field, row))?;
            if !json_matches(value, filter) {
                continue;
            }
        }

        let name = match feature.property(&config.name_field) {
            Some(serde_json::Value::String(s)) => s.trim().to_string(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => return Err(anyhow!("Feature {} has no '{}'", row, config.name_field)),
        };

        let geometry = feature.geometry
            .ok_or_else(|| anyhow!("Feature '{}' has no geometry", name))?;
        let geo_geometry: geo::Geometry<f64> = geometry.value.try_into()
            .map_err(|e| anyhow!("Failed to convert geojson geometry: {:?}", e))?;

        let geometry = match geo_geometry {
            geo::Geometry::MultiPolygon(mp) => mp,
            geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
            _ => return Err(anyhow!("Feature '{}' is not a polygon", name)),
        };

        areas.push(Area { name, geometry });
    }

    Ok(areas)
}

fn json_matches(value: &serde_json::Value, filter: &FilterConfig) -> bool {
    match value {
        serde_json::Value::String(s) => s.trim() == filter.value,
        serde_json::Value::Number(n) => n.to_string() == filter.value,
        _ => false,
    }
}

pub fn load_properties(path: &Path, columns: &ColumnConfig) -> Result<Vec<Property>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open CSV file: {:?}", path))?;
    let properties = read_properties(file, columns)
        .with_context(|| format!("Failed to read properties from {:?}", path))?;
    info!(count = properties.len(), path = ?path, "loaded properties");
    Ok(properties)
}

pub fn read_properties<R: Read>(reader: R, columns: &ColumnConfig) -> Result<Vec<Property>> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let position = |name: &str| headers.iter().position(|h| h.trim() == name);

    let id_idx = position(&columns.id)
        .ok_or_else(|| anyhow!("Id column '{}' not found in CSV", columns.id))?;
    let lat_idx = position(&columns.latitude)
        .ok_or_else(|| anyhow!("CSV must contain a '{}' column", columns.latitude))?;
    let lon_idx = position(&columns.longitude)
        .ok_or_else(|| anyhow!("CSV must contain a '{}' column", columns.longitude))?;

    let address_idx = position(&columns.address);
    if address_idx.is_none() {
        warn!(column = %columns.address, "address column not found; addresses will be empty");
    }

    let passthrough: Vec<(String, usize)> = columns.passthrough.iter()
        .filter_map(|name| match position(name) {
            Some(idx) => Some((name.clone(), idx)),
            None => {
                warn!(column = %name, "passthrough column not found; skipping");
                None
            }
        })
        .collect();

    let mut properties = Vec::new();

    for result in rdr.records() {
        let record = result?;
        let cell = |idx: usize| record.get(idx).map(str::trim).unwrap_or("");

        let location = match (parse_coordinate(cell(lat_idx)), parse_coordinate(cell(lon_idx))) {
            (Some(lat), Some(lon)) => Some(Point::new(lon, lat)),
            _ => None,
        };

        let address = address_idx
            .map(cell)
            .filter(|a| !a.is_empty())
            .map(str::to_string);

        properties.push(Property {
            id: cell(id_idx).to_string(),
            address,
            location,
            fields: passthrough.iter()
                .map(|(name, idx)| (name.clone(), cell(*idx).to_string()))
                .collect(),
        });
    }

    Ok(properties)
}

fn parse_coordinate(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}
