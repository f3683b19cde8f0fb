use crate::classify::DEFAULT_MIN_PROPERTIES;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{Context, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub properties_csv: PathBuf,
    #[serde(default)]
    pub columns: ColumnConfig,
    pub layers: LayersConfig,
}

/// Column names in the property CSV.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ColumnConfig {
    pub id: String,
    pub address: String,
    pub latitude: String,
    pub longitude: String,
    pub passthrough: Vec<String>,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        ColumnConfig {
            id: "Número Control".to_string(),
            address: "Dirección Física".to_string(),
            latitude: "crim.latitude".to_string(),
            longitude: "crim.longitude".to_string(),
            passthrough: vec![
                "Catastro".to_string(),
                "Invadida".to_string(),
                "Inspección Vencida".to_string(),
                "Aging Bucket".to_string(),
            ],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LayersConfig {
    pub subbarrio: LayerConfig,
    pub barrio: LayerConfig,
    pub county: LayerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LayerConfig {
    pub path: PathBuf, // .shp, .json or .geojson
    pub name_field: String,
    pub filter: Option<FilterConfig>,
}

/// Keep only features whose `field` equals `value` (e.g. STATEFP = "72").
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct FilterConfig {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProcessingConfig {
    pub min_properties: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        ProcessingConfig { min_properties: DEFAULT_MIN_PROPERTIES }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub report: PathBuf,
    pub classifications_csv: PathBuf,
    pub map_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            report: PathBuf::from("property_clusters.md"),
            classifications_csv: PathBuf::from("property_classifications.csv"),
            map_dir: PathBuf::from("map"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig { port: 8080 }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [input]
        properties_csv = "geo_data.csv"

        [input.layers.subbarrio]
        path = "tl_2024_72_subbarrio.shp"
        name_field = "NAMELSAD"

        [input.layers.barrio]
        path = "tl_2024_72_cousub.shp"
        name_field = "NAMELSAD"

        [input.layers.county]
        path = "tl_2024_us_county.shp"
        name_field = "NAME"
        filter = { field = "STATEFP", value = "72" }
    "#;

    #[test]
    fn minimal_config_fills_defaults() {
        let config = AppConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.processing.min_properties, 2);
        assert_eq!(config.input.columns.id, "Número Control");
        assert_eq!(config.input.columns.latitude, "crim.latitude");
        assert_eq!(config.input.columns.passthrough.len(), 4);
        assert_eq!(config.output.report, PathBuf::from("property_clusters.md"));
        assert_eq!(config.server.port, 8080);
        assert_eq!(
            config.input.layers.county.filter,
            Some(FilterConfig { field: "STATEFP".into(), value: "72".into() })
        );
        assert!(config.input.layers.subbarrio.filter.is_none());
    }

    #[test]
    fn explicit_values_override_defaults() {
        let toml = format!(
            "{}\n{}",
            MINIMAL,
            r#"
            [processing]
            min_properties = 3

            [server]
            port = 3000
            "#
        );
        let config = AppConfig::from_toml(&toml).unwrap();
        assert_eq!(config.processing.min_properties, 3);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn missing_layer_is_rejected() {
        let toml = r#"
            [input]
            properties_csv = "geo_data.csv"

            [input.layers.subbarrio]
            path = "a.shp"
            name_field = "NAMELSAD"
        "#;
        assert!(AppConfig::from_toml(toml).is_err());
    }
}
