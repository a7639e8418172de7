//! Configuration loader for the imagery exporter.
//!
//! Loads and validates the ROI registry YAML (`rois.yaml`). Each region
//! declares its polygon, an export CRS, the catalog collections it uses and
//! an ordered set of seasons with per-collection grouping configuration.
//!
//! Supports environment variable substitution using ${VAR} syntax.

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use filter_tree::{GroupNode, Season};
use imagery_common::{
    CrsCode, DateRange, ImageryError, ImageryResult, Region, DEFAULT_DATE_FORMAT,
};

// ============================================================================
// Registry file (rois.yaml)
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryFile {
    pub rois: BTreeMap<String, RoiFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoiFile {
    pub roi_coords: Vec<[f64; 2]>,
    #[serde(default)]
    pub crs: Option<String>,
    #[serde(default)]
    pub image_collections: Option<BTreeMap<String, String>>,
    /// Seasons in declaration order. Kept as a raw mapping so the order of
    /// the YAML document survives parsing.
    #[serde(default)]
    pub imagery_filters: Option<Mapping>,
}

// ============================================================================
// Runtime configuration
// ============================================================================

/// A fully validated region of interest.
#[derive(Debug, Clone)]
pub struct RoiConfig {
    /// Lowercase registry name.
    pub name: String,
    /// Polygon; its `crs` is the configured export CRS, or WGS84.
    pub region: Region,
    /// Whether `crs` was given in the registry.
    pub crs_configured: bool,
    /// Collection short name to catalog source id.
    pub collections: BTreeMap<String, String>,
    /// Seasons in declaration order.
    pub seasons: Vec<Season>,
}

/// All regions of interest from one registry file.
#[derive(Debug, Clone, Default)]
pub struct RoiRegistry {
    rois: BTreeMap<String, RoiConfig>,
}

impl RoiRegistry {
    /// Look up a region by name, ignoring case.
    pub fn get(&self, name: &str) -> ImageryResult<&RoiConfig> {
        self.rois
            .get(&name.to_lowercase())
            .ok_or_else(|| ImageryError::UnknownRegion(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rois.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rois.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rois.is_empty()
    }
}

/// Catalog sources used when a region lists none.
pub fn default_collections() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("S1".to_string(), "COPERNICUS/S1_GRD".to_string()),
        ("S2".to_string(), "COPERNICUS/S2".to_string()),
    ])
}

/// Season used when a region has no `imagery_filters`: named after the
/// current year, covering the two weeks up to `now`, every collection
/// unfiltered.
pub fn default_season(now: DateTime<Utc>, collections: &BTreeMap<String, String>) -> Result<Season> {
    let range = DateRange::new(now - Duration::weeks(2), now)?;
    Ok(collections.keys().fold(
        Season::new(now.year().to_string(), range),
        |season, collection| season.with_collection(collection.clone(), GroupNode::Leaf(Vec::new())),
    ))
}

// ============================================================================
// Loading
// ============================================================================

/// Load and parse an ROI registry YAML file.
pub fn load_registry<P: AsRef<Path>>(path: P) -> Result<RoiRegistry> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read ROI registry from {:?}", path.as_ref()))?;

    let registry = parse_registry(&content, Utc::now())
        .with_context(|| format!("Failed to load ROI registry from {:?}", path.as_ref()))?;

    info!(
        path = %path.as_ref().display(),
        rois = ?registry.names().collect::<Vec<_>>(),
        "Loaded ROI registry"
    );
    Ok(registry)
}

/// Parse registry YAML. `now` anchors default seasons.
pub fn parse_registry(content: &str, now: DateTime<Utc>) -> Result<RoiRegistry> {
    let expanded = expand_env_vars(content)?;

    let file: RegistryFile =
        serde_yaml::from_str(&expanded).with_context(|| "Failed to parse ROI registry YAML")?;

    let mut rois = BTreeMap::new();
    for (name, roi) in file.rois {
        let key = name.to_lowercase();
        let config = build_roi(&key, roi, now).with_context(|| format!("Invalid ROI '{}'", name))?;
        anyhow::ensure!(
            rois.insert(key.clone(), config).is_none(),
            "ROI '{}' is registered more than once (names are case-insensitive)",
            key
        );
    }

    Ok(RoiRegistry { rois })
}

fn build_roi(name: &str, roi: RoiFile, now: DateTime<Utc>) -> Result<RoiConfig> {
    let crs = roi
        .crs
        .as_deref()
        .map(str::parse::<CrsCode>)
        .transpose()?;
    let region = Region::new(roi.roi_coords, crs.unwrap_or_default())?;

    let collections = roi.image_collections.unwrap_or_else(default_collections);

    let seasons = match roi.imagery_filters {
        Some(filters) => parse_seasons(&filters)?,
        None => {
            let season = default_season(now, &collections)?;
            warn!(
                roi = %name,
                season = %season.name,
                range = %season.range,
                "No imagery_filters configured; using unfiltered default season"
            );
            vec![season]
        }
    };

    let config = RoiConfig {
        name: name.to_string(),
        region,
        crs_configured: crs.is_some(),
        collections,
        seasons,
    };
    validate_roi(&config)?;
    Ok(config)
}

/// Parse the ordered `imagery_filters` mapping into seasons.
fn parse_seasons(filters: &Mapping) -> Result<Vec<Season>> {
    let mut seasons = Vec::with_capacity(filters.len());
    let mut names = BTreeSet::new();

    for (key, value) in filters {
        let name = scalar_to_string(key)
            .with_context(|| format!("Season names must be scalars, got {:?}", key))?;
        // `"2022"` and `2022` are distinct YAML keys but the same season name.
        anyhow::ensure!(
            names.insert(name.clone()),
            "Season '{}' is declared more than once",
            name
        );
        let body = value
            .as_mapping()
            .with_context(|| format!("Season '{}' must be a mapping", name))?;

        let date_start = required_str(body, "date_start", &name)?;
        let date_end = required_str(body, "date_end", &name)?;
        let range = DateRange::parse(&date_start, &date_end, DEFAULT_DATE_FORMAT)
            .with_context(|| format!("Season '{}' has an invalid date range", name))?;

        let mut season = Season::new(name.clone(), range);
        for (collection, config) in body {
            let collection = scalar_to_string(collection)
                .with_context(|| format!("Season '{}' has a non-scalar key", name))?;
            if collection == "date_start" || collection == "date_end" {
                continue;
            }
            let group: GroupNode = serde_yaml::from_value(config.clone()).with_context(|| {
                format!(
                    "Invalid grouping configuration for collection {} in season {}",
                    collection, name
                )
            })?;
            season = season.with_collection(collection, group);
        }

        seasons.push(season);
    }

    Ok(seasons)
}

fn required_str(body: &Mapping, key: &str, season: &str) -> Result<String> {
    body.get(key)
        .and_then(scalar_to_string)
        .with_context(|| format!("Season '{}' is missing '{}'", season, key))
}

/// Unquoted YAML keys like `2022` arrive as numbers.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in YAML content
/// Supports ${VAR} and ${VAR:-default} syntax
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'

            let mut var_expr = String::new();
            let mut depth = 1;

            while depth > 0 {
                match chars.next() {
                    Some('{') => {
                        depth += 1;
                        var_expr.push('{');
                    }
                    Some('}') => {
                        depth -= 1;
                        if depth > 0 {
                            var_expr.push('}');
                        }
                    }
                    Some(c) => var_expr.push(c),
                    None => anyhow::bail!("Unclosed variable substitution: ${{{}", var_expr),
                }
            }

            result.push_str(&resolve_var_expr(&var_expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

/// Resolve variable expression (supports VAR and VAR:-default syntax)
fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((var_name, default)) = expr.split_once(":-") {
        match std::env::var(var_name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).with_context(|| format!("Environment variable {} not set", expr))
    }
}

// ============================================================================
// Validation
// ============================================================================

fn validate_roi(config: &RoiConfig) -> Result<()> {
    anyhow::ensure!(
        !config.collections.is_empty(),
        "ROI {} must configure at least one image collection",
        config.name
    );

    for (collection, source) in &config.collections {
        anyhow::ensure!(
            !source.trim().is_empty(),
            "Collection {} of ROI {} has an empty catalog source",
            collection,
            config.name
        );
    }

    anyhow::ensure!(
        !config.seasons.is_empty(),
        "ROI {} must configure at least one season",
        config.name
    );

    for season in &config.seasons {
        anyhow::ensure!(!season.name.is_empty(), "Season names cannot be empty");
        for collection in season.collections.keys() {
            anyhow::ensure!(
                config.collections.contains_key(collection),
                "Season {} configures collection '{}', which is not one of: {:?}",
                season.name,
                collection,
                config.collections.keys().collect::<Vec<_>>()
            );
        }
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
