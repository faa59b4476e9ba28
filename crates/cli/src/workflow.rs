//! JSON-configured supervised classification workflow

use anyhow::{bail, Context, Result};
use ardhi_algorithms::accuracy::{evaluate, split, ConfusionMatrix, SplitParams};
use ardhi_algorithms::area::{area_by_class, area_table, pixel_area, AreaParams, AreaUnit};
use ardhi_algorithms::classification::{ForestParams, RandomForest};
use ardhi_algorithms::composite::{composite, CompositeMethod, CompositeParams};
use ardhi_algorithms::imagery::{add_index, SpectralIndex};
use ardhi_algorithms::region::{clip, Region};
use ardhi_algorithms::sampling::sample_regions;
use ardhi_core::io::{write_class_geotiff, ExportSink, FeatureStore, LocalStore};
use ardhi_core::{FeatureCollection, Image, ImageCollection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::{load_scene, parse_date, prepare_collection, spinner, SceneArgs};

fn default_attribute() -> String {
    "NAME_1".to_string()
}

fn default_cloud_property() -> String {
    "CLOUDY_PIXEL_PERCENTAGE".to_string()
}

fn default_max_cloud() -> Option<f64> {
    Some(30.0)
}

fn default_qa_band() -> String {
    "cs".to_string()
}

fn default_clear_threshold() -> f64 {
    0.5
}

fn default_bands() -> Vec<String> {
    vec!["B*".to_string()]
}

fn default_label() -> String {
    "landcover".to_string()
}

fn default_trees() -> usize {
    50
}

fn default_split() -> f64 {
    0.6
}

/// Workflow file for `ardhi classify`. Unknown keys are rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowConfig {
    /// Store root; relative paths resolve against the workflow file
    pub store: String,
    pub collection: String,
    pub boundaries: String,
    #[serde(default = "default_attribute")]
    pub attribute: String,
    pub region: String,
    /// `YYYY-MM-DD`, inclusive
    pub start: String,
    /// `YYYY-MM-DD`, exclusive
    pub end: String,
    #[serde(default = "default_cloud_property")]
    pub cloud_property: String,
    /// `null` skips the cloud-property filter
    #[serde(default = "default_max_cloud")]
    pub max_cloud: Option<f64>,
    #[serde(default)]
    pub cloud_score: Option<String>,
    #[serde(default = "default_qa_band")]
    pub qa_band: String,
    #[serde(default = "default_clear_threshold")]
    pub clear_threshold: f64,
    #[serde(default)]
    pub method: CompositeMethod,
    #[serde(default = "default_bands")]
    pub bands: Vec<String>,
    #[serde(default)]
    pub indices: Vec<SpectralIndex>,
    /// Second period whose composite is stacked onto the first (bands
    /// suffixed `_1`), for change classification
    #[serde(default)]
    pub compare: Option<Period>,
    /// Labelled feature collections, merged in order
    pub gcps: Vec<String>,
    #[serde(default = "default_label")]
    pub label: String,
    /// Classifier inputs; every composite band when absent
    #[serde(default)]
    pub inputs: Option<Vec<String>>,
    #[serde(default = "default_trees")]
    pub trees: usize,
    #[serde(default = "default_split")]
    pub split: f64,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub unit: AreaUnit,
    #[serde(default)]
    pub max_pixels: Option<u64>,
    pub output: String,
}

/// Date range, `YYYY-MM-DD`, start inclusive and end exclusive
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Period {
    pub start: String,
    pub end: String,
}

/// Suffix for the bands of the `compare` composite
const COMPARE_SUFFIX: &str = "_1";

impl WorkflowConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow {}", path.display()))?;
        let mut config: WorkflowConfig =
            serde_json::from_str(&text).with_context(|| format!("Invalid workflow {}", path.display()))?;
        if Path::new(&config.store).is_relative() {
            if let Some(dir) = path.parent() {
                let resolved = dir.join(&config.store).to_string_lossy().into_owned();
                config.store = resolved;
            }
        }
        if config.gcps.is_empty() {
            bail!("workflow lists no gcps collections");
        }
        Ok(config)
    }

    fn scene(&self) -> SceneArgs {
        SceneArgs {
            store: self.store.clone().into(),
            collection: self.collection.clone(),
            boundaries: self.boundaries.clone(),
            attribute: self.attribute.clone(),
            region: self.region.clone(),
            cloud_property: self.cloud_property.clone(),
            max_cloud: self.max_cloud.unwrap_or_default(),
            no_cloud_filter: self.max_cloud.is_none(),
            cloud_score: self.cloud_score.clone(),
            qa_band: self.qa_band.clone(),
            clear_threshold: self.clear_threshold,
        }
    }
}

/// Summary written next to the exports and printed on completion
#[derive(Debug, Serialize)]
pub struct WorkflowReport {
    pub region: String,
    pub images: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare_images: Option<usize>,
    pub samples: usize,
    pub training: usize,
    pub validation: usize,
    pub accuracy: Option<f64>,
    pub kappa: Option<f64>,
    pub producers_accuracy: Vec<(i32, Option<f64>)>,
    pub consumers_accuracy: Vec<(i32, Option<f64>)>,
    pub confusion_matrix: ConfusionMatrix,
    pub unit: AreaUnit,
    pub areas: BTreeMap<i32, f64>,
}

/// Clipped composite of one period with the configured indices, plus the
/// number of images that went into it
fn period_image(
    config: &WorkflowConfig,
    scene: &SceneArgs,
    store: &LocalStore,
    collection: &ImageCollection,
    region: &Region,
    period: (&str, &str),
) -> Result<(Image, usize)> {
    let start = parse_date(period.0).map_err(anyhow::Error::msg)?;
    let end = parse_date(period.1).map_err(anyhow::Error::msg)?;
    let prepared = prepare_collection(scene, store, collection, region, start, end)?;

    let pb = spinner("Compositing...");
    let params = CompositeParams {
        method: config.method,
        bands: Some(config.bands.clone()),
    };
    let mut image = composite(&prepared, &params)
        .with_context(|| format!("Failed to build composite for {} to {}", period.0, period.1))?;
    image = clip(&image, region).context("Failed to clip composite")?;
    for index in &config.indices {
        image = add_index(&image, *index).with_context(|| format!("Failed to add {}", index.name()))?;
    }
    pb.finish_and_clear();
    Ok((image, prepared.len()))
}

pub fn run(config: &WorkflowConfig) -> Result<WorkflowReport> {
    let scene = config.scene();
    let (store, region, collection) = load_scene(&scene)?;
    let first = (config.start.as_str(), config.end.as_str());
    let (mut image, images) = period_image(config, &scene, &store, &collection, &region, first)?;

    let mut compare_images = None;
    if let Some(compare) = &config.compare {
        let second = (compare.start.as_str(), compare.end.as_str());
        let (later, n) = period_image(config, &scene, &store, &collection, &region, second)?;
        image
            .add_bands(&later, COMPARE_SUFFIX)
            .context("Failed to stack comparison composite")?;
        info!("Stacked {} to {} composite: {}", compare.start, compare.end, image.band_names().join(", "));
        compare_images = Some(n);
    }

    let mut gcps = FeatureCollection::new();
    for name in &config.gcps {
        let fc = store
            .features(name)
            .with_context(|| format!("Failed to load gcps '{}'", name))?;
        gcps = gcps.merge(&fc);
    }

    let pb = spinner("Sampling and training...");
    let samples = sample_regions(&image, &gcps, &[config.label.as_str()]).context("Failed to sample composite")?;
    let split_params = SplitParams {
        fraction: config.split,
        seed: config.seed.unwrap_or(0),
        ..SplitParams::default()
    };
    let (training, validation) = split(&samples, &split_params);

    let inputs: Vec<String> = config.inputs.clone().unwrap_or_else(|| image.band_names());
    let input_refs: Vec<&str> = inputs.iter().map(String::as_str).collect();
    let forest_params = ForestParams {
        n_trees: config.trees,
        seed: config.seed,
        ..ForestParams::default()
    };
    let forest = RandomForest::train(&training, &config.label, &input_refs, &forest_params)
        .context("Failed to train classifier")?;
    pb.finish_and_clear();

    let matrix = evaluate(&forest, &validation, &config.label).context("Failed to evaluate classifier")?;
    match matrix.accuracy() {
        Some(acc) => info!("Validation accuracy: {:.4}", acc),
        None => warn!("Validation accuracy undefined (no validation samples)"),
    }

    let pb = spinner("Classifying and measuring area...");
    let classified = forest.predict(&image).context("Failed to classify composite")?;
    let areas = pixel_area(&classified)?;
    let area_params = AreaParams {
        unit: config.unit,
        max_pixels: config.max_pixels.unwrap_or(AreaParams::default().max_pixels),
    };
    let by_class = area_by_class(&classified, &areas, &region, &area_params).context("Failed to aggregate area")?;
    pb.finish_and_clear();

    if let Err(e) = store.export_image(&image, &format!("{}_composite", config.output)) {
        warn!("Composite export failed: {}", e);
    }
    let class_path = store.root().join(format!("{}.tif", config.output));
    if let Err(e) = write_class_geotiff(&classified, &class_path) {
        warn!("Classification export failed: {}", e);
    }
    if let Err(e) = store.export_features(&area_table(&by_class, config.unit), &format!("{}_area", config.output)) {
        warn!("Area table export failed: {}", e);
    }

    let report = WorkflowReport {
        region: region.label().to_string(),
        images,
        compare_images,
        samples: samples.len(),
        training: training.len(),
        validation: validation.len(),
        accuracy: matrix.accuracy(),
        kappa: matrix.kappa(),
        producers_accuracy: matrix.producers_accuracy(),
        consumers_accuracy: matrix.consumers_accuracy(),
        confusion_matrix: matrix,
        unit: config.unit,
        areas: by_class,
    };
    let report_path = store.root().join(format!("{}_report.json", config.output));
    if let Err(e) = std::fs::write(&report_path, serde_json::to_string_pretty(&report)?) {
        warn!("Report export failed: {}", e);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_workflow_uses_script_defaults() {
        let config: WorkflowConfig = serde_json::from_str(
            r#"{
                "store": "data",
                "collection": "S2_SR",
                "boundaries": "gadm41_KEN_1",
                "region": "Kilifi",
                "start": "2019-01-01",
                "end": "2020-01-01",
                "gcps": ["urban", "bare", "water", "vegetation"],
                "output": "kilifi_2019"
            }"#,
        )
        .unwrap();
        assert_eq!(config.trees, 50);
        assert_eq!(config.split, 0.6);
        assert_eq!(config.max_cloud, Some(30.0));
        assert_eq!(config.compare, None);
        assert!(!config.scene().no_cloud_filter);
        assert_eq!(config.method, CompositeMethod::Median);
        assert_eq!(config.unit, AreaUnit::Hectares);
        assert_eq!(config.bands, vec!["B*"]);
    }

    #[test]
    fn unknown_keys_fail_fast() {
        let err = serde_json::from_str::<WorkflowConfig>(
            r#"{"store": "data", "collection": "S2", "boundaries": "b", "region": "r",
                "start": "2019-01-01", "end": "2020-01-01", "gcps": ["g"], "output": "o",
                "num_trees": 100}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn indices_and_method_parse() {
        let config: WorkflowConfig = serde_json::from_str(
            r#"{"store": "data", "collection": "S2", "boundaries": "b", "region": "r",
                "start": "2019-01-01", "end": "2020-01-01", "gcps": ["g"], "output": "o",
                "method": "mosaic", "indices": ["ndvi", "ndwi"], "unit": "square_kilometers"}"#,
        )
        .unwrap();
        assert_eq!(config.method, CompositeMethod::Mosaic);
        assert_eq!(config.indices, vec![SpectralIndex::Ndvi, SpectralIndex::Ndwi]);
        assert_eq!(config.unit, AreaUnit::SquareKilometers);
    }

    #[test]
    fn change_workflow_with_comparison_period() {
        let config: WorkflowConfig = serde_json::from_str(
            r#"{"store": "data", "collection": "S2", "boundaries": "kenya_wards",
                "attribute": "ward", "region": "Syokimau-mulolongo Ward",
                "start": "2020-01-01", "end": "2020-02-01",
                "compare": {"start": "2024-01-01", "end": "2024-02-01"},
                "gcps": ["change", "nochange"], "label": "class", "output": "syokimau_change"}"#,
        )
        .unwrap();
        assert_eq!(
            config.compare,
            Some(Period {
                start: "2024-01-01".into(),
                end: "2024-02-01".into()
            })
        );
        assert_eq!(config.label, "class");
    }

    #[test]
    fn null_max_cloud_disables_cloud_filter() {
        let config: WorkflowConfig = serde_json::from_str(
            r#"{"store": "data", "collection": "S2", "boundaries": "b", "region": "r",
                "start": "2019-01-01", "end": "2020-01-01", "gcps": ["g"], "output": "o",
                "max_cloud": null}"#,
        )
        .unwrap();
        assert_eq!(config.max_cloud, None);
        assert!(config.scene().no_cloud_filter);
    }
}
