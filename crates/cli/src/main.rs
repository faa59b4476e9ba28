//! Ardhi CLI - land-cover mapping from optical imagery

mod workflow;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use ardhi_algorithms::area::{area_by_class, area_table, class_area, pixel_area, AreaParams, AreaUnit};
use ardhi_algorithms::cloud_mask::{link_collection, mask_collection, CloudMaskParams};
use ardhi_algorithms::composite::{composite, CompositeMethod, CompositeParams};
use ardhi_algorithms::filter::{filter_collection, Filter};
use ardhi_algorithms::imagery::{
    add_index, add_normalized_difference, index_difference, nbr, threshold_mask, SpectralIndex,
    DEFAULT_BURN_THRESHOLD,
};
use ardhi_algorithms::region::{clip, resolve_region, Region};
use ardhi_algorithms::statistics::{zonal_statistics, zonal_table};
use ardhi_algorithms::timeseries::region_mean_series;
use ardhi_colormap::{data_range, ColorScheme, RenderContext, VisParams};
use ardhi_core::io::{read_geotiff, write_class_geotiff, ExportSink, FeatureStore, ImageStore, LocalStore};
use ardhi_core::{AttributeValue, Image, ImageCollection, Raster};

use workflow::WorkflowConfig;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "ardhi")]
#[command(author, version, about = "Land-cover mapping from optical imagery", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Worker threads (default: all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

/// Where the imagery comes from and how it is screened
#[derive(Args, Debug, Clone)]
pub(crate) struct SceneArgs {
    /// Data store directory
    #[arg(long, default_value = "data")]
    pub store: PathBuf,
    /// Image collection name
    #[arg(long)]
    pub collection: String,
    /// Boundary feature collection
    #[arg(long)]
    pub boundaries: String,
    /// Boundary attribute to match
    #[arg(long, default_value = "NAME_1")]
    pub attribute: String,
    /// Attribute value naming the region
    #[arg(long)]
    pub region: String,
    /// Image property holding the cloud percentage
    #[arg(long, default_value = "CLOUDY_PIXEL_PERCENTAGE")]
    pub cloud_property: String,
    /// Keep images with cloud property below this value
    #[arg(long, default_value = "30")]
    pub max_cloud: f64,
    /// Skip the cloud-property filter (collections without one, e.g. climate grids)
    #[arg(long)]
    pub no_cloud_filter: bool,
    /// Cloud-score collection linked by image id
    #[arg(long)]
    pub cloud_score: Option<String>,
    /// Clear-sky score band
    #[arg(long, default_value = "cs")]
    pub qa_band: String,
    /// Mask samples whose score is below this value
    #[arg(long, default_value = "0.5")]
    pub clear_threshold: f64,
}

#[derive(Subcommand)]
enum Commands {
    /// List the images of a collection
    Info {
        /// Data store directory
        store: PathBuf,
        /// Collection name
        collection: String,
    },
    /// Build a cloud-masked composite over a region
    Composite {
        #[command(flatten)]
        scene: SceneArgs,
        /// Start date (YYYY-MM-DD, inclusive)
        #[arg(long, value_parser = parse_date)]
        start: DateTime<Utc>,
        /// End date (YYYY-MM-DD, exclusive)
        #[arg(long, value_parser = parse_date)]
        end: DateTime<Utc>,
        /// Reduction: median or mosaic
        #[arg(short, long, default_value = "median")]
        method: String,
        /// Bands to keep (names or prefix*)
        #[arg(short, long, default_value = "B*")]
        bands: Vec<String>,
        /// Keep samples outside the region
        #[arg(long)]
        no_clip: bool,
        /// Export destination inside the store
        #[arg(short, long)]
        output: String,
    },
    /// Add a normalized difference band to an exported image
    Index {
        /// Data store directory
        #[arg(long, default_value = "data")]
        store: PathBuf,
        /// Exported image name
        input: String,
        /// Positive band
        #[arg(short)]
        a: String,
        /// Negative band
        #[arg(short)]
        b: String,
        /// Output band name
        #[arg(short, long, default_value = "ND")]
        name: String,
        /// Export destination inside the store
        #[arg(short, long)]
        output: String,
    },
    /// Run a supervised classification workflow file
    Classify {
        /// Workflow JSON file
        #[arg(short, long)]
        workflow: PathBuf,
    },
    /// Per-class area of a classified raster inside a region
    Area {
        /// Data store directory
        #[arg(long, default_value = "data")]
        store: PathBuf,
        /// Classified GeoTIFF
        classified: PathBuf,
        /// Boundary feature collection
        #[arg(long)]
        boundaries: String,
        /// Boundary attribute to match
        #[arg(long, default_value = "NAME_1")]
        attribute: String,
        /// Attribute value naming the region
        #[arg(long)]
        region: String,
        /// Area unit: m2, ha, km2
        #[arg(short, long, default_value = "ha")]
        unit: String,
        /// Only this class
        #[arg(long)]
        class: Option<i32>,
        /// Pixel cap for the region window
        #[arg(long)]
        max_pixels: Option<u64>,
        /// Export the area table under this name
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Burned area from pre- and post-event composites (dNBR)
    Burn {
        #[command(flatten)]
        scene: SceneArgs,
        #[arg(long, value_parser = parse_date)]
        pre_start: DateTime<Utc>,
        #[arg(long, value_parser = parse_date)]
        pre_end: DateTime<Utc>,
        #[arg(long, value_parser = parse_date)]
        post_start: DateTime<Utc>,
        #[arg(long, value_parser = parse_date)]
        post_end: DateTime<Utc>,
        /// dNBR above this value counts as burned
        #[arg(short, long, default_value_t = DEFAULT_BURN_THRESHOLD)]
        threshold: f64,
        /// Export destination inside the store
        #[arg(short, long)]
        output: String,
    },
    /// Region mean of a spectral index or a raw band for every image
    Series {
        #[command(flatten)]
        scene: SceneArgs,
        #[arg(long, value_parser = parse_date)]
        start: DateTime<Utc>,
        #[arg(long, value_parser = parse_date)]
        end: DateTime<Utc>,
        /// Index: ndvi, nbr, ndwi
        #[arg(short, long, default_value = "ndvi", conflicts_with = "band")]
        index: String,
        /// Chart this band instead of an index
        #[arg(short, long)]
        band: Option<String>,
        /// Multiply the band by this factor first (e.g. 0.1 for tenths of a degree)
        #[arg(long, requires = "band")]
        scale: Option<f64>,
        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Statistics of one band inside each zone, zones sharing a key merged
    Zonal {
        /// Data store directory
        #[arg(long, default_value = "data")]
        store: PathBuf,
        /// Exported image name
        input: String,
        /// Band to summarise
        #[arg(short, long)]
        band: String,
        /// Zone feature collection
        #[arg(long)]
        zones: String,
        /// Zone property; features sharing a value form one zone
        #[arg(short, long, default_value = "shapeName")]
        key: String,
        /// Export the statistics table under this name
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Render an exported image to an RGBA TIFF
    Render {
        /// Data store directory
        #[arg(long, default_value = "data")]
        store: PathBuf,
        /// Exported image name
        input: String,
        /// Visualization JSON ({bands, min, max, palette})
        #[arg(long)]
        vis: Option<PathBuf>,
        /// Band to stretch over its data range when no --vis is given
        #[arg(long)]
        band: Option<String>,
        /// Colour scheme for --band: grayscale, ndvi, water, divergent, landcover
        #[arg(long, default_value = "grayscale")]
        scheme: String,
        /// Output RGBA TIFF
        output: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

pub(crate) fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

pub(crate) fn parse_date(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("invalid date '{}': {}", s, e))?;
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("invalid date '{}'", s))
}

fn parse_method(s: &str) -> Result<CompositeMethod> {
    match s.to_lowercase().as_str() {
        "median" => Ok(CompositeMethod::Median),
        "mosaic" => Ok(CompositeMethod::Mosaic),
        _ => bail!("Unknown composite method: {} (expected median or mosaic)", s),
    }
}

fn load_region(store: &LocalStore, boundaries: &str, attribute: &str, value: &str) -> Result<Region> {
    let features = store
        .features(boundaries)
        .with_context(|| format!("Failed to load boundaries '{}'", boundaries))?;
    let region = resolve_region(&features, attribute, &AttributeValue::from(value));
    region
        .require_non_empty()
        .with_context(|| format!("No boundary in '{}' has {} = {}", boundaries, attribute, value))?;
    Ok(region)
}

/// Store, resolved region and the raw collection
pub(crate) fn load_scene(args: &SceneArgs) -> Result<(LocalStore, Region, ImageCollection)> {
    let store = LocalStore::new(&args.store);
    let region = load_region(&store, &args.boundaries, &args.attribute, &args.region)?;
    let pb = spinner("Loading collection...");
    let collection = store
        .collection(&args.collection)
        .with_context(|| format!("Failed to load collection '{}'", args.collection))?;
    pb.finish_and_clear();
    info!("Collection {}: {} images", args.collection, collection.len());
    Ok((store, region, collection))
}

/// Date, bounds and cloud filters, then cloud-score masking when configured
pub(crate) fn prepare_collection(
    args: &SceneArgs,
    store: &LocalStore,
    collection: &ImageCollection,
    region: &Region,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<ImageCollection> {
    let mut filters = vec![Filter::date(start, end), Filter::Bounds(region.clone())];
    if !args.no_cloud_filter {
        filters.push(Filter::lt(args.cloud_property.clone(), args.max_cloud));
    }
    let filtered = filter_collection(collection, &filters);
    info!(
        "{} of {} images between {} and {}",
        filtered.len(),
        collection.len(),
        start.date_naive(),
        end.date_naive()
    );

    let Some(score_name) = &args.cloud_score else {
        return Ok(filtered);
    };
    let scores = store
        .collection(score_name)
        .with_context(|| format!("Failed to load cloud scores '{}'", score_name))?;
    let params = CloudMaskParams {
        qa_band: args.qa_band.clone(),
        clear_threshold: args.clear_threshold,
    };
    let pb = spinner("Masking clouds...");
    let linked = link_collection(&filtered, &scores, &[params.qa_band.as_str()]).context("Failed to link cloud scores")?;
    let masked = mask_collection(&linked, &params).context("Failed to mask clouds")?;
    pb.finish_and_clear();
    Ok(masked)
}

fn build_composite(
    args: &SceneArgs,
    store: &LocalStore,
    collection: &ImageCollection,
    region: &Region,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    params: &CompositeParams,
) -> Result<Image> {
    let prepared = prepare_collection(args, store, collection, region, start, end)?;
    let pb = spinner("Compositing...");
    let image = composite(&prepared, params).context("Failed to build composite")?;
    pb.finish_and_clear();
    Ok(image)
}

fn load_image(store: &LocalStore, name: &str) -> Result<Image> {
    let collection = store
        .collection(name)
        .with_context(|| format!("Failed to load image '{}'", name))?;
    collection
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("'{}' holds no image", name))
}

fn export(store: &LocalStore, image: &Image, destination: &str) {
    match store.export_image(image, destination) {
        Ok(path) => println!("Exported {} to: {}", destination, path.display()),
        Err(e) => warn!("Export of {} failed: {}", destination, e),
    }
}

fn done(name: &str, elapsed: std::time::Duration) {
    println!("{} finished", name);
    println!("  Processing time: {:.2?}", elapsed);
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map_or_else(|| "undefined".to_string(), |v| format!("{:.4}", v))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    if let Some(n) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { store, collection } => {
            let store = LocalStore::new(store);
            let catalog = store
                .catalog(&collection)
                .with_context(|| format!("Failed to read catalog of '{}'", collection))?;
            println!("Collection: {} ({} images)", collection, catalog.images.len());
            for entry in &catalog.images {
                let time = entry
                    .time_start
                    .map_or_else(|| "-".to_string(), |t| t.to_rfc3339());
                let cloud = entry
                    .properties
                    .get("CLOUDY_PIXEL_PERCENTAGE")
                    .and_then(AttributeValue::as_f64)
                    .map_or_else(|| "-".to_string(), |c| format!("{:.1}%", c));
                let bands: Vec<&str> = entry.bands.keys().map(String::as_str).collect();
                println!("  {}  {}  cloud {}  [{}]", entry.id, time, cloud, bands.join(", "));
            }
        }

        // ── Composite ────────────────────────────────────────────────
        Commands::Composite {
            scene,
            start,
            end,
            method,
            bands,
            no_clip,
            output,
        } => {
            let params = CompositeParams {
                method: parse_method(&method)?,
                bands: Some(bands),
            };
            let (store, region, collection) = load_scene(&scene)?;
            let begin = Instant::now();
            let mut image = build_composite(&scene, &store, &collection, &region, start, end, &params)?;
            if !no_clip {
                image = clip(&image, &region).context("Failed to clip composite")?;
            }
            let elapsed = begin.elapsed();
            info!("Composite bands: {}", image.band_names().join(", "));
            export(&store, &image, &output);
            done("Composite", elapsed);
        }

        // ── Index ────────────────────────────────────────────────────
        Commands::Index {
            store,
            input,
            a,
            b,
            name,
            output,
        } => {
            let store = LocalStore::new(store);
            let image = load_image(&store, &input)?;
            let begin = Instant::now();
            let with_index = add_normalized_difference(&image, &a, &b, &name)
                .with_context(|| format!("Failed to compute ({} - {}) / ({} + {})", a, b, a, b))?;
            let elapsed = begin.elapsed();
            let stats = with_index.band(&name)?.statistics();
            println!("{}: min {}  max {}  mean {}", name, fmt_opt(stats.min), fmt_opt(stats.max), fmt_opt(stats.mean));
            export(&store, &with_index, &output);
            done("Index", elapsed);
        }

        // ── Classify ─────────────────────────────────────────────────
        Commands::Classify { workflow } => {
            let config = WorkflowConfig::from_file(&workflow)?;
            let begin = Instant::now();
            let report = workflow::run(&config)?;
            let elapsed = begin.elapsed();

            println!("Region: {}", report.region);
            match report.compare_images {
                Some(n) => println!("Images: {} + {} (stacked)", report.images, n),
                None => println!("Images: {}", report.images),
            }
            println!(
                "Samples: {} ({} training, {} validation)",
                report.samples, report.training, report.validation
            );
            println!("Overall accuracy: {}", fmt_opt(report.accuracy));
            println!("Kappa: {}", fmt_opt(report.kappa));
            for ((class, producers), (_, consumers)) in report.producers_accuracy.iter().zip(&report.consumers_accuracy) {
                println!("  class {}: producer's {}  consumer's {}", class, fmt_opt(*producers), fmt_opt(*consumers));
            }
            println!("Area by class ({}):", report.unit);
            for (class, area) in &report.areas {
                println!("  {}: {:.4}", class, area);
            }
            done("Classification", elapsed);
        }

        // ── Area ─────────────────────────────────────────────────────
        Commands::Area {
            store,
            classified,
            boundaries,
            attribute,
            region,
            unit,
            class,
            max_pixels,
            output,
        } => {
            let store = LocalStore::new(store);
            let unit: AreaUnit = unit.parse()?;
            let params = AreaParams {
                unit,
                max_pixels: max_pixels.unwrap_or(AreaParams::default().max_pixels),
            };
            let region = load_region(&store, &boundaries, &attribute, &region)?;
            let pb = spinner("Reading raster...");
            let raster: Raster<i32> = read_geotiff(&classified).context("Failed to read classified raster")?;
            pb.finish_and_clear();

            let begin = Instant::now();
            let areas = pixel_area(&raster)?;
            match class {
                Some(c) => {
                    let area = class_area(&raster, &areas, &region, c, &params).context("Failed to aggregate area")?;
                    println!("Class {}: {:.4} {}", c, area, unit);
                }
                None => {
                    let by_class = area_by_class(&raster, &areas, &region, &params).context("Failed to aggregate area")?;
                    for (c, area) in &by_class {
                        println!("Class {}: {:.4} {}", c, area, unit);
                    }
                    if let Some(dest) = output {
                        if let Err(e) = store.export_features(&area_table(&by_class, unit), &dest) {
                            warn!("Area table export failed: {}", e);
                        }
                    }
                }
            }
            done("Area", begin.elapsed());
        }

        // ── Burn ─────────────────────────────────────────────────────
        Commands::Burn {
            scene,
            pre_start,
            pre_end,
            post_start,
            post_end,
            threshold,
            output,
        } => {
            let (store, region, collection) = load_scene(&scene)?;
            let params = CompositeParams {
                bands: Some(vec!["B8".to_string(), "B12".to_string()]),
                ..CompositeParams::default()
            };
            let begin = Instant::now();
            let pre = build_composite(&scene, &store, &collection, &region, pre_start, pre_end, &params)?;
            let post = build_composite(&scene, &store, &collection, &region, post_start, post_end, &params)?;
            let pre = clip(&pre, &region)?;
            let post = clip(&post, &region)?;

            let dnbr = index_difference(&nbr(&pre)?, &nbr(&post)?).context("Failed to compute dNBR")?;
            let burned = threshold_mask(&dnbr, threshold)?;
            let areas = pixel_area(&burned)?;
            let hectares = class_area(&burned, &areas, &region, 1, &AreaParams::default())
                .context("Failed to aggregate burned area")?;
            let elapsed = begin.elapsed();

            println!("Burned area (dNBR > {}): {:.2} ha", threshold, hectares);
            let dnbr_image = Image::new(format!("{}_dnbr", output)).with_band("dNBR", dnbr)?;
            export(&store, &dnbr_image, &output);
            let mask_path = store.root().join(format!("{}_burned.tif", output));
            if let Err(e) = write_class_geotiff(&burned, &mask_path) {
                warn!("Burned mask export failed: {}", e);
            }
            done("Burn", elapsed);
        }

        // ── Series ───────────────────────────────────────────────────
        Commands::Series {
            scene,
            start,
            end,
            index,
            band,
            scale,
            output,
        } => {
            let (store, region, collection) = load_scene(&scene)?;
            let begin = Instant::now();
            let prepared = prepare_collection(&scene, &store, &collection, &region, start, end)?;
            let (charted, name) = match band {
                Some(band) => {
                    let factor = scale.unwrap_or(1.0);
                    let scaled = prepared
                        .try_map(|image| image.scale(&band, factor))
                        .with_context(|| format!("Failed to scale {}", band))?;
                    (scaled, band)
                }
                None => {
                    let index: SpectralIndex = index.parse()?;
                    let with_index = prepared
                        .try_map(|image| add_index(image, index))
                        .with_context(|| format!("Failed to compute {}", index.name()))?;
                    (with_index, index.name().to_string())
                }
            };
            let series = region_mean_series(&charted, &name, &region).context("Failed to build series")?;
            let elapsed = begin.elapsed();

            let json = serde_json::to_string_pretty(&series)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Series saved to: {}", path.display());
                }
                None => println!("{}", json),
            }
            done("Series", elapsed);
        }

        // ── Zonal ────────────────────────────────────────────────────
        Commands::Zonal {
            store,
            input,
            band,
            zones,
            key,
            output,
        } => {
            let store = LocalStore::new(store);
            let image = load_image(&store, &input)?;
            let zones = store
                .features(&zones)
                .with_context(|| format!("Failed to load zones '{}'", zones))?;
            let begin = Instant::now();
            let results = zonal_statistics(image.band(&band)?, &zones, &key).context("Failed to compute zonal statistics")?;
            let elapsed = begin.elapsed();

            println!("{} zones by {}:", results.len(), key);
            for z in &results {
                println!(
                    "  {}: count {}  mean {}  sum {}  min {}  max {}  std {}",
                    z.zone,
                    z.count,
                    fmt_opt(z.mean),
                    fmt_opt(z.sum),
                    fmt_opt(z.min),
                    fmt_opt(z.max),
                    fmt_opt(z.std_dev)
                );
            }
            if let Some(dest) = output {
                match store.export_features(&zonal_table(&results, &key), &dest) {
                    Ok(path) => println!("Table saved to: {}", path.display()),
                    Err(e) => warn!("Zonal table export failed: {}", e),
                }
            }
            done("Zonal statistics", elapsed);
        }

        // ── Render ───────────────────────────────────────────────────
        Commands::Render {
            store,
            input,
            vis,
            band,
            scheme,
            output,
        } => {
            let store = LocalStore::new(store);
            let image = load_image(&store, &input)?;
            let vis = match (vis, band) {
                (Some(path), _) => VisParams::from_file(&path)
                    .with_context(|| format!("Invalid visualization file {}", path.display()))?,
                (None, Some(band)) => {
                    let scheme: ColorScheme = scheme.parse()?;
                    let (min, max) = data_range(image.band(&band)?);
                    let colors: Vec<String> = scheme.palette().stops().iter().map(|s| s.color.to_hex()).collect();
                    let colors: Vec<&str> = colors.iter().map(String::as_str).collect();
                    VisParams::palette(band, min, max, &colors)
                }
                (None, None) => bail!("Either --vis or --band is required"),
            };

            let begin = Instant::now();
            let mut ctx = RenderContext::new();
            if let Some(rect) = image.footprint() {
                let c = rect.center();
                ctx.center_on(c.x, c.y, 10);
            }
            ctx.add_layer(&input, &image, &vis, true)?;
            ctx.write_layer(&input, &output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Rendered {} to: {}", input, output.display());
            done("Render", begin.elapsed());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ardhi_core::io::write_features;
    use ardhi_core::{Feature, FeatureCollection, GeoTransform, TIME_START};
    use geo_types::{polygon, Geometry};

    fn scene(store: PathBuf) -> SceneArgs {
        SceneArgs {
            store,
            collection: "TERRACLIMATE".into(),
            boundaries: "counties".into(),
            attribute: "NAME_1".into(),
            region: "Nairobi".into(),
            cloud_property: "CLOUDY_PIXEL_PERCENTAGE".into(),
            max_cloud: 30.0,
            no_cloud_filter: false,
            cloud_score: None,
            qa_band: "cs".into(),
            clear_threshold: 0.5,
        }
    }

    fn county() -> FeatureCollection {
        vec![Feature::new(Geometry::Polygon(polygon![
            (x: 36.6, y: -1.5), (x: 37.1, y: -1.5), (x: 37.1, y: -1.1), (x: 36.6, y: -1.1), (x: 36.6, y: -1.5),
        ]))
        .with_property("NAME_1", "Nairobi")]
        .into_iter()
        .collect()
    }

    fn monthly_grids() -> ImageCollection {
        (1..=2)
            .map(|m| {
                let tmmx = Raster::filled(4, 4, 280.0).with_transform(GeoTransform::new(36.5, -1.0, 0.2, -0.2));
                Image::new(format!("2022{:02}", m))
                    .with_band("tmmx", tmmx)
                    .unwrap()
                    .with_property(TIME_START, parse_date(&format!("2022-{:02}-01", m)).unwrap())
            })
            .collect()
    }

    #[test]
    fn unknown_region_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        write_features(&county(), dir.path().join("counties.geojson")).unwrap();
        let store = LocalStore::new(dir.path());

        let err = load_region(&store, "counties", "NAME_1", "Nonexistent").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ardhi_core::Error>(),
            Some(ardhi_core::Error::EmptyRegion(_))
        ));
        assert!(load_region(&store, "counties", "NAME_1", "Nairobi").is_ok());
    }

    #[test]
    fn cloud_filter_can_be_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let region = resolve_region(&county(), "NAME_1", &AttributeValue::from("Nairobi"));
        let start = parse_date("2022-01-01").unwrap();
        let end = parse_date("2023-01-01").unwrap();

        let mut args = scene(dir.path().to_path_buf());
        let screened = prepare_collection(&args, &store, &monthly_grids(), &region, start, end).unwrap();
        assert!(screened.is_empty());

        args.no_cloud_filter = true;
        let kept = prepare_collection(&args, &store, &monthly_grids(), &region, start, end).unwrap();
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn dates_parse_to_midnight_utc() {
        assert_eq!(parse_date("2019-01-01").unwrap().to_rfc3339(), "2019-01-01T00:00:00+00:00");
        assert!(parse_date("2019-13-01").is_err());
    }
}
