//! Crop-tree representation: source images plus per-category directories
//! of cropped annotation rasters.
//!
//! Layout:
//!
//! ```text
//! tree/
//!   images/{file_name}            source rasters, downloaded on demand
//!   crops/{name}--{cat_id}/{ann_id}.png
//!   crops/crops_failed.ndjson     one JSON line per failed crop
//! ```
//!
//! This representation is lossy by design: it projects annotations to
//! image files a human curator can inspect and delete. Loading reconciles
//! the directory back into a structured dataset by treating the files on
//! disk as a filter over a trusted base dataset - the crop tree itself
//! never introduces new records.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use walkdir::WalkDir;

use super::model::{Annotation, Category, Dataset, DatasetKind, Image};
use super::DumpOptions;
use crate::canonical::canonicalize;
use crate::error::CocodumpError;
use crate::media;

/// Name of the per-line failure log inside `crops/`.
pub const CROPS_FAILED_FILE: &str = "crops_failed.ndjson";

/// Aggregate outcome of a crop-tree dump.
///
/// Per-annotation crop failures are reported here (and in the ndjson log)
/// rather than failing the dump.
#[derive(Clone, Debug, Default)]
pub struct CropDumpStats {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures_file: PathBuf,
}

/// Loads a crop tree as a filter over `base`.
///
/// Category identity is recovered solely from the trailing `--<id>` of
/// each `crops/` subdirectory name; every `*.png` stem inside is an
/// annotation id. Ids that do not resolve in `base` are a hard error. The
/// result keeps the base `info` and `licenses` and replaces the other
/// collections with exactly the records reachable from files on disk.
pub fn load_crop_tree(
    source_dir: &Path,
    base: &Dataset,
    kind: DatasetKind,
) -> Result<Dataset, CocodumpError> {
    if !source_dir.is_dir() {
        return Err(CocodumpError::MissingDirectory {
            path: source_dir.to_path_buf(),
        });
    }
    let crops_dir = source_dir.join("crops");
    if !crops_dir.is_dir() {
        return Err(CocodumpError::MissingDirectory { path: crops_dir });
    }

    let categories: HashMap<&str, &Category> = base
        .categories
        .iter()
        .map(|cat| (cat.id.as_str(), cat))
        .collect();
    let images: HashMap<&str, &Image> = base
        .images
        .iter()
        .map(|image| (image.id.as_str(), image))
        .collect();
    let annotations: HashMap<&str, &Annotation> = base
        .annotations
        .iter()
        .map(|ann| (ann.id.as_str(), ann))
        .collect();

    let mut kept_categories: BTreeMap<&str, &Category> = BTreeMap::new();
    let mut kept_images: BTreeMap<&str, &Image> = BTreeMap::new();
    let mut kept_annotations: BTreeMap<&str, &Annotation> = BTreeMap::new();

    let mut category_dirs: Vec<PathBuf> = fs::read_dir(&crops_dir)?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    category_dirs.sort();

    for category_dir in &category_dirs {
        let dir_name = category_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let cat_id = match dir_name.rsplit_once("--") {
            Some((_, id)) if !id.is_empty() => id.to_string(),
            _ => {
                return Err(CocodumpError::UnknownIdentifier {
                    collection: "categories",
                    id: dir_name,
                })
            }
        };
        let category =
            *categories
                .get(cat_id.as_str())
                .ok_or_else(|| CocodumpError::UnknownIdentifier {
                    collection: "categories",
                    id: cat_id.clone(),
                })?;

        let mut crop_files: Vec<PathBuf> = fs::read_dir(category_dir)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some("png")
            })
            .collect();
        crop_files.sort();

        for crop_file in &crop_files {
            let ann_id = crop_file
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            let ann = *annotations.get(ann_id.as_str()).ok_or_else(|| {
                CocodumpError::UnknownIdentifier {
                    collection: "annotations",
                    id: ann_id.clone(),
                }
            })?;
            let image = *images.get(ann.image_id.as_str()).ok_or_else(|| {
                CocodumpError::UnknownIdentifier {
                    collection: "images",
                    id: ann.image_id.to_string(),
                }
            })?;

            kept_categories.insert(category.id.as_str(), category);
            kept_images.insert(image.id.as_str(), image);
            kept_annotations.insert(ann.id.as_str(), ann);
        }
        log::debug!(
            "Loaded {} crops from {}",
            crop_files.len(),
            category_dir.display()
        );
    }

    let dataset = Dataset {
        kind,
        annotations: kept_annotations.into_values().cloned().collect(),
        categories: kept_categories.into_values().cloned().collect(),
        images: kept_images.into_values().cloned().collect(),
        info: base.info.clone(),
        licenses: base.licenses.clone(),
    };
    log::info!(
        "Loaded crop_tree from {} ({} crop directories): {}",
        source_dir.display(),
        category_dirs.len(),
        dataset.summary()
    );
    Ok(dataset)
}

/// One annotation's crop destination.
struct CropTask<'a> {
    ann: &'a Annotation,
    dest: PathBuf,
}

/// One image plus all crops cut from it. The unit of parallel work.
struct WorkUnit<'a> {
    image: &'a Image,
    source_path: PathBuf,
    crops: Vec<CropTask<'a>>,
}

#[derive(Clone, Copy, Debug, Default)]
struct ChunkStats {
    written: usize,
    skipped: usize,
    failed: usize,
}

/// Dumps a dataset as a crop tree.
///
/// The dump is incremental and idempotent: `images/` and `crops/` are
/// reused when they exist (with `overwrite`), a source raster is only
/// loaded once some crop under it is actually missing, and existing crop
/// files are never re-cut or re-written. Work is partitioned by image
/// into contiguous chunks across a fixed pool of `workers` threads
/// (1 degenerates to sequential execution).
///
/// A crop that cannot be produced is logged, appended to
/// `crops/crops_failed.ndjson` and skipped; it never aborts the dump.
/// With `overwrite`, a final garbage-collection pass removes every path
/// under the target that the current dataset does not account for.
pub fn dump_crop_tree(
    dataset: &Dataset,
    target_dir: &Path,
    opts: &DumpOptions,
    workers: usize,
) -> Result<CropDumpStats, CocodumpError> {
    if target_dir.is_dir() && !opts.overwrite {
        return Err(CocodumpError::AlreadyExists {
            path: target_dir.to_path_buf(),
        });
    }

    let images_dir = target_dir.join("images");
    let crops_dir = target_dir.join("crops");
    fs::create_dir_all(&images_dir)?;
    fs::create_dir_all(&crops_dir)?;
    let failures_file = crops_dir.join(CROPS_FAILED_FILE);

    let units = build_work_units(dataset, &images_dir, &crops_dir)?;
    let total_crops: usize = units.iter().map(|unit| unit.crops.len()).sum();
    log::info!(
        "Dumping crop_tree to {}: {} images, {} crops, {} workers",
        target_dir.display(),
        units.len(),
        total_crops,
        workers.max(1)
    );

    let mut total = ChunkStats::default();
    if !units.is_empty() {
        let workers = workers.max(1);
        let chunk_size = units.len().div_ceil(workers);
        let results: Mutex<Vec<Result<ChunkStats, CocodumpError>>> = Mutex::new(Vec::new());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(std::io::Error::other)?;
        pool.scope(|scope| {
            for chunk in units.chunks(chunk_size) {
                let results = &results;
                let failures_file = &failures_file;
                scope.spawn(move |_| {
                    let outcome = process_chunk(chunk, failures_file, opts.skip_nulls);
                    results
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(outcome);
                });
            }
        });

        for outcome in results.into_inner().unwrap_or_else(PoisonError::into_inner) {
            let stats = outcome?;
            total.written += stats.written;
            total.skipped += stats.skipped;
            total.failed += stats.failed;
        }
    }

    if opts.overwrite {
        garbage_collect(target_dir, &images_dir, &crops_dir, &failures_file, &units)?;
    }

    log::info!(
        "Crops written to {}: written={}, skipped={}, failed={}",
        crops_dir.display(),
        total.written,
        total.skipped,
        total.failed
    );
    if total.failed > 0 {
        log::warn!(
            "Failed to process {} crops, see file {}",
            total.failed,
            failures_file.display()
        );
    }

    Ok(CropDumpStats {
        written: total.written,
        skipped: total.skipped,
        failed: total.failed,
        failures_file,
    })
}

/// Resolves every annotation to its destination path, grouped per image.
/// Images with zero annotations produce no unit and are never downloaded.
fn build_work_units<'a>(
    dataset: &'a Dataset,
    images_dir: &Path,
    crops_dir: &Path,
) -> Result<Vec<WorkUnit<'a>>, CocodumpError> {
    let categories: HashMap<&str, &Category> = dataset
        .categories
        .iter()
        .map(|cat| (cat.id.as_str(), cat))
        .collect();
    let images: HashMap<&str, &Image> = dataset
        .images
        .iter()
        .map(|image| (image.id.as_str(), image))
        .collect();

    let mut grouped: BTreeMap<&str, Vec<&Annotation>> = BTreeMap::new();
    for ann in &dataset.annotations {
        grouped.entry(ann.image_id.as_str()).or_default().push(ann);
    }

    let mut units = Vec::with_capacity(grouped.len());
    for (image_id, anns) in grouped {
        let image = *images
            .get(image_id)
            .ok_or_else(|| CocodumpError::UnknownIdentifier {
                collection: "images",
                id: image_id.to_string(),
            })?;
        let file_name = image.file_name();
        if file_name.is_empty() {
            return Err(CocodumpError::EmptyFileName {
                id: image.id.to_string(),
            });
        }

        let mut crops = Vec::with_capacity(anns.len());
        for ann in anns {
            let category = categories.get(ann.category_id.as_str()).ok_or_else(|| {
                CocodumpError::UnknownIdentifier {
                    collection: "categories",
                    id: ann.category_id.to_string(),
                }
            })?;
            crops.push(CropTask {
                ann,
                dest: crops_dir.join(category.dir_name()).join(ann.file_name()),
            });
        }
        units.push(WorkUnit {
            image,
            source_path: images_dir.join(file_name),
            crops,
        });
    }
    Ok(units)
}

/// Processes one contiguous chunk of work units on a single worker.
fn process_chunk(
    chunk: &[WorkUnit<'_>],
    failures_file: &Path,
    skip_nulls: bool,
) -> Result<ChunkStats, CocodumpError> {
    let mut stats = ChunkStats::default();
    for unit in chunk {
        let pending: Vec<&CropTask<'_>> = unit
            .crops
            .iter()
            .filter(|task| !task.dest.is_file())
            .collect();
        stats.skipped += unit.crops.len() - pending.len();
        if pending.is_empty() {
            log::debug!(
                "All {} crops for image {} already on disk",
                unit.crops.len(),
                unit.image.id
            );
            continue;
        }

        let raster = media::read_image(&unit.source_path, Some(unit.image.coco_url.as_str()))?;
        for task in pending {
            if let Some(parent) = task.dest.parent() {
                fs::create_dir_all(parent)?;
            }
            match media::crop_region(&raster, &task.ann.bbox) {
                Ok(crop) => {
                    media::write_image(&crop, &task.dest)?;
                    stats.written += 1;
                }
                Err(err) => {
                    log::error!("Dropping crop for annotation {}: {}", task.ann.id, err);
                    append_failure(failures_file, task.ann, skip_nulls)?;
                    stats.failed += 1;
                }
            }
        }
    }
    Ok(stats)
}

/// Appends one annotation to the ndjson failure log.
///
/// The handle is opened and closed around each write so concurrent
/// workers interleave whole lines, never partial ones.
fn append_failure(
    failures_file: &Path,
    ann: &Annotation,
    skip_nulls: bool,
) -> Result<(), CocodumpError> {
    let raw = serde_json::to_value(ann).map_err(|source| CocodumpError::JsonWrite {
        path: failures_file.to_path_buf(),
        source,
    })?;
    let line = serde_json::to_string(&canonicalize(&raw, skip_nulls)).map_err(|source| {
        CocodumpError::JsonWrite {
            path: failures_file.to_path_buf(),
            source,
        }
    })?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(failures_file)?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// Deletes every path under the target root that the current dataset does
/// not account for. Keeps a repeatedly-dumped tree in sync with a
/// shrinking dataset without a full delete-and-recreate.
fn garbage_collect(
    target_dir: &Path,
    images_dir: &Path,
    crops_dir: &Path,
    failures_file: &Path,
    units: &[WorkUnit<'_>],
) -> Result<(), CocodumpError> {
    let mut expected: HashSet<PathBuf> = HashSet::new();
    expected.insert(images_dir.to_path_buf());
    expected.insert(crops_dir.to_path_buf());
    expected.insert(failures_file.to_path_buf());
    for unit in units {
        expected.insert(unit.source_path.clone());
        for task in &unit.crops {
            if let Some(parent) = task.dest.parent() {
                expected.insert(parent.to_path_buf());
            }
            expected.insert(task.dest.clone());
        }
    }

    let mut removed = 0usize;
    for entry in WalkDir::new(target_dir).contents_first(true) {
        let entry = entry.map_err(std::io::Error::other)?;
        let path = entry.path();
        if path == target_dir || expected.contains(path) {
            continue;
        }
        if entry.file_type().is_dir() {
            fs::remove_dir_all(path)?;
        } else {
            fs::remove_file(path)?;
        }
        log::debug!("Removed stale path {}", path.display());
        removed += 1;
    }
    if removed > 0 {
        log::info!(
            "Garbage-collected {} stale paths under {}",
            removed,
            target_dir.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coco::Bbox;
    use image::RgbImage;

    fn base_dataset() -> Dataset {
        Dataset {
            images: vec![
                Image::new(1u64, "http://example.com/img/0001.jpg"),
                Image::new(2u64, "http://example.com/img/0002.jpg"),
            ],
            categories: vec![Category::new(1u64, "person"), Category::new(2u64, "hot dog")],
            annotations: vec![
                Annotation::new(10u64, 1u64, 1u64, Bbox::new(0, 0, 8, 8)),
                Annotation::new(11u64, 1u64, 2u64, Bbox::new(4, 4, 6, 6)),
                Annotation::new(12u64, 2u64, 1u64, Bbox::new(2, 2, 4, 4)),
            ],
            ..Default::default()
        }
    }

    /// Puts a decodable source raster where the dump expects it, so no
    /// download is attempted.
    fn seed_source_images(target_dir: &Path, dataset: &Dataset) {
        let images_dir = target_dir.join("images");
        fs::create_dir_all(&images_dir).unwrap();
        for image in &dataset.images {
            RgbImage::new(16, 16)
                .save(images_dir.join(image.file_name()))
                .unwrap();
        }
    }

    fn overwrite_opts() -> DumpOptions {
        DumpOptions {
            overwrite: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_dump_writes_one_crop_per_annotation() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("tree");
        let dataset = base_dataset();
        seed_source_images(&target, &dataset);

        let stats = dump_crop_tree(&dataset, &target, &overwrite_opts(), 1).unwrap();
        assert_eq!(stats.written, 3);
        assert_eq!(stats.failed, 0);
        assert!(target.join("crops/person--1/10.png").is_file());
        assert!(target.join("crops/hot_dog--2/11.png").is_file());
        assert!(target.join("crops/person--1/12.png").is_file());
    }

    #[test]
    fn test_dump_refuses_existing_dir_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("tree");
        fs::create_dir_all(&target).unwrap();

        let err =
            dump_crop_tree(&base_dataset(), &target, &DumpOptions::default(), 1).unwrap_err();
        assert!(matches!(err, CocodumpError::AlreadyExists { .. }));
    }

    #[test]
    fn test_second_dump_skips_existing_crops() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("tree");
        let dataset = base_dataset();
        seed_source_images(&target, &dataset);

        dump_crop_tree(&dataset, &target, &overwrite_opts(), 1).unwrap();
        let stats = dump_crop_tree(&dataset, &target, &overwrite_opts(), 1).unwrap();
        assert_eq!(stats.written, 0);
        assert_eq!(stats.skipped, 3);
    }

    #[test]
    fn test_out_of_bounds_crop_is_logged_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("tree");
        let mut dataset = base_dataset();
        // Far outside the 16x16 source raster.
        dataset
            .annotations
            .push(Annotation::new(13u64, 2u64, 1u64, Bbox::new(100, 100, 5, 5)));
        seed_source_images(&target, &dataset);

        let stats = dump_crop_tree(&dataset, &target, &overwrite_opts(), 1).unwrap();
        assert_eq!(stats.written, 3);
        assert_eq!(stats.failed, 1);

        let log = fs::read_to_string(stats.failures_file).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 1);
        let record: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(record["id"], "13");
    }

    #[test]
    fn test_load_reconciles_disk_state_against_base() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("tree");
        let dataset = base_dataset();
        seed_source_images(&target, &dataset);
        dump_crop_tree(&dataset, &target, &overwrite_opts(), 2).unwrap();

        let reloaded = load_crop_tree(&target, &dataset, DatasetKind::ObjectDetection).unwrap();
        assert_eq!(reloaded, dataset);

        // A curator deleting a crop file drops exactly that annotation.
        fs::remove_file(target.join("crops/hot_dog--2/11.png")).unwrap();
        let pruned = load_crop_tree(&target, &dataset, DatasetKind::ObjectDetection).unwrap();
        assert_eq!(pruned.annotations.len(), 2);
        assert!(pruned.annotations.iter().all(|a| a.id.as_str() != "11"));
        assert_eq!(pruned.categories.len(), 1);
    }

    #[test]
    fn test_load_rejects_unknown_annotation_id() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("tree");
        let dataset = base_dataset();
        seed_source_images(&target, &dataset);
        dump_crop_tree(&dataset, &target, &overwrite_opts(), 1).unwrap();

        RgbImage::new(2, 2)
            .save(target.join("crops/person--1/999.png"))
            .unwrap();
        let err = load_crop_tree(&target, &dataset, DatasetKind::ObjectDetection).unwrap_err();
        match err {
            CocodumpError::UnknownIdentifier { collection, id } => {
                assert_eq!(collection, "annotations");
                assert_eq!(id, "999");
            }
            other => panic!("expected UnknownIdentifier, got {other:?}"),
        }
    }

    #[test]
    fn test_load_rejects_unparseable_category_dir() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("tree");
        let dataset = base_dataset();
        seed_source_images(&target, &dataset);
        dump_crop_tree(&dataset, &target, &overwrite_opts(), 1).unwrap();

        fs::create_dir(target.join("crops/no_id_suffix")).unwrap();
        let err = load_crop_tree(&target, &dataset, DatasetKind::ObjectDetection).unwrap_err();
        assert!(matches!(
            err,
            CocodumpError::UnknownIdentifier {
                collection: "categories",
                ..
            }
        ));
    }

    #[test]
    fn test_load_requires_crops_dir() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("tree");
        fs::create_dir_all(&target).unwrap();

        let err =
            load_crop_tree(&target, &base_dataset(), DatasetKind::ObjectDetection).unwrap_err();
        assert!(matches!(err, CocodumpError::MissingDirectory { .. }));
    }

    #[test]
    fn test_overwrite_garbage_collects_stale_paths() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("tree");
        let dataset = base_dataset();
        seed_source_images(&target, &dataset);
        dump_crop_tree(&dataset, &target, &overwrite_opts(), 1).unwrap();

        // Shrink the dataset: category 2 and image 2 disappear entirely.
        let mut smaller = dataset.clone();
        smaller.annotations.truncate(1);
        let stats = dump_crop_tree(&smaller, &target, &overwrite_opts(), 1).unwrap();
        assert_eq!(stats.written, 0);
        assert_eq!(stats.skipped, 1);

        assert!(target.join("crops/person--1/10.png").is_file());
        assert!(!target.join("crops/person--1/12.png").exists());
        assert!(!target.join("crops/hot_dog--2").exists());
        assert!(!target.join("images/0002.jpg").exists());
        assert!(target.join("images/0001.jpg").is_file());
    }

    #[test]
    fn test_dump_with_multiple_workers_matches_sequential() {
        let dir = tempfile::tempdir().unwrap();
        let sequential = dir.path().join("seq");
        let parallel = dir.path().join("par");
        let dataset = base_dataset();
        seed_source_images(&sequential, &dataset);
        seed_source_images(&parallel, &dataset);

        dump_crop_tree(&dataset, &sequential, &overwrite_opts(), 1).unwrap();
        dump_crop_tree(&dataset, &parallel, &overwrite_opts(), 3).unwrap();

        let list = |root: &Path| {
            let mut paths: Vec<String> = WalkDir::new(root)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| {
                    e.path()
                        .strip_prefix(root)
                        .unwrap()
                        .to_string_lossy()
                        .into_owned()
                })
                .collect();
            paths.sort();
            paths
        };
        assert_eq!(list(&sequential), list(&parallel));
    }
}
