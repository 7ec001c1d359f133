mod common;

use cocodump::coco::{
    io_crop_tree, io_json_file, io_json_tree, DatasetKind, DumpOptions,
};
use common::{sample_dataset, seed_source_images};

fn overwrite_opts() -> DumpOptions {
    DumpOptions {
        overwrite: true,
        ..Default::default()
    }
}

#[test]
fn json_file_round_trips_through_json_tree() {
    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("dataset.json");
    let tree_path = dir.path().join("tree");

    io_json_file::dump_json_file(&sample_dataset(), &json_path, &DumpOptions::default()).unwrap();
    let loaded = io_json_file::load_json_file(&json_path, DatasetKind::ObjectDetection).unwrap();
    assert_eq!(loaded, sample_dataset());

    io_json_tree::dump_json_tree(&loaded, &tree_path, &DumpOptions::default()).unwrap();
    let reloaded = io_json_tree::load_json_tree(&tree_path, DatasetKind::ObjectDetection).unwrap();
    assert_eq!(reloaded, sample_dataset());
}

#[test]
fn skip_nulls_survives_the_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let tree_path = dir.path().join("tree");
    let opts = DumpOptions {
        skip_nulls: true,
        ..Default::default()
    };

    io_json_tree::dump_json_tree(&sample_dataset(), &tree_path, &opts).unwrap();
    let reloaded = io_json_tree::load_json_tree(&tree_path, DatasetKind::ObjectDetection).unwrap();
    assert_eq!(reloaded, sample_dataset());
}

/// The full pipeline: json_file -> json_tree -> crop_tree (2 workers) and
/// back, asserting nothing is lost at any hop when every crop succeeds.
#[test]
fn end_to_end_all_representations() {
    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("dataset.json");
    let tree_path = dir.path().join("tree");
    let crop_path = dir.path().join("crop_tree");

    let original = sample_dataset();
    io_json_file::dump_json_file(&original, &json_path, &DumpOptions::default()).unwrap();
    let loaded = io_json_file::load_json_file(&json_path, DatasetKind::ObjectDetection).unwrap();

    io_json_tree::dump_json_tree(&loaded, &tree_path, &DumpOptions::default()).unwrap();
    let from_tree = io_json_tree::load_json_tree(&tree_path, DatasetKind::ObjectDetection).unwrap();
    assert_eq!(from_tree, original);

    // Bboxes in the fixture all fit a 32x32 raster, so every crop succeeds.
    seed_source_images(&crop_path, &from_tree, 32);
    let stats = io_crop_tree::dump_crop_tree(&from_tree, &crop_path, &overwrite_opts(), 2).unwrap();
    assert_eq!(stats.written, original.annotations.len());
    assert_eq!(stats.failed, 0);

    let from_crops =
        io_crop_tree::load_crop_tree(&crop_path, &original, DatasetKind::ObjectDetection).unwrap();
    assert_eq!(from_crops.annotations, original.annotations);
    assert_eq!(from_crops.images, original.images);
    assert_eq!(from_crops.categories, original.categories);
    assert_eq!(from_crops.licenses, original.licenses);
    assert_eq!(from_crops.info, original.info);
}

#[test]
fn crop_tree_dump_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let crop_path = dir.path().join("crop_tree");
    let dataset = sample_dataset();

    seed_source_images(&crop_path, &dataset, 32);
    let first = io_crop_tree::dump_crop_tree(&dataset, &crop_path, &overwrite_opts(), 1).unwrap();
    assert_eq!(first.written, 5);

    // A second run re-writes nothing: every crop is already on disk.
    let second = io_crop_tree::dump_crop_tree(&dataset, &crop_path, &overwrite_opts(), 1).unwrap();
    assert_eq!(second.written, 0);
    assert_eq!(second.skipped, 5);
    assert_eq!(second.failed, 0);
}

#[test]
fn crop_tree_partial_failure_keeps_the_dump_alive() {
    let dir = tempfile::tempdir().unwrap();
    let crop_path = dir.path().join("crop_tree");
    let mut dataset = sample_dataset();
    // Entirely outside a 32x32 raster.
    dataset.annotations[4] = cocodump::coco::Annotation::new(
        5u64,
        2u64,
        2u64,
        cocodump::coco::Bbox::new(100, 100, 10, 10),
    );

    seed_source_images(&crop_path, &dataset, 32);
    let stats = io_crop_tree::dump_crop_tree(&dataset, &crop_path, &overwrite_opts(), 2).unwrap();
    assert_eq!(stats.written, 4);
    assert_eq!(stats.failed, 1);

    let log = std::fs::read_to_string(&stats.failures_file).unwrap();
    assert_eq!(log.lines().count(), 1);

    // Loading back keeps only the annotations whose crops exist.
    let reloaded =
        io_crop_tree::load_crop_tree(&crop_path, &dataset, DatasetKind::ObjectDetection).unwrap();
    assert_eq!(reloaded.annotations.len(), 4);
    assert!(reloaded.annotations.iter().all(|a| a.id.as_str() != "5"));
}

#[test]
fn curated_crop_tree_filters_the_base_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let crop_path = dir.path().join("crop_tree");
    let dataset = sample_dataset();

    seed_source_images(&crop_path, &dataset, 32);
    io_crop_tree::dump_crop_tree(&dataset, &crop_path, &overwrite_opts(), 1).unwrap();

    // A curator deletes every "dog" crop.
    std::fs::remove_dir_all(crop_path.join("crops/dog--2")).unwrap();

    let curated =
        io_crop_tree::load_crop_tree(&crop_path, &dataset, DatasetKind::ObjectDetection).unwrap();
    assert_eq!(curated.annotations.len(), 3);
    assert!(curated
        .annotations
        .iter()
        .all(|a| a.category_id.as_str() != "2"));
    assert!(curated.categories.iter().all(|c| c.id.as_str() != "2"));
    // Licenses and info pass through from the base untouched.
    assert_eq!(curated.licenses, dataset.licenses);
    assert_eq!(curated.info, dataset.info);
}
