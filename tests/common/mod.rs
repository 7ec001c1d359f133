use std::fs;
use std::path::Path;

use cocodump::coco::{Annotation, Bbox, Category, Dataset, Image, Info, License};
use image::RgbImage;

/// The reference dataset used across integration tests:
/// 2 images, 3 categories, 5 annotations, 1 license.
pub fn sample_dataset() -> Dataset {
    Dataset {
        images: vec![
            Image::new(1u64, "http://example.com/img/0001.jpg"),
            Image::new(2u64, "http://example.com/img/0002.jpg"),
        ],
        categories: vec![
            Category::new(1u64, "person"),
            Category::new(2u64, "dog"),
            Category::new(3u64, "traffic light"),
        ],
        annotations: vec![
            Annotation::new(1u64, 1u64, 1u64, Bbox::new(0, 0, 8, 8)),
            Annotation::new(2u64, 1u64, 2u64, Bbox::new(4, 4, 10, 10)),
            Annotation::new(3u64, 1u64, 3u64, Bbox::new(12, 2, 6, 6)),
            Annotation::new(4u64, 2u64, 1u64, Bbox::new(2, 2, 12, 12)),
            Annotation::new(5u64, 2u64, 2u64, Bbox::new(16, 16, 8, 8)),
        ],
        licenses: vec![License::new(1u64, "CC BY 4.0")],
        info: Info {
            year: Some(2021),
            description: Some("integration fixture".to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Writes a decodable source raster for every image of `dataset` where a
/// crop-tree dump expects it, so no download is attempted.
pub fn seed_source_images(crop_tree_dir: &Path, dataset: &Dataset, size: u32) {
    let images_dir = crop_tree_dir.join("images");
    fs::create_dir_all(&images_dir).expect("create images dir");
    for image in &dataset.images {
        RgbImage::new(size, size)
            .save(images_dir.join(image.file_name()))
            .expect("write source raster");
    }
}
