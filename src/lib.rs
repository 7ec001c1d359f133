//! Cocodump: COCO dataset representation converter.
//!
//! Cocodump converts object-detection datasets in COCO format between
//! three interchangeable on-disk representations - a single JSON file, a
//! directory tree of per-record JSON chunks, and a tree of cropped
//! annotation images - and provides a small algebra over datasets
//! (merging, validity filtering, per-category subsampling).
//!
//! # Modules
//!
//! - [`coco`]: Dataset model and the three representation codecs
//! - [`merge`]: Conflict-detecting dataset merge
//! - [`filter`]: Validity filtering with referential closure
//! - [`sample`]: Per-category annotation subsampling
//! - [`canonical`]: Deterministic JSON canonicalization
//! - [`media`]: Raster read/write/crop and download collaborators
//! - [`error`]: Error types for cocodump operations

pub mod canonical;
pub mod coco;
pub mod error;
pub mod filter;
pub mod media;
pub mod merge;
pub mod sample;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use coco::{io_crop_tree, io_json_file, io_json_tree, Dataset, DatasetKind, DumpOptions};
pub use error::CocodumpError;

/// The cocodump CLI application.
#[derive(Parser)]
#[command(name = "cocodump")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Convert COCO datasets between representations.
    Convert(ConvertArgs),
}

/// Output representation selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
#[value(rename_all = "snake_case")]
enum OutFormat {
    JsonFile,
    JsonTree,
    CropTree,
}

impl OutFormat {
    fn name(&self) -> &'static str {
        match self {
            OutFormat::JsonFile => "json_file",
            OutFormat::JsonTree => "json_tree",
            OutFormat::CropTree => "crop_tree",
        }
    }
}

/// `--indent` accepts an integer or `none`/`null`/`~` for compact output.
#[derive(Clone, Copy, Debug)]
struct IndentArg(Option<usize>);

fn parse_indent(value: &str) -> Result<IndentArg, String> {
    match value.to_ascii_lowercase().as_str() {
        "none" | "null" | "~" => Ok(IndentArg(None)),
        other => other
            .parse::<usize>()
            .map(|width| IndentArg(Some(width)))
            .map_err(|_| format!("expected an integer or 'none', got '{value}'")),
    }
}

/// Arguments for the convert subcommand.
#[derive(clap::Args)]
struct ConvertArgs {
    /// Datasets in json_file representation (all json inputs are merged).
    #[arg(long = "in-json-file")]
    in_json_file: Vec<PathBuf>,

    /// Datasets in json_tree representation (all json inputs are merged).
    #[arg(long = "in-json-tree")]
    in_json_tree: Vec<PathBuf>,

    /// Datasets in crop_tree representation; they are reconciled against
    /// the merged json inputs and the result replaces them.
    #[arg(long = "in-crop-tree")]
    in_crop_tree: Vec<PathBuf>,

    /// Path of the output dataset (file or directory, depends on --out-format).
    #[arg(long)]
    out_path: PathBuf,

    /// Output representation.
    #[arg(long, value_enum)]
    out_format: OutFormat,

    /// Dataset kind.
    #[arg(long, default_value = "object_detection")]
    kind: String,

    /// Random seed for subsampling.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// If set, randomly keep up to this many crops (annotations) per
    /// class (category) and drop the others.
    #[arg(long)]
    max_crops_per_class: Option<usize>,

    /// Drop invalid elements and annotations with unresolvable references
    /// before dumping.
    #[arg(long)]
    remove_invalid: bool,

    /// Worker threads for crop_tree dumping.
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Replace the destination if it already exists.
    #[arg(long)]
    overwrite: bool,

    /// Indentation of the output json ('none' for compact).
    #[arg(long, default_value = "4", value_parser = parse_indent)]
    indent: IndentArg,

    /// Keep null-valued fields in the output json.
    #[arg(long)]
    keep_nulls: bool,

    /// Verbose logging.
    #[arg(long)]
    debug: bool,
}

/// Run the cocodump CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), CocodumpError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Convert(args)) => run_convert(args),
        None => {
            println!("cocodump {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("COCO dataset representation converter.");
            println!();
            println!("Run 'cocodump --help' for usage information.");
            Ok(())
        }
    }
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter),
    )
    .try_init();
}

/// Execute the convert subcommand.
fn run_convert(args: ConvertArgs) -> Result<(), CocodumpError> {
    init_logging(args.debug);
    let kind: DatasetKind = args.kind.parse()?;

    let mut coco: Option<Dataset> = None;
    for path in &args.in_json_tree {
        let loaded = io_json_tree::load_json_tree(path, kind)?;
        coco = Some(merge::merge_datasets(coco, loaded)?);
    }
    for path in &args.in_json_file {
        let loaded = io_json_file::load_json_file(path, kind)?;
        coco = Some(merge::merge_datasets(coco, loaded)?);
    }
    let coco = coco.ok_or(CocodumpError::NoInputDataset)?;
    log::info!("Loaded total json dataset: {}", coco.summary());

    let mut crop_base: Option<Dataset> = None;
    for path in &args.in_crop_tree {
        let loaded = io_crop_tree::load_crop_tree(path, &coco, kind)?;
        crop_base = Some(merge::merge_datasets(crop_base, loaded)?);
    }
    let mut coco = match crop_base {
        Some(from_crops) => {
            log::info!("Using crop-tree dataset as primary: {}", from_crops.summary());
            from_crops
        }
        None => coco,
    };

    if args.remove_invalid {
        coco = filter::remove_invalid_elements(&coco);
        log::info!("After removing invalid elements: {}", coco.summary());
    }

    if let Some(max_per_category) = args.max_crops_per_class {
        log::info!(
            "Cutting off crops up to {max_per_category} per class, random seed={}",
            args.seed
        );
        coco = sample::cut_annotations_per_category(&coco, max_per_category, args.seed);
        log::info!("After cutting off: {}", coco.summary());
    }

    let opts = DumpOptions {
        skip_nulls: !args.keep_nulls,
        overwrite: args.overwrite,
        indent: args.indent.0,
    };
    match args.out_format {
        OutFormat::JsonFile => io_json_file::dump_json_file(&coco, &args.out_path, &opts)?,
        OutFormat::JsonTree => io_json_tree::dump_json_tree(&coco, &args.out_path, &opts)?,
        OutFormat::CropTree => {
            io_crop_tree::dump_crop_tree(&coco, &args.out_path, &opts, args.workers)?;
        }
    }

    log::info!(
        "[+] Success: {} dumped to {}",
        args.out_format.name(),
        args.out_path.display()
    );
    Ok(())
}
