use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use tmf_photo_pipeline::{
    batch, BatchItem, CompressOptions, FontProvider, PhotoPipeline, PipelineOptions,
    ProcessResult, SystemFonts, WatermarkSpec,
};

#[derive(Parser)]
#[command(
    name = "tmf-photo",
    about = "Compress and watermark marketplace photo uploads",
    version,
    after_help = "Outputs are written to <output>/photos/original/ and \
                  <output>/photos/compressed/.\n\n\
                  With --batch, <input> is a JSON array of \
                  {photo, filename, title, description, capture_date} items and \
                  the upload report is printed to stdout."
)]
struct Cli {
    /// Input image file, directory, or JSON batch file (with --batch)
    input: String,

    /// Output root directory
    #[arg(short, long, default_value = ".")]
    output: String,

    /// Treat the input as a JSON batch of base64 photos
    #[arg(short, long)]
    batch: bool,

    /// Maximum output width in pixels
    #[arg(long, default_value = "1200")]
    max_width: u32,

    /// JPEG quality of the compressed image (1-100)
    #[arg(long, default_value = "85")]
    quality: u8,

    /// Watermark text
    #[arg(long, default_value = tmf_photo_pipeline::watermark::DEFAULT_TEXT)]
    text: String,

    /// Font file for the watermark (default: common system fonts)
    #[arg(long)]
    font: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.quiet {
        log::LevelFilter::Error
    } else if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    if !(1..=100).contains(&cli.quality) {
        eprintln!("Error: Quality must be between 1 and 100");
        process::exit(1);
    }

    if cli.max_width == 0 {
        eprintln!("Error: Max width must be greater than 0");
        process::exit(1);
    }

    let options = PipelineOptions {
        compress: CompressOptions {
            max_width: cli.max_width,
            quality: cli.quality,
        },
        watermark: WatermarkSpec::with_text(cli.text.clone()),
    };

    let fonts = match &cli.font {
        Some(path) => SystemFonts::new(vec![path.clone()]),
        None => SystemFonts::default(),
    };
    if cli.font.is_some() && fonts.font().is_none() {
        log::warn!("font could not be loaded, using built-in face");
    }
    let pipeline = PhotoPipeline::with_fonts(options, fonts);

    let input_path = Path::new(&cli.input);
    if !input_path.exists() {
        eprintln!("Error: Input path does not exist: {}", cli.input);
        process::exit(1);
    }
    let output_dir = PathBuf::from(&cli.output);

    if cli.batch {
        run_batch(&pipeline, input_path, &output_dir);
        return;
    }

    let results = if input_path.is_dir() {
        pipeline.process_directory(input_path, &output_dir)
    } else {
        vec![pipeline.process_file(input_path, &output_dir)]
    };

    let mut success_count = 0u32;
    let mut fail_count = 0u32;

    for r in &results {
        print_result(r, &cli);
        if r.success {
            success_count += 1;
        } else {
            fail_count += 1;
        }
    }

    if results.len() > 1 && !cli.quiet {
        eprintln!();
        eprint!("[Summary] Processed: {success_count}");
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

fn run_batch(pipeline: &PhotoPipeline, input: &Path, output_dir: &Path) {
    let items: Vec<BatchItem> = match std::fs::read_to_string(input)
        .map_err(|e| e.to_string())
        .and_then(|s| serde_json::from_str(&s).map_err(|e| e.to_string()))
    {
        Ok(items) => items,
        Err(e) => {
            eprintln!("Error: Invalid batch file: {e}");
            process::exit(1);
        }
    };

    let mut outcome = batch::process_batch(pipeline, &items);
    for (position, original, compressed) in outcome.persist(output_dir) {
        log::debug!(
            "photo {position}: wrote {} and {}",
            original.display(),
            compressed.display()
        );
    }
    let report = outcome.report();

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error: Failed to serialize report: {e}");
            process::exit(1);
        }
    }

    if !report.success {
        process::exit(1);
    }
}

fn print_result(result: &ProcessResult, cli: &Cli) {
    if cli.quiet && result.success {
        return;
    }

    let filename = result.path.file_name().map_or_else(
        || result.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    if result.success {
        if !cli.quiet {
            eprintln!("[OK] {filename}");
        }
    } else {
        eprintln!("[FAIL] {filename}: {}", result.message);
    }

    if cli.verbose {
        if let Some((original, compressed)) = &result.written {
            eprintln!("  -> {}", original.display());
            eprintln!("  -> {}", compressed.display());
        }
    }
}
