//! Compress and watermark a single photo.
//!
//! Usage:
//! ```sh
//! cargo run --example process_photo -- input.png output_dir
//! ```

use std::env;
use std::path::Path;
use std::process;

use tmf_photo_pipeline::{PhotoPipeline, PipelineOptions};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <input> <output_dir>", args[0]);
        process::exit(1);
    }

    let pipeline = PhotoPipeline::new(PipelineOptions::default());
    let result = pipeline.process_file(Path::new(&args[1]), Path::new(&args[2]));

    match result.written {
        Some((original, compressed)) if result.success => {
            println!("Original:   {}", original.display());
            println!("Compressed: {}", compressed.display());
        }
        _ => {
            eprintln!("Error: {}", result.message);
            process::exit(1);
        }
    }
}
