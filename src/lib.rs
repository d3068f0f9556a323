//! Compress and watermark photo uploads for a photo marketplace.
//!
//! Uploaded images (JPEG, PNG or WebP, raw or base64) are decoded, normalized
//! to RGB, bounded to a maximum width, stamped with a translucent text
//! watermark in the bottom-right corner and re-encoded as JPEG. The untouched
//! original is returned next to the processed artifact so both can be stored.
//!
//! # Quick Start
//!
//! ```no_run
//! use tmf_photo_pipeline::{ImageBuffer, PhotoPipeline, PipelineOptions};
//!
//! let pipeline = PhotoPipeline::new(PipelineOptions::default());
//! let bytes = std::fs::read("cat.png").unwrap();
//! let output = pipeline.process(ImageBuffer::from_upload(bytes, "cat.png")).unwrap();
//! assert_eq!(output.processed.filename(), "cat_compressed.jpg");
//! ```
//!
//! # Bulk uploads
//!
//! JSON payloads carry base64 photos plus metadata. Each item is validated
//! and processed on its own, so one bad photo does not sink the batch.
//!
//! ```no_run
//! use tmf_photo_pipeline::{batch, BatchItem, PhotoPipeline};
//!
//! let pipeline = PhotoPipeline::default();
//! let items: Vec<BatchItem> = serde_json::from_str("[]").unwrap();
//! let outcome = batch::process_batch(&pipeline, &items);
//! println!("{}", serde_json::to_string(&outcome.report()).unwrap());
//! ```

#![deny(missing_docs)]

pub mod batch;
pub mod buffer;
pub mod compress;
mod engine;
pub mod error;
pub mod font;
pub mod ingest;
pub mod watermark;

pub use batch::{BatchItem, BatchOutcome, BatchReport};
pub use buffer::{compressed_filename, ContentType, ImageBuffer, ProcessedArtifact};
pub use compress::CompressOptions;
pub use engine::{
    is_supported_image, persist, run, PhotoPipeline, PipelineOptions, PipelineOutput,
    ProcessResult, StorageKeys,
};
pub use error::{Error, Result};
pub use font::{BuiltinFont, FontProvider, SystemFonts};
pub use ingest::decode_base64;
pub use watermark::WatermarkSpec;
