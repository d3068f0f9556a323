//! Bulk upload processing.
//!
//! Each item is validated and processed on its own; a failure is recorded as
//! `"Photo <n>: <reason>"` (1-based) and never stops the items after it.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::engine::{self, PhotoPipeline, PipelineOutput};
use crate::error::{Error, Result};
use crate::ingest;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One photo of a bulk upload, as received in the JSON payload.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchItem {
    /// Base64 image data, optionally `data:<mime>;base64,` prefixed.
    pub photo: Option<String>,
    /// Filename hint; defaults to `photo_<n>.jpg`.
    pub filename: Option<String>,
    /// Photo title.
    pub title: Option<String>,
    /// Photo description.
    pub description: Option<String>,
    /// Capture date as `YYYY-MM-DD`.
    pub capture_date: Option<String>,
}

/// A successfully processed batch item.
#[derive(Debug)]
pub struct ProcessedPhoto {
    /// 1-based position in the batch.
    pub position: usize,
    /// Trimmed title.
    pub title: String,
    /// Trimmed description.
    pub description: String,
    /// Parsed capture date.
    pub capture_date: NaiveDate,
    /// Original and processed buffers.
    pub output: PipelineOutput,
}

/// Aggregate outcome of a batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Items that made it through validation and the pipeline, in order.
    pub photos: Vec<ProcessedPhoto>,
    /// One message per failed item, in order.
    pub errors: Vec<String>,
}

impl BatchOutcome {
    /// A batch succeeds when at least one item was processed.
    #[must_use]
    pub fn success(&self) -> bool {
        !self.photos.is_empty()
    }

    /// Write every processed photo under `root` at its storage keys.
    ///
    /// A photo that cannot be saved is removed from `photos` and recorded as
    /// `"Photo <n>: Failed to save: <reason>"`. Later photos are still
    /// written. Returns the position and written paths of each stored photo.
    pub fn persist(&mut self, root: &Path) -> Vec<(usize, PathBuf, PathBuf)> {
        let mut written = Vec::with_capacity(self.photos.len());
        let mut stored = Vec::with_capacity(self.photos.len());

        for mut photo in std::mem::take(&mut self.photos) {
            match engine::persist(&mut photo.output, root) {
                Ok((original, compressed)) => {
                    written.push((photo.position, original, compressed));
                    stored.push(photo);
                }
                Err(e) => {
                    log::warn!("photo {}: failed to save: {e}", photo.position);
                    self.errors
                        .push(format!("Photo {}: Failed to save: {e}", photo.position));
                }
            }
        }

        self.photos = stored;
        written
    }

    /// JSON-ready summary of the outcome.
    #[must_use]
    pub fn report(&self) -> BatchReport {
        let photos = self
            .photos
            .iter()
            .map(|p| PhotoSummary {
                position: p.position,
                title: p.title.clone(),
                filename: p.output.processed.filename().to_string(),
            })
            .collect();

        if self.success() {
            BatchReport {
                success: true,
                message: Some(format!(
                    "Successfully uploaded {} photo(s)",
                    self.photos.len()
                )),
                error: None,
                photos,
                warnings: (!self.errors.is_empty()).then(|| self.errors.clone()),
                errors: None,
            }
        } else {
            BatchReport {
                success: false,
                message: None,
                error: Some("Failed to upload photos".to_string()),
                photos,
                warnings: None,
                errors: Some(self.errors.clone()),
            }
        }
    }
}

/// Summary of one processed photo in a [`BatchReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoSummary {
    /// 1-based position in the batch.
    pub position: usize,
    /// Photo title.
    pub title: String,
    /// Processed artifact filename.
    pub filename: String,
}

/// Serializable batch result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Whether at least one photo was processed.
    pub success: bool,
    /// Success message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Processed photos.
    pub photos: Vec<PhotoSummary>,
    /// Per-item failures of a successful batch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
    /// Per-item failures of a failed batch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

/// Process a bulk upload sequentially.
#[must_use]
pub fn process_batch(pipeline: &PhotoPipeline, items: &[BatchItem]) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for (index, item) in items.iter().enumerate() {
        let position = index + 1;
        match process_item(pipeline, item, position) {
            Ok(photo) => {
                log::info!("photo {position}: processed {}", photo.output.processed.filename());
                outcome.photos.push(photo);
            }
            Err(e) => {
                log::warn!("photo {position}: {e}");
                outcome.errors.push(format!("Photo {position}: {e}"));
            }
        }
    }

    outcome
}

fn process_item(pipeline: &PhotoPipeline, item: &BatchItem, position: usize) -> Result<ProcessedPhoto> {
    let photo = item
        .photo
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or(Error::MissingField("Photo (base64)"))?;

    let filename = item
        .filename
        .clone()
        .unwrap_or_else(|| format!("photo_{position}.jpg"));
    let upload = ingest::decode_base64(photo, &filename)?;

    let title = required(item.title.as_deref(), "Title")?;
    let description = required(item.description.as_deref(), "Description")?;
    let capture_date = required(item.capture_date.as_deref(), "Capture date")?;
    let capture_date = NaiveDate::parse_from_str(capture_date, DATE_FORMAT).map_err(|source| {
        Error::InvalidDate {
            field: "Capture date",
            source,
        }
    })?;

    let output = pipeline.process(upload)?;

    Ok(ProcessedPhoto {
        position,
        title: title.to_string(),
        description: description.to_string(),
        capture_date,
        output,
    })
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(Error::MissingField(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PipelineOptions;
    use crate::font::BuiltinFont;
    use base64::{engine::general_purpose, Engine as _};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_base64() -> String {
        let img = RgbImage::from_pixel(32, 24, Rgb([200, 10, 10]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(out.into_inner())
        )
    }

    fn item(title: &str) -> BatchItem {
        BatchItem {
            photo: Some(png_base64()),
            filename: Some("beach.png".to_string()),
            title: Some(title.to_string()),
            description: Some("Sunset".to_string()),
            capture_date: Some("2024-06-01".to_string()),
        }
    }

    fn pipeline() -> PhotoPipeline {
        PhotoPipeline::with_fonts(PipelineOptions::default(), BuiltinFont)
    }

    #[test]
    fn missing_title_only_rejects_that_item() {
        let items = vec![item("One"), item("  "), item("Three")];
        let outcome = process_batch(&pipeline(), &items);

        assert_eq!(outcome.photos.len(), 2);
        assert_eq!(outcome.errors, vec!["Photo 2: Title is required"]);
        assert!(outcome.success());
        assert_eq!(outcome.photos[1].position, 3);
        assert_eq!(
            outcome.photos[0].capture_date,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
        );

        let report = outcome.report();
        assert!(report.success);
        assert_eq!(report.warnings.as_deref(), Some(&["Photo 2: Title is required".to_string()][..]));
        assert_eq!(report.message.as_deref(), Some("Successfully uploaded 2 photo(s)"));
    }

    #[test]
    fn all_failures_fail_the_batch() {
        let mut no_desc = item("A");
        no_desc.description = None;
        let mut no_date = item("B");
        no_date.capture_date = Some(String::new());
        let mut bad_date = item("C");
        bad_date.capture_date = Some("01/06/2024".to_string());

        let outcome = process_batch(&pipeline(), &[no_desc, no_date, bad_date]);
        assert!(!outcome.success());
        assert!(outcome.photos.is_empty());
        assert_eq!(
            outcome.errors,
            vec![
                "Photo 1: Description is required",
                "Photo 2: Capture date is required",
                "Photo 3: Capture date must be in YYYY-MM-DD format",
            ]
        );

        let report = outcome.report();
        assert!(!report.success);
        assert_eq!(report.error.as_deref(), Some("Failed to upload photos"));
        assert_eq!(report.errors.as_ref().map(Vec::len), Some(3));
        assert!(report.warnings.is_none());
    }

    #[test]
    fn photo_and_encoding_errors_are_per_item() {
        let mut missing = item("A");
        missing.photo = None;
        let mut garbage = item("B");
        garbage.photo = Some("data:image/png;base64,***".to_string());
        let mut not_image = item("C");
        not_image.photo = Some(general_purpose::STANDARD.encode(b"plain text"));

        let outcome = process_batch(&pipeline(), &[missing, garbage, not_image, item("D")]);
        assert_eq!(outcome.photos.len(), 1);
        assert_eq!(outcome.errors[0], "Photo 1: Photo (base64) is required");
        assert!(outcome.errors[1].starts_with("Photo 2: Invalid base64 image data"));
        assert!(outcome.errors[2].starts_with("Photo 3: unsupported image format"));
    }

    #[test]
    fn default_filename_uses_position() {
        let mut unnamed = item("A");
        unnamed.filename = None;
        let outcome = process_batch(&pipeline(), &[item("first"), unnamed]);

        let out = &outcome.photos[1].output;
        assert_eq!(out.original.filename(), "photo_2.jpg");
        assert_eq!(out.processed.filename(), "photo_2_compressed.jpg");
    }

    #[test]
    fn save_failure_only_drops_that_photo() {
        let dir = tempfile::tempdir().unwrap();
        let mut unsavable = item("A");
        unsavable.filename = Some("bad\0name.png".to_string());

        let mut outcome = process_batch(&pipeline(), &[unsavable, item("B"), item("C")]);
        assert_eq!(outcome.photos.len(), 3);

        let written = outcome.persist(dir.path());
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].0, 2);
        assert_eq!(written[1].0, 3);
        assert!(written.iter().all(|(_, o, c)| o.exists() && c.exists()));

        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].starts_with("Photo 1: Failed to save: "), "{}", outcome.errors[0]);

        let report = outcome.report();
        assert!(report.success);
        assert_eq!(report.photos.len(), 2);
        assert_eq!(report.warnings.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn failing_every_save_fails_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("occupied");
        std::fs::write(&root, b"a file, not a directory").unwrap();

        let mut outcome = process_batch(&pipeline(), &[item("A"), item("B")]);
        assert!(outcome.persist(&root).is_empty());

        assert!(!outcome.success());
        assert_eq!(outcome.errors.len(), 2);
        assert!(outcome.errors[1].starts_with("Photo 2: Failed to save: "));
        assert_eq!(outcome.report().error.as_deref(), Some("Failed to upload photos"));
    }

    #[test]
    fn items_deserialize_with_missing_fields() {
        let items: Vec<BatchItem> =
            serde_json::from_str(r#"[{"photo": "AAAA", "title": "x"}, {}]"#).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title.as_deref(), Some("x"));
        assert!(items[0].filename.is_none());
        assert!(items[1].photo.is_none());
    }

    #[test]
    fn report_serializes_without_empty_sections() {
        let outcome = BatchOutcome::default();
        let json = serde_json::to_value(outcome.report()).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["photos"], serde_json::json!([]));
        assert!(json.get("warnings").is_none());
        assert!(json.get("message").is_none());
    }
}
