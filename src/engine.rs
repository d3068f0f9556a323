//! Pipeline orchestration: compress, watermark, package, persist.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};

use crate::buffer::{ImageBuffer, ProcessedArtifact};
use crate::compress::{self, CompressOptions};
use crate::error::Result;
use crate::font::{FontProvider, SystemFonts};
use crate::watermark::{self, WatermarkSpec};

/// Options controlling the whole pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Compression stage settings.
    pub compress: CompressOptions,
    /// Watermark appearance.
    pub watermark: WatermarkSpec,
}

impl PipelineOptions {
    /// Options from the three caller-facing knobs.
    #[must_use]
    pub fn new(max_width: u32, quality: u8, watermark_text: impl Into<String>) -> Self {
        Self {
            compress: CompressOptions { max_width, quality },
            watermark: WatermarkSpec::with_text(watermark_text),
        }
    }
}

/// Both buffers produced for one upload.
#[derive(Debug)]
pub struct PipelineOutput {
    /// The untouched upload. Its position is at end of stream; rewind before
    /// reading it again.
    pub original: ImageBuffer,
    /// The compressed, watermarked JPEG.
    pub processed: ProcessedArtifact,
}

/// Storage keys for the two buffers of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    /// Key of the untouched original.
    pub original: String,
    /// Key of the processed artifact.
    pub compressed: String,
}

impl StorageKeys {
    /// `photos/original/<upload name>` and `photos/compressed/<artifact name>`.
    ///
    /// Only the final component of the upload name is used, so a name like
    /// `../../x.png` is stored as `x.png`. Names without one fall back to
    /// `upload.jpg`.
    #[must_use]
    pub fn for_output(output: &PipelineOutput) -> Self {
        Self {
            original: format!("photos/original/{}", storage_name(output.original.filename())),
            compressed: format!("photos/compressed/{}", output.processed.filename()),
        }
    }
}

fn storage_name(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .map_or_else(|| FALLBACK_NAME.to_string(), |f| f.to_string_lossy().into_owned())
}

const FALLBACK_NAME: &str = "upload.jpg";

/// Result of processing a single image file.
#[derive(Debug)]
pub struct ProcessResult {
    /// Path of the input file.
    pub path: PathBuf,
    /// Whether processing succeeded.
    pub success: bool,
    /// Where the original and processed files were written, on success.
    pub written: Option<(PathBuf, PathBuf)>,
    /// Human-readable status message.
    pub message: String,
}

/// Compress then watermark one upload.
///
/// The watermark stage always consumes the compressor output, never the
/// original.
///
/// # Errors
///
/// Propagates decode and encode failures from either stage.
pub fn run(
    mut original: ImageBuffer,
    opts: &PipelineOptions,
    fonts: &dyn FontProvider,
) -> Result<PipelineOutput> {
    let mut compressed = compress::compress(&mut original, &opts.compress)?;
    let watermarked = watermark::watermark(&mut compressed, &opts.watermark, fonts)?;

    let processed = ProcessedArtifact::new(watermarked.into_bytes(), original.filename());
    log::debug!(
        "{}: {} bytes -> {} bytes",
        original.filename(),
        original.len(),
        processed.as_bytes().len()
    );

    Ok(PipelineOutput {
        original,
        processed,
    })
}

/// The photo pipeline holding its options and font source.
///
/// Create once and reuse for multiple uploads. The pipeline holds no mutable
/// state, so it can be shared across threads.
pub struct PhotoPipeline {
    options: PipelineOptions,
    fonts: Box<dyn FontProvider>,
}

impl PhotoPipeline {
    /// Pipeline using the platform's system fonts.
    #[must_use]
    pub fn new(options: PipelineOptions) -> Self {
        Self::with_fonts(options, SystemFonts::default())
    }

    /// Pipeline with an injected font provider.
    pub fn with_fonts(options: PipelineOptions, fonts: impl FontProvider + 'static) -> Self {
        Self {
            options,
            fonts: Box::new(fonts),
        }
    }

    /// Active options.
    #[must_use]
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Process one upload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`](crate::Error::UnsupportedFormat)
    /// for undecodable input, or an encode error.
    pub fn process(&self, original: ImageBuffer) -> Result<PipelineOutput> {
        run(original, &self.options, self.fonts.as_ref())
    }

    /// Process a single image file and write both outputs under `output_dir`.
    ///
    /// Outputs are stored at their [`StorageKeys`] relative to `output_dir`.
    #[must_use]
    pub fn process_file(&self, input: &Path, output_dir: &Path) -> ProcessResult {
        let mut result = ProcessResult {
            path: input.to_path_buf(),
            success: false,
            written: None,
            message: String::new(),
        };

        let bytes = match std::fs::read(input) {
            Ok(b) => b,
            Err(e) => {
                result.message = format!("Failed to load: {e}");
                return result;
            }
        };

        let filename = input
            .file_name()
            .map_or_else(|| FALLBACK_NAME.to_string(), |f| f.to_string_lossy().to_string());

        let mut output = match self.process(ImageBuffer::from_upload(bytes, filename)) {
            Ok(o) => o,
            Err(e) => {
                result.message = format!("Failed to process: {e}");
                return result;
            }
        };

        match persist(&mut output, output_dir) {
            Ok(paths) => {
                log::info!("processed {}", input.display());
                result.success = true;
                result.message = "Compressed and watermarked".to_string();
                result.written = Some(paths);
            }
            Err(e) => {
                result.message = format!("Failed to save: {e}");
            }
        }

        result
    }

    /// Process all supported images in a directory.
    ///
    /// Uses parallel iteration when the `cli` feature is enabled (via rayon).
    /// Returns a [`ProcessResult`] for each image found.
    #[must_use]
    pub fn process_directory(&self, input_dir: &Path, output_dir: &Path) -> Vec<ProcessResult> {
        let entries: Vec<PathBuf> = match std::fs::read_dir(input_dir) {
            Ok(rd) => rd
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
                .map(|e| e.path())
                .filter(|p| is_supported_image(p))
                .collect(),
            Err(e) => {
                return vec![ProcessResult {
                    path: input_dir.to_path_buf(),
                    success: false,
                    written: None,
                    message: format!("Failed to read directory: {e}"),
                }];
            }
        };

        #[cfg(feature = "cli")]
        {
            use rayon::prelude::*;
            entries
                .par_iter()
                .map(|input| self.process_file(input, output_dir))
                .collect()
        }

        #[cfg(not(feature = "cli"))]
        {
            entries
                .iter()
                .map(|input| self.process_file(input, output_dir))
                .collect()
        }
    }
}

impl Default for PhotoPipeline {
    fn default() -> Self {
        Self::new(PipelineOptions::default())
    }
}

/// Write both buffers of an upload under `root` at their storage keys.
///
/// The original is rewound before it is copied out. Existing files are never
/// overwritten: when a key is taken, `_1`, `_2`, ... is appended to the file
/// stem until a free name is found. Returns the paths actually written.
///
/// # Errors
///
/// Returns [`Error::Io`](crate::Error::Io) if a directory or file cannot be
/// created or written.
pub fn persist(output: &mut PipelineOutput, root: &Path) -> Result<(PathBuf, PathBuf)> {
    let keys = StorageKeys::for_output(output);

    let (original_path, mut original_file) = create_unique(&root.join(&keys.original))?;
    output.original.rewind()?;
    io::copy(&mut output.original, &mut original_file)?;

    let (compressed_path, mut compressed_file) = create_unique(&root.join(&keys.compressed))?;
    compressed_file.write_all(output.processed.as_bytes())?;

    Ok((original_path, compressed_path))
}

/// Create `path`, or the first free `<stem>_<n><.ext>` next to it.
fn create_unique(path: &Path) -> io::Result<(PathBuf, File)> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut candidate = path.to_path_buf();
    for n in 1u32.. {
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                log::debug!("{} exists, trying next name", candidate.display());
                candidate = path.with_file_name(format!("{stem}_{n}{ext}"));
            }
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free name for {}", path.display()),
    ))
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(ext.to_lowercase().as_str(), "jpg" | "jpeg" | "png" | "webp"),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ContentType;
    use crate::font::BuiltinFont;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_upload(width: u32, height: u32, name: &str) -> ImageBuffer {
        filled_png(width, height, Rgb([30, 90, 160]), name)
    }

    fn filled_png(width: u32, height: u32, color: Rgb<u8>, name: &str) -> ImageBuffer {
        let img = RgbImage::from_pixel(width, height, color);
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        ImageBuffer::from_upload(out.into_inner(), name)
    }

    fn pipeline() -> PhotoPipeline {
        PhotoPipeline::with_fonts(PipelineOptions::default(), BuiltinFont)
    }

    #[test]
    fn process_packages_artifact_and_keeps_original() {
        let upload = png_upload(1600, 900, "cat.png");
        let original_bytes = upload.as_bytes().to_vec();

        let out = pipeline().process(upload).unwrap();
        assert_eq!(out.processed.filename(), "cat_compressed.jpg");
        assert_eq!(out.processed.content_type(), ContentType::Jpeg);
        assert_eq!(out.original.as_bytes(), original_bytes.as_slice());
        assert_eq!(out.original.content_type(), ContentType::Png);
        assert_eq!(out.original.position(), original_bytes.len() as u64);

        let img = image::load_from_memory_with_format(out.processed.as_bytes(), ImageFormat::Jpeg)
            .unwrap();
        assert_eq!((img.width(), img.height()), (1200, 675));
    }

    #[test]
    fn options_new_sets_all_knobs() {
        let opts = PipelineOptions::new(800, 70, "Sample");
        assert_eq!(opts.compress.max_width, 800);
        assert_eq!(opts.compress.quality, 70);
        assert_eq!(opts.watermark.text, "Sample");
        assert_eq!(opts.watermark.quality, 85);
    }

    #[test]
    fn storage_keys_use_original_and_artifact_names() {
        let out = pipeline().process(png_upload(20, 20, "dog.webp.png")).unwrap();
        let keys = StorageKeys::for_output(&out);
        assert_eq!(keys.original, "photos/original/dog.webp.png");
        assert_eq!(keys.compressed, "photos/compressed/dog.webp_compressed.jpg");
    }

    #[test]
    fn persist_writes_full_original_after_consumption() {
        let dir = tempfile::tempdir().unwrap();
        let upload = png_upload(40, 30, "bird.png");
        let original_bytes = upload.as_bytes().to_vec();

        let mut out = pipeline().process(upload).unwrap();
        let (orig, comp) = persist(&mut out, dir.path()).unwrap();

        assert_eq!(std::fs::read(&orig).unwrap(), original_bytes);
        assert!(comp.ends_with("photos/compressed/bird_compressed.jpg"));
        assert!(image::open(&comp).is_ok());
    }

    #[test]
    fn storage_keys_keep_only_the_final_name_component() {
        let out = pipeline().process(png_upload(8, 8, "../../../escaped.png")).unwrap();
        assert_eq!(StorageKeys::for_output(&out).original, "photos/original/escaped.png");

        let out = pipeline().process(png_upload(8, 8, "")).unwrap();
        assert_eq!(StorageKeys::for_output(&out).original, "photos/original/upload.jpg");

        let out = pipeline().process(png_upload(8, 8, "..")).unwrap();
        assert_eq!(StorageKeys::for_output(&out).original, "photos/original/upload.jpg");
    }

    #[test]
    fn persist_stays_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("store");

        let mut out = pipeline().process(png_upload(16, 16, "../../../escaped.png")).unwrap();
        let (orig, comp) = persist(&mut out, &root).unwrap();

        assert_eq!(orig, root.join("photos/original/escaped.png"));
        assert!(comp.starts_with(&root));
        assert!(!dir.path().join("escaped.png").exists());
    }

    #[test]
    fn persist_never_overwrites_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let first = png_upload(16, 16, "same.png");
        let first_bytes = first.as_bytes().to_vec();
        let second = filled_png(24, 12, Rgb([200, 10, 10]), "same.png");
        let second_bytes = second.as_bytes().to_vec();

        let mut out_a = pipeline().process(first).unwrap();
        let mut out_b = pipeline().process(second).unwrap();
        let (orig_a, comp_a) = persist(&mut out_a, dir.path()).unwrap();
        let (orig_b, comp_b) = persist(&mut out_b, dir.path()).unwrap();

        assert_ne!(orig_a, orig_b);
        assert_ne!(comp_a, comp_b);
        assert!(orig_b.ends_with("photos/original/same_1.png"));
        assert!(comp_b.ends_with("photos/compressed/same_compressed_1.jpg"));
        assert_eq!(std::fs::read(&orig_a).unwrap(), first_bytes);
        assert_eq!(std::fs::read(&orig_b).unwrap(), second_bytes);
        assert_eq!(image::open(&comp_a).unwrap().width(), 16);
        assert_eq!(image::open(&comp_b).unwrap().width(), 24);
    }

    #[test]
    fn process_file_reports_decode_failure() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.jpg");
        std::fs::write(&input, b"garbage").unwrap();

        let result = pipeline().process_file(&input, dir.path());
        assert!(!result.success);
        assert!(result.message.contains("unsupported image format"));
        assert!(result.written.is_none());
    }

    #[test]
    fn process_directory_skips_unsupported_and_isolates_failures() {
        let input_dir = tempfile::tempdir().unwrap();
        let output_dir = tempfile::tempdir().unwrap();

        std::fs::write(
            input_dir.path().join("good.png"),
            png_upload(64, 48, "good.png").as_bytes(),
        )
        .unwrap();
        std::fs::write(input_dir.path().join("bad.jpg"), b"not a jpeg").unwrap();
        std::fs::write(input_dir.path().join("notes.txt"), b"ignore me").unwrap();

        let mut results = pipeline().process_directory(input_dir.path(), output_dir.path());
        results.sort_by(|a, b| a.path.cmp(&b.path));

        assert_eq!(results.len(), 2);
        assert!(!results[0].success, "bad.jpg should fail");
        assert!(results[1].success, "good.png should succeed");
        assert!(output_dir
            .path()
            .join("photos/compressed/good_compressed.jpg")
            .exists());
    }

    #[test]
    fn is_supported_image_accepts_pipeline_inputs() {
        assert!(is_supported_image(Path::new("photo.jpg")));
        assert!(is_supported_image(Path::new("photo.JPEG")));
        assert!(is_supported_image(Path::new("photo.png")));
        assert!(is_supported_image(Path::new("photo.webp")));
        assert!(!is_supported_image(Path::new("photo.bmp")));
        assert!(!is_supported_image(Path::new("photo.gif")));
        assert!(!is_supported_image(Path::new("photo")));
    }
}
