//! In-memory image buffers handed between pipeline stages.

use std::fmt;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

/// Content types the pipeline accepts and produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// `image/jpeg`
    Jpeg,
    /// `image/png`
    Png,
    /// `image/webp`
    WebP,
}

impl ContentType {
    /// Infer the content type from a filename suffix.
    ///
    /// This is a naming convention, not content sniffing: `.png` and `.webp`
    /// map to their types and everything else is treated as JPEG.
    #[must_use]
    pub fn from_filename(filename: &str) -> Self {
        let lower = filename.to_lowercase();
        if lower.ends_with(".png") {
            Self::Png
        } else if lower.ends_with(".webp") {
            Self::WebP
        } else {
            Self::Jpeg
        }
    }

    /// MIME string for this content type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An owned, rewindable byte buffer with a filename and content type.
///
/// Consumers read through [`Read`] and must rewind first; the position left
/// behind by a previous reader is never meaningful to the next one.
#[derive(Debug, Clone)]
pub struct ImageBuffer {
    cursor: Cursor<Vec<u8>>,
    filename: String,
    content_type: ContentType,
}

impl ImageBuffer {
    /// Wrap raw bytes, positioned at the start of the stream.
    pub fn new(bytes: Vec<u8>, filename: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            cursor: Cursor::new(bytes),
            filename: filename.into(),
            content_type,
        }
    }

    /// Wrap raw bytes and infer the content type from the filename.
    pub fn from_upload(bytes: Vec<u8>, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let content_type = ContentType::from_filename(&filename);
        Self::new(bytes, filename, content_type)
    }

    /// Filename hint supplied with the upload.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Declared content type.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// The whole underlying byte sequence, regardless of position.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.cursor.get_ref()
    }

    /// Length of the underlying byte sequence.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    /// Whether the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }

    /// Current read position.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Rewind to the start and read every byte.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from the underlying reader.
    pub fn read_all(&mut self) -> io::Result<Vec<u8>> {
        self.rewind()?;
        let mut bytes = Vec::with_capacity(self.len());
        self.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    /// Consume the buffer and return the owned bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.cursor.into_inner()
    }
}

impl Read for ImageBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for ImageBuffer {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

/// The final processed photo, ready for the storage collaborator.
#[derive(Debug, Clone)]
pub struct ProcessedArtifact {
    buffer: ImageBuffer,
}

impl ProcessedArtifact {
    /// Package encoded JPEG bytes under a name derived from the original.
    #[must_use]
    pub fn new(jpeg: Vec<u8>, original_filename: &str) -> Self {
        let filename = compressed_filename(original_filename);
        let buffer = ImageBuffer::new(jpeg, filename, ContentType::Jpeg);
        Self { buffer }
    }

    /// Derived filename, `<stem>_compressed.jpg`.
    #[must_use]
    pub fn filename(&self) -> &str {
        self.buffer.filename()
    }

    /// Always `image/jpeg`.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        self.buffer.content_type()
    }

    /// Encoded JPEG bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    /// Unwrap into the underlying buffer, positioned at the start.
    #[must_use]
    pub fn into_buffer(self) -> ImageBuffer {
        self.buffer
    }
}

/// Derive the artifact filename from an upload filename.
///
/// Example: `"cat.png"` becomes `"cat_compressed.jpg"`. Any directory part is
/// dropped: `"dir/cat.png"` also becomes `"cat_compressed.jpg"`.
#[must_use]
pub fn compressed_filename(original: &str) -> String {
    let stem = Path::new(original)
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy();
    format!("{stem}_compressed.jpg")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_follows_suffix() {
        assert_eq!(ContentType::from_filename("a.png"), ContentType::Png);
        assert_eq!(ContentType::from_filename("a.PNG"), ContentType::Png);
        assert_eq!(ContentType::from_filename("a.webp"), ContentType::WebP);
        assert_eq!(ContentType::from_filename("a.jpg"), ContentType::Jpeg);
        assert_eq!(ContentType::from_filename("a.gif"), ContentType::Jpeg);
        assert_eq!(ContentType::from_filename("noext"), ContentType::Jpeg);
        assert_eq!(ContentType::WebP.to_string(), "image/webp");
    }

    #[test]
    fn read_all_ignores_prior_position() {
        let mut buf = ImageBuffer::from_upload(vec![1, 2, 3, 4], "x.jpg");
        let mut first = [0u8; 3];
        buf.read_exact(&mut first).unwrap();
        assert_eq!(buf.position(), 3);

        assert_eq!(buf.read_all().unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(buf.position(), 4);
    }

    #[test]
    fn compressed_filename_replaces_extension() {
        assert_eq!(compressed_filename("cat.png"), "cat_compressed.jpg");
        assert_eq!(compressed_filename("holiday.photo.webp"), "holiday.photo_compressed.jpg");
        assert_eq!(compressed_filename("raw"), "raw_compressed.jpg");
        assert_eq!(compressed_filename("dir/cat.png"), "cat_compressed.jpg");
    }

    #[test]
    fn artifact_is_jpeg_at_start() {
        let artifact = ProcessedArtifact::new(vec![0xFF, 0xD8], "cat.png");
        assert_eq!(artifact.filename(), "cat_compressed.jpg");
        assert_eq!(artifact.content_type(), ContentType::Jpeg);
        assert_eq!(artifact.into_buffer().position(), 0);
    }
}
