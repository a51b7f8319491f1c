//! Image sources and header inspection.
//!
//! An [`ImageSource`] is anything that can hand out a fresh byte stream for
//! the same image, any number of times and from any thread. The fetch and
//! disk-cache layers that produce sources live outside this crate.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tilezoom_core::{Orientation, Size};
use tracing::debug;

use crate::error::{DecodeError, DecodeResult};

/// A re-openable image byte stream.
///
/// Implementations must support concurrent `open_reader` calls; every
/// region-decoder handle opens its own reader.
pub trait ImageSource: Send + Sync + fmt::Debug {
    /// Stable identity used for logging and buffer keys.
    fn key(&self) -> &str;

    /// Opens a new reader positioned at the start of the image.
    fn open_reader(&self) -> io::Result<Box<dyn Read + Send>>;
}

/// Reads the whole stream of `source` into memory.
pub fn read_all(source: &dyn ImageSource) -> io::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    source.open_reader()?.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Image file on local disk.
#[derive(Debug, Clone)]
pub struct FileImageSource {
    path: PathBuf,
    key: String,
}

impl FileImageSource {
    /// Creates a source for `path`. The file is not touched until opened.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let key = format!("file://{}", path.display());
        Self { path, key }
    }

    /// Path on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ImageSource for FileImageSource {
    fn key(&self) -> &str {
        &self.key
    }

    fn open_reader(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(BufReader::new(File::open(&self.path)?)))
    }
}

/// Encoded image bytes held in memory and shared between readers.
#[derive(Clone)]
pub struct MemoryImageSource {
    key: String,
    bytes: Arc<[u8]>,
}

impl MemoryImageSource {
    /// Creates a source over `bytes` identified by `key`.
    pub fn new(key: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            key: key.into(),
            bytes: bytes.into(),
        }
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if no bytes are held.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for MemoryImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryImageSource")
            .field("key", &self.key)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ImageSource for MemoryImageSource {
    fn key(&self) -> &str {
        &self.key
    }

    fn open_reader(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(Arc::clone(&self.bytes))))
    }
}

/// Header facts needed before any region is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    /// Stored pixel size, before orientation correction.
    pub raw_size: Size,
    /// EXIF orientation of the stored pixels.
    pub orientation: Orientation,
    /// Container format, if recognized.
    pub format: Option<image::ImageFormat>,
}

impl ImageInfo {
    /// Size after orientation correction.
    pub fn display_size(&self) -> Size {
        self.orientation.display_size(self.raw_size)
    }

    /// MIME type of the container, or `application/octet-stream`.
    pub fn mime_type(&self) -> &'static str {
        self.format
            .map(|f| f.to_mime_type())
            .unwrap_or("application/octet-stream")
    }
}

/// Reads dimensions, format and EXIF orientation of `source`.
///
/// Images without EXIF data report [`Orientation::Normal`].
pub fn read_image_info(source: &dyn ImageSource) -> DecodeResult<ImageInfo> {
    let bytes = read_all(source)?;
    let reader = image::ImageReader::new(Cursor::new(&bytes)).with_guessed_format()?;
    let format = reader.format();
    if format.is_none() {
        return Err(DecodeError::Unsupported(format!(
            "{}: unrecognized container",
            source.key()
        )));
    }
    let (width, height) = reader.into_dimensions()?;
    let orientation = exif_orientation(&bytes);
    debug!(
        key = source.key(),
        width,
        height,
        orientation = orientation.exif_value(),
        "read image info"
    );
    Ok(ImageInfo {
        raw_size: Size::new(width, height),
        orientation,
        format,
    })
}

/// EXIF orientation tag of an encoded image, `Normal` when absent.
pub fn exif_orientation(bytes: &[u8]) -> Orientation {
    let mut cursor = Cursor::new(bytes);
    let Ok(exif) = exif::Reader::new().read_from_container(&mut cursor) else {
        return Orientation::Normal;
    };
    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .map(|v| Orientation::from_exif(v as u16))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn memory_source_reopens() {
        let src = MemoryImageSource::new("mem:a", vec![1u8, 2, 3]);
        assert_eq!(read_all(&src).unwrap(), vec![1, 2, 3]);
        assert_eq!(read_all(&src).unwrap(), vec![1, 2, 3]);
        assert_eq!(src.key(), "mem:a");
    }

    #[test]
    fn info_from_png() {
        let src = MemoryImageSource::new("mem:png", png_bytes(7, 5));
        let info = read_image_info(&src).unwrap();
        assert_eq!(info.raw_size, Size::new(7, 5));
        assert_eq!(info.orientation, Orientation::Normal);
        assert_eq!(info.format, Some(image::ImageFormat::Png));
        assert_eq!(info.mime_type(), "image/png");
    }

    #[test]
    fn info_rejects_garbage() {
        let src = MemoryImageSource::new("mem:junk", vec![0u8; 32]);
        assert!(read_image_info(&src).is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let src = FileImageSource::new("/definitely/not/here.png");
        let err = read_image_info(&src).unwrap_err();
        assert!(matches!(err, DecodeError::Io(_)));
    }

    #[test]
    fn no_exif_is_normal() {
        assert_eq!(exif_orientation(&png_bytes(2, 2)), Orientation::Normal);
    }
}
