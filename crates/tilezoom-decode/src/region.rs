//! Region decoder capability.
//!
//! Codec internals stay behind [`RegionDecoder`]: given a rectangle in raw
//! image space and a power-of-two sample size, produce the downsampled
//! pixels. The default implementation, [`ImageRegionDecoder`], decodes the
//! stream once with the `image` crate when the handle is opened and serves
//! regions from the decoded raster.

use image::RgbaImage;
use tilezoom_core::{BufferSpec, PixelBuffer, PixelFormat, Rect, Size};
use tracing::trace;

use crate::error::{DecodeError, DecodeResult};
use crate::source::{ImageSource, read_all};

/// An open decoder handle for one image.
///
/// Handles are not shared between threads concurrently; the pool hands each
/// one to a single decode at a time.
pub trait RegionDecoder: Send {
    /// Stored (raw) image size.
    fn raw_size(&self) -> Size;

    /// Pixel format of decoded regions.
    fn output_format(&self) -> PixelFormat {
        PixelFormat::Rgba8
    }

    /// Decodes `rect` (raw space) downsampled by `sample_size`.
    ///
    /// When `reuse` holds a buffer the decoder should write into it and
    /// take it. A buffer of the wrong shape is left in place and the call
    /// fails with [`DecodeError::ReuseRejected`].
    fn decode_region(
        &mut self,
        rect: Rect,
        sample_size: u32,
        reuse: &mut Option<PixelBuffer>,
    ) -> DecodeResult<PixelBuffer>;
}

/// Opens [`RegionDecoder`] handles for a source.
pub trait RegionDecoderFactory: Send + Sync {
    /// Opens a new handle, reading the source stream.
    fn open(&self, source: &dyn ImageSource) -> DecodeResult<Box<dyn RegionDecoder>>;
}

/// Shape of the buffer a region decode produces.
pub fn output_spec(rect: Rect, sample_size: u32, format: PixelFormat) -> BufferSpec {
    let size = rect.size().sampled(sample_size);
    BufferSpec::new(size.width, size.height, format)
}

/// Checks a raw-space request against the image bounds.
pub fn check_region(rect: Rect, image: Size) -> DecodeResult<()> {
    if rect.is_empty() || !Rect::from_size(image).contains_rect(&rect) {
        return Err(DecodeError::RegionOutOfBounds { rect, image });
    }
    Ok(())
}

/// Factory for [`ImageRegionDecoder`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageRegionDecoderFactory;

impl RegionDecoderFactory for ImageRegionDecoderFactory {
    fn open(&self, source: &dyn ImageSource) -> DecodeResult<Box<dyn RegionDecoder>> {
        let bytes = read_all(source)?;
        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| DecodeError::open(source.key(), e))?
            .into_rgba8();
        trace!(
            key = source.key(),
            width = decoded.width(),
            height = decoded.height(),
            "opened region decoder"
        );
        Ok(Box::new(ImageRegionDecoder::new(decoded)))
    }
}

/// Region decoder over a fully decoded RGBA raster.
pub struct ImageRegionDecoder {
    raster: RgbaImage,
}

impl ImageRegionDecoder {
    /// Wraps a decoded raster.
    pub fn new(raster: RgbaImage) -> Self {
        Self { raster }
    }
}

impl RegionDecoder for ImageRegionDecoder {
    fn raw_size(&self) -> Size {
        Size::new(self.raster.width(), self.raster.height())
    }

    fn decode_region(
        &mut self,
        rect: Rect,
        sample_size: u32,
        reuse: &mut Option<PixelBuffer>,
    ) -> DecodeResult<PixelBuffer> {
        check_region(rect, self.raw_size())?;
        let spec = output_spec(rect, sample_size, PixelFormat::Rgba8);
        let mut out = match reuse.take() {
            Some(buf) if buf.spec() == spec => buf,
            Some(buf) => {
                let reason = format!("offered {}", buf.spec());
                *reuse = Some(buf);
                return Err(DecodeError::reuse_rejected(spec, reason));
            }
            None => PixelBuffer::new(spec),
        };
        downsample_into(&self.raster, rect, sample_size.max(1), &mut out);
        Ok(out)
    }
}

/// Box-filters `rect` of `src` by `sample` into `out`.
///
/// Edge blocks that run past `rect` average only the pixels inside it.
fn downsample_into(src: &RgbaImage, rect: Rect, sample: u32, out: &mut PixelBuffer) {
    let stride = out.stride();
    let data = out.data_mut();
    if sample == 1 {
        for row in 0..rect.height {
            let dst = &mut data[row as usize * stride..(row as usize + 1) * stride];
            for col in 0..rect.width {
                let px = src.get_pixel(rect.x + col, rect.y + row).0;
                let d = col as usize * 4;
                dst[d..d + 4].copy_from_slice(&px);
            }
        }
        return;
    }

    let out_w = rect.width.div_ceil(sample);
    let out_h = rect.height.div_ceil(sample);
    for oy in 0..out_h {
        let y0 = rect.y + oy * sample;
        let y1 = (y0 + sample).min(rect.bottom());
        for ox in 0..out_w {
            let x0 = rect.x + ox * sample;
            let x1 = (x0 + sample).min(rect.right());
            let mut acc = [0u32; 4];
            for y in y0..y1 {
                for x in x0..x1 {
                    let px = src.get_pixel(x, y).0;
                    for (a, c) in acc.iter_mut().zip(px) {
                        *a += u32::from(c);
                    }
                }
            }
            let n = (x1 - x0) * (y1 - y0);
            let d = oy as usize * stride + ox as usize * 4;
            for (i, a) in acc.iter().enumerate() {
                data[d + i] = ((a + n / 2) / n) as u8;
            }
        }
    }
}
