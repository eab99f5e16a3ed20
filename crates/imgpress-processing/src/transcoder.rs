//! Image transcoding
//!
//! Every accepted upload leaves this module as a JPEG encoded by mozjpeg at quality 40 without
//! chroma subsampling. WEBP input first goes through a WEBP re-encode at the same quality and
//! the JPEG is produced from that intermediate. SVG input is rasterized at its intrinsic size.

use async_trait::async_trait;
use image::{DynamicImage, GenericImageView, RgbImage};
use imgpress_core::SupportedImageType;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Fixed encoder quality for both the WEBP intermediate and the JPEG output
pub const QUALITY: f32 = 40.0;

/// Largest SVG canvas that is rasterized, in pixels (256 MiB of RGBA)
pub const MAX_SVG_PIXELS: u64 = 8192 * 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Jpeg,
    Webp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaSubsampling {
    /// Full resolution chroma
    Yuv444,
}

impl ChromaSubsampling {
    /// Pixel sizes of one Cb and one Cr sample
    fn pixel_sizes(self) -> ((u8, u8), (u8, u8)) {
        match self {
            ChromaSubsampling::Yuv444 => ((1, 1), (1, 1)),
        }
    }
}

/// How a source is read before the final encode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Decoded with `image`
    Raster,
    /// Decoded, then round-tripped through a WEBP encode
    WebpReencode,
    /// Rasterized with resvg
    Vector,
}

/// Encoding parameters derived from the declared type. Quality and chroma are constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranscodeSpec {
    pub codec: Codec,
    pub quality: f32,
    pub chroma: ChromaSubsampling,
    pub output: ContainerFormat,
}

impl TranscodeSpec {
    pub fn for_type(declared: SupportedImageType) -> Self {
        let codec = match declared {
            SupportedImageType::Webp => Codec::WebpReencode,
            SupportedImageType::Jpeg | SupportedImageType::Png => Codec::Raster,
            SupportedImageType::Svg => Codec::Vector,
        };

        Self {
            codec,
            quality: QUALITY,
            chroma: ChromaSubsampling::Yuv444,
            output: ContainerFormat::Jpeg,
        }
    }
}

/// What a transcode produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeReport {
    pub intermediate: Option<ContainerFormat>,
    pub output: ContainerFormat,
    pub width: u32,
    pub height: u32,
    pub bytes_written: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to rasterize SVG: {0}")]
    Rasterize(String),

    #[error("Failed to encode {format:?}: {message}")]
    Encode {
        format: ContainerFormat,
        message: String,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Transcode task failed: {0}")]
    Task(String),
}

/// Transcoding seam used by the upload pipeline
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(
        &self,
        input: &Path,
        declared: SupportedImageType,
        output: &Path,
    ) -> Result<TranscodeReport, TranscodeError>;
}

/// mozjpeg-backed transcoder running on the blocking pool
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegTranscoder;

#[async_trait]
impl Transcoder for JpegTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        declared: SupportedImageType,
        output: &Path,
    ) -> Result<TranscodeReport, TranscodeError> {
        transcode_file(input.to_path_buf(), declared, output.to_path_buf()).await
    }
}

/// Async wrapper running `transcode` on the blocking pool
pub async fn transcode_file(
    input: PathBuf,
    declared: SupportedImageType,
    output: PathBuf,
) -> Result<TranscodeReport, TranscodeError> {
    tokio::task::spawn_blocking(move || transcode(&input, declared, &output))
        .await
        .map_err(|e| TranscodeError::Task(e.to_string()))?
}

/// Transcode `input` into a JPEG at `output`.
///
/// The output file is fully written and synced when this returns `Ok`.
pub fn transcode(
    input: &Path,
    declared: SupportedImageType,
    output: &Path,
) -> Result<TranscodeReport, TranscodeError> {
    let start = std::time::Instant::now();
    let spec = TranscodeSpec::for_type(declared);

    let data = std::fs::read(input).map_err(|source| TranscodeError::Read {
        path: input.to_path_buf(),
        source,
    })?;

    let (image, intermediate) = match spec.codec {
        Codec::Raster => (decode(&data)?, None),
        Codec::WebpReencode => {
            let decoded = decode(&data)?;
            (reencode_webp(&decoded, spec.quality)?, Some(ContainerFormat::Webp))
        }
        Codec::Vector => (rasterize_svg(&data)?, None),
    };

    let (width, height) = image.dimensions();
    let jpeg = encode_jpeg(&flatten(&image), spec.quality, spec.chroma)?;
    write_synced(output, &jpeg)?;

    tracing::debug!(
        input = %input.display(),
        output = %output.display(),
        declared = %declared,
        width,
        height,
        input_bytes = data.len(),
        output_bytes = jpeg.len(),
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Image transcoded"
    );

    Ok(TranscodeReport {
        intermediate,
        output: spec.output,
        width,
        height,
        bytes_written: jpeg.len() as u64,
    })
}

fn decode(data: &[u8]) -> Result<DynamicImage, TranscodeError> {
    image::load_from_memory(data).map_err(|e| TranscodeError::Decode(e.to_string()))
}

/// Encode as lossy WEBP and decode the result again
fn reencode_webp(image: &DynamicImage, quality: f32) -> Result<DynamicImage, TranscodeError> {
    let (width, height) = image.dimensions();
    let rgba = image.to_rgba8();

    let encoded = webp::Encoder::from_rgba(&rgba, width, height).encode(quality);
    if encoded.is_empty() {
        return Err(TranscodeError::Encode {
            format: ContainerFormat::Webp,
            message: "encoder produced no data".to_string(),
        });
    }

    webp::Decoder::new(&encoded)
        .decode()
        .map(|decoded| decoded.to_image())
        .ok_or_else(|| TranscodeError::Decode("WEBP intermediate could not be decoded".to_string()))
}

fn rasterize_svg(data: &[u8]) -> Result<DynamicImage, TranscodeError> {
    use resvg::{tiny_skia, usvg};

    let tree = usvg::Tree::from_data(data, &usvg::Options::default())
        .map_err(|e| TranscodeError::Rasterize(e.to_string()))?;
    let size = tree.size().to_int_size();

    let pixels = size.width() as u64 * size.height() as u64;
    if pixels > MAX_SVG_PIXELS {
        return Err(TranscodeError::Rasterize(format!(
            "canvas {}x{} exceeds {} pixels",
            size.width(),
            size.height(),
            MAX_SVG_PIXELS
        )));
    }

    let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height()).ok_or_else(|| {
        TranscodeError::Rasterize(format!(
            "invalid canvas size {}x{}",
            size.width(),
            size.height()
        ))
    })?;
    pixmap.fill(tiny_skia::Color::WHITE);
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    // Opaque after the white fill, so premultiplied and straight RGBA agree
    image::RgbaImage::from_raw(size.width(), size.height(), pixmap.take())
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| TranscodeError::Rasterize("pixel buffer size mismatch".to_string()))
}

/// Composite onto white. JPEG has no alpha channel.
fn flatten(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let blend = |c: u8| -> u8 {
            let alpha = a as u16;
            ((c as u16 * alpha + 255 * (255 - alpha)) / 255) as u8
        };
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

fn encode_jpeg(
    rgb: &RgbImage,
    quality: f32,
    chroma: ChromaSubsampling,
) -> Result<Vec<u8>, TranscodeError> {
    let (width, height) = rgb.dimensions();
    let encode_err = |e: std::io::Error| TranscodeError::Encode {
        format: ContainerFormat::Jpeg,
        message: e.to_string(),
    };

    let (cb, cr) = chroma.pixel_sizes();
    let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
    comp.set_size(width as usize, height as usize);
    comp.set_quality(quality);
    comp.set_chroma_sampling_pixel_sizes(cb, cr);
    comp.set_optimize_coding(true);

    let mut comp = comp.start_compress(Vec::new()).map_err(encode_err)?;
    comp.write_scanlines(rgb.as_raw()).map_err(encode_err)?;
    comp.finish().map_err(encode_err)
}

fn write_synced(path: &Path, data: &[u8]) -> Result<(), TranscodeError> {
    let write_err = |source| TranscodeError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut file = std::fs::File::create(path).map_err(write_err)?;
    file.write_all(data).map_err(write_err)?;
    file.sync_all().map_err(write_err)
}
