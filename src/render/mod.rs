//! Decode DICOM pixel data into an 8-bit PNG.
//!
//! Intensities are scaled linearly against the brightest sample of the first
//! frame (`out = round(v * 255 / max)`), negative samples clamp to zero.

use dicom_pixeldata::{PhotometricInterpretation, PixelDecoder, PlanarConfiguration};
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to open DICOM object: {0}")]
    Open(String),

    #[error("failed to decode pixel data: {0}")]
    Decode(String),

    #[error("non-renderable pixel data: {0}")]
    NonRenderable(String),

    #[error("png encode: {0}")]
    Encode(String),

    #[error("failed to write image: {0}")]
    Io(#[from] std::io::Error),
}

/// Raster produced from one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Vec<u8>,
}

impl Raster {
    fn color_type(&self) -> ColorType {
        if self.channels == 3 {
            ColorType::Rgb8
        } else {
            ColorType::L8
        }
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, RenderError> {
        let mut buf: Vec<u8> = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(&self.pixels, self.width, self.height, self.color_type())
            .map_err(|e| RenderError::Encode(e.to_string()))?;
        Ok(buf)
    }
}

/// Scale samples to 0..=255 against their maximum.
///
/// Fails when the maximum is not positive, since there is nothing to scale against.
pub fn normalize_to_u8(samples: &[f64]) -> Result<Vec<u8>, RenderError> {
    let max = samples
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);

    if samples.is_empty() {
        return Err(RenderError::NonRenderable("no samples".to_string()));
    }
    if max <= 0.0 {
        return Err(RenderError::NonRenderable(format!(
            "maximum sample value is {}",
            if max.is_finite() { max } else { 0.0 }
        )));
    }

    Ok(samples
        .iter()
        .map(|&v| {
            if !v.is_finite() || v <= 0.0 {
                0
            } else {
                (v * 255.0 / max).round().min(255.0) as u8
            }
        })
        .collect())
}

/// Decode the first frame of a DICOM file into a normalized raster.
pub fn rasterize_file(path: &Path) -> Result<Raster, RenderError> {
    let object = dicom_object::open_file(path).map_err(|e| RenderError::Open(e.to_string()))?;
    let decoded = object
        .decode_pixel_data()
        .map_err(|e| RenderError::Decode(e.to_string()))?;

    if decoded.number_of_frames() == 0 {
        return Err(RenderError::NonRenderable("no frames".to_string()));
    }

    let width = decoded.columns();
    let height = decoded.rows();
    let channels = decoded.samples_per_pixel();
    let photometric = decoded.photometric_interpretation().clone();

    let samples: Vec<f64> = if decoded.bits_allocated() <= 8 {
        decoded
            .to_vec_frame::<u8>(0)
            .map_err(|e| RenderError::Decode(e.to_string()))?
            .into_iter()
            .map(f64::from)
            .collect()
    } else {
        // Signed samples and negative rescale intercepts must survive the modality LUT.
        decoded
            .to_vec_frame::<f32>(0)
            .map_err(|e| RenderError::Decode(e.to_string()))?
            .into_iter()
            .map(f64::from)
            .collect()
    };

    let (channels, samples) = match (channels, &photometric) {
        (1, p) if p.is_monochrome() => (1u8, samples),
        (3, PhotometricInterpretation::Rgb) => {
            let samples = match decoded.planar_configuration() {
                PlanarConfiguration::Standard => samples,
                PlanarConfiguration::PixelFirst => {
                    interleave_planes(&samples, (width * height) as usize)?
                }
            };
            (3u8, samples)
        }
        (spp, other) => {
            return Err(RenderError::NonRenderable(format!(
                "unsupported layout: {} samples per pixel, {}",
                spp,
                other.as_str()
            )))
        }
    };

    let expected = width as usize * height as usize * channels as usize;
    if samples.len() != expected {
        return Err(RenderError::NonRenderable(format!(
            "expected {} samples for {}x{}, got {}",
            expected,
            width,
            height,
            samples.len()
        )));
    }

    let pixels = normalize_to_u8(&samples)?;
    Ok(Raster {
        width,
        height,
        channels,
        pixels,
    })
}

/// Decode `source` and write a PNG to `target`.
pub fn render_png(source: &Path, target: &Path) -> Result<Raster, RenderError> {
    let raster = rasterize_file(source)?;
    let png = raster.encode_png()?;
    std::fs::write(target, png)?;
    Ok(raster)
}

fn interleave_planes(samples: &[f64], pixel_count: usize) -> Result<Vec<f64>, RenderError> {
    if samples.len() != pixel_count * 3 {
        return Err(RenderError::NonRenderable(format!(
            "planar RGB buffer has {} samples, expected {}",
            samples.len(),
            pixel_count * 3
        )));
    }
    let (r, rest) = samples.split_at(pixel_count);
    let (g, b) = rest.split_at(pixel_count);
    Ok((0..pixel_count)
        .flat_map(|i| [r[i], g[i], b[i]])
        .collect())
}
