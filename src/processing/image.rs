use crate::config::{ClaheParams, ParserConfig};
use crate::utils::PassportError;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use imageproc::contrast::{adaptive_threshold, otsu_level, threshold};
use imageproc::distance_transform::Norm;
use imageproc::filter::filter3x3;
use imageproc::morphology::close;
use std::io::Cursor;
use std::path::Path;

const SHARPEN_KERNEL: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreprocessMode {
    /// Whole page: CLAHE then a global Otsu threshold.
    Standard,
    /// MRZ strip only: sharpen, stronger CLAHE, closing, local threshold.
    Aggressive,
}

/// Raster preprocessing for OCR. Every transform is pure; the input image
/// is never modified.
pub struct ImageProcessor;

impl ImageProcessor {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<DynamicImage, PassportError> {
        image::open(path.as_ref()).map_err(|e| {
            PassportError::ImageProcessingError(format!(
                "Failed to open image {}: {}",
                path.as_ref().display(),
                e
            ))
        })
    }

    /// The bottom `fraction` of the page, where a TD3 MRZ is printed.
    pub fn crop_mrz_strip(img: &DynamicImage, fraction: f32) -> DynamicImage {
        let height = img.height();
        let strip = ((height as f32 * fraction).round() as u32).clamp(1, height.max(1));
        img.crop_imm(0, height.saturating_sub(strip), img.width(), strip)
    }

    pub fn preprocess(
        img: &DynamicImage,
        mode: PreprocessMode,
        config: &ParserConfig,
    ) -> Result<GrayImage, PassportError> {
        let gray = img.to_luma8();
        if gray.width() < 2 || gray.height() < 2 {
            return Err(PassportError::ImageProcessingError(format!(
                "Image too small to preprocess: {}x{}",
                gray.width(),
                gray.height()
            )));
        }

        let processed = match mode {
            PreprocessMode::Standard => {
                let enhanced = Self::clahe(&gray, config.standard_clahe);
                threshold(&enhanced, otsu_level(&enhanced))
            }
            PreprocessMode::Aggressive => {
                let sharpened: GrayImage = filter3x3::<Luma<u8>, f32, u8>(&gray, &SHARPEN_KERNEL);
                let enhanced = Self::clahe(&sharpened, config.aggressive_clahe);
                let closed = close(&enhanced, Norm::LInf, config.closing_radius);
                adaptive_threshold(&closed, config.adaptive_block_radius)
            }
        };

        Ok(processed)
    }

    /// Preprocess, falling back to the plain grayscale image if the pipeline
    /// fails.
    pub fn preprocess_or_grayscale(
        img: &DynamicImage,
        mode: PreprocessMode,
        config: &ParserConfig,
    ) -> GrayImage {
        match Self::preprocess(img, mode, config) {
            Ok(processed) => processed,
            Err(e) => {
                log::warn!("{:?} preprocessing failed, using grayscale: {}", mode, e);
                img.to_luma8()
            }
        }
    }

    /// Image variants fed to the MRZ OCR pass, labelled for logging.
    pub fn mrz_variants(img: &DynamicImage, config: &ParserConfig) -> Vec<(&'static str, GrayImage)> {
        let strip = Self::crop_mrz_strip(img, config.mrz_strip_fraction);

        let mut variants = Vec::with_capacity(3);
        match Self::preprocess(&strip, PreprocessMode::Aggressive, config) {
            Ok(processed) => variants.push(("aggressive", processed)),
            Err(e) => log::warn!("Aggressive MRZ preprocessing failed: {}", e),
        }
        if let Ok(processed) = Self::preprocess(&strip, PreprocessMode::Standard, config) {
            variants.push(("standard", processed));
        }
        variants.push(("grayscale", strip.to_luma8()));
        variants
    }

    /// Contrast-limited adaptive histogram equalisation.
    ///
    /// The image is split into `tiles x tiles` regions. Each region gets a
    /// histogram clipped at `clip_limit` times the uniform bin height, the
    /// excess spread evenly over all bins, and its CDF turned into a lookup
    /// table. Pixels are mapped by bilinear interpolation between the four
    /// nearest region tables.
    pub fn clahe(gray: &GrayImage, params: ClaheParams) -> GrayImage {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return gray.clone();
        }

        let tiles_x = params.tiles.clamp(1, width) as usize;
        let tiles_y = params.tiles.clamp(1, height) as usize;
        let tile_w = (width as usize).div_ceil(tiles_x);
        let tile_h = (height as usize).div_ceil(tiles_y);

        let mut luts = vec![[0u8; 256]; tiles_x * tiles_y];
        for ty in 0..tiles_y {
            for tx in 0..tiles_x {
                let x0 = tx * tile_w;
                let y0 = ty * tile_h;
                let x1 = ((tx + 1) * tile_w).min(width as usize);
                let y1 = ((ty + 1) * tile_h).min(height as usize);

                let mut hist = [0u32; 256];
                for y in y0..y1 {
                    for x in x0..x1 {
                        hist[gray.get_pixel(x as u32, y as u32)[0] as usize] += 1;
                    }
                }
                let area = ((x1.saturating_sub(x0)) * (y1.saturating_sub(y0))) as u32;
                luts[ty * tiles_x + tx] = Self::clipped_lut(&mut hist, area, params.clip_limit);
            }
        }

        let mut out = GrayImage::new(width, height);
        for (x, y, pixel) in out.enumerate_pixels_mut() {
            let value = gray.get_pixel(x, y)[0] as usize;

            let (tx0, tx1, wx) = Self::neighbours(x as usize, tile_w, tiles_x);
            let (ty0, ty1, wy) = Self::neighbours(y as usize, tile_h, tiles_y);

            let top = luts[ty0 * tiles_x + tx0][value] as f32 * (1.0 - wx)
                + luts[ty0 * tiles_x + tx1][value] as f32 * wx;
            let bottom = luts[ty1 * tiles_x + tx0][value] as f32 * (1.0 - wx)
                + luts[ty1 * tiles_x + tx1][value] as f32 * wx;
            let mapped = top * (1.0 - wy) + bottom * wy;

            *pixel = Luma([mapped.round().clamp(0.0, 255.0) as u8]);
        }
        out
    }

    fn clipped_lut(hist: &mut [u32; 256], area: u32, clip_limit: f32) -> [u8; 256] {
        let mut lut = [0u8; 256];
        if area == 0 {
            for (i, entry) in lut.iter_mut().enumerate() {
                *entry = i as u8;
            }
            return lut;
        }

        let limit = ((clip_limit * area as f32 / 256.0).max(1.0)) as u32;
        let mut excess = 0u32;
        for bin in hist.iter_mut() {
            if *bin > limit {
                excess += *bin - limit;
                *bin = limit;
            }
        }
        let bonus = excess / 256;
        let remainder = (excess % 256) as usize;
        for (i, bin) in hist.iter_mut().enumerate() {
            *bin += bonus + u32::from(i < remainder);
        }

        let mut cumulative = 0u32;
        for (i, bin) in hist.iter().enumerate() {
            cumulative += bin;
            lut[i] = ((cumulative as f32 * 255.0) / area as f32).round().min(255.0) as u8;
        }
        lut
    }

    /// Indices of the two tiles whose centres bracket `pos`, and the weight
    /// of the second.
    fn neighbours(pos: usize, tile: usize, count: usize) -> (usize, usize, f32) {
        let f = (pos as f32 + 0.5) / tile as f32 - 0.5;
        if f <= 0.0 {
            return (0, 0, 0.0);
        }
        let i0 = (f.floor() as usize).min(count - 1);
        let i1 = (i0 + 1).min(count - 1);
        let w = if i1 == i0 { 0.0 } else { f - i0 as f32 };
        (i0, i1, w)
    }

    pub fn encode_png(img: &GrayImage) -> Result<Vec<u8>, PassportError> {
        let mut buffer = Vec::new();
        DynamicImage::ImageLuma8(img.clone())
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|e| {
                PassportError::ImageProcessingError(format!("Failed to encode image: {}", e))
            })?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    /// Dark text-like stripes on a mid-grey, low-contrast background.
    fn synthetic_page(width: u32, height: u32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, y| {
            let v = if (y / 4) % 3 == 0 && x % 7 < 4 { 90 } else { 130 };
            image::Rgb([v, v, v])
        });
        DynamicImage::ImageRgb8(img)
    }

    fn is_binary(img: &GrayImage) -> bool {
        img.pixels().all(|p| p[0] == 0 || p[0] == 255)
    }

    #[test]
    fn test_crop_mrz_strip_takes_bottom_fifth() {
        let img = synthetic_page(50, 100);
        let strip = ImageProcessor::crop_mrz_strip(&img, 0.20);
        assert_eq!(strip.width(), 50);
        assert_eq!(strip.height(), 20);
    }

    #[test]
    fn test_standard_mode_binarizes() {
        let config = ParserConfig::default();
        let out = ImageProcessor::preprocess(&synthetic_page(64, 48), PreprocessMode::Standard, &config)
            .unwrap();
        assert_eq!(out.dimensions(), (64, 48));
        assert!(is_binary(&out));
    }

    #[test]
    fn test_aggressive_mode_binarizes() {
        let config = ParserConfig::default();
        let out = ImageProcessor::preprocess(&synthetic_page(64, 48), PreprocessMode::Aggressive, &config)
            .unwrap();
        assert_eq!(out.dimensions(), (64, 48));
        assert!(is_binary(&out));
    }

    #[test]
    fn test_degenerate_image_falls_back_to_grayscale() {
        let config = ParserConfig::default();
        let tiny = synthetic_page(1, 1);
        assert!(ImageProcessor::preprocess(&tiny, PreprocessMode::Standard, &config).is_err());

        let out = ImageProcessor::preprocess_or_grayscale(&tiny, PreprocessMode::Standard, &config);
        assert_eq!(out.dimensions(), (1, 1));
        assert_eq!(out.get_pixel(0, 0)[0], 90);
    }

    #[test]
    fn test_clahe_without_clipping_equalizes() {
        // A quarter of the pixels at 90, the rest at 130
        let gray = GrayImage::from_fn(16, 16, |x, _| Luma([if x < 4 { 90 } else { 130 }]));
        let params = ClaheParams {
            clip_limit: 1000.0,
            tiles: 1,
        };
        let out = ImageProcessor::clahe(&gray, params);
        assert_eq!(out.get_pixel(0, 0)[0], 64);
        assert_eq!(out.get_pixel(15, 0)[0], 255);
    }

    #[test]
    fn test_clahe_keeps_flat_image_flat() {
        let gray = GrayImage::from_pixel(16, 16, Luma([100]));
        let out = ImageProcessor::clahe(
            &gray,
            ClaheParams {
                clip_limit: 3.0,
                tiles: 4,
            },
        );
        let first = out.get_pixel(0, 0)[0];
        assert!(out.pixels().all(|p| p[0] == first));
    }

    #[test]
    fn test_mrz_variants_always_include_grayscale() {
        let config = ParserConfig::default();
        let variants = ImageProcessor::mrz_variants(&synthetic_page(80, 100), &config);
        assert_eq!(variants.len(), 3);
        assert_eq!(variants.last().unwrap().0, "grayscale");
    }

    #[test]
    fn test_encode_png_roundtrips_dimensions() {
        let gray = GrayImage::from_pixel(10, 6, Luma([200]));
        let bytes = ImageProcessor::encode_png(&gray).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (10, 6));
    }
}
