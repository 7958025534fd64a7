use std::{io::Write, path::PathBuf, time::Duration};

use base64::Engine;
use flate2::{write::ZlibEncoder, Compression};
use image::{ColorType, DynamicImage, GenericImageView, ImageFormat, RgbImage};
use serde::Deserialize;
use thiserror::Error;

/// Where an image comes from: raw bytes, a local file, or a URL
/// (`http(s)://` or a `data:` URI).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    Bytes(Vec<u8>),
    File(PathBuf),
    Url(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("image i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to fetch image: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("image request returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed data uri")]
    DataUri,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image has zero width or height")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Gray,
    Rgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFilter {
    /// JPEG bytes, embedded untouched.
    Dct,
    /// Zlib-compressed 8-bit samples.
    Flate,
}

/// An image in the form a PDF image XObject needs.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedImage {
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    pub filter: ImageFilter,
    pub data: Vec<u8>,
}

impl EmbeddedImage {
    /// Decodes encoded image bytes (PNG, JPEG, ...).
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let format = image::guess_format(bytes)?;
        let decoded = image::load_from_memory_with_format(bytes, format)?;
        let (width, height) = decoded.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::Empty);
        }

        // Only 1- and 3-component JPEGs match a PDF device colour space as-is;
        // CMYK and YCCK streams are re-encoded from the decoded RGB pixels.
        if format == ImageFormat::Jpeg {
            let color_space = match (jpeg_components(bytes), decoded.color()) {
                (Some(1), ColorType::L8) => Some(ColorSpace::Gray),
                (Some(3), ColorType::Rgb8) => Some(ColorSpace::Rgb),
                (components, _) => {
                    tracing::debug!("Re-encoding JPEG with {:?} components", components);
                    None
                }
            };
            if let Some(color_space) = color_space {
                return Ok(Self {
                    width,
                    height,
                    color_space,
                    filter: ImageFilter::Dct,
                    data: bytes.to_vec(),
                });
            }
        }

        Self::from_rgb(&flatten_alpha(decoded))
    }

    pub fn from_rgb(image: &RgbImage) -> Result<Self, Error> {
        Ok(Self {
            width: image.width(),
            height: image.height(),
            color_space: ColorSpace::Rgb,
            filter: ImageFilter::Flate,
            data: flate_compress(image.as_raw())?,
        })
    }

    /// Height over width.
    pub fn aspect_ratio(&self) -> f32 {
        self.height as f32 / self.width as f32
    }
}

// Composites transparent pixels over white, matching how the image shows on paper.
fn flatten_alpha(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let blend = |c: u8| ((c as u16 * a as u16 + 255 * (255 - a as u16)) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Number of colour components declared in the frame header of a JPEG.
fn jpeg_components(bytes: &[u8]) -> Option<u8> {
    let mut i = 2;
    while i + 4 <= bytes.len() {
        if bytes[i] != 0xFF {
            return None;
        }
        let marker = bytes[i + 1];
        // Fill bytes before a marker.
        if marker == 0xFF {
            i += 1;
            continue;
        }
        if matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC) {
            return bytes.get(i + 9).copied();
        }
        let length = u16::from_be_bytes([bytes[i + 2], bytes[i + 3]]) as usize;
        i += 2 + length;
    }
    None
}

pub fn flate_compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Resolves [`ImageSource`]s to bytes.
#[derive(Debug, Clone)]
pub struct ImageLoader {
    client: reqwest::Client,
}

impl ImageLoader {
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub async fn load(&self, source: &ImageSource) -> Result<EmbeddedImage, Error> {
        let bytes = self.fetch(source).await?;
        EmbeddedImage::decode(&bytes)
    }

    pub async fn fetch(&self, source: &ImageSource) -> Result<Vec<u8>, Error> {
        match source {
            ImageSource::Bytes(bytes) => Ok(bytes.clone()),
            ImageSource::File(path) => Ok(tokio::fs::read(path).await?),
            ImageSource::Url(url) if url.starts_with("data:") => parse_data_uri(url),
            ImageSource::Url(url) => {
                tracing::debug!("Fetching image from {}", url);
                let response = self.client.get(url).send().await?;
                if !response.status().is_success() {
                    return Err(Error::Status(response.status()));
                }
                Ok(response.bytes().await?.to_vec())
            }
        }
    }
}

fn parse_data_uri(uri: &str) -> Result<Vec<u8>, Error> {
    let (header, payload) = uri
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .ok_or(Error::DataUri)?;

    if header.split(';').any(|param| param == "base64") {
        Ok(base64::engine::general_purpose::STANDARD.decode(payload.trim())?)
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;

    use image::{Rgb, Rgba, RgbaImage};

    use super::*;

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb([200, 10, 10]));
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_decode_png() {
        let image = EmbeddedImage::decode(&png_bytes(4, 2)).unwrap();
        assert_eq!((image.width, image.height), (4, 2));
        assert_eq!(image.filter, ImageFilter::Flate);
        assert_eq!(image.color_space, ColorSpace::Rgb);
        assert_eq!(image.aspect_ratio(), 0.5);
    }

    #[test]
    fn test_decode_jpeg_passes_through() {
        let image = RgbImage::from_pixel(8, 8, Rgb([0, 128, 255]));
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Jpeg).unwrap();
        let bytes = bytes.into_inner();

        let embedded = EmbeddedImage::decode(&bytes).unwrap();
        assert_eq!(embedded.filter, ImageFilter::Dct);
        assert_eq!(embedded.color_space, ColorSpace::Rgb);
        assert_eq!(embedded.data, bytes);
    }

    fn gray_jpeg() -> Vec<u8> {
        let image = image::GrayImage::from_pixel(8, 8, image::Luma([90]));
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Jpeg).unwrap();
        bytes.into_inner()
    }

    /// An 8x8 baseline JPEG with four components, every sample mid-grey.
    ///
    /// Each component uses one-symbol Huffman tables, so every block encodes
    /// as a zero DC difference followed by end-of-block: two zero bits.
    fn cmyk_jpeg() -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8];
        // Quantization table 0, all ones.
        bytes.extend([0xFF, 0xDB, 0x00, 0x43, 0x00]);
        bytes.extend([1u8; 64]);
        // Baseline frame: 8 bits, 8x8, four components sampled 1x1.
        bytes.extend([0xFF, 0xC0, 0x00, 0x14, 0x08, 0x00, 0x08, 0x00, 0x08, 0x04]);
        for id in 1..=4 {
            bytes.extend([id, 0x11, 0x00]);
        }
        // DC and AC tables 0, each holding the single one-bit code for symbol 0.
        for class in [0x00, 0x10] {
            bytes.extend([0xFF, 0xC4, 0x00, 0x14, class, 0x01]);
            bytes.extend([0u8; 15]);
            bytes.push(0x00);
        }
        bytes.extend([0xFF, 0xDA, 0x00, 0x0E, 0x04]);
        for id in 1..=4 {
            bytes.extend([id, 0x00]);
        }
        bytes.extend([0x00, 0x3F, 0x00]);
        // Four blocks of two zero bits.
        bytes.push(0x00);
        bytes.extend([0xFF, 0xD9]);
        bytes
    }

    #[test]
    fn test_jpeg_components() {
        assert_eq!(jpeg_components(&gray_jpeg()), Some(1));
        assert_eq!(jpeg_components(&cmyk_jpeg()), Some(4));
        assert_eq!(jpeg_components(&png_bytes(1, 1)), None);
        assert_eq!(jpeg_components(&[0xFF, 0xD8, 0xFF]), None);
    }

    #[test]
    fn test_decode_gray_jpeg_passes_through() {
        let bytes = gray_jpeg();
        let embedded = EmbeddedImage::decode(&bytes).unwrap();
        assert_eq!(embedded.filter, ImageFilter::Dct);
        assert_eq!(embedded.color_space, ColorSpace::Gray);
        assert_eq!(embedded.data, bytes);
    }

    #[test]
    fn test_decode_cmyk_jpeg_is_reencoded() {
        let bytes = cmyk_jpeg();
        let embedded = EmbeddedImage::decode(&bytes).unwrap();
        assert_eq!((embedded.width, embedded.height), (8, 8));
        assert_eq!(embedded.filter, ImageFilter::Flate);
        assert_eq!(embedded.color_space, ColorSpace::Rgb);
        assert_ne!(embedded.data, bytes);
    }

    #[test]
    fn test_flate_compress_round_trips() {
        use std::io::Read;

        let data = b"abcabcabcabc".repeat(10);
        let compressed = flate_compress(&data).unwrap();
        let mut inflated = Vec::new();
        flate2::read::ZlibDecoder::new(compressed.as_slice())
            .read_to_end(&mut inflated)
            .unwrap();
        assert_eq!(inflated, data);
    }

    #[test]
    fn test_alpha_is_flattened_onto_white() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0])));
        assert_eq!(flatten_alpha(image).get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        assert!(EmbeddedImage::decode(b"definitely not an image").is_err());
    }

    #[test]
    fn test_data_uri() {
        assert_eq!(parse_data_uri("data:text/plain;base64,aGk=").unwrap(), b"hi");
        assert_eq!(parse_data_uri("data:,plain").unwrap(), b"plain");
        assert!(matches!(parse_data_uri("data:nocomma"), Err(Error::DataUri)));
    }

    #[tokio::test]
    async fn test_load_missing_file_fails() {
        let loader = ImageLoader::new(Duration::from_secs(1)).unwrap();
        let source = ImageSource::File("/nonexistent/problem.png".into());
        assert!(matches!(loader.load(&source).await, Err(Error::Io(_))));
    }
}
