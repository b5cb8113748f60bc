//! PNG encoding for rendered figures.
//!
//! Supports two encoding modes:
//! - **Grayscale PNG (color type 0)**: used when every pixel is opaque and
//!   has equal red, green and blue channels. A cutout figure with the gray
//!   colormap and black/white annotations always qualifies, at a quarter of
//!   the uncompressed size.
//! - **RGBA PNG (color type 6)**: fallback for anything else.
//!
//! Use `create_png_auto` for automatic mode selection, or `create_png` for
//! explicit RGBA encoding.

use rayon::prelude::*;
use std::io::Write;

/// Minimum pixels to benefit from a parallel grayscale scan
const PARALLEL_THRESHOLD: usize = 4096; // 64x64 or larger

/// Create a PNG image with automatic format selection.
///
/// # Arguments
/// - `pixels`: straight (non-premultiplied) RGBA data, 4 bytes per pixel
/// - `width`: Image width in pixels
/// - `height`: Image height in pixels
pub fn create_png_auto(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>, String> {
    check_len(pixels, width, height, 4)?;

    let gray = if pixels.len() / 4 >= PARALLEL_THRESHOLD {
        pixels.par_chunks_exact(4).all(is_opaque_gray)
    } else {
        pixels.chunks_exact(4).all(is_opaque_gray)
    };

    if gray {
        let luma: Vec<u8> = pixels.chunks_exact(4).map(|p| p[0]).collect();
        create_png_gray(&luma, width, height)
    } else {
        create_png(pixels, width, height)
    }
}

#[inline(always)]
fn is_opaque_gray(p: &[u8]) -> bool {
    p[3] == 255 && p[0] == p[1] && p[1] == p[2]
}

/// Create an 8-bit grayscale PNG (color type 0) from one byte per pixel.
pub fn create_png_gray(luma: &[u8], width: usize, height: usize) -> Result<Vec<u8>, String> {
    check_len(luma, width, height, 1)?;
    encode(luma, width, height, 0, 1)
}

/// Create a PNG image from RGBA pixel data (color type 6).
pub fn create_png(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>, String> {
    check_len(pixels, width, height, 4)?;
    encode(pixels, width, height, 6, 4)
}

fn check_len(data: &[u8], width: usize, height: usize, channels: usize) -> Result<(), String> {
    if width == 0 || height == 0 {
        return Err(format!("Invalid image size {}x{}", width, height));
    }
    let expected = width * height * channels;
    if data.len() != expected {
        return Err(format!(
            "Pixel buffer has {} bytes, expected {} for {}x{}",
            data.len(),
            expected,
            width,
            height
        ));
    }
    Ok(())
}

fn encode(
    data: &[u8],
    width: usize,
    height: usize,
    color_type: u8,
    channels: usize,
) -> Result<Vec<u8>, String> {
    let mut png = Vec::new();

    // PNG signature
    png.extend_from_slice(&[137, 80, 78, 71, 13, 10, 26, 10]);

    let mut ihdr_data = Vec::with_capacity(13);
    ihdr_data.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr_data.extend_from_slice(&(height as u32).to_be_bytes());
    ihdr_data.push(8); // bit depth
    ihdr_data.push(color_type);
    ihdr_data.push(0); // compression method
    ihdr_data.push(0); // filter method
    ihdr_data.push(0); // interlace method
    write_chunk(&mut png, b"IHDR", &ihdr_data);

    let idat_data = deflate_idat(data, width * channels, height)
        .map_err(|e| format!("IDAT compression failed: {}", e))?;
    write_chunk(&mut png, b"IDAT", &idat_data);

    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Write a PNG chunk
fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// Deflate scanlines for the IDAT chunk.
///
/// Uses the Up filter: rendered figures are dominated by vertical runs of
/// identical rows (white margins, colorbar), which it reduces to zeros.
fn deflate_idat(
    data: &[u8],
    stride: usize,
    height: usize,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut filtered = Vec::with_capacity(height * (1 + stride));
    for y in 0..height {
        let row = &data[y * stride..(y + 1) * stride];
        if y == 0 {
            filtered.push(0); // filter type: none
            filtered.extend_from_slice(row);
        } else {
            let prev = &data[(y - 1) * stride..y * stride];
            filtered.push(2); // filter type: up
            filtered.extend(row.iter().zip(prev).map(|(a, b)| a.wrapping_sub(*b)));
        }
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(&filtered)?;
    let compressed = encoder.finish()?;

    Ok(compressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ihdr_color_type(png: &[u8]) -> u8 {
        // signature(8) + length(4) + "IHDR"(4) + width(4) + height(4) + depth(1)
        png[25]
    }

    #[test]
    fn test_gray_pixels_select_color_type_0() {
        let pixels: Vec<u8> = (0..16u8).flat_map(|v| [v * 10, v * 10, v * 10, 255]).collect();
        let png = create_png_auto(&pixels, 4, 4).unwrap();
        assert_eq!(&png[..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
        assert_eq!(ihdr_color_type(&png), 0);
    }

    #[test]
    fn test_colored_or_transparent_pixels_select_rgba() {
        let mut pixels = vec![128u8; 4 * 4 * 4];
        pixels[0] = 255; // red tint on the first pixel
        assert_eq!(ihdr_color_type(&create_png_auto(&pixels, 4, 4).unwrap()), 6);

        let mut pixels = vec![128u8; 4 * 4 * 4];
        pixels[3] = 0; // transparent first pixel
        assert_eq!(ihdr_color_type(&create_png_auto(&pixels, 4, 4).unwrap()), 6);
    }

    #[test]
    fn test_size_mismatch_is_error() {
        assert!(create_png(&[0u8; 15], 2, 2).is_err());
        assert!(create_png_gray(&[0u8; 4], 0, 4).is_err());
    }

    #[test]
    fn test_up_filter_round_trip() {
        use std::io::Read;

        let data: Vec<u8> = (0..30u8).collect();
        let compressed = deflate_idat(&data, 10, 3).unwrap();
        let mut raw = Vec::new();
        flate2::read::ZlibDecoder::new(&compressed[..])
            .read_to_end(&mut raw)
            .unwrap();

        assert_eq!(raw.len(), 33);
        assert_eq!(raw[0], 0);
        assert_eq!(&raw[1..11], &data[..10]);
        assert_eq!(raw[11], 2);
        assert!(raw[12..22].iter().all(|&d| d == 10));
    }
}
