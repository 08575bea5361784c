// eglquad/src/image.rs
//
//! RGBA8 images and PNG encoding.

use crate::Error;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Options for writing a PNG file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SaveOptions {
    /// Quality on a 0 to 100 scale. PNG is lossless, so this picks the compression effort.
    pub quality: u8,
}

impl Default for SaveOptions {
    fn default() -> SaveOptions {
        SaveOptions { quality: 90 }
    }
}

impl SaveOptions {
    fn compression(&self) -> png::Compression {
        match self.quality {
            0..=33 => png::Compression::Fast,
            34..=66 => png::Compression::Default,
            _ => png::Compression::Best,
        }
    }
}

/// An 8-bit RGBA image with rows stored top to bottom.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl Image {
    /// Wraps tightly packed RGBA8 pixels.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Image, Error> {
        if pixels.len() != width as usize * height as usize * 4 {
            return Err(Error::InvalidImageData);
        }
        Ok(Image { width, height, pixels })
    }

    /// Creates an image filled with one color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Image {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * 4);
        for _ in 0..count {
            pixels.extend_from_slice(&rgba);
        }
        Image { width, height, pixels }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Returns the pixel at column `x`, row `y` counted from the top.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let mut rgba = [0; 4];
        rgba.copy_from_slice(&self.pixels[offset..offset + 4]);
        Some(rgba)
    }

    /// Rotates the image by 180 degrees in place.
    pub fn rotate_180(&mut self) {
        // Reversing the pixel order reverses both rows and columns.
        let count = self.pixels.len() / 4;
        for index in 0..count / 2 {
            let (front, back) = (index * 4, (count - 1 - index) * 4);
            for channel in 0..4 {
                self.pixels.swap(front + channel, back + channel);
            }
        }
    }

    /// Reverses the row order in place.
    pub fn flip_rows(&mut self) {
        let stride = self.width as usize * 4;
        let height = self.height as usize;
        for row in 0..height / 2 {
            let (top, bottom) = self.pixels.split_at_mut((height - 1 - row) * stride);
            top[row * stride..(row + 1) * stride].swap_with_slice(&mut bottom[..stride]);
        }
    }

    /// Decodes a PNG stream, converting every color type to RGBA8.
    pub fn decode_png<R: Read>(reader: R) -> Result<Image, Error> {
        let mut decoder = png::Decoder::new(reader);
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder.read_info()?;
        let mut buffer = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buffer)?;
        buffer.truncate(info.buffer_size());

        let pixels = match info.color_type {
            png::ColorType::Rgba => buffer,
            png::ColorType::Rgb => {
                let mut pixels = Vec::with_capacity(buffer.len() / 3 * 4);
                for rgb in buffer.chunks_exact(3) {
                    pixels.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 0xff]);
                }
                pixels
            }
            png::ColorType::GrayscaleAlpha => {
                let mut pixels = Vec::with_capacity(buffer.len() * 2);
                for ga in buffer.chunks_exact(2) {
                    pixels.extend_from_slice(&[ga[0], ga[0], ga[0], ga[1]]);
                }
                pixels
            }
            png::ColorType::Grayscale => {
                let mut pixels = Vec::with_capacity(buffer.len() * 4);
                for &gray in &buffer {
                    pixels.extend_from_slice(&[gray, gray, gray, 0xff]);
                }
                pixels
            }
            png::ColorType::Indexed => {
                return Err(Error::ImageCodec("palette was not expanded".to_owned()))
            }
        };
        Image::from_rgba(info.width, info.height, pixels)
    }

    pub fn open_png<Q: AsRef<Path>>(path: Q) -> Result<Image, Error> {
        Image::decode_png(BufReader::new(File::open(path)?))
    }

    /// Encodes the image as an RGBA8 PNG.
    pub fn encode_png<W: Write>(&self, writer: W, options: &SaveOptions) -> Result<(), Error> {
        let mut encoder = png::Encoder::new(writer, self.width, self.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(options.compression());
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&self.pixels)?;
        writer.finish()?;
        Ok(())
    }

    pub fn save_png<Q: AsRef<Path>>(&self, path: Q, options: &SaveOptions) -> Result<(), Error> {
        self.encode_png(BufWriter::new(File::create(path)?), options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(width: u32, height: u32) -> Image {
        let mut pixels = Vec::new();
        for index in 0..(width * height) as u8 {
            pixels.extend_from_slice(&[index, 0, 0, 0xff]);
        }
        Image::from_rgba(width, height, pixels).unwrap()
    }

    #[test]
    fn test_from_rgba_rejects_wrong_length() {
        match Image::from_rgba(2, 2, vec![0; 15]) {
            Err(Error::InvalidImageData) => {}
            other => panic!("expected InvalidImageData, got {:?}", other),
        }
    }

    #[test]
    fn test_rotate_180_reverses_rows_and_columns() {
        let mut image = numbered(3, 2);
        image.rotate_180();
        assert_eq!(image.pixel(0, 0).unwrap()[0], 5);
        assert_eq!(image.pixel(2, 0).unwrap()[0], 3);
        assert_eq!(image.pixel(0, 1).unwrap()[0], 2);
        assert_eq!(image.pixel(2, 1).unwrap()[0], 0);
        image.rotate_180();
        assert_eq!(image, numbered(3, 2));
    }

    #[test]
    fn test_flip_rows() {
        let mut image = numbered(2, 3);
        image.flip_rows();
        assert_eq!(image.pixel(0, 0).unwrap()[0], 4);
        assert_eq!(image.pixel(1, 1).unwrap()[0], 3);
        assert_eq!(image.pixel(1, 2).unwrap()[0], 1);
    }

    #[test]
    fn test_png_encoding_preserves_pixels() {
        let image = numbered(4, 3);
        let mut bytes = Vec::new();
        image.encode_png(&mut bytes, &SaveOptions::default()).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
        assert_eq!(Image::decode_png(&bytes[..]).unwrap(), image);
    }

    #[test]
    fn test_rgb_png_gains_opaque_alpha() {
        let mut bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut bytes, 2, 1);
            encoder.set_color(png::ColorType::Rgb);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[10, 20, 30, 40, 50, 60]).unwrap();
        }
        let image = Image::decode_png(&bytes[..]).unwrap();
        assert_eq!(image.pixel(0, 0), Some([10, 20, 30, 0xff]));
        assert_eq!(image.pixel(1, 0), Some([40, 50, 60, 0xff]));
    }

    #[test]
    fn test_decoding_garbage_fails() {
        assert!(Image::decode_png(&b"not a png"[..]).is_err());
    }

    #[test]
    fn test_quality_selects_compression() {
        assert_eq!(SaveOptions::default().quality, 90);
        assert!(matches!(SaveOptions { quality: 10 }.compression(), png::Compression::Fast));
        assert!(matches!(SaveOptions { quality: 50 }.compression(), png::Compression::Default));
    }
}
