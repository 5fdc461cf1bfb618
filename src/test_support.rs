//! Synthetic captures shared by unit tests.

use std::f64::consts::PI;
use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageOutputFormat, Luma, RgbImage};

/// Fingerprint-like whorl: concentric ridges of the given period, clipped
/// into flat ridge (190) and valley (60) plateaus. Alternate 45° sectors
/// are phase-shifted by half a period, so ridges end along the sector
/// boundaries the way real ridge endings do.
pub fn ridge_image(width: u32, height: u32, period: f64) -> GrayImage {
    let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
    let sector_width = 2.0 * PI / 8.0;

    GrayImage::from_fn(width, height, |x, y| {
        let (dx, dy) = (x as f64 - cx, y as f64 - cy);
        let r = dx.hypot(dy);
        let angle = dy.atan2(dx) + PI;
        let sector = (angle / sector_width) as u32 % 8;
        let phase = if sector % 2 == 1 { PI } else { 0.0 };
        let wave = (1.6 * (2.0 * PI * r / period + phase).sin()).clamp(-1.0, 1.0);
        Luma([(125.0 + 65.0 * wave).round() as u8])
    })
}

pub fn encode_png(img: &GrayImage) -> Vec<u8> {
    encode(DynamicImage::ImageLuma8(img.clone()))
}

pub fn encode_png_rgb(img: &RgbImage) -> Vec<u8> {
    encode(DynamicImage::ImageRgb8(img.clone()))
}

/// A 20x4 grayscale PNG whose IHDR claims `width` x `height`. The chunk
/// CRC is recomputed so header readers accept it.
pub fn png_declaring(width: u32, height: u32) -> Vec<u8> {
    let mut png = encode_png(&GrayImage::from_pixel(20, 4, Luma([128])));
    // signature (8) + length (4) + "IHDR" (4), then width and height
    png[16..20].copy_from_slice(&width.to_be_bytes());
    png[20..24].copy_from_slice(&height.to_be_bytes());
    let crc = crc32(&png[12..29]);
    png[29..33].copy_from_slice(&crc.to_be_bytes());
    png
}

fn crc32(data: &[u8]) -> u32 {
    let mut crc = !0u32;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xEDB8_8320
            } else {
                crc >> 1
            };
        }
    }
    !crc
}

fn encode(dynamic: DynamicImage) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    dynamic
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .unwrap();
    cursor.into_inner()
}
