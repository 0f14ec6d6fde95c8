//! Raw sensor data (DNG smart previews) to an 8-bit RGB bitmap.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use image::{DynamicImage, Rgb, RgbImage};
use rawloader::{RawImage, RawImageData};

const GAMMA: f32 = 1.0 / 2.2;

/// Maps a sensor value into `0..=255` using the channel's black and white levels.
pub fn normalize(value: f32, black: f32, white: f32) -> u8 {
    let range = (white - black).max(1.0);
    let linear = ((value - black) / range).clamp(0.0, 1.0);
    (linear.powf(GAMMA) * 255.0).round() as u8
}

/// CFA colour index folded onto RGB: 0 red, 2 blue, everything else green.
fn rgb_channel(color: usize) -> usize {
    match color {
        0 => 0,
        2 => 2,
        _ => 1,
    }
}

/// Decodes with `rawloader`. The loader can panic on malformed input; that is
/// reported as an error like any other failure.
pub fn decode_raw(path: &Path) -> Result<DynamicImage, String> {
    let raw = catch_unwind(AssertUnwindSafe(|| rawloader::decode_file(path)))
        .map_err(|_| "raw loader panicked".to_string())?
        .map_err(|e| format!("{:?}", e))?;

    let image = match &raw.data {
        RawImageData::Integer(data) => develop(&raw, |i| data.get(i).map(|&v| f32::from(v))),
        RawImageData::Float(data) => develop(&raw, |i| data.get(i).copied()),
    };
    image.map(DynamicImage::ImageRgb8)
}

/// Per-colour black and white levels, indexed the way the sensor reports them.
#[derive(Debug, Clone, Copy)]
struct Levels {
    black: [u16; 4],
    white: [u16; 4],
}

impl Levels {
    fn apply(&self, value: f32, color: usize) -> u8 {
        let i = color.min(3);
        normalize(value, f32::from(self.black[i]), f32::from(self.white[i]))
    }
}

fn develop<F>(raw: &RawImage, sample: F) -> Result<RgbImage, String>
where
    F: Fn(usize) -> Option<f32>,
{
    let levels = Levels {
        black: raw.blacklevels,
        white: raw.whitelevels,
    };

    match raw.cpp {
        3 => develop_rgb(raw.width, raw.height, &levels, sample),
        1 => develop_mosaic(
            raw.width,
            raw.height,
            |row, col| raw.cfa.color_at(row, col),
            &levels,
            sample,
        ),
        other => Err(format!("unsupported components per pixel: {}", other)),
    }
}

fn read<F>(sample: &F, index: usize) -> Result<f32, String>
where
    F: Fn(usize) -> Option<f32>,
{
    sample(index).ok_or_else(|| format!("sample {} out of range", index))
}

fn develop_rgb<F>(w: usize, h: usize, levels: &Levels, sample: F) -> Result<RgbImage, String>
where
    F: Fn(usize) -> Option<f32>,
{
    let mut out = RgbImage::new(dim(w)?, dim(h)?);
    for y in 0..h {
        for x in 0..w {
            let base = (y * w + x) * 3;
            let mut px = [0u8; 3];
            for (c, slot) in px.iter_mut().enumerate() {
                *slot = levels.apply(read(&sample, base + c)?, c);
            }
            out.put_pixel(x as u32, y as u32, Rgb(px));
        }
    }
    Ok(out)
}

/// 2x2 super-pixel: each output pixel averages one CFA block per channel.
/// Levels follow the CFA colour of each photosite, not the output channel.
fn develop_mosaic<F, C>(
    width: usize,
    height: usize,
    color_at: C,
    levels: &Levels,
    sample: F,
) -> Result<RgbImage, String>
where
    F: Fn(usize) -> Option<f32>,
    C: Fn(usize, usize) -> usize,
{
    let (w, h) = (width / 2, height / 2);
    let mut out = RgbImage::new(dim(w)?, dim(h)?);
    for y in 0..h {
        for x in 0..w {
            let mut sum = [0u32; 3];
            let mut count = [0u32; 3];
            for (dy, dx) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
                let (row, col) = (y * 2 + dy, x * 2 + dx);
                let color = color_at(row, col);
                let channel = rgb_channel(color);
                let v = read(&sample, row * width + col)?;
                sum[channel] += u32::from(levels.apply(v, color));
                count[channel] += 1;
            }
            let px = |c: usize| if count[c] == 0 { 0 } else { (sum[c] / count[c]) as u8 };
            out.put_pixel(x as u32, y as u32, Rgb([px(0), px(1), px(2)]));
        }
    }
    Ok(out)
}

fn dim(value: usize) -> Result<u32, String> {
    match u32::try_from(value) {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(format!("invalid raw dimension {}", value)),
    }
}
