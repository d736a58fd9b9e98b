use anyhow::{anyhow, Result};
use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in pixel units. Regions typed by the user are in
/// display coordinates; `to_source` maps them onto the page buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// display pixels × scale = source pixels
    pub fn to_source(&self, scale: f64) -> Region {
        Region {
            left: scale_coord(self.left, scale),
            top: scale_coord(self.top, scale),
            width: scale_coord(self.width, scale),
            height: scale_coord(self.height, scale),
        }
    }

    /// Intersects the region with a `width × height` image. A region lying
    /// entirely outside collapses to zero size.
    pub fn clamp_to(&self, width: u32, height: u32) -> Region {
        let left = self.left.min(width);
        let top = self.top.min(height);
        let right = self.left.saturating_add(self.width).min(width);
        let bottom = self.top.saturating_add(self.height).min(height);
        Region {
            left,
            top,
            width: right.saturating_sub(left),
            height: bottom.saturating_sub(top),
        }
    }

    /// Parses `x,y,w,h` (commas or whitespace).
    pub fn parse(input: &str) -> Result<Region> {
        let parts: Vec<&str> = input
            .split(|ch: char| ch == ',' || ch.is_whitespace())
            .filter(|part| !part.is_empty())
            .collect();
        if parts.len() != 4 {
            return Err(anyhow!(
                "region must be four numbers 'left,top,width,height' (got '{}')",
                input.trim()
            ));
        }
        let mut values = [0u32; 4];
        for (slot, part) in values.iter_mut().zip(parts) {
            *slot = parse_coord(part)?;
        }
        Ok(Region::new(values[0], values[1], values[2], values[3]))
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.left, self.top, self.width, self.height
        )
    }
}

fn scale_coord(value: u32, scale: f64) -> u32 {
    let scaled = (value as f64 * scale).round();
    if scaled <= 0.0 {
        0
    } else if scaled >= u32::MAX as f64 {
        u32::MAX
    } else {
        scaled as u32
    }
}

// Canvas coordinates arrive as floats; truncate like the drawing surface does.
fn parse_coord(raw: &str) -> Result<u32> {
    let value: f64 = raw
        .parse()
        .map_err(|_| anyhow!("invalid region coordinate '{}'", raw))?;
    if !value.is_finite() || value < 0.0 {
        return Err(anyhow!("region coordinate must be non-negative: '{}'", raw));
    }
    Ok(value.trunc().min(u32::MAX as f64) as u32)
}

pub fn validate_scale(scale: f64) -> Result<f64> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(anyhow!("scale must be a positive number (got {})", scale));
    }
    Ok(scale)
}

/// Crops `region` (already in source coordinates) out of `image`. The region
/// is clamped first; an empty result is a 0×0 image.
pub fn crop(image: &DynamicImage, region: &Region) -> DynamicImage {
    let (width, height) = image.dimensions();
    let clamped = region.clamp_to(width, height);
    if clamped.is_empty() {
        return DynamicImage::new_rgb8(0, 0);
    }
    image.crop_imm(clamped.left, clamped.top, clamped.width, clamped.height)
}
