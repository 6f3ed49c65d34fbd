//! Per-pixel stages of the motion mask: difference, blur, threshold, dilate.

use image::{GrayImage, Luma};

/// Absolute per-pixel difference. Both images must have the same dimensions.
pub fn abs_diff(a: &GrayImage, b: &GrayImage) -> GrayImage {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let raw = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&x, &y)| x.abs_diff(y))
        .collect();
    GrayImage::from_raw(a.width(), a.height(), raw).unwrap_or_else(|| GrayImage::new(0, 0))
}

/// Mirror an out-of-range index back into `0..len` without repeating the edge
/// pixel (`dcb|abcd|cba`).
fn reflect_101(index: i64, len: i64) -> usize {
    if len <= 1 {
        return 0;
    }
    let mut i = index;
    loop {
        if i < 0 {
            i = -i;
        } else if i >= len {
            i = 2 * len - 2 - i;
        } else {
            return i as usize;
        }
    }
}

/// Normalised `size` x `size` box filter with the anchor at `size / 2`.
///
/// Even kernels reach one pixel further before the anchor than after it.
/// Borders are reflected (reflect-101) and the average is rounded.
pub fn box_blur(image: &GrayImage, size: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if size <= 1 || width == 0 || height == 0 {
        return image.clone();
    }
    let w = width as usize;
    let h = height as usize;
    let before = i64::from(size / 2);
    let offsets: Vec<i64> = (0..i64::from(size)).map(|k| k - before).collect();
    let src = image.as_raw();

    let mut rows = vec![0u32; w * h];
    for y in 0..h {
        let line = &src[y * w..(y + 1) * w];
        for x in 0..w {
            rows[y * w + x] = offsets
                .iter()
                .map(|&dx| u32::from(line[reflect_101(x as i64 + dx, w as i64)]))
                .sum();
        }
    }

    let area = size * size;
    let mut out = GrayImage::new(width, height);
    for y in 0..h {
        for x in 0..w {
            let sum: u32 = offsets
                .iter()
                .map(|&dy| rows[reflect_101(y as i64 + dy, h as i64) * w + x])
                .sum();
            let value = (sum + area / 2) / area;
            out.put_pixel(x as u32, y as u32, Luma([value.min(255) as u8]));
        }
    }
    out
}

/// Binary mask: 255 where the pixel exceeds `level`, else 0.
pub fn threshold(image: &GrayImage, level: u8) -> GrayImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        pixel[0] = if pixel[0] > level { 255 } else { 0 };
    }
    out
}

/// 3x3 maximum filter applied `iterations` times. Pixels beyond the border
/// are ignored.
pub fn dilate(image: &GrayImage, iterations: u32) -> GrayImage {
    let mut current = image.clone();
    let (width, height) = current.dimensions();
    for _ in 0..iterations {
        let src = current;
        let mut out = GrayImage::new(width, height);
        for y in 0..height {
            let y0 = y.saturating_sub(1);
            let y1 = (y + 1).min(height - 1);
            for x in 0..width {
                let x0 = x.saturating_sub(1);
                let x1 = (x + 1).min(width - 1);
                let mut max = 0u8;
                for ny in y0..=y1 {
                    for nx in x0..=x1 {
                        max = max.max(src.get_pixel(nx, ny)[0]);
                    }
                }
                out.put_pixel(x, y, Luma([max]));
            }
        }
        current = out;
    }
    current
}
