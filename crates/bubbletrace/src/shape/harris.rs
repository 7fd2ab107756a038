//! Harris cornerness response.

use image::{GrayImage, ImageBuffer, Luma};

/// Per-pixel Harris response `det(M) - k·trace(M)²`.
pub type ResponseMap = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Compute the Harris response of an 8-bit image with 3x3 Sobel derivatives
/// and a `block_size` x `block_size` structure-tensor window.
///
/// Derivatives are scaled by `1 / (4 · block_size · 255)` so responses are
/// comparable across block sizes and independent of the 0..255 range.
/// Window sums reflect at the border without repeating the edge pixel.
pub fn harris_response(img: &GrayImage, block_size: u32, k: f32) -> ResponseMap {
    let (w, h) = img.dimensions();
    let mut out = ResponseMap::new(w, h);
    if w == 0 || h == 0 {
        return out;
    }
    let block = block_size.max(1) | 1;
    let half = (block / 2) as i64;
    let scale = 1.0 / (4.0 * block as f32 * 255.0);

    let gx = imageproc::gradients::horizontal_sobel(img);
    let gy = imageproc::gradients::vertical_sobel(img);
    let n = (w * h) as usize;
    let mut xx = vec![0.0f32; n];
    let mut xy = vec![0.0f32; n];
    let mut yy = vec![0.0f32; n];
    for (i, (a, b)) in gx.as_raw().iter().zip(gy.as_raw().iter()).enumerate() {
        let dx = *a as f32 * scale;
        let dy = *b as f32 * scale;
        xx[i] = dx * dx;
        xy[i] = dx * dy;
        yy[i] = dy * dy;
    }

    let stride = w as usize;
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let (mut sxx, mut sxy, mut syy) = (0.0f32, 0.0f32, 0.0f32);
            for oy in -half..=half {
                let yy_i = reflect101(y + oy, h as i64);
                for ox in -half..=half {
                    let xx_i = reflect101(x + ox, w as i64);
                    let idx = yy_i * stride + xx_i;
                    sxx += xx[idx];
                    sxy += xy[idx];
                    syy += yy[idx];
                }
            }
            let det = sxx * syy - sxy * sxy;
            let tr = sxx + syy;
            out.put_pixel(x as u32, y as u32, Luma([det - k * tr * tr]));
        }
    }
    out
}

/// Mirror an index into `0..n` without duplicating the border sample.
#[inline]
fn reflect101(i: i64, n: i64) -> usize {
    if n == 1 {
        return 0;
    }
    let mut i = i;
    while i < 0 || i >= n {
        i = if i < 0 { -i } else { 2 * (n - 1) - i };
    }
    i as usize
}

/// Maximum response value (0.0 for an empty map).
pub fn max_response(map: &ResponseMap) -> f32 {
    map.as_raw().iter().copied().fold(0.0f32, f32::max)
}
