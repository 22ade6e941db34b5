//! Per-pixel operations used by the built-in styles.
//!
//! All functions operate on contiguous RGB8 buffers in row-major order and
//! take pre-clamped regions, so no bounds checks beyond the loop ranges are
//! needed. Arithmetic saturates; nothing here can fault on valid inputs.

/// A clamped region: (x, y, width, height), guaranteed inside the frame.
pub type Rect = (u32, u32, u32, u32);

#[inline]
fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[inline]
fn idx(frame_width: u32, x: u32, y: u32) -> usize {
    ((y * frame_width + x) * 3) as usize
}

/// Blend a flat tint over the region: `out = orig * alpha + tint * beta`.
pub fn blend_tint(
    data: &mut [u8],
    frame_width: u32,
    rect: Rect,
    tint: [u8; 3],
    alpha: f32,
    beta: f32,
) {
    let (rx, ry, rw, rh) = rect;
    for y in ry..ry + rh {
        for x in rx..rx + rw {
            let i = idx(frame_width, x, y);
            for c in 0..3 {
                data[i + c] = clamp_u8(data[i + c] as f32 * alpha + tint[c] as f32 * beta);
            }
        }
    }
}

/// Box-blur the region in place with the given radius, reading from a copy
/// so the blur is independent of evaluation order.
pub fn box_blur_region(data: &mut [u8], frame_width: u32, frame_height: u32, rect: Rect, radius: u32) {
    let (rx, ry, rw, rh) = rect;
    let src = data.to_vec();
    let r = radius as i64;

    for y in ry..ry + rh {
        for x in rx..rx + rw {
            let mut sum = [0u32; 3];
            let mut count = 0u32;
            for dy in -r..=r {
                for dx in -r..=r {
                    let sx = x as i64 + dx;
                    let sy = y as i64 + dy;
                    if sx < 0 || sy < 0 || sx >= frame_width as i64 || sy >= frame_height as i64 {
                        continue;
                    }
                    let i = idx(frame_width, sx as u32, sy as u32);
                    for c in 0..3 {
                        sum[c] += src[i + c] as u32;
                    }
                    count += 1;
                }
            }
            let i = idx(frame_width, x, y);
            for c in 0..3 {
                data[i + c] = (sum[c] / count) as u8;
            }
        }
    }
}

/// Darken pixels inside the region whose Sobel gradient magnitude (on
/// luminance, computed from a pre-blur copy) exceeds `threshold`.
pub fn emphasize_edges(
    data: &mut [u8],
    frame_width: u32,
    frame_height: u32,
    rect: Rect,
    threshold: f32,
) {
    let (rx, ry, rw, rh) = rect;
    let src = data.to_vec();

    let luma = |x: i64, y: i64| -> f32 {
        let x = x.clamp(0, frame_width as i64 - 1) as u32;
        let y = y.clamp(0, frame_height as i64 - 1) as u32;
        let i = idx(frame_width, x, y);
        0.299 * src[i] as f32 + 0.587 * src[i + 1] as f32 + 0.114 * src[i + 2] as f32
    };

    for y in ry..ry + rh {
        for x in rx..rx + rw {
            let (xi, yi) = (x as i64, y as i64);
            let gx = luma(xi + 1, yi - 1) + 2.0 * luma(xi + 1, yi) + luma(xi + 1, yi + 1)
                - luma(xi - 1, yi - 1)
                - 2.0 * luma(xi - 1, yi)
                - luma(xi - 1, yi + 1);
            let gy = luma(xi - 1, yi + 1) + 2.0 * luma(xi, yi + 1) + luma(xi + 1, yi + 1)
                - luma(xi - 1, yi - 1)
                - 2.0 * luma(xi, yi - 1)
                - luma(xi + 1, yi - 1);
            if (gx * gx + gy * gy).sqrt() > threshold {
                let i = idx(frame_width, x, y);
                for c in 0..3 {
                    data[i + c] /= 2;
                }
            }
        }
    }
}

/// Whole-frame brightness/contrast: `out = in * gain + bias`, saturating.
pub fn brightness_contrast(data: &mut [u8], gain: f32, bias: f32) {
    for v in data.iter_mut() {
        *v = clamp_u8(*v as f32 * gain + bias);
    }
}

/// Whole-frame radial vignette: Gaussian falloff from the center, normalized
/// so the center is unattenuated; `out = in * (0.3 + 0.7 * mask)`.
pub fn vignette(data: &mut [u8], frame_width: u32, frame_height: u32) {
    let cx = (frame_width as f32 - 1.0) / 2.0;
    let cy = (frame_height as f32 - 1.0) / 2.0;
    let sigma_x = frame_width as f32 / 2.0;
    let sigma_y = frame_height as f32 / 2.0;

    for y in 0..frame_height {
        let fy = (y as f32 - cy) / sigma_y;
        for x in 0..frame_width {
            let fx = (x as f32 - cx) / sigma_x;
            let mask = (-0.5 * (fx * fx + fy * fy)).exp();
            let factor = 0.3 + 0.7 * mask;
            let i = idx(frame_width, x, y);
            for c in 0..3 {
                data[i + c] = clamp_u8(data[i + c] as f32 * factor);
            }
        }
    }
}

/// Whole-frame per-channel gain, saturating.
pub fn channel_gain(data: &mut [u8], gains: [f32; 3]) {
    for px in data.chunks_exact_mut(3) {
        for c in 0..3 {
            px[c] = clamp_u8(px[c] as f32 * gains[c]);
        }
    }
}

/// Unsharp composite within the region: `out = orig * 1.5 - blurred * 0.5`,
/// where `blurred` is a box blur of the original.
pub fn smooth_sharpen_region(data: &mut [u8], frame_width: u32, frame_height: u32, rect: Rect) {
    let (rx, ry, rw, rh) = rect;
    let orig = data.to_vec();
    box_blur_region(data, frame_width, frame_height, rect, 2);

    for y in ry..ry + rh {
        for x in rx..rx + rw {
            let i = idx(frame_width, x, y);
            for c in 0..3 {
                data[i + c] = clamp_u8(orig[i + c] as f32 * 1.5 - data[i + c] as f32 * 0.5);
            }
        }
    }
}
