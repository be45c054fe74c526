//! RGBA <-> I420 (BT.601, limited range) conversion for the H.264 backends.
//!
//! Packed I420 layout: Y plane (w*h), then U and V planes (w/2 * h/2 each),
//! no row padding. Dimensions are rounded up to even; edge pixels are
//! replicated into the padding.

use crate::capture::frame::BYTES_PER_PIXEL;

/// Round a dimension up to the next even value.
#[inline]
pub fn even(v: u32) -> u32 {
    v + (v & 1)
}

/// Packed I420 size for a (padded) frame.
pub fn i420_len(width: u32, height: u32) -> usize {
    let (w, h) = (even(width) as usize, even(height) as usize);
    w * h + (w / 2) * (h / 2) * 2
}

#[inline]
fn clamp(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

#[inline]
fn luma(r: i32, g: i32, b: i32) -> u8 {
    clamp(16 + ((66 * r + 129 * g + 25 * b + 128) >> 8))
}

/// Convert RGBA8 to packed I420 at even-rounded dimensions.
pub fn rgba_to_i420(rgba: &[u8], width: u32, height: u32) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let (pw, ph) = (even(width) as usize, even(height) as usize);
    let mut out = vec![0u8; i420_len(width, height)];

    let pixel = |x: usize, y: usize| -> (i32, i32, i32) {
        let x = x.min(w.saturating_sub(1));
        let y = y.min(h.saturating_sub(1));
        let i = (y * w + x) * BYTES_PER_PIXEL;
        match rgba.get(i..i + 3) {
            Some(px) => (px[0] as i32, px[1] as i32, px[2] as i32),
            None => (0, 0, 0),
        }
    };

    let (y_plane, chroma) = out.split_at_mut(pw * ph);
    for y in 0..ph {
        for x in 0..pw {
            let (r, g, b) = pixel(x, y);
            y_plane[y * pw + x] = luma(r, g, b);
        }
    }

    let (cw, ch) = (pw / 2, ph / 2);
    let (u_plane, v_plane) = chroma.split_at_mut(cw * ch);
    for cy in 0..ch {
        for cx in 0..cw {
            let (mut r, mut g, mut b) = (0, 0, 0);
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                let (pr, pg, pb) = pixel(cx * 2 + dx, cy * 2 + dy);
                r += pr;
                g += pg;
                b += pb;
            }
            let (r, g, b) = (r / 4, g / 4, b / 4);
            u_plane[cy * cw + cx] = clamp(128 + ((-38 * r - 74 * g + 112 * b + 128) >> 8));
            v_plane[cy * cw + cx] = clamp(128 + ((112 * r - 94 * g - 18 * b + 128) >> 8));
        }
    }

    out
}

/// Convert packed I420 back to RGBA8, cropping to `width` x `height`.
pub fn i420_to_rgba(i420: &[u8], width: u32, height: u32, rgba: &mut [u8]) {
    let (w, h) = (width as usize, height as usize);
    let (pw, ph) = (even(width) as usize, even(height) as usize);
    let cw = pw / 2;
    let u_off = pw * ph;
    let v_off = u_off + cw * (ph / 2);
    if i420.len() < i420_len(width, height) || rgba.len() < w * h * BYTES_PER_PIXEL {
        return;
    }

    for y in 0..h {
        for x in 0..w {
            let c = i420[y * pw + x] as i32 - 16;
            let ci = (y / 2) * cw + x / 2;
            let d = i420[u_off + ci] as i32 - 128;
            let e = i420[v_off + ci] as i32 - 128;

            let o = (y * w + x) * BYTES_PER_PIXEL;
            rgba[o] = clamp((298 * c + 409 * e + 128) >> 8);
            rgba[o + 1] = clamp((298 * c - 100 * d - 208 * e + 128) >> 8);
            rgba[o + 2] = clamp((298 * c + 516 * d + 128) >> 8);
            rgba[o + 3] = 255;
        }
    }
}

/// Copy `rows` rows of `width` bytes between buffers with different strides.
pub fn copy_plane(src: &[u8], src_stride: usize, dst: &mut [u8], dst_stride: usize, width: usize, rows: usize) {
    if src_stride == width && dst_stride == width {
        let len = width * rows;
        if src.len() >= len && dst.len() >= len {
            dst[..len].copy_from_slice(&src[..len]);
            return;
        }
    }

    for r in 0..rows {
        let (s, d) = (r * src_stride, r * dst_stride);
        if s + width > src.len() || d + width > dst.len() {
            break;
        }
        dst[d..d + width].copy_from_slice(&src[s..s + width]);
    }
}
