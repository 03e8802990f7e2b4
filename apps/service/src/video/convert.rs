//! RGB to I420 conversion for frames handed to the engine.

/// Convert packed RGB24 to a single I420 buffer (Y plane, then U, then V).
///
/// BT.601 coefficients; chroma is the average of each 2x2 block. Odd
/// trailing rows and columns are dropped from the chroma planes.
pub fn rgb_to_i420(rgb: &[u8], width: usize, height: usize) -> Vec<u8> {
    let luma = width * height;
    let chroma_width = width / 2;
    let chroma_height = height / 2;
    let chroma = chroma_width * chroma_height;

    let mut out = vec![0u8; luma + 2 * chroma];
    let (y_plane, uv) = out.split_at_mut(luma);
    let (u_plane, v_plane) = uv.split_at_mut(chroma);

    for (i, px) in rgb.chunks_exact(3).take(luma).enumerate() {
        let (r, g, b) = (px[0] as f32, px[1] as f32, px[2] as f32);
        y_plane[i] = (0.299 * r + 0.587 * g + 0.114 * b).clamp(0.0, 255.0) as u8;
    }

    for row in 0..chroma_height {
        for col in 0..chroma_width {
            let (mut r, mut g, mut b) = (0.0f32, 0.0f32, 0.0f32);
            for (dy, dx) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
                let idx = ((row * 2 + dy) * width + col * 2 + dx) * 3;
                r += rgb[idx] as f32;
                g += rgb[idx + 1] as f32;
                b += rgb[idx + 2] as f32;
            }
            let (r, g, b) = (r / 4.0, g / 4.0, b / 4.0);

            let at = row * chroma_width + col;
            u_plane[at] = (-0.169 * r - 0.331 * g + 0.500 * b + 128.0).clamp(0.0, 255.0) as u8;
            v_plane[at] = (0.500 * r - 0.419 * g - 0.081 * b + 128.0).clamp(0.0, 255.0) as u8;
        }
    }

    out
}
