//! Pixel layout conversion between capture, graph and display
//!
//! Capture devices deliver BGR, the graph consumes RGB, and display surfaces
//! expect BGR again. Live device frames are additionally mirrored so the
//! preview behaves like a mirror.

use crate::types::{Frame, PixelFormat};

/// Swap the red and blue channels in place
pub fn swap_red_blue(frame: &mut Frame) {
    for px in frame.data_mut().chunks_exact_mut(3) {
        px.swap(0, 2);
    }
    let swapped = frame.format().swapped();
    frame.set_format(swapped);
}

/// Convert a frame to `target` channel order, in place
///
/// No-op when the frame already has the requested layout.
pub fn convert_in_place(frame: &mut Frame, target: PixelFormat) {
    if frame.format() != target {
        swap_red_blue(frame);
    }
}

/// Mirror a frame around its vertical axis, in place
pub fn mirror_horizontal(frame: &mut Frame) {
    let bpp = frame.format().bytes_per_pixel();
    let stride = frame.stride();
    if stride == 0 {
        return;
    }
    for row in frame.data_mut().chunks_exact_mut(stride) {
        let pixels = row.len() / bpp;
        for i in 0..pixels / 2 {
            let j = pixels - 1 - i;
            for c in 0..bpp {
                row.swap(i * bpp + c, j * bpp + c);
            }
        }
    }
}

/// Prepare a captured frame for submission to the graph
///
/// Converts to `target` and mirrors when the frame comes from a live device.
pub fn prepare_for_graph(mut frame: Frame, target: PixelFormat, mirror: bool) -> Frame {
    convert_in_place(&mut frame, target);
    if mirror {
        mirror_horizontal(&mut frame);
    }
    frame
}
