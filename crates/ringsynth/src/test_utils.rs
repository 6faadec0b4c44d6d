//! Shared helpers for image- and scene-based unit tests.

use image::{GrayImage, Luma};
use nalgebra::Point3;

use crate::ellipse::Ellipse;
use crate::scene::BoundingInfo;

/// Rasterize a filled ellipse: pixels whose centers fall inside are 255.
pub(crate) fn draw_ellipse_mask(w: u32, h: u32, ellipse: &Ellipse) -> GrayImage {
    let mut img = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            if ellipse.contains(x as f64, y as f64) {
                img.put_pixel(x, y, Luma([255]));
            }
        }
    }
    img
}

/// Unit cube centered at the origin; table plane at z = −0.5.
pub(crate) fn unit_box() -> BoundingInfo {
    BoundingInfo::from_aabb(Point3::new(-0.5, -0.5, -0.5), Point3::new(0.5, 0.5, 0.5))
}
