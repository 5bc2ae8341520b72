//! Synthetic edge curves and images shared by unit tests.

use std::f64::consts::TAU;

use image::{GrayImage, Luma};
use rand::Rng;

use crate::edges::{EdgeCurve, EdgeMap, EdgePoint};

/// Render dark concentric rings of half-width `half_width` on a light background.
pub(crate) fn draw_ring_image(
    w: u32,
    h: u32,
    center: [f64; 2],
    radii: &[f64],
    half_width: f64,
) -> GrayImage {
    let mut img = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let d = (x as f64 - center[0]).hypot(y as f64 - center[1]);
            let on_ring = radii.iter().any(|&r| (d - r).abs() <= half_width);
            img.put_pixel(x, y, Luma([if on_ring { 40 } else { 210 }]));
        }
    }
    img
}

fn radial_point(center: [f64; 2], r: f64, theta: f64) -> EdgePoint {
    let (s, c) = theta.sin_cos();
    EdgePoint::new([center[0] + r * c, center[1] + r * s], [c, s])
}

/// Counter-clockwise polyline between two angles (degrees), sampled every
/// `step_deg`. Both ends are included.
pub(crate) fn arc_curve(center: [f64; 2], r: f64, start_deg: f64, end_deg: f64, step_deg: f64) -> EdgeCurve {
    let n = ((end_deg - start_deg) / step_deg).round().max(1.0) as usize;
    let points = (0..=n)
        .map(|i| {
            let deg = start_deg + (end_deg - start_deg) * i as f64 / n as f64;
            radial_point(center, r, deg.to_radians())
        })
        .collect();
    EdgeCurve { points }
}

/// Full circle with `n_points` samples offset half a step from angle zero.
/// When `closed`, the first point is repeated at the end.
pub(crate) fn circle_curve(center: [f64; 2], r: f64, n_points: usize, closed: bool) -> EdgeCurve {
    let mut points: Vec<EdgePoint> = (0..n_points)
        .map(|i| radial_point(center, r, TAU * (i as f64 + 0.5) / n_points as f64))
        .collect();
    if closed {
        points.push(points[0]);
    }
    EdgeCurve { points }
}

/// Closed circle with radial jitter of amplitude `noise` pixels.
pub(crate) fn noisy_circle_curve<R: Rng>(
    rng: &mut R,
    center: [f64; 2],
    r: f64,
    n_points: usize,
    noise: f64,
) -> EdgeCurve {
    let mut points: Vec<EdgePoint> = (0..n_points)
        .map(|i| {
            let jitter = rng.gen_range(-noise..=noise);
            radial_point(center, r + jitter, TAU * (i as f64 + 0.5) / n_points as f64)
        })
        .collect();
    points.push(points[0]);
    EdgeCurve { points }
}

/// Edge map over a generous image containing `center`.
pub(crate) fn edge_map(curves: Vec<EdgeCurve>) -> EdgeMap {
    EdgeMap::new([1024, 1024], curves)
}
