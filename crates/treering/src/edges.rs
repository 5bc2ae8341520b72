//! Edge curves consumed by the pipeline, and a pixel-level reference provider.
//!
//! The pipeline only needs an [`EdgeMap`]: ordered point lists with gradient
//! directions. Any sub-pixel detector can produce one; [`detect_edge_curves`]
//! is a simple Canny-based provider so the crate works end to end.

use image::GrayImage;
use tracing::debug;

/// One edge sample.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EdgePoint {
    /// Position in image coordinates (pixels).
    pub xy: [f64; 2],
    /// Image gradient at the point.
    pub gradient: [f64; 2],
}

impl EdgePoint {
    pub fn new(xy: [f64; 2], gradient: [f64; 2]) -> Self {
        Self { xy, gradient }
    }
}

/// Ordered sequence of connected edge points.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EdgeCurve {
    pub points: Vec<EdgePoint>,
}

/// All edge curves of one image.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EdgeMap {
    /// Image size `[width, height]`.
    pub image_size: [u32; 2],
    pub curves: Vec<EdgeCurve>,
}

impl EdgeMap {
    pub fn new(image_size: [u32; 2], curves: Vec<EdgeCurve>) -> Self {
        Self { image_size, curves }
    }

    pub fn point_count(&self) -> usize {
        self.curves.iter().map(|c| c.points.len()).sum()
    }
}

/// Reference edge provider parameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EdgeDetectConfig {
    /// Gaussian pre-blur sigma; `0` disables blurring.
    pub sigma: f32,
    /// Canny hysteresis low threshold.
    pub low_threshold: f32,
    /// Canny hysteresis high threshold.
    pub high_threshold: f32,
    /// Curves with fewer linked pixels are dropped.
    pub min_curve_len: usize,
}

impl Default for EdgeDetectConfig {
    fn default() -> Self {
        Self {
            sigma: 1.5,
            low_threshold: 20.0,
            high_threshold: 50.0,
            min_curve_len: 5,
        }
    }
}

// 8-neighbourhood, axis neighbours first so straight runs are preferred.
const NEIGHBOURS: [(i32, i32); 8] = [
    (1, 0),
    (0, 1),
    (-1, 0),
    (0, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
    (1, -1),
];

/// Detect edges with Canny and link edge pixels into 8-connected curves.
///
/// Curves start at endpoints (pixels with at most one edge neighbour) in raster
/// order; pixels left over afterwards belong to closed loops, which are traced
/// from their first pixel and closed when the walk returns next to it.
pub fn detect_edge_curves(gray: &GrayImage, config: &EdgeDetectConfig) -> EdgeMap {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return EdgeMap::new([w, h], Vec::new());
    }

    let smoothed;
    let source = if config.sigma > 0.0 {
        smoothed = imageproc::filter::gaussian_blur_f32(gray, config.sigma);
        &smoothed
    } else {
        gray
    };
    let edges = imageproc::edges::canny(source, config.low_threshold, config.high_threshold);
    let gx = imageproc::gradients::horizontal_sobel(source);
    let gy = imageproc::gradients::vertical_sobel(source);

    let (wi, hi) = (w as i32, h as i32);
    let stride = w as usize;
    let active: Vec<bool> = edges.as_raw().iter().map(|&v| v > 0).collect();
    let mut visited = vec![false; active.len()];

    let neighbours = |x: i32, y: i32| {
        NEIGHBOURS.iter().filter_map(move |&(dx, dy)| {
            let (nx, ny) = (x + dx, y + dy);
            (nx >= 0 && ny >= 0 && nx < wi && ny < hi).then_some((nx, ny))
        })
    };
    let idx = |x: i32, y: i32| y as usize * stride + x as usize;

    let mut pixel_curves: Vec<Vec<(i32, i32)>> = Vec::new();
    for endpoints_only in [true, false] {
        for y in 0..hi {
            for x in 0..wi {
                let i = idx(x, y);
                if !active[i] || visited[i] {
                    continue;
                }
                if endpoints_only {
                    let degree = neighbours(x, y).filter(|&(nx, ny)| active[idx(nx, ny)]).count();
                    if degree > 1 {
                        continue;
                    }
                }

                let mut curve = vec![(x, y)];
                visited[i] = true;
                let (mut cx, mut cy) = (x, y);
                loop {
                    let next = neighbours(cx, cy).find(|&(nx, ny)| {
                        let j = idx(nx, ny);
                        active[j] && !visited[j]
                    });
                    let Some((nx, ny)) = next else {
                        break;
                    };
                    visited[idx(nx, ny)] = true;
                    curve.push((nx, ny));
                    (cx, cy) = (nx, ny);
                }
                let loops_back = !endpoints_only
                    && curve.len() > 2
                    && (cx - x).abs() <= 1
                    && (cy - y).abs() <= 1;
                if loops_back {
                    curve.push((x, y));
                }
                pixel_curves.push(curve);
            }
        }
    }

    let curves: Vec<EdgeCurve> = pixel_curves
        .into_iter()
        .filter(|c| c.len() >= config.min_curve_len)
        .map(|c| EdgeCurve {
            points: c
                .into_iter()
                .map(|(x, y)| {
                    let g = [
                        gx.get_pixel(x as u32, y as u32).0[0] as f64,
                        gy.get_pixel(x as u32, y as u32).0[0] as f64,
                    ];
                    EdgePoint::new([x as f64, y as f64], g)
                })
                .collect(),
        })
        .collect();

    debug!(
        curves = curves.len(),
        edge_pixels = active.iter().filter(|&&a| a).count(),
        "edge curves linked"
    );
    EdgeMap::new([w, h], curves)
}

/// Keep only edge points whose gradient is roughly radial with respect to
/// `center`, splitting curves where points are removed.
///
/// Both gradient polarities are accepted. Points with a zero gradient or
/// lying on the center are removed. Pieces shorter than two points are dropped.
pub fn filter_by_orientation(edges: &EdgeMap, center: [f64; 2], max_deviation_deg: f64) -> EdgeMap {
    let min_cos = max_deviation_deg.to_radians().cos();
    let keep = |p: &EdgePoint| {
        let r = [p.xy[0] - center[0], p.xy[1] - center[1]];
        let rn = r[0].hypot(r[1]);
        let gn = p.gradient[0].hypot(p.gradient[1]);
        if rn <= f64::EPSILON || gn <= f64::EPSILON {
            return false;
        }
        (r[0] * p.gradient[0] + r[1] * p.gradient[1]).abs() / (rn * gn) >= min_cos
    };

    let mut curves = Vec::new();
    for curve in &edges.curves {
        let mut piece = Vec::new();
        for p in &curve.points {
            if keep(p) {
                piece.push(*p);
            } else if !piece.is_empty() {
                curves.push(EdgeCurve {
                    points: std::mem::take(&mut piece),
                });
            }
        }
        if !piece.is_empty() {
            curves.push(EdgeCurve { points: piece });
        }
    }
    curves.retain(|c| c.points.len() >= 2);
    EdgeMap::new(edges.image_size, curves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::draw_ring_image;

    #[test]
    fn ring_image_yields_long_curves_near_the_ring() {
        let img = draw_ring_image(120, 120, [60.0, 60.0], &[35.0], 2.0);
        let map = detect_edge_curves(&img, &EdgeDetectConfig::default());
        assert_eq!(map.image_size, [120, 120]);
        assert!(!map.curves.is_empty());

        let longest = map.curves.iter().map(|c| c.points.len()).max().unwrap();
        assert!(longest > 40, "longest curve has {} points", longest);
        for c in &map.curves {
            for p in &c.points {
                let r = (p.xy[0] - 60.0).hypot(p.xy[1] - 60.0);
                assert!((r - 35.0).abs() < 6.0, "edge point at radius {}", r);
            }
        }
    }

    #[test]
    fn blank_image_has_no_curves() {
        let img = GrayImage::from_pixel(32, 32, image::Luma([128]));
        let map = detect_edge_curves(&img, &EdgeDetectConfig::default());
        assert!(map.curves.is_empty());
        assert_eq!(map.point_count(), 0);
    }

    #[test]
    fn orientation_filter_splits_at_tangential_points() {
        let radial = |x: f64| EdgePoint::new([x, 0.0], [1.0, 0.0]);
        let tangential = EdgePoint::new([5.0, 0.0], [0.0, 1.0]);
        let curve = EdgeCurve {
            points: vec![radial(2.0), radial(3.0), tangential, radial(6.0), radial(7.0), radial(8.0)],
        };
        let map = EdgeMap::new([10, 10], vec![curve]);
        let filtered = filter_by_orientation(&map, [0.0, 0.0], 30.0);
        let lens: Vec<usize> = filtered.curves.iter().map(|c| c.points.len()).collect();
        assert_eq!(lens, vec![2, 3]);
    }

    #[test]
    fn orientation_filter_accepts_both_polarities() {
        let curve = EdgeCurve {
            points: vec![
                EdgePoint::new([0.0, 4.0], [0.0, -2.0]),
                EdgePoint::new([0.0, 5.0], [0.1, 3.0]),
            ],
        };
        let map = EdgeMap::new([10, 10], vec![curve]);
        assert_eq!(filter_by_orientation(&map, [0.0, 0.0], 10.0).curves.len(), 1);
    }
}
