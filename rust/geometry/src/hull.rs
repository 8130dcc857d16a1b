// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 2D hull extraction
//!
//! Convex hull by monotone chain. The concave hull starts from the convex one
//! and digs every boundary edge longer than the threshold towards the nearest
//! interior point, as long as the loop stays simple and encloses every point.

use nalgebra::Point2;

use crate::contour::{orient2d, segments_intersect};
use crate::error::{Error, Result};

/// Interior candidates tried per long edge before giving up on it
const MAX_DIG_CANDIDATES: usize = 8;

/// Extract an ordered, counter-clockwise hull as indices into `points`.
///
/// `max_edge_length <= 0` yields the convex hull.
pub fn extract_hull(points: &[Point2<f64>], max_edge_length: f64) -> Result<Vec<usize>> {
    if points.len() < 3 {
        return Err(Error::HullConstruction(format!(
            "need at least 3 points, got {}",
            points.len()
        )));
    }

    let hull = if max_edge_length > 0.0 {
        concave_hull(points, max_edge_length)
    } else {
        convex_hull(points)
    };

    if hull.len() < 3 {
        return Err(Error::HullConstruction(format!(
            "hull has {} vertices, input is degenerate",
            hull.len()
        )));
    }
    Ok(hull)
}

/// Andrew's monotone chain. Collinear and duplicate points are dropped.
pub fn convex_hull(points: &[Point2<f64>]) -> Vec<usize> {
    let n = points.len();
    if n < 3 {
        return (0..n).collect();
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        points[a]
            .x
            .total_cmp(&points[b].x)
            .then(points[a].y.total_cmp(&points[b].y))
    });

    let mut hull: Vec<usize> = Vec::with_capacity(2 * n);

    // Lower chain
    for &i in &order {
        while hull.len() >= 2
            && orient2d(
                &points[hull[hull.len() - 2]],
                &points[hull[hull.len() - 1]],
                &points[i],
            ) <= 0.0
        {
            hull.pop();
        }
        hull.push(i);
    }

    // Upper chain
    let lower_len = hull.len() + 1;
    for &i in order.iter().rev().skip(1) {
        while hull.len() >= lower_len
            && orient2d(
                &points[hull[hull.len() - 2]],
                &points[hull[hull.len() - 1]],
                &points[i],
            ) <= 0.0
        {
            hull.pop();
        }
        hull.push(i);
    }

    // Last point repeats the first one
    hull.pop();
    hull
}

/// Concave ("digging") hull bounded by `max_edge_length`.
pub fn concave_hull(points: &[Point2<f64>], max_edge_length: f64) -> Vec<usize> {
    let mut hull = convex_hull(points);
    if hull.len() < 3 {
        return hull;
    }

    let max_sq = max_edge_length * max_edge_length;
    let mut on_hull = vec![false; points.len()];
    for &i in &hull {
        on_hull[i] = true;
    }

    loop {
        let mut changed = false;
        let mut i = 0;
        while i < hull.len() {
            let a = hull[i];
            let b = hull[(i + 1) % hull.len()];
            let edge_sq = (points[b] - points[a]).norm_squared();

            if edge_sq > max_sq {
                if let Some(k) = dig_edge(points, &hull, &on_hull, i, edge_sq) {
                    hull.insert(i + 1, k);
                    on_hull[k] = true;
                    changed = true;
                    // Re-examine the new edge (a, k) before moving on
                    continue;
                }
            }
            i += 1;
        }
        if !changed {
            break;
        }
    }

    hull
}

/// Find an interior point that can replace edge `hull[i] -> hull[i + 1]`.
fn dig_edge(
    points: &[Point2<f64>],
    hull: &[usize],
    on_hull: &[bool],
    i: usize,
    edge_sq: f64,
) -> Option<usize> {
    let a = hull[i];
    let b = hull[(i + 1) % hull.len()];
    let pa = &points[a];
    let pb = &points[b];
    let edge = pb - pa;

    // Interior points whose projection falls strictly inside the edge
    let mut candidates: Vec<(f64, usize)> = points
        .iter()
        .enumerate()
        .filter(|(k, _)| !on_hull[*k])
        .filter_map(|(k, p)| {
            let t = (p - pa).dot(&edge) / edge_sq;
            if t <= 0.0 || t >= 1.0 {
                return None;
            }
            let dist = orient2d(pa, pb, p).abs() / edge_sq.sqrt();
            Some((dist, k))
        })
        .collect();

    candidates.sort_by(|x, y| x.0.total_cmp(&y.0));

    candidates
        .into_iter()
        .take(MAX_DIG_CANDIDATES)
        .map(|(_, k)| k)
        .find(|&k| can_dig(points, hull, on_hull, i, k, edge_sq))
}

fn can_dig(
    points: &[Point2<f64>],
    hull: &[usize],
    on_hull: &[bool],
    i: usize,
    k: usize,
    edge_sq: f64,
) -> bool {
    let n = hull.len();
    let a = hull[i];
    let b = hull[(i + 1) % n];
    let (pa, pb, pk) = (&points[a], &points[b], &points[k]);

    // New edges must be strictly shorter, which also bounds the iteration
    if (pk - pa).norm_squared() >= edge_sq || (pb - pk).norm_squared() >= edge_sq {
        return false;
    }

    // New edges must not cross the rest of the loop
    for j in 0..n {
        let c = hull[j];
        let d = hull[(j + 1) % n];
        if c == a || c == b || d == a || d == b {
            continue;
        }
        let (pc, pd) = (&points[c], &points[d]);
        if segments_intersect(pa, pk, pc, pd) || segments_intersect(pk, pb, pc, pd) {
            return false;
        }
    }

    // The removed triangle must not strand another interior point outside
    let area = orient2d(pa, pk, pb);
    !points.iter().enumerate().any(|(m, p)| {
        if m == k || on_hull[m] {
            return false;
        }
        strictly_inside_triangle(p, pa, pk, pb, area)
    })
}

#[inline]
fn strictly_inside_triangle(
    p: &Point2<f64>,
    a: &Point2<f64>,
    b: &Point2<f64>,
    c: &Point2<f64>,
    area: f64,
) -> bool {
    if area == 0.0 {
        return false;
    }
    let s = area.signum();
    s * orient2d(a, b, p) > 0.0 && s * orient2d(b, c, p) > 0.0 && s * orient2d(c, a, p) > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contour::signed_area;
    use approx::assert_relative_eq;

    fn hull_area(points: &[Point2<f64>], hull: &[usize]) -> f64 {
        let loop_pts: Vec<_> = hull.iter().map(|&i| points[i]).collect();
        signed_area(&loop_pts)
    }

    fn l_shape_grid() -> Vec<Point2<f64>> {
        let mut pts = Vec::new();
        for i in 0..=4 {
            for j in 0..=4 {
                if i >= 3 && j >= 3 {
                    continue;
                }
                pts.push(Point2::new(i as f64, j as f64));
            }
        }
        pts
    }

    #[test]
    fn convex_hull_of_square_with_interior_points() {
        let pts = vec![
            Point2::new(0.0, 0.0),
            Point2::new(0.5, 0.5),
            Point2::new(1.0, 0.0),
            Point2::new(0.2, 0.7),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
            Point2::new(0.5, 0.0),
        ];
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 4);
        assert_relative_eq!(hull_area(&pts, &hull), 1.0);
    }

    #[test]
    fn convex_hull_is_counter_clockwise() {
        let pts = vec![
            Point2::new(0.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 0.0),
        ];
        let hull = extract_hull(&pts, 0.0).unwrap();
        assert!(hull_area(&pts, &hull) > 0.0);
    }

    #[test]
    fn concave_hull_follows_notch() {
        let pts = l_shape_grid();
        let convex = extract_hull(&pts, 0.0).unwrap();
        let concave = extract_hull(&pts, 1.5).unwrap();

        assert_relative_eq!(hull_area(&pts, &convex), 14.0, epsilon = 1e-12);
        let area = hull_area(&pts, &concave);
        assert!(area >= 12.0 - 1e-9 && area < 13.0, "area = {area}");
        assert!(concave.len() > convex.len());
    }

    #[test]
    fn concave_hull_with_large_threshold_is_convex() {
        let pts = l_shape_grid();
        let hull = extract_hull(&pts, 100.0).unwrap();
        assert_relative_eq!(hull_area(&pts, &hull), 14.0, epsilon = 1e-12);
    }

    #[test]
    fn collinear_input_fails() {
        let pts: Vec<_> = (0..6).map(|i| Point2::new(i as f64, 0.0)).collect();
        assert!(matches!(extract_hull(&pts, 0.0), Err(Error::HullConstruction(_))));
        assert!(matches!(extract_hull(&pts, 0.5), Err(Error::HullConstruction(_))));
    }

    #[test]
    fn too_few_points_fails() {
        let pts = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)];
        assert!(matches!(extract_hull(&pts, 0.0), Err(Error::HullConstruction(_))));
    }
}
