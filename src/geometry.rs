//! Small planar geometry kernels shared by the 2D builders.

use robust::Coord;

/// Twice the signed area of `(a, b, c)`, positive for a counter-clockwise turn.
///
/// Exact sign, using adaptive precision arithmetic.
#[inline]
pub fn orient2d(a: &[f64; 2], b: &[f64; 2], c: &[f64; 2]) -> f64 {
    robust::orient2d(
        Coord { x: a[0], y: a[1] },
        Coord { x: b[0], y: b[1] },
        Coord { x: c[0], y: c[1] },
    )
}

/// Circumcenter of a non-degenerate triangle.
pub fn circumcenter(a: &[f64; 2], b: &[f64; 2], c: &[f64; 2]) -> [f64; 2] {
    // Relative to `a` to keep the squared terms small.
    let (bx, by) = (b[0] - a[0], b[1] - a[1]);
    let (cx, cy) = (c[0] - a[0], c[1] - a[1]);
    let d = 2.0 * (bx * cy - by * cx);
    let b2 = bx * bx + by * by;
    let c2 = cx * cx + cy * cy;
    [
        a[0] + (cy * b2 - by * c2) / d,
        a[1] + (bx * c2 - cx * b2) / d,
    ]
}

#[inline]
pub fn distance_sq(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    dx * dx + dy * dy
}

/// Squared distance from `p` to the segment `a`-`b`.
pub fn segment_distance_sq(p: &[f64; 2], a: &[f64; 2], b: &[f64; 2]) -> f64 {
    let ex = b[0] - a[0];
    let ey = b[1] - a[1];
    let len2 = ex * ex + ey * ey;
    if len2 == 0.0 {
        return distance_sq(p, a);
    }
    let t = (((p[0] - a[0]) * ex + (p[1] - a[1]) * ey) / len2).clamp(0.0, 1.0);
    distance_sq(p, &[a[0] + t * ex, a[1] + t * ey])
}

/// Signed area of a closed ring, positive when counter-clockwise.
pub fn ring_signed_area(ring: &[[f64; 2]]) -> f64 {
    let n = ring.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..n {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[(i + 1) % n];
        area += xi * yj - xj * yi;
    }
    0.5 * area
}

/// Area weighted centroid of a closed ring together with its signed area.
///
/// Degenerate rings report the vertex average and zero area.
pub fn ring_centroid(ring: &[[f64; 2]]) -> ([f64; 2], f64) {
    let n = ring.len();
    if n == 0 {
        return ([0.0, 0.0], 0.0);
    }
    // Shift to the first vertex for accuracy far from the origin.
    let [ox, oy] = ring[0];
    let mut cx = 0.0;
    let mut cy = 0.0;
    let mut area = 0.0;
    for i in 0..n {
        let (xi, yi) = (ring[i][0] - ox, ring[i][1] - oy);
        let (xj, yj) = (ring[(i + 1) % n][0] - ox, ring[(i + 1) % n][1] - oy);
        let cross = xi * yj - xj * yi;
        area += cross;
        cx += (xi + xj) * cross;
        cy += (yi + yj) * cross;
    }
    if area.abs() < f64::EPSILON * f64::EPSILON {
        let sx: f64 = ring.iter().map(|p| p[0]).sum();
        let sy: f64 = ring.iter().map(|p| p[1]).sum();
        return ([sx / n as f64, sy / n as f64], 0.0);
    }
    let factor = 1.0 / (3.0 * area);
    ([ox + cx * factor, oy + cy * factor], 0.5 * area)
}

/// Exit point of the ray `origin + s * direction` (unit `direction`, `s >= 0`)
/// through the circle `(center, radius)`. `origin` must lie inside the circle.
pub fn ray_circle_exit(origin: &[f64; 2], direction: &[f64; 2], center: &[f64; 2], radius: f64) -> [f64; 2] {
    let wx = origin[0] - center[0];
    let wy = origin[1] - center[1];
    let b = wx * direction[0] + wy * direction[1];
    let c = wx * wx + wy * wy - radius * radius;
    let s = -b + (b * b - c).max(0.0).sqrt();
    [origin[0] + s * direction[0], origin[1] + s * direction[1]]
}

/// Point on the circle at polar angle `theta`.
#[inline]
pub fn circle_point(center: &[f64; 2], radius: f64, theta: f64) -> [f64; 2] {
    [center[0] + radius * theta.cos(), center[1] + radius * theta.sin()]
}

#[inline]
pub fn polar_angle(center: &[f64; 2], p: &[f64; 2]) -> f64 {
    (p[1] - center[1]).atan2(p[0] - center[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_orient2d_sign() {
        assert!(orient2d(&[0.0, 0.0], &[1.0, 0.0], &[0.0, 1.0]) > 0.0);
        assert!(orient2d(&[0.0, 0.0], &[0.0, 1.0], &[1.0, 0.0]) < 0.0);
        assert_eq!(orient2d(&[0.0, 0.0], &[1.0, 1.0], &[3.0, 3.0]), 0.0);
    }

    #[test]
    fn test_circumcenter() {
        let c = circumcenter(&[0.0, 0.0], &[2.0, 0.0], &[0.0, 2.0]);
        assert_relative_eq!(c[0], 1.0, epsilon = 1e-14);
        assert_relative_eq!(c[1], 1.0, epsilon = 1e-14);
        let far = circumcenter(&[1e6, 1e6], &[1e6 + 2.0, 1e6], &[1e6, 1e6 + 2.0]);
        assert_relative_eq!(far[0], 1e6 + 1.0, epsilon = 1e-8);
    }

    #[test]
    fn test_ring_area_and_centroid() {
        let square = [[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]];
        assert_relative_eq!(ring_signed_area(&square), 4.0);
        let mut reversed = square;
        reversed.reverse();
        assert_relative_eq!(ring_signed_area(&reversed), -4.0);
        let (c, a) = ring_centroid(&square);
        assert_relative_eq!(a, 4.0);
        assert_relative_eq!(c[0], 1.0);
        assert_relative_eq!(c[1], 1.0);
    }

    #[test]
    fn test_ray_circle_exit() {
        let p = ray_circle_exit(&[0.5, 0.0], &[1.0, 0.0], &[0.0, 0.0], 2.0);
        assert_relative_eq!(p[0], 2.0);
        assert_relative_eq!(p[1], 0.0);
        let q = ray_circle_exit(&[0.0, 0.0], &[0.0, -1.0], &[0.0, 0.0], 3.0);
        assert_relative_eq!(q[1], -3.0);
    }

    #[test]
    fn test_segment_distance() {
        assert_relative_eq!(segment_distance_sq(&[0.5, 1.0], &[0.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_relative_eq!(segment_distance_sq(&[2.0, 0.0], &[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }
}
