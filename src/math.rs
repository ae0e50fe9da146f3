use nalgebra as na;
use num_traits::{Float, NumCast};

/// Solves the 8x8 linear system of a four point correspondence with `h33`
/// fixed to one. Returns `None` when the system is singular.
pub fn perspective_transform<T: na::RealField + Float>(
    src: &[na::Point2<T>; 4],
    dst: &[na::Point2<T>; 4],
) -> Option<na::Matrix3<T>> {
    let mut a = na::SMatrix::<T, 8, 8>::zeros();
    let mut b = na::SVector::<T, 8>::zeros();

    for i in 0..4 {
        let (x, y) = (src[i].x, src[i].y);
        let (u, v) = (dst[i].x, dst[i].y);

        a[(i, 0)] = x;
        a[(i, 1)] = y;
        a[(i, 2)] = T::one();
        a[(i, 6)] = -x * u;
        a[(i, 7)] = -y * u;
        b[i] = u;

        a[(i + 4, 3)] = x;
        a[(i + 4, 4)] = y;
        a[(i + 4, 5)] = T::one();
        a[(i + 4, 6)] = -x * v;
        a[(i + 4, 7)] = -y * v;
        b[i + 4] = v;
    }

    let h = a.lu().solve(&b)?;

    if h.iter().any(|x| !Float::is_finite(*x)) {
        return None;
    }

    Some(na::Matrix3::new(
        h[0],
        h[1],
        h[2],
        h[3],
        h[4],
        h[5],
        h[6],
        h[7],
        T::one(),
    ))
}

/// Inverse scaled so that `h33 == 1` whenever that element is usable.
pub fn inverse_homography<T: na::RealField + Float>(h: &na::Matrix3<T>) -> Option<na::Matrix3<T>> {
    let inv = h.try_inverse()?;
    let eps: T = NumCast::from(1e-12)?;
    let w = inv[(2, 2)];

    if Float::abs(w) > eps {
        Some(inv / w)
    } else {
        Some(inv)
    }
}

/// Homogeneous transform of a single point. `None` when the point maps to
/// infinity or the result is not finite.
#[inline]
pub fn transform_point<T: na::RealField + Float>(
    h: &na::Matrix3<T>,
    p: na::Point2<T>,
) -> Option<na::Point2<T>> {
    let v = h * na::Vector3::new(p.x, p.y, T::one());
    let eps: T = NumCast::from(1e-12)?;

    if !Float::is_finite(v.z) || Float::abs(v.z) < eps {
        return None;
    }

    let (x, y) = (v.x / v.z, v.y / v.z);

    if Float::is_finite(x) && Float::is_finite(y) {
        Some(na::Point2::new(x, y))
    } else {
        None
    }
}

#[inline]
pub fn is_collinear<T: na::RealField + Float>(
    a: &na::Point2<T>,
    b: &na::Point2<T>,
    c: &na::Point2<T>,
    eps: T,
) -> bool {
    let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);

    Float::abs(cross) <= eps
}

/// True if any three of the four points lie on one line (duplicates included).
pub fn has_collinear_triple<T: na::RealField + Float>(pts: &[na::Point2<T>; 4], eps: T) -> bool {
    const TRIPLES: [(usize, usize, usize); 4] = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];

    TRIPLES
        .iter()
        .any(|&(i, j, k)| is_collinear(&pts[i], &pts[j], &pts[k], eps))
}
