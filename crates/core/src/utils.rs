//! Shared geometry helpers.
//!
//! Matrices use the PDF ordering (a, b, c, d, e, f) where the matrix is
//! | a b 0 |
//! | c d 0 |
//! | e f 1 |

/// A point (x, y).
pub type Point = (f64, f64);

/// A rectangle (x0, y0, x1, y1).
pub type Rect = (f64, f64, f64, f64);

/// A transformation matrix (a, b, c, d, e, f).
pub type Matrix = (f64, f64, f64, f64, f64, f64);

/// The identity matrix.
pub const MATRIX_IDENTITY: Matrix = (1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

/// Multiply two matrices: result = m1 x m0.
pub fn mult_matrix(m1: Matrix, m0: Matrix) -> Matrix {
    let (a1, b1, c1, d1, e1, f1) = m1;
    let (a0, b0, c0, d0, e0, f0) = m0;
    (
        a1 * a0 + b1 * c0,
        a1 * b0 + b1 * d0,
        c1 * a0 + d1 * c0,
        c1 * b0 + d1 * d0,
        e1 * a0 + f1 * c0 + e0,
        e1 * b0 + f1 * d0 + f0,
    )
}

/// Translate a matrix by a vector.
pub fn translate_matrix(m: Matrix, v: Point) -> Matrix {
    let (a, b, c, d, e, f) = m;
    let (x, y) = v;
    (a, b, c, d, x * a + y * c + e, x * b + y * d + f)
}

/// Apply a matrix to a point.
pub fn apply_matrix_pt(m: Matrix, v: Point) -> Point {
    let (a, b, c, d, e, f) = m;
    let (x, y) = v;
    (a * x + c * y + e, b * x + d * y + f)
}

/// Apply a matrix to a vector, ignoring translation.
pub fn apply_matrix_norm(m: Matrix, v: Point) -> Point {
    let (a, b, c, d, _, _) = m;
    let (x, y) = v;
    (a * x + c * y, b * x + d * y)
}

/// Read a matrix from a slice of six numbers.
pub fn matrix_from_slice(nums: &[f64]) -> Option<Matrix> {
    if nums.len() < 6 {
        return None;
    }
    Some((nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mult_identity() {
        let m = (2.0, 0.0, 0.0, 2.0, 5.0, 7.0);
        assert_eq!(mult_matrix(m, MATRIX_IDENTITY), m);
        assert_eq!(mult_matrix(MATRIX_IDENTITY, m), m);
    }

    #[test]
    fn test_apply_point() {
        let m = (1.0, 0.0, 0.0, 1.0, 10.0, 20.0);
        assert_eq!(apply_matrix_pt(m, (1.0, 2.0)), (11.0, 22.0));
    }
}
