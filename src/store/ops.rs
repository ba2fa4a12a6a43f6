//! Elementwise vector kernels.
//!
//! All kernels assume equal lengths; callers check sizes once at
//! construction so the hot loops stay branch-free.

/// `out = a * x + b * y`
pub fn linear_combo(out: &mut [f64], a: f64, x: &[f64], b: f64, y: &[f64]) {
    debug_assert_eq!(out.len(), x.len());
    debug_assert_eq!(out.len(), y.len());
    for ((o, &xi), &yi) in out.iter_mut().zip(x).zip(y) {
        *o = a * xi + b * yi;
    }
}

/// `out += a * x`
pub fn axpy(out: &mut [f64], a: f64, x: &[f64]) {
    debug_assert_eq!(out.len(), x.len());
    for (o, &xi) in out.iter_mut().zip(x) {
        *o += a * xi;
    }
}

/// `out *= a`
pub fn scale(out: &mut [f64], a: f64) {
    for o in out.iter_mut() {
        *o *= a;
    }
}

/// `out = x - y`
pub fn difference(out: &mut [f64], x: &[f64], y: &[f64]) {
    linear_combo(out, 1.0, x, -1.0, y);
}
