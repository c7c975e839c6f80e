use nalgebra::Vector3;
use std::f64::consts::PI;

/// Ratio of the kernel support radius to the smoothing length.
pub const SUPPORT_FACTOR: f64 = 2.0;

fn normalisation(h: f64, dimensions: usize) -> f64 {
    match dimensions {
        1 => 2.0 / (3.0 * h),
        2 => 10.0 / (7.0 * PI * h * h),
        _ => 1.0 / (PI * h * h * h),
    }
}

/// Cubic B-spline kernel `W(r, h)` with compact support `2h`.
pub fn cubic_spline(r: f64, h: f64, dimensions: usize) -> f64 {
    let q = r / h;
    let sigma = normalisation(h, dimensions);
    if q < 1.0 {
        sigma * (1.0 - 1.5 * q * q + 0.75 * q * q * q)
    } else if q < 2.0 {
        let t = 2.0 - q;
        sigma * 0.25 * t * t * t
    } else {
        0.0
    }
}

/// Radial derivative `dW/dr` of [`cubic_spline`].
pub fn cubic_spline_derivative(r: f64, h: f64, dimensions: usize) -> f64 {
    let q = r / h;
    let sigma = normalisation(h, dimensions) / h;
    if q < 1.0 {
        sigma * (-3.0 * q + 2.25 * q * q)
    } else if q < 2.0 {
        let t = 2.0 - q;
        -sigma * 0.75 * t * t
    } else {
        0.0
    }
}

/// Gradient of the kernel with respect to `x_i`, given `relative = x_i - x_j`.
pub fn cubic_spline_gradient(relative: &Vector3<f64>, h: f64, dimensions: usize) -> Vector3<f64> {
    let r = relative.norm();
    if r <= f64::EPSILON * h {
        return Vector3::zeros();
    }
    relative * (cubic_spline_derivative(r, h, dimensions) / r)
}
