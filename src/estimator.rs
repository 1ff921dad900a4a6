//! Cardinality estimation from the register histogram.
//!
//! This is the improved estimator of Ertl's "New cardinality estimation
//! algorithms for HyperLogLog sketches": instead of a harmonic mean over
//! every register, the estimate folds the 65-bucket rank histogram by
//! iterated halving and corrects the two tails with the `sigma` and `tau`
//! series. The cost is O(64 - p), independent of the register count.

use crate::histogram::Histogram;

/// Bias constant, the large-m limit 1/(2 ln 2) of the classic alpha series.
const ALPHA: f64 = 0.7213475;

pub(crate) fn estimate(histogram: &Histogram, p: u32) -> u64 {
    let m = (1u64 << p) as f64;

    let mut z = m * tau((m - histogram.count(p + 1) as f64) / m);
    for k in (1..=(64 - p)).rev() {
        z += histogram.count(k) as f64;
        z *= 0.5;
    }
    z += m * sigma(histogram.count(0) as f64 / m);

    (ALPHA * m * (m / z)).round() as u64
}

/// Tail correction for registers still at zero, evaluated at
/// `x = histogram[0] / m`. Diverges at `x = 1`, which drives the estimate
/// of an empty sketch to zero.
fn sigma(mut x: f64) -> f64 {
    if x == 1.0 {
        return f64::INFINITY;
    }

    let mut y = 1.0;
    let mut z = x;
    loop {
        x *= x;
        let z_prime = z;
        z += x * y;
        y += y;

        if z == z_prime {
            return z;
        }
    }
}

/// Tail correction for saturated registers, evaluated at
/// `x = (m - histogram[p + 1]) / m`.
fn tau(mut x: f64) -> f64 {
    if x == 0.0 || x == 1.0 {
        return 0.0;
    }

    let mut y = 1.0;
    let mut z = 1.0 - x;
    loop {
        x = x.sqrt();
        let z_prime = z;
        y *= 0.5;
        z -= (1.0 - x).powi(2) * y;

        if z == z_prime {
            return z / 3.0;
        }
    }
}

#[cfg(test)]
mod test {
    use super::{estimate, sigma, tau};
    use crate::histogram::Histogram;

    #[test]
    fn sigma_fixed_points() {
        assert_eq!(0.0, sigma(0.0));
        assert_eq!(f64::INFINITY, sigma(1.0));

        // sigma(x) >= x and finite inside the unit interval.
        for i in 1..10 {
            let x = i as f64 / 10.0;
            let s = sigma(x);
            assert!(s.is_finite());
            assert!(s >= x);
        }

        // First terms of the series at 1/2: 1/2 + 1/4 + 2/16 + 4/256 + ...
        assert!((sigma(0.5) - 0.8907).abs() < 1e-3);
    }

    #[test]
    fn tau_fixed_points() {
        assert_eq!(0.0, tau(0.0));
        assert_eq!(0.0, tau(1.0));

        for i in 1..10 {
            let x = i as f64 / 10.0;
            let t = tau(x);
            assert!(t.is_finite());
            assert!(t > 0.0);
            assert!(t < 1.0);
        }
    }

    #[test]
    fn empty_histogram_estimates_zero() {
        let histogram = Histogram::new(1 << 14);
        assert_eq!(0, estimate(&histogram, 14));
    }

    #[test]
    fn estimate_grows_with_filled_registers() {
        let mut histogram = Histogram::new(1 << 12);
        let mut last = 0;

        for step in 1..=8 {
            for _ in 0..32 {
                histogram.transfer(0, 1);
            }
            let current = estimate(&histogram, 12);
            assert!(current > last, "step {step}: {current} <= {last}");
            last = current;
        }
    }
}
