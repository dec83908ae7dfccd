//! Closed intervals used to filter records on each coordinate, and the three ways of deriving
//! one from a central value and a tolerance.

/// Closed interval `[lower, upper]`.
///
/// `lower <= upper` is not enforced; an inverted boundary contains nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boundary {
    pub lower: f64,
    pub upper: f64,
}

impl Boundary {

    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Inclusive on both ends
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    pub fn midpoint(&self) -> f64 {
        self.lower + (self.upper - self.lower) / 2.0
    }

    pub fn is_inverted(&self) -> bool {
        self.lower > self.upper
    }
}

/// `[mz - mz*ppm/1e6, mz + mz*ppm/1e6]`
pub fn mz_boundary(mz: f64, ppm: f64) -> Boundary {
    let offset = mz * ppm / 1_000_000.0;
    Boundary::new(mz - offset, mz + offset)
}

/// `[rt - offset, rt + offset]`
pub fn rt_boundary(rt: f64, offset: f64) -> Boundary {
    Boundary::new(rt - offset, rt + offset)
}

/// `[ook0 - ook0*tolerance, ook0 + ook0*tolerance]`
pub fn ook0_boundary(ook0: f64, tolerance: f64) -> Boundary {
    let offset = ook0 * tolerance;
    Boundary::new(ook0 - offset, ook0 + offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn mz_boundary_uses_parts_per_million() {
        let b = mz_boundary(1000.0, 50.0);
        assert_approx_eq!(b.lower, 999.95);
        assert_approx_eq!(b.upper, 1000.05);
        assert_approx_eq!(b.midpoint(), 1000.0);
    }

    #[test]
    fn rt_boundary_is_absolute() {
        let b = rt_boundary(250.0, 100.0);
        assert_approx_eq!(b.lower, 150.0);
        assert_approx_eq!(b.upper, 350.0);
    }

    #[test]
    fn ook0_boundary_is_fractional() {
        let b = ook0_boundary(0.9, 0.05);
        assert_approx_eq!(b.lower, 0.855);
        assert_approx_eq!(b.upper, 0.945);
    }

    #[test]
    fn contains_is_closed() {
        let b = Boundary::new(1.0, 2.0);
        assert!(b.contains(1.0));
        assert!(b.contains(2.0));
        assert!(b.contains(1.5));
        assert!(!b.contains(0.999));
        assert!(!b.contains(2.001));
    }

    #[test]
    fn inverted_boundary_contains_nothing() {
        // negative centre values flip the ppm and ratio derivations
        let b = mz_boundary(-1005.0, 50.0);
        assert!(b.is_inverted());
        assert!(!b.contains(-1005.0));

        let b = Boundary::new(2.0, 1.0);
        assert!(!b.contains(1.5));
    }

    #[test]
    fn zero_tolerance_is_a_point() {
        let b = mz_boundary(1005.0, 0.0);
        assert_eq!(b.lower, 1005.0);
        assert_eq!(b.upper, 1005.0);
        assert!(b.contains(1005.0));
    }
}
