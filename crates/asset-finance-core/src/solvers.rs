//! Derivative-free root finding on `Decimal`.
//!
//! - [`find_bracket`]: expands outward from an initial guess until the
//!   function changes sign, staying inside a closed domain
//! - [`brent`]: Brent's method (bisection, secant and inverse quadratic
//!   interpolation) on a bracketing interval
//!
//! Objective functions return `Option<Decimal>`: `None` marks a point where
//! the function is undefined or overflows the 96-bit mantissa. Every
//! intermediate step uses checked arithmetic so extreme inputs fall back to
//! bisection instead of panicking.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::AssetFinanceError;
use crate::AssetFinanceResult;

/// Default tolerance on the root.
pub const DEFAULT_TOLERANCE: Decimal = dec!(0.000000000001);

/// Default maximum iterations.
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;

/// Maximum outward steps taken by [`find_bracket`].
const MAX_BRACKET_STEPS: u32 = 60;

/// Configuration for root-finding algorithms.
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    /// Convergence tolerance on the root (and on an exact residual).
    pub tolerance: Decimal,
    /// Maximum number of iterations.
    pub max_iterations: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl SolverConfig {
    #[must_use]
    pub fn new(tolerance: Decimal, max_iterations: u32) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }
}

/// Result of a root-finding iteration.
#[derive(Debug, Clone, Copy)]
pub struct SolverResult {
    /// The root found.
    pub root: Decimal,
    /// Number of iterations used.
    pub iterations: u32,
    /// Function value at the root.
    pub residual: Decimal,
}

fn opposite_signs(x: Decimal, y: Decimal) -> bool {
    (x.is_sign_negative() && y.is_sign_positive() && !y.is_zero())
        || (x.is_sign_positive() && !x.is_zero() && y.is_sign_negative())
}

fn undefined_at(x: Decimal) -> AssetFinanceError {
    AssetFinanceError::InvalidInput {
        field: "objective".into(),
        reason: format!("function is undefined at {x}"),
    }
}

/// Search outward from `guess` for an interval `[a, b]` inside
/// `[lower, upper]` where `f` changes sign (or hits zero).
///
/// Steps start at 0.1 and double each round. Points where `f` is undefined
/// are skipped.
pub fn find_bracket<F>(
    f: F,
    guess: Decimal,
    lower: Decimal,
    upper: Decimal,
) -> Option<(Decimal, Decimal)>
where
    F: Fn(Decimal) -> Option<Decimal>,
{
    let guess = guess.max(lower).min(upper);
    let f_init = f(guess)?;
    if f_init.is_zero() {
        return Some((guess, guess));
    }

    let mut left = guess;
    let mut right = guess;
    let mut delta = dec!(0.1);

    for _ in 0..MAX_BRACKET_STEPS {
        left = (left - delta).max(lower);
        right = (right + delta).min(upper);

        if let Some(f_left) = f(left) {
            if f_left.is_zero() || opposite_signs(f_left, f_init) {
                return Some((left, guess));
            }
        }
        if let Some(f_right) = f(right) {
            if f_right.is_zero() || opposite_signs(f_right, f_init) {
                return Some((guess, right));
            }
        }

        if left == lower && right == upper {
            break;
        }
        delta = delta.checked_mul(dec!(2))?;
    }

    None
}

/// Inverse quadratic interpolation, or a secant step when two of the
/// ordinates coincide. `None` on degenerate geometry or overflow.
#[allow(clippy::many_single_char_names)]
fn interpolate(
    a: Decimal,
    b: Decimal,
    c: Decimal,
    fa: Decimal,
    fb: Decimal,
    fc: Decimal,
) -> Option<Decimal> {
    if fa != fc && fb != fc {
        let r = fb.checked_div(fc)?;
        let p = fa.checked_div(fc)?;
        let q = fa.checked_div(fb)?;
        let num = q
            .checked_mul(q.checked_sub(r)?)?
            .checked_mul(b - a)?
            .checked_add((Decimal::ONE.checked_sub(r)?).checked_mul(b - c)?.checked_mul(p)?)?;
        let den = (q.checked_sub(Decimal::ONE)?)
            .checked_mul(r.checked_sub(Decimal::ONE)?)?
            .checked_mul(p.checked_sub(Decimal::ONE)?)?;
        if den.is_zero() {
            return None;
        }
        b.checked_sub(num.checked_div(den)?)
    } else if fb != fa {
        let step = fb.checked_mul(b - a)?.checked_div(fb.checked_sub(fa)?)?;
        b.checked_sub(step)
    } else {
        None
    }
}

/// Brent's root-finding algorithm.
///
/// Requires `f(a)` and `f(b)` of opposite sign (or one of them zero).
#[allow(clippy::many_single_char_names)]
pub fn brent<F>(
    f: F,
    a: Decimal,
    b: Decimal,
    config: &SolverConfig,
) -> AssetFinanceResult<SolverResult>
where
    F: Fn(Decimal) -> Option<Decimal>,
{
    let mut a = a;
    let mut b = b;
    let mut fa = f(a).ok_or_else(|| undefined_at(a))?;
    let mut fb = f(b).ok_or_else(|| undefined_at(b))?;

    if fa.is_zero() {
        return Ok(SolverResult {
            root: a,
            iterations: 0,
            residual: fa,
        });
    }
    if fb.is_zero() {
        return Ok(SolverResult {
            root: b,
            iterations: 0,
            residual: fb,
        });
    }
    if !opposite_signs(fa, fb) {
        return Err(AssetFinanceError::InvalidInput {
            field: "bracket".into(),
            reason: format!("f({a}) = {fa} and f({b}) = {fb} have the same sign"),
        });
    }

    if fa.abs() < fb.abs() {
        std::mem::swap(&mut a, &mut b);
        std::mem::swap(&mut fa, &mut fb);
    }

    let two = dec!(2);
    let mut c = a;
    let mut fc = fa;
    let mut d = b - a;
    let mut e = d;

    for iteration in 0..config.max_iterations {
        if fb.abs() < config.tolerance || (b - a).abs() < config.tolerance {
            return Ok(SolverResult {
                root: b,
                iterations: iteration,
                residual: fb,
            });
        }

        let m = (a + b) / two;
        let accepted = interpolate(a, b, c, fa, fb, fc)
            .filter(|s| *s > m.min(b) && *s < m.max(b) && (*s - b).abs() < e.abs() / two);

        let s = match accepted {
            Some(s) => {
                e = d;
                d = s - b;
                s
            }
            None => {
                e = b - a;
                d = e;
                m
            }
        };

        // Move last best guess to c
        c = b;
        fc = fb;

        let fs = f(s).ok_or_else(|| undefined_at(s))?;
        if opposite_signs(fa, fs) {
            b = s;
            fb = fs;
        } else {
            a = s;
            fa = fs;
        }

        if fa.abs() < fb.abs() {
            std::mem::swap(&mut a, &mut b);
            std::mem::swap(&mut fa, &mut fb);
        }
    }

    Err(AssetFinanceError::ConvergenceFailure {
        function: "Brent".into(),
        iterations: config.max_iterations,
        last_delta: fb,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brent_square_root_of_two() {
        let f = |x: Decimal| Some(x * x - dec!(2));
        let result = brent(f, dec!(1), dec!(2), &SolverConfig::default()).unwrap();
        assert!(
            (result.root - dec!(1.41421356237)).abs() < dec!(0.00000000001),
            "root was {}",
            result.root
        );
    }

    #[test]
    fn test_brent_cubic() {
        let f = |x: Decimal| Some(x * x * x - x - dec!(2));
        let result = brent(f, dec!(1), dec!(2), &SolverConfig::default()).unwrap();
        assert!(result.residual.abs() < dec!(0.000000001));
    }

    #[test]
    fn test_brent_rejects_unbracketed_interval() {
        let f = |x: Decimal| Some(x * x + dec!(1));
        assert!(brent(f, dec!(-1), dec!(1), &SolverConfig::default()).is_err());
    }

    #[test]
    fn test_brent_exact_endpoint() {
        let f = |x: Decimal| Some(x - dec!(3));
        let result = brent(f, dec!(3), dec!(5), &SolverConfig::default()).unwrap();
        assert_eq!(result.root, dec!(3));
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn test_find_bracket_expands_to_the_right() {
        let f = |x: Decimal| Some(x - dec!(4.2));
        let (a, b) = find_bracket(f, dec!(0.1), dec!(-0.99), dec!(100)).unwrap();
        assert!(a <= dec!(4.2) && b >= dec!(4.2), "bracket ({a}, {b})");
    }

    #[test]
    fn test_find_bracket_respects_domain() {
        // Root lies outside [lower, upper]
        let f = |x: Decimal| Some(x - dec!(500));
        assert!(find_bracket(f, dec!(0.1), dec!(-0.99), dec!(100)).is_none());
    }

    #[test]
    fn test_find_bracket_skips_undefined_points() {
        let f = |x: Decimal| {
            if x < Decimal::ZERO {
                None
            } else {
                Some(x - dec!(0.35))
            }
        };
        let (a, b) = find_bracket(f, dec!(0.1), dec!(-0.99), dec!(100)).unwrap();
        let result = brent(f, a, b, &SolverConfig::default()).unwrap();
        assert!((result.root - dec!(0.35)).abs() < dec!(0.0000001));
    }
}
