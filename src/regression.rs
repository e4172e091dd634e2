// Closed-form least squares fits
//
// Every fit returns `None` when the input cannot determine a curve (fewer
// than two points, a zero denominator, a non-finite coefficient).

use crate::error::{EngineError, EngineResult};

/// Milliseconds in one day.
pub const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Polynomial degrees `polynomial` can solve.
pub const SUPPORTED_POLYNOMIAL_DEGREES: [usize; 2] = [1, 2];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A fitted curve.
pub trait Fit {
    fn predict(&self, x: f64) -> f64;

    /// Human-readable equation for display.
    fn equation(&self) -> String;

    fn predict_all(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|x| self.predict(*x)).collect()
    }
}

/// How the x axis of a linear fit was derived; only changes the equation text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinearScale {
    Numeric,
    Ordinal,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub scale: LinearScale,
}

impl LinearFit {
    /// Slope expressed per day, for timestamp fits.
    pub fn change_per_day(&self) -> f64 {
        self.slope * MILLIS_PER_DAY
    }
}

impl Fit for LinearFit {
    fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    fn equation(&self) -> String {
        match self.scale {
            LinearScale::Numeric => format!("y = {:.2}x + {:.2}", self.slope, self.intercept),
            LinearScale::Ordinal => format!("y = {:.1}x + {:.1}", self.slope, self.intercept),
            LinearScale::Timestamp => format!("y = {:.2e}x + {:.1}", self.slope, self.intercept),
        }
    }
}

/// `y = a + b ln(x)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogarithmicFit {
    pub a: f64,
    pub b: f64,
}

impl Fit for LogarithmicFit {
    fn predict(&self, x: f64) -> f64 {
        self.a + self.b * x.ln()
    }

    fn equation(&self) -> String {
        format!("y = {:.1} + {:.1} * ln(x)", self.a, self.b)
    }
}

// The x term of an equation fitted relative to `origin`.
fn shifted_x(origin: f64) -> String {
    if origin == 0.0 {
        "x".to_string()
    } else if origin < 0.0 {
        format!("(x + {})", -origin)
    } else {
        format!("(x - {})", origin)
    }
}

/// `y = a e^(b (x - origin))`
///
/// `origin` is the smallest fitted x, so `a` is the curve's value there and
/// large x (epoch milliseconds) never overflow the exponent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialFit {
    pub a: f64,
    pub b: f64,
    pub origin: f64,
    /// `None` when every y is identical.
    pub r_squared: Option<f64>,
}

impl Fit for ExponentialFit {
    fn predict(&self, x: f64) -> f64 {
        self.a * (self.b * (x - self.origin)).exp()
    }

    fn equation(&self) -> String {
        format!("y = {:.3} * e^({:.3}{})", self.a, self.b, shifted_x(self.origin))
    }
}

/// Polynomial in `x - origin`, coefficients lowest power first.
#[derive(Debug, Clone, PartialEq)]
pub struct PolynomialFit {
    pub coefficients: Vec<f64>,
    pub origin: f64,
}

impl PolynomialFit {
    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }
}

impl Fit for PolynomialFit {
    fn predict(&self, x: f64) -> f64 {
        let u = x - self.origin;
        // Horner
        self.coefficients.iter().rev().fold(0.0, |acc, c| acc * u + c)
    }

    fn equation(&self) -> String {
        let x = shifted_x(self.origin);
        match self.coefficients.as_slice() {
            [c, b, a] => format!("y = {:.3}{x}² + {:.3}{x} + {:.3}", a, b, c),
            [b, a] => format!("y = {:.3} + {:.3}{x}", b, a),
            other => format!("y = {:?}", other),
        }
    }
}

// Smallest x, the reference point of shifted fits.
fn min_x(points: &[Point]) -> f64 {
    points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min)
}

// (slope, intercept) of the least squares line. Works on centered values so
// large x (epoch milliseconds) keep their precision.
fn least_squares<I: IntoIterator<Item = (f64, f64)>>(pairs: I) -> Option<(f64, f64)> {
    let pairs: Vec<(f64, f64)> = pairs.into_iter().collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (sxx, sxy) = pairs.iter().fold((0.0, 0.0), |(sxx, sxy), (x, y)| {
        let dx = x - mean_x;
        (sxx + dx * dx, sxy + dx * (y - mean_y))
    });
    if sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    (slope.is_finite() && intercept.is_finite()).then_some((slope, intercept))
}

/// Least squares line through `points`.
pub fn linear(points: &[Point]) -> Option<LinearFit> {
    let (slope, intercept) = least_squares(points.iter().map(|p| (p.x, p.y)))?;
    Some(LinearFit {
        slope,
        intercept,
        scale: LinearScale::Numeric,
    })
}

/// Line through `values` against their index (0, 1, 2, ...). Gaps keep
/// their index but contribute no point.
pub fn linear_slope(values: &[Option<f64>]) -> Option<LinearFit> {
    let (slope, intercept) = least_squares(
        values
            .iter()
            .enumerate()
            .filter_map(|(i, y)| y.map(|y| (i as f64, y))),
    )?;
    Some(LinearFit {
        slope,
        intercept,
        scale: LinearScale::Ordinal,
    })
}

/// Line through `values` against epoch-millisecond `timestamps`.
pub fn linear_by_timestamp(values: &[f64], timestamps: &[f64]) -> Option<LinearFit> {
    let (slope, intercept) =
        least_squares(timestamps.iter().copied().zip(values.iter().copied()))?;
    Some(LinearFit {
        slope,
        intercept,
        scale: LinearScale::Timestamp,
    })
}

/// Fit `y = a + b ln(x)`. Needs every x to be positive.
pub fn logarithmic(points: &[Point]) -> Option<LogarithmicFit> {
    if points.iter().any(|p| p.x <= 0.0) {
        return None;
    }
    let (b, a) = least_squares(points.iter().map(|p| (p.x.ln(), p.y)))?;
    Some(LogarithmicFit { a, b })
}

/// Fit `y = a e^(b x)`.
///
/// # Errors
///
/// [`EngineError::InvalidInput`] when any y is zero or negative.
pub fn exponential(points: &[Point]) -> EngineResult<Option<ExponentialFit>> {
    if let Some(bad) = points.iter().find(|p| p.y <= 0.0) {
        return Err(EngineError::InvalidInput(format!(
            "exponential regression requires all y values to be positive, got {}",
            bad.y
        )));
    }

    let origin = min_x(points);
    let Some((b, ln_a)) = least_squares(points.iter().map(|p| (p.x - origin, p.y.ln()))) else {
        return Ok(None);
    };
    let a = ln_a.exp();
    if !a.is_finite() {
        return Ok(None);
    }

    let mut fit = ExponentialFit {
        a,
        b,
        origin,
        r_squared: None,
    };
    let n = points.len() as f64;
    let y_mean = points.iter().map(|p| p.y).sum::<f64>() / n;
    let (ss_res, ss_tot) = points.iter().fold((0.0, 0.0), |(res, tot), p| {
        (res + (p.y - fit.predict(p.x)).powi(2), tot + (p.y - y_mean).powi(2))
    });
    fit.r_squared = (ss_tot != 0.0).then(|| 1.0 - ss_res / ss_tot);

    Ok(Some(fit))
}

/// Least squares polynomial of `degree`.
///
/// # Errors
///
/// [`EngineError::UnsupportedDegree`] for anything outside
/// [`SUPPORTED_POLYNOMIAL_DEGREES`].
pub fn polynomial(points: &[Point], degree: usize) -> EngineResult<Option<PolynomialFit>> {
    match degree {
        1 => Ok(linear(points).map(|fit| PolynomialFit {
            coefficients: vec![fit.intercept, fit.slope],
            origin: 0.0,
        })),
        2 => Ok(quadratic(points)),
        other => Err(EngineError::UnsupportedDegree(other)),
    }
}

// Solves the 3x3 normal equations with Cramer's rule, in x shifted to start
// at zero so the power sums stay small.
fn quadratic(points: &[Point]) -> Option<PolynomialFit> {
    if points.len() < 3 {
        return None;
    }
    let origin = min_x(points);

    let mut s = [0.0f64; 5]; // sum of u^0..u^4
    let mut t = [0.0f64; 3]; // sum of y*u^0..y*u^2
    for p in points {
        let u = p.x - origin;
        let mut power = 1.0;
        for (i, slot) in s.iter_mut().enumerate() {
            *slot += power;
            if let Some(v) = t.get_mut(i) {
                *v += p.y * power;
            }
            power *= u;
        }
    }

    let matrix = [[s[0], s[1], s[2]], [s[1], s[2], s[3]], [s[2], s[3], s[4]]];
    let d = determinant3(&matrix);
    if d == 0.0 {
        return None;
    }

    let mut coefficients = Vec::with_capacity(3);
    for column in 0..3 {
        let mut replaced = matrix;
        for (row, values) in replaced.iter_mut().enumerate() {
            values[column] = t[row];
        }
        coefficients.push(determinant3(&replaced) / d);
    }

    coefficients
        .iter()
        .all(|c| c.is_finite())
        .then_some(PolynomialFit {
            coefficients,
            origin,
        })
}

fn determinant3(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(xs: &[f64], ys: &[f64]) -> Vec<Point> {
        xs.iter().zip(ys).map(|(x, y)| Point::new(*x, *y)).collect()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_linear_exact() {
        let fit = linear(&points(&[0.0, 1.0, 2.0, 3.0], &[1.0, 3.0, 5.0, 7.0])).unwrap();
        assert!(close(fit.slope, 2.0));
        assert!(close(fit.intercept, 1.0));
        assert_eq!(fit.equation(), "y = 2.00x + 1.00");
        assert_eq!(fit.predict_all(&[4.0]), vec![9.0]);
    }

    #[test]
    fn test_linear_degenerate() {
        assert!(linear(&points(&[1.0], &[1.0])).is_none());
        assert!(linear(&points(&[2.0, 2.0], &[1.0, 3.0])).is_none());
    }

    #[test]
    fn test_linear_slope_uses_index() {
        let fit = linear_slope(&[Some(5.0), Some(7.0), Some(9.0)]).unwrap();
        assert!(close(fit.slope, 2.0));
        assert!(close(fit.intercept, 5.0));
        assert_eq!(fit.equation(), "y = 2.0x + 5.0");

        let gapped = linear_slope(&[Some(5.0), None, Some(9.0)]).unwrap();
        assert!(close(gapped.slope, 2.0));
    }

    #[test]
    fn test_linear_by_timestamp() {
        let day = 86_400_000.0;
        let fit = linear_by_timestamp(&[1.0, 2.0, 3.0], &[0.0, day, 2.0 * day]).unwrap();
        assert!(close(fit.change_per_day(), 1.0));
        assert_eq!(fit.equation(), "y = 1.16e-8x + 1.0");
    }

    #[test]
    fn test_logarithmic() {
        let xs = [1.0, std::f64::consts::E, std::f64::consts::E.powi(2)];
        let fit = logarithmic(&points(&xs, &[2.0, 5.0, 8.0])).unwrap();
        assert!(close(fit.a, 2.0));
        assert!(close(fit.b, 3.0));
        assert_eq!(fit.equation(), "y = 2.0 + 3.0 * ln(x)");
        assert!(logarithmic(&points(&[0.0, 1.0], &[1.0, 2.0])).is_none());
    }

    #[test]
    fn test_exponential() {
        let xs = [0.0, 1.0, 2.0];
        let ys: Vec<f64> = xs.iter().map(|x: &f64| 2.0 * (0.5 * x).exp()).collect();
        let fit = exponential(&points(&xs, &ys)).unwrap().unwrap();
        assert!(close(fit.a, 2.0));
        assert!(close(fit.b, 0.5));
        assert!(close(fit.r_squared.unwrap(), 1.0));
        assert_eq!(fit.equation(), "y = 2.000 * e^(0.500x)");
    }

    #[test]
    fn test_exponential_rejects_non_positive() {
        let err = exponential(&points(&[0.0, 1.0], &[1.0, 0.0])).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
        assert!(exponential(&points(&[0.0, 1.0], &[-3.0, 2.0])).is_err());
    }

    #[test]
    fn test_quadratic_exact() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys: Vec<f64> = xs.iter().map(|x| 3.0 * x * x - 2.0 * x + 1.0).collect();
        let fit = polynomial(&points(&xs, &ys), 2).unwrap().unwrap();
        assert_eq!(fit.degree(), 2);
        assert!(close(fit.coefficients[0], 1.0));
        assert!(close(fit.coefficients[1], -2.0));
        assert!(close(fit.coefficients[2], 3.0));
        assert!(close(fit.predict(4.0), 41.0));
        assert_eq!(fit.equation(), "y = 3.000x² + -2.000x + 1.000");
    }

    #[test]
    fn test_quadratic_on_epoch_millis() {
        let start = 1_704_067_200_000.0;
        let xs: Vec<f64> = (0..10).map(|i| start + i as f64 * MILLIS_PER_DAY).collect();
        let ys: Vec<f64> = (0..10).map(|i| (i * i + 2 * i + 3) as f64).collect();
        let fit = polynomial(&points(&xs, &ys), 2).unwrap().unwrap();

        assert_eq!(fit.origin, start);
        for (x, y) in xs.iter().zip(&ys) {
            assert!((fit.predict(*x) - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_exponential_on_epoch_millis() {
        let start = 1_704_067_200_000.0;
        let xs: Vec<f64> = (0..10).map(|i| start + i as f64 * MILLIS_PER_DAY).collect();
        let ys: Vec<f64> = (0..10).map(|i| 100.0 * 1.1f64.powi(i)).collect();
        let fit = exponential(&points(&xs, &ys)).unwrap().unwrap();

        assert!(close(fit.a, 100.0));
        for (x, y) in xs.iter().zip(&ys) {
            assert!((fit.predict(*x) - y).abs() < 1e-6);
        }
        assert!(fit.equation().starts_with("y = 100.000 * e^(0.000(x - "));
    }

    #[test]
    fn test_shifted_equation() {
        let xs = [10.0, 11.0, 12.0];
        let ys: Vec<f64> = xs
            .iter()
            .map(|x| (x - 10.0) * (x - 10.0) + 2.0 * (x - 10.0) + 3.0)
            .collect();
        let fit = polynomial(&points(&xs, &ys), 2).unwrap().unwrap();
        assert_eq!(fit.equation(), "y = 1.000(x - 10)² + 2.000(x - 10) + 3.000");
    }

    #[test]
    fn test_polynomial_degrees() {
        let pts = points(&[0.0, 1.0, 2.0], &[1.0, 3.0, 5.0]);
        let fit = polynomial(&pts, 1).unwrap().unwrap();
        assert!(close(fit.coefficients[1], 2.0));
        assert_eq!(polynomial(&pts, 3), Err(EngineError::UnsupportedDegree(3)));
        assert!(polynomial(&pts[..2], 2).unwrap().is_none());
    }
}
