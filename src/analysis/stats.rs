// ---------------------------------------------------------------------------
// Goodness-of-fit statistics
// ---------------------------------------------------------------------------

/// The statistics record for one aligned pair table.
///
/// When no mutually finite pair exists only the count survives; `gof` is
/// `None` rather than a block of sentinel NaNs, so "no overlap" is explicit
/// without being an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    /// Count of mutually finite pairs.
    pub n: usize,
    pub gof: Option<Gof>,
}

/// The goodness-of-fit scalars, defined whenever at least one pair exists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gof {
    /// mean(model − observed)
    pub bias: f64,
    /// mean(|model − observed|)
    pub mae: f64,
    /// sqrt(mean((model − observed)²))
    pub rmse: f64,
    /// Pearson correlation; NaN when n ≤ 1 or either side has zero variance.
    pub correlation: f64,
    /// correlation²; NaN when the correlation is NaN.
    pub r2: f64,
    /// Nash–Sutcliffe efficiency; NaN when the observations have zero
    /// variance.
    pub nse: f64,
}

impl Stats {
    /// Named (label, value) pairs for table display, in reporting order.
    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        let mut out = vec![("N", self.n as f64)];
        if let Some(g) = &self.gof {
            out.push(("Bias", g.bias));
            out.push(("MAE", g.mae));
            out.push(("RMSE", g.rmse));
            out.push(("Correlation", g.correlation));
            out.push(("R²", g.r2));
            out.push(("NSE", g.nse));
        }
        out
    }
}

/// Compute calibration/validation statistics over two equal-length arrays.
///
/// The mutually finite subset is selected here; callers need not pre-filter.
/// Slices of unequal length are truncated to the shorter one, though the
/// aligner never produces that.
pub fn calc_stats(model: &[f64], obs: &[f64]) -> Stats {
    let pairs: Vec<(f64, f64)> = model
        .iter()
        .zip(obs)
        .filter(|(m, o)| m.is_finite() && o.is_finite())
        .map(|(&m, &o)| (m, o))
        .collect();

    let n = pairs.len();
    if n == 0 {
        return Stats { n: 0, gof: None };
    }
    let nf = n as f64;

    let bias = pairs.iter().map(|(m, o)| m - o).sum::<f64>() / nf;
    let mae = pairs.iter().map(|(m, o)| (m - o).abs()).sum::<f64>() / nf;
    let rmse = (pairs.iter().map(|(m, o)| (m - o).powi(2)).sum::<f64>() / nf).sqrt();

    let mean_m = pairs.iter().map(|(m, _)| m).sum::<f64>() / nf;
    let mean_o = pairs.iter().map(|(_, o)| o).sum::<f64>() / nf;

    let correlation = if n <= 1 {
        f64::NAN
    } else {
        let cov: f64 = pairs
            .iter()
            .map(|(m, o)| (m - mean_m) * (o - mean_o))
            .sum();
        let var_m: f64 = pairs.iter().map(|(m, _)| (m - mean_m).powi(2)).sum();
        let var_o: f64 = pairs.iter().map(|(_, o)| (o - mean_o).powi(2)).sum();
        let denom = (var_m * var_o).sqrt();
        if denom > 0.0 {
            cov / denom
        } else {
            f64::NAN
        }
    };

    let r2 = if correlation.is_finite() {
        correlation * correlation
    } else {
        f64::NAN
    };

    let ss_res: f64 = pairs.iter().map(|(m, o)| (o - m).powi(2)).sum();
    let ss_obs: f64 = pairs.iter().map(|(_, o)| (o - mean_o).powi(2)).sum();
    let nse = if ss_obs > 0.0 {
        1.0 - ss_res / ss_obs
    } else {
        f64::NAN
    };

    Stats {
        n,
        gof: Some(Gof {
            bias,
            mae,
            rmse,
            correlation,
            r2,
            nse,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn identical_arrays_are_a_perfect_fit() {
        let x = [0.4, 0.8, 1.2, 0.9, 0.3];
        let s = calc_stats(&x, &x);
        assert_eq!(s.n, 5);
        let g = s.gof.unwrap();
        assert!(close(g.bias, 0.0));
        assert!(close(g.mae, 0.0));
        assert!(close(g.rmse, 0.0));
        assert!(close(g.correlation, 1.0));
        assert!(close(g.r2, 1.0));
        assert!(close(g.nse, 1.0));
    }

    #[test]
    fn empty_input_yields_count_only() {
        let s = calc_stats(&[], &[]);
        assert_eq!(s, Stats { n: 0, gof: None });
        assert_eq!(s.entries(), vec![("N", 0.0)]);
    }

    #[test]
    fn all_non_finite_yields_count_only() {
        let s = calc_stats(&[f64::NAN, f64::INFINITY], &[1.0, 2.0]);
        assert_eq!(s, Stats { n: 0, gof: None });
    }

    #[test]
    fn non_finite_pairs_are_filtered_not_fatal() {
        let model = [1.0, f64::NAN, 3.0];
        let obs = [1.1, 2.0, 2.9];
        let s = calc_stats(&model, &obs);
        assert_eq!(s.n, 2);
        // Bias over the surviving pairs: mean([-0.1, 0.1]) == 0.
        assert!(close(s.gof.unwrap().bias, 0.0));
    }

    #[test]
    fn two_row_bias() {
        // model [1.0, 3.0] vs obs [1.1, 2.9] after an inner join.
        let s = calc_stats(&[1.0, 3.0], &[1.1, 2.9]);
        assert_eq!(s.n, 2);
        assert!(close(s.gof.unwrap().bias, -0.05));
    }

    #[test]
    fn correlation_undefined_for_single_pair() {
        let s = calc_stats(&[1.0], &[1.2]);
        let g = s.gof.unwrap();
        assert_eq!(s.n, 1);
        assert!(close(g.bias, -0.2));
        assert!(g.correlation.is_nan());
        assert!(g.r2.is_nan());
    }

    #[test]
    fn constant_observations_leave_nse_undefined() {
        let s = calc_stats(&[1.0, 2.0, 3.0], &[2.0, 2.0, 2.0]);
        let g = s.gof.unwrap();
        assert!(g.nse.is_nan());
        assert!(g.correlation.is_nan()); // zero obs variance
        // Error statistics are still well-defined.
        assert!(close(g.bias, 0.0));
        assert!(close(g.mae, 2.0 / 3.0));
    }

    #[test]
    fn known_values() {
        let model = [2.0, 4.0, 6.0];
        let obs = [1.0, 4.0, 5.0];
        let s = calc_stats(&model, &obs);
        let g = s.gof.unwrap();
        assert!(close(g.bias, 2.0 / 3.0));
        assert!(close(g.mae, 2.0 / 3.0));
        assert!(close(g.rmse, (2.0f64 / 3.0).sqrt()));
        // NSE = 1 - (1+0+1) / ((1-10/3)^2 + (4-10/3)^2 + (5-10/3)^2)
        let mean_o: f64 = 10.0 / 3.0;
        let ss_obs = (1.0 - mean_o).powi(2) + (4.0 - mean_o).powi(2) + (5.0 - mean_o).powi(2);
        assert!(close(g.nse, 1.0 - 2.0 / ss_obs));
    }
}
