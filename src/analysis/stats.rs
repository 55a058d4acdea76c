//! Series statistics for the correlation analyzer.

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n − 1 denominator).
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let squared: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((squared / (values.len() - 1) as f64).sqrt())
}

/// Z-score normalize a series. Undefined when the series has zero variance
/// or fewer than two points.
pub fn zscore(values: &[f64]) -> Option<Vec<f64>> {
    let m = mean(values)?;
    let sd = sample_std(values)?;
    if sd == 0.0 {
        return None;
    }
    Some(values.iter().map(|v| (v - m) / sd).collect())
}

/// Pearson correlation coefficient. Undefined for mismatched lengths, fewer
/// than two points, or a zero-variance series.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs)?;
    let my = mean(ys)?;

    let mut covariance = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mx;
        let dy = y - my;
        covariance += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(covariance / (var_x * var_y).sqrt())
}
