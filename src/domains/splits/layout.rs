//! Pure size arithmetic for split groups.

use crate::domains::sessions::entity::DEFAULT_SPLIT_SIZE;

/// Accepted deviation from 1.0 for caller-provided layouts.
pub const LAYOUT_SUM_TOLERANCE: f64 = 1e-6;

pub const DETACHED_SIZE: f64 = DEFAULT_SPLIT_SIZE;

pub fn equal_share(member_count: usize) -> f64 {
    if member_count == 0 {
        return DETACHED_SIZE;
    }
    1.0 / member_count as f64
}

/// Validates caller-provided sizes and rescales them so they sum to 1.
pub fn normalize_sizes(sizes: &[f64]) -> Result<Vec<f64>, String> {
    if sizes.is_empty() {
        return Err("layout must contain at least one pane".to_string());
    }
    if let Some(bad) = sizes.iter().find(|s| !s.is_finite() || **s <= 0.0 || **s > 1.0) {
        return Err(format!("pane size {bad} is outside (0, 1]"));
    }
    let total: f64 = sizes.iter().sum();
    if (total - 1.0).abs() > LAYOUT_SUM_TOLERANCE {
        return Err(format!("pane sizes sum to {total}, expected 1"));
    }
    Ok(sizes.iter().map(|s| s / total).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_share_sums_to_one() {
        for n in 1..=12 {
            let total: f64 = (0..n).map(|_| equal_share(n)).sum();
            assert!((total - 1.0).abs() < 1e-9, "n={n} total={total}");
        }
    }

    #[test]
    fn normalize_accepts_near_one_and_rescales() {
        let sizes = normalize_sizes(&[0.3333333, 0.3333333, 0.3333334]).unwrap();
        let total: f64 = sizes.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn normalize_rejects_bad_layouts() {
        assert!(normalize_sizes(&[]).is_err());
        assert!(normalize_sizes(&[0.5, 0.4]).is_err());
        assert!(normalize_sizes(&[1.2, -0.2]).is_err());
        assert!(normalize_sizes(&[f64::NAN, 1.0]).is_err());
        assert!(normalize_sizes(&[0.0, 1.0]).is_err());
    }
}
