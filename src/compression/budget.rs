//! Token budget planning from a reduction fraction
//!
//! A reduction may be written as a decimal (`0.3`), a whole percentage
//! (`30`) or with a trailing percent sign (`30%`). The target is the current
//! total scaled by `1 - reduce_by`, rounded down.

use super::models::{total_tokens, Budget, Segment};
use thiserror::Error;

/// Token budget errors
#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("Malformed reduction value: {0:?}")]
    MalformedReduction(String),

    #[error("Reduction must be between 0% and 100%, got {0}")]
    ReductionOutOfRange(f64),
}

/// Parse a reduction fraction into `[0, 1]`
pub fn parse_reduction(raw: &str) -> Result<f64, BudgetError> {
    let trimmed = raw.trim();
    let malformed = || BudgetError::MalformedReduction(raw.to_string());

    let fraction = if let Some(percent) = trimmed.strip_suffix('%') {
        percent.trim().parse::<f64>().map_err(|_| malformed())? / 100.0
    } else {
        let value = trimmed.parse::<f64>().map_err(|_| malformed())?;
        if value > 1.0 {
            value / 100.0
        } else {
            value
        }
    };

    if !fraction.is_finite() {
        return Err(malformed());
    }
    if !(0.0..=1.0).contains(&fraction) {
        return Err(BudgetError::ReductionOutOfRange(fraction));
    }
    Ok(fraction)
}

/// Compute the budget for the given segments
pub fn plan_budget(segments: &[Segment], reduce_by: f64) -> Budget {
    let current_tokens = total_tokens(segments);
    Budget {
        current_tokens,
        target_tokens: target_for(current_tokens, reduce_by),
    }
}

/// Target token count after removing `reduce_by` of `current`
pub fn target_for(current: usize, reduce_by: f64) -> usize {
    let keep = (1.0 - reduce_by).clamp(0.0, 1.0);
    // Epsilon absorbs binary-fraction error, e.g. 20 * (1 - 0.3) = 13.999...
    ((current as f64 * keep) + 1e-9).floor() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::token_estimator::WordCounter;

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_reduction("0.30").unwrap(), 0.30);
        assert_eq!(parse_reduction("1").unwrap(), 1.0);
        assert_eq!(parse_reduction("0").unwrap(), 0.0);
    }

    #[test]
    fn test_parse_whole_percentage() {
        assert_eq!(parse_reduction("25").unwrap(), 0.25);
    }

    #[test]
    fn test_parse_percent_sign() {
        assert_eq!(parse_reduction("30%").unwrap(), 0.30);
        assert_eq!(parse_reduction(" 0.5% ").unwrap(), 0.005);
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(parse_reduction("abc"), Err(BudgetError::MalformedReduction(_))));
        assert!(matches!(parse_reduction(""), Err(BudgetError::MalformedReduction(_))));
        assert!(matches!(parse_reduction("NaN"), Err(BudgetError::MalformedReduction(_))));
    }

    #[test]
    fn test_parse_out_of_range() {
        assert!(matches!(parse_reduction("150%"), Err(BudgetError::ReductionOutOfRange(_))));
        assert!(matches!(parse_reduction("-0.2"), Err(BudgetError::ReductionOutOfRange(_))));
    }

    #[test]
    fn test_plan_budget() {
        let segments = vec![
            Segment::new(0, "a b c d e f g h i j", 0, &WordCounter),
            Segment::new(1, "k l m n o p q r s t", 20, &WordCounter),
        ];
        let budget = plan_budget(&segments, 0.3);
        assert_eq!(budget.current_tokens, 20);
        assert_eq!(budget.target_tokens, 14);
    }

    #[test]
    fn test_target_rounds_down() {
        assert_eq!(target_for(180, 0.3333), 120);
        assert_eq!(target_for(10, 0.0), 10);
        assert_eq!(target_for(10, 1.0), 0);
    }
}
