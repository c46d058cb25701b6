//! Integer money arithmetic.
//!
//! Amounts are counts of the smallest currency unit. Unsigned where a value can
//! never be negative (prices, costs, discounts), signed where direction matters.

use crate::error::{DomainError, DomainResult};

/// `quantity * unit`, rejecting overflow.
pub fn line_amount(quantity: u64, unit: u64) -> DomainResult<u64> {
    quantity
        .checked_mul(unit)
        .ok_or_else(|| DomainError::overflow("line amount"))
}

/// Sum of unsigned amounts, rejecting overflow.
pub fn checked_sum<I>(amounts: I) -> DomainResult<u64>
where
    I: IntoIterator<Item = u64>,
{
    amounts.into_iter().try_fold(0u64, |acc, a| {
        acc.checked_add(a).ok_or_else(|| DomainError::overflow("sum"))
    })
}

/// Convert an unsigned amount to a signed one.
pub fn signed(amount: u64) -> DomainResult<i64> {
    i64::try_from(amount).map_err(|_| DomainError::overflow("amount"))
}

/// Spread `total` over `weights` proportionally.
///
/// Uses the largest-remainder method so the parts always sum to exactly
/// `total`; ties go to the earliest weight. A zero total yields zeros. A
/// non-zero total with all-zero weights is rejected.
pub fn allocate(total: u64, weights: &[u64]) -> DomainResult<Vec<u64>> {
    if total == 0 {
        return Ok(vec![0; weights.len()]);
    }

    let weight_sum: u128 = weights.iter().map(|w| u128::from(*w)).sum();
    if weight_sum == 0 {
        return Err(DomainError::validation(
            "cannot allocate an amount over zero weights",
        ));
    }

    let total = u128::from(total);
    let mut parts = Vec::with_capacity(weights.len());
    let mut remainders = Vec::with_capacity(weights.len());
    let mut allocated: u128 = 0;

    for (idx, w) in weights.iter().enumerate() {
        let scaled = total * u128::from(*w);
        let part = scaled / weight_sum;
        allocated += part;
        parts.push(part);
        remainders.push((scaled % weight_sum, idx));
    }

    // Stable sort keeps earlier indices first among equal remainders.
    remainders.sort_by(|a, b| b.0.cmp(&a.0));
    let leftover = (total - allocated) as usize;
    for (_, idx) in remainders.into_iter().take(leftover) {
        parts[idx] += 1;
    }

    parts
        .into_iter()
        .map(|p| u64::try_from(p).map_err(|_| DomainError::overflow("allocation")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_splits_by_weight() {
        assert_eq!(allocate(100, &[300, 100]).unwrap(), vec![75, 25]);
    }

    #[test]
    fn allocate_hands_out_remainder_to_largest_fractions() {
        // 10 over three equal weights: 3.33 each, first index wins the leftover.
        assert_eq!(allocate(10, &[1, 1, 1]).unwrap(), vec![4, 3, 3]);
        // 7 over [1, 2]: 2.33 and 4.67, the larger fraction wins.
        assert_eq!(allocate(7, &[1, 2]).unwrap(), vec![2, 5]);
    }

    #[test]
    fn allocate_zero_weights() {
        assert_eq!(allocate(0, &[0, 0]).unwrap(), vec![0, 0]);
        assert!(matches!(
            allocate(5, &[0, 0]),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn line_amount_rejects_overflow() {
        assert_eq!(line_amount(3, 250).unwrap(), 750);
        assert!(line_amount(u64::MAX, 2).is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Parts always add back up to the allocated total.
            #[test]
            fn allocation_is_exact(
                total in 0u64..10_000_000,
                weights in proptest::collection::vec(1u64..1_000_000, 1..12)
            ) {
                let parts = allocate(total, &weights).unwrap();
                prop_assert_eq!(parts.len(), weights.len());
                prop_assert_eq!(parts.iter().sum::<u64>(), total);
            }

            /// No part strays more than one unit from its exact share.
            #[test]
            fn allocation_is_proportional(
                total in 0u64..10_000_000,
                weights in proptest::collection::vec(1u64..1_000_000, 1..12)
            ) {
                let parts = allocate(total, &weights).unwrap();
                let weight_sum: u128 = weights.iter().map(|w| u128::from(*w)).sum();
                for (part, w) in parts.iter().zip(&weights) {
                    let floor = u128::from(total) * u128::from(*w) / weight_sum;
                    prop_assert!(u128::from(*part) == floor || u128::from(*part) == floor + 1);
                }
            }
        }
    }
}
