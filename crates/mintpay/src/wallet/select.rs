//! Proof selection
//!
//! Picks which held proofs to spend toward a target amount. This is a
//! heuristic that keeps the spent-proof count small, not an optimal
//! subset-sum solver: exact covers are preferred, then the smallest single
//! proof that overpays.

use ecash::{Amount, Proofs, ProofsMethods};

/// Partition of held proofs into those to spend and those to keep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofSelection {
    /// Proofs covering the target
    pub send: Proofs,
    /// Everything else
    pub keep: Proofs,
}

impl ProofSelection {
    fn keep_all(proofs: Proofs) -> Self {
        Self {
            send: Vec::new(),
            keep: proofs,
        }
    }
}

/// Select proofs covering `target`.
///
/// Greedy largest-first over proofs that still fit the remaining target;
/// when nothing fits, the smallest single proof larger than the remainder
/// is taken instead (overpay rather than fail). When the held proofs cannot
/// cover the target at all, `send` comes back empty and everything stays in
/// `keep`.
///
/// The returned selection is always a partition of the input: every proof
/// ends up in exactly one of `send` and `keep`.
pub fn select_proofs(proofs: Proofs, target: Amount) -> ProofSelection {
    if target == Amount::ZERO {
        return ProofSelection::keep_all(proofs);
    }

    let total = match proofs.total_amount() {
        Ok(total) => total,
        Err(_) => return ProofSelection::keep_all(proofs),
    };
    if total < target {
        return ProofSelection::keep_all(proofs);
    }

    let mut available = proofs;
    available.sort();

    let mut send = Proofs::new();
    let mut remaining = target;

    while remaining > Amount::ZERO {
        // Largest proof that does not overshoot the remainder
        let fitting = available
            .iter()
            .rposition(|proof| proof.amount <= remaining);

        let index = match fitting {
            Some(index) => index,
            None => {
                // Nothing fits; overpay with the smallest proof that covers
                // the remainder. One must exist since total >= target.
                match available.iter().position(|proof| proof.amount > remaining) {
                    Some(index) => {
                        send.push(available.remove(index));
                        break;
                    }
                    None => break,
                }
            }
        };

        let proof = available.remove(index);
        remaining = remaining
            .checked_sub(proof.amount)
            .unwrap_or(Amount::ZERO);
        send.push(proof);
    }

    ProofSelection {
        send,
        keep: available,
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use ecash::{Id, Proof, Secret, SecretKey};

    use super::*;

    fn proofs_with_amounts(amounts: &[u64]) -> Proofs {
        let keyset_id = Id::from_str("009a1f293253e41e").unwrap();
        amounts
            .iter()
            .map(|amount| {
                Proof::new(
                    Amount::from(*amount),
                    keyset_id,
                    Secret::generate(),
                    SecretKey::generate().public_key(),
                )
            })
            .collect()
    }

    fn amounts(proofs: &Proofs) -> Vec<u64> {
        let mut amounts: Vec<u64> = proofs.iter().map(|p| p.amount.into()).collect();
        amounts.sort();
        amounts
    }

    #[test]
    fn test_exact_cover_preferred() {
        // Holding [1,2,4,8], sending 5 spends exactly [1,4]
        let selection = select_proofs(proofs_with_amounts(&[1, 2, 4, 8]), Amount::from(5));

        assert_eq!(amounts(&selection.send), vec![1, 4]);
        assert_eq!(amounts(&selection.keep), vec![2, 8]);
    }

    #[test]
    fn test_overpay_fallback() {
        // No subset of [4,4] sums to 5; overpay with a single extra proof
        let selection = select_proofs(proofs_with_amounts(&[4, 4]), Amount::from(5));

        assert_eq!(amounts(&selection.send), vec![4, 4]);
        let send_total = selection.send.total_amount().unwrap();
        assert!(send_total >= Amount::from(5));
    }

    #[test]
    fn test_single_larger_proof_overpays() {
        let selection = select_proofs(proofs_with_amounts(&[2, 64]), Amount::from(5));

        assert_eq!(amounts(&selection.send), vec![2, 64]);
    }

    #[test]
    fn test_uncoverable_keeps_everything() {
        let proofs = proofs_with_amounts(&[1, 2]);
        let selection = select_proofs(proofs.clone(), Amount::from(64));

        assert!(selection.send.is_empty());
        assert_eq!(selection.keep.len(), proofs.len());
    }

    #[test]
    fn test_selection_is_a_partition() {
        let cases: &[(&[u64], u64)] = &[
            (&[1, 2, 4, 8, 16], 21),
            (&[3, 3, 3, 3], 7),
            (&[1, 1, 1, 128], 100),
            (&[64], 1),
            (&[2, 4], 6),
        ];

        for (held, target) in cases {
            let proofs = proofs_with_amounts(held);
            let total = proofs.total_amount().unwrap();
            let selection = select_proofs(proofs.clone(), Amount::from(*target));

            // No proof is lost or duplicated
            assert_eq!(
                selection.send.len() + selection.keep.len(),
                proofs.len(),
                "partition broken for {held:?} -> {target}"
            );
            let mut recombined = selection.send.clone();
            recombined.extend(selection.keep.clone());
            assert_eq!(recombined.total_amount().unwrap(), total);

            // A coverable target is covered
            if total >= Amount::from(*target) {
                assert!(
                    selection.send.total_amount().unwrap() >= Amount::from(*target),
                    "undercovered {held:?} -> {target}"
                );
            }
        }
    }

    #[test]
    fn test_zero_target_sends_nothing() {
        let selection = select_proofs(proofs_with_amounts(&[1, 2]), Amount::ZERO);
        assert!(selection.send.is_empty());
        assert_eq!(selection.keep.len(), 2);
    }
}
