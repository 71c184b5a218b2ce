//! Counterbalancing of block target orders across participants.
//!
//! Every permutation of the stimulus indices is a candidate target order for
//! one sequence. Participants walk the permutations along the rows of a
//! Latin square, stacked with its mirrored and rolled variants so that the
//! first rows differ from each other as much as possible.

use tracing::warn;

/// All permutations of `0..n` in lexicographic order.
pub fn permutations(n: usize) -> Vec<Vec<usize>> {
    let mut current: Vec<usize> = (0..n).collect();
    let mut all = vec![current.clone()];
    while next_permutation(&mut current) {
        all.push(current.clone());
    }
    all
}

fn next_permutation(v: &mut [usize]) -> bool {
    if v.len() < 2 {
        return false;
    }
    let Some(i) = (0..v.len() - 1).rev().find(|&i| v[i] < v[i + 1]) else {
        return false;
    };
    let j = (i + 1..v.len()).rev().find(|&j| v[j] > v[i]).unwrap_or(i + 1);
    v.swap(i, j);
    v[i + 1..].reverse();
    true
}

/// Square whose row `i` is `0..n` rotated right by `i`.
pub fn latin_square(n: usize) -> Vec<Vec<usize>> {
    (0..n)
        .map(|i| (0..n).map(|j| (j + n - i) % n).collect())
        .collect()
}

/// Permutation index per (participant row, sequence column).
///
/// Rows: the square, its left-right mirror, then its upside-down copy
/// rotated one column. Columns: those rows followed by the same rows in
/// reverse row order, repeated twice.
pub fn block_order_matrix(n: usize) -> Vec<Vec<usize>> {
    let square = latin_square(n);
    let mut rows: Vec<Vec<usize>> = square.clone();
    rows.extend(square.iter().map(|r| r.iter().rev().copied().collect()));
    rows.extend(square.iter().rev().map(|r| {
        (0..n).map(|j| r[(j + n - 1) % n]).collect::<Vec<usize>>()
    }));

    let flipped: Vec<Vec<usize>> = rows.iter().rev().cloned().collect();
    rows.iter()
        .zip(flipped.iter())
        .map(|(row, mirror)| {
            let mut wide = row.clone();
            wide.extend_from_slice(mirror);
            let doubled = wide.clone();
            wide.extend(doubled);
            wide
        })
        .collect()
}

/// Per-sequence target orders for every participant.
#[derive(Debug, Clone)]
pub struct Counterbalance {
    permutations: Vec<Vec<usize>>,
    matrix: Vec<Vec<usize>>,
}

impl Counterbalance {
    pub fn new(stimulus_count: usize) -> Self {
        let permutations = permutations(stimulus_count);
        let matrix = block_order_matrix(permutations.len());
        Self {
            permutations,
            matrix,
        }
    }

    /// Target of every block of one sequence. The permutation is cycled when
    /// a sequence has more blocks than stimuli.
    pub fn targets(&self, participant: usize, sequence: usize, blocks: usize) -> Vec<usize> {
        let row = &self.matrix[participant % self.matrix.len()];
        let permutation = &self.permutations[row[sequence % row.len()]];
        (0..blocks)
            .map(|b| permutation[b % permutation.len()])
            .collect()
    }

    /// Whether the first `participants` rows, cut to `sequences` columns,
    /// are pairwise distinct. Logs a warning when they are not.
    pub fn check_unique(&self, participants: usize, sequences: usize) -> bool {
        let rows: Vec<Vec<usize>> = (0..participants)
            .map(|p| {
                let row = &self.matrix[p % self.matrix.len()];
                (0..sequences).map(|s| row[s % row.len()]).collect()
            })
            .collect();
        let unique = rows
            .iter()
            .enumerate()
            .all(|(i, a)| rows.iter().skip(i + 1).all(|b| a != b));
        if !unique {
            warn!("Not all participants have unique block orders");
        }
        unique
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permutations_of_three() {
        let perms = permutations(3);
        assert_eq!(perms.len(), 6);
        assert_eq!(perms[0], vec![0, 1, 2]);
        assert_eq!(perms[1], vec![0, 2, 1]);
        assert_eq!(perms[5], vec![2, 1, 0]);
    }

    #[test]
    fn test_latin_square_rows_and_columns() {
        let square = latin_square(4);
        assert_eq!(square[1], vec![3, 0, 1, 2]);
        for j in 0..4 {
            let mut column: Vec<usize> = square.iter().map(|r| r[j]).collect();
            column.sort_unstable();
            assert_eq!(column, vec![0, 1, 2, 3]);
        }
    }

    #[test]
    fn test_block_order_matrix_shape() {
        let matrix = block_order_matrix(6);
        assert_eq!(matrix.len(), 18);
        assert!(matrix.iter().all(|r| r.len() == 24));
        // Rolled, upside-down copy starts the third group of rows.
        assert_eq!(matrix[12][..6], [0, 1, 2, 3, 4, 5]);
        assert_eq!(matrix[6][..6], [5, 4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_targets_for_three_stimuli() {
        let counterbalance = Counterbalance::new(3);
        for p in 0..6 {
            for s in 0..4 {
                let mut targets = counterbalance.targets(p, s, 3);
                targets.sort_unstable();
                assert_eq!(targets, vec![0, 1, 2]);
            }
        }
        assert!(counterbalance.check_unique(6, 5));
    }
}
