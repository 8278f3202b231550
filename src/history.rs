//! Selection bookkeeping: which rows were committed, in which order, and
//! what each one gained.

/// Ranking and per-round gains of a selection run.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SelectionHistory {
    ranking: Vec<usize>,
    gains: Vec<f64>,
    selected: Vec<bool>,
}

impl SelectionHistory {
    /// Empty history over `n_rows` candidates.
    #[must_use]
    pub fn new(n_rows: usize) -> Self {
        Self {
            ranking: Vec::new(),
            gains: Vec::new(),
            selected: vec![false; n_rows],
        }
    }

    /// Append one round. Called exactly once per accepted selection.
    pub fn record(&mut self, index: usize, gain: f64) {
        self.ranking.push(index);
        self.gains.push(gain);
        self.selected[index] = true;
    }

    /// Selected rows in commit order.
    #[must_use]
    pub fn ranking(&self) -> &[usize] {
        &self.ranking
    }

    /// Gain recorded for each entry of [`ranking`](Self::ranking).
    #[must_use]
    pub fn gains(&self) -> &[f64] {
        &self.gains
    }

    /// Membership mask over all rows.
    #[must_use]
    pub fn selected(&self) -> &[bool] {
        &self.selected
    }

    /// Whether row `i` has been committed.
    #[must_use]
    pub fn contains(&self, i: usize) -> bool {
        self.selected.get(i).copied().unwrap_or(false)
    }

    /// Rounds recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranking.len()
    }

    /// True before the first commit.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranking.is_empty()
    }

    /// Rows not yet committed, ascending.
    #[must_use]
    pub fn remaining(&self) -> Vec<usize> {
        self.selected
            .iter()
            .enumerate()
            .filter_map(|(i, &s)| (!s).then_some(i))
            .collect()
    }

    /// Sum of recorded gains.
    #[must_use]
    pub fn objective_value(&self) -> f64 {
        self.gains.iter().sum()
    }

    /// Forget every round.
    pub fn clear(&mut self) {
        self.ranking.clear();
        self.gains.clear();
        self.selected.iter_mut().for_each(|s| *s = false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order() {
        let mut h = SelectionHistory::new(4);
        h.record(3, 9.0);
        h.record(0, 4.0);
        assert_eq!(h.ranking(), &[3, 0]);
        assert_eq!(h.gains(), &[9.0, 4.0]);
        assert_eq!(h.remaining(), vec![1, 2]);
        assert_eq!(h.objective_value(), 13.0);
        assert!(h.contains(3));
        assert!(!h.contains(1));
        assert!(!h.contains(10));
    }

    #[test]
    fn clear_resets() {
        let mut h = SelectionHistory::new(2);
        h.record(1, 1.0);
        h.clear();
        assert!(h.is_empty());
        assert_eq!(h.remaining(), vec![0, 1]);
    }
}
