//! Rolling state history for one partition.

use crate::HistoryError;

/// Fixed-depth rolling window of state vectors.
///
/// Rows are addressed logically by depth index: row 0 is the most recently
/// committed vector, row `depth - 1` the oldest. Physically the rows live in
/// one contiguous buffer used as a ring, so [`commit_next`](Self::commit_next)
/// overwrites the evicted slot in place instead of shifting every row.
///
/// Before `depth - 1` steps have been committed the rows beyond the committed
/// ones still hold the configured initial values, never uninitialised data.
#[derive(Debug, Clone, PartialEq)]
pub struct StateHistory {
    /// `depth * width` values, physical row `r` at `r * width..(r + 1) * width`.
    values: Vec<f64>,
    width: usize,
    depth: usize,
    /// Physical row currently holding logical row 0.
    head: usize,
    /// Number of vectors committed since seeding.
    steps: u64,
}

impl StateHistory {
    /// Create a history seeded with initial values.
    ///
    /// `initial` is either a single row of `width` values, copied into every
    /// row, or a full history of `width * depth` values with the most recent
    /// row first.
    pub fn new(width: usize, depth: usize, initial: &[f64]) -> Result<Self, HistoryError> {
        if width == 0 {
            return Err(HistoryError::ZeroWidth);
        }
        if depth == 0 {
            return Err(HistoryError::ZeroDepth);
        }
        let mut history = Self {
            values: vec![0.0; width * depth],
            width,
            depth,
            head: 0,
            steps: 0,
        };
        history.seed(initial)?;
        Ok(history)
    }

    /// Build a history from recorded rows, most recent first.
    ///
    /// The depth of the resulting history equals the number of rows. Used to
    /// replay data recorded by an earlier run.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, HistoryError> {
        let Some(first) = rows.first() else {
            return Err(HistoryError::ZeroDepth);
        };
        let width = first.len();
        if width == 0 {
            return Err(HistoryError::ZeroWidth);
        }
        let mut values = Vec::with_capacity(width * rows.len());
        for (row, data) in rows.iter().enumerate() {
            if data.len() != width {
                return Err(HistoryError::RaggedRows {
                    row,
                    expected: width,
                    got: data.len(),
                });
            }
            values.extend_from_slice(data);
        }
        Ok(Self {
            values,
            width,
            depth: rows.len(),
            head: 0,
            steps: 0,
        })
    }

    /// Reset the history to the given initial values.
    ///
    /// Accepts the same shapes as [`new`](Self::new) and resets the committed
    /// step count to zero.
    pub fn seed(&mut self, initial: &[f64]) -> Result<(), HistoryError> {
        let full = self.width * self.depth;
        if initial.len() == self.width {
            for row in self.values.chunks_exact_mut(self.width) {
                row.copy_from_slice(initial);
            }
        } else if initial.len() == full {
            self.values.copy_from_slice(initial);
        } else {
            return Err(HistoryError::InitialLength {
                width: self.width,
                full,
                got: initial.len(),
            });
        }
        self.head = 0;
        self.steps = 0;
        Ok(())
    }

    /// Commit a newly computed vector as row 0.
    ///
    /// The oldest row's slot is reused, so every other row keeps its storage
    /// and shifts by one logical index.
    ///
    /// # Panics
    ///
    /// Panics if `values.len()` differs from the state width. The coordinator
    /// validates widths before committing, so this is a programming error.
    pub fn commit_next(&mut self, values: &[f64]) {
        assert_eq!(
            values.len(),
            self.width,
            "committed row has width {} but history width is {}",
            values.len(),
            self.width
        );
        self.head = (self.head + self.depth - 1) % self.depth;
        let start = self.head * self.width;
        self.values[start..start + self.width].copy_from_slice(values);
        self.steps += 1;
    }

    /// Overwrite row 0 in place without shifting the history.
    ///
    /// Only for private scratch copies of a history, e.g. chaining several
    /// computations within one step. The committed count is unchanged.
    ///
    /// # Panics
    ///
    /// Panics if `values.len()` differs from the state width.
    pub fn overwrite_latest(&mut self, values: &[f64]) {
        assert_eq!(
            values.len(),
            self.width,
            "overwriting row of width {} with {} values",
            self.width,
            values.len()
        );
        let start = self.head * self.width;
        self.values[start..start + self.width].copy_from_slice(values);
    }

    /// The most recently committed row.
    pub fn latest_row(&self) -> &[f64] {
        self.row_at(0)
    }

    /// The row at the given depth index (0 = most recent).
    ///
    /// # Panics
    ///
    /// Panics if `depth_index >= depth`. Depth is fixed at configuration
    /// time, so asking beyond it is a programming error.
    pub fn row_at(&self, depth_index: usize) -> &[f64] {
        assert!(
            depth_index < self.depth,
            "history row {} requested but depth is {}",
            depth_index,
            self.depth
        );
        let physical = (self.head + depth_index) % self.depth;
        let start = physical * self.width;
        &self.values[start..start + self.width]
    }

    /// The row at the given depth index, or `None` beyond the depth.
    pub fn get_row(&self, depth_index: usize) -> Option<&[f64]> {
        (depth_index < self.depth).then(|| self.row_at(depth_index))
    }

    /// A single value at a depth index and column.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    pub fn get(&self, depth_index: usize, column: usize) -> f64 {
        assert!(
            column < self.width,
            "column {} requested but width is {}",
            column,
            self.width
        );
        self.row_at(depth_index)[column]
    }

    /// Copy a row out of the history.
    pub fn copy_row(&self, depth_index: usize) -> Vec<f64> {
        self.row_at(depth_index).to_vec()
    }

    /// Iterate rows from most recent to oldest.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.depth).map(move |i| self.row_at(i))
    }

    /// State width (vector dimension).
    pub fn width(&self) -> usize {
        self.width
    }

    /// History depth (number of rows held).
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of vectors committed since seeding.
    pub fn steps_committed(&self) -> u64 {
        self.steps
    }

    /// Number of rows holding committed or initial data: `min(steps + 1, depth)`.
    pub fn meaningful_rows(&self) -> usize {
        let filled = usize::try_from(self.steps).unwrap_or(usize::MAX);
        filled.saturating_add(1).min(self.depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_seeds_every_row() {
        let history = StateHistory::new(2, 3, &[1.0, 2.0]).unwrap();

        assert_eq!(history.width(), 2);
        assert_eq!(history.depth(), 3);
        for row in history.rows() {
            assert_eq!(row, &[1.0, 2.0]);
        }
        assert_eq!(history.meaningful_rows(), 1);
    }

    #[test]
    fn test_new_accepts_full_history() {
        let history = StateHistory::new(1, 3, &[3.0, 2.0, 1.0]).unwrap();

        assert_eq!(history.row_at(0), &[3.0]);
        assert_eq!(history.row_at(1), &[2.0]);
        assert_eq!(history.row_at(2), &[1.0]);
    }

    #[test]
    fn test_new_rejects_bad_shapes() {
        assert_eq!(
            StateHistory::new(0, 2, &[]).unwrap_err(),
            HistoryError::ZeroWidth
        );
        assert_eq!(
            StateHistory::new(1, 0, &[1.0]).unwrap_err(),
            HistoryError::ZeroDepth
        );
        assert_eq!(
            StateHistory::new(2, 2, &[1.0, 2.0, 3.0]).unwrap_err(),
            HistoryError::InitialLength {
                width: 2,
                full: 4,
                got: 3
            }
        );
    }

    #[test]
    fn test_commit_shifts_logical_rows() {
        let mut history = StateHistory::new(1, 3, &[0.0]).unwrap();

        history.commit_next(&[1.0]);
        history.commit_next(&[2.0]);

        assert_eq!(history.latest_row(), &[2.0]);
        assert_eq!(history.row_at(1), &[1.0]);
        assert_eq!(history.row_at(2), &[0.0]);

        history.commit_next(&[3.0]);
        history.commit_next(&[4.0]);

        // Oldest rows evicted, logical order preserved across wrap-around
        let rows: Vec<f64> = history.rows().map(|r| r[0]).collect();
        assert_eq!(rows, vec![4.0, 3.0, 2.0]);
        assert_eq!(history.steps_committed(), 4);
    }

    #[test]
    fn test_meaningful_rows_tracks_warmup() {
        let mut history = StateHistory::new(1, 3, &[7.0]).unwrap();

        for n in 0..6u64 {
            assert_eq!(history.meaningful_rows(), (n as usize + 1).min(3));
            history.commit_next(&[n as f64]);
            assert_eq!(history.latest_row(), &[n as f64]);
        }
    }

    #[test]
    fn test_deepest_row_before_warmup_is_initial_value() {
        let mut history = StateHistory::new(2, 4, &[5.0, 6.0]).unwrap();
        history.commit_next(&[1.0, 1.0]);

        assert_eq!(history.row_at(3), &[5.0, 6.0]);
        assert_eq!(history.get(3, 1), 6.0);
    }

    #[test]
    #[should_panic(expected = "history row 3 requested but depth is 3")]
    fn test_row_beyond_depth_panics() {
        let history = StateHistory::new(1, 3, &[0.0]).unwrap();
        let _ = history.row_at(3);
    }

    #[test]
    #[should_panic(expected = "committed row has width 2")]
    fn test_commit_wrong_width_panics() {
        let mut history = StateHistory::new(1, 2, &[0.0]).unwrap();
        history.commit_next(&[1.0, 2.0]);
    }

    #[test]
    fn test_overwrite_latest_keeps_older_rows() {
        let mut history = StateHistory::new(1, 2, &[0.0]).unwrap();
        history.commit_next(&[1.0]);
        history.overwrite_latest(&[5.0]);

        assert_eq!(history.rows().collect::<Vec<_>>(), vec![&[5.0][..], &[0.0][..]]);
        assert_eq!(history.steps_committed(), 1);
    }

    #[test]
    fn test_get_row_is_checked() {
        let history = StateHistory::new(1, 2, &[0.0]).unwrap();
        assert!(history.get_row(1).is_some());
        assert!(history.get_row(2).is_none());
    }

    #[test]
    fn test_from_rows() {
        let history =
            StateHistory::from_rows(&[vec![3.0, 30.0], vec![2.0, 20.0], vec![1.0, 10.0]]).unwrap();

        assert_eq!(history.depth(), 3);
        assert_eq!(history.width(), 2);
        assert_eq!(history.row_at(2), &[1.0, 10.0]);

        let ragged = StateHistory::from_rows(&[vec![1.0, 2.0], vec![1.0]]);
        assert_eq!(
            ragged.unwrap_err(),
            HistoryError::RaggedRows {
                row: 1,
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn test_seed_resets_history() {
        let mut history = StateHistory::new(1, 2, &[0.0]).unwrap();
        history.commit_next(&[9.0]);

        history.seed(&[1.0]).unwrap();

        assert_eq!(history.steps_committed(), 0);
        assert_eq!(history.rows().collect::<Vec<_>>(), vec![&[1.0][..], &[1.0][..]]);
    }
}
