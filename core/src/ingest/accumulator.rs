use serde::Serialize;

use super::schema::UserRecord;

/// Ordered group of rows sent to the sink together. Sequence numbers start
/// at 1 and have no gaps within a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch<T> {
    pub seq: u64,
    pub rows: Vec<T>,
    pub is_final: bool,
}

pub type RecordBatch = Batch<UserRecord>;

/// Seals rows into fixed-size batches.
///
/// One full batch is held back so that the last batch of the stream can be
/// flagged `is_final` even when the row count is an exact multiple of the
/// batch size.
#[derive(Debug)]
pub struct BatchAccumulator<T> {
    size: usize,
    current: Vec<T>,
    held: Option<Vec<T>>,
    next_seq: u64,
}

impl<T> BatchAccumulator<T> {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            current: Vec::with_capacity(size),
            held: None,
            next_seq: 1,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.size
    }

    /// Rows accepted but not yet sealed into an emitted batch.
    pub fn pending_rows(&self) -> usize {
        self.current.len() + self.held.as_ref().map_or(0, Vec::len)
    }

    pub fn push(&mut self, row: T) -> Option<Batch<T>> {
        self.current.push(row);
        if self.current.len() < self.size {
            return None;
        }
        let full = std::mem::replace(&mut self.current, Vec::with_capacity(self.size));
        self.held
            .replace(full)
            .map(|previous| self.seal(previous, false))
    }

    /// Seals whatever remains. The last returned batch is marked final.
    pub fn finish(mut self) -> Vec<Batch<T>> {
        let mut out = Vec::with_capacity(2);
        let current = std::mem::take(&mut self.current);
        match self.held.take() {
            Some(held) if current.is_empty() => out.push(self.seal(held, true)),
            Some(held) => {
                out.push(self.seal(held, false));
                out.push(self.seal(current, true));
            }
            None if !current.is_empty() => out.push(self.seal(current, true)),
            None => {}
        }
        out
    }

    /// Stops accepting rows after a source failure. A held full batch is
    /// still returned (not final); the partial batch is discarded.
    pub fn abandon(mut self) -> Option<Batch<T>> {
        self.held.take().map(|held| self.seal(held, false))
    }

    fn seal(&mut self, rows: Vec<T>, is_final: bool) -> Batch<T> {
        let seq = self.next_seq;
        self.next_seq += 1;
        Batch {
            seq,
            rows,
            is_final,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(rows: usize, size: usize) -> Vec<Batch<usize>> {
        let mut acc = BatchAccumulator::new(size);
        let mut out: Vec<_> = (0..rows).filter_map(|r| acc.push(r)).collect();
        out.extend(acc.finish());
        out
    }

    #[test]
    fn partial_tail_is_final() {
        let batches = run(2500, 1000);
        let shape: Vec<_> = batches
            .iter()
            .map(|b| (b.seq, b.rows.len(), b.is_final))
            .collect();
        assert_eq!(shape, vec![(1, 1000, false), (2, 1000, false), (3, 500, true)]);
    }

    #[test]
    fn exact_multiple_marks_last_full_batch_final() {
        let batches = run(2000, 1000);
        assert_eq!(batches.len(), 2);
        assert!(!batches[0].is_final);
        assert!(batches[1].is_final);
        assert_eq!(batches[1].rows.len(), 1000);
    }

    #[test]
    fn no_rows_no_batches() {
        assert!(run(0, 10).is_empty());
    }

    #[test]
    fn sequences_are_gapless_and_rows_ordered() {
        for (rows, size) in [(1, 1), (7, 3), (9, 3), (10, 4), (100, 7)] {
            let batches = run(rows, size);
            let seqs: Vec<u64> = batches.iter().map(|b| b.seq).collect();
            let expected: Vec<u64> = (1..=rows.div_ceil(size) as u64).collect();
            assert_eq!(seqs, expected, "rows={rows} size={size}");

            let flat: Vec<usize> = batches.into_iter().flat_map(|b| b.rows).collect();
            assert_eq!(flat, (0..rows).collect::<Vec<_>>());
        }
    }

    #[test]
    fn abandon_keeps_complete_batches_only() {
        let mut acc = BatchAccumulator::new(2);
        assert!(acc.push(1).is_none());
        assert!(acc.push(2).is_none());
        assert!(acc.push(3).is_none());
        let batch = acc.abandon().unwrap();
        assert_eq!((batch.seq, batch.rows, batch.is_final), (1, vec![1, 2], false));
    }

    #[test]
    fn zero_size_is_clamped() {
        let acc: BatchAccumulator<u8> = BatchAccumulator::new(0);
        assert_eq!(acc.batch_size(), 1);
    }
}
