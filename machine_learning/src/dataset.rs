use std::{num::NonZeroUsize, ops::Range, sync::Arc};

use ndarray::{Array1, Array2};
use rand::{Rng, seq::index};

use crate::{MlErr, Result};

/// A single normalized training example.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub inputs: Vec<f32>,
    pub target: Vec<f32>,
    /// Multiplies both the error and the gradient contribution of the record.
    pub significance: f32,
}

impl Record {
    pub fn new(inputs: Vec<f32>, target: Vec<f32>) -> Self {
        Self {
            inputs,
            target,
            significance: 1.0,
        }
    }
}

/// An immutable, cheaply clonable slice of records owned by a single worker.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    records: Arc<[Record]>,
}

impl Partition {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: records.into(),
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Splits the partition in a training and a validation subset, every record is held out
    /// for validation with probability `rate`.
    ///
    /// # Returns
    /// The `(train, validation)` pair.
    pub fn split_validation<R: Rng>(&self, rate: f32, rng: &mut R) -> (Partition, Partition) {
        let rate = f64::from(rate.clamp(0., 1.));
        let (validation, train) = self
            .records
            .iter()
            .cloned()
            .partition(|_| rng.random_bool(rate));

        (Partition::new(train), Partition::new(validation))
    }
}

/// An owned set of records, the whole input of one training.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Splits the dataset in `n` disjoint contiguous partitions whose sizes differ by at most
    /// one record. Some of them are empty when there are fewer records than partitions.
    pub fn partitions(&self, n: NonZeroUsize) -> Vec<Partition> {
        let n = n.get();

        (0..n)
            .map(|i| Partition::new(self.records[shard_range(self.len(), i, n)].to_vec()))
            .collect()
    }

    /// Draws `round(rate * len)` records to train a single ensemble replicate.
    ///
    /// # Arguments
    /// * `rate` - The fraction of the dataset to draw, must be in `(0, 1]`.
    /// * `with_replacement` - Whether a record may be drawn more than once.
    /// * `rng` - The random source of the replicate.
    pub fn bootstrap<R: Rng>(&self, rate: f32, with_replacement: bool, rng: &mut R) -> Result<Dataset> {
        if !(rate > 0. && rate <= 1.) {
            return Err(MlErr::InvalidArgument {
                what: "sample rate",
                value: rate.into(),
            });
        }

        let len = self.len();
        let amount = (rate as f64 * len as f64).round() as usize;

        let records = if len == 0 {
            Vec::new()
        } else if with_replacement {
            (0..amount)
                .map(|_| self.records[rng.random_range(0..len)].clone())
                .collect()
        } else {
            let mut picked = index::sample(rng, len, amount).into_vec();
            picked.sort_unstable();
            picked.into_iter().map(|i| self.records[i].clone()).collect()
        };

        Ok(Dataset::new(records))
    }
}

/// Computes the contiguous range of records owned by shard `shard_id` out of `num_shards`.
pub fn shard_range(total: usize, shard_id: usize, num_shards: usize) -> Range<usize> {
    let base = total / num_shards;
    let rem = total % num_shards;

    let start = shard_id * base + shard_id.min(rem);
    let extra = usize::from(shard_id < rem);
    start..start + base + extra
}

/// Records laid out as matrices, one row per record.
#[derive(Debug, Clone)]
pub struct RecordBatch {
    pub x: Array2<f32>,
    pub y: Array2<f32>,
    pub s: Array1<f32>,
}

impl RecordBatch {
    /// Stacks `records` after checking every one of them has the expected widths.
    pub fn new(records: &[Record], inputs: usize, outputs: usize) -> Result<Self> {
        let rows = records.len();
        let mut x = Vec::with_capacity(rows * inputs);
        let mut y = Vec::with_capacity(rows * outputs);
        let mut s = Vec::with_capacity(rows);

        for record in records {
            check_width("record inputs", record.inputs.len(), inputs)?;
            check_width("record target", record.target.len(), outputs)?;
            x.extend_from_slice(&record.inputs);
            y.extend_from_slice(&record.target);
            s.push(record.significance);
        }

        let shape_err = |_| MlErr::DimensionMismatch {
            what: "record batch",
            got: rows,
            expected: rows,
        };

        Ok(Self {
            x: Array2::from_shape_vec((rows, inputs), x).map_err(shape_err)?,
            y: Array2::from_shape_vec((rows, outputs), y).map_err(shape_err)?,
            s: Array1::from(s),
        })
    }

    /// The sum of the significances, the weighted amount of records in the batch.
    pub fn weight(&self) -> f32 {
        self.s.sum()
    }
}

fn check_width(what: &'static str, got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(MlErr::DimensionMismatch {
            what,
            got,
            expected,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn dataset(len: usize) -> Dataset {
        Dataset::new(
            (0..len)
                .map(|i| Record::new(vec![i as f32], vec![(i % 2) as f32]))
                .collect(),
        )
    }

    #[test]
    fn shard_ranges_are_balanced_and_cover_everything() {
        let ranges: Vec<_> = (0..3).map(|i| shard_range(10, i, 3)).collect();
        assert_eq!(ranges, [0..4, 4..7, 7..10]);
    }

    #[test]
    fn more_partitions_than_records_leaves_some_empty() {
        let partitions = dataset(2).partitions(NonZeroUsize::new(3).unwrap());

        let lens: Vec<_> = partitions.iter().map(Partition::len).collect();
        assert_eq!(lens, [1, 1, 0]);
    }

    #[test]
    fn bootstrap_draws_the_rounded_fraction() {
        let mut rng = StdRng::seed_from_u64(7);
        let data = dataset(100);

        let with = data.bootstrap(1.0, true, &mut rng).unwrap();
        let without = data.bootstrap(0.25, false, &mut rng).unwrap();

        assert_eq!(with.len(), 100);
        assert_eq!(without.len(), 25);

        let mut inputs: Vec<_> = without.records().iter().map(|r| r.inputs[0]).collect();
        inputs.dedup();
        assert_eq!(inputs.len(), 25);
    }

    #[test]
    fn bootstrap_is_reproducible_with_a_seed() {
        let data = dataset(50);
        let a = data.bootstrap(0.5, true, &mut StdRng::seed_from_u64(3)).unwrap();
        let b = data.bootstrap(0.5, true, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn validation_split_keeps_every_record() {
        let partition = dataset(40).partitions(NonZeroUsize::MIN).remove(0);
        let (train, validation) = partition.split_validation(0.25, &mut StdRng::seed_from_u64(1));

        assert_eq!(train.len() + validation.len(), 40);

        let (train, validation) = partition.split_validation(0.0, &mut StdRng::seed_from_u64(1));
        assert_eq!((train.len(), validation.len()), (40, 0));
    }

    #[test]
    fn batch_rejects_ragged_records() {
        let records = [Record::new(vec![1.0, 2.0], vec![1.0])];
        let err = RecordBatch::new(&records, 3, 1).unwrap_err();
        assert!(matches!(err, MlErr::DimensionMismatch { what: "record inputs", .. }));
    }
}
