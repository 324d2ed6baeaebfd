use std::collections::BTreeMap;

use comms::specs::pipeline::DataSpec;
use log::warn;
use machine_learning::dataset::Record;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{ColumnStats, PipelineErr, Result, message::RawRecord};

/// Splits raw lines in fields.
#[derive(Debug, Clone)]
pub struct Parser {
    delimiter: char,
    fields: usize,
}

impl Parser {
    pub fn new(spec: &DataSpec) -> Self {
        Self {
            delimiter: spec.delimiter,
            fields: spec.columns.len(),
        }
    }

    /// Parses a line, `None` if it doesn't have the expected amount of fields.
    pub fn parse(&self, line: &str) -> Option<RawRecord> {
        let fields: RawRecord = line
            .split(self.delimiter)
            .map(|field| field.trim().to_string())
            .collect();

        if fields.len() != self.fields {
            warn!(got = fields.len(), expected = self.fields; "skipping malformed record");
            return None;
        }

        Some(fields)
    }
}

/// Parses a numeric field, `None` for missing or unparsable values.
pub fn parse_value(field: &str) -> Option<f64> {
    field.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// The class of a record as given by its target column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Pos,
    Neg,
}

/// Decides which records of a batch take part in a pass over the data.
#[derive(Debug, Clone)]
pub struct Sampler {
    rate: f32,
    neg_only: bool,
    target_column: usize,
    pos_tags: Vec<String>,
    neg_tags: Vec<String>,
    seed: Option<u64>,
}

impl Sampler {
    pub fn new(spec: &DataSpec, seed: Option<u64>) -> Self {
        Self {
            rate: spec.sample_rate.clamp(0., 1.),
            neg_only: spec.sample_neg_only,
            target_column: spec.target_column,
            pos_tags: spec.pos_tags.clone(),
            neg_tags: spec.neg_tags.clone(),
            seed,
        }
    }

    /// The tag of `record`, `None` when its target is neither a positive nor a negative tag.
    pub fn tag(&self, record: &RawRecord) -> Option<Tag> {
        let target = record.get(self.target_column)?;

        if self.pos_tags.contains(target) {
            Some(Tag::Pos)
        } else if self.neg_tags.contains(target) {
            Some(Tag::Neg)
        } else {
            None
        }
    }

    /// The random source of batch `seq`: reproducible when a seed is configured.
    pub fn rng(&self, seq: usize) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(seq as u64)),
            None => StdRng::from_os_rng(),
        }
    }

    /// Whether a record with `tag` is kept.
    pub fn keep<R: Rng>(&self, tag: Tag, rng: &mut R) -> bool {
        if self.rate >= 1. || (self.neg_only && tag == Tag::Pos) {
            return true;
        }

        rng.random_bool(f64::from(self.rate))
    }
}

/// Turns raw records into training records: z-scored candidate columns, the target mapped
/// from its tag and the weight column as significance.
#[derive(Debug, Clone)]
pub struct Normalizer {
    columns: Vec<(usize, f64, f64)>,
    cutoff: f64,
    weight_column: Option<usize>,
}

impl Normalizer {
    /// Creates a new `Normalizer`.
    ///
    /// # Errors
    /// `PipelineErr::InvalidConfig` if a candidate column has no stats.
    pub fn new(spec: &DataSpec, stats: &[ColumnStats]) -> Result<Self> {
        let by_column: BTreeMap<_, _> = stats.iter().map(|s| (s.column, s)).collect();

        let columns = spec
            .candidates()
            .into_iter()
            .map(|column| {
                by_column
                    .get(&column)
                    .map(|s| (column, s.mean, s.std_dev))
                    .ok_or_else(|| PipelineErr::InvalidConfig(format!("column {column} has no stats")))
            })
            .collect::<Result<_>>()?;

        Ok(Self {
            columns,
            cutoff: f64::from(spec.std_dev_cutoff),
            weight_column: spec.weight_column,
        })
    }

    /// The amount of inputs of every record.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// The z-scores of the candidate columns, missing values become 0.
    pub fn inputs(&self, record: &RawRecord) -> Vec<f32> {
        self.columns
            .iter()
            .map(|&(column, mean, std_dev)| {
                let Some(value) = record.get(column).and_then(|f| parse_value(f)) else {
                    return 0.;
                };

                if std_dev <= 0. {
                    return 0.;
                }

                ((value - mean) / std_dev).clamp(-self.cutoff, self.cutoff) as f32
            })
            .collect()
    }

    pub fn normalize(&self, record: &RawRecord, tag: Tag) -> Record {
        let target = match tag {
            Tag::Pos => 1.,
            Tag::Neg => 0.,
        };

        let significance = self
            .weight_column
            .and_then(|column| record.get(column))
            .and_then(|f| f.parse::<f32>().ok())
            .filter(|w| w.is_finite() && *w >= 0.)
            .unwrap_or(1.);

        Record {
            inputs: self.inputs(record),
            target: vec![target],
            significance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> DataSpec {
        serde_json::from_str(
            r#"{
                "columns": ["a", "b", "label", "w"],
                "target_column": 2,
                "pos_tags": ["Y"],
                "neg_tags": ["N"],
                "weight_column": 3,
                "sample_rate": 0.5,
                "sample_neg_only": true,
                "std_dev_cutoff": 2.0
            }"#,
        )
        .unwrap()
    }

    fn stats(column: usize, mean: f64, std_dev: f64) -> ColumnStats {
        ColumnStats {
            column,
            name: String::new(),
            count: 10,
            missing: 0,
            mean,
            std_dev,
            min: 0.,
            max: 0.,
        }
    }

    fn record(fields: &[&str]) -> RawRecord {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn parser_rejects_wrong_field_counts() {
        let parser = Parser::new(&spec());

        assert_eq!(parser.parse("1| 2 |Y|3"), Some(record(&["1", "2", "Y", "3"])));
        assert_eq!(parser.parse("1|2|Y"), None);
    }

    #[test]
    fn normalization_clamps_and_fills_missing() {
        let normalizer = Normalizer::new(&spec(), &[stats(0, 1., 2.), stats(1, 0., 1.)]).unwrap();

        let normalized = normalizer.normalize(&record(&["5", "", "Y", "2.5"]), Tag::Pos);
        assert_eq!(normalized.inputs, [2., 0.]);
        assert_eq!(normalized.target, [1.]);
        assert_eq!(normalized.significance, 2.5);

        let normalized = normalizer.normalize(&record(&["0", "-1", "N", "oops"]), Tag::Neg);
        assert_eq!(normalized.inputs, [-0.5, -1.]);
        assert_eq!(normalized.significance, 1.);
    }

    #[test]
    fn missing_stats_are_a_config_error() {
        let err = Normalizer::new(&spec(), &[stats(0, 1., 2.)]).unwrap_err();
        assert!(matches!(err, PipelineErr::InvalidConfig(_)));
    }

    #[test]
    fn negative_only_sampling_keeps_every_positive() {
        let sampler = Sampler::new(&spec(), Some(3));
        let mut rng = sampler.rng(0);

        assert!((0..100).all(|_| sampler.keep(Tag::Pos, &mut rng)));

        let kept = (0..1000).filter(|_| sampler.keep(Tag::Neg, &mut rng)).count();
        assert!((400..600).contains(&kept), "{kept}");
        assert_eq!(sampler.tag(&record(&["1", "2", "maybe", "1"])), None);
    }
}
