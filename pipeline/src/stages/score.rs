use std::collections::BTreeMap;

use comms::specs::pipeline::DataSpec;
use futures::future;
use log::debug;
use machine_learning::model::{Scorer, TrainedModel};
use ndarray::Array2;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::{
    Batch, ColumnScore, Normalizer, PipelineErr, Result, ScoreBin, Stage,
    message::{Event, RawRecord, ScorePart},
    pool::ColumnSink,
};

/// Scores every record with the mean of the trained models, then redistributes the scores
/// per candidate column along with the raw value of the column.
///
/// The stage keeps one scorer per model and every batch scores with its own copies, so the
/// tasks of the pool never wait on each other.
pub struct ScoreStage {
    normalizer: Normalizer,
    scorers: Vec<Scorer>,
    sink: ColumnSink<(usize, ScorePart)>,
}

impl ScoreStage {
    /// Creates a new `ScoreStage`.
    ///
    /// # Errors
    /// `PipelineErr::Ml` if a model doesn't match its topology, `PipelineErr::InvalidConfig` if
    /// its inputs differ from the amount of candidate columns.
    pub fn new(
        normalizer: Normalizer,
        models: &[TrainedModel],
        sink: ColumnSink<(usize, ScorePart)>,
    ) -> Result<Self> {
        let scorers = models
            .iter()
            .map(|model| {
                if model.topology.inputs != normalizer.width() {
                    return Err(PipelineErr::InvalidConfig(format!(
                        "replicate {} takes {} inputs, the data has {} candidate columns",
                        model.replicate,
                        model.topology.inputs,
                        normalizer.width()
                    )));
                }

                Ok(model.scorer()?)
            })
            .collect::<Result<_>>()?;

        Ok(Self {
            normalizer,
            scorers,
            sink,
        })
    }

    fn score(&self, records: &[RawRecord]) -> Result<Vec<f32>> {
        if records.is_empty() || self.scorers.is_empty() {
            return Ok(vec![0.; records.len()]);
        }

        let width = self.normalizer.width();
        let flat: Vec<f32> = records
            .iter()
            .flat_map(|record| self.normalizer.inputs(record))
            .collect();

        let x = Array2::from_shape_vec((records.len(), width), flat).map_err(|e| {
            PipelineErr::StageFailure {
                stage: self.name(),
                detail: e.to_string(),
            }
        })?;

        let mut total = vec![0.; records.len()];
        for scorer in &self.scorers {
            let scores = scorer.clone().score(x.view())?;
            total.iter_mut().zip(scores).for_each(|(t, s)| *t += s);
        }

        let n = self.scorers.len() as f32;
        Ok(total.into_iter().map(|t| t / n).collect())
    }
}

impl Stage for ScoreStage {
    type Input = Batch<RawRecord>;

    fn name(&self) -> &'static str {
        "score"
    }

    async fn process(&self, batch: Batch<RawRecord>) -> Result<()> {
        let scores = self.score(&batch.items)?;
        let sends = self.sink.router().columns().map(|column| {
            let items = batch
                .items
                .iter()
                .zip(&scores)
                .map(|(record, &score)| (record.get(column).cloned().unwrap_or_default(), score))
                .collect();

            self.sink.send(self.name(), column, (column, batch.map(items)))
        });

        future::try_join_all(sends).await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Bins {
    received: usize,
    bins: BTreeMap<String, (f64, u64)>,
}

/// Accumulates the scores of every raw value of a column and reports the column once all of
/// its parts arrived.
pub struct ScoreAggregateStage {
    names: Vec<String>,
    columns: Mutex<BTreeMap<usize, Bins>>,
    events: mpsc::UnboundedSender<Event>,
}

impl ScoreAggregateStage {
    pub fn new(spec: &DataSpec, events: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            names: spec.columns.clone(),
            columns: Mutex::new(BTreeMap::new()),
            events,
        }
    }
}

impl Stage for ScoreAggregateStage {
    type Input = (usize, ScorePart);

    fn name(&self) -> &'static str {
        "score_aggregate"
    }

    async fn process(&self, (column, part): (usize, ScorePart)) -> Result<()> {
        let finished = {
            let mut columns = self.columns.lock();
            let acc = columns.entry(column).or_default();

            for (value, score) in part.items {
                let (sum, count) = acc.bins.entry(value).or_default();
                *sum += f64::from(score);
                *count += 1;
            }
            acc.received += 1;

            if acc.received == part.total_msg_cnt {
                columns.remove(&column)
            } else {
                None
            }
        };

        let Some(acc) = finished else {
            return Ok(());
        };

        let bins = acc
            .bins
            .into_iter()
            .map(|(value, (sum, count))| ScoreBin {
                value,
                count,
                mean_score: sum / count as f64,
            })
            .collect::<Vec<_>>();

        debug!(column = column, bins = bins.len(); "column scores finished");

        let score = ColumnScore {
            column,
            name: self.names.get(column).cloned().unwrap_or_default(),
            bins,
        };

        self.events
            .send(Event::Scored(score))
            .map_err(|_| PipelineErr::Closed { stage: self.name() })
    }
}

#[cfg(test)]
mod tests {
    use std::{num::NonZeroUsize, sync::Arc, thread};

    use comms::specs::machine_learning::TopologySpec;

    use super::*;
    use crate::{ColumnRouter, ColumnStats, KeyedPool};

    fn model() -> TrainedModel {
        TrainedModel {
            replicate: 0,
            topology: TopologySpec {
                inputs: 1,
                hidden: Vec::new(),
                outputs: 1,
                output_act_fn: Default::default(),
            },
            weights: vec![1., 0.],
            best_weights: vec![1., 0.],
            train_error: 0.,
            validation_error: 0.,
            iterations: 1,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn batches_score_in_parallel_with_the_same_results() {
        let spec: DataSpec = serde_json::from_str(
            r#"{
                "columns": ["a", "label"],
                "target_column": 1,
                "pos_tags": ["Y"],
                "neg_tags": ["N"]
            }"#,
        )
        .unwrap();

        let stats = ColumnStats {
            column: 0,
            name: "a".into(),
            count: 4,
            missing: 0,
            mean: 0.,
            std_dev: 1.,
            min: -1.,
            max: 2.,
        };
        let normalizer = Normalizer::new(&spec, &[stats]).unwrap();

        let (events, _events_rx) = mpsc::unbounded_channel();
        let aggregate = ScoreAggregateStage::new(&spec, events.clone());
        let router = Arc::new(ColumnRouter::new(&[0], 1));
        let pool = KeyedPool::spawn(Arc::new(aggregate), router, NonZeroUsize::MIN, events);

        let stage = ScoreStage::new(normalizer, &[model()], pool.sink()).unwrap();
        let records: Vec<RawRecord> = ["-1", "0", "1", "2"]
            .into_iter()
            .map(|v| vec![v.to_string(), "Y".to_string()])
            .collect();

        let expected = stage.score(&records).unwrap();
        assert!((expected[1] - 0.5).abs() < 1e-6);
        assert!(expected.windows(2).all(|w| w[0] < w[1]));

        let scores: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = (0..4).map(|_| s.spawn(|| stage.score(&records))).collect();
            handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect()
        });

        assert!(scores.iter().all(|s| *s == expected));
    }
}
