use std::collections::BTreeMap;

use comms::specs::pipeline::DataSpec;
use futures::future;
use log::debug;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::{
    Batch, ColumnStats, PipelineErr, Result, Sampler, Stage,
    message::{ColumnPart, Event, RawRecord},
    pool::ColumnSink,
    records::parse_value,
};

/// Redistributes row batches per candidate column to the keyed column workers.
pub struct ColumnPrepareStage {
    sampler: Sampler,
    sink: ColumnSink<(usize, ColumnPart)>,
}

impl ColumnPrepareStage {
    pub fn new(sampler: Sampler, sink: ColumnSink<(usize, ColumnPart)>) -> Self {
        Self { sampler, sink }
    }
}

impl Stage for ColumnPrepareStage {
    type Input = Batch<RawRecord>;

    fn name(&self) -> &'static str {
        "column_prepare"
    }

    async fn process(&self, batch: Batch<RawRecord>) -> Result<()> {
        let mut rng = self.sampler.rng(batch.seq);
        let rows: Vec<_> = batch
            .items
            .iter()
            .filter(|record| {
                self.sampler
                    .tag(record)
                    .is_some_and(|tag| self.sampler.keep(tag, &mut rng))
            })
            .collect();

        // Every column gets its part, even an empty one, or its worker would wait forever.
        let sends = self.sink.router().columns().map(|column| {
            let values = rows
                .iter()
                .map(|record| record.get(column).and_then(|f| parse_value(f)))
                .collect();

            self.sink.send(self.name(), column, (column, batch.map(values)))
        });

        future::try_join_all(sends).await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    received: usize,
    count: u64,
    missing: u64,
    sum: f64,
    sum_sq: f64,
    min: f64,
    max: f64,
}

impl Accumulator {
    fn add(&mut self, value: Option<f64>) {
        let Some(value) = value else {
            self.missing += 1;
            return;
        };

        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }

        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
    }

    fn finish(self, column: usize, name: String) -> ColumnStats {
        let n = self.count as f64;
        let (mean, std_dev) = if self.count == 0 {
            (0., 0.)
        } else {
            let mean = self.sum / n;
            let variance = (self.sum_sq / n - mean * mean).max(0.);
            (mean, variance.sqrt())
        };

        ColumnStats {
            column,
            name,
            count: self.count,
            missing: self.missing,
            mean,
            std_dev,
            min: self.min,
            max: self.max,
        }
    }
}

/// Accumulates the parts of every column and reports its stats once all of them arrived.
pub struct ColumnStatsStage {
    names: Vec<String>,
    accumulators: Mutex<BTreeMap<usize, Accumulator>>,
    events: mpsc::UnboundedSender<Event>,
}

impl ColumnStatsStage {
    pub fn new(spec: &DataSpec, events: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            names: spec.columns.clone(),
            accumulators: Mutex::new(BTreeMap::new()),
            events,
        }
    }
}

impl Stage for ColumnStatsStage {
    type Input = (usize, ColumnPart);

    fn name(&self) -> &'static str {
        "column_stats"
    }

    async fn process(&self, (column, part): (usize, ColumnPart)) -> Result<()> {
        let finished = {
            let mut accumulators = self.accumulators.lock();
            let acc = accumulators.entry(column).or_default();

            part.items.into_iter().for_each(|value| acc.add(value));
            acc.received += 1;

            if acc.received == part.total_msg_cnt {
                accumulators.remove(&column)
            } else {
                None
            }
        };

        let Some(acc) = finished else {
            return Ok(());
        };

        let name = self.names.get(column).cloned().unwrap_or_default();
        debug!(column = column, count = acc.count; "column stats finished");

        self.events
            .send(Event::Stats(acc.finish(column, name)))
            .map_err(|_| PipelineErr::Closed { stage: self.name() })
    }
}
