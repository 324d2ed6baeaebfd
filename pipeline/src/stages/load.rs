use tokio::sync::mpsc;

use crate::{
    Batch, Parser, Result, Stage,
    message::RawRecord,
    pool::forward,
};

/// Parses raw lines, skipping the malformed ones. Always emits one batch per input batch.
pub struct LoadStage {
    parser: Parser,
    next: mpsc::Sender<Batch<RawRecord>>,
}

impl LoadStage {
    pub fn new(parser: Parser, next: mpsc::Sender<Batch<RawRecord>>) -> Self {
        Self { parser, next }
    }
}

impl Stage for LoadStage {
    type Input = Batch<String>;

    fn name(&self) -> &'static str {
        "load"
    }

    async fn process(&self, batch: Batch<String>) -> Result<()> {
        let records = batch
            .items
            .iter()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| self.parser.parse(line))
            .collect();

        forward(&self.next, self.name(), batch.map(records)).await
    }
}
