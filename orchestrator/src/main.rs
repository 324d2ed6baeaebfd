use std::{
    env,
    fs::{self, File},
    io::{self, BufWriter, Write},
};

use anyhow::{Context, Result, bail};
use log::info;
use orchestrator::{ModelConfig, train};

fn main() -> Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let (Some(config_path), Some(data_path)) = (args.next(), args.next()) else {
        bail!("usage: orchestrator <config.json> <data file> [report.json]");
    };
    let report_path = args.next();

    let config = ModelConfig::from_path(&config_path)
        .with_context(|| format!("loading config {config_path}"))?;

    let lines: Vec<String> = fs::read_to_string(&data_path)
        .with_context(|| format!("reading data {data_path}"))?
        .lines()
        .map(String::from)
        .collect();

    info!(lines = lines.len(); "data loaded");
    let report = train(config, lines)?;

    let mut writer: Box<dyn Write> = match &report_path {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    serde_json::to_writer_pretty(&mut writer, &report)?;
    writeln!(writer)?;
    writer.flush()?;

    Ok(())
}
