//! Trade execution audit trail

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use crate::{types::TradeExecution, utils::EXECUTIONS_DIR};

pub fn save_trade_execution(execution: &TradeExecution) -> Result<()> {
    save_trade_execution_in(Path::new(EXECUTIONS_DIR), execution).map(|_| ())
}

/// Appends one JSON line to the day's file under `dir` and returns its path.
pub fn save_trade_execution_in(dir: &Path, execution: &TradeExecution) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let filename = dir.join(format!("trades_{}.jsonl", Utc::now().format("%Y-%m-%d")));

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&filename)
        .with_context(|| format!("opening {}", filename.display()))?;

    writeln!(file, "{}", serde_json::to_string(execution)?)?;

    info!(
        trade_id = %execution.trade_id,
        status = %execution.status,
        tx_hash = ?execution.transaction_hash,
        "Saved trade execution"
    );

    Ok(filename)
}

/// Reads back an audit file. Malformed lines are skipped with a warning.
pub fn load_trade_executions(path: &Path) -> Result<Vec<TradeExecution>> {
    let file = fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut executions = Vec::new();

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<TradeExecution>(&line) {
            Ok(execution) => executions.push(execution),
            Err(e) => warn!("⚠️ Skipping malformed line {} in {}: {}", index + 1, path.display(), e),
        }
    }

    Ok(executions)
}
