//! Training-set files built from epochs, and read-back checks on data files.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use erp_types::{ErpError, EventCode};

use crate::epoch::Epoch;

fn csv_error(e: csv::Error) -> ErpError {
    ErpError::Csv(e.to_string())
}

/// Writes one feature vector per line to `examples` and all labels as a
/// single comma-separated line to `labels`. Returns the number of examples.
pub fn write_training_set(epochs: &[Epoch], examples: &Path, labels: &Path) -> Result<usize, ErpError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(examples)
        .map_err(csv_error)?;
    for epoch in epochs {
        let record: Vec<String> = epoch.feature_vector().iter().map(|v| v.to_string()).collect();
        writer.write_record(&record).map_err(csv_error)?;
    }
    writer.flush()?;

    let mut out = BufWriter::new(File::create(labels)?);
    let line: Vec<String> = epochs.iter().map(|e| e.label().to_string()).collect();
    writeln!(out, "{}", line.join(","))?;
    out.flush()?;

    info!("Wrote {} training examples to {}", epochs.len(), examples.display());
    Ok(epochs.len())
}

/// Event codes found in a recorded data file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventTally {
    /// Target rows by stimulus index
    pub target: BTreeMap<usize, usize>,
    /// Non-target rows by stimulus index
    pub non_target: BTreeMap<usize, usize>,
    /// Rows without an event
    pub untagged: usize,
    /// Rows whose code is neither 0 nor a valid stimulus code
    pub unknown: usize,
}

impl EventTally {
    /// Reads a `timestamp,eventCode,...` file as written by the sample buffer.
    pub fn from_data_file(path: &Path) -> Result<Self, ErpError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(csv_error)?;

        let mut tally = EventTally::default();
        for record in reader.records() {
            let record = record.map_err(csv_error)?;
            let raw: i32 = record
                .get(1)
                .and_then(|field| field.trim().parse().ok())
                .ok_or_else(|| ErpError::Csv(format!("bad event code in row {:?}", record)))?;
            tally.count(raw);
        }
        Ok(tally)
    }

    fn count(&mut self, raw: i32) {
        if raw == erp_types::NO_EVENT {
            self.untagged += 1;
            return;
        }
        match EventCode::from_raw(raw) {
            Some(code) if code.is_target() => {
                *self.target.entry(code.stimulus_index()).or_default() += 1
            }
            Some(code) => *self.non_target.entry(code.stimulus_index()).or_default() += 1,
            None => self.unknown += 1,
        }
    }

    pub fn total_events(&self) -> usize {
        self.target.values().sum::<usize>() + self.non_target.values().sum::<usize>()
    }
}

impl fmt::Display for EventTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, n) in &self.non_target {
            writeln!(f, "non-target/{}: {}", index, n)?;
        }
        for (index, n) in &self.target {
            writeln!(f, "target/{}: {}", index, n)?;
        }
        write!(f, "untagged: {}", self.untagged)
    }
}
