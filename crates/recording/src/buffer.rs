//! Concurrent store for the continuously recorded sample stream.
//!
//! One acquisition thread appends while the presentation side tags, exports
//! and clears. Every operation takes the same lock for its own duration.

use std::fs::OpenOptions;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use erp_types::{data_file_path, ErpError, Event, Sample, SampleTable};

#[derive(Debug, Default)]
pub struct SampleBuffer {
    samples: Mutex<Vec<Sample>>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Sample>> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a sample with no event code.
    pub fn push(&self, channels: Vec<f64>, timestamp: f64) {
        self.lock().push(Sample::new(timestamp, channels));
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn last_timestamp(&self) -> Option<f64> {
        self.lock().last().map(|s| s.timestamp)
    }

    /// Index of the last sample with `timestamp <= time`.
    ///
    /// When every sample is later than `time` the last index is returned.
    /// `None` only for an empty buffer.
    pub fn find_index_at_or_before(&self, time: f64) -> Option<usize> {
        index_at_or_before(&self.lock(), time)
    }

    /// Writes each event's code onto its matching sample, in the order given.
    /// Later events overwrite earlier ones that map to the same sample.
    /// Returns the number of events applied.
    pub fn tag_events(&self, events: &[Event]) -> usize {
        let mut samples = self.lock();
        let mut tagged = 0;
        for event in events {
            if let Some(i) = index_at_or_before(&samples, event.timestamp) {
                samples[i].event_code = event.code.raw();
                tagged += 1;
            }
        }
        debug!("Tagged {} of {} events on {} samples", tagged, events.len(), samples.len());
        tagged
    }

    /// Writes every row to the subject's data file in `directory` and returns
    /// its path.
    pub fn export_to_table(
        &self,
        directory: &Path,
        subject: u32,
        append_if_exists: bool,
    ) -> Result<PathBuf, ErpError> {
        std::fs::create_dir_all(directory)?;
        let path = data_file_path(directory, subject);
        self.write_table(&path, append_if_exists)?;
        Ok(path)
    }

    /// Writes `timestamp,eventCode,channel_0,...` rows in arrival order.
    /// Appends when the file exists and `append_if_exists` is set, otherwise
    /// the file is created or truncated. Returns the number of rows written.
    pub fn write_table(&self, path: &Path, append_if_exists: bool) -> Result<usize, ErpError> {
        let samples = self.lock();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append_if_exists)
            .truncate(!append_if_exists)
            .open(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(BufWriter::new(file));

        for sample in samples.iter() {
            let mut record = Vec::with_capacity(sample.channels.len() + 2);
            record.push(sample.timestamp.to_string());
            record.push(sample.event_code.to_string());
            record.extend(sample.channels.iter().map(|v| v.to_string()));
            writer
                .write_record(&record)
                .map_err(|e| ErpError::Csv(e.to_string()))?;
        }
        writer.flush()?;
        Ok(samples.len())
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Owned copy of every row.
    pub fn snapshot(&self) -> SampleTable {
        SampleTable::from_samples(self.lock().iter())
    }

    /// Owned copy of the rows with `start <= timestamp < end`.
    pub fn slice(&self, start: f64, end: f64) -> SampleTable {
        let samples = self.lock();
        let from = samples.partition_point(|s| s.timestamp < start);
        let to = samples.partition_point(|s| s.timestamp < end).max(from);
        SampleTable::from_samples(samples[from..to].iter())
    }
}

fn index_at_or_before(samples: &[Sample], time: f64) -> Option<usize> {
    if samples.is_empty() {
        return None;
    }
    let after = samples.partition_point(|s| s.timestamp <= time);
    if after == 0 {
        warn!(
            "No sample at or before t={:.4} (first sample t={:.4}), using the last sample",
            time, samples[0].timestamp
        );
        return Some(samples.len() - 1);
    }
    Some(after - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use erp_types::EventCode;

    fn buffer_with(times: &[f64]) -> SampleBuffer {
        let buffer = SampleBuffer::new();
        for &t in times {
            buffer.push(vec![t * 10.0], t);
        }
        buffer
    }

    fn event(t: f64, target: bool, index: usize) -> Event {
        Event::new(t, EventCode::encode(target, index).unwrap())
    }

    #[test]
    fn test_nearest_sample_without_look_ahead() {
        let buffer = buffer_with(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(buffer.find_index_at_or_before(2.5), Some(1));
        assert_eq!(buffer.find_index_at_or_before(3.0), Some(2));
        assert_eq!(buffer.find_index_at_or_before(9.0), Some(3));

        buffer.tag_events(&[event(2.5, true, 1)]);
        let table = buffer.snapshot();
        assert_eq!(table.event_codes(), &[0, 6, 0, 0]);
    }

    #[test]
    fn test_event_before_first_sample_falls_back_to_last() {
        let buffer = buffer_with(&[1.0, 2.0, 3.0]);
        assert_eq!(buffer.find_index_at_or_before(0.5), Some(2));
        assert_eq!(SampleBuffer::new().find_index_at_or_before(0.5), None);
    }

    #[test]
    fn test_later_event_overwrites_same_sample() {
        let buffer = buffer_with(&[1.0, 2.0]);
        let applied = buffer.tag_events(&[event(1.2, false, 0), event(1.7, true, 2)]);
        assert_eq!(applied, 2);
        assert_eq!(buffer.snapshot().event_codes(), &[7, 0]);
    }

    #[test]
    fn test_export_writes_rows_then_appends() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = buffer_with(&[1.0, 2.0]);
        buffer.tag_events(&[event(2.0, false, 0)]);

        let path = buffer.export_to_table(dir.path(), 3, true).unwrap();
        assert!(path.ends_with("Subject_3_Data.csv"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1,0,10\n2,1,20\n");

        buffer.clear();
        buffer.push(vec![0.5], 3.0);
        buffer.export_to_table(dir.path(), 3, true).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.ends_with("3,0,0.5\n"));

        buffer.export_to_table(dir.path(), 3, false).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "3,0,0.5\n");
    }

    #[test]
    fn test_clear_then_export_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = buffer_with(&[1.0, 2.0, 3.0]);
        buffer.clear();
        let path = dir.path().join("empty.csv");
        assert_eq!(buffer.write_table(&path, false).unwrap(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_slice_is_half_open() {
        let buffer = buffer_with(&[1.0, 2.0, 3.0, 4.0]);
        let table = buffer.slice(2.0, 4.0);
        assert_eq!(table.timestamps(), &[2.0, 3.0]);
        assert!(buffer.slice(5.0, 6.0).is_empty());
        assert!(buffer.slice(3.0, 1.0).is_empty());
    }
}
