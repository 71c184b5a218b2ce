//! Sample rows and the owned 2D table used for exports and epochs.

use serde::{Deserialize, Serialize};

use crate::event::NO_EVENT;

/// One multi-channel reading from the acquisition source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds on the acquisition clock
    pub timestamp: f64,
    pub channels: Vec<f64>,
    /// Raw event code, [`NO_EVENT`] until tagged
    pub event_code: i32,
}

impl Sample {
    pub fn new(timestamp: f64, channels: Vec<f64>) -> Self {
        Self {
            timestamp,
            channels,
            event_code: NO_EVENT,
        }
    }
}

/// Owned, row-major copy of a run of samples.
///
/// Rows keep arrival order. Every row has the same channel count; the table
/// records it from the first row it receives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleTable {
    timestamps: Vec<f64>,
    event_codes: Vec<i32>,
    values: Vec<f64>,
    channel_count: usize,
}

impl SampleTable {
    pub fn with_channels(channel_count: usize) -> Self {
        Self {
            channel_count,
            ..Default::default()
        }
    }

    pub fn from_samples<'a, I>(samples: I) -> Self
    where
        I: IntoIterator<Item = &'a Sample>,
    {
        let mut table = SampleTable::default();
        for sample in samples {
            table.push_row(sample);
        }
        table
    }

    /// Appends a row. Rows with a different channel count than the table are
    /// padded with zeros or truncated.
    pub fn push_row(&mut self, sample: &Sample) {
        if self.timestamps.is_empty() && self.channel_count == 0 {
            self.channel_count = sample.channels.len();
        }
        self.timestamps.push(sample.timestamp);
        self.event_codes.push(sample.event_code);
        let width = self.channel_count;
        self.values
            .extend((0..width).map(|c| sample.channels.get(c).copied().unwrap_or(0.0)));
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn event_codes(&self) -> &[i32] {
        &self.event_codes
    }

    /// Channel values of one row.
    pub fn row(&self, index: usize) -> Option<&[f64]> {
        if index >= self.len() {
            return None;
        }
        let start = index * self.channel_count;
        Some(&self.values[start..start + self.channel_count])
    }

    /// All values of one channel, in row order.
    pub fn column(&self, channel: usize) -> Option<Vec<f64>> {
        if channel >= self.channel_count {
            return None;
        }
        Some(
            self.values
                .iter()
                .skip(channel)
                .step_by(self.channel_count)
                .copied()
                .collect(),
        )
    }

    /// Row-major flattening of the channel values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn rows(&self) -> impl Iterator<Item = (f64, i32, &[f64])> + '_ {
        (0..self.len()).map(move |i| {
            let start = i * self.channel_count;
            (
                self.timestamps[i],
                self.event_codes[i],
                &self.values[start..start + self.channel_count],
            )
        })
    }
}
