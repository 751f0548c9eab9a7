//! Per-step loss records and the scalar log
//!
//! Every training step produces one [`LossRecord`]. The history is
//! append-only and is written as CSV for external dashboards.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Names of the logged scalars, in column order
pub const LOSS_NAMES: [&str; 5] = [
    "dloss_local",
    "dloss_global",
    "gloss_local",
    "gloss_global",
    "gloss_L1",
];

/// Losses of one training step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossRecord {
    /// Epoch the step belongs to
    pub epoch: usize,
    /// Position of the font in the dataset
    pub font: usize,
    /// Discriminator local loss, averaged over the real and fake steps
    pub dloss_local: f64,
    /// Discriminator global loss, averaged over the real and fake steps
    pub dloss_global: f64,
    /// Generator local adversarial loss
    pub gloss_local: f64,
    /// Generator global adversarial loss
    pub gloss_global: f64,
    /// Generator mean absolute reconstruction error
    #[serde(rename = "gloss_L1")]
    pub gloss_l1: f64,
}

impl LossRecord {
    /// Named values in [`LOSS_NAMES`] order
    pub fn named_values(&self) -> [(&'static str, f64); 5] {
        [
            (LOSS_NAMES[0], self.dloss_local),
            (LOSS_NAMES[1], self.dloss_global),
            (LOSS_NAMES[2], self.gloss_local),
            (LOSS_NAMES[3], self.gloss_global),
            (LOSS_NAMES[4], self.gloss_l1),
        ]
    }
}

/// Append-only loss history
#[derive(Debug, Clone, Default)]
pub struct LossHistory {
    records: Vec<LossRecord>,
}

impl LossHistory {
    /// Create new empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one step
    pub fn push(&mut self, record: LossRecord) {
        self.records.push(record);
    }

    /// Number of recorded steps
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Most recent step
    pub fn latest(&self) -> Option<&LossRecord> {
        self.records.last()
    }

    /// All records in insertion order
    pub fn records(&self) -> &[LossRecord] {
        &self.records
    }

    /// Drop every step logged after `epoch`
    pub fn retain_through(&mut self, epoch: usize) {
        self.records.retain(|r| r.epoch <= epoch);
    }

    /// Mean of every scalar over the steps of one epoch
    pub fn epoch_mean(&self, epoch: usize) -> Option<[(&'static str, f64); 5]> {
        let steps: Vec<&LossRecord> = self.records.iter().filter(|r| r.epoch == epoch).collect();
        if steps.is_empty() {
            return None;
        }

        let n = steps.len() as f64;
        let mut means = [0.0; 5];
        for record in &steps {
            for (slot, (_, value)) in means.iter_mut().zip(record.named_values()) {
                *slot += value / n;
            }
        }

        let mut named = [("", 0.0); 5];
        for (i, slot) in named.iter_mut().enumerate() {
            *slot = (LOSS_NAMES[i], means[i]);
        }
        Some(named)
    }

    /// Save history to CSV file
    pub fn save_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Load history from CSV file
    pub fn load_csv(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut history = Self::new();
        for result in reader.deserialize() {
            history.push(result?);
        }
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn record(epoch: usize, font: usize, value: f64) -> LossRecord {
        LossRecord {
            epoch,
            font,
            dloss_local: value,
            dloss_global: value * 2.0,
            gloss_local: value * 3.0,
            gloss_global: value * 4.0,
            gloss_l1: value * 5.0,
        }
    }

    #[test]
    fn test_history_append_only() {
        let mut history = LossHistory::new();
        history.push(record(0, 0, 1.0));
        history.push(record(0, 1, 2.0));

        assert_eq!(history.len(), 2);
        assert_eq!(history.latest().unwrap().font, 1);
    }

    #[test]
    fn test_epoch_mean() {
        let mut history = LossHistory::new();
        history.push(record(0, 0, 1.0));
        history.push(record(0, 1, 3.0));
        history.push(record(1, 0, 10.0));

        let means = history.epoch_mean(0).unwrap();
        assert_eq!(means[0].0, "dloss_local");
        assert_relative_eq!(means[0].1, 2.0);
        assert_relative_eq!(means[4].1, 10.0);
        assert!(history.epoch_mean(5).is_none());
    }

    #[test]
    fn test_retain_through() {
        let mut history = LossHistory::new();
        for epoch in 0..4 {
            history.push(record(epoch, 0, 1.0));
        }

        history.retain_through(1);
        assert_eq!(history.len(), 2);
        assert_eq!(history.latest().unwrap().epoch, 1);
    }

    #[test]
    fn test_csv_header_uses_logged_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scalars.csv");

        let mut history = LossHistory::new();
        history.push(record(2, 4, 0.5));
        history.save_csv(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let header = content.lines().next().unwrap();
        assert_eq!(
            header,
            "epoch,font,dloss_local,dloss_global,gloss_local,gloss_global,gloss_L1"
        );

        let loaded = LossHistory::load_csv(&path).unwrap();
        assert_eq!(loaded.records(), history.records());
    }
}
