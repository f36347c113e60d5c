//! One-hot label encoding.

use serde::Serialize;
use vision_core::{Error, Result};

/// Row-major `rows x num_classes` matrix with a single 1.0 per row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OneHotMatrix {
    data: Vec<f32>,
    rows: usize,
    num_classes: usize,
}

impl OneHotMatrix {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// One row of the matrix
    pub fn row(&self, index: usize) -> &[f32] {
        let start = index * self.num_classes;
        &self.data[start..start + self.num_classes]
    }

    /// Column of the largest value in each row. First column wins ties.
    pub fn argmax(&self) -> Vec<usize> {
        if self.num_classes == 0 {
            return Vec::new();
        }
        self.data
            .chunks_exact(self.num_classes)
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
                    .0
            })
            .collect()
    }
}

/// Encodes label indices as a one-hot matrix
pub fn encode_labels(labels: &[usize], num_classes: usize) -> Result<OneHotMatrix> {
    if num_classes == 0 {
        return Err(Error::Config("num_classes must be at least 1".to_string()));
    }

    let mut data = vec![0.0; labels.len() * num_classes];
    for (row, &label) in labels.iter().enumerate() {
        if label >= num_classes {
            return Err(Error::LabelOutOfRange { label, num_classes });
        }
        data[row * num_classes + label] = 1.0;
    }

    Ok(OneHotMatrix {
        data,
        rows: labels.len(),
        num_classes,
    })
}
