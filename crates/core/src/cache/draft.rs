//! Shipment draft: the rows a user is filling in before submitting a shipment.
//!
//! Each row narrows down sample → size label → box → quantity. Option lists
//! are always derived from the cached sizes passed in, never stored.

use serde::{Deserialize, Serialize};

use crate::types::{ShipmentLineRequest, ShipmentRequest, Size};

/// One row of the shipment form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftLine {
    pub sample_code: Option<String>,
    pub size_label: Option<String>,
    pub box_number: Option<String>,
    pub quantity: Option<i32>,
}

impl DraftLine {
    /// Drop everything below the sample choice.
    fn clear_selection(&mut self) {
        self.size_label = None;
        self.box_number = None;
        self.quantity = None;
    }

    /// The line as a request, if every field is chosen.
    fn to_request(&self) -> Option<ShipmentLineRequest> {
        Some(ShipmentLineRequest {
            sample_code: self.sample_code.clone()?,
            size_label: self.size_label.clone()?,
            box_number: self.box_number.clone()?,
            quantity: self.quantity.filter(|q| *q > 0)?,
        })
    }

    /// The size record this line currently points at.
    fn matching<'a>(&self, sizes: &'a [Size]) -> Option<&'a Size> {
        let label = self.size_label.as_deref()?;
        let box_number = self.box_number.as_deref()?;
        sizes
            .iter()
            .find(|s| s.size_label == label && s.in_box(box_number))
    }
}

/// The in-progress shipment form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentDraft {
    pub recipient: String,
    pub courier: String,
    lines: Vec<DraftLine>,
}

impl Default for ShipmentDraft {
    fn default() -> Self {
        Self {
            recipient: String::new(),
            courier: String::new(),
            lines: vec![DraftLine::default()],
        }
    }
}

impl ShipmentDraft {
    /// A draft with one empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lines(&self) -> &[DraftLine] {
        &self.lines
    }

    #[must_use]
    pub fn line(&self, index: usize) -> Option<&DraftLine> {
        self.lines.get(index)
    }

    pub fn add_line(&mut self) {
        self.lines.push(DraftLine::default());
    }

    /// Remove a row. The first row always stays.
    pub fn remove_line(&mut self, index: usize) {
        if index > 0 && index < self.lines.len() {
            self.lines.remove(index);
        }
    }

    /// Choose the sample of a row, resetting the rest of it.
    pub fn select_sample(&mut self, index: usize, code: Option<String>) {
        if let Some(line) = self.lines.get_mut(index) {
            *line = DraftLine {
                sample_code: code,
                ..DraftLine::default()
            };
        }
    }

    /// Choose the size label of a row, resetting box and quantity.
    pub fn select_size(&mut self, index: usize, label: Option<String>) {
        if let Some(line) = self.lines.get_mut(index) {
            line.size_label = label;
            line.box_number = None;
            line.quantity = None;
        }
    }

    /// Choose the box of a row, resetting the quantity.
    pub fn select_box(&mut self, index: usize, box_number: Option<String>) {
        if let Some(line) = self.lines.get_mut(index) {
            line.box_number = box_number;
            line.quantity = None;
        }
    }

    pub fn select_quantity(&mut self, index: usize, quantity: Option<i32>) {
        if let Some(line) = self.lines.get_mut(index) {
            line.quantity = quantity;
        }
    }

    /// Size labels offered for a row: those of the sample not already taken by
    /// another row of the same sample.
    #[must_use]
    pub fn size_options(&self, index: usize, sizes: &[Size]) -> Vec<String> {
        let Some(code) = self.line(index).and_then(|l| l.sample_code.as_deref()) else {
            return Vec::new();
        };
        let used: Vec<&str> = self
            .lines
            .iter()
            .enumerate()
            .filter(|(i, l)| *i != index && l.sample_code.as_deref() == Some(code))
            .filter_map(|(_, l)| l.size_label.as_deref())
            .collect();

        let mut labels: Vec<String> = Vec::new();
        for size in sizes {
            if !used.contains(&size.size_label.as_str()) && !labels.contains(&size.size_label) {
                labels.push(size.size_label.clone());
            }
        }
        labels
    }

    /// Boxes holding the chosen size label of a row.
    #[must_use]
    pub fn box_options(&self, index: usize, sizes: &[Size]) -> Vec<String> {
        let Some(label) = self.line(index).and_then(|l| l.size_label.as_deref()) else {
            return Vec::new();
        };
        sizes
            .iter()
            .filter(|s| s.size_label == label)
            .filter_map(|s| s.box_number.clone())
            .collect()
    }

    /// Quantities that may be shipped from the chosen size and box: `1..=available`.
    #[must_use]
    pub fn quantity_options(&self, index: usize, sizes: &[Size]) -> Vec<i32> {
        self.line(index)
            .and_then(|l| l.matching(sizes))
            .map(|s| (1..=s.quantity).collect())
            .unwrap_or_default()
    }

    /// Clear selections of rows for `code` that `sizes` no longer supports.
    ///
    /// A row whose size label (and box, once chosen) no longer exists loses its
    /// size, box and quantity. A row asking for more than is now available loses
    /// its quantity. Returns whether any row changed.
    pub fn reconcile(&mut self, code: &str, sizes: &[Size]) -> bool {
        let mut changed = false;
        for line in self
            .lines
            .iter_mut()
            .filter(|l| l.sample_code.as_deref() == Some(code))
        {
            let Some(label) = line.size_label.as_deref() else {
                continue;
            };
            let exists = match line.box_number.as_deref() {
                Some(box_number) => sizes
                    .iter()
                    .any(|s| s.size_label == label && s.in_box(box_number)),
                None => sizes.iter().any(|s| s.size_label == label),
            };
            if !exists {
                line.clear_selection();
                changed = true;
                continue;
            }
            let available = line.matching(sizes).map(|s| s.quantity);
            if let (Some(requested), Some(available)) = (line.quantity, available) {
                if requested > available {
                    line.quantity = None;
                    changed = true;
                }
            }
        }
        changed
    }

    /// Point rows of a renamed sample at its new code.
    pub fn rename_sample(&mut self, old_code: &str, new_code: &str) -> bool {
        let mut changed = false;
        for line in &mut self.lines {
            if line.sample_code.as_deref() == Some(old_code) {
                line.sample_code = Some(new_code.to_owned());
                changed = true;
            }
        }
        changed
    }

    /// Empty rows that reference a deleted sample.
    pub fn forget_sample(&mut self, code: &str) -> bool {
        let mut changed = false;
        for line in &mut self.lines {
            if line.sample_code.as_deref() == Some(code) {
                *line = DraftLine::default();
                changed = true;
            }
        }
        changed
    }

    /// Fully specified rows, ready to submit.
    #[must_use]
    pub fn complete_lines(&self) -> Vec<ShipmentLineRequest> {
        self.lines.iter().filter_map(DraftLine::to_request).collect()
    }

    /// The request to submit, or `None` if there is nothing complete to ship.
    #[must_use]
    pub fn to_request(&self) -> Option<ShipmentRequest> {
        let lines = self.complete_lines();
        if lines.is_empty() {
            return None;
        }
        Some(ShipmentRequest {
            recipient: self.recipient.clone(),
            courier: self.courier.clone(),
            lines,
        })
    }

    /// Start over after a successful submission.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
