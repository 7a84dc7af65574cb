use serde_derive::Serialize;

/// Receptive field bookkeeping for one pipeline run.
///
/// `receptive_field` is the side length of the input region one output unit depends on,
/// `jump` the distance in input pixels between two neighbouring output units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReceptiveField {
    pub receptive_field: usize,
    pub jump: usize,
}

impl Default for ReceptiveField {
    fn default() -> Self {
        Self {
            receptive_field: 1,
            jump: 1,
        }
    }
}

impl ReceptiveField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the state after a sliding window layer (convolution or pooling),
    /// or None if it cannot be represented.
    /// Layers that keep the spatial layout must not call this.
    pub fn advance(self, kernel_size: usize, stride: usize) -> Option<ReceptiveField> {
        debug_assert!(kernel_size > 0 && stride > 0);
        let growth = kernel_size.checked_sub(1)?.checked_mul(self.jump)?;
        Some(ReceptiveField {
            receptive_field: self.receptive_field.checked_add(growth)?,
            jump: self.jump.checked_mul(stride)?,
        })
    }
}
