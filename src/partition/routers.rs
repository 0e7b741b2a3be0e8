//! Partition router implementations

use super::periods::Period;
use super::types::{PartitionRouter, PartitionSpec, PartitionValue};

// ============================================================================
// Monthly Router
// ============================================================================

/// One request per period for a single partition
///
/// Period boundaries are rendered with the partition's own date format.
#[derive(Debug, Clone)]
pub struct MonthlyRouter<'a> {
    spec: &'a PartitionSpec,
    periods: &'a [Period],
}

impl<'a> MonthlyRouter<'a> {
    /// Create a new monthly router
    pub fn new(spec: &'a PartitionSpec, periods: &'a [Period]) -> Self {
        Self { spec, periods }
    }
}

impl PartitionRouter for MonthlyRouter<'_> {
    fn partitions(&self) -> Vec<PartitionValue> {
        self.periods
            .iter()
            .map(|period| self.spec.period_values(period))
            .collect()
    }
}

// ============================================================================
// List Router
// ============================================================================

/// One request per partition, identifier parameter only
#[derive(Debug, Clone)]
pub struct ListRouter<'a> {
    specs: Vec<&'a PartitionSpec>,
}

impl<'a> ListRouter<'a> {
    /// Create a new list router
    pub fn new(specs: Vec<&'a PartitionSpec>) -> Self {
        Self { specs }
    }
}

impl PartitionRouter for ListRouter<'_> {
    fn partitions(&self) -> Vec<PartitionValue> {
        self.specs
            .iter()
            .map(|spec| {
                PartitionValue::new(spec.id_string()).with_value(spec.param.clone(), spec.id.clone())
            })
            .collect()
    }
}
