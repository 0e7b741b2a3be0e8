//! API task plan

use crate::api::ExtractionTask;
use crate::config::{ApiConfig, StreamConfig};
use crate::error::{Error, Result};
use crate::partition::{
    generate_periods, ListRouter, MonthlyRouter, PartitionRouter, PartitionSpec, PartitionValue,
};
use crate::template::{self, TemplateContext};
use serde_json::json;
use tracing::debug;

/// Build every API task in execution order
///
/// Monthly streams come first. Each one is expanded partition-major: all
/// periods of the first partition, then all periods of the next. Static
/// streams follow in configuration order; a static stream restricted to
/// partitions yields one task per partition.
pub fn build_tasks(config: &ApiConfig) -> Result<Vec<ExtractionTask>> {
    let specs = config
        .partitions
        .iter()
        .map(PartitionSpec::try_from)
        .collect::<Result<Vec<_>>>()?;

    let periods = match &config.periods {
        Some(range) => generate_periods(&range.start, &range.end)?,
        None => Vec::new(),
    };

    let mut tasks = Vec::new();

    for stream in config.streams.iter().filter(|s| s.monthly) {
        if config.periods.is_none() {
            return Err(Error::invalid_value(
                "api.periods",
                format!("stream '{}' is monthly but no period range is set", stream.endpoint),
            ));
        }
        let selected = select(&specs, stream);
        if selected.is_empty() {
            return Err(Error::invalid_value(
                "api.streams[].partitions",
                format!("monthly stream '{}' has no partition", stream.endpoint),
            ));
        }
        for spec in selected {
            let router = MonthlyRouter::new(spec, &periods);
            for value in router.partitions() {
                tasks.push(task_for(stream, spec, &value)?);
            }
        }
    }

    for stream in config.streams.iter().filter(|s| !s.monthly) {
        if stream.partitions.is_none() {
            let table = template::render(&stream.table, &TemplateContext::new())?;
            tasks.push(static_task(stream, table));
            continue;
        }

        let selected = select(&specs, stream);
        let router = ListRouter::new(selected.clone());
        for (spec, value) in selected.into_iter().zip(router.partitions()) {
            tasks.push(task_for(stream, spec, &value)?);
        }
    }

    debug!(tasks = tasks.len(), periods = periods.len(), "Built API task plan");
    Ok(tasks)
}

/// Partitions a stream applies to, in partition order
fn select<'a>(specs: &'a [PartitionSpec], stream: &StreamConfig) -> Vec<&'a PartitionSpec> {
    match &stream.partitions {
        Some(ids) => specs.iter().filter(|spec| ids.contains(&spec.id)).collect(),
        None => specs.iter().collect(),
    }
}

fn static_task(stream: &StreamConfig, table: String) -> ExtractionTask {
    let mut task = ExtractionTask::new(stream.endpoint.clone(), table)
        .with_write_mode(stream.write_mode);
    task.params = stream.params.clone();
    task
}

/// Task of one stream for one partition value
///
/// Fixed stream parameters are applied first; partition values win on
/// conflict.
fn task_for(
    stream: &StreamConfig,
    spec: &PartitionSpec,
    value: &PartitionValue,
) -> Result<ExtractionTask> {
    let mut ctx = TemplateContext::new();
    ctx.set_partition(json!({ "id": spec.id }));
    let table = template::render(&stream.table, &ctx)?;

    let mut task = static_task(stream, table);
    task.params
        .extend(value.values.iter().map(|(k, v)| (k.clone(), v.clone())));
    Ok(task)
}
