use std::fmt;
use std::sync::Arc;

use nslog_types::{Level, LogRecord};

use crate::classify::ErrorStage;
use crate::context::ContextStage;
use crate::filter::FilterStage;

/// One transformation of a record.
///
/// Returning `None` rejects the record: no later stage and no sink runs.
/// Stages must not reorder `raw_context`.
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, record: LogRecord) -> Option<LogRecord>;
}

/// Rejects records less severe than the logger's minimum level
#[derive(Clone, Copy, Debug)]
pub struct LevelGate {
    pub minimum: Level,
}

impl Stage for LevelGate {
    fn name(&self) -> &str {
        "level"
    }

    fn apply(&self, record: LogRecord) -> Option<LogRecord> {
        record
            .level
            .is_at_least_as_severe_as(self.minimum)
            .then_some(record)
    }
}

/// Joins the record's namespace segments
#[derive(Clone, Debug)]
pub struct NameStage {
    pub delimiter: String,
}

impl Stage for NameStage {
    fn name(&self) -> &str {
        "name"
    }

    fn apply(&self, mut record: LogRecord) -> Option<LogRecord> {
        let joined = record.namespace_segments.join(&self.delimiter);
        record.namespace = (!joined.is_empty()).then_some(joined);
        Some(record)
    }
}

/// The ordered stage chain shared by a logger and its children
#[derive(Clone)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    /// Build the fixed chain followed by `extra` caller stages:
    /// level gate, name, filter, context, errors, extras.
    pub fn new(
        minimum: Level,
        namespace_delimiter: &str,
        filter: FilterStage,
        extra: Vec<Arc<dyn Stage>>,
    ) -> Self {
        let mut stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(LevelGate { minimum }),
            Arc::new(NameStage {
                delimiter: namespace_delimiter.to_string(),
            }),
            Arc::new(filter),
            Arc::new(ContextStage),
            Arc::new(ErrorStage),
        ];
        stages.extend(extra);

        Self { stages }
    }

    /// Run every stage in order, stopping at the first rejection
    pub fn process(&self, record: LogRecord) -> Option<LogRecord> {
        self.stages
            .iter()
            .try_fold(record, |record, stage| stage.apply(record))
    }

    /// Stage names in execution order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nslog_types::{ErrorValue, Value};
    use parking_lot::Mutex;
    use serde_json::json;

    fn pipeline(filter: &str, extra: Vec<Arc<dyn Stage>>) -> Pipeline {
        let filter = FilterStage::new(filter, Level::Debug, ":").unwrap();
        Pipeline::new(Level::Silly, ":", filter, extra)
    }

    fn record(level: Level, segments: &[&str], message: impl Into<Value>, ctx: Vec<Value>) -> LogRecord {
        LogRecord::new(level, message, ctx)
            .with_segments(segments.iter().map(|s| s.to_string()).collect())
    }

    /// Counts how many records reach it
    struct Counter(Arc<Mutex<usize>>);

    impl Stage for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn apply(&self, record: LogRecord) -> Option<LogRecord> {
            *self.0.lock() += 1;
            Some(record)
        }
    }

    #[test]
    fn test_stage_order() {
        let hits = Arc::new(Mutex::new(0));
        let p = pipeline("*", vec![Arc::new(Counter(hits))]);
        assert_eq!(
            p.stage_names(),
            vec!["level", "name", "filter", "context", "errors", "counter"]
        );
    }

    #[test]
    fn test_full_classification() {
        let p = pipeline("*", vec![]);
        let out = p
            .process(record(
                Level::Info,
                &["shop", "cart"],
                "%s has %d items",
                vec![
                    Value::from("cart"),
                    Value::from(3),
                    Value::from(json!({"extra": 1})),
                    Value::from(ErrorValue::new("Error", "x")),
                ],
            ))
            .unwrap();

        assert_eq!(out.namespace.as_deref(), Some("shop:cart"));
        assert_eq!(out.interpolation_args, vec![Value::from("cart"), Value::from(3)]);
        assert_eq!(out.payload, vec![Value::from(json!({"extra": 1}))]);
        assert_eq!(out.errors, vec![ErrorValue::new("Error", "x")]);
        assert_eq!(out.formatted_message(), "cart has 3 items");
        assert_eq!(out.raw_context.len(), 4);
    }

    #[test]
    fn test_rejection_short_circuits() {
        let hits = Arc::new(Mutex::new(0));
        let p = pipeline("-noisy", vec![Arc::new(Counter(Arc::clone(&hits)))]);

        assert!(p.process(record(Level::Debug, &["noisy"], "x", vec![])).is_none());
        assert_eq!(*hits.lock(), 0);

        assert!(p.process(record(Level::Debug, &["quiet"], "x", vec![])).is_some());
        assert_eq!(*hits.lock(), 1);
    }

    #[test]
    fn test_level_gate_runs_before_filter() {
        let filter = FilterStage::new("*", Level::Debug, ":").unwrap();
        let p = Pipeline::new(Level::Info, ":", filter, vec![]);

        assert!(p.process(record(Level::Debug, &["a"], "x", vec![])).is_none());
        assert!(p.process(record(Level::Warn, &["a"], "x", vec![])).is_some());
    }

    #[test]
    fn test_no_segments_means_no_namespace() {
        let out = NameStage {
            delimiter: ":".into(),
        }
        .apply(LogRecord::new(Level::Info, "x", vec![]))
        .unwrap();
        assert_eq!(out.namespace, None);
    }
}
