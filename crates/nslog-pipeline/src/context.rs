use nslog_types::{LogRecord, count_specifiers};

use crate::pipeline::Stage;

/// Splits the call context into interpolation arguments and payload.
///
/// A non-string message is moved to the front of the payload first, leaving
/// an empty message with no specifiers.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContextStage;

impl Stage for ContextStage {
    fn name(&self) -> &str {
        "context"
    }

    fn apply(&self, mut record: LogRecord) -> Option<LogRecord> {
        if let Some(displaced) = record.displaced_message.take() {
            record.payload.push(displaced);
            record.message.clear();
        }

        let count = count_specifiers(&record.message).min(record.raw_context.len());
        let (args, rest) = record.raw_context.split_at(count);

        record.interpolation_args = args.to_vec();
        record.payload.extend_from_slice(rest);

        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nslog_types::{Level, Value};
    use serde_json::json;

    fn apply(message: impl Into<Value>, ctx: Vec<Value>) -> LogRecord {
        ContextStage
            .apply(LogRecord::new(Level::Info, message, ctx))
            .unwrap()
    }

    #[test]
    fn test_interpolation_prefix() {
        let out = apply(
            "%s has %d items",
            vec![Value::from("cart"), Value::from(3), Value::from(json!({"extra": 1}))],
        );
        assert_eq!(out.interpolation_args, vec![Value::from("cart"), Value::from(3)]);
        assert_eq!(out.payload, vec![Value::from(json!({"extra": 1}))]);
    }

    #[test]
    fn test_more_specifiers_than_args() {
        let out = apply("%s %s %s", vec![Value::from("a")]);
        assert_eq!(out.interpolation_args, vec![Value::from("a")]);
        assert!(out.payload.is_empty());
    }

    #[test]
    fn test_non_string_message_goes_first() {
        let out = apply(json!({"id": 7}), vec![Value::from("%s"), Value::from(1)]);
        assert_eq!(out.message, "");
        assert!(out.interpolation_args.is_empty());
        assert_eq!(
            out.payload,
            vec![Value::from(json!({"id": 7})), Value::from("%s"), Value::from(1)]
        );
    }

    #[test]
    fn test_context_order_preserved() {
        let ctx: Vec<Value> = (0..5).map(Value::from).collect();
        let out = apply("%d", ctx.clone());
        assert_eq!(out.raw_context, ctx);
        assert_eq!(out.interpolation_args.len() + out.payload.len(), ctx.len());
        assert_eq!(out.payload, ctx[1..].to_vec());
    }
}
