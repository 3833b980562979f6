use nslog_types::{ErrorValue, LogRecord};

use crate::pipeline::Stage;

/// Moves every error-shaped payload item into `errors`, in scan order
#[derive(Clone, Copy, Debug, Default)]
pub struct ErrorStage;

impl Stage for ErrorStage {
    fn name(&self) -> &str {
        "errors"
    }

    fn apply(&self, mut record: LogRecord) -> Option<LogRecord> {
        let payload = std::mem::take(&mut record.payload);

        for item in payload {
            match ErrorValue::from_value(&item) {
                Some(error) => record.errors.push(error),
                None => record.payload.push(item),
            }
        }

        Some(record)
    }
}
