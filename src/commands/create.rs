//! `create` subcommand: clone a dataset definition into a new stream.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::cli::CreateArgs;
use crate::domo::DomoClient;
use crate::error::AppError;

/// Columns managed by Domo itself, stripped from cloned schemas.
const DOMO_COLUMNS: &[&str] = &["_BATCH_ID_", "_BATCH_LAST_RUN_"];

/// How stream imports update the backing dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UpdateMethod {
    Append,
    Replace,
}

impl CreateArgs {
    /// Resolves the `--append`/`--replace` flags; replace is the default.
    pub fn update_method(&self) -> UpdateMethod {
        if self.append {
            UpdateMethod::Append
        } else {
            UpdateMethod::Replace
        }
    }
}

/// Fetches the template dataset, filters Domo-managed columns out of its
/// schema, and creates a new stream from it.
pub async fn run(client: DomoClient, args: CreateArgs) -> Result<(), AppError> {
    debug!("Getting dataset definition");
    let dataset = client.get_dataset(&args.dataset_id).await?;

    let name = dataset.get("name").cloned().unwrap_or(Value::Null);
    let mut schema = dataset.get("schema").cloned().unwrap_or(Value::Null);

    if let Some(columns) = schema.get_mut("columns").and_then(Value::as_array_mut) {
        columns.retain(|column| {
            column
                .get("name")
                .and_then(Value::as_str)
                .map_or(true, |n| !DOMO_COLUMNS.contains(&n))
        });
    }

    let body = serde_json::json!({
        "dataSet": {
            "name": name,
            "schema": schema,
        },
        "updateMethod": args.update_method(),
    });

    let stream = client.create_stream(&body).await?;

    info!("Created {}", json_field(&stream, "/dataSet/name"));
    info!("Data set ID: {}", json_field(&stream, "/dataSet/id"));
    info!("Stream ID: {}", json_field(&stream, "/id"));

    Ok(())
}

/// Renders a JSON pointer lookup for logging, without surrounding quotes.
fn json_field(value: &Value, pointer: &str) -> String {
    match value.pointer(pointer) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "unknown".to_string(),
    }
}
