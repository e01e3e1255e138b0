//! `cancel` subcommand: abort every active execution on a stream.

use tracing::{debug, info};

use crate::cli::CancelArgs;
use crate::domo::DomoClient;
use crate::error::AppError;

/// Executions fetched per page.
const PAGE_LIMIT: u64 = 500;

/// Pages through the stream's executions and aborts every active one.
pub async fn run(client: DomoClient, args: CancelArgs) -> Result<(), AppError> {
    let mut offset = 0;

    loop {
        debug!("Getting executions page");
        let executions = client
            .list_executions(args.stream_id, PAGE_LIMIT, offset)
            .await?;

        for execution in &executions {
            let active = execution
                .current_state
                .as_deref()
                .is_some_and(|state| state.eq_ignore_ascii_case("active"));

            if active {
                info!("Aborting execution {}", execution.id);
                client
                    .abort_execution(args.stream_id, execution.id)
                    .await?;
            }
        }

        if (executions.len() as u64) < PAGE_LIMIT {
            break;
        }

        // The API pages by execution id rather than row offset.
        match executions.last() {
            Some(last) => offset = last.id,
            None => break,
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use url::Url;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> DomoClient {
        let base_url = Url::parse(&server.uri()).unwrap();
        DomoClient::new(
            Arc::new(reqwest::Client::new()),
            base_url,
            "test_token".to_string(),
        )
    }

    #[tokio::test]
    async fn aborts_only_active_executions() {
        let server = MockServer::start().await;
        let client = test_client(&server);

        Mock::given(method("GET"))
            .and(path("/v1/streams/42/executions"))
            .and(query_param("limit", "500"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "id": 1, "currentState": "SUCCESS" },
                { "id": 2, "currentState": "ACTIVE" },
                { "id": 3, "currentState": "active" },
                { "id": 4, "currentState": "ERROR" }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        for id in [2, 3] {
            Mock::given(method("PUT"))
                .and(path(format!("/v1/streams/42/executions/{}/abort", id)))
                .respond_with(ResponseTemplate::new(200))
                .expect(1)
                .mount(&server)
                .await;
        }

        Mock::given(method("PUT"))
            .and(path("/v1/streams/42/executions/1/abort"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        run(client, CancelArgs { stream_id: 42 }).await.unwrap();
    }

    #[tokio::test]
    async fn full_page_advances_offset_to_last_execution_id() {
        let server = MockServer::start().await;
        let client = test_client(&server);

        // A full page of 500 executions: the next request must page with the
        // last returned execution id as the offset, not a row count.
        let full_page: Vec<serde_json::Value> = (1..=500)
            .map(|id| serde_json::json!({ "id": id, "currentState": "SUCCESS" }))
            .collect();

        Mock::given(method("GET"))
            .and(path("/v1/streams/42/executions"))
            .and(query_param("limit", "500"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&full_page))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/streams/42/executions"))
            .and(query_param("limit", "500"))
            .and(query_param("offset", "500"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "id": 501, "currentState": "ACTIVE" }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/v1/streams/42/executions/501/abort"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        run(client, CancelArgs { stream_id: 42 }).await.unwrap();
    }

    #[tokio::test]
    async fn abort_failure_stops_the_run() {
        let server = MockServer::start().await;
        let client = test_client(&server);

        Mock::given(method("GET"))
            .and(path("/v1/streams/42/executions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "id": 7, "currentState": "ACTIVE" }
            ])))
            .mount(&server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/v1/streams/42/executions/7/abort"))
            .respond_with(ResponseTemplate::new(500).set_body_string("abort broke"))
            .expect(1)
            .mount(&server)
            .await;

        let err = run(client, CancelArgs { stream_id: 42 })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn short_page_ends_pagination() {
        let server = MockServer::start().await;
        let client = test_client(&server);

        Mock::given(method("GET"))
            .and(path("/v1/streams/42/executions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        run(client, CancelArgs { stream_id: 42 }).await.unwrap();
    }
}
