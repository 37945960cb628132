use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::types::{Column, TableId, TypedRow, OUTPUT_COLUMNS};
use crate::warehouse::Warehouse;

const MULTIPART_BOUNDARY: &str = "crypto_listings_load_boundary";

/// Delay between load job status checks.
const JOB_POLL_INTERVAL: Duration = Duration::from_secs(1);

const BIGQUERY_SCOPES: &[&str] = &["https://www.googleapis.com/auth/bigquery"];

/// Supplies the bearer token sent with BigQuery requests.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<String>;
}

/// A fixed token, from `BIGQUERY_ACCESS_TOKEN`.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Application Default Credentials: service account file, gcloud user
/// credentials or the metadata server, whichever is found first.
pub struct DefaultCredentials {
    provider: Arc<dyn gcp_auth::TokenProvider>,
}

impl DefaultCredentials {
    pub async fn discover() -> Result<Self> {
        let provider = gcp_auth::provider().await?;
        let project = provider.project_id().await.ok();
        info!(?project, "Using application default credentials");
        Ok(Self { provider })
    }
}

#[async_trait]
impl TokenSource for DefaultCredentials {
    async fn token(&self) -> Result<String> {
        // The provider caches tokens and refreshes them before expiry.
        let token = self.provider.token(BIGQUERY_SCOPES).await?;
        Ok(token.as_str().to_string())
    }
}

/// Appends through a BigQuery load job (`WRITE_APPEND`) and waits for it to finish.
pub struct BigQueryWarehouse {
    client: reqwest::Client,
    api_url: String,
    tokens: Box<dyn TokenSource>,
    location: Option<String>,
    load_timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Job {
    job_reference: JobReference,
    #[serde(default)]
    status: JobStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    #[serde(default)]
    state: String,
    error_result: Option<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
}

impl BigQueryWarehouse {
    pub fn new(
        api_url: &str,
        tokens: Box<dyn TokenSource>,
        location: Option<String>,
        load_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            tokens,
            location,
            load_timeout,
        })
    }

    async fn insert_job(&self, token: &str, table: &TableId, rows: &[TypedRow]) -> Result<Job> {
        let url = format!(
            "{}/upload/bigquery/v2/projects/{}/jobs?uploadType=multipart",
            self.api_url, table.project
        );
        let body = multipart_body(&load_config(table), &ndjson(rows)?)?;

        let resp = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(body)
            .send()
            .await?;
        parse_job(resp).await
    }

    async fn get_job(
        &self,
        token: &str,
        project: &str,
        reference: &JobReference,
    ) -> Result<Job> {
        let url = format!(
            "{}/bigquery/v2/projects/{}/jobs/{}",
            self.api_url, project, reference.job_id
        );
        let mut req = self.client.get(&url).bearer_auth(token);
        if let Some(location) = reference.location.as_ref().or(self.location.as_ref()) {
            req = req.query(&[("location", location)]);
        }
        parse_job(req.send().await?).await
    }

    async fn poll_until_done(&self, token: &str, project: &str, mut job: Job) -> Result<Job> {
        while job.status.state != "DONE" {
            debug!(
                job_id = %job.job_reference.job_id,
                state = %job.status.state,
                "Load job pending"
            );
            tokio::time::sleep(JOB_POLL_INTERVAL).await;
            job = self.get_job(token, project, &job.job_reference).await?;
        }
        Ok(job)
    }

    async fn wait_for_done(&self, token: &str, project: &str, job: Job) -> Result<Job> {
        tokio::time::timeout(self.load_timeout, self.poll_until_done(token, project, job))
            .await
            .map_err(|_| AppError::Timeout {
                what: "BigQuery load job".to_string(),
                secs: self.load_timeout.as_secs(),
            })?
    }
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn append(&self, table: &TableId, rows: &[TypedRow]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let token = self.tokens.token().await?;
        let job = self.insert_job(&token, table, rows).await?;
        info!(job_id = %job.job_reference.job_id, %table, "Load job submitted");

        let job = self.wait_for_done(&token, &table.project, job).await?;
        if let Some(err) = job.status.error_result {
            return Err(AppError::Warehouse(format!(
                "load job {} failed: {} ({})",
                job.job_reference.job_id, err.message, err.reason
            )));
        }
        Ok(rows.len())
    }
}

async fn parse_job(resp: reqwest::Response) -> Result<Job> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AppError::Warehouse(format!("BigQuery returned {status}: {body}")));
    }
    Ok(resp.json().await?)
}

fn bigquery_type(column: Column) -> &'static str {
    match column {
        Column::CurrentPrice
        | Column::MarketCap
        | Column::Volume24h
        | Column::PercentageChange
        | Column::ZscorePrice
        | Column::RollingAvg => "FLOAT",
        _ => "STRING",
    }
}

fn load_config(table: &TableId) -> serde_json::Value {
    let fields: Vec<_> = OUTPUT_COLUMNS
        .iter()
        .map(|c| json!({ "name": c.as_str(), "type": bigquery_type(*c), "mode": "NULLABLE" }))
        .collect();
    json!({
        "configuration": {
            "load": {
                "destinationTable": {
                    "projectId": table.project,
                    "datasetId": table.dataset,
                    "tableId": table.table,
                },
                "sourceFormat": "NEWLINE_DELIMITED_JSON",
                "writeDisposition": "WRITE_APPEND",
                "createDisposition": "CREATE_IF_NEEDED",
                "schema": { "fields": fields },
            }
        }
    })
}

fn ndjson(rows: &[TypedRow]) -> Result<String> {
    let mut out = String::new();
    for row in rows {
        out.push_str(&serde_json::to_string(row)?);
        out.push('\n');
    }
    Ok(out)
}

fn multipart_body(metadata: &serde_json::Value, data: &str) -> Result<String> {
    Ok(format!(
        "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{meta}\r\n\
         --{b}\r\nContent-Type: application/octet-stream\r\n\r\n{data}\r\n--{b}--\r\n",
        b = MULTIPART_BOUNDARY,
        meta = serde_json::to_string(metadata)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn table() -> TableId {
        "proj.scraping.crypto_currency".parse().unwrap()
    }

    fn row(name: &str) -> TypedRow {
        TypedRow {
            name_symbol: name.to_string(),
            current_price: 100.0,
            change_24h: "+1%".into(),
            change_7d: "-1%".into(),
            market_cap: 1e9,
            volume_24h: 1e6,
            volume_change: "3%".into(),
            percentage_change: None,
            zscore_price: Some(0.0),
            rolling_avg: None,
            datetime_ist: "2026-10-16 12:00:00".into(),
        }
    }

    fn warehouse(server: &MockServer) -> BigQueryWarehouse {
        with_tokens(server, Box::new(StaticToken("tok".into())))
    }

    fn with_tokens(server: &MockServer, tokens: Box<dyn TokenSource>) -> BigQueryWarehouse {
        BigQueryWarehouse::new(&server.uri(), tokens, None, Duration::from_secs(5)).unwrap()
    }

    /// Hands out a fresh token per call, like an expiring credential.
    #[derive(Default)]
    struct RotatingTokens {
        issued: AtomicUsize,
    }

    #[async_trait]
    impl TokenSource for RotatingTokens {
        async fn token(&self) -> Result<String> {
            let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("tok-{n}"))
        }
    }

    struct NoCredentials;

    #[async_trait]
    impl TokenSource for NoCredentials {
        async fn token(&self) -> Result<String> {
            Err(AppError::Config("no credentials".to_string()))
        }
    }

    fn job(state: &str) -> serde_json::Value {
        json!({
            "jobReference": { "projectId": "proj", "jobId": "job_1", "location": "US" },
            "status": { "state": state }
        })
    }

    #[tokio::test]
    async fn submits_append_job_and_returns_row_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/bigquery/v2/projects/proj/jobs"))
            .and(query_param("uploadType", "multipart"))
            .and(header("authorization", "Bearer tok"))
            .and(body_string_contains("\"writeDisposition\":\"WRITE_APPEND\""))
            .and(body_string_contains("\"tableId\":\"crypto_currency\""))
            .and(body_string_contains("\"name_symbol\":\"Bitcoin BTC\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(job("DONE")))
            .expect(1)
            .mount(&server)
            .await;

        let n = warehouse(&server)
            .append(&table(), &[row("Bitcoin BTC"), row("Ethereum ETH")])
            .await
            .unwrap();
        assert_eq!(n, 2);
    }

    #[tokio::test]
    async fn polls_running_job_until_done() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(job("RUNNING")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bigquery/v2/projects/proj/jobs/job_1"))
            .and(query_param("location", "US"))
            .respond_with(ResponseTemplate::new(200).set_body_json(job("DONE")))
            .expect(1)
            .mount(&server)
            .await;

        let n = warehouse(&server).append(&table(), &[row("a")]).await.unwrap();
        assert_eq!(n, 1);
    }

    #[tokio::test]
    async fn job_error_result_fails_the_load() {
        let server = MockServer::start().await;
        let mut failed = job("DONE");
        failed["status"]["errorResult"] =
            json!({ "reason": "invalid", "message": "schema mismatch" });
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(failed))
            .mount(&server)
            .await;

        let err = warehouse(&server).append(&table(), &[row("a")]).await.unwrap_err();
        match err {
            AppError::Warehouse(msg) => assert!(msg.contains("schema mismatch"), "{msg}"),
            other => panic!("expected Warehouse error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn http_rejection_fails_the_load() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("access denied"))
            .mount(&server)
            .await;

        let err = warehouse(&server).append(&table(), &[row("a")]).await.unwrap_err();
        assert!(matches!(err, AppError::Warehouse(ref m) if m.contains("403")), "got {err:?}");
    }

    #[tokio::test]
    async fn token_is_fetched_for_every_append() {
        let server = MockServer::start().await;
        for token in ["Bearer tok-1", "Bearer tok-2"] {
            Mock::given(method("POST"))
                .and(header("authorization", token))
                .respond_with(ResponseTemplate::new(200).set_body_json(job("DONE")))
                .expect(1)
                .mount(&server)
                .await;
        }

        let wh = with_tokens(&server, Box::new(RotatingTokens::default()));
        wh.append(&table(), &[row("a")]).await.unwrap();
        wh.append(&table(), &[row("b")]).await.unwrap();
    }

    #[tokio::test]
    async fn poll_reuses_the_submit_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(job("PENDING")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(job("DONE")))
            .expect(1)
            .mount(&server)
            .await;

        let wh = with_tokens(&server, Box::new(RotatingTokens::default()));
        assert_eq!(wh.append(&table(), &[row("a")]).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn credential_failure_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(job("DONE")))
            .expect(0)
            .mount(&server)
            .await;

        let err = with_tokens(&server, Box::new(NoCredentials))
            .append(&table(), &[row("a")])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)), "got {err:?}");
    }

    #[test]
    fn schema_lists_output_columns_in_order() {
        let cfg = load_config(&table());
        let fields = cfg["configuration"]["load"]["schema"]["fields"].as_array().unwrap();
        let names: Vec<&str> = fields.iter().map(|f| f["name"].as_str().unwrap()).collect();
        let expected: Vec<&str> = OUTPUT_COLUMNS.iter().map(|c| c.as_str()).collect();
        assert_eq!(names, expected);
        assert_eq!(fields[1]["type"], "FLOAT");
        assert_eq!(fields[0]["type"], "STRING");
    }
}
