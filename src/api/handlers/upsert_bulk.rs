//! Bulk NDJSON ingest endpoint.
//!
//! Accepts newline-delimited product objects, optionally gzipped. A line
//! that fails to decode becomes a rejected result; it never aborts the
//! batch.

use std::collections::{BTreeSet, HashMap};
use std::io::Read;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use flate2::read::GzDecoder;

use crate::api::middleware::TenantExtension;
use crate::domain::{Product, ProductDisposition};
use crate::error::ApiError;
use crate::ingest::validate::ValidationIssue;
use crate::ingest::{
    ProcessOutput, ProcessSummary, ProductProcessResult, UnknownKeyWarning, new_run_id,
    parse_product_object,
};
use crate::server::AppState;

use super::types::persist_and_respond;

/// Largest NDJSON line accepted.
const MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

/// Ingests gzipped or plain NDJSON products and records a run.
#[utoipa::path(
    post,
    path = "/v1/debug/products:upsert-bulk",
    request_body(content = String, content_type = "application/x-ndjson", description = "Newline-delimited product objects, optionally gzipped"),
    responses(
        (status = 200, description = "Run recorded", body = super::types::RunResponse),
        (status = 400, description = "Unsupported encoding or unreadable body", body = crate::error::ApiError),
        (status = 500, description = "Processing or persistence failed", body = crate::error::ApiError)
    ),
    tag = "ingest"
)]
pub async fn handle(
    State(state): State<AppState>,
    TenantExtension(tenant_id): TenantExtension,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let run_id = new_run_id();

    let encoding = headers
        .get("content-encoding")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let decoded = match decode_body(&body, encoding) {
        Ok(decoded) => decoded,
        Err(response) => return response,
    };

    let mut unknown: BTreeSet<String> = BTreeSet::new();
    let mut parsed_products: HashMap<String, Product> = HashMap::new();

    let mut out = ProcessOutput {
        summary: ProcessSummary::default(),
        products: Vec::new(),
    };

    let store = state.store.clone();
    let lookup = move |key: String| {
        let store = store.clone();
        async move { store.get_product_hash(tenant_id, &key).await }
    };

    for line in decoded.split(|b| *b == b'\n') {
        let line = trim_ascii(line);
        if line.is_empty() {
            continue;
        }
        if line.len() > MAX_LINE_BYTES {
            return ApiError::bad_request("read_failed", "line exceeds 10MiB limit")
                .into_response();
        }

        out.summary.received += 1;

        let (product, line_unknown) = match parse_product_object(line) {
            Ok(parsed) => parsed,
            Err(err) => {
                out.products.push(ProductProcessResult {
                    product_key: String::new(),
                    hash: String::new(),
                    disposition: ProductDisposition::Rejected,
                    reason: "invalid_json_line".to_string(),
                    issues: vec![ValidationIssue {
                        path: "$".to_string(),
                        code: "invalid_json".to_string(),
                        message: err.to_string(),
                    }],
                });
                out.summary.rejected += 1;
                continue;
            }
        };

        unknown.extend(line_unknown);

        let (result, valid) = match state
            .processor
            .process_product(&product, &state.enabled_channels, &lookup)
            .await
        {
            Ok(processed) => processed,
            Err(err) => {
                return ApiError::internal("processing_failed", err.to_string()).into_response();
            }
        };

        out.summary.record(&result, valid);
        if valid {
            parsed_products.insert(product.product_key.clone(), product);
        }
        out.products.push(result);
    }

    let warnings = UnknownKeyWarning::from_set(unknown);
    let products: Vec<Product> = parsed_products.into_values().collect();

    persist_and_respond(&state, tenant_id, run_id, &products, out, warnings).await
}

fn decode_body(body: &[u8], content_encoding: &str) -> Result<Vec<u8>, Response> {
    let encoding = content_encoding.trim().to_ascii_lowercase();

    if encoding.is_empty() {
        return Ok(body.to_vec());
    }

    if encoding != "gzip" {
        return Err(ApiError::bad_request(
            "invalid_encoding",
            format!("unsupported content-encoding {encoding:?}"),
        )
        .into_response());
    }

    let mut decoded = Vec::new();
    GzDecoder::new(body)
        .read_to_end(&mut decoded)
        .map_err(|err| {
            ApiError::bad_request("invalid_encoding", err.to_string()).into_response()
        })?;

    Ok(decoded)
}

fn trim_ascii(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &line[start..end]
}
