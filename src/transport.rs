use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Url;

use crate::{
    outcome::BODY_SNIPPET_CHARS, text::truncate_chars, ClientOptions, Outcome, RequestSpec,
};

/// Performs exactly one network attempt and classifies the result.
///
/// Never fails: every error the transport can produce maps to an [`Outcome`].
pub(crate) async fn invoke(
    http: &reqwest::Client,
    spec: &RequestSpec,
    url: &Url,
    headers: &HeaderMap,
    timeout: Duration,
    options: &ClientOptions,
) -> Outcome {
    let mut builder = http
        .request(spec.method.clone(), url.clone())
        .headers(headers.clone())
        .timeout(timeout);
    if let Some(body) = &spec.body {
        builder = builder.body(body.bytes.clone());
    }

    let response = match builder.send().await {
        Ok(response) => response,
        Err(err) => {
            let outcome = Outcome::transport(&err);
            if options.debug {
                tracing::debug!(method = %spec.method, url = %spec.url, error = %err, "transport failure");
            }
            return outcome;
        }
    };

    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(err) => {
            if options.debug {
                tracing::debug!(status = status.as_u16(), error = %err, "failed reading response body");
            }
            return Outcome::transport(&err);
        }
    };

    if options.debug {
        tracing::debug!(status = status.as_u16(), bytes = bytes.len(), "response received");
    }

    if status.is_success() {
        return Outcome::from_success_body(&bytes);
    }

    let body = String::from_utf8_lossy(&bytes);
    if options.debug {
        tracing::debug!(
            status = status.as_u16(),
            body = truncate_chars(&body, BODY_SNIPPET_CHARS),
            "error response"
        );
    }
    Outcome::from_status(status, &body, retry_after.as_deref())
}
