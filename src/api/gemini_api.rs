use backon::{ExponentialBuilder, Retryable};
use std::time::Duration;
use tracing::warn;
use url::Url;

pub fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(3))
        .with_max_times(3)
        .with_jitter()
}

pub struct GeminiApi;

impl GeminiApi {
    /// POST a `generateContent` body. 5xx responses and transport failures are
    /// retried under `retry_policy`; any other status is handed back to the caller.
    pub async fn try_post_generate<T>(
        client: &reqwest::Client,
        url: &Url,
        api_key: &str,
        retry_policy: ExponentialBuilder,
        body: &T,
    ) -> Result<reqwest::Response, reqwest::Error>
    where
        T: serde::Serialize,
    {
        (|| async {
            let resp = client
                .post(url.clone())
                .header("x-goog-api-key", api_key)
                .json(body)
                .send()
                .await?;
            if resp.status().is_server_error()
                && let Err(err) = resp.error_for_status_ref()
            {
                return Err(err);
            }
            Ok(resp)
        })
        .retry(retry_policy)
        .when(is_transient)
        .notify(|err: &reqwest::Error, dur: Duration| {
            warn!(error = %err, "Gemini request failed, retrying in {:?}", dur);
        })
        .await
    }
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout()
        || err.is_connect()
        || err.status().is_some_and(|s| s.is_server_error())
}
