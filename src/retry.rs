use tracing::warn;

use crate::error::Result;

const MAX_AUTH_ATTEMPTS: usize = 3;

/// Run a vendor fetch, retrying on authentication failures only. The
/// vendor client is expected to clear its session when it reports an
/// auth error, so each retry re-authenticates from scratch. Gives up
/// after a bounded number of attempts and surfaces the last error.
pub async fn with_reauth<T, F, Fut>(operation: &str, mut fetch: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;
    for attempt in 1..=MAX_AUTH_ATTEMPTS {
        match fetch().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_auth() => {
                warn!(operation, attempt, error = %error, "auth failure, retrying");
                last_error = Some(error);
            }
            Err(error) => return Err(error),
        }
    }
    Err(last_error.expect("at least one attempt"))
}
