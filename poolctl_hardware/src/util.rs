use std::time::Duration;

/// Run `op` up to `1 + retries` times, sleeping `backoff` between attempts.
///
/// `op` receives the zero-based attempt number. The last error is returned
/// when every attempt fails. `sleep` is injected so callers can route it
/// through a `Clock`.
pub fn retry_with_backoff<T, E: std::fmt::Display>(
    retries: u32,
    backoff: Duration,
    mut sleep: impl FnMut(Duration),
    mut op: impl FnMut(u32) -> Result<T, E>,
) -> Result<T, E> {
    let mut attempt = 0;
    loop {
        match op(attempt) {
            Ok(v) => return Ok(v),
            Err(e) if attempt < retries => {
                attempt += 1;
                tracing::warn!(retries = attempt, error = %e, "hardware call failed, retrying");
                if !backoff.is_zero() {
                    sleep(backoff);
                }
            }
            Err(e) => return Err(e),
        }
    }
}
