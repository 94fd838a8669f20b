use anyhow::Result;

/// The whole application runs on one thread. Stopwatch, ticker and store calls are interleaved
/// cooperatively by the session loop.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
