use tokio::select;
use tokio_util::sync::CancellationToken;

/// Detects Ctrl-C and turns it into a cancellation of `cancelation`. Returns early when the
/// token gets cancelled by someone else, so it can be joined with the work it guards.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => (),
    };
}
