//! Time-bounded file reads and CPU-bound work.
//!
//! Reads and compiles are the only places a request can stall, so each one
//! runs under its own budget. Parsing and printing happen on tokio's blocking
//! pool to keep the async workers free.

use crate::error::Error;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

async fn bounded<T, F>(what: impl Into<String>, budget: Duration, fut: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            what: what.into(),
            budget,
        }),
    }
}

/// Read a UTF-8 file within `budget`.
pub async fn read_text(path: &Path, budget: Duration) -> Result<String, Error> {
    bounded(format!("reading {}", path.display()), budget, async {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::from_io(path, e))
    })
    .await
}

/// Read a file's raw bytes within `budget`.
pub async fn read_bytes(path: &Path, budget: Duration) -> Result<Vec<u8>, Error> {
    bounded(format!("reading {}", path.display()), budget, async {
        tokio::fs::read(path).await.map_err(|e| Error::from_io(path, e))
    })
    .await
}

/// Run CPU-bound `work` on the blocking pool within `budget`.
///
/// On timeout the request fails immediately; the blocking task finishes in
/// the background and its result is dropped.
pub async fn run_blocking<T, F>(what: impl Into<String>, budget: Duration, work: F) -> Result<T, Error>
where
    F: FnOnce() -> Result<T, Error> + Send + 'static,
    T: Send + 'static,
{
    let what = what.into();
    let label = what.clone();
    bounded(what, budget, async move {
        tokio::task::spawn_blocking(work).await.map_err(|e| Error::Io {
            path: label.into(),
            source: std::io::Error::other(e.to_string()),
        })?
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_text() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("main.js");
        std::fs::write(&file, "export const a = 1;").unwrap();

        let text = read_text(&file, Duration::from_millis(250)).await.unwrap();
        assert_eq!(text, "export const a = 1;");
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_text(&dir.path().join("nope.js"), Duration::from_millis(250))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_run_blocking_returns_value() {
        let value = run_blocking("adding", Duration::from_millis(500), || Ok(2 + 2))
            .await
            .unwrap();
        assert_eq!(value, 4);
    }

    #[tokio::test]
    async fn test_run_blocking_propagates_error() {
        let err = run_blocking::<(), _>("parsing", Duration::from_millis(500), || {
            Err(Error::parse("/a.js", "bad"))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[tokio::test]
    async fn test_run_blocking_times_out() {
        let err = run_blocking("compiling /slow.vue", Duration::from_millis(10), || {
            std::thread::sleep(Duration::from_millis(200));
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }
}
