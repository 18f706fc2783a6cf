//! QR scanning as a cancellable single-shot event source.
//!
//! A [`ScanSession`] owns a [`CodeSource`] (a camera decoder, a keyboard-wedge
//! scanner on stdin, a channel fed by a browser) on a spawned task. It yields at
//! most one decoded string; the source is released as soon as a code is decoded,
//! the session is stopped, or the session is dropped.

use async_trait::async_trait;
use log::debug;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Query parameter carrying the identifier in verification links
const ID_PARAM: &str = "id";

#[async_trait]
pub trait CodeSource: Send + 'static {
    /// Wait for the next decoded code. `None` once the source is exhausted.
    async fn next_code(&mut self) -> Option<String>;

    /// Release the device behind the source
    fn release(&mut self);
}

pub struct ScanSession {
    cancel: CancellationToken,
    result: Option<oneshot::Receiver<String>>,
    task: JoinHandle<()>,
}

impl ScanSession {
    pub fn start<S: CodeSource>(mut source: S) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let (tx, rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let decoded = tokio::select! {
                _ = token.cancelled() => None,
                code = first_code(&mut source) => code,
            };
            source.release();

            match decoded {
                Some(code) => {
                    debug!("Scan decoded {code:?}");
                    let _ = tx.send(code);
                }
                None => debug!("Scan ended without a code"),
            }
        });

        Self {
            cancel,
            result: Some(rx),
            task,
        }
    }

    /// Wait for the decoded code. Resolves once; later calls and stopped
    /// sessions return `None`.
    pub async fn decoded(&mut self) -> Option<String> {
        let rx = self.result.take()?;
        rx.await.ok()
    }

    /// Stop scanning and release the source
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Token that stops this session when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether the scanning task has finished and released its source
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn first_code<S: CodeSource>(source: &mut S) -> Option<String> {
    while let Some(code) = source.next_code().await {
        let code = code.trim();
        if !code.is_empty() {
            return Some(code.to_string());
        }
    }
    None
}

/// Extract the product identifier from a scanned payload: either the bare
/// identifier or a verification link carrying it in its `id` parameter.
pub fn identifier_from_scan(payload: &str) -> Option<String> {
    let payload = payload.trim();
    if payload.is_empty() {
        return None;
    }

    match Url::parse(payload) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => url
            .query_pairs()
            .find(|(key, _)| key == ID_PARAM)
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty()),
        _ => Some(payload.to_string()),
    }
}

/// Codes pushed in from elsewhere, such as a browser-side decoder
pub struct ChannelSource {
    rx: mpsc::Receiver<String>,
}

impl ChannelSource {
    pub fn new(capacity: usize) -> (mpsc::Sender<String>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }
}

#[async_trait]
impl CodeSource for ChannelSource {
    async fn next_code(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    fn release(&mut self) {
        self.rx.close();
    }
}

/// Keyboard-wedge scanners type each code followed by Enter
pub struct LineSource<R> {
    lines: Option<Lines<R>>,
}

impl<R: AsyncBufRead + Unpin + Send + 'static> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: Some(reader.lines()),
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send + 'static> CodeSource for LineSource<R> {
    async fn next_code(&mut self) -> Option<String> {
        let lines = self.lines.as_mut()?;
        lines.next_line().await.ok().flatten()
    }

    fn release(&mut self) {
        self.lines = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct TrackedSource {
        inner: ChannelSource,
        released: Arc<AtomicBool>,
    }

    #[async_trait]
    impl CodeSource for TrackedSource {
        async fn next_code(&mut self) -> Option<String> {
            self.inner.next_code().await
        }

        fn release(&mut self) {
            self.released.store(true, Ordering::SeqCst);
            self.inner.release();
        }
    }

    fn tracked() -> (mpsc::Sender<String>, TrackedSource, Arc<AtomicBool>) {
        let (tx, inner) = ChannelSource::new(4);
        let released = Arc::new(AtomicBool::new(false));
        let source = TrackedSource {
            inner,
            released: released.clone(),
        };
        (tx, source, released)
    }

    #[tokio::test]
    async fn test_session_yields_first_code_once_and_releases() {
        let (tx, source, released) = tracked();
        let mut session = ScanSession::start(source);

        tx.send("  ".to_string()).await.unwrap();
        tx.send("BATCH-001".to_string()).await.unwrap();

        assert_eq!(session.decoded().await.as_deref(), Some("BATCH-001"));
        assert_eq!(session.decoded().await, None);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(released.load(Ordering::SeqCst));
        assert!(tx.send("BATCH-002".to_string()).await.is_err());
    }

    #[tokio::test]
    async fn test_stop_releases_without_result() {
        let (_tx, source, released) = tracked();
        let mut session = ScanSession::start(source);

        session.stop();
        assert!(session.is_stopped());
        assert_eq!(session.decoded().await, None);
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_drop_releases_source() {
        let (_tx, source, released) = tracked();
        let session = ScanSession::start(source);
        drop(session);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_line_source_reads_codes() {
        let input: &[u8] = b"\nBATCH-009\nBATCH-010\n";
        let mut session = ScanSession::start(LineSource::new(tokio::io::BufReader::new(input)));
        assert_eq!(session.decoded().await.as_deref(), Some("BATCH-009"));
    }

    #[test]
    fn test_identifier_from_scan() {
        assert_eq!(identifier_from_scan(" BATCH-001 ").as_deref(), Some("BATCH-001"));
        assert_eq!(
            identifier_from_scan("https://veri5ied.app/verify-products/success?id=PRD-7QX2K9LM").as_deref(),
            Some("PRD-7QX2K9LM")
        );
        assert_eq!(identifier_from_scan("https://veri5ied.app/verify"), None);
        assert_eq!(identifier_from_scan(""), None);
    }
}
