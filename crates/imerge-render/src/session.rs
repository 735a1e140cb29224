//! Per-request results: the event channel that replaces completion hooks,
//! the final report, and a handle to a spawned run.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use imerge_core::frame::FrameBuffer;
use imerge_core::{DataUri, MergeError, MergeResult};

/// Completion events for one request.
///
/// `result` is the encoded data URI, empty when encoding failed or never ran.
#[derive(Debug, Clone)]
pub enum MergeEvent {
    /// The last overlay to settle was drawn and the surface encoded.
    Success { result: String },
    /// The last overlay to settle failed to load (or the background did).
    Error { error: MergeError, result: String },
    /// Sent exactly once per request, after everything else.
    Finally { result: String },
}

impl MergeEvent {
    pub fn result(&self) -> &str {
        match self {
            MergeEvent::Success { result }
            | MergeEvent::Error { result, .. }
            | MergeEvent::Finally { result } => result,
        }
    }

    pub fn is_finally(&self) -> bool {
        matches!(self, MergeEvent::Finally { .. })
    }
}

/// Sending half of a request's event channel. A missing or closed receiver
/// is not an error.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<MergeEvent>>,
}

impl EventSink {
    pub fn none() -> Self {
        Self { tx: None }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<MergeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, event: MergeEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                tracing::debug!("Merge event receiver dropped; event discarded");
            }
        }
    }
}

/// What happened to one overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayOutcome {
    Drawn,
    Failed(String),
}

/// Outcome of a finished merge.
#[derive(Debug, Clone)]
pub struct MergeReport {
    /// Caller context from the request.
    pub target: Option<String>,
    pub surface_width: u32,
    pub surface_height: u32,
    /// Per overlay, in request order.
    pub overlays: Vec<OverlayOutcome>,
    /// `data:image/jpeg;base64,...`, or empty if encoding failed.
    pub data_uri: String,
    pub encode_error: Option<String>,
    /// The composited surface the URI was encoded from.
    pub surface: FrameBuffer,
}

impl MergeReport {
    pub fn is_empty(&self) -> bool {
        self.data_uri.is_empty()
    }

    pub fn drawn_count(&self) -> usize {
        self.overlays
            .iter()
            .filter(|o| matches!(o, OverlayOutcome::Drawn))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.overlays.len() - self.drawn_count()
    }

    /// Raw JPEG bytes behind `data_uri`.
    pub fn jpeg_bytes(&self) -> MergeResult<Vec<u8>> {
        if self.is_empty() {
            return Err(MergeError::Encode(
                self.encode_error
                    .clone()
                    .unwrap_or_else(|| "no encoded output".to_string()),
            ));
        }
        Ok(DataUri::parse(&self.data_uri)?.data)
    }
}

/// A merge running on the tokio runtime.
pub struct MergeSession {
    pub events: mpsc::UnboundedReceiver<MergeEvent>,
    pub handle: JoinHandle<MergeResult<MergeReport>>,
}

impl MergeSession {
    /// Wait for the run to end and collect every event it emitted.
    pub async fn finish(mut self) -> (Vec<MergeEvent>, MergeResult<MergeReport>) {
        let result = match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(MergeError::Render(format!("merge task failed: {}", e))),
        };
        // The task owned the only sender, so the channel is closed by now.
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        (events, result)
    }
}
