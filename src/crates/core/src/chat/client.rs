//! Request lifecycle controller.
//!
//! A [`ChatClient`] owns the session handle, at most one in-flight request
//! and its cancellation token. Every method takes `&self` so that
//! [`ChatClient::cancel`] can run while [`ChatClient::submit`] is pending.

use super::dispatcher::{DispatchStatus, EventDispatcher, LiveSlot};
use super::session::SessionHandle;
use super::state::RequestState;
use super::view::{ChatView, PrimaryAction, SlotContent, SlotId};
use crate::infrastructure::stream::{DecodeOutcome, FragmentReader, FrameDecoder, ReadOutcome};
use crate::infrastructure::transport::ChatTransport;
use crate::markdown::MarkdownRenderer;
use crate::service::config::ClientConfig;
use crate::util::errors::{TabbyError, TabbyResult};
use crate::util::types::{ChatRole, StreamEventRecord};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tabby_core_types::ChatRequest;
use tokio_util::sync::CancellationToken;

/// User-facing texts for the synthesized records and messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientMessages {
    pub session_failed: String,
    pub lost_connection: String,
    pub stopped: String,
    pub connect_failed: String,
}

impl Default for ClientMessages {
    fn default() -> Self {
        Self {
            session_failed: "Could not start chat session. Please refresh.".to_string(),
            lost_connection:
                "⚠️ Lost connection to the server before the response completed. Please try again."
                    .to_string(),
            stopped: "⏹️ Stopped by user.".to_string(),
            connect_failed:
                "⚠️ Could not connect to the server. Refresh the page to start a new session."
                    .to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub idle_timeout: Duration,
    pub scroll_on_progress: bool,
    pub messages: ClientMessages,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for ClientOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            idle_timeout: config.idle_timeout(),
            scroll_on_progress: config.scroll_on_progress,
            messages: ClientMessages::default(),
        }
    }
}

/// How the read loop of one request ended.
#[derive(Debug)]
enum StreamEnd {
    /// A terminal record was dispatched.
    Completed,
    ClosedWithoutTerminal,
    Cancelled,
    Failed(TabbyError),
}

pub struct ChatClient {
    transport: Arc<dyn ChatTransport>,
    view: Arc<dyn ChatView>,
    renderer: Arc<dyn MarkdownRenderer>,
    options: ClientOptions,
    session: Mutex<SessionHandle>,
    request: Mutex<RequestState>,
    next_slot: AtomicU64,
    disposed: AtomicBool,
}

impl ChatClient {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        view: Arc<dyn ChatView>,
        renderer: Arc<dyn MarkdownRenderer>,
        options: ClientOptions,
    ) -> Self {
        Self {
            transport,
            view,
            renderer,
            options,
            session: Mutex::new(SessionHandle::new()),
            request: Mutex::new(RequestState::Idle),
            next_slot: AtomicU64::new(1),
            disposed: AtomicBool::new(false),
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, SessionHandle> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_request(&self) -> MutexGuard<'_, RequestState> {
        self.request.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn session_id(&self) -> Option<String> {
        self.lock_session().id().map(str::to_owned)
    }

    pub fn is_streaming(&self) -> bool {
        self.lock_request().is_streaming()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Fetches a new session. On failure a permanent error message is shown
    /// and the session stays uninitialized; the error is returned for logging
    /// only. Returns [`TabbyError::Cancelled`] once the client is disposed.
    pub async fn init(&self) -> TabbyResult<()> {
        if self.is_disposed() {
            return Err(TabbyError::Cancelled);
        }
        match self.transport.create_session().await {
            Ok(thread_id) if self.is_disposed() => {
                debug!("Discarding session {}: client disposed during init", thread_id);
                Err(TabbyError::Cancelled)
            }
            Ok(thread_id) => {
                info!("Initialized conversation thread: {}", thread_id);
                self.lock_session().replace(thread_id);
                Ok(())
            }
            Err(e) => {
                error!("Failed to initialize session: {}", e);
                let body = self.renderer.render_plain(&self.options.messages.session_failed);
                self.view.append_message(ChatRole::Bot, &body);
                Err(e)
            }
        }
    }

    /// Stops any in-flight request, drops the session and starts a new one.
    pub async fn reset(&self) -> TabbyResult<()> {
        info!("Resetting chat session");
        self.cancel();
        self.lock_session().invalidate();
        self.init().await
    }

    /// Stops any in-flight request and detaches from the session for good.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Disposing chat client");
        self.cancel();
        self.lock_session().invalidate();
    }

    /// Fires the cancellation token of the in-flight request, if any.
    pub fn cancel(&self) {
        if self.lock_request().cancel() {
            info!("Chat request cancellation requested");
        }
    }

    /// Sends `message` and renders the streamed response. Ignored when the
    /// message is blank, no session exists or a request is already running.
    pub async fn submit(&self, message: &str) {
        let message = message.trim();
        if message.is_empty() || self.is_disposed() {
            return;
        }
        let Some(thread_id) = self.session_id() else {
            debug!("Ignoring submit: session not initialized");
            return;
        };
        let Some(cancel) = self.lock_request().begin() else {
            debug!("Ignoring submit: a request is already streaming");
            return;
        };

        self.view
            .append_message(ChatRole::User, &self.renderer.render_plain(message));
        self.view.set_input_enabled(false);
        self.view.set_primary_action(PrimaryAction::Cancel);

        let slot_id = SlotId(self.next_slot.fetch_add(1, Ordering::Relaxed));
        let mut active = ActiveRequest {
            client: self,
            slot: LiveSlot::new(slot_id),
            concluded: false,
        };
        self.view.open_live_slot(slot_id, &SlotContent::Working);
        self.view.scroll_to_slot(slot_id);

        let request = ChatRequest::new(message, thread_id);
        let end = self.run_stream(&request, &cancel, &mut active.slot).await;
        active.conclude(end);
    }

    async fn run_stream(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
        slot: &mut LiveSlot,
    ) -> StreamEnd {
        let dispatcher = EventDispatcher::new(
            self.view.as_ref(),
            self.renderer.as_ref(),
            self.options.scroll_on_progress,
        );

        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return StreamEnd::Cancelled,
            opened = self.transport.open_stream(request) => match opened {
                Ok(stream) => stream,
                Err(e) => return StreamEnd::Failed(e),
            },
        };

        let mut reader = FragmentReader::new(stream, cancel.clone(), self.options.idle_timeout);
        let mut decoder = FrameDecoder::new();
        loop {
            match reader.next().await {
                ReadOutcome::Text(text) => {
                    if dispatch_outcomes(&dispatcher, slot, decoder.push(&text)) {
                        return StreamEnd::Completed;
                    }
                }
                ReadOutcome::Closed(tail) => {
                    let mut outcomes = decoder.push(&tail);
                    outcomes.extend(decoder.flush());
                    if dispatch_outcomes(&dispatcher, slot, outcomes) {
                        return StreamEnd::Completed;
                    }
                    return StreamEnd::ClosedWithoutTerminal;
                }
                ReadOutcome::Cancelled => return StreamEnd::Cancelled,
                ReadOutcome::Failed(e) => return StreamEnd::Failed(e),
            }
        }
    }

    fn conclude(&self, slot: &mut LiveSlot, end: StreamEnd) {
        let messages = &self.options.messages;
        let synthesized = match end {
            StreamEnd::Completed => None,
            StreamEnd::ClosedWithoutTerminal => {
                warn!("Chat stream ended without a final record");
                Some(&messages.lost_connection)
            }
            StreamEnd::Cancelled => {
                info!("Chat stream stopped by user");
                Some(&messages.stopped)
            }
            StreamEnd::Failed(e) => {
                error!("Chat stream failed: {}", e);
                Some(&messages.connect_failed)
            }
        };
        if let Some(content) = synthesized {
            let dispatcher = EventDispatcher::new(
                self.view.as_ref(),
                self.renderer.as_ref(),
                self.options.scroll_on_progress,
            );
            dispatcher.dispatch(slot, &StreamEventRecord::final_record(content.as_str()));
        }

        self.lock_request().finish();
        self.view.set_input_enabled(true);
        self.view.set_primary_action(PrimaryAction::Send);
        self.view.focus_input();
    }
}

/// Returns true once a terminal record has been dispatched.
fn dispatch_outcomes(
    dispatcher: &EventDispatcher<'_>,
    slot: &mut LiveSlot,
    outcomes: Vec<DecodeOutcome>,
) -> bool {
    for outcome in outcomes {
        match outcome {
            Ok(record) => {
                if dispatcher.dispatch(slot, &record) == DispatchStatus::Finished {
                    return true;
                }
            }
            Err(e) => warn!("Dropping malformed stream line: {}", e),
        }
    }
    false
}

/// Restores the idle state even if the `submit` future is dropped mid-stream.
struct ActiveRequest<'a> {
    client: &'a ChatClient,
    slot: LiveSlot,
    concluded: bool,
}

impl ActiveRequest<'_> {
    fn conclude(&mut self, end: StreamEnd) {
        self.concluded = true;
        self.client.conclude(&mut self.slot, end);
    }
}

impl Drop for ActiveRequest<'_> {
    fn drop(&mut self) {
        if !self.concluded {
            warn!("Chat request dropped before completion, treating as cancelled");
            self.conclude(StreamEnd::Cancelled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::transcript::{TranscriptView, ViewEvent};
    use crate::infrastructure::transport::ByteStream;
    use crate::markdown::HtmlMarkdownRenderer;
    use crate::util::types::RecordKind;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::{mpsc, oneshot};
    use tokio_stream::wrappers::UnboundedReceiverStream;

    type ChunkSender = mpsc::UnboundedSender<TabbyResult<Vec<u8>>>;

    /// Serves scripted bodies; each `open_stream` pops the next receiver.
    #[derive(Default)]
    struct ScriptedTransport {
        session: Mutex<Option<TabbyResult<String>>>,
        /// When set, `create_session` waits for it before answering.
        session_gate: Mutex<Option<oneshot::Receiver<()>>>,
        bodies: Mutex<Vec<mpsc::UnboundedReceiver<TabbyResult<Vec<u8>>>>>,
        open_error: Mutex<Option<TabbyError>>,
        requests: Mutex<Vec<ChatRequest>>,
        chunks_read: Arc<AtomicUsize>,
    }

    impl ScriptedTransport {
        fn with_session(id: &str) -> Self {
            let transport = Self::default();
            *transport.session.lock().unwrap() = Some(Ok(id.to_string()));
            transport
        }

        fn push_body(&self) -> ChunkSender {
            let (tx, rx) = mpsc::unbounded_channel();
            self.bodies.lock().unwrap().push(rx);
            tx
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn create_session(&self) -> TabbyResult<String> {
            let gate = self.session_gate.lock().unwrap().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.session
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(TabbyError::transport("no session scripted")))
        }

        async fn open_stream(&self, request: &ChatRequest) -> TabbyResult<ByteStream> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(e) = self.open_error.lock().unwrap().take() {
                return Err(e);
            }
            let rx = self.bodies.lock().unwrap().remove(0);
            let counter = self.chunks_read.clone();
            Ok(UnboundedReceiverStream::new(rx)
                .inspect(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .boxed())
        }

        async fn send_message(&self, _request: &ChatRequest) -> TabbyResult<String> {
            Err(TabbyError::transport("not scripted"))
        }
    }

    fn build(transport: Arc<ScriptedTransport>) -> (ChatClient, Arc<TranscriptView>) {
        let view = Arc::new(TranscriptView::new());
        let client = ChatClient::new(
            transport,
            view.clone(),
            Arc::new(HtmlMarkdownRenderer::new()),
            ClientOptions::default(),
        );
        (client, view)
    }

    fn data_line(kind: &str, content: &str) -> Vec<u8> {
        format!(
            "data: {{\"type\":\"{}\",\"content\":\"{}\"}}\n\n",
            kind, content
        )
        .into_bytes()
    }

    fn final_body(view: &TranscriptView, slot: SlotId) -> String {
        match view.slot_content(slot) {
            Some(SlotContent::Final { body }) => body.into_string(),
            other => panic!("slot is not final: {:?}", other),
        }
    }

    fn assert_idle(client: &ChatClient, view: &TranscriptView) {
        assert!(!client.is_streaming());
        assert!(view.input_enabled());
        assert_eq!(view.primary_action(), PrimaryAction::Send);
        assert_eq!(view.live_slot_count(), 0);
        assert_eq!(view.events().last(), Some(&ViewEvent::Focused));
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..1000 {
            if condition() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn streams_progress_then_final() {
        let transport = Arc::new(ScriptedTransport::with_session("chat_session_1"));
        let tx = transport.push_body();
        tx.send(Ok(data_line("thinking", "Looking"))).unwrap();
        tx.send(Ok(data_line("final", "**42**"))).unwrap();
        drop(tx);

        let (client, view) = build(transport.clone());
        client.init().await.unwrap();
        client.submit("  how many?  ").await;

        assert_eq!(
            transport.requests.lock().unwrap()[0],
            ChatRequest::new("how many?", "chat_session_1")
        );
        assert_eq!(view.messages(), vec![(ChatRole::User, "how many?".to_string())]);
        let history = view.slot_history(SlotId(1));
        assert_eq!(history[0], SlotContent::Working);
        assert!(matches!(
            history[1],
            SlotContent::InProgress { kind: RecordKind::Thinking, .. }
        ));
        assert!(final_body(&view, SlotId(1)).contains("<strong>42</strong>"));
        assert_idle(&client, &view);
    }

    #[tokio::test]
    async fn submit_is_ignored_without_session() {
        let transport = Arc::new(ScriptedTransport::default());
        let (client, view) = build(transport.clone());
        assert!(client.init().await.is_err());
        assert_eq!(
            view.messages(),
            vec![(ChatRole::Bot, ClientMessages::default().session_failed)]
        );

        client.submit("hello").await;
        assert!(transport.requests.lock().unwrap().is_empty());
        assert_eq!(view.messages().len(), 1);
    }

    #[tokio::test]
    async fn blank_message_is_ignored() {
        let transport = Arc::new(ScriptedTransport::with_session("s"));
        let (client, view) = build(transport.clone());
        client.init().await.unwrap();
        client.submit(" \n\t ").await;
        assert!(view.events().is_empty());
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stream_closing_without_final_synthesizes_lost_connection() {
        let transport = Arc::new(ScriptedTransport::with_session("s"));
        let tx = transport.push_body();
        tx.send(Ok(data_line("thinking", "A"))).unwrap();
        drop(tx);

        let (client, view) = build(transport);
        client.init().await.unwrap();
        client.submit("q").await;

        let history = view.slot_history(SlotId(1));
        assert_eq!(history.len(), 3);
        assert!(final_body(&view, SlotId(1)).contains("Lost connection"));
        assert_idle(&client, &view);
    }

    #[tokio::test]
    async fn open_failure_synthesizes_reconnect_hint() {
        let transport = Arc::new(ScriptedTransport::with_session("s"));
        *transport.open_error.lock().unwrap() = Some(TabbyError::HttpStatus {
            status: 500,
            body: "Agent not initialized".into(),
        });
        let (client, view) = build(transport);
        client.init().await.unwrap();
        client.submit("q").await;

        assert!(final_body(&view, SlotId(1)).contains("Could not connect"));
        assert_idle(&client, &view);
    }

    #[tokio::test]
    async fn mid_stream_transport_error_synthesizes_reconnect_hint() {
        let transport = Arc::new(ScriptedTransport::with_session("s"));
        let tx = transport.push_body();
        tx.send(Ok(data_line("step", "working"))).unwrap();
        tx.send(Err(TabbyError::transport("connection reset"))).unwrap();

        let (client, view) = build(transport);
        client.init().await.unwrap();
        client.submit("q").await;

        assert!(final_body(&view, SlotId(1)).contains("Could not connect"));
        assert_idle(&client, &view);
    }

    #[tokio::test]
    async fn cancel_after_first_record_stops_reading() {
        let transport = Arc::new(ScriptedTransport::with_session("s"));
        let tx = transport.push_body();
        let (client, view) = build(transport.clone());
        client.init().await.unwrap();

        let driver = async {
            tx.send(Ok(data_line("thinking", "A"))).unwrap();
            wait_until(|| view.slot_history(SlotId(1)).len() == 2).await;
            assert!(client.is_streaming());
            client.cancel();
            client.cancel();
            tx.send(Ok(data_line("final", "B"))).unwrap();
        };
        tokio::join!(client.submit("q"), driver);

        assert_eq!(transport.chunks_read.load(Ordering::SeqCst), 1);
        let history = view.slot_history(SlotId(1));
        assert_eq!(history.len(), 3);
        let last = final_body(&view, SlotId(1));
        assert!(last.contains("Stopped by user"));
        assert!(!last.contains('B'));
        assert_idle(&client, &view);
    }

    #[tokio::test]
    async fn submit_while_streaming_is_a_no_op() {
        let transport = Arc::new(ScriptedTransport::with_session("s"));
        let tx = transport.push_body();
        let (client, view) = build(transport.clone());
        client.init().await.unwrap();

        let driver = async {
            tx.send(Ok(data_line("thinking", "A"))).unwrap();
            wait_until(|| view.slot_history(SlotId(1)).len() == 2).await;
            let before = view.events();
            client.submit("second").await;
            assert_eq!(view.events(), before);
            assert_eq!(transport.requests.lock().unwrap().len(), 1);
            tx.send(Ok(data_line("final", "done"))).unwrap();
        };
        tokio::join!(client.submit("first"), driver);

        assert_eq!(view.slot_ids(), vec![SlotId(1)]);
        assert_idle(&client, &view);
    }

    #[tokio::test]
    async fn cancel_while_idle_is_a_no_op() {
        let transport = Arc::new(ScriptedTransport::with_session("s"));
        let (client, view) = build(transport);
        client.init().await.unwrap();
        client.cancel();
        assert!(!client.is_streaming());
        assert!(view.events().is_empty());
    }

    #[tokio::test]
    async fn dropping_submit_restores_idle_state() {
        let transport = Arc::new(ScriptedTransport::with_session("s"));
        let tx = transport.push_body();
        let (client, view) = build(transport);
        client.init().await.unwrap();

        tx.send(Ok(data_line("thinking", "A"))).unwrap();
        let submit = client.submit("q");
        let _ = tokio::time::timeout(Duration::from_millis(50), submit).await;

        assert!(final_body(&view, SlotId(1)).contains("Stopped by user"));
        assert_idle(&client, &view);
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let transport = Arc::new(ScriptedTransport::with_session("s"));
        let tx = transport.push_body();
        tx.send(Ok(b"data: {not json}\n".to_vec())).unwrap();
        tx.send(Ok(data_line("final", "ok"))).unwrap();
        drop(tx);

        let (client, view) = build(transport);
        client.init().await.unwrap();
        client.submit("q").await;

        assert!(final_body(&view, SlotId(1)).contains("ok"));
    }

    #[tokio::test]
    async fn dispose_blocks_further_use() {
        let transport = Arc::new(ScriptedTransport::with_session("s"));
        let (client, view) = build(transport.clone());
        client.init().await.unwrap();
        client.dispose();
        assert!(client.session_id().is_none());
        client.submit("q").await;
        assert!(view.events().is_empty());
        assert!(matches!(client.init().await, Err(TabbyError::Cancelled)));
    }

    #[tokio::test]
    async fn dispose_during_init_discards_the_new_session() {
        let transport = Arc::new(ScriptedTransport::with_session("late"));
        let (open, gate) = oneshot::channel();
        *transport.session_gate.lock().unwrap() = Some(gate);
        let (client, view) = build(transport);

        let driver = async {
            client.dispose();
            open.send(()).unwrap();
        };
        let (result, ()) = tokio::join!(client.init(), driver);

        assert!(matches!(result, Err(TabbyError::Cancelled)));
        assert!(client.session_id().is_none());
        assert!(view.messages().is_empty());
    }

    #[tokio::test]
    async fn reset_fetches_a_new_session() {
        let transport = Arc::new(ScriptedTransport::with_session("first"));
        let (client, _view) = build(transport.clone());
        client.init().await.unwrap();
        assert_eq!(client.session_id().as_deref(), Some("first"));

        *transport.session.lock().unwrap() = Some(Ok("second".to_string()));
        client.reset().await.unwrap();
        assert_eq!(client.session_id().as_deref(), Some("second"));
    }
}
