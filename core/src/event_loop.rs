//! Event loop and user events.
//!
//! Owns `UserEvent`, `run_event_loop`, and the JSON escape helper used when
//! dispatching IPC responses and view state back to the WebView.
//! IPC responses are batched: producers push to the [`IpcOutbox`], which sends `IpcFlush`;
//! the main loop drains it and delivers all in one `evaluate_script`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tao::event::{Event, WindowEvent};
use tao::event_loop::{ControlFlow, EventLoopProxy};
use tao::window::Window;

use crate::config::MAX_PENDING_IPC;
use crate::instance::InstanceThread;
use crate::single_instance::ActivationTarget;
use crate::storage;
use crate::viewer::{self, Viewer};

/// User-defined events sent from background threads or IPC into the main loop.
#[derive(Debug)]
pub enum UserEvent {
    /// A later launch forwarded a file to open.
    OpenFile(PathBuf),
    /// A later launch connected; bring the window to the front.
    Activate,
    /// An IPC command changed the viewer; refresh the window title.
    StateChanged,
    /// Wake to drain the IPC response queue and deliver a batch to the WebView.
    IpcFlush,
    /// Request to show the window (after first load or fallback timeout).
    ShowWindow,
    /// Exit the application.
    Quit,
}

/// Escapes a JSON string for embedding inside a JS string literal: backslash, quote, newline
/// and carriage return.
/// Avoids allocation when the string contains none of these characters.
#[must_use]
pub fn escape_json_for_js(s: &str) -> std::borrow::Cow<'_, str> {
    if !s.contains(['\\', '"', '\n', '\r']) {
        return std::borrow::Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() * 2);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    std::borrow::Cow::Owned(out)
}

/// Response queue shared by IPC producers and the event loop, bounded by [`MAX_PENDING_IPC`].
///
/// Producers [`reserve`](Self::reserve) a slot before doing any work, then either
/// [`push`](Self::push) the response or [`release`](Self::release) the slot.
#[derive(Clone)]
pub struct IpcOutbox {
    proxy: EventLoopProxy<UserEvent>,
    queue: Arc<Mutex<Vec<String>>>,
    pending: Arc<AtomicUsize>,
}

impl IpcOutbox {
    #[must_use]
    pub fn new(proxy: EventLoopProxy<UserEvent>) -> Self {
        Self {
            proxy,
            queue: Arc::new(Mutex::new(Vec::new())),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[must_use]
    pub fn proxy(&self) -> &EventLoopProxy<UserEvent> {
        &self.proxy
    }

    /// Claims a slot for one response. False when the queue is full.
    pub fn reserve(&self) -> bool {
        self.pending
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                (n < MAX_PENDING_IPC).then_some(n + 1)
            })
            .is_ok()
    }

    /// Gives back a reserved slot that will not produce a response.
    pub fn release(&self) {
        let _ = self
            .pending
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Queues one response JSON and sends `IpcFlush` only for the first item of a batch.
    pub fn push(&self, json: String) {
        let was_first = {
            let mut q = self.lock_queue();
            q.push(json);
            q.len() == 1
        };
        if was_first {
            let _ = self.proxy.send_event(UserEvent::IpcFlush);
        }
    }

    /// Takes the queued batch and frees its slots.
    fn take(&self) -> Vec<String> {
        let batch = std::mem::take(&mut *self.lock_queue());
        let n = batch.len();
        let _ = self
            .pending
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |p| Some(p.saturating_sub(n)));
        batch
    }

    /// Recovers from poison so a panicking worker cannot leave the queue locked forever.
    fn lock_queue(&self) -> MutexGuard<'_, Vec<String>> {
        self.queue.lock().unwrap_or_else(|e| {
            log::error!("IPC queue mutex was poisoned, recovering");
            e.into_inner()
        })
    }
}

/// Drains the outbox and runs one script to deliver all responses. Returns true if any were
/// delivered.
fn drain_ipc_queue_and_deliver(outbox: &IpcOutbox, webview: &wry::WebView) -> bool {
    let batch = outbox.take();
    if batch.is_empty() {
        return false;
    }

    let mut script = String::from("if (window.__resolveIpc) { ");
    for response_json in batch {
        let escaped = escape_json_for_js(&response_json);
        script.push_str(&format!(
            r#"try {{ var r = JSON.parse("{}"); window.__resolveIpc(r.id, r); }} catch(e) {{}}"#,
            escaped
        ));
    }
    script.push_str(" }");
    if let Err(e) = webview.evaluate_script(&script) {
        log::warn!("IPC evaluate_script failed: {}", e);
    }
    true
}

/// Sends the current view state to the page unasked and retitles the window.
fn push_state(webview: &wry::WebView, window: &Window, viewer: &Mutex<Viewer>) {
    let state = viewer::lock(viewer).state();
    window.set_title(&state.title);
    let json = match serde_json::to_string(&state) {
        Ok(json) => json,
        Err(e) => {
            log::warn!("Cannot serialize view state: {}", e);
            return;
        }
    };
    let script = format!(
        r#"if (window.__applyState) {{ window.__applyState(JSON.parse("{}")); }}"#,
        escape_json_for_js(&json)
    );
    if let Err(e) = webview.evaluate_script(&script) {
        log::warn!("State evaluate_script failed: {}", e);
    }
}

fn save_bounds(window: &Window) {
    if let Ok(pos) = window.outer_position() {
        let size = window.inner_size();
        storage::save_window_bounds(pos.x, pos.y, size.width, size.height);
    }
}

/// Runs the tao event loop until exit.
///
/// Keeps `web_context` and `window` alive for the lifetime of `webview`. The single-instance
/// thread is stopped before the loop exits so its endpoint is released.
/// Uses `ControlFlow::Poll` after draining IPC so the loop re-runs immediately
/// when there is pending work; otherwise `Wait` to avoid busy-waiting.
pub fn run_event_loop(
    event_loop: tao::event_loop::EventLoop<UserEvent>,
    webview: wry::WebView,
    window: Window,
    _web_context: wry::WebContext,
    viewer: Arc<Mutex<Viewer>>,
    outbox: IpcOutbox,
    mut instance: InstanceThread,
) {
    event_loop.run(move |event, _event_loop, control_flow| {
        *control_flow = ControlFlow::Wait;

        match event {
            Event::UserEvent(UserEvent::OpenFile(path)) => {
                log::info!("Opening forwarded file {}", path.display());
                if let Err(e) = viewer::lock(&viewer).open(&path) {
                    log::warn!("{}", e);
                }
                push_state(&webview, &window, &viewer);
            }
            Event::UserEvent(UserEvent::Activate) => window.activate(),
            Event::UserEvent(UserEvent::StateChanged) => {
                window.set_title(&viewer::lock(&viewer).title());
            }
            Event::UserEvent(UserEvent::ShowWindow) => window.set_visible(true),
            Event::UserEvent(UserEvent::IpcFlush) | Event::MainEventsCleared => {
                if drain_ipc_queue_and_deliver(&outbox, &webview) {
                    *control_flow = ControlFlow::Poll;
                }
            }
            Event::UserEvent(UserEvent::Quit)
            | Event::WindowEvent {
                event: WindowEvent::CloseRequested,
                ..
            } => {
                save_bounds(&window);
                instance.stop();
                *control_flow = ControlFlow::Exit;
            }
            Event::LoopDestroyed => instance.stop(),
            _ => {}
        }
    });
}
