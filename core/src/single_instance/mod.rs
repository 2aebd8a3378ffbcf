//! Single-instance coordination over a local socket.
//!
//! The first launch binds an endpoint named by the [`InstanceId`] and becomes the primary
//! instance. Later launches find it with a bounded probe connect, forward one line (a file
//! path) and exit. The primary reads lines on its current-thread runtime and hands them to
//! the registered observer; it never spawns tasks or threads of its own.
//!
//! ```text
//! UNDETERMINED -> DUPLICATE (probe connected)
//!              -> PRIMARY (bound) -> connection -> replaced by next connection -> ...
//! ```

mod endpoint;
mod framing;
mod transport;

pub use endpoint::{Endpoint, InstanceId};

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::rc::Weak;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::config::{MAX_MESSAGE_LEN, PROBE_TIMEOUT, SEND_TIMEOUT};
use framing::{FrameError, LineDecoder};
use transport::{Inbound, Listener, Outbound};

/// Bytes requested from the inbound stream per read.
const READ_CHUNK: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid instance id {token:?}: {reason}")]
    InvalidId { token: String, reason: &'static str },
    #[error("no running instance to send to")]
    NotRunning,
    #[error("only the primary instance can receive messages")]
    NotPrimary,
    #[error("message must be a single line")]
    MultilineMessage,
    #[error("message is {len} bytes, limit is {max}")]
    MessageTooLong { len: usize, max: usize },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("cannot listen on {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Tunables for probing, sending and receiving.
#[derive(Debug, Clone)]
pub struct Options {
    pub probe_timeout: Duration,
    pub send_timeout: Duration,
    pub max_message_len: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            probe_timeout: PROBE_TIMEOUT,
            send_timeout: SEND_TIMEOUT,
            max_message_len: MAX_MESSAGE_LEN,
        }
    }
}

/// A window that can be brought to the front when another launch reaches the primary.
pub trait ActivationTarget {
    /// Restores from minimized, shows, raises and gives input focus.
    fn activate(&self);
}

struct Activation {
    target: Weak<dyn ActivationTarget>,
    on_message: bool,
}

enum Role {
    Duplicate(Outbound),
    Primary(Listener),
}

/// Observer invoked with each received message (one line, terminator stripped).
pub type MessageHandler = Box<dyn FnMut(String)>;

/// Decides at construction whether this process is the primary instance or a duplicate
/// launch, and carries the matching half of the channel.
pub struct SingleInstance {
    endpoint: Endpoint,
    options: Options,
    role: Role,
    activation: Option<Activation>,
    handler: Option<MessageHandler>,
}

impl SingleInstance {
    /// Probes `endpoint`; connects as a duplicate if someone is listening, binds as primary
    /// otherwise.
    ///
    /// Binding is bind-or-fail. Losing a bind race to a concurrent launch is detected by a
    /// second probe and turns this process into a duplicate. A Unix socket file nobody
    /// listens on is treated as stale and replaced once; any other bind failure is
    /// [`Error::Bind`].
    pub async fn acquire(endpoint: Endpoint, options: Options) -> Result<Self, Error> {
        if let Some(stream) = probe(&endpoint, options.probe_timeout).await {
            log::info!("Instance {} already running", endpoint.id());
            return Ok(Self::with_role(endpoint, options, Role::Duplicate(stream)));
        }

        Self::bind_or_forward(endpoint, options).await
    }

    /// The step after a refused probe: bind, or join whoever bound first.
    async fn bind_or_forward(endpoint: Endpoint, options: Options) -> Result<Self, Error> {
        let listener = match Listener::bind(&endpoint) {
            Ok(listener) => listener,
            Err(e) if transport::is_in_use(&e) => {
                if let Some(stream) = probe(&endpoint, options.probe_timeout).await {
                    log::info!("Lost startup race for {}; forwarding instead", endpoint.id());
                    return Ok(Self::with_role(endpoint, options, Role::Duplicate(stream)));
                }
                Listener::reclaim(&endpoint).map_err(|source| Error::Bind {
                    path: endpoint.address().to_path_buf(),
                    source,
                })?
            }
            Err(source) => {
                return Err(Error::Bind {
                    path: endpoint.address().to_path_buf(),
                    source,
                });
            }
        };
        log::info!("Listening for other launches on {}", endpoint);
        Ok(Self::with_role(endpoint, options, Role::Primary(listener)))
    }

    fn with_role(endpoint: Endpoint, options: Options, role: Role) -> Self {
        Self {
            endpoint,
            options,
            role,
            activation: None,
            handler: None,
        }
    }

    /// True when another instance was found: forward the request and exit.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self.role, Role::Duplicate(_))
    }

    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Sends one line to the running instance and waits (bounded) until it is written.
    ///
    /// `text` must not contain a line break; the receiver splits on `\n` only.
    pub async fn send_message(&mut self, text: &str) -> Result<(), Error> {
        let Role::Duplicate(stream) = &mut self.role else {
            return Err(Error::NotRunning);
        };
        if text.contains(['\n', '\r']) {
            return Err(Error::MultilineMessage);
        }
        if text.len() > self.options.max_message_len {
            return Err(Error::MessageTooLong {
                len: text.len(),
                max: self.options.max_message_len,
            });
        }

        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');
        let limit = self.options.send_timeout;
        tokio::time::timeout(limit, async {
            stream.write_all(line.as_bytes()).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| Error::Timeout(limit))??;
        Ok(())
    }

    /// Registers the window raised on each new connection when `activate_on_message` is set.
    ///
    /// Only a weak reference is kept; a dropped window is silently skipped.
    pub fn set_activation_window(
        &mut self,
        target: Weak<dyn ActivationTarget>,
        activate_on_message: bool,
    ) {
        self.activation = Some(Activation {
            target,
            on_message: activate_on_message,
        });
    }

    /// Registers the observer for received messages, replacing any previous one.
    pub fn on_message(&mut self, handler: impl FnMut(String) + 'static) {
        self.handler = Some(Box::new(handler));
    }

    /// Receives messages for the rest of the process lifetime.
    pub async fn run(&mut self) -> Result<(), Error> {
        self.run_until(std::future::pending()).await
    }

    /// Accepts connections and dispatches their lines until `shutdown` completes.
    ///
    /// Only the newest connection is read; accepting a new one drops the previous stream
    /// together with any partial line it had sent.
    pub async fn run_until(&mut self, shutdown: impl Future<Output = ()>) -> Result<(), Error> {
        let Self {
            role,
            options,
            activation,
            handler,
            ..
        } = self;
        let Role::Primary(listener) = role else {
            return Err(Error::NotPrimary);
        };

        let mut inbound: Option<Inbound> = None;
        let mut decoder = LineDecoder::new(options.max_message_len);
        let mut chunk = vec![0u8; READ_CHUNK];
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    log::debug!("Single-instance listener shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok(stream) => {
                        if inbound.replace(stream).is_some() {
                            log::debug!("New launch connected; dropping previous connection");
                        }
                        decoder.clear();
                        activate_on_connect(activation.as_ref());
                    }
                    Err(e) => log::warn!("Accepting single-instance connection failed: {}", e),
                },
                read = read_some(&mut inbound, &mut chunk) => match read {
                    Ok(0) => {
                        if decoder.pending() > 0 {
                            log::debug!("Discarding unterminated message on disconnect");
                        }
                        inbound = None;
                        decoder.clear();
                    }
                    Ok(n) => {
                        decoder.extend(&chunk[..n]);
                        if !dispatch_lines(&mut decoder, handler) {
                            inbound = None;
                            decoder.clear();
                        }
                    }
                    Err(e) => {
                        log::warn!("Reading single-instance message failed: {}", e);
                        inbound = None;
                        decoder.clear();
                    }
                },
            }
        }
    }
}

/// Bounded connect. Refusal, a missing endpoint and timeout all mean "not running".
async fn probe(endpoint: &Endpoint, limit: Duration) -> Option<Outbound> {
    match tokio::time::timeout(limit, transport::connect(endpoint)).await {
        Ok(Ok(stream)) => Some(stream),
        Ok(Err(e)) => {
            log::debug!("No instance at {}: {}", endpoint, e);
            None
        }
        Err(_) => {
            log::debug!("Probe of {} timed out after {:?}", endpoint, limit);
            None
        }
    }
}

/// Reads from the current connection, or waits forever when there is none.
async fn read_some(inbound: &mut Option<Inbound>, buf: &mut [u8]) -> io::Result<usize> {
    match inbound {
        Some(stream) => stream.read(buf).await,
        None => std::future::pending().await,
    }
}

fn activate_on_connect(activation: Option<&Activation>) {
    let Some(activation) = activation else { return };
    if !activation.on_message {
        return;
    }
    match activation.target.upgrade() {
        Some(target) => target.activate(),
        None => log::debug!("Activation window is gone; skipping activation"),
    }
}

/// Hands every complete buffered line to `handler`, in order. Returns false when the
/// connection must be dropped (oversized line).
fn dispatch_lines(decoder: &mut LineDecoder, handler: &mut Option<MessageHandler>) -> bool {
    loop {
        match decoder.next_line() {
            Ok(None) => return true,
            Ok(Some(line)) if line.is_empty() => {}
            Ok(Some(line)) => match handler {
                Some(handler) => handler(line),
                None => log::debug!("No message handler registered; dropping {:?}", line),
            },
            Err(FrameError::InvalidUtf8) => {
                log::warn!("Ignoring single-instance message that is not UTF-8");
            }
            Err(e @ FrameError::TooLong { .. }) => {
                log::warn!("Dropping single-instance connection: {}", e);
                return false;
            }
        }
    }
}
