//! Runs the single-instance coordinator on its own thread.
//!
//! The coordinator is single-threaded and tao owns the main thread, so the runtime and the
//! coordinator live together on a `single-instance` thread for the whole process. The thread
//! reports whether this launch is the primary; a primary then receives the event loop proxy
//! and forwards messages and activations as [`UserEvent`]s.

use std::path::PathBuf;
use std::rc::Rc;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use tao::event_loop::EventLoopProxy;
use tokio::sync::oneshot;

use crate::event_loop::UserEvent;
use crate::single_instance::{ActivationTarget, Endpoint, Options, SingleInstance};
use crate::window::ProxyActivator;

/// Outcome of [`start`].
pub enum Startup {
    /// This process owns the endpoint.
    Primary(InstanceThread),
    /// Another instance is running; exit with this status.
    Exit(i32),
}

/// Handle to the thread running a primary's listener.
pub struct InstanceThread {
    proxy_tx: Option<mpsc::Sender<EventLoopProxy<UserEvent>>>,
    stop_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

async fn forward(instance: &mut SingleInstance, message: Option<&str>) -> i32 {
    let Some(message) = message else {
        log::info!("Activating running instance");
        return 0;
    };
    match instance.send_message(message).await {
        Ok(()) => 0,
        Err(e) => {
            log::error!("Cannot forward {} to running instance: {}", message, e);
            1
        }
    }
}

fn listen(
    mut instance: SingleInstance,
    runtime: &tokio::runtime::Runtime,
    proxy: EventLoopProxy<UserEvent>,
    stop_rx: oneshot::Receiver<()>,
) {
    // The coordinator only keeps a weak reference; the strong one lives for the loop below.
    let activator: Rc<dyn ActivationTarget> = Rc::new(ProxyActivator(proxy.clone()));
    instance.set_activation_window(Rc::downgrade(&activator), true);
    instance.on_message(move |line| {
        if proxy.send_event(UserEvent::OpenFile(PathBuf::from(line))).is_err() {
            log::debug!("Event loop gone; dropping forwarded file");
        }
    });

    let stop = async {
        // A dropped sender stops the listener too.
        let _ = stop_rx.await;
    };
    if let Err(e) = runtime.block_on(instance.run_until(stop)) {
        log::error!("Single-instance listener failed: {}", e);
    }
    log::debug!("Releasing {}", instance.endpoint());
}

/// Spawns the coordinator thread and waits until it knows this launch's role.
///
/// `message` is forwarded when another instance is running. Errors are startup failures the
/// caller should treat as fatal.
pub fn start(endpoint: Endpoint, message: Option<String>) -> Result<Startup, String> {
    let (startup_tx, startup_rx) = mpsc::channel::<Result<bool, String>>();
    let (proxy_tx, proxy_rx) = mpsc::channel::<EventLoopProxy<UserEvent>>();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let (exit_tx, exit_rx) = mpsc::channel::<i32>();

    let handle = thread::Builder::new()
        .name("single-instance".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    let _ = startup_tx.send(Err(format!("Single-instance runtime: {}", e)));
                    return;
                }
            };
            let mut instance =
                match runtime.block_on(SingleInstance::acquire(endpoint, Options::default())) {
                    Ok(instance) => instance,
                    Err(e) => {
                        let error = format!("Single-instance setup failed: {}", e);
                        let _ = startup_tx.send(Err(error));
                        return;
                    }
                };

            if instance.is_running() {
                let _ = startup_tx.send(Ok(false));
                let code = runtime.block_on(forward(&mut instance, message.as_deref()));
                let _ = exit_tx.send(code);
                return;
            }

            let _ = startup_tx.send(Ok(true));
            // Dropped sender: the app gave up before its event loop existed.
            let Ok(proxy) = proxy_rx.recv() else {
                return;
            };
            listen(instance, &runtime, proxy, stop_rx);
        })
        .map_err(|e| format!("Cannot spawn single-instance thread: {}", e))?;

    let mut thread = InstanceThread {
        proxy_tx: Some(proxy_tx),
        stop_tx: Some(stop_tx),
        handle: Some(handle),
    };
    match startup_rx.recv() {
        Ok(Ok(true)) => Ok(Startup::Primary(thread)),
        Ok(Ok(false)) => {
            let code = exit_rx.recv().unwrap_or(1);
            thread.stop();
            Ok(Startup::Exit(code))
        }
        Ok(Err(e)) => {
            thread.stop();
            Err(e)
        }
        Err(_) => {
            thread.stop();
            Err("Single-instance thread exited during startup".to_string())
        }
    }
}

impl InstanceThread {
    /// Starts listening; received files and activations go to `proxy`.
    pub fn attach(&mut self, proxy: EventLoopProxy<UserEvent>) {
        match self.proxy_tx.take() {
            Some(tx) if tx.send(proxy).is_ok() => {}
            _ => log::warn!("Single-instance thread is not running; duplicates will not reach us"),
        }
    }

    /// Stops the listener and waits for the thread, releasing the endpoint. Idempotent.
    pub fn stop(&mut self) {
        self.proxy_tx = None;
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::error!("Single-instance thread panicked");
        }
    }
}

impl Drop for InstanceThread {
    fn drop(&mut self) {
        self.stop();
    }
}
