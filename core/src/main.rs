//! BaloViewer: one window, one WebView, embedded UI, typed IPC, one instance per user.
//!
//! A second launch forwards its file to the running instance over a local socket and exits.

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod cli;
mod config;
mod event_loop;
mod file_ops;
mod image_list;
mod instance;
mod ipc;
mod paths;
mod protocol;
mod single_instance;
mod storage;
mod viewer;
mod window;

#[cfg(test)]
mod protocol_tests;

use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tao::dpi::{LogicalSize, PhysicalPosition, PhysicalSize};
use tao::event_loop::EventLoopBuilder;
use wry::WebViewBuilder;

use crate::config::{
    ENV_DEVTOOLS, IPC_WORKER_POOL_SIZE, SHOW_WINDOW_FALLBACK_SECS, UI, WINDOW_HEIGHT,
    WINDOW_MIN_HEIGHT, WINDOW_MIN_WIDTH, WINDOW_WIDTH,
};
use crate::event_loop::{run_event_loop, IpcOutbox, UserEvent};
use crate::instance::Startup;
use crate::ipc::{
    handle_command, is_blocking_command, parse_message, Command, IpcEnvelope, IpcResponse,
    NativeDialogs,
};
use crate::paths::user_data_dir;
use crate::single_instance::{Endpoint, InstanceId};
use crate::viewer::Viewer;
use crate::window::init_script;

/// Exits the process with code 1 after logging. Use for unrecoverable startup failures.
fn exit_fatal(msg: &str) -> ! {
    log::error!("{}", msg);
    std::process::exit(1);
}

/// Runs one command and queues its response in the slot reserved for it. Successful
/// commands retitle the window.
fn answer(outbox: &IpcOutbox, viewer: &Mutex<Viewer>, envelope: IpcEnvelope) {
    let resp = match handle_command(viewer, &NativeDialogs, &envelope.command) {
        Ok(data) => {
            let _ = outbox.proxy().send_event(UserEvent::StateChanged);
            IpcResponse::ok(envelope.id, data)
        }
        Err(e) => IpcResponse::err(envelope.id, e),
    };
    match serde_json::to_string(&resp) {
        Ok(json) => outbox.push(json),
        Err(e) => {
            log::warn!("Cannot serialize IPC response (id={}): {}", resp.id, e);
            outbox.release();
        }
    }
}

/// Absolute form of a file named on the command line, so the running instance can open it
/// whatever its working directory.
fn absolute_file(file: &Path) -> PathBuf {
    std::fs::canonicalize(file)
        .or_else(|_| std::path::absolute(file))
        .unwrap_or_else(|_| file.to_path_buf())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .init();

    let args = cli::Args::parse();
    let file = args.file().map(|f| absolute_file(f));
    let message = file.as_ref().and_then(|f| {
        let text = f.to_str().map(str::to_owned);
        if text.is_none() {
            log::warn!("{} is not valid UTF-8 and cannot be forwarded", f.display());
        }
        text
    });

    let id = InstanceId::new(args.instance_id.as_str())
        .unwrap_or_else(|e| exit_fatal(&e.to_string()));
    let mut instance = match instance::start(Endpoint::for_instance(id), message) {
        Ok(Startup::Primary(thread)) => thread,
        Ok(Startup::Exit(code)) => std::process::exit(code),
        Err(e) => exit_fatal(&e),
    };

    let config = storage::load_config();
    let viewer = Arc::new(Mutex::new(Viewer::new(config.gallery_visible)));
    if let Some(file) = &file
        && let Err(e) = viewer::lock(&viewer).open(file)
    {
        log::warn!("{}", e);
    }

    let event_loop = EventLoopBuilder::<UserEvent>::with_user_event().build();
    let proxy = event_loop.create_proxy();
    let ipc_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(IPC_WORKER_POOL_SIZE)
        .thread_name(|i| format!("ipc-worker-{i}"))
        .build()
        .unwrap_or_else(|e| exit_fatal(&format!("IPC worker pool: {}", e)));

    let window = {
        let mut b = tao::window::WindowBuilder::new()
            .with_title(viewer::lock(&viewer).title())
            .with_inner_size(LogicalSize::new(WINDOW_WIDTH, WINDOW_HEIGHT))
            .with_min_inner_size(LogicalSize::new(WINDOW_MIN_WIDTH, WINDOW_MIN_HEIGHT))
            .with_visible(false);
        if let Some(bounds) = &config.window {
            b = b
                .with_position(PhysicalPosition::new(bounds.x, bounds.y))
                .with_inner_size(PhysicalSize::new(bounds.width, bounds.height));
        }
        b.build(&event_loop).unwrap_or_else(|e| {
            exit_fatal(&format!("Failed to create window: {}", e));
        })
    };

    let outbox = IpcOutbox::new(proxy.clone());
    let ipc_outbox = outbox.clone();
    let ipc_viewer = Arc::clone(&viewer);
    let ipc_handler = move |req: wry::http::Request<String>| {
        let Some(envelope) = parse_message(req.body()) else { return };

        if matches!(envelope.command, Command::Quit) {
            let _ = ipc_outbox.proxy().send_event(UserEvent::Quit);
            return;
        }
        if !ipc_outbox.reserve() {
            log::warn!("IPC backpressure: dropping request (id={})", envelope.id);
            return;
        }
        if is_blocking_command(&envelope.command) {
            let worker_outbox = ipc_outbox.clone();
            let worker_viewer = Arc::clone(&ipc_viewer);
            ipc_pool.spawn(move || answer(&worker_outbox, &worker_viewer, envelope));
        } else {
            answer(&ipc_outbox, &ipc_viewer, envelope);
        }
    };

    let protocol_viewer = Arc::clone(&viewer);
    let protocol_handler = move |_: wry::WebViewId<'_>, request: wry::http::Request<Vec<u8>>| {
        protocol::response(protocol::serve(&UI, &protocol_viewer, request.uri().path()))
    };

    let navigation_allow =
        move |url: String| url.starts_with("app://") || url.contains("app.localhost");

    let shown = Arc::new(AtomicBool::new(false));
    let on_page_load = {
        let p = proxy.clone();
        let s = Arc::clone(&shown);
        move |_event: wry::PageLoadEvent, _url: String| {
            if !s.swap(true, Ordering::Relaxed) {
                let _ = p.send_event(UserEvent::ShowWindow);
            }
        }
    };
    {
        let p = proxy.clone();
        let s = Arc::clone(&shown);
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(SHOW_WINDOW_FALLBACK_SECS));
            if !s.swap(true, Ordering::Relaxed) {
                let _ = p.send_event(UserEvent::ShowWindow);
            }
        });
    }

    let mut web_context = wry::WebContext::new(Some(user_data_dir()));
    let devtools = std::env::var(ENV_DEVTOOLS).as_deref() == Ok("1");

    let builder = WebViewBuilder::new_with_web_context(&mut web_context)
        .with_custom_protocol("app".to_string(), protocol_handler)
        .with_url("app://localhost/index.html")
        .with_ipc_handler(ipc_handler)
        .with_initialization_script(init_script())
        .with_navigation_handler(navigation_allow)
        .with_on_page_load_handler(on_page_load)
        .with_devtools(devtools);

    #[cfg(any(target_os = "windows", target_os = "macos"))]
    let webview = builder.build(&window).unwrap_or_else(|e| {
        exit_fatal(&format!("Failed to build webview: {}", e));
    });

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    let webview = {
        use tao::platform::unix::WindowExtUnix;
        use wry::WebViewBuilderExtUnix;
        let vbox = window.default_vbox().unwrap_or_else(|| exit_fatal("Failed to get GTK vbox"));
        builder.build_gtk(vbox).unwrap_or_else(|e| {
            exit_fatal(&format!("Failed to build webview: {}", e));
        })
    };

    // Duplicates reach us only from here on; until now they wait in the accept backlog.
    instance.attach(proxy);

    run_event_loop(event_loop, webview, window, web_context, viewer, outbox, instance);
}
