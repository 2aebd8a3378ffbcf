//! Window and WebView glue: the init script and bringing the window to the front.

use tao::event_loop::EventLoopProxy;
use tao::window::Window;

use crate::event_loop::UserEvent;
use crate::single_instance::ActivationTarget;

impl ActivationTarget for Window {
    fn activate(&self) {
        if self.is_minimized() {
            self.set_minimized(false);
        }
        self.set_visible(true);
        self.set_focus();
    }
}

/// Activation target living on the single-instance thread. The window itself belongs to the
/// event loop thread, so activation is forwarded as [`UserEvent::Activate`].
pub struct ProxyActivator(pub EventLoopProxy<UserEvent>);

impl ActivationTarget for ProxyActivator {
    fn activate(&self) {
        if self.0.send_event(UserEvent::Activate).is_err() {
            log::debug!("Event loop gone; activation dropped");
        }
    }
}

/// Returns the init script: disables context menu, exposes `window.native` and IPC resolve helpers.
#[must_use]
pub fn init_script() -> &'static str {
    r#"
        document.addEventListener('contextmenu', function(e) { e.preventDefault(); });
        window.native = {
            send: function(msg) {
                if (window.ipc && typeof window.ipc.postMessage === 'function') {
                    window.ipc.postMessage(msg);
                }
            }
        };
        window.__ipcResolve = window.__ipcResolve || {};
        window.__resolveIpc = function(id, json) {
            if (window.__ipcResolve[id]) {
                window.__ipcResolve[id](json);
                delete window.__ipcResolve[id];
            }
        };
    "#
}
