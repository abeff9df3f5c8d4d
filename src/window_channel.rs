//! The `com.karasu256.karasu_launcher/window` bridge.
//!
//! Dart calls `updateWindowTitle` with `{"title": <String>}`. Anything that
//! does not have that shape is ignored, and every call is answered with an
//! empty success so the Dart side never sees an exception from this channel.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, info};

use crate::codec::{EncodableValue, MethodCall};
use crate::constants::{
    INITIAL_WINDOW_TITLE, TITLE_ARGUMENT, UPDATE_WINDOW_TITLE_METHOD, WINDOW_CHANNEL,
};
use crate::method_channel::{MethodChannel, MethodResponse};

/// Where a new title ends up: the native title bar.
pub trait TitleSink {
    /// `title` is UTF-16 and NUL-terminated.
    fn set_title(&mut self, title: &[u16]);
    /// Schedules a full repaint (background erase included).
    fn invalidate(&mut self);
}

/// Converts UTF-8 to NUL-terminated UTF-16.
///
/// The text is cut at the first NUL, the way a C string would be read.
pub fn utf8_to_wide(text: &str) -> Vec<u16> {
    let end = text.find('\0').unwrap_or(text.len());
    text[..end].encode_utf16().chain(std::iter::once(0)).collect()
}

/// Owns the current title and applies `updateWindowTitle` calls to a [`TitleSink`].
pub struct WindowTitleBridge {
    /// Without the terminator.
    current_title: Vec<u16>,
    sink: Box<dyn TitleSink>,
}

impl WindowTitleBridge {
    pub fn new(sink: Box<dyn TitleSink>) -> Self {
        Self {
            current_title: INITIAL_WINDOW_TITLE.encode_utf16().collect(),
            sink,
        }
    }

    pub fn current_title_wide(&self) -> &[u16] {
        &self.current_title
    }

    pub fn current_title(&self) -> String {
        String::from_utf16_lossy(&self.current_title)
    }

    /// Handles one call on the window channel. Always answers success.
    pub fn handle_method_call(&mut self, call: &MethodCall) -> MethodResponse {
        if call.method == UPDATE_WINDOW_TITLE_METHOD {
            match title_argument(&call.arguments) {
                Some(title) => self.update_title(title),
                None => debug!(
                    "[WindowChannel] Ignoring {} with arguments {:?}",
                    call.method, call.arguments
                ),
            }
        } else {
            debug!("[WindowChannel] Ignoring unknown method {}", call.method);
        }
        MethodResponse::Success(None)
    }

    fn update_title(&mut self, title: &str) {
        let wide = utf8_to_wide(title);
        if wide.is_empty() {
            return;
        }
        info!("[WindowChannel] Window title -> {:?}", title);
        self.current_title = wide[..wide.len() - 1].to_vec();
        self.sink.set_title(&wide);
        self.sink.invalidate();
    }
}

fn title_argument(arguments: &EncodableValue) -> Option<&str> {
    arguments.lookup(TITLE_ARGUMENT)?.as_str()
}

/// Builds the window channel with `bridge` installed as its handler.
pub fn window_channel(bridge: Rc<RefCell<WindowTitleBridge>>) -> MethodChannel {
    let mut channel = MethodChannel::new(WINDOW_CHANNEL);
    channel.set_method_call_handler(move |call| bridge.borrow_mut().handle_method_call(call));
    channel
}
