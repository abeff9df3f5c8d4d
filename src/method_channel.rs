//! A named method channel: decodes incoming standard-method-codec calls,
//! hands them to the installed handler and encodes the reply.

use log::{debug, error, warn};

use crate::codec::{self, EncodableValue, MethodCall};

/// What a handler answers to a method call.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResponse {
    Success(Option<EncodableValue>),
    Error {
        code: String,
        message: Option<String>,
        details: Option<EncodableValue>,
    },
    /// Encoded as an empty reply, which Dart reports as `MissingPluginException`.
    NotImplemented,
}

pub type MethodCallHandler = Box<dyn FnMut(&MethodCall) -> MethodResponse>;

pub struct MethodChannel {
    name: String,
    handler: Option<MethodCallHandler>,
}

impl MethodChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handler: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_method_call_handler<H>(&mut self, handler: H)
    where
        H: FnMut(&MethodCall) -> MethodResponse + 'static,
    {
        self.handler = Some(Box::new(handler));
    }

    /// Handles one raw message from the engine and returns the raw reply.
    ///
    /// An empty reply means "not handled": no handler, an undecodable call,
    /// or a [`MethodResponse::NotImplemented`] answer.
    pub fn handle_message(&mut self, message: &[u8]) -> Vec<u8> {
        let Some(handler) = self.handler.as_mut() else {
            warn!("[MethodChannel] '{}' has no handler installed", self.name);
            return Vec::new();
        };

        let call = match codec::decode_method_call(message) {
            Ok(call) => call,
            Err(e) => {
                error!(
                    "[MethodChannel] Unable to decode method call on '{}': {}",
                    self.name, e
                );
                return Vec::new();
            }
        };
        debug!("[MethodChannel] '{}' <- {}", self.name, call.method);

        let encoded = match handler(&call) {
            MethodResponse::Success(value) => codec::encode_success_envelope(value.as_ref()),
            MethodResponse::Error {
                code,
                message,
                details,
            } => codec::encode_error_envelope(&code, message.as_deref(), details.as_ref()),
            MethodResponse::NotImplemented => Ok(Vec::new()),
        };

        encoded.unwrap_or_else(|e| {
            error!(
                "[MethodChannel] Unable to encode reply for '{}' on '{}': {}",
                call.method, self.name, e
            );
            Vec::new()
        })
    }
}

impl std::fmt::Debug for MethodChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodChannel")
            .field("name", &self.name)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}
