// Bridge scenarios driven through raw channel messages, as the engine delivers them.

use std::cell::RefCell;
use std::rc::Rc;

use karasu_launcher_runner::{
    codec::{self, EncodableValue, MethodCall, MethodEnvelope},
    constants::{UPDATE_WINDOW_TITLE_METHOD, WINDOW_CHANNEL},
    method_channel::MethodChannel,
    window_channel::{window_channel, TitleSink, WindowTitleBridge},
};

#[derive(Default)]
struct Window {
    title: Option<String>,
    repaints: usize,
}

struct Sink(Rc<RefCell<Window>>);

impl TitleSink for Sink {
    fn set_title(&mut self, title: &[u16]) {
        let end = title.iter().position(|&c| c == 0).unwrap_or(title.len());
        self.0.borrow_mut().title = Some(String::from_utf16(&title[..end]).unwrap());
    }

    fn invalidate(&mut self) {
        self.0.borrow_mut().repaints += 1;
    }
}

fn setup() -> (MethodChannel, Rc<RefCell<WindowTitleBridge>>, Rc<RefCell<Window>>) {
    let window = Rc::new(RefCell::new(Window::default()));
    let bridge = Rc::new(RefCell::new(WindowTitleBridge::new(Box::new(Sink(window.clone())))));
    (window_channel(bridge.clone()), bridge, window)
}

fn invoke(channel: &mut MethodChannel, arguments: EncodableValue) -> MethodEnvelope {
    let call = MethodCall::new(UPDATE_WINDOW_TITLE_METHOD, arguments);
    let reply = channel.handle_message(&codec::encode_method_call(&call).unwrap());
    codec::decode_envelope(&reply).unwrap()
}

#[test]
fn channel_has_the_launcher_name() {
    let (channel, _, _) = setup();
    assert_eq!(channel.name(), "com.karasu256.karasu_launcher/window");
    assert_eq!(channel.name(), WINDOW_CHANNEL);
}

#[test]
fn hello_sets_the_title() {
    let (mut channel, bridge, window) = setup();
    let args = EncodableValue::Map(vec![("title".into(), "Hello".into())]);

    assert_eq!(invoke(&mut channel, args), MethodEnvelope::Success(EncodableValue::Null));
    assert_eq!(window.borrow().title.as_deref(), Some("Hello"));
    assert_eq!(window.borrow().repaints, 1);
    assert_eq!(bridge.borrow().current_title(), "Hello");
}

#[test]
fn empty_map_leaves_title_unchanged() {
    let (mut channel, bridge, window) = setup();

    assert_eq!(
        invoke(&mut channel, EncodableValue::Map(vec![])),
        MethodEnvelope::Success(EncodableValue::Null)
    );
    assert_eq!(window.borrow().title, None);
    assert_eq!(bridge.borrow().current_title(), "Karasu Launcher");
}

#[test]
fn numeric_title_leaves_title_unchanged() {
    let (mut channel, bridge, window) = setup();
    let args = EncodableValue::Map(vec![("title".into(), EncodableValue::Int32(123))]);

    assert_eq!(invoke(&mut channel, args), MethodEnvelope::Success(EncodableValue::Null));
    assert_eq!(window.borrow().title, None);
    assert_eq!(window.borrow().repaints, 0);
    assert_eq!(bridge.borrow().current_title(), "Karasu Launcher");
}

#[test]
fn successive_updates_keep_the_last_title() {
    let (mut channel, bridge, window) = setup();
    for title in ["Home", "Settings", "ゲーム"] {
        let args = EncodableValue::Map(vec![("title".into(), title.into())]);
        invoke(&mut channel, args);
    }
    assert_eq!(window.borrow().title.as_deref(), Some("ゲーム"));
    assert_eq!(window.borrow().repaints, 3);
    assert_eq!(bridge.borrow().current_title(), "ゲーム");
}

#[test]
fn deeply_nested_payload_is_answered_empty() {
    let (mut channel, bridge, window) = setup();
    let mut message = codec::encode_value(&UPDATE_WINDOW_TITLE_METHOD.into()).unwrap();
    for _ in 0..2_000_000 {
        message.extend_from_slice(&[12, 1]);
    }
    message.push(0);

    assert!(channel.handle_message(&message).is_empty());
    assert_eq!(window.borrow().title, None);
    assert_eq!(bridge.borrow().current_title(), "Karasu Launcher");
}
