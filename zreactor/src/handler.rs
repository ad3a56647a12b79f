//! Application callback invoked by the reactor thread.

/// Receiver of inbound application payloads.
///
/// `on_message` runs synchronously on the reactor thread, once per payload,
/// in arrival order per socket. While it runs no other socket is serviced
/// and no control command is processed, so it must not block indefinitely.
/// Calling `Reactor` producer operations from inside it fails with
/// `Error::ReentrantCall`; the inspection methods (`len`, `contains`,
/// `locations`, `is_closed`) are safe to call.
///
/// Closures implement this trait:
///
/// ```
/// use zreactor::handler::MessageHandler;
///
/// fn assert_handler<H: MessageHandler>(_: H) {}
/// assert_handler(|payload: String| println!("{payload}"));
/// ```
pub trait MessageHandler: Send + 'static {
    /// Handle one payload.
    fn on_message(&mut self, payload: String);
}

impl<F> MessageHandler for F
where
    F: FnMut(String) + Send + 'static,
{
    fn on_message(&mut self, payload: String) {
        self(payload);
    }
}
