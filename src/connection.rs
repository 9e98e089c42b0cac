//! Connection state machine.
//!
//! [`Connection`] is the transport-agnostic core exposed to application
//! code. It owns at most one transport instance at a time, tracks open
//! state, and mediates every lifecycle transition:
//!
//! ```text
//! Idle ──open──► Opening ──bridge Opened──► Open
//!   ▲               │                        │
//!   └──close────────┴──────close / Failed────┘
//! ```
//!
//! # Event Contract
//!
//! No public operation returns an error or panics. Every fault (URL
//! parsing, handshake construction, transport submission, shutdown) is
//! caught at the operation boundary and redirected to the `Error` event.
//! Without an `Error` subscriber those faults are silently swallowed.
//!
//! # Threading
//!
//! Commands (`open`, `close`, `send_*`, `dispose`) are intended to be issued
//! from one logical owner context, while transport events arrive on the
//! transport's own I/O context. The transport slot (`transport` + `is_open`
//! + bridge generation) is one atomically-updated unit behind a mutex, so a
//! send observes either the attached transport or none, and a stale bridge
//! can never re-enter a connection that already tore it down. Transport
//! methods are always invoked with that mutex released; a send snapshots
//! the attachment under the lock and submits outside it.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::events::{ConnectionEvents, Subscription};
use crate::headers::Headers;
use crate::transport::{ConnectRequest, Transport, TransportBuilder, TransportEvent};

// ============================================================================
// Constants
// ============================================================================

/// Inbound text payload treated as a simulated pong frame.
///
/// Bindings that tunnel keep-alive over the message channel reply with this
/// literal; it is routed to the `Pong` event instead of `Message`.
const SIMULATED_PONG: &str = "pong";

// ============================================================================
// OpenOptions
// ============================================================================

/// Optional parameters for [`Connection::open_with`].
///
/// # Example
///
/// ```ignore
/// connection.open_with(
///     "wss://echo.example/socket",
///     OpenOptions::new()
///         .protocol("chat.v2")
///         .auth_token("Bearer abc"),
/// );
/// ```
#[derive(Debug, Default, Clone)]
pub struct OpenOptions {
    /// WebSocket subprotocol to negotiate.
    protocol: Option<String>,
    /// Extra handshake headers.
    headers: Headers,
    /// Bearer token merged into the `Authorization` header.
    auth_token: Option<String>,
}

impl OpenOptions {
    /// Creates empty open options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the WebSocket subprotocol.
    #[inline]
    #[must_use]
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    /// Adds one handshake header.
    #[inline]
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replaces the handshake header set.
    #[inline]
    #[must_use]
    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the auth token merged under `Authorization`.
    ///
    /// A caller-supplied `Authorization` header wins over the token.
    #[inline]
    #[must_use]
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

// ============================================================================
// Slot
// ============================================================================

/// The transport-attachment slot.
///
/// All three fields form one atomically-updated unit. `generation` is the
/// bridge disarm mechanism: every attach and detach bumps it, and a bridge
/// stamped with an older generation is refused at delivery.
///
/// The transport is attached before its `connect` is issued, so whenever
/// `is_open` is true a transport is present and a send fired from inside an
/// `Opened` handler reaches it.
struct Slot {
    transport: Option<Arc<dyn Transport>>,
    is_open: bool,
    generation: u64,
}

// ============================================================================
// Core
// ============================================================================

/// Shared connection internals behind the cheap-clone [`Connection`] handle.
struct Core {
    builder: TransportBuilder,
    events: ConnectionEvents,
    slot: Mutex<Slot>,
}

// ============================================================================
// Bridge
// ============================================================================

/// Callback wiring from a transport into its connection.
///
/// Each connect attempt gets a bridge stamped with the slot generation
/// current at attach time. Delivery re-checks the stamp under the slot lock,
/// so once the connection detaches a transport (close, reopen, or failure
/// auto-detach) late events from that transport are dropped silently.
#[derive(Clone)]
pub struct Bridge {
    core: Weak<Core>,
    generation: u64,
}

impl Bridge {
    /// Delivers one transport event to the connection.
    ///
    /// Safe to call from any thread or task. Events from a detached
    /// transport are dropped.
    pub fn deliver(&self, event: TransportEvent) {
        let Some(core) = self.core.upgrade() else {
            return;
        };

        let mut slot = core.slot.lock();
        if slot.generation != self.generation {
            debug!(?event, "dropping event from detached transport");
            return;
        }

        match event {
            TransportEvent::Opened => {
                slot.is_open = true;
                drop(slot);

                debug!("connection opened");
                core.events.emit_log("connection opened");
                core.events.emit_opened();
            }

            TransportEvent::Failed { message } => {
                let was_open = slot.is_open;
                // Auto-detach: the failed transport is released and its
                // bridge disarmed before any handler runs.
                slot.transport = None;
                slot.is_open = false;
                slot.generation = slot.generation.wrapping_add(1);
                drop(slot);

                let error = Error::transport_or_generic(message);
                warn!(error = %error, was_open, "transport failed");
                core.events.emit_log(&format!("connection failed: {error}"));
                core.events.emit_error(&error);
                if was_open {
                    core.events.emit_closed();
                }
            }

            TransportEvent::Closed { reason } => {
                slot.is_open = false;
                drop(slot);

                debug!(?reason, "connection closed by peer");
                core.events.emit_log("connection closed");
                core.events.emit_closed();
            }

            TransportEvent::SendFailed { message } => {
                drop(slot);

                let error = Error::send(message);
                warn!(error = %error, "asynchronous send failed");
                core.events.emit_error(&error);
            }

            TransportEvent::Message(text) => {
                drop(slot);

                if text == SIMULATED_PONG {
                    core.events.emit_pong(&text);
                } else {
                    core.events.emit_message(&text);
                }
            }

            TransportEvent::Pong(payload) => {
                drop(slot);
                core.events.emit_pong(&payload);
            }
        }
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("generation", &self.generation)
            .finish()
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Client-side WebSocket connection, independent of transport.
///
/// Cheap to clone; all clones share the same state and subscriber lists.
/// Build instances through [`create_connection`](crate::create_connection)
/// or [`Connection::with_transport_builder`].
pub struct Connection {
    core: Arc<Core>,
}

impl Clone for Connection {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("is_open", &self.is_open())
            .finish()
    }
}

// ============================================================================
// Connection - Construction
// ============================================================================

impl Connection {
    /// Creates a connection backed by the given transport builder.
    ///
    /// A fresh transport is built from `builder` on every open.
    #[must_use]
    pub fn with_transport_builder(
        builder: impl Fn() -> Box<dyn Transport> + Send + Sync + 'static,
    ) -> Self {
        Self::from_builder(Arc::new(builder))
    }

    pub(crate) fn from_builder(builder: TransportBuilder) -> Self {
        Self {
            core: Arc::new(Core {
                builder,
                events: ConnectionEvents::new(),
                slot: Mutex::new(Slot {
                    transport: None,
                    is_open: false,
                    generation: 0,
                }),
            }),
        }
    }
}

// ============================================================================
// Connection - Operations
// ============================================================================

impl Connection {
    /// Opens the connection to `url` with default options.
    ///
    /// See [`Connection::open_with`].
    pub fn open(&self, url: &str) {
        self.open_with(url, OpenOptions::new());
    }

    /// Opens the connection to `url`.
    ///
    /// `http`/`https` URLs are rewritten to `ws`/`wss`. An already-attached
    /// transport is fully torn down first (its bridge is disarmed before
    /// its shutdown is requested, and `Closed` fires for it), so no two
    /// transports are ever attached at once.
    ///
    /// The connect attempt completes out of band: success surfaces as one
    /// `Opened` event (possibly before this method returns, for transports
    /// that connect synchronously), failure as one `Error` event (never
    /// `Opened`). Faults in URL or header construction surface as `Error`
    /// as well; this method never panics or returns an error.
    pub fn open_with(&self, url: &str, options: OpenOptions) {
        // Synchronous full teardown of any previous transport.
        self.close();

        let request = match build_request(url, options) {
            Ok(request) => request,
            Err(error) => {
                warn!(url, error = %error, "open rejected");
                self.core.events.emit_error(&error);
                return;
            }
        };

        debug!(url = %request.url, protocol = ?request.protocol, "opening connection");
        self.core.events.emit_log(&format!("opening {}", request.url));

        let transport: Arc<dyn Transport> = Arc::from((self.core.builder)());
        let bridge = {
            let mut slot = self.core.slot.lock();
            slot.generation = slot.generation.wrapping_add(1);
            // Attach before issuing connect: `Opened` may arrive
            // synchronously, and its handlers may send right away.
            slot.transport = Some(Arc::clone(&transport));
            Bridge {
                core: Arc::downgrade(&self.core),
                generation: slot.generation,
            }
        };
        let attach_generation = bridge.generation;

        if let Err(error) = transport.connect(request, bridge) {
            // Keep the policy uniform with failure auto-detach: the dead
            // transport is released and its bridge disarmed, unless the
            // transport already detached itself through the bridge.
            {
                let mut slot = self.core.slot.lock();
                if slot.generation == attach_generation {
                    slot.transport = None;
                    slot.is_open = false;
                    slot.generation = slot.generation.wrapping_add(1);
                }
            }
            warn!(error = %error, "connect failed synchronously");
            self.core.events.emit_error(&error);
        }
    }

    /// Closes the connection.
    ///
    /// Idempotent: with no transport attached this is a no-op and fires
    /// nothing. Otherwise the transport's bridge is disarmed first, shutdown
    /// is requested only if the transport reports itself connected, the
    /// transport is released, and exactly one `Closed` fires.
    ///
    /// A shutdown fault is redirected to `Error`; `Closed` does not fire on
    /// that path.
    pub fn close(&self) {
        let transport = {
            let mut slot = self.core.slot.lock();
            let Some(transport) = slot.transport.take() else {
                return;
            };
            // Disarm the bridge before requesting shutdown so a
            // shutdown-triggered close event cannot re-enter.
            slot.generation = slot.generation.wrapping_add(1);
            slot.is_open = false;
            transport
        };

        if transport.is_connected() {
            if let Err(error) = transport.shutdown() {
                warn!(error = %error, "shutdown failed");
                self.core.events.emit_error(&error);
                return;
            }
        }
        drop(transport);

        debug!("connection closed");
        self.core.events.emit_log("connection closed");
        self.core.events.emit_closed();
    }

    /// Submits a text message.
    ///
    /// Fire-and-forget: a silent no-op with no transport attached, and any
    /// submission fault surfaces as an `Error` event, never a return value.
    pub fn send_text(&self, text: &str) {
        let Some(transport) = self.transport_snapshot() else {
            return;
        };

        if let Err(error) = transport.send_text(text.to_owned()) {
            warn!(error = %error, "text send failed");
            self.core.events.emit_error(&error);
        }
    }

    /// Submits a binary message.
    ///
    /// Same contract as [`Connection::send_text`].
    pub fn send_bytes(&self, bytes: &[u8]) {
        let Some(transport) = self.transport_snapshot() else {
            return;
        };

        if let Err(error) = transport.send_bytes(bytes.to_vec()) {
            warn!(error = %error, "binary send failed");
            self.core.events.emit_error(&error);
        }
    }

    /// Requests a transport-level ping.
    ///
    /// The payload is best-effort: a binding may substitute a fixed marker,
    /// so it is not guaranteed to round-trip verbatim in the pong. Same
    /// fire-and-forget contract as [`Connection::send_text`].
    pub fn send_ping(&self, payload: &str) {
        let Some(transport) = self.transport_snapshot() else {
            return;
        };

        if let Err(error) = transport.send_ping(payload.to_owned()) {
            warn!(error = %error, "ping send failed");
            self.core.events.emit_error(&error);
        }
    }

    /// Closes the connection and fires exactly one `Disposed` event,
    /// regardless of prior state.
    pub fn dispose(&self) {
        self.close();

        debug!("connection disposed");
        self.core.events.emit_log("connection disposed");
        let handle = self.clone();
        self.core.events.emit_disposed(&handle);
    }

    /// Returns `true` while the connection is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.core.slot.lock().is_open
    }

    /// Snapshots the attached transport, if any, without keeping the slot
    /// locked across the transport call.
    fn transport_snapshot(&self) -> Option<Arc<dyn Transport>> {
        self.core.slot.lock().transport.clone()
    }
}

// ============================================================================
// Connection - Subscriptions
// ============================================================================

impl Connection {
    /// Subscribes to `Opened` events.
    pub fn on_opened(&self, handler: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.core.events.subscribe_opened(handler)
    }

    /// Subscribes to `Closed` events.
    pub fn on_closed(&self, handler: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.core.events.subscribe_closed(handler)
    }

    /// Subscribes to `Disposed` events.
    pub fn on_disposed(
        &self,
        handler: impl Fn(&Connection) + Send + Sync + 'static,
    ) -> Subscription {
        self.core.events.subscribe_disposed(handler)
    }

    /// Subscribes to `Error` events.
    ///
    /// This is the only channel through which faults surface; a connection
    /// without an error subscriber swallows them.
    pub fn on_error(&self, handler: impl Fn(&Error) + Send + Sync + 'static) -> Subscription {
        self.core.events.subscribe_error(handler)
    }

    /// Subscribes to inbound text messages.
    pub fn on_message(&self, handler: impl Fn(&str) + Send + Sync + 'static) -> Subscription {
        self.core.events.subscribe_message(handler)
    }

    /// Subscribes to pong events (native frames or the simulated `"pong"`
    /// text reply).
    pub fn on_pong(&self, handler: impl Fn(&str) + Send + Sync + 'static) -> Subscription {
        self.core.events.subscribe_pong(handler)
    }

    /// Subscribes to lifecycle log lines.
    pub fn on_log(&self, handler: impl Fn(&str) + Send + Sync + 'static) -> Subscription {
        self.core.events.subscribe_log(handler)
    }

    /// Removes one subscription; other subscribers keep their order.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        self.core.events.unsubscribe(subscription);
    }
}

// ============================================================================
// Request Construction
// ============================================================================

/// Rewrites HTTP schemes to their WebSocket counterparts.
fn normalize_scheme(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        url.to_owned()
    }
}

/// Builds the connect request: parse + normalize the URL, merge the auth
/// token into the headers.
fn build_request(url: &str, options: OpenOptions) -> Result<ConnectRequest> {
    let parsed = Url::parse(&normalize_scheme(url))?;

    let mut headers = options.headers;
    headers.merge_auth_token(options.auth_token.as_deref());

    Ok(ConnectRequest {
        url: parsed,
        protocol: options.protocol,
        headers,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex as PlMutex;

    // ------------------------------------------------------------------------
    // FakeTransport
    // ------------------------------------------------------------------------

    #[derive(Default)]
    struct FakeState {
        bridge: Option<Bridge>,
        request: Option<ConnectRequest>,
        sent_texts: Vec<String>,
        sent_bytes: Vec<Vec<u8>>,
        sent_pings: Vec<String>,
        connected: bool,
        shutdown_requested: bool,
        fail_connect: bool,
        fail_send: bool,
        fail_shutdown: bool,
        /// Deliver `Opened` synchronously from inside `connect`.
        open_inline: bool,
    }

    struct FakeTransport {
        state: Arc<PlMutex<FakeState>>,
    }

    impl Transport for FakeTransport {
        fn connect(&self, request: ConnectRequest, bridge: Bridge) -> Result<()> {
            let open_inline = {
                let mut state = self.state.lock();
                state.request = Some(request);
                if state.fail_connect {
                    return Err(Error::connect("fake connect refused"));
                }
                state.bridge = Some(bridge.clone());
                state.connected = true;
                state.open_inline
            };

            // Delivered with the state lock released: handlers may call
            // straight back into this transport.
            if open_inline {
                bridge.deliver(TransportEvent::Opened);
            }
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.state.lock().connected
        }

        fn send_text(&self, text: String) -> Result<()> {
            let mut state = self.state.lock();
            if state.fail_send {
                return Err(Error::send("fake send failure"));
            }
            state.sent_texts.push(text);
            Ok(())
        }

        fn send_bytes(&self, bytes: Vec<u8>) -> Result<()> {
            let mut state = self.state.lock();
            if state.fail_send {
                return Err(Error::send("fake send failure"));
            }
            state.sent_bytes.push(bytes);
            Ok(())
        }

        fn send_ping(&self, payload: String) -> Result<()> {
            let mut state = self.state.lock();
            if state.fail_send {
                return Err(Error::send("fake send failure"));
            }
            state.sent_pings.push(payload);
            Ok(())
        }

        fn shutdown(&self) -> Result<()> {
            let mut state = self.state.lock();
            state.shutdown_requested = true;
            state.connected = false;
            if state.fail_shutdown {
                return Err(Error::shutdown("fake shutdown failure"));
            }
            Ok(())
        }
    }

    /// Registry of fake transports built so far, in creation order.
    type FakeRegistry = Arc<PlMutex<Vec<Arc<PlMutex<FakeState>>>>>;

    fn fake_connection() -> (Connection, FakeRegistry) {
        fake_connection_with(FakeState::default)
    }

    fn fake_connection_with(
        template: impl Fn() -> FakeState + Send + Sync + 'static,
    ) -> (Connection, FakeRegistry) {
        let registry: FakeRegistry = Arc::new(PlMutex::new(Vec::new()));
        let builder_registry = Arc::clone(&registry);

        let connection = Connection::with_transport_builder(move || {
            let state = Arc::new(PlMutex::new(template()));
            builder_registry.lock().push(Arc::clone(&state));
            Box::new(FakeTransport { state })
        });

        (connection, registry)
    }

    fn fake(registry: &FakeRegistry, index: usize) -> Arc<PlMutex<FakeState>> {
        Arc::clone(&registry.lock()[index])
    }

    fn bridge_of(state: &Arc<PlMutex<FakeState>>) -> Bridge {
        state.lock().bridge.clone().expect("bridge not captured")
    }

    // ------------------------------------------------------------------------
    // Event recorder
    // ------------------------------------------------------------------------

    fn record_events(connection: &Connection) -> Arc<PlMutex<Vec<String>>> {
        let events = Arc::new(PlMutex::new(Vec::new()));

        let log = Arc::clone(&events);
        connection.on_opened(move || log.lock().push("opened".to_owned()));
        let log = Arc::clone(&events);
        connection.on_closed(move || log.lock().push("closed".to_owned()));
        let log = Arc::clone(&events);
        connection.on_disposed(move |_| log.lock().push("disposed".to_owned()));
        let log = Arc::clone(&events);
        connection.on_error(move |error| log.lock().push(format!("error:{error}")));
        let log = Arc::clone(&events);
        connection.on_message(move |text| log.lock().push(format!("message:{text}")));
        let log = Arc::clone(&events);
        connection.on_pong(move |text| log.lock().push(format!("pong:{text}")));

        events
    }

    fn count(events: &Arc<PlMutex<Vec<String>>>, tag: &str) -> usize {
        events
            .lock()
            .iter()
            .filter(|event| event.as_str() == tag || event.starts_with(&format!("{tag}:")))
            .count()
    }

    // ------------------------------------------------------------------------
    // Open / close lifecycle
    // ------------------------------------------------------------------------

    #[test]
    fn test_open_then_opened_event_sets_open() {
        let (connection, registry) = fake_connection();
        let events = record_events(&connection);

        connection.open("wss://echo.example/socket");
        assert!(!connection.is_open());
        assert_eq!(count(&events, "opened"), 0);

        bridge_of(&fake(&registry, 0)).deliver(TransportEvent::Opened);

        assert!(connection.is_open());
        assert_eq!(count(&events, "opened"), 1);
        assert_eq!(count(&events, "error"), 0);
    }

    #[test]
    fn test_send_from_opened_handler_reaches_transport() {
        // Opened arrives synchronously from inside connect; the transport
        // must already be attached so a send fired by the handler lands.
        let (connection, registry) = fake_connection_with(|| FakeState {
            open_inline: true,
            ..FakeState::default()
        });
        let events = record_events(&connection);

        let open_seen_by_handler = Arc::new(PlMutex::new(false));
        let handler_flag = Arc::clone(&open_seen_by_handler);
        let sender = connection.clone();
        connection.on_opened(move || {
            *handler_flag.lock() = sender.is_open();
            sender.send_text("hello-on-open");
        });

        connection.open("wss://echo.example/socket");

        assert!(connection.is_open());
        assert!(*open_seen_by_handler.lock());
        assert_eq!(count(&events, "opened"), 1);
        assert_eq!(count(&events, "error"), 0);
        assert_eq!(
            fake(&registry, 0).lock().sent_texts,
            vec!["hello-on-open".to_owned()]
        );
    }

    #[test]
    fn test_reopen_detaches_first_transport_before_second_attaches() {
        let (connection, registry) = fake_connection();
        let events = record_events(&connection);

        connection.open("wss://one.example/");
        let first = fake(&registry, 0);
        bridge_of(&first).deliver(TransportEvent::Opened);

        connection.open("wss://two.example/");
        assert_eq!(registry.lock().len(), 2);

        // The first transport's shutdown was requested during teardown.
        assert!(first.lock().shutdown_requested);
        // Teardown of the open first transport fired one Closed.
        assert_eq!(count(&events, "closed"), 1);

        // Late events from the first transport are never observable.
        let stale = bridge_of(&first);
        stale.deliver(TransportEvent::Opened);
        stale.deliver(TransportEvent::Message("late".to_owned()));
        assert_eq!(count(&events, "opened"), 1);
        assert_eq!(count(&events, "message"), 0);

        // The second transport is live.
        bridge_of(&fake(&registry, 1)).deliver(TransportEvent::Opened);
        assert!(connection.is_open());
        assert_eq!(count(&events, "opened"), 2);
    }

    #[test]
    fn test_close_without_transport_fires_nothing() {
        let (connection, _registry) = fake_connection();
        let events = record_events(&connection);

        connection.close();

        assert!(events.lock().is_empty());
        assert!(!connection.is_open());
    }

    #[test]
    fn test_close_fires_exactly_one_closed() {
        let (connection, registry) = fake_connection();
        let events = record_events(&connection);

        connection.open("wss://echo.example/socket");
        bridge_of(&fake(&registry, 0)).deliver(TransportEvent::Opened);

        connection.close();

        assert!(!connection.is_open());
        assert_eq!(count(&events, "closed"), 1);
        assert!(fake(&registry, 0).lock().shutdown_requested);

        // Second close is a no-op.
        connection.close();
        assert_eq!(count(&events, "closed"), 1);
    }

    #[test]
    fn test_no_events_delivered_after_close() {
        let (connection, registry) = fake_connection();
        let events = record_events(&connection);

        connection.open("wss://echo.example/socket");
        let state = fake(&registry, 0);
        let bridge = bridge_of(&state);
        bridge.deliver(TransportEvent::Opened);

        connection.close();
        let baseline = events.lock().len();

        bridge.deliver(TransportEvent::Message("stale".to_owned()));
        bridge.deliver(TransportEvent::Closed { reason: None });
        bridge.deliver(TransportEvent::Failed { message: None });

        assert_eq!(events.lock().len(), baseline);
    }

    #[test]
    fn test_shutdown_fault_fires_error_instead_of_closed() {
        let (connection, registry) = fake_connection_with(|| FakeState {
            fail_shutdown: true,
            ..FakeState::default()
        });
        let events = record_events(&connection);

        connection.open("wss://echo.example/socket");
        bridge_of(&fake(&registry, 0)).deliver(TransportEvent::Opened);

        connection.close();

        assert_eq!(count(&events, "error"), 1);
        assert_eq!(count(&events, "closed"), 0);
        assert!(!connection.is_open());
    }

    #[test]
    fn test_synchronous_connect_fault_fires_error_not_opened() {
        let (connection, registry) = fake_connection_with(|| FakeState {
            fail_connect: true,
            ..FakeState::default()
        });
        let events = record_events(&connection);

        connection.open("wss://echo.example/socket");

        assert_eq!(count(&events, "error"), 1);
        assert_eq!(count(&events, "opened"), 0);
        assert!(!connection.is_open());

        // The failed transport never attached: close stays a no-op and the
        // fake never saw a shutdown.
        connection.close();
        assert_eq!(count(&events, "closed"), 0);
        assert!(!fake(&registry, 0).lock().shutdown_requested);
    }

    #[test]
    fn test_invalid_url_fires_error() {
        let (connection, registry) = fake_connection();
        let events = record_events(&connection);

        connection.open("not a url");

        assert_eq!(count(&events, "error"), 1);
        assert!(registry.lock().is_empty());
        assert!(!connection.is_open());
    }

    // ------------------------------------------------------------------------
    // Failure callback
    // ------------------------------------------------------------------------

    #[test]
    fn test_failure_while_open_fires_error_then_closed() {
        let (connection, registry) = fake_connection();
        let events = record_events(&connection);

        connection.open("wss://echo.example/socket");
        let bridge = bridge_of(&fake(&registry, 0));
        bridge.deliver(TransportEvent::Opened);

        bridge.deliver(TransportEvent::Failed {
            message: Some("reset by peer".to_owned()),
        });

        assert!(!connection.is_open());
        assert_eq!(count(&events, "error"), 1);
        assert_eq!(count(&events, "closed"), 1);
        assert!(events
            .lock()
            .iter()
            .any(|event| event.contains("reset by peer")));
    }

    #[test]
    fn test_failure_before_open_fires_error_without_closed() {
        let (connection, registry) = fake_connection();
        let events = record_events(&connection);

        connection.open("wss://echo.example/socket");
        bridge_of(&fake(&registry, 0)).deliver(TransportEvent::Failed { message: None });

        assert!(!connection.is_open());
        assert_eq!(count(&events, "error"), 1);
        assert_eq!(count(&events, "closed"), 0);
        assert!(events
            .lock()
            .iter()
            .any(|event| event.contains("unknown websocket error")));
    }

    #[test]
    fn test_failure_auto_detaches_transport() {
        let (connection, registry) = fake_connection();
        let events = record_events(&connection);

        connection.open("wss://echo.example/socket");
        let bridge = bridge_of(&fake(&registry, 0));
        bridge.deliver(TransportEvent::Opened);
        bridge.deliver(TransportEvent::Failed { message: None });

        let baseline = events.lock().len();

        // Detached: sends are no-ops, close fires nothing, late bridge
        // events are dropped.
        connection.send_text("into the void");
        connection.close();
        bridge.deliver(TransportEvent::Message("late".to_owned()));

        assert_eq!(events.lock().len(), baseline);
        assert!(fake(&registry, 0).lock().sent_texts.is_empty());
    }

    // ------------------------------------------------------------------------
    // Sends
    // ------------------------------------------------------------------------

    #[test]
    fn test_send_without_transport_is_silent_noop() {
        let (connection, _registry) = fake_connection();
        let events = record_events(&connection);

        connection.send_text("hi");
        connection.send_bytes(&[1, 2, 3]);
        connection.send_ping("ping");

        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_send_reaches_transport() {
        let (connection, registry) = fake_connection();
        record_events(&connection);

        connection.open("wss://echo.example/socket");
        bridge_of(&fake(&registry, 0)).deliver(TransportEvent::Opened);

        connection.send_text("hi");
        connection.send_bytes(&[0xde, 0xad]);
        connection.send_ping("keepalive");

        let state = fake(&registry, 0);
        assert_eq!(state.lock().sent_texts, vec!["hi".to_owned()]);
        assert_eq!(state.lock().sent_bytes, vec![vec![0xde, 0xad]]);
        assert_eq!(state.lock().sent_pings, vec!["keepalive".to_owned()]);
    }

    #[test]
    fn test_send_fault_fires_error() {
        let (connection, registry) = fake_connection_with(|| FakeState {
            fail_send: true,
            ..FakeState::default()
        });
        let events = record_events(&connection);

        connection.open("wss://echo.example/socket");
        bridge_of(&fake(&registry, 0)).deliver(TransportEvent::Opened);

        connection.send_text("hi");
        assert_eq!(count(&events, "error"), 1);

        connection.send_ping("keepalive");
        assert_eq!(count(&events, "error"), 2);
    }

    #[test]
    fn test_async_send_fault_fires_error_without_teardown() {
        let (connection, registry) = fake_connection();
        let events = record_events(&connection);

        connection.open("wss://echo.example/socket");
        let bridge = bridge_of(&fake(&registry, 0));
        bridge.deliver(TransportEvent::Opened);

        bridge.deliver(TransportEvent::SendFailed {
            message: "write faulted".to_owned(),
        });

        assert_eq!(count(&events, "error"), 1);
        assert_eq!(count(&events, "closed"), 0);
        assert!(connection.is_open());
    }

    // ------------------------------------------------------------------------
    // Message routing
    // ------------------------------------------------------------------------

    #[test]
    fn test_pong_text_routes_to_pong_event() {
        let (connection, registry) = fake_connection();
        let events = record_events(&connection);

        connection.open("wss://echo.example/socket");
        let bridge = bridge_of(&fake(&registry, 0));
        bridge.deliver(TransportEvent::Opened);

        bridge.deliver(TransportEvent::Message("pong".to_owned()));
        bridge.deliver(TransportEvent::Message("ponged".to_owned()));
        bridge.deliver(TransportEvent::Pong("native".to_owned()));

        assert_eq!(count(&events, "pong"), 2);
        assert_eq!(count(&events, "message"), 1);
        assert!(events.lock().contains(&"message:ponged".to_owned()));
        assert!(events.lock().contains(&"pong:native".to_owned()));
    }

    // ------------------------------------------------------------------------
    // Dispose
    // ------------------------------------------------------------------------

    #[test]
    fn test_dispose_fires_exactly_one_disposed() {
        let (connection, registry) = fake_connection();
        let events = record_events(&connection);

        connection.open("wss://echo.example/socket");
        bridge_of(&fake(&registry, 0)).deliver(TransportEvent::Opened);

        connection.dispose();

        assert_eq!(count(&events, "disposed"), 1);
        assert_eq!(count(&events, "closed"), 1);
        assert!(!connection.is_open());
    }

    #[test]
    fn test_dispose_when_never_opened_still_fires_disposed() {
        let (connection, _registry) = fake_connection();
        let events = record_events(&connection);

        connection.dispose();

        assert_eq!(count(&events, "disposed"), 1);
        assert_eq!(count(&events, "closed"), 0);
    }

    // ------------------------------------------------------------------------
    // Request construction
    // ------------------------------------------------------------------------

    #[test]
    fn test_scheme_normalization() {
        assert_eq!(normalize_scheme("https://host/path"), "wss://host/path");
        assert_eq!(normalize_scheme("http://host/path"), "ws://host/path");
        assert_eq!(normalize_scheme("wss://host/path"), "wss://host/path");
        assert_eq!(normalize_scheme("ws://host/path"), "ws://host/path");
    }

    #[test]
    fn test_auth_token_becomes_authorization_header() {
        let (connection, registry) = fake_connection();
        record_events(&connection);

        connection.open_with(
            "https://echo.example/socket",
            OpenOptions::new().protocol("chat.v1").auth_token("abc"),
        );

        let state = fake(&registry, 0);
        let guard = state.lock();
        let request = guard.request.as_ref().expect("request not captured");

        assert_eq!(request.url.scheme(), "wss");
        assert_eq!(request.protocol.as_deref(), Some("chat.v1"));
        assert_eq!(request.headers.get("AUTHORIZATION"), Some("abc"));
    }

    #[test]
    fn test_caller_authorization_header_wins_over_token() {
        let (connection, registry) = fake_connection();
        record_events(&connection);

        connection.open_with(
            "wss://echo.example/socket",
            OpenOptions::new()
                .header("authorization", "caller")
                .auth_token("token"),
        );

        let state = fake(&registry, 0);
        let guard = state.lock();
        let request = guard.request.as_ref().expect("request not captured");
        assert_eq!(request.headers.get("Authorization"), Some("caller"));
        assert_eq!(request.headers.len(), 1);
    }

    // ------------------------------------------------------------------------
    // End-to-end scenario
    // ------------------------------------------------------------------------

    #[test]
    fn test_open_send_close_scenario() {
        let (connection, registry) = fake_connection();
        let events = record_events(&connection);

        connection.open("wss://echo.example/socket");
        bridge_of(&fake(&registry, 0)).deliver(TransportEvent::Opened);
        assert_eq!(count(&events, "opened"), 1);

        connection.send_text("hi");
        assert_eq!(fake(&registry, 0).lock().sent_texts, vec!["hi".to_owned()]);

        connection.close();
        assert_eq!(count(&events, "closed"), 1);
        assert!(!connection.is_open());
        assert_eq!(count(&events, "error"), 0);
    }
}
