//! Serial event delivery
//!
//! Engine callbacks and platform signal edges arrive on arbitrary threads.
//! [`EventDispatcher`] funnels them through one FIFO queue drained by a single
//! delivery thread, so every [`MessageHandler`] invocation is serialized and
//! in posting order. Producers hold a cheap [`EventSender`] whose `post`
//! never blocks.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{JoinHandle, ThreadId};
use std::time::Duration;

use genie_core::prelude::*;
use genie_core::{ConnectivityEdge, Event};
use tokio::sync::mpsc;

/// Work item for the delivery thread
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Inbound engine event
    Engine(Event),
    /// Derived platform signal transition, forwarded to the engine
    Edge(ConnectivityEdge),
}

/// Consumer running on the delivery thread
pub trait MessageHandler: Send + Sync + 'static {
    fn handle(&self, message: Message);
}

enum Envelope {
    Deliver(Message),
    /// Acknowledged once everything queued before it was delivered
    Barrier(std_mpsc::Sender<()>),
    Shutdown,
}

struct Shared {
    tx: OnceLock<mpsc::UnboundedSender<Envelope>>,
    closed: AtomicBool,
    delivery_thread: OnceLock<ThreadId>,
}

impl Shared {
    fn send(&self, envelope: Envelope) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        match self.tx.get() {
            Some(tx) => tx.send(envelope).is_ok(),
            None => false,
        }
    }

    fn on_delivery_thread(&self) -> bool {
        self.delivery_thread.get() == Some(&std::thread::current().id())
    }
}

/// Cloneable producer side of the dispatcher
#[derive(Clone)]
pub struct EventSender {
    shared: Arc<Shared>,
}

impl EventSender {
    /// Enqueue a message for delivery.
    ///
    /// Returns `false` (and drops the message) before the dispatcher has been
    /// started or after it was shut down.
    pub fn post(&self, message: Message) -> bool {
        let accepted = self.shared.send(Envelope::Deliver(message));
        if !accepted {
            trace!("Dispatcher not running, message dropped");
        }
        accepted
    }
}

/// Single-consumer delivery queue
pub struct EventDispatcher {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                tx: OnceLock::new(),
                closed: AtomicBool::new(false),
                delivery_thread: OnceLock::new(),
            }),
            thread: Mutex::new(None),
        }
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            shared: self.shared.clone(),
        }
    }

    /// Spawn the delivery thread. Idempotent while running.
    pub fn start(&self, handler: Arc<dyn MessageHandler>) -> Result<()> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(Error::Disposed);
        }

        let mut thread = self.thread.lock().map_err(|_| Error::ChannelClosed)?;
        if thread.is_some() {
            return Ok(());
        }
        // A shutdown may have landed while we waited for the lock
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(Error::Disposed);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let shared = self.shared.clone();
        let handle = std::thread::Builder::new()
            .name("genie-dispatch".to_string())
            .spawn(move || run_delivery(shared, rx, handler))?;

        let _ = self.shared.delivery_thread.set(handle.thread().id());
        let _ = self.shared.tx.set(tx);
        *thread = Some(handle);

        debug!("Event dispatcher started");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        !self.shared.closed.load(Ordering::Acquire) && self.shared.tx.get().is_some()
    }

    /// True when called from inside a handler invocation
    pub fn is_delivery_thread(&self) -> bool {
        self.shared.on_delivery_thread()
    }

    /// Block until every message posted before this call has been delivered.
    ///
    /// Returns `false` on timeout, when not running, or when called from the
    /// delivery thread itself.
    pub fn flush(&self, timeout: Duration) -> bool {
        if self.shared.on_delivery_thread() {
            return false;
        }
        let (ack_tx, ack_rx) = std_mpsc::channel();
        if !self.shared.send(Envelope::Barrier(ack_tx)) {
            return false;
        }
        ack_rx.recv_timeout(timeout).is_ok()
    }

    /// Stop delivery and discard anything still queued.
    ///
    /// Waits for an in-flight handler invocation to finish unless called from
    /// the delivery thread. Idempotent.
    pub fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        // Holding the lock, `start` has either published `tx` or will see `closed`
        let handle = match self.thread.lock() {
            Ok(mut thread) => {
                if let Some(tx) = self.shared.tx.get() {
                    let _ = tx.send(Envelope::Shutdown);
                }
                thread.take()
            }
            Err(_) => None,
        };

        if let Some(handle) = handle {
            if self.shared.on_delivery_thread() {
                debug!("Dispatcher shut down from its own thread, not joining");
            } else if handle.join().is_err() {
                error!("Event dispatcher thread panicked");
            }
        }

        debug!("Event dispatcher stopped");
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_delivery(
    shared: Arc<Shared>,
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    handler: Arc<dyn MessageHandler>,
) {
    while let Some(envelope) = rx.blocking_recv() {
        if shared.closed.load(Ordering::Acquire) {
            break;
        }

        match envelope {
            Envelope::Deliver(message) => {
                let result = catch_unwind(AssertUnwindSafe(|| handler.handle(message)));
                if result.is_err() {
                    error!("Message handler panicked; continuing delivery");
                }
            }
            Envelope::Barrier(ack) => {
                let _ = ack.send(());
            }
            Envelope::Shutdown => break,
        }
    }

    rx.close();
    let mut discarded = 0usize;
    while let Ok(envelope) = rx.try_recv() {
        if matches!(envelope, Envelope::Deliver(_)) {
            discarded += 1;
        }
    }
    if discarded > 0 {
        debug!("Discarded {} undelivered messages", discarded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genie_core::StatusCode;

    #[derive(Default)]
    struct Collector {
        seen: Mutex<Vec<Message>>,
        threads: Mutex<Vec<ThreadId>>,
    }

    impl MessageHandler for Collector {
        fn handle(&self, message: Message) {
            self.threads
                .lock()
                .unwrap()
                .push(std::thread::current().id());
            self.seen.lock().unwrap().push(message);
        }
    }

    fn asr(text: &str) -> Message {
        Message::Engine(Event::AsrResult { text: text.into() })
    }

    #[test]
    fn test_post_before_start_is_noop() {
        let dispatcher = EventDispatcher::new();
        assert!(!dispatcher.sender().post(asr("early")));
        assert!(!dispatcher.is_running());
        assert!(!dispatcher.flush(Duration::from_millis(10)));
    }

    #[test]
    fn test_delivers_in_fifo_order_on_one_thread() {
        let dispatcher = EventDispatcher::new();
        let collector = Arc::new(Collector::default());
        dispatcher.start(collector.clone()).unwrap();

        let sender = dispatcher.sender();
        for i in 0..100 {
            assert!(sender.post(asr(&i.to_string())));
        }
        assert!(dispatcher.flush(Duration::from_secs(5)));

        let seen = collector.seen.lock().unwrap();
        let expected: Vec<Message> = (0..100).map(|i| asr(&i.to_string())).collect();
        assert_eq!(*seen, expected);

        let threads = collector.threads.lock().unwrap();
        assert!(threads.iter().all(|id| *id == threads[0]));
        assert_ne!(threads[0], std::thread::current().id());
    }

    #[test]
    fn test_concurrent_producers_are_serialized() {
        let dispatcher = EventDispatcher::new();
        let collector = Arc::new(Collector::default());
        dispatcher.start(collector.clone()).unwrap();

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let sender = dispatcher.sender();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        sender.post(asr(&format!("{}-{}", p, i)));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }
        assert!(dispatcher.flush(Duration::from_secs(5)));

        let seen = collector.seen.lock().unwrap();
        assert_eq!(seen.len(), 200);

        // Per-producer order is preserved
        for p in 0..4 {
            let prefix = format!("{}-", p);
            let own: Vec<usize> = seen
                .iter()
                .filter_map(|m| match m {
                    Message::Engine(Event::AsrResult { text }) => {
                        text.strip_prefix(&prefix).and_then(|n| n.parse().ok())
                    }
                    _ => None,
                })
                .collect();
            assert_eq!(own, (0..50).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_start_is_idempotent() {
        let dispatcher = EventDispatcher::new();
        let collector = Arc::new(Collector::default());
        dispatcher.start(collector.clone()).unwrap();
        dispatcher.start(collector.clone()).unwrap();

        dispatcher.sender().post(asr("once"));
        assert!(dispatcher.flush(Duration::from_secs(5)));
        assert_eq!(collector.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_shutdown_drops_later_posts() {
        let dispatcher = EventDispatcher::new();
        let collector = Arc::new(Collector::default());
        dispatcher.start(collector.clone()).unwrap();
        let sender = dispatcher.sender();

        dispatcher.shutdown();
        dispatcher.shutdown();

        assert!(!sender.post(Message::Edge(ConnectivityEdge::NetworkUp)));
        assert!(!dispatcher.is_running());
        assert!(collector.seen.lock().unwrap().is_empty());
        assert!(matches!(
            dispatcher.start(collector.clone()),
            Err(Error::Disposed)
        ));
    }

    #[test]
    fn test_shutdown_discards_queued_messages() {
        struct Slow {
            gate: Mutex<std_mpsc::Receiver<()>>,
            seen: Mutex<Vec<Message>>,
        }
        impl MessageHandler for Slow {
            fn handle(&self, message: Message) {
                let _ = self.gate.lock().unwrap().recv();
                self.seen.lock().unwrap().push(message);
            }
        }

        let (gate_tx, gate_rx) = std_mpsc::channel();
        let handler = Arc::new(Slow {
            gate: Mutex::new(gate_rx),
            seen: Mutex::new(Vec::new()),
        });

        let dispatcher = Arc::new(EventDispatcher::new());
        dispatcher.start(handler.clone()).unwrap();
        let sender = dispatcher.sender();
        for i in 0..10 {
            sender.post(asr(&i.to_string()));
        }

        let closer = {
            let dispatcher = dispatcher.clone();
            std::thread::spawn(move || dispatcher.shutdown())
        };

        // Let the first (in-flight) delivery finish after shutdown began
        std::thread::sleep(Duration::from_millis(50));
        drop(gate_tx);
        closer.join().unwrap();

        assert!(handler.seen.lock().unwrap().len() <= 1);
    }

    #[test]
    fn test_shutdown_racing_start_does_not_hang() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let collector = Arc::new(Collector::default());

        // Park `start` after its first closed check, then let `shutdown` in
        let guard = dispatcher.thread.lock().unwrap();

        let (done_tx, done_rx) = std_mpsc::channel();
        let starter = {
            let dispatcher = dispatcher.clone();
            let done_tx = done_tx.clone();
            std::thread::spawn(move || {
                let result = dispatcher.start(collector);
                let _ = done_tx.send("start");
                result
            })
        };
        std::thread::sleep(Duration::from_millis(50));

        let closer = {
            let dispatcher = dispatcher.clone();
            std::thread::spawn(move || {
                dispatcher.shutdown();
                let _ = done_tx.send("shutdown");
            })
        };
        std::thread::sleep(Duration::from_millis(50));
        drop(guard);

        for _ in 0..2 {
            done_rx
                .recv_timeout(Duration::from_secs(5))
                .expect("start/shutdown interleaving blocked");
        }
        closer.join().unwrap();
        assert!(matches!(starter.join().unwrap(), Err(Error::Disposed)));
        assert!(!dispatcher.is_running());
    }

    #[test]
    fn test_handler_panic_does_not_stop_delivery() {
        struct Flaky {
            seen: Mutex<Vec<Message>>,
        }
        impl MessageHandler for Flaky {
            fn handle(&self, message: Message) {
                if message == Message::Engine(Event::status(StatusCode::Unauthorized)) {
                    panic!("listener failure");
                }
                self.seen.lock().unwrap().push(message);
            }
        }

        let dispatcher = EventDispatcher::new();
        let handler = Arc::new(Flaky {
            seen: Mutex::new(Vec::new()),
        });
        dispatcher.start(handler.clone()).unwrap();

        let sender = dispatcher.sender();
        sender.post(Message::Engine(Event::status(StatusCode::Unauthorized)));
        sender.post(Message::Engine(Event::status(StatusCode::Authorized)));
        assert!(dispatcher.flush(Duration::from_secs(5)));

        assert_eq!(
            *handler.seen.lock().unwrap(),
            vec![Message::Engine(Event::status(StatusCode::Authorized))]
        );
    }
}
