//! Provides the CaptureDevice, which mediates all access to one native
//! capture handle
//!
//! A device is either closed, open and idle, or capturing in the background.
//! While idle the native [`Reader`] lives inside the device and serves
//! [`CaptureDevice::get_next_packet`]. Starting a capture moves the reader
//! into the capture thread; stopping or closing the device joins that thread
//! and takes the reader back. The two retrieval modes therefore never touch
//! the handle at the same time.
//!
//! ```no_run
//! # use r_caplib::device::CaptureDevice;
//! let device = CaptureDevice::builder().name("eth0").build().unwrap();
//! device.open().unwrap();
//! device
//!     .on_packet_arrival(|arrival| {
//!         println!("{} bytes on {}", arrival.packet.length, arrival.device.name);
//!     })
//!     .unwrap();
//! device.start_capture().unwrap();
//! std::thread::sleep(std::time::Duration::from_secs(5));
//! device.close().unwrap();
//! ```

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::{
    cell::Cell,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    error::{RCapLibError, Result},
    network::NetworkInterface,
    packet::{CapturedPacket, DEFAULT_SNAPLEN, Reader},
    wire::{Backend, PNetBackend},
};

/// Default time a single native read waits for a packet. This also bounds
/// how long stopping a background capture can take.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default size of the native read buffer in bytes
pub const DEFAULT_BUFFER_SIZE: usize = 65536;

const STATUS_CLOSED: u8 = 0;
const STATUS_IDLE: u8 = 1;
const STATUS_CAPTURING: u8 = 2;

thread_local! {
    // identifies the device whose capture loop runs on this thread
    static CAPTURE_LOOP_OWNER: Cell<usize> = const { Cell::new(0) };
}

/// Options applied to the native handle when a device is opened
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(setter(into))]
pub struct CaptureConfig {
    /// Whether to put the interface into promiscuous mode
    #[builder(default = "true")]
    pub promiscuous: bool,
    /// How long a single native read waits for a packet
    #[builder(default = "DEFAULT_READ_TIMEOUT")]
    pub read_timeout: Duration,
    /// Maximum number of bytes kept per packet
    #[builder(default = "DEFAULT_SNAPLEN")]
    pub snaplen: usize,
    /// Size of the native read buffer
    #[builder(default = "DEFAULT_BUFFER_SIZE")]
    pub buffer_size: usize,
}

impl CaptureConfig {
    /// Returns builder for CaptureConfig
    pub fn builder() -> CaptureConfigBuilder {
        CaptureConfigBuilder::default()
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            promiscuous: true,
            read_timeout: DEFAULT_READ_TIMEOUT,
            snaplen: DEFAULT_SNAPLEN,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Lifecycle state of a capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    /// No native handle is held
    Closed,
    /// Open and available for synchronous reads
    Idle,
    /// Open with a background capture loop owning the native handle
    Capturing,
}

impl From<u8> for DeviceStatus {
    fn from(value: u8) -> Self {
        match value {
            STATUS_IDLE => Self::Idle,
            STATUS_CAPTURING => Self::Capturing,
            _ => Self::Closed,
        }
    }
}

/// Event passed to packet-arrival handlers
#[derive(Debug, Clone)]
pub struct PacketArrival {
    /// The interface the packet was captured on
    pub device: Arc<NetworkInterface>,
    /// The captured packet
    pub packet: CapturedPacket,
}

/// How a background capture loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureStoppedStatus {
    /// The loop was stopped by the device
    CompletedWithoutError,
    /// The native handle reported an error and the loop gave up
    ErrorWhileCapturing(String),
}

/// Event passed to capture-stopped handlers
#[derive(Debug, Clone)]
pub struct CaptureStopped {
    /// The interface the capture ran on
    pub device: Arc<NetworkInterface>,
    /// How the capture ended
    pub status: CaptureStoppedStatus,
}

/// Identifies a registered handler so it can be removed again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Counters maintained by a capture device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureStatistics {
    /// Packets read from the native handle in either retrieval mode
    pub received: u64,
}

type PacketArrivalHandler = Arc<dyn Fn(&PacketArrival) + Send + Sync>;
type CaptureStoppedHandler = Arc<dyn Fn(&CaptureStopped) + Send + Sync>;

#[derive(Default)]
struct Handlers {
    next_id: u64,
    packet_arrival: Vec<(HandlerId, PacketArrivalHandler)>,
    capture_stopped: Vec<(HandlerId, CaptureStoppedHandler)>,
}

impl Handlers {
    fn next_id(&mut self) -> HandlerId {
        self.next_id += 1;
        HandlerId(self.next_id)
    }
}

fn dispatch_packet(
    handlers: &Mutex<Handlers>,
    event: &PacketArrival,
) -> Result<()> {
    // invoke outside the lock so handlers may (un)register handlers
    let snapshot: Vec<PacketArrivalHandler> = handlers
        .lock()?
        .packet_arrival
        .iter()
        .map(|(_, h)| Arc::clone(h))
        .collect();

    for handler in snapshot {
        handler(event);
    }

    Ok(())
}

struct Idle {
    interface: Arc<NetworkInterface>,
    reader: Box<dyn Reader>,
    // error of a reaped loop not yet reported by stop_capture
    loop_error: Option<RCapLibError>,
}

struct CaptureLoop {
    interface: Arc<NetworkInterface>,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<(Box<dyn Reader>, Result<()>)>,
}

impl CaptureLoop {
    // Signals the loop to stop and waits for it, handing back the reader
    fn finish(self) -> Result<(Idle, Result<()>)> {
        self.stop.store(true, Ordering::Release);
        let (reader, result) = self.handle.join()?;
        Ok((
            Idle {
                interface: self.interface,
                reader,
                loop_error: None,
            },
            result,
        ))
    }
}

#[derive(Default)]
enum Session {
    #[default]
    Closed,
    Idle(Idle),
    Capturing(CaptureLoop),
}

struct LoopContext {
    owner: usize,
    interface: Arc<NetworkInterface>,
    stop: Arc<AtomicBool>,
    status: Arc<AtomicU8>,
    handlers: Arc<Mutex<Handlers>>,
    received: Arc<AtomicU64>,
}

// A loop that ends on its own, including by panic, is no longer capturing.
// When the device stops the loop it sets the final status after joining.
fn mark_loop_ended(status: &AtomicU8) {
    let _ = status.compare_exchange(
        STATUS_CAPTURING,
        STATUS_IDLE,
        Ordering::SeqCst,
        Ordering::SeqCst,
    );
}

// Marks the current thread as running a capture for a device until dropped
struct CaptureThreadGuard {
    previous: usize,
}

impl CaptureThreadGuard {
    fn enter(owner: usize) -> Self {
        Self {
            previous: CAPTURE_LOOP_OWNER.with(|o| o.replace(owner)),
        }
    }
}

impl Drop for CaptureThreadGuard {
    fn drop(&mut self) {
        CAPTURE_LOOP_OWNER.with(|o| o.set(self.previous));
    }
}

struct LoopGuard<'a> {
    status: &'a AtomicU8,
}

impl Drop for LoopGuard<'_> {
    fn drop(&mut self) {
        mark_loop_ended(self.status);
        CAPTURE_LOOP_OWNER.with(|o| o.set(0));
    }
}

impl LoopContext {
    fn run(self, mut reader: Box<dyn Reader>) -> (Box<dyn Reader>, Result<()>) {
        CAPTURE_LOOP_OWNER.with(|o| o.set(self.owner));

        let _guard = LoopGuard {
            status: &self.status,
        };

        log::debug!("starting capture loop on {}", self.interface.name);

        let result = self.read_packets(reader.as_mut());

        let status = match &result {
            Ok(()) => CaptureStoppedStatus::CompletedWithoutError,
            Err(e) => {
                log::error!(
                    "capture loop on {} failed: {}",
                    self.interface.name,
                    e
                );
                CaptureStoppedStatus::ErrorWhileCapturing(e.to_string())
            }
        };

        mark_loop_ended(&self.status);

        self.notify_stopped(status);

        log::debug!("exiting capture loop on {}", self.interface.name);

        (reader, result)
    }

    fn read_packets(&self, reader: &mut dyn Reader) -> Result<()> {
        while !self.stop.load(Ordering::Acquire) {
            let Some(packet) = reader.next_packet()? else {
                continue;
            };

            self.received.fetch_add(1, Ordering::Relaxed);

            if self.stop.load(Ordering::Acquire) {
                break;
            }

            dispatch_packet(
                &self.handlers,
                &PacketArrival {
                    device: Arc::clone(&self.interface),
                    packet,
                },
            )?;
        }

        Ok(())
    }

    fn notify_stopped(&self, status: CaptureStoppedStatus) {
        let snapshot: Vec<CaptureStoppedHandler> = match self.handlers.lock() {
            Ok(handlers) => handlers
                .capture_stopped
                .iter()
                .map(|(_, h)| Arc::clone(h))
                .collect(),
            Err(e) => {
                log::error!("failed to get lock on capture handlers: {}", e);
                return;
            }
        };

        let event = CaptureStopped {
            device: Arc::clone(&self.interface),
            status,
        };

        for handler in snapshot {
            handler(&event);
        }
    }
}

/// Data structure representing a capturable device and its capture session
#[derive(Builder)]
#[builder(setter(into))]
pub struct CaptureDevice {
    /// Name of the interface to capture on
    name: String,
    /// Native capture layer
    #[builder(default = "Arc::new(PNetBackend) as Arc<dyn Backend>")]
    backend: Arc<dyn Backend>,
    /// Options applied when opening the native handle
    #[builder(default)]
    config: CaptureConfig,
    #[builder(setter(skip))]
    session: Mutex<Session>,
    #[builder(setter(skip))]
    status: Arc<AtomicU8>,
    #[builder(setter(skip))]
    interface: Mutex<Option<Arc<NetworkInterface>>>,
    #[builder(setter(skip))]
    handlers: Arc<Mutex<Handlers>>,
    #[builder(setter(skip))]
    received: Arc<AtomicU64>,
}

impl CaptureDevice {
    /// Returns builder for CaptureDevice
    pub fn builder() -> CaptureDeviceBuilder {
        CaptureDeviceBuilder::default()
    }

    /// Returns a closed device for every interface on the current host
    pub fn list() -> Result<Vec<Self>> {
        Self::list_with_backend(Arc::new(PNetBackend))
    }

    /// Returns a closed device for every interface the backend enumerates
    pub fn list_with_backend(backend: Arc<dyn Backend>) -> Result<Vec<Self>> {
        backend
            .interfaces()?
            .into_iter()
            .map(|iface| -> Result<Self> {
                let device = Self::builder()
                    .name(iface.name.clone())
                    .backend(Arc::clone(&backend))
                    .build()?;
                *device.interface.lock()? = Some(Arc::new(iface));
                Ok(device)
            })
            .collect()
    }

    /// Name of the interface this device captures on
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description of the interface, empty until known
    pub fn description(&self) -> String {
        self.interface()
            .map(|i| i.description.clone())
            .unwrap_or_default()
    }

    /// Interface metadata, fetched from the backend when the device opens
    pub fn interface(&self) -> Option<Arc<NetworkInterface>> {
        self.interface.lock().ok().and_then(|i| i.clone())
    }

    /// Options applied to the native handle
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn status(&self) -> DeviceStatus {
        DeviceStatus::from(self.status.load(Ordering::SeqCst))
    }

    /// Whether the device holds a native handle
    pub fn opened(&self) -> bool {
        self.status() != DeviceStatus::Closed
    }

    /// Whether a background capture loop is running
    pub fn started(&self) -> bool {
        self.status() == DeviceStatus::Capturing
    }

    /// Returns a snapshot of the device counters
    pub fn statistics(&self) -> CaptureStatistics {
        CaptureStatistics {
            received: self.received.load(Ordering::Relaxed),
        }
    }

    /// Registers a handler invoked once per packet captured in the
    /// background or through [`CaptureDevice::capture`]
    pub fn on_packet_arrival<F>(&self, handler: F) -> Result<HandlerId>
    where
        F: Fn(&PacketArrival) + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.lock()?;
        let id = handlers.next_id();
        handlers.packet_arrival.push((id, Arc::new(handler)));
        Ok(id)
    }

    /// Removes a packet-arrival handler, returning whether it was registered
    pub fn remove_packet_arrival(&self, id: HandlerId) -> Result<bool> {
        let mut handlers = self.handlers.lock()?;
        let before = handlers.packet_arrival.len();
        handlers.packet_arrival.retain(|(i, _)| *i != id);
        Ok(handlers.packet_arrival.len() != before)
    }

    /// Registers a handler invoked when a background capture loop ends
    pub fn on_capture_stopped<F>(&self, handler: F) -> Result<HandlerId>
    where
        F: Fn(&CaptureStopped) + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.lock()?;
        let id = handlers.next_id();
        handlers.capture_stopped.push((id, Arc::new(handler)));
        Ok(id)
    }

    /// Removes a capture-stopped handler, returning whether it was
    /// registered
    pub fn remove_capture_stopped(&self, id: HandlerId) -> Result<bool> {
        let mut handlers = self.handlers.lock()?;
        let before = handlers.capture_stopped.len();
        handlers.capture_stopped.retain(|(i, _)| *i != id);
        Ok(handlers.capture_stopped.len() != before)
    }

    /// Acquires the native handle and caches the interface metadata
    pub fn open(&self) -> Result<()> {
        self.ensure_not_capture_thread("open")?;

        let mut session = self.session.lock()?;

        if !matches!(*session, Session::Closed) {
            return Err(RCapLibError::AlreadyOpen(self.name.clone()));
        }

        let interface = self
            .backend
            .interfaces()?
            .into_iter()
            .find(|i| i.name == self.name)
            .map(Arc::new)
            .ok_or_else(|| RCapLibError::DeviceNotFound(self.name.clone()))?;

        let reader = self.backend.open(&interface, &self.config)?;

        *self.interface.lock()? = Some(Arc::clone(&interface));
        *session = Session::Idle(Idle {
            interface,
            reader,
            loop_error: None,
        });
        self.status.store(STATUS_IDLE, Ordering::SeqCst);

        log::debug!("opened capture device {}", self.name);

        Ok(())
    }

    /// Starts a background capture loop that dispatches every packet to the
    /// registered packet-arrival handlers. Returns once the loop's thread
    /// has been spawned.
    pub fn start_capture(&self) -> Result<()> {
        self.ensure_not_capture_thread("start_capture")?;

        let mut session = self.session.lock()?;

        self.reap_finished_loop(&mut session)?;

        let idle = match std::mem::take(&mut *session) {
            Session::Idle(idle) => idle,
            Session::Closed => {
                return Err(RCapLibError::NotOpen(self.name.clone()));
            }
            capturing @ Session::Capturing(_) => {
                *session = capturing;
                return Err(self.capture_running("start_capture"));
            }
        };

        if self.handlers.lock()?.packet_arrival.is_empty() {
            *session = Session::Idle(idle);
            return Err(RCapLibError::DeviceNotReady(format!(
                "no packet arrival handlers registered for {}",
                self.name
            )));
        }

        let stop = Arc::new(AtomicBool::new(false));

        let ctx = LoopContext {
            owner: self.owner_key(),
            interface: Arc::clone(&idle.interface),
            stop: Arc::clone(&stop),
            status: Arc::clone(&self.status),
            handlers: Arc::clone(&self.handlers),
            received: Arc::clone(&self.received),
        };

        // must be set before the loop can finish and swap it back to idle
        self.status.store(STATUS_CAPTURING, Ordering::SeqCst);

        if let Some(e) = &idle.loop_error {
            log::debug!(
                "discarding unreported error of previous capture loop on {}: {}",
                self.name,
                e
            );
        }

        let reader = idle.reader;
        let handle = thread::spawn(move || ctx.run(reader));

        *session = Session::Capturing(CaptureLoop {
            interface: idle.interface,
            stop,
            handle,
        });

        log::debug!("started background capture on {}", self.name);

        Ok(())
    }

    /// Stops a running background capture and returns the native handle to
    /// the device so synchronous reads work again. Surfaces the error the
    /// last loop ended with, if any, including a loop that already ended on
    /// its own and was cleaned up by another call. Otherwise does nothing
    /// when no capture is running.
    pub fn stop_capture(&self) -> Result<()> {
        self.ensure_not_capture_thread("stop_capture")?;

        let mut session = self.session.lock()?;

        match std::mem::take(&mut *session) {
            Session::Closed => Err(RCapLibError::NotOpen(self.name.clone())),
            Session::Idle(mut idle) => {
                let pending = idle.loop_error.take();
                *session = Session::Idle(idle);
                pending.map_or(Ok(()), Err)
            }
            Session::Capturing(capture) => match capture.finish() {
                Ok((idle, result)) => {
                    *session = Session::Idle(idle);
                    self.status.store(STATUS_IDLE, Ordering::SeqCst);
                    log::debug!("stopped background capture on {}", self.name);
                    result
                }
                Err(e) => {
                    self.status.store(STATUS_CLOSED, Ordering::SeqCst);
                    Err(e)
                }
            },
        }
    }

    /// Blocks until the next packet arrives. Returns None if the device is
    /// closed by another thread while waiting.
    ///
    /// Fails with [`RCapLibError::InvalidOperationDuringCapture`] while a
    /// background capture is running: the native handle must not be read
    /// from two places at once.
    pub fn get_next_packet(&self) -> Result<Option<CapturedPacket>> {
        let mut waited = false;

        loop {
            match self.with_idle_reader("get_next_packet", |r| r.next_packet())
            {
                Ok(Some(packet)) => return Ok(Some(packet)),
                Ok(None) => {
                    waited = true;
                    // let a concurrent close take the session lock
                    thread::yield_now();
                }
                Err(RCapLibError::NotOpen(_)) if waited => return Ok(None),
                Err(e) => return Err(e),
            }
        }
    }

    /// Makes a single native read, returning None if the read timeout
    /// expires first. Same preconditions as
    /// [`CaptureDevice::get_next_packet`].
    pub fn poll_next_packet(&self) -> Result<Option<CapturedPacket>> {
        self.with_idle_reader("poll_next_packet", |r| r.next_packet())
    }

    /// Captures up to `count` packets on the calling thread, dispatching
    /// each to the registered packet-arrival handlers. Returns the number
    /// of packets dispatched, which is lower than `count` only if the
    /// device was closed meanwhile.
    ///
    /// Handlers run while the device is held, so no handler is invoked
    /// after a concurrent [`CaptureDevice::close`] returns, and handlers
    /// calling transitions on this device fail with
    /// [`RCapLibError::InvalidOperationDuringCapture`].
    pub fn capture(&self, count: usize) -> Result<usize> {
        self.ensure_not_capture_thread("capture")?;

        {
            let session = self.session.lock()?;
            match &*session {
                Session::Closed => {
                    return Err(RCapLibError::NotOpen(self.name.clone()));
                }
                Session::Capturing(_) => {
                    return Err(self.capture_running("capture"));
                }
                Session::Idle(_) => {}
            }
        }

        if self.handlers.lock()?.packet_arrival.is_empty() {
            return Err(RCapLibError::DeviceNotReady(format!(
                "no packet arrival handlers registered for {}",
                self.name
            )));
        }

        let _owner = CaptureThreadGuard::enter(self.owner_key());

        let mut dispatched = 0;

        while dispatched < count {
            {
                let mut session = self.session.lock()?;

                let idle = match &mut *session {
                    Session::Closed => break,
                    Session::Capturing(_) => {
                        return Err(self.capture_running("capture"));
                    }
                    Session::Idle(idle) => idle,
                };

                if let Some(packet) = idle.reader.next_packet()? {
                    self.received.fetch_add(1, Ordering::Relaxed);

                    dispatch_packet(
                        &self.handlers,
                        &PacketArrival {
                            device: Arc::clone(&idle.interface),
                            packet,
                        },
                    )?;

                    dispatched += 1;
                }
            }

            // let a concurrent close take the session lock
            thread::yield_now();
        }

        Ok(dispatched)
    }

    /// Stops any running capture and releases the native handle. No
    /// handler is invoked after this returns. Closing a closed device is a
    /// no-op.
    pub fn close(&self) -> Result<()> {
        self.ensure_not_capture_thread("close")?;

        let mut session = self.session.lock()?;

        let result = match std::mem::take(&mut *session) {
            Session::Closed => return Ok(()),
            Session::Idle(idle) => {
                if let Some(e) = idle.loop_error {
                    log::debug!(
                        "capture loop on {} had ended with: {}",
                        self.name,
                        e
                    );
                }
                Ok(())
            }
            Session::Capturing(capture) => {
                capture.finish().map(|(_, loop_result)| {
                    if let Err(e) = loop_result {
                        log::debug!(
                            "capture loop on {} had ended with: {}",
                            self.name,
                            e
                        );
                    }
                })
            }
        };

        self.status.store(STATUS_CLOSED, Ordering::SeqCst);

        log::debug!("closed capture device {}", self.name);

        result
    }

    // Runs f against the native reader if the device is open and idle
    fn with_idle_reader<T>(
        &self,
        op: &str,
        f: impl FnOnce(&mut dyn Reader) -> Result<Option<T>>,
    ) -> Result<Option<T>> {
        self.ensure_not_capture_thread(op)?;

        if self.started() {
            return Err(self.capture_running(op));
        }

        let mut session = self.session.lock()?;

        self.reap_finished_loop(&mut session)?;

        let reader = match &mut *session {
            Session::Closed => {
                return Err(RCapLibError::NotOpen(self.name.clone()));
            }
            Session::Capturing(_) => return Err(self.capture_running(op)),
            Session::Idle(idle) => idle.reader.as_mut(),
        };

        let value = f(reader)?;

        if value.is_some() {
            self.received.fetch_add(1, Ordering::Relaxed);
        }

        Ok(value)
    }

    // A loop that ended on its own still holds the reader until joined
    fn reap_finished_loop(&self, session: &mut Session) -> Result<()> {
        let finished = matches!(
            session,
            Session::Capturing(c)
                if c.handle.is_finished()
                    || self.status.load(Ordering::SeqCst) != STATUS_CAPTURING
        );

        if !finished {
            return Ok(());
        }

        if let Session::Capturing(capture) = std::mem::take(session) {
            match capture.finish() {
                Ok((mut idle, result)) => {
                    if let Err(e) = result {
                        log::debug!(
                            "reaped capture loop on {} which ended with: {}",
                            self.name,
                            e
                        );
                        idle.loop_error = Some(e);
                    }
                    *session = Session::Idle(idle);
                    self.status.store(STATUS_IDLE, Ordering::SeqCst);
                }
                Err(e) => {
                    self.status.store(STATUS_CLOSED, Ordering::SeqCst);
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    fn owner_key(&self) -> usize {
        Arc::as_ptr(&self.status) as usize
    }

    // Transitions join the capture thread, so they must never run on it
    fn ensure_not_capture_thread(&self, op: &str) -> Result<()> {
        if CAPTURE_LOOP_OWNER.with(|o| o.get()) == self.owner_key() {
            return Err(RCapLibError::InvalidOperationDuringCapture(format!(
                "{} called from the capture thread of {}",
                op, self.name
            )));
        }
        Ok(())
    }

    fn capture_running(&self, op: &str) -> RCapLibError {
        RCapLibError::InvalidOperationDuringCapture(format!(
            "{} not allowed while {} is capturing in the background",
            op, self.name
        ))
    }
}

impl Drop for CaptureDevice {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("failed to close capture device {}: {}", self.name, e);
        }
    }
}

#[cfg(test)]
#[path = "./device_tests.rs"]
mod tests;
