use super::*;

use pnet::util::MacAddr;
use std::{
    sync::{Weak, atomic::AtomicUsize, mpsc},
    time::Duration,
};

use crate::{packet::mocks::MockPacketReader, wire::MockBackend};

const DEVICE_NAME: &str = "eth-test";
const WAIT: Duration = Duration::from_secs(2);

fn test_interface() -> NetworkInterface {
    NetworkInterface {
        name: DEVICE_NAME.to_string(),
        description: "test interface".to_string(),
        index: 1,
        flags: 0,
        mac: Some(MacAddr::new(0x00, 0x11, 0x22, 0x33, 0x44, 0x55)),
        addresses: vec![],
        gateway_addresses: vec![],
    }
}

fn frame() -> CapturedPacket {
    CapturedPacket::new(&[0xde, 0xad, 0xbe, 0xef], DEFAULT_SNAPLEN)
}

fn streaming_reader() -> MockPacketReader {
    let mut reader = MockPacketReader::new();
    reader.expect_next_packet().returning(|| {
        thread::sleep(Duration::from_millis(5));
        Ok(Some(frame()))
    });
    reader
}

fn backend_with_reader(reader: MockPacketReader) -> Arc<dyn Backend> {
    let mut backend = MockBackend::new();
    backend
        .expect_interfaces()
        .returning(|| Ok(vec![test_interface()]));

    let reader: Box<dyn Reader> = Box::new(reader);
    backend
        .expect_open()
        .times(1)
        .return_once(move |_, _| Ok(reader));

    Arc::new(backend)
}

fn device_with(backend: Arc<dyn Backend>) -> CaptureDevice {
    CaptureDevice::builder()
        .name(DEVICE_NAME)
        .backend(backend)
        .build()
        .unwrap()
}

#[test]
fn reports_interface_metadata_after_open() {
    let device = device_with(backend_with_reader(MockPacketReader::new()));
    let expected = test_interface();

    assert!(!device.opened());

    device.open().unwrap();

    let iface = device.interface().unwrap();

    assert!(device.opened());
    assert!(!device.name().is_empty());
    assert_eq!(device.name(), iface.name);
    assert_eq!(device.description(), iface.description);
    assert_eq!(*iface, expected);
    assert_eq!(iface.mac_bytes().unwrap().len(), 6);

    device.close().unwrap();
}

#[test]
fn fails_to_open_twice() {
    let device = device_with(backend_with_reader(MockPacketReader::new()));

    device.open().unwrap();

    let res = device.open();

    assert!(matches!(res, Err(RCapLibError::AlreadyOpen(_))));
    assert!(device.opened());

    device.close().unwrap();
}

#[test]
fn fails_to_open_unknown_device() {
    let mut backend = MockBackend::new();
    backend
        .expect_interfaces()
        .returning(|| Ok(vec![test_interface()]));

    let device = CaptureDevice::builder()
        .name("missing")
        .backend(Arc::new(backend) as Arc<dyn Backend>)
        .build()
        .unwrap();

    let res = device.open();

    assert!(matches!(res, Err(RCapLibError::DeviceNotFound(_))));
    assert!(!device.opened());
}

#[test]
fn surfaces_native_open_errors() {
    let mut backend = MockBackend::new();
    backend
        .expect_interfaces()
        .returning(|| Ok(vec![test_interface()]));
    backend
        .expect_open()
        .returning(|_, _| Err(RCapLibError::Wire("permission denied".into())));

    let device = device_with(Arc::new(backend));

    let res = device.open();

    assert!(matches!(res, Err(RCapLibError::Wire(msg)) if msg == "permission denied"));
    assert!(!device.opened());
    assert!(device.interface().is_none());
}

#[test]
fn start_capture_without_handler_is_not_ready() {
    let device = device_with(backend_with_reader(MockPacketReader::new()));

    device.open().unwrap();

    let res = device.start_capture();

    assert!(matches!(res, Err(RCapLibError::DeviceNotReady(_))));
    assert!(!device.started());

    device.close().unwrap();

    assert!(!device.opened());
}

#[test]
fn get_next_packet_fails_while_capturing() {
    let device = device_with(backend_with_reader(streaming_reader()));

    assert!(!device.started());

    device.open().unwrap();
    device.on_packet_arrival(|_| {}).unwrap();
    device.start_capture().unwrap();

    assert!(device.started());

    let res = device.get_next_packet();

    assert!(matches!(
        res,
        Err(RCapLibError::InvalidOperationDuringCapture(_))
    ));
    assert!(device.started());

    device.close().unwrap();

    assert!(!device.started());
    assert!(!device.opened());
}

#[test]
fn fails_to_start_capture_twice() {
    let device = device_with(backend_with_reader(streaming_reader()));

    device.open().unwrap();
    device.on_packet_arrival(|_| {}).unwrap();
    device.start_capture().unwrap();

    let res = device.start_capture();

    assert!(matches!(
        res,
        Err(RCapLibError::InvalidOperationDuringCapture(_))
    ));
    assert!(device.started());

    device.close().unwrap();
}

#[test]
fn dispatches_packets_to_handlers() {
    let device = device_with(backend_with_reader(streaming_reader()));
    let (tx, rx) = mpsc::channel();

    device.open().unwrap();
    device
        .on_packet_arrival(move |arrival| {
            let _ = tx.send(arrival.clone());
        })
        .unwrap();
    device.start_capture().unwrap();

    let arrival = rx.recv_timeout(WAIT).unwrap();

    assert_eq!(arrival.device.name, DEVICE_NAME);
    assert_eq!(arrival.packet.data, frame().data);

    device.close().unwrap();

    assert!(device.statistics().received >= 1);
}

#[test]
fn no_handler_invocations_after_close() {
    let device = device_with(backend_with_reader(streaming_reader()));
    let count = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::channel();

    device.open().unwrap();

    let handler_count = Arc::clone(&count);
    device
        .on_packet_arrival(move |_| {
            handler_count.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(());
        })
        .unwrap();

    device.start_capture().unwrap();

    rx.recv_timeout(WAIT).unwrap();

    device.close().unwrap();

    let after_close = count.load(Ordering::SeqCst);

    thread::sleep(Duration::from_millis(50));

    assert!(after_close >= 1);
    assert_eq!(count.load(Ordering::SeqCst), after_close);
    assert!(!device.started());
    assert!(!device.opened());
}

#[test]
fn get_next_packet_skips_read_timeouts() {
    let mut reader = MockPacketReader::new();
    let mut calls = 0;
    reader.expect_next_packet().times(3).returning(move || {
        calls += 1;
        if calls < 3 { Ok(None) } else { Ok(Some(frame())) }
    });

    let device = device_with(backend_with_reader(reader));

    device.open().unwrap();

    let pkt = device.get_next_packet().unwrap().unwrap();

    assert_eq!(pkt, CapturedPacket { timestamp: pkt.timestamp, ..frame() });
    assert_eq!(device.statistics().received, 1);

    device.close().unwrap();
}

#[test]
fn poll_next_packet_returns_none_on_timeout() {
    let mut reader = MockPacketReader::new();
    reader.expect_next_packet().times(1).returning(|| Ok(None));

    let device = device_with(backend_with_reader(reader));

    device.open().unwrap();

    assert!(device.poll_next_packet().unwrap().is_none());
    assert_eq!(device.statistics().received, 0);

    device.close().unwrap();
}

#[test]
fn reads_require_open_device() {
    let device = device_with(Arc::new(MockBackend::new()));

    assert!(matches!(
        device.get_next_packet(),
        Err(RCapLibError::NotOpen(_))
    ));
    assert!(matches!(
        device.poll_next_packet(),
        Err(RCapLibError::NotOpen(_))
    ));
    assert!(matches!(device.capture(1), Err(RCapLibError::NotOpen(_))));
}

#[test]
fn start_capture_requires_open_device() {
    let device = device_with(Arc::new(MockBackend::new()));

    device.on_packet_arrival(|_| {}).unwrap();

    let res = device.start_capture();

    assert!(matches!(res, Err(RCapLibError::NotOpen(_))));
    assert!(!device.started());
}

#[test]
fn stop_capture_returns_reader_for_sync_reads() {
    let device = device_with(backend_with_reader(streaming_reader()));

    device.open().unwrap();
    device.on_packet_arrival(|_| {}).unwrap();
    device.start_capture().unwrap();
    device.stop_capture().unwrap();

    assert!(!device.started());
    assert!(device.opened());
    assert!(device.get_next_packet().unwrap().is_some());

    // stopping an idle device is a no-op
    device.stop_capture().unwrap();

    device.close().unwrap();

    assert!(matches!(device.stop_capture(), Err(RCapLibError::NotOpen(_))));
}

#[test]
fn reports_native_errors_from_capture_loop() {
    let mut reader = MockPacketReader::new();
    reader
        .expect_next_packet()
        .times(1)
        .returning(|| Err(RCapLibError::Wire("link down".into())));

    let device = device_with(backend_with_reader(reader));
    let (tx, rx) = mpsc::channel();

    device.open().unwrap();
    device.on_packet_arrival(|_| {}).unwrap();
    device
        .on_capture_stopped(move |stopped| {
            let _ = tx.send(stopped.status.clone());
        })
        .unwrap();
    device.start_capture().unwrap();

    let status = rx.recv_timeout(WAIT).unwrap();

    assert_eq!(
        status,
        CaptureStoppedStatus::ErrorWhileCapturing("wire error: link down".into())
    );
    assert!(!device.started());
    assert!(device.opened());

    let res = device.stop_capture();

    assert!(matches!(res, Err(RCapLibError::Wire(msg)) if msg == "link down"));

    device.close().unwrap();
}

#[test]
fn reports_clean_stop_to_capture_stopped_handlers() {
    let device = device_with(backend_with_reader(streaming_reader()));
    let (tx, rx) = mpsc::channel();

    device.open().unwrap();
    device.on_packet_arrival(|_| {}).unwrap();
    device
        .on_capture_stopped(move |stopped| {
            let _ = tx.send((stopped.device.name.clone(), stopped.status.clone()));
        })
        .unwrap();
    device.start_capture().unwrap();
    device.close().unwrap();

    let (name, status) = rx.recv_timeout(WAIT).unwrap();

    assert_eq!(name, DEVICE_NAME);
    assert_eq!(status, CaptureStoppedStatus::CompletedWithoutError);
}

#[test]
fn rejects_transitions_from_capture_thread() {
    let device =
        Arc::new(device_with(backend_with_reader(streaming_reader())));
    let weak: Weak<CaptureDevice> = Arc::downgrade(&device);
    let (tx, rx) = mpsc::channel();

    device.open().unwrap();
    device
        .on_packet_arrival(move |_| {
            if let Some(device) = weak.upgrade() {
                let close = device.close();
                let next = device.get_next_packet();
                let _ = tx.send((
                    matches!(
                        close,
                        Err(RCapLibError::InvalidOperationDuringCapture(_))
                    ),
                    matches!(
                        next,
                        Err(RCapLibError::InvalidOperationDuringCapture(_))
                    ),
                ));
            }
        })
        .unwrap();
    device.start_capture().unwrap();

    let (close_rejected, next_rejected) = rx.recv_timeout(WAIT).unwrap();

    assert!(close_rejected);
    assert!(next_rejected);
    assert!(device.started());

    device.close().unwrap();

    assert!(!device.opened());
}

#[test]
fn removing_last_handler_makes_device_not_ready() {
    let device = device_with(backend_with_reader(MockPacketReader::new()));

    device.open().unwrap();

    let id = device.on_packet_arrival(|_| {}).unwrap();

    assert!(device.remove_packet_arrival(id).unwrap());
    assert!(!device.remove_packet_arrival(id).unwrap());

    let res = device.start_capture();

    assert!(matches!(res, Err(RCapLibError::DeviceNotReady(_))));

    device.close().unwrap();
}

#[test]
fn removes_capture_stopped_handlers() {
    let device = device_with(Arc::new(MockBackend::new()));

    let id = device.on_capture_stopped(|_| {}).unwrap();

    assert!(device.remove_capture_stopped(id).unwrap());
    assert!(!device.remove_capture_stopped(id).unwrap());
}

#[test]
fn synchronous_capture_dispatches_count_packets() {
    let device = device_with(backend_with_reader(streaming_reader()));
    let count = Arc::new(AtomicUsize::new(0));

    device.open().unwrap();

    let handler_count = Arc::clone(&count);
    device
        .on_packet_arrival(move |_| {
            handler_count.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    let dispatched = device.capture(3).unwrap();

    assert_eq!(dispatched, 3);
    assert_eq!(count.load(Ordering::SeqCst), 3);
    assert_eq!(device.statistics().received, 3);
    assert!(!device.started());

    device.close().unwrap();
}

#[test]
fn synchronous_capture_requires_handler() {
    let device = device_with(backend_with_reader(MockPacketReader::new()));

    device.open().unwrap();

    let res = device.capture(1);

    assert!(matches!(res, Err(RCapLibError::DeviceNotReady(_))));

    device.close().unwrap();
}

#[test]
fn synchronous_capture_dispatches_nothing_after_close_returns() {
    let mut reader = MockPacketReader::new();
    reader.expect_next_packet().returning(|| {
        thread::sleep(Duration::from_millis(100));
        Ok(Some(frame()))
    });

    let device = Arc::new(device_with(backend_with_reader(reader)));
    let closed = Arc::new(AtomicBool::new(false));
    let late = Arc::new(AtomicUsize::new(0));

    device.open().unwrap();

    let handler_closed = Arc::clone(&closed);
    let handler_late = Arc::clone(&late);
    device
        .on_packet_arrival(move |_| {
            if handler_closed.load(Ordering::SeqCst) {
                handler_late.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();

    let capturing = Arc::clone(&device);
    let handle = thread::spawn(move || capturing.capture(5));

    thread::sleep(Duration::from_millis(30));

    device.close().unwrap();
    closed.store(true, Ordering::SeqCst);

    let res = handle.join().unwrap();

    assert!(matches!(res, Ok(_) | Err(RCapLibError::NotOpen(_))));
    assert_eq!(late.load(Ordering::SeqCst), 0);
    assert!(!device.opened());
}

#[test]
fn rejects_transitions_from_synchronous_capture_handlers() {
    let device =
        Arc::new(device_with(backend_with_reader(streaming_reader())));
    let weak: Weak<CaptureDevice> = Arc::downgrade(&device);
    let rejected = Arc::new(AtomicUsize::new(0));

    device.open().unwrap();

    let handler_rejected = Arc::clone(&rejected);
    device
        .on_packet_arrival(move |_| {
            if let Some(device) = weak.upgrade() {
                if matches!(
                    device.close(),
                    Err(RCapLibError::InvalidOperationDuringCapture(_))
                ) {
                    handler_rejected.fetch_add(1, Ordering::SeqCst);
                }
            }
        })
        .unwrap();

    assert_eq!(device.capture(2).unwrap(), 2);
    assert_eq!(rejected.load(Ordering::SeqCst), 2);
    assert!(device.opened());

    device.close().unwrap();

    assert!(!device.opened());
}

#[test]
fn get_next_packet_returns_none_when_closed_while_waiting() {
    let mut reader = MockPacketReader::new();
    reader.expect_next_packet().returning(|| {
        thread::sleep(Duration::from_millis(10));
        Ok(None)
    });

    let device = Arc::new(device_with(backend_with_reader(reader)));

    device.open().unwrap();

    let reading = Arc::clone(&device);
    let handle = thread::spawn(move || reading.get_next_packet());

    thread::sleep(Duration::from_millis(50));

    device.close().unwrap();

    let res = handle.join().unwrap();

    assert!(matches!(res, Ok(None)));
    assert!(!device.opened());
}

#[test]
fn stop_capture_reports_error_of_loop_reaped_by_sync_read() {
    let calls = Arc::new(AtomicUsize::new(0));
    let reader_calls = Arc::clone(&calls);
    let mut reader = MockPacketReader::new();
    reader.expect_next_packet().returning(move || {
        if reader_calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(RCapLibError::Wire("link down".into()))
        } else {
            Ok(None)
        }
    });

    let device = device_with(backend_with_reader(reader));
    let (tx, rx) = mpsc::channel();

    device.open().unwrap();
    device.on_packet_arrival(|_| {}).unwrap();
    device
        .on_capture_stopped(move |stopped| {
            let _ = tx.send(stopped.status.clone());
        })
        .unwrap();
    device.start_capture().unwrap();

    rx.recv_timeout(WAIT).unwrap();

    assert!(matches!(device.poll_next_packet(), Ok(None)));

    let res = device.stop_capture();

    assert!(matches!(res, Err(RCapLibError::Wire(msg)) if msg == "link down"));

    device.stop_capture().unwrap();
    device.close().unwrap();
}

#[test]
fn close_is_safe_when_never_opened() {
    let device = device_with(Arc::new(MockBackend::new()));

    device.close().unwrap();
    device.close().unwrap();

    assert!(!device.opened());
    assert!(!device.started());
}

#[test]
fn dropping_device_stops_capture() {
    let device = device_with(backend_with_reader(streaming_reader()));
    let count = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::channel();

    device.open().unwrap();

    let handler_count = Arc::clone(&count);
    device
        .on_packet_arrival(move |_| {
            handler_count.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(());
        })
        .unwrap();
    device.start_capture().unwrap();

    rx.recv_timeout(WAIT).unwrap();

    drop(device);

    let after_drop = count.load(Ordering::SeqCst);

    thread::sleep(Duration::from_millis(50));

    assert_eq!(count.load(Ordering::SeqCst), after_drop);
}

#[test]
fn lists_devices_from_backend() {
    let mut other = test_interface();
    other.name = "wlan-test".to_string();
    other.description = "wireless".to_string();
    other.mac = None;

    let mut backend = MockBackend::new();
    let interfaces = vec![test_interface(), other];
    backend
        .expect_interfaces()
        .returning(move || Ok(interfaces.clone()));

    let devices = CaptureDevice::list_with_backend(Arc::new(backend)).unwrap();

    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].name(), DEVICE_NAME);
    assert_eq!(devices[0].description(), "test interface");
    assert_eq!(devices[1].name(), "wlan-test");
    assert_eq!(devices[1].description(), "wireless");
    assert!(devices.iter().all(|d| !d.opened()));
}

#[test]
fn builds_capture_config_with_defaults() {
    let config = CaptureConfig::builder().build().unwrap();

    assert_eq!(config, CaptureConfig::default());
    assert!(config.promiscuous);
    assert_eq!(config.read_timeout, DEFAULT_READ_TIMEOUT);

    let config = CaptureConfig::builder()
        .promiscuous(false)
        .read_timeout(Duration::from_millis(10))
        .snaplen(128usize)
        .build()
        .unwrap();

    assert!(!config.promiscuous);
    assert_eq!(config.read_timeout, Duration::from_millis(10));
    assert_eq!(config.snaplen, 128);
    assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
}

#[test]
fn status_reflects_lifecycle() {
    let device = device_with(backend_with_reader(streaming_reader()));

    assert_eq!(device.status(), DeviceStatus::Closed);

    device.open().unwrap();

    assert_eq!(device.status(), DeviceStatus::Idle);

    device.on_packet_arrival(|_| {}).unwrap();
    device.start_capture().unwrap();

    assert_eq!(device.status(), DeviceStatus::Capturing);

    device.close().unwrap();

    assert_eq!(device.status(), DeviceStatus::Closed);
}
