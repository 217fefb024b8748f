use std::env;

use r_caplib::{device::CaptureDevice, network};

fn is_root() -> bool {
    match env::var("USER") {
        Ok(val) => val == "root",
        Err(_e) => false,
    }
}

fn main() {
    if !is_root() {
        panic!("permission denied: must run with root privileges");
    }
    let interface =
        network::get_default_interface().expect("cannot find interface");
    let device = CaptureDevice::builder()
        .name(interface.name.clone())
        .build()
        .expect("failed to build capture device");

    device.open().expect("failed to open device");

    for _ in 0..5 {
        match device.get_next_packet() {
            Ok(Some(packet)) => println!("{:?}", packet),
            Ok(None) => break,
            Err(e) => panic!("error: {:?}", e),
        }
    }

    device.close().expect("failed to close device");
}
