use std::{env, sync::mpsc, time::Duration};

use r_caplib::{
    device::{CaptureDevice, PacketArrival},
    network,
};

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
    let (tx, rx) = mpsc::channel::<PacketArrival>();

    device.open().expect("failed to open device");

    println!("capturing on {} ({})", device.name(), device.description());

    device
        .on_packet_arrival(move |arrival| {
            let _ = tx.send(arrival.clone());
        })
        .expect("failed to register handler");

    device.start_capture().expect("failed to start capture");

    for _ in 0..10 {
        match rx.recv_timeout(Duration::from_secs(10)) {
            Ok(arrival) => println!(
                "{} bytes captured on {}",
                arrival.packet.length, arrival.device.name
            ),
            Err(_) => {
                println!("no traffic seen");
                break;
            }
        }
    }

    device.close().expect("failed to close device");

    println!("statistics: {:?}", device.statistics());
}
