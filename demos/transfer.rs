//! Sketch of an application layer driving the link layer over a real serial
//! device: `tx` fragments a file into start/data/end packets and writes
//! them; `rx` reassembles a file from the same packet stream. CLI argument
//! parsing is a hand-rolled `std::env::args` walk rather than a real parser
//! crate — out of scope per the spec, kept minimal so the demo compiles
//! standalone.
//!
//! Usage: `transfer tx /dev/ttyS0 path/to/file` or `transfer rx /dev/ttyS0 path/to/output`.

use std::fs;
use std::io::Write;
use std::process;
use std::time::Duration;

use log::{info, LevelFilter};

use rdlp_rs::config::{ConnectionConfig, Role};
use rdlp_rs::engine::LinkLayer;
use rdlp_rs::packet::{ControlKind, ControlPacket, DataPacket, MAX_DATA_CONTENT_LEN};

fn usage() -> ! {
    eprintln!("usage: transfer <tx|rx> <device> <path>");
    process::exit(2);
}

fn main() {
    log::set_max_level(LevelFilter::Info);
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let (role_arg, device, path) = match (args.next(), args.next(), args.next()) {
        (Some(r), Some(d), Some(p)) => (r, d, p),
        _ => usage(),
    };

    let role = match role_arg.as_str() {
        "tx" => Role::Sender,
        "rx" => Role::Receiver,
        _ => usage(),
    };

    let config = ConnectionConfig::new(device, role)
        .with_baud(115200)
        .with_timeout(Duration::from_secs(3))
        .with_max_retransmissions(3);

    let mut link = LinkLayer::open(config).unwrap_or_else(|e| {
        eprintln!("ERROR: failed to open connection: {e}");
        process::exit(1);
    });

    match role {
        Role::Sender => send_file(&mut link, &path),
        Role::Receiver => receive_file(&mut link, &path),
    }

    link.close(true).unwrap_or_else(|e| {
        eprintln!("ERROR: failed to close connection: {e}");
        process::exit(1);
    });
}

fn send_file(link: &mut LinkLayer<rdlp_rs::port::SystemSerialPort>, path: &str) {
    let contents = fs::read(path).unwrap_or_else(|e| {
        eprintln!("ERROR: couldn't open file {path}: {e}");
        process::exit(1);
    });
    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());

    info!("sending {path} ({} bytes)", contents.len());

    let start = ControlPacket {
        kind: ControlKind::Start,
        file_size: contents.len() as u64,
        file_name: file_name.clone(),
    };
    link.write(&start.encode()).unwrap_or_else(|e| {
        eprintln!("ERROR: failed to send start packet: {e}");
        process::exit(1);
    });

    for (seq, chunk) in contents.chunks(MAX_DATA_CONTENT_LEN).enumerate() {
        let packet = DataPacket {
            sequence: (seq % 256) as u8,
            content: chunk,
        };
        let encoded = packet.encode().expect("chunk respects MAX_DATA_CONTENT_LEN");
        link.write(&encoded).unwrap_or_else(|e| {
            eprintln!("ERROR: failed to send data packet {seq}: {e}");
            process::exit(1);
        });
    }

    let end = ControlPacket {
        kind: ControlKind::End,
        file_size: contents.len() as u64,
        file_name,
    };
    link.write(&end.encode()).unwrap_or_else(|e| {
        eprintln!("ERROR: failed to send end packet: {e}");
        process::exit(1);
    });

    info!("transfer complete");
}

fn receive_file(link: &mut LinkLayer<rdlp_rs::port::SystemSerialPort>, path: &str) {
    let mut buf = [0u8; rdlp_rs::control::MAX_PAYLOAD_SIZE];

    let n = link.read(&mut buf).unwrap_or_else(|e| {
        eprintln!("ERROR: failed to read start packet: {e}");
        process::exit(1);
    });
    let start = ControlPacket::decode(ControlKind::Start, &buf[..n]).unwrap_or_else(|e| {
        eprintln!("ERROR: malformed start packet: {e}");
        process::exit(1);
    });
    info!("receiving {} ({} bytes)", start.file_name, start.file_size);

    let mut file = fs::File::create(path).unwrap_or_else(|e| {
        eprintln!("ERROR: couldn't create file {path}: {e}");
        process::exit(1);
    });

    loop {
        let n = link.read(&mut buf).unwrap_or_else(|e| {
            eprintln!("ERROR: failed to read packet: {e}");
            process::exit(1);
        });
        if n == 0 {
            break;
        }
        if rdlp_rs::packet::is_end_packet(buf[0]) {
            break;
        }
        let data = DataPacket::decode(&buf[..n]).unwrap_or_else(|e| {
            eprintln!("ERROR: malformed data packet: {e}");
            process::exit(1);
        });
        file.write_all(data.content).unwrap_or_else(|e| {
            eprintln!("ERROR: failed to write to {path}: {e}");
            process::exit(1);
        });
    }

    info!("transfer complete");
}
