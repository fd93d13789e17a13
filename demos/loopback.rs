//! Two transports talking over a localhost TCP connection.
//!
//! Run with `RUST_LOG=rlink=debug cargo run --example loopback` to see the
//! link layer at work.

use std::io::{self, Read};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use rlink::datalink::{DataLinkConfig, IoDriver, LowerLevel};
use rlink::transport::{MessagePort, Port0Op, Port0Response, Transport};
use tracing::info;
use tracing_subscriber::EnvFilter;

const BULK_PORT: u8 = 5;

type TcpTransport = Transport<IoDriver<TcpStream>>;

/// Read whatever arrived within one service interval and run timers.
/// Returns `false` once the peer has closed the connection.
fn pump(transport: &mut TcpTransport, reader: &mut TcpStream, buf: &mut [u8]) -> io::Result<bool> {
    let wait = transport.service_interval_ms().clamp(1, 20);
    reader.set_read_timeout(Some(Duration::from_millis(wait)))?;
    let open = match reader.read(buf) {
        Ok(0) => false,
        Ok(n) => {
            transport.ll_recv(&buf[..n]);
            true
        }
        Err(err)
            if matches!(
                err.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ) =>
        {
            true
        }
        Err(err) => return Err(err),
    };
    transport.process();
    Ok(open)
}

fn responder(listener: TcpListener) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (stream, peer) = listener.accept()?;
    info!(%peer, "responder accepted connection");
    let mut reader = stream.try_clone()?;
    let mut transport = Transport::new(DataLinkConfig::default(), IoDriver::new(stream))?;

    // answer each message with its bytes reversed
    transport.port_register(
        BULK_PORT,
        Some(r#"{"type":"reverse","max":4096}"#),
        MessagePort::new(4096, |tx, port_id, port_data, message| {
            let reply: Vec<u8> = message.iter().rev().copied().collect();
            if let Err(err) = tx.send_message(port_id, port_data, &reply) {
                tracing::warn!(error = %err, "reply dropped");
            }
        }),
    )?;

    let mut buf = [0u8; 1024];
    while pump(&mut transport, &mut reader, &mut buf)? {}
    info!(status = ?transport.status(), "responder done");
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    let server = thread::spawn(move || responder(listener));

    let stream = TcpStream::connect(addr)?;
    stream.set_nodelay(true)?;
    let mut reader = stream.try_clone()?;
    let mut transport = Transport::new(DataLinkConfig::default(), IoDriver::new(stream))?;

    let (port0_tx, port0_rx) = mpsc::channel();
    transport.set_port0_listener(move |response| {
        let _ = port0_tx.send(response);
    });
    let (reply_tx, reply_rx) = mpsc::channel();
    transport.port_register(
        BULK_PORT,
        None,
        MessagePort::new(4096, move |_tx, _port_id, port_data, message| {
            let _ = reply_tx.send((port_data, message));
        }),
    )?;

    let started = transport.link().driver().time_ms();
    transport.port0_request(Port0Op::Echo, 0, b"hello")?;
    transport.port0_request(Port0Op::TimeSync, 0, &started.to_le_bytes())?;
    transport.port0_request(Port0Op::Meta, BULK_PORT, &[])?;
    let message: Vec<u8> = (0..1500u32).map(|i| (i % 256) as u8).collect();
    transport.send_message(BULK_PORT, 42, &message)?;

    let mut buf = [0u8; 1024];
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut responses = Vec::new();
    let mut reply = None;
    while Instant::now() < deadline && (responses.len() < 3 || reply.is_none()) {
        pump(&mut transport, &mut reader, &mut buf)?;
        responses.extend(port0_rx.try_iter());
        if let Ok(received) = reply_rx.try_recv() {
            reply = Some(received);
        }
    }

    for response in &responses {
        match response {
            Port0Response::Echo(body) => info!(body = %String::from_utf8_lossy(body), "echo"),
            Port0Response::TimeSync {
                peer_rx_ms,
                local_rx_ms,
                ..
            } => info!(peer_rx_ms, round_trip_ms = local_rx_ms - started, "timesync"),
            Port0Response::Meta { port_id, json } => info!(port_id, %json, "meta"),
            Port0Response::Status(status) => info!(?status, "status"),
        }
    }
    match reply {
        Some((port_data, body)) => {
            let expected: Vec<u8> = message.iter().rev().copied().collect();
            info!(port_data, len = body.len(), intact = body[..] == expected[..], "reply");
        }
        None => info!("no reply before deadline"),
    }
    info!(status = ?transport.status(), "initiator done");

    // closing the socket ends the responder loop
    drop(transport);
    drop(reader);
    server
        .join()
        .map_err(|_| "responder thread panicked")??;
    Ok(())
}
