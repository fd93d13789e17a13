use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use bytes::Bytes;
use rlink::datalink::{DataLinkConfig, LinkEvent, LowerLevel};
use rlink::transport::{
    MessagePort, PORT0, PORT0_META, PortHandler, PortTx, Port0Op, Port0Response, Transport,
    port0::port0_data,
};
use rlink::{Error, Seq};

#[derive(Debug)]
struct Wire {
    outbox: Vec<u8>,
    clock: Arc<AtomicU64>,
}

impl LowerLevel for Wire {
    fn send(&mut self, data: &[u8]) {
        self.outbox.extend_from_slice(data);
    }

    fn send_available(&self) -> usize {
        usize::MAX
    }

    fn time_ms(&self) -> u64 {
        self.clock.load(Ordering::Relaxed)
    }
}

struct Pair {
    a: Transport<Wire>,
    b: Transport<Wire>,
    clock: Arc<AtomicU64>,
}

impl Pair {
    fn new() -> Self {
        let clock = Arc::new(AtomicU64::new(0));
        let transport = || {
            let wire = Wire {
                outbox: Vec::new(),
                clock: Arc::clone(&clock),
            };
            Transport::new(DataLinkConfig::default(), wire).unwrap()
        };
        Self {
            a: transport(),
            b: transport(),
            clock,
        }
    }

    fn settle(&mut self) {
        for _ in 0..64 {
            let to_b = std::mem::take(&mut self.a.link_mut().driver_mut().outbox);
            let to_a = std::mem::take(&mut self.b.link_mut().driver_mut().outbox);
            if to_b.is_empty() && to_a.is_empty() {
                return;
            }
            self.b.ll_recv(&to_b);
            self.a.ll_recv(&to_a);
        }
        panic!("transports did not settle");
    }

    fn listen(&mut self) -> Arc<Mutex<Vec<Port0Response>>> {
        let responses = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&responses);
        self.a
            .set_port0_listener(move |response| sink.lock().unwrap().push(response));
        responses
    }
}

type Log = Arc<Mutex<Vec<String>>>;

struct Recording {
    name: &'static str,
    log: Log,
}

impl PortHandler for Recording {
    fn on_event(&mut self, _tx: &mut PortTx<'_>, event: LinkEvent) {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{event:?}", self.name));
    }

    fn on_recv(
        &mut self,
        _tx: &mut PortTx<'_>,
        port_id: u8,
        seq: Seq,
        port_data: u16,
        payload: &[u8],
    ) {
        self.log.lock().unwrap().push(format!(
            "{}:recv:{port_id}:{seq:?}:{port_data}:{}",
            self.name,
            String::from_utf8_lossy(payload)
        ));
    }
}

/// Answers every frame on its port with the payload reversed.
struct Reverser;

impl PortHandler for Reverser {
    fn on_recv(
        &mut self,
        tx: &mut PortTx<'_>,
        port_id: u8,
        _seq: Seq,
        port_data: u16,
        payload: &[u8],
    ) {
        let reversed: Vec<u8> = payload.iter().rev().copied().collect();
        tx.send(port_id, Seq::Single, port_data + 1, &reversed).unwrap();
    }
}

#[test]
fn meta_query_returns_registered_json() {
    let mut pair = Pair::new();
    pair.b
        .port_register(5, Some(r#"{"type":"sensor","rate":10}"#), Reverser)
        .unwrap();
    let responses = pair.listen();

    pair.a.port0_request(Port0Op::Meta, 5, &[]).unwrap();
    pair.a.port0_request(Port0Op::Meta, PORT0, &[]).unwrap();
    pair.a.port0_request(Port0Op::Meta, 40, &[]).unwrap();
    pair.settle();

    let responses = responses.lock().unwrap();
    assert_eq!(responses.len(), 3);
    let Port0Response::Meta { port_id, json } = &responses[0] else {
        panic!("expected META response, got {:?}", responses[0]);
    };
    assert_eq!(*port_id, 5);
    let value: serde_json::Value = serde_json::from_str(json).unwrap();
    assert_eq!(value["type"], "sensor");
    assert_eq!(value["rate"], 10);

    assert_eq!(
        responses[1],
        Port0Response::Meta {
            port_id: 0,
            json: PORT0_META.to_string()
        }
    );
    assert_eq!(
        responses[2],
        Port0Response::Meta {
            port_id: 40,
            json: "{}".to_string()
        }
    );
}

#[test]
fn echo_and_timesync() {
    let mut pair = Pair::new();
    let responses = pair.listen();
    // installing the listener keeps port 0 registered with its metadata
    assert!(pair.a.is_registered(PORT0));
    assert_eq!(pair.a.port_meta(PORT0), Some(PORT0_META));
    pair.clock.store(1_000, Ordering::Relaxed);

    pair.a.port0_request(Port0Op::Echo, 0, b"ping").unwrap();
    pair.a
        .port0_request(Port0Op::TimeSync, 0, &1_000u64.to_le_bytes())
        .unwrap();
    pair.settle();

    let responses = responses.lock().unwrap();
    assert_eq!(
        *responses,
        vec![
            Port0Response::Echo(Bytes::from_static(b"ping")),
            Port0Response::TimeSync {
                request: Bytes::copy_from_slice(&1_000u64.to_le_bytes()),
                peer_rx_ms: 1_000,
                peer_tx_ms: 1_000,
                local_rx_ms: 1_000,
            },
        ]
    );
}

#[test]
fn status_reports_peer_counters() {
    let mut pair = Pair::new();
    pair.b.port_register(1, None, Reverser).unwrap();
    let responses = pair.listen();

    pair.a.send(1, Seq::Single, 0, b"one").unwrap();
    pair.a.send(1, Seq::Single, 0, b"two").unwrap();
    pair.settle();
    pair.a.port0_request(Port0Op::Status, 0, &[]).unwrap();
    pair.settle();

    let responses = responses.lock().unwrap();
    let [Port0Response::Status(peer)] = responses.as_slice() else {
        panic!("expected one STATUS response, got {responses:?}");
    };
    assert_eq!(peer.rx.data_frames, 3);
    assert_eq!(peer.tx.data_frames, 2);
    assert_eq!(peer.rx.crc_errors, 0);
}

#[test]
fn handlers_reply_through_port_tx() {
    let mut pair = Pair::new();
    let log = Log::default();
    pair.b.port_register(3, None, Reverser).unwrap();
    pair.a
        .port_register(
            3,
            None,
            Recording {
                name: "a3",
                log: Arc::clone(&log),
            },
        )
        .unwrap();

    pair.a.send(3, Seq::Single, 41, b"abc").unwrap();
    pair.settle();
    assert_eq!(*log.lock().unwrap(), vec!["a3:recv:3:Single:42:cba"]);
}

#[test]
fn unrouted_messages_are_counted() {
    let mut pair = Pair::new();
    pair.a.send(7, Seq::Single, 0, b"nobody").unwrap();
    pair.a.send_message(8, 0, &[1u8; 600]).unwrap();
    pair.settle();
    assert_eq!(pair.b.unrouted(), 4);
    // delivery still acknowledged at the link level
    assert_eq!(pair.a.link().in_flight(), 0);
}

#[test]
fn events_reach_ports_in_id_order() {
    let mut pair = Pair::new();
    let log = Log::default();
    for (port_id, name) in [(30, "p30"), (2, "p2"), (17, "p17")] {
        pair.b
            .port_register(
                port_id,
                None,
                Recording {
                    name,
                    log: Arc::clone(&log),
                },
            )
            .unwrap();
    }

    pair.a.reset();
    pair.settle();
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "p2:Reset",
            "p17:Reset",
            "p30:Reset",
            "p2:Connected",
            "p17:Connected",
            "p30:Connected"
        ]
    );

    log.lock().unwrap().clear();
    pair.b.reset();
    assert_eq!(
        *log.lock().unwrap(),
        vec!["p2:Reset", "p17:Reset", "p30:Reset"]
    );
}

#[test]
fn segmented_messages_reassemble_per_port() {
    let mut pair = Pair::new();
    let received: Arc<Mutex<Vec<(u8, u16, Bytes)>>> = Arc::default();
    for port_id in [9, 10] {
        let sink = Arc::clone(&received);
        pair.b
            .port_register(
                port_id,
                None,
                MessagePort::new(4096, move |_tx, port_id, port_data, message| {
                    sink.lock().unwrap().push((port_id, port_data, message));
                }),
            )
            .unwrap();
    }

    let long: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
    pair.a.send_message(9, 0xBEEF, &long).unwrap();
    pair.a.send_message(10, 1, b"short").unwrap();
    pair.settle();

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].0, 9);
    assert_eq!(received[0].1, 0xBEEF);
    assert_eq!(&received[0].2[..], long.as_slice());
    assert_eq!(received[1], (10, 1, Bytes::from_static(b"short")));
}

#[test]
fn port0_drops_segmented_requests() {
    let mut pair = Pair::new();
    let responses = pair.listen();
    pair.a
        .send(PORT0, Seq::Start, port0_data(Port0Op::Echo, false, 0), b"x")
        .unwrap();
    pair.settle();
    assert!(responses.lock().unwrap().is_empty());
}

#[test]
fn parameter_errors() {
    let mut pair = Pair::new();
    assert!(matches!(
        pair.a.send(64, Seq::Single, 0, b"x"),
        Err(Error::InvalidPortId { port_id: 64 })
    ));
    assert!(matches!(
        pair.a.port_register(64, None, Reverser),
        Err(Error::InvalidPortId { port_id: 64 })
    ));
    let long_meta = "x".repeat(300);
    assert!(matches!(
        pair.a.port_register(1, Some(&long_meta), Reverser),
        Err(Error::TooBig { size: 300, .. })
    ));
    assert!(matches!(
        pair.a.send_message(1, 0, &[]),
        Err(Error::EmptyPayload)
    ));
    assert!(matches!(
        pair.a.send_message(1, 0, &[0u8; 33 * 256]),
        Err(Error::Full {
            needed: 33,
            available: 32
        })
    ));
    assert_eq!(pair.a.link().in_flight(), 0);
    assert!(pair.a.is_registered(PORT0));
    assert!(!pair.a.is_registered(1));
}

#[test]
fn transport_behind_a_mutex_accepts_bytes_from_another_thread() {
    let mut pair = Pair::new();
    let log = Log::default();
    pair.b
        .port_register(
            4,
            None,
            Recording {
                name: "b4",
                log: Arc::clone(&log),
            },
        )
        .unwrap();
    pair.a.send(4, Seq::Single, 0, b"threaded").unwrap();
    let bytes = std::mem::take(&mut pair.a.link_mut().driver_mut().outbox);

    let b = Arc::new(Mutex::new(pair.b));
    let reader = {
        let b = Arc::clone(&b);
        thread::spawn(move || {
            for chunk in bytes.chunks(5) {
                b.lock().unwrap().ll_recv(chunk);
            }
        })
    };
    reader.join().unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["b4:recv:4:Single:0:threaded"]);
    assert_eq!(b.lock().unwrap().status().rx.data_frames, 1);
}
