//! REQ/REP through a reactor
//!
//! Demonstrates the event-interface pattern:
//! - A REP server bound on the first free port of [4321, 4323)
//! - The reactor thread delivering each request to a callback
//! - The main thread answering through `Reactor::push`
//! - A REQ client on its own thread
//!
//! Run with `RUST_LOG=zreactor=debug` to see the control traffic.

use std::sync::mpsc;
use std::thread;

use zreactor::prelude::*;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    zreactor::dev_tracing::init_tracing();
    println!("=== REQ/REP Reactor Demo ===\n");

    let (tx, rx) = mpsc::channel();
    let reactor = Reactor::new(move |payload: String| {
        println!("📥 reactor received: {payload:?}");
        let _ = tx.send(payload);
    })?;

    let range = PortRange::span(4321, 4323)?;
    let server = SocketHandle::bind(Pattern::Rep, Transport::Tcp, "*", Some(range))?;
    let port: u16 = server
        .location()
        .rsplit(':')
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or("bound location has no port")?;
    println!("✅ REP server bound at {}\n", server.location());
    reactor.add_socket(server)?;

    let client = thread::spawn(move || -> zreactor::Result<()> {
        let mut req = SocketHandle::connect(Pattern::Req, Transport::Tcp, "127.0.0.1", Some(port))?;
        for i in 0..3 {
            let request = format!("hello there... #{i}");
            req.send(&request)?;
            let reply = req.recv()?;
            println!("📤 client got reply: {reply:?}");
        }
        Ok(())
    });

    for _ in 0..3 {
        let request = rx.recv()?;
        reactor.push(&format!("ack {request}"))?;
    }

    client.join().map_err(|_| "client thread panicked")??;
    reactor.join()?;

    println!("\n✅ Demo complete");
    Ok(())
}
