// Scripted stand-in for the engine used by the integration tests
// Author: Gabriel Demetrios Lafis

#![allow(dead_code)]

use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::{channel, Receiver};
use std::thread::{self, JoinHandle};

use serde_json::Value as JsonValue;

use getml_client::comm::{read_string, write_string};

/// What the fake engine does with one connection after reading its command
pub type Handler = Box<dyn FnOnce(&mut TcpStream) + Send>;

/// A listener on an ephemeral port serving one handler per connection, in order
pub struct FakeEngine {
    pub port: u16,
    pub commands: Receiver<JsonValue>,
    handle: JoinHandle<()>,
}

impl FakeEngine {
    pub fn start(handlers: Vec<Handler>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (sender, commands) = channel();

        let handle = thread::spawn(move || {
            for handler in handlers {
                let (mut stream, _) = listener.accept().unwrap();
                let cmd = read_string(&mut stream).unwrap();
                sender.send(serde_json::from_str(&cmd).unwrap()).unwrap();
                handler(&mut stream);
            }
        });

        FakeEngine { port, commands, handle }
    }

    /// Wait until every scripted connection has been served and return the commands
    pub fn finish(self) -> Vec<JsonValue> {
        self.handle.join().unwrap();
        self.commands.try_iter().collect()
    }
}

/// Reply with a fixed sequence of strings
pub fn reply(messages: &[&str]) -> Handler {
    let messages: Vec<String> = messages.iter().map(|m| m.to_string()).collect();

    Box::new(move |stream| {
        for msg in messages {
            write_string(stream, &msg).unwrap();
        }
    })
}

/// Reply, then read one more command on the same connection and reply again
pub fn reply_twice(first: &[&str], second: &[&str], tail: Vec<u8>) -> Handler {
    let first: Vec<String> = first.iter().map(|m| m.to_string()).collect();
    let second: Vec<String> = second.iter().map(|m| m.to_string()).collect();

    Box::new(move |stream| {
        for msg in first {
            write_string(stream, &msg).unwrap();
        }

        read_string(stream).unwrap();

        for msg in second {
            write_string(stream, &msg).unwrap();
        }

        std::io::Write::write_all(stream, &tail).unwrap();
    })
}

/// Encode a float matrix the way the engine sends it
pub fn float_matrix(nrows: i32, ncols: i32, values: &[f64]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&nrows.to_be_bytes());
    bytes.extend_from_slice(&ncols.to_be_bytes());

    for value in values {
        bytes.extend_from_slice(&value.to_be_bytes());
    }

    bytes
}
