//! Console rendering of the engine's progress stream.
//!
//! The engine only knows the `ProgressObserver` trait; this is the terminal
//! implementation the CLI plugs in.

use std::sync::atomic::{AtomicU8, Ordering};

use slipway_core::progress::ProgressObserver;

pub struct ConsoleObserver {
    name: String,
    last: AtomicU8,
}

impl ConsoleObserver {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            last: AtomicU8::new(0),
        }
    }
}

impl ProgressObserver for ConsoleObserver {
    fn notify(&self, percentage: u8, message: Option<&str>) {
        let previous = self.last.swap(percentage, Ordering::Relaxed);
        match message {
            Some(message) => println!("[{percentage:3}%] {message}"),
            None if percentage == 100 && previous != 100 => println!("[100%] done"),
            None => {}
        }
    }

    fn report_failure(&self, message: &str, log_tail: &[String]) {
        eprintln!("{}: {message}", self.name);
        if !log_tail.is_empty() {
            eprintln!("recent log output:");
            for line in log_tail {
                eprintln!("  {line}");
            }
        }
    }

    fn show(&self) {
        println!("launching {}", self.name);
    }
}
