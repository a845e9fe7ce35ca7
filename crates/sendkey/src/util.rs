//! Bridging helpers for the interactive driver.

use std::{io::BufRead, thread};

use crossbeam_channel::Receiver;
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// Bridge a crossbeam receiver into a Tokio unbounded receiver using a
/// dedicated OS thread.
///
/// Blocks on the crossbeam `recv` in a spawned thread and forwards items
/// into a Tokio channel; stops when either side closes.
pub fn bridge_crossbeam_to_tokio<T: Send + 'static>(rx: Receiver<T>) -> UnboundedReceiver<T> {
    let (tx_tokio, rx_tokio) = mpsc::unbounded_channel();

    thread::spawn(move || {
        while let Ok(item) = rx.recv() {
            if tx_tokio.send(item).is_err() {
                break;
            }
        }
    });

    rx_tokio
}

/// Read stdin line by line on a blocking thread, yielding lines as an async
/// stream. The channel closes on EOF or a read error.
pub fn stdin_lines() -> UnboundedReceiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    bridge_crossbeam_to_tokio(rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bridge_forwards_in_order_and_closes() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut bridged = bridge_crossbeam_to_tokio(rx);
        tx.send(1u32).unwrap();
        tx.send(2).unwrap();
        drop(tx);

        assert_eq!(bridged.recv().await, Some(1));
        assert_eq!(bridged.recv().await, Some(2));
        assert_eq!(bridged.recv().await, None);
    }
}
