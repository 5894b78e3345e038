use std::sync::mpsc;
use std::time;

/// Blocks for `duration` unless a shutdown request arrives first.  Returns `true` when the caller
/// should stop; a hung-up sender counts as a request.
pub fn wait_for_shutdown(shutdown: &mpsc::Receiver<()>, duration: time::Duration) -> bool {
    match shutdown.recv_timeout(duration) {
        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => true,
        Err(mpsc::RecvTimeoutError::Timeout) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn times_out_without_request() {
        let (_tx, rx) = mpsc::channel();
        assert!(!wait_for_shutdown(&rx, time::Duration::from_millis(1)));
    }

    #[test]
    fn pending_request_stops_immediately() {
        let (tx, rx) = mpsc::channel();
        tx.send(()).unwrap();
        assert!(wait_for_shutdown(&rx, time::Duration::from_secs(60)));
    }

    #[test]
    fn dropped_sender_stops() {
        let (tx, rx) = mpsc::channel::<()>();
        drop(tx);
        assert!(wait_for_shutdown(&rx, time::Duration::from_secs(60)));
    }
}
