//! Replay scan source fed from a channel.
//!
//! Tests and simulations push scripted [`ScanOutcome`]s through a
//! [`ReplayFeed`]; ticks with nothing queued report an empty scan.

use crate::scanner::types::ScanOutcome;
use crate::scanner::ScanSource;
use crossbeam_channel::{unbounded, Receiver, Sender};

/// Handle for feeding scripted outcomes into a [`ReplayScanner`].
#[derive(Clone)]
pub struct ReplayFeed {
    tx: Sender<ScanOutcome>,
}

impl ReplayFeed {
    /// Queue one outcome for a future tick.
    pub fn push(&self, outcome: ScanOutcome) {
        let _ = self.tx.send(outcome);
    }
}

/// A scan source replaying queued outcomes in order.
pub struct ReplayScanner {
    rx: Receiver<ScanOutcome>,
}

impl ReplayScanner {
    /// Create a scanner and its feed handle.
    pub fn new() -> (Self, ReplayFeed) {
        let (tx, rx) = unbounded();
        (Self { rx }, ReplayFeed { tx })
    }
}

impl ScanSource for ReplayScanner {
    fn scan(&mut self) -> ScanOutcome {
        self.rx.try_recv().unwrap_or_else(|_| ScanOutcome::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::types::Station;

    #[test]
    fn test_replay_in_order_then_empty() {
        let (mut scanner, feed) = ReplayScanner::new();
        feed.push(ScanOutcome::from_stations(vec![Station::new(
            [1, 2, 3, 4, 5, 6],
            "ap-1",
            -55,
        )]));
        feed.push(ScanOutcome::Failed { code: -2 });

        assert!(matches!(
            scanner.scan(),
            ScanOutcome::Stations { ref stations, .. } if stations.len() == 1
        ));
        assert!(matches!(scanner.scan(), ScanOutcome::Failed { code: -2 }));
        assert!(matches!(
            scanner.scan(),
            ScanOutcome::Stations { ref stations, .. } if stations.is_empty()
        ));
    }
}
