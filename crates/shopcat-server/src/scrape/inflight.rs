//! Per-key registry of running scrapes.
//!
//! A second request for the same (caller, origin) subscribes to the running
//! scrape's event channel instead of starting another one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use shopcat_core::ScrapeEvent;
use shopcat_scraper::CancellationToken;
use tokio::sync::broadcast;

use crate::session::Caller;

/// Events are shared between subscribers rather than cloned per receiver.
pub type SharedEvent = Arc<ScrapeEvent>;

/// Holds every progress event of the longest allowed scrape plus the terminal
/// event, so a subscriber only lags if it stops reading.
const CHANNEL_CAPACITY: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScrapeKey {
    pub scope: String,
    pub origin: String,
}

impl ScrapeKey {
    #[must_use]
    pub fn new(caller: &Caller, origin: &str) -> Self {
        Self {
            scope: caller.scope_key(),
            origin: origin.to_owned(),
        }
    }
}

#[derive(Debug)]
pub struct Flight {
    pub tx: broadcast::Sender<SharedEvent>,
    pub cancel: CancellationToken,
}

#[derive(Debug)]
pub enum Join {
    /// No scrape was running; the caller must drive this one.
    Started(Arc<Flight>, broadcast::Receiver<SharedEvent>),
    Joined(broadcast::Receiver<SharedEvent>),
}

#[derive(Debug, Default)]
pub struct InFlight {
    flights: Mutex<HashMap<ScrapeKey, Arc<Flight>>>,
}

impl InFlight {
    /// Subscribes to the running scrape for `key`, or registers a new one.
    ///
    /// A flight whose subscribers all left (and was therefore cancelled) is
    /// replaced rather than joined.
    pub fn join_or_start(&self, key: &ScrapeKey) -> Join {
        let mut flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(flight) = flights.get(key) {
            if !flight.cancel.is_cancelled() {
                return Join::Joined(flight.tx.subscribe());
            }
        }

        let (tx, rx) = broadcast::channel(CHANNEL_CAPACITY);
        let flight = Arc::new(Flight {
            tx,
            cancel: CancellationToken::new(),
        });
        flights.insert(key.clone(), Arc::clone(&flight));
        Join::Started(flight, rx)
    }

    /// Unregisters `flight`. Must run before its terminal event is sent so a
    /// late joiner either sees that event or starts a fresh scrape.
    pub fn finish(&self, key: &ScrapeKey, flight: &Arc<Flight>) {
        let mut flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);
        if flights.get(key).is_some_and(|f| Arc::ptr_eq(f, flight)) {
            flights.remove(key);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.flights.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
