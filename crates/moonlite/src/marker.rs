// SPDX-License-Identifier: MIT OR Apache-2.0
//! Marker dispatch.

use crate::scheduler::TimeSpan;
use crate::sequence::Marker;
use crate::signal::Signal;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Fires per-name signals for markers crossed by the playback cursor
#[derive(Debug, Default)]
pub struct MarkerDispatcher {
    /// Markers sorted by time
    markers: Vec<Marker>,
    /// Signals created on request, by marker name
    signals: Mutex<HashMap<String, Signal<String>>>,
}

impl MarkerDispatcher {
    /// Create a dispatcher for markers already sorted by time
    pub fn new(markers: Vec<Marker>) -> Self {
        Self {
            markers,
            signals: Mutex::new(HashMap::new()),
        }
    }

    /// Signal fired whenever a marker called `name` is reached.
    ///
    /// Repeated calls return the same channel. Names with no authored marker
    /// are allowed and simply never fire.
    pub fn signal(&self, name: &str) -> Signal<String> {
        self.signals
            .lock()
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Markers inside `span`, in time order
    pub fn markers_in(&self, span: TimeSpan) -> impl Iterator<Item = &Marker> {
        self.markers.iter().filter(move |m| span.contains(m.time))
    }

    /// Fire every marker inside each span, spans in order. A span crossed
    /// several times fires its markers once per pass. Returns the number of
    /// markers reached.
    pub fn dispatch(&self, spans: &[TimeSpan]) -> usize {
        let mut fired: usize = 0;
        for span in spans {
            // Unsubscribed names have no channel yet
            let signals = self.signals.lock();
            let reached: Vec<(&Marker, Option<Signal<String>>)> = self
                .markers_in(*span)
                .map(|marker| (marker, signals.get(&marker.name).cloned()))
                .collect();
            drop(signals);
            fired = fired.saturating_add(reached.len().saturating_mul(span.passes as usize));

            if reached.iter().all(|(_, signal)| signal.is_none()) {
                continue;
            }
            for _ in 0..span.passes {
                for (marker, signal) in &reached {
                    if let Some(signal) = signal {
                        tracing::debug!("Marker {:?} reached at {:.3}s", marker.name, marker.time);
                        signal.fire(&marker.value);
                    }
                }
            }
        }
        fired
    }
}
