//! Output stream observers
//!
//! An [`Observer`] holds the most recent packet seen on one named graph
//! output stream. The graph publishes into it from the worker thread while
//! any number of other threads read the latest value.
//!
//! # Sharing
//!
//! `Observer` is a cheap handle (`Arc` inside). The pipeline keeps one clone
//! for the duration of a run and the caller keeps the one returned by
//! [`Pipeline::register_observer`](crate::pipeline::Pipeline::register_observer).
//! The value lives as long as any holder does. The graph's delivery callback
//! only holds a weak reference, so it never extends the observer's life.
//!
//! # Publication
//!
//! The slot stores an `Arc<Packet>`, so publishing and reading are both a
//! short pointer swap under a mutex: a reader never sees a torn value and
//! never holds the lock while the caller inspects the packet. The attached
//! flag lives under the same lock, so once [`Observer::detach`] returns no
//! further packet can land, whichever thread the graph delivers on.

use crate::engine::{GraphEngine, PacketCallback};
use crate::error::Result;
use crate::types::Packet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

#[derive(Default)]
struct Slot {
    packet: Option<Arc<Packet>>,
    /// Number of packets published so far
    sequence: u64,
    attached: bool,
}

struct ObserverShared {
    stream: String,
    slot: Mutex<Slot>,
}

impl ObserverShared {
    fn slot(&self) -> MutexGuard<'_, Slot> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn publish(&self, packet: &Packet) -> bool {
        let packet = Arc::new(packet.clone());
        let mut slot = self.slot();
        if !slot.attached {
            return false;
        }
        slot.packet = Some(packet);
        slot.sequence += 1;
        true
    }

    fn set_attached(&self, attached: bool) {
        self.slot().attached = attached;
    }
}

/// Latest-value holder for one graph output stream
#[derive(Clone)]
pub struct Observer {
    shared: Arc<ObserverShared>,
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("stream", &self.shared.stream)
            .field("sequence", &self.sequence())
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl Observer {
    pub(crate) fn new(stream: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(ObserverShared {
                stream: stream.into(),
                slot: Mutex::new(Slot::default()),
            }),
        }
    }

    /// Name of the observed output stream
    pub fn channel_name(&self) -> &str {
        &self.shared.stream
    }

    /// Most recent packet, if any was published yet
    pub fn latest(&self) -> Option<Arc<Packet>> {
        self.shared.slot().packet.clone()
    }

    /// Number of packets published so far
    pub fn sequence(&self) -> u64 {
        self.shared.slot().sequence
    }

    /// Latest packet together with its sequence number, if newer than `seen`
    ///
    /// Lets a consumer poll without handling the same packet twice.
    pub fn latest_if_newer(&self, seen: u64) -> Option<(u64, Arc<Packet>)> {
        let slot = self.shared.slot();
        if slot.sequence <= seen {
            return None;
        }
        slot.packet.clone().map(|p| (slot.sequence, p))
    }

    /// Whether a running graph is currently publishing into this observer
    pub fn is_attached(&self) -> bool {
        self.shared.slot().attached
    }

    /// Number of live handles, including the pipeline's
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.shared)
    }

    /// Register this observer's delivery callback with `graph`
    pub(crate) fn attach(&self, graph: &mut dyn GraphEngine) -> Result<()> {
        let weak: Weak<ObserverShared> = Arc::downgrade(&self.shared);
        let callback: PacketCallback = Box::new(move |packet: &Packet| {
            if let Some(shared) = weak.upgrade() {
                shared.publish(packet);
            }
        });

        self.shared.set_attached(true);
        if let Err(e) = graph.observe_output_stream(&self.shared.stream, callback) {
            self.shared.set_attached(false);
            return Err(e.with_context(format!("observing '{}'", self.shared.stream)));
        }
        Ok(())
    }

    /// Stop accepting packets from the graph
    ///
    /// Waits for a publication already in progress, so the value is frozen
    /// when this returns.
    pub(crate) fn detach(&self) {
        self.shared.set_attached(false);
    }

    #[cfg(test)]
    pub(crate) fn publish_for_test(&self, packet: &Packet) -> bool {
        self.shared.publish(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{GraphConfig, LoopbackGraph, LoopbackOptions, LoopbackProbe};
    use crate::types::{Frame, Landmark, PixelFormat, Payload, Timestamp};
    use std::thread;

    fn text(ts: u64, s: &str) -> Packet {
        Packet::new(Timestamp(ts), Payload::Text(s.to_string()))
    }

    #[test]
    fn test_empty_until_published() {
        let observer = Observer::new("pose");
        assert_eq!(observer.channel_name(), "pose");
        assert!(observer.latest().is_none());
        assert_eq!(observer.sequence(), 0);
        assert!(!observer.is_attached());
    }

    #[test]
    fn test_detached_observer_ignores_packets() {
        let observer = Observer::new("pose");
        assert!(!observer.publish_for_test(&text(1, "a")));
        assert!(observer.latest().is_none());
    }

    #[test]
    fn test_latest_if_newer() {
        let observer = Observer::new("pose");
        observer.shared.set_attached(true);
        observer.publish_for_test(&text(1, "a"));

        let (seq, packet) = observer.latest_if_newer(0).unwrap();
        assert_eq!(seq, 1);
        assert_eq!(packet.timestamp, Timestamp(1));
        assert!(observer.latest_if_newer(seq).is_none());

        observer.publish_for_test(&text(2, "b"));
        assert_eq!(observer.latest_if_newer(seq).unwrap().0, 2);
    }

    #[test]
    fn test_value_outlives_pipeline_handle() {
        let observer = Observer::new("pose");
        let caller = observer.clone();
        observer.shared.set_attached(true);
        observer.publish_for_test(&text(7, "kept"));
        assert_eq!(caller.holders(), 2);
        drop(observer);

        assert_eq!(caller.holders(), 1);
        assert_eq!(caller.latest().unwrap().timestamp, Timestamp(7));
    }

    #[test]
    fn test_attach_to_graph_and_detach() {
        let mut config = GraphConfig::default();
        config.input_streams.push("input_video".to_string());
        config.output_streams.push("landmarks".to_string());
        let mut graph = LoopbackGraph::new(LoopbackOptions::default(), Arc::new(LoopbackProbe::new()));
        graph.initialize(config).unwrap();

        let observer = Observer::new("landmarks");
        observer.attach(&mut graph).unwrap();
        assert!(observer.is_attached());
        graph.start_run().unwrap();

        let mut frame = Frame::blank(4, 4, PixelFormat::Rgb8);
        frame.data_mut()[0..3].copy_from_slice(&[255, 255, 255]);
        graph
            .add_packet_to_input_stream("input_video", frame.clone(), Timestamp(10))
            .unwrap();

        let latest = observer.latest().unwrap();
        assert_eq!(latest.timestamp, Timestamp(10));
        let landmarks: &[Landmark] = latest.payload.as_landmarks().unwrap();
        assert_eq!(landmarks[0].x, 0.0);

        observer.detach();
        graph
            .add_packet_to_input_stream("input_video", frame, Timestamp(20))
            .unwrap();
        assert_eq!(observer.latest().unwrap().timestamp, Timestamp(10));
        assert_eq!(observer.sequence(), 1);
    }

    #[test]
    fn test_attach_unknown_stream_fails() {
        let mut config = GraphConfig::default();
        config.output_streams.push("landmarks".to_string());
        let mut graph = LoopbackGraph::new(LoopbackOptions::default(), Arc::new(LoopbackProbe::new()));
        graph.initialize(config).unwrap();

        let observer = Observer::new("missing");
        assert!(observer.attach(&mut graph).is_err());
        assert!(!observer.is_attached());
    }

    #[test]
    fn test_no_publication_lands_after_detach() {
        let observer = Observer::new("pose");
        observer.shared.set_attached(true);
        let delivering = Arc::new(std::sync::Barrier::new(2));

        // a graph delivering on its own thread
        let delivery = {
            let observer = observer.clone();
            let delivering = delivering.clone();
            thread::spawn(move || {
                delivering.wait();
                let mut accepted = 0u64;
                for i in 1..=10_000u64 {
                    if observer.publish_for_test(&text(i, "x")) {
                        accepted += 1;
                    }
                }
                accepted
            })
        };

        delivering.wait();
        observer.detach();
        let frozen = observer.sequence();
        let frozen_latest = observer.latest();

        let accepted = delivery.join().unwrap();
        assert!(!observer.is_attached());
        assert_eq!(observer.sequence(), frozen);
        assert_eq!(accepted, frozen);
        assert_eq!(
            observer.latest().map(|p| p.timestamp),
            frozen_latest.map(|p| p.timestamp)
        );
    }

    #[test]
    fn test_concurrent_publish_and_read() {
        let observer = Observer::new("pose");
        observer.shared.set_attached(true);

        let writer = {
            let observer = observer.clone();
            thread::spawn(move || {
                for i in 1..=1000u64 {
                    observer.publish_for_test(&text(i, &i.to_string()));
                }
            })
        };

        let reader = {
            let observer = observer.clone();
            thread::spawn(move || {
                let mut last = 0u64;
                for _ in 0..1000 {
                    if let Some(packet) = observer.latest() {
                        // timestamp and payload were written together
                        let Payload::Text(s) = &packet.payload else {
                            panic!("unexpected payload");
                        };
                        assert_eq!(s.parse::<u64>().unwrap(), packet.timestamp.as_micros());
                        assert!(packet.timestamp.as_micros() >= last);
                        last = packet.timestamp.as_micros();
                    }
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(observer.sequence(), 1000);
        assert_eq!(observer.latest().unwrap().timestamp, Timestamp(1000));
    }
}
