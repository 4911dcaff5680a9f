use crate::config::{Config, DecodeOrder};
use crate::debug::timer::{FramePhase, PhaseTimers};
use crate::error::Result;
use crate::ingest::pool::{DecodedBatch, DecoderPool};
use crate::ingest::reorder::ReorderBuffer;
use crate::ingest::{parse_envelope, Ingress};
use crate::render::projector::FrameProjector;
use crate::render::vertex::ChartVertex;
use crate::series::query::{self, Interpolated};
use crate::series::ring::SampleRing;
use crate::series::window::evict_expired;
use crate::series::Sample;

/// In-flight decode jobs above which a backlog warning is logged.
const BACKLOG_WARN_THRESHOLD: usize = 256;

/// Running counters for the overlay and periodic log.
#[derive(Debug, Default, Clone, Copy)]
pub struct IngestStats {
    pub messages: u64,
    pub malformed: u64,
    pub appended: u64,
    pub evicted: u64,
}

/// Everything between the feed and the vertex set, owned in one place.
///
/// Single writer: all ring mutation happens through `&mut self` on the
/// render thread. Decode workers only see owned blobs.
pub struct ChartSession {
    ring: SampleRing,
    horizon_ns: i64,
    pool: DecoderPool,
    reorder: Option<ReorderBuffer>,
    projector: FrameProjector,
    batches: Vec<DecodedBatch>,
    stats: IngestStats,
    backlog_warned: bool,
}

impl ChartSession {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let reorder = match config.ordering {
            DecodeOrder::BestEffort => None,
            DecodeOrder::Strict => Some(ReorderBuffer::new()),
        };
        let pool = DecoderPool::new(config.workers)?;
        log::info!(
            "Decoder pool: {} workers, {:?} ordering",
            pool.worker_count(),
            config.ordering
        );
        Ok(Self {
            ring: SampleRing::new(config.capacity),
            horizon_ns: config.horizon_ns(),
            pool,
            reorder,
            projector: FrameProjector::new(config.horizon_secs, config.capacity),
            batches: Vec::new(),
            stats: IngestStats::default(),
            backlog_warned: false,
        })
    }

    /// Message-received point. Text is parsed inline, binary goes to the pool.
    pub fn on_ingress(&mut self, msg: Ingress) {
        self.stats.messages += 1;
        match msg {
            Ingress::Text(text) => match parse_envelope(&text) {
                Ok(samples) => self.append_parsed(samples),
                Err(e) => {
                    self.stats.malformed += 1;
                    log::warn!("Dropping malformed envelope: {e}");
                }
            },
            Ingress::Binary(blob) => {
                self.pool.dispatch(blob);
                self.check_backlog();
            }
        }
    }

    /// Inline samples. In strict mode they queue behind blobs still decoding.
    fn append_parsed(&mut self, samples: Vec<Sample>) {
        if samples.is_empty() {
            return;
        }
        if self.reorder.is_none() {
            self.append_all(samples);
            return;
        }
        let seq = self.pool.allocate_seq();
        self.push_ordered(DecodedBatch { seq, samples });
    }

    fn push_ordered(&mut self, batch: DecodedBatch) {
        let Some(reorder) = self.reorder.as_mut() else {
            self.stats.appended += batch.samples.len() as u64;
            self.ring.extend(batch.samples);
            return;
        };
        reorder.push(batch);
        while let Some(samples) = reorder.pop_ready() {
            self.stats.appended += samples.len() as u64;
            self.ring.extend(samples);
        }
    }

    fn check_backlog(&mut self) {
        let pending = self.pool.in_flight();
        if pending > BACKLOG_WARN_THRESHOLD && !self.backlog_warned {
            log::warn!("Decode backlog at {pending} blobs; queue is unbounded");
            self.backlog_warned = true;
        } else if pending <= BACKLOG_WARN_THRESHOLD / 2 {
            self.backlog_warned = false;
        }
    }

    /// Append whatever the decoders have finished.
    pub fn collect_decoded(&mut self) {
        self.pool.drain_ready(&mut self.batches);
        let mut batches = std::mem::take(&mut self.batches);
        for batch in batches.drain(..) {
            self.push_ordered(batch);
        }
        self.batches = batches;
    }

    #[cfg(test)]
    fn append(&mut self, sample: Sample) {
        self.ring.append(sample);
        self.stats.appended += 1;
    }

    fn append_all(&mut self, samples: Vec<Sample>) {
        self.stats.appended += samples.len() as u64;
        self.ring.extend(samples);
    }

    pub fn evict(&mut self, now_ns: i64) -> u64 {
        let n = evict_expired(&mut self.ring, now_ns, self.horizon_ns);
        self.stats.evicted += n;
        n
    }

    /// One frame of CPU work: ingest decoded batches, evict, project.
    pub fn tick(&mut self, now_ns: i64, timers: &mut PhaseTimers) -> &[ChartVertex] {
        timers.begin();
        self.collect_decoded();
        timers.end(FramePhase::Ingest);

        timers.begin();
        self.evict(now_ns);
        timers.end(FramePhase::Evict);

        timers.begin();
        self.projector.project(&self.ring, now_ns);
        timers.end(FramePhase::Project);

        self.projector.vertices()
    }

    /// Vertices from the last `tick`.
    pub fn vertices(&self) -> &[ChartVertex] {
        self.projector.vertices()
    }

    /// Tooltip lookup. `None` when the window is empty.
    pub fn value_at(&self, target_ns: i64) -> Option<Interpolated> {
        query::value_at(&self.ring, target_ns)
    }

    pub fn ring(&self) -> &SampleRing {
        &self.ring
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// Blobs dispatched but not yet appended, including parked ones.
    pub fn decode_backlog(&self) -> usize {
        self.pool.in_flight() + self.reorder.as_ref().map_or(0, ReorderBuffer::parked)
    }

    pub fn horizon_ns(&self) -> i64 {
        self.horizon_ns
    }

    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.projector.value_range()
    }

    #[cfg(test)]
    fn wait_decoded(&mut self) {
        let mut done = Vec::new();
        self.pool.wait_all(&mut done);
        self.batches.extend(done);
        self.collect_decoded();
    }
}

/// Current wall-clock time in nanoseconds since the Unix epoch.
pub fn now_ns() -> i64 {
    match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(d) => d.as_nanos() as i64,
        Err(e) => -(e.duration().as_nanos() as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChartError;
    use crate::ingest::decode::encode_records;

    fn session(capacity: usize, ordering: DecodeOrder) -> ChartSession {
        ChartSession::new(&Config {
            capacity,
            workers: 3,
            ordering,
            ..Config::default()
        })
        .unwrap()
    }

    fn s(timestamp: i64, value: u32) -> Sample {
        Sample { timestamp, value }
    }

    #[test]
    fn tooltip_between_first_samples() {
        let mut sess = session(16, DecodeOrder::BestEffort);
        sess.append(s(0, 10));
        sess.append(s(500_000_000, 20));
        sess.append(s(1_000_000_000, 30));

        let mut timers = PhaseTimers::new();
        let verts = sess.tick(1_000_000_000, &mut timers).len();
        assert_eq!(verts, 3);

        let hit = sess.value_at(250_000_000).unwrap();
        assert!((hit.value - 15.0).abs() < 1e-9);
    }

    #[test]
    fn overflow_by_one_makes_oldest_unreadable() {
        let cap = 8;
        let mut sess = session(cap, DecodeOrder::BestEffort);
        for i in 0..=cap as i64 {
            sess.append(s(i * 1_000, i as u32));
        }
        let ring = sess.ring();
        let start = ring.start_index();
        assert!(matches!(
            ring.at(start - 1),
            Err(ChartError::OutOfRange { .. })
        ));
        assert_eq!(ring.at(start).unwrap(), s(1_000, 1));
    }

    #[test]
    fn malformed_text_is_counted_and_skipped() {
        let mut sess = session(16, DecodeOrder::BestEffort);
        sess.on_ingress(Ingress::Text("{oops".into()));
        sess.on_ingress(Ingress::Text(
            r#"{"type":"Data","payload":{"timestamp":5,"value":9}}"#.into(),
        ));
        let stats = sess.stats();
        assert_eq!(stats.messages, 2);
        assert_eq!(stats.malformed, 1);
        assert_eq!(sess.ring().len(), 1);
    }

    #[test]
    fn binary_blobs_flow_through_pool() {
        let mut sess = session(1024, DecodeOrder::BestEffort);
        for chunk in 0..10i64 {
            let samples: Vec<Sample> = (0..10).map(|i| s(chunk * 10 + i, 1)).collect();
            sess.on_ingress(Ingress::Binary(encode_records(&samples)));
        }
        sess.wait_decoded();
        assert_eq!(sess.ring().len(), 100);
        assert_eq!(sess.decode_backlog(), 0);
    }

    #[test]
    fn strict_order_appends_in_dispatch_order() {
        let mut sess = session(4096, DecodeOrder::Strict);
        for chunk in 0..40i64 {
            let samples: Vec<Sample> = (0..25).map(|i| s(chunk * 25 + i, 1)).collect();
            sess.on_ingress(Ingress::Binary(encode_records(&samples)));
        }
        sess.wait_decoded();
        let ts: Vec<i64> = sess.ring().iter().map(|x| x.timestamp).collect();
        assert_eq!(ts, (0..1000).collect::<Vec<_>>());
    }

    #[test]
    fn stale_samples_leave_the_window() {
        let sec = 1_000_000_000;
        let mut sess = session(64, DecodeOrder::BestEffort);
        sess.append(s(0, 1));
        sess.append(s(30 * sec, 2));
        sess.append(s(90 * sec, 3));

        let mut timers = PhaseTimers::new();
        let n = sess.tick(91 * sec, &mut timers).len();
        assert_eq!(n, 1);
        assert_eq!(sess.stats().evicted, 2);
        // evicted index is no longer readable
        assert!(sess.ring().at(0).is_err());
    }

    #[test]
    fn empty_session_has_no_tooltip() {
        let mut sess = session(8, DecodeOrder::BestEffort);
        let mut timers = PhaseTimers::new();
        assert!(sess.tick(now_ns(), &mut timers).is_empty());
        assert!(sess.value_at(0).is_none());
        assert!(sess.value_range().is_none());
    }

    #[test]
    fn strict_text_waits_behind_pending_blob() {
        let mut sess = session(64, DecodeOrder::Strict);
        sess.on_ingress(Ingress::Binary(encode_records(&[s(1, 10)])));
        sess.on_ingress(Ingress::Text(
            r#"{"type":"Data","payload":{"timestamp":2,"value":20}}"#.into(),
        ));
        // text is parked until the blob before it is decoded
        assert!(sess.ring().is_empty());
        assert_eq!(sess.decode_backlog(), 2);

        sess.wait_decoded();
        let ts: Vec<i64> = sess.ring().iter().map(|x| x.timestamp).collect();
        assert_eq!(ts, vec![1, 2]);
        assert_eq!(sess.stats().appended, 2);
    }

    #[test]
    fn best_effort_text_appends_immediately() {
        let mut sess = session(64, DecodeOrder::BestEffort);
        sess.on_ingress(Ingress::Binary(encode_records(&[s(1, 10)])));
        sess.on_ingress(Ingress::Text(
            r#"{"type":"Data","payload":{"timestamp":2,"value":20}}"#.into(),
        ));
        assert_eq!(sess.ring().len(), 1);
        sess.wait_decoded();
        assert_eq!(sess.ring().len(), 2);
    }

    #[test]
    fn out_of_domain_values_count_as_malformed() {
        let mut sess = session(16, DecodeOrder::BestEffort);
        for v in ["-5", "10.9", "5000000000"] {
            sess.on_ingress(Ingress::Text(format!(
                r#"{{"type":"Data","payload":{{"timestamp":1,"value":{v}}}}}"#
            )));
        }
        assert_eq!(sess.stats().malformed, 3);
        assert!(sess.ring().is_empty());
    }

    #[test]
    fn lookups_after_tick_see_this_frames_ingest_and_eviction() {
        let sec = 1_000_000_000;
        let mut sess = session(64, DecodeOrder::BestEffort);
        sess.append(s(0, 5));
        sess.on_ingress(Ingress::Binary(encode_records(&[s(90 * sec, 7)])));

        // blob finishes decoding; tick is what appends it and evicts t=0
        let mut done = Vec::new();
        sess.pool.wait_all(&mut done);
        sess.batches.extend(done);
        assert_eq!(sess.value_at(90 * sec).unwrap().value, 5.0);

        let mut timers = PhaseTimers::new();
        sess.tick(91 * sec, &mut timers);
        assert_eq!(sess.value_at(90 * sec).unwrap().value, 7.0);
        assert_eq!(sess.vertices().len(), 1);
    }
}
