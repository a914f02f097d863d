//! The two halves of a cycle.
//!
//! [`Sensing`] runs from the periodic task: acquire, estimate, evaluate,
//! and queue whatever the strip needs to show. [`Background`] runs from the
//! idle loop: apply the newest queued request and feed the watchdog. The
//! SPSC queue and the [`Heartbeat`] are the only things the two share.

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::watchdog::Watchdog;
use heapless::spsc::{Consumer, Producer};
use smart_leds::{SmartLedsWrite, RGB8};

use crate::acquirer::{BulkTransfer, Sensor, SampleAcquirer};
use crate::actuator::AlertActuator;
use crate::config::{ActuationPolicy, Config};
use crate::detector::{Detection, Evaluation, ThresholdDetector};
use crate::error::CycleFault;
use crate::estimator::{self, VolumeLevel};
use crate::handoff::{self, ActuationRequest, QUEUE_CAPACITY};
use crate::liveness::{Heartbeat, LivenessReporter};
use crate::AudioFrame;

/// Outcome of one sense phase, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleReport {
    pub level: VolumeLevel,
    pub evaluation: Evaluation,
    pub request: Option<ActuationRequest>,
    /// The queue was full. The newest request is held back and queued again
    /// on the next cycle.
    pub deferred: bool,
}

pub struct Sensing<'a> {
    detector: ThresholdDetector,
    actuation: ActuationPolicy,
    producer: Producer<'a, ActuationRequest, QUEUE_CAPACITY>,
    /// Newest request that did not fit into the queue.
    pending: Option<ActuationRequest>,
    heartbeat: &'a Heartbeat,
}

impl<'a> Sensing<'a> {
    pub fn new(
        config: &Config,
        producer: Producer<'a, ActuationRequest, QUEUE_CAPACITY>,
        heartbeat: &'a Heartbeat,
    ) -> Self {
        Self {
            detector: ThresholdDetector::new(config.threshold),
            actuation: config.actuation,
            producer,
            pending: None,
            heartbeat,
        }
    }

    /// Run the sense phase and queue the act phase.
    ///
    /// The heartbeat is beaten whether or not the acquisition succeeded, a
    /// failed cycle still counts as the scheduler being alive.
    ///
    /// # Errors
    ///
    /// Propagates acquisition faults. The detector keeps its prior state.
    pub fn run_cycle<S, T, D, const N: usize>(
        &mut self,
        acquirer: &mut SampleAcquirer<S, T, D, N>,
    ) -> Result<CycleReport, CycleFault>
    where
        S: Sensor,
        T: BulkTransfer<N>,
        D: DelayUs<u32>,
    {
        let result = acquirer.acquire().map(|frame| self.process(&frame));
        self.heartbeat.beat();
        result
    }

    /// Evaluate an already acquired frame and queue the resulting request.
    pub fn process<const N: usize>(&mut self, frame: &AudioFrame<N>) -> CycleReport {
        let level = estimator::estimate(frame);
        let evaluation = self.detector.evaluate(level);

        let request = match self.actuation {
            ActuationPolicy::Level => evaluation
                .changed
                .then_some(ActuationRequest::Render(evaluation.state)),
            ActuationPolicy::Pulse { duration_ms } => (frame.latest()
                > self.detector.policy().alert_threshold())
            .then_some(ActuationRequest::Pulse { duration_ms }),
        };

        if request.is_some() {
            self.pending = request;
        }
        let deferred = self.flush_pending();

        CycleReport {
            level,
            evaluation,
            request,
            deferred,
        }
    }

    /// Try to queue the held back request. Returns whether it is still held.
    fn flush_pending(&mut self) -> bool {
        let Some(request) = self.pending.take() else {
            return false;
        };
        match self.producer.enqueue(request) {
            Ok(()) => false,
            Err(request) => {
                self.pending = Some(request);
                true
            }
        }
    }

    pub fn detection(&self) -> Detection {
        self.detector.detection()
    }
}

pub struct Background<'a, W, G> {
    actuator: AlertActuator<W>,
    liveness: LivenessReporter<G>,
    consumer: Consumer<'a, ActuationRequest, QUEUE_CAPACITY>,
    heartbeat: &'a Heartbeat,
    feed_slice_ms: u32,
}

impl<'a, W, G> Background<'a, W, G>
where
    W: SmartLedsWrite<Color = RGB8>,
    G: Watchdog,
{
    pub fn new(
        config: &Config,
        actuator: AlertActuator<W>,
        liveness: LivenessReporter<G>,
        consumer: Consumer<'a, ActuationRequest, QUEUE_CAPACITY>,
        heartbeat: &'a Heartbeat,
    ) -> Self {
        Self {
            actuator,
            liveness,
            consumer,
            heartbeat,
            feed_slice_ms: config.feed_slice_ms,
        }
    }

    /// Put the strip into the initial quiet state.
    pub fn start(&mut self) -> Result<(), W::Error> {
        self.actuator.clear()
    }

    /// Apply the newest pending request, then feed the watchdog.
    ///
    /// The watchdog is serviced even when rendering fails. During a pulse it
    /// is also serviced after every slice of the wait.
    pub fn service<D, C>(
        &mut self,
        delay: &mut D,
        now_ms: &mut C,
    ) -> Result<Option<ActuationRequest>, W::Error>
    where
        D: DelayMs<u32>,
        C: FnMut() -> u64,
    {
        let request = handoff::dequeue_last(&mut self.consumer);

        let rendered = match request {
            Some(ActuationRequest::Render(state)) => self.actuator.render(state),
            Some(ActuationRequest::Pulse { duration_ms }) => {
                let liveness = &mut self.liveness;
                let heartbeat = self.heartbeat;
                self.actuator
                    .pulse(duration_ms, self.feed_slice_ms, delay, || {
                        liveness.service(now_ms(), heartbeat);
                    })
            }
            None => Ok(()),
        };

        self.liveness.service(now_ms(), self.heartbeat);

        rendered.map(|()| request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use heapless::spsc::Queue;

    use crate::config::{ThresholdPolicy, CONFIG};
    use crate::detector::DetectionState;

    fn frame(value: u16) -> AudioFrame<4> {
        AudioFrame::new([value; 4])
    }

    #[test]
    fn level_policy_queues_only_transitions() {
        let heartbeat = Heartbeat::new();
        let mut queue: Queue<ActuationRequest, QUEUE_CAPACITY> = Queue::new();
        let (producer, mut consumer) = queue.split();
        let mut sensing = Sensing::new(&CONFIG, producer, &heartbeat);

        let requests: Vec<_> = [100, 850, 900, 300]
            .iter()
            .map(|level| sensing.process(&frame(*level)).request)
            .collect();

        assert_eq!(
            requests,
            [
                None,
                Some(ActuationRequest::Render(DetectionState::Alert)),
                None,
                Some(ActuationRequest::Render(DetectionState::Quiet)),
            ]
        );
        assert_eq!(consumer.len(), 2);
        assert_eq!(
            handoff::dequeue_last(&mut consumer),
            Some(ActuationRequest::Render(DetectionState::Quiet))
        );
    }

    #[test]
    fn pulse_policy_follows_the_latest_raw_reading() {
        let heartbeat = Heartbeat::new();
        let mut queue: Queue<ActuationRequest, QUEUE_CAPACITY> = Queue::new();
        let (producer, _consumer) = queue.split();
        let config = Config {
            threshold: ThresholdPolicy::plain(800),
            actuation: ActuationPolicy::Pulse { duration_ms: 500 },
            ..CONFIG
        };
        let mut sensing = Sensing::new(&config, producer, &heartbeat);

        let quiet_average_loud_tail = AudioFrame::new([0, 0, 0, 900]);
        let loud_average_quiet_tail = AudioFrame::new([1000, 1000, 1000, 800]);

        assert_eq!(
            sensing.process(&quiet_average_loud_tail).request,
            Some(ActuationRequest::Pulse { duration_ms: 500 })
        );
        let report = sensing.process(&loud_average_quiet_tail);
        assert_eq!(report.request, None);
        assert_eq!(report.evaluation.state, DetectionState::Alert);
    }

    fn alternating_levels(sensing: &mut Sensing<'_>, cycles: usize) -> Vec<bool> {
        (0..cycles)
            .map(|i| {
                let level = if i % 2 == 0 { 900 } else { 100 };
                sensing.process(&frame(level)).deferred
            })
            .collect()
    }

    #[test]
    fn full_queue_is_reported_as_deferred() {
        let heartbeat = Heartbeat::new();
        let mut queue: Queue<ActuationRequest, QUEUE_CAPACITY> = Queue::new();
        let (producer, _consumer) = queue.split();
        let mut sensing = Sensing::new(&CONFIG, producer, &heartbeat);

        let deferred = alternating_levels(&mut sensing, QUEUE_CAPACITY);

        // NOTE: heapless queues hold one item less than their declared size.
        assert_eq!(deferred.iter().filter(|d| **d).count(), 1);
        assert!(deferred[QUEUE_CAPACITY - 1]);
    }

    #[test]
    fn deferred_transition_is_queued_once_there_is_room() {
        let heartbeat = Heartbeat::new();
        let mut queue: Queue<ActuationRequest, QUEUE_CAPACITY> = Queue::new();
        let (producer, mut consumer) = queue.split();
        let mut sensing = Sensing::new(&CONFIG, producer, &heartbeat);

        alternating_levels(&mut sensing, QUEUE_CAPACITY);
        assert_eq!(sensing.detection().state, DetectionState::Quiet);
        assert_eq!(
            handoff::dequeue_last(&mut consumer),
            Some(ActuationRequest::Render(DetectionState::Alert))
        );

        let report = sensing.process(&frame(100));
        assert_eq!(report.request, None);
        assert!(!report.deferred);
        assert_eq!(
            handoff::dequeue_last(&mut consumer),
            Some(ActuationRequest::Render(DetectionState::Quiet))
        );

        assert!(!sensing.process(&frame(100)).deferred);
        assert_eq!(handoff::dequeue_last(&mut consumer), None);
    }

    #[test]
    fn newer_request_replaces_the_deferred_one() {
        let heartbeat = Heartbeat::new();
        let mut queue: Queue<ActuationRequest, QUEUE_CAPACITY> = Queue::new();
        let (producer, mut consumer) = queue.split();
        let mut sensing = Sensing::new(&CONFIG, producer, &heartbeat);

        alternating_levels(&mut sensing, QUEUE_CAPACITY);
        // Still full, the pending Quiet is replaced by the Alert transition.
        assert!(sensing.process(&frame(900)).deferred);

        while consumer.dequeue().is_some() {}
        sensing.process(&frame(900));
        assert_eq!(
            handoff::dequeue_last(&mut consumer),
            Some(ActuationRequest::Render(DetectionState::Alert))
        );
    }
}
