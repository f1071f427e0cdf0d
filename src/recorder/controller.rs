use crate::cancel::CancelToken;
use crate::config::RecorderConfig;
use crate::error::{Error, Result};
use crate::media::CapturePipeline;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Why a recording attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The user stopped the answer
    Manual,
    /// The answer timer reached zero
    TimeLimit,
    /// The owning session was torn down
    Teardown,
}

/// Events emitted while an answer is being recorded.
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    /// Pre-recording countdown step (3, 2, 1)
    CountdownTick(u32),
    /// Recorder, frame sampler and answer timer all started
    RecordingStarted { time_limit_secs: u32 },
    /// Seconds left on the answer timer
    TimerTick(u32),
    /// The attempt ended
    Stopped(StopReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Countdown,
    Recording,
}

/// Drives the countdown → record → auto-stop timeline for one answer.
///
/// `begin_answer` acquires streams if needed, runs the descending countdown
/// (interruptible only by teardown, not by further user input), then starts
/// the audio recorder, the frame sampler and the answer timer together. The
/// timer hitting zero stops the answer through the identical code path as a
/// manual stop.
pub struct RecordingController {
    config: RecorderConfig,
    pipeline: Arc<CapturePipeline>,
    phase: StdMutex<Phase>,
    timer: StdMutex<Option<JoinHandle<()>>>,
    event_tx: broadcast::Sender<ControllerEvent>,
}

impl RecordingController {
    pub fn new(config: RecorderConfig, pipeline: Arc<CapturePipeline>) -> Self {
        let (event_tx, _rx) = broadcast::channel(64);
        Self {
            config,
            pipeline,
            phase: StdMutex::new(Phase::Idle),
            timer: StdMutex::new(None),
            event_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.event_tx.subscribe()
    }

    pub fn is_idle(&self) -> bool {
        *self.phase.lock().expect("phase lock") == Phase::Idle
    }

    /// Begin recording an answer.
    ///
    /// No-op when an attempt is already in flight. Returns once recording has
    /// started (after the countdown); the answer timer then runs in the
    /// background and auto-stops at zero.
    pub async fn begin_answer(
        self: &Arc<Self>,
        time_limit_secs: Option<u32>,
        token: CancelToken,
    ) -> Result<()> {
        {
            let mut phase = self.phase.lock().expect("phase lock");
            if *phase != Phase::Idle {
                debug!("Answer attempt already in flight, begin is a no-op");
                return Ok(());
            }
            *phase = Phase::Countdown;
        }

        let attempt = uuid::Uuid::new_v4();
        info!("Beginning answer attempt {}", attempt);

        if let Err(e) = self.prepare(&token).await {
            *self.phase.lock().expect("phase lock") = Phase::Idle;
            return Err(e);
        }

        // Countdown completes fully before anything records.
        let mut step = self.config.countdown_from;
        while step > 0 {
            let _ = self.event_tx.send(ControllerEvent::CountdownTick(step));
            tokio::select! {
                _ = tokio::time::sleep(self.config.countdown_tick()) => {}
                _ = token.cancelled() => {
                    *self.phase.lock().expect("phase lock") = Phase::Idle;
                    self.pipeline.release().await;
                    let _ = self.event_tx.send(ControllerEvent::Stopped(StopReason::Teardown));
                    return Err(Error::Cancelled("teardown during countdown"));
                }
            }
            step -= 1;
        }

        if let Err(e) = self.pipeline.start_recording().await {
            *self.phase.lock().expect("phase lock") = Phase::Idle;
            self.pipeline.release().await;
            return Err(e);
        }
        *self.phase.lock().expect("phase lock") = Phase::Recording;

        let limit = time_limit_secs.unwrap_or(self.config.default_time_limit_secs).max(1);
        let _ = self
            .event_tx
            .send(ControllerEvent::RecordingStarted { time_limit_secs: limit });

        // Per-second countdown seeded from the question's time limit; zero
        // invokes stop through the same path as a manual stop.
        let controller = Arc::clone(self);
        let tick = self.config.answer_tick();
        let timer_token = token.clone();
        let handle = tokio::spawn(async move {
            let mut remaining = limit;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(tick) => {
                        remaining = remaining.saturating_sub(1);
                        let _ = controller.event_tx.send(ControllerEvent::TimerTick(remaining));
                        if remaining == 0 {
                            if let Err(e) = controller.stop_answer(StopReason::TimeLimit).await {
                                warn!("Timer-driven stop failed: {}", e);
                            }
                            break;
                        }
                    }
                    _ = timer_token.cancelled() => break,
                }
            }
        });
        *self.timer.lock().expect("timer lock") = Some(handle);

        info!("Answer attempt {} recording ({}s limit)", attempt, limit);
        Ok(())
    }

    async fn prepare(&self, token: &CancelToken) -> Result<()> {
        if token.is_cancelled() {
            return Err(Error::Cancelled("session torn down"));
        }
        self.pipeline.acquire().await?;
        self.pipeline.wait_for_media().await?;
        if token.is_cancelled() {
            // Teardown may have run its release before acquire installed the
            // streams; undo the acquisition so no track outlives it.
            self.pipeline.release().await;
            return Err(Error::Cancelled("session torn down"));
        }
        Ok(())
    }

    /// Stop the current answer.
    ///
    /// Idempotent: stop before begin, or a second stop, performs no action
    /// and reports `Ok(false)`. Cleanup runs exactly once per attempt.
    pub async fn stop_answer(&self, reason: StopReason) -> Result<bool> {
        {
            let mut phase = self.phase.lock().expect("phase lock");
            match *phase {
                Phase::Recording => *phase = Phase::Idle,
                // The countdown only yields to teardown, never to user input.
                Phase::Countdown => {
                    debug!("Stop during countdown ignored (reason: {:?})", reason);
                    return Ok(false);
                }
                Phase::Idle => {
                    debug!("Stop without an active attempt is a no-op");
                    return Ok(false);
                }
            }
        }

        let handle = self.timer.lock().expect("timer lock").take();
        if let Some(handle) = handle {
            // The timer-driven path is the timer task itself; it exits on its
            // own right after this call returns.
            if reason != StopReason::TimeLimit {
                handle.abort();
            }
        }

        self.pipeline.stop_recording().await?;
        let _ = self.event_tx.send(ControllerEvent::Stopped(reason));
        info!("Answer stopped ({:?})", reason);
        Ok(true)
    }

    /// Tear down any in-flight attempt and release all device resources.
    /// The caller must cancel the session token first so pending countdown
    /// and timer loops exit.
    pub async fn teardown(&self) {
        let was_active = {
            let mut phase = self.phase.lock().expect("phase lock");
            let active = *phase != Phase::Idle;
            *phase = Phase::Idle;
            active
        };

        if let Some(handle) = self.timer.lock().expect("timer lock").take() {
            handle.abort();
        }

        self.pipeline.release().await;

        if was_active {
            let _ = self.event_tx.send(ControllerEvent::Stopped(StopReason::Teardown));
        }
    }
}
