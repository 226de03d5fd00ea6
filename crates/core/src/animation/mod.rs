//! Flash-then-fade animations, at most one in flight per priority class.
//!
//! Every animation runs as its own task. Starting a new animation in a
//! class signals the previous one to cancel and hands its [`JoinHandle`] to
//! the successor, which waits for it before touching the light. The caller
//! never waits, and two animations of the same class never write to the
//! actuator at the same time. Animations in different classes are
//! independent.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
};

use crate::{
    actuator::{Actuator, ActuatorError},
    config::BaselineConfig,
    scheduler::Dispatch,
    Percent, Priority, Rgb, TriggerEvent,
};

/// Lifecycle of a single animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationPhase {
    Idle,
    Flashing,
    FadingBack,
}

#[derive(Debug)]
struct Slot {
    cancel: oneshot::Sender<()>,
    phase: watch::Receiver<AnimationPhase>,
    task: JoinHandle<()>,
}

impl Slot {
    /// Requests cancellation and returns the handle to wait on.
    fn cancel(self) -> JoinHandle<()> {
        // The receiver is gone once the animation finished on its own.
        let _ = self.cancel.send(());
        self.task
    }
}

pub struct AnimationController {
    actuator: Arc<dyn Actuator>,
    baseline: BaselineConfig,
    flash_duration: Duration,
    slots: [Option<Slot>; 2],
}

impl AnimationController {
    pub fn new(
        actuator: Arc<dyn Actuator>,
        baseline: BaselineConfig,
        flash_duration: Duration,
    ) -> Self {
        Self {
            actuator,
            baseline,
            flash_duration,
            slots: [None, None],
        }
    }

    pub fn baseline(&self) -> &BaselineConfig {
        &self.baseline
    }

    /// Current phase of the animation owned by `priority`.
    pub fn phase(&self, priority: Priority) -> AnimationPhase {
        self.slots[priority.index()]
            .as_ref()
            .map(|slot| *slot.phase.borrow())
            .unwrap_or(AnimationPhase::Idle)
    }

    /// Starts a flash for `priority`, superseding any animation of the same
    /// class. Must be called from within a tokio runtime.
    pub fn start(&mut self, priority: Priority, color: Rgb, brightness: Percent) {
        let predecessor = self.slots[priority.index()].take().map(Slot::cancel);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let (phase_tx, phase_rx) = watch::channel(AnimationPhase::Idle);

        let animation = Animation {
            actuator: Arc::clone(&self.actuator),
            fade_color: self.baseline.color,
            flash_duration: self.flash_duration,
            priority,
            color,
            brightness,
        };
        let task = tokio::spawn(animation.run(predecessor, cancel_rx, phase_tx));

        self.slots[priority.index()] = Some(Slot {
            cancel: cancel_tx,
            phase: phase_rx,
            task,
        });
    }

    /// Cancels every in-flight animation and waits for them to settle.
    pub async fn shutdown(&mut self) {
        for slot in &mut self.slots {
            if let Some(slot) = slot.take() {
                settle(slot.cancel()).await;
            }
        }
    }
}

impl std::fmt::Debug for AnimationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationController")
            .field("baseline", &self.baseline)
            .field("flash_duration", &self.flash_duration)
            .field("high", &self.phase(Priority::High))
            .field("normal", &self.phase(Priority::Normal))
            .finish()
    }
}

impl Dispatch for AnimationController {
    fn dispatch(&mut self, priority: Priority, event: TriggerEvent) {
        tracing::info!(
            category = %event.category,
            note = event.note,
            %priority,
            color = %event.color,
            brightness = %event.brightness,
            "hit"
        );
        self.start(priority, event.color, event.brightness);
    }
}

async fn settle(task: JoinHandle<()>) {
    if let Err(err) = task.await {
        if err.is_panic() {
            tracing::error!(%err, "animation task panicked");
        }
    }
}

struct Animation {
    actuator: Arc<dyn Actuator>,
    fade_color: Rgb,
    flash_duration: Duration,
    priority: Priority,
    color: Rgb,
    brightness: Percent,
}

impl Animation {
    async fn run(
        self,
        predecessor: Option<JoinHandle<()>>,
        mut cancel: oneshot::Receiver<()>,
        phase: watch::Sender<AnimationPhase>,
    ) {
        if let Some(previous) = predecessor {
            settle(previous).await;
        }

        phase.send_replace(AnimationPhase::Flashing);
        if let Err(err) = self.flash().await {
            tracing::warn!(%err, priority = %self.priority, "flash failed");
            phase.send_replace(AnimationPhase::Idle);
            return;
        }

        // A dropped sender means the controller is gone: treat as cancelled.
        tokio::select! {
            biased;
            _ = &mut cancel => {
                tracing::debug!(priority = %self.priority, "animation superseded before fade");
                phase.send_replace(AnimationPhase::Idle);
                return;
            }
            _ = tokio::time::sleep(self.flash_duration) => {}
        }

        phase.send_replace(AnimationPhase::FadingBack);
        if let Err(err) = self.fade(&mut cancel).await {
            tracing::warn!(%err, priority = %self.priority, "fade failed");
        }
        phase.send_replace(AnimationPhase::Idle);
    }

    async fn flash(&self) -> Result<(), ActuatorError> {
        self.actuator.set_color(self.color).await?;
        self.actuator.set_brightness(self.brightness).await
    }

    async fn fade(&self, cancel: &mut oneshot::Receiver<()>) -> Result<(), ActuatorError> {
        self.actuator.set_brightness(self.brightness.faded()).await?;
        if is_cancelled(cancel) {
            tracing::debug!(priority = %self.priority, "animation superseded mid-fade");
            return Ok(());
        }
        self.actuator.set_color(self.fade_color).await
    }
}

fn is_cancelled(cancel: &mut oneshot::Receiver<()>) -> bool {
    !matches!(
        cancel.try_recv(),
        Err(oneshot::error::TryRecvError::Empty)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::testing::{Call, RecordingActuator};

    const FLASH: Duration = Duration::from_millis(100);
    const RED: Rgb = Rgb::new(255, 0, 0);
    const CYAN: Rgb = Rgb::new(0, 255, 255);
    const WHITE: Rgb = Rgb::new(255, 255, 255);

    fn controller(actuator: &Arc<RecordingActuator>) -> AnimationController {
        AnimationController::new(actuator.clone(), BaselineConfig::default(), FLASH)
    }

    fn pct(value: u8) -> Percent {
        Percent::saturating(value)
    }

    #[tokio::test(start_paused = true)]
    async fn flashes_then_fades_to_baseline() {
        let actuator = RecordingActuator::shared();
        let mut animations = controller(&actuator);

        animations.start(Priority::High, RED, pct(100));
        tokio::time::sleep(FLASH / 2).await;
        assert_eq!(animations.phase(Priority::High), AnimationPhase::Flashing);
        assert_eq!(actuator.calls(), vec![Call::Color(RED), Call::Brightness(100)]);

        tokio::time::sleep(FLASH).await;
        assert_eq!(animations.phase(Priority::High), AnimationPhase::Idle);
        assert_eq!(
            actuator.calls(),
            vec![
                Call::Color(RED),
                Call::Brightness(100),
                Call::Brightness(30),
                Call::Color(WHITE),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_animation_never_fades() {
        let actuator = RecordingActuator::shared();
        let mut animations = controller(&actuator);

        animations.start(Priority::High, RED, pct(100));
        tokio::time::sleep(FLASH / 2).await;
        animations.start(Priority::High, RED, pct(65));
        tokio::time::sleep(FLASH * 3).await;

        assert_eq!(
            actuator.calls(),
            vec![
                Call::Color(RED),
                Call::Brightness(100),
                Call::Color(RED),
                Call::Brightness(65),
                Call::Brightness(20),
                Call::Color(WHITE),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn successor_waits_for_slow_predecessor() {
        let actuator = RecordingActuator::shared();
        actuator.set_latency(Duration::from_millis(30));
        let mut animations = controller(&actuator);

        animations.start(Priority::Normal, CYAN, pct(80));
        tokio::time::sleep(Duration::from_millis(10)).await;
        animations.start(Priority::Normal, RED, pct(90));
        tokio::time::sleep(FLASH * 5).await;

        assert_eq!(
            actuator.calls(),
            vec![
                Call::Color(CYAN),
                Call::Brightness(80),
                Call::Color(RED),
                Call::Brightness(90),
                Call::Brightness(27),
                Call::Color(WHITE),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn classes_animate_independently() {
        let actuator = RecordingActuator::shared();
        let mut animations = controller(&actuator);

        animations.start(Priority::High, RED, pct(100));
        animations.start(Priority::Normal, CYAN, pct(50));
        tokio::time::sleep(FLASH * 2).await;

        let calls = actuator.calls();
        let fades = calls
            .iter()
            .filter(|call| matches!(call, Call::Color(color) if *color == WHITE))
            .count();
        assert_eq!(fades, 2);
        assert_eq!(animations.phase(Priority::High), AnimationPhase::Idle);
        assert_eq!(animations.phase(Priority::Normal), AnimationPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn actuator_failure_returns_to_idle() {
        let actuator = RecordingActuator::shared();
        actuator.fail_colors(true);
        let mut animations = controller(&actuator);

        animations.start(Priority::High, RED, pct(100));
        tokio::time::sleep(FLASH * 2).await;
        assert_eq!(animations.phase(Priority::High), AnimationPhase::Idle);
        assert!(actuator.calls().is_empty());

        actuator.fail_colors(false);
        animations.start(Priority::High, RED, pct(100));
        tokio::time::sleep(FLASH * 2).await;
        assert_eq!(actuator.calls().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_fades() {
        let actuator = RecordingActuator::shared();
        let mut animations = controller(&actuator);

        animations.start(Priority::High, RED, pct(100));
        tokio::time::sleep(FLASH / 2).await;
        animations.shutdown().await;
        tokio::time::sleep(FLASH * 2).await;

        assert_eq!(actuator.calls(), vec![Call::Color(RED), Call::Brightness(100)]);
        assert_eq!(animations.phase(Priority::High), AnimationPhase::Idle);
    }
}
