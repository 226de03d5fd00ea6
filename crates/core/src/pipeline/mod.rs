//! Lifecycle wiring from trigger hits to the light: connect, run, restore.

use std::{future::Future, sync::Arc};

use crate::{
    actuator::{self, Actuator, DeviceInfo},
    trigger, AnimationController, AppConfig, DrumMapping, EventQueues, Priority, Result,
    Scheduler, SchedulerStats,
};

/// Wires the classifier, event lanes, scheduling loop and animation
/// controller around one actuator.
pub struct Pipeline {
    config: AppConfig,
    mapping: DrumMapping,
    queues: Arc<EventQueues>,
    actuator: Arc<dyn Actuator>,
}

impl Pipeline {
    pub fn new(config: AppConfig, actuator: Arc<dyn Actuator>) -> Result<Self> {
        config.validate()?;
        let mapping = DrumMapping::new(config.colors.clone(), config.brightness.clone());
        let queues = Arc::new(EventQueues::from_config(&config.queues));
        Ok(Self {
            config,
            mapping,
            queues,
            actuator,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn mapping(&self) -> &DrumMapping {
        &self.mapping
    }

    pub fn queues(&self) -> Arc<EventQueues> {
        Arc::clone(&self.queues)
    }

    /// Callback to hand to the trigger source.
    pub fn producer(&self) -> impl FnMut(u8, u8) + Send + 'static {
        trigger::enqueue_hits(self.mapping.clone(), self.queues())
    }

    /// Scans, connects to the selected device and applies the baseline.
    pub async fn connect_actuator(&self, address: Option<&str>) -> Result<DeviceInfo> {
        let devices = self.actuator.scan().await?;
        for device in &devices {
            tracing::info!(address = %device.address, name = %device.name, "found light");
        }
        let device = actuator::select_device(&devices, address)?.clone();
        self.actuator.connect(&device.address).await?;
        actuator::apply_baseline(self.actuator.as_ref(), &self.config.baseline).await?;
        tracing::info!(address = %device.address, "light connected");
        Ok(device)
    }

    /// Runs the scheduling loop until `shutdown` resolves, then cancels
    /// in-flight animations, restores the baseline and disconnects.
    pub async fn run_until<F>(&self, shutdown: F) -> SchedulerStats
    where
        F: Future<Output = ()>,
    {
        let animations = AnimationController::new(
            Arc::clone(&self.actuator),
            self.config.baseline,
            self.config.timing.flash_duration(),
        );
        let mut scheduler = Scheduler::new(self.queues(), animations, &self.config.timing);
        let stats = scheduler.run_until(shutdown).await;

        let mut animations = scheduler.into_dispatcher();
        animations.shutdown().await;
        actuator::restore_and_disconnect(self.actuator.as_ref(), &self.config.baseline).await;

        let high = self.queues.lane(Priority::High).evicted();
        let normal = self.queues.lane(Priority::Normal).evicted();
        tracing::info!(
            dispatched_high = stats.high_dispatched,
            dispatched_normal = stats.normal_dispatched,
            stale = stats.stale_discarded,
            evicted_high = high,
            evicted_normal = normal,
            "pipeline stopped"
        );
        stats
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("queues", &self.queues)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        actuator::testing::{Call, RecordingActuator},
        Rgb,
    };

    #[tokio::test(start_paused = true)]
    async fn drives_hits_from_producer_to_light() {
        let recorder = RecordingActuator::shared();
        let pipeline = Pipeline::new(AppConfig::default(), recorder.clone()).unwrap();

        let mut on_hit = pipeline.producer();
        on_hit(36, 127);
        on_hit(42, 0);

        let stats = pipeline
            .run_until(tokio::time::sleep(Duration::from_millis(300)))
            .await;

        assert_eq!(stats.high_dispatched, 1);
        assert_eq!(stats.normal_dispatched, 1);

        let calls = recorder.calls();
        assert!(calls.starts_with(&[Call::Color(Rgb::new(255, 0, 0)), Call::Brightness(100)]));
        assert!(calls.contains(&Call::Color(Rgb::new(0, 255, 255))));
        assert!(calls.contains(&Call::Brightness(30)));
        assert_eq!(
            &calls[calls.len() - 2..],
            &[Call::Brightness(50), Call::Color(Rgb::new(255, 255, 255))]
        );
    }

    #[tokio::test]
    async fn connects_dry_run_actuator() {
        let dry_run = Arc::new(actuator::DryRunActuator::new());
        let pipeline = Pipeline::new(AppConfig::default(), dry_run).unwrap();
        let device = pipeline.connect_actuator(None).await.unwrap();
        assert_eq!(device.address, actuator::DryRunActuator::ADDRESS);
        assert!(pipeline.connect_actuator(Some("11:22")).await.is_err());
    }

    #[test]
    fn rejects_invalid_configuration() {
        let mut config = AppConfig::default();
        config.queues.high_priority_capacity = 0;
        assert!(Pipeline::new(config, RecordingActuator::shared()).is_err());
    }
}
