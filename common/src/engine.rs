use chrono::{DateTime, FixedOffset};
use tracing::info;

use crate::{
    schedule::Schedule, state::AppliedStateStore, topics::scheduled_setpoint_topic,
    types::PublishAction,
};

/// Drives scheduled setpoints for a set of TRVs.
///
/// Every tick resolves each schedule against the same clock reading and emits
/// an action only for TRVs whose resolved temperature changed since the last
/// tick. The first tick after start only records the current values.
#[derive(Debug)]
pub struct ScheduleEngine {
    schedules: Vec<Schedule>,
    applied: AppliedStateStore,
}

impl ScheduleEngine {
    pub fn new(schedules: Vec<Schedule>) -> Self {
        Self {
            schedules,
            applied: AppliedStateStore::new(),
        }
    }

    pub fn schedules(&self) -> &[Schedule] {
        &self.schedules
    }

    pub fn applied(&self) -> &AppliedStateStore {
        &self.applied
    }

    pub fn tick(&self, now: DateTime<FixedOffset>) -> Vec<PublishAction> {
        self.schedules
            .iter()
            .filter_map(|schedule| {
                let temperature = schedule.current_temperature(now);
                let value = self
                    .applied
                    .evaluate(&schedule.topic, temperature)
                    .value_to_publish()?;
                let action = PublishAction::new(scheduled_setpoint_topic(&schedule.topic), value);
                info!("updating {} to {}°C", action.topic, value);
                Some(action)
            })
            .collect()
    }
}
