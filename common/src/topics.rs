pub const SCHEDULED_SETPOINT_SUFFIX: &str = "set/occupied_heating_setpoint_scheduled";
pub const EXTERNAL_SENSOR_SUFFIX: &str = "set/external_measured_room_sensor";

pub fn scheduled_setpoint_topic(trv_topic: &str) -> String {
    format!("{trv_topic}/{SCHEDULED_SETPOINT_SUFFIX}")
}

pub fn external_sensor_topic(trv_topic: &str) -> String {
    format!("{trv_topic}/{EXTERNAL_SENSOR_SUFFIX}")
}
