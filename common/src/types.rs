use std::fmt;

/// A value an engine wants delivered to a TRV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishAction {
    pub topic: String,
    pub value: i32,
}

impl PublishAction {
    pub fn new(topic: impl Into<String>, value: i32) -> Self {
        Self {
            topic: topic.into(),
            value,
        }
    }

    /// Wire form expected by zigbee2mqtt `set` topics.
    pub fn payload(&self) -> String {
        self.value.to_string()
    }
}

impl fmt::Display for PublishAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <- {}", self.topic, self.value)
    }
}

/// A publish that the transport refused. The engine that produced the action
/// has already recorded the value as applied; it is not sent again until the
/// computed value changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub action: PublishAction,
    pub reason: String,
}
