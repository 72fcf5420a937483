//! Lifecycle events and operator alerts.
//!
//! Lifecycle events describe progress and go to an [`EventSink`]. Alerts
//! describe failures that need an operator and go to an [`AlertSink`], at
//! most one per failed branch.

mod alert;
mod sink;

pub use alert::{Alert, AlertSink, CollectingAlertSink, LoggingAlertSink, TopicAlertSink};
pub use sink::{event_types, CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
