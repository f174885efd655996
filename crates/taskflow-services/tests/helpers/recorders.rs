use std::sync::Mutex;
use taskflow_core::{AuditAction, AuditEvent, AuditSink, NotificationDispatcher, NotificationEvent};

#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn actions(&self) -> Vec<AuditAction> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.action)
            .collect()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), String> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(NotificationEvent, serde_json::Value)>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().iter().map(|(e, _)| *e).collect()
    }
}

#[async_trait::async_trait]
impl NotificationDispatcher for RecordingNotifier {
    async fn notify(
        &self,
        event: NotificationEvent,
        payload: serde_json::Value,
    ) -> Result<(), String> {
        self.events.lock().unwrap().push((event, payload));
        Ok(())
    }
}
