//! Recording notification facility for integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use recovery_core::{
    FacilityError, NotificationFacility, NotificationRequest, ScheduledNotification,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    RequestPermission,
    List,
    Schedule(String),
    Cancel(String),
}

/// In-memory facility that records every call in order.
#[derive(Default)]
pub struct RecordingFacility {
    denied: bool,
    reject: HashSet<String>,
    cancel_error: Option<FacilityError>,
    schedule_delay: Option<Duration>,
    calls: Mutex<Vec<Call>>,
    pending: Mutex<BTreeMap<String, NotificationRequest>>,
    foreign: Mutex<Vec<ScheduledNotification>>,
}

impl RecordingFacility {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn denied() -> Self {
        Self {
            denied: true,
            ..Self::default()
        }
    }

    pub fn rejecting(ids: &[&str]) -> Self {
        Self {
            reject: ids.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_cancel_error(mut self, error: FacilityError) -> Self {
        self.cancel_error = Some(error);
        self
    }

    pub fn with_schedule_delay(mut self, delay: Duration) -> Self {
        self.schedule_delay = Some(delay);
        self
    }

    /// An entry owned by some other feature of the host app.
    pub fn add_foreign(&self, identifier: &str) {
        self.foreign.lock().unwrap().push(ScheduledNotification {
            identifier: identifier.to_string(),
            kind: None,
            trigger: None,
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn pending(&self) -> BTreeMap<String, NotificationRequest> {
        self.pending.lock().unwrap().clone()
    }

    pub fn pending_ids(&self) -> Vec<String> {
        self.pending.lock().unwrap().keys().cloned().collect()
    }

    pub fn foreign_ids(&self) -> Vec<String> {
        self.foreign
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.identifier.clone())
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl NotificationFacility for RecordingFacility {
    async fn request_permission(&self) -> bool {
        self.record(Call::RequestPermission);
        !self.denied
    }

    async fn schedule(&self, request: NotificationRequest) -> Result<String, FacilityError> {
        self.record(Call::Schedule(request.identifier.clone()));
        if let Some(delay) = self.schedule_delay {
            tokio::time::sleep(delay).await;
        }
        if self.reject.contains(&request.identifier) {
            return Err(FacilityError::Rejected(format!(
                "trigger refused for {}",
                request.identifier
            )));
        }
        let id = request.identifier.clone();
        self.pending.lock().unwrap().insert(id.clone(), request);
        Ok(id)
    }

    async fn cancel(&self, identifier: &str) -> Result<(), FacilityError> {
        self.record(Call::Cancel(identifier.to_string()));
        if let Some(error) = &self.cancel_error {
            return Err(error.clone());
        }
        self.foreign
            .lock()
            .unwrap()
            .retain(|e| e.identifier != identifier);
        match self.pending.lock().unwrap().remove(identifier) {
            Some(_) => Ok(()),
            None => Err(FacilityError::NotFound(identifier.to_string())),
        }
    }

    async fn list_scheduled(&self) -> Result<Vec<ScheduledNotification>, FacilityError> {
        self.record(Call::List);
        let mut entries: Vec<ScheduledNotification> = self
            .pending
            .lock()
            .unwrap()
            .values()
            .map(|r| ScheduledNotification {
                identifier: r.identifier.clone(),
                kind: Some(r.kind),
                trigger: Some(r.trigger),
            })
            .collect();
        entries.extend(self.foreign.lock().unwrap().iter().cloned());
        Ok(entries)
    }
}

/// Facility whose listing always fails.
pub struct BrokenFacility;

#[async_trait]
impl NotificationFacility for BrokenFacility {
    async fn request_permission(&self) -> bool {
        true
    }

    async fn schedule(&self, _request: NotificationRequest) -> Result<String, FacilityError> {
        Err(FacilityError::Unavailable("offline".into()))
    }

    async fn cancel(&self, _identifier: &str) -> Result<(), FacilityError> {
        Err(FacilityError::Unavailable("offline".into()))
    }

    async fn list_scheduled(&self) -> Result<Vec<ScheduledNotification>, FacilityError> {
        Err(FacilityError::Unavailable("offline".into()))
    }
}
