//! Domain events and the outbound publisher seam.
//!
//! The aggregate records events in memory; handlers drain them after a successful commit
//! and hand them to a [`DomainEventPublisher`]. Nothing is published for a transaction
//! that rolls back.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{DomainError, SchoolId, StudentId};

/// A student was enrolled in a school.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentEnrolled {
    /// The newly enrolled student.
    pub student_id: StudentId,
    /// The school the student joined.
    pub school_id: SchoolId,
}

/// Something that happened inside a school aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// See [`StudentEnrolled`].
    StudentEnrolled(StudentEnrolled),
}

impl DomainEvent {
    /// Convenience constructor for [`DomainEvent::StudentEnrolled`].
    pub fn student_enrolled(student_id: StudentId, school_id: SchoolId) -> Self {
        DomainEvent::StudentEnrolled(StudentEnrolled {
            student_id,
            school_id,
        })
    }
}

/// Delivers committed domain events to the outside world.
#[async_trait]
pub trait DomainEventPublisher: Send + Sync {
    /// Publishes `events` in order.
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), DomainError>;
}

/// Writes every event as a structured `tracing` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventPublisher;

#[async_trait]
impl DomainEventPublisher for TracingEventPublisher {
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), DomainError> {
        for event in events {
            match &event {
                DomainEvent::StudentEnrolled(e) => {
                    tracing::info!(
                        student_id = %e.student_id,
                        school_id = %e.school_id,
                        "student enrolled"
                    );
                }
            }
        }
        Ok(())
    }
}

/// Collects published events in memory until they are drained.
#[derive(Debug, Default)]
pub struct InMemoryEventPublisher {
    events: Mutex<Vec<DomainEvent>>,
}

impl InMemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every event published so far and forgets them.
    pub fn drain(&self) -> Vec<DomainEvent> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

#[async_trait]
impl DomainEventPublisher for InMemoryEventPublisher {
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), DomainError> {
        let mut guard = self
            .events
            .lock()
            .map_err(|_| DomainError::Storage("event buffer lock poisoned".to_string()))?;
        guard.extend(events);
        Ok(())
    }
}
