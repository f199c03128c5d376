//! Catalog of event types emitted by Worklane.
//!
//! The catalog is advisory. Subscriptions accept any event type string, so
//! producers can introduce new events without a registry change; the catalog
//! exists so API consumers can discover what the platform currently emits.

/// A known event type and what triggers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventTypeDescriptor {
    pub event_type: &'static str,
    pub description: &'static str,
}

/// Event types currently emitted by the platform.
pub const AVAILABLE_EVENT_TYPES: &[EventTypeDescriptor] = &[
    EventTypeDescriptor {
        event_type: "user.created",
        description: "A user account was created",
    },
    EventTypeDescriptor {
        event_type: "user.updated",
        description: "A user profile was updated",
    },
    EventTypeDescriptor {
        event_type: "user.deleted",
        description: "A user account was deleted",
    },
    EventTypeDescriptor {
        event_type: "task.created",
        description: "A task was created",
    },
    EventTypeDescriptor {
        event_type: "task.updated",
        description: "A task was updated",
    },
    EventTypeDescriptor {
        event_type: "task.completed",
        description: "A task was marked complete",
    },
    EventTypeDescriptor {
        event_type: "task.deleted",
        description: "A task was deleted",
    },
    EventTypeDescriptor {
        event_type: "project.created",
        description: "A project was created",
    },
    EventTypeDescriptor {
        event_type: "project.archived",
        description: "A project was archived",
    },
    EventTypeDescriptor {
        event_type: "comment.created",
        description: "A comment was posted",
    },
];

/// Whether an event type appears in the advisory catalog.
///
/// Unknown types are still deliverable; this only drives discovery output.
#[must_use]
pub fn is_known_event_type(event_type: &str) -> bool {
    AVAILABLE_EVENT_TYPES
        .iter()
        .any(|d| d.event_type == event_type)
}
