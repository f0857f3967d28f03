//! Business Services
//!
//! This module contains the core business logic services:
//!
//! - `ReferenceService` - reconciliation engine, reference queries, marker
//!   detection, and the orphan sweep
//! - `NotificationPublisher` - pushes freshness events to live sessions
//!
//! Services coordinate between the database layer and application logic;
//! all collaborators are injected through constructors, never global.

pub mod error;
pub mod notification_service;
pub mod reference_service;

pub use error::ReferenceServiceError;
pub use notification_service::{
    InMemorySessionRegistry, NotificationPublisher, ReferenceEvent, SessionHandle,
    SessionRegistry, SessionSendError,
};
pub use reference_service::ReferenceService;
