//!
//! Care Plan Client - editing side of the treatment plan graph
//!
//! A [`GraphController`] holds the live graph of an open plan view,
//! applies [`Command`]s as pure snapshot transitions and persists every
//! change through a serialized [`SaveQueue`] over a [`PlanTransport`].

#![forbid(unsafe_code)]

pub mod commands;
pub mod controller;
pub mod error;
pub mod saver;
pub mod transport;

pub use commands::Command;
pub use controller::{GraphController, PlanView};
pub use error::{ControllerError, TransportError};
pub use saver::{SaveQueue, SaveStatus};
pub use transport::{HttpPlanTransport, HttpTransportConfig, LocalPlanTransport, PlanTransport};
