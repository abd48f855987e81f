use std::fmt;

use chrono::{DateTime, Utc};
use shared::domain::{ControlRods, CoolantState, Output, ReactorId, ReactorState, Temperature};

use crate::{error::ClientError, series::SeriesView};

/// Fully merged, point-in-time state of one reactor.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactorSnapshot {
    pub id: ReactorId,
    pub name: String,
    pub temperature: Temperature,
    pub state: ReactorState,
    pub control_rods: ControlRods,
    pub coolant: CoolantState,
    pub output: Output,
    pub fuel_level: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FleetState {
    pub plant_name: String,
    /// Snapshots in the order the service lists its reactors.
    pub reactors: Vec<ReactorSnapshot>,
    pub logs: Vec<String>,
    pub tick: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl FleetState {
    pub fn get(&self, id: &ReactorId) -> Option<&ReactorSnapshot> {
        self.reactors.iter().find(|snapshot| &snapshot.id == id)
    }

    pub fn reactor_ids(&self) -> Vec<ReactorId> {
        self.reactors.iter().map(|snapshot| snapshot.id.clone()).collect()
    }
}

/// Scalar the poller feeds into its rolling series each tick.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SeriesMetric {
    #[default]
    FleetAverageTemperature,
    ReactorTemperature(ReactorId),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetScope {
    Reactor(ReactorId),
    Fleet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    ControlledShutdown,
    EmergencyShutdown,
    StartReactor,
    ToggleCoolant,
    Refuel,
    RaiseRods,
    DropRods,
}

impl ControlKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::ControlledShutdown => "controlled shutdown",
            Self::EmergencyShutdown => "emergency shutdown",
            Self::StartReactor => "start reactor",
            Self::ToggleCoolant => "toggle coolant",
            Self::Refuel => "refuel",
            Self::RaiseRods => "raise rods",
            Self::DropRods => "drop rods",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ControlIntent {
    pub scope: TargetScope,
    pub kind: ControlKind,
    pub steps: Option<u32>,
}

impl ControlIntent {
    pub fn reactor(id: ReactorId, kind: ControlKind) -> Self {
        Self {
            scope: TargetScope::Reactor(id),
            kind,
            steps: None,
        }
    }

    pub fn fleet(kind: ControlKind) -> Self {
        Self {
            scope: TargetScope::Fleet,
            kind,
            steps: None,
        }
    }

    pub fn with_steps(mut self, steps: u32) -> Self {
        self.steps = Some(steps);
        self
    }
}

/// A single mutation call against the reactor service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ControlledShutdown,
    EmergencyShutdown,
    StartReactor,
    Maintenance,
    Refuel,
    RaiseRod,
    DropRod,
    SetCoolant(CoolantState),
}

impl Operation {
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::ControlledShutdown => "controlled-shutdown",
            Self::EmergencyShutdown => "emergency-shutdown",
            Self::StartReactor => "start-reactor",
            Self::Maintenance => "maintenance",
            Self::Refuel => "refuel",
            Self::RaiseRod => "raise-rod",
            Self::DropRod => "drop-rod",
            Self::SetCoolant(_) => "coolant",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetCoolant(state) => write!(f, "coolant {state}"),
            other => f.write_str(other.path_segment()),
        }
    }
}

/// Outcome of one call, or of one local denial, made on behalf of an intent.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    /// `None` when the outcome concerns the intent as a whole rather than a reactor.
    pub target: Option<ReactorId>,
    pub kind: ControlKind,
    /// `None` when the intent was denied locally and no call was issued.
    pub operation: Option<Operation>,
    pub error: Option<ClientError>,
}

impl ActionResult {
    pub fn issued(
        target: ReactorId,
        kind: ControlKind,
        operation: Operation,
        outcome: Result<(), ClientError>,
    ) -> Self {
        Self {
            target: Some(target),
            kind,
            operation: Some(operation),
            error: outcome.err(),
        }
    }

    pub fn denied(target: Option<ReactorId>, kind: ControlKind, message: impl Into<String>) -> Self {
        Self {
            target,
            kind,
            operation: None,
            error: Some(ClientError::validation(message)),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(ClientError::user_message)
    }
}

/// Everything the core publishes to whoever renders it.
#[derive(Debug, Clone)]
pub enum FleetEvent {
    FleetStateUpdated(FleetState),
    SeriesUpdated(SeriesView),
    ActionResults(Vec<ActionResult>),
    PollFailed(String),
}
