use shared::domain::ReactorId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("request to {endpoint} failed: {message}")]
    Network { endpoint: String, message: String },
    #[error("{endpoint} returned {status}: {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },
    #[error("{0}")]
    Validation(String),
    #[error("poller is already running; stop it before starting a new interval")]
    AlreadyPolling,
}

impl ClientError {
    pub fn network(endpoint: impl Into<String>, source: &reqwest::Error) -> Self {
        Self::Network {
            endpoint: endpoint.into(),
            message: source.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Text suitable for showing to an operator, without endpoint noise.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Network { message, .. } | Self::Api { message, .. } => message,
            Self::Validation(message) => message,
            Self::AlreadyPolling => "poller is already running",
        }
    }
}

/// Which of the six per-reactor telemetry resources failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelemetryResource {
    Temperature,
    ReactorState,
    RodState,
    Coolant,
    Output,
    FuelLevel,
}

impl TelemetryResource {
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::ReactorState => "reactor-state",
            Self::RodState => "rod-state",
            Self::Coolant => "coolant",
            Self::Output => "output",
            Self::FuelLevel => "fuel-level",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to fetch {} for reactor {reactor_id}: {source}", .resource.path_segment())]
pub struct TelemetryError {
    pub reactor_id: ReactorId,
    pub resource: TelemetryResource,
    #[source]
    pub source: ClientError,
}
