use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }
    };
}

id_newtype!(ReactorId);

/// Operating state reported by `/reactors/reactor-state/{id}`.
///
/// Parsed leniently at the wire boundary: case, spaces, hyphens and underscores
/// are ignored, so `"Emergency Shutdown"` and `"emergency-shutdown"` both map to
/// [`ReactorState::EmergencyShutdown`]. Anything unrecognised is kept verbatim in
/// [`ReactorState::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReactorState {
    Active,
    Offline,
    Maintenance,
    EmergencyShutdown,
    Unknown(String),
}

impl ReactorState {
    pub fn parse(raw: &str) -> Self {
        let normalized: String = raw
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "active" => Self::Active,
            "offline" => Self::Offline,
            "maintenance" => Self::Maintenance,
            "emergencyshutdown" => Self::EmergencyShutdown,
            _ => Self::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "Active",
            Self::Offline => "Offline",
            Self::Maintenance => "Maintenance",
            Self::EmergencyShutdown => "Emergency Shutdown",
            Self::Unknown(raw) => raw,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl From<String> for ReactorState {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<ReactorState> for String {
    fn from(value: ReactorState) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ReactorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoolantState {
    On,
    Off,
}

impl CoolantState {
    pub fn toggled(self) -> Self {
        match self {
            Self::On => Self::Off,
            Self::Off => Self::On,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for CoolantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    pub amount: f64,
    pub unit: String,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControlRods {
    #[serde(rename = "in")]
    pub inserted: u32,
    #[serde(rename = "out")]
    pub withdrawn: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub amount: f64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactorSummary {
    pub id: ReactorId,
    pub name: String,
}
