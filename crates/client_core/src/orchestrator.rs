//! Turns operator intents into sequenced reactor service calls.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex as StdMutex, PoisonError},
};

use futures::future::join_all;
use shared::domain::{CoolantState, ReactorId, ReactorState};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::{
    error::ClientError,
    transport::ReactorService,
    types::{
        ActionResult, ControlIntent, ControlKind, FleetEvent, FleetState, Operation,
        ReactorSnapshot, TargetScope,
    },
};

/// Upper bound on single-rod calls issued for one rod intent.
pub const MAX_ROD_STEPS: u32 = 50;

type InFlightKey = (TargetScope, ControlKind);

pub struct ControlOrchestrator {
    service: Arc<dyn ReactorService>,
    fleet: Arc<RwLock<FleetState>>,
    fleet_coolant_target: Mutex<CoolantState>,
    in_flight: StdMutex<HashSet<InFlightKey>>,
    events: broadcast::Sender<FleetEvent>,
}

impl ControlOrchestrator {
    pub fn new(
        service: Arc<dyn ReactorService>,
        fleet: Arc<RwLock<FleetState>>,
        events: broadcast::Sender<FleetEvent>,
    ) -> Self {
        Self {
            service,
            fleet,
            fleet_coolant_target: Mutex::new(CoolantState::On),
            in_flight: StdMutex::new(HashSet::new()),
            events,
        }
    }

    /// Coolant state the next fleet-wide toggle will request.
    pub async fn fleet_coolant_target(&self) -> CoolantState {
        *self.fleet_coolant_target.lock().await
    }

    /// Runs `intent` to completion and returns one result per issued call or
    /// local denial. Never fails fast: every target settles independently.
    pub async fn execute(&self, intent: ControlIntent) -> Vec<ActionResult> {
        let results = match InFlight::acquire(&self.in_flight, &intent) {
            Some(_in_flight) => match &intent.scope {
                TargetScope::Reactor(id) => self.execute_single(id, intent.kind, intent.steps).await,
                TargetScope::Fleet => self.execute_fleet(intent.kind, intent.steps).await,
            },
            None => vec![ActionResult::denied(
                scope_target(&intent.scope),
                intent.kind,
                format!("{} is already in progress", intent.kind.label()),
            )],
        };

        let failures = results.iter().filter(|result| !result.is_success()).count();
        info!(
            kind = intent.kind.label(),
            fleet = matches!(intent.scope, TargetScope::Fleet),
            results = results.len(),
            failures,
            "control intent settled"
        );
        let _ = self.events.send(FleetEvent::ActionResults(results.clone()));
        results
    }

    pub async fn rename_plant(&self, name: &str) -> Result<(), ClientError> {
        let name = validated_name(name)?;
        self.service.set_plant_name(name).await?;
        info!(name, "plant renamed");
        Ok(())
    }

    pub async fn rename_reactor(&self, id: &ReactorId, name: &str) -> Result<(), ClientError> {
        let name = validated_name(name)?;
        self.service.set_reactor_name(id, name).await?;
        info!(reactor_id = %id, name, "reactor renamed");
        Ok(())
    }

    pub async fn reset_plant(&self) -> Result<(), ClientError> {
        self.service.reset_plant().await?;
        *self.fleet_coolant_target.lock().await = CoolantState::On;
        info!("plant reset requested");
        Ok(())
    }

    async fn execute_single(
        &self,
        id: &ReactorId,
        kind: ControlKind,
        steps: Option<u32>,
    ) -> Vec<ActionResult> {
        let snapshot = self.fleet.read().await.get(id).cloned();
        self.apply(id, snapshot.as_ref(), kind, steps).await
    }

    async fn execute_fleet(&self, kind: ControlKind, steps: Option<u32>) -> Vec<ActionResult> {
        let fleet = self.fleet.read().await.clone();

        if kind == ControlKind::ToggleCoolant {
            let target = *self.fleet_coolant_target.lock().await;
            let calls = fleet
                .reactors
                .iter()
                .filter(|snapshot| coolant_eligible(snapshot, target))
                .map(|snapshot| self.call(&snapshot.id, kind, Operation::SetCoolant(target)));
            let results = join_all(calls).await;
            *self.fleet_coolant_target.lock().await = target.toggled();
            debug!(requested = %target, next = %target.toggled(), "fleet coolant target flipped");
            return results;
        }

        let targets: Vec<&ReactorSnapshot> = fleet
            .reactors
            .iter()
            .filter(|snapshot| fleet_eligible(kind, snapshot))
            .collect();
        debug!(
            kind = kind.label(),
            eligible = targets.len(),
            total = fleet.reactors.len(),
            "dispatching fleet-wide intent"
        );
        join_all(
            targets
                .into_iter()
                .map(|snapshot| self.apply(&snapshot.id, Some(snapshot), kind, steps)),
        )
        .await
        .into_iter()
        .flatten()
        .collect()
    }

    async fn apply(
        &self,
        id: &ReactorId,
        snapshot: Option<&ReactorSnapshot>,
        kind: ControlKind,
        steps: Option<u32>,
    ) -> Vec<ActionResult> {
        match kind {
            ControlKind::ControlledShutdown => {
                vec![self.call(id, kind, Operation::ControlledShutdown).await]
            }
            ControlKind::EmergencyShutdown => {
                vec![self.call(id, kind, Operation::EmergencyShutdown).await]
            }
            ControlKind::StartReactor => match snapshot.and_then(power_on_denial) {
                Some(message) => vec![ActionResult::denied(Some(id.clone()), kind, message)],
                None => vec![self.call(id, kind, Operation::StartReactor).await],
            },
            ControlKind::ToggleCoolant => match snapshot {
                Some(snapshot) => {
                    let target = snapshot.coolant.toggled();
                    vec![self.call(id, kind, Operation::SetCoolant(target)).await]
                }
                None => vec![ActionResult::denied(
                    Some(id.clone()),
                    kind,
                    format!("Cannot toggle coolant: no telemetry for reactor {id} yet."),
                )],
            },
            ControlKind::Refuel => self.refuel(id).await,
            ControlKind::RaiseRods | ControlKind::DropRods => {
                self.move_rods(id, snapshot, kind, steps).await
            }
        }
    }

    /// Maintenance then refuel, strictly in order. The refuel call is issued
    /// even if the maintenance call failed; both outcomes are reported.
    async fn refuel(&self, id: &ReactorId) -> Vec<ActionResult> {
        let maintenance = self
            .call(id, ControlKind::Refuel, Operation::Maintenance)
            .await;
        let refuel = self.call(id, ControlKind::Refuel, Operation::Refuel).await;
        vec![maintenance, refuel]
    }

    /// Moves rods one call at a time, at most [`MAX_ROD_STEPS`] calls, with
    /// one result per issued call.
    ///
    /// A failed step is reported and stepping continues. Without an explicit
    /// step count the cached number of movable rods is used.
    async fn move_rods(
        &self,
        id: &ReactorId,
        snapshot: Option<&ReactorSnapshot>,
        kind: ControlKind,
        steps: Option<u32>,
    ) -> Vec<ActionResult> {
        let Some(snapshot) = snapshot else {
            return vec![ActionResult::denied(
                Some(id.clone()),
                kind,
                format!("Cannot raise or drop rods: no telemetry for reactor {id} yet."),
            )];
        };
        if !snapshot.state.is_active() {
            return vec![ActionResult::denied(
                Some(id.clone()),
                kind,
                format!(
                    "Cannot raise or drop rods when the reactor is at the {} state.",
                    snapshot.state
                ),
            )];
        }

        let (operation, movable, direction) = match kind {
            ControlKind::DropRods => (Operation::DropRod, snapshot.control_rods.withdrawn, "drop"),
            _ => (Operation::RaiseRod, snapshot.control_rods.inserted, "raise"),
        };
        let mut remaining = steps.unwrap_or(movable);
        if remaining == 0 {
            return vec![ActionResult::denied(
                Some(id.clone()),
                kind,
                format!("No control rods left to {direction}."),
            )];
        }

        let mut results = Vec::new();
        for _ in 0..MAX_ROD_STEPS {
            if remaining == 0 {
                break;
            }
            results.push(self.call(id, kind, operation).await);
            remaining -= 1;
        }

        debug!(
            reactor_id = %id,
            %operation,
            issued = results.len(),
            failed = results.iter().filter(|result| !result.is_success()).count(),
            "rod stepping finished"
        );
        results
    }

    async fn call(&self, id: &ReactorId, kind: ControlKind, operation: Operation) -> ActionResult {
        let outcome = self.service.perform(id, operation).await;
        match &outcome {
            Ok(()) => debug!(reactor_id = %id, %operation, "reactor operation accepted"),
            Err(err) => warn!(reactor_id = %id, %operation, %err, "reactor operation failed"),
        }
        ActionResult::issued(id.clone(), kind, operation, outcome)
    }
}

/// Marks an intent as running for as long as it is held.
struct InFlight<'a> {
    registry: &'a StdMutex<HashSet<InFlightKey>>,
    key: InFlightKey,
}

impl<'a> InFlight<'a> {
    fn acquire(registry: &'a StdMutex<HashSet<InFlightKey>>, intent: &ControlIntent) -> Option<Self> {
        let key = (intent.scope.clone(), intent.kind);
        let inserted = registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone());
        inserted.then_some(Self { registry, key })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

fn scope_target(scope: &TargetScope) -> Option<ReactorId> {
    match scope {
        TargetScope::Reactor(id) => Some(id.clone()),
        TargetScope::Fleet => None,
    }
}

fn fleet_eligible(kind: ControlKind, snapshot: &ReactorSnapshot) -> bool {
    match kind {
        ControlKind::ControlledShutdown | ControlKind::EmergencyShutdown => {
            snapshot.state != ReactorState::EmergencyShutdown
        }
        ControlKind::StartReactor => snapshot.state == ReactorState::Offline,
        ControlKind::ToggleCoolant
        | ControlKind::Refuel
        | ControlKind::RaiseRods
        | ControlKind::DropRods => true,
    }
}

fn coolant_eligible(snapshot: &ReactorSnapshot, target: CoolantState) -> bool {
    snapshot.coolant != target
        && !matches!(
            snapshot.state,
            ReactorState::Offline | ReactorState::Maintenance | ReactorState::EmergencyShutdown
        )
}

fn power_on_denial(snapshot: &ReactorSnapshot) -> Option<String> {
    (snapshot.state == ReactorState::Offline && snapshot.fuel_level <= 0.0).then(|| {
        format!(
            "Reactor {} has no fuel left; refuel first before starting it.",
            snapshot.name
        )
    })
}

fn validated_name(name: &str) -> Result<&str, ClientError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ClientError::validation("name must not be empty"));
    }
    Ok(trimmed)
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
