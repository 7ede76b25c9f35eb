use statig::{blocking::IntoStateMachineExt as _, prelude::*};

use super::config::TriggerConfig;
use crate::sample::Sample;

/// Externally visible engine state. `Engaged` is held exactly while the
/// synthetic button is down.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EngineState {
    #[default]
    Idle,
    PulledBack,
    Engaged,
}

impl EngineState {
    pub fn label(self) -> &'static str {
        match self {
            EngineState::Idle => "idle",
            EngineState::PulledBack => "pulled-back",
            EngineState::Engaged => "engaged",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerAction {
    Press,
    Release,
}

impl TriggerAction {
    pub fn label(self) -> &'static str {
        match self {
            TriggerAction::Press => "press",
            TriggerAction::Release => "release",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriggerOutput {
    pub state: EngineState,
    /// Intensity of the observed sample; `None` when it was too short to use.
    pub intensity: Option<f64>,
    pub action: Option<TriggerAction>,
}

#[derive(Clone, Copy, Debug)]
enum TriggerHsmEvent {
    Sample { now_ms: u64, intensity: f64 },
    Disarm,
}

#[derive(Clone, Copy, Debug, Default)]
struct DispatchContext {
    state: Option<EngineState>,
    action: Option<TriggerAction>,
}

impl DispatchContext {
    fn emit(&mut self, action: TriggerAction) {
        debug_assert!(self.action.is_none(), "one action per dispatch");
        self.action = Some(action);
    }

    fn settle(&mut self, state: EngineState) {
        self.state = Some(state);
    }
}

/// Threshold/hysteresis/debounce state machine. Feed it one sample at a time
/// from a single thread; it holds no locks.
pub struct TriggerEngine {
    machine: statig::blocking::StateMachine<TriggerHsm>,
    state: EngineState,
    last_intensity: f64,
}

impl Default for TriggerEngine {
    fn default() -> Self {
        Self::new(TriggerConfig::default())
    }
}

impl TriggerEngine {
    pub fn new(config: TriggerConfig) -> Self {
        Self {
            machine: TriggerHsm::new(config).state_machine(),
            state: EngineState::Idle,
            last_intensity: 0.0,
        }
    }

    pub fn observe(&mut self, now_ms: u64, sample: &Sample) -> TriggerOutput {
        let Some(intensity) = sample.intensity() else {
            return TriggerOutput {
                state: self.state,
                intensity: None,
                action: None,
            };
        };

        self.last_intensity = intensity;
        let action = self.dispatch(TriggerHsmEvent::Sample { now_ms, intensity });
        TriggerOutput {
            state: self.state,
            intensity: Some(intensity),
            action,
        }
    }

    /// Forces the machine out of `Engaged`. Emits `Release` only if the
    /// button was held; calling it again is a no-op.
    pub fn disarm(&mut self) -> TriggerOutput {
        let action = self.dispatch(TriggerHsmEvent::Disarm);
        TriggerOutput {
            state: self.state,
            intensity: None,
            action,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_held(&self) -> bool {
        self.state == EngineState::Engaged
    }

    pub fn last_intensity(&self) -> f64 {
        self.last_intensity
    }

    fn dispatch(&mut self, event: TriggerHsmEvent) -> Option<TriggerAction> {
        let mut context = DispatchContext::default();
        self.machine.handle_with_context(&event, &mut context);
        if let Some(state) = context.state {
            self.state = state;
        }
        context.action
    }
}

struct TriggerHsm {
    config: TriggerConfig,
    last_engage_ms: Option<u64>,
}

impl TriggerHsm {
    fn new(config: TriggerConfig) -> Self {
        Self {
            config,
            last_engage_ms: None,
        }
    }

    fn above_threshold(&self, intensity: f64) -> bool {
        intensity > self.config.threshold()
    }

    fn debounce_elapsed(&self, now_ms: u64) -> bool {
        match self.last_engage_ms {
            None => true,
            Some(last_ms) => now_ms.saturating_sub(last_ms) > self.config.debounce_ms(),
        }
    }

    fn resting_state(&self, intensity: f64) -> EngineState {
        match self.config.pulled_back_level() {
            Some(level) if intensity > level => EngineState::PulledBack,
            _ => EngineState::Idle,
        }
    }

    fn rest(&self, context: &mut DispatchContext, intensity: f64) -> Outcome<State> {
        let state = self.resting_state(intensity);
        context.settle(state);
        match state {
            EngineState::PulledBack => Transition(State::pulled_back()),
            _ => Transition(State::idle()),
        }
    }

    fn arm(
        &mut self,
        context: &mut DispatchContext,
        now_ms: u64,
        intensity: f64,
    ) -> Outcome<State> {
        if self.above_threshold(intensity) && self.debounce_elapsed(now_ms) {
            self.last_engage_ms = Some(now_ms);
            context.emit(TriggerAction::Press);
            context.settle(EngineState::Engaged);
            return Transition(State::engaged());
        }
        self.rest(context, intensity)
    }
}

#[state_machine(initial = "State::idle()")]
impl TriggerHsm {
    #[state]
    fn idle(
        &mut self,
        context: &mut DispatchContext,
        event: &TriggerHsmEvent,
    ) -> Outcome<State> {
        match event {
            TriggerHsmEvent::Sample { now_ms, intensity } => {
                self.arm(context, *now_ms, *intensity)
            }
            TriggerHsmEvent::Disarm => {
                context.settle(EngineState::Idle);
                Handled
            }
        }
    }

    #[state]
    fn pulled_back(
        &mut self,
        context: &mut DispatchContext,
        event: &TriggerHsmEvent,
    ) -> Outcome<State> {
        match event {
            TriggerHsmEvent::Sample { now_ms, intensity } => {
                self.arm(context, *now_ms, *intensity)
            }
            TriggerHsmEvent::Disarm => {
                context.settle(EngineState::PulledBack);
                Handled
            }
        }
    }

    #[state]
    fn engaged(
        &mut self,
        context: &mut DispatchContext,
        event: &TriggerHsmEvent,
    ) -> Outcome<State> {
        match event {
            TriggerHsmEvent::Sample { intensity, .. } => {
                if self.above_threshold(*intensity) {
                    context.settle(EngineState::Engaged);
                    Handled
                } else {
                    context.emit(TriggerAction::Release);
                    self.rest(context, *intensity)
                }
            }
            TriggerHsmEvent::Disarm => {
                context.emit(TriggerAction::Release);
                context.settle(EngineState::Idle);
                Transition(State::idle())
            }
        }
    }
}
