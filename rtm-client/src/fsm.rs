//! Connection state machine: states, inputs, the transition table and the
//! reconnect backoff. Side effects live in the client.

use std::fmt;
use std::time::Duration;

use rand::Rng as _;

/// Connection lifecycle state of a [`Client`](crate::Client).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Stopped,
    Connecting,
    Connected,
    Awaiting,
}

impl State {
    pub fn as_str(self) -> &'static str {
        match self {
            State::Stopped => "stopped",
            State::Connecting => "connecting",
            State::Connected => "connected",
            State::Awaiting => "awaiting",
        }
    }

    /// Name of the event fired when this state is entered.
    pub fn enter_event(self) -> &'static str {
        match self {
            State::Stopped => "enter-stopped",
            State::Connecting => "enter-connecting",
            State::Connected => "enter-connected",
            State::Awaiting => "enter-awaiting",
        }
    }

    /// Name of the event fired when this state is left.
    pub fn leave_event(self) -> &'static str {
        match self {
            State::Stopped => "leave-stopped",
            State::Connecting => "leave-connecting",
            State::Connected => "leave-connected",
            State::Awaiting => "leave-awaiting",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Input {
    Start,
    Stop,
    /// Transport opened.
    Open,
    /// Connection usable (authenticated, or no auth configured).
    Ready,
    Close,
    Error,
    /// Backoff timer elapsed.
    Reconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Enter(State),
    /// Stay in `connecting` and run the auth provider, if any.
    Authenticate,
    Ignore,
    /// Usage error: `start` while running or `stop` while stopped.
    Reject,
}

pub(crate) fn transition(state: State, input: Input) -> Step {
    use State::*;
    match (state, input) {
        (Stopped, Input::Start) => Step::Enter(Connecting),
        (_, Input::Start) => Step::Reject,
        (Stopped, Input::Stop) => Step::Reject,
        (_, Input::Stop) => Step::Enter(Stopped),
        (Connecting, Input::Open) => Step::Authenticate,
        (Connecting, Input::Ready) => Step::Enter(Connected),
        (Connecting | Connected, Input::Close | Input::Error) => Step::Enter(Awaiting),
        (Awaiting, Input::Reconnect) => Step::Enter(Connecting),
        _ => Step::Ignore,
    }
}

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// `min(max, jitter + min * 2^min(attempts, 30))`.
pub(crate) fn reconnect_interval(
    attempts: u32,
    min: Duration,
    max: Duration,
    jitter: Duration,
) -> Duration {
    let exp = attempts.min(30);
    jitter
        .saturating_add(min.saturating_mul(1u32 << exp))
        .min(max)
}

/// Uniform in `[0, min)`.
pub(crate) fn random_jitter(min: Duration) -> Duration {
    if min.is_zero() {
        return Duration::ZERO;
    }
    rand::thread_rng().gen_range(Duration::ZERO..min)
}
