//! Session lifecycle as a pure transition function.
//!
//! [`transition`] maps the current [`SessionMachine`] and one
//! [`SessionInput`] to the next machine and the [`Effect`]s the controller
//! must carry out. It performs no I/O, which keeps every lifecycle rule
//! testable without a network.
//!
//! ```text
//! Idle ─Start─▶ Connecting ─CaptureAcquired─▶ Negotiating ─Connected+ChannelOpen─▶ Open
//!                                                                   Open ◀─▶ Degraded
//!                                              Open/Degraded ─Health(Failed)─▶ Failed
//! Failed ─RetryFired─▶ Connecting            any ─Stop/RemoteClosed─▶ Closing ─▶ Closed
//! ```

use std::time::Duration;

use super::base::{HealthSignal, RetryPolicy, SessionError, SessionStatus};

/// Everything the transition function needs to know about a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionMachine {
    pub status: SessionStatus,
    /// Retries used within the current logical connect
    pub retries: u32,
    pub max_retries: u32,
    /// An in-place restart was already tried since the last `Open`
    pub restart_attempted: bool,
    /// `ReportTerminal` was emitted for the current logical connect
    pub terminal_reported: bool,
    transport_connected: bool,
    channel_open: bool,
    restarting: bool,
    retry_pending: bool,
    start_pending: bool,
    retry_delay: Duration,
    settle_delay: Duration,
    restart_timeout: Duration,
}

impl SessionMachine {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            status: SessionStatus::Idle,
            retries: 0,
            max_retries: policy.max_retries,
            restart_attempted: false,
            terminal_reported: false,
            transport_connected: false,
            channel_open: false,
            restarting: false,
            retry_pending: false,
            start_pending: false,
            retry_delay: policy.retry_delay(),
            settle_delay: policy.settle_delay(),
            restart_timeout: policy.restart_timeout(),
        }
    }

    fn set_status(&mut self, status: SessionStatus, effects: &mut Vec<Effect>) {
        if self.status != status {
            self.status = status;
            effects.push(Effect::ReportStatus(status));
        }
    }

    fn reset_attempt_flags(&mut self) {
        self.transport_connected = false;
        self.channel_open = false;
        self.restarting = false;
        self.restart_attempted = false;
        self.retry_pending = false;
    }

    fn begin_connect(&mut self, effects: &mut Vec<Effect>) {
        self.reset_attempt_flags();
        self.set_status(SessionStatus::Connecting, effects);
        effects.push(Effect::BeginConnect);
    }

    fn maybe_open(&mut self, effects: &mut Vec<Effect>) {
        if self.transport_connected && self.channel_open {
            self.restart_attempted = false;
            self.set_status(SessionStatus::Open, effects);
            effects.push(Effect::SendSessionConfig);
        }
    }

    fn close(&mut self, effects: &mut Vec<Effect>) {
        self.retry_pending = false;
        self.restarting = false;
        self.set_status(SessionStatus::Closing, effects);
        effects.push(Effect::Teardown);
    }

    /// The current attempt is dead: retry or give up.
    fn fail_attempt(&mut self, effects: &mut Vec<Effect>) {
        self.restarting = false;
        self.transport_connected = false;
        self.channel_open = false;

        if self.retries < self.max_retries {
            self.retries += 1;
            self.retry_pending = true;
            self.set_status(SessionStatus::Failed, effects);
            effects.push(Effect::ReleaseResources);
            effects.push(Effect::ScheduleRetry {
                attempt: self.retries,
                delay: self.retry_delay,
            });
        } else {
            self.start_pending = false;
            self.close(effects);
            if !self.terminal_reported {
                self.terminal_reported = true;
                effects.push(Effect::ReportTerminal(SessionError::RetriesExhausted {
                    attempts: self.retries,
                }));
            }
        }
    }
}

/// Something that happened to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    /// Explicit user start
    Start,
    CaptureAcquired,
    CaptureDenied,
    Health(HealthSignal),
    /// The event channel reported open
    ChannelOpen,
    /// Transport did not report connected in time
    ConnectTimeout,
    NegotiationFailed,
    /// In-place restart did not recover in time
    RestartTimeout,
    RetryFired,
    /// Explicit user stop
    Stop,
    RemoteClosed,
    TeardownComplete,
}

/// Side effect requested by a transition, executed in order by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    ReportStatus(SessionStatus),
    /// Close the transport, release capture, then feed `TeardownComplete`
    Teardown,
    /// Close the transport and release capture of a failed attempt
    ReleaseResources,
    /// Wait, then feed `Start`
    Settle { delay: Duration },
    /// Acquire local capture, then feed `CaptureAcquired` or `CaptureDenied`
    BeginConnect,
    /// Negotiate the transport and arm the connect timer
    BeginNegotiation,
    SendSessionConfig,
    RestartTransport,
    ArmRestartTimer { delay: Duration },
    /// Wait, then feed `RetryFired`
    ScheduleRetry { attempt: u32, delay: Duration },
    ReportTerminal(SessionError),
}

/// Compute the next machine and its effects. Inputs that do not apply to the
/// current status leave the machine unchanged and produce no effects.
pub fn transition(machine: &SessionMachine, input: SessionInput) -> (SessionMachine, Vec<Effect>) {
    use SessionInput as In;
    use SessionStatus as S;

    let mut next = machine.clone();
    let mut effects = Vec::new();

    match (machine.status, input) {
        (S::Idle | S::Closed, In::Start) => {
            next.retries = 0;
            next.terminal_reported = false;
            next.start_pending = false;
            next.begin_connect(&mut effects);
        }
        (S::Closing, In::Start) => {
            next.start_pending = true;
        }
        (_, In::Start) => {
            next.start_pending = true;
            next.close(&mut effects);
        }

        (S::Connecting, In::CaptureAcquired) => {
            next.set_status(S::Negotiating, &mut effects);
            effects.push(Effect::BeginNegotiation);
        }
        (S::Connecting, In::CaptureDenied) => next.fail_attempt(&mut effects),

        (S::Negotiating, In::Health(HealthSignal::Connected)) => {
            next.transport_connected = true;
            next.maybe_open(&mut effects);
        }
        (S::Negotiating, In::ChannelOpen) => {
            next.channel_open = true;
            next.maybe_open(&mut effects);
        }
        (S::Negotiating, In::Health(HealthSignal::Failed | HealthSignal::Closed))
        | (S::Negotiating, In::ConnectTimeout)
        | (S::Connecting | S::Negotiating, In::NegotiationFailed) => {
            next.fail_attempt(&mut effects)
        }

        (S::Open, In::Health(HealthSignal::Disconnected)) => {
            next.set_status(S::Degraded, &mut effects);
        }
        (S::Degraded, In::Health(HealthSignal::Connected)) => {
            next.restart_attempted = false;
            next.set_status(S::Open, &mut effects);
        }
        (S::Open | S::Degraded, In::Health(HealthSignal::Failed)) => {
            if machine.restart_attempted {
                next.fail_attempt(&mut effects);
            } else {
                next.restart_attempted = true;
                next.restarting = true;
                next.set_status(S::Failed, &mut effects);
                effects.push(Effect::RestartTransport);
                effects.push(Effect::ArmRestartTimer {
                    delay: machine.restart_timeout,
                });
            }
        }
        (S::Failed, In::Health(HealthSignal::Connected)) if machine.restarting => {
            next.restarting = false;
            next.restart_attempted = false;
            next.set_status(S::Open, &mut effects);
        }
        (S::Failed, In::RestartTimeout | In::Health(HealthSignal::Closed))
            if machine.restarting =>
        {
            next.fail_attempt(&mut effects)
        }
        (S::Failed, In::RetryFired) if machine.retry_pending => {
            next.begin_connect(&mut effects);
        }

        (S::Open | S::Degraded, In::Health(HealthSignal::Closed) | In::RemoteClosed)
        | (S::Negotiating, In::RemoteClosed) => next.close(&mut effects),

        (S::Idle | S::Closing | S::Closed, In::Stop) => {
            next.start_pending = false;
        }
        (_, In::Stop) => {
            next.start_pending = false;
            next.close(&mut effects);
        }

        (S::Closing, In::TeardownComplete) => {
            next.reset_attempt_flags();
            next.set_status(S::Closed, &mut effects);
            if machine.start_pending {
                next.start_pending = false;
                effects.push(Effect::Settle {
                    delay: machine.settle_delay,
                });
            }
        }

        _ => {}
    }

    (next, effects)
}
