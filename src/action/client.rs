// action/client.rs
// Generic action client: one goal per session, four timeouts, events delivered in order.

use log::{debug, info, warn};
use std::future::pending;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::{sleep_until, Instant};

use super::{Action, ActionState, ActionTimeouts, ActionTransport, ServerEvent, TransportError};

/// Lifecycle of an action session. `Finished` is terminal; sessions are never retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Not started
    Disconnected,
    /// Transport open, waiting for the server
    Connecting,
    /// Ready for a goal
    Connected,
    /// Goal handed to the server, waiting for it to go active
    Pending,
    /// The server is working on the goal
    Active,
    /// Ended with this outcome
    Finished(ActionState),
}

/// Events the client hands to the dispatch loop
#[derive(Debug)]
pub enum ActionEvent<A: Action> {
    /// The server is reachable. May repeat.
    Connected,
    /// Progress on the active goal
    Feedback(A::Feedback),
    /// Terminal. Timeouts carry no result.
    Result(ActionState, Option<A::Result>),
}

#[derive(Clone, Copy, Debug, Default)]
struct Timers {
    connect: Option<Instant>,
    active: Option<Instant>,
    response: Option<Instant>,
    deadline: Option<Instant>,
}

impl Timers {
    fn armed(&self) -> [(Option<Instant>, ActionState); 4] {
        [
            (self.connect, ActionState::TimeoutOnConnect),
            (self.active, ActionState::TimeoutOnActive),
            (self.response, ActionState::TimeoutOnResponse),
            (self.deadline, ActionState::TimeoutOnDeadline),
        ]
    }

    /// Earliest armed expiry
    fn next(&self) -> Option<Instant> {
        self.armed().iter().filter_map(|(at, _)| *at).min()
    }

    /// The timeout that fired first, if any fired by `now`
    fn expired(&self, now: Instant) -> Option<ActionState> {
        self.armed()
            .iter()
            .filter_map(|(at, state)| at.filter(|at| *at <= now).map(|at| (at, *state)))
            .min_by_key(|(at, _)| *at)
            .map(|(_, state)| state)
    }
}

type ConnectedHook = Box<dyn FnMut()>;
type FeedbackHook<A> = Box<dyn FnMut(&<A as Action>::Feedback)>;
type ResultHook<A> = Box<dyn FnMut(ActionState, Option<&<A as Action>::Result>)>;

/// Client side of one action session
pub struct ActionClient<A: Action> {
    transport: Box<dyn ActionTransport<A>>,
    timeouts: ActionTimeouts,
    state: SessionState,
    connected: bool,
    timers: Timers,
    events: Option<UnboundedReceiver<ServerEvent<A>>>,
    on_connected: Option<ConnectedHook>,
    on_feedback: Option<FeedbackHook<A>>,
    on_result: Option<ResultHook<A>>,
}

impl<A: Action> ActionClient<A> {
    /// Creates a disconnected client with default timeouts
    pub fn new(transport: impl ActionTransport<A> + 'static) -> Self {
        ActionClient {
            transport: Box::new(transport),
            timeouts: ActionTimeouts::default(),
            state: SessionState::Disconnected,
            connected: false,
            timers: Timers::default(),
            events: None,
            on_connected: None,
            on_feedback: None,
            on_result: None,
        }
    }

    /// Sets the session timeouts. A zero deadline disables the deadline.
    pub fn configure(&mut self, timeouts: ActionTimeouts) -> &mut Self {
        self.timeouts = ActionTimeouts {
            deadline: timeouts.deadline.filter(|deadline| !deadline.is_zero()),
            ..timeouts
        };
        self
    }

    /// Replaces the connected hook
    pub fn on_connected(&mut self, hook: impl FnMut() + 'static) -> &mut Self {
        self.on_connected = Some(Box::new(hook));
        self
    }

    /// Replaces the feedback hook
    pub fn on_feedback(&mut self, hook: impl FnMut(&A::Feedback) + 'static) -> &mut Self {
        self.on_feedback = Some(Box::new(hook));
        self
    }

    /// Replaces the result hook
    pub fn on_result(
        &mut self,
        hook: impl FnMut(ActionState, Option<&A::Result>) + 'static,
    ) -> &mut Self {
        self.on_result = Some(Box::new(hook));
        self
    }

    /// Opens the transport and arms the connect timeout
    pub fn start(&mut self) -> Result<(), TransportError> {
        let (sink, events) = mpsc::unbounded_channel();
        self.transport.open(sink)?;
        self.events = Some(events);
        self.state = SessionState::Connecting;
        self.timers.connect = Some(Instant::now() + self.timeouts.connect);
        debug!("{}: connecting", A::NAME);
        Ok(())
    }

    /// True once the handshake completed. Never reverts.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Where the session is in its lifecycle
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Sends a goal. True if the server took it; completion is reported later.
    pub fn submit(&mut self, goal: &A::Goal) -> bool {
        if self.state != SessionState::Connected {
            warn!("{}: cannot send a goal in state {:?}", A::NAME, self.state);
            return false;
        }
        if !self.transport.send_goal(goal) {
            warn!("{}: server did not take the goal", A::NAME);
            return false;
        }
        let now = Instant::now();
        self.state = SessionState::Pending;
        self.timers.active = Some(now + self.timeouts.active);
        self.timers.deadline = self.timeouts.deadline.map(|deadline| now + deadline);
        debug!("{}: goal sent {:?}", A::NAME, goal);
        true
    }

    /// Waits for the next event worth handing to the caller
    pub async fn next_event(&mut self) -> ActionEvent<A> {
        loop {
            let wake = self.timers.next();
            let inbound = match self.events.as_mut() {
                Some(events) => tokio::select! {
                    event = events.recv() => Some(event),
                    _ = wait_until(wake) => None,
                },
                None => {
                    wait_until(wake).await;
                    None
                }
            };
            let event = match inbound {
                Some(Some(event)) => self.handle(event),
                Some(None) => {
                    warn!("{}: transport closed its channel", A::NAME);
                    self.events = None;
                    None
                }
                None => self.expire(Instant::now()),
            };
            if let Some(event) = event {
                return event;
            }
        }
    }

    fn handle(&mut self, event: ServerEvent<A>) -> Option<ActionEvent<A>> {
        if let SessionState::Finished(state) = self.state {
            debug!("{}: ignoring {:?} after {}", A::NAME, event, state);
            return None;
        }
        match event {
            ServerEvent::Connected => {
                self.connected = true;
                self.timers.connect = None;
                if self.state == SessionState::Connecting {
                    self.state = SessionState::Connected;
                    info!("{}: connected", A::NAME);
                }
                if let Some(hook) = self.on_connected.as_mut() {
                    hook();
                }
                Some(ActionEvent::Connected)
            }
            ServerEvent::Active => {
                if self.state == SessionState::Pending {
                    self.state = SessionState::Active;
                    self.timers.active = None;
                    self.timers.response = Some(Instant::now() + self.timeouts.response);
                    debug!("{}: goal active", A::NAME);
                }
                None
            }
            ServerEvent::Feedback(feedback) => {
                if self.state != SessionState::Active {
                    debug!("{}: dropping feedback in state {:?}", A::NAME, self.state);
                    return None;
                }
                self.timers.response = Some(Instant::now() + self.timeouts.response);
                if let Some(hook) = self.on_feedback.as_mut() {
                    hook(&feedback);
                }
                Some(ActionEvent::Feedback(feedback))
            }
            ServerEvent::Result(status, result) => match self.state {
                SessionState::Pending | SessionState::Active => {
                    Some(self.finish(status.into(), Some(result)))
                }
                _ => {
                    warn!("{}: unsolicited result in state {:?}", A::NAME, self.state);
                    None
                }
            },
        }
    }

    fn expire(&mut self, now: Instant) -> Option<ActionEvent<A>> {
        let state = self.timers.expired(now)?;
        Some(self.finish(state, None))
    }

    fn finish(&mut self, state: ActionState, result: Option<A::Result>) -> ActionEvent<A> {
        self.timers = Timers::default();
        self.state = SessionState::Finished(state);
        if state.is_timeout() {
            warn!("{}: {}", A::NAME, state);
        } else {
            info!("{}: finished with {}", A::NAME, state);
        }
        if let Some(hook) = self.on_result.as_mut() {
            hook(state, result.as_ref());
        }
        ActionEvent::Result(state, result)
    }
}

async fn wait_until(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => pending().await,
    }
}
