//! Per-tenant event session: the state machine at the heart of Muster.
//!
//! Each tenant owns exactly one `EventSession` holding the single active (or
//! absent) event. Every mutation writes through to the persistence gateway
//! and re-derives the reminder/finalizer timer pair from the current start
//! time, so timer state stays consistent across edits without delta tracking.
//! The session is a logical actor: all state sits behind one mutex and
//! command handling serializes against timer fires.

use std::sync::{Arc, Mutex, MutexGuard};

use muster_contract::{
    BotCredentials, ChatTransport, Event, Message, PersistedRecord, PersistenceGateway,
};
use muster_core::MINUTE_MS;
use muster_scheduler::{Scheduler, TimerHandle};
use thiserror::Error;


/// How far ahead of the start time the attendee reminder fires.
pub const REMINDER_LEAD_MS: u64 = 5 * MINUTE_MS;

/// Body text of the reminder sent to each attendee.
pub const REMINDER_TEXT: &str = "Your event is starting in 5 minutes.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
/// User-visible, non-fatal failures of event-session operations.
pub enum EventError {
    #[error("an event is already scheduled; cancel it before creating a new one")]
    AlreadyScheduled,
    #[error("no event is currently scheduled")]
    NotScheduled,
    #[error("only the event's creator can do that")]
    NotAuthorized,
    #[error("an event needs a non-empty name")]
    EmptyName,
}

struct SessionState {
    active_event: Event,
    last_prompt: String,
    reminder_timer: Option<TimerHandle>,
    finalizer_timer: Option<TimerHandle>,
}

/// One tenant's event state machine. Unscheduled is encoded as an empty
/// event name; cancellation resets back to that sentinel rather than moving
/// to a separate state.
pub struct EventSession {
    tenant_id: String,
    credentials: BotCredentials,
    scheduler: Arc<dyn Scheduler>,
    store: Arc<dyn PersistenceGateway>,
    transport: Arc<dyn ChatTransport>,
    state: Mutex<SessionState>,
}

impl EventSession {
    pub fn new(
        tenant_id: impl Into<String>,
        credentials: BotCredentials,
        scheduler: Arc<dyn Scheduler>,
        store: Arc<dyn PersistenceGateway>,
        transport: Arc<dyn ChatTransport>,
    ) -> Arc<Self> {
        Arc::new(Self {
            tenant_id: tenant_id.into(),
            credentials,
            scheduler,
            store,
            transport,
            state: Mutex::new(SessionState {
                active_event: Event::empty(),
                last_prompt: String::new(),
                reminder_timer: None,
                finalizer_timer: None,
            }),
        })
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn credentials(&self) -> &BotCredentials {
        &self.credentials
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().expect("session state mutex poisoned")
    }

    /// Restores this tenant's event from the persistence gateway. A tenant
    /// with no record yet gets a blank one seeded so the store always knows
    /// the bot credentials. Timers are derived when an event comes back.
    pub fn rehydrate(self: &Arc<Self>) {
        match self.store.load(&self.tenant_id) {
            Ok(Some(record)) => {
                let mut state = self.lock_state();
                state.active_event = record.active_event;
                if state.active_event.is_scheduled() {
                    self.derive_timers(&mut state);
                }
            }
            Ok(None) => {
                let state = self.lock_state();
                self.persist(&state);
            }
            Err(error) => {
                tracing::warn!(tenant = %self.tenant_id, error = %error, "failed to load tenant record");
            }
        }
    }

    /// Creates the event. Only legal while nothing is scheduled; the creator
    /// is always seeded into the attendee list. The empty name is reserved as
    /// the unscheduled sentinel and can never name a real event.
    pub fn create(self: &Arc<Self>, mut event: Event) -> Result<(), EventError> {
        let mut state = self.lock_state();
        if state.active_event.is_scheduled() {
            return Err(EventError::AlreadyScheduled);
        }
        if event.name.is_empty() {
            return Err(EventError::EmptyName);
        }
        if !event.has_attendee(&event.creator) {
            event.attendees.insert(0, event.creator.clone());
        }
        state.active_event = event;
        self.persist(&state);
        self.derive_timers(&mut state);
        Ok(())
    }

    /// Renames the event. Rejects the empty string, which would otherwise
    /// flip the session into the unscheduled sentinel with timers still live.
    pub fn rename(self: &Arc<Self>, new_name: &str) -> Result<(), EventError> {
        let mut state = self.scheduled_state()?;
        if new_name.is_empty() {
            return Err(EventError::EmptyName);
        }
        state.active_event.name = new_name.to_string();
        self.persist(&state);
        self.derive_timers(&mut state);
        Ok(())
    }

    pub fn change_venue(self: &Arc<Self>, new_venue: &str) -> Result<(), EventError> {
        let mut state = self.scheduled_state()?;
        state.active_event.venue = new_venue.to_string();
        self.persist(&state);
        self.derive_timers(&mut state);
        Ok(())
    }

    /// Moves the event. Both timers are cancelled and replaced so nothing
    /// ever fires for the old start time.
    pub fn reschedule(self: &Arc<Self>, new_start_unix_ms: u64) -> Result<(), EventError> {
        let mut state = self.scheduled_state()?;
        state.active_event.start_unix_ms = new_start_unix_ms;
        self.persist(&state);
        self.derive_timers(&mut state);
        Ok(())
    }

    /// Adds a user to the attendee list; `false` when already present.
    /// Idempotent by construction, insertion order preserved.
    pub fn add_attendee(self: &Arc<Self>, user_id: &str) -> bool {
        let mut state = self.lock_state();
        if state.active_event.has_attendee(user_id) {
            return false;
        }
        state.active_event.attendees.push(user_id.to_string());
        self.persist(&state);
        // Attendance does not affect timing; re-deriving anyway keeps one
        // code path for every mutation.
        self.derive_timers(&mut state);
        true
    }

    /// Removes a user from the attendee list; `false` when absent.
    pub fn remove_attendee(self: &Arc<Self>, user_id: &str) -> bool {
        let mut state = self.lock_state();
        let Some(position) = state
            .active_event
            .attendees
            .iter()
            .position(|entry| entry == user_id)
        else {
            return false;
        };
        state.active_event.attendees.remove(position);
        self.persist(&state);
        self.derive_timers(&mut state);
        true
    }

    /// Resets to the unscheduled sentinel and clears both timers. Harmless
    /// no-op when nothing is scheduled.
    pub fn cancel(self: &Arc<Self>) {
        let mut state = self.lock_state();
        state.active_event = Event::empty();
        self.persist(&state);
        self.derive_timers(&mut state);
    }

    pub fn is_scheduled(&self) -> bool {
        self.lock_state().active_event.is_scheduled()
    }

    pub fn is_creator(&self, user_id: &str) -> bool {
        self.lock_state().active_event.creator == user_id
    }

    pub fn creator(&self) -> String {
        self.lock_state().active_event.creator.clone()
    }

    pub fn is_attending(&self, user_id: &str) -> bool {
        self.lock_state().active_event.has_attendee(user_id)
    }

    /// Read-only copy of the current event for rendering.
    pub fn snapshot(&self) -> Event {
        self.lock_state().active_event.clone()
    }

    /// Substitutes event placeholders into `text`.
    pub fn render(&self, text: &str) -> String {
        muster_template::render(text, &self.lock_state().active_event)
    }

    /// Builds the event summary display. A non-empty `text` becomes the new
    /// cached prompt; an empty one redisplays the cached prompt (used by the
    /// refresh action).
    pub fn format_summary(&self, text: &str, show_actions: bool) -> Message {
        let mut state = self.lock_state();
        if !text.is_empty() {
            state.last_prompt = text.to_string();
        }
        let body = state.last_prompt.clone();
        muster_template::format_summary(&body, &state.active_event, show_actions)
    }

    /// Builds the numbered attendee list display.
    pub fn format_attendee_list(&self) -> Message {
        muster_template::format_attendee_list(&self.lock_state().active_event)
    }

    fn scheduled_state(&self) -> Result<MutexGuard<'_, SessionState>, EventError> {
        let state = self.lock_state();
        if !state.active_event.is_scheduled() {
            return Err(EventError::NotScheduled);
        }
        Ok(state)
    }

    /// Write-through to the gateway. Fire-and-forget: the in-memory mutation
    /// stays effective even when the save fails; the failure is an
    /// operational fault, not a user error.
    fn persist(&self, state: &SessionState) {
        let record = PersistedRecord {
            id: self.tenant_id.clone(),
            active_event: state.active_event.clone(),
            bot: self.credentials.clone(),
        };
        if let Err(error) = self.store.save(&record) {
            tracing::warn!(tenant = %self.tenant_id, error = %error, "failed to persist tenant record");
        }
    }

    /// Cancel-then-replace derivation of the reminder/finalizer pair from the
    /// current start time. At most one of each is ever live; a start time of
    /// zero means no event to time.
    fn derive_timers(self: &Arc<Self>, state: &mut SessionState) {
        if let Some(handle) = state.reminder_timer.take() {
            self.scheduler.cancel(&handle);
        }
        if let Some(handle) = state.finalizer_timer.take() {
            self.scheduler.cancel(&handle);
        }
        let start_unix_ms = state.active_event.start_unix_ms;
        if start_unix_ms == 0 {
            return;
        }
        tracing::debug!(tenant = %self.tenant_id, start_unix_ms, "deriving event timers");

        let session = Arc::clone(self);
        state.reminder_timer = Some(self.scheduler.schedule(
            start_unix_ms.saturating_sub(REMINDER_LEAD_MS),
            Box::new(move || {
                Box::pin(async move {
                    session.send_reminders().await;
                })
            }),
        ));

        let session = Arc::clone(self);
        state.finalizer_timer = Some(self.scheduler.schedule(
            start_unix_ms,
            Box::new(move || {
                Box::pin(async move {
                    session.cancel();
                })
            }),
        ));
    }

    /// Reminder fire: reads the attendee list live (not a snapshot taken at
    /// schedule time) and opens a private exchange with each attendee.
    /// Delivery failures are logged per attendee and never abort the loop.
    async fn send_reminders(self: &Arc<Self>) {
        let (attendees, message) = {
            let mut state = self.lock_state();
            state.last_prompt = REMINDER_TEXT.to_string();
            let message = muster_template::format_summary(REMINDER_TEXT, &state.active_event, false);
            (state.active_event.attendees.clone(), message)
        };
        for attendee in attendees {
            let outcome = match self.transport.start_private_exchange(&attendee).await {
                Ok(exchange) => exchange.say(&message).await,
                Err(error) => Err(error),
            };
            if let Err(error) = outcome {
                tracing::warn!(tenant = %self.tenant_id, attendee = %attendee, error = %error, "could not notify attendee");
            }
        }
    }
}
