//! End-to-end lifecycle scenarios: command routing, attendance, timers, and
//! persistence across a simulated restart.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use muster_commands::{CommandRouter, FixedFormatParser};
use muster_contract::{
    BotCredentials, ChatTransport, DateTimeParser, Event, InboundKind, InboundMessage,
    InteractiveAction, Message, PersistenceGateway, PrivateExchange,
};
use muster_registry::TenantRegistry;
use muster_scheduler::{ManualScheduler, Scheduler};
use muster_session::{EventSession, REMINDER_LEAD_MS, REMINDER_TEXT};
use muster_store::{JsonFileStore, MemoryStore};
use muster_template::ATTENDANCE_CALLBACK_ID;

const CREATOR: &str = "UCREATOR1";
const FRIEND: &str = "UFRIEND01";
const CHANNEL: &str = "CGENERAL1";

// 2026-03-03T15:04:00Z
const START_MS: u64 = 1_772_550_240_000;

#[derive(Default)]
struct RecordingTransport {
    sent: Arc<Mutex<Vec<(String, Message)>>>,
}

struct RecordingExchange {
    target: String,
    sent: Arc<Mutex<Vec<(String, Message)>>>,
}

#[async_trait]
impl PrivateExchange for RecordingExchange {
    async fn say(&self, message: &Message) -> Result<()> {
        self.sent
            .lock()
            .expect("sent lock")
            .push((self.target.clone(), message.clone()));
        Ok(())
    }
}

impl RecordingTransport {
    fn texts_for(&self, target: &str) -> Vec<String> {
        self.sent
            .lock()
            .expect("sent lock")
            .iter()
            .filter(|(recipient, _)| recipient == target)
            .map(|(_, message)| message.text.clone())
            .collect()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn reply(&self, context: &InboundMessage, message: &Message) -> Result<()> {
        self.sent
            .lock()
            .expect("sent lock")
            .push((format!("reply:{}", context.channel_id), message.clone()));
        Ok(())
    }

    async fn send_to_user(&self, user_id: &str, message: &Message) -> Result<()> {
        self.sent
            .lock()
            .expect("sent lock")
            .push((format!("user:{user_id}"), message.clone()));
        Ok(())
    }

    async fn send_to_channel(&self, channel_id: &str, message: &Message) -> Result<()> {
        self.sent
            .lock()
            .expect("sent lock")
            .push((format!("channel:{channel_id}"), message.clone()));
        Ok(())
    }

    async fn start_private_exchange(&self, user_id: &str) -> Result<Box<dyn PrivateExchange>> {
        Ok(Box::new(RecordingExchange {
            target: format!("dm:{user_id}"),
            sent: Arc::clone(&self.sent),
        }))
    }
}

struct Tenant {
    credential: String,
    session: Arc<EventSession>,
    scheduler: Arc<ManualScheduler>,
    transport: Arc<RecordingTransport>,
}

fn register_tenant(
    registry: &Arc<TenantRegistry>,
    store: Arc<dyn PersistenceGateway>,
    tenant_id: &str,
    bot_user: &str,
) -> Tenant {
    let credential = format!("xoxb-{tenant_id}");
    let scheduler = Arc::new(ManualScheduler::new());
    let transport = Arc::new(RecordingTransport::default());
    let session = EventSession::new(
        tenant_id,
        BotCredentials {
            token: credential.clone(),
            user_id: bot_user.to_string(),
            created_by: CREATOR.to_string(),
        },
        Arc::clone(&scheduler) as Arc<dyn Scheduler>,
        store,
        Arc::clone(&transport) as Arc<dyn ChatTransport>,
    );
    session.rehydrate();
    registry.register(
        tenant_id,
        &credential,
        Arc::clone(&transport) as Arc<dyn ChatTransport>,
        Arc::clone(&session),
    );
    Tenant {
        credential,
        session,
        scheduler,
        transport,
    }
}

fn router(registry: &Arc<TenantRegistry>) -> CommandRouter {
    CommandRouter::new(
        Arc::clone(registry),
        Arc::new(FixedFormatParser) as Arc<dyn DateTimeParser>,
    )
}

fn mention_message(user_id: &str, text: &str) -> InboundMessage {
    InboundMessage {
        kind: InboundKind::DirectMention,
        user_id: user_id.to_string(),
        channel_id: CHANNEL.to_string(),
        text: text.to_string(),
    }
}

fn draft(name: &str) -> Event {
    Event {
        name: name.to_string(),
        venue: "Room 1".to_string(),
        start_unix_ms: START_MS,
        attendees: Vec::new(),
        creator: CREATOR.to_string(),
    }
}

#[tokio::test]
async fn full_event_lifecycle_through_commands_and_timers() {
    let registry = Arc::new(TenantRegistry::new());
    let store = Arc::new(MemoryStore::new());
    let tenant = register_tenant(
        &registry,
        Arc::clone(&store) as Arc<dyn PersistenceGateway>,
        "T0000001",
        "BMUSTER01",
    );
    let router = router(&registry);

    tenant.session.create(draft("Standup")).expect("create");
    assert!(tenant.session.is_scheduled());
    assert_eq!(tenant.session.snapshot().attendees, vec![CREATOR]);

    // A friend accepts via the invitation's attendance button.
    router
        .handle_interactive(
            &tenant.credential,
            &InteractiveAction {
                callback_id: ATTENDANCE_CALLBACK_ID.to_string(),
                value: "attending".to_string(),
                user_id: FRIEND.to_string(),
                channel_id: CHANNEL.to_string(),
            },
        )
        .await
        .expect("attending");
    assert_eq!(tenant.session.snapshot().attendees, vec![CREATOR, FRIEND]);

    // Five minutes out, every current attendee gets a direct reminder.
    tenant.scheduler.fire_due(START_MS - REMINDER_LEAD_MS).await;
    for attendee in [CREATOR, FRIEND] {
        let reminders = tenant.transport.texts_for(&format!("dm:{attendee}"));
        assert!(reminders.iter().any(|text| text == REMINDER_TEXT));
    }

    // At start time the finalizer resets the session back to unscheduled.
    tenant.scheduler.fire_due(START_MS).await;
    assert!(!tenant.session.is_scheduled());
    assert!(tenant.session.snapshot().attendees.is_empty());
    assert_eq!(tenant.scheduler.pending_len(), 0);

    // A fresh create is legal again after close-out.
    tenant.session.create(draft("Retro")).expect("create again");
    assert_eq!(tenant.session.snapshot().name, "Retro");
}

#[tokio::test]
async fn tenants_are_fully_independent() {
    let registry = Arc::new(TenantRegistry::new());
    let store = Arc::new(MemoryStore::new());
    let first = register_tenant(
        &registry,
        Arc::clone(&store) as Arc<dyn PersistenceGateway>,
        "T0000001",
        "BMUSTER01",
    );
    let second = register_tenant(
        &registry,
        Arc::clone(&store) as Arc<dyn PersistenceGateway>,
        "T0000002",
        "BMUSTER02",
    );
    let router = router(&registry);

    first.session.create(draft("Standup")).expect("create");
    router
        .handle_message(&second.credential, &mention_message(CREATOR, "upcoming"))
        .await
        .expect("upcoming");

    // The second tenant still has nothing scheduled and its own bot mention
    // in the hint.
    let replies = second.transport.texts_for(&format!("reply:{CHANNEL}"));
    assert_eq!(
        replies,
        vec![
            "Nothing's been scheduled yet. To schedule an event, say `<@BMUSTER02> create`."
                .to_string()
        ]
    );
    assert!(!second.session.is_scheduled());
    assert_eq!(second.scheduler.pending_len(), 0);
    assert_eq!(first.scheduler.pending_len(), 2);
}

#[tokio::test]
async fn state_survives_a_restart_via_the_json_store() {
    let state_dir = tempfile::tempdir().expect("tempdir");
    let registry = Arc::new(TenantRegistry::new());
    let store = Arc::new(JsonFileStore::new(state_dir.path()));
    let tenant = register_tenant(
        &registry,
        Arc::clone(&store) as Arc<dyn PersistenceGateway>,
        "T0000001",
        "BMUSTER01",
    );
    tenant.session.create(draft("Standup")).expect("create");
    tenant.session.add_attendee(FRIEND);

    // Simulated restart: a new registry, session, and scheduler over the
    // same store directory.
    let revived_registry = Arc::new(TenantRegistry::new());
    let revived_store = Arc::new(JsonFileStore::new(state_dir.path()));
    let revived = register_tenant(
        &revived_registry,
        revived_store as Arc<dyn PersistenceGateway>,
        "T0000001",
        "BMUSTER01",
    );

    assert!(revived.session.is_scheduled());
    assert_eq!(revived.session.snapshot().attendees, vec![CREATOR, FRIEND]);
    assert_eq!(
        revived.scheduler.pending_times(),
        vec![START_MS - REMINDER_LEAD_MS, START_MS]
    );
}

#[tokio::test]
async fn rsvp_commands_round_trip_through_the_router() {
    let registry = Arc::new(TenantRegistry::new());
    let store = Arc::new(MemoryStore::new());
    let tenant = register_tenant(
        &registry,
        Arc::clone(&store) as Arc<dyn PersistenceGateway>,
        "T0000001",
        "BMUSTER01",
    );
    let router = router(&registry);
    tenant.session.create(draft("Standup")).expect("create");

    router
        .handle_message(&tenant.credential, &mention_message(FRIEND, "count me in"))
        .await
        .expect("rsvp yes");
    assert_eq!(tenant.session.snapshot().attendees, vec![CREATOR, FRIEND]);

    router
        .handle_message(&tenant.credential, &mention_message(FRIEND, "count me out"))
        .await
        .expect("rsvp no");
    assert_eq!(tenant.session.snapshot().attendees, vec![CREATOR]);

    // Idempotent on repeat.
    router
        .handle_message(&tenant.credential, &mention_message(FRIEND, "count me out"))
        .await
        .expect("rsvp no again");
    assert_eq!(tenant.session.snapshot().attendees, vec![CREATOR]);

    // The persisted record tracks every accepted change.
    let record = store.record("T0000001").expect("record");
    assert_eq!(record.active_event.attendees, vec![CREATOR]);
}
