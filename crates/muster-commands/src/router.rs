//! Command routing: resolves the tenant session, applies state and
//! authorization guards, runs conversations, and dispatches interactive
//! button callbacks.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use anyhow::Result;
use muster_contract::{
    ActionConfirm, ActionStyle, Attachment, ChatTransport, DateTimeParser, InboundKind,
    InboundMessage, InteractiveAction, Message, MessageAction,
};
use muster_registry::TenantRegistry;
use muster_session::{EventError, EventSession};
use muster_template::{mention, ATTENDANCE_CALLBACK_ID, SUMMARY_COLOR};

use crate::conversations::{Completion, ConversationOutcome, Flow};
use crate::parse::{classify, CommandKind, EditKind, MentionPatterns};

/// Response-group id for the cancel confirmation buttons.
pub const CANCEL_CALLBACK_ID: &str = "cancel";

/// Single guard applied before every creator-only mutation. The session
/// exposes no bypass; every mutating call site goes through here first.
pub fn ensure_creator(session: &EventSession, actor_id: &str) -> Result<(), EventError> {
    if session.is_creator(actor_id) {
        Ok(())
    } else {
        Err(EventError::NotAuthorized)
    }
}

/// Routes inbound messages and interactive callbacks for all tenants.
pub struct CommandRouter {
    registry: Arc<TenantRegistry>,
    parser: Arc<dyn DateTimeParser>,
    mentions: MentionPatterns,
    conversations: Mutex<HashMap<(String, String), Flow>>,
}

impl CommandRouter {
    pub fn new(registry: Arc<TenantRegistry>, parser: Arc<dyn DateTimeParser>) -> Self {
        Self {
            registry,
            parser,
            mentions: MentionPatterns::new(),
            conversations: Mutex::new(HashMap::new()),
        }
    }

    /// Number of conversations currently collecting input.
    pub fn active_conversations(&self) -> usize {
        self.conversations
            .lock()
            .expect("conversation mutex poisoned")
            .len()
    }

    fn flow_key(credential: &str, user_id: &str) -> (String, String) {
        (credential.to_string(), user_id.to_string())
    }

    fn has_flow(&self, credential: &str, user_id: &str) -> bool {
        self.conversations
            .lock()
            .expect("conversation mutex poisoned")
            .contains_key(&Self::flow_key(credential, user_id))
    }

    fn start_flow(&self, credential: &str, user_id: &str, flow: Flow) {
        self.conversations
            .lock()
            .expect("conversation mutex poisoned")
            .insert(Self::flow_key(credential, user_id), flow);
    }

    fn end_flow(&self, credential: &str, user_id: &str) {
        self.conversations
            .lock()
            .expect("conversation mutex poisoned")
            .remove(&Self::flow_key(credential, user_id));
    }

    /// Handles one inbound chat message for the tenant behind `credential`.
    pub async fn handle_message(&self, credential: &str, message: &InboundMessage) -> Result<()> {
        let session = self.registry.session_for(credential)?;
        let connection = self.registry.connection_for(session.tenant_id())?;

        if message.kind.is_direct_message() && self.has_flow(credential, &message.user_id) {
            return self
                .drive_conversation(credential, &session, connection.as_ref(), message)
                .await;
        }

        match classify(&message.text) {
            CommandKind::Edit(edit) => {
                self.handle_edit(credential, &session, connection.as_ref(), message, edit)
                    .await
            }
            CommandKind::Create => {
                self.handle_create(credential, &session, connection.as_ref(), message)
                    .await
            }
            CommandKind::Invite => {
                self.handle_invite(&session, connection.as_ref(), message)
                    .await
            }
            CommandKind::Cancel => {
                self.handle_cancel(&session, connection.as_ref(), message)
                    .await
            }
            CommandKind::Upcoming => {
                self.handle_upcoming(&session, connection.as_ref(), message)
                    .await
            }
            CommandKind::RsvpNo => {
                self.handle_rsvp(&session, connection.as_ref(), message, false)
                    .await
            }
            CommandKind::RsvpYes => {
                self.handle_rsvp(&session, connection.as_ref(), message, true)
                    .await
            }
            CommandKind::Attendees => {
                self.handle_attendees(&session, connection.as_ref(), message)
                    .await
            }
            CommandKind::Help => {
                connection
                    .reply(message, &help_message(&command_prefix(&session, message.kind)))
                    .await
            }
            CommandKind::Unknown => {
                let prefix = command_prefix(&session, message.kind);
                connection
                    .reply(
                        message,
                        &Message::plain(format!(
                            "Sorry, I didn't understand that. I'm not one of those _smart_ bots. Try say `{prefix}help` to get a list of words I understand."
                        )),
                    )
                    .await
            }
        }
    }

    async fn drive_conversation(
        &self,
        credential: &str,
        session: &Arc<EventSession>,
        connection: &dyn ChatTransport,
        message: &InboundMessage,
    ) -> Result<()> {
        let outcome = {
            let mut flows = self
                .conversations
                .lock()
                .expect("conversation mutex poisoned");
            let Some(flow) = flows.get_mut(&Self::flow_key(credential, &message.user_id)) else {
                return Ok(());
            };
            flow.advance(&message.text, self.parser.as_ref())
        };

        match outcome {
            ConversationOutcome::Prompt(text) => {
                connection.reply(message, &Message::plain(text)).await
            }
            ConversationOutcome::Retry(text) => {
                connection.reply(message, &Message::plain(text)).await
            }
            ConversationOutcome::Abandoned(text) => {
                self.end_flow(credential, &message.user_id);
                connection.reply(message, &Message::plain(text)).await
            }
            ConversationOutcome::Complete(completion) => {
                self.end_flow(credential, &message.user_id);
                self.apply_completion(session, connection, message, completion)
                    .await
            }
        }
    }

    async fn apply_completion(
        &self,
        session: &Arc<EventSession>,
        connection: &dyn ChatTransport,
        message: &InboundMessage,
        completion: Completion,
    ) -> Result<()> {
        let reply = match completion {
            Completion::Create(event) => match session.create(event) {
                Ok(()) => session.format_summary(
                    "Your event has been scheduled.\nTo invite everyone in a channel, say `invite #channel`. To invite specific people, say `invite @username`. You can also see a list of attendees at any time by saying `attendees`.",
                    false,
                ),
                Err(_) => Message::plain(already_scheduled_text(&command_prefix(
                    session,
                    message.kind,
                ))),
            },
            Completion::Rename(new_name) => match session.rename(&new_name) {
                Ok(()) => session.format_summary("Your event has been renamed.", false),
                Err(EventError::EmptyName) => {
                    Message::plain("An event needs a name, so I've left it unchanged.")
                }
                Err(_) => Message::plain(nothing_scheduled_text(&command_prefix(
                    session,
                    message.kind,
                ))),
            },
            Completion::ChangeVenue(new_venue) => match session.change_venue(&new_venue) {
                Ok(()) => session.format_summary("Your event's venue has been changed.", false),
                Err(_) => Message::plain(nothing_scheduled_text(&command_prefix(
                    session,
                    message.kind,
                ))),
            },
            Completion::Reschedule(start_unix_ms) => match session.reschedule(start_unix_ms) {
                Ok(()) => session.format_summary("Your event has been rescheduled.", false),
                Err(_) => Message::plain(nothing_scheduled_text(&command_prefix(
                    session,
                    message.kind,
                ))),
            },
        };
        connection.reply(message, &reply).await
    }

    async fn handle_edit(
        &self,
        credential: &str,
        session: &Arc<EventSession>,
        connection: &dyn ChatTransport,
        message: &InboundMessage,
        edit: Option<EditKind>,
    ) -> Result<()> {
        if !session.is_scheduled() {
            let prefix = command_prefix(session, message.kind);
            return connection
                .reply(message, &Message::plain(nothing_scheduled_text(&prefix)))
                .await;
        }
        if ensure_creator(session, &message.user_id).is_err() {
            return connection
                .reply(
                    message,
                    &Message::plain(session.render(
                        "Sorry, only the event's creator ({creator}) can change the event.",
                    )),
                )
                .await;
        }
        // An edit keyword like "update" without a specific field matched the
        // group but selects nothing; the guards above still ran.
        let Some(kind) = edit else {
            return Ok(());
        };
        let prompt = match kind {
            EditKind::Reschedule => session.render(
                "When would you like to reschedule *{name}* for? Say `exit` to cancel editing.",
            ),
            EditKind::Rename => session
                .render("What would you like to rename *{name}* to? Say `exit` to cancel editing."),
            EditKind::ChangeVenue => {
                session.render("Where will *{name}* be held now? Say `exit` to cancel editing.")
            }
        };
        match connection.start_private_exchange(&message.user_id).await {
            Ok(exchange) => {
                exchange.say(&Message::plain(prompt)).await?;
                self.start_flow(credential, &message.user_id, Flow::edit(kind));
                Ok(())
            }
            Err(error) => {
                tracing::warn!(user = %message.user_id, error = %error, "could not respond");
                Ok(())
            }
        }
    }

    async fn handle_create(
        &self,
        credential: &str,
        session: &Arc<EventSession>,
        connection: &dyn ChatTransport,
        message: &InboundMessage,
    ) -> Result<()> {
        if session.is_scheduled() {
            let prefix = command_prefix(session, message.kind);
            return connection
                .reply(message, &Message::plain(already_scheduled_text(&prefix)))
                .await;
        }
        if !message.kind.is_direct_message() {
            connection
                .reply(
                    message,
                    &Message::plain(
                        "Hey there, I've opened a private chat so I can get further details about your event.",
                    ),
                )
                .await?;
        }
        match connection.start_private_exchange(&message.user_id).await {
            Ok(exchange) => {
                let greeting = if message.kind.is_direct_message() {
                    "Hey there"
                } else {
                    "Okay"
                };
                exchange
                    .say(&Message::plain(format!(
                        "{greeting}, let's get your event set up. You can say `exit` at any time to exit the setup.\nWhat's the event called?"
                    )))
                    .await?;
                self.start_flow(credential, &message.user_id, Flow::create(&message.user_id));
                Ok(())
            }
            Err(error) => {
                tracing::warn!(user = %message.user_id, error = %error, "could not respond");
                Ok(())
            }
        }
    }

    async fn handle_invite(
        &self,
        session: &Arc<EventSession>,
        connection: &dyn ChatTransport,
        message: &InboundMessage,
    ) -> Result<()> {
        let prefix = command_prefix(session, message.kind);
        if !session.is_scheduled() {
            return connection
                .reply(message, &Message::plain(nothing_scheduled_text(&prefix)))
                .await;
        }
        if ensure_creator(session, &message.user_id).is_err() {
            return connection
                .reply(
                    message,
                    &Message::plain(session.render(
                        "Sorry, only the event's creator ({creator}) can send invitations out.",
                    )),
                )
                .await;
        }

        let users = self.mentions.users(&message.text);
        let channels = self.mentions.channels(&message.text);
        if users.iter().any(|user| user == &message.user_id) {
            return connection
                .reply(message, &Message::plain("You can't invite yourself!"))
                .await;
        }

        for user in &users {
            let invitation = session.format_summary(
                "{creator} has invited you to the following event. Will you be attending?",
                true,
            );
            match connection.start_private_exchange(user).await {
                Ok(exchange) => exchange.say(&invitation).await?,
                Err(error) => {
                    tracing::warn!(user = %user, error = %error, "user not found");
                }
            }
        }
        for channel in &channels {
            let invitation =
                session.format_summary("{creator} has invited you to the following event.", true);
            connection.send_to_channel(channel, &invitation).await?;
        }

        if users.is_empty() && channels.is_empty() {
            connection
                .reply(
                    message,
                    &Message::plain(format!(
                        "You didn't say who to invite. To invite everyone in a channel, say `{prefix}invite #channel`. To invite specific people, say `{prefix}invite @username`."
                    )),
                )
                .await
        } else {
            connection
                .reply(
                    message,
                    &Message::plain(format!(
                        "Okay, I've sent your invitations. To see a list of attendees at any time, say `{prefix}attendees`."
                    )),
                )
                .await
        }
    }

    async fn handle_cancel(
        &self,
        session: &Arc<EventSession>,
        connection: &dyn ChatTransport,
        message: &InboundMessage,
    ) -> Result<()> {
        if !session.is_scheduled() {
            let prefix = command_prefix(session, message.kind);
            return connection
                .reply(message, &Message::plain(nothing_scheduled_text(&prefix)))
                .await;
        }
        if ensure_creator(session, &message.user_id).is_err() {
            return connection
                .reply(
                    message,
                    &Message::plain(session.render(
                        "Sorry, only the event's creator ({creator}) can cancel the event.",
                    )),
                )
                .await;
        }
        let confirmation = Message::default().with_attachment(Attachment {
            title: session.render("Are you sure you want to cancel {name}?"),
            callback_id: Some(CANCEL_CALLBACK_ID.to_string()),
            actions: vec![
                MessageAction::button("no", "No, I made a mistake"),
                MessageAction {
                    style: Some(ActionStyle::Danger),
                    confirm: Some(ActionConfirm {
                        title: "Are you sure?".to_string(),
                        text: "Cancelling the event cannot be undone.".to_string(),
                        ok_label: "Yes, cancel it".to_string(),
                        dismiss_label: "No, I changed my mind!".to_string(),
                    }),
                    ..MessageAction::button("yes", "Yes, cancel it!")
                },
            ],
            ..Attachment::default()
        });
        connection.reply(message, &confirmation).await
    }

    async fn handle_upcoming(
        &self,
        session: &Arc<EventSession>,
        connection: &dyn ChatTransport,
        message: &InboundMessage,
    ) -> Result<()> {
        if !session.is_scheduled() {
            let prefix = command_prefix(session, message.kind);
            return connection
                .reply(message, &Message::plain(nothing_scheduled_text(&prefix)))
                .await;
        }
        connection
            .reply(
                message,
                &session.format_summary("Here's what's coming up next:", true),
            )
            .await
    }

    async fn handle_rsvp(
        &self,
        session: &Arc<EventSession>,
        connection: &dyn ChatTransport,
        message: &InboundMessage,
        attending: bool,
    ) -> Result<()> {
        let prefix = command_prefix(session, message.kind);
        if !session.is_scheduled() {
            return connection
                .reply(message, &Message::plain(nothing_scheduled_text(&prefix)))
                .await;
        }

        let mentioned = self.mentions.users(&message.text);
        if !mentioned.is_empty() {
            // Only the creator may RSVP on behalf of others.
            if ensure_creator(session, &message.user_id).is_ok() {
                for user in &mentioned {
                    if attending {
                        session.add_attendee(user);
                    } else {
                        session.remove_attendee(user);
                    }
                }
                let confirmation = if attending {
                    "Okay, I have added them to the attendee list."
                } else {
                    "Okay, I have removed them from the attendee list."
                };
                return connection
                    .reply(message, &Message::plain(confirmation))
                    .await;
            }
            let denial = if attending {
                "Sorry, only the event's creator ({creator}) can add attendees."
            } else {
                "Sorry, only the event's creator ({creator}) can remove attendees."
            };
            return connection
                .reply(message, &Message::plain(session.render(denial)))
                .await;
        }

        // Self-service RSVP; anyone may add or remove themself.
        if attending {
            session.add_attendee(&message.user_id);
            connection
                .reply(
                    message,
                    &Message::plain(session.render(&format!(
                        "Looking forward to seeing you at *{{name}}*!\nIf you change your mind, please let me know by saying `{prefix}rsvp no`."
                    ))),
                )
                .await?;
        } else {
            session.remove_attendee(&message.user_id);
            connection
                .reply(
                    message,
                    &Message::plain(format!(
                        "Bummer, see you next time?\nIf you change your mind, please let me know by saying `{prefix}rsvp yes`."
                    )),
                )
                .await?;
        }
        if !session.is_creator(&message.user_id) {
            let news = if attending {
                format!(
                    "Great news! {} will be attending *{{name}}* :tada:",
                    mention(&message.user_id)
                )
            } else {
                format!(
                    "Oh no! {} won't be attending *{{name}}* :sob:",
                    mention(&message.user_id)
                )
            };
            self.notify_creator(session, connection, &news).await;
        }
        Ok(())
    }

    async fn handle_attendees(
        &self,
        session: &Arc<EventSession>,
        connection: &dyn ChatTransport,
        message: &InboundMessage,
    ) -> Result<()> {
        if !session.is_scheduled() {
            let prefix = command_prefix(session, message.kind);
            return connection
                .reply(message, &Message::plain(nothing_scheduled_text(&prefix)))
                .await;
        }
        connection
            .reply(message, &session.format_attendee_list())
            .await
    }

    async fn notify_creator(
        &self,
        session: &Arc<EventSession>,
        connection: &dyn ChatTransport,
        text: &str,
    ) {
        let creator = session.creator();
        let note = Message::plain(session.render(text));
        let outcome = match connection.start_private_exchange(&creator).await {
            Ok(exchange) => exchange.say(&note).await,
            Err(error) => Err(error),
        };
        if let Err(error) = outcome {
            tracing::warn!(creator = %creator, error = %error, "could not engage");
        }
    }

    /// Handles one interactive button press.
    pub async fn handle_interactive(
        &self,
        credential: &str,
        action: &InteractiveAction,
    ) -> Result<()> {
        let session = self.registry.session_for(credential)?;
        let connection = self.registry.connection_for(session.tenant_id())?;

        match action.callback_id.as_str() {
            ATTENDANCE_CALLBACK_ID => {
                self.handle_attendance_action(&session, connection.as_ref(), action)
                    .await
            }
            CANCEL_CALLBACK_ID => {
                self.handle_cancel_action(&session, connection.as_ref(), action)
                    .await
            }
            other => {
                tracing::warn!(callback = %other, "unknown interactive callback");
                Ok(())
            }
        }
    }

    async fn handle_attendance_action(
        &self,
        session: &Arc<EventSession>,
        connection: &dyn ChatTransport,
        action: &InteractiveAction,
    ) -> Result<()> {
        if !session.is_scheduled() {
            return connection
                .send_to_channel(
                    &action.channel_id,
                    &Message::plain(nothing_scheduled_text("")),
                )
                .await;
        }
        match action.value.as_str() {
            "attending" => {
                session.add_attendee(&action.user_id);
                connection
                    .send_to_channel(&action.channel_id, &session.format_summary("", true))
                    .await?;
                connection
                    .send_to_user(
                        &action.user_id,
                        &Message::plain(
                            session.render("Looking forward to seeing you at *{name}*!"),
                        ),
                    )
                    .await?;
                if !session.is_creator(&action.user_id) {
                    let news = format!(
                        "Great news! {} will be attending *{{name}}* :tada:",
                        mention(&action.user_id)
                    );
                    self.notify_creator(session, connection, &news).await;
                }
                Ok(())
            }
            "not_attending" => {
                session.remove_attendee(&action.user_id);
                connection
                    .send_to_channel(&action.channel_id, &session.format_summary("", true))
                    .await?;
                connection
                    .send_to_user(
                        &action.user_id,
                        &Message::plain(session.render("Bummer, see you next time?")),
                    )
                    .await?;
                if !session.is_creator(&action.user_id) {
                    let news = format!(
                        "Oh no! {} won't be attending *{{name}}* :sob:",
                        mention(&action.user_id)
                    );
                    self.notify_creator(session, connection, &news).await;
                }
                Ok(())
            }
            "refresh" => {
                connection
                    .send_to_channel(&action.channel_id, &session.format_summary("", true))
                    .await
            }
            other => {
                tracing::warn!(value = %other, "unknown attendance action");
                Ok(())
            }
        }
    }

    async fn handle_cancel_action(
        &self,
        session: &Arc<EventSession>,
        connection: &dyn ChatTransport,
        action: &InteractiveAction,
    ) -> Result<()> {
        if ensure_creator(session, &action.user_id).is_err() {
            let denial = session.render(&format!(
                "Sorry {}, only the event's creator ({{creator}}) can cancel the event.",
                mention(&action.user_id)
            ));
            return connection
                .send_to_channel(&action.channel_id, &Message::plain(denial))
                .await;
        }
        match action.value.as_str() {
            "no" => {
                connection
                    .send_to_channel(
                        &action.channel_id,
                        &Message::plain("Phew! You had me going for a minute :sweat_smile:"),
                    )
                    .await
            }
            "yes" => {
                session.cancel();
                connection
                    .send_to_channel(
                        &action.channel_id,
                        &Message::plain("Your event has been cancelled :sob:"),
                    )
                    .await
            }
            other => {
                tracing::warn!(value = %other, "unknown cancel action");
                Ok(())
            }
        }
    }
}

/// Hint prefix for command examples: empty in a DM, else a mention of the
/// bot built from its user id (the form mention syntax resolves; the bot's
/// display name is never used here).
fn command_prefix(session: &EventSession, kind: InboundKind) -> String {
    if kind.is_direct_message() {
        String::new()
    } else {
        format!("{} ", mention(&session.credentials().user_id))
    }
}

fn nothing_scheduled_text(prefix: &str) -> String {
    format!("Nothing's been scheduled yet. To schedule an event, say `{prefix}create`.")
}

fn already_scheduled_text(prefix: &str) -> String {
    format!(
        "There's already an upcoming event scheduled. Please `{prefix}cancel` that one before adding a new one."
    )
}

fn help_message(prefix: &str) -> Message {
    let mut message = Message::plain(
        "Hey there, here are some phrases you can use to get started:".to_string(),
    );
    let sections = [
        format!(
            "`{prefix}create` - schedule an event\n`{prefix}upcoming` - see what's scheduled next\n`{prefix}attendees` - see who's attending the next event"
        ),
        format!(
            "`{prefix}invite` - invite someone to an event you have created\n`{prefix}reschedule` - change the event's date or time\n`{prefix}rename` - change the event's name\n`{prefix}change venue` - change the event's venue\n`{prefix}cancel` - cancel the event"
        ),
        format!(
            "`{prefix}rsvp yes` - indicate that you're attending the event\n`{prefix}rsvp no` - indicate that you're *not* attending the event\n`{prefix}help` - this message"
        ),
    ];
    for section in sections {
        message = message.with_attachment(Attachment {
            text: section,
            color: SUMMARY_COLOR.to_string(),
            ..Attachment::default()
        });
    }
    message
}
