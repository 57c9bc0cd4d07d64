use spin_sdk::http::Request;

use crate::auth::AuthenticatedUser;
use crate::config::*;
use crate::core::dates::pretty_date;
use crate::core::db::{append_to_index, page, Datastore, Order};
use crate::core::errors::BoardError;
use crate::core::helpers::{new_id, now, sanitize_text, validate_uuid};
use crate::core::query_params::{get_offset, get_string, parse_fields, parse_query_params};
use crate::handlers::{discussion_path, Reply, RequestContext};
use crate::models::models::Message;
use crate::topics::get_topic;
use crate::users::user_email;

/// One page of a topic's messages, oldest first.
pub struct PollPage {
    pub messages: Vec<Message>,
    /// More messages exist past this page.
    pub has_more: bool,
}

pub fn get_message<S: Datastore>(store: &S, message_id: &str) -> anyhow::Result<Option<Message>> {
    if !validate_uuid(message_id) {
        return Ok(None);
    }
    store.get_json::<Message>(&message_key(message_id))
}

pub fn post_message<S: Datastore>(
    store: &S,
    author: &AuthenticatedUser,
    topic_id: &str,
    content: &str,
) -> Result<Message, BoardError> {
    if topic_id.is_empty() {
        return Err(BoardError::validation("Topic not found."));
    }
    let content = sanitize_text(content.trim());
    if content.is_empty() {
        return Err(BoardError::validation("Content required."));
    }
    if content.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(BoardError::validation("Content too long."));
    }

    let topic = get_topic(store, topic_id)?.ok_or_else(|| BoardError::not_found("Topic not found."))?;

    let created_at = now();
    let message = Message {
        id: new_id(),
        content,
        author: author.id().to_string(),
        topic: topic.id,
        status: 0,
        created_at,
        updated_at: created_at,
    };

    store.set_json(&message_key(&message.id), &message)?;
    append_to_index(store, &topic_messages_key(&message.topic), &message.id)?;

    tracing::info!(message = %message.id, topic = %message.topic, "message posted");
    Ok(message)
}

/// Latest `limit` messages of a topic, newest first.
pub fn recent_messages<S: Datastore>(store: &S, topic_id: &str, limit: usize) -> anyhow::Result<Vec<Message>> {
    page(store, &topic_messages_key(topic_id), message_key, Order::NewestFirst, 0, limit)
}

/// Up to `POLL_PAGE_SIZE` messages starting at `offset`. A missing or
/// unknown topic, or an offset past the end, gives an empty page.
pub fn poll<S: Datastore>(store: &S, topic_id: Option<&str>, offset: usize) -> anyhow::Result<PollPage> {
    let Some(topic) = topic_id.map(|id| get_topic(store, id)).transpose()?.flatten() else {
        return Ok(PollPage {
            messages: Vec::new(),
            has_more: false,
        });
    };

    let mut messages: Vec<Message> = page(
        store,
        &topic_messages_key(&topic.id),
        message_key,
        Order::OldestFirst,
        offset,
        POLL_PAGE_SIZE + 1,
    )?;
    let has_more = messages.len() > POLL_PAGE_SIZE;
    messages.truncate(POLL_PAGE_SIZE);

    Ok(PollPage { messages, has_more })
}

pub fn message_view<S: Datastore>(store: &S, message: &Message) -> anyhow::Result<serde_json::Value> {
    Ok(serde_json::json!({
        "key": message.id,
        "content": message.content,
        "email": user_email(store, &message.author)?,
        "created_at": pretty_date(Some(message.created_at), now()),
        "topic_key": message.topic,
    }))
}

// === HTTP Handlers ===

pub fn post_handler<S: Datastore>(ctx: &mut RequestContext<S>, req: &Request) -> anyhow::Result<Reply> {
    let author = match ctx.require_user() {
        Ok(user) => user.clone(),
        Err(err) => return ctx.fail(err, "/"),
    };

    let fields = parse_fields(req);
    let content = get_string(&fields, "content").unwrap_or_default();
    let topic_id = get_string(&fields, "topic_key").unwrap_or_default();

    match post_message(ctx.store, &author, &topic_id, &content) {
        Ok(message) => Ok(Reply::redirect(discussion_path(&message.topic))),
        Err(err @ BoardError::NotFound(_)) => ctx.fail(err, "/"),
        Err(err) if topic_id.is_empty() => ctx.fail(err, "/"),
        Err(err) => ctx.fail(err, &discussion_path(&topic_id)),
    }
}

pub fn poll_handler<S: Datastore>(ctx: &mut RequestContext<S>, req: &Request) -> anyhow::Result<Reply> {
    if let Err(err) = ctx.require_user() {
        return Ok(Reply::Json(err.status(), serde_json::json!({ "error": err.to_string() })));
    }

    let params = parse_query_params(req.uri());
    let offset = match get_offset(&params, "offset") {
        Ok(offset) => offset,
        Err(msg) => return Ok(Reply::Json(400, serde_json::json!({ "error": msg }))),
    };
    let topic_id = get_string(&params, "topic_key");

    let found = poll(ctx.store, topic_id.as_deref(), offset)?;
    let messages = found
        .messages
        .iter()
        .map(|m| message_view(ctx.store, m))
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Reply::Json(
        200,
        serde_json::json!({
            "messages": messages,
            "has_more": found.has_more,
        }),
    ))
}
