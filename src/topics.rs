use spin_sdk::http::Request;

use crate::auth::AuthenticatedUser;
use crate::config::*;
use crate::core::dates::{format_input_datetime, parse_input_datetime, pretty_date};
use crate::core::db::{append_to_index, fetch, Datastore, Order};
use crate::core::errors::BoardError;
use crate::core::helpers::{new_id, now, sanitize_text, validate_uuid};
use crate::core::query_params::{get_string, parse_fields, parse_query_params};
use crate::handlers::{discussion_path, Reply, RequestContext};
use crate::messages::{get_message, message_view, recent_messages};
use crate::models::models::{Message, Topic};
use crate::users::user_email;

/// Raw form input for a new topic.
#[derive(Clone, Copy, Debug, Default)]
pub struct NewTopic<'a> {
    pub title: &'a str,
    pub parent_topic_key: Option<&'a str>,
    pub start: Option<&'a str>,
    pub end: Option<&'a str>,
}

pub struct Discussion {
    pub topic: Topic,
    pub child_topics: Vec<Topic>,
    /// Newest first.
    pub messages: Vec<Message>,
}

pub struct ReplyForm {
    pub title: String,
    pub parent_topic_key: String,
    pub start: String,
    pub message: Message,
}

fn clean_title(title: &str) -> Result<String, BoardError> {
    let title = sanitize_text(title.trim());
    if title.is_empty() {
        return Err(BoardError::validation("Title required."));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(BoardError::validation("Title too long."));
    }
    Ok(title)
}

pub fn get_topic<S: Datastore>(store: &S, topic_id: &str) -> anyhow::Result<Option<Topic>> {
    if !validate_uuid(topic_id) {
        return Ok(None);
    }
    store.get_json::<Topic>(&topic_key(topic_id))
}

pub fn create_topic<S: Datastore>(
    store: &S,
    author: &AuthenticatedUser,
    input: NewTopic<'_>,
) -> Result<Topic, BoardError> {
    let title = clean_title(input.title)?;

    let parent_topic = match input.parent_topic_key.filter(|k| !k.is_empty()) {
        Some(parent_id) => match get_topic(store, parent_id)? {
            Some(parent) => Some(parent.id),
            None => return Err(BoardError::not_found("Parent topic not found.")),
        },
        None => None,
    };

    let created_at = now();

    // An unreadable start falls back to now while an unreadable end is
    // dropped.
    let start = input.start.filter(|s| !s.trim().is_empty()).map(|raw| {
        parse_input_datetime(raw).unwrap_or_else(|| {
            tracing::warn!(start = raw, "unparsable topic start, using now");
            created_at
        })
    });
    let end = input.end.filter(|s| !s.trim().is_empty()).and_then(|raw| {
        let parsed = parse_input_datetime(raw);
        if parsed.is_none() {
            tracing::warn!(end = raw, "unparsable topic end, ignoring");
        }
        parsed
    });

    let topic = Topic {
        id: new_id(),
        title,
        author: author.id().to_string(),
        parent_topic,
        start,
        end,
        status: 0,
        created_at,
        updated_at: created_at,
    };

    store.set_json(&topic_key(&topic.id), &topic)?;
    append_to_index(store, TOPICS_LIST_KEY, &topic.id)?;

    tracing::info!(topic = %topic.id, author = %topic.author, "topic created");
    Ok(topic)
}

/// Topics whose `parent_topic` is `parent_id`, oldest first.
pub fn child_topics<S: Datastore>(store: &S, parent_id: &str) -> anyhow::Result<Vec<Topic>> {
    fetch(store, TOPICS_LIST_KEY, topic_key, Order::OldestFirst, 0, usize::MAX, |t: &Topic| {
        t.parent_topic.as_deref() == Some(parent_id)
    })
}

/// The user's topics, newest first. With `main_only`, only topics without
/// a parent.
pub fn user_topics<S: Datastore>(
    store: &S,
    user: &AuthenticatedUser,
    main_only: bool,
) -> anyhow::Result<Vec<Topic>> {
    fetch(store, TOPICS_LIST_KEY, topic_key, Order::NewestFirst, 0, INDEX_PAGE_SIZE, |t: &Topic| {
        t.author == user.id() && (!main_only || t.parent_topic.is_none())
    })
}

pub fn change_topic_name<S: Datastore>(
    store: &S,
    topic_id: Option<&str>,
    title: Option<&str>,
) -> Result<Topic, BoardError> {
    let title = clean_title(title.unwrap_or_default())?;
    let topic_id = topic_id
        .filter(|k| !k.is_empty())
        .ok_or_else(|| BoardError::validation("Topic not found."))?;

    let mut topic = get_topic(store, topic_id)?.ok_or_else(|| BoardError::not_found("Topic not found."))?;
    topic.title = title;
    topic.updated_at = now();
    store.set_json(&topic_key(&topic.id), &topic)?;

    Ok(topic)
}

pub fn discussion<S: Datastore>(store: &S, topic_id: &str) -> Result<Discussion, BoardError> {
    let topic = get_topic(store, topic_id)?.ok_or_else(|| BoardError::not_found("No topic found"))?;
    let child_topics = child_topics(store, &topic.id)?;
    let messages = recent_messages(store, &topic.id, DISCUSSION_PAGE_SIZE)?;

    Ok(Discussion {
        topic,
        child_topics,
        messages,
    })
}

/// Pre-filled form for branching a new topic off a message.
pub fn reply_form<S: Datastore>(store: &S, message_id: &str) -> Result<ReplyForm, BoardError> {
    let message = get_message(store, message_id)?.ok_or_else(|| BoardError::not_found("Message not found."))?;

    Ok(ReplyForm {
        title: format!("On - {}", message.content),
        parent_topic_key: message.topic.clone(),
        start: format_input_datetime(now()),
        message,
    })
}

pub fn topic_view<S: Datastore>(store: &S, topic: &Topic) -> anyhow::Result<serde_json::Value> {
    Ok(serde_json::json!({
        "key": topic.id,
        "title": topic.title,
        "author": user_email(store, &topic.author)?,
        "parent_topic_key": topic.parent_topic,
        "start": topic.start.map(format_input_datetime),
        "end": topic.end.map(format_input_datetime),
        "status": topic.status,
        "created_at": pretty_date(Some(topic.created_at), now()),
        "updated_at": pretty_date(Some(topic.updated_at), now()),
    }))
}

fn topic_views<S: Datastore>(store: &S, topics: &[Topic]) -> anyhow::Result<Vec<serde_json::Value>> {
    topics.iter().map(|t| topic_view(store, t)).collect()
}

fn topic_form(title: &str, parent_topic_key: &str, start: &str, end: &str) -> serde_json::Value {
    serde_json::json!({
        "title": title,
        "parent_topic_key": parent_topic_key,
        "start": start,
        "end": end,
    })
}

// === HTTP Handlers ===

pub fn index<S: Datastore>(ctx: &mut RequestContext<S>) -> anyhow::Result<Reply> {
    let (topics, main_topics) = match ctx.user() {
        Some(user) => (
            topic_views(ctx.store, &user_topics(ctx.store, user, false)?)?,
            topic_views(ctx.store, &user_topics(ctx.store, user, true)?)?,
        ),
        None => (Vec::new(), Vec::new()),
    };

    Ok(Reply::view(serde_json::json!({
        "topics": topics,
        "main_topics": main_topics,
    })))
}

pub fn create_topic_form<S: Datastore>(ctx: &mut RequestContext<S>, req: &Request) -> anyhow::Result<Reply> {
    if let Err(err) = ctx.require_user() {
        return ctx.fail(err, "/");
    }

    let params = parse_query_params(req.uri());
    let Some(message_id) = get_string(&params, "message_key") else {
        return Ok(Reply::view(serde_json::json!({
            "form": topic_form("", "", "", ""),
            "message": null,
        })));
    };

    match reply_form(ctx.store, &message_id) {
        Ok(form) => Ok(Reply::view(serde_json::json!({
            "form": topic_form(&form.title, &form.parent_topic_key, &form.start, ""),
            "message": message_view(ctx.store, &form.message)?,
        }))),
        Err(err) => ctx.fail(err, "/"),
    }
}

pub fn create_topic_handler<S: Datastore>(ctx: &mut RequestContext<S>, req: &Request) -> anyhow::Result<Reply> {
    let author = match ctx.require_user() {
        Ok(user) => user.clone(),
        Err(err) => return ctx.fail(err, "/"),
    };

    let fields = parse_fields(req);
    let title = get_string(&fields, "title").unwrap_or_default();
    let parent_topic_key = get_string(&fields, "parent_topic_key");
    let start = get_string(&fields, "start");
    let end = get_string(&fields, "end");

    let input = NewTopic {
        title: &title,
        parent_topic_key: parent_topic_key.as_deref(),
        start: start.as_deref(),
        end: end.as_deref(),
    };

    match create_topic(ctx.store, &author, input) {
        Ok(topic) => {
            ctx.flash("message", format!("Topic \"{}\" created.", topic.title));
            Ok(Reply::redirect(discussion_path(&topic.id)))
        }
        Err(BoardError::Internal(err)) => Err(err),
        Err(err) => {
            let status = err.status();
            ctx.flash("error", err.to_string());
            Ok(Reply::View(
                status,
                serde_json::json!({
                    "form": topic_form(
                        &title,
                        parent_topic_key.as_deref().unwrap_or_default(),
                        start.as_deref().unwrap_or_default(),
                        end.as_deref().unwrap_or_default(),
                    ),
                    "message": null,
                }),
            ))
        }
    }
}

pub fn change_topic_name_handler<S: Datastore>(ctx: &mut RequestContext<S>, req: &Request) -> anyhow::Result<Reply> {
    if let Err(err) = ctx.require_user() {
        return ctx.fail(err, "/");
    }

    let fields = parse_fields(req);
    let title = get_string(&fields, "title");
    let topic_id = get_string(&fields, "topic_key");
    let back = topic_id.as_deref().map(discussion_path).unwrap_or_else(|| "/".to_string());

    match change_topic_name(ctx.store, topic_id.as_deref(), title.as_deref()) {
        Ok(topic) => Ok(Reply::redirect(discussion_path(&topic.id))),
        Err(err) => ctx.fail(err, &back),
    }
}

pub fn discussion_handler<S: Datastore>(ctx: &mut RequestContext<S>, topic_id: &str) -> anyhow::Result<Reply> {
    if let Err(err) = ctx.require_user() {
        return ctx.fail(err, "/");
    }

    let found = match discussion(ctx.store, topic_id) {
        Ok(found) => found,
        Err(err) => return ctx.fail(err, "/"),
    };

    let messages = found
        .messages
        .iter()
        .map(|m| message_view(ctx.store, m))
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Reply::view(serde_json::json!({
        "topic": topic_view(ctx.store, &found.topic)?,
        "child_topics": topic_views(ctx.store, &found.child_topics)?,
        "messages": messages,
    })))
}
