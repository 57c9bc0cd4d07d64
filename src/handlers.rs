use spin_sdk::http::{Method, Request, Response};

use crate::auth::{self, AuthService, AuthenticatedUser, StoreAuth};
use crate::core::db::Datastore;
use crate::core::errors::BoardError;
use crate::core::helpers::not_found;
use crate::core::session::SessionCookie;
use crate::{messages, topics, users};

/// What a handler wants sent back; `finish` turns it into a response and
/// attaches the session cookie when it changed.
#[derive(Debug)]
pub enum Reply {
    /// 303 to the given location.
    Redirect(String),
    /// A page-shaped JSON document. Pending flashes are consumed into it.
    View(u16, serde_json::Value),
    /// Raw JSON; flashes stay pending.
    Json(u16, serde_json::Value),
}

impl Reply {
    pub fn redirect(location: impl Into<String>) -> Self {
        Reply::Redirect(location.into())
    }

    pub fn view(value: serde_json::Value) -> Self {
        Reply::View(200, value)
    }
}

pub fn discussion_path(topic_id: &str) -> String {
    format!("/discussion/{}", urlencoding::encode(topic_id))
}

/// Per-request state: the store, the session cookie, and the user the
/// cookie resolved to.
pub struct RequestContext<'a, S: Datastore> {
    pub store: &'a S,
    session: SessionCookie,
    session_changed: bool,
    user: Option<AuthenticatedUser>,
}

impl<'a, S: Datastore> RequestContext<'a, S> {
    pub fn new(store: &'a S, req: &Request) -> anyhow::Result<Self> {
        let mut session = SessionCookie::from_request(req);
        let mut session_changed = false;

        let user = match session.token.as_deref() {
            Some(token) => StoreAuth::new(store).authenticate(token)?,
            None => None,
        };
        if session.token.is_some() && user.is_none() {
            session.token = None;
            session_changed = true;
        }

        Ok(Self {
            store,
            session,
            session_changed,
            user,
        })
    }

    pub fn auth(&self) -> StoreAuth<'a, S> {
        StoreAuth::new(self.store)
    }

    pub fn user(&self) -> Option<&AuthenticatedUser> {
        self.user.as_ref()
    }

    /// Login gate: hands out the authenticated-user capability or fails
    /// with `Unauthenticated`.
    pub fn require_user(&self) -> Result<&AuthenticatedUser, BoardError> {
        self.user.as_ref().ok_or(BoardError::Unauthenticated)
    }

    pub fn flash(&mut self, category: &str, message: impl Into<String>) {
        self.session.flash(category, message);
        self.session_changed = true;
    }

    pub fn start_session(&mut self, user: AuthenticatedUser, token: String) {
        self.session.token = Some(token);
        self.session_changed = true;
        self.user = Some(user);
    }

    /// Drops the token from the cookie and returns it.
    pub fn end_session(&mut self) -> Option<String> {
        self.user = None;
        let token = self.session.token.take();
        if token.is_some() {
            self.session_changed = true;
        }
        token
    }

    /// Non-internal errors become an error flash and a redirect; internal
    /// errors propagate.
    pub fn fail(&mut self, err: BoardError, redirect_to: &str) -> anyhow::Result<Reply> {
        match err {
            BoardError::Internal(inner) => Err(inner),
            BoardError::Unauthenticated => {
                self.flash("message", BoardError::Unauthenticated.to_string());
                Ok(Reply::redirect("/"))
            }
            other => {
                tracing::debug!(error = %other, redirect_to, "request failed");
                self.flash("error", other.to_string());
                Ok(Reply::redirect(redirect_to))
            }
        }
    }

    pub fn finish(mut self, reply: Reply) -> anyhow::Result<Response> {
        let (status, location, body) = match reply {
            Reply::Redirect(location) => (303, Some(location), None),
            Reply::View(status, mut value) => {
                let flashes = self.session.take_flashes();
                if !flashes.is_empty() {
                    self.session_changed = true;
                }
                if let Some(object) = value.as_object_mut() {
                    object.insert("flashes".to_string(), serde_json::to_value(&flashes)?);
                    object.insert(
                        "user".to_string(),
                        serde_json::to_value(self.user.as_ref().map(|u| u.email()))?,
                    );
                }
                (status, None, Some(value))
            }
            Reply::Json(status, value) => (status, None, Some(value)),
        };

        let mut builder = Response::builder();
        builder.status(status);
        if let Some(location) = location {
            builder.header("location", location);
        }
        if self.session_changed {
            builder.header("set-cookie", self.session.set_cookie_header()?);
        }
        match body {
            Some(value) => {
                builder.header("content-type", "application/json");
                builder.body(serde_json::to_vec(&value)?);
            }
            None => {
                builder.body(Vec::new());
            }
        }
        Ok(builder.build())
    }
}

/// Shared router for the Spin component and the native server.
pub fn route<S: Datastore>(store: &S, req: &Request) -> anyhow::Result<Response> {
    let path = req.path().to_string();
    let mut ctx = RequestContext::new(store, req)?;

    let reply = match (req.method(), path.as_str()) {
        (Method::Get, "/") => topics::index(&mut ctx)?,
        (Method::Get, "/poll") => messages::poll_handler(&mut ctx, req)?,
        (Method::Post, "/post") => messages::post_handler(&mut ctx, req)?,
        (Method::Get, "/create_topic") => topics::create_topic_form(&mut ctx, req)?,
        (Method::Post, "/create_topic") => topics::create_topic_handler(&mut ctx, req)?,
        (Method::Post, "/change_topic_name") => topics::change_topic_name_handler(&mut ctx, req)?,
        (Method::Get, p) if p.starts_with("/discussion/") => {
            let raw = p.trim_start_matches("/discussion/");
            let topic_key = urlencoding::decode(raw)
                .map(|k| k.into_owned())
                .unwrap_or_else(|_| raw.to_string());
            topics::discussion_handler(&mut ctx, &topic_key)?
        }
        (Method::Get, "/signup") => users::signup_form(&mut ctx)?,
        (Method::Post, "/signup") => users::signup_handler(&mut ctx, req)?,
        (Method::Get, "/login") => auth::login_form(&mut ctx)?,
        (Method::Post, "/login") => auth::login_handler(&mut ctx, req)?,
        (Method::Get, "/logout") => auth::logout_handler(&mut ctx)?,
        _ => return not_found(),
    };

    ctx.finish(reply)
}

/// Like `route`, but internal failures become a logged 500 instead of an
/// error.
pub fn handle_request<S: Datastore>(store: &S, req: &Request) -> Response {
    match route(store, req) {
        Ok(resp) => resp,
        Err(err) => {
            tracing::warn!(path = req.path(), "request failed");
            BoardError::Internal(err).into()
        }
    }
}
