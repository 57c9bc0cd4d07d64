use chrono::Duration;
use spin_sdk::http::Request;

use crate::config::{session_expiration_hours, session_key, SESSIONS_LIST_KEY};
use crate::core::db::{append_to_index, remove_from_index, Datastore};
use crate::core::errors::BoardError;
use crate::core::helpers::{new_id, now, verify_password};
use crate::core::query_params::{get_string, parse_fields};
use crate::handlers::{Reply, RequestContext};
use crate::models::models::{SessionData, User};
use crate::users::{create_user, find_user_by_email, get_user};

const LOGIN_MISMATCH: &str = "Email and password not matched.";

/// Proof that the request belongs to a logged-in user. Only this module
/// can build one, so operations taking `&AuthenticatedUser` cannot be
/// reached anonymously.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    user: User,
}

impl AuthenticatedUser {
    pub fn id(&self) -> &str {
        &self.user.id
    }

    pub fn email(&self) -> &str {
        &self.user.email
    }
}

pub trait AuthService {
    /// Creates the account; the new user counts as authenticated.
    fn signup(&self, email: &str, password: &str) -> Result<AuthenticatedUser, BoardError>;

    /// Verifies credentials without touching any session.
    fn login(&self, email: &str, password: &str) -> Result<AuthenticatedUser, BoardError>;

    /// Stores a server-side session and returns its token. Expired
    /// sessions of any user are swept first.
    fn open_session(&self, user: &AuthenticatedUser) -> Result<String, BoardError>;

    /// Resolves a session token. Expired sessions and sessions of deleted
    /// users resolve to `None`.
    fn authenticate(&self, token: &str) -> anyhow::Result<Option<AuthenticatedUser>>;

    fn logout(&self, token: &str) -> anyhow::Result<()>;
}

/// `AuthService` over the board's datastore with argon2 password hashes.
pub struct StoreAuth<'a, S: Datastore> {
    store: &'a S,
}

impl<'a, S: Datastore> StoreAuth<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    fn is_expired(&self, data: &SessionData) -> bool {
        now() - data.created_at > Duration::hours(session_expiration_hours())
    }

    /// Deletes every expired or dangling session record and drops it from
    /// the session index. Returns how many were removed.
    pub fn sweep_expired_sessions(&self) -> anyhow::Result<usize> {
        let tokens: Vec<String> = self.store.get_json(SESSIONS_LIST_KEY)?.unwrap_or_default();

        let mut stale = Vec::new();
        for token in tokens {
            let expired = match self.store.get_json::<SessionData>(&session_key(&token))? {
                Some(data) => self.is_expired(&data),
                None => true,
            };
            if expired {
                self.store.delete_key(&session_key(&token))?;
                stale.push(token);
            }
        }

        if !stale.is_empty() {
            remove_from_index(self.store, SESSIONS_LIST_KEY, &stale)?;
            tracing::debug!(count = stale.len(), "swept expired sessions");
        }
        Ok(stale.len())
    }
}

impl<S: Datastore> AuthService for StoreAuth<'_, S> {
    fn signup(&self, email: &str, password: &str) -> Result<AuthenticatedUser, BoardError> {
        let user = create_user(self.store, email, password)?;
        tracing::info!(user = %user.id, "user signed up");
        Ok(AuthenticatedUser { user })
    }

    fn login(&self, email: &str, password: &str) -> Result<AuthenticatedUser, BoardError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(BoardError::auth(LOGIN_MISMATCH));
        }

        match find_user_by_email(self.store, email)? {
            Some(user) if verify_password(password, &user.password) => {
                tracing::info!(user = %user.id, "login succeeded");
                Ok(AuthenticatedUser { user })
            }
            _ => {
                tracing::info!("login failed");
                Err(BoardError::auth(LOGIN_MISMATCH))
            }
        }
    }

    fn open_session(&self, user: &AuthenticatedUser) -> Result<String, BoardError> {
        self.sweep_expired_sessions()?;

        let token = new_id();
        let data = SessionData {
            user_id: user.id().to_string(),
            created_at: now(),
        };
        self.store.set_json(&session_key(&token), &data)?;
        append_to_index(self.store, SESSIONS_LIST_KEY, &token)?;
        Ok(token)
    }

    fn authenticate(&self, token: &str) -> anyhow::Result<Option<AuthenticatedUser>> {
        let Some(data) = self.store.get_json::<SessionData>(&session_key(token))? else {
            return Ok(None);
        };

        if self.is_expired(&data) {
            self.logout(token)?;
            return Ok(None);
        }

        Ok(get_user(self.store, &data.user_id)?.map(|user| AuthenticatedUser { user }))
    }

    fn logout(&self, token: &str) -> anyhow::Result<()> {
        self.store.delete_key(&session_key(token))?;
        remove_from_index(self.store, SESSIONS_LIST_KEY, &[token.to_string()])
    }
}

fn login_view(email: &str) -> serde_json::Value {
    serde_json::json!({ "form": { "email": email, "password": "" } })
}

pub fn login_form<S: Datastore>(_ctx: &mut RequestContext<S>) -> anyhow::Result<Reply> {
    Ok(Reply::view(login_view("")))
}

pub fn login_handler<S: Datastore>(ctx: &mut RequestContext<S>, req: &Request) -> anyhow::Result<Reply> {
    let fields = parse_fields(req);
    let email = get_string(&fields, "email").unwrap_or_default();
    let password = get_string(&fields, "password").unwrap_or_default();

    let auth = ctx.auth();
    let result = auth
        .login(&email, &password)
        .and_then(|user| auth.open_session(&user).map(|token| (user, token)));

    match result {
        Ok((user, token)) => {
            ctx.flash("message", format!("Welcome {}!", user.email()));
            ctx.start_session(user, token);
            Ok(Reply::redirect("/"))
        }
        Err(BoardError::Internal(err)) => Err(err),
        Err(err) => {
            let status = err.status();
            ctx.flash("error", err.to_string());
            Ok(Reply::View(status, login_view(&email)))
        }
    }
}

pub fn logout_handler<S: Datastore>(ctx: &mut RequestContext<S>) -> anyhow::Result<Reply> {
    if let Some(token) = ctx.end_session() {
        ctx.auth().logout(&token)?;
    }
    Ok(Reply::redirect("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::MemoryStore;

    #[test]
    fn login_checks_the_password_hash() {
        let store = MemoryStore::new();
        let auth = StoreAuth::new(&store);
        auth.signup("ann@example.com", "secret").unwrap();

        let user = auth.login("ann@example.com", "secret").unwrap();
        assert_eq!(user.email(), "ann@example.com");

        let err = auth.login("ann@example.com", "wrong").unwrap_err();
        assert!(matches!(err, BoardError::Auth(_)));
        assert!(matches!(auth.login("nobody@example.com", "secret"), Err(BoardError::Auth(_))));
        assert!(matches!(auth.login("", ""), Err(BoardError::Auth(_))));
    }

    #[test]
    fn sessions_resolve_until_logout() {
        let store = MemoryStore::new();
        let auth = StoreAuth::new(&store);
        let user = auth.signup("bo@example.com", "pw").unwrap();

        let token = auth.open_session(&user).unwrap();
        let resolved = auth.authenticate(&token).unwrap().unwrap();
        assert_eq!(resolved.id(), user.id());

        auth.logout(&token).unwrap();
        assert!(auth.authenticate(&token).unwrap().is_none());
        assert!(auth.authenticate("unknown").unwrap().is_none());
    }

    #[test]
    fn expired_sessions_are_dropped() {
        let store = MemoryStore::new();
        let auth = StoreAuth::new(&store);
        let user = auth.signup("cy@example.com", "pw").unwrap();

        let token = "stale";
        let data = SessionData {
            user_id: user.id().to_string(),
            created_at: now() - Duration::hours(session_expiration_hours() + 1),
        };
        store.set_json(&session_key(token), &data).unwrap();

        assert!(auth.authenticate(token).unwrap().is_none());
        assert!(store.get_json::<SessionData>(&session_key(token)).unwrap().is_none());
    }

    #[test]
    fn opening_a_session_sweeps_abandoned_ones() {
        let store = MemoryStore::new();
        let auth = StoreAuth::new(&store);
        let user = auth.signup("dee@example.com", "pw").unwrap();

        let abandoned = auth.open_session(&user).unwrap();
        let live = auth.open_session(&user).unwrap();
        let aged = SessionData {
            user_id: user.id().to_string(),
            created_at: now() - Duration::hours(session_expiration_hours() + 1),
        };
        store.set_json(&session_key(&abandoned), &aged).unwrap();

        let fresh = auth.open_session(&auth.login("dee@example.com", "pw").unwrap()).unwrap();

        assert!(store.get_json::<SessionData>(&session_key(&abandoned)).unwrap().is_none());
        let tokens: Vec<String> = store.get_json(SESSIONS_LIST_KEY).unwrap().unwrap();
        assert_eq!(tokens, vec![live.clone(), fresh.clone()]);
        assert!(auth.authenticate(&live).unwrap().is_some());

        auth.logout(&live).unwrap();
        let tokens: Vec<String> = store.get_json(SESSIONS_LIST_KEY).unwrap().unwrap();
        assert_eq!(tokens, vec![fresh]);
    }
}
