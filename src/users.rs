use spin_sdk::http::Request;

use crate::auth::AuthService;
use crate::config::{email_key, user_key, USERS_LIST_KEY};
use crate::core::db::{append_to_index, Datastore};
use crate::core::errors::BoardError;
use crate::core::helpers::{hash_password, new_id, now};
use crate::core::query_params::{get_string, parse_fields};
use crate::handlers::{Reply, RequestContext};
use crate::models::models::User;

pub fn get_user<S: Datastore>(store: &S, user_id: &str) -> anyhow::Result<Option<User>> {
    store.get_json::<User>(&user_key(user_id))
}

pub fn find_user_by_email<S: Datastore>(store: &S, email: &str) -> anyhow::Result<Option<User>> {
    match store.get_json::<String>(&email_key(email))? {
        Some(user_id) => get_user(store, &user_id),
        None => Ok(None),
    }
}

/// Email of a user, or an empty string when the user is gone.
pub fn user_email<S: Datastore>(store: &S, user_id: &str) -> anyhow::Result<String> {
    Ok(get_user(store, user_id)?.map(|u| u.email).unwrap_or_default())
}

pub fn create_user<S: Datastore>(store: &S, email: &str, password: &str) -> Result<User, BoardError> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(BoardError::validation("Email and password required"));
    }

    if store.get_json::<String>(&email_key(email))?.is_some() {
        return Err(BoardError::validation("Email already registered"));
    }

    let created_at = now();
    let user = User {
        id: new_id(),
        name: None,
        email: email.to_string(),
        password: hash_password(password)?,
        status: 0,
        created_at,
        updated_at: created_at,
    };

    store.set_json(&user_key(&user.id), &user)?;
    if !store.insert_json_if_absent(&email_key(email), &user.id)? {
        store.delete_key(&user_key(&user.id))?;
        return Err(BoardError::validation("Email already registered"));
    }
    append_to_index(store, USERS_LIST_KEY, &user.id)?;

    Ok(user)
}

fn signup_view(email: &str) -> serde_json::Value {
    serde_json::json!({ "form": { "new_email": email, "new_password": "" } })
}

pub fn signup_form<S: Datastore>(_ctx: &mut RequestContext<S>) -> anyhow::Result<Reply> {
    Ok(Reply::view(signup_view("")))
}

pub fn signup_handler<S: Datastore>(ctx: &mut RequestContext<S>, req: &Request) -> anyhow::Result<Reply> {
    let fields = parse_fields(req);
    let email = get_string(&fields, "new_email").unwrap_or_default();
    let password = get_string(&fields, "new_password").unwrap_or_default();

    let auth = ctx.auth();
    let result = auth
        .signup(&email, &password)
        .and_then(|user| auth.open_session(&user).map(|token| (user, token)));

    match result {
        Ok((user, token)) => {
            ctx.flash("message", format!("Thanks for signing up, {}!", user.email()));
            ctx.start_session(user, token);
            Ok(Reply::redirect("/"))
        }
        Err(BoardError::Internal(err)) => Err(err),
        Err(err) => {
            let status = err.status();
            ctx.flash("error", err.to_string());
            Ok(Reply::View(status, signup_view(&email)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::MemoryStore;

    #[test]
    fn signup_requires_both_fields() {
        let store = MemoryStore::new();
        assert!(matches!(create_user(&store, "", "pw"), Err(BoardError::Validation(_))));
        assert!(matches!(create_user(&store, "   ", "pw"), Err(BoardError::Validation(_))));
        assert!(matches!(create_user(&store, "a@b.c", ""), Err(BoardError::Validation(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn emails_are_unique() {
        let store = MemoryStore::new();
        let first = create_user(&store, "dup@example.com", "one").unwrap();

        let err = create_user(&store, " dup@example.com ", "two").unwrap_err();
        assert_eq!(err.to_string(), "Email already registered");

        let ids: Vec<String> = store.get_json(USERS_LIST_KEY).unwrap().unwrap();
        assert_eq!(ids, vec![first.id.clone()]);
        assert_eq!(find_user_by_email(&store, "dup@example.com").unwrap().unwrap().id, first.id);
    }

    #[test]
    fn password_is_never_stored_in_plaintext() {
        let store = MemoryStore::new();
        let user = create_user(&store, "p@example.com", "plain").unwrap();
        let stored = get_user(&store, &user.id).unwrap().unwrap();
        assert_ne!(stored.password, "plain");
        assert!(stored.password.starts_with("$argon2"));
    }

    #[test]
    fn missing_user_has_empty_email() {
        let store = MemoryStore::new();
        assert_eq!(user_email(&store, "ghost").unwrap(), "");
    }
}
