use axum::{Extension, Json, extract::State, response::IntoResponse};

use alcove_db::Database;
use alcove_types::api::{LookupRequest, UserBase, UserId};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;

/// Resolve a username or email to a numeric account id. Clients call this
/// before sending, since the wire protocol addresses users by id. Once
/// add-friend lands, clients will cache ids and this endpoint fades out.
pub async fn lookup_friend_id(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
    Json(req): Json<LookupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = resolve_lookup(&state.db, &req)?;
    Ok(Json(id))
}

/// The full username/email directory. Friend-scoping waits on add-friend;
/// until then every account is listed.
pub async fn get_friends(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let pairs = state.db.name_email_pairs()?;
    let directory: Vec<UserBase> = pairs
        .into_iter()
        .map(|(username, email)| UserBase { username, email })
        .collect();
    Ok(Json(directory))
}

pub async fn add_friend() -> Result<(), ApiError> {
    // Needs a way to map envelope keys to accounts first.
    Err(ApiError::NotYetImplemented)
}

/// Email takes precedence when both fields arrive; empty strings count as
/// absent, mirroring how optional form fields behave.
fn resolve_lookup(db: &Database, req: &LookupRequest) -> Result<UserId, ApiError> {
    let email = req.email.as_deref().filter(|e| !e.is_empty());
    let username = req.username.as_deref().filter(|u| !u.is_empty());

    if let Some(email) = email {
        let id = db.lookup_id_by_email(email)?.ok_or(ApiError::UnknownEmail)?;
        Ok(UserId { id })
    } else if let Some(username) = username {
        let id = db.lookup_id_by_username(username)?.ok_or(ApiError::UnknownUsername)?;
        Ok(UserId { id })
    } else {
        Err(ApiError::InvalidUserQuery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_db() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let mia = db.create_user("mia", "mia@example.com", "h").unwrap();
        (db, mia)
    }

    fn req(username: Option<&str>, email: Option<&str>) -> LookupRequest {
        LookupRequest {
            username: username.map(str::to_string),
            email: email.map(str::to_string),
        }
    }

    #[test]
    fn lookup_by_username_and_email() {
        let (db, mia) = seeded_db();

        assert_eq!(resolve_lookup(&db, &req(Some("mia"), None)).unwrap().id, mia);
        assert_eq!(resolve_lookup(&db, &req(None, Some("mia@example.com"))).unwrap().id, mia);
    }

    #[test]
    fn unknown_email_is_its_own_error() {
        let (db, _) = seeded_db();

        let result = resolve_lookup(&db, &req(None, Some("ghost@example.com")));
        assert!(matches!(result, Err(ApiError::UnknownEmail)));

        let result = resolve_lookup(&db, &req(Some("ghost"), None));
        assert!(matches!(result, Err(ApiError::UnknownUsername)));
    }

    #[test]
    fn neither_field_is_an_invalid_query() {
        let (db, _) = seeded_db();

        let result = resolve_lookup(&db, &req(None, None));
        assert!(matches!(result, Err(ApiError::InvalidUserQuery)));
    }

    #[test]
    fn email_wins_when_both_are_present() {
        let (db, mia) = seeded_db();
        db.create_user("dash", "dash@example.com", "h").unwrap();

        let both = req(Some("dash"), Some("mia@example.com"));
        assert_eq!(resolve_lookup(&db, &both).unwrap().id, mia);
    }

    #[test]
    fn empty_strings_count_as_absent() {
        let (db, mia) = seeded_db();

        let result = resolve_lookup(&db, &req(Some("mia"), Some("")));
        assert_eq!(result.unwrap().id, mia);

        let result = resolve_lookup(&db, &req(Some(""), Some("")));
        assert!(matches!(result, Err(ApiError::InvalidUserQuery)));
    }
}
