use ammonia::Builder;
use regex::Regex;
use spin_sdk::http::{Request, Response};
use spin_sdk::key_value::Store;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::auth::{issue_token, validate_token, viewer_id};
use crate::config::*;
use crate::core::errors::ApiError;
use crate::core::helpers::{gravatar_url, hash_password, now, store};
use crate::core::query_params::{get_string, parse_query_params};
use crate::follow::{get_followers, get_followings};
use crate::media;
use crate::models::models::{Profile, User};

fn email_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Regex should compile"))
}

fn sanitize_text(text: &str) -> String {
    // Plain text only - strip all HTML
    Builder::default()
        .tags(std::collections::HashSet::new())
        .clean(text)
        .to_string()
}

fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.len() < MIN_USERNAME_LENGTH || username.len() > MAX_USERNAME_LENGTH {
        return Err(ApiError::BadRequest(
            "Username must be 4-15 characters".to_string(),
        ));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ApiError::BadRequest(
            "Username must be alphanumeric".to_string(),
        ));
    }
    Ok(())
}

fn validate_display_name(display_name: &str) -> Result<(), ApiError> {
    if display_name.len() < MIN_DISPLAY_NAME_LENGTH || display_name.len() > MAX_DISPLAY_NAME_LENGTH
    {
        return Err(ApiError::BadRequest(
            "Display name must be 4-50 characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    if !email_regex().is_match(email) {
        return Err(ApiError::BadRequest("Invalid email".to_string()));
    }
    Ok(())
}

/// Case-insensitive username lookup over the user index.
pub fn find_by_username(store: &Store, username: &str) -> anyhow::Result<Option<User>> {
    let users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
    for id in users {
        if let Some(u) = store.get_json::<User>(&user_key(&id))? {
            if u.username.eq_ignore_ascii_case(username) {
                return Ok(Some(u));
            }
        }
    }
    Ok(None)
}

pub fn find_by_email(store: &Store, email: &str) -> anyhow::Result<Option<User>> {
    let users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
    for id in users {
        if let Some(u) = store.get_json::<User>(&user_key(&id))? {
            if u.email.eq_ignore_ascii_case(email) {
                return Ok(Some(u));
            }
        }
    }
    Ok(None)
}

/// POST /register
pub fn create_user(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let body = req.body();

    let value: serde_json::Value = serde_json::from_slice(body)?;
    let email = value["email"].as_str().unwrap_or("").trim().to_lowercase();
    let username = sanitize_text(value["username"].as_str().unwrap_or("").trim());
    let display_name = sanitize_text(value["displayName"].as_str().unwrap_or("").trim());
    let password = value["password"].as_str().unwrap_or("").trim();

    if let Err(e) = validate_email(&email)
        .and_then(|_| validate_username(&username))
        .and_then(|_| validate_display_name(&display_name))
    {
        return Ok(e.into());
    }
    if password.len() < MIN_PASSWORD_LENGTH || password.len() > MAX_PASSWORD_LENGTH {
        return Ok(ApiError::BadRequest("Password must be 6-150 characters".to_string()).into());
    }

    if find_by_username(&store, &username)?.is_some() {
        return Ok(ApiError::Conflict("Username already taken".to_string()).into());
    }
    if find_by_email(&store, &email)?.is_some() {
        return Ok(ApiError::Conflict("Email already registered".to_string()).into());
    }

    let id = Uuid::new_v4().to_string();
    let user = User {
        id: id.clone(),
        username,
        email: email.clone(),
        password: hash_password(password)?,
        display_name,
        image: gravatar_url(&email),
        banner: None,
        bio: None,
        created_at: now(),
        updated_at: now(),
    };

    store.set_json(&user_key(&id), &user)?;

    let mut users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
    users.push(id.clone());
    store.set_json(USERS_LIST_KEY, &users)?;

    tracing::info!(user = %id, "registered account");

    // Registration signs the account in right away.
    let token = issue_token(&store, &id)?;
    let resp = serde_json::json!({
        "token": token,
        "account": user.to_account_response(),
    });

    Ok(Response::builder()
        .status(201)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&resp)?)
        .build())
}

/// GET /account
pub fn current_account(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let store = store();
    match store.get_json::<User>(&user_key(&user_id))? {
        Some(user) => Ok(Response::builder()
            .status(200)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&user.to_account_response())?)
            .build()),
        None => Ok(ApiError::NotFound("User not found".to_string()).into()),
    }
}

/// PUT /account — each field is optional; present fields are validated and
/// checked against the unique username/email constraints.
pub fn update_account(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let store = store();
    let mut user = match store.get_json::<User>(&user_key(&user_id))? {
        Some(u) => u,
        None => return Ok(ApiError::NotFound("User not found".to_string()).into()),
    };

    let value: serde_json::Value = serde_json::from_slice(req.body())?;

    if let Some(username) = value["username"].as_str() {
        let username = sanitize_text(username.trim());
        if let Err(e) = validate_username(&username) {
            return Ok(e.into());
        }
        if let Some(existing) = find_by_username(&store, &username)? {
            if existing.id != user_id {
                return Ok(ApiError::Conflict("Username already taken".to_string()).into());
            }
        }
        user.username = username;
    }

    if let Some(email) = value["email"].as_str() {
        let email = email.trim().to_lowercase();
        if let Err(e) = validate_email(&email) {
            return Ok(e.into());
        }
        if let Some(existing) = find_by_email(&store, &email)? {
            if existing.id != user_id {
                return Ok(ApiError::Conflict("Email already registered".to_string()).into());
            }
        }
        user.email = email;
    }

    if let Some(display_name) = value["displayName"].as_str() {
        let display_name = sanitize_text(display_name.trim());
        if let Err(e) = validate_display_name(&display_name) {
            return Ok(e.into());
        }
        user.display_name = display_name;
    }

    if let Some(bio) = value["bio"].as_str() {
        if bio.len() > MAX_BIO_LENGTH {
            return Ok(ApiError::BadRequest("Bio too long (max 160 chars)".to_string()).into());
        }
        let sanitized = sanitize_text(bio.trim());
        user.bio = if sanitized.is_empty() {
            None
        } else {
            Some(sanitized)
        };
    }

    user.updated_at = now();
    store.set_json(&user_key(&user_id), &user)?;

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&user.to_account_response())?)
        .build())
}

fn image_upload(req: Request, banner: bool) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let store = store();
    let mut user = match store.get_json::<User>(&user_key(&user_id))? {
        Some(u) => u,
        None => return Ok(ApiError::NotFound("User not found".to_string()).into()),
    };

    let stored = match media::store_upload(&store, &req) {
        Ok(s) => s,
        Err(e) => return Ok(e.into()),
    };

    // Swap the reference, then drop the previous blob.
    let previous = if banner {
        user.banner.replace(stored.url.clone())
    } else {
        Some(std::mem::replace(&mut user.image, stored.url.clone()))
    };
    user.updated_at = now();
    store.set_json(&user_key(&user_id), &user)?;

    if let Some(old_url) = previous {
        media::delete_blob_by_url(&store, &old_url)?;
    }

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&user.to_account_response())?)
        .build())
}

/// POST /account/avatar — raw image body, replaces the avatar.
pub fn upload_avatar(req: Request) -> anyhow::Result<Response> {
    image_upload(req, false)
}

/// POST /account/banner
pub fn upload_banner(req: Request) -> anyhow::Result<Response> {
    image_upload(req, true)
}

/// GET /profiles/{username} — public, viewer-relative.
pub fn get_profile(req: Request) -> anyhow::Result<Response> {
    let viewer = viewer_id(&req);
    let path = req.path();
    let username = path.trim_start_matches("/profiles/");

    let store = store();
    let user = match find_by_username(&store, username)? {
        Some(u) => u,
        None => return Ok(ApiError::NotFound("Profile not found".to_string()).into()),
    };

    let followers = get_followers(&store, &user.id)?;
    let followings = get_followings(&store, &user.id)?;
    let profile = user.to_profile(&followers, &followings, &viewer);

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&profile)?)
        .build())
}

/// GET /profiles?search= — case-insensitive substring match on usernames.
pub fn search_profiles(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let params = parse_query_params(req.uri());
    let term = get_string(&params, "search").unwrap_or_default().to_lowercase();

    let store = store();
    let users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();

    let mut response: Vec<Profile> = Vec::new();
    for id in users {
        if let Some(u) = store.get_json::<User>(&user_key(&id))? {
            if u.username.to_lowercase().contains(&term) {
                let followers = get_followers(&store, &u.id)?;
                let followings = get_followings(&store, &u.id)?;
                response.push(u.to_profile(&followers, &followings, &user_id));
            }
        }
    }

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&response)?)
        .build())
}
