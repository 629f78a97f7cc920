use spin_sdk::http::{Request, Response};
use spin_sdk::key_value::Store;
use uuid::Uuid;

use crate::config::*;
use crate::core::errors::ApiError;
use crate::core::helpers::{now, store, verify_password};
use crate::models::models::{TokenData, User};
use crate::users::find_by_email;

/// Create a bearer token for the user and record it in the store.
pub fn issue_token(store: &Store, user_id: &str) -> anyhow::Result<String> {
    let token = Uuid::new_v4().to_string();
    let data = TokenData {
        user_id: user_id.to_string(),
        created_at: now(),
    };
    store.set_json(&token_key(&token), &data)?;

    let mut tokens: Vec<String> = store.get_json(TOKENS_LIST_KEY)?.unwrap_or_default();
    tokens.push(token.clone());
    store.set_json(TOKENS_LIST_KEY, &tokens)?;

    Ok(token)
}

pub fn login_user(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let creds: serde_json::Value = serde_json::from_slice(req.body())?;
    let email = creds["email"].as_str().unwrap_or_default().trim().to_lowercase();
    let password = creds["password"].as_str().unwrap_or_default();

    // A uniform Unauthorized for unknown email and wrong password alike.
    let user = match find_by_email(&store, &email)? {
        Some(u) => u,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    if !verify_password(password, &user.password) {
        tracing::warn!(email = %email, "rejected login attempt");
        return Ok(ApiError::Unauthorized.into());
    }

    let token = issue_token(&store, &user.id)?;

    let resp = serde_json::json!({
        "token": token,
        "account": user.to_account_response(),
    });
    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&resp)?)
        .build())
}

pub fn logout_user(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let auth_header = req
        .header("Authorization")
        .and_then(|h| h.as_str())
        .unwrap_or_default();

    if !auth_header.starts_with("Bearer ") {
        return Ok(ApiError::Unauthorized.into());
    }

    let token = auth_header.strip_prefix("Bearer ").unwrap();
    store.delete(&token_key(token))?;

    let mut tokens: Vec<String> = store.get_json(TOKENS_LIST_KEY)?.unwrap_or_default();
    tokens.retain(|t| t != token);
    store.set_json(TOKENS_LIST_KEY, &tokens)?;

    let resp = serde_json::json!({ "message": "Logged out successfully" });
    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&resp)?)
        .build())
}

/// Resolve the bearer token to a user id. None for missing, expired,
/// or orphaned tokens.
pub fn validate_token(req: &Request) -> Option<String> {
    let store = store();
    let auth_header = req.header("Authorization")?.as_str().unwrap_or_default();
    if !auth_header.starts_with("Bearer ") {
        return None;
    }
    let token = auth_header.strip_prefix("Bearer ").unwrap();
    if let Some(data) = store.get_json::<TokenData>(&token_key(token)).ok()? {
        let age_hours = (now() - data.created_at).num_hours();
        if age_hours > token_expiration_hours() {
            return None;
        }
        // Check if the user still exists
        if store.get_json::<User>(&user_key(&data.user_id)).ok()?.is_none() {
            return None;
        }
        Some(data.user_id)
    } else {
        None
    }
}

/// Viewer id for endpoints that serve anonymous requests too: the resolved
/// user id, or an empty string when no valid token is presented.
pub fn viewer_id(req: &Request) -> String {
    validate_token(req).unwrap_or_default()
}
