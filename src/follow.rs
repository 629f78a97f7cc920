use spin_sdk::http::{Request, Response};
use spin_sdk::key_value::Store;

use crate::auth::validate_token;
use crate::config::*;
use crate::core::errors::ApiError;
use crate::core::helpers::store;
use crate::models::models::is_member;
use crate::users::find_by_username;

/// Add one directed follow edge. Both directions of the edge set are kept in
/// the store and always written together. Membership-checked, so repeating
/// the call cannot create a duplicate edge.
pub fn add_follow(store: &Store, user_id: &str, follower_id: &str) -> anyhow::Result<()> {
    let mut followers: Vec<String> = store.get_json(&followers_key(user_id))?.unwrap_or_default();
    if !followers.iter().any(|id| id == follower_id) {
        followers.push(follower_id.to_string());
        store.set_json(&followers_key(user_id), &followers)?;
    }

    let mut followings: Vec<String> = store
        .get_json(&followings_key(follower_id))?
        .unwrap_or_default();
    if !followings.iter().any(|id| id == user_id) {
        followings.push(user_id.to_string());
        store.set_json(&followings_key(follower_id), &followings)?;
    }

    Ok(())
}

pub fn remove_follow(store: &Store, user_id: &str, follower_id: &str) -> anyhow::Result<()> {
    let mut followers: Vec<String> = store.get_json(&followers_key(user_id))?.unwrap_or_default();
    followers.retain(|id| id != follower_id);
    store.set_json(&followers_key(user_id), &followers)?;

    let mut followings: Vec<String> = store
        .get_json(&followings_key(follower_id))?
        .unwrap_or_default();
    followings.retain(|id| id != user_id);
    store.set_json(&followings_key(follower_id), &followings)?;

    Ok(())
}

pub fn get_followings(store: &Store, user_id: &str) -> anyhow::Result<Vec<String>> {
    Ok(store.get_json(&followings_key(user_id))?.unwrap_or_default())
}

pub fn get_followers(store: &Store, user_id: &str) -> anyhow::Result<Vec<String>> {
    Ok(store.get_json(&followers_key(user_id))?.unwrap_or_default())
}

// === HTTP Handlers ===

/// POST /profiles/{username}/follow — follow if not yet following,
/// unfollow otherwise. Responds with the refreshed profile.
pub fn toggle_follow(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let path = req.path();
    let username = path
        .trim_start_matches("/profiles/")
        .trim_end_matches("/follow");

    let store = store();
    let target = match find_by_username(&store, username)? {
        Some(u) => u,
        None => return Ok(ApiError::NotFound("Profile not found".to_string()).into()),
    };

    if target.id == user_id {
        return Ok(ApiError::BadRequest("Cannot follow yourself".to_string()).into());
    }

    let followers = get_followers(&store, &target.id)?;
    if is_member(&user_id, &followers) {
        remove_follow(&store, &target.id, &user_id)?;
    } else {
        add_follow(&store, &target.id, &user_id)?;
    }
    tracing::info!(user = %user_id, target = %target.id, "toggled follow");

    let followers = get_followers(&store, &target.id)?;
    let followings = get_followings(&store, &target.id)?;
    let profile = target.to_profile(&followers, &followings, &user_id);

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&profile)?)
        .build())
}
