#[cfg(target_arch = "wasm32")]
use spin_sdk::{http::IntoResponse, http_component};
use spin_sdk::http::{Request, Response};

pub mod auth;
pub mod config;
pub mod core;
pub mod feed;
pub mod follow;
pub mod media;
pub mod models;
pub mod posts;
pub mod users;

use crate::core::errors::ApiError;

/// Dispatch a request to its handler. Shared between the Spin component
/// below and the native binary's adapter.
pub fn route(req: Request) -> anyhow::Result<Response> {
    let path = req.path().to_string();
    let method = req.method().to_string();

    match (method.as_str(), path.as_str()) {
        ("POST", "/register") => users::create_user(req),
        ("POST", "/login") => auth::login_user(req),
        ("POST", "/logout") => auth::logout_user(req),
        ("GET", "/account") => users::current_account(req),
        ("PUT", "/account") => users::update_account(req),
        ("POST", "/account/avatar") => users::upload_avatar(req),
        ("POST", "/account/banner") => users::upload_banner(req),
        ("GET", "/profiles") => users::search_profiles(req),
        ("POST", p) if p.starts_with("/profiles/") && p.ends_with("/follow") => {
            follow::toggle_follow(req)
        }
        ("GET", p) if p.starts_with("/profiles/") && p.ends_with("/posts") => {
            feed::get_profile_posts(req)
        }
        ("GET", p) if p.starts_with("/profiles/") && p.ends_with("/likes") => {
            feed::get_profile_likes(req)
        }
        ("GET", p) if p.starts_with("/profiles/") && p.ends_with("/media") => {
            feed::get_profile_media(req)
        }
        ("GET", p) if p.starts_with("/profiles/") && p.len() > 10 => users::get_profile(req),
        ("POST", "/posts") => posts::create_post(req),
        ("GET", "/posts") => feed::search_posts(req),
        ("GET", "/posts/feed") => feed::get_feed(req),
        ("POST", p) if p.starts_with("/posts/") && p.ends_with("/like") => posts::like_post(req),
        ("POST", p) if p.starts_with("/posts/") && p.ends_with("/retweet") => {
            posts::retweet_post(req)
        }
        ("GET", p) if p.starts_with("/posts/") && p.len() > 7 => posts::get_post(req),
        ("DELETE", p) if p.starts_with("/posts/") && p.len() > 7 => posts::delete_post(req),
        ("POST", "/media") => media::upload_media(req),
        ("GET", p) if p.starts_with("/media/") => media::serve_media(req),
        _ => Ok(ApiError::NotFound("No route for the given path found".to_string()).into()),
    }
}

// === Component entrypoint ===
#[cfg(target_arch = "wasm32")]
#[http_component]
fn handle(req: Request) -> anyhow::Result<impl IntoResponse> {
    if config::seed_demo_enabled() {
        let _ = crate::core::db::seed_demo_data(&crate::core::helpers::store());
    }

    route(req)
}
