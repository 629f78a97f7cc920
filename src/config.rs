/// Page size shared by every paginated query (feed, profile lists, search).
/// A single value keeps client-side cursor handling uniform.
pub const PAGE_LIMIT: usize = 20;

pub const MAX_TEXT_LENGTH: usize = 280;
pub const MAX_BIO_LENGTH: usize = 160;
pub const MIN_USERNAME_LENGTH: usize = 4;
pub const MAX_USERNAME_LENGTH: usize = 15;
pub const MIN_DISPLAY_NAME_LENGTH: usize = 4;
pub const MAX_DISPLAY_NAME_LENGTH: usize = 50;
pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MAX_PASSWORD_LENGTH: usize = 150;
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

pub const USERS_LIST_KEY: &str = "users_list";
pub const POSTS_LIST_KEY: &str = "posts_list";
pub const TOKENS_LIST_KEY: &str = "tokens_list";
pub const MEDIA_LIST_KEY: &str = "media_list";

pub fn user_key(id: &str) -> String {
    format!("user:{}", id)
}

pub fn post_key(id: &str) -> String {
    format!("post:{}", id)
}

pub fn token_key(token: &str) -> String {
    format!("token:{}", token)
}

pub fn likes_key(post_id: &str) -> String {
    format!("likes:{}", post_id)
}

pub fn retweets_key(post_id: &str) -> String {
    format!("retweets:{}", post_id)
}

pub fn followings_key(user_id: &str) -> String {
    format!("followings:{}", user_id)
}

pub fn followers_key(user_id: &str) -> String {
    format!("followers:{}", user_id)
}

pub fn media_key(filename: &str) -> String {
    format!("media:{}", filename)
}

pub fn media_url(filename: &str) -> String {
    format!("/media/{}", filename)
}

pub fn token_expiration_hours() -> i64 {
    std::env::var("CHIRP_TOKEN_EXPIRATION_HOURS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(24)
}

pub fn seed_demo_enabled() -> bool {
    std::env::var("CHIRP_SEED_DEMO")
        .map(|v| v == "true")
        .unwrap_or(false)
}

pub fn bind_address() -> String {
    std::env::var("CHIRP_BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string())
}
