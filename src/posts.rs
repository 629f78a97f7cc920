use ammonia::Builder;
use regex::Regex;
use spin_sdk::http::{Request, Response};
use std::sync::OnceLock;
use uuid::Uuid;

use crate::auth::{validate_token, viewer_id};
use crate::config::*;
use crate::core::errors::ApiError;
use crate::core::helpers::{now, store, validate_uuid};
use crate::feed::load_post_view_by_id;
use crate::follow::{get_followers, get_followings};
use crate::media;
use crate::models::models::{File, Post, PostView, RetweetEntry, User};

fn hashtag_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"#[0-9A-Za-z_]+").expect("Regex should compile"))
}

/// Pull the hashtag list out of a post's text. Runs once at creation time;
/// the stored list never changes afterwards.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    hashtag_regex()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn sanitize_text(text: &str) -> String {
    Builder::default()
        .tags(std::collections::HashSet::new())
        .clean(text)
        .to_string()
}

/// POST /posts — JSON body `{"text": ..., "filename": ...}` where `filename`
/// references a blob stored through POST /media. Text, a file, or both.
pub fn create_post(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let store = store();
    let value: serde_json::Value = serde_json::from_slice(req.body())?;

    let text = value["text"]
        .as_str()
        .map(|t| sanitize_text(t.trim()))
        .filter(|t| !t.is_empty());
    let filename = value["filename"].as_str().filter(|f| !f.is_empty());

    if text.is_none() && filename.is_none() {
        return Ok(
            ApiError::BadRequest("text is required if no file is provided".to_string()).into(),
        );
    }
    if let Some(ref t) = text {
        if t.chars().count() > MAX_TEXT_LENGTH {
            return Ok(ApiError::BadRequest("text must be 1-280 characters".to_string()).into());
        }
    }

    let author = match store.get_json::<User>(&user_key(&user_id))? {
        Some(u) => u,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let id = Uuid::new_v4().to_string();

    let file = match filename {
        Some(name) => {
            if !media::blob_exists(&store, name)? {
                return Ok(ApiError::BadRequest("Unknown file".to_string()).into());
            }
            Some(File {
                id: Uuid::new_v4().to_string(),
                post_id: id.clone(),
                url: media_url(name),
                file_type: mime_guess::from_path(name)
                    .first_or_octet_stream()
                    .to_string(),
                filename: name.to_string(),
                created_at: now(),
            })
        }
        None => None,
    };

    let post = Post {
        id: id.clone(),
        hash_tags: text.as_deref().map(extract_hashtags).unwrap_or_default(),
        text,
        file,
        user_id: user_id.clone(),
        created_at: now(),
    };

    store.set_json(&post_key(&id), &post)?;

    let mut posts: Vec<String> = store.get_json(POSTS_LIST_KEY)?.unwrap_or_default();
    posts.insert(0, id.clone()); // prepend newest
    store.set_json(POSTS_LIST_KEY, &posts)?;

    tracing::info!(post = %id, author = %user_id, "created post");

    let view = PostView {
        post,
        likes: Vec::new(),
        retweets: Vec::new(),
        author_followers: get_followers(&store, &author.id)?,
        author_followings: get_followings(&store, &author.id)?,
        author,
    };

    Ok(Response::builder()
        .status(201)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&view.to_response(""))?)
        .build())
}

/// GET /posts/{id} — public.
pub fn get_post(req: Request) -> anyhow::Result<Response> {
    let viewer = viewer_id(&req);
    let path = req.path();
    let post_id = path.trim_start_matches("/posts/");

    if post_id.is_empty() || !validate_uuid(post_id) {
        return Ok(ApiError::BadRequest("Post ID required".to_string()).into());
    }

    let store = store();
    match load_post_view_by_id(&store, post_id)? {
        Some(view) => Ok(Response::builder()
            .status(200)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&view.to_response(&viewer))?)
            .build()),
        None => Ok(ApiError::NotFound("Post not found".to_string()).into()),
    }
}

/// DELETE /posts/{id} — author only. Drops the post together with its edges
/// and any attached media blob.
pub fn delete_post(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let path = req.path();
    let post_id = path.trim_start_matches("/posts/");

    if post_id.is_empty() || !validate_uuid(post_id) {
        return Ok(ApiError::BadRequest("Post ID required".to_string()).into());
    }

    let store = store();
    let post = match store.get_json::<Post>(&post_key(post_id))? {
        Some(p) => p,
        None => return Ok(ApiError::NotFound("Post not found".to_string()).into()),
    };

    if post.user_id != user_id {
        return Ok(ApiError::Forbidden.into());
    }

    if let Some(file) = &post.file {
        media::delete_blob(&store, &file.filename)?;
    }

    store.delete(&post_key(post_id))?;
    store.delete(&likes_key(post_id))?;
    store.delete(&retweets_key(post_id))?;

    let mut posts: Vec<String> = store.get_json(POSTS_LIST_KEY)?.unwrap_or_default();
    posts.retain(|id| id != post_id);
    store.set_json(POSTS_LIST_KEY, &posts)?;

    tracing::info!(post = %post_id, author = %user_id, "deleted post");

    Ok(Response::builder().status(204).build())
}

/// POST /posts/{id}/like — membership toggle on the like set.
pub fn like_post(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let path = req.path();
    let post_id = path.trim_start_matches("/posts/").trim_end_matches("/like");

    let store = store();
    let mut view = match load_post_view_by_id(&store, post_id)? {
        Some(v) => v,
        None => return Ok(ApiError::NotFound("Post not found".to_string()).into()),
    };

    if view.is_liked(&user_id) {
        view.likes.retain(|id| id != &user_id);
    } else {
        view.likes.push(user_id.clone());
    }
    store.set_json(&likes_key(post_id), &view.likes)?;

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&view.to_response(&user_id))?)
        .build())
}

/// POST /posts/{id}/retweet — same toggle shape as like, but the edge keeps
/// its creation time as the feed sort key.
pub fn retweet_post(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let path = req.path();
    let post_id = path
        .trim_start_matches("/posts/")
        .trim_end_matches("/retweet");

    let store = store();
    let mut view = match load_post_view_by_id(&store, post_id)? {
        Some(v) => v,
        None => return Ok(ApiError::NotFound("Post not found".to_string()).into()),
    };

    if view.is_retweeted(&user_id) {
        view.retweets.retain(|r| r.user_id != user_id);
    } else {
        view.retweets.push(RetweetEntry {
            user_id: user_id.clone(),
            created_at: now(),
        });
    }
    store.set_json(&retweets_key(post_id), &view.retweets)?;

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&view.to_response(&user_id))?)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_hashtags_from_text() {
        assert_eq!(
            extract_hashtags("hello #test and #Rust_2024!"),
            vec!["#test", "#Rust_2024"]
        );
        assert!(extract_hashtags("no tags here").is_empty());
        assert_eq!(extract_hashtags("#a#b"), vec!["#a", "#b"]);
    }

    #[test]
    fn sanitizer_strips_markup() {
        assert_eq!(sanitize_text("hi <b>there</b>"), "hi there");
        assert_eq!(sanitize_text("plain #tag"), "plain #tag");
    }
}
