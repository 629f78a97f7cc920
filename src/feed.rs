use chrono::{DateTime, Utc};
use spin_sdk::http::{Request, Response};
use spin_sdk::key_value::Store;

use crate::auth::{validate_token, viewer_id};
use crate::config::*;
use crate::core::errors::ApiError;
use crate::core::helpers::store;
use crate::core::pagination::{paginate, parse_cursor, Page};
use crate::core::query_params::{get_string, parse_query_params};
use crate::follow::get_followings;
use crate::models::models::{Post, PostResponse, PostView, User};
use crate::users::find_by_username;

// === Hydration ===

/// Load a post with everything the projections need. Returns None when the
/// post or its author is gone.
pub fn load_post_view(store: &Store, post: Post) -> anyhow::Result<Option<PostView>> {
    let author = match store.get_json::<User>(&user_key(&post.user_id))? {
        Some(u) => u,
        None => return Ok(None),
    };

    Ok(Some(PostView {
        likes: store.get_json(&likes_key(&post.id))?.unwrap_or_default(),
        retweets: store.get_json(&retweets_key(&post.id))?.unwrap_or_default(),
        author_followers: store
            .get_json(&followers_key(&author.id))?
            .unwrap_or_default(),
        author_followings: store
            .get_json(&followings_key(&author.id))?
            .unwrap_or_default(),
        author,
        post,
    }))
}

pub fn load_post_view_by_id(store: &Store, post_id: &str) -> anyhow::Result<Option<PostView>> {
    match store.get_json::<Post>(&post_key(post_id))? {
        Some(post) => load_post_view(store, post),
        None => Ok(None),
    }
}

/// Hydrate every known post. The candidate set for all query variants; the
/// selectors below narrow it down without further store access.
pub fn load_all_post_views(store: &Store) -> anyhow::Result<Vec<PostView>> {
    let ids: Vec<String> = store.get_json(POSTS_LIST_KEY)?.unwrap_or_default();

    let mut views = Vec::with_capacity(ids.len());
    for id in &ids {
        if let Some(post) = store.get_json::<Post>(&post_key(id))? {
            if let Some(view) = load_post_view(store, post)? {
                views.push(view);
            }
        }
    }
    Ok(views)
}

// === Query variants ===
// Pure selectors over hydrated views: each decides inclusion and the
// effective sort key, then defers ordering and the page cut to paginate().

/// Effective timestamp for a post reaching `user_id`'s timeline. The post's
/// own creation time when the direct path applies (authored it, or follows
/// the author); otherwise the latest qualifying retweet's time. None when no
/// path reaches the user at all.
fn effective_key(
    view: &PostView,
    user_id: &str,
    followings: &[String],
    include_followed_authors: bool,
) -> Option<DateTime<Utc>> {
    let direct = view.post.user_id == user_id
        || (include_followed_authors && followings.iter().any(|id| *id == view.post.user_id));
    if direct {
        return Some(view.post.created_at);
    }

    view.retweets
        .iter()
        .filter(|r| r.user_id == user_id || followings.iter().any(|id| *id == r.user_id))
        .map(|r| r.created_at)
        .max()
}

/// Home feed: posts the viewer wrote, posts by followed authors, and posts
/// retweeted by the viewer or by someone the viewer follows.
pub fn feed_page<'a>(
    views: &'a [PostView],
    viewer_id: &str,
    viewer_followings: &[String],
    cursor: Option<DateTime<Utc>>,
) -> Page<&'a PostView> {
    let keyed = views
        .iter()
        .filter_map(|v| effective_key(v, viewer_id, viewer_followings, true).map(|k| (k, v)))
        .collect();
    paginate(keyed, cursor)
}

/// Profile timeline: posts the owner wrote plus posts that reached the
/// profile through a retweet (the owner's own or a followee's). Unlike the
/// feed, merely being authored by a followee does not qualify.
pub fn profile_posts_page<'a>(
    views: &'a [PostView],
    owner_id: &str,
    owner_followings: &[String],
    cursor: Option<DateTime<Utc>>,
) -> Page<&'a PostView> {
    let keyed = views
        .iter()
        .filter_map(|v| effective_key(v, owner_id, owner_followings, false).map(|k| (k, v)))
        .collect();
    paginate(keyed, cursor)
}

/// Posts the owner has liked, newest first by the post's own creation time.
pub fn profile_likes_page<'a>(
    views: &'a [PostView],
    owner_id: &str,
    cursor: Option<DateTime<Utc>>,
) -> Page<&'a PostView> {
    let keyed = views
        .iter()
        .filter(|v| v.likes.iter().any(|id| id == owner_id))
        .map(|v| (v.post.created_at, v))
        .collect();
    paginate(keyed, cursor)
}

/// Posts the owner authored that carry a file.
pub fn profile_media_page<'a>(
    views: &'a [PostView],
    owner_id: &str,
    cursor: Option<DateTime<Utc>>,
) -> Page<&'a PostView> {
    let keyed = views
        .iter()
        .filter(|v| v.post.user_id == owner_id && v.post.file.is_some())
        .map(|v| (v.post.created_at, v))
        .collect();
    paginate(keyed, cursor)
}

/// Search-term normalization: trim, require content, prefix `#` when the
/// client omitted it, lowercase for the case-insensitive match.
pub fn normalize_term(raw: &str) -> Option<String> {
    let term = raw.trim();
    if term.is_empty() || term == "#" {
        return None;
    }
    if term.starts_with('#') {
        Some(term.to_lowercase())
    } else {
        Some(format!("#{}", term.to_lowercase()))
    }
}

/// Posts tagged with the (normalized) term. An empty term is a defined
/// no-match: it yields an empty page rather than every post or an error.
pub fn search_page<'a>(
    views: &'a [PostView],
    raw_term: &str,
    cursor: Option<DateTime<Utc>>,
) -> Page<&'a PostView> {
    let term = match normalize_term(raw_term) {
        Some(t) => t,
        None => return Page::empty(),
    };

    let keyed = views
        .iter()
        .filter(|v| v.post.hash_tags.iter().any(|t| t.eq_ignore_ascii_case(&term)))
        .map(|v| (v.post.created_at, v))
        .collect();
    paginate(keyed, cursor)
}

// === HTTP Handlers ===

fn page_response(
    page: &Page<&PostView>,
    project: impl Fn(&PostView) -> PostResponse,
) -> anyhow::Result<Response> {
    let posts: Vec<PostResponse> = page.items.iter().map(|(_, v)| project(v)).collect();
    let body = serde_json::json!({
        "posts": posts,
        "hasMore": page.has_more,
        "nextCursor": page.next_cursor().map(|k| k.to_rfc3339()),
    });

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&body)?)
        .build())
}

/// GET /posts/feed?cursor=
pub fn get_feed(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let params = parse_query_params(req.uri());
    let cursor = match parse_cursor(get_string(&params, "cursor").as_deref()) {
        Ok(c) => c,
        Err(e) => return Ok(e.into()),
    };

    let store = store();
    let followings = get_followings(&store, &user_id)?;
    let views = load_all_post_views(&store)?;

    let page = feed_page(&views, &user_id, &followings, cursor);
    page_response(&page, |v| v.to_feed_response(&user_id))
}

fn profile_page_request(req: &Request, suffix: &str) -> Result<(String, Option<DateTime<Utc>>), ApiError> {
    let path = req.path();
    let username = path
        .trim_start_matches("/profiles/")
        .trim_end_matches(suffix)
        .to_string();

    let params = parse_query_params(req.uri());
    let cursor = parse_cursor(get_string(&params, "cursor").as_deref())?;
    Ok((username, cursor))
}

/// GET /profiles/{username}/posts?cursor=
pub fn get_profile_posts(req: Request) -> anyhow::Result<Response> {
    let viewer = viewer_id(&req);
    let (username, cursor) = match profile_page_request(&req, "/posts") {
        Ok(v) => v,
        Err(e) => return Ok(e.into()),
    };

    let store = store();
    let owner = match find_by_username(&store, &username)? {
        Some(u) => u,
        None => return Ok(ApiError::NotFound("Profile not found".to_string()).into()),
    };

    let followings = get_followings(&store, &owner.id)?;
    let views = load_all_post_views(&store)?;

    let page = profile_posts_page(&views, &owner.id, &followings, cursor);
    page_response(&page, |v| v.to_profile_posts_response(&owner.id, &viewer))
}

/// GET /profiles/{username}/likes?cursor=
pub fn get_profile_likes(req: Request) -> anyhow::Result<Response> {
    let viewer = viewer_id(&req);
    let (username, cursor) = match profile_page_request(&req, "/likes") {
        Ok(v) => v,
        Err(e) => return Ok(e.into()),
    };

    let store = store();
    let owner = match find_by_username(&store, &username)? {
        Some(u) => u,
        None => return Ok(ApiError::NotFound("Profile not found".to_string()).into()),
    };

    let views = load_all_post_views(&store)?;
    let page = profile_likes_page(&views, &owner.id, cursor);
    page_response(&page, |v| v.to_response(&viewer))
}

/// GET /profiles/{username}/media?cursor=
pub fn get_profile_media(req: Request) -> anyhow::Result<Response> {
    let viewer = viewer_id(&req);
    let (username, cursor) = match profile_page_request(&req, "/media") {
        Ok(v) => v,
        Err(e) => return Ok(e.into()),
    };

    let store = store();
    let owner = match find_by_username(&store, &username)? {
        Some(u) => u,
        None => return Ok(ApiError::NotFound("Profile not found".to_string()).into()),
    };

    let views = load_all_post_views(&store)?;
    let page = profile_media_page(&views, &owner.id, cursor);
    page_response(&page, |v| v.to_response(&viewer))
}

/// GET /posts?search=&cursor= — hashtag search.
pub fn search_posts(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let params = parse_query_params(req.uri());
    let term = get_string(&params, "search").unwrap_or_default();
    let cursor = match parse_cursor(get_string(&params, "cursor").as_deref()) {
        Ok(c) => c,
        Err(e) => return Ok(e.into()),
    };

    let store = store();
    let views = load_all_post_views(&store)?;
    let page = search_page(&views, &term, cursor);
    page_response(&page, |v| v.to_response(&user_id))
}
