use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub image: String,
    pub banner: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct Post {
    pub id: String,
    pub text: Option<String>,
    pub file: Option<File>,
    // Derived from the text once at creation time, immutable afterwards.
    pub hash_tags: Vec<String>,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct File {
    pub id: String,
    pub post_id: String,
    pub url: String,
    pub file_type: String,
    pub filename: String,
    pub created_at: DateTime<Utc>,
}

/// One retweet edge. The timestamp doubles as the feed sort key for posts
/// that reach a timeline through this retweet.
#[derive(Serialize, Deserialize, Clone)]
pub struct RetweetEntry {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
pub struct TokenData {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// Set membership with the anonymous-viewer guard: an empty viewer id is
/// never a member of anything.
pub fn is_member(id: &str, set: &[String]) -> bool {
    !id.is_empty() && set.iter().any(|m| m == id)
}

// === Client-facing projections ===

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: String,
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub image: String,
    pub banner: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub image: String,
    pub banner: Option<String>,
    pub bio: Option<String>,
    pub followers: usize,
    pub followee: usize,
    pub following: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct FileResponse {
    pub url: String,
    pub filetype: String,
    pub filename: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: String,
    pub text: Option<String>,
    pub likes: usize,
    pub liked: bool,
    pub retweets: usize,
    pub retweeted: bool,
    pub is_retweet: bool,
    pub file: Option<FileResponse>,
    pub author: Profile,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn to_account_response(&self) -> AccountResponse {
        AccountResponse {
            id: self.id.clone(),
            email: self.email.clone(),
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            image: self.image.clone(),
            banner: self.banner.clone(),
            bio: self.bio.clone(),
            created_at: self.created_at,
        }
    }

    /// Public profile as seen by `viewer_id`. The follower and following
    /// sets must already be loaded; this never touches the store.
    pub fn to_profile(&self, followers: &[String], followings: &[String], viewer_id: &str) -> Profile {
        Profile {
            id: self.id.clone(),
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            image: self.image.clone(),
            banner: self.banner.clone(),
            bio: self.bio.clone(),
            followers: followers.len(),
            followee: followings.len(),
            following: is_member(viewer_id, followers),
            created_at: self.created_at,
        }
    }
}

impl File {
    pub fn to_response(&self) -> FileResponse {
        FileResponse {
            url: self.url.clone(),
            filetype: self.file_type.clone(),
            filename: self.filename.clone(),
        }
    }
}

/// A post with every association the projections need, hydrated up front.
#[derive(Clone)]
pub struct PostView {
    pub post: Post,
    pub author: User,
    pub likes: Vec<String>,
    pub retweets: Vec<RetweetEntry>,
    pub author_followers: Vec<String>,
    pub author_followings: Vec<String>,
}

impl PostView {
    pub fn is_liked(&self, viewer_id: &str) -> bool {
        is_member(viewer_id, &self.likes)
    }

    pub fn is_retweeted(&self, viewer_id: &str) -> bool {
        !viewer_id.is_empty() && self.retweets.iter().any(|r| r.user_id == viewer_id)
    }

    pub fn author_profile(&self, viewer_id: &str) -> Profile {
        self.author
            .to_profile(&self.author_followers, &self.author_followings, viewer_id)
    }

    pub fn to_response(&self, viewer_id: &str) -> PostResponse {
        self.build_response(viewer_id, false)
    }

    /// Feed projection. `isRetweet` marks posts that reached the feed purely
    /// through a retweet: the viewer neither wrote them nor follows the author.
    pub fn to_feed_response(&self, viewer_id: &str) -> PostResponse {
        let is_retweet =
            self.post.user_id != viewer_id && !is_member(viewer_id, &self.author_followers);
        self.build_response(viewer_id, is_retweet)
    }

    /// Profile-posts projection: anything not authored by the profile owner
    /// is there because of a retweet.
    pub fn to_profile_posts_response(&self, owner_id: &str, viewer_id: &str) -> PostResponse {
        self.build_response(viewer_id, self.post.user_id != owner_id)
    }

    fn build_response(&self, viewer_id: &str, is_retweet: bool) -> PostResponse {
        PostResponse {
            id: self.post.id.clone(),
            text: self.post.text.clone(),
            likes: self.likes.len(),
            liked: self.is_liked(viewer_id),
            retweets: self.retweets.len(),
            retweeted: self.is_retweeted(viewer_id),
            is_retweet,
            file: self.post.file.as_ref().map(|f| f.to_response()),
            author: self.author_profile(viewer_id),
            created_at: self.post.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            username: format!("user{}", id),
            email: format!("{}@example.com", id),
            password: String::new(),
            display_name: format!("User {}", id),
            image: String::new(),
            banner: None,
            bio: None,
            created_at: ts(0),
            updated_at: ts(0),
        }
    }

    fn view(author: &str, likes: &[&str], retweeters: &[&str], followers: &[&str]) -> PostView {
        PostView {
            post: Post {
                id: "p1".to_string(),
                text: Some("hello".to_string()),
                file: None,
                hash_tags: vec![],
                user_id: author.to_string(),
                created_at: ts(100),
            },
            author: user(author),
            likes: likes.iter().map(|s| s.to_string()).collect(),
            retweets: retweeters
                .iter()
                .map(|s| RetweetEntry {
                    user_id: s.to_string(),
                    created_at: ts(200),
                })
                .collect(),
            author_followers: followers.iter().map(|s| s.to_string()).collect(),
            author_followings: vec![],
        }
    }

    #[test]
    fn anonymous_viewer_never_sees_membership() {
        let v = view("a", &["b"], &["b"], &["b"]);
        let resp = v.to_response("");
        assert!(!resp.liked);
        assert!(!resp.retweeted);
        assert!(!resp.author.following);
        assert_eq!(resp.likes, 1);
        assert_eq!(resp.retweets, 1);
        assert_eq!(resp.author.followers, 1);
    }

    #[test]
    fn member_viewer_sees_flags_and_counts() {
        let v = view("a", &["b", "c"], &["c"], &["b"]);
        let resp = v.to_response("b");
        assert!(resp.liked);
        assert!(!resp.retweeted);
        assert!(resp.author.following);
        assert_eq!(resp.likes, 2);

        let resp = v.to_response("c");
        assert!(resp.liked);
        assert!(resp.retweeted);
        assert!(!resp.author.following);
    }

    #[test]
    fn feed_marks_retweet_path_items() {
        // Viewer "x" neither wrote the post nor follows the author.
        let v = view("a", &[], &["y"], &["b"]);
        assert!(v.to_feed_response("x").is_retweet);
        // The author's own feed item is never a retweet.
        assert!(!v.to_feed_response("a").is_retweet);
        // Neither is one from a followed author.
        assert!(!v.to_feed_response("b").is_retweet);
    }

    #[test]
    fn profile_posts_mark_foreign_posts_as_retweets() {
        let v = view("a", &[], &[], &[]);
        assert!(!v.to_profile_posts_response("a", "").is_retweet);
        assert!(v.to_profile_posts_response("z", "").is_retweet);
    }
}
