use spin_sdk::key_value::Store;
use uuid::Uuid;

use crate::config::*;
use crate::core::helpers::{hash_password, now};
use crate::models::models::{Post, RetweetEntry, User};
use crate::posts::extract_hashtags;

fn demo_user(id: &str, username: &str, email: &str, bio: &str) -> anyhow::Result<User> {
    Ok(User {
        id: id.to_string(),
        username: username.to_string(),
        email: email.to_string(),
        password: hash_password(username)?,
        display_name: format!("{}{}", username[..1].to_uppercase(), &username[1..]),
        image: crate::core::helpers::gravatar_url(email),
        banner: None,
        bio: Some(bio.to_string()),
        created_at: now(),
        updated_at: now(),
    })
}

fn demo_post(user_id: &str, text: &str) -> Post {
    Post {
        id: Uuid::new_v4().to_string(),
        text: Some(text.to_string()),
        file: None,
        hash_tags: extract_hashtags(text),
        user_id: user_id.to_string(),
        created_at: now(),
    }
}

/// Seed a couple of demo accounts with posts and a follow edge so a fresh
/// store has something to render. Safe to call repeatedly.
pub fn seed_demo_data(store: &Store) -> anyhow::Result<()> {
    let users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();

    for id in &users {
        if let Some(u) = store.get_json::<User>(&user_key(id))? {
            if u.username == "alice" {
                return Ok(()); // Already seeded
            }
        }
    }

    let alice = demo_user(
        &Uuid::new_v4().to_string(),
        "alice",
        "alice@example.com",
        "Hello, I'm Alice!",
    )?;
    let bob = demo_user(
        &Uuid::new_v4().to_string(),
        "bobby",
        "bob@example.com",
        "Bob's corner of the internet",
    )?;

    store.set_json(&user_key(&alice.id), &alice)?;
    store.set_json(&user_key(&bob.id), &bob)?;

    let mut users = users;
    users.push(alice.id.clone());
    users.push(bob.id.clone());
    store.set_json(USERS_LIST_KEY, &users)?;

    let mut posts: Vec<String> = store.get_json(POSTS_LIST_KEY)?.unwrap_or_default();

    let first = demo_post(&bob.id, "Just joined, looking forward to connecting! #introductions");
    let second = demo_post(&bob.id, "Finished an amazing project today #rust");
    let third = demo_post(&alice.id, "Welcome to my timeline");

    for post in [&first, &second, &third] {
        store.set_json(&post_key(&post.id), post)?;
        posts.insert(0, post.id.clone());
    }
    store.set_json(POSTS_LIST_KEY, &posts)?;

    // alice follows bob, and retweets his first post
    store.set_json(&followings_key(&alice.id), &vec![bob.id.clone()])?;
    store.set_json(&followers_key(&bob.id), &vec![alice.id.clone()])?;
    store.set_json(
        &retweets_key(&first.id),
        &vec![RetweetEntry {
            user_id: alice.id.clone(),
            created_at: now(),
        }],
    )?;

    Ok(())
}

/// Clear every key this crate writes. Used by the integration suite to get
/// back to a blank store between runs.
pub fn reset_data(store: &Store) -> anyhow::Result<()> {
    let users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();

    for id in &users {
        store.delete(&user_key(id))?;
        store.delete(&followings_key(id))?;
        store.delete(&followers_key(id))?;
    }

    let posts: Vec<String> = store.get_json(POSTS_LIST_KEY)?.unwrap_or_default();
    for id in &posts {
        store.delete(&post_key(id))?;
        store.delete(&likes_key(id))?;
        store.delete(&retweets_key(id))?;
    }

    let tokens: Vec<String> = store.get_json(TOKENS_LIST_KEY)?.unwrap_or_default();
    for token in &tokens {
        store.delete(&token_key(token))?;
    }

    let media: Vec<String> = store.get_json(MEDIA_LIST_KEY)?.unwrap_or_default();
    for filename in &media {
        store.delete(&media_key(filename))?;
    }

    store.delete(USERS_LIST_KEY)?;
    store.delete(POSTS_LIST_KEY)?;
    store.delete(TOKENS_LIST_KEY)?;
    store.delete(MEDIA_LIST_KEY)?;

    Ok(())
}
