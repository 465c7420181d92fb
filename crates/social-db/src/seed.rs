//! Demo data generator. Every account goes through the normal invite and
//! activate path so seeded rows look like real ones.

use anyhow::{Result, anyhow};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::context::CallContext;
use crate::error::StoreError;
use crate::invitation;
use crate::models::{Comment, Password, Post, User};
use crate::storage::Storage;

const TITLES: &[&str] = &[
    "The Power of Habit",
    "Embracing Minimalism",
    "Healthy Eating Tips",
    "Travel on a Budget",
    "Mindfulness Meditation",
    "Boost Your Productivity",
    "Home Office Setup",
    "Digital Detox",
    "Gardening Basics",
    "DIY Home Projects",
];

const CONTENTS: &[&str] = &[
    "Small daily changes compound into results you can actually see.",
    "Owning less turned out to mean worrying less.",
    "A few simple swaps made weeknight cooking easier and healthier.",
    "You can see a lot of the world without spending a lot of money.",
    "Ten minutes of quiet in the morning sets the tone for the day.",
    "Batching shallow work freed up whole afternoons for deep work.",
    "Light, a decent chair and one clean surface go a long way.",
    "A weekend offline was harder and better than expected.",
    "Start with herbs; they forgive almost every mistake.",
    "Fixing things yourself is cheaper and oddly satisfying.",
];

const TAGS: &[&str] = &[
    "self-improvement",
    "minimalism",
    "health",
    "travel",
    "mindfulness",
    "productivity",
    "home",
    "wellness",
    "gardening",
    "diy",
];

const COMMENTS: &[&str] = &[
    "Great post, thanks for sharing!",
    "I completely agree with your thoughts.",
    "Thanks for the tips, very helpful.",
    "Interesting perspective, I hadn't considered that.",
    "Thanks for sharing your experience.",
    "Well written, I enjoyed reading this.",
    "This is very insightful, thanks for posting.",
    "Great advice, I'll definitely try that.",
    "I love this, very inspirational.",
    "Thanks for the information, very useful.",
];

#[derive(Debug, Clone)]
pub struct SeedOptions {
    pub users: usize,
    pub posts: usize,
    pub comments: usize,
    pub follows: usize,
    pub rng_seed: u64,
    pub invite_ttl: chrono::Duration,
    pub password: String,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            users: 100,
            posts: 200,
            comments: 500,
            follows: 300,
            rng_seed: 42,
            invite_ttl: chrono::Duration::hours(72),
            password: "password123".to_string(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub users: usize,
    pub posts: usize,
    pub comments: usize,
    pub follows: usize,
}

pub async fn run(storage: &Storage, ctx: &CallContext, opts: &SeedOptions) -> Result<SeedReport> {
    let mut rng = StdRng::seed_from_u64(opts.rng_seed);
    let mut report = SeedReport::default();

    // One hash for every seeded account keeps seeding fast.
    let password = Password::new(&opts.password)
        .map_err(|e| anyhow!("failed to hash seed password: {e}"))?;

    let mut user_ids = Vec::with_capacity(opts.users);
    for i in 0..opts.users {
        let mut user = User::new(
            format!("user{i}"),
            format!("user{i}@example.com"),
            password.clone(),
        );
        let token = invitation::new_token();
        storage
            .users
            .create_and_invite(ctx, &mut user, &token.hash, opts.invite_ttl)
            .await?;
        storage.users.activate(ctx, &token.plaintext).await?;
        user_ids.push(user.id);
        report.users += 1;
    }

    if user_ids.is_empty() {
        return Ok(report);
    }

    let mut post_ids = Vec::with_capacity(opts.posts);
    for _ in 0..opts.posts {
        let author = user_ids[rng.random_range(0..user_ids.len())];
        let tags = vec![
            TAGS[rng.random_range(0..TAGS.len())].to_string(),
            TAGS[rng.random_range(0..TAGS.len())].to_string(),
        ];
        let mut post = Post::new(
            author,
            TITLES[rng.random_range(0..TITLES.len())],
            CONTENTS[rng.random_range(0..CONTENTS.len())],
            tags,
        );
        storage.posts.create(ctx, &mut post).await?;
        post_ids.push(post.id);
        report.posts += 1;
    }

    if !post_ids.is_empty() {
        for _ in 0..opts.comments {
            let mut comment = Comment::new(
                post_ids[rng.random_range(0..post_ids.len())],
                user_ids[rng.random_range(0..user_ids.len())],
                COMMENTS[rng.random_range(0..COMMENTS.len())],
            );
            storage.comments.create(ctx, &mut comment).await?;
            report.comments += 1;
        }
    }

    if user_ids.len() > 1 {
        for _ in 0..opts.follows {
            let follower = user_ids[rng.random_range(0..user_ids.len())];
            let followee = user_ids[rng.random_range(0..user_ids.len())];
            if follower == followee {
                continue;
            }
            match storage.followers.follow(ctx, follower, followee).await {
                Ok(()) => report.follows += 1,
                Err(StoreError::Conflict) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    info!(
        users = report.users,
        posts = report.posts,
        comments = report.comments,
        follows = report.follows,
        "seeding complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> SeedOptions {
        SeedOptions {
            users: 4,
            posts: 6,
            comments: 10,
            follows: 8,
            ..SeedOptions::default()
        }
    }

    #[tokio::test]
    async fn seeds_requested_volume_in_memory() {
        let storage = Storage::in_memory();
        let ctx = CallContext::background();
        let report = run(&storage, &ctx, &small()).await.unwrap();

        assert_eq!(report.users, 4);
        assert_eq!(report.posts, 6);
        assert_eq!(report.comments, 10);
        assert!(report.follows <= 8);

        for id in 1..=4 {
            let user = storage.users.get_by_id(&ctx, id).await.unwrap();
            assert!(user.is_active);
        }
    }

    #[tokio::test]
    async fn empty_options_seed_nothing() {
        let storage = Storage::in_memory();
        let opts = SeedOptions {
            users: 0,
            ..small()
        };
        let report = run(&storage, &CallContext::background(), &opts).await.unwrap();
        assert_eq!(report, SeedReport::default());
    }
}
