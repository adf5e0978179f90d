use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};
use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct User {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
}

impl User {
    /// Placeholder injected when the configured user cannot be resolved.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Feed {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
    pub url: String,
    pub user_id: Uuid,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

/// A feed row joined with the name of the user who added it.
#[derive(Debug, Clone, FromRow)]
pub struct FeedWithOwner {
    pub name: String,
    pub url: String,
    pub owner: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct FeedFollow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub feed_id: Uuid,
}

/// One entry of a user's follow list, in follow-creation order.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct FollowedFeed {
    pub follow_id: Uuid,
    pub feed_id: Uuid,
    pub feed_name: String,
    pub url: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    pub user_id: Uuid,
    pub feed_id: Uuid,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewPost<'a> {
    pub user_id: Uuid,
    pub feed_id: Uuid,
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub url: &'a str,
    pub published_at: Option<DateTime<Utc>>,
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        // Every connection to an in-memory database sees its own empty copy.
        let in_memory = database_url.contains(":memory:");
        let mut options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 5 });
        if in_memory {
            options = options.idle_timeout(None).max_lifetime(None);
        }

        let pool = options
            .connect(database_url)
            .await
            .map_err(Error::database("connect"))?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id BLOB PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                name TEXT NOT NULL UNIQUE
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS feeds (
                id BLOB PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                name TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                last_fetched_at TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS feed_follows (
                id BLOB PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                feed_id BLOB NOT NULL REFERENCES feeds(id) ON DELETE CASCADE
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id BLOB PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                read_at TEXT,
                user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                feed_id BLOB NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
                title TEXT,
                description TEXT,
                url TEXT NOT NULL,
                published_at TEXT
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_posts_user_published
            ON posts(user_id, published_at DESC)
            "#,
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(Error::database("initialize"))?;
        }

        Ok(())
    }

    pub async fn create_user(&self, name: &str) -> Result<User> {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            name: name.to_string(),
        };

        sqlx::query("INSERT INTO users (id, created_at, updated_at, name) VALUES (?, ?, ?, ?)")
            .bind(user.id)
            .bind(user.created_at)
            .bind(user.updated_at)
            .bind(&user.name)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::UserExists(name.to_string())
                } else {
                    Error::database("create_user")(e)
                }
            })?;

        Ok(user)
    }

    pub async fn get_user(&self, name: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::database("get_user"))?;
        Ok(user)
    }

    pub async fn get_users(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::database("get_users"))?;
        Ok(users)
    }

    /// Removes every user; feeds, follows and posts go with them.
    pub async fn delete_users(&self) -> Result<()> {
        sqlx::query("DELETE FROM users")
            .execute(&self.pool)
            .await
            .map_err(Error::database("delete_users"))?;
        Ok(())
    }

    pub async fn create_feed(&self, name: &str, url: &str, user_id: Uuid) -> Result<Feed> {
        let now = Utc::now();
        let feed = Feed {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            name: name.to_string(),
            url: url.to_string(),
            user_id,
            last_fetched_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO feeds (id, created_at, updated_at, name, url, user_id)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(feed.id)
        .bind(feed.created_at)
        .bind(feed.updated_at)
        .bind(&feed.name)
        .bind(&feed.url)
        .bind(feed.user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::FeedExists(url.to_string())
            } else {
                Error::database("create_feed")(e)
            }
        })?;

        Ok(feed)
    }

    pub async fn get_feed(&self, url: &str) -> Result<Option<Feed>> {
        let feed = sqlx::query_as::<_, Feed>("SELECT * FROM feeds WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::database("get_feed"))?;
        Ok(feed)
    }

    pub async fn get_feeds(&self) -> Result<Vec<FeedWithOwner>> {
        let feeds = sqlx::query_as::<_, FeedWithOwner>(
            r#"
            SELECT f.name, f.url, u.name AS owner
            FROM feeds f
            JOIN users u ON u.id = f.user_id
            ORDER BY f.rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::database("get_feeds"))?;
        Ok(feeds)
    }

    pub async fn delete_feeds(&self) -> Result<()> {
        sqlx::query("DELETE FROM feeds")
            .execute(&self.pool)
            .await
            .map_err(Error::database("delete_feeds"))?;
        Ok(())
    }

    pub async fn mark_feed_fetched(&self, feed_id: Uuid) -> Result<()> {
        let now = Utc::now();
        sqlx::query("UPDATE feeds SET last_fetched_at = ?, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(now)
            .bind(feed_id)
            .execute(&self.pool)
            .await
            .map_err(Error::database("mark_feed_fetched"))?;
        Ok(())
    }

    /// Duplicate (user, feed) pairs are accepted and produce separate rows.
    pub async fn create_feed_follow(&self, user_id: Uuid, feed_id: Uuid) -> Result<FeedFollow> {
        let now = Utc::now();
        let follow = FeedFollow {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            user_id,
            feed_id,
        };

        sqlx::query(
            r#"
            INSERT INTO feed_follows (id, created_at, updated_at, user_id, feed_id)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(follow.id)
        .bind(follow.created_at)
        .bind(follow.updated_at)
        .bind(follow.user_id)
        .bind(follow.feed_id)
        .execute(&self.pool)
        .await
        .map_err(Error::database("create_feed_follow"))?;

        Ok(follow)
    }

    /// Returns the number of follow rows removed.
    pub async fn delete_feed_follow(&self, user_id: Uuid, feed_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM feed_follows WHERE user_id = ? AND feed_id = ?")
            .bind(user_id)
            .bind(feed_id)
            .execute(&self.pool)
            .await
            .map_err(Error::database("delete_feed_follow"))?;
        Ok(result.rows_affected())
    }

    pub async fn get_feed_follows(&self, username: &str) -> Result<Vec<FollowedFeed>> {
        let follows = sqlx::query_as::<_, FollowedFeed>(
            r#"
            SELECT ff.id AS follow_id, f.id AS feed_id, f.name AS feed_name, f.url
            FROM feed_follows ff
            JOIN feeds f ON f.id = ff.feed_id
            JOIN users u ON u.id = ff.user_id
            WHERE u.name = ?
            ORDER BY ff.rowid
            "#,
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::database("get_feed_follows"))?;
        Ok(follows)
    }

    pub async fn add_post(&self, post: &NewPost<'_>) -> Result<Post> {
        let now = Utc::now();
        let stored = Post {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            read_at: None,
            user_id: post.user_id,
            feed_id: post.feed_id,
            title: post.title.map(str::to_string),
            description: post.description.map(str::to_string),
            url: post.url.to_string(),
            published_at: post.published_at,
        };

        sqlx::query(
            r#"
            INSERT INTO posts (id, created_at, updated_at, user_id, feed_id,
                               title, description, url, published_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(stored.id)
        .bind(stored.created_at)
        .bind(stored.updated_at)
        .bind(stored.user_id)
        .bind(stored.feed_id)
        .bind(&stored.title)
        .bind(&stored.description)
        .bind(&stored.url)
        .bind(stored.published_at)
        .execute(&self.pool)
        .await
        .map_err(Error::database("add_post"))?;

        Ok(stored)
    }

    pub async fn get_posts(&self, user_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT * FROM posts
            WHERE user_id = ?
            ORDER BY published_at DESC NULLS LAST, rowid DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::database("get_posts"))?;
        Ok(posts)
    }

    pub async fn count_posts_for_user(&self, user_id: Uuid) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::database("count_posts_for_user"))?;
        Ok(count.0)
    }
}
