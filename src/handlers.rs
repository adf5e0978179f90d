use async_trait::async_trait;
use tracing::{debug, info};

use crate::aggregator::Aggregator;
use crate::commands::{AppState, Command, Commands, Handler, LoggedIn, UserHandler};
use crate::db::{Database, FeedWithOwner, FollowedFeed, Post, User};
use crate::error::{Error, Result};
use crate::interval::parse_interval;

const DEFAULT_BROWSE_LIMIT: i64 = 5;

const HELP: &str = "\
commands:
 * login <username>
 * register <username>
 * reset
 * users
 * agg <time_between_reqs>
 * addfeed <name> <url>
 * feeds
 * follow <url>
 * unfollow <url>
 * following
 * browse <limit=5>
 * help";

/// The registry used by the binary.
pub fn default_commands() -> Commands {
    let mut commands = Commands::new();
    commands.register("login", LoggedIn(Login));
    commands.register("register", LoggedIn(Register));
    commands.register("reset", LoggedIn(Reset));
    commands.register("users", LoggedIn(Users));
    commands.register("agg", LoggedIn(Agg));
    commands.register("addfeed", LoggedIn(AddFeed));
    commands.register("feeds", LoggedIn(Feeds));
    commands.register("follow", LoggedIn(Follow));
    commands.register("unfollow", LoggedIn(Unfollow));
    commands.register("following", LoggedIn(Following));
    commands.register("browse", LoggedIn(Browse));
    commands.register("help", Help);
    commands
}

/// Handle whatever `cmd` can do without the database.
///
/// Returns `Ok(true)` once `help` has been printed and `Ok(false)` when the
/// command needs full [`AppState`]. Unregistered names fail here so no
/// database file is created for them.
pub fn run_without_state(commands: &Commands, cmd: &Command) -> Result<bool> {
    if !commands.contains(&cmd.name) {
        return Err(Error::UnknownCommand(cmd.name.clone()));
    }

    if cmd.name == "help" {
        println!("{}", HELP);
        return Ok(true);
    }

    Ok(false)
}

fn require_user(user: &User) -> Result<&User> {
    if user.is_anonymous() {
        return Err(Error::UserNotFound);
    }
    Ok(user)
}

fn single_arg<'c>(cmd: &'c Command, usage: &'static str) -> Result<&'c str> {
    match cmd.args.as_slice() {
        [arg] => Ok(arg.as_str()),
        _ => Err(Error::Usage(usage)),
    }
}

pub struct Login;

#[async_trait]
impl UserHandler for Login {
    async fn run(&self, state: &mut AppState, cmd: &Command, user: &User) -> Result<()> {
        let name = single_arg(cmd, "login <username>")?;

        if state.db.get_user(name).await?.is_none() {
            return Err(Error::UserNotFound);
        }

        debug!(previous = %user.name, "switching user");
        state.config.set_user(name)?;
        println!("logged in as {}", name);
        Ok(())
    }
}

pub struct Register;

#[async_trait]
impl UserHandler for Register {
    async fn run(&self, state: &mut AppState, cmd: &Command, _user: &User) -> Result<()> {
        let name = single_arg(cmd, "register <username>")?;

        let created = state.db.create_user(name).await?;
        state.config.set_user(&created.name)?;

        info!(user = %created.name, id = %created.id, "registered user");
        println!("registered user {}", created.name);
        Ok(())
    }
}

pub struct Reset;

#[async_trait]
impl UserHandler for Reset {
    async fn run(&self, state: &mut AppState, _cmd: &Command, _user: &User) -> Result<()> {
        state.db.delete_feeds().await?;
        state.db.delete_users().await?;
        println!("database reset");
        Ok(())
    }
}

pub struct Users;

#[async_trait]
impl UserHandler for Users {
    async fn run(&self, state: &mut AppState, _cmd: &Command, _user: &User) -> Result<()> {
        let users = state.db.get_users().await?;
        print_lines(&format_users(&users, &state.config.user));
        Ok(())
    }
}

pub struct Agg;

#[async_trait]
impl UserHandler for Agg {
    async fn run(&self, state: &mut AppState, cmd: &Command, user: &User) -> Result<()> {
        let raw = single_arg(cmd, "agg <time_between_reqs>")?;
        let interval = parse_interval(raw)?;
        let user = require_user(user)?;

        println!("collecting feeds every {}", raw);
        Aggregator::new(&state.db, &state.fetcher, user, state.config.aggregator)
            .run(interval, &state.shutdown)
            .await
    }
}

pub struct AddFeed;

#[async_trait]
impl UserHandler for AddFeed {
    async fn run(&self, state: &mut AppState, cmd: &Command, user: &User) -> Result<()> {
        let [name, url] = cmd.args.as_slice() else {
            return Err(Error::Usage("addfeed <name> <url>"));
        };
        let user = require_user(user)?;

        // Two independent writes; a failed follow leaves the feed in place.
        let feed = state.db.create_feed(name, url, user.id).await?;
        let follow = state.db.create_feed_follow(user.id, feed.id).await?;

        println!("added feed {} ({})", feed.name, feed.url);
        println!(" * id: {}", feed.id);
        println!(" * follow id: {}", follow.id);
        Ok(())
    }
}

pub struct Feeds;

#[async_trait]
impl UserHandler for Feeds {
    async fn run(&self, state: &mut AppState, _cmd: &Command, _user: &User) -> Result<()> {
        let feeds = state.db.get_feeds().await?;
        print_lines(&format_feeds(&feeds));
        Ok(())
    }
}

pub struct Follow;

#[async_trait]
impl UserHandler for Follow {
    async fn run(&self, state: &mut AppState, cmd: &Command, user: &User) -> Result<()> {
        let url = single_arg(cmd, "follow <url>")?;
        let user = require_user(user)?;

        let feed = state.db.get_feed(url).await?.ok_or(Error::FeedNotFound)?;
        state.db.create_feed_follow(user.id, feed.id).await?;

        println!("{} now follows {}", user.name, feed.name);
        Ok(())
    }
}

pub struct Unfollow;

#[async_trait]
impl UserHandler for Unfollow {
    async fn run(&self, state: &mut AppState, cmd: &Command, user: &User) -> Result<()> {
        let url = single_arg(cmd, "unfollow <url>")?;
        let user = require_user(user)?;

        let feed = state.db.get_feed(url).await?.ok_or(Error::FeedNotFound)?;
        let removed = state.db.delete_feed_follow(user.id, feed.id).await?;
        debug!(feed = %feed.name, removed, "unfollowed");

        println!("{} unfollowed {}", user.name, feed.name);
        Ok(())
    }
}

pub struct Following;

#[async_trait]
impl UserHandler for Following {
    async fn run(&self, state: &mut AppState, _cmd: &Command, user: &User) -> Result<()> {
        let user = require_user(user)?;
        let follows = state.db.get_feed_follows(&user.name).await?;
        print_lines(&format_follows(&follows));
        Ok(())
    }
}

pub struct Browse;

#[async_trait]
impl UserHandler for Browse {
    async fn run(&self, state: &mut AppState, cmd: &Command, user: &User) -> Result<()> {
        let posts = browse_posts(&state.db, cmd, user).await?;
        print_lines(&format_posts(&posts));
        Ok(())
    }
}

/// Parse the optional browse limit. Anything but a positive integer is rejected.
pub fn parse_limit(args: &[String]) -> Result<i64> {
    match args.first() {
        None => Ok(DEFAULT_BROWSE_LIMIT),
        Some(raw) => match raw.parse::<u32>() {
            Ok(limit) if limit > 0 => Ok(i64::from(limit)),
            _ => Err(Error::InvalidLimit),
        },
    }
}

/// Newest posts for `user`, validating the limit before touching the database.
pub async fn browse_posts(db: &Database, cmd: &Command, user: &User) -> Result<Vec<Post>> {
    let limit = parse_limit(&cmd.args)?;
    let user = require_user(user)?;
    db.get_posts(user.id, limit, 0).await
}

pub struct Help;

#[async_trait]
impl Handler for Help {
    async fn run(&self, _state: &mut AppState, _cmd: &Command) -> Result<()> {
        println!("{}", HELP);
        Ok(())
    }
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

pub fn format_users(users: &[User], current: &str) -> Vec<String> {
    users
        .iter()
        .map(|user| {
            if user.name == current {
                format!(" * {} (current)", user.name)
            } else {
                format!(" * {}", user.name)
            }
        })
        .collect()
}

pub fn format_feeds(feeds: &[FeedWithOwner]) -> Vec<String> {
    feeds
        .iter()
        .map(|feed| format!(" * {} [{}] ({})", feed.name, feed.url, feed.owner))
        .collect()
}

pub fn format_follows(follows: &[FollowedFeed]) -> Vec<String> {
    follows
        .iter()
        .map(|follow| format!(" * {} - {}", follow.feed_name, follow.url))
        .collect()
}

pub fn format_posts(posts: &[Post]) -> Vec<String> {
    posts
        .iter()
        .map(|post| {
            let title = post.title.as_deref().unwrap_or("(untitled)");
            match post.published_at {
                Some(published) => format!(
                    " * {} - {} ({})",
                    title,
                    post.url,
                    published.format("%Y-%m-%d %H:%M")
                ),
                None => format!(" * {} - {}", title, post.url),
            }
        })
        .collect()
}
