//! Users command - connect, list and configure users

use anyhow::Result;
use crosscast_adapters::twitter::StubTweetSource;
use crosscast_domain::{
    Clock, SyncStore, SystemClock, TweetSource, User,
    usecases::{Accounts, ConnectOutcome, NewUser},
};
use std::path::PathBuf;
use std::sync::Arc;

use crate::args::{AddUserArgs, UsersArgs, UsersCommands};
use crate::commands::{build_tweet_source, open_store};
use crate::config::AppConfig;

type DynAccounts = Accounts<dyn SyncStore, dyn TweetSource, dyn Clock>;

pub async fn execute(args: UsersArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    // Only a baseline fetch talks to Twitter
    let needs_source = matches!(&args.command, UsersCommands::Add(add) if !add.skip_baseline);
    let source: Arc<dyn TweetSource> = if needs_source {
        Arc::new(build_tweet_source(&config)?)
    } else {
        Arc::new(StubTweetSource::empty())
    };

    let store: Arc<dyn SyncStore> = open_store(&config).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let accounts: DynAccounts = Accounts::new(store, source, clock);

    match args.command {
        UsersCommands::Add(add) => add_user(&accounts, add).await,
        UsersCommands::List { json } => {
            let users = accounts.list().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&users)?);
            } else if users.is_empty() {
                println!("No users");
            } else {
                for user in &users {
                    print_user(user);
                }
            }
            Ok(())
        }
        UsersCommands::Enable { user_id } => {
            let user = accounts.set_crosspost_enabled(user_id, true).await?;
            println!("Cross-posting enabled for {}", user.handle());
            Ok(())
        }
        UsersCommands::Disable { user_id } => {
            let user = accounts.set_crosspost_enabled(user_id, false).await?;
            println!("Cross-posting disabled for {}", user.handle());
            Ok(())
        }
        UsersCommands::DisconnectTwitter { user_id } => {
            let user = accounts.disconnect_twitter(user_id).await?;
            println!("Twitter disconnected for user {}", user.id);
            Ok(())
        }
        UsersCommands::DisconnectFarcaster { user_id } => {
            let user = accounts.disconnect_farcaster(user_id).await?;
            println!("Farcaster disconnected for user {}", user.id);
            Ok(())
        }
        UsersCommands::Posts {
            user_id,
            limit,
            json,
        } => {
            let posts = accounts.recent_posts(user_id, limit).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&posts)?);
            } else if posts.is_empty() {
                println!("No cross-posts yet");
            } else {
                for post in &posts {
                    println!(
                        "{}  {}  {}  {}",
                        post.created_at,
                        post.source_post_id,
                        post.destination_ref.as_deref().unwrap_or("-"),
                        post.text.replace('\n', " ")
                    );
                }
            }
            Ok(())
        }
    }
}

async fn add_user(accounts: &DynAccounts, args: AddUserArgs) -> Result<()> {
    let new_user = NewUser {
        farcaster_signer_uuid: args.signer,
        farcaster_fid: args.fid,
        farcaster_username: args.farcaster_username,
        twitter_user_id: args.twitter_id,
        twitter_username: args.twitter_username,
    };

    let outcome = accounts.connect(new_user, !args.skip_baseline).await?;
    let status = match &outcome {
        ConnectOutcome::Created(_) => "created",
        ConnectOutcome::Reconnected(_) => "reconnected",
        ConnectOutcome::Existing(_) => "existing",
    };

    let mut user = outcome.user().clone();
    if args.enable && !user.crosspost_enabled {
        user = accounts.set_crosspost_enabled(user.id, true).await?;
    }

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "status": status,
                "user": user,
            }))?
        );
    } else {
        println!("User {}:", status);
        print_user(&user);
    }

    Ok(())
}

fn print_user(user: &User) {
    println!(
        "{}  @{}  twitter={}  farcaster={}  enabled={}  last_post={}",
        user.id,
        user.handle(),
        if user.has_twitter() { "yes" } else { "no" },
        if user.has_farcaster() { "yes" } else { "no" },
        user.crosspost_enabled,
        user.last_post_id().unwrap_or("-"),
    );
}
