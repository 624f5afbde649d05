use core::str::FromStr;

use chrono::TimeDelta;
use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};

use crate::commands::reply::COLOR_GOLD;
use crate::commands::{CommandResult, Context, Embed, Reply};
use crate::db::prelude::{LeaderboardEntry, UserId};

pub const EMPTY_LEADERBOARD: &str = "No contributions have been recorded for this period yet.";
pub const LEADERBOARD_FOOTER: &str = "Points are the currency for upgrading your rank!";

const NAME_LOOKUP_CONCURRENCY: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timespan {
    #[default]
    All,
    Month,
    Week,
}

impl Timespan {
    /// Trailing window to aggregate over; `None` means all time.
    pub fn window(&self) -> Option<TimeDelta> {
        match self {
            Timespan::All => None,
            Timespan::Month => Some(TimeDelta::days(30)),
            Timespan::Week => Some(TimeDelta::days(7)),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Timespan::All => "All-Time Contribution Leaderboard",
            Timespan::Month => "Monthly Contribution Leaderboard (Last 30 Days)",
            Timespan::Week => "Weekly Contribution Leaderboard (Last 7 Days)",
        }
    }

    /// Choice label shown in the client.
    pub fn label(&self) -> &'static str {
        match self {
            Timespan::All => "All Time",
            Timespan::Month => "Past Month (30 days)",
            Timespan::Week => "Past Week (7 days)",
        }
    }

    pub fn value(&self) -> &'static str {
        match self {
            Timespan::All => "all",
            Timespan::Month => "month",
            Timespan::Week => "week",
        }
    }

    pub const ALL: [Timespan; 3] = [Timespan::All, Timespan::Month, Timespan::Week];
}

impl FromStr for Timespan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timespan::ALL
            .into_iter()
            .find(|t| t.value() == s)
            .ok_or_else(|| format!("unknown timespan '{s}'"))
    }
}

pub async fn leaderboard(ctx: &Context<'_>, timespan: Timespan) -> CommandResult<()> {
    ctx.responder.defer().await?;

    let entries = ctx
        .ledger
        .get_leaderboard(ctx.guild_id, timespan.window())
        .await?;

    let names = resolve_names(ctx, &entries).await;
    let embed = render(timespan, &entries, &names);

    ctx.responder.respond(Reply::embed(embed)).await?;
    Ok(())
}

/// Looks up each entry's current display name, in entry order. Members who left the guild (or
/// whose lookup failed) come back as `None`.
async fn resolve_names(ctx: &Context<'_>, entries: &[LeaderboardEntry]) -> Vec<Option<String>> {
    // owned ids keep the lookup futures free of borrows into `entries`
    let user_ids: Vec<UserId> = entries.iter().map(|entry| entry.user_id).collect();
    let lookups = user_ids.into_iter().map(|user_id| async move {
        match ctx.directory.member(ctx.guild_id, user_id).await {
            Ok(member) => member.map(|m| m.display_name),
            Err(e) => {
                tracing::warn!(error = ?e, user_id = %user_id, "member lookup failed");
                None
            }
        }
    });

    stream::iter(lookups)
        .buffered(NAME_LOOKUP_CONCURRENCY)
        .collect()
        .await
}

pub fn render(timespan: Timespan, entries: &[LeaderboardEntry], names: &[Option<String>]) -> Embed {
    let embed = Embed::new(format!("🏆 {}", timespan.title()), COLOR_GOLD);

    if entries.is_empty() {
        return embed.description(EMPTY_LEADERBOARD);
    }

    let lines: Vec<String> = entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let name = match names.get(idx) {
                Some(Some(name)) => name.clone(),
                _ => format!("User ID: {}", entry.user_id),
            };

            format!(
                "{} {}: **{}** points",
                rank_marker(idx),
                name,
                entry.total_points
            )
        })
        .collect();

    embed.description(lines.join("\n")).footer(LEADERBOARD_FOOTER)
}

fn rank_marker(idx: usize) -> String {
    match idx {
        0 => "🥇".to_string(),
        1 => "🥈".to_string(),
        2 => "🥉".to_string(),
        n => format!("**#{}**", n + 1),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::commands::testing::*;
    use crate::commands::{Caller, Command, Invocation, Permissions, execute};
    use crate::db::prelude::GuildId;

    const GUILD: GuildId = GuildId(10);

    fn entry(user: i64, total: i64) -> LeaderboardEntry {
        (UserId(user), total).into()
    }

    #[test]
    fn test_timespan_parsing() {
        assert_eq!("week".parse::<Timespan>().unwrap(), Timespan::Week);
        assert_eq!("month".parse::<Timespan>().unwrap(), Timespan::Month);
        assert!("year".parse::<Timespan>().is_err());

        assert_eq!(Timespan::All.window(), None);
        assert_eq!(Timespan::Week.window(), Some(TimeDelta::days(7)));
        assert_eq!(Timespan::Month.window(), Some(TimeDelta::days(30)));
    }

    #[test]
    fn test_render_ranks() {
        let entries = vec![entry(1, 90), entry(2, 70), entry(3, 50), entry(4, 10), entry(5, 5)];
        let names = vec![
            Some("alice".to_string()),
            Some("bob".to_string()),
            None,
            Some("dave".to_string()),
            Some("erin".to_string()),
        ];

        let embed = render(Timespan::Week, &entries, &names);
        assert_eq!(
            embed.title.as_deref(),
            Some("🏆 Weekly Contribution Leaderboard (Last 7 Days)")
        );
        assert_eq!(
            embed.description.as_deref(),
            Some(
                "🥇 alice: **90** points\n\
                 🥈 bob: **70** points\n\
                 🥉 User ID: 3: **50** points\n\
                 **#4** dave: **10** points\n\
                 **#5** erin: **5** points"
            )
        );
        assert!(embed.footer.is_some());
    }

    #[test]
    fn test_render_empty() {
        let embed = render(Timespan::All, &[], &[]);
        assert_eq!(embed.description.as_deref(), Some(EMPTY_LEADERBOARD));
        assert!(embed.footer.is_none());
    }

    #[tokio::test]
    async fn test_leaderboard_resolves_names() {
        let (_dir, ledger) = ledger().await;
        ledger.record_transaction(UserId(1), GUILD, 50, None).await.unwrap();
        ledger.record_transaction(UserId(2), GUILD, 80, None).await.unwrap();
        ledger.record_transaction(UserId(1), GUILD, 10, None).await.unwrap();

        // user 1 has since left the guild
        let directory = StaticDirectory {
            roster: vec![(member(2, "bob", false), vec![])],
        };
        let responder = RecordingResponder::default();

        let invocation = Invocation {
            guild_id: GUILD,
            caller: Caller {
                id: UserId(3),
                permissions: Permissions::default(),
            },
            command: Command::Leaderboard {
                timespan: Timespan::All,
            },
        };

        execute(&ledger, &directory, &responder, invocation).await;

        assert_eq!(responder.sent()[0], Sent::Deferred);
        let embed = &responder.last_reply().embeds[0];
        assert_eq!(
            embed.description.as_deref(),
            Some("🥇 bob: **80** points\n🥈 User ID: 1: **60** points")
        );
    }

    #[tokio::test]
    async fn test_leaderboard_runs_on_spawned_task() {
        let (dir, ledger) = ledger().await;
        ledger.record_transaction(UserId(1), GUILD, 5, None).await.unwrap();
        ledger.record_transaction(UserId(2), GUILD, 9, None).await.unwrap();

        let directory = StaticDirectory {
            roster: vec![(member(1, "alice", false), vec![])],
        };
        let responder = std::sync::Arc::new(RecordingResponder::default());
        let invocation = Invocation {
            guild_id: GUILD,
            caller: admin(),
            command: Command::Leaderboard {
                timespan: Timespan::Week,
            },
        };

        // same shape as the interactions endpoint: everything moved onto a tokio task
        let task_responder = responder.clone();
        tokio::spawn(async move {
            execute(&ledger, &directory, task_responder.as_ref(), invocation).await;
        })
        .await
        .unwrap();
        drop(dir);

        let embed = &responder.last_reply().embeds[0];
        assert_eq!(
            embed.description.as_deref(),
            Some("🥇 User ID: 2: **9** points\n🥈 alice: **5** points")
        );
    }
}
