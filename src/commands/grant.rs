use crate::commands::reply::{COLOR_BLUE, COLOR_GREEN};
use crate::commands::{CommandResult, Context, Embed, Member, Reply};
use crate::db::prelude::{RoleId, UserId};

pub const BOT_TARGET_REJECTED: &str = "You cannot give points to a bot.";

/// Awards `points` to a single member. Bots are turned away before anything is written.
pub async fn grant_points(
    ctx: &Context<'_>,
    member: &Member,
    points: i64,
    reason: Option<&str>,
) -> CommandResult<()> {
    if member.bot {
        tracing::info!(target_user = %member.id, "refusing to grant points to a bot");
        ctx.responder
            .respond(Reply::ephemeral(BOT_TARGET_REJECTED))
            .await?;
        return Ok(());
    }

    ctx.ledger
        .record_transaction(member.id, ctx.guild_id, points, reason)
        .await?;

    tracing::info!(target_user = %member.id, points, "points awarded");

    let embed = Embed::new("Points Awarded!", COLOR_GREEN).description(format!(
        "**{points}** Contribution Points awarded to <@{}>.",
        member.id
    ));

    ctx.responder
        .respond(Reply::embed(with_reason(embed, reason)))
        .await?;

    Ok(())
}

/// Awards `points` to every non-bot member currently holding `role`.
///
/// The caller is told we're working on it before the roster is fetched, since large roles take a
/// while. All rows for the role are written in one storage transaction.
pub async fn grant_role_points(
    ctx: &Context<'_>,
    role: RoleId,
    points: i64,
    reason: Option<&str>,
) -> CommandResult<()> {
    ctx.responder.defer().await?;

    let members = ctx.directory.role_members(ctx.guild_id, role).await?;
    let recipients: Vec<UserId> = members.iter().filter(|m| !m.bot).map(|m| m.id).collect();

    tracing::debug!(
        role = %role,
        member_count = members.len(),
        recipient_count = recipients.len(),
        "resolved role recipients"
    );

    let awarded = ctx
        .ledger
        .record_batch(&recipients, ctx.guild_id, points, reason)
        .await?;

    tracing::info!(role = %role, points, awarded, "role points awarded");

    let embed = Embed::new("Points Distributed to Role!", COLOR_BLUE).description(format!(
        "Awarded **{points}** Contribution Points to **{awarded}** members of the <@&{role}> role."
    ));

    ctx.responder
        .respond(Reply::embed(with_reason(embed, reason)))
        .await?;

    Ok(())
}

fn with_reason(embed: Embed, reason: Option<&str>) -> Embed {
    match reason {
        Some(reason) if !reason.is_empty() => embed.field("Reason", reason),
        _ => embed,
    }
}
