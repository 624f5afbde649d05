//! Slash command definitions uploaded to the platform by `contrib-points register`.

use serde_json::{Value, json};

use crate::commands::Permissions;
use crate::commands::leaderboard::Timespan;

pub const GIVE_POINTS: &str = "givepoints";
pub const GIVE_ROLE: &str = "giverole";
pub const LEADERBOARD: &str = "leaderboard";

// application command option types
pub const OPTION_STRING: u8 = 3;
pub const OPTION_INTEGER: u8 = 4;
pub const OPTION_USER: u8 = 6;
pub const OPTION_ROLE: u8 = 8;

const CHAT_INPUT: u8 = 1;

pub fn command_definitions() -> Value {
    let admin_only = Permissions::ADMINISTRATOR.0.to_string();
    let choices: Vec<Value> = Timespan::ALL
        .iter()
        .map(|t| json!({ "name": t.label(), "value": t.value() }))
        .collect();

    json!([
        {
            "name": GIVE_POINTS,
            "type": CHAT_INPUT,
            "description": "Give Contribution Points to a member.",
            "default_member_permissions": admin_only,
            "dm_permission": false,
            "options": [
                { "name": "member", "type": OPTION_USER, "required": true, "description": "The member to give points to." },
                { "name": "points", "type": OPTION_INTEGER, "required": true, "description": "The amount of points to give." },
                { "name": "reason", "type": OPTION_STRING, "required": false, "description": "The reason for giving points." },
            ],
        },
        {
            "name": GIVE_ROLE,
            "type": CHAT_INPUT,
            "description": "Give Contribution Points to all members in a role.",
            "default_member_permissions": admin_only,
            "dm_permission": false,
            "options": [
                { "name": "role", "type": OPTION_ROLE, "required": true, "description": "The role to give points to." },
                { "name": "points", "type": OPTION_INTEGER, "required": true, "description": "The amount of points to give each member." },
                { "name": "reason", "type": OPTION_STRING, "required": false, "description": "The reason for giving points." },
            ],
        },
        {
            "name": LEADERBOARD,
            "type": CHAT_INPUT,
            "description": "Check the Contribution Point leaderboards.",
            "dm_permission": false,
            "options": [
                { "name": "timespan", "type": OPTION_STRING, "required": false, "description": "The time period for the leaderboard.", "choices": choices },
            ],
        },
    ])
}
