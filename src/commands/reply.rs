use serde::{Deserialize, Serialize};

pub const COLOR_GREEN: u32 = 0x2ecc71;
pub const COLOR_BLUE: u32 = 0x3498db;
pub const COLOR_GOLD: u32 = 0xf1c40f;

/// `EPHEMERAL` message flag; only the invoking user sees the message.
const FLAG_EPHEMERAL: u64 = 1 << 6;

/// Message body sent back to the caller, either as the initial interaction response or as an edit
/// of a deferred one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
}

impl Reply {
    pub fn embed(embed: Embed) -> Self {
        Self {
            embeds: vec![embed],
            ..Default::default()
        }
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            flags: Some(FLAG_EPHEMERAL),
            ..Default::default()
        }
    }

    pub fn is_ephemeral(&self) -> bool {
        self.flags.is_some_and(|f| f & FLAG_EPHEMERAL != 0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
}

impl Embed {
    pub fn new(title: impl Into<String>, color: u32) -> Self {
        Self {
            title: Some(title.into()),
            color: Some(color),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline: false,
        });
        self
    }

    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.footer = Some(EmbedFooter { text: text.into() });
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_reply_serialization() {
        let reply = Reply::embed(
            Embed::new("Points Awarded!", COLOR_GREEN)
                .description("hi")
                .field("Reason", "because"),
        );

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "embeds": [{
                    "title": "Points Awarded!",
                    "description": "hi",
                    "color": COLOR_GREEN,
                    "fields": [{ "name": "Reason", "value": "because", "inline": false }],
                }]
            })
        );
        assert!(!reply.is_ephemeral());

        let notice = Reply::ephemeral("nope");
        assert!(notice.is_ephemeral());
        assert_eq!(
            serde_json::to_value(&notice).unwrap(),
            serde_json::json!({ "content": "nope", "flags": 64 })
        );
    }
}
