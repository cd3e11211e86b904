use std::sync::LazyLock;

use regex::Regex;
use serenity::all::{Message, MessageId, UserId};

use super::{media::MediaType, model::PurgeConfig};

/// Hosts that serve animated images, or any URL whose path ends in `.gif`/`.gifv`.
static GIF_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^https?://(?:(?:[a-z0-9-]+\.)*(?:tenor\.com|giphy\.com|gfycat\.com)(?:[/?#:]|$)|[^?#\s]+\.gifv?(?:[?#]|$))",
    )
    .unwrap()
});

/// Custom emoji tokens, static `<:name:id>` and animated `<a:name:id>`.
static CUSTOM_EMOJI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<a?:\w{2,32}:\d{15,21}>").unwrap());

/// The attributes of a message the purge filter looks at.
#[derive(Debug, Clone)]
pub struct MessageView {
    pub id: MessageId,
    pub author: UserId,
    pub attachments: usize,
    pub stickers: usize,
    pub embeds: usize,
    pub embed_urls: Vec<String>,
    pub content: String,
    pub pinned: bool,
}

impl From<&Message> for MessageView {
    fn from(msg: &Message) -> Self {
        let embed_urls = msg
            .embeds
            .iter()
            .flat_map(|embed| {
                [
                    embed.url.clone(),
                    embed.video.as_ref().map(|v| v.url.clone()),
                    embed.image.as_ref().map(|i| i.url.clone()),
                    embed.thumbnail.as_ref().map(|t| t.url.clone()),
                ]
            })
            .flatten()
            .collect();
        Self {
            id: msg.id,
            author: msg.author.id,
            attachments: msg.attachments.len(),
            stickers: msg.sticker_items.len(),
            embeds: msg.embeds.len(),
            embed_urls,
            content: msg.content.clone(),
            pinned: msg.pinned,
        }
    }
}

impl Default for MessageView {
    fn default() -> Self {
        Self {
            id: MessageId::new(1),
            author: UserId::new(1),
            attachments: 0,
            stickers: 0,
            embeds: 0,
            embed_urls: Vec::new(),
            content: String::new(),
            pinned: false,
        }
    }
}

impl MessageView {
    fn has_media(&self) -> bool {
        self.attachments > 0 || self.embeds > 0 || self.stickers > 0
    }

    fn has_gif(&self) -> bool {
        self.embed_urls.iter().any(|url| GIF_URL.is_match(url))
    }

    fn has_custom_emoji(&self) -> bool {
        CUSTOM_EMOJI.is_match(&self.content)
    }

    fn has(&self, kind: MediaType) -> bool {
        match kind {
            MediaType::All => self.has_media(),
            MediaType::Attachments => self.attachments > 0,
            MediaType::Stickers => self.stickers > 0,
            MediaType::Gifs => self.has_gif(),
            MediaType::Emojis => self.has_custom_emoji(),
        }
    }
}

/// Decides whether `message` should be deleted under `config`.
///
/// The user filter gates every media rule. A set containing `all` matches any
/// media-bearing message and ignores its other members; otherwise the
/// requested types are OR-ed.
pub fn matches(message: &MessageView, config: &PurgeConfig) -> bool {
    if config.user_id.is_some_and(|user| user != message.author) {
        return false;
    }
    if config.media.contains(MediaType::All) {
        return message.has(MediaType::All);
    }
    config.media.iter().any(|kind| message.has(kind))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serenity::all::{ChannelId, GuildId};

    use super::*;
    use crate::purge::media::MediaSet;

    fn config(media: &str, user: Option<u64>) -> PurgeConfig {
        PurgeConfig::new(
            GuildId::new(1),
            ChannelId::new(2),
            Duration::from_secs(30),
            media.parse::<MediaSet>().unwrap(),
            user.map(UserId::new),
        )
    }

    fn message(author: u64) -> MessageView {
        MessageView {
            id: MessageId::new(100),
            author: UserId::new(author),
            ..Default::default()
        }
    }

    #[test]
    fn all_matches_any_media_bearing_message() {
        let cfg = config("all", None);
        assert!(!matches(&message(5), &cfg));
        assert!(matches(&MessageView { attachments: 1, ..message(5) }, &cfg));
        assert!(matches(&MessageView { stickers: 2, ..message(5) }, &cfg));
        assert!(matches(&MessageView { embeds: 1, ..message(5) }, &cfg));
    }

    #[test]
    fn all_subsumes_other_requested_types() {
        let cfg = config("all,emojis", None);
        let emoji_only = MessageView {
            content: "hi <:pepe:123456789012345678>".into(),
            ..message(5)
        };
        // `all` takes priority, and a bare emoji carries no media
        assert!(!matches(&emoji_only, &cfg));
        assert!(matches(&MessageView { attachments: 1, ..message(5) }, &cfg));
    }

    #[test]
    fn user_filter_gates_every_rule() {
        let cfg = config("all", Some(7));
        let media = MessageView {
            attachments: 3,
            stickers: 1,
            ..message(8)
        };
        assert!(!matches(&media, &cfg));
        assert!(matches(&MessageView { author: UserId::new(7), ..media }, &cfg));
    }

    #[test]
    fn requested_types_are_ored() {
        let cfg = config("stickers,attachments", None);
        assert!(matches(&MessageView { stickers: 1, ..message(5) }, &cfg));
        assert!(matches(&MessageView { attachments: 1, ..message(5) }, &cfg));
        assert!(!matches(&MessageView { embeds: 1, ..message(5) }, &cfg));
    }

    #[test]
    fn gifs_match_known_hosts_and_extensions() {
        let cfg = config("gifs", None);
        let with_url = |url: &str| MessageView {
            embeds: 1,
            embed_urls: vec![url.into()],
            ..message(5)
        };
        assert!(matches(&with_url("https://tenor.com/view/cat-123"), &cfg));
        assert!(matches(&with_url("https://media.giphy.com/media/x/giphy.mp4"), &cfg));
        assert!(matches(&with_url("https://cdn.discordapp.com/a/b/dance.gif?ex=1"), &cfg));
        assert!(matches(&with_url("https://i.imgur.com/abc.gifv"), &cfg));
        assert!(!matches(&with_url("https://nottenor.com/view/cat"), &cfg));
        assert!(!matches(&with_url("https://example.com/gif-guide.html"), &cfg));
    }

    #[test]
    fn emojis_match_custom_emoji_tokens_only() {
        let cfg = config("emojis", None);
        let said = |content: &str| MessageView {
            content: content.into(),
            ..message(5)
        };
        assert!(matches(&said("<:pepe:123456789012345678>"), &cfg));
        assert!(matches(&said("look <a:dance:987654321098765432> wow"), &cfg));
        assert!(!matches(&said("plain :smile: text"), &cfg));
        assert!(!matches(&said("🙂"), &cfg));
    }

    #[test]
    fn classification_does_not_depend_on_call_order() {
        let cfg = config("attachments,gifs", None);
        let msgs = [
            MessageView { attachments: 1, ..message(1) },
            message(2),
            MessageView {
                embeds: 1,
                embed_urls: vec!["https://tenor.com/x".into()],
                ..message(3)
            },
        ];
        let forward = msgs.iter().map(|m| matches(m, &cfg)).collect::<Vec<_>>();
        let mut backward = msgs.iter().rev().map(|m| matches(m, &cfg)).collect::<Vec<_>>();
        backward.reverse();
        assert_eq!(forward, backward);
        assert_eq!(forward, vec![true, false, true]);
    }
}
