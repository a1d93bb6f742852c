use crate::anilist::MediaState;

pub const FETCH_FAILED: &str = "❌ An error occurred while fetching the next episode.";
pub const UNKNOWN_COMMAND: &str = "Unknown command.";

pub fn airing_notice(media: &MediaState, episode: i64) -> String {
    format!(
        "🦜 **{} Episode {} is now airing!**\nSet sail for adventure! <{}>",
        media.title, episode, media.site_url
    )
}

pub fn weekly_notice(media: &MediaState, episode: i64) -> String {
    format!(
        "🦜 **{} Episode {} is now live!**\nIt's 11:16pm JST Sunday! Set sail for adventure! <{}>",
        media.title, episode, media.site_url
    )
}

pub fn countdown_reply(media: &MediaState, episode: i64, countdown: &str) -> String {
    let countdown = if countdown.is_empty() {
        "less than a minute"
    } else {
        countdown
    };
    format!(
        "🕒 **Next {} Episode ({}) airs in:** {}!",
        media.title, episode, countdown
    )
}

pub fn no_upcoming_episode(media: &MediaState) -> String {
    format!("🚨 No upcoming episodes found for {}.", media.title)
}
