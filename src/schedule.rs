use chrono::{DateTime, Datelike, Duration as ChronoDuration, Timelike, Utc, Weekday};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::anilist::{resolve_current_episode, AniListApi};
use crate::discord::ChatApi;
use crate::error::BotResult;
use crate::messages;
use crate::tracker::{maybe_notify, Decision, NotificationState};

pub const POLL_INTERVAL: Duration = Duration::from_secs(15 * 60);

// Sunday 23:16 JST.
const ALARM_WEEKDAY: Weekday = Weekday::Sun;
const ALARM_HOUR_UTC: i64 = 14;
const ALARM_MINUTE_UTC: i64 = 16;

/// Drives the airing checks and the weekly alarm against one channel.
#[derive(Clone)]
pub struct Notifier {
    anilist: Arc<dyn AniListApi>,
    chat: Arc<dyn ChatApi>,
    channel_id: String,
}

impl Notifier {
    pub fn new(anilist: Arc<dyn AniListApi>, chat: Arc<dyn ChatApi>, channel_id: String) -> Self {
        Self {
            anilist,
            chat,
            channel_id,
        }
    }

    /// One fetch, resolve, decide and send pass.
    pub async fn poll_once(&self, state: &mut NotificationState) -> BotResult<Decision> {
        let media = self.anilist.fetch_media_state().await?;
        let current = resolve_current_episode(&media);
        let decision = maybe_notify(current, state);
        if let Decision::Notify(episode) = decision {
            info!(episode, "New episode airing, notifying channel");
            self.chat
                .send_message(&self.channel_id, &messages::airing_notice(&media, episode))
                .await?;
        }
        Ok(decision)
    }

    /// Polls right away and then every [`POLL_INTERVAL`] until the task is
    /// dropped. Owns the notification state for its whole lifetime.
    pub async fn run_poller(self, mut state: NotificationState) {
        let mut ticker = interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Airing poller started (every {:?})", POLL_INTERVAL);
        loop {
            ticker.tick().await;
            match self.poll_once(&mut state).await {
                Ok(Decision::Notify(episode)) => info!(episode, "Airing notification sent"),
                Ok(Decision::Skip) => debug!(
                    last_notified = state.last_episode_notified(),
                    "No new episode"
                ),
                Err(e) => error!("Error checking airing: {}", e),
            }
        }
    }

    /// Announces the current episode without consulting the notification state.
    pub async fn send_weekly_notice(&self) -> BotResult<i64> {
        let media = self.anilist.fetch_media_state().await?;
        let episode = resolve_current_episode(&media);
        self.chat
            .send_message(&self.channel_id, &messages::weekly_notice(&media, episode))
            .await?;
        Ok(episode)
    }

    /// Sleeps until the next weekly slot, sends, and re-arms from the wall clock.
    pub async fn run_weekly_alarm(self) {
        self.run_weekly_alarm_with(Utc::now).await
    }

    /// [`Notifier::run_weekly_alarm`] reading wall-clock time from `clock`.
    pub async fn run_weekly_alarm_with<C>(self, clock: C)
    where
        C: Fn() -> DateTime<Utc> + Send,
    {
        let mut last_fire: Option<DateTime<Utc>> = None;
        loop {
            let now = clock();
            // The wall clock can lag the timer; never fire the same slot twice.
            let from = last_fire.map_or(now, |fired| fired.max(now));
            let fire_at = next_weekly_fire(from);
            let delay = (fire_at - now).to_std().unwrap_or(Duration::ZERO);
            info!("Weekly notification scheduled for {} (in {:?})", fire_at, delay);
            sleep(delay).await;

            match self.send_weekly_notice().await {
                Ok(episode) => info!(episode, "Weekly notification sent"),
                Err(e) => error!("Error sending scheduled weekly notification: {}", e),
            }
            last_fire = Some(fire_at);
        }
    }
}

/// Next Sunday 14:16:00 UTC strictly after `now`, or today's slot if it is
/// still ahead.
pub fn next_weekly_fire(now: DateTime<Utc>) -> DateTime<Utc> {
    let days_ahead = (7 + ALARM_WEEKDAY.num_days_from_monday() as i64
        - now.weekday().num_days_from_monday() as i64)
        % 7;
    let midnight = now
        - ChronoDuration::seconds(now.num_seconds_from_midnight() as i64)
        - ChronoDuration::nanoseconds(now.nanosecond() as i64);
    let candidate = midnight
        + ChronoDuration::days(days_ahead)
        + ChronoDuration::hours(ALARM_HOUR_UTC)
        + ChronoDuration::minutes(ALARM_MINUTE_UTC);
    if candidate <= now {
        candidate + ChronoDuration::days(7)
    } else {
        candidate
    }
}
