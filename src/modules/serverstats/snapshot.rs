use super::database::StatType;
use chrono::{Datelike, Local, NaiveDate};
use poise::serenity_prelude::{ChannelType, GuildId, Http};
use tracing::debug;

/// Point-in-time guild counts used to render counter channel names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub members: usize,
    pub bots: usize,
    pub text_channels: usize,
    pub voice_channels: usize,
    pub categories: usize,
    pub roles: usize,
    pub date: String,
}

impl Snapshot {
    /// Fallback when guild state cannot be read: every stat renders as "0"
    /// so channel creation can still proceed.
    pub fn unavailable() -> Self {
        Self {
            date: "0".to_string(),
            ..Self::default()
        }
    }

    pub fn value_of(&self, kind: StatType) -> String {
        match kind {
            StatType::Members => self.members.to_string(),
            StatType::Bots => self.bots.to_string(),
            StatType::TextChannels => self.text_channels.to_string(),
            StatType::VoiceChannels => self.voice_channels.to_string(),
            StatType::Categories => self.categories.to_string(),
            StatType::Roles => self.roles.to_string(),
            StatType::Date => self.date.clone(),
        }
    }
}

pub async fn fetch_snapshot(
    http: &Http,
    guild_id: GuildId,
) -> Result<Snapshot, poise::serenity_prelude::Error> {
    let start = std::time::Instant::now();

    let mut members = Vec::new();
    let mut after = None;
    loop {
        let page = guild_id.members(http, Some(1000), after).await?;
        let full_page = page.len() == 1000;
        after = page.last().map(|m| m.user.id);
        members.extend(page);
        if !full_page {
            break;
        }
    }

    let channels = guild_id.channels(http).await?;
    let roles = guild_id.roles(http).await?;

    let bots = members.iter().filter(|m| m.user.bot).count();
    let count_kind = |kind: ChannelType| channels.values().filter(|c| c.kind == kind).count();

    let snapshot = Snapshot {
        members: members.len() - bots,
        bots,
        text_channels: count_kind(ChannelType::Text),
        voice_channels: count_kind(ChannelType::Voice),
        categories: count_kind(ChannelType::Category),
        roles: roles.len(),
        date: format_display_date(Local::now().date_naive()),
    };

    debug!(
        "Snapshot for guild {} fetched in {:?}",
        guild_id,
        start.elapsed()
    );
    Ok(snapshot)
}

/// "st"/"nd"/"rd"/"th" for a day of the month; 11-13 are always "th".
pub fn ordinal_suffix(day: u32) -> &'static str {
    if (11..=13).contains(&(day % 100)) {
        return "th";
    }
    match day % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

/// Renders a date as e.g. "3rd June (Tue)".
pub fn format_display_date(date: NaiveDate) -> String {
    let day = date.day();
    format!(
        "{}{} {} ({})",
        day,
        ordinal_suffix(day),
        date.format("%B"),
        date.format("%a")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinal_suffix_follows_last_digit() {
        for (day, suffix) in [
            (1, "st"),
            (2, "nd"),
            (3, "rd"),
            (4, "th"),
            (11, "th"),
            (12, "th"),
            (13, "th"),
            (21, "st"),
            (22, "nd"),
            (23, "rd"),
            (30, "th"),
            (31, "st"),
        ] {
            assert_eq!(ordinal_suffix(day), suffix, "day {}", day);
        }
    }

    #[test]
    fn display_date_matches_expected_shape() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
        assert_eq!(format_display_date(date), "3rd June (Tue)");

        let teens = NaiveDate::from_ymd_opt(2025, 12, 12).unwrap();
        assert_eq!(format_display_date(teens), "12th December (Fri)");
    }

    #[test]
    fn value_of_maps_every_kind() {
        let snapshot = Snapshot {
            members: 10,
            bots: 2,
            text_channels: 5,
            voice_channels: 3,
            categories: 4,
            roles: 8,
            date: "1st January (Thu)".into(),
        };

        assert_eq!(snapshot.value_of(StatType::Members), "10");
        assert_eq!(snapshot.value_of(StatType::Bots), "2");
        assert_eq!(snapshot.value_of(StatType::TextChannels), "5");
        assert_eq!(snapshot.value_of(StatType::VoiceChannels), "3");
        assert_eq!(snapshot.value_of(StatType::Categories), "4");
        assert_eq!(snapshot.value_of(StatType::Roles), "8");
        assert_eq!(snapshot.value_of(StatType::Date), "1st January (Thu)");
    }

    #[test]
    fn unavailable_renders_zero_for_everything() {
        let snapshot = Snapshot::unavailable();
        for kind in StatType::ALL {
            assert_eq!(snapshot.value_of(kind), "0");
        }
    }
}
