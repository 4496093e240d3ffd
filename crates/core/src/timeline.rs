//! Time formatting and day-bucket grouping for rendering a conversation.
//!
//! All functions take the display time zone explicitly so the same messages
//! group identically in tests and in the terminal (which uses `Local`).

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};

use crate::types::{Message, SenderType};

/// Render a timestamp as `HH:MM` (24-hour) in `tz`.
#[must_use]
pub fn format_time<Tz>(at: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    at.with_timezone(tz).format("%H:%M").to_string()
}

/// Header label for a day bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayLabel {
    Today,
    Yesterday,
    /// Any other day, rendered as `DD/MM/YYYY`.
    Date(NaiveDate),
}

impl fmt::Display for DayLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Today => f.write_str("Today"),
            Self::Yesterday => f.write_str("Yesterday"),
            Self::Date(day) => write!(f, "{}", day.format("%d/%m/%Y")),
        }
    }
}

/// Label a calendar day relative to `today`.
///
/// Compares calendar days, not elapsed time: 23:59 yesterday is
/// "Yesterday" even when viewed at 00:01 today.
#[must_use]
pub fn day_label(day: NaiveDate, today: NaiveDate) -> DayLabel {
    if day == today {
        DayLabel::Today
    } else if today.checked_sub_days(Days::new(1)) == Some(day) {
        DayLabel::Yesterday
    } else {
        DayLabel::Date(day)
    }
}

/// A message placed in the rendered thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadEntry<'a> {
    pub message: &'a Message,
    /// Sent by the end-user (right-aligned).
    pub mine: bool,
    /// Same sender type as the previous entry in the bucket; rendered without
    /// a fresh avatar and with tighter spacing.
    pub consecutive: bool,
}

/// All messages of one calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayGroup<'a> {
    pub day: NaiveDate,
    pub entries: Vec<ThreadEntry<'a>>,
}

impl DayGroup<'_> {
    /// Header label relative to `today`.
    #[must_use]
    pub fn label(&self, today: NaiveDate) -> DayLabel {
        day_label(self.day, today)
    }
}

/// Group messages by calendar day in `tz`.
///
/// Buckets are ordered ascending by day and messages within a bucket
/// ascending by `created_at`, regardless of input order.
#[must_use]
pub fn group_by_day<'a, Tz: TimeZone>(messages: &'a [Message], tz: &Tz) -> Vec<DayGroup<'a>> {
    let mut buckets: BTreeMap<NaiveDate, Vec<&'a Message>> = BTreeMap::new();
    for message in messages {
        let day = message.created_at.with_timezone(tz).date_naive();
        buckets.entry(day).or_default().push(message);
    }

    buckets
        .into_iter()
        .map(|(day, mut bucket)| {
            bucket.sort_by_key(|message| message.created_at);
            let mut previous: Option<SenderType> = None;
            let entries = bucket
                .into_iter()
                .map(|message| {
                    let consecutive = previous == Some(message.sender_type);
                    previous = Some(message.sender_type);
                    ThreadEntry {
                        message,
                        mine: message.sender_type == SenderType::User,
                        consecutive,
                    }
                })
                .collect();
            DayGroup { day, entries }
        })
        .collect()
}
