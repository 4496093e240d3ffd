//! Plain-text rendering of chat state.
//!
//! Every function returns a `String` so output can be compared in tests and
//! redrawn only when it changes.

use std::fmt;

use chrono::{NaiveDate, TimeZone};
use support_chat_client::{AdminRow, ChatSnapshot, Notice, NoticeLevel};
use support_chat_core::timeline::{format_time, group_by_day};
use support_chat_core::{Admin, Message, UnreadCounts};

const PREVIEW_CHARS: usize = 40;

/// Admin list printed by `support-chat admins`.
pub fn admin_list(admins: &[Admin], unread: &UnreadCounts, search_term: &str) -> String {
    if admins.is_empty() {
        return empty_admins(search_term);
    }

    admins
        .iter()
        .enumerate()
        .map(|(index, admin)| {
            let badge = unread_badge(unread.get(&admin.id));
            format!(
                "{:>2}. {} <{}>{badge}  [{}]\n",
                index + 1,
                admin.display_name(),
                admin.email,
                admin.id
            )
        })
        .collect()
}

/// Unread summary printed by `support-chat unread`.
pub fn unread_summary(admins: &[Admin], unread: &UnreadCounts) -> String {
    if unread.is_empty() {
        return "No unread messages\n".to_string();
    }

    let mut out = String::new();
    for (id, count) in unread.iter() {
        let name = admins
            .iter()
            .find(|admin| &admin.id == id)
            .map_or_else(|| id.to_string(), |admin| admin.display_name().to_string());
        out.push_str(&format!("{name}: {count}\n"));
    }
    out.push_str(&format!("Total: {}\n", unread.total()));
    out
}

/// Full two-pane frame for the interactive session.
///
/// The sidebar is stacked above the conversation; it is omitted when the
/// snapshot says it is hidden.
pub fn frame<Tz>(snapshot: &ChatSnapshot, tz: &Tz, today: NaiveDate) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let mut out = String::new();

    if snapshot.sidebar_visible {
        out.push_str(&sidebar(snapshot));
        out.push('\n');
    }
    out.push_str(&conversation(snapshot, tz, today));
    out
}

fn sidebar(snapshot: &ChatSnapshot) -> String {
    let mut out = String::from("== Admins ==");
    if !snapshot.search_term.trim().is_empty() {
        out.push_str(&format!(" (search: {})", snapshot.search_term));
    }
    out.push('\n');

    if snapshot.rows.is_empty() {
        out.push_str(&empty_admins(&snapshot.search_term));
        return out;
    }

    for (index, row) in snapshot.rows.iter().enumerate() {
        out.push_str(&sidebar_row(index + 1, row));
    }
    out
}

fn sidebar_row(position: usize, row: &AdminRow) -> String {
    let marker = if row.selected { '>' } else { ' ' };
    let preview = row
        .last_message
        .as_ref()
        .map(|message| format!("  \"{}\"", preview(&message.content)))
        .unwrap_or_default();
    format!(
        "{marker}{position:>2}. [{}] {}{}{preview}\n",
        row.admin.initial(),
        row.admin.display_name(),
        unread_badge(row.unread)
    )
}

fn conversation<Tz>(snapshot: &ChatSnapshot, tz: &Tz, today: NaiveDate) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let Some(admin) = &snapshot.selected else {
        return "Select an admin to start chatting (/select <n>)\n".to_string();
    };

    let mut out = format!("== {} ==\n", admin.display_name());
    if snapshot.loading && snapshot.messages.is_empty() {
        out.push_str("Loading messages...\n");
        return out;
    }
    if snapshot.messages.is_empty() {
        out.push_str("No messages yet. Say hello!\n");
        return out;
    }

    for group in group_by_day(&snapshot.messages, tz) {
        out.push_str(&format!("-- {} --\n", group.label(today)));
        for entry in &group.entries {
            out.push_str(&message_line(entry.message, entry.mine, entry.consecutive, admin, tz));
        }
    }
    out
}

fn message_line<Tz>(message: &Message, mine: bool, consecutive: bool, admin: &Admin, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let time = format_time(&message.created_at, tz);
    if consecutive {
        let indent = if mine { "        " } else { "  " };
        return format!("{indent}        {}  {time}\n", message.content);
    }
    if mine {
        format!("        You: {}  {time}\n", message.content)
    } else {
        format!("  {}: {}  {time}\n", admin.display_name(), message.content)
    }
}

/// One toast line.
pub fn notice(notice: &Notice) -> String {
    match notice.level {
        NoticeLevel::Info => format!("* {}\n", notice.text),
        NoticeLevel::Error => format!("! {}\n", notice.text),
    }
}

fn empty_admins(search_term: &str) -> String {
    if search_term.trim().is_empty() {
        "No admins found\n".to_string()
    } else {
        format!("No admins match \"{search_term}\"\n")
    }
}

fn unread_badge(count: u32) -> String {
    match count {
        0 => String::new(),
        1..=99 => format!(" ({count})"),
        _ => " (99+)".to_string(),
    }
}

fn preview(content: &str) -> String {
    if content.chars().count() <= PREVIEW_CHARS {
        return content.to_string();
    }
    let truncated: String = content.chars().take(PREVIEW_CHARS).collect();
    format!("{truncated}...")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{FixedOffset, Utc};
    use support_chat_core::{AdminId, MessageId, ParticipantId, SenderType};

    use super::*;

    fn admin(id: &str, name: &str) -> Admin {
        Admin {
            id: AdminId::new(id),
            name: name.to_string(),
            email: format!("{id}@support.example"),
        }
    }

    fn message(id: &str, sender_type: SenderType, day: u32, hour: u32) -> Message {
        Message {
            id: MessageId::new(id),
            sender_id: ParticipantId::new("x"),
            sender_type,
            receiver_id: ParticipantId::new("y"),
            content: format!("text {id}"),
            created_at: Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    #[test]
    fn test_admin_list_with_badges() {
        let admins = vec![admin("a1", "Linh"), admin("a2", "")];
        let unread: UnreadCounts = [(AdminId::new("a2"), 120)].into_iter().collect();
        let out = admin_list(&admins, &unread, "");
        assert_eq!(
            out,
            " 1. Linh <a1@support.example>  [a1]\n 2. Admin <a2@support.example> (99+)  [a2]\n"
        );
    }

    #[test]
    fn test_admin_list_empty_states() {
        assert_eq!(admin_list(&[], &UnreadCounts::new(), ""), "No admins found\n");
        assert_eq!(
            admin_list(&[], &UnreadCounts::new(), "zed"),
            "No admins match \"zed\"\n"
        );
    }

    #[test]
    fn test_unread_summary_names_admins() {
        let admins = vec![admin("a1", "Linh")];
        let unread: UnreadCounts = [(AdminId::new("a1"), 2), (AdminId::new("zz"), 1)]
            .into_iter()
            .collect();
        assert_eq!(unread_summary(&admins, &unread), "Linh: 2\nzz: 1\nTotal: 3\n");
        assert_eq!(unread_summary(&admins, &UnreadCounts::new()), "No unread messages\n");
    }

    #[test]
    fn test_frame_idle() {
        let snapshot = ChatSnapshot {
            sidebar_visible: true,
            ..ChatSnapshot::default()
        };
        let out = frame(&snapshot, &Utc, today());
        assert!(out.contains("No admins found"));
        assert!(out.contains("Select an admin"));
    }

    #[test]
    fn test_frame_groups_days_in_local_time() {
        let linh = admin("a1", "Linh");
        let snapshot = ChatSnapshot {
            selected: Some(linh.clone()),
            messages: vec![
                // 2026-03-12 23:00 UTC is already the 13th at UTC+7.
                message("m1", SenderType::Admin, 12, 23),
                message("m2", SenderType::Admin, 13, 1),
                message("m3", SenderType::User, 14, 2),
            ],
            sidebar_visible: false,
            ..ChatSnapshot::default()
        };
        let tz = FixedOffset::east_opt(7 * 3600).unwrap();
        let out = frame(&snapshot, &tz, today());

        assert!(!out.contains("== Admins =="));
        assert!(out.contains("-- Yesterday --\n  Linh: text m1  06:00\n"));
        assert!(out.contains("          text m2  08:00\n"));
        assert!(out.contains("-- Today --\n        You: text m3  09:00\n"));
    }

    #[test]
    fn test_frame_loading_and_empty_conversation() {
        let mut snapshot = ChatSnapshot {
            selected: Some(admin("a1", "Linh")),
            loading: true,
            ..ChatSnapshot::default()
        };
        assert!(frame(&snapshot, &Utc, today()).contains("Loading messages..."));

        snapshot.loading = false;
        assert!(frame(&snapshot, &Utc, today()).contains("No messages yet"));
    }

    #[test]
    fn test_sidebar_row_marks_selection_and_preview() {
        let row = AdminRow {
            admin: admin("a1", "Linh"),
            unread: 3,
            last_message: Some(Message {
                content: "x".repeat(50),
                ..message("m1", SenderType::Admin, 14, 1)
            }),
            selected: true,
        };
        let line = sidebar_row(1, &row);
        assert!(line.starts_with("> 1. [L] Linh (3)"));
        assert!(line.ends_with(&format!("\"{}...\"\n", "x".repeat(40))));
    }

    #[test]
    fn test_notice_prefix() {
        let info = Notice {
            level: NoticeLevel::Info,
            text: "hi".to_string(),
        };
        assert_eq!(notice(&info), "* hi\n");
    }
}
