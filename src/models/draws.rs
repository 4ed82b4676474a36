//! VIP draw: entries buy weighted tickets and one ticket wins the prize.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Entry cost and the tickets it buys.
pub const TICKET_TABLE: [(i64, i32); 4] = [(10_000, 1), (20_000, 3), (50_000, 10), (100_000, 25)];

pub fn tickets_for(cost: i64) -> Option<i32> {
    TICKET_TABLE
        .iter()
        .find(|(c, _)| *c == cost)
        .map(|(_, tickets)| *tickets)
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewEntry {
    pub cost: i64,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Participant {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub cost: i64,
    pub tickets: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Winner {
    pub user_id: String,
    pub username: String,
    pub balance_before: i64,
    pub balance_after: i64,
    pub tickets: i64,
    pub prize: i64,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct DrawResult {
    pub id: String,
    pub drawn_at: DateTime<Utc>,
    pub winning_number: String,
    pub winners: serde_json::Value,
    pub total_participants: i32,
    pub total_winners: i32,
}

#[derive(Clone, Debug, Serialize)]
pub struct NextDraw {
    pub next_draw_at: DateTime<Utc>,
    pub seconds_remaining: i64,
    pub participants: i64,
    pub tickets: i64,
    pub prize: i64,
    /// Set when a draw that was due ran while answering this request.
    pub resolved: Option<DrawResult>,
}

/// Tickets per user, in first-entry order.
pub fn tally(entries: &[Participant]) -> Vec<(String, String, i64)> {
    let mut totals: Vec<(String, String, i64)> = Vec::new();
    for entry in entries {
        match totals.iter_mut().find(|(id, _, _)| *id == entry.user_id) {
            Some(total) => total.2 += entry.tickets as i64,
            None => totals.push((
                entry.user_id.clone(),
                entry.username.clone(),
                entry.tickets as i64,
            )),
        }
    }
    totals
}

/// Index into `tallies` of the ticket at position `roll` of the pool where
/// every user appears once per ticket.
pub fn pick_weighted(tallies: &[(String, String, i64)], roll: i64) -> Option<usize> {
    let mut cumulative = 0;
    for (index, (_, _, tickets)) in tallies.iter().enumerate() {
        cumulative += tickets;
        if roll < cumulative {
            return Some(index);
        }
    }
    None
}

fn slot_on(day: chrono::NaiveDate, time: NaiveTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&day.and_time(time))
        .single()
        .map(|local| local.with_timezone(&Utc))
}

/// The daily draw slots immediately before (or at) and after `now`.
pub fn draw_slots(
    now: DateTime<Utc>,
    offset: FixedOffset,
    hour: u32,
    minute: u32,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    let today = now.with_timezone(&offset).date_naive();
    let slot = slot_on(today, time, offset)?;

    if slot > now {
        Some((slot - Duration::days(1), slot))
    } else {
        Some((slot, slot + Duration::days(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::local_offset;

    fn entry(user: &str, tickets: i32) -> Participant {
        Participant {
            id: format!("p-{}", user),
            user_id: user.to_string(),
            username: user.to_string(),
            cost: 10_000,
            tickets,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_ticket_table() {
        assert_eq!(tickets_for(10_000), Some(1));
        assert_eq!(tickets_for(100_000), Some(25));
        assert_eq!(tickets_for(15_000), None);
    }

    #[test]
    fn test_pick_weighted_follows_tickets() {
        let tallies = tally(&[entry("ana", 1), entry("luis", 3), entry("ana", 10)]);
        assert_eq!(tallies.len(), 2);
        assert_eq!(tallies[0].2, 11);

        assert_eq!(pick_weighted(&tallies, 0), Some(0));
        assert_eq!(pick_weighted(&tallies, 10), Some(0));
        assert_eq!(pick_weighted(&tallies, 11), Some(1));
        assert_eq!(pick_weighted(&tallies, 13), Some(1));
        assert_eq!(pick_weighted(&tallies, 14), None);
        assert_eq!(pick_weighted(&[], 0), None);
    }

    #[test]
    fn test_draw_slots() {
        let offset = local_offset(-5);
        // 20:00 local, before the 23:59 slot.
        let evening = Utc.with_ymd_and_hms(2025, 6, 11, 1, 0, 0).unwrap();
        let (previous, next) = draw_slots(evening, offset, 23, 59).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 6, 11, 4, 59, 0).unwrap());
        assert_eq!(previous, Utc.with_ymd_and_hms(2025, 6, 10, 4, 59, 0).unwrap());

        // 00:30 local, just after the slot.
        let past = Utc.with_ymd_and_hms(2025, 6, 11, 5, 30, 0).unwrap();
        let (previous, next) = draw_slots(past, offset, 23, 59).unwrap();
        assert_eq!(previous, Utc.with_ymd_and_hms(2025, 6, 11, 4, 59, 0).unwrap());
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 6, 12, 4, 59, 0).unwrap());

        assert!(draw_slots(past, offset, 25, 0).is_none());
    }
}
