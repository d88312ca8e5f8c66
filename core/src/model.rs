use std::fmt;

use uuid::Uuid;

pub type UserId = Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub bio: Option<String>,
    pub interests: Option<String>,
    pub favourite_artist: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: String,
    pub profile_picture_url: Option<String>,
    pub rating: Option<f64>,
    pub created_at: i64,
}

/// Cached copy of a catalog entry. `id` is the catalog's own identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub venue: Option<String>,
    pub starts_at: Option<String>,
    pub location: Option<String>,
    pub ticket_url: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolEntry {
    pub id: Uuid,
    pub user_id: UserId,
    pub event_id: String,
    pub joined_at: i64,
}

/// A pool the user has joined, with the cached event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub event: Event,
    pub joined_at: i64,
}

/// Another pool member the caller has not swiped on yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub user_id: UserId,
    pub username: String,
    pub profile_picture: Option<String>,
    pub favourite_artist: Option<String>,
    pub gender: Option<String>,
    pub age: Option<u32>,
    pub about_me: Option<String>,
    pub rating: Option<f64>,
    pub joined_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwipeAction {
    pub id: Uuid,
    pub swiper_id: UserId,
    pub target_id: UserId,
    pub pool_id: Uuid,
    pub event_id: String,
    pub direction: Direction,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwipeOutcome {
    pub matched: bool,
    pub match_id: Option<Uuid>,
}

/// Two users who swiped right on each other for the same event.
///
/// Slots are canonical: `user_a` always sorts before `user_b`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub id: Uuid,
    pub user_a: UserId,
    pub user_b: UserId,
    pub event_id: String,
    pub created_at: i64,
}

impl Match {
    pub fn involves(&self, user: UserId) -> bool {
        self.user_a == user || self.user_b == user
    }

    /// The counterpart of `user`, or `None` if `user` is not in the match.
    pub fn other(&self, user: UserId) -> Option<UserId> {
        if self.user_a == user {
            Some(self.user_b)
        } else if self.user_b == user {
            Some(self.user_a)
        } else {
            None
        }
    }
}

/// Order a pair the way match rows store it.
pub fn canonical_pair(a: UserId, b: UserId) -> (UserId, UserId) {
    if a.to_string() <= b.to_string() {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRoom {
    pub id: Uuid,
    pub match_id: Uuid,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Uuid,
    pub match_id: Uuid,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    pub created_at: i64,
    pub is_read: bool,
}

/// A message with the sender's display fields attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadMessage {
    pub message: Message,
    pub sender_username: String,
    pub sender_picture: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counterpart {
    pub id: UserId,
    pub username: String,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSummary {
    pub match_id: Uuid,
    pub chat_room_id: Option<Uuid>,
    pub event_id: String,
    pub other_user: Counterpart,
    pub unread_messages: u32,
    pub last_message: Option<Message>,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_pair_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(canonical_pair(a, b), canonical_pair(b, a));
        let (first, second) = canonical_pair(a, b);
        assert!(first.to_string() <= second.to_string());
    }

    #[test]
    fn other_participant() {
        let (a, b) = canonical_pair(Uuid::new_v4(), Uuid::new_v4());
        let m = Match {
            id: Uuid::new_v4(),
            user_a: a,
            user_b: b,
            event_id: "E1".into(),
            created_at: 0,
        };
        assert_eq!(m.other(a), Some(b));
        assert_eq!(m.other(b), Some(a));
        assert_eq!(m.other(Uuid::new_v4()), None);
        assert!(!m.involves(Uuid::nil()));
    }
}
