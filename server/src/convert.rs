//! Core records to wire bodies.

use gigpal_api as api;
use gigpal_core::{
    users::{self, ProfileUpdate},
    Candidate, Direction, Event, MatchSummary, Membership, Message, ThreadMessage, User,
};

pub fn profile(user: User) -> api::Profile {
    api::Profile {
        age: users::age_from_stored(&user.date_of_birth),
        id: user.id,
        username: user.username,
        email: user.email,
        bio: user.bio,
        interests: user.interests,
        favourite_artist: user.favourite_artist,
        gender: user.gender,
        date_of_birth: user.date_of_birth,
        profile_picture: user.profile_picture_url,
        rating: user.rating,
    }
}

pub fn profile_update(update: api::ProfileUpdate) -> ProfileUpdate {
    ProfileUpdate {
        bio: update.bio,
        interests: update.interests,
        favourite_artist: update.favourite_artist,
        gender: update.gender,
        date_of_birth: update.date_of_birth,
        profile_picture_url: update.profile_picture,
    }
}

pub fn event(e: Event) -> api::EventSummary {
    api::EventSummary {
        id: e.id,
        name: e.name,
        venue: e.venue,
        starts_at: e.starts_at,
        location: e.location,
        ticket_url: e.ticket_url,
        image_url: e.image_url,
    }
}

pub fn membership(m: Membership) -> api::PoolMembership {
    api::PoolMembership {
        event: event(m.event),
        joined_at: m.joined_at,
    }
}

pub fn candidate(c: Candidate) -> api::CandidateCard {
    api::CandidateCard {
        user_id: c.user_id,
        username: c.username,
        profile_picture: c.profile_picture,
        favourite_artist: c.favourite_artist,
        gender: c.gender,
        age: c.age,
        about_me: c.about_me,
        rating: c.rating,
        joined_at: c.joined_at,
    }
}

pub fn direction(d: api::Direction) -> Direction {
    match d {
        api::Direction::Left => Direction::Left,
        api::Direction::Right => Direction::Right,
    }
}

pub fn message(m: Message) -> api::ChatMessage {
    api::ChatMessage {
        id: m.id,
        match_id: m.match_id,
        sender_id: m.sender_id,
        receiver_id: m.receiver_id,
        content: m.content,
        created_at: m.created_at,
        is_read: m.is_read,
        sender: None,
    }
}

pub fn thread_message(t: ThreadMessage) -> api::ChatMessage {
    api::ChatMessage {
        sender: Some(api::Sender {
            username: t.sender_username,
            profile_picture: t.sender_picture,
        }),
        ..message(t.message)
    }
}

pub fn match_summary(s: MatchSummary) -> api::MatchSummary {
    api::MatchSummary {
        match_id: s.match_id,
        chat_room_id: s.chat_room_id,
        event_id: s.event_id,
        other_user: api::OtherUser {
            id: s.other_user.id,
            username: s.other_user.username,
            profile_picture: s.other_user.profile_picture,
        },
        unread_messages: s.unread_messages,
        last_message: s.last_message.map(message),
    }
}
