use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use time::{macros::format_description, Date, OffsetDateTime};
use uuid::Uuid;

use crate::{
    db::{now, uuid_col},
    error::{is_unique_violation, Conflict},
    model::{User, UserId},
    Error, Result,
};

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{3,32}$").unwrap());
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

const USER_COLUMNS: &str = "id, username, email, bio, interests, favourite_artist, gender, \
     date_of_birth, profile_picture_url, rating, created_at";

/// Fields required to create an account. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub date_of_birth: String,
}

/// Partial profile update. `None` leaves a column untouched; an empty string clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub bio: Option<String>,
    pub interests: Option<String>,
    pub favourite_artist: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub profile_picture_url: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.assignments().is_empty()
    }

    fn assignments(&self) -> Vec<(&'static str, &Option<String>)> {
        [
            ("bio", &self.bio),
            ("interests", &self.interests),
            ("favourite_artist", &self.favourite_artist),
            ("gender", &self.gender),
            ("date_of_birth", &self.date_of_birth),
            ("profile_picture_url", &self.profile_picture_url),
        ]
        .into_iter()
        .filter(|(_, v)| v.is_some())
        .collect()
    }
}

/// Parse a `YYYY-MM-DD` birth date, rejecting dates in the future.
pub fn parse_birth_date(input: &str) -> Result<Date> {
    let date = Date::parse(input.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|_| Error::validation("date of birth must be YYYY-MM-DD"))?;
    if date > OffsetDateTime::now_utc().date() {
        return Err(Error::validation("date of birth is in the future"));
    }
    Ok(date)
}

/// Whole years between `birth` and `today`.
pub fn age_on(birth: Date, today: Date) -> u32 {
    let mut years = today.year() - birth.year();
    if (today.month() as u8, today.day()) < (birth.month() as u8, birth.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

/// Age today for a stored birth date; `None` if the stored value is unparsable.
pub fn age_from_stored(date_of_birth: &str) -> Option<u32> {
    let birth = Date::parse(date_of_birth, format_description!("[year]-[month]-[day]")).ok()?;
    Some(age_on(birth, OffsetDateTime::now_utc().date()))
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_col(row, 0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        bio: row.get(3)?,
        interests: row.get(4)?,
        favourite_artist: row.get(5)?,
        gender: row.get(6)?,
        date_of_birth: row.get(7)?,
        profile_picture_url: row.get(8)?,
        rating: row.get(9)?,
        created_at: row.get(10)?,
    })
}

/// Create an account. Username and email are unique, case-insensitively.
pub fn create_user(conn: &Connection, new: NewUser) -> Result<User> {
    let username = new.username.trim();
    let email = new.email.trim();
    if !USERNAME_RE.is_match(username) {
        return Err(Error::validation(
            "username must be 3-32 letters, digits or underscores",
        ));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(Error::validation("email address is malformed"));
    }
    if new.password_hash.is_empty() {
        return Err(Error::validation("password is required"));
    }
    let birth = parse_birth_date(&new.date_of_birth)?;
    let date_of_birth = birth.to_string();

    for (column, value) in [("username", username), ("email", email)] {
        let taken: Option<i64> = conn
            .query_row(
                &format!("SELECT 1 FROM users WHERE {column} = ?1"),
                [value],
                |row| row.get(0),
            )
            .optional()?;
        if taken.is_some() {
            return Err(Conflict::Duplicate(column).into());
        }
    }

    let id = Uuid::new_v4();
    let created_at = now();
    conn.execute(
        "INSERT INTO users (id, username, email, password_hash, date_of_birth, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id.to_string(),
            username,
            email,
            new.password_hash,
            date_of_birth,
            created_at
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::from(Conflict::Duplicate("account"))
        } else {
            e.into()
        }
    })?;
    tracing::info!(user = %id, username, "account created");
    Ok(User {
        id,
        username: username.into(),
        email: email.into(),
        bio: None,
        interests: None,
        favourite_artist: None,
        gender: None,
        date_of_birth,
        profile_picture_url: None,
        rating: None,
        created_at,
    })
}

pub fn get_user(conn: &Connection, id: UserId) -> Result<User> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        [id.to_string()],
        row_to_user,
    )
    .optional()?
    .ok_or(Error::NotFound("user"))
}

/// Id and password hash for a login attempt.
pub fn find_credentials(conn: &Connection, email: &str) -> Result<Option<(UserId, String)>> {
    let found = conn
        .query_row(
            "SELECT id, password_hash FROM users WHERE email = ?1",
            [email.trim()],
            |row| Ok((uuid_col(row, 0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;
    Ok(found)
}

/// Apply the fields present in `update` and return the new profile.
pub fn update_profile(conn: &Connection, id: UserId, update: &ProfileUpdate) -> Result<User> {
    let assignments = update.assignments();
    if assignments.is_empty() {
        return Err(Error::validation("no profile fields to update"));
    }

    let mut values: Vec<Option<String>> = Vec::with_capacity(assignments.len() + 1);
    let mut sets = Vec::with_capacity(assignments.len());
    for (column, value) in &assignments {
        let value = value.as_deref().map(str::trim).filter(|v| !v.is_empty());
        let value = match (*column, value) {
            ("date_of_birth", None) => {
                return Err(Error::validation("date of birth cannot be cleared"))
            }
            ("date_of_birth", Some(raw)) => Some(parse_birth_date(raw)?.to_string()),
            (_, v) => v.map(str::to_owned),
        };
        sets.push(format!("{column} = ?{}", values.len() + 1));
        values.push(value);
    }
    let sql = format!(
        "UPDATE users SET {} WHERE id = ?{}",
        sets.join(", "),
        values.len() + 1
    );
    values.push(Some(id.to_string()));

    let changed = conn.execute(&sql, params_from_iter(values.iter()))?;
    if changed == 0 {
        return Err(Error::NotFound("user"));
    }
    get_user(conn, id)
}
