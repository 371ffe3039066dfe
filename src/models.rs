// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Accepts RFC 3339 strings or epoch milliseconds; the backend has sent both.
fn deserialize_optional_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value: Value = Deserialize::deserialize(deserializer)?;

    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| D::Error::custom(format!("Invalid timestamp '{}': {}", s, e))),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .map(Some)
            .ok_or_else(|| D::Error::custom("Timestamp out of range")),
        _ => Err(D::Error::custom("Expected timestamp string, number, or null")),
    }
}

fn deserialize_optional_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value: Value = Deserialize::deserialize(deserializer)?;

    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("Expected number, got '{}'", s))),
        _ => Err(D::Error::custom("Expected string, number, or null")),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Client,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Client => write!(f, "client"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// Identity payload returned by `/users/me`, `/users/login` and friends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "_destroy", default)]
    pub destroyed: bool,
}

/// The locally known identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(flatten)]
    pub user: User,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_login: Option<DateTime<Utc>>,
}

impl Session {
    pub fn from_user(user: User) -> Self {
        Self {
            user,
            last_login: None,
        }
    }

    pub fn with_last_login(mut self, at: DateTime<Utc>) -> Self {
        self.last_login = Some(at);
        self
    }

    pub fn id(&self) -> &str {
        &self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Registration form data. The confirmation only exists for local
/// validation and is never sent.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterData {
    pub email: String,
    pub password: String,
    #[serde(skip)]
    pub confirm_password: Option<String>,
}

impl RegisterData {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            confirm_password: None,
        }
    }

    pub fn with_confirmation(mut self, confirm: impl Into<String>) -> Self {
        self.confirm_password = Some(confirm.into());
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(format!("Invalid email address: '{}'", self.email));
        }
        if self.password.is_empty() {
            return Err("Password is required".to_string());
        }
        if let Some(confirm) = &self.confirm_password
            && confirm != &self.password
        {
            return Err("Passwords do not match".to_string());
        }
        Ok(())
    }
}

/// Partial profile update for `PUT /users/:id`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Category {
    /// Route slug the web front end used for this category.
    pub fn slug(&self) -> String {
        if self.name == "Feature" {
            "featured".to_string()
        } else {
            self.name.to_lowercase()
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub review: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub movie_image: Option<String>,
    #[serde(rename = "movieURL", default)]
    pub movie_url: Option<String>,
    #[serde(default)]
    pub movie_sub: Option<String>,
    #[serde(default)]
    pub category_ids: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number")]
    pub year: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_optional_number")]
    pub rating: Option<f64>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub genre: Vec<String>,
    #[serde(default)]
    pub director: Option<String>,
    #[serde(default)]
    pub cast: Vec<String>,
    #[serde(default)]
    pub series_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "_destroy", default)]
    pub destroyed: bool,
}

impl std::fmt::Display for Movie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.year {
            Some(year) => write!(f, "{} ({})", self.title, year as i64),
            None => write!(f, "{}", self.title),
        }
    }
}

/// `GET /category/:id/movies` and `GET /movies` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoviesPage {
    pub movies: Vec<Movie>,
    #[serde(default)]
    pub total_movies: u64,
}

/// List endpoints answer either with a bare array or wrapped in an object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum MovieList {
    Wrapped { movies: Vec<Movie> },
    Bare(Vec<Movie>),
}

impl MovieList {
    pub(crate) fn into_movies(self) -> Vec<Movie> {
        match self {
            Self::Wrapped { movies } => movies,
            Self::Bare(movies) => movies,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum CategoryList {
    Wrapped { categories: Vec<Category> },
    Bare(Vec<Category>),
}

impl CategoryList {
    pub(crate) fn into_categories(self) -> Vec<Category> {
        match self {
            Self::Wrapped { categories } => categories,
            Self::Bare(categories) => categories,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(alias = "title")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub poster: Option<String>,
}

/// A series document together with the movies that belong to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesBundle {
    pub series: Option<Series>,
    pub movies: Vec<Movie>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub movie_image: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number")]
    pub rating: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_optional_number")]
    pub year: Option<f64>,
}
