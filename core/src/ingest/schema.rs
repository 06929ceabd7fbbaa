use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::geo;
use super::row::{ColumnInfo, Row};
use crate::error::IngestError;

/// Transformed output row keyed by canonical field name.
pub type UserRecord = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserField {
    Email,
    Phone,
    BirthYear,
    BirthMonth,
    BirthDay,
    LastName,
    FirstName,
    FirstInitial,
    City,
    State,
    Zip,
    Country,
    Madid,
    ExternalId,
}

impl UserField {
    /// Detection order. A column is claimed by the first field that matches.
    pub const ALL: [UserField; 14] = [
        Self::Email,
        Self::Phone,
        Self::BirthYear,
        Self::BirthMonth,
        Self::BirthDay,
        Self::LastName,
        Self::FirstName,
        Self::FirstInitial,
        Self::City,
        Self::State,
        Self::Zip,
        Self::Country,
        Self::Madid,
        Self::ExternalId,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::BirthYear => "birth_year",
            Self::BirthMonth => "birth_month",
            Self::BirthDay => "birth_day",
            Self::LastName => "last_name",
            Self::FirstName => "first_name",
            Self::FirstInitial => "first_initial",
            Self::City => "city",
            Self::State => "state",
            Self::Zip => "zip",
            Self::Country => "country",
            Self::Madid => "madid",
            Self::ExternalId => "external_id",
        }
    }

    /// Column tag that claims this field regardless of the column label.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Madid => "mad_id",
            other => other.key(),
        }
    }

    /// Fields able to identify a user on their own.
    pub fn is_identifier(self) -> bool {
        matches!(
            self,
            Self::Email | Self::Phone | Self::Madid | Self::ExternalId
        )
    }

    pub fn is_hashed(self) -> bool {
        !matches!(self, Self::Madid | Self::ExternalId)
    }

    pub fn normalizer(self) -> Normalizer {
        match self {
            Self::Phone => Normalizer::Digits,
            Self::FirstInitial | Self::City => Normalizer::Alphanumeric,
            Self::State => Normalizer::UsState,
            Self::Country => Normalizer::Country,
            Self::BirthYear => Normalizer::Year,
            Self::BirthMonth => Normalizer::Month,
            Self::BirthDay => Normalizer::Day,
            Self::ExternalId => Normalizer::Identity,
            _ => Normalizer::Lowercase,
        }
    }

    fn fallback(self) -> &'static Regex {
        &FALLBACK_PATTERNS[self as usize]
    }
}

lazy_static! {
    // Indexed by `UserField as usize`.
    static ref FALLBACK_PATTERNS: Vec<Regex> = [
        r"(?i)email",
        r"(?i)phone",
        r"(?i)year",
        r"(?i)month",
        r"(?i)day",
        r"(?i)last",
        r"(?i)first",
        r"(?i)initial",
        r"(?i)city",
        r"(?i)state",
        r"(?i)postal|zip",
        r"(?i)country",
        r"(?i)madid",
        r"(?i)external",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("field pattern is valid"))
    .collect();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalizer {
    /// Trim and lowercase.
    Lowercase,
    /// Keep ASCII digits only.
    Digits,
    /// Trim, lowercase, keep ASCII letters and digits.
    Alphanumeric,
    /// US state name or code to a lowercase two-letter code.
    UsState,
    /// Country name or code to a lowercase ISO alpha-2 code.
    Country,
    Year,
    Month,
    Day,
    Identity,
}

impl Normalizer {
    pub fn apply(self, raw: &str) -> String {
        match self {
            Self::Lowercase => raw.trim().to_lowercase(),
            Self::Digits => raw.chars().filter(char::is_ascii_digit).collect(),
            Self::Alphanumeric => raw
                .trim()
                .to_lowercase()
                .chars()
                .filter(char::is_ascii_alphanumeric)
                .collect(),
            Self::UsState => geo::us_state_code(raw),
            Self::Country => geo::country_code(raw),
            Self::Year => date_part(raw, "%Y", 4),
            Self::Month => date_part(raw, "%m", 2),
            Self::Day => date_part(raw, "%d", 2),
            Self::Identity => raw.to_string(),
        }
    }
}

fn date_part(raw: &str, format: &str, width: usize) -> String {
    let trimmed = raw.trim();
    let head = trimmed.get(..10).unwrap_or(trimmed);
    if let Ok(date) = chrono::NaiveDate::parse_from_str(head, "%Y-%m-%d") {
        return date.format(format).to_string();
    }
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return String::new();
    }
    format!("{digits:0>width$}")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HashMode {
    #[default]
    Sha256,
    Plain,
}

impl HashMode {
    /// Values are hashed unless the caller says the data is already hashed.
    pub fn from_form_param(value: Option<&str>) -> Self {
        match value {
            Some("do_no_hashing") => Self::Plain,
            _ => Self::Sha256,
        }
    }
}

/// Column-to-field mapping fixed on the first row of a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMapping {
    columns: Vec<(String, UserField)>,
    hash: HashMode,
}

impl SchemaMapping {
    pub fn detect(columns: &[ColumnInfo], hash: HashMode) -> Result<Self, IngestError> {
        let mut mapped: Vec<(String, UserField)> = Vec::new();

        for column in columns {
            let claimed = UserField::ALL.iter().copied().find(|field| {
                column
                    .tags
                    .iter()
                    .any(|t| t.eq_ignore_ascii_case(field.tag()))
                    || field.fallback().is_match(&column.label)
            });
            match claimed {
                Some(field) if mapped.iter().any(|(_, f)| *f == field) => {
                    tracing::debug!(column = %column.label, field = field.key(), "field already mapped, dropping column");
                }
                Some(field) => {
                    tracing::debug!(column = %column.label, field = field.key(), "column matched");
                    mapped.push((column.label.clone(), field));
                }
                None => {
                    tracing::debug!(column = %column.label, "no field matched, dropping column");
                }
            }
        }

        if !mapped.iter().any(|(_, f)| f.is_identifier()) {
            let labels = columns
                .iter()
                .map(|c| c.label.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(IngestError::SchemaUnresolved(format!(
                "no identifier column (email, phone, madid or external id) among [{labels}]"
            )));
        }

        Ok(Self {
            columns: mapped,
            hash,
        })
    }

    /// Columns derived from a row's own keys, for formats without metadata.
    pub fn detect_from_row(row: &Row, hash: HashMode) -> Result<Self, IngestError> {
        let columns: Vec<ColumnInfo> = row.keys().map(ColumnInfo::untagged).collect();
        Self::detect(&columns, hash)
    }

    pub fn fields(&self) -> impl Iterator<Item = UserField> + '_ {
        self.columns.iter().map(|(_, f)| *f)
    }

    pub fn hash_mode(&self) -> HashMode {
        self.hash
    }

    /// Maps one row. Returns `None` when no mapped column has a value.
    pub fn transform(&self, row: &Row) -> Option<UserRecord> {
        let mut out = UserRecord::new();
        for (column, field) in &self.columns {
            let Some(raw) = row.get(column).and_then(cell_text) else {
                continue;
            };
            let normalized = field.normalizer().apply(&raw);
            if normalized.is_empty() {
                continue;
            }
            let value = match self.hash {
                HashMode::Sha256 if field.is_hashed() => sha256_hex(&normalized),
                _ => normalized,
            };
            out.insert(field.key().to_string(), value);
        }
        (!out.is_empty()).then_some(out)
    }
}

fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn sha256_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}
