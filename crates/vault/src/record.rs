//! Vault records: accounts and notes.

use {
    chrono::{DateTime, Timelike, Utc},
    uuid::Uuid,
};

use crate::error::VaultError;

/// Stable record identifier. Random, so ids are never reused after deletion.
pub type RecordId = Uuid;

/// Which vault a record belongs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Account,
    Note,
}

impl RecordKind {
    pub const ALL: [Self; 2] = [Self::Account, Self::Note];

    /// Tag written as the first field of every encoded record.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Note => "note",
        }
    }

    /// File holding this kind's blob, in both the local and secondary location.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Account => "accounts.vault",
            Self::Note => "notes.vault",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Login credentials.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Account {
    pub name: String,
    pub username: String,
    pub password: String,
    pub url: Option<String>,
    pub otp_secret: Option<String>,
}

/// Free-form secure note.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Note {
    pub title: String,
    pub body: String,
}

/// The user-editable part of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordFields {
    Account(Account),
    Note(Note),
}

impl RecordFields {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Account(_) => RecordKind::Account,
            Self::Note(_) => RecordKind::Note,
        }
    }

    /// Name for an account, title for a note.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Account(account) => &account.name,
            Self::Note(note) => &note.title,
        }
    }

    /// Reject records with an empty mandatory display field.
    pub fn validate(&self) -> Result<(), VaultError> {
        let missing = match self {
            Self::Account(account) => [
                ("name", &account.name),
                ("username", &account.username),
                ("password", &account.password),
            ]
            .into_iter()
            .find(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| field),
            Self::Note(note) => note.title.trim().is_empty().then_some("title"),
        };
        match missing {
            Some(field) => Err(VaultError::InvalidRecord(format!(
                "{} {field} must not be empty",
                self.kind()
            ))),
            None => Ok(()),
        }
    }
}

impl From<Account> for RecordFields {
    fn from(account: Account) -> Self {
        Self::Account(account)
    }
}

impl From<Note> for RecordFields {
    fn from(note: Note) -> Self {
        Self::Note(note)
    }
}

/// One entry in a vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultRecord {
    id: RecordId,
    creation_time: DateTime<Utc>,
    updated_time: Option<DateTime<Utc>>,
    starred: bool,
    fields: RecordFields,
}

impl VaultRecord {
    /// A new, unstarred record created now with a fresh id.
    pub fn new(fields: impl Into<RecordFields>) -> Self {
        Self {
            id: Uuid::new_v4(),
            creation_time: timestamp_now(),
            updated_time: None,
            starred: false,
            fields: fields.into(),
        }
    }

    /// Rebuild a record from persisted parts.
    pub fn from_parts(
        id: RecordId,
        creation_time: DateTime<Utc>,
        updated_time: Option<DateTime<Utc>>,
        starred: bool,
        fields: RecordFields,
    ) -> Self {
        Self {
            id,
            creation_time,
            updated_time,
            starred,
            fields,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    pub fn updated_time(&self) -> Option<DateTime<Utc>> {
        self.updated_time
    }

    pub fn starred(&self) -> bool {
        self.starred
    }

    pub fn fields(&self) -> &RecordFields {
        &self.fields
    }

    pub fn kind(&self) -> RecordKind {
        self.fields.kind()
    }

    pub fn display_name(&self) -> &str {
        self.fields.display_name()
    }

    pub(crate) fn reassign_id(&mut self) {
        self.id = Uuid::new_v4();
    }

    pub(crate) fn replace_fields(&mut self, fields: RecordFields) {
        self.fields = fields;
        self.touch();
    }

    pub(crate) fn set_starred(&mut self, starred: bool) {
        self.starred = starred;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_time = Some(timestamp_now().max(self.creation_time));
    }
}

/// Current time at the precision the record codec persists (whole minutes).
pub fn timestamp_now() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now)
}

/// Ordering applied by [`VaultStore::sort_by`](crate::store::VaultStore::sort_by).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortCriterion {
    CreatedAscending,
    CreatedDescending,
    Alphabetical,
}

impl SortCriterion {
    /// Look up a criterion by the name collaborators pass around.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "created-asc" | "oldest" => Some(Self::CreatedAscending),
            "created-desc" | "newest" => Some(Self::CreatedDescending),
            "alphabetical" | "name" | "title" => Some(Self::Alphabetical),
            _ => None,
        }
    }
}

/// Stable sort by `criterion`.
pub fn sort_records(records: &mut [VaultRecord], criterion: SortCriterion) {
    match criterion {
        SortCriterion::CreatedAscending => records.sort_by_key(|r| r.creation_time),
        SortCriterion::CreatedDescending => {
            records.sort_by(|a, b| b.creation_time.cmp(&a.creation_time))
        },
        SortCriterion::Alphabetical => {
            records.sort_by_cached_key(|r| r.display_name().to_lowercase())
        },
    }
}

/// Stable partition: starred records first, each group keeping its order.
pub fn partition_starred(records: Vec<VaultRecord>) -> Vec<VaultRecord> {
    let (mut starred, unstarred): (Vec<_>, Vec<_>) =
        records.into_iter().partition(VaultRecord::starred);
    starred.extend(unstarred);
    starred
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, chrono::TimeZone};

    fn account(name: &str) -> Account {
        Account {
            name: name.into(),
            username: "alice".into(),
            password: "hunter2".into(),
            url: None,
            otp_secret: None,
        }
    }

    fn at(minute: u32, name: &str, starred: bool) -> VaultRecord {
        VaultRecord::from_parts(
            Uuid::new_v4(),
            Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap(),
            None,
            starred,
            account(name).into(),
        )
    }

    fn names(records: &[VaultRecord]) -> Vec<&str> {
        records.iter().map(VaultRecord::display_name).collect()
    }

    #[test]
    fn new_record_defaults() {
        let record = VaultRecord::new(account("bank"));
        assert_eq!(record.kind(), RecordKind::Account);
        assert!(!record.starred());
        assert!(record.updated_time().is_none());
        assert_eq!(record.creation_time().second(), 0);
    }

    #[test]
    fn ids_are_unique() {
        let a = VaultRecord::new(account("a"));
        let b = VaultRecord::new(account("a"));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn mutation_sets_updated_time_not_before_creation() {
        let mut record = VaultRecord::new(account("bank"));
        record.set_starred(true);
        let updated = record.updated_time().unwrap();
        assert!(updated >= record.creation_time());
    }

    #[test]
    fn validate_rejects_empty_account_fields() {
        let mut missing_password = account("bank");
        missing_password.password.clear();
        let err = RecordFields::from(missing_password).validate().unwrap_err();
        assert!(err.to_string().contains("password"));

        let blank_name = RecordFields::from(account("   "));
        assert!(blank_name.validate().is_err());
    }

    #[test]
    fn validate_note_requires_title_only() {
        let note = Note {
            title: "wifi".into(),
            body: String::new(),
        };
        assert!(RecordFields::from(note).validate().is_ok());
        assert!(RecordFields::from(Note::default()).validate().is_err());
    }

    #[test]
    fn sort_by_creation_time() {
        let mut records = vec![at(3, "c", false), at(1, "a", false), at(2, "b", false)];
        sort_records(&mut records, SortCriterion::CreatedAscending);
        assert_eq!(names(&records), ["a", "b", "c"]);
        sort_records(&mut records, SortCriterion::CreatedDescending);
        assert_eq!(names(&records), ["c", "b", "a"]);
    }

    #[test]
    fn alphabetical_sort_is_case_insensitive_and_stable() {
        let mut records = vec![
            at(1, "beta", false),
            at(2, "Alpha", false),
            at(3, "alpha", true),
        ];
        sort_records(&mut records, SortCriterion::Alphabetical);
        assert_eq!(names(&records), ["Alpha", "alpha", "beta"]);
    }

    #[test]
    fn starred_partition_preserves_relative_order() {
        let records = vec![
            at(1, "a", false),
            at(2, "b", true),
            at(3, "c", false),
            at(4, "d", true),
            at(5, "e", false),
        ];
        let sorted = partition_starred(records);
        assert_eq!(names(&sorted), ["b", "d", "a", "c", "e"]);
    }

    #[test]
    fn criterion_names() {
        assert_eq!(
            SortCriterion::from_name("Newest"),
            Some(SortCriterion::CreatedDescending)
        );
        assert_eq!(
            SortCriterion::from_name("alphabetical"),
            Some(SortCriterion::Alphabetical)
        );
        assert_eq!(SortCriterion::from_name("by-color"), None);
    }
}
