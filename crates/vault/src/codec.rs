//! Text encoding of a vault's record list.
//!
//! Current format, always written:
//!
//! ```text
//! v2~<field>;<field>;...;~<field>;...;~
//! field = <byte length>:<bytes> | nil
//! ```
//!
//! Fields are length-prefixed, so user text may contain any character,
//! including the separators themselves and the literal word `nil`.
//!
//! Older builds wrote bare delimiters (`;;;` between fields, `~~~` between
//! records). That layout is still read, never written.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::{
    error::VaultError,
    record::{Account, Note, RecordFields, RecordId, RecordKind, VaultRecord, timestamp_now},
};

/// Plaintext persisted for a vault with no records.
pub const EMPTY_SENTINEL: &str = "empty";

/// Locale-independent "medium date, short time" layout, always UTC.
pub const DATE_FORMAT: &str = "%b %-d, %Y at %-I:%M %p";

const FORMAT_MARKER: &str = "v2~";
const NIL: &str = "nil";
const FIELD_END: char = ';';
const RECORD_END: char = '~';
const LEGACY_RECORD_SEPARATOR: &str = "~~~";
const LEGACY_FIELD_SEPARATOR: &str = ";;;";

const ACCOUNT_FIELDS: usize = 10;
const NOTE_FIELDS: usize = 7;

/// Encode a vault. `None` and an empty list both become [`EMPTY_SENTINEL`].
pub fn format(records: Option<&[VaultRecord]>) -> String {
    let Some(records) = records.filter(|r| !r.is_empty()) else {
        return EMPTY_SENTINEL.to_string();
    };

    let mut out = String::from(FORMAT_MARKER);
    for record in records {
        encode_record(&mut out, record);
    }
    out
}

/// Decode a vault. Returns `Ok(None)` for the empty sentinel.
pub fn parse(text: &str) -> Result<Option<Vec<VaultRecord>>, VaultError> {
    if text == EMPTY_SENTINEL {
        return Ok(None);
    }

    let records = match text.strip_prefix(FORMAT_MARKER) {
        Some(body) => parse_current(body)?,
        None => parse_legacy(text)?,
    };
    Ok(if records.is_empty() { None } else { Some(records) })
}

/// Render a timestamp in [`DATE_FORMAT`].
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a [`DATE_FORMAT`] timestamp, falling back to now when unreadable.
pub fn parse_date(text: &str) -> DateTime<Utc> {
    match NaiveDateTime::parse_from_str(text, DATE_FORMAT) {
        Ok(naive) => naive.and_utc(),
        Err(_e) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_e, "unreadable record date, substituting current time");
            timestamp_now()
        },
    }
}

fn encode_record(out: &mut String, record: &VaultRecord) {
    let created = format_date(&record.creation_time());
    let updated = record.updated_time().map(|t| format_date(&t));
    let id = record.id().to_string();

    push_field(out, Some(record.kind().as_str()));
    push_field(out, Some(&id));
    push_field(out, Some(&created));
    push_field(out, updated.as_deref());
    push_field(out, Some(if record.starred() { "true" } else { "false" }));

    match record.fields() {
        RecordFields::Account(account) => {
            push_field(out, Some(&account.name));
            push_field(out, Some(&account.username));
            push_field(out, Some(&account.password));
            push_field(out, account.url.as_deref());
            push_field(out, account.otp_secret.as_deref());
        },
        RecordFields::Note(note) => {
            push_field(out, Some(&note.title));
            push_field(out, Some(&note.body));
        },
    }
    out.push(RECORD_END);
}

fn push_field(out: &mut String, value: Option<&str>) {
    match value {
        Some(value) => {
            out.push_str(&value.len().to_string());
            out.push(':');
            out.push_str(value);
        },
        None => out.push_str(NIL),
    }
    out.push(FIELD_END);
}

enum Token<'a> {
    Value(&'a str),
    Nil,
    RecordEnd,
}

struct FieldReader<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn next_token(&mut self) -> Result<Token<'a>, VaultError> {
        let rest = &self.text[self.pos..];

        if rest.starts_with(RECORD_END) {
            self.pos += RECORD_END.len_utf8();
            return Ok(Token::RecordEnd);
        }
        if let Some(after_nil) = rest.strip_prefix(NIL)
            && after_nil.starts_with(FIELD_END)
        {
            self.pos += NIL.len() + FIELD_END.len_utf8();
            return Ok(Token::Nil);
        }

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return Err(malformed(if rest.is_empty() {
                "unterminated record"
            } else {
                "field is missing its length prefix"
            }));
        }
        if !rest[digits..].starts_with(':') {
            return Err(malformed("field length is not followed by ':'"));
        }
        let len: usize = rest[..digits]
            .parse()
            .map_err(|_| malformed("field length out of range"))?;

        let start = digits + 1;
        let end = start
            .checked_add(len)
            .ok_or_else(|| malformed("field length out of range"))?;
        let value = rest
            .get(start..end)
            .ok_or_else(|| malformed("field overruns the input"))?;
        if !rest[end..].starts_with(FIELD_END) {
            return Err(malformed("field is not terminated"));
        }

        self.pos += end + FIELD_END.len_utf8();
        Ok(Token::Value(value))
    }
}

fn parse_current(body: &str) -> Result<Vec<VaultRecord>, VaultError> {
    let mut reader = FieldReader::new(body);
    let mut records = Vec::new();

    while !reader.is_at_end() {
        let mut fields = Vec::new();
        loop {
            match reader.next_token()? {
                Token::Value(value) => fields.push(Some(value)),
                Token::Nil => fields.push(None),
                Token::RecordEnd => break,
            }
        }
        records.push(decode_record(&fields)?);
    }
    Ok(records)
}

fn parse_legacy(text: &str) -> Result<Vec<VaultRecord>, VaultError> {
    text.split(LEGACY_RECORD_SEPARATOR)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let fields: Vec<Option<&str>> = entry
                .split(LEGACY_FIELD_SEPARATOR)
                .map(|field| (field != NIL).then_some(field))
                .collect();
            decode_record(&fields)
        })
        .collect()
}

fn decode_record(fields: &[Option<&str>]) -> Result<VaultRecord, VaultError> {
    let kind = match fields.first().copied().flatten() {
        Some("account") => RecordKind::Account,
        Some("note") => RecordKind::Note,
        Some(other) => return Err(malformed(format!("unknown record kind {other:?}"))),
        None => return Err(malformed("record kind is missing")),
    };
    let expected = match kind {
        RecordKind::Account => ACCOUNT_FIELDS,
        RecordKind::Note => NOTE_FIELDS,
    };
    if fields.len() != expected {
        return Err(malformed(format!(
            "{kind} record has {} fields, expected {expected}",
            fields.len()
        )));
    }

    let id: RecordId = required(fields, 1, "id")?
        .parse()
        .map_err(|_| malformed("record id is not a uuid"))?;
    let creation_time = parse_date(required(fields, 2, "creation time")?);
    // A creation date that fell back to now must not postdate the update.
    let updated_time = fields[3].map(|text| parse_date(text).max(creation_time));
    let starred = match required(fields, 4, "starred")? {
        "true" => true,
        "false" => false,
        other => return Err(malformed(format!("starred flag {other:?} is not a bool"))),
    };

    let record_fields = match kind {
        RecordKind::Account => RecordFields::Account(Account {
            name: required(fields, 5, "name")?.to_string(),
            username: required(fields, 6, "username")?.to_string(),
            password: required(fields, 7, "password")?.to_string(),
            url: fields[8].map(str::to_string),
            otp_secret: fields[9].map(str::to_string),
        }),
        RecordKind::Note => RecordFields::Note(Note {
            title: required(fields, 5, "title")?.to_string(),
            body: required(fields, 6, "body")?.to_string(),
        }),
    };

    Ok(VaultRecord::from_parts(
        id,
        creation_time,
        updated_time,
        starred,
        record_fields,
    ))
}

fn required<'a>(
    fields: &[Option<&'a str>],
    index: usize,
    name: &str,
) -> Result<&'a str, VaultError> {
    fields
        .get(index)
        .copied()
        .flatten()
        .ok_or_else(|| malformed(format!("required field {name} is nil")))
}

fn malformed(message: impl Into<String>) -> VaultError {
    VaultError::MalformedRecord(message.into())
}
