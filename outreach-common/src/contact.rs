//! Contact store
//!
//! A contact file is a header-delimited CSV. Every row becomes a [`Contact`]
//! (field name to value); the original column order is kept in the
//! [`ContactSet`] so a save writes the columns back exactly as they came in,
//! with the three managed columns appended once if they were missing.

use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

use ahash::AHashMap;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::StoreError;

pub const EMAIL: &str = "email";
pub const DOMAIN: &str = "domain";
pub const SENT: &str = "sent";
pub const SENT_AT: &str = "sent_at";
pub const ERROR: &str = "error";

/// Columns owned by the mailer, appended to the input schema on save.
pub const MANAGED_COLUMNS: [&str; 3] = [SENT, SENT_AT, ERROR];

/// Template/attachment key used when a contact has no `domain` value.
pub const DEFAULT_KEY: &str = "default";

pub const BOUNCED: &str = "bounced (Address not found)";

/// A single row of the contact file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contact {
    fields: AHashMap<String, String>,
}

impl Contact {
    /// Builds a contact from field/value pairs, defaulting the managed fields.
    pub fn from_fields<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut contact = Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        };
        contact.default_managed();
        contact
    }

    fn default_managed(&mut self) {
        self.fields
            .entry(SENT.to_string())
            .or_insert_with(|| "no".to_string());
        self.fields.entry(SENT_AT.to_string()).or_default();
        self.fields.entry(ERROR.to_string()).or_default();
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    #[must_use]
    pub const fn fields(&self) -> &AHashMap<String, String> {
        &self.fields
    }

    /// The recipient address, if the row has a non-blank one.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.get(EMAIL).map(str::trim).filter(|e| !e.is_empty())
    }

    /// Key used to pick a per-domain template and attachment.
    #[must_use]
    pub fn template_key(&self) -> &str {
        self.get(DOMAIN)
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_KEY)
    }

    /// `sent == "yes"`; such a contact is never processed again.
    #[must_use]
    pub fn is_sent(&self) -> bool {
        self.get(SENT)
            .is_some_and(|sent| sent.trim().eq_ignore_ascii_case("yes"))
    }

    #[must_use]
    pub fn sent_at(&self) -> &str {
        self.get(SENT_AT).unwrap_or_default()
    }

    #[must_use]
    pub fn error(&self) -> &str {
        self.get(ERROR).unwrap_or_default()
    }

    pub fn mark_sent(&mut self, at: DateTime<Utc>) {
        self.set(SENT, "yes");
        self.set(SENT_AT, at.to_rfc3339_opts(SecondsFormat::Millis, true));
        self.set(ERROR, "");
    }

    /// Records a failure. `sent` is left untouched so the contact stays
    /// eligible for the next run.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.set(ERROR, error);
    }

    pub fn mark_bounced(&mut self) {
        self.set(SENT, "no");
        self.set(ERROR, BOUNCED);
    }
}

/// An ordered set of contacts sharing one column schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactSet {
    columns: Vec<String>,
    contacts: Vec<Contact>,
}

impl ContactSet {
    #[must_use]
    pub const fn new(columns: Vec<String>, contacts: Vec<Contact>) -> Self {
        Self { columns, contacts }
    }

    /// Loads a contact file.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if `path` does not exist, otherwise any
    /// read or parse failure.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(path.to_path_buf()),
            _ => StoreError::io(path, err),
        })?;

        Self::from_reader(file)
    }

    /// Parses CSV from any reader. Short rows leave the missing fields unset;
    /// cells beyond the header are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not valid CSV.
    pub fn from_reader(reader: impl io::Read) -> Result<Self, StoreError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut contacts = Vec::new();
        for record in reader.records() {
            let record = record?;
            contacts.push(Contact::from_fields(
                columns.iter().cloned().zip(record.iter().map(str::to_string)),
            ));
        }

        Ok(Self { columns, contacts })
    }

    /// Writes the set back to `path`, replacing it.
    ///
    /// The data goes to a hidden sibling file first and is renamed over the
    /// target, so a failed write leaves the previous file intact.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or renamed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let tmp = temp_path(path);

        let result = File::create(&tmp)
            .map_err(|err| StoreError::io(&tmp, err))
            .and_then(|file| self.write_to(file).map_err(|err| write_error(&tmp, err)))
            .and_then(|file| file.sync_all().map_err(|err| StoreError::io(&tmp, err)))
            .and_then(|()| fs::rename(&tmp, path).map_err(|err| StoreError::io(path, err)));

        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }

    /// Serializes the set as CSV and hands the writer back.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `writer` fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<W, csv::Error> {
        let header = self.header();
        let mut writer = csv::Writer::from_writer(writer);

        writer.write_record(&header)?;
        for contact in &self.contacts {
            writer.write_record(
                header
                    .iter()
                    .map(|column| contact.get(column).unwrap_or_default()),
            )?;
        }

        writer
            .into_inner()
            .map_err(|err| csv::Error::from(err.into_error()))
    }

    /// Output column order: input columns first (duplicates collapsed), then
    /// any managed column the input lacked.
    #[must_use]
    pub fn header(&self) -> Vec<&str> {
        let mut header: Vec<&str> = Vec::with_capacity(self.columns.len() + MANAGED_COLUMNS.len());
        for column in self
            .columns
            .iter()
            .map(String::as_str)
            .chain(MANAGED_COLUMNS)
        {
            if !header.contains(&column) {
                header.push(column);
            }
        }
        header
    }

    /// Columns as they appeared in the input.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Contact> {
        self.contacts.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Contact> {
        self.contacts.iter_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}

impl<'a> IntoIterator for &'a mut ContactSet {
    type Item = &'a mut Contact;
    type IntoIter = std::slice::IterMut<'a, Contact>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

fn write_error(path: &Path, err: csv::Error) -> StoreError {
    let source = match err.into_kind() {
        csv::ErrorKind::Io(source) => source,
        other => io::Error::other(format!("{other:?}")),
    };
    StoreError::io(path, source)
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "contacts".into(), |n| n.to_string_lossy());
    path.with_file_name(format!(".{name}.tmp"))
}
