use std::{fmt, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use validator::Validate;

use crate::{
    clock,
    errors::{ClientError, ClientResult},
    utils,
};

/// Display text for a reference that cannot be resolved.
pub const NOT_FOUND: &str = "Not found";

/// Canonical record identifier.
///
/// The backend mixes numeric and string encodings of the same id; both decode
/// to the same trimmed string so that `7` and `"7"` compare equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    #[must_use]
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    /// Parse user input, treating blank input as absent.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let id = Self::new(raw);
        (!id.0.is_empty()).then_some(id)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Id {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Id {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<i64> for Id {
    fn from(raw: i64) -> Self {
        Self(raw.to_string())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        match Value::deserialize(d)? {
            Value::String(s) => Ok(Self::new(s)),
            Value::Number(n) => Ok(Self(n.to_string())),
            other => Err(D::Error::custom(format!("expected an identifier, got {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: Id,
    #[serde(rename = "no_ktp", default, deserialize_with = "utils::text")]
    pub national_id: String,
    #[serde(rename = "nama", default, deserialize_with = "utils::text")]
    pub name: String,
    #[serde(rename = "alamat", default, deserialize_with = "utils::text")]
    pub address: String,
    #[serde(rename = "tgl_lahir", default, deserialize_with = "utils::opt_date")]
    pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: Id,
    #[serde(rename = "no_rak", default, deserialize_with = "utils::text")]
    pub shelf_code: String,
    #[serde(rename = "judul", default, deserialize_with = "utils::text")]
    pub title: String,
    #[serde(rename = "pengarang", default, deserialize_with = "utils::text")]
    pub author: String,
    #[serde(rename = "penerbit", default, deserialize_with = "utils::text")]
    pub publisher: String,
    #[serde(rename = "tahun_terbit", default, deserialize_with = "utils::opt_year")]
    pub year: Option<i32>,
    #[serde(rename = "stok", default, deserialize_with = "utils::amount")]
    pub stock: u64,
    #[serde(default, deserialize_with = "utils::text")]
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: Id,
    #[serde(rename = "id_member")]
    pub member_id: Id,
    #[serde(rename = "id_buku")]
    pub book_id: Id,
    #[serde(rename = "tgl_pinjam", deserialize_with = "utils::date")]
    pub loan_date: NaiveDate,
    #[serde(rename = "tgl_pengembalian", deserialize_with = "utils::date")]
    pub due_date: NaiveDate,
    #[serde(rename = "status_pengembalian", default, deserialize_with = "utils::flag")]
    pub returned: bool,
}

impl Loan {
    #[must_use]
    pub fn status_at(&self, now: NaiveDateTime) -> LoanStatus {
        LoanStatus::derive(self.returned, self.due_date, now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoanStatus {
    Active,
    Overdue,
    Returned,
}

impl LoanStatus {
    /// Status of a loan at `now`.
    ///
    /// A loan becomes overdue as soon as `now` passes the start of its due
    /// date. Returned is terminal regardless of dates.
    #[must_use]
    pub fn derive(returned: bool, due_date: NaiveDate, now: NaiveDateTime) -> Self {
        if returned {
            LoanStatus::Returned
        } else if now > clock::start_of_day(due_date) {
            LoanStatus::Overdue
        } else {
            LoanStatus::Active
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoanStatus::Active => "Active",
            LoanStatus::Overdue => "Overdue",
            LoanStatus::Returned => "Returned",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FineCategory {
    Late,
    Damage,
    Other,
}

impl FineCategory {
    /// Value the backend stores in `jenis_denda`.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            FineCategory::Late => "terlambat",
            FineCategory::Damage => "kerusakan",
            FineCategory::Other => "lainnya",
        }
    }
}

impl fmt::Display for FineCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FineCategory::Late => "Late",
            FineCategory::Damage => "Damage",
            FineCategory::Other => "Other",
        })
    }
}

impl FromStr for FineCategory {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "terlambat" | "late" => Ok(FineCategory::Late),
            "kerusakan" | "damage" => Ok(FineCategory::Damage),
            "lainnya" | "other" => Ok(FineCategory::Other),
            other => Err(ClientError::Validation(format!(
                "unknown fine category {other:?}"
            ))),
        }
    }
}

impl Serialize for FineCategory {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.wire_name())
    }
}

impl<'de> Deserialize<'de> for FineCategory {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(D::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fine {
    pub id: Id,
    #[serde(rename = "id_member")]
    pub member_id: Id,
    #[serde(rename = "id_buku", default)]
    pub book_id: Option<Id>,
    #[serde(rename = "jumlah_denda", deserialize_with = "utils::amount")]
    pub amount: u64,
    #[serde(rename = "jenis_denda")]
    pub category: FineCategory,
    #[serde(rename = "deskripsi", default, deserialize_with = "utils::text")]
    pub description: String,
}

/// Loan joined with display names and its status at read time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedLoan {
    #[serde(flatten)]
    pub loan: Loan,
    pub member_name: String,
    pub book_title: String,
    pub status: LoanStatus,
}

/// Fine joined with display names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedFine {
    #[serde(flatten)]
    pub fine: Fine,
    pub member_name: String,
    pub book_title: String,
}

/// Per-member aggregate of the fine ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberFineTotal {
    pub member_id: Id,
    pub member_name: String,
    pub count: usize,
    pub total: u64,
}

/// A form submitted to the backend as a multipart body.
pub trait SubmitForm: Validate {
    /// Wire fields in submission order.
    fn form_fields(&self) -> Vec<(&'static str, String)>;

    /// Client-side checks run before anything is sent.
    ///
    /// # Errors
    /// Returns [`ClientError::Validation`] describing the failed fields.
    fn check(&self) -> ClientResult<()> {
        self.validate()
            .map_err(|e| ClientError::Validation(e.to_string()))
    }
}

fn id_field(id: Option<&Id>) -> String {
    id.map(ToString::to_string).unwrap_or_default()
}

fn date_field(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Default, Validate)]
pub struct MemberForm {
    #[validate(length(equal = 16, message = "national ID must be exactly 16 digits"))]
    pub national_id: String,
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    pub address: String,
    #[validate(required(message = "birth date is required"))]
    pub birth_date: Option<NaiveDate>,
}

impl MemberForm {
    /// Prefill an edit form from an existing member.
    #[must_use]
    pub fn from_member(member: &Member) -> Self {
        Self {
            national_id: member.national_id.clone(),
            name: member.name.clone(),
            address: member.address.clone(),
            birth_date: member.birth_date,
        }
    }
}

impl SubmitForm for MemberForm {
    fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("no_ktp", self.national_id.clone()),
            ("nama", self.name.clone()),
            ("alamat", self.address.clone()),
            ("tgl_lahir", date_field(self.birth_date)),
        ]
    }

    fn check(&self) -> ClientResult<()> {
        self.validate()
            .map_err(|e| ClientError::Validation(e.to_string()))?;
        if !self.national_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ClientError::Validation(
                "national ID must be exactly 16 digits".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Validate)]
pub struct BookForm {
    pub shelf_code: String,
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "author is required"))]
    pub author: String,
    pub publisher: String,
    #[validate(range(min = 1, max = 9999, message = "publication year is out of range"))]
    pub year: Option<i32>,
    pub stock: u32,
    pub detail: String,
}

impl BookForm {
    #[must_use]
    pub fn from_book(book: &Book) -> Self {
        Self {
            shelf_code: book.shelf_code.clone(),
            title: book.title.clone(),
            author: book.author.clone(),
            publisher: book.publisher.clone(),
            year: book.year,
            stock: u32::try_from(book.stock).unwrap_or(u32::MAX),
            detail: book.detail.clone(),
        }
    }
}

impl SubmitForm for BookForm {
    fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("no_rak", self.shelf_code.clone()),
            ("judul", self.title.clone()),
            ("pengarang", self.author.clone()),
            ("penerbit", self.publisher.clone()),
            (
                "tahun_terbit",
                self.year.map(|y| y.to_string()).unwrap_or_default(),
            ),
            ("stok", self.stock.to_string()),
            ("detail", self.detail.clone()),
        ]
    }
}

/// Borrow form. Every field is required; date sanity is left to the server.
#[derive(Debug, Clone, Default, Validate)]
pub struct LoanForm {
    #[validate(required(message = "member is required"))]
    pub member_id: Option<Id>,
    #[validate(required(message = "book is required"))]
    pub book_id: Option<Id>,
    #[validate(required(message = "loan date is required"))]
    pub loan_date: Option<NaiveDate>,
    #[validate(required(message = "due date is required"))]
    pub due_date: Option<NaiveDate>,
}

impl SubmitForm for LoanForm {
    fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("id_member", id_field(self.member_id.as_ref())),
            ("id_buku", id_field(self.book_id.as_ref())),
            ("tgl_pinjam", date_field(self.loan_date)),
            ("tgl_pengembalian", date_field(self.due_date)),
        ]
    }
}

#[derive(Debug, Clone, Validate)]
pub struct FineForm {
    #[validate(required(message = "member is required"))]
    pub member_id: Option<Id>,
    pub book_id: Option<Id>,
    #[validate(range(min = 1, message = "amount must be positive"))]
    pub amount: i64,
    pub category: FineCategory,
    pub description: String,
}

impl FineForm {
    /// Fine recorded automatically when a loan comes back late.
    #[must_use]
    pub fn late_return(loan: &Loan, amount: u64) -> Self {
        Self {
            member_id: Some(loan.member_id.clone()),
            book_id: Some(loan.book_id.clone()),
            amount: i64::try_from(amount).unwrap_or(i64::MAX),
            category: FineCategory::Late,
            description: "Returned after the due date".into(),
        }
    }
}

impl SubmitForm for FineForm {
    fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("id_member", id_field(self.member_id.as_ref()))];
        if let Some(book) = &self.book_id {
            fields.push(("id_buku", book.to_string()));
        }
        fields.extend([
            ("jumlah_denda", self.amount.to_string()),
            ("jenis_denda", self.category.wire_name().to_string()),
            ("deskripsi", self.description.clone()),
        ]);
        fields
    }
}

#[derive(Debug, Serialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
