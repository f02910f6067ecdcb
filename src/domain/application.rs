use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AppError, Result};
use super::payment::OwnerRef;

/// A scholarship submission. Every section stays optional until the applicant
/// saves it, so a partially filled record is always valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personal_info: Option<PersonalInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub academic_info: Option<AcademicInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sports_info: Option<Vec<SportEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<AdditionalInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<Documents>,
    pub payment_status: PaymentStatus,
    pub approval_status: ApprovalStatus,
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    /// Amount of the order currently held in `razorpay_order_id`, in minor units.
    pub order_amount: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }

    /// Payment status only ever leaves `pending`, and never comes back.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Completed)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
        )
    }
}

/// Admin review outcome. Independent of the payment axis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Viewed,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Viewed => "viewed",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlayLevel {
    School,
    District,
    State,
    National,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    #[serde(default, deserialize_with = "lenient::optional")]
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::date")]
    pub dob: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::optional")]
    pub gender: Option<Gender>,
    #[serde(default, deserialize_with = "lenient::optional")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional")]
    pub parent_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicInfo {
    #[serde(default, deserialize_with = "lenient::optional")]
    pub is_studying: Option<bool>,
    #[serde(default, deserialize_with = "lenient::optional")]
    pub school_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional")]
    pub grade: Option<String>,
}

impl AcademicInfo {
    /// An unsaved flag falls back to the schema default of "currently studying".
    pub fn studying(&self) -> bool {
        self.is_studying.unwrap_or(true)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SportEntry {
    #[serde(default, deserialize_with = "lenient::optional")]
    pub sport_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional")]
    pub position: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional")]
    pub club_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional")]
    pub level: Option<PlayLevel>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub experience: Option<i64>,
    #[serde(default, deserialize_with = "lenient::optional")]
    pub achievements: Option<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub certificates: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalInfo {
    #[serde(default, deserialize_with = "lenient::optional")]
    pub other_sports: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional")]
    pub leadership_role: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional")]
    pub income_details: Option<String>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub father_income: Option<i64>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub mother_income: Option<i64>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub other_income: Option<i64>,
    /// Derived from the components above whenever any of them is present.
    #[serde(default, deserialize_with = "lenient::integer")]
    pub household_income: Option<i64>,
}

impl AdditionalInfo {
    pub fn with_derived_total(mut self) -> Result<Self> {
        let components = [self.father_income, self.mother_income, self.other_income];
        if components.iter().any(Option::is_some) {
            let total = components
                .iter()
                .flatten()
                .try_fold(0i64, |acc, v| acc.checked_add(*v))
                .ok_or_else(|| {
                    AppError::Validation("Invalid additionalInfo data: income total is out of range".to_string())
                })?;
            self.household_income = Some(total);
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Documents {
    #[serde(default, deserialize_with = "lenient::list")]
    pub certificates: Vec<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub awards: Vec<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub trophies: Vec<String>,
}

/// The independently saveable parts of an application.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Section {
    PersonalInfo,
    AcademicInfo,
    #[serde(alias = "footballInfo")]
    SportsInfo,
    AdditionalInfo,
    Documents,
}

impl Section {
    /// Sections that must be complete before a payment order is created.
    pub const REQUIRED: [Section; 4] = [
        Section::PersonalInfo,
        Section::AcademicInfo,
        Section::SportsInfo,
        Section::AdditionalInfo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::PersonalInfo => "personalInfo",
            Section::AcademicInfo => "academicInfo",
            Section::SportsInfo => "sportsInfo",
            Section::AdditionalInfo => "additionalInfo",
            Section::Documents => "documents",
        }
    }

    /// Storage column holding this section's document.
    pub fn column(&self) -> &'static str {
        match self {
            Section::PersonalInfo => "personal_info",
            Section::AcademicInfo => "academic_info",
            Section::SportsInfo => "sports_info",
            Section::AdditionalInfo => "additional_info",
            Section::Documents => "documents",
        }
    }
}

/// A parsed, server-sanitized section payload ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionUpdate {
    PersonalInfo(PersonalInfo),
    AcademicInfo(AcademicInfo),
    SportsInfo(Vec<SportEntry>),
    AdditionalInfo(AdditionalInfo),
    Documents(Documents),
}

/// Identity and audit keys owned by the server; never accepted from a client payload.
const SERVER_CONTROLLED_FIELDS: &[&str] = &[
    "_id", "id", "userId", "user_id", "__v", "createdAt", "updatedAt", "created_at", "updated_at",
];

pub fn strip_server_fields(value: Value) -> Value {
    match value {
        Value::Object(mut map) => {
            for key in SERVER_CONTROLLED_FIELDS {
                map.remove(*key);
            }
            Value::Object(map)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(strip_server_fields).collect()),
        other => other,
    }
}

impl SectionUpdate {
    pub fn section(&self) -> Section {
        match self {
            SectionUpdate::PersonalInfo(_) => Section::PersonalInfo,
            SectionUpdate::AcademicInfo(_) => Section::AcademicInfo,
            SectionUpdate::SportsInfo(_) => Section::SportsInfo,
            SectionUpdate::AdditionalInfo(_) => Section::AdditionalInfo,
            SectionUpdate::Documents(_) => Section::Documents,
        }
    }

    /// Sanitizes and coerces a raw client payload. Missing fields are fine;
    /// only values that cannot be coerced to their field type are rejected.
    pub fn from_payload(section: Section, data: Value) -> Result<Self> {
        let data = strip_server_fields(data);
        let invalid = |e: serde_json::Error| {
            AppError::Validation(format!("Invalid {} data: {}", section.as_str(), e))
        };

        if section == Section::SportsInfo {
            if let Value::Array(_) = data {
                let entries: Vec<SportEntry> = serde_json::from_value(data).map_err(invalid)?;
                return Ok(SectionUpdate::SportsInfo(entries));
            }
        }

        if !data.is_object() {
            return Err(AppError::Validation(format!(
                "{} must be an object",
                section.as_str()
            )));
        }

        Ok(match section {
            Section::PersonalInfo => {
                SectionUpdate::PersonalInfo(serde_json::from_value(data).map_err(invalid)?)
            }
            Section::AcademicInfo => {
                SectionUpdate::AcademicInfo(serde_json::from_value(data).map_err(invalid)?)
            }
            Section::AdditionalInfo => SectionUpdate::AdditionalInfo(
                serde_json::from_value::<AdditionalInfo>(data)
                    .map_err(invalid)?
                    .with_derived_total()?,
            ),
            Section::Documents => {
                SectionUpdate::Documents(serde_json::from_value(data).map_err(invalid)?)
            }
            Section::SportsInfo => {
                SectionUpdate::SportsInfo(vec![serde_json::from_value(data).map_err(invalid)?])
            }
        })
    }

    /// JSON document stored in the section's column.
    pub fn to_document(&self) -> Result<String> {
        Ok(match self {
            SectionUpdate::PersonalInfo(v) => serde_json::to_string(v)?,
            SectionUpdate::AcademicInfo(v) => serde_json::to_string(v)?,
            SectionUpdate::SportsInfo(v) => serde_json::to_string(v)?,
            SectionUpdate::AdditionalInfo(v) => serde_json::to_string(v)?,
            SectionUpdate::Documents(v) => serde_json::to_string(v)?,
        })
    }
}

/// Required-field bookkeeping for one section.
pub trait RequiredFields {
    fn missing_fields(&self) -> Vec<&'static str>;
}

fn absent(fields: &[(&'static str, bool)]) -> Vec<&'static str> {
    fields
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| *name)
        .collect()
}

impl RequiredFields for PersonalInfo {
    fn missing_fields(&self) -> Vec<&'static str> {
        absent(&[
            ("fullName", self.full_name.is_some()),
            ("dob", self.dob.is_some()),
            ("gender", self.gender.is_some()),
            ("phone", self.phone.is_some()),
            ("address", self.address.is_some()),
            ("parentName", self.parent_name.is_some()),
        ])
    }
}

impl RequiredFields for AcademicInfo {
    fn missing_fields(&self) -> Vec<&'static str> {
        if !self.studying() {
            return Vec::new();
        }
        absent(&[
            ("schoolName", self.school_name.is_some()),
            ("grade", self.grade.is_some()),
        ])
    }
}

impl RequiredFields for SportEntry {
    fn missing_fields(&self) -> Vec<&'static str> {
        absent(&[
            ("sportType", self.sport_type.is_some()),
            ("position", self.position.is_some()),
            ("clubName", self.club_name.is_some()),
            ("level", self.level.is_some()),
            ("experience", self.experience.is_some()),
        ])
    }
}

impl RequiredFields for Vec<SportEntry> {
    /// Entries are checked independently; an empty list counts as one blank entry.
    fn missing_fields(&self) -> Vec<&'static str> {
        if self.is_empty() {
            return SportEntry::default().missing_fields();
        }
        self.iter().flat_map(|entry| entry.missing_fields()).collect()
    }
}

impl RequiredFields for AdditionalInfo {
    fn missing_fields(&self) -> Vec<&'static str> {
        if self.household_income.is_none() {
            vec!["householdIncome"]
        } else {
            Vec::new()
        }
    }
}

fn missing_in<T: RequiredFields + Default>(section: Option<&T>) -> usize {
    match section {
        Some(s) => s.missing_fields().len(),
        None => T::default().missing_fields().len(),
    }
}

/// Where an application sits on the payment axis of its lifecycle.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ApplicationStage {
    Empty,
    PartiallyFilled,
    CompleteUnpaid,
    Paid,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SectionProgress {
    pub personal_info: usize,
    pub academic_info: usize,
    pub sports_info: usize,
    pub additional_info: usize,
    pub complete: bool,
    pub stage: ApplicationStage,
}

impl Application {
    pub fn missing_count(&self, section: Section) -> usize {
        match section {
            Section::PersonalInfo => missing_in(self.personal_info.as_ref()),
            Section::AcademicInfo => missing_in(self.academic_info.as_ref()),
            Section::SportsInfo => missing_in(self.sports_info.as_ref()),
            Section::AdditionalInfo => missing_in(self.additional_info.as_ref()),
            Section::Documents => 0,
        }
    }

    /// True iff every required section has no missing fields.
    pub fn is_complete(&self) -> bool {
        Section::REQUIRED.iter().all(|s| self.missing_count(*s) == 0)
    }

    fn has_any_section(&self) -> bool {
        self.personal_info.is_some()
            || self.academic_info.is_some()
            || self.sports_info.is_some()
            || self.additional_info.is_some()
            || self.documents.is_some()
    }

    pub fn stage(&self) -> ApplicationStage {
        if self.payment_status == PaymentStatus::Completed {
            ApplicationStage::Paid
        } else if self.is_complete() {
            ApplicationStage::CompleteUnpaid
        } else if self.has_any_section() {
            ApplicationStage::PartiallyFilled
        } else {
            ApplicationStage::Empty
        }
    }

    pub fn progress(&self) -> SectionProgress {
        SectionProgress {
            personal_info: self.missing_count(Section::PersonalInfo),
            academic_info: self.missing_count(Section::AcademicInfo),
            sports_info: self.missing_count(Section::SportsInfo),
            additional_info: self.missing_count(Section::AdditionalInfo),
            complete: self.is_complete(),
            stage: self.stage(),
        }
    }

    /// Human-readable summary of what is still missing, e.g. for a 400 response.
    pub fn incomplete_summary(&self) -> Option<String> {
        let parts: Vec<String> = Section::REQUIRED
            .iter()
            .filter_map(|s| {
                let n = self.missing_count(*s);
                (n > 0).then(|| format!("{} ({} missing)", s.as_str(), n))
            })
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(format!("Please complete all sections before payment: {}", parts.join(", ")))
        }
    }
}

impl SectionProgress {
    /// Progress of a user who has not saved anything yet.
    pub fn empty() -> Self {
        Self {
            personal_info: missing_in::<PersonalInfo>(None),
            academic_info: missing_in::<AcademicInfo>(None),
            sports_info: missing_in::<Vec<SportEntry>>(None),
            additional_info: missing_in::<AdditionalInfo>(None),
            complete: false,
            stage: ApplicationStage::Empty,
        }
    }
}

/// Application listing row for the admin back-office.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationWithOwner {
    #[serde(flatten)]
    pub application: Application,
    pub user: Option<OwnerRef>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStats {
    pub total: i64,
    pub paid: i64,
    pub pending_payments: i64,
    pub approved: i64,
}

/// Coercions applied to section fields on the way in.
mod lenient {
    use chrono::{DateTime, NaiveDate, Utc};
    use serde::{de::DeserializeOwned, de::Error, Deserialize, Deserializer};
    use serde_json::Value;

    /// Missing, `null` and blank strings all mean "not provided".
    pub fn optional<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(v) => serde_json::from_value(v).map(Some).map_err(D::Error::custom),
        }
    }

    /// Accepts numbers or numeric strings; fractions are truncated. NaN and
    /// infinities count as not provided.
    pub fn integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Ok(Some(i)),
                (None, Some(f)) => truncate(f).map_err(D::Error::custom),
                (None, None) => Err(D::Error::custom(format!("expected a number, got {}", n))),
            },
            Some(Value::String(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                if let Ok(i) = trimmed.parse::<i64>() {
                    return Ok(Some(i));
                }
                let f = trimmed
                    .parse::<f64>()
                    .map_err(|_| D::Error::custom(format!("expected a number, got {:?}", s)))?;
                truncate(f).map_err(D::Error::custom)
            }
            Some(other) => Err(D::Error::custom(format!("expected a number, got {}", other))),
        }
    }

    fn truncate(f: f64) -> Result<Option<i64>, String> {
        const LIMIT: f64 = 9_223_372_036_854_775_808.0; // 2^63
        if !f.is_finite() {
            return Ok(None);
        }
        let t = f.trunc();
        if t >= LIMIT || t < -LIMIT {
            return Err(format!("number {} is out of range", f));
        }
        Ok(Some(t as i64))
    }

    /// Textual dates, either `YYYY-MM-DD` or a full RFC 3339 timestamp.
    pub fn date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::String(s)) => s,
            Some(other) => return Err(D::Error::custom(format!("expected a date, got {}", other))),
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return Ok(Some(date));
        }
        DateTime::parse_from_rfc3339(trimmed)
            .map(|dt| Some(dt.with_timezone(&Utc).date_naive()))
            .map_err(|_| D::Error::custom(format!("invalid date {:?}", raw)))
    }

    pub fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(v) => serde_json::from_value(v).map_err(D::Error::custom),
        }
    }
}
