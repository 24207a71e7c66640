//! Reference data and value types the workflow operates on
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

#[derive(Debug, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl<T: TimeZone> PartialEq for TimeStamp<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: TimeZone> Eq for TimeStamp<T> {}

impl<T: TimeZone> PartialOrd for TimeStamp<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: TimeZone> Ord for TimeStamp<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        min: u32,
        sec: u32,
    ) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(Self)
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
    /// Whole days elapsed from `self` until `later`, clamped at zero.
    pub fn days_until(&self, later: &TimeStamp<Utc>) -> i64 {
        (later.0 - self.0).num_days().max(0)
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl fmt::Display for TimeStamp<Utc> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

// ids are opaque strings owned by whoever issued them (directory, store, ui)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, minicbor::Encode, minicbor::Decode)]
#[cbor(array)]
pub struct UserId(#[n(0)] String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, minicbor::Encode, minicbor::Decode)]
#[cbor(array)]
pub struct DocumentId(#[n(0)] String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
    /// Mint a fresh uuid7 based id under the given bech32 prefix.
    pub fn generate(hrp: &str) -> anyhow::Result<Self> {
        Ok(Self(crate::utils::new_uuid_to_bech32(hrp)?))
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position in the institution. Ordered from junior to senior, but never
/// consulted when building or advancing a chain.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum UserRole {
    #[n(0)]
    Faculty,
    #[n(1)]
    AssistantProfessor,
    #[n(2)]
    Hod,
    #[n(3)]
    Principal,
    #[n(4)]
    Director,
}

impl UserRole {
    pub fn label(&self) -> &'static str {
        match self {
            UserRole::Faculty => "Faculty",
            UserRole::AssistantProfessor => "Asst. Professor",
            UserRole::Hod => "Head of Department",
            UserRole::Principal => "Principal",
            UserRole::Director => "Director",
        }
    }
}

#[derive(Debug, Clone, minicbor::Encode, minicbor::Decode)]
pub struct User {
    #[n(0)]
    pub id: UserId,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub email: String,
    #[n(3)]
    pub role: UserRole,
    #[n(4)]
    pub department: String,
}

impl User {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        role: UserRole,
        department: impl Into<String>,
    ) -> Self {
        Self {
            id: UserId::new(id),
            name: name.into(),
            email: email.into(),
            role,
            department: department.into(),
        }
    }
}

// directory entries are identified by id alone
impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for User {}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureKind {
    #[n(0)]
    Signature,
    #[n(1)]
    Stamp,
}

/// An approver's reusable mark. The image itself lives outside the engine.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Signature {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub kind: SignatureKind,
}

impl Signature {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: SignatureKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
        }
    }
}

/// A signature or stamp dropped onto the page. Coordinates are percentages.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct Placement {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub signature_id: String,
    #[n(2)]
    pub x: f64,
    #[n(3)]
    pub y: f64,
}

impl Placement {
    pub fn new(id: impl Into<String>, signature_id: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            signature_id: signature_id.into(),
            x,
            y,
        }
    }
    pub fn of(id: impl Into<String>, signature: &Signature, x: f64, y: f64) -> Self {
        Self::new(id, signature.id.clone(), x, y)
    }
    pub fn is_on_page(&self) -> bool {
        let within = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);
        within(self.x) && within(self.y)
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepStatus {
    #[n(0)]
    Waiting,
    #[n(1)]
    Pending,
    #[n(2)]
    Approved,
    #[n(3)]
    Rejected,
}

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct ApprovalStep {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub approver: User,
    #[n(2)]
    pub order_index: u32,
    #[n(3)]
    pub status: StepStatus,
    #[n(4)]
    pub acted_at: Option<TimeStamp<Utc>>,
    #[n(5)]
    pub comment: Option<String>,
    #[n(6)]
    pub placements: Option<Vec<Placement>>,
}

impl ApprovalStep {
    pub fn new(id: String, approver: User, order_index: u32, status: StepStatus) -> Self {
        Self {
            id,
            approver,
            order_index,
            status,
            acted_at: None,
            comment: None,
            placements: None,
        }
    }
    // back to an untouched slot, keeps identity and position
    pub(crate) fn reset(&mut self, status: StepStatus) {
        self.status = status;
        self.acted_at = None;
        self.comment = None;
        self.placements = None;
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditAction {
    #[n(0)]
    Submitted,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
    #[n(3)]
    Revised,
    #[n(4)]
    Archived,
    #[n(5)]
    ReminderSent,
}

impl AuditAction {
    pub fn label(&self) -> &'static str {
        match self {
            AuditAction::Submitted => "Submitted",
            AuditAction::Approved => "Approved",
            AuditAction::Rejected => "Rejected",
            AuditAction::Revised => "Revised",
            AuditAction::Archived => "Archived",
            AuditAction::ReminderSent => "Reminder Sent",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct AuditEntry {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub action: AuditAction,
    #[n(2)]
    pub actor: User,
    #[n(3)]
    pub timestamp: TimeStamp<Utc>,
    #[n(4)]
    pub details: Option<String>,
    #[n(5)]
    pub version: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct DocumentVersion {
    #[n(0)]
    pub version: u32,
    #[n(1)]
    pub file_ref: String,
    #[n(2)]
    pub uploaded_at: TimeStamp<Utc>,
    #[n(3)]
    pub uploaded_by: User,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentStatus {
    #[n(0)]
    Draft,
    #[n(1)]
    Pending,
    #[n(2)]
    Approved,
    #[n(3)]
    Rejected,
    #[n(4)]
    Archived,
}

impl DocumentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "Draft",
            DocumentStatus::Pending => "Pending",
            DocumentStatus::Approved => "Approved",
            DocumentStatus::Rejected => "Rejected",
            DocumentStatus::Archived => "Archived",
        }
    }
    /// No further workflow action is possible.
    pub fn is_read_only(&self) -> bool {
        matches!(self, DocumentStatus::Approved | DocumentStatus::Archived)
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn users_compare_by_id() {
        let a = User::new("u1", "A", "a@college.edu", UserRole::Faculty, "CS");
        let b = User::new("u1", "Renamed", "b@college.edu", UserRole::Director, "Admin");
        assert_eq!(a, b);
    }

    #[test]
    fn placement_bounds() {
        assert!(Placement::new("p", "sig", 0.0, 100.0).is_on_page());
        assert!(!Placement::new("p", "sig", -0.1, 50.0).is_on_page());
        assert!(!Placement::new("p", "sig", 50.0, f64::NAN).is_on_page());
    }

    #[test]
    fn placement_references_its_signature() {
        let stamp = Signature::new("stamp-1", "Department Stamp", SignatureKind::Stamp);
        let placement = Placement::of("p-1", &stamp, 12.5, 90.0);
        assert_eq!(placement.signature_id, "stamp-1");
        assert!(placement.is_on_page());
    }

    #[test]
    fn days_until_clamps() {
        let a = TimeStamp::new_with(2026, 2, 1, 0, 0, 0).unwrap();
        let b = TimeStamp::new_with(2026, 2, 4, 12, 0, 0).unwrap();
        assert_eq!(a.days_until(&b), 3);
        assert_eq!(b.days_until(&a), 0);
    }
}
