//! Letter records: the persisted archive entry, the editable draft that
//! precedes it, and the partial patch used to amend it.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Priority tag carried by every letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Importance {
    #[default]
    Normal,
    #[serde(alias = "Très Urgent")]
    Urgent,
}

impl Importance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Urgent => "Urgent",
        }
    }

    /// Map a free-form label returned by the extraction service onto the
    /// two-value scale. Anything mentioning "urgent" is urgent. Operator input
    /// goes through [`FromStr`] instead.
    pub fn from_label(label: &str) -> Self {
        if label.to_lowercase().contains("urgent") {
            Self::Urgent
        } else {
            Self::Normal
        }
    }
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Importance {
    type Err = UnknownImportance;

    /// Strict parse for operator input. Only the two scale values (and the
    /// stored "Très Urgent" alias) are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "urgent" | "très urgent" => Ok(Self::Urgent),
            _ => Err(UnknownImportance(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownImportance(pub String);

impl fmt::Display for UnknownImportance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown importance '{}' (expected Normal or Urgent)", self.0)
    }
}

impl std::error::Error for UnknownImportance {}

/// The reviewable fields of a letter, named as they appear on the wire and in
/// the persisted archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LetterField {
    SenderService,
    ReceiverService,
    Date,
    LetterNumber,
    Subject,
    Importance,
    Body,
}

impl LetterField {
    pub const ALL: [LetterField; 7] = [
        Self::SenderService,
        Self::ReceiverService,
        Self::Date,
        Self::LetterNumber,
        Self::Subject,
        Self::Importance,
        Self::Body,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SenderService => "senderService",
            Self::ReceiverService => "receiverService",
            Self::Date => "date",
            Self::LetterNumber => "letterNumber",
            Self::Subject => "subject",
            Self::Importance => "importance",
            Self::Body => "body",
        }
    }
}

impl fmt::Display for LetterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownField(pub String);

impl fmt::Display for UnknownField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = LetterField::ALL.iter().map(|f| f.as_str()).collect();
        write!(f, "unknown field '{}' (expected one of: {})", self.0, names.join(", "))
    }
}

impl std::error::Error for UnknownField {}

impl FromStr for LetterField {
    type Err = UnknownField;

    /// Accepts the camelCase wire name or its snake/kebab spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        LetterField::ALL
            .into_iter()
            .find(|f| f.as_str().to_lowercase() == folded)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

/// A persisted archive entry.
///
/// `id` and `created_at` are assigned by the store on save and never change.
/// Every other field can be amended through [`LetterPatch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub sender_service: String,
    #[serde(default)]
    pub receiver_service: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub letter_number: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub importance: Importance,
    /// Encoded image payload (a `data:` URL), opaque to the archive.
    #[serde(default)]
    pub image_data: String,
}

impl LetterRecord {
    /// Build a record from a reviewed draft plus the identity the store assigned.
    pub fn from_draft(id: String, created_at: DateTime<Utc>, draft: LetterDraft) -> Self {
        Self {
            id,
            created_at,
            sender_service: draft.sender_service,
            receiver_service: draft.receiver_service,
            date: draft.date,
            letter_number: draft.letter_number,
            subject: draft.subject,
            body: draft.body,
            importance: draft.importance,
            image_data: draft.image_data,
        }
    }

    /// Text value of a reviewable field.
    pub fn field(&self, field: LetterField) -> &str {
        match field {
            LetterField::SenderService => &self.sender_service,
            LetterField::ReceiverService => &self.receiver_service,
            LetterField::Date => &self.date,
            LetterField::LetterNumber => &self.letter_number,
            LetterField::Subject => &self.subject,
            LetterField::Importance => self.importance.as_str(),
            LetterField::Body => &self.body,
        }
    }

    pub fn has_image(&self) -> bool {
        !self.image_data.is_empty()
    }
}

/// The editable field set shown to the operator during review.
///
/// Holds everything a [`LetterRecord`] has except the store-assigned identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterDraft {
    pub sender_service: String,
    pub receiver_service: String,
    pub date: String,
    pub letter_number: String,
    pub subject: String,
    pub body: String,
    pub importance: Importance,
    pub image_data: String,
}

impl LetterDraft {
    /// Pre-fill a draft from an extraction result.
    ///
    /// Missing fields become empty strings; a missing importance becomes
    /// [`Importance::Normal`].
    pub fn from_extracted(fields: &ExtractedFields, image_data: String) -> Self {
        let text = |f: LetterField| fields.get(f).unwrap_or_default().to_string();
        Self {
            sender_service: text(LetterField::SenderService),
            receiver_service: text(LetterField::ReceiverService),
            date: text(LetterField::Date),
            letter_number: text(LetterField::LetterNumber),
            subject: text(LetterField::Subject),
            body: text(LetterField::Body),
            importance: fields
                .get(LetterField::Importance)
                .map(Importance::from_label)
                .unwrap_or_default(),
            image_data,
        }
    }

    /// Overwrite one field with operator input. Importance must be one of
    /// the scale values; anything else is refused and the draft is unchanged.
    pub fn set(&mut self, field: LetterField, value: &str) -> Result<(), UnknownImportance> {
        let value = value.to_string();
        match field {
            LetterField::SenderService => self.sender_service = value,
            LetterField::ReceiverService => self.receiver_service = value,
            LetterField::Date => self.date = value,
            LetterField::LetterNumber => self.letter_number = value,
            LetterField::Subject => self.subject = value,
            LetterField::Importance => self.importance = value.parse()?,
            LetterField::Body => self.body = value,
        }
        Ok(())
    }
}

/// A partial update. `None` fields keep the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub letter_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<Importance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
}

impl LetterPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn set(&mut self, field: LetterField, value: &str) -> Result<(), UnknownImportance> {
        let value = value.to_string();
        match field {
            LetterField::SenderService => self.sender_service = Some(value),
            LetterField::ReceiverService => self.receiver_service = Some(value),
            LetterField::Date => self.date = Some(value),
            LetterField::LetterNumber => self.letter_number = Some(value),
            LetterField::Subject => self.subject = Some(value),
            LetterField::Importance => self.importance = Some(value.parse()?),
            LetterField::Body => self.body = Some(value),
        }
        Ok(())
    }

    /// Merge the supplied fields into `record`, field by field.
    pub fn apply_to(&self, record: &mut LetterRecord) {
        fn merge(slot: &mut String, value: &Option<String>) {
            if let Some(v) = value {
                slot.clone_from(v);
            }
        }
        merge(&mut record.sender_service, &self.sender_service);
        merge(&mut record.receiver_service, &self.receiver_service);
        merge(&mut record.date, &self.date);
        merge(&mut record.letter_number, &self.letter_number);
        merge(&mut record.subject, &self.subject);
        merge(&mut record.body, &self.body);
        merge(&mut record.image_data, &self.image_data);
        if let Some(importance) = self.importance {
            record.importance = importance;
        }
    }
}

/// Field mapping returned by the extraction service.
///
/// Keys are the wire names (`senderService`, `subject`, ...). Null values are
/// dropped and scalar values are kept in their textual form, so consumers only
/// ever see strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct ExtractedFields(BTreeMap<String, String>);

impl ExtractedFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: LetterField, value: impl Into<String>) -> Self {
        self.0.insert(field.as_str().to_string(), value.into());
        self
    }

    pub fn get(&self, field: LetterField) -> Option<&str> {
        self.0.get(field.as_str()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for ExtractedFields {
    fn from(map: Map<String, Value>) -> Self {
        let fields = map
            .into_iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    Value::Null => return None,
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                Some((key, text))
            })
            .collect();
        Self(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> LetterRecord {
        LetterRecord {
            id: "1718000000000".into(),
            created_at: "2024-06-10T06:13:20Z".parse().unwrap(),
            sender_service: "Direction des Finances".into(),
            receiver_service: "Service du Personnel".into(),
            date: "10/06/2024".into(),
            letter_number: "DF/2024/117".into(),
            subject: "Budget prévisionnel".into(),
            body: "Veuillez trouver ci-joint...".into(),
            importance: Importance::Normal,
            image_data: "data:image/png;base64,AAAA".into(),
        }
    }

    #[test]
    fn importance_defaults_to_normal() {
        assert_eq!(Importance::default(), Importance::Normal);
    }

    #[test]
    fn importance_from_service_labels() {
        assert_eq!(Importance::from_label("Normal"), Importance::Normal);
        assert_eq!(Importance::from_label("Urgent"), Importance::Urgent);
        assert_eq!(Importance::from_label("Très Urgent"), Importance::Urgent);
        assert_eq!(Importance::from_label(""), Importance::Normal);
        assert_eq!(Importance::from_label("whatever"), Importance::Normal);
    }

    #[test]
    fn importance_parse_is_strict() {
        assert_eq!("urgent".parse::<Importance>().unwrap(), Importance::Urgent);
        assert_eq!(" Normal ".parse::<Importance>().unwrap(), Importance::Normal);
        assert_eq!("Très Urgent".parse::<Importance>().unwrap(), Importance::Urgent);
        assert!("high".parse::<Importance>().is_err());
        assert!("non urgent".parse::<Importance>().is_err());
    }

    #[test]
    fn record_json_uses_camel_case() {
        let json = serde_json::to_value(sample_record()).unwrap();
        assert_eq!(json["letterNumber"], "DF/2024/117");
        assert_eq!(json["senderService"], "Direction des Finances");
        assert_eq!(json["importance"], "Normal");
        assert_eq!(json["createdAt"], "2024-06-10T06:13:20Z");
        assert!(json.get("letter_number").is_none());
    }

    #[test]
    fn record_accepts_tres_urgent_alias() {
        let json = r#"{
            "id": "1",
            "createdAt": "2024-06-10T06:13:20Z",
            "subject": "Convocation",
            "importance": "Très Urgent"
        }"#;
        let record: LetterRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.importance, Importance::Urgent);
        assert_eq!(record.subject, "Convocation");
        assert_eq!(record.body, "");
        assert!(!record.has_image());
    }

    #[test]
    fn field_names_parse_in_several_spellings() {
        assert_eq!("letterNumber".parse::<LetterField>().unwrap(), LetterField::LetterNumber);
        assert_eq!("letter_number".parse::<LetterField>().unwrap(), LetterField::LetterNumber);
        assert_eq!("sender-service".parse::<LetterField>().unwrap(), LetterField::SenderService);
        let err = "title".parse::<LetterField>().unwrap_err();
        assert!(err.to_string().contains("subject"));
    }

    #[test]
    fn draft_from_empty_extraction_uses_defaults() {
        let draft = LetterDraft::from_extracted(&ExtractedFields::new(), "data:x".into());
        assert_eq!(draft.subject, "");
        assert_eq!(draft.sender_service, "");
        assert_eq!(draft.body, "");
        assert_eq!(draft.importance, Importance::Normal);
        assert_eq!(draft.image_data, "data:x");
    }

    #[test]
    fn draft_from_extraction_copies_fields() {
        let fields = ExtractedFields::new()
            .with(LetterField::Subject, "Réunion")
            .with(LetterField::LetterNumber, "42")
            .with(LetterField::Importance, "Très Urgent");
        let draft = LetterDraft::from_extracted(&fields, String::new());
        assert_eq!(draft.subject, "Réunion");
        assert_eq!(draft.letter_number, "42");
        assert_eq!(draft.importance, Importance::Urgent);
        assert_eq!(draft.date, "");
    }

    #[test]
    fn extracted_fields_from_lenient_json() {
        let fields: ExtractedFields = serde_json::from_str(
            r#"{"subject": "Objet", "letterNumber": 117, "date": null, "extra": true}"#,
        )
        .unwrap();
        assert_eq!(fields.get(LetterField::Subject), Some("Objet"));
        assert_eq!(fields.get(LetterField::LetterNumber), Some("117"));
        assert_eq!(fields.get(LetterField::Date), None);
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn patch_merges_only_supplied_fields() {
        let mut record = sample_record();
        let before = record.clone();
        let patch = LetterPatch {
            subject: Some("X".into()),
            ..Default::default()
        };
        patch.apply_to(&mut record);
        assert_eq!(record.subject, "X");
        assert_eq!(
            LetterRecord {
                subject: before.subject.clone(),
                ..record.clone()
            },
            before
        );
    }

    #[test]
    fn patch_set_and_is_empty() {
        let mut patch = LetterPatch::default();
        assert!(patch.is_empty());
        patch.set(LetterField::Importance, "urgent").unwrap();
        assert!(!patch.is_empty());
        assert_eq!(patch.importance, Some(Importance::Urgent));
    }

    #[test]
    fn draft_set_overwrites_field() {
        let mut draft = LetterDraft::default();
        draft.set(LetterField::Body, "Corps").unwrap();
        draft.set(LetterField::Importance, "Urgent").unwrap();
        assert_eq!(draft.body, "Corps");
        assert_eq!(draft.importance, Importance::Urgent);
    }

    #[test]
    fn operator_importance_is_not_guessed() {
        let mut draft = LetterDraft::default();
        let err = draft.set(LetterField::Importance, "non urgent").unwrap_err();
        assert_eq!(err, UnknownImportance("non urgent".into()));
        assert_eq!(draft.importance, Importance::Normal);

        draft.set(LetterField::Importance, "Urgent").unwrap();
        assert!(draft.set(LetterField::Importance, "Urgnet").is_err());
        assert_eq!(draft.importance, Importance::Urgent);

        let mut patch = LetterPatch::default();
        assert!(patch.set(LetterField::Importance, "Urgnet").is_err());
        assert!(patch.is_empty());
    }

    #[test]
    fn from_draft_keeps_every_field() {
        let record = sample_record();
        let draft = LetterDraft {
            sender_service: record.sender_service.clone(),
            receiver_service: record.receiver_service.clone(),
            date: record.date.clone(),
            letter_number: record.letter_number.clone(),
            subject: record.subject.clone(),
            body: record.body.clone(),
            importance: record.importance,
            image_data: record.image_data.clone(),
        };
        let rebuilt = LetterRecord::from_draft(record.id.clone(), record.created_at, draft);
        assert_eq!(rebuilt, record);
    }
}
