//! Typed views of the loose records inside a scenario document
//!
//! Each record type names its fields and the ordered key list each field is
//! read from. Categorical fields are kept raw here; the loader normalizes them
//! against the configured defaults.

use super::fields::{FieldError, Fields};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use std::fmt;

/// A record that failed coercion at the ingestion boundary
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    /// Index of the record within its collection
    pub position: usize,
    /// Informal id, when one could be read
    pub source_ref: Option<String>,
    pub reason: String,
}

impl RejectedRecord {
    /// Informal id or a positional fallback, for logs
    pub fn display_ref(&self) -> String {
        self.source_ref
            .clone()
            .unwrap_or_else(|| format!("#{}", self.position))
    }
}

impl fmt::Display for RejectedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record {}: {}", self.display_ref(), self.reason)
    }
}

/// Outcome of boundary validation for one record
pub type Parsed<T> = Result<T, RejectedRecord>;

/// Per-record hidden label
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroundTruthLabel {
    pub is_suspicious: Option<bool>,
    pub typology: Option<String>,
}

impl GroundTruthLabel {
    /// `_ground_truth` block first, then plain record fields
    fn read(f: &Fields<'_>) -> Result<Self, FieldError> {
        let mut label = match f.object(&["_ground_truth"]) {
            Some(gt) => {
                let g = Fields::new(gt);
                Self {
                    is_suspicious: g.flag(&["is_suspicious"])?,
                    typology: g.text(&["typology", "label"])?,
                }
            }
            None => Self::default(),
        };
        if label.is_suspicious.is_none() {
            label.is_suspicious = f.flag(&["is_suspicious", "_is_suspicious"])?;
        }
        if label.typology.is_none() {
            label.typology = f.text(&["typology", "_typology"])?;
        }
        Ok(label)
    }
}

/// Parse every element of a collection, keeping failures as rejections
pub(crate) fn parse_all<T>(
    items: &[Value],
    id_keys: &[&'static str],
    parse: impl Fn(usize, &Fields<'_>) -> Result<T, FieldError>,
) -> Vec<Parsed<T>> {
    items
        .iter()
        .enumerate()
        .map(|(position, item)| {
            let Some(map) = item.as_object() else {
                return Err(RejectedRecord {
                    position,
                    source_ref: None,
                    reason: format!("expected an object, found {}", kind_of(item)),
                });
            };
            let f = Fields::new(map);
            parse(position, &f).map_err(|e| RejectedRecord {
                position,
                source_ref: f.text(id_keys).ok().flatten(),
                reason: e.to_string(),
            })
        })
        .collect()
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn id_or_position(f: &Fields<'_>, keys: &[&'static str], prefix: &str, position: usize) -> Result<String, FieldError> {
    Ok(f.text(keys)?
        .unwrap_or_else(|| format!("{}[{}]", prefix, position)))
}

pub(crate) const ENTITY_ID_KEYS: &[&str] = &["entity_id", "id", "customer_id"];
pub(crate) const ACCOUNT_ID_KEYS: &[&str] = &["account_id", "id", "account_number"];
pub(crate) const TRANSACTION_ID_KEYS: &[&str] = &["transaction_id", "txn_id", "id"];
pub(crate) const RELATIONSHIP_ID_KEYS: &[&str] = &["relationship_id", "id"];
pub(crate) const ALERT_ID_KEYS: &[&str] = &["alert_id", "id"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddressRecord {
    pub address_type: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

impl AddressRecord {
    fn read(value: &Value) -> Result<Option<Self>, FieldError> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Ok(Some(Self {
                line1: Some(s.trim().to_string()),
                ..Self::default()
            })),
            Value::Object(map) => {
                let f = Fields::new(map);
                let address = Self {
                    address_type: f.text(&["address_type", "type"])?,
                    line1: f.text(&["line1", "street", "address_line1", "street_address"])?,
                    line2: f.text(&["line2", "address_line2"])?,
                    city: f.text(&["city", "town"])?,
                    state: f.text(&["state", "region", "province"])?,
                    postal_code: f.text(&["postal_code", "zip", "zip_code", "postcode"])?,
                    country: f.text(&["country", "country_code"])?,
                };
                Ok(if address.is_empty() { None } else { Some(address) })
            }
            _ => Ok(None),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.line1.is_none() && self.city.is_none() && self.postal_code.is_none()
    }

    /// Single-line rendering used as the address's identity
    pub fn full_address(&self) -> String {
        [
            &self.line1,
            &self.line2,
            &self.city,
            &self.state,
            &self.postal_code,
            &self.country,
        ]
        .iter()
        .filter_map(|part| part.as_deref())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentifierRecord {
    pub id_type: Option<String>,
    pub id_number: String,
    pub issuing_country: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub is_primary: bool,
    pub verified: bool,
}

impl IdentifierRecord {
    fn read(f: &Fields<'_>) -> Result<Option<Self>, FieldError> {
        let Some(id_number) = f.text(&["id_number", "number", "value"])? else {
            return Ok(None);
        };
        Ok(Some(Self {
            id_type: f.text(&["id_type", "type"])?,
            id_number,
            issuing_country: f.text(&["issuing_country", "country"])?,
            issue_date: f.date(&["issue_date"])?,
            expiry_date: f.date(&["expiry_date", "expires"])?,
            is_primary: f.flag(&["is_primary"])?.unwrap_or(false),
            verified: f.flag(&["verified"])?.unwrap_or(false),
        }))
    }
}

/// Officer, director or beneficial owner of a company entity
#[derive(Debug, Clone, PartialEq)]
pub struct OfficerRecord {
    /// Informal id of the officer record itself
    pub source_ref: String,
    pub name: Option<String>,
    pub role: Option<String>,
    /// Scenario entity the officer is, when it is one
    pub entity_ref: Option<String>,
    pub ownership_percentage: Option<f64>,
    pub is_beneficial_owner: Option<bool>,
    pub nationality: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub appointed_date: Option<NaiveDate>,
}

impl OfficerRecord {
    /// `default_role` applies when the record names none, as for entries of
    /// a `beneficial_owners` list
    fn read(
        f: &Fields<'_>,
        parent: &str,
        position: usize,
        default_role: Option<&str>,
    ) -> Result<Self, FieldError> {
        let entity_ref = f.text(&["entity_id", "person_id", "owner_id", "customer_id"])?;
        let source_ref = match f.text(&["officer_id", "id"])? {
            Some(id) => id,
            None => format!("{}/officers[{}]", parent, position),
        };
        Ok(Self {
            source_ref,
            name: f.text(&["name", "full_name"])?,
            role: f
                .text(&["role", "officer_type", "position", "title"])?
                .or_else(|| default_role.map(str::to_string)),
            entity_ref,
            ownership_percentage: f.number(&["ownership_percentage", "ownership_pct", "percentage", "share"])?,
            is_beneficial_owner: f.flag(&["is_beneficial_owner", "is_ubo"])?,
            nationality: f.text(&["nationality"])?,
            date_of_birth: f.date(&["date_of_birth", "dob"])?,
            appointed_date: f.date(&["appointed_date", "start_date", "since"])?,
        })
    }
}

/// Dated event or filing attached to an entity, projected to the graph only
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineRecord {
    pub source_ref: String,
    pub kind: Option<String>,
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
}

impl TimelineRecord {
    fn read(f: &Fields<'_>, fallback_ref: String) -> Result<Self, FieldError> {
        Ok(Self {
            source_ref: f
                .text(&["event_id", "filing_id", "id"])?
                .unwrap_or(fallback_ref),
            kind: f.text(&["event_type", "filing_type", "type"])?,
            date: f.date(&["date", "event_date", "filing_date"])?,
            description: f.text(&["description", "title", "summary"])?,
        })
    }
}

/// A person or company in the scenario
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub source_ref: String,
    pub entity_type: Option<String>,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub occupation: Option<String>,
    pub employer: Option<String>,
    pub is_pep: bool,
    pub registration_number: Option<String>,
    pub incorporation_date: Option<NaiveDate>,
    pub jurisdiction: Option<String>,
    pub industry: Option<String>,
    pub legal_form: Option<String>,
    pub risk_rating: Option<String>,
    pub segment: Option<String>,
    pub status: Option<String>,
    pub is_high_net_worth: bool,
    pub total_assets: Option<f64>,
    pub onboarding_date: Option<NaiveDate>,
    pub address: Option<AddressRecord>,
    pub identifiers: Vec<Parsed<IdentifierRecord>>,
    pub officers: Vec<Parsed<OfficerRecord>>,
    pub events: Vec<Parsed<TimelineRecord>>,
    pub filings: Vec<Parsed<TimelineRecord>>,
    pub ground_truth: GroundTruthLabel,
}

impl EntityRecord {
    pub(crate) fn read(position: usize, f: &Fields<'_>) -> Result<Self, FieldError> {
        let source_ref = id_or_position(f, ENTITY_ID_KEYS, "entities", position)?;

        let address = match f.raw().get("address") {
            Some(value) => AddressRecord::read(value)?,
            None => None,
        };

        let mut identifiers: Vec<Parsed<IdentifierRecord>> = Vec::new();
        for (i, item) in f.array(&["identifiers"]).iter().enumerate() {
            let parsed = match item.as_object() {
                Some(map) => IdentifierRecord::read(&Fields::new(map))
                    .map_err(|e| e.to_string())
                    .and_then(|id| id.ok_or_else(|| "missing id_number".to_string())),
                None => Err(format!("expected an object, found {}", kind_of(item))),
            };
            identifiers.push(parsed.map_err(|reason| RejectedRecord {
                position: i,
                source_ref: Some(format!("{}/identifiers[{}]", source_ref, i)),
                reason,
            }));
        }
        for (key, id_type) in [
            ("tax_id", "TAX_ID"),
            ("ssn", "SSN"),
            ("passport_number", "PASSPORT"),
            ("ein", "EIN"),
            ("lei", "LEI"),
        ] {
            if let Some(number) = f.text(&[key])? {
                identifiers.push(Ok(IdentifierRecord {
                    id_type: Some(id_type.to_string()),
                    id_number: number,
                    issuing_country: None,
                    issue_date: None,
                    expiry_date: None,
                    is_primary: false,
                    verified: false,
                }));
            }
        }

        let mut officers = nested(f, &["officers", "directors"], |i, of| {
            OfficerRecord::read(of, &source_ref, i, None)
        }, &source_ref, "officers");
        let offset = officers.len();
        officers.extend(nested(f, &["beneficial_owners"], |i, of| {
            OfficerRecord::read(of, &source_ref, offset + i, Some("UBO"))
        }, &source_ref, "beneficial_owners"));
        let events = nested(f, &["events"], |i, ev| {
            TimelineRecord::read(ev, format!("{}/events[{}]", source_ref, i))
        }, &source_ref, "events");
        let filings = nested(f, &["filings"], |i, fi| {
            TimelineRecord::read(fi, format!("{}/filings[{}]", source_ref, i))
        }, &source_ref, "filings");

        Ok(Self {
            entity_type: f.text(&["entity_type", "type", "customer_type"])?,
            name: f.text(&["name", "full_name", "legal_name", "company_name"])?,
            first_name: f.text(&["first_name", "given_name"])?,
            middle_name: f.text(&["middle_name"])?,
            last_name: f.text(&["last_name", "surname", "family_name"])?,
            date_of_birth: f.date(&["date_of_birth", "dob", "birth_date"])?,
            nationality: f.text(&["nationality", "citizenship"])?,
            occupation: f.text(&["occupation"])?,
            employer: f.text(&["employer", "employer_name"])?,
            is_pep: f.flag(&["is_pep", "pep"])?.unwrap_or(false),
            registration_number: f.text(&["registration_number", "company_number"])?,
            incorporation_date: f.date(&["incorporation_date", "incorporated", "founded_date"])?,
            jurisdiction: f.text(&["jurisdiction", "country_of_incorporation", "country"])?,
            industry: f.text(&["industry", "industry_code", "sector"])?,
            legal_form: f.text(&["legal_form", "company_type"])?,
            risk_rating: f.text(&["risk_rating", "risk_level", "risk"])?,
            segment: f.text(&["segment", "customer_segment"])?,
            status: f.text(&["status", "customer_status"])?,
            is_high_net_worth: f.flag(&["is_high_net_worth", "hnw"])?.unwrap_or(false),
            total_assets: f.number(&["total_assets", "net_worth"])?,
            onboarding_date: f.date(&["onboarding_date", "customer_since", "created_date"])?,
            address,
            identifiers,
            officers,
            events,
            filings,
            ground_truth: GroundTruthLabel::read(f)?,
            source_ref,
        })
    }

    /// Display name, assembling person name parts when no full name is given
    pub fn display_name(&self) -> Option<String> {
        if let Some(name) = &self.name {
            return Some(name.clone());
        }
        let parts: Vec<&str> = [&self.first_name, &self.middle_name, &self.last_name]
            .iter()
            .filter_map(|p| p.as_deref())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

fn nested<T>(
    f: &Fields<'_>,
    keys: &[&'static str],
    parse: impl Fn(usize, &Fields<'_>) -> Result<T, FieldError>,
    parent: &str,
    label: &str,
) -> Vec<Parsed<T>> {
    f.array(keys)
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let Some(map) = item.as_object() else {
                return Err(RejectedRecord {
                    position: i,
                    source_ref: Some(format!("{}/{}[{}]", parent, label, i)),
                    reason: format!("expected an object, found {}", kind_of(item)),
                });
            };
            parse(i, &Fields::new(map)).map_err(|e| RejectedRecord {
                position: i,
                source_ref: Some(format!("{}/{}[{}]", parent, label, i)),
                reason: e.to_string(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountRecord {
    pub source_ref: String,
    pub owner_ref: Option<String>,
    pub co_owner_refs: Vec<String>,
    pub account_number: Option<String>,
    pub account_type: Option<String>,
    pub currency: Option<String>,
    pub status: Option<String>,
    pub open_date: Option<NaiveDate>,
    pub close_date: Option<NaiveDate>,
    pub balance: Option<f64>,
    pub branch: Option<String>,
    pub ground_truth: GroundTruthLabel,
}

impl AccountRecord {
    pub(crate) fn read(position: usize, f: &Fields<'_>) -> Result<Self, FieldError> {
        Ok(Self {
            source_ref: id_or_position(f, ACCOUNT_ID_KEYS, "accounts", position)?,
            owner_ref: f.text(&["owner_id", "customer_id", "entity_id", "holder_id", "owner"])?,
            co_owner_refs: f.text_list(&["co_owner_ids", "joint_owner_ids"])?,
            account_number: f.text(&["account_number", "iban"])?,
            account_type: f.text(&["account_type", "type", "product_type"])?,
            currency: f.text(&["currency"])?,
            status: f.text(&["status", "account_status"])?,
            open_date: f.date(&["open_date", "opening_date", "opened_date", "opened"])?,
            close_date: f.date(&["close_date", "closed_date"])?,
            balance: f.number(&["balance", "current_balance"])?,
            branch: f.text(&["branch", "branch_code"])?,
            ground_truth: GroundTruthLabel::read(f)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub source_ref: String,
    pub from_account: Option<String>,
    pub to_account: Option<String>,
    pub amount: f64,
    pub currency: Option<String>,
    pub txn_type: Option<String>,
    pub channel: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub counterparty_name: Option<String>,
    pub counterparty_type: Option<String>,
    pub counterparty_country: Option<String>,
    pub counterparty_bank: Option<String>,
    pub ground_truth: GroundTruthLabel,
}

impl TransactionRecord {
    pub(crate) fn read(position: usize, f: &Fields<'_>) -> Result<Self, FieldError> {
        let amount = match f.number(&["amount", "value"])? {
            Some(amount) => amount,
            None => {
                return Err(FieldError {
                    key: "amount".to_string(),
                    expected: "number",
                    found: "nothing".to_string(),
                })
            }
        };
        Ok(Self {
            source_ref: id_or_position(f, TRANSACTION_ID_KEYS, "transactions", position)?,
            from_account: f.text(&["from_account_id", "source_account", "from_account", "sender_account"])?,
            to_account: f.text(&["to_account_id", "destination_account", "to_account", "receiver_account"])?,
            amount,
            currency: f.text(&["currency"])?,
            txn_type: f.text(&["transaction_type", "txn_type", "type"])?,
            channel: f.text(&["channel"])?,
            timestamp: f.timestamp(&["timestamp", "transaction_date", "date", "value_date"])?,
            description: f.text(&["description", "reference", "memo"])?,
            counterparty_name: f.text(&["counterparty_name", "counterparty_name_raw", "counterparty"])?,
            counterparty_type: f.text(&["counterparty_type"])?,
            counterparty_country: f.text(&["counterparty_country"])?,
            counterparty_bank: f.text(&["counterparty_bank", "counterparty_bank_name"])?,
            ground_truth: GroundTruthLabel::read(f)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipRecord {
    pub source_ref: String,
    pub from_ref: Option<String>,
    pub to_ref: Option<String>,
    pub relationship_type: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub ownership_percentage: Option<f64>,
    pub ground_truth: GroundTruthLabel,
}

impl RelationshipRecord {
    pub(crate) fn read(position: usize, f: &Fields<'_>) -> Result<Self, FieldError> {
        Ok(Self {
            source_ref: id_or_position(f, RELATIONSHIP_ID_KEYS, "relationships", position)?,
            from_ref: f.text(&["from_entity_id", "source_id", "from_id", "entity_id_1", "source"])?,
            to_ref: f.text(&["to_entity_id", "target_id", "to_id", "entity_id_2", "target"])?,
            relationship_type: f.text(&["relationship_type", "type", "relation"])?,
            start_date: f.date(&["start_date", "since"])?,
            ownership_percentage: f.number(&["ownership_percentage", "percentage"])?,
            ground_truth: GroundTruthLabel::read(f)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertRecord {
    pub source_ref: String,
    pub account_ref: Option<String>,
    pub customer_ref: Option<String>,
    pub alert_type: Option<String>,
    pub severity: Option<String>,
    pub score: Option<f64>,
    pub status: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub narrative: Option<String>,
    pub sar_filed: bool,
    pub transaction_refs: Vec<String>,
    pub ground_truth: GroundTruthLabel,
}

impl AlertRecord {
    pub(crate) fn read(position: usize, f: &Fields<'_>) -> Result<Self, FieldError> {
        Ok(Self {
            source_ref: id_or_position(f, ALERT_ID_KEYS, "alerts", position)?,
            account_ref: f.text(&["account_id"])?,
            customer_ref: f.text(&["customer_id", "entity_id"])?,
            alert_type: f.text(&["alert_type", "rule", "scenario"])?,
            severity: f.text(&["risk_level", "severity", "priority"])?,
            score: f.number(&["score", "risk_score"])?,
            status: f.text(&["status"])?,
            created_at: f.timestamp(&["created_at", "timestamp", "date"])?,
            narrative: f.text(&["narrative", "description"])?,
            sar_filed: f.flag(&["sar_filed"])?.unwrap_or(false),
            transaction_refs: f.text_list(&["transaction_ids", "txn_ids", "transactions"])?,
            ground_truth: GroundTruthLabel::read(f)?,
        })
    }
}

/// Scenario-level ground truth block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioGroundTruth {
    pub all_suspicious: bool,
    pub typology: Option<String>,
    pub entity_ids: Vec<String>,
    pub account_ids: Vec<String>,
    pub transaction_ids: Vec<String>,
}

impl ScenarioGroundTruth {
    pub(crate) fn read(map: &Map<String, Value>) -> Result<Self, FieldError> {
        let f = Fields::new(map);
        Ok(Self {
            all_suspicious: f.flag(&["all_suspicious", "is_suspicious"])?.unwrap_or(false),
            typology: f.text(&["typology", "label"])?,
            entity_ids: f.text_list(&["entity_ids", "suspicious_entities"])?,
            account_ids: f.text_list(&["account_ids", "suspicious_accounts"])?,
            transaction_ids: f.text_list(&["transaction_ids", "suspicious_transactions"])?,
        })
    }
}
