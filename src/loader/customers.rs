//! Customers and their party sub-records
//!
//! One scenario entity becomes a `Customer` row plus its `CustomerPerson` or
//! `CustomerCompany` extension, an address, identifiers and, for companies,
//! officers. Each of those is its own category so a broken identifier never
//! costs the customer.

use super::checkpoint::{run_batch, BatchItem};
use super::context::ScenarioContext;
use super::outcome::{BatchReport, Category, RecordError, Written};
use super::rows::{date_text, split_name, timestamp_text, upsert_keyed, written};
use crate::normalize::{
    lookup, normalize, AddressType, Categorical, CustomerSegment, CustomerType, Defaults, IdType,
    LegalForm, OfficerType,
};
use crate::registry::IdKind;
use crate::scenario::{
    AddressRecord, EntityRecord, IdentifierRecord, OfficerRecord, Parsed, Scenario,
};
use crate::storage::StorageResult;
use rusqlite::{params, Connection, Transaction};

const CUSTOMER_LOOKUP: &str = "SELECT customer_id FROM Customer WHERE ingest_key = ?1";

const CUSTOMER_INSERT: &str = "
    INSERT INTO Customer (customer_id, customer_type, status, risk_rating, segment, display_name,
                          onboarding_date, source_ref, ingest_key, created_at,
                          _is_suspicious, _typology, _scenario_id)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
    ON CONFLICT DO NOTHING";

const PERSON_INSERT: &str = "
    INSERT INTO CustomerPerson (customer_id, first_name, middle_name, last_name, full_name,
                                date_of_birth, nationality, occupation, employer, is_pep)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
    ON CONFLICT DO NOTHING";

const COMPANY_INSERT: &str = "
    INSERT INTO CustomerCompany (customer_id, legal_name, legal_form, registration_number,
                                 incorporation_date, jurisdiction, industry)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    ON CONFLICT DO NOTHING";

const ADDRESS_INSERT: &str = "
    INSERT INTO CustomerAddress (address_id, customer_id, address_type, line1, line2, city,
                                 state, postal_code, country, is_primary)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1)
    ON CONFLICT DO NOTHING";

const IDENTIFIER_INSERT: &str = "
    INSERT INTO CustomerIdentifier (identifier_id, customer_id, id_type, id_number,
                                    issuing_country, issue_date, expiry_date, is_primary, verified)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT DO NOTHING";

const OFFICER_LOOKUP: &str = "SELECT officer_id FROM CompanyOfficer WHERE ingest_key = ?1";

const OFFICER_INSERT: &str = "
    INSERT INTO CompanyOfficer (officer_id, company_id, person_customer_id, full_name,
                                officer_type, ownership_percentage, is_beneficial_owner,
                                nationality, date_of_birth, appointed_date, source_ref, ingest_key)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
    ON CONFLICT DO NOTHING";

const ONE_MILLION: f64 = 1_000_000.0;

pub(crate) fn customer_type_of(entity: &EntityRecord, defaults: &Defaults) -> CustomerType {
    normalize(entity.entity_type.as_deref(), defaults.customer_type)
}

/// Explicit segment, else SME for companies and RETAIL for persons, upgraded
/// for high-net-worth customers
pub(crate) fn segment_of(entity: &EntityRecord, customer_type: CustomerType) -> CustomerSegment {
    if let Some(segment) = entity.segment.as_deref().and_then(lookup::<CustomerSegment>) {
        return segment;
    }
    let wealthy =
        entity.is_high_net_worth || entity.total_assets.is_some_and(|assets| assets > ONE_MILLION);
    match (customer_type, wealthy) {
        (CustomerType::Company, false) => CustomerSegment::Sme,
        (CustomerType::Company, true) => CustomerSegment::Corporate,
        (CustomerType::Person, false) => CustomerSegment::Retail,
        (CustomerType::Person, true) => CustomerSegment::PrivateBanking,
    }
}

fn entity_items(scenario: &Scenario) -> Vec<BatchItem<'_, &EntityRecord>> {
    scenario
        .entities
        .iter()
        .map(|parsed| match parsed {
            Ok(entity) => BatchItem::ready(entity.source_ref.clone(), entity),
            Err(rejected) => BatchItem::rejected(rejected),
        })
        .collect()
}

fn resolve_customer<'c>(ctx: &'c ScenarioContext, source_ref: &str) -> Result<&'c str, RecordError> {
    ctx.registry
        .resolve(IdKind::Customer, source_ref)
        .ok_or_else(|| RecordError::unresolved(IdKind::Customer, Some(source_ref)))
}

pub(crate) fn load_customers(
    tx: &mut Transaction<'_>,
    ctx: &mut ScenarioContext,
    scenario: &Scenario,
) -> StorageResult<BatchReport> {
    run_batch(
        tx,
        ctx,
        Category::Customers,
        &[CUSTOMER_LOOKUP, CUSTOMER_INSERT],
        entity_items(scenario),
        load_customer,
    )
}

fn load_customer(
    conn: &Connection,
    ctx: &mut ScenarioContext,
    entity: &&EntityRecord,
) -> Result<Written, RecordError> {
    let defaults = ctx.defaults;
    let customer_type = customer_type_of(entity, &defaults);
    let status = normalize(entity.status.as_deref(), defaults.customer_status);
    let risk = normalize(entity.risk_rating.as_deref(), defaults.risk_rating);
    let segment = segment_of(entity, customer_type);
    let onboarding = entity.onboarding_date.unwrap_or_else(|| ctx.load_date());
    let created_at = timestamp_text(ctx.loaded_at);
    let gt = ctx.ground_truth(&entity.ground_truth, IdKind::Customer, &entity.source_ref);

    let (written, customer_id) = upsert_keyed(
        conn,
        ctx,
        IdKind::Customer,
        &entity.source_ref,
        CUSTOMER_LOOKUP,
        |conn, id, key| {
            conn.prepare_cached(CUSTOMER_INSERT)?.execute(params![
                id,
                customer_type.as_str(),
                status.as_str(),
                risk.as_str(),
                segment.as_str(),
                entity.display_name(),
                date_text(Some(onboarding)),
                entity.source_ref,
                key,
                created_at,
                gt.is_suspicious,
                gt.typology,
                gt.scenario_id,
            ])
        },
    )?;
    ctx.registry
        .register(IdKind::Customer, &entity.source_ref, customer_id);
    Ok(written)
}

pub(crate) fn load_persons(
    tx: &mut Transaction<'_>,
    ctx: &mut ScenarioContext,
    scenario: &Scenario,
) -> StorageResult<BatchReport> {
    let defaults = ctx.defaults;
    let items = scenario
        .entities
        .iter()
        .flatten()
        .filter(|e| customer_type_of(e, &defaults) == CustomerType::Person)
        .map(|e| BatchItem::ready(e.source_ref.clone(), e))
        .collect();
    run_batch(tx, ctx, Category::Persons, &[PERSON_INSERT], items, load_person)
}

fn load_person(
    conn: &Connection,
    ctx: &mut ScenarioContext,
    entity: &&EntityRecord,
) -> Result<Written, RecordError> {
    let customer_id = resolve_customer(ctx, &entity.source_ref)?;
    let full_name = entity.display_name();
    let (first, middle, last) = if entity.first_name.is_some() || entity.last_name.is_some() {
        (
            entity.first_name.clone(),
            entity.middle_name.clone(),
            entity.last_name.clone(),
        )
    } else {
        full_name.as_deref().map(split_name).unwrap_or_default()
    };

    let rows = conn.prepare_cached(PERSON_INSERT)?.execute(params![
        customer_id,
        first,
        middle,
        last,
        full_name,
        date_text(entity.date_of_birth),
        entity.nationality,
        entity.occupation,
        entity.employer,
        entity.is_pep,
    ])?;
    Ok(written(rows))
}

pub(crate) fn load_companies(
    tx: &mut Transaction<'_>,
    ctx: &mut ScenarioContext,
    scenario: &Scenario,
) -> StorageResult<BatchReport> {
    let defaults = ctx.defaults;
    let items = scenario
        .entities
        .iter()
        .flatten()
        .filter(|e| customer_type_of(e, &defaults) == CustomerType::Company)
        .map(|e| BatchItem::ready(e.source_ref.clone(), e))
        .collect();
    run_batch(tx, ctx, Category::Companies, &[COMPANY_INSERT], items, load_company)
}

fn load_company(
    conn: &Connection,
    ctx: &mut ScenarioContext,
    entity: &&EntityRecord,
) -> Result<Written, RecordError> {
    let customer_id = resolve_customer(ctx, &entity.source_ref)?.to_string();
    let legal_name = entity
        .display_name()
        .unwrap_or_else(|| entity.source_ref.clone());
    let legal_form: LegalForm = normalize(
        entity.legal_form.as_deref().or(entity.entity_type.as_deref()),
        ctx.defaults.legal_form,
    );

    let rows = conn.prepare_cached(COMPANY_INSERT)?.execute(params![
        customer_id,
        legal_name,
        legal_form.as_str(),
        entity.registration_number,
        date_text(entity.incorporation_date),
        entity.jurisdiction,
        entity.industry,
    ])?;
    ctx.registry
        .register(IdKind::Company, &entity.source_ref, customer_id);
    Ok(written(rows))
}

pub(crate) fn load_addresses(
    tx: &mut Transaction<'_>,
    ctx: &mut ScenarioContext,
    scenario: &Scenario,
) -> StorageResult<BatchReport> {
    let items = scenario
        .entities
        .iter()
        .flatten()
        .filter_map(|e| {
            e.address
                .as_ref()
                .filter(|a| !a.is_empty())
                .map(|a| BatchItem::ready(e.source_ref.clone(), (e, a)))
        })
        .collect();
    run_batch(tx, ctx, Category::Addresses, &[ADDRESS_INSERT], items, load_address)
}

fn load_address(
    conn: &Connection,
    ctx: &mut ScenarioContext,
    item: &(&EntityRecord, &AddressRecord),
) -> Result<Written, RecordError> {
    let (entity, address) = *item;
    let customer_id = resolve_customer(ctx, &entity.source_ref)?.to_string();
    let fallback = match customer_type_of(entity, &ctx.defaults) {
        CustomerType::Person => AddressType::Residential,
        CustomerType::Company => AddressType::Registered,
    };
    let address_type = normalize(address.address_type.as_deref(), fallback);
    let address_id = ctx.registry.generate(IdKind::Address);

    let rows = conn.prepare_cached(ADDRESS_INSERT)?.execute(params![
        address_id,
        customer_id,
        address_type.as_str(),
        address.line1,
        address.line2,
        address.city,
        address.state,
        address.postal_code,
        address.country,
    ])?;
    Ok(written(rows))
}

/// One identifier per customer and type
///
/// `CustomerIdentifier` is keyed on `(customer_id, id_type)`, so a second
/// identifier of the same type for the same customer (two passports, say)
/// is counted as skipped and only the first is kept.
pub(crate) fn load_identifiers(
    tx: &mut Transaction<'_>,
    ctx: &mut ScenarioContext,
    scenario: &Scenario,
) -> StorageResult<BatchReport> {
    let mut items = Vec::new();
    for entity in scenario.entities.iter().flatten() {
        for parsed in &entity.identifiers {
            items.push(match parsed {
                Ok(identifier) => BatchItem::ready(
                    format!(
                        "{}/{}",
                        entity.source_ref,
                        identifier.id_type.as_deref().unwrap_or("identifier")
                    ),
                    (entity, identifier),
                ),
                Err(rejected) => BatchItem::rejected(rejected),
            });
        }
    }
    run_batch(
        tx,
        ctx,
        Category::Identifiers,
        &[IDENTIFIER_INSERT],
        items,
        load_identifier,
    )
}

fn load_identifier(
    conn: &Connection,
    ctx: &mut ScenarioContext,
    item: &(&EntityRecord, &IdentifierRecord),
) -> Result<Written, RecordError> {
    let (entity, identifier) = *item;
    let customer_id = resolve_customer(ctx, &entity.source_ref)?.to_string();
    let id_type: IdType = normalize(identifier.id_type.as_deref(), ctx.defaults.id_type);
    let issuing_country = identifier
        .issuing_country
        .as_ref()
        .or(entity.nationality.as_ref())
        .or(entity.jurisdiction.as_ref());
    let identifier_id = ctx.registry.generate(IdKind::Identifier);

    let rows = conn.prepare_cached(IDENTIFIER_INSERT)?.execute(params![
        identifier_id,
        customer_id,
        id_type.as_str(),
        identifier.id_number,
        issuing_country,
        date_text(identifier.issue_date),
        date_text(identifier.expiry_date),
        identifier.is_primary,
        identifier.verified,
    ])?;
    Ok(written(rows))
}

pub(crate) fn load_officers(
    tx: &mut Transaction<'_>,
    ctx: &mut ScenarioContext,
    scenario: &Scenario,
) -> StorageResult<BatchReport> {
    let items = scenario
        .entities
        .iter()
        .flatten()
        .flat_map(|entity| entity.officers.iter().map(move |o| officer_item(entity, o)))
        .collect();
    run_batch(
        tx,
        ctx,
        Category::Officers,
        &[OFFICER_LOOKUP, OFFICER_INSERT],
        items,
        load_officer,
    )
}

fn officer_item<'a>(
    entity: &'a EntityRecord,
    parsed: &'a Parsed<OfficerRecord>,
) -> BatchItem<'a, (&'a EntityRecord, &'a OfficerRecord)> {
    match parsed {
        Ok(officer) => BatchItem::ready(officer.source_ref.clone(), (entity, officer)),
        Err(rejected) => BatchItem::rejected(rejected),
    }
}

fn load_officer(
    conn: &Connection,
    ctx: &mut ScenarioContext,
    item: &(&EntityRecord, &OfficerRecord),
) -> Result<Written, RecordError> {
    let (company, officer) = *item;
    let company_id = ctx
        .registry
        .resolve(IdKind::Company, &company.source_ref)
        .ok_or_else(|| RecordError::unresolved(IdKind::Company, Some(company.source_ref.as_str())))?
        .to_string();
    let person_id = officer
        .entity_ref
        .as_deref()
        .and_then(|r| ctx.registry.resolve(IdKind::Customer, r))
        .map(str::to_string);
    let officer_type: OfficerType = normalize(officer.role.as_deref(), ctx.defaults.officer_type);
    let beneficial = officer
        .is_beneficial_owner
        .unwrap_or(officer_type == OfficerType::Ubo);

    let (written, officer_id) = upsert_keyed(
        conn,
        ctx,
        IdKind::Officer,
        &officer.source_ref,
        OFFICER_LOOKUP,
        |conn, id, key| {
            conn.prepare_cached(OFFICER_INSERT)?.execute(params![
                id,
                company_id,
                person_id,
                officer.name,
                officer_type.as_str(),
                officer.ownership_percentage,
                beneficial,
                officer.nationality,
                date_text(officer.date_of_birth),
                date_text(officer.appointed_date),
                officer.source_ref,
                key,
            ])
        },
    )?;
    ctx.registry
        .register(IdKind::Officer, &officer.source_ref, officer_id);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(value: serde_json::Value) -> EntityRecord {
        let scenario = Scenario::from_value(&json!({ "entities": [value] })).unwrap();
        scenario.entities.into_iter().next().unwrap().unwrap()
    }

    #[test]
    fn segment_derivation() {
        let person = entity(json!({"entity_id": "E1", "entity_type": "person"}));
        assert_eq!(segment_of(&person, CustomerType::Person), CustomerSegment::Retail);

        let rich = entity(json!({"entity_id": "E2", "entity_type": "person", "total_assets": 2500000}));
        assert_eq!(segment_of(&rich, CustomerType::Person), CustomerSegment::PrivateBanking);

        let company = entity(json!({"entity_id": "E3", "entity_type": "shell_company"}));
        let ty = customer_type_of(&company, &Defaults::default());
        assert_eq!(ty, CustomerType::Company);
        assert_eq!(segment_of(&company, ty), CustomerSegment::Sme);

        let explicit = entity(json!({"entity_id": "E4", "segment": "corporate"}));
        assert_eq!(segment_of(&explicit, CustomerType::Person), CustomerSegment::Corporate);
    }

    #[test]
    fn unknown_entity_type_uses_default() {
        let e = entity(json!({"entity_id": "E1", "entity_type": "alien"}));
        assert_eq!(customer_type_of(&e, &Defaults::default()), CustomerType::Person);
    }
}
