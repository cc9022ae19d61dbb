use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::config::ColumnMap;
use crate::error::MatchError;
use crate::model::{
    Authorization, AuthorizationStatus, CardId, Money, Presentment, PresentmentKind,
};

/// Column indexes resolved from the header row.
struct Columns<'a> {
    source_name: &'a str,
    headers: &'a [String],
    mapping: &'a ColumnMap,
}

impl Columns<'_> {
    fn header_for<'f>(&'f self, field: &'f str) -> &'f str {
        self.mapping.get(field).map(String::as_str).unwrap_or(field)
    }

    fn find(&self, field: &str) -> Option<usize> {
        let header = self.header_for(field);
        self.headers.iter().position(|h| h == header)
    }

    fn require(&self, field: &str) -> Result<usize, MatchError> {
        self.find(field).ok_or_else(|| MatchError::MissingColumn {
            source_name: self.source_name.into(),
            column: self.header_for(field).into(),
        })
    }
}

/// Parses authorizations from CSV text. `columns` maps canonical field names
/// to headers; unmapped fields are looked up by their canonical name.
pub fn load_authorizations(
    source_name: &str,
    csv_data: &str,
    columns: &ColumnMap,
) -> Result<Vec<Authorization>, MatchError> {
    let mut reader = reader_for(csv_data);
    let headers = read_headers(&mut reader)?;
    let cols = Columns {
        source_name,
        headers: &headers,
        mapping: columns,
    };

    let id_idx = cols.require("id")?;
    let card_idx = cols.require("card")?;
    let amount_idx = cols.require("amount_minor")?;
    let currency_idx = cols.require("currency")?;
    let timestamp_idx = cols.require("timestamp")?;
    let merchant_idx = cols.require("merchant_id")?;
    let category_idx = cols.require("category_code")?;
    let status_idx = cols.require("status")?;
    let expires_idx = cols.require("expires_at")?;
    let auth_code_idx = cols.find("auth_code");

    let mut out = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| MatchError::Io(e.to_string()))?;
        let field = |idx: usize| record.get(idx).unwrap_or("").trim();
        let id = field(id_idx).to_string();
        let parse_err = |column: &str, value: &str| MatchError::FieldParse {
            source_name: source_name.into(),
            record_id: id.clone(),
            column: column.into(),
            value: value.into(),
        };

        let amount_str = field(amount_idx);
        let amount_minor: i64 = amount_str
            .parse()
            .map_err(|_| parse_err("amount_minor", amount_str))?;
        let timestamp = parse_timestamp(field(timestamp_idx))
            .ok_or_else(|| parse_err("timestamp", field(timestamp_idx)))?;
        let expires_at = parse_timestamp(field(expires_idx))
            .ok_or_else(|| parse_err("expires_at", field(expires_idx)))?;
        let status: AuthorizationStatus =
            parse_enum(field(status_idx)).ok_or_else(|| parse_err("status", field(status_idx)))?;
        let auth_code = auth_code_idx
            .map(field)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        out.push(Authorization {
            card: CardId::new(field(card_idx)),
            amount: Money::new(amount_minor, field(currency_idx)),
            timestamp,
            merchant_id: field(merchant_idx).to_string(),
            category_code: field(category_idx).to_string(),
            status,
            expires_at,
            auth_code,
            id,
        });
    }
    Ok(out)
}

/// Parses presentments from CSV text. See [`load_authorizations`].
pub fn load_presentments(
    source_name: &str,
    csv_data: &str,
    columns: &ColumnMap,
) -> Result<Vec<Presentment>, MatchError> {
    let mut reader = reader_for(csv_data);
    let headers = read_headers(&mut reader)?;
    let cols = Columns {
        source_name,
        headers: &headers,
        mapping: columns,
    };

    let id_idx = cols.require("id")?;
    let card_idx = cols.require("card")?;
    let amount_idx = cols.require("amount_minor")?;
    let currency_idx = cols.require("currency")?;
    let timestamp_idx = cols.require("timestamp")?;
    let merchant_idx = cols.require("merchant_id")?;
    let category_idx = cols.require("category_code")?;
    let kind_idx = cols.require("kind")?;

    let mut out = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| MatchError::Io(e.to_string()))?;
        let field = |idx: usize| record.get(idx).unwrap_or("").trim();
        let id = field(id_idx).to_string();
        let parse_err = |column: &str, value: &str| MatchError::FieldParse {
            source_name: source_name.into(),
            record_id: id.clone(),
            column: column.into(),
            value: value.into(),
        };

        let amount_str = field(amount_idx);
        let amount_minor: i64 = amount_str
            .parse()
            .map_err(|_| parse_err("amount_minor", amount_str))?;
        let timestamp = parse_timestamp(field(timestamp_idx))
            .ok_or_else(|| parse_err("timestamp", field(timestamp_idx)))?;
        let kind: PresentmentKind =
            parse_enum(field(kind_idx)).ok_or_else(|| parse_err("kind", field(kind_idx)))?;

        out.push(Presentment {
            card: CardId::new(field(card_idx)),
            amount: Money::new(amount_minor, field(currency_idx)),
            timestamp,
            merchant_id: field(merchant_idx).to_string(),
            category_code: field(category_idx).to_string(),
            kind,
            id,
        });
    }
    Ok(out)
}

fn reader_for(csv_data: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(csv_data.as_bytes())
}

fn read_headers(reader: &mut csv::Reader<&[u8]>) -> Result<Vec<String>, MatchError> {
    Ok(reader
        .headers()
        .map_err(|e| MatchError::Io(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect())
}

fn parse_enum<T: FromStr>(value: &str) -> Option<T> {
    value.parse().ok()
}

/// RFC 3339, or `YYYY-MM-DD HH:MM:SS` taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
