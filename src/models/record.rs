//! One row of the incremental fetch-time report.

use crate::utils::blank_out_nls_and_tabs;

/// Version number of the report line schema. Column meaning for a given
/// version never changes; consumers treat column order as contract.
pub const EXPORT_SCHEMA_VERSION: u32 = 4;

const SEPARATOR: &str = "\t";

/// A newly fetched metadata item, as produced by the metadata store join.
///
/// `id` is the store's monotonically increasing item identifier and
/// drives the export cursor. `fetch_time` below zero marks an item whose
/// fetch time has not been initialized yet.
#[derive(Debug, Clone, Default)]
pub struct FetchRecord {
    pub id: i64,
    pub publisher_name: String,
    pub plugin_id: String,
    pub unit_key: String,
    pub is_bulk_content: bool,
    pub publication_name: String,
    pub item_type: String,
    pub item_title: Option<String>,
    pub date: Option<String>,
    pub fetch_time: i64,
    pub access_url: Option<String>,
    pub doi: Option<String>,
    pub p_issn: Option<String>,
    pub e_issn: Option<String>,
    pub p_isbn: Option<String>,
    pub e_isbn: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub start_page: Option<String>,
    pub provider_id: Option<String>,
    pub provider_name: Option<String>,
}

impl FetchRecord {
    /// Serialize to one tab-separated report line (no trailing newline).
    ///
    /// Every variable-length field has embedded tabs and newlines blanked
    /// so one logical record is always exactly one physical line.
    pub fn to_line(&self, server_name: &str) -> String {
        let mut fields: Vec<String> = Vec::with_capacity(22);
        fields.push(EXPORT_SCHEMA_VERSION.to_string());
        fields.push(blank_out_nls_and_tabs(server_name));
        fields.push(blank_out_nls_and_tabs(&self.publisher_name));
        fields.push(blank_out_nls_and_tabs(&self.plugin_id));
        fields.push(blank_out_nls_and_tabs(&self.unit_key));
        fields.push(self.is_bulk_content.to_string());
        fields.push(blank_out_nls_and_tabs(&self.publication_name));
        fields.push(blank_out_nls_and_tabs(&self.item_type));
        fields.push(clean_opt(&self.item_title));
        fields.push(clean_opt(&self.date));
        fields.push(self.fetch_time.to_string());
        fields.push(clean_opt(&self.access_url));
        fields.push(clean_opt(&self.doi));
        fields.push(clean_opt(&self.p_issn));
        fields.push(clean_opt(&self.e_issn));
        fields.push(clean_opt(&self.p_isbn));
        fields.push(clean_opt(&self.e_isbn));
        fields.push(clean_opt(&self.volume));
        fields.push(clean_opt(&self.issue));
        fields.push(clean_opt(&self.start_page));
        fields.push(clean_opt(&self.provider_id));
        fields.push(clean_opt(&self.provider_name));
        fields.join(SEPARATOR)
    }
}

fn clean_opt(field: &Option<String>) -> String {
    field
        .as_deref()
        .map(blank_out_nls_and_tabs)
        .unwrap_or_default()
}
