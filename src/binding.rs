use anyhow::{anyhow, Result};
use tracing::debug;

use crate::catalog::MetadataFieldDefinition;

/// Current value of every field of the active document type, kept in
/// field-definition order. Keys never leave the set of known field ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldValueMap {
    entries: Vec<(u64, String)>,
}

impl FieldValueMap {
    /// Fresh map for a field list. Lookup fields start at their first option.
    pub fn for_fields(fields: &[MetadataFieldDefinition]) -> Self {
        let entries = fields
            .iter()
            .map(|field| (field.id, field.lookup.first().cloned().unwrap_or_default()))
            .collect();
        Self { entries }
    }

    pub fn get(&self, id: u64) -> Option<&str> {
        self.entries
            .iter()
            .find(|(field_id, _)| *field_id == id)
            .map(|(_, value)| value.as_str())
    }

    pub fn insert(&mut self, id: u64, value: impl Into<String>) -> Result<()> {
        let slot = self
            .entries
            .iter_mut()
            .find(|(field_id, _)| *field_id == id)
            .ok_or_else(|| anyhow!("field {} does not belong to the selected document type", id))?;
        slot.1 = value.into();
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &str)> {
        self.entries.iter().map(|(id, value)| (*id, value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Field list of the selected document type together with the field that
/// receives OCR output and the values entered so far.
#[derive(Debug, Clone, Default)]
pub struct FieldBinder {
    fields: Vec<MetadataFieldDefinition>,
    active: Option<u64>,
    values: FieldValueMap,
}

impl FieldBinder {
    pub fn new(fields: Vec<MetadataFieldDefinition>) -> Self {
        let values = FieldValueMap::for_fields(&fields);
        Self {
            fields,
            active: None,
            values,
        }
    }

    pub fn fields(&self) -> &[MetadataFieldDefinition] {
        &self.fields
    }

    pub fn values(&self) -> &FieldValueMap {
        &self.values
    }

    /// Explicit selection if one was made, otherwise the first field.
    pub fn active_field(&self) -> Option<&MetadataFieldDefinition> {
        match self.active {
            Some(id) => self.fields.iter().find(|field| field.id == id),
            None => self.fields.first(),
        }
    }

    pub fn select(&mut self, key: &str) -> Result<&MetadataFieldDefinition> {
        let id = self.resolve(key)?.id;
        self.active = Some(id);
        self.resolve(key)
    }

    /// Writes OCR output into the active field. Last write wins. Lookup
    /// fields only take text naming one of their options.
    pub fn bind(&mut self, text: &str) -> Result<&MetadataFieldDefinition> {
        let field = self
            .active_field()
            .ok_or_else(|| anyhow!("no metadata fields loaded; select a document type first"))?;
        let (id, value) = (field.id, lookup_value(field, text)?);
        self.values.insert(id, value)?;
        debug!("bound {:?} to field {}", text, id);
        self.field_by_id(id)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<&MetadataFieldDefinition> {
        let field = self.resolve(key)?;
        let (id, value) = (field.id, lookup_value(field, value)?);
        self.values.insert(id, value)?;
        self.field_by_id(id)
    }

    /// Empties a free-text field; a lookup field goes back to its first option.
    pub fn clear(&mut self, key: &str) -> Result<&MetadataFieldDefinition> {
        let field = self.resolve(key)?;
        let (id, value) = (field.id, field.lookup.first().cloned().unwrap_or_default());
        self.values.insert(id, value)?;
        self.field_by_id(id)
    }

    /// Looks a field up by numeric id, or by label ignoring case.
    pub fn resolve(&self, key: &str) -> Result<&MetadataFieldDefinition> {
        let key = key.trim();
        let by_id = key
            .parse::<u64>()
            .ok()
            .and_then(|id| self.fields.iter().find(|field| field.id == id));
        by_id
            .or_else(|| {
                self.fields
                    .iter()
                    .find(|field| field.label.eq_ignore_ascii_case(key))
            })
            .ok_or_else(|| anyhow!("unknown field: {}", key))
    }

    fn field_by_id(&self, id: u64) -> Result<&MetadataFieldDefinition> {
        self.fields
            .iter()
            .find(|field| field.id == id)
            .ok_or_else(|| anyhow!("unknown field id: {}", id))
    }
}

/// Free-text fields keep `value` as is. Lookup fields map it onto the
/// matching option (ignoring case and surrounding whitespace) or reject it.
fn lookup_value(field: &MetadataFieldDefinition, value: &str) -> Result<String> {
    if !field.is_lookup() {
        return Ok(value.to_string());
    }
    let wanted = value.trim();
    field
        .lookup
        .iter()
        .find(|option| option.eq_ignore_ascii_case(wanted))
        .cloned()
        .ok_or_else(|| {
            anyhow!(
                "'{}' is not an option for {} (expected one of: {})",
                wanted,
                field.label,
                field.lookup.join(", ")
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice_fields() -> Vec<MetadataFieldDefinition> {
        vec![
            MetadataFieldDefinition::new(3, "Invoice number").required(),
            MetadataFieldDefinition::new(5, "Currency").with_lookup(["EUR", "USD"]),
            MetadataFieldDefinition::new(9, "Notes"),
        ]
    }

    #[test]
    fn lookup_fields_start_at_first_option() {
        let values = FieldValueMap::for_fields(&invoice_fields());
        let snapshot: Vec<(u64, &str)> = values.iter().collect();
        assert_eq!(snapshot, vec![(3, ""), (5, "EUR"), (9, "")]);
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let mut values = FieldValueMap::for_fields(&invoice_fields());
        assert!(values.insert(42, "x").is_err());
        assert_eq!(values.len(), 3);
        assert_eq!(values.get(42), None);
    }

    #[test]
    fn bind_targets_first_field_until_another_is_selected() {
        let mut binder = FieldBinder::new(invoice_fields());
        assert_eq!(binder.bind("INV-1").unwrap().id, 3);

        binder.select("notes").unwrap();
        binder.bind("paid").unwrap();
        assert_eq!(binder.values().get(3), Some("INV-1"));
        assert_eq!(binder.values().get(9), Some("paid"));
    }

    #[test]
    fn repeated_bind_is_idempotent_and_last_write_wins() {
        let mut binder = FieldBinder::new(invoice_fields());
        binder.bind("INV-1").unwrap();
        let once = binder.values().clone();
        binder.bind("INV-1").unwrap();
        assert_eq!(binder.values(), &once);

        binder.bind("INV-2").unwrap();
        assert_eq!(binder.values().get(3), Some("INV-2"));
    }

    #[test]
    fn bind_without_fields_is_an_error() {
        let mut binder = FieldBinder::default();
        let err = binder.bind("text").unwrap_err();
        assert!(err.to_string().contains("no metadata fields"));
    }

    #[test]
    fn fields_resolve_by_id_or_label() {
        let mut binder = FieldBinder::new(invoice_fields());
        assert_eq!(binder.resolve("5").unwrap().label, "Currency");
        assert_eq!(binder.resolve(" INVOICE NUMBER ").unwrap().id, 3);
        assert!(binder.resolve("Total").is_err());

        binder.set("currency", "USD").unwrap();
        assert_eq!(binder.values().get(5), Some("USD"));
        binder.set("notes", "paid").unwrap();
        binder.clear("notes").unwrap();
        assert_eq!(binder.values().get(9), Some(""));
    }

    #[test]
    fn lookup_set_accepts_only_options() {
        let mut binder = FieldBinder::new(invoice_fields());
        let err = binder.set("Currency", "BANANA").unwrap_err();
        assert_eq!(
            err.to_string(),
            "'BANANA' is not an option for Currency (expected one of: EUR, USD)"
        );
        assert_eq!(binder.values().get(5), Some("EUR"));

        binder.set("currency", "usd").unwrap();
        assert_eq!(binder.values().get(5), Some("USD"));
        binder.clear("currency").unwrap();
        assert_eq!(binder.values().get(5), Some("EUR"));
    }

    #[test]
    fn lookup_bind_keeps_matching_option_or_fails() {
        let mut binder = FieldBinder::new(invoice_fields());
        binder.select("Currency").unwrap();

        binder.bind(" usd\n").unwrap();
        assert_eq!(binder.values().get(5), Some("USD"));

        assert!(binder.bind("ocr garbage").is_err());
        assert_eq!(binder.values().get(5), Some("USD"));
    }
}
