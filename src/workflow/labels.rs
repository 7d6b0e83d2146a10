//! Printable label layout (three labels per row) and the code images
//! printed on them.

use super::registry::PropertyRegistry;
use crate::access::{Actor, Permission};
use crate::codes::{self, CodeImageError};
use crate::error::{WorkflowError, WorkflowResult};
use crate::model::{Property, PropertyFilter};
use crate::store::Store;
use serde::Serialize;
use uuid::Uuid;

const LABELS_PER_ROW: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelCell {
    pub name: String,
    pub inventory_number: String,
    /// Text encoded in the QR symbol.
    pub code_text: String,
    pub barcode: String,
}

impl From<&Property> for LabelCell {
    fn from(property: &Property) -> Self {
        Self {
            name: property.name.clone(),
            inventory_number: property.inventory_number.clone(),
            code_text: property.qr_code.clone(),
            barcode: property.barcode.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelRow {
    pub cells: Vec<LabelCell>,
}

impl<'a, S: Store> PropertyRegistry<'a, S> {
    /// Labels for every property, ordered by inventory number. The last row
    /// may hold fewer than three cells.
    pub fn label_sheet(&self, actor: &Actor) -> WorkflowResult<Vec<LabelRow>> {
        actor.require(Permission::ExportProperties)?;
        let properties = self.store.properties(&PropertyFilter::default())?;
        Ok(properties
            .chunks(LABELS_PER_ROW)
            .map(|chunk| LabelRow {
                cells: chunk.iter().map(LabelCell::from).collect(),
            })
            .collect())
    }

    /// PNG of the property's stored QR payload.
    pub fn qr_image(&self, actor: &Actor, property_id: Uuid) -> WorkflowResult<Vec<u8>> {
        let property = self.get(actor, property_id)?;
        codes::qr_png(&property.qr_code).map_err(|e| image_failure(&property, e))
    }

    /// PNG of the property's stored EAN-13 barcode.
    pub fn barcode_image(&self, actor: &Actor, property_id: Uuid) -> WorkflowResult<Vec<u8>> {
        let property = self.get(actor, property_id)?;
        codes::barcode_png(&property.barcode).map_err(|e| image_failure(&property, e))
    }
}

fn image_failure(property: &Property, err: CodeImageError) -> WorkflowError {
    log::error!("code image for {} failed: {err}", property.inventory_number);
    WorkflowError::validation(format!(
        "No image could be generated for {}",
        property.inventory_number
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::fixtures::Fixture;

    #[test]
    fn test_cells_fill_rows_of_three() {
        let fx = Fixture::new();
        for n in 1..=4 {
            fx.property(&format!("INV-{n}"), fx.warehouse.id);
        }

        let rows = PropertyRegistry::new(&fx.store).label_sheet(&fx.manager).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cells.len(), 3);
        assert_eq!(rows[1].cells.len(), 1);
        assert_eq!(rows[1].cells[0].inventory_number, "INV-4");
        assert_eq!(rows[0].cells[0].code_text, "QM:INV-1");
    }

    #[test]
    fn test_users_cannot_print_labels() {
        let fx = Fixture::new();
        let err = PropertyRegistry::new(&fx.store).label_sheet(&fx.user).unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));
    }

    #[test]
    fn test_code_images_render_stored_payloads() {
        let fx = Fixture::new();
        let property = fx.property("INV-7", fx.office.id);
        let registry = PropertyRegistry::new(&fx.store);

        let qr = registry.qr_image(&fx.user, property.id).unwrap();
        assert_eq!(qr, codes::qr_png("QM:INV-7").unwrap());
        let bars = registry.barcode_image(&fx.user, property.id).unwrap();
        assert_eq!(bars, codes::barcode_png(&property.barcode).unwrap());

        let err = registry.qr_image(&fx.user, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
    }

    #[test]
    fn test_corrupt_stored_barcode_is_reported() {
        let fx = Fixture::new();
        let mut property = fx.property("INV-8", fx.office.id);
        property.barcode = "12345".into();
        fx.store.update_property(&property).unwrap();

        let err = PropertyRegistry::new(&fx.store)
            .barcode_image(&fx.admin, property.id)
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(m) if m.contains("INV-8")));
    }
}
