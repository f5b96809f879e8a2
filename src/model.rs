//! Records read from the backend and the snapshot handed to the renderer.
//!
//! The types are plain data: the renderer never mutates them and callers are
//! free to build them by hand, from query results, or from JSON.  Field
//! aliases accept the column names used by the backend tables
//! (`nombre`, `cliente_id`, `producto_id`) so rows can be deserialized as-is.

use serde::{Deserialize, Deserializer, Serialize};

/// Identifier type shared by customers and products.
pub type RecordId = i64;

/// A customer record.  Identifiers are assigned monotonically, so a larger
/// identifier means a more recently created customer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: RecordId,
    #[serde(alias = "nombre")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub email: String,
}

/// Optional text columns come back as `null` when unset.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Customer {
    /// Creates a new customer record.
    pub fn new(id: RecordId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
        }
    }
}

/// A product record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: RecordId,
    #[serde(alias = "nombre")]
    pub name: String,
}

impl Product {
    /// Creates a new product record.
    pub fn new(id: RecordId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Many-to-many assignment of a product to a customer.
///
/// Either side may point at a record that no longer exists, and the same
/// pair may appear more than once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerProductLink {
    #[serde(alias = "cliente_id")]
    pub customer_id: RecordId,
    #[serde(alias = "producto_id")]
    pub product_id: RecordId,
}

impl CustomerProductLink {
    /// Creates a new link between `customer_id` and `product_id`.
    pub fn new(customer_id: RecordId, product_id: RecordId) -> Self {
        Self {
            customer_id,
            product_id,
        }
    }
}

/// Point-in-time copy of the three collections the dashboard is built from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, alias = "clientes")]
    pub customers: Vec<Customer>,
    #[serde(default, alias = "productos")]
    pub products: Vec<Product>,
    #[serde(default, alias = "cliente_productos")]
    pub links: Vec<CustomerProductLink>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a snapshot from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Replaces the customers and returns the updated snapshot.
    pub fn with_customers<I>(mut self, customers: I) -> Self
    where
        I: IntoIterator<Item = Customer>,
    {
        self.customers = customers.into_iter().collect();
        self
    }

    /// Replaces the products and returns the updated snapshot.
    pub fn with_products<I>(mut self, products: I) -> Self
    where
        I: IntoIterator<Item = Product>,
    {
        self.products = products.into_iter().collect();
        self
    }

    /// Replaces the links and returns the updated snapshot.
    pub fn with_links<I>(mut self, links: I) -> Self
    where
        I: IntoIterator<Item = CustomerProductLink>,
    {
        self.links = links.into_iter().collect();
        self
    }
}

/// Raster snapshot of the bar chart, stored as tightly packed RGBA8 rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChartImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl ChartImage {
    /// Wraps raw RGBA8 pixel data.  Returns `None` when the buffer length
    /// does not match `width * height * 4`.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        let expected = (width as usize) * (height as usize) * 4;
        if pixels.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    /// Returns the width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the RGBA8 pixel data.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// An image with no area has nothing to embed.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Converts the snapshot into an [`image::DynamicImage`].
    pub fn to_dynamic_image(&self) -> Option<image::DynamicImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .map(image::DynamicImage::ImageRgba8)
    }
}

impl From<image::RgbaImage> for ChartImage {
    fn from(buffer: image::RgbaImage) -> Self {
        let (width, height) = buffer.dimensions();
        Self {
            width,
            height,
            pixels: buffer.into_raw(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChartImage, Snapshot};

    #[test]
    fn snapshot_accepts_backend_column_names() {
        let json = r#"{
            "clientes": [{"id": 1, "nombre": "Ana", "email": "ana@example.com"}],
            "productos": [{"id": 10, "nombre": "Seguro"}],
            "cliente_productos": [{"cliente_id": 1, "producto_id": 10}]
        }"#;

        let snapshot = Snapshot::from_json(json).expect("parse snapshot");
        assert_eq!(snapshot.customers[0].name, "Ana");
        assert_eq!(snapshot.products[0].name, "Seguro");
        assert_eq!(snapshot.links[0].product_id, 10);
    }

    #[test]
    fn null_or_missing_email_reads_as_empty() {
        let json = r#"{
            "customers": [
                {"id": 1, "name": "Ana", "email": null},
                {"id": 2, "name": "Luis"}
            ]
        }"#;

        let snapshot = Snapshot::from_json(json).expect("parse snapshot");
        assert_eq!(snapshot.customers[0].email, "");
        assert_eq!(snapshot.customers[1].email, "");
    }

    #[test]
    fn snapshot_defaults_missing_collections() {
        let snapshot = Snapshot::from_json(r#"{"products": [{"id": 1, "name": "A"}]}"#)
            .expect("parse snapshot");
        assert!(snapshot.customers.is_empty());
        assert!(snapshot.links.is_empty());
        assert_eq!(snapshot.products.len(), 1);
    }

    #[test]
    fn chart_image_rejects_short_buffers() {
        assert!(ChartImage::from_rgba(2, 2, vec![0; 15]).is_none());
        assert!(ChartImage::from_rgba(2, 2, vec![0; 16]).is_some());
    }

    #[test]
    fn zero_area_chart_is_empty() {
        let image = ChartImage::from_rgba(0, 10, Vec::new()).expect("valid empty buffer");
        assert!(image.is_empty());
    }
}
