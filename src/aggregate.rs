//! Client-side aggregates derived from a [`Snapshot`][crate::model::Snapshot].
//!
//! Nothing here is stored: every value is recomputed from the collections on
//! each call.  Links that reference missing records are tolerated; they simply
//! do not contribute to any product's count.

use crate::model::{Customer, CustomerProductLink, Product, RecordId};

/// Number of customers listed in the "recent customers" panel.
pub const RECENT_CUSTOMER_LIMIT: usize = 3;

/// Number of links referencing a single product.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductCount<'a> {
    pub product: &'a Product,
    pub count: usize,
}

/// Returns how many links reference `product_id`.  Duplicate links are
/// counted verbatim.
pub fn count_links_for(product_id: RecordId, links: &[CustomerProductLink]) -> usize {
    links
        .iter()
        .filter(|link| link.product_id == product_id)
        .count()
}

/// Computes the link count of every product, keeping the product order.
pub fn customers_per_product<'a>(
    products: &'a [Product],
    links: &[CustomerProductLink],
) -> Vec<ProductCount<'a>> {
    products
        .iter()
        .map(|product| ProductCount {
            product,
            count: count_links_for(product.id, links),
        })
        .collect()
}

/// Series plotted by the bar chart: products that have at least one customer.
pub fn chart_series<'a>(
    products: &'a [Product],
    links: &[CustomerProductLink],
) -> Vec<ProductCount<'a>> {
    customers_per_product(products, links)
        .into_iter()
        .filter(|entry| entry.count > 0)
        .collect()
}

/// Returns up to `limit` customers ordered by identifier, newest first.
pub fn recent_customers(customers: &[Customer], limit: usize) -> Vec<&Customer> {
    let mut sorted: Vec<&Customer> = customers.iter().collect();
    sorted.sort_by(|a, b| b.id.cmp(&a.id));
    sorted.truncate(limit);
    sorted
}

/// Label of a product assigned to a customer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProductLabel<'a> {
    /// The link points at an existing product.
    Known(&'a Product),
    /// The link points at a product that is not part of the snapshot.
    Deleted(RecordId),
}

impl ProductLabel<'_> {
    /// Text shown for the label, using `deleted` for dangling references.
    pub fn display<'s>(&'s self, deleted: &'s str) -> &'s str {
        match self {
            Self::Known(product) => &product.name,
            Self::Deleted(_) => deleted,
        }
    }
}

/// A customer together with the products assigned to them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryEntry<'a> {
    pub customer: &'a Customer,
    pub products: Vec<ProductLabel<'a>>,
}

/// Builds the customer directory: one entry per customer, in snapshot order,
/// with the labels of every product linked to it.
pub fn customer_directory<'a>(
    customers: &'a [Customer],
    products: &'a [Product],
    links: &[CustomerProductLink],
) -> Vec<DirectoryEntry<'a>> {
    customers
        .iter()
        .map(|customer| {
            let labels = links
                .iter()
                .filter(|link| link.customer_id == customer.id)
                .map(|link| {
                    products
                        .iter()
                        .find(|product| product.id == link.product_id)
                        .map_or(ProductLabel::Deleted(link.product_id), ProductLabel::Known)
                })
                .collect();
            DirectoryEntry {
                customer,
                products: labels,
            }
        })
        .collect()
}
