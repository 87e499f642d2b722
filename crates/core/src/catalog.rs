use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::domain::product::{Product, ProductId};

/// Catalog collaborator seam. Product storage and search ranking live
/// outside the engine; the store only needs lookups and stock checks. The
/// catalog is shared read-only across all sessions.
#[async_trait::async_trait]
pub trait Catalog: Send + Sync {
    async fn lookup_product(&self, id: &ProductId) -> Option<Product>;
    async fn check_stock(&self, id: &ProductId, quantity: u32) -> bool;
}

#[derive(Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<String, Product>>,
}

impl InMemoryCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        let products = products
            .into_iter()
            .map(|product| (product.id.0.clone(), product))
            .collect();
        Self { products: RwLock::new(products) }
    }

    pub async fn insert(&self, product: Product) {
        let mut products = self.products.write().await;
        products.insert(product.id.0.clone(), product);
    }

    pub async fn list(&self) -> Vec<Product> {
        let products = self.products.read().await;
        let mut all: Vec<Product> = products.values().cloned().collect();
        all.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        all
    }
}

#[async_trait::async_trait]
impl Catalog for InMemoryCatalog {
    async fn lookup_product(&self, id: &ProductId) -> Option<Product> {
        let products = self.products.read().await;
        products.get(&id.0).cloned()
    }

    async fn check_stock(&self, id: &ProductId, quantity: u32) -> bool {
        let products = self.products.read().await;
        products
            .get(&id.0)
            .map(|product| product.stock_quantity >= quantity)
            .unwrap_or(false)
    }
}
