//! Seed the catalog with products from a YAML file.
//!
//! ```yaml
//! products:
//!   - name: Canvas Tote
//!     description: Heavy canvas tote bag.
//!     price: "18.50"
//!     stock_quantity: 60
//! ```
//!
//! Products are inserted as-is; running the command twice creates duplicates.

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use shopfront_core::Price;
use shopfront_server::db::ProductRepository;
use shopfront_server::models::{NewProduct, Product};

use super::connect;

/// Top-level layout of a seed file.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    pub products: Vec<SeedProduct>,
}

/// One product entry.
#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Price,
    pub stock_quantity: u32,
}

impl From<SeedProduct> for NewProduct {
    fn from(seed: SeedProduct) -> Self {
        Self {
            name: seed.name.trim().to_owned(),
            description: seed.description,
            price: seed.price,
            stock_quantity: seed.stock_quantity,
        }
    }
}

/// Collect every problem with the file so they can be reported together.
fn validate(file: &SeedFile) -> Vec<String> {
    let mut errors = Vec::new();
    for (index, product) in file.products.iter().enumerate() {
        let position = index + 1;
        if product.name.trim().is_empty() {
            errors.push(format!("product #{position}: name must not be empty"));
        }
        if product.stock_quantity > Product::MAX_STOCK {
            errors.push(format!(
                "product #{position}: stock_quantity must be at most {}",
                Product::MAX_STOCK
            ));
        }
    }
    errors
}

/// Parse and validate seed YAML.
///
/// # Errors
///
/// Returns a message for malformed YAML or invalid entries.
pub fn parse(content: &str) -> Result<SeedFile, Box<dyn std::error::Error>> {
    let file: SeedFile = serde_yaml::from_str(content)?;

    let errors = validate(&file);
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }
    Ok(file)
}

/// Seed products from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if database
/// operations fail.
pub async fn products(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading products from file");

    // Read and validate before connecting to the database
    let content = tokio::fs::read_to_string(path).await?;
    let file = parse(&content)?;
    info!(products = file.products.len(), "Parsed seed file");

    let store = connect().await?;

    let mut inserted = 0_usize;
    for product in file.products {
        let created = store.create_product(product.into()).await?;
        info!(id = %created.id, name = %created.name, "Created product");
        inserted += 1;
    }

    info!("Seeding complete! Products inserted: {inserted}");
    Ok(())
}
