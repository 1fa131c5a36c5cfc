//! Catalog seeding from YAML.
//!
//! ```yaml
//! products:
//!   - name: Enamel Mug
//!     description: Holds 350ml.
//!     price: "12.50"
//!     category: kitchen
//!     images: [/img/mug.jpg]
//! ```
//!
//! Every entry is validated before anything is written. Products whose name
//! already exists in the catalog (ignoring case) are skipped, so running the
//! same file twice is harmless.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use cartwheel_core::api::ProductInput;
use cartwheel_storefront::db::Stores;
use cartwheel_storefront::models::NewProduct;

use super::{CliError, connect};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeedFile {
    products: Vec<ProductInput>,
}

/// Outcome of a seeding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// Insert the products listed in `file`.
///
/// # Errors
///
/// Returns error if the file can't be read or parsed, any entry is invalid,
/// or the database rejects an insert.
pub async fn products(file: &Path) -> Result<SeedReport, CliError> {
    let content = tokio::fs::read_to_string(file)
        .await
        .map_err(|source| CliError::Read {
            path: file.display().to_string(),
            source,
        })?;

    let products = parse_products(&content)?;
    tracing::info!(path = %file.display(), count = products.len(), "Parsed seed file");

    let stores = Stores::postgres(connect().await?);
    let existing: Vec<String> = stores
        .products
        .list(None)
        .await?
        .into_iter()
        .map(|p| p.name)
        .collect();

    let (fresh, skipped) = split_existing(products, &existing);
    for product in &fresh {
        let created = stores.products.create(product).await?;
        tracing::info!(id = %created.id, name = %created.name, "Inserted product");
    }

    let report = SeedReport {
        inserted: fresh.len(),
        skipped,
    };
    tracing::info!(
        inserted = report.inserted,
        skipped = report.skipped,
        "Seeding complete"
    );
    Ok(report)
}

/// Parse and validate a seed file.
fn parse_products(content: &str) -> Result<Vec<NewProduct>, CliError> {
    let file: SeedFile = serde_yaml::from_str(content)?;

    let mut products = Vec::with_capacity(file.products.len());
    let mut invalid = 0;
    for (index, input) in file.products.into_iter().enumerate() {
        let product = NewProduct::from(input);
        match product.validate() {
            Ok(()) => products.push(product),
            Err(msg) => {
                tracing::error!(entry = index + 1, "{msg}");
                invalid += 1;
            }
        }
    }

    if invalid > 0 {
        return Err(CliError::InvalidProducts(invalid));
    }
    Ok(products)
}

/// Drop products already in the catalog, and repeats within the file.
fn split_existing(products: Vec<NewProduct>, existing: &[String]) -> (Vec<NewProduct>, usize) {
    let mut seen: HashSet<String> = existing.iter().map(|n| n.to_lowercase()).collect();
    let total = products.len();

    let fresh: Vec<NewProduct> = products
        .into_iter()
        .filter(|p| seen.insert(p.name.to_lowercase()))
        .collect();

    let skipped = total - fresh.len();
    (fresh, skipped)
}
