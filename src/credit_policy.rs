use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use tracing::warn;

pub const WEEKLY_PRODUCT_ID: &str = "com.vemix.weekly";
pub const YEARLY_PRODUCT_ID: &str = "com.vemix.yearly";

/// Maps subscription product identifiers to the credits a renewal grants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditPolicy {
    grants: HashMap<String, i32>,
}

impl Default for CreditPolicy {
    fn default() -> Self {
        Self::new([(WEEKLY_PRODUCT_ID, 10), (YEARLY_PRODUCT_ID, 60)])
    }
}

impl CreditPolicy {
    pub fn new<I, S>(grants: I) -> Self
    where
        I: IntoIterator<Item = (S, i32)>,
        S: Into<String>,
    {
        Self {
            grants: grants.into_iter().map(|(p, c)| (p.into(), c)).collect(),
        }
    }

    /// Parse a `product=credits,product=credits` list.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut grants = HashMap::new();
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (product, credits) = entry
                .split_once('=')
                .with_context(|| format!("credit grant '{entry}' must look like product=credits"))?;
            let product = product.trim();
            if product.is_empty() {
                bail!("credit grant '{entry}' has an empty product id");
            }
            let credits: i32 = credits
                .trim()
                .parse()
                .with_context(|| format!("credit grant '{entry}' has a non-integer amount"))?;
            if credits < 0 {
                bail!("credit grant '{entry}' must not be negative");
            }
            grants.insert(product.to_string(), credits);
        }

        if grants.is_empty() {
            bail!("credit grant list is empty");
        }

        Ok(Self { grants })
    }

    /// Credits granted for one renewal of `product_id`. Unknown products
    /// grant nothing.
    pub fn credits_for(&self, product_id: &str) -> i32 {
        match self.grants.get(product_id) {
            Some(credits) => *credits,
            None => {
                warn!(product_id = %product_id, "Unknown product_id, granting no credits");
                0
            }
        }
    }
}
