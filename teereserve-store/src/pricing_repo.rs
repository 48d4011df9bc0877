use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use teereserve_core::collections::{
    PRICING_OVERRIDES, PRICING_PROMOTIONS, PRICING_RULES, PRICING_SEASONS, PRICING_TIME_BANDS,
};
use teereserve_core::repository::{fetch, fetch_all, put};
use teereserve_core::{DocumentStore, Filter};
use teereserve_pricing::{
    PriceRule, PricingBook, PricingResult, Promotion, Season, SpecialOverride, TimeBand,
};

use crate::{RepoError, RepoResult};

/// A pricing configuration document kind.
pub trait PricingDocument: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn validate(&self) -> PricingResult<()>;

    /// Code that must be unique across the collection, if any.
    fn unique_code(&self) -> Option<&str> {
        None
    }
}

macro_rules! pricing_document {
    ($ty:ty, $collection:expr) => {
        pricing_document!($ty, $collection, |_item| None);
    };
    ($ty:ty, $collection:expr, |$item:ident| $code:expr) => {
        impl PricingDocument for $ty {
            const COLLECTION: &'static str = $collection;

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }

            fn validate(&self) -> PricingResult<()> {
                <$ty>::validate(self)
            }

            fn unique_code(&self) -> Option<&str> {
                let $item = self;
                $code
            }
        }
    };
}

pricing_document!(Season, PRICING_SEASONS);
pricing_document!(TimeBand, PRICING_TIME_BANDS);
pricing_document!(PriceRule, PRICING_RULES);
pricing_document!(SpecialOverride, PRICING_OVERRIDES);
pricing_document!(Promotion, PRICING_PROMOTIONS, |promo| Some(promo.code.as_str()));

/// Path segment naming a pricing collection in the admin API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingKind {
    Seasons,
    TimeBands,
    Rules,
    Overrides,
    Promotions,
}

impl FromStr for PricingKind {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "seasons" => Ok(PricingKind::Seasons),
            "time-bands" => Ok(PricingKind::TimeBands),
            "rules" => Ok(PricingKind::Rules),
            "overrides" => Ok(PricingKind::Overrides),
            "promotions" => Ok(PricingKind::Promotions),
            other => Err(RepoError::NotFound(format!("Pricing collection {}", other))),
        }
    }
}

#[derive(Clone)]
pub struct PricingRepository {
    store: Arc<dyn DocumentStore>,
}

impl PricingRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// All pricing configuration, read in parallel.
    pub async fn load_book(&self) -> RepoResult<PricingBook> {
        let store = self.store.as_ref();
        let all = Filter::new();
        let (seasons, time_bands, rules, overrides, promotions) = tokio::try_join!(
            fetch_all::<Season>(store, PRICING_SEASONS, &all),
            fetch_all::<TimeBand>(store, PRICING_TIME_BANDS, &all),
            fetch_all::<PriceRule>(store, PRICING_RULES, &all),
            fetch_all::<SpecialOverride>(store, PRICING_OVERRIDES, &all),
            fetch_all::<Promotion>(store, PRICING_PROMOTIONS, &all),
        )?;

        Ok(PricingBook {
            seasons,
            time_bands,
            rules,
            overrides,
            promotions,
        })
    }

    pub async fn list<T: PricingDocument>(&self) -> RepoResult<Vec<T>> {
        Ok(fetch_all(self.store.as_ref(), T::COLLECTION, &Filter::new()).await?)
    }

    pub async fn get<T: PricingDocument>(&self, id: &str) -> RepoResult<T> {
        fetch(self.store.as_ref(), T::COLLECTION, id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("{} {}", T::COLLECTION, id)))
    }

    pub async fn create<T: PricingDocument>(&self, mut item: T) -> RepoResult<T> {
        item.set_id(Uuid::new_v4().to_string());
        item.validate()?;
        if let Some(code) = item.unique_code() {
            self.ensure_unique_code(code, item.id()).await?;
        }
        put(self.store.as_ref(), T::COLLECTION, item.id(), &item).await?;
        info!("Pricing {} created: {}", T::COLLECTION, item.id());
        Ok(item)
    }

    pub async fn update<T: PricingDocument>(&self, id: &str, mut item: T) -> RepoResult<T> {
        self.get::<T>(id).await?;
        item.set_id(id.to_string());
        item.validate()?;
        if let Some(code) = item.unique_code() {
            self.ensure_unique_code(code, id).await?;
        }
        put(self.store.as_ref(), T::COLLECTION, id, &item).await?;
        Ok(item)
    }

    pub async fn delete<T: PricingDocument>(&self, id: &str) -> RepoResult<()> {
        self.get::<T>(id).await?;
        self.store.delete(T::COLLECTION, id).await?;
        Ok(())
    }

    async fn ensure_unique_code(&self, code: &str, own_id: &str) -> RepoResult<()> {
        let promotions: Vec<Promotion> = self.list().await?;
        if promotions
            .iter()
            .any(|p| p.id != own_id && p.code.eq_ignore_ascii_case(code))
        {
            return Err(RepoError::Conflict(format!("Promotion code {} already exists", code)));
        }
        Ok(())
    }

    // Untyped entry points for the admin API, dispatched by path segment.

    pub async fn list_kind(&self, kind: PricingKind) -> RepoResult<Value> {
        Ok(match kind {
            PricingKind::Seasons => serde_json::to_value(self.list::<Season>().await?)?,
            PricingKind::TimeBands => serde_json::to_value(self.list::<TimeBand>().await?)?,
            PricingKind::Rules => serde_json::to_value(self.list::<PriceRule>().await?)?,
            PricingKind::Overrides => serde_json::to_value(self.list::<SpecialOverride>().await?)?,
            PricingKind::Promotions => serde_json::to_value(self.list::<Promotion>().await?)?,
        })
    }

    /// Create (`id == None`) or replace a document of the given kind from JSON.
    pub async fn upsert_kind(&self, kind: PricingKind, id: Option<&str>, body: Value) -> RepoResult<Value> {
        match kind {
            PricingKind::Seasons => self.upsert_value::<Season>(id, body).await,
            PricingKind::TimeBands => self.upsert_value::<TimeBand>(id, body).await,
            PricingKind::Rules => self.upsert_value::<PriceRule>(id, body).await,
            PricingKind::Overrides => self.upsert_value::<SpecialOverride>(id, body).await,
            PricingKind::Promotions => self.upsert_value::<Promotion>(id, body).await,
        }
    }

    pub async fn delete_kind(&self, kind: PricingKind, id: &str) -> RepoResult<()> {
        match kind {
            PricingKind::Seasons => self.delete::<Season>(id).await,
            PricingKind::TimeBands => self.delete::<TimeBand>(id).await,
            PricingKind::Rules => self.delete::<PriceRule>(id).await,
            PricingKind::Overrides => self.delete::<SpecialOverride>(id).await,
            PricingKind::Promotions => self.delete::<Promotion>(id).await,
        }
    }

    async fn upsert_value<T: PricingDocument>(&self, id: Option<&str>, mut body: Value) -> RepoResult<Value> {
        // The id comes from the path or is generated; never from the body.
        if let Some(obj) = body.as_object_mut() {
            obj.insert("id".into(), Value::String(String::new()));
        }
        let item: T = serde_json::from_value(body)
            .map_err(|e| RepoError::InvalidInput(e.to_string()))?;
        let saved = match id {
            Some(id) => self.update(id, item).await?,
            None => self.create(item).await?,
        };
        Ok(serde_json::to_value(saved)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryDocumentStore;
    use serde_json::json;

    fn repo() -> PricingRepository {
        PricingRepository::new(Arc::new(InMemoryDocumentStore::new()))
    }

    #[tokio::test]
    async fn test_upsert_validates_and_loads_into_book() {
        let repo = repo();
        let created = repo
            .upsert_kind(
                PricingKind::Rules,
                None,
                json!({
                    "name": "Weekend uplift",
                    "courseId": null,
                    "conditions": [{"type": "daysOfWeek", "days": [6, 7]}],
                    "adjustment": {"type": "multiplier", "factorBps": 12000},
                    "priority": 10,
                    "active": true
                }),
            )
            .await
            .unwrap();
        assert!(!created["id"].as_str().unwrap().is_empty());

        let invalid = repo
            .upsert_kind(
                PricingKind::Rules,
                None,
                json!({
                    "name": "Broken",
                    "courseId": null,
                    "conditions": [{"type": "daysOfWeek", "days": [8]}],
                    "adjustment": {"type": "delta", "amountCents": 100},
                    "active": true
                }),
            )
            .await;
        assert!(matches!(invalid, Err(RepoError::Pricing(_))));

        let book = repo.load_book().await.unwrap();
        assert_eq!(book.rules.len(), 1);
        assert!(book.seasons.is_empty());
    }

    #[tokio::test]
    async fn test_promotion_codes_are_unique() {
        let repo = repo();
        let promo = json!({
            "code": "TWILIGHT",
            "courseId": null,
            "percentBps": 1500,
            "amountCents": null,
            "validFrom": null,
            "validTo": null,
            "active": true
        });
        repo.upsert_kind(PricingKind::Promotions, None, promo.clone())
            .await
            .unwrap();
        let mut duplicate = promo;
        duplicate["code"] = json!("twilight");
        let result = repo.upsert_kind(PricingKind::Promotions, None, duplicate).await;
        assert!(matches!(result, Err(RepoError::Conflict(_))));
    }

    #[test]
    fn test_kind_from_path() {
        assert_eq!("time-bands".parse::<PricingKind>().unwrap(), PricingKind::TimeBands);
        assert!("taxes".parse::<PricingKind>().is_err());
    }
}
