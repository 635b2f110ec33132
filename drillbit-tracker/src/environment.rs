//! Environment aggregate and lock gate.
//!
//! An environment bundles four independently edited forecasts. Before any
//! statements are generated against it, the user locks each forecast; the
//! gate only decides which locks are *allowed*, the flags themselves are
//! set by the caller.

use drillbit_client::{ObjectId, Pk, ResourceRef};
use serde_json::json;
use std::fmt;
use tracing::{debug, info};

use crate::backend::ObjectBackend;
use crate::error::{Result, TrackerError};
use crate::model::{EnvironmentRecord, ForecastRecord};
use crate::store::{update_or_create_value, ObjectStore};

/// One of the four forecasts composing an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EnvironmentComponent {
    BlockSchedule,
    BitcoinPrice,
    TransactionFees,
    HashRate,
}

impl EnvironmentComponent {
    /// Lock order: the block schedule gates the rest.
    pub const ALL: [EnvironmentComponent; 4] = [
        EnvironmentComponent::BlockSchedule,
        EnvironmentComponent::BitcoinPrice,
        EnvironmentComponent::TransactionFees,
        EnvironmentComponent::HashRate,
    ];

    /// Collection the forecast is stored in.
    pub fn resource(&self) -> ResourceRef {
        match self {
            EnvironmentComponent::BlockSchedule => ResourceRef::BLOCK_SCHEDULE,
            EnvironmentComponent::BitcoinPrice => ResourceRef::BITCOIN_PRICE,
            EnvironmentComponent::TransactionFees => ResourceRef::TRANSACTION_FEES,
            EnvironmentComponent::HashRate => ResourceRef::HASH_RATE,
        }
    }

    /// Foreign-key field on the environment record.
    pub fn field(&self) -> &'static str {
        match self {
            EnvironmentComponent::BlockSchedule => "block_schedule",
            EnvironmentComponent::BitcoinPrice => "bitcoin_price",
            EnvironmentComponent::TransactionFees => "transaction_fees",
            EnvironmentComponent::HashRate => "hash_rate",
        }
    }
}

impl fmt::Display for EnvironmentComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EnvironmentComponent::BlockSchedule => "Block schedule",
            EnvironmentComponent::BitcoinPrice => "Bitcoin price",
            EnvironmentComponent::TransactionFees => "Transaction fees",
            EnvironmentComponent::HashRate => "Hash rate",
        };
        f.write_str(name)
    }
}

/// One boolean per component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockFlags {
    pub block_schedule: bool,
    pub bitcoin_price: bool,
    pub transaction_fees: bool,
    pub hash_rate: bool,
}

impl LockFlags {
    pub fn get(&self, component: EnvironmentComponent) -> bool {
        match component {
            EnvironmentComponent::BlockSchedule => self.block_schedule,
            EnvironmentComponent::BitcoinPrice => self.bitcoin_price,
            EnvironmentComponent::TransactionFees => self.transaction_fees,
            EnvironmentComponent::HashRate => self.hash_rate,
        }
    }

    fn set(&mut self, component: EnvironmentComponent, value: bool) {
        match component {
            EnvironmentComponent::BlockSchedule => self.block_schedule = value,
            EnvironmentComponent::BitcoinPrice => self.bitcoin_price = value,
            EnvironmentComponent::TransactionFees => self.transaction_fees = value,
            EnvironmentComponent::HashRate => self.hash_rate = value,
        }
    }

    /// Conjunction across all four components.
    pub fn all(&self) -> bool {
        self.block_schedule && self.bitcoin_price && self.transaction_fees && self.hash_rate
    }
}

/// Ids of the forecasts currently held by the aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComponentIds {
    pub block_schedule: Option<ObjectId>,
    pub bitcoin_price: Option<ObjectId>,
    pub transaction_fees: Option<ObjectId>,
    pub hash_rate: Option<ObjectId>,
}

/// A named environment and its four forecasts.
#[derive(Debug, Clone)]
pub struct EnvironmentAggregate {
    record: Option<EnvironmentRecord>,
    name: Option<String>,
    block_schedule: ObjectStore<ForecastRecord>,
    bitcoin_price: ObjectStore<ForecastRecord>,
    transaction_fees: ObjectStore<ForecastRecord>,
    hash_rate: ObjectStore<ForecastRecord>,
    locked: LockFlags,
}

impl Default for EnvironmentAggregate {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvironmentAggregate {
    pub fn new() -> Self {
        Self {
            record: None,
            name: None,
            block_schedule: ObjectStore::new(ResourceRef::BLOCK_SCHEDULE),
            bitcoin_price: ObjectStore::new(ResourceRef::BITCOIN_PRICE),
            transaction_fees: ObjectStore::new(ResourceRef::TRANSACTION_FEES),
            hash_rate: ObjectStore::new(ResourceRef::HASH_RATE),
            locked: LockFlags::default(),
        }
    }

    /// Resolved id, once loaded or saved.
    pub fn id(&self) -> Option<ObjectId> {
        self.record.as_ref().map(|r| r.id)
    }

    pub fn record(&self) -> Option<&EnvironmentRecord> {
        self.record.as_ref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn component(&self, component: EnvironmentComponent) -> Option<&ForecastRecord> {
        self.store(component).object()
    }

    /// Replace a forecast. Refused while that forecast is locked.
    pub fn set_component(
        &mut self,
        component: EnvironmentComponent,
        record: Option<ForecastRecord>,
    ) -> Result<()> {
        if self.locked.get(component) {
            return Err(TrackerError::ComponentLocked(component));
        }
        self.store_mut(component).set_object(record);
        Ok(())
    }

    /// Ids of the four forecasts currently held.
    pub fn components(&self) -> ComponentIds {
        let id = |c| self.component(c).map(|r| r.id);
        ComponentIds {
            block_schedule: id(EnvironmentComponent::BlockSchedule),
            bitcoin_price: id(EnvironmentComponent::BitcoinPrice),
            transaction_fees: id(EnvironmentComponent::TransactionFees),
            hash_rate: id(EnvironmentComponent::HashRate),
        }
    }

    // ==================== Lock gate ====================

    /// Whether a component may be locked right now.
    ///
    /// The block schedule is lockable as soon as it exists. Every other
    /// forecast additionally needs a locked block schedule and must have
    /// been generated against that exact schedule.
    pub fn lockable(&self, component: EnvironmentComponent) -> bool {
        let Some(record) = self.component(component) else {
            return false;
        };
        if component == EnvironmentComponent::BlockSchedule {
            return true;
        }

        let schedule_id = self.component(EnvironmentComponent::BlockSchedule).map(|s| s.id);
        self.locked.block_schedule && schedule_id.is_some() && record.blocks == schedule_id
    }

    pub fn lockable_flags(&self) -> LockFlags {
        let mut flags = LockFlags::default();
        for component in EnvironmentComponent::ALL {
            flags.set(component, self.lockable(component));
        }
        flags
    }

    pub fn lockable_all(&self) -> bool {
        self.lockable_flags().all()
    }

    pub fn lock(&mut self, component: EnvironmentComponent) -> Result<()> {
        if !self.lockable(component) {
            return Err(TrackerError::NotLockable(component));
        }
        self.locked.set(component, true);
        debug!(%component, "Locked environment component");
        Ok(())
    }

    pub fn unlock(&mut self, component: EnvironmentComponent) {
        self.locked.set(component, false);
    }

    pub fn is_locked(&self, component: EnvironmentComponent) -> bool {
        self.locked.get(component)
    }

    pub fn locked(&self) -> LockFlags {
        self.locked
    }

    pub fn all_locked(&self) -> bool {
        self.locked.all()
    }

    // ==================== Persistence ====================

    /// Load an environment and the four forecasts it references.
    ///
    /// Lock flags are cleared: locks belong to the session, not the record.
    pub async fn load(&mut self, backend: &dyn ObjectBackend, pk: ObjectId) -> Result<&EnvironmentRecord> {
        let value = backend.get_object(&ResourceRef::ENVIRONMENT, &Pk::Int(pk)).await?;
        let record: EnvironmentRecord = serde_json::from_value(value)?;

        let schedule = Pk::Int(record.block_schedule);
        let price = Pk::Int(record.bitcoin_price);
        let fees = Pk::Int(record.transaction_fees);
        let hash_rate = Pk::Int(record.hash_rate);
        tokio::try_join!(
            self.block_schedule.fetch(backend, &schedule),
            self.bitcoin_price.fetch(backend, &price),
            self.transaction_fees.fetch(backend, &fees),
            self.hash_rate.fetch(backend, &hash_rate),
        )?;

        info!(environment = record.id, name = %record.name, "Loaded environment");
        self.locked = LockFlags::default();
        self.name = Some(record.name.clone());
        Ok(&*self.record.insert(record))
    }

    /// Create or update the environment from the held forecasts.
    pub async fn save(&mut self, backend: &dyn ObjectBackend) -> Result<&EnvironmentRecord> {
        let name = self
            .name
            .clone()
            .ok_or_else(|| TrackerError::Invalid("environment name is required".into()))?;

        let mut body = json!({ "name": name });
        for component in EnvironmentComponent::ALL {
            let record = self.component(component).ok_or_else(|| {
                TrackerError::Invalid(format!("{} is required to save an environment", component))
            })?;
            body[component.field()] = json!(record.id);
        }

        let value =
            update_or_create_value(backend, &ResourceRef::ENVIRONMENT, self.id().map(Pk::Int), body).await?;

        let record: EnvironmentRecord = serde_json::from_value(value)?;
        info!(environment = record.id, "Saved environment");
        Ok(&*self.record.insert(record))
    }

    fn store(&self, component: EnvironmentComponent) -> &ObjectStore<ForecastRecord> {
        match component {
            EnvironmentComponent::BlockSchedule => &self.block_schedule,
            EnvironmentComponent::BitcoinPrice => &self.bitcoin_price,
            EnvironmentComponent::TransactionFees => &self.transaction_fees,
            EnvironmentComponent::HashRate => &self.hash_rate,
        }
    }

    fn store_mut(&mut self, component: EnvironmentComponent) -> &mut ObjectStore<ForecastRecord> {
        match component {
            EnvironmentComponent::BlockSchedule => &mut self.block_schedule,
            EnvironmentComponent::BitcoinPrice => &mut self.bitcoin_price,
            EnvironmentComponent::TransactionFees => &mut self.transaction_fees,
            EnvironmentComponent::HashRate => &mut self.hash_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    fn forecast(id: ObjectId, blocks: Option<ObjectId>) -> ForecastRecord {
        ForecastRecord {
            id,
            blocks,
            fields: Default::default(),
        }
    }

    fn populated(price_blocks: Option<ObjectId>) -> EnvironmentAggregate {
        let mut env = EnvironmentAggregate::new();
        env.set_component(EnvironmentComponent::BlockSchedule, Some(forecast(1, None)))
            .unwrap();
        env.set_component(EnvironmentComponent::BitcoinPrice, Some(forecast(2, price_blocks)))
            .unwrap();
        env.set_component(EnvironmentComponent::TransactionFees, Some(forecast(3, Some(1))))
            .unwrap();
        env.set_component(EnvironmentComponent::HashRate, Some(forecast(4, Some(1))))
            .unwrap();
        env
    }

    #[test]
    fn test_block_schedule_gates_other_components() {
        let mut env = populated(Some(1));

        assert!(env.lockable(EnvironmentComponent::BlockSchedule));
        assert!(!env.lockable(EnvironmentComponent::BitcoinPrice));
        assert!(!env.lockable_all());
        assert!(matches!(
            env.lock(EnvironmentComponent::HashRate),
            Err(TrackerError::NotLockable(EnvironmentComponent::HashRate))
        ));

        env.lock(EnvironmentComponent::BlockSchedule).unwrap();
        assert!(env.lockable_all());

        for component in EnvironmentComponent::ALL {
            env.lock(component).unwrap();
        }
        assert!(env.all_locked());
    }

    #[test]
    fn test_mismatched_block_schedule_not_lockable() {
        let mut env = populated(Some(99));
        env.lock(EnvironmentComponent::BlockSchedule).unwrap();

        let lockable = env.lockable_flags();
        assert!(!lockable.bitcoin_price);
        assert!(lockable.transaction_fees);
        assert!(lockable.hash_rate);
        assert!(!env.lockable_all());
    }

    #[test]
    fn test_missing_component_not_lockable() {
        let mut env = populated(Some(1));
        env.set_component(EnvironmentComponent::HashRate, None).unwrap();
        env.lock(EnvironmentComponent::BlockSchedule).unwrap();

        assert!(!env.lockable(EnvironmentComponent::HashRate));
    }

    #[test]
    fn test_locked_component_rejects_edits() {
        let mut env = populated(Some(1));
        env.lock(EnvironmentComponent::BlockSchedule).unwrap();

        let result = env.set_component(EnvironmentComponent::BlockSchedule, Some(forecast(7, None)));
        assert!(matches!(result, Err(TrackerError::ComponentLocked(_))));

        env.unlock(EnvironmentComponent::BlockSchedule);
        env.set_component(EnvironmentComponent::BlockSchedule, Some(forecast(7, None)))
            .unwrap();
        assert_eq!(env.components().block_schedule, Some(7));
    }

    #[tokio::test]
    async fn test_load_fetches_components() {
        let backend = MockBackend::new();
        backend.insert_object(ResourceRef::BLOCK_SCHEDULE, json!({"id": 1, "last_epoch": 4}));
        backend.insert_object(ResourceRef::BITCOIN_PRICE, json!({"id": 2, "blocks": 1}));
        backend.insert_object(ResourceRef::TRANSACTION_FEES, json!({"id": 3, "blocks": 1}));
        backend.insert_object(ResourceRef::HASH_RATE, json!({"id": 4, "blocks": 1}));
        backend.insert_object(
            ResourceRef::ENVIRONMENT,
            json!({
                "id": 10,
                "name": "Halving",
                "block_schedule": 1,
                "bitcoin_price": 2,
                "transaction_fees": 3,
                "hash_rate": 4
            }),
        );

        let mut env = EnvironmentAggregate::new();
        env.load(&backend, 10).await.unwrap();

        assert_eq!(env.id(), Some(10));
        assert_eq!(env.name(), Some("Halving"));
        assert_eq!(
            env.components(),
            ComponentIds {
                block_schedule: Some(1),
                bitcoin_price: Some(2),
                transaction_fees: Some(3),
                hash_rate: Some(4),
            }
        );
        assert!(!env.all_locked());
    }

    #[tokio::test]
    async fn test_save_creates_then_updates() {
        let backend = MockBackend::new();
        let mut env = populated(Some(1));

        assert!(matches!(env.save(&backend).await, Err(TrackerError::Invalid(_))));

        env.set_name("Bear case");
        let id = env.save(&backend).await.unwrap().id;
        assert_eq!(backend.object(ResourceRef::ENVIRONMENT, id).unwrap()["hash_rate"], 4);

        env.set_name("Bear case v2");
        env.save(&backend).await.unwrap();
        assert_eq!(backend.call_count("create:environment/environment"), 1);
        assert_eq!(backend.call_count("update:environment/environment"), 1);
        assert_eq!(env.record().unwrap().name, "Bear case v2");
    }
}
