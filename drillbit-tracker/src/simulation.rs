//! Environment × project pairs that need statements.

use drillbit_client::ObjectId;
use serde::{Deserialize, Serialize};

use crate::environment::EnvironmentAggregate;
use crate::error::{Result, TrackerError};
use crate::project::ProjectGroup;

/// One (environment, project) pairing to simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SimulationKey {
    pub environment_id: ObjectId,
    pub project_id: ObjectId,
}

/// Pair the loaded environment with every project in the group, in group order.
pub fn resolve_simulations(
    environment: &EnvironmentAggregate,
    group: &ProjectGroup,
) -> Result<Vec<SimulationKey>> {
    let environment_id = environment.id().ok_or(TrackerError::EnvironmentNotLoaded)?;
    group.id().ok_or(TrackerError::ProjectGroupNotLoaded)?;

    let keys: Vec<SimulationKey> = group
        .project_ids()
        .into_iter()
        .map(|project_id| SimulationKey {
            environment_id,
            project_id,
        })
        .collect();

    if keys.is_empty() {
        return Err(TrackerError::EmptySimulationSet);
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use drillbit_client::ResourceRef;
    use serde_json::json;

    async fn loaded(projects: &[ObjectId]) -> (EnvironmentAggregate, ProjectGroup) {
        let backend = MockBackend::new();
        for (id, resource) in [
            (1, ResourceRef::BLOCK_SCHEDULE),
            (2, ResourceRef::BITCOIN_PRICE),
            (3, ResourceRef::TRANSACTION_FEES),
            (4, ResourceRef::HASH_RATE),
        ] {
            backend.insert_object(resource, json!({"id": id, "blocks": 1}));
        }
        backend.insert_object(
            ResourceRef::ENVIRONMENT,
            json!({"id": 9, "name": "E", "block_schedule": 1, "bitcoin_price": 2,
                   "transaction_fees": 3, "hash_rate": 4}),
        );
        for id in projects {
            backend.insert_object(ResourceRef::PROJECT, json!({"id": id, "name": "P"}));
        }
        backend.insert_object(
            ResourceRef::PROJECT_GROUP,
            json!({"id": 50, "name": "G", "project_ids": projects}),
        );

        let mut env = EnvironmentAggregate::new();
        env.load(&backend, 9).await.unwrap();
        let mut group = ProjectGroup::new();
        group.load(&backend, 50).await.unwrap();
        (env, group)
    }

    #[tokio::test]
    async fn test_one_pair_per_project() {
        let (env, group) = loaded(&[21, 22]).await;
        let keys = resolve_simulations(&env, &group).unwrap();
        assert_eq!(
            keys,
            vec![
                SimulationKey { environment_id: 9, project_id: 21 },
                SimulationKey { environment_id: 9, project_id: 22 },
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_group_fails() {
        let (env, group) = loaded(&[]).await;
        assert!(matches!(
            resolve_simulations(&env, &group),
            Err(TrackerError::EmptySimulationSet)
        ));
    }

    #[test]
    fn test_preconditions_fail_fast() {
        let env = EnvironmentAggregate::new();
        let group = ProjectGroup::new();
        assert!(matches!(
            resolve_simulations(&env, &group),
            Err(TrackerError::EnvironmentNotLoaded)
        ));
    }

    #[tokio::test]
    async fn test_group_must_be_loaded() {
        let (env, _) = loaded(&[21]).await;
        assert!(matches!(
            resolve_simulations(&env, &ProjectGroup::new()),
            Err(TrackerError::ProjectGroupNotLoaded)
        ));
    }
}
