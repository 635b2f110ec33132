//! Project group: the set of projects compared against one environment.

use drillbit_client::{CreateShape, ObjectId, Pk, ResourceRef};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::backend::{ActionMethod, ObjectBackend};
use crate::error::{Result, TrackerError};
use crate::model::{ProjectGroupRecord, ProjectRecord};
use crate::store::{single_created, update_or_create_value};

/// Group as the backend reads it back: membership expanded to full projects.
#[derive(Debug, Deserialize)]
struct GroupPayload {
    id: ObjectId,
    name: String,
    #[serde(default)]
    projects: Vec<ProjectRecord>,
}

/// A named, ordered set of unique projects.
#[derive(Debug, Clone, Default)]
pub struct ProjectGroup {
    record: Option<ProjectGroupRecord>,
    name: Option<String>,
    projects: Vec<ProjectRecord>,
}

impl ProjectGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> Option<ObjectId> {
        self.record.as_ref().map(|r| r.id)
    }

    pub fn record(&self) -> Option<&ProjectGroupRecord> {
        self.record.as_ref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn projects(&self) -> &[ProjectRecord] {
        &self.projects
    }

    pub fn project(&self, id: ObjectId) -> Option<&ProjectRecord> {
        self.projects.iter().find(|p| p.id == id)
    }

    /// Member ids in insertion order.
    pub fn project_ids(&self) -> Vec<ObjectId> {
        self.projects.iter().map(|p| p.id).collect()
    }

    /// Add a member. Returns false if it was already present.
    pub fn add_project(&mut self, project: ProjectRecord) -> bool {
        if self.project(project.id).is_some() {
            return false;
        }
        self.projects.push(project);
        true
    }

    pub fn remove_project(&mut self, id: ObjectId) -> bool {
        let before = self.projects.len();
        self.projects.retain(|p| p.id != id);
        self.projects.len() != before
    }

    // ==================== Project CRUD ====================

    /// Create a project and add it to the group.
    pub async fn create_project(&mut self, backend: &dyn ObjectBackend, body: Value) -> Result<&ProjectRecord> {
        let value = single_created(
            backend
                .create_object(&ResourceRef::PROJECT, body, CreateShape::One)
                .await?,
        )?;
        let project: ProjectRecord = serde_json::from_value(value)?;
        info!(project = project.id, "Created project");
        Ok(self.replace(project))
    }

    pub async fn update_project(
        &mut self,
        backend: &dyn ObjectBackend,
        id: ObjectId,
        body: Value,
    ) -> Result<&ProjectRecord> {
        let value = backend.update_object(&ResourceRef::PROJECT, &Pk::Int(id), body).await?;
        Ok(self.replace(serde_json::from_value(value)?))
    }

    /// Delete a project and drop it from the group.
    pub async fn delete_project(&mut self, backend: &dyn ObjectBackend, id: ObjectId) -> Result<bool> {
        let deleted = backend.delete_object(&ResourceRef::PROJECT, &Pk::Int(id)).await?;
        self.remove_project(id);
        Ok(deleted)
    }

    /// Ask the backend to rescale a project and keep the rescaled record.
    pub async fn scale_project(&mut self, backend: &dyn ObjectBackend, id: ObjectId) -> Result<&ProjectRecord> {
        let value = backend
            .object_action(&ResourceRef::PROJECT, &Pk::Int(id), "scale", ActionMethod::Put)
            .await?;
        debug!(project = id, "Scaled project");
        Ok(self.replace(serde_json::from_value(value)?))
    }

    pub async fn project_costs(&self, backend: &dyn ObjectBackend, id: ObjectId) -> Result<Value> {
        Ok(backend
            .object_action(&ResourceRef::PROJECT, &Pk::Int(id), "costs", ActionMethod::Get)
            .await?)
    }

    // ==================== Persistence ====================

    pub async fn load(&mut self, backend: &dyn ObjectBackend, pk: ObjectId) -> Result<&ProjectGroupRecord> {
        let value = backend.get_object(&ResourceRef::PROJECT_GROUP, &Pk::Int(pk)).await?;
        Ok(self.apply(serde_json::from_value(value)?))
    }

    /// Create or update the group as `{name, project_ids}`.
    pub async fn save(&mut self, backend: &dyn ObjectBackend) -> Result<&ProjectGroupRecord> {
        let name = self
            .name
            .clone()
            .ok_or_else(|| TrackerError::Invalid("project group name is required".into()))?;
        let body = json!({ "name": name, "project_ids": self.project_ids() });

        let value =
            update_or_create_value(backend, &ResourceRef::PROJECT_GROUP, self.id().map(Pk::Int), body).await?;
        Ok(self.apply(serde_json::from_value(value)?))
    }

    fn apply(&mut self, payload: GroupPayload) -> &ProjectGroupRecord {
        info!(group = payload.id, projects = payload.projects.len(), "Loaded project group");
        self.name = Some(payload.name.clone());
        self.projects.clear();
        for project in payload.projects {
            self.add_project(project);
        }
        self.record.insert(ProjectGroupRecord {
            id: payload.id,
            name: payload.name,
        })
    }

    fn replace(&mut self, project: ProjectRecord) -> &ProjectRecord {
        let index = match self.projects.iter().position(|p| p.id == project.id) {
            Some(index) => {
                self.projects[index] = project;
                index
            }
            None => {
                self.projects.push(project);
                self.projects.len() - 1
            }
        };
        &self.projects[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    fn project(id: ObjectId) -> ProjectRecord {
        ProjectRecord {
            id,
            name: format!("P{}", id),
            fields: Default::default(),
        }
    }

    #[test]
    fn test_project_ids_unique_in_order() {
        let mut group = ProjectGroup::new();
        assert!(group.add_project(project(3)));
        assert!(group.add_project(project(1)));
        assert!(!group.add_project(project(3)));

        assert_eq!(group.project_ids(), vec![3, 1]);
        assert!(group.remove_project(3));
        assert!(!group.remove_project(3));
        assert_eq!(group.project_ids(), vec![1]);
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip_membership() {
        let backend = MockBackend::new();
        backend.insert_object(ResourceRef::PROJECT, json!({"id": 5, "name": "Texas"}));
        backend.insert_object(ResourceRef::PROJECT, json!({"id": 6, "name": "Quebec"}));

        let mut group = ProjectGroup::new();
        group.set_name("North America");
        group.add_project(project(6));
        group.add_project(project(5));
        let id = group.save(&backend).await.unwrap().id;

        let mut loaded = ProjectGroup::new();
        loaded.load(&backend, id).await.unwrap();
        assert_eq!(loaded.name(), Some("North America"));
        assert_eq!(loaded.project_ids(), vec![6, 5]);
        assert_eq!(loaded.project(5).unwrap().name, "Texas");
    }

    #[tokio::test]
    async fn test_project_crud_keeps_membership_in_sync() {
        let backend = MockBackend::new();
        let mut group = ProjectGroup::new();

        let id = group
            .create_project(&backend, json!({"name": "Norway", "capacity_mw": 20}))
            .await
            .unwrap()
            .id;
        assert_eq!(group.project_ids(), vec![id]);

        let updated = group
            .update_project(&backend, id, json!({"name": "Norway II"}))
            .await
            .unwrap();
        assert_eq!(updated.name, "Norway II");
        assert_eq!(group.projects().len(), 1);

        group.scale_project(&backend, id).await.unwrap();
        assert_eq!(backend.call_count("action:projects/project"), 1);

        let costs = group.project_costs(&backend, id).await.unwrap();
        assert_eq!(costs["action"], "costs");

        assert!(group.delete_project(&backend, id).await.unwrap());
        assert!(group.project_ids().is_empty());
    }

    #[tokio::test]
    async fn test_save_requires_name() {
        let backend = MockBackend::new();
        let mut group = ProjectGroup::new();
        assert!(matches!(group.save(&backend).await, Err(TrackerError::Invalid(_))));
    }
}
