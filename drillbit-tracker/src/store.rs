//! Owned record store for one REST collection.
//!
//! Holds the "current" record and the last fetched list of a collection,
//! so views can edit locally and push back with a single bulk update.

use drillbit_client::{CreateShape, Created, Pk, ResourceRef};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::backend::ObjectBackend;
use crate::error::{Result, TrackerError};
use crate::model::HasId;

/// Records of one collection, fetched through an [`ObjectBackend`].
#[derive(Debug, Clone)]
pub struct ObjectStore<T> {
    resource: ResourceRef,
    object: Option<T>,
    objects: Vec<T>,
}

impl<T> ObjectStore<T>
where
    T: HasId + Serialize + DeserializeOwned,
{
    pub fn new(resource: ResourceRef) -> Self {
        Self {
            resource,
            object: None,
            objects: Vec::new(),
        }
    }

    pub fn resource(&self) -> &ResourceRef {
        &self.resource
    }

    pub fn object(&self) -> Option<&T> {
        self.object.as_ref()
    }

    pub fn objects(&self) -> &[T] {
        &self.objects
    }

    pub fn has_object(&self) -> bool {
        self.object.is_some()
    }

    pub fn has_objects(&self) -> bool {
        !self.objects.is_empty()
    }

    pub fn set_object(&mut self, object: Option<T>) {
        self.object = object;
    }

    pub fn set_objects(&mut self, objects: Vec<T>) {
        self.objects = objects;
    }

    pub fn find_by_id(&self, id: i64) -> Option<&T> {
        self.objects.iter().find(|o| o.id() == id)
    }

    /// Replace the list with the server's collection.
    pub async fn fetch_all(&mut self, backend: &dyn ObjectBackend) -> Result<&[T]> {
        let values = backend.list_objects(&self.resource).await?;
        self.objects = decode_all(values)?;
        Ok(self.objects.as_slice())
    }

    /// Load one record as the current object.
    pub async fn fetch(&mut self, backend: &dyn ObjectBackend, pk: &Pk) -> Result<&T> {
        let value = backend.get_object(&self.resource, pk).await?;
        Ok(&*self.object.insert(serde_json::from_value(value)?))
    }

    /// Create records. A single result becomes the current object, a list
    /// replaces `objects`.
    pub async fn create(
        &mut self,
        backend: &dyn ObjectBackend,
        body: Value,
        shape: CreateShape,
    ) -> Result<Created<&T>> {
        match backend.create_object(&self.resource, body, shape).await? {
            Created::One(value) => {
                let object = self.object.insert(serde_json::from_value(value)?);
                Ok(Created::One(&*object))
            }
            Created::Many(values) => {
                self.objects = decode_all(values)?;
                Ok(Created::Many(self.objects.iter().collect()))
            }
        }
    }

    /// Replace one record and make it current.
    pub async fn update(&mut self, backend: &dyn ObjectBackend, pk: &Pk, body: Value) -> Result<&T> {
        let value = backend.update_object(&self.resource, pk, body).await?;
        Ok(&*self.object.insert(serde_json::from_value(value)?))
    }

    /// Push the whole local list back with one bulk update.
    pub async fn update_all(&mut self, backend: &dyn ObjectBackend) -> Result<&[T]> {
        let items = self
            .objects
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let values = backend.bulk_update(&self.resource, items).await?;
        self.objects = decode_all(values)?;
        Ok(self.objects.as_slice())
    }

    /// Update when `pk` is known, otherwise create a single record.
    pub async fn update_or_create(
        &mut self,
        backend: &dyn ObjectBackend,
        pk: Option<Pk>,
        body: Value,
    ) -> Result<&T> {
        let value = update_or_create_value(backend, &self.resource, pk, body).await?;
        Ok(&*self.object.insert(serde_json::from_value(value)?))
    }
}

/// The record returned by a create endpoint documented to return one object.
pub(crate) fn single_created(created: Created<Value>) -> Result<Value> {
    created
        .into_vec()
        .pop()
        .ok_or_else(|| TrackerError::Invalid("empty create response".into()))
}

/// `PUT` when `pk` is known, otherwise `POST` a single record.
pub(crate) async fn update_or_create_value(
    backend: &dyn ObjectBackend,
    resource: &ResourceRef,
    pk: Option<Pk>,
    body: Value,
) -> Result<Value> {
    match pk {
        Some(pk) => Ok(backend.update_object(resource, &pk, body).await?),
        None => single_created(backend.create_object(resource, body, CreateShape::One).await?),
    }
}

fn decode_all<T: DeserializeOwned>(values: Vec<Value>) -> Result<Vec<T>> {
    Ok(values
        .into_iter()
        .map(serde_json::from_value)
        .collect::<std::result::Result<Vec<T>, _>>()?)
}
