use std::fmt::Display;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use super::client::ApiClient;
use super::models::{Appointment, Client, InventoryItem, Invoice, Vehicle};
use super::pagination::{ListQuery, Page};
use crate::error::ApiError;

/// Backend collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Clients,
    Vehicles,
    Appointments,
    Inventory,
    Invoices,
}

impl Resource {
    pub const ALL: [Resource; 5] = [
        Resource::Clients,
        Resource::Vehicles,
        Resource::Appointments,
        Resource::Inventory,
        Resource::Invoices,
    ];

    /// Collection path relative to the API base URL.
    pub fn path(self) -> &'static str {
        match self {
            Resource::Clients => "clients",
            Resource::Vehicles => "vehicles",
            Resource::Appointments => "appointments",
            Resource::Inventory => "inventory",
            Resource::Invoices => "invoices",
        }
    }

    /// Store key a loaded listing is kept under.
    pub fn state_key(self) -> &'static str {
        self.path()
    }

    /// Whether the backend nests this collection under a client.
    pub fn belongs_to_client(self) -> bool {
        matches!(
            self,
            Resource::Vehicles | Resource::Appointments | Resource::Invoices
        )
    }
}

/// CRUD operations for one collection.
pub struct ResourceService<T> {
    api: ApiClient,
    resource: Resource,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for ResourceService<T> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            resource: self.resource,
            _record: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> ResourceService<T> {
    pub fn new(api: ApiClient, resource: Resource) -> Self {
        Self {
            api,
            resource,
            _record: PhantomData,
        }
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    fn item_path(&self, id: impl Display) -> String {
        format!("{}/{id}", self.resource.path())
    }

    pub async fn list(&self, query: &ListQuery) -> Result<Page<T>, ApiError> {
        let body = self.api.get(self.resource.path(), &query.to_pairs()).await?;
        Page::from_response(body, query)
    }

    /// Records of this collection that belong to `client_id`.
    ///
    /// Only collections nested under clients on the backend support this;
    /// the others fail with [`ApiError::NotNested`] without a request.
    pub async fn list_for_client(
        &self,
        client_id: u64,
        query: &ListQuery,
    ) -> Result<Page<T>, ApiError> {
        if !self.resource.belongs_to_client() {
            return Err(ApiError::NotNested {
                resource: self.resource.path(),
            });
        }
        let path = format!("clients/{client_id}/{}", self.resource.path());
        let body = self.api.get(&path, &query.to_pairs()).await?;
        Page::from_response(body, query)
    }

    pub async fn get(&self, id: u64) -> Result<T, ApiError> {
        let body = self.api.get(&self.item_path(id), &[]).await?;
        decode_record(body)
    }

    pub async fn create(&self, record: &T) -> Result<T, ApiError> {
        let body = self.api.post(self.resource.path(), encode(record)?).await?;
        decode_record(body)
    }

    pub async fn update(&self, id: u64, record: &T) -> Result<T, ApiError> {
        let body = self.api.put(&self.item_path(id), encode(record)?).await?;
        decode_record(body)
    }

    /// Send only `fields` (camelCase keys).
    pub async fn patch(&self, id: u64, fields: Value) -> Result<T, ApiError> {
        let body = self.api.patch(&self.item_path(id), fields).await?;
        decode_record(body)
    }

    pub async fn delete(&self, id: u64) -> Result<(), ApiError> {
        self.api.delete(&self.item_path(id)).await?;
        Ok(())
    }

    /// Change the `status` field of a record.
    pub async fn set_status(&self, id: u64, status: &str) -> Result<T, ApiError> {
        self.patch(id, json!({ "status": status })).await
    }
}

fn encode<T: Serialize>(record: &T) -> Result<Value, ApiError> {
    serde_json::to_value(record).map_err(|err| ApiError::Decode(format!("encoding record: {err}")))
}

/// Single-record responses may come bare or wrapped in `data`.
fn decode_record<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    let body = match body {
        Value::Object(mut fields) if fields.len() == 1 && fields.contains_key("data") => {
            fields.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };
    serde_json::from_value(body).map_err(|err| ApiError::Decode(format!("record: {err}")))
}

/// One service per collection, sharing a client.
#[derive(Clone)]
pub struct Services {
    pub clients: ResourceService<Client>,
    pub vehicles: ResourceService<Vehicle>,
    pub appointments: ResourceService<Appointment>,
    pub inventory: ResourceService<InventoryItem>,
    pub invoices: ResourceService<Invoice>,
}

impl Services {
    pub fn new(api: &ApiClient) -> Self {
        Self {
            clients: ResourceService::new(api.clone(), Resource::Clients),
            vehicles: ResourceService::new(api.clone(), Resource::Vehicles),
            appointments: ResourceService::new(api.clone(), Resource::Appointments),
            inventory: ResourceService::new(api.clone(), Resource::Inventory),
            invoices: ResourceService::new(api.clone(), Resource::Invoices),
        }
    }
}
