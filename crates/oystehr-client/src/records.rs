//! Record-store CRUD routed through the batcher.
//!
//! Each call becomes one entry of a batch bundle, so many concurrent calls
//! cost one HTTP request per drain instead of one each.

use oystehr_domain::bundle::{Method, Operation};
use oystehr_transport::Transport;
use serde_json::Value;

use crate::batch::BatchClient;
use crate::error::{ClientError, ClientResult};

/// Create, read, update and delete for record resources.
pub struct RecordClient<T: Transport> {
    batch: BatchClient<T>,
}

impl<T: Transport> Clone for RecordClient<T> {
    fn clone(&self) -> Self {
        Self {
            batch: self.batch.clone(),
        }
    }
}

impl<T: Transport> RecordClient<T> {
    pub fn new(batch: BatchClient<T>) -> Self {
        Self { batch }
    }

    /// Returns the underlying batcher.
    pub fn batcher(&self) -> &BatchClient<T> {
        &self.batch
    }

    /// Creates a resource and returns it as stored (with id and version).
    pub async fn create(&self, resource_type: &str, resource: Value) -> ClientResult<Value> {
        let operation = Operation::new(Method::Post, resource_type).with_body(resource);
        self.run(format!("create {resource_type}"), operation).await
    }

    pub async fn read(&self, resource_type: &str, id: &str) -> ClientResult<Value> {
        let operation = Operation::new(Method::Get, format!("{resource_type}/{id}"));
        self.run(format!("read {resource_type}/{id}"), operation)
            .await
    }

    /// Replaces a resource.
    ///
    /// With `version_id` set, the update only applies if the stored resource
    /// still has that version; otherwise the entry fails with 412.
    pub async fn update(
        &self,
        resource_type: &str,
        id: &str,
        resource: Value,
        version_id: Option<&str>,
    ) -> ClientResult<Value> {
        let mut operation =
            Operation::new(Method::Put, format!("{resource_type}/{id}")).with_body(resource);
        if let Some(version) = version_id {
            operation = operation.with_if_match(version);
        }
        self.run(format!("update {resource_type}/{id}"), operation)
            .await
    }

    pub async fn delete(&self, resource_type: &str, id: &str) -> ClientResult<()> {
        let operation = Operation::new(Method::Delete, format!("{resource_type}/{id}"));
        self.run(format!("delete {resource_type}/{id}"), operation)
            .await
            .map(|_| ())
    }

    async fn run(&self, context: String, operation: Operation) -> ClientResult<Value> {
        self.batch
            .submit(operation)
            .await
            .map_err(|e| ClientError::batch(context, e))
    }
}
