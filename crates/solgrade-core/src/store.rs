//! Persistence for projects and execution history
//!
//! The runner owns two collections: `projects` (current image metadata per
//! project) and `container_executions` (append-only invocation history).
//! The trait keeps the pipeline testable without a running database.

use crate::{ContainerExecution, Project, Result};
use async_trait::async_trait;
use bson::doc;
use futures::TryStreamExt;
use mongodb::{Client, Collection, Database};

/// Storage seam for the runner's domain records.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Insert or replace the project record (build-replace critical section).
    async fn upsert_project(&self, project: &Project) -> Result<()>;

    async fn project(&self, name: &str) -> Result<Option<Project>>;

    /// Remove the project record; returns whether one existed.
    async fn delete_project(&self, name: &str) -> Result<bool>;

    async fn list_projects(&self) -> Result<Vec<Project>>;

    /// Append one sealed execution record.
    async fn record_execution(&self, execution: &ContainerExecution) -> Result<()>;

    async fn execution(&self, id: &str) -> Result<Option<ContainerExecution>>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<()>;
}

/// MongoDB-backed repository.
pub struct MongoRepository {
    db: Database,
}

impl MongoRepository {
    /// Connect to the configured deployment and select the database.
    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        Ok(Self {
            db: client.database(database),
        })
    }

    fn projects(&self) -> Collection<Project> {
        self.db.collection("projects")
    }

    fn executions(&self) -> Collection<ContainerExecution> {
        self.db.collection("container_executions")
    }
}

#[async_trait]
impl Repository for MongoRepository {
    async fn upsert_project(&self, project: &Project) -> Result<()> {
        self.projects()
            .replace_one(doc! { "name": &project.name }, project)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn project(&self, name: &str) -> Result<Option<Project>> {
        Ok(self.projects().find_one(doc! { "name": name }).await?)
    }

    async fn delete_project(&self, name: &str) -> Result<bool> {
        let result = self.projects().delete_one(doc! { "name": name }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let cursor = self.projects().find(doc! {}).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn record_execution(&self, execution: &ContainerExecution) -> Result<()> {
        self.executions().insert_one(execution).await?;
        Ok(())
    }

    async fn execution(&self, id: &str) -> Result<Option<ContainerExecution>> {
        Ok(self.executions().find_one(doc! { "_id": id }).await?)
    }

    async fn ping(&self) -> Result<()> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}
