use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use std::error::Error;

#[derive(Clone)]
pub struct MongoDB {
    client: Client,
    db: Database,
}

impl MongoDB {
    pub async fn new(uri: &str, database: &str) -> Result<Self, Box<dyn Error>> {
        let mut client_options = mongodb::options::ClientOptions::parse(uri).await?;

        // Connection pool tuned for a single service process
        client_options.max_pool_size = Some(20);
        client_options.min_pool_size = Some(5);
        client_options.max_idle_time = Some(std::time::Duration::from_secs(300));

        client_options.connect_timeout = Some(std::time::Duration::from_secs(5));
        client_options.server_selection_timeout = Some(std::time::Duration::from_secs(5));

        let client = Client::with_options(client_options)?;
        let db = client.database(database);

        // Test connection
        db.list_collection_names().await?;

        let mongodb = Self { client, db };

        mongodb.ensure_indexes().await?;

        Ok(mongodb)
    }

    /// Creates the indexes the service relies on. The unique indexes on
    /// `users.email` / `users.username` back the 409 uniqueness checks so a
    /// duplicate can never slip in between check and insert.
    async fn ensure_indexes(&self) -> Result<(), Box<dyn Error>> {
        log::info!("Creating database indexes...");

        let users = self.db.collection::<mongodb::bson::Document>("users");

        let email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        match users.create_index(email_index).await {
            Ok(_) => log::info!("   Index created: users(email) unique"),
            Err(e) => log::debug!("   Index already exists: {}", e),
        }

        let username_index = IndexModel::builder()
            .keys(doc! { "username": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        match users.create_index(username_index).await {
            Ok(_) => log::info!("   Index created: users(username) unique"),
            Err(e) => log::debug!("   Index already exists: {}", e),
        }

        // catalog(code) - public lookup key for titles
        let catalog = self.db.collection::<mongodb::bson::Document>("catalog");

        let code_index = IndexModel::builder().keys(doc! { "code": 1 }).build();

        match catalog.create_index(code_index).await {
            Ok(_) => log::info!("   Index created: catalog(code)"),
            Err(e) => log::debug!("   Index already exists: {}", e),
        }

        // titles_genres(title_code) - genre bridge lookups during filtering
        let bridge = self.db.collection::<mongodb::bson::Document>("titles_genres");

        let bridge_index = IndexModel::builder()
            .keys(doc! { "title_code": 1 })
            .build();

        match bridge.create_index(bridge_index).await {
            Ok(_) => log::info!("   Index created: titles_genres(title_code)"),
            Err(e) => log::debug!("   Index already exists: {}", e),
        }

        // reviews(catalog_id) - per-title review listing
        let reviews = self.db.collection::<mongodb::bson::Document>("reviews");

        let reviews_index = IndexModel::builder()
            .keys(doc! { "catalog_id": 1 })
            .build();

        match reviews.create_index(reviews_index).await {
            Ok(_) => log::info!("   Index created: reviews(catalog_id)"),
            Err(e) => log::debug!("   Index already exists: {}", e),
        }

        log::info!("Database indexes ready");

        Ok(())
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_connection() {
        dotenv::dotenv().ok();

        let uri = std::env::var("URI").unwrap_or_else(|_| "mongodb://localhost:27017/".to_string());
        let client = MongoDB::new(uri.trim(), "karenflix_test").await;
        assert!(client.is_ok());
    }
}
