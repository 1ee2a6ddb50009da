//! Collection provisioning from mapper metadata.
//!
//! Mappers only describe whether their collection is capped; this module is what acts
//! on it, creating missing collections with the matching capped options.

use mongodb::{options::CreateCollectionOptions, sync::Client};
use tracing::{debug, info};

use docmap_core::{
    context::MapperContext,
    entity::EntityType,
    error::{MappingError, MappingResult},
    mapper::{CappedOptions, EntityMapper},
};

/// Creates the collections registered mappers are stored in.
#[derive(Debug, Clone)]
pub struct CollectionProvisioner {
    client: Client,
    database: String,
}

impl CollectionProvisioner {
    pub fn new(client: Client, database: &str) -> Self {
        Self {
            client,
            database: database.to_string(),
        }
    }

    /// Creates collection `name` for `mapper` unless it already exists.
    ///
    /// Returns `true` if the collection was created.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::Initialization`] if the capped options are invalid or the
    /// server rejects the request.
    pub fn provision(&self, name: &str, mapper: &dyn EntityMapper) -> MappingResult<bool> {
        let database = self.client.database(&self.database);
        let existing = database
            .list_collection_names()
            .run()
            .map_err(|e| MappingError::Initialization(e.to_string()))?;

        if existing.iter().any(|collection| collection == name) {
            debug!(collection = name, "Collection already exists");
            return Ok(false);
        }

        let capped = mapper.capped();

        database
            .create_collection(name)
            .with_options(create_options(capped)?)
            .run()
            .map_err(|e| MappingError::Initialization(e.to_string()))?;

        info!(
            collection = name,
            entity = mapper.entity_type().name(),
            capped = capped.is_some(),
            "Created collection"
        );

        Ok(true)
    }

    /// Provisions a collection for every mapper in `context`, named by `collection_name`.
    ///
    /// Returns the names of the collections that were created.
    pub fn provision_all(
        &self,
        context: &MapperContext,
        collection_name: impl Fn(EntityType) -> String,
    ) -> MappingResult<Vec<String>> {
        let mut created = Vec::new();

        for mapper in context.mappers() {
            let name = collection_name(mapper.entity_type());

            if self.provision(&name, &**mapper)? {
                created.push(name);
            }
        }

        Ok(created)
    }
}

/// Translates mapper capped metadata into driver options.
pub(crate) fn create_options(capped: Option<CappedOptions>) -> MappingResult<CreateCollectionOptions> {
    let mut options = CreateCollectionOptions::default();

    if let Some(capped) = capped {
        options.capped = Some(true);
        options.size = Some(
            u64::try_from(capped.size)
                .map_err(|_| MappingError::Initialization(format!("Invalid capped size {}", capped.size)))?,
        );
        if capped.max > 0 {
            options.max = Some(capped.max as u64);
        }
    }

    Ok(options)
}
