use std::collections::HashSet;
use std::sync::Arc;

use crate::config::EntityResolverConfig;
use crate::error::Result;
use crate::model::{Entity, EntityType, Metadata};
use crate::stores::{IndexedDoc, SearchIndex, SearchQueryOpts};

/// A resolved link from a pre-existing entity to one just extracted in
/// this batch, produced by [`EntityResolver::resolve`]. The caller
/// (normally [`crate::write::MemoryWriter`]) is responsible for
/// materialising it as a `RelatedTo` graph edge once both endpoint
/// nodes exist — the resolver itself never writes to the graph, so it
/// has no ordering dependency on when the new entity's node is
/// created.
#[derive(Debug, Clone)]
pub struct EntityLink {
    pub existing_id: String,
    pub new_id: String,
    pub similarity: f64,
}

/// Output of [`EntityResolver::resolve`].
#[derive(Debug, Clone)]
pub struct ResolvedEntities {
    pub entities: Vec<Entity>,
    pub links: Vec<EntityLink>,
}

/// Intra-batch dedup + cross-batch linking against existing memory
/// (§4.4, C5).
pub struct EntityResolver {
    config: EntityResolverConfig,
    search_index: Arc<dyn SearchIndex>,
}

impl EntityResolver {
    pub fn new(config: EntityResolverConfig, search_index: Arc<dyn SearchIndex>) -> Self {
        Self {
            config,
            search_index,
        }
    }

    /// `sim(e1,e2) = 0.7*nameSim + 0.3*typeSim`.
    pub fn similarity(&self, a_name: &str, a_type: &EntityType, b_name: &str, b_type: &EntityType) -> f64 {
        let name_sim = name_similarity(a_name, b_name);
        let type_sim = if a_type == b_type { 1.0 } else { 0.0 };
        0.7 * name_sim + 0.3 * type_sim
    }

    pub async fn resolve(&self, entities: Vec<Entity>) -> Result<ResolvedEntities> {
        let deduped = self.dedup_intra_batch(entities);
        self.link_cross_batch(deduped).await
    }

    fn dedup_intra_batch(&self, entities: Vec<Entity>) -> Vec<Entity> {
        let mut survivors: Vec<Entity> = Vec::with_capacity(entities.len());
        'outer: for candidate in entities {
            for existing in survivors.iter_mut() {
                let sim = self.similarity(
                    &candidate.name,
                    &candidate.entity_type,
                    &existing.name,
                    &existing.entity_type,
                );
                if sim > self.config.similarity_threshold {
                    if candidate.confidence > existing.confidence {
                        existing.confidence = candidate.confidence;
                        existing.name = candidate.name.clone();
                    }
                    for (k, v) in candidate.properties {
                        existing.properties.entry(k).or_insert(v);
                    }
                    continue 'outer;
                }
            }
            survivors.push(candidate);
        }
        survivors
    }

    async fn link_cross_batch(&self, entities: Vec<Entity>) -> Result<ResolvedEntities> {
        let mut resolved = Vec::with_capacity(entities.len());
        let mut links = Vec::new();

        for mut entity in entities {
            let mut filters = Metadata::new();
            filters.insert("type".into(), serde_json::json!("entity"));
            let opts = SearchQueryOpts {
                limit: self.config.max_candidates,
                offset: 0,
                filters,
                highlight: false,
            };
            let hits = self
                .search_index
                .search(&entity.name, &opts)
                .await
                .map_err(|e| crate::error::MemoryError::persistence("search_index", e))?;

            let mut best: Option<(f64, String)> = None;
            for hit in &hits {
                if hit.id == entity.id {
                    continue;
                }
                let hit_type = hit
                    .metadata
                    .get("entity_type")
                    .and_then(|v| v.as_str())
                    .map(entity_type_from_str)
                    .unwrap_or(EntityType::Concept);
                let sim = self.similarity(&entity.name, &entity.entity_type, &hit.content, &hit_type);
                if sim > self.config.similarity_threshold
                    && best.as_ref().is_none_or(|(best_sim, _)| sim > *best_sim)
                {
                    best = Some((sim, hit.id.clone()));
                }
            }

            if let Some((sim, existing_id)) = best {
                entity.confidence = (entity.confidence.max(sim) + self.config.link_boost).min(1.0);
                links.push(EntityLink {
                    existing_id,
                    new_id: entity.id.clone(),
                    similarity: sim,
                });
            } else {
                // No existing match: index this entity so future
                // batches can discover and link to it.
                let mut metadata = Metadata::new();
                metadata.insert("type".into(), serde_json::json!("entity"));
                metadata.insert("entity_type".into(), serde_json::json!(entity.entity_type.to_string()));
                self.search_index
                    .index(IndexedDoc {
                        id: entity.id.clone(),
                        content: entity.name.clone(),
                        metadata,
                    })
                    .await
                    .map_err(|e| crate::error::MemoryError::persistence("search_index", e))?;
            }

            resolved.push(entity);
        }

        Ok(ResolvedEntities {
            entities: resolved,
            links,
        })
    }
}

fn entity_type_from_str(s: &str) -> EntityType {
    match s.to_uppercase().as_str() {
        "PERSON" => EntityType::Person,
        "ORGANIZATION" => EntityType::Organization,
        "LOCATION" => EntityType::Location,
        "DATE" => EntityType::Date,
        "NUMBER" => EntityType::Number,
        "EMAIL" => EntityType::Email,
        "URL" => EntityType::Url,
        "PHONE" => EntityType::Phone,
        "CONCEPT" => EntityType::Concept,
        other => EntityType::Custom(other.to_string()),
    }
}

fn bigrams(s: &str) -> HashSet<String> {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() < 2 {
        return [s.to_string()].into_iter().collect();
    }
    chars.windows(2).map(|w| w.iter().collect()).collect()
}

/// Jaccard similarity over character bigrams of lowercased-trimmed
/// names; exact match short-circuits to 1.0.
fn name_similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a == b {
        return 1.0;
    }
    let (ga, gb) = (bigrams(&a), bigrams(&b));
    if ga.is_empty() || gb.is_empty() {
        return 0.0;
    }
    let intersection = ga.intersection(&gb).count();
    let union = ga.union(&gb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::InMemorySearchIndex;

    fn resolver() -> EntityResolver {
        EntityResolver::new(EntityResolverConfig::default(), Arc::new(InMemorySearchIndex::new()))
    }

    #[test]
    fn exact_name_match_has_similarity_one() {
        assert_eq!(name_similarity("Smith", "smith"), 1.0);
    }

    #[test]
    fn different_type_lowers_similarity() {
        let r = resolver();
        let same_type = r.similarity("Smith", &EntityType::Person, "Smith", &EntityType::Person);
        let diff_type = r.similarity("Smith", &EntityType::Person, "Smith", &EntityType::Organization);
        assert!(same_type > diff_type);
    }

    #[tokio::test]
    async fn intra_batch_dedup_collapses_near_duplicates() {
        let r = resolver();
        let entities = vec![
            Entity::new("Smith", EntityType::Person, 0.6, "s1"),
            Entity::new("smith", EntityType::Person, 0.9, "s1"),
        ];
        let resolved = r.resolve(entities).await.unwrap();
        assert_eq!(resolved.entities.len(), 1);
        assert_eq!(resolved.entities[0].confidence, 0.9);
    }

    #[tokio::test]
    async fn no_two_resolved_entities_exceed_similarity_threshold() {
        let r = resolver();
        let entities = vec![
            Entity::new("Alice", EntityType::Person, 0.8, "s1"),
            Entity::new("Bob", EntityType::Person, 0.8, "s1"),
            Entity::new("alice", EntityType::Person, 0.7, "s1"),
        ];
        let resolved = r.resolve(entities).await.unwrap();
        for i in 0..resolved.entities.len() {
            for j in (i + 1)..resolved.entities.len() {
                let sim = r.similarity(
                    &resolved.entities[i].name,
                    &resolved.entities[i].entity_type,
                    &resolved.entities[j].name,
                    &resolved.entities[j].entity_type,
                );
                assert!(sim <= EntityResolverConfig::default().similarity_threshold);
            }
        }
    }

    #[tokio::test]
    async fn second_batch_links_to_first_batch_entity() {
        let r = resolver();
        let first = r
            .resolve(vec![Entity::new("Acme Inc", EntityType::Organization, 0.9, "s1")])
            .await
            .unwrap();
        assert!(first.links.is_empty());

        let second = r
            .resolve(vec![Entity::new("Acme Inc", EntityType::Organization, 0.8, "s2")])
            .await
            .unwrap();
        assert_eq!(second.links.len(), 1);
    }
}
