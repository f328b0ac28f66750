use crate::types::{DocumentId, SerializableDateTime};
use bson::Document as BsonDocument;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Metadata {
    pub created_at: SerializableDateTime,
    pub updated_at: SerializableDateTime,
}

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        let now = SerializableDateTime::now();
        Self { created_at: now.clone(), updated_at: now }
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}

/// A stored record: bson payload plus engine-managed id and timestamps.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub data: BsonDocument,
    pub metadata: Metadata,
}

impl Document {
    #[must_use]
    pub fn new(data: BsonDocument) -> Self {
        Self { id: DocumentId::new(), data, metadata: Metadata::new() }
    }

    pub fn update(&mut self, new_data: BsonDocument) {
        self.data = new_data;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.metadata.updated_at = SerializableDateTime::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn update_replaces_payload_and_bumps_timestamp() {
        let mut d = Document::new(doc! {"title": "Emma"});
        let created = d.metadata.created_at.clone();
        d.update(doc! {"title": "Persuasion"});
        assert_eq!(d.data.get("title"), Some(&bson::Bson::String("Persuasion".into())));
        assert_eq!(d.metadata.created_at, created);
        assert!(d.metadata.updated_at.0 >= created.0);
    }
}
