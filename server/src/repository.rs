use std::marker::PhantomData;

use agency_store::{Filter, FindQuery, SharedStore, StoredDocument};
use anyhow::Context;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{Record, Reference, Resource};
use crate::pagination::{ListParams, Paginated};
use crate::validation::ValidationError;

const ENVELOPE_FIELDS: &[&str] = &["id", "createdAt", "updatedAt"];

/// Typed access to one resource's collection. Every write goes through the
/// same pipeline: prepare, check against the previous state, validate,
/// resolve references, then a single-document store call.
pub struct Repository<T> {
    store: SharedStore,
    _resource: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _resource: PhantomData,
        }
    }
}

impl<T: Resource> Repository<T> {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            _resource: PhantomData,
        }
    }

    fn decode(doc: StoredDocument) -> ApiResult<Record<T>> {
        let id = doc.id;
        Record::try_from(doc)
            .with_context(|| format!("stored {} {} does not decode", T::NAME, id))
            .map_err(ApiError::Internal)
    }

    fn parse_body(value: Value) -> ApiResult<T> {
        if !value.is_object() {
            return Err(ApiError::bad_request("Request body must be a JSON object"));
        }
        serde_json::from_value(value).map_err(|e| ApiError::bad_request(format!("Invalid {}: {}", T::NAME, e)))
    }

    pub async fn get(&self, id: Uuid) -> ApiResult<Option<Record<T>>> {
        self.store
            .get(&T::COLLECTION, id)
            .await?
            .map(Self::decode)
            .transpose()
    }

    pub async fn get_or_404(&self, id: Uuid) -> ApiResult<Record<T>> {
        self.get(id).await?.ok_or(ApiError::NotFound(T::NAME))
    }

    pub async fn get_many(&self, ids: &[Uuid]) -> ApiResult<Vec<Record<T>>> {
        self.store
            .get_many(&T::COLLECTION, ids)
            .await?
            .into_iter()
            .map(Self::decode)
            .collect()
    }

    pub async fn find_one(&self, filter: &Filter) -> ApiResult<Option<Record<T>>> {
        self.store
            .find_one(&T::COLLECTION, filter)
            .await?
            .map(Self::decode)
            .transpose()
    }

    pub async fn find(&self, query: &FindQuery) -> ApiResult<(Vec<Record<T>>, u64)> {
        let page = self.store.find(&T::COLLECTION, query).await?;
        let records = page
            .documents
            .into_iter()
            .map(Self::decode)
            .collect::<ApiResult<Vec<_>>>()?;
        Ok((records, page.total))
    }

    pub async fn count(&self, filter: &Filter) -> ApiResult<u64> {
        Ok(self.store.count(&T::COLLECTION, filter).await?)
    }

    /// Search, resource filters, default ordering and a clamped window.
    pub async fn list(&self, params: &ListParams, max_limit: u64) -> ApiResult<Paginated<Record<T>>> {
        let window = params.window(max_limit);
        let filter = Filter::search(T::SEARCH_FIELDS, params.term()).and(T::list_filter(params));
        let query = FindQuery::new()
            .with_filter(filter)
            .with_sorts(T::default_sort())
            .with_skip(window.skip)
            .with_limit(window.limit);

        let (items, total) = self.find(&query).await?;
        tracing::debug!("✓ Listed {} {} of {}", items.len(), T::NAME, total);
        Ok(Paginated::new(items, total, window))
    }

    pub async fn create_from_value(&self, value: Value) -> ApiResult<Record<T>> {
        self.create(Self::parse_body(value)?).await
    }

    pub async fn create(&self, mut body: T) -> ApiResult<Record<T>> {
        body.on_create();
        body.prepare()?;
        body.validate()?;
        self.check_references(&body, &[]).await?;

        if let Some(sequence) = T::SEQUENCE {
            let supplied = body
                .display_id_mut()
                .map(|slot| slot.as_deref().is_some_and(|v| !v.trim().is_empty()))
                .unwrap_or(false);
            if !(sequence.keep_supplied && supplied) {
                let n = self.store.next_sequence(T::COLLECTION.name).await?;
                if let Some(slot) = body.display_id_mut() {
                    *slot = Some(sequence.format(n));
                }
            }
        }

        let data = serde_json::to_value(&body).map_err(ApiError::internal)?;
        let doc = self.store.insert(&T::COLLECTION, data).await?;
        tracing::info!("✓ {} created: {}", T::NAME, doc.id);
        Self::decode(doc)
    }

    /// Shallow merge of `changes` over the stored body. Immutable and
    /// envelope fields in `changes` are ignored.
    pub async fn update(&self, id: Uuid, changes: Value) -> ApiResult<Record<T>> {
        let Value::Object(changes) = changes else {
            return Err(ApiError::bad_request("Request body must be a JSON object"));
        };
        let stored = self.stored_or_404(id).await?;

        let mut merged = stored.data.clone();
        if let Value::Object(target) = &mut merged {
            for (key, value) in changes {
                if !T::IMMUTABLE_FIELDS.contains(&key.as_str()) && !ENVELOPE_FIELDS.contains(&key.as_str()) {
                    target.insert(key, value);
                }
            }
        }
        self.revise(stored, merged).await
    }

    /// Applies an RFC 6902 patch to the stored body. Immutable fields are
    /// restored afterwards.
    pub async fn patch(&self, id: Uuid, patch: &json_patch::Patch) -> ApiResult<Record<T>> {
        let stored = self.stored_or_404(id).await?;

        let mut patched = stored.data.clone();
        json_patch::patch(&mut patched, patch)
            .map_err(|e| ApiError::bad_request(format!("Failed to apply patch: {e}")))?;
        if let (Value::Object(target), Value::Object(original)) = (&mut patched, &stored.data) {
            restore_fields(target, original, T::IMMUTABLE_FIELDS);
        }
        self.revise(stored, patched).await
    }

    /// Writes `body` as-is over an existing record, skipping the update
    /// checks. For internal state changes such as workflow transitions.
    pub async fn save(&self, id: Uuid, body: &T) -> ApiResult<Record<T>> {
        let data = serde_json::to_value(body).map_err(ApiError::internal)?;
        let doc = self
            .store
            .replace(&T::COLLECTION, id, data)
            .await?
            .ok_or(ApiError::NotFound(T::NAME))?;
        tracing::info!("✓ {} updated: {}", T::NAME, id);
        Self::decode(doc)
    }

    pub async fn delete(&self, id: Uuid) -> ApiResult<bool> {
        let deleted = self.store.delete(&T::COLLECTION, id).await?;
        if deleted {
            tracing::info!("✓ {} deleted: {}", T::NAME, id);
        }
        Ok(deleted)
    }

    async fn stored_or_404(&self, id: Uuid) -> ApiResult<StoredDocument> {
        self.store
            .get(&T::COLLECTION, id)
            .await?
            .ok_or(ApiError::NotFound(T::NAME))
    }

    async fn revise(&self, stored: StoredDocument, next: Value) -> ApiResult<Record<T>> {
        let previous = Self::decode(stored)?;
        let mut body = Self::parse_body(next)?;
        body.prepare()?;
        body.check_update(&previous.body)?;
        body.validate()?;
        self.check_references(&body, &previous.body.references()).await?;
        self.save(previous.id, &body).await
    }

    /// References already held in `unchanged` are not re-checked, so records
    /// keep working after their target is deleted.
    async fn check_references(&self, body: &T, unchanged: &[Reference]) -> ApiResult<()> {
        for reference in body.references() {
            if unchanged.contains(&reference) {
                continue;
            }
            let found = self.store.get(&reference.collection, reference.id).await?;
            if found.is_none() {
                return Err(ValidationError::new(reference.field, "does not reference an existing record").into());
            }
        }
        Ok(())
    }
}

fn restore_fields(target: &mut Map<String, Value>, original: &Map<String, Value>, fields: &[&str]) {
    for field in fields {
        match original.get(*field) {
            Some(value) => {
                target.insert(field.to_string(), value.clone());
            }
            None => {
                target.remove(*field);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use agency_store::MemoryStore;
    use serde_json::json;

    use super::*;
    use crate::models::{Appointment, Client, Invoice, VisaApplication, VisaStatus};

    fn repo<T: Resource>(store: &SharedStore) -> Repository<T> {
        Repository::new(store.clone())
    }

    fn client_json(email: &str) -> Value {
        json!({
            "firstName": "Jane",
            "lastName": "Doe",
            "email": email,
            "phone": "555-0100",
            "dateOfBirth": "1990-01-01",
            "gender": "female"
        })
    }

    #[tokio::test]
    async fn create_assigns_sequential_display_ids() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let clients = repo::<Client>(&store);

        let first = clients.create_from_value(client_json("a@x.com")).await.unwrap();
        let mut supplied = client_json("b@x.com");
        supplied["clientId"] = json!("CLI-9999");
        let second = clients.create_from_value(supplied).await.unwrap();

        assert_eq!(first.body.client_id.as_deref(), Some("CLI-0001"));
        assert_eq!(second.body.client_id.as_deref(), Some("CLI-0002"));
    }

    #[tokio::test]
    async fn failed_validation_writes_nothing() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let clients = repo::<Client>(&store);

        let mut body = client_json("a@x.com");
        body["lastName"] = json!("");
        let err = clients.create_from_value(body).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref v) if v.field == "lastName"));
        assert_eq!(clients.count(&Filter::all()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn update_merges_and_keeps_immutables() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let clients = repo::<Client>(&store);
        let created = clients.create_from_value(client_json("a@x.com")).await.unwrap();

        let updated = clients
            .update(created.id, json!({ "phone": "555-0199", "clientId": "CLI-7777", "id": "x" }))
            .await
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.body.phone, "555-0199");
        assert_eq!(updated.body.first_name, "Jane");
        assert_eq!(updated.body.client_id, created.body.client_id);
    }

    #[tokio::test]
    async fn update_revalidates() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let clients = repo::<Client>(&store);
        let created = clients.create_from_value(client_json("a@x.com")).await.unwrap();

        let err = clients.update(created.id, json!({ "email": "" })).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        let kept = clients.get_or_404(created.id).await.unwrap();
        assert_eq!(kept.body.email, "a@x.com");
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let clients = repo::<Client>(&store);
        clients.create_from_value(client_json("a@x.com")).await.unwrap();

        let missing = Uuid::new_v4();
        assert!(matches!(clients.update(missing, json!({})).await, Err(ApiError::NotFound("Client"))));
        assert!(!clients.delete(missing).await.unwrap());
        assert_eq!(clients.count(&Filter::all()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn patch_applies_json_patch() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let clients = repo::<Client>(&store);
        let created = clients.create_from_value(client_json("a@x.com")).await.unwrap();

        let patch: json_patch::Patch = serde_json::from_value(json!([
            { "op": "replace", "path": "/lastName", "value": "Smith" },
            { "op": "remove", "path": "/clientId" }
        ]))
        .unwrap();
        let patched = clients.patch(created.id, &patch).await.unwrap();
        assert_eq!(patched.body.last_name, "Smith");
        assert_eq!(patched.body.client_id, created.body.client_id);

        let bad: json_patch::Patch =
            serde_json::from_value(json!([{ "op": "remove", "path": "/nope" }])).unwrap();
        assert!(matches!(clients.patch(created.id, &bad).await, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn references_must_resolve() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let appointments = repo::<Appointment>(&store);

        let err = appointments
            .create_from_value(json!({
                "clientId": Uuid::new_v4().to_string(),
                "provider": "Dr. Khan",
                "date": "2024-06-01",
                "time": "09:00"
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref v) if v.field == "clientId"));
    }

    #[tokio::test]
    async fn dangling_references_survive_updates() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let clients = repo::<Client>(&store);
        let appointments = repo::<Appointment>(&store);
        let client = clients.create_from_value(client_json("a@x.com")).await.unwrap();
        let appt = appointments
            .create_from_value(json!({
                "clientId": client.id.to_string(),
                "provider": "Dr. Khan",
                "date": "2024-06-01",
                "time": "09:00"
            }))
            .await
            .unwrap();
        assert!(clients.delete(client.id).await.unwrap());

        let cancelled = appointments
            .update(appt.id, json!({ "status": "cancelled" }))
            .await
            .unwrap();
        assert_eq!(cancelled.body.client_id, appt.body.client_id);

        let err = appointments
            .update(appt.id, json!({ "clientId": Uuid::new_v4().to_string() }))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref v) if v.field == "clientId"));
    }

    #[tokio::test]
    async fn invoice_numbers_can_be_supplied() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let client = repo::<Client>(&store)
            .create_from_value(client_json("a@x.com"))
            .await
            .unwrap();
        let invoices = repo::<Invoice>(&store);
        let body = |number: Option<&str>| {
            let mut value = json!({
                "clientId": client.id.to_string(),
                "issueDate": "2024-05-01",
                "dueDate": "2024-05-15",
                "items": [{ "description": "Service", "quantity": 1, "unitPrice": "100" }]
            });
            if let Some(number) = number {
                value["invoiceNumber"] = json!(number);
            }
            value
        };

        let custom = invoices.create_from_value(body(Some("ACME-1"))).await.unwrap();
        let assigned = invoices.create_from_value(body(None)).await.unwrap();
        assert_eq!(custom.body.invoice_number.as_deref(), Some("ACME-1"));
        assert_eq!(assigned.body.invoice_number.as_deref(), Some("INV-0001"));

        let err = invoices.create_from_value(body(Some("acme-1"))).await.unwrap_err();
        assert_eq!(err.to_string(), "invoiceNumber already exists");
    }

    #[tokio::test]
    async fn visa_status_ignores_direct_updates() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let client = repo::<Client>(&store)
            .create_from_value(client_json("a@x.com"))
            .await
            .unwrap();
        let visas = repo::<VisaApplication>(&store);
        let created = visas
            .create_from_value(json!({
                "clientId": client.id.to_string(),
                "visaType": "work",
                "destinationCountry": "Germany",
                "status": "approved"
            }))
            .await
            .unwrap();
        assert_eq!(created.body.status, VisaStatus::Draft);
        assert_eq!(created.body.application_number.as_deref(), Some("VA-0001"));

        let updated = visas
            .update(created.id, json!({ "status": "approved", "notes": "n" }))
            .await
            .unwrap();
        assert_eq!(updated.body.status, VisaStatus::Draft);
        assert_eq!(updated.body.notes.as_deref(), Some("n"));
    }
}
