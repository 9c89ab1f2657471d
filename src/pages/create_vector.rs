use parking_lot::{ Mutex, RwLock };
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use log::{ debug, info, warn };

use super::RequestSequence;
use crate::backend::ConsoleBackend;
use crate::error::ConsoleError;
use crate::notification::NotificationCenter;
use crate::schema::{
    blank_drafts,
    filter_described,
    Confidentiality,
    CreateVectorRequest,
    ExcludedTables,
    FieldDescription,
    FieldDescriptions,
    SchemaStats,
    TableSchema,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SchemaState {
    #[default]
    Idle,
    Loading,
    Loaded(TableSchema),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SubmitState {
    #[default]
    Idle,
    Submitting,
    Submitted(Value),
    Failed(String),
}

#[derive(Default)]
struct CreateVectorState {
    collection_name: String,
    manual_input: bool,
    schema: SchemaState,
    submit: SubmitState,
    expanded_tables: HashSet<String>,
    field_descriptions: FieldDescriptions,
    excluded_tables: ExcludedTables,
}

/// Page that starts vectorization of the backend's relational schema into a collection,
/// optionally with operator-written field descriptions.
pub struct CreateVectorPage {
    backend: RwLock<Arc<dyn ConsoleBackend>>,
    state: Mutex<CreateVectorState>,
    schema_requests: RequestSequence,
    notifications: Arc<NotificationCenter>,
}

impl CreateVectorPage {
    pub fn new(backend: Arc<dyn ConsoleBackend>, notifications: Arc<NotificationCenter>) -> Self {
        Self {
            backend: RwLock::new(backend),
            state: Mutex::new(CreateVectorState::default()),
            schema_requests: RequestSequence::new(),
            notifications,
        }
    }

    /// Points the page at another backend. Cached schema and drafts are kept.
    pub fn set_backend(&self, backend: Arc<dyn ConsoleBackend>) {
        *self.backend.write() = backend;
    }

    fn backend(&self) -> Arc<dyn ConsoleBackend> {
        self.backend.read().clone()
    }

    pub fn notifications(&self) -> &Arc<NotificationCenter> {
        &self.notifications
    }

    pub fn collection_name(&self) -> String {
        self.state.lock().collection_name.clone()
    }

    pub fn set_collection_name(&self, name: impl Into<String>) {
        self.state.lock().collection_name = name.into();
    }

    pub fn manual_input(&self) -> bool {
        self.state.lock().manual_input
    }

    /// Switches manual input mode. Turning it on fetches the schema unless one
    /// is already cached or on its way.
    pub async fn set_manual_input(&self, on: bool) -> Result<(), ConsoleError> {
        let needs_schema = {
            let mut state = self.state.lock();
            state.manual_input = on;
            on && matches!(state.schema, SchemaState::Idle | SchemaState::Failed(_))
        };

        if needs_schema {
            self.load_schema().await?;
        }
        Ok(())
    }

    pub fn schema_state(&self) -> SchemaState {
        self.state.lock().schema.clone()
    }

    pub fn schema(&self) -> Option<TableSchema> {
        match &self.state.lock().schema {
            SchemaState::Loaded(schema) => Some(schema.clone()),
            _ => None,
        }
    }

    /// Fetches the schema and resets every draft to blank.
    ///
    /// Returns `Ok(false)` when a newer load was issued meanwhile; that
    /// response is dropped.
    pub async fn load_schema(&self) -> Result<bool, ConsoleError> {
        let ticket = self.schema_requests.issue();
        self.state.lock().schema = SchemaState::Loading;

        let result = self.backend().fetch_schema().await;

        if !self.schema_requests.is_latest(ticket) {
            debug!("Discarding schema response {} superseded by a newer request.", ticket);
            return Ok(false);
        }

        match result {
            Ok(schema) => {
                let (descriptions, excluded) = blank_drafts(&schema);
                let mut state = self.state.lock();
                info!("Schema loaded with {} tables.", schema.len());
                state.field_descriptions = descriptions;
                state.excluded_tables = excluded;
                state.expanded_tables.clear();
                state.schema = SchemaState::Loaded(schema);
                Ok(true)
            }
            Err(e) => {
                let message = format!("Failed to load schema: {}", e.notification_message());
                warn!("{}", message);
                self.state.lock().schema = SchemaState::Failed(message.clone());
                self.notifications.error(message);
                Err(e)
            }
        }
    }

    pub fn toggle_table(&self, table: &str) {
        let mut state = self.state.lock();
        if !state.expanded_tables.remove(table) {
            state.expanded_tables.insert(table.to_string());
        }
    }

    /// Excluded tables never show their field editor.
    pub fn is_expanded(&self, table: &str) -> bool {
        let state = self.state.lock();
        state.expanded_tables.contains(table) && !is_excluded(&state.excluded_tables, table)
    }

    pub fn toggle_table_exclusion(&self, table: &str) {
        let mut state = self.state.lock();
        let excluded = !is_excluded(&state.excluded_tables, table);
        state.excluded_tables.insert(table.to_string(), excluded);
        if excluded {
            state.expanded_tables.remove(table);
        }
        debug!("Table '{}' excluded: {}", table, excluded);
    }

    pub fn is_table_excluded(&self, table: &str) -> bool {
        is_excluded(&self.state.lock().excluded_tables, table)
    }

    /// Returns false when the table or field is not part of the loaded schema.
    pub fn update_description(&self, table: &str, field: &str, description: &str) -> bool {
        self.with_field(table, field, |entry| entry.description = description.to_string())
    }

    pub fn update_confidentiality(&self, table: &str, field: &str, value: Confidentiality) -> bool {
        self.with_field(table, field, |entry| entry.confidentiality = value)
    }

    fn with_field(&self, table: &str, field: &str, edit: impl FnOnce(&mut FieldDescription)) -> bool {
        let mut state = self.state.lock();
        match state.field_descriptions.get_mut(table).and_then(|fields| fields.get_mut(field)) {
            Some(entry) => {
                edit(entry);
                true
            }
            None => {
                debug!("Ignoring edit of unknown field '{}.{}'", table, field);
                false
            }
        }
    }

    pub fn field_descriptions(&self) -> FieldDescriptions {
        self.state.lock().field_descriptions.clone()
    }

    /// The description payload: described fields of included tables only.
    pub fn generate_fields_description(&self) -> FieldDescriptions {
        let state = self.state.lock();
        filter_described(&state.field_descriptions, &state.excluded_tables)
    }

    pub fn build_request(&self) -> CreateVectorRequest {
        let state = self.state.lock();
        if state.manual_input {
            let described = filter_described(&state.field_descriptions, &state.excluded_tables);
            CreateVectorRequest::with_descriptions(state.collection_name.clone(), described)
        } else {
            CreateVectorRequest::automatic(state.collection_name.clone())
        }
    }

    pub fn stats(&self) -> SchemaStats {
        let state = self.state.lock();
        match &state.schema {
            SchemaState::Loaded(schema) => SchemaStats::compute(schema, &state.excluded_tables),
            _ => SchemaStats::default(),
        }
    }

    pub fn submit_state(&self) -> SubmitState {
        self.state.lock().submit.clone()
    }

    /// Sends the vectorization request and reports the outcome as a notification.
    pub async fn submit(&self) -> Result<Value, ConsoleError> {
        let (request, manual_input) = {
            let mut state = self.state.lock();
            if matches!(state.submit, SubmitState::Submitting) {
                return Err(ConsoleError::Busy("submission".to_string()));
            }
            if state.manual_input && matches!(state.schema, SchemaState::Loading) {
                return Err(ConsoleError::Busy("schema load".to_string()));
            }
            if state.collection_name.trim().is_empty() {
                drop(state);
                let e = ConsoleError::Validation("collection name is required".to_string());
                self.notifications.error(e.to_string());
                return Err(e);
            }
            state.submit = SubmitState::Submitting;
            drop(state);
            (self.build_request(), self.manual_input())
        };

        if manual_input && request.fields_description.is_none() {
            warn!(
                "Manual input is on but no field has a description; sending '{}' without fields_description.",
                request.vector_database.vector_database
            );
        }

        let result = self.backend().create_vector(&request, manual_input).await;

        match result {
            Ok(response) => {
                let shown = serde_json::to_string_pretty(&response).unwrap_or_else(|_| response.to_string());
                self.state.lock().submit = SubmitState::Submitted(response.clone());
                self.notifications.success(shown);
                Ok(response)
            }
            Err(e) => {
                let message = e.notification_message();
                self.state.lock().submit = SubmitState::Failed(message.clone());
                self.notifications.error(message);
                Err(e)
            }
        }
    }

    /// Pings the backend's documentation endpoint.
    pub async fn check_connection(&self) -> Result<(), ConsoleError> {
        match self.backend().health_check().await {
            Ok(()) => {
                self.notifications.success("Backend is reachable");
                Ok(())
            }
            Err(e) => {
                let message = match &e {
                    ConsoleError::Status { status, .. } => format!("Backend responded with {}", status),
                    other => other.notification_message(),
                };
                self.notifications.error(message);
                Err(e)
            }
        }
    }
}

fn is_excluded(excluded: &ExcludedTables, table: &str) -> bool {
    excluded.get(table).copied().unwrap_or(false)
}
