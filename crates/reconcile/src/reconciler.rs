//! The reconciler: Create, Read, Update, Delete and Import for every entity
//! kind in the registry.
//!
//! Every operation returns an [`Outcome`]; nothing here returns a bare
//! error. Codec failures leave state untouched, API failures are routed
//! through the [`Funnel`], and 404s are interpreted per operation.

use std::sync::Arc;

use p1authz_api::{AuthorizeApi, ManagementApi};
use p1authz_core::{
    apply_defaults, host, import, validate, DeleteMode, EntityKind, Error, ErrorKind, Registry,
    Ty, Value,
};
use p1authz_interchange::{expand, flatten, stamp, Envelope};
use serde_json::{json, Value as Json};
use tokio_util::sync::CancellationToken;

use crate::config::ReconcileConfig;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::funnel::{Failure, Funnel, Policy};
use crate::outcome::Outcome;
use crate::poll::{await_absence, PollEnd};

/// Root policies are listed under this suffix of their collection.
const ROOT_LISTING: &str = "/root";
const ROOT_LIST_OPERATION: &str = "ListRootPolicies";
/// Service that owns the root policy of an environment.
const ROOT_OWNER: &str = "Editor Service";

struct Client<A, M> {
    api: Arc<A>,
    management: Arc<M>,
}

/// Drives entity lifecycles against an [`AuthorizeApi`].
///
/// ## Thread Safety
///
/// A reconciler holds no mutable state; one instance may serve any number
/// of concurrent operations on different entities. The host must not run
/// two operations on the same entity at once.
pub struct Reconciler<A, M> {
    registry: &'static Registry,
    config: ReconcileConfig,
    client: Option<Client<A, M>>,
}

impl<A: AuthorizeApi, M: ManagementApi> Reconciler<A, M> {
    /// A reconciler over the built-in registry with no client yet; every
    /// API operation reports `ClientNotInitialized` until
    /// [`with_client`](Self::with_client) is called.
    pub fn new(config: ReconcileConfig) -> Self {
        Self {
            registry: Registry::global(),
            config,
            client: None,
        }
    }

    pub fn with_client(mut self, api: Arc<A>, management: Arc<M>) -> Self {
        self.client = Some(Client { api, management });
        self
    }

    pub fn with_registry(mut self, registry: &'static Registry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &'static Registry {
        self.registry
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Look up an entity kind by host name.
    pub fn kind(&self, name: &str) -> Result<&'static EntityKind, Diagnostic> {
        self.registry.entity(name).ok_or_else(|| {
            Diagnostic::error(
                ErrorKind::InvalidValue,
                "Unknown entity kind",
                format!("'{}' is not a registered entity kind", name),
            )
        })
    }

    // ── Planning ──────────────────────────────────────────────────────────

    /// Decode a host-JSON configuration, apply schema defaults, validate
    /// it and dry-run the expand. Never touches the API.
    pub fn plan(&self, kind: &EntityKind, config: &Json) -> Result<Value, Diagnostics> {
        let ty = Ty::Object(kind.shape);
        let value = host::from_json(self.registry, &ty, config).map_err(codec)?;
        let value = self.prepare(&value)?;
        expand(self.registry, &value).map_err(codec)?;
        Ok(value)
    }

    /// The wire body `plan` would be sent as.
    pub fn wire_body(&self, plan: &Value) -> Result<Json, Diagnostics> {
        expand(self.registry, plan).map_err(codec)
    }

    /// Parse an import identifier into the partial state Read starts from.
    pub fn import_state(&self, kind: &EntityKind, import_id: &str) -> Result<Value, Error> {
        let components = import::parse(&kind.import, import_id)?;
        Ok(Value::object(
            kind.shape,
            components.into_iter().map(|(k, v)| (k, Value::string(v))),
        ))
    }

    // ── Create ────────────────────────────────────────────────────────────

    pub async fn create(&self, kind: &EntityKind, plan: &Value, cancel: &CancellationToken) -> Outcome {
        let Some(client) = &self.client else {
            return Outcome::failed(client_missing());
        };
        if kind.singleton {
            return self.adopt_root(client, kind, plan, "Create", cancel).await;
        }
        let plan = match self.prepare(plan) {
            Ok(p) => p,
            Err(d) => return Outcome::unchanged(d),
        };
        let body = match self.wire_body(&plan) {
            Ok(b) => b,
            Err(d) => return Outcome::unchanged(d),
        };
        let path = match kind.collection_path(&plan) {
            Ok(p) => p,
            Err(e) => return Outcome::failed(Diagnostic::from(&e)),
        };

        let op = kind.operation("Create");
        let funnel = self.funnel(client, cancel);
        tracing::info!(kind = kind.name, path = %path, "creating");
        let created = funnel
            .call(&op, environment_of(&plan), Policy::CREATE, || client.api.create(&path, &body))
            .await;
        let doc = match created {
            Ok(doc) => doc,
            Err(f) => return self.api_failure(f, &op),
        };
        if cancel.is_cancelled() {
            tracing::info!(kind = kind.name, "cancelled after create returned; handing back the created entity");
        }
        self.settle(kind, &doc, &plan, Diagnostics::new())
    }

    // ── Read ──────────────────────────────────────────────────────────────

    /// Refresh `state` from the server. A 404 removes the entity.
    pub async fn read(&self, kind: &EntityKind, state: &Value, cancel: &CancellationToken) -> Outcome {
        let Some(client) = &self.client else {
            return Outcome::failed(client_missing());
        };
        if kind.singleton {
            return match self.locate_root(client, kind, state, cancel).await {
                Ok(Some(doc)) => self.settle(kind, &doc, state, Diagnostics::new()),
                Ok(None) => {
                    tracing::info!(kind = kind.name, "root policy not found; removing from state");
                    Outcome::removed(Diagnostics::new())
                }
                Err(outcome) => outcome,
            };
        }
        if kind.listed {
            return self.read_listed(client, kind, state, cancel).await;
        }
        let path = match self.item_path(kind, state) {
            Ok(p) => p,
            Err(d) => return Outcome::failed(d),
        };
        let op = kind.operation("Get");
        let funnel = self.funnel(client, cancel);
        match funnel
            .call(&op, environment_of(state), Policy::READ, || client.api.get(&path))
            .await
        {
            Ok(doc) => self.settle(kind, &doc, state, Diagnostics::new()),
            Err(f) if f.is_not_found() => {
                tracing::info!(
                    kind = kind.name,
                    path = %path,
                    error_kind = %ErrorKind::ResourceNotFound,
                    "not found on read; removing from state"
                );
                Outcome::removed(Diagnostics::new())
            }
            Err(f) => self.api_failure(f, &op),
        }
    }

    // ── Update ────────────────────────────────────────────────────────────

    /// Read the current version, then PUT the plan carrying it. A version
    /// conflict is reported, never retried.
    pub async fn update(
        &self,
        kind: &EntityKind,
        plan: &Value,
        state: &Value,
        cancel: &CancellationToken,
    ) -> Outcome {
        let Some(client) = &self.client else {
            return Outcome::failed(client_missing());
        };
        if kind.singleton {
            return self.adopt_root(client, kind, plan, "Update", cancel).await;
        }
        if kind.replace_only {
            return Outcome::failed(Diagnostic::error(
                ErrorKind::InvalidValue,
                "Update not supported",
                format!(
                    "{} cannot be changed in place; delete it and create it again",
                    kind.name
                ),
            ));
        }
        let plan = match self.prepare(plan) {
            Ok(p) => p,
            Err(d) => return Outcome::unchanged(d),
        };
        let mut body = match self.wire_body(&plan) {
            Ok(b) => b,
            Err(d) => return Outcome::unchanged(d),
        };
        let Some(id) = kind.item_id(state).or_else(|| kind.item_id(&plan)) else {
            return Outcome::failed(missing_id(kind));
        };
        let path = match kind.item_path(state, id) {
            Ok(p) => p,
            Err(e) => return Outcome::failed(Diagnostic::from(&e)),
        };
        let env = environment_of(state);
        let funnel = self.funnel(client, cancel);

        let read_op = format!("{}-Update", kind.operation("Get"));
        let current = match funnel
            .call(&read_op, env, Policy::READ, || client.api.get(&path))
            .await
        {
            Ok(doc) => doc,
            Err(f) => return self.api_failure(f, &read_op),
        };
        let version = match Envelope::from_wire(&current) {
            Ok(envelope) => envelope.version,
            Err(e) => return Outcome::failed(Diagnostic::from(&e).with_operation(read_op)),
        };
        stamp(&mut body, Some(id), version.as_deref());
        tracing::debug!(kind = kind.name, path = %path, version = ?version, "updating");

        let write_op = kind.operation("Update");
        match funnel
            .call(&write_op, env, Policy::WRITE, || client.api.update(&path, &body))
            .await
        {
            Ok(doc) => self.settle(kind, &doc, &plan, Diagnostics::new()),
            Err(f) => self.api_failure(f, &write_op),
        }
    }

    // ── Delete ────────────────────────────────────────────────────────────

    /// Delete the entity, confirming absence where the kind requires it.
    pub async fn delete(&self, kind: &EntityKind, state: &Value, cancel: &CancellationToken) -> Outcome {
        let Some(client) = &self.client else {
            return Outcome::failed(client_missing());
        };
        if kind.delete == DeleteMode::Reset {
            return self.reset_root(client, kind, state, cancel).await;
        }
        let Some(id) = kind.item_id(state) else {
            return Outcome::failed(missing_id(kind));
        };
        let path = match kind.item_path(state, id) {
            Ok(p) => p,
            Err(e) => return Outcome::failed(Diagnostic::from(&e)),
        };
        let op = kind.operation("Delete");
        let funnel = self.funnel(client, cancel);
        tracing::info!(kind = kind.name, path = %path, "deleting");
        if let Err(f) = funnel
            .call(&op, environment_of(state), Policy::WRITE, || client.api.delete(&path))
            .await
        {
            return self.api_failure(f, &op);
        }
        if kind.delete == DeleteMode::Immediate {
            return Outcome::removed(Diagnostics::new());
        }

        let poll = &self.config.delete;
        let reason = match await_absence(client.api.as_ref(), &path, poll, cancel).await {
            PollEnd::Confirmed => return Outcome::removed(Diagnostics::new()),
            PollEnd::Cancelled => return Outcome::failed(Failure::Cancelled.diagnostic(&op)),
            PollEnd::TimedOut { last } => format!(
                "timeout while waiting for state to become '404' (last state: '{}', timeout: {:?})",
                last.as_status(),
                poll.timeout
            ),
            PollEnd::Failed(e) => e.to_string(),
        };
        let warning = Diagnostic::warning(
            ErrorKind::DeleteNotConfirmed,
            format!("Authorize {} Delete Timeout", kind.noun),
            format!(
                "Error waiting for authorize {} ({}) to be deleted: {}",
                kind.noun.to_lowercase(),
                id,
                reason
            ),
        )
        .with_operation(op);
        Outcome::removed(warning.into())
    }

    // ── Import ────────────────────────────────────────────────────────────

    /// Parse `import_id` and read the entity it names.
    pub async fn import(&self, kind: &EntityKind, import_id: &str, cancel: &CancellationToken) -> Outcome {
        let seed = match self.import_state(kind, import_id) {
            Ok(v) => v,
            Err(e) => return Outcome::failed(Diagnostic::from(&e)),
        };
        let outcome = self.read(kind, &seed, cancel).await;
        if outcome.is_removed() {
            return Outcome::failed(Diagnostic::error(
                ErrorKind::ResourceNotFound,
                "Cannot import non-existent remote object",
                format!(
                    "No {} exists for import identifier \"{}\"",
                    kind.name, import_id
                ),
            ));
        }
        outcome
    }

    /// Read for kinds without an item GET: list the collection and pick
    /// the item whose wire `id` matches.
    async fn read_listed(
        &self,
        client: &Client<A, M>,
        kind: &EntityKind,
        state: &Value,
        cancel: &CancellationToken,
    ) -> Outcome {
        let Some(id) = kind.item_id(state) else {
            return Outcome::failed(missing_id(kind));
        };
        let collection = match kind.collection_path(state) {
            Ok(p) => p,
            Err(e) => return Outcome::failed(Diagnostic::from(&e)),
        };
        let op = format!("{}s", kind.operation("Read"));
        let funnel = self.funnel(client, cancel);
        let items = funnel
            .call(&op, environment_of(state), Policy::READ, || {
                client.api.list(&collection)
            })
            .await;
        match items {
            Ok(items) => match items
                .iter()
                .find(|doc| doc.get("id").and_then(Json::as_str) == Some(id))
            {
                Some(doc) => self.settle(kind, doc, state, Diagnostics::new()),
                None => {
                    tracing::info!(kind = kind.name, id, "not in listing; removing from state");
                    Outcome::removed(Diagnostics::new())
                }
            },
            Err(f) if f.is_not_found() => {
                tracing::info!(
                    kind = kind.name,
                    path = %collection,
                    error_kind = %ErrorKind::ResourceNotFound,
                    "collection not found on read; removing from state"
                );
                Outcome::removed(Diagnostics::new())
            }
            Err(f) => self.api_failure(f, &op),
        }
    }

    // ── Root policy singleton ─────────────────────────────────────────────

    /// Find the environment's root policy, owned by the editor service.
    /// A failed lookup comes back as the outcome to report.
    async fn locate_root(
        &self,
        client: &Client<A, M>,
        kind: &EntityKind,
        scope: &Value,
        cancel: &CancellationToken,
    ) -> Result<Option<Json>, Outcome> {
        let collection = kind
            .collection_path(scope)
            .map_err(|e| Outcome::failed(Diagnostic::from(&e)))?;
        let listing = format!("{}{}", collection, ROOT_LISTING);
        let funnel = self.funnel(client, cancel);
        let items = funnel
            .call(ROOT_LIST_OPERATION, environment_of(scope), Policy::READ, || {
                client.api.list(&listing)
            })
            .await
            .map_err(|f| self.api_failure(f, ROOT_LIST_OPERATION))?;
        Ok(items.into_iter().find(|doc| {
            doc.pointer("/managedEntity/owner/service/name")
                .and_then(Json::as_str)
                == Some(ROOT_OWNER)
        }))
    }

    /// Create and Update of the singleton both overwrite the located root.
    async fn adopt_root(
        &self,
        client: &Client<A, M>,
        kind: &EntityKind,
        plan: &Value,
        phase: &str,
        cancel: &CancellationToken,
    ) -> Outcome {
        let plan = match self.prepare(plan) {
            Ok(p) => p,
            Err(d) => return Outcome::unchanged(d),
        };
        let mut body = match self.wire_body(&plan) {
            Ok(b) => b,
            Err(d) => return Outcome::unchanged(d),
        };
        let root = match self.locate_root(client, kind, &plan, cancel).await {
            Ok(Some(doc)) => doc,
            Ok(None) => return Outcome::failed(root_missing(&plan)),
            Err(outcome) => return outcome,
        };
        let op = format!("{}-{}", kind.operation("Update"), phase);
        let (id, version) = match Envelope::from_wire(&root) {
            Ok(Envelope {
                id: Some(id),
                version,
                ..
            }) => (id, version),
            Ok(_) => return Outcome::failed(missing_id(kind).with_operation(op)),
            Err(e) => return Outcome::failed(Diagnostic::from(&e).with_operation(op)),
        };
        stamp(&mut body, Some(&id), version.as_deref());
        let path = match kind.item_path(&plan, &id) {
            Ok(p) => p,
            Err(e) => return Outcome::failed(Diagnostic::from(&e)),
        };
        let funnel = self.funnel(client, cancel);
        match funnel
            .call(&op, environment_of(&plan), Policy::WRITE, || client.api.update(&path, &body))
            .await
        {
            Ok(doc) => self.settle(kind, &doc, &plan, Diagnostics::new()),
            Err(f) => self.api_failure(f, &op),
        }
    }

    /// The root policy cannot be deleted; put it back to its initial form.
    async fn reset_root(
        &self,
        client: &Client<A, M>,
        kind: &EntityKind,
        state: &Value,
        cancel: &CancellationToken,
    ) -> Outcome {
        let root = match self.locate_root(client, kind, state, cancel).await {
            Ok(Some(doc)) => doc,
            Ok(None) => {
                let warning = Diagnostic::warning(
                    ErrorKind::ResourceNotFoundOnOther,
                    "Resource not found",
                    "The root policy no longer exists and will be removed from state",
                )
                .with_operation(ROOT_LIST_OPERATION);
                return Outcome::removed(warning.into());
            }
            Err(outcome) => return outcome,
        };
        let op = format!("{}-Delete", kind.operation("Update"));
        let envelope = match Envelope::from_wire(&root) {
            Ok(e) => e,
            Err(e) => return Outcome::failed(Diagnostic::from(&e).with_operation(op)),
        };
        let Some(id) = envelope.id.as_deref() else {
            return Outcome::failed(missing_id(kind).with_operation(op));
        };
        let mut body = json!({
            "name": "Policies",
            "combiningAlgorithm": {"algorithm": "PERMIT_OVERRIDES"},
            "children": [],
        });
        stamp(&mut body, Some(id), envelope.version.as_deref());
        let path = match kind.item_path(state, id) {
            Ok(p) => p,
            Err(e) => return Outcome::failed(Diagnostic::from(&e)),
        };
        let funnel = self.funnel(client, cancel);
        match funnel
            .call(&op, environment_of(state), Policy::WRITE, || client.api.update(&path, &body))
            .await
        {
            Ok(_) => Outcome::removed(Diagnostics::new()),
            Err(f) => self.api_failure(f, &op),
        }
    }

    // ── Helpers ───────────────────────────────────────────────────────────

    fn funnel<'a>(&'a self, client: &'a Client<A, M>, cancel: &'a CancellationToken) -> Funnel<'a, M> {
        Funnel {
            management: client.management.as_ref(),
            config: &self.config,
            cancel,
        }
    }

    /// Apply schema defaults and validate. A plan with violations never
    /// reaches the API.
    fn prepare(&self, plan: &Value) -> Result<Value, Diagnostics> {
        let mut plan = plan.clone();
        apply_defaults(self.registry, &mut plan).map_err(codec)?;

        let violations = validate(self.registry, &plan);
        if !violations.is_empty() {
            let mut diagnostics = Diagnostics::new();
            for v in &violations {
                diagnostics.push(Diagnostic::from(v));
            }
            return Err(diagnostics);
        }
        Ok(plan)
    }

    fn item_path(&self, kind: &EntityKind, state: &Value) -> Result<String, Diagnostic> {
        let id = kind.item_id(state).ok_or_else(|| missing_id(kind))?;
        kind.item_path(state, id).map_err(|e| Diagnostic::from(&e))
    }

    /// Flatten a server document into the next state, using `prior` for
    /// the null/empty discipline.
    fn settle(&self, kind: &EntityKind, doc: &Json, prior: &Value, diagnostics: Diagnostics) -> Outcome {
        match flatten(self.registry, &Ty::Object(kind.shape), doc, Some(prior)) {
            Ok(value) => Outcome::set(value, diagnostics),
            Err(e) => {
                let mut diagnostics = diagnostics;
                diagnostics.push(Diagnostic::from(&e));
                Outcome::unchanged(diagnostics)
            }
        }
    }

    /// 404s outside Read drop the entity with a warning; everything else
    /// leaves state alone.
    fn api_failure(&self, f: Failure, op: &str) -> Outcome {
        let d = f.diagnostic(op);
        if f.is_not_found() {
            Outcome::removed(d.into())
        } else {
            Outcome::failed(d)
        }
    }
}

fn environment_of(value: &Value) -> &str {
    value.get_str("environment_id").unwrap_or_default()
}

fn codec(e: Error) -> Diagnostics {
    Diagnostic::from(&e).into()
}

fn client_missing() -> Diagnostic {
    Diagnostic::error(
        ErrorKind::ClientNotInitialized,
        "Client not initialized",
        "Expected a configured PingOne client; set an access token before running API operations.",
    )
}

fn missing_id(kind: &EntityKind) -> Diagnostic {
    Diagnostic::error(
        ErrorKind::InvalidValue,
        "Missing identifier",
        format!("{}: {} must be known to address the API", kind.name, kind.id_field),
    )
}

fn root_missing(plan: &Value) -> Diagnostic {
    Diagnostic::error(
        ErrorKind::ResourceNotFound,
        "Root policy not found",
        format!(
            "No root policy owned by the {} exists in environment {}",
            ROOT_OWNER,
            environment_of(plan)
        ),
    )
    .with_operation(ROOT_LIST_OPERATION)
}
