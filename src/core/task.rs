//! Task records, kinds, lanes and per-kind payloads.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::SchedulerError;
use crate::util::clock::now_ms;

/// Unique task identifier.
pub type TaskId = uuid::Uuid;
/// Owning tenant/project context.
pub type ScopeId = String;
/// Identifier of the user or service that submitted a task.
pub type CreatorId = String;

/// Closed set of task kinds understood by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    /// Split record text into tokens.
    Tokenization,
    /// Recalculate a derived attribute.
    AttributeCalculation,
    /// Compute or train an embedding.
    Embedding,
    /// Run a labeling heuristic or model.
    InformationSource,
    /// Call an external gateway service.
    Gateway,
    /// Import, export or otherwise touch a file.
    FileOperation,
    /// Composite task expanding into an ordered chain of sub-tasks.
    TaskQueue,
    /// Action executed synchronously during submission.
    TaskQueueAction,
}

/// How the scheduler treats a kind at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindClass {
    /// Admitted to a lane and driven by its handler.
    Queued,
    /// Admitted to a lane and expanded by the composite handler.
    Composite,
    /// Executed inside `submit`, never enters a lane.
    Immediate,
}

impl TaskKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Tokenization,
        Self::AttributeCalculation,
        Self::Embedding,
        Self::InformationSource,
        Self::Gateway,
        Self::FileOperation,
        Self::TaskQueue,
        Self::TaskQueueAction,
    ];

    /// Submission class of this kind.
    #[must_use]
    pub const fn class(self) -> KindClass {
        match self {
            Self::TaskQueue => KindClass::Composite,
            Self::TaskQueueAction => KindClass::Immediate,
            _ => KindClass::Queued,
        }
    }

    /// Lane used when a composite descriptor carries no override for this kind.
    #[must_use]
    pub const fn default_priority(self) -> bool {
        false
    }

    /// Wire name, identical to the serde representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tokenization => "TOKENIZATION",
            Self::AttributeCalculation => "ATTRIBUTE_CALCULATION",
            Self::Embedding => "EMBEDDING",
            Self::InformationSource => "INFORMATION_SOURCE",
            Self::Gateway => "GATEWAY",
            Self::FileOperation => "FILE_OPERATION",
            Self::TaskQueue => "TASK_QUEUE",
            Self::TaskQueueAction => "TASK_QUEUE_ACTION",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Admission lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    /// Priority lane; may borrow normal capacity.
    Priority,
    /// Normal lane.
    Normal,
}

impl Lane {
    /// Lane selected by a priority flag.
    #[must_use]
    pub const fn from_priority(priority: bool) -> Self {
        if priority {
            Self::Priority
        } else {
            Self::Normal
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Priority => f.write_str("priority"),
            Self::Normal => f.write_str("normal"),
        }
    }
}

/// One step of a composite task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTaskDescriptor {
    /// Kind of the sub-task.
    pub kind: TaskKind,
    /// Scope override for composites spanning several scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_id: Option<ScopeId>,
    /// Marks an information source as a zero-shot variant.
    #[serde(default)]
    pub zero_shot: bool,
    /// Payload forwarded to the sub-task submission.
    #[serde(default = "empty_object")]
    pub payload: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl SubTaskDescriptor {
    /// Descriptor with an empty payload and no overrides.
    #[must_use]
    pub fn new(kind: TaskKind) -> Self {
        Self {
            kind,
            scope_id: None,
            zero_shot: false,
            payload: empty_object(),
        }
    }

    /// Lane flag for the sub-task.
    ///
    /// Attribute recalculations always run on the priority lane; information
    /// sources do too unless they are zero-shot.
    #[must_use]
    pub const fn resolve_priority(&self) -> bool {
        match self.kind {
            TaskKind::AttributeCalculation => true,
            TaskKind::InformationSource => !self.zero_shot,
            other => other.default_priority(),
        }
    }
}

/// Expansion state of a composite task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeProgress {
    /// Descriptors not yet submitted, in order.
    pub pending: VecDeque<SubTaskDescriptor>,
    /// Sub-tasks observed as finished.
    pub done_count: usize,
    /// Length of the descriptor list when the composite started.
    pub initial_count: usize,
    /// Outstanding sub-task, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<TaskId>,
}

impl CompositeProgress {
    /// Build from submitted descriptors.
    #[must_use]
    pub fn new(descriptors: Vec<SubTaskDescriptor>) -> Self {
        Self {
            pending: descriptors.into(),
            ..Self::default()
        }
    }

    /// Whether no descriptor is pending and none is outstanding.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.pending.is_empty() && self.current.is_none()
    }

    /// Completed share of the work, rounded to four decimals.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> f64 {
        if self.initial_count == 0 {
            return 1.0;
        }
        let raw = self.done_count as f64 / self.initial_count as f64;
        (raw * 10_000.0).round() / 10_000.0
    }
}

/// Request carried by an immediate-action submission.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    /// Action identifier.
    pub action: String,
    /// Full submitted object, including `action`.
    pub params: Map<String, Value>,
}

impl ActionRequest {
    /// Decode `{"action": "<id>", ...}`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Validation`] if the payload is not an object
    /// or lacks a string `action`.
    pub fn from_value(value: Value) -> Result<Self, SchedulerError> {
        let Value::Object(params) = value else {
            return Err(SchedulerError::Validation(
                "action payload must be an object".into(),
            ));
        };
        let action = params
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SchedulerError::Validation("action payload requires a string `action`".into())
            })?
            .to_string();
        Ok(Self { action, params })
    }

    /// String parameter by name.
    #[must_use]
    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }
}

/// Per-kind task payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskPayload {
    /// Composite expansion state.
    Composite(CompositeProgress),
    /// Immediate action request; never persisted.
    Action(ActionRequest),
    /// Kind-specific map the scheduler does not interpret.
    Opaque(Map<String, Value>),
}

impl TaskPayload {
    /// Decode a producer-supplied payload for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Validation`] when the shape does not match the kind.
    pub fn from_submission(kind: TaskKind, value: Value) -> Result<Self, SchedulerError> {
        match kind.class() {
            KindClass::Immediate => ActionRequest::from_value(value).map(Self::Action),
            KindClass::Composite => {
                let Value::Array(_) = value else {
                    return Err(SchedulerError::Validation(
                        "composite payload must be a list of sub-task descriptors".into(),
                    ));
                };
                let descriptors: Vec<SubTaskDescriptor> = serde_json::from_value(value)
                    .map_err(|e| SchedulerError::Validation(format!("bad descriptor: {e}")))?;
                if descriptors.is_empty() {
                    return Err(SchedulerError::Validation(
                        "composite payload must not be empty".into(),
                    ));
                }
                Ok(Self::Composite(CompositeProgress::new(descriptors)))
            }
            KindClass::Queued => match value {
                Value::Object(map) => Ok(Self::Opaque(map)),
                Value::Null => Ok(Self::Opaque(Map::new())),
                _ => Err(SchedulerError::Validation(format!(
                    "{kind} payload must be an object"
                ))),
            },
        }
    }

    /// Decode a payload read back from the durable store.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Store`] when the stored value is not a valid
    /// payload for `kind`.
    pub fn from_stored(kind: TaskKind, value: Value) -> Result<Self, SchedulerError> {
        match kind.class() {
            KindClass::Composite => serde_json::from_value(value)
                .map(Self::Composite)
                .map_err(|e| SchedulerError::Store(format!("corrupt composite payload: {e}"))),
            KindClass::Queued => match value {
                Value::Object(map) => Ok(Self::Opaque(map)),
                _ => Err(SchedulerError::Store(format!(
                    "stored {kind} payload is not an object"
                ))),
            },
            KindClass::Immediate => Err(SchedulerError::Store(
                "immediate actions are never persisted".into(),
            )),
        }
    }

    /// Generic structured value for the durable store.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Store`] if serialization fails.
    pub fn to_value(&self) -> Result<Value, SchedulerError> {
        match self {
            Self::Composite(progress) => serde_json::to_value(progress)
                .map_err(|e| SchedulerError::Store(e.to_string())),
            Self::Action(request) => Ok(Value::Object(request.params.clone())),
            Self::Opaque(map) => Ok(Value::Object(map.clone())),
        }
    }

    /// Composite state, if this is a composite payload.
    #[must_use]
    pub const fn as_composite(&self) -> Option<&CompositeProgress> {
        match self {
            Self::Composite(progress) => Some(progress),
            _ => None,
        }
    }

    /// Mutable composite state, if this is a composite payload.
    pub fn as_composite_mut(&mut self) -> Option<&mut CompositeProgress> {
        match self {
            Self::Composite(progress) => Some(progress),
            _ => None,
        }
    }
}

/// The unit of work tracked by the scheduler.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    /// Unique identifier.
    pub id: TaskId,
    /// Owning scope.
    pub scope_id: ScopeId,
    /// Submitting user or service.
    pub creator_id: CreatorId,
    /// Kind selecting the handler.
    pub kind: TaskKind,
    /// Declared lane flag.
    pub priority: bool,
    /// Claim flag mirrored from the durable record.
    pub active: bool,
    /// Creation timestamp in milliseconds since epoch.
    pub created_at_ms: u64,
    payload: TaskPayload,
    dirty: bool,
}

impl TaskRecord {
    /// Create a fresh record with a new id.
    #[must_use]
    pub fn new(
        scope_id: impl Into<ScopeId>,
        creator_id: impl Into<CreatorId>,
        kind: TaskKind,
        payload: TaskPayload,
        priority: bool,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            scope_id: scope_id.into(),
            creator_id: creator_id.into(),
            kind,
            priority,
            active: false,
            created_at_ms: now_ms(),
            payload,
            dirty: false,
        }
    }

    /// Declared lane.
    #[must_use]
    pub const fn lane(&self) -> Lane {
        Lane::from_priority(self.priority)
    }

    /// Read-only payload.
    #[must_use]
    pub const fn payload(&self) -> &TaskPayload {
        &self.payload
    }

    /// Mutable payload; marks the record for persistence.
    pub fn payload_mut(&mut self) -> &mut TaskPayload {
        self.dirty = true;
        &mut self.payload
    }

    /// Whether the payload changed since the last call, clearing the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Durable form of this record.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Store`] if the payload cannot be serialized.
    pub fn to_stored(&self) -> Result<StoredTask, SchedulerError> {
        Ok(StoredTask {
            id: self.id,
            scope_id: self.scope_id.clone(),
            creator_id: self.creator_id.clone(),
            kind: self.kind,
            payload: self.payload.to_value()?,
            priority: self.priority,
            active: self.active,
            created_at_ms: self.created_at_ms,
        })
    }
}

impl TryFrom<StoredTask> for TaskRecord {
    type Error = SchedulerError;

    fn try_from(stored: StoredTask) -> Result<Self, Self::Error> {
        let payload = TaskPayload::from_stored(stored.kind, stored.payload)?;
        Ok(Self {
            id: stored.id,
            scope_id: stored.scope_id,
            creator_id: stored.creator_id,
            kind: stored.kind,
            priority: stored.priority,
            active: stored.active,
            created_at_ms: stored.created_at_ms,
            payload,
            dirty: false,
        })
    }
}

/// Durable representation of a task; the payload is a generic value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTask {
    /// Unique identifier.
    pub id: TaskId,
    /// Owning scope.
    pub scope_id: ScopeId,
    /// Submitting user or service.
    pub creator_id: CreatorId,
    /// Task kind.
    pub kind: TaskKind,
    /// Serialized payload.
    pub payload: Value,
    /// Declared lane flag.
    pub priority: bool,
    /// Claim flag.
    pub active: bool,
    /// Creation timestamp in milliseconds since epoch.
    pub created_at_ms: u64,
}
