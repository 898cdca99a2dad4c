use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A recorded visit. Rows are immutable once inserted; the only mutations
/// the store supports are insert and bulk delete per viewable.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct View {
    pub id: i64,
    pub viewable_type: String,
    pub viewable_id: i64,
    /// Opaque visitor fingerprint; None when anonymous tracking is disabled.
    pub visitor: Option<String>,
    pub collection: Option<String>,
    /// Weight of the view, 1.0 for a plain visit.
    pub value: f64,
    /// Explicit subject id ("viewed by user X"), independent of `visitor`.
    pub user_id: Option<i64>,
    /// Unix seconds, assigned by the server at insert time.
    pub viewed_at: i64,
}

/// Insert payload for a view; the store assigns the surrogate id.
#[derive(Debug, Clone)]
pub struct NewView {
    pub viewable_type: String,
    pub viewable_id: i64,
    pub visitor: Option<String>,
    pub collection: Option<String>,
    pub value: f64,
    pub user_id: Option<i64>,
    pub viewed_at: i64,
}

/// An entity that can receive views. Implementors expose their stored type
/// name and surrogate id; everything else about the entity is irrelevant to
/// the engine.
pub trait Viewable {
    /// Concrete type name, resolved through the morph map before storage.
    fn viewable_type(&self) -> &str;

    fn viewable_id(&self) -> i64;
}

/// Resolved (type, id) identity of a viewable after morph-map lookup.
/// This is what the engine and stores operate on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewableRef {
    pub viewable_type: String,
    pub viewable_id: i64,
}

impl ViewableRef {
    pub fn new(viewable_type: impl Into<String>, viewable_id: i64) -> Self {
        Self {
            viewable_type: viewable_type.into(),
            viewable_id,
        }
    }
}
