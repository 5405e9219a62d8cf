use crate::errors::HandlerError;
use crate::event::ChangeEventRecord;
use async_trait::async_trait;

/// Reacts to change events of the (table, action) pairs it is registered for.
#[async_trait]
pub trait ChangeHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, record: &ChangeEventRecord) -> Result<(), HandlerError>;
}
