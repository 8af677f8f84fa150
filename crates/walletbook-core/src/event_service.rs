use tracing::info;
use uuid::Uuid;
use walletbook_domain::{Book, Event, EventStatus, Transaction};

use crate::CoreError;

pub struct EventService;

impl EventService {
    pub fn add(book: &mut Book, mut event: Event) -> Result<Uuid, CoreError> {
        event.name = Self::validate_name(book, None, &event.name)?;
        let id = event.id;
        info!(event = %event.name, %id, "event added");
        book.events.push(event);
        Ok(id)
    }

    pub fn rename(book: &mut Book, id: Uuid, name: &str) -> Result<(), CoreError> {
        let name = Self::validate_name(book, Some(id), name)?;
        let event = book.event_mut(id).ok_or(CoreError::EventNotFound(id))?;
        event.name = name;
        Ok(())
    }

    pub fn set_icon(book: &mut Book, id: Uuid, icon: Option<String>) -> Result<(), CoreError> {
        let event = book.event_mut(id).ok_or(CoreError::EventNotFound(id))?;
        event.icon = icon.filter(|value| !value.trim().is_empty());
        Ok(())
    }

    pub fn set_status(book: &mut Book, id: Uuid, status: EventStatus) -> Result<(), CoreError> {
        let event = book.event_mut(id).ok_or(CoreError::EventNotFound(id))?;
        event.status = status;
        info!(%id, %status, "event status changed");
        Ok(())
    }

    /// Deletes the event and clears it from tagged transactions; returns how many were detached.
    pub fn delete(book: &mut Book, id: Uuid) -> Result<usize, CoreError> {
        let before = book.events.len();
        book.events.retain(|event| event.id != id);
        if book.events.len() == before {
            return Err(CoreError::EventNotFound(id));
        }
        let mut detached = 0;
        for txn in book
            .transactions
            .iter_mut()
            .filter(|txn| txn.event_id == Some(id))
        {
            txn.event_id = None;
            detached += 1;
        }
        info!(%id, detached, "event deleted");
        Ok(detached)
    }

    pub fn active(book: &Book) -> Vec<&Event> {
        book.events.iter().filter(|event| event.is_active()).collect()
    }

    pub fn transactions_for(book: &Book, id: Uuid) -> Vec<&Transaction> {
        book.transactions
            .iter()
            .filter(|txn| txn.event_id == Some(id))
            .collect()
    }

    fn validate_name(book: &Book, exclude: Option<Uuid>, candidate: &str) -> Result<String, CoreError> {
        let trimmed = candidate.trim();
        if trimmed.is_empty() {
            return Err(CoreError::Validation("Event name is required".into()));
        }
        if book.events.iter().any(|event| {
            event.name.trim().eq_ignore_ascii_case(trimmed) && exclude.map_or(true, |id| event.id != id)
        }) {
            return Err(CoreError::Validation(format!(
                "Event `{}` already exists",
                trimmed
            )));
        }
        Ok(trimmed.to_string())
    }
}
