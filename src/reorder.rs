use crate::errors::StoreError;

/// Moves the element at `from` to `to` (splice semantics: remove at `from`,
/// insert at `to` in the shortened sequence). Other elements keep their
/// relative order.
pub fn move_item<T: Clone>(ids: &[T], from: usize, to: usize) -> Result<Vec<T>, StoreError> {
    if from >= ids.len() || to >= ids.len() {
        return Err(StoreError::validation(format!(
            "move {from} -> {to} is out of range for {} habits",
            ids.len()
        )));
    }

    let mut reordered = ids.to_vec();
    let moved = reordered.remove(from);
    reordered.insert(to, moved);
    Ok(reordered)
}

/// Drag-and-drop variant: drops `dragged` onto the slot currently held by `target`.
pub fn move_onto(ids: &[String], dragged: &str, target: &str) -> Result<Vec<String>, StoreError> {
    let position = |id: &str| {
        ids.iter()
            .position(|candidate| candidate == id)
            .ok_or_else(|| StoreError::not_found(format!("habit {id}")))
    };
    move_item(ids, position(dragged)?, position(target)?)
}
