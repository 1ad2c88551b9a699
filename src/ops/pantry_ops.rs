use crate::model::forest::{Node, StoreError};
use crate::model::ids::ITEM_PREFIX;
use crate::model::pantry::{Item, ItemStatus, PantryContent, PantryForest};
use crate::model::store::Store;

/// Create a category and attach it under `parent` (or at the top level).
pub fn add_category(store: &mut Store, parent: Option<&str>, name: &str) -> Result<String, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::EmptyText);
    }
    if let Some(p) = parent
        && !store.pantry.contains(p)
    {
        return Err(StoreError::NotFound(p.to_string()));
    }
    let node = Node::<PantryContent>::new(store.next_node_id::<PantryContent>(), name.to_string());
    match parent {
        Some(p) => store.pantry.add_child(p, node),
        None => store.pantry.add_root(node),
    }
}

pub fn add_item(store: &mut Store, category_id: &str, name: &str) -> Result<String, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::EmptyText);
    }
    if !store.pantry.contains(category_id) {
        return Err(StoreError::NotFound(category_id.to_string()));
    }
    let id = store.next_id(ITEM_PREFIX);
    if let Some(category) = store.pantry.find_mut(category_id) {
        category.content.items.push(Item::new(id.clone(), name.to_string()));
    }
    Ok(id)
}

/// Locate an item anywhere in the pantry; returns the category ID and the item.
pub fn find_item<'a>(forest: &'a PantryForest, item_id: &str) -> Option<(&'a str, &'a Item)> {
    forest.find_map(|n| {
        n.content
            .items
            .iter()
            .find(|i| i.id == item_id)
            .map(|i| (n.id(), i))
    })
}

fn require_item<'a>(forest: &'a mut PantryForest, item_id: &str) -> Result<&'a mut Item, StoreError> {
    let owner = forest
        .owner_of(|c| c.items.iter().any(|i| i.id == item_id))
        .ok_or_else(|| StoreError::NotFound(item_id.to_string()))?;
    forest
        .find_mut(&owner)
        .and_then(|c| c.content.items.iter_mut().find(|i| i.id == item_id))
        .ok_or_else(|| StoreError::NotFound(item_id.to_string()))
}

pub fn set_item_status(forest: &mut PantryForest, item_id: &str, status: ItemStatus) -> Result<(), StoreError> {
    require_item(forest, item_id)?.status = status;
    Ok(())
}

pub fn set_item_notes(forest: &mut PantryForest, item_id: &str, notes: &str) -> Result<(), StoreError> {
    require_item(forest, item_id)?.notes = notes.trim().to_string();
    Ok(())
}

pub fn rename_item(forest: &mut PantryForest, item_id: &str, name: &str) -> Result<(), StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::EmptyText);
    }
    require_item(forest, item_id)?.name = name.to_string();
    Ok(())
}

pub fn remove_item(forest: &mut PantryForest, category_id: &str, item_id: &str) -> Result<(), StoreError> {
    let category = forest
        .find_mut(category_id)
        .ok_or_else(|| StoreError::NotFound(category_id.to_string()))?;
    let before = category.content.items.len();
    category.content.items.retain(|i| i.id != item_id);
    if category.content.items.len() == before {
        return Err(StoreError::NotFound(item_id.to_string()));
    }
    Ok(())
}
