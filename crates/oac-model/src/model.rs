//! Item arena with tagged child slots and change notifications.
//!
//! Every item has a model type, ordered properties, ordered attributes and
//! children grouped by tag. Structural and data changes are reported to
//! subscribers synchronously, in the order they happen. Subscribers get a
//! shared view of the model and must not expect to mutate it.

#![allow(missing_docs)]

use std::fmt;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::error::ModelError;

const ROOT_TYPE: &str = "Root";

/// Item identifier, unique within one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u64);

impl ItemId {
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a child: tag plus index within that tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagIndex {
    pub tag: SmolStr,
    pub index: usize,
}

impl TagIndex {
    #[must_use]
    pub fn new(tag: &str, index: usize) -> Self {
        Self {
            tag: tag.into(),
            index,
        }
    }
}

/// Property and attribute payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    Str(String),
}

impl Variant {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::UInt(value) => i64::try_from(*value).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            Self::Int(value) => Some(*value as f64),
            #[allow(clippy::cast_precision_loss)]
            Self::UInt(value) => Some(*value as f64),
            _ => None,
        }
    }

    /// Text form used for domain attributes; `Null` is empty.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(value) => value.to_string(),
            Self::Int(value) => value.to_string(),
            Self::UInt(value) => value.to_string(),
            Self::Double(value) => value.to_string(),
            Self::Str(text) => text.clone(),
        }
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Variant {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u64> for Variant {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<f64> for Variant {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Which map a `DataChanged` event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataRole {
    Property,
    Attribute,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    ItemInserted {
        parent: ItemId,
        tag_index: TagIndex,
        item: ItemId,
    },
    AboutToRemoveItem {
        parent: ItemId,
        tag_index: TagIndex,
        item: ItemId,
    },
    ItemRemoved {
        parent: ItemId,
        tag_index: TagIndex,
    },
    DataChanged {
        item: ItemId,
        role: DataRole,
        name: SmolStr,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type Subscriber = Box<dyn FnMut(&SessionModel, &ModelEvent)>;

#[derive(Debug, Clone)]
struct ItemData {
    model_type: SmolStr,
    parent: Option<ItemId>,
    properties: IndexMap<SmolStr, Variant>,
    attributes: IndexMap<SmolStr, Variant>,
    children: IndexMap<SmolStr, Vec<ItemId>>,
}

impl ItemData {
    fn new(model_type: &str) -> Self {
        Self {
            model_type: model_type.into(),
            parent: None,
            properties: IndexMap::new(),
            attributes: IndexMap::new(),
            children: IndexMap::new(),
        }
    }
}

/// Document model holding every item of a session.
pub struct SessionModel {
    items: FxHashMap<ItemId, ItemData>,
    root: ItemId,
    next_id: u64,
    subscribers: Vec<(SubscriberId, Subscriber)>,
    next_subscriber: u64,
}

impl Default for SessionModel {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionModel {
    #[must_use]
    pub fn new() -> Self {
        let root = ItemId(0);
        let mut items = FxHashMap::default();
        items.insert(root, ItemData::new(ROOT_TYPE));
        Self {
            items,
            root,
            next_id: 1,
            subscribers: Vec::new(),
            next_subscriber: 0,
        }
    }

    #[must_use]
    pub fn root(&self) -> ItemId {
        self.root
    }

    #[must_use]
    pub fn contains(&self, item: ItemId) -> bool {
        self.items.contains_key(&item)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.len() <= 1
    }

    fn get(&self, item: ItemId) -> Result<&ItemData, ModelError> {
        self.items.get(&item).ok_or(ModelError::UnknownItem(item))
    }

    fn get_mut(&mut self, item: ItemId) -> Result<&mut ItemData, ModelError> {
        self.items.get_mut(&item).ok_or(ModelError::UnknownItem(item))
    }

    /// Creates a detached item; attach it with [`insert_item`](Self::insert_item).
    pub fn new_item(&mut self, model_type: &str) -> ItemId {
        let id = ItemId(self.next_id);
        self.next_id += 1;
        self.items.insert(id, ItemData::new(model_type));
        id
    }

    /// Creates an item and appends it under `parent`/`tag`.
    pub fn append_new_item(
        &mut self,
        model_type: &str,
        parent: ItemId,
        tag: &str,
    ) -> Result<ItemId, ModelError> {
        self.get(parent)?;
        let item = self.new_item(model_type);
        self.append_item(item, parent, tag)?;
        Ok(item)
    }

    #[must_use]
    pub fn model_type(&self, item: ItemId) -> Option<&str> {
        self.items.get(&item).map(|data| data.model_type.as_str())
    }

    #[must_use]
    pub fn parent(&self, item: ItemId) -> Option<ItemId> {
        self.items.get(&item).and_then(|data| data.parent)
    }

    #[must_use]
    pub fn tag_index(&self, item: ItemId) -> Option<TagIndex> {
        let parent = self.parent(item)?;
        self.items[&parent]
            .children
            .iter()
            .find_map(|(tag, children)| {
                children
                    .iter()
                    .position(|child| *child == item)
                    .map(|index| TagIndex::new(tag, index))
            })
    }

    /// Children under `tag`, in order.
    #[must_use]
    pub fn children(&self, item: ItemId, tag: &str) -> Vec<ItemId> {
        self.items
            .get(&item)
            .and_then(|data| data.children.get(tag))
            .cloned()
            .unwrap_or_default()
    }

    /// First child under `tag`.
    #[must_use]
    pub fn child(&self, item: ItemId, tag: &str) -> Option<ItemId> {
        self.items
            .get(&item)
            .and_then(|data| data.children.get(tag))
            .and_then(|children| children.first().copied())
    }

    /// Every child, tag by tag.
    #[must_use]
    pub fn all_children(&self, item: ItemId) -> Vec<ItemId> {
        self.items
            .get(&item)
            .map(|data| data.children.values().flatten().copied().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn tags(&self, item: ItemId) -> Vec<SmolStr> {
        self.items
            .get(&item)
            .map(|data| data.children.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Parent chain, nearest first.
    #[must_use]
    pub fn ancestors(&self, item: ItemId) -> Vec<ItemId> {
        let mut chain = Vec::new();
        let mut current = self.parent(item);
        while let Some(parent) = current {
            chain.push(parent);
            current = self.parent(parent);
        }
        chain
    }

    #[must_use]
    pub fn is_descendant_of(&self, item: ItemId, ancestor: ItemId) -> bool {
        self.ancestors(item).contains(&ancestor)
    }

    /// Pre-order list of `item` and its descendants.
    #[must_use]
    pub fn subtree(&self, item: ItemId) -> Vec<ItemId> {
        let mut out = Vec::new();
        let mut stack = vec![item];
        while let Some(next) = stack.pop() {
            if !self.contains(next) {
                continue;
            }
            out.push(next);
            let mut children = self.all_children(next);
            children.reverse();
            stack.extend(children);
        }
        out
    }

    pub fn insert_item(
        &mut self,
        item: ItemId,
        parent: ItemId,
        tag: &str,
        index: usize,
    ) -> Result<(), ModelError> {
        let data = self.get(item)?;
        if data.parent.is_some() || item == self.root {
            return Err(ModelError::AlreadyAttached(item));
        }
        self.get(parent)?;
        if parent == item || self.is_descendant_of(parent, item) {
            return Err(ModelError::CyclicInsert { item });
        }
        let len = self.child_count(parent, tag);
        if index > len {
            return Err(ModelError::InvalidTagIndex {
                parent,
                tag: tag.into(),
                index,
            });
        }
        self.get_mut(parent)?
            .children
            .entry(tag.into())
            .or_default()
            .insert(index, item);
        self.get_mut(item)?.parent = Some(parent);
        self.notify(&ModelEvent::ItemInserted {
            parent,
            tag_index: TagIndex::new(tag, index),
            item,
        });
        Ok(())
    }

    pub fn append_item(&mut self, item: ItemId, parent: ItemId, tag: &str) -> Result<(), ModelError> {
        let index = self.child_count(parent, tag);
        self.insert_item(item, parent, tag, index)
    }

    #[must_use]
    pub fn child_count(&self, item: ItemId, tag: &str) -> usize {
        self.items
            .get(&item)
            .and_then(|data| data.children.get(tag))
            .map_or(0, Vec::len)
    }

    /// Detaches the child at `tag_index`; the item stays in the arena.
    pub fn take_item(&mut self, parent: ItemId, tag_index: &TagIndex) -> Result<ItemId, ModelError> {
        let item = self
            .get(parent)?
            .children
            .get(&tag_index.tag)
            .and_then(|children| children.get(tag_index.index).copied())
            .ok_or_else(|| ModelError::InvalidTagIndex {
                parent,
                tag: tag_index.tag.clone(),
                index: tag_index.index,
            })?;
        self.notify(&ModelEvent::AboutToRemoveItem {
            parent,
            tag_index: tag_index.clone(),
            item,
        });
        if let Some(children) = self.get_mut(parent)?.children.get_mut(&tag_index.tag) {
            children.remove(tag_index.index);
        }
        self.get_mut(item)?.parent = None;
        self.notify(&ModelEvent::ItemRemoved {
            parent,
            tag_index: tag_index.clone(),
        });
        Ok(item)
    }

    /// Detaches (if attached) and destroys `item` with its subtree.
    pub fn remove_item(&mut self, item: ItemId) -> Result<(), ModelError> {
        self.get(item)?;
        if item == self.root {
            return Err(ModelError::AlreadyAttached(item));
        }
        if let (Some(parent), Some(tag_index)) = (self.parent(item), self.tag_index(item)) {
            self.take_item(parent, &tag_index)?;
        }
        for doomed in self.subtree(item) {
            self.items.remove(&doomed);
        }
        Ok(())
    }

    /// Removes every child under `tag`.
    pub fn clear_children(&mut self, item: ItemId, tag: &str) -> Result<(), ModelError> {
        for child in self.children(item, tag).into_iter().rev() {
            self.remove_item(child)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn data(&self, item: ItemId, name: &str) -> Option<&Variant> {
        self.items.get(&item).and_then(|data| data.properties.get(name))
    }

    #[must_use]
    pub fn str_data(&self, item: ItemId, name: &str) -> Option<&str> {
        self.data(item, name).and_then(Variant::as_str)
    }

    #[must_use]
    pub fn bool_data(&self, item: ItemId, name: &str) -> Option<bool> {
        self.data(item, name).and_then(Variant::as_bool)
    }

    #[must_use]
    pub fn int_data(&self, item: ItemId, name: &str) -> Option<i64> {
        self.data(item, name).and_then(Variant::as_int)
    }

    #[must_use]
    pub fn property_names(&self, item: ItemId) -> Vec<SmolStr> {
        self.items
            .get(&item)
            .map(|data| data.properties.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Sets a property; emits `DataChanged` and returns `true` only when
    /// the value actually changed.
    pub fn set_data(
        &mut self,
        item: ItemId,
        name: &str,
        value: impl Into<Variant>,
    ) -> Result<bool, ModelError> {
        let value = value.into();
        let properties = &mut self.get_mut(item)?.properties;
        if properties.get(name) == Some(&value) {
            return Ok(false);
        }
        properties.insert(name.into(), value);
        self.notify(&ModelEvent::DataChanged {
            item,
            role: DataRole::Property,
            name: name.into(),
        });
        Ok(true)
    }

    #[must_use]
    pub fn attribute(&self, item: ItemId, name: &str) -> Option<&Variant> {
        self.items.get(&item).and_then(|data| data.attributes.get(name))
    }

    /// Attributes in declaration order.
    #[must_use]
    pub fn attributes(&self, item: ItemId) -> Vec<(SmolStr, Variant)> {
        self.items
            .get(&item)
            .map(|data| {
                data.attributes
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Attribute counterpart of [`set_data`](Self::set_data).
    pub fn set_attribute(
        &mut self,
        item: ItemId,
        name: &str,
        value: impl Into<Variant>,
    ) -> Result<bool, ModelError> {
        let value = value.into();
        let attributes = &mut self.get_mut(item)?.attributes;
        if attributes.get(name) == Some(&value) {
            return Ok(false);
        }
        attributes.insert(name.into(), value);
        self.notify(&ModelEvent::DataChanged {
            item,
            role: DataRole::Attribute,
            name: name.into(),
        });
        Ok(true)
    }

    /// Deep copy of `item` with fresh identifiers, detached.
    pub fn copy_item(&mut self, item: ItemId) -> Result<ItemId, ModelError> {
        let source = self.get(item)?.clone();
        let copy = self.new_item(&source.model_type);
        for (tag, children) in &source.children {
            for child in children {
                let child_copy = self.copy_item(*child)?;
                let target = self.get_mut(copy)?;
                target.children.entry(tag.clone()).or_default().push(child_copy);
                self.get_mut(child_copy)?.parent = Some(copy);
            }
        }
        let target = self.get_mut(copy)?;
        target.properties = source.properties;
        target.attributes = source.attributes;
        Ok(copy)
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&SessionModel, &ModelEvent) + 'static) -> SubscriberId {
        let id = SubscriberId(self.next_subscriber);
        self.next_subscriber += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        before != self.subscribers.len()
    }

    fn notify(&mut self, event: &ModelEvent) {
        if self.subscribers.is_empty() {
            return;
        }
        let mut subscribers = std::mem::take(&mut self.subscribers);
        for (_, callback) in &mut subscribers {
            callback(self, event);
        }
        subscribers.append(&mut self.subscribers);
        self.subscribers = subscribers;
    }
}

impl fmt::Debug for SessionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionModel")
            .field("items", &self.items.len())
            .field("subscribers", &self.subscribers.len())
            .finish_non_exhaustive()
    }
}
