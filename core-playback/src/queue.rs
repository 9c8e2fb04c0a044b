//! # Media Queue
//!
//! Ordered list of [`MediaItem`]s with a cursor selecting the current item.
//!
//! Every mutation keeps the cursor pointing at the same logical item whenever
//! that item survives the edit, and returns a [`QueueDiff`] that the
//! [`QueueEditor`](crate::queue_editor::QueueEditor) mirrors onto the backend
//! timeline.
//!
//! ```
//! use core_playback::queue::{MediaItem, MediaQueue};
//!
//! let mut queue = MediaQueue::new();
//! queue.insert(0, vec![MediaItem::from_uri("a"), MediaItem::from_uri("b")]).unwrap();
//! queue.set_current(1).unwrap();
//!
//! // Inserting in front of the current item shifts the cursor with it.
//! queue.insert(0, vec![MediaItem::from_uri("z")]).unwrap();
//! assert_eq!(queue.current_index(), Some(2));
//! ```

use crate::config::NavigationMode;
use crate::error::{PlaybackError, Result};
use bridge_traits::MediaSource;
use core_runtime::events::NowPlaying;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identity of a queue entry.
///
/// Two entries pointing at the same source are still distinct items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Display metadata surfaced in notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

/// One playable entry. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    id: ItemId,
    source: MediaSource,
    metadata: MediaMetadata,
}

impl MediaItem {
    pub fn new(source: MediaSource) -> Self {
        Self {
            id: ItemId::new(),
            source,
            metadata: MediaMetadata::default(),
        }
    }

    /// Shorthand for a header-less URI source.
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self::new(MediaSource::uri(uri))
    }

    pub fn with_metadata(mut self, metadata: MediaMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn source(&self) -> &MediaSource {
        &self.source
    }

    pub fn metadata(&self) -> &MediaMetadata {
        &self.metadata
    }

    pub(crate) fn now_playing(&self, index: usize) -> NowPlaying {
        NowPlaying {
            item_id: self.id.to_string(),
            index,
            title: self.metadata.title.clone(),
            artist: self.metadata.artist.clone(),
        }
    }
}

/// Structural change applied to a queue, in backend timeline terms.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueDiff {
    Inserted {
        index: usize,
        sources: Vec<MediaSource>,
    },
    Removed {
        index: usize,
    },
    Moved {
        from: usize,
        to: usize,
    },
    Replaced {
        sources: Vec<MediaSource>,
    },
}

/// Ordered queue with a current-item cursor.
#[derive(Debug, Clone, Default)]
pub struct MediaQueue {
    items: Vec<MediaItem>,
    current: Option<usize>,
}

impl MediaQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&MediaItem> {
        self.items.get(index)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current(&self) -> Option<&MediaItem> {
        self.current.and_then(|index| self.items.get(index))
    }

    pub fn current_id(&self) -> Option<ItemId> {
        self.current().map(MediaItem::id)
    }

    /// Notification payload for the current item.
    pub fn now_playing(&self) -> Option<NowPlaying> {
        self.current
            .and_then(|index| self.items.get(index).map(|item| item.now_playing(index)))
    }

    pub fn position_of(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    /// Sources in queue order, as loaded into the backend timeline.
    pub fn sources(&self) -> Vec<MediaSource> {
        self.items.iter().map(|item| item.source.clone()).collect()
    }

    /// Insert `items` before `index` (`index == len` appends).
    ///
    /// A current item at or after `index` shifts by the number of inserted
    /// items. Inserting into an empty queue does not select anything.
    pub fn insert(&mut self, index: usize, items: Vec<MediaItem>) -> Result<QueueDiff> {
        if index > self.items.len() {
            return Err(self.out_of_range(index));
        }

        let count = items.len();
        let sources = items.iter().map(|item| item.source.clone()).collect();
        let tail = self.items.split_off(index);
        self.items.extend(items);
        self.items.extend(tail);

        if let Some(current) = self.current {
            if index <= current {
                self.current = Some(current + count);
            }
        }

        Ok(QueueDiff::Inserted { index, sources })
    }

    /// Remove the item at `index`.
    ///
    /// Removing an item before the current one decrements the cursor.
    /// Removing the current item moves the cursor to the item that slides into
    /// its place, or clears it when the removed item was last.
    pub fn remove(&mut self, index: usize) -> Result<QueueDiff> {
        if index >= self.items.len() {
            return Err(self.out_of_range(index));
        }

        self.items.remove(index);

        self.current = match self.current {
            Some(current) if index < current => Some(current - 1),
            Some(current) if index == current && current < self.items.len() => Some(current),
            Some(current) if index == current => None,
            other => other,
        };

        Ok(QueueDiff::Removed { index })
    }

    /// Move the item at `from` so that it ends up at `to`.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<QueueDiff> {
        let len = self.items.len();
        if from >= len {
            return Err(self.out_of_range(from));
        }
        if to >= len {
            return Err(self.out_of_range(to));
        }

        let item = self.items.remove(from);
        self.items.insert(to, item);

        self.current = self.current.map(|current| {
            if current == from {
                to
            } else if from < current && to >= current {
                current - 1
            } else if from > current && to <= current {
                current + 1
            } else {
                current
            }
        });

        Ok(QueueDiff::Moved { from, to })
    }

    /// Replace the whole queue. The first item becomes current.
    pub fn replace(&mut self, items: Vec<MediaItem>) -> QueueDiff {
        self.items = items;
        self.current = if self.items.is_empty() { None } else { Some(0) };
        QueueDiff::Replaced {
            sources: self.sources(),
        }
    }

    pub fn clear(&mut self) -> QueueDiff {
        self.replace(Vec::new())
    }

    pub fn set_current(&mut self, index: usize) -> Result<()> {
        if index >= self.items.len() {
            return Err(self.out_of_range(index));
        }
        self.current = Some(index);
        Ok(())
    }

    /// Step the cursor forward. Returns `false` if it did not move.
    pub fn advance(&mut self, mode: NavigationMode) -> bool {
        let len = self.items.len();
        let next = match self.current {
            _ if len == 0 => None,
            None => Some(0),
            Some(current) if current + 1 < len => Some(current + 1),
            Some(_) => match mode {
                NavigationMode::Wrap => Some(0),
                NavigationMode::NoWrap => None,
            },
        };
        self.move_cursor(next)
    }

    /// Step the cursor back. Returns `false` if it did not move.
    pub fn retreat(&mut self, mode: NavigationMode) -> bool {
        let len = self.items.len();
        let previous = match self.current {
            _ if len == 0 => None,
            None => Some(len - 1),
            Some(current) if current > 0 => Some(current - 1),
            Some(_) => match mode {
                NavigationMode::Wrap => Some(len - 1),
                NavigationMode::NoWrap => None,
            },
        };
        self.move_cursor(previous)
    }

    fn move_cursor(&mut self, target: Option<usize>) -> bool {
        match target {
            Some(index) if self.current != Some(index) => {
                self.current = Some(index);
                true
            }
            _ => false,
        }
    }

    fn out_of_range(&self, index: usize) -> PlaybackError {
        PlaybackError::OutOfRange {
            index,
            len: self.items.len(),
        }
    }
}
